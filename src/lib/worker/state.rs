use super::types::{InvalidTransition, WorkerRecord, WorkerState};

pub fn valid_state_transition(src: WorkerState, dst: WorkerState) -> bool {
    use WorkerState::*;

    match src {
        Starting => matches!(dst, Running | Failed),
        Running => matches!(dst, Releasing),
        Releasing => matches!(dst, Released),
        Released | Failed => false,
    }
}

impl WorkerRecord {
    pub fn transition(&mut self, next: WorkerState) -> Result<(), InvalidTransition> {
        if !valid_state_transition(self.state, next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}
