use super::types::{PortAllocator, PortRangeExhausted};
use crate::lib::config::types::PortRange;

impl PortAllocator {
    pub fn new(range: PortRange) -> Self {
        PortAllocator {
            base: range.base,
            max: range.max,
            counter: range.base,
        }
    }

    /// Issue the next port. Never wraps, and a port is never handed out twice,
    /// not even after the allocation that took it failed.
    pub fn next(&mut self) -> Result<u16, PortRangeExhausted> {
        if self.counter >= self.max {
            return Err(PortRangeExhausted {
                base: self.base,
                max: self.max,
            });
        }
        self.counter += 1;
        Ok(self.counter)
    }
}
