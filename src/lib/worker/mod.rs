pub mod ports;
pub mod registry;
pub mod state;
pub mod stats;
pub mod types;
