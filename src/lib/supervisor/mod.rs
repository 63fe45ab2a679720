pub mod api;
pub mod health;
pub mod supervisor;
pub mod types;
