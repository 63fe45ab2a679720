pub mod docker;
pub mod driver;
#[cfg(test)]
pub mod fake;
pub mod timeout;
pub mod types;
