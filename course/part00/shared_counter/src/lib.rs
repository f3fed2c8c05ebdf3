pub mod config;
pub mod counter;
pub mod driver;
pub mod tracing_init;
