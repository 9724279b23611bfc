pub mod tracing_setup;

pub use tracing_setup::{init, LogSettings};
