pub mod pipeline_service;

#[allow(unused_imports)]
pub use pipeline_service::{BirthdayPipeline, RunSummary, SkipReason};
