//! Data model for scan jobs, reports and deliveries.

mod job;
mod report;
mod submission;

pub use job::*;
pub use report::*;
pub use submission::*;
