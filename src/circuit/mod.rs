//! Circuit description as recorded on the schedule of test results.

mod types;

pub use types::*;
