//! Compliance-verification engine for BS 7671 Electrical Installation
//! Certificates.
//!
//! Given a circuit from the schedule of test results, computes the values a
//! tester must measure against and generates ordered Part 6 test guidance.

pub mod calculator;
pub mod circuit;
mod error;
pub mod evaluation;
pub mod guidance;
pub mod schedule;

pub use calculator::{
    compute_expected_r1r2, compute_expected_values, compute_max_zs, compute_min_insulation_resistance,
    Calculator, ExpectedValues, Megaohms, Ohms,
};
pub use circuit::CircuitSpec;
pub use error::{EngineError, Result};
pub use evaluation::{evaluate_test_result, Outcome, TestResult, TestVerdict};
pub use guidance::{generate_testing_guidance, GuidanceGenerator, GuidanceStep, TestKind};
pub use schedule::{build_schedule, Schedule, ScheduleReport};
