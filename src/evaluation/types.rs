//! Type definitions for recorded measurements and their verdicts.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::guidance::TestKind;

/// Measurements recorded for one circuit on the schedule of test results.
///
/// Every measurement is optional: a blank column evaluates to
/// `Outcome::NotRecorded`, never to a pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestResult {
    pub circuit_number: String,
    /// Highest R1+R2 reading (Ω)
    pub r1r2_ohms: Option<f64>,
    /// Ring end-to-end line (Ω)
    pub ring_r1_ohms: Option<f64>,
    /// Ring end-to-end neutral (Ω)
    pub ring_rn_ohms: Option<f64>,
    /// Ring end-to-end CPC (Ω)
    pub ring_r2_ohms: Option<f64>,
    pub insulation_live_neutral_megaohms: Option<f64>,
    pub insulation_live_earth_megaohms: Option<f64>,
    pub insulation_neutral_earth_megaohms: Option<f64>,
    pub polarity_correct: Option<bool>,
    /// Measured earth fault loop impedance (Ω)
    pub zs_ohms: Option<f64>,
    /// Whether the device tripped at half its rated residual current
    pub rcd_half_rated_tripped: Option<bool>,
    /// Trip time at 1×IΔn (ms)
    pub rcd_trip_time_ms: Option<f64>,
    /// Trip time at 5×IΔn (ms)
    pub rcd_trip_time_5x_ms: Option<f64>,
    pub functional_ok: Option<bool>,
}

impl TestResult {
    pub fn new(circuit_number: impl Into<String>) -> Self {
        Self {
            circuit_number: circuit_number.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    Fail,
    NotRecorded,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pass => write!(f, "pass"),
            Outcome::Fail => write!(f, "fail"),
            Outcome::NotRecorded => write!(f, "not recorded"),
        }
    }
}

/// Result of comparing one step's measurements against its criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestVerdict {
    pub test: TestKind,
    pub outcome: Outcome,
    pub detail: String,
    /// True when the comparison was made against an estimated expected value
    pub against_estimate: bool,
}

impl TestVerdict {
    pub fn is_pass(&self) -> bool {
        self.outcome == Outcome::Pass
    }
}

/// Every verdict for one circuit, in guidance step order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitEvaluation {
    pub circuit_number: String,
    pub verdicts: Vec<TestVerdict>,
}

impl CircuitEvaluation {
    /// True only when every applicable test was recorded and passed.
    pub fn passed(&self) -> bool {
        self.verdicts.iter().all(TestVerdict::is_pass)
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestVerdict> {
        self.verdicts.iter().filter(|v| v.outcome == Outcome::Fail)
    }
}
