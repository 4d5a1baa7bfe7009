//! Type definitions for generated testing guidance.
//!
//! These types serialize to JSON for the rendering layer and the document
//! exporter; neither needs anything beyond what is here.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::calculator::{ExpectedValues, Megaohms, Ohms, RcdTripBand};
use crate::circuit::RcdType;

/// The tests of BS 7671 Part 6, in the order they must be carried out.
///
/// The derived `Ord` follows declaration order, which is the canonical
/// sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    ProtectiveConductorContinuity,
    RingContinuity,
    InsulationResistance,
    Polarity,
    EarthFaultLoopImpedance,
    RcdOperation,
    Functional,
}

impl TestKind {
    pub const CANONICAL_ORDER: [TestKind; 7] = [
        TestKind::ProtectiveConductorContinuity,
        TestKind::RingContinuity,
        TestKind::InsulationResistance,
        TestKind::Polarity,
        TestKind::EarthFaultLoopImpedance,
        TestKind::RcdOperation,
        TestKind::Functional,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TestKind::ProtectiveConductorContinuity => "Continuity of protective conductors",
            TestKind::RingContinuity => "Continuity of ring final circuit conductors",
            TestKind::InsulationResistance => "Insulation resistance",
            TestKind::Polarity => "Polarity",
            TestKind::EarthFaultLoopImpedance => "Earth fault loop impedance (Zs)",
            TestKind::RcdOperation => "RCD operation",
            TestKind::Functional => "Functional testing",
        }
    }

    /// Governing regulation in BS 7671 Part 6.
    pub fn regulation(&self) -> &'static str {
        match self {
            TestKind::ProtectiveConductorContinuity => "Regulation 643.2.1",
            TestKind::RingContinuity => "Regulation 643.2.1",
            TestKind::InsulationResistance => "Regulation 643.3, Table 64",
            TestKind::Polarity => "Regulation 643.6",
            TestKind::EarthFaultLoopImpedance => "Regulation 643.7.3, Table 41.3",
            TestKind::RcdOperation => "Regulation 643.8",
            TestKind::Functional => "Regulation 643.10",
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// What a measurement must satisfy for a step to pass.
///
/// Carries the circuit's own computed values so the evaluator and the
/// rendered text always agree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AcceptanceCriterion {
    /// Highest measured R1+R2 must not exceed `limit` (expected + tolerance)
    MaxResistance {
        expected: Ohms,
        limit: Ohms,
        estimated: bool,
    },
    /// End-to-end readings must be consistent with each other
    RingEndToEnd {
        r1: Ohms,
        rn: Ohms,
        r2: Ohms,
        cpc_ratio: f64,
        tolerance: Ohms,
        estimated: bool,
    },
    /// Every insulation reading must be at least `minimum`
    MinInsulation {
        minimum: Megaohms,
        test_voltage_v: u32,
    },
    /// Correct or incorrect, no numeric comparison
    Binary,
    /// Measured Zs must not exceed `limit` (tabulated x correction factor)
    MaxImpedance { limit: Ohms, tabulated: Ohms },
    /// Trip times must fall inside every band
    TripTime {
        residual_current_ma: u32,
        rcd_type: RcdType,
        bands: Vec<RcdTripBand>,
    },
    /// Operates as intended
    Qualitative,
}

/// One instructional unit of a circuit's test sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidanceStep {
    pub test: TestKind,
    pub name: String,
    pub regulation: String,
    /// Ordered procedure lines
    pub procedure: Vec<String>,
    pub acceptance: AcceptanceCriterion,
    /// Acceptance criterion rendered with this circuit's values
    pub acceptance_text: String,
    pub equipment: Vec<String>,
    pub safety_notes: Vec<String>,
}

/// Guidance and expected values for one circuit, as handed to exporters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitGuidance {
    pub circuit_number: String,
    pub description: String,
    pub expected: ExpectedValues,
    pub steps: Vec<GuidanceStep>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_order_matches_ord() {
        let mut sorted = TestKind::CANONICAL_ORDER;
        sorted.sort();
        assert_eq!(sorted, TestKind::CANONICAL_ORDER);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&TestKind::EarthFaultLoopImpedance).unwrap();
        assert_eq!(json, r#""earth_fault_loop_impedance""#);
    }

    #[test]
    fn test_criterion_tagged() {
        let criterion = AcceptanceCriterion::MaxImpedance {
            limit: Ohms(1.1),
            tabulated: Ohms(1.37),
        };
        let json = serde_json::to_string(&criterion).unwrap();
        assert!(json.contains(r#""type":"max_impedance""#));
        assert!(json.contains(r#""tabulated":1.37"#));
    }
}
