//! Type definitions for calculator output.
//!
//! All output types serialize to JSON for the schedule exporter and the
//! rendering layer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::circuit::RcdType;

// =============================================================================
// UNITS
// =============================================================================

/// A resistance or impedance in ohms.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ohms(pub f64);

impl Ohms {
    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Ohms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} Ω", self.0)
    }
}

/// An insulation resistance in megaohms.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Megaohms(pub f64);

impl Megaohms {
    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Megaohms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} MΩ", self.0)
    }
}

// =============================================================================
// OUTPUT TYPES
// =============================================================================

/// Expected R1+R2, flagged when it rests on an assumed length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct R1R2Estimate {
    pub value: Ohms,
    /// True when no circuit length was recorded and a nominal length was used
    pub estimated: bool,
    /// Length the value was computed for (recorded or nominal)
    pub length_m: f64,
}

/// Expected end-to-end resistances of a ring final circuit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RingEndToEnd {
    /// Line conductor end-to-end
    pub r1: Ohms,
    /// Neutral conductor end-to-end
    pub rn: Ohms,
    /// Protective conductor end-to-end
    pub r2: Ohms,
    /// Expected r2 / r1 (CPC resistance per metre over live resistance per metre)
    pub cpc_ratio: f64,
    /// Permitted difference between r1 and rn, and between r2 and ratio x r1
    pub tolerance: Ohms,
    pub estimated: bool,
}

/// Insulation resistance test voltage and floor for a voltage band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InsulationRequirement {
    pub test_voltage_v: u32,
    pub minimum: Megaohms,
}

/// One test current and its trip-time window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RcdTripBand {
    /// Test current as a multiple of IΔn
    pub multiple: f64,
    /// False for the half-rated test, where the device must not trip
    pub must_trip: bool,
    pub min_ms: Option<u32>,
    pub max_ms: Option<u32>,
}

impl RcdTripBand {
    /// Test current in mA for a device of the given residual rating.
    pub fn test_current_ma(&self, residual_current_ma: u32) -> f64 {
        self.multiple * f64::from(residual_current_ma)
    }

    /// True when a measured trip time (ms) satisfies this band.
    pub fn accepts(&self, trip_time_ms: f64) -> bool {
        let above_min = self.min_ms.map_or(true, |min| trip_time_ms >= f64::from(min));
        let below_max = self.max_ms.map_or(true, |max| trip_time_ms <= f64::from(max));
        above_min && below_max
    }

    pub fn describe(&self, residual_current_ma: u32) -> String {
        let current = format!(
            "{}×IΔn ({} mA)",
            format_multiple(self.multiple),
            format_multiple(self.test_current_ma(residual_current_ma))
        );
        if !self.must_trip {
            return format!("At {}: must not trip", current);
        }
        match (self.min_ms, self.max_ms) {
            (Some(min), Some(max)) => format!("At {}: trips between {} ms and {} ms", current, min, max),
            (None, Some(max)) => format!("At {}: trips within {} ms", current, max),
            (Some(min), None) => format!("At {}: trips no sooner than {} ms", current, min),
            (None, None) => format!("At {}: trips", current),
        }
    }
}

fn format_multiple(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// RCD test parameters for an RCD-protected circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RcdTest {
    pub residual_current_ma: u32,
    pub rcd_type: RcdType,
    /// True when the residual rating was assumed rather than recorded
    pub assumed_rating: bool,
    /// Bands in ascending test-current order
    pub bands: Vec<RcdTripBand>,
}

/// Non-fatal conditions surfaced alongside expected values.
///
/// These never stop a certificate being produced but must be visible in
/// every rendering of the affected values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// A value was computed from a nominal rather than recorded length
    EstimationRequired { field: String, assumed_length_m: f64 },
    /// An RCD was recorded without a residual rating
    AssumedResidualCurrent { residual_current_ma: u32 },
    /// Ze + (R1+R2) at operating temperature exceeds the tabulated maximum
    PredictedZsExceedsLimit { predicted: Ohms, limit: Ohms },
    /// The circuit normally needs 30 mA additional protection and has none
    AdditionalProtectionRecommended,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::EstimationRequired {
                field,
                assumed_length_m,
            } => write!(
                f,
                "{} is an estimate based on a nominal {} m run; record the circuit length for an exact value",
                field, assumed_length_m
            ),
            Notice::AssumedResidualCurrent {
                residual_current_ma,
            } => write!(
                f,
                "No residual rating recorded; {} mA assumed, confirm from the device marking",
                residual_current_ma
            ),
            Notice::PredictedZsExceedsLimit { predicted, limit } => write!(
                f,
                "Predicted Zs of {} exceeds the tabulated maximum of {}",
                predicted, limit
            ),
            Notice::AdditionalProtectionRecommended => write!(
                f,
                "Circuit normally requires 30 mA RCD additional protection (Regulation 411.3.3) but none is recorded"
            ),
        }
    }
}

/// Every expected value for a circuit.
///
/// Derived on demand from a `CircuitSpec`; stale as soon as the circuit changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedValues {
    pub circuit_number: String,
    /// Tabulated maximum earth fault loop impedance
    pub max_zs: Ohms,
    /// Maximum measured Zs at ambient temperature (tabulated x correction factor)
    pub max_measured_zs: Ohms,
    pub r1r2: R1R2Estimate,
    pub ring: Option<RingEndToEnd>,
    pub insulation: InsulationRequirement,
    pub rcd: Option<RcdTest>,
    /// Ze + (R1+R2) at operating temperature, when Ze is recorded
    pub predicted_zs: Option<Ohms>,
    pub notices: Vec<Notice>,
}

impl ExpectedValues {
    pub fn min_insulation_resistance(&self) -> Megaohms {
        self.insulation.minimum
    }

    /// True when any value was estimated rather than derived exactly.
    pub fn has_estimates(&self) -> bool {
        self.notices
            .iter()
            .any(|n| matches!(n, Notice::EstimationRequired { .. }))
    }
}
