//! Expected-value calculator for BS 7671 Part 6 testing.
//!
//! Turns a `CircuitSpec` into the values a tester compares measurements
//! against: maximum Zs, expected R1+R2, minimum insulation resistance, ring
//! end-to-end values and RCD trip-time bands.
//!
//! # Architecture
//!
//! - **Tables**: Every regulatory constant, loaded from TOML (embedded default or custom file)
//! - **Calculator**: Pure lookups and arithmetic over the tables
//! - **Estimates**: Values computed from a nominal length are always flagged
//!
//! # Example
//!
//! ```ignore
//! use eic_engine::calculator::compute_max_zs;
//! use eic_engine::circuit::{CircuitSpec, PhaseType, ProtectiveDevice, TripCurve};
//!
//! let mut circuit = CircuitSpec::new("1", ProtectiveDevice::mcb(TripCurve::B, 32));
//! circuit.phase_type = Some(PhaseType::Single);
//! circuit.live_size_mm2 = Some(2.5);
//! circuit.cpc_size_mm2 = Some(1.5);
//!
//! let zs = compute_max_zs(&circuit)?;
//! println!("Maximum Zs: {}", zs); // 1.37 Ω
//! ```

mod engine;
mod tables;
mod types;

use std::sync::OnceLock;

pub use engine::Calculator;
pub use tables::{
    default_tables, load_tables, parse_tables, Estimation, OperatingTemperature,
    ReferenceTables, TablesSummary, Tolerances,
};
pub use types::*;

use crate::circuit::CircuitSpec;
use crate::error::Result;

static DEFAULT_CALCULATOR: OnceLock<Calculator> = OnceLock::new();

/// Calculator over the embedded tables, parsed once per process.
pub fn default_calculator() -> &'static Calculator {
    DEFAULT_CALCULATOR.get_or_init(|| Calculator::new(default_tables()))
}

/// Maximum earth fault loop impedance using the embedded tables.
pub fn compute_max_zs(circuit: &CircuitSpec) -> Result<Ohms> {
    default_calculator().compute_max_zs(circuit)
}

/// Expected R1+R2 using the embedded tables.
pub fn compute_expected_r1r2(circuit: &CircuitSpec) -> Result<R1R2Estimate> {
    default_calculator().compute_expected_r1r2(circuit)
}

/// Minimum insulation resistance using the embedded tables.
pub fn compute_min_insulation_resistance(circuit: &CircuitSpec) -> Megaohms {
    default_calculator().compute_min_insulation_resistance(circuit)
}

/// All expected values using the embedded tables.
pub fn compute_expected_values(circuit: &CircuitSpec) -> Result<ExpectedValues> {
    default_calculator().compute_expected_values(circuit)
}
