//! Testing guidance for BS 7671 Part 6 initial verification.
//!
//! Produces the ordered test sequence for a circuit, each step carrying its
//! procedure, equipment, safety notes and an acceptance criterion rendered
//! with the circuit's own expected values.
//!
//! # Example
//!
//! ```ignore
//! use eic_engine::guidance::generate_testing_guidance;
//!
//! for step in generate_testing_guidance(&circuit)? {
//!     println!("{} ({}): {}", step.name, step.regulation, step.acceptance_text);
//! }
//! ```

mod generator;
mod steps;
mod types;

pub use generator::GuidanceGenerator;
pub use types::*;

use crate::calculator::default_calculator;
use crate::circuit::CircuitSpec;
use crate::error::Result;

/// Ordered guidance steps for a circuit using the embedded tables.
pub fn generate_testing_guidance(circuit: &CircuitSpec) -> Result<Vec<GuidanceStep>> {
    GuidanceGenerator::new(default_calculator()).generate(circuit)
}
