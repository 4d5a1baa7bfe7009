//! Evaluation of recorded measurements against generated guidance.
//!
//! Each guidance step's acceptance criterion is the single source of truth:
//! the verdict compares the recorded measurement with exactly the values the
//! step rendered into its acceptance text.

mod types;

pub use types::*;

use tracing::debug;

use crate::calculator::{default_calculator, Calculator, Megaohms, Ohms, RcdTripBand};
use crate::circuit::CircuitSpec;
use crate::error::{EngineError, Result};
use crate::guidance::{AcceptanceCriterion, GuidanceGenerator, GuidanceStep};

/// Verdicts for a circuit's recorded results using the embedded tables.
pub fn evaluate_test_result(circuit: &CircuitSpec, result: &TestResult) -> Result<Vec<TestVerdict>> {
    evaluate_with(default_calculator(), circuit, result)
}

/// One verdict per guidance step, in step order.
///
/// Fails with `ResultCircuitMismatch` when the result names another circuit.
pub fn evaluate_with(calculator: &Calculator, circuit: &CircuitSpec, result: &TestResult) -> Result<Vec<TestVerdict>> {
    if !result.circuit_number.is_empty() && result.circuit_number != circuit.circuit_number {
        return Err(EngineError::ResultCircuitMismatch {
            circuit: circuit.circuit_number.clone(),
            result_circuit: result.circuit_number.clone(),
        });
    }

    let steps = GuidanceGenerator::new(calculator).generate(circuit)?;
    let verdicts: Vec<TestVerdict> = steps.iter().map(|step| evaluate_step(step, result)).collect();

    debug!(
        "Circuit {}: {} of {} tests passed",
        circuit.circuit_number,
        verdicts.iter().filter(|v| v.is_pass()).count(),
        verdicts.len()
    );
    Ok(verdicts)
}

/// Compare a result against a single step's acceptance criterion.
pub fn evaluate_step(step: &GuidanceStep, result: &TestResult) -> TestVerdict {
    let (outcome, detail, against_estimate) = match &step.acceptance {
        AcceptanceCriterion::MaxResistance {
            expected,
            limit,
            estimated,
        } => {
            let (outcome, detail) = match result.r1r2_ohms {
                None => not_recorded("R1+R2"),
                Some(measured) if !is_valid_reading(measured) => invalid_reading("R1+R2", measured, "Ω"),
                Some(measured) if measured <= limit.value() => {
                    (Outcome::Pass, format!("R1+R2 {} ≤ {}", Ohms(measured), limit))
                }
                Some(measured) => (
                    Outcome::Fail,
                    format!("R1+R2 {} exceeds {} (expected {})", Ohms(measured), limit, expected),
                ),
            };
            (outcome, detail, *estimated)
        }
        AcceptanceCriterion::RingEndToEnd {
            cpc_ratio, tolerance, ..
        } => {
            let (outcome, detail) = evaluate_ring(result, *cpc_ratio, *tolerance);
            (outcome, detail, false)
        }
        AcceptanceCriterion::MinInsulation { minimum, .. } => {
            let (outcome, detail) = evaluate_insulation(result, *minimum);
            (outcome, detail, false)
        }
        AcceptanceCriterion::Binary => {
            let (outcome, detail) = match result.polarity_correct {
                None => not_recorded("Polarity"),
                Some(true) => (Outcome::Pass, "Polarity correct".to_string()),
                Some(false) => (Outcome::Fail, "Polarity incorrect".to_string()),
            };
            (outcome, detail, false)
        }
        AcceptanceCriterion::MaxImpedance { limit, tabulated } => {
            let (outcome, detail) = match result.zs_ohms {
                None => not_recorded("Zs"),
                Some(measured) if !is_valid_reading(measured) => invalid_reading("Zs", measured, "Ω"),
                Some(measured) if measured <= limit.value() => {
                    (Outcome::Pass, format!("Zs {} ≤ {}", Ohms(measured), limit))
                }
                Some(measured) => (
                    Outcome::Fail,
                    format!(
                        "Zs {} exceeds {} (tabulated {})",
                        Ohms(measured),
                        limit,
                        tabulated
                    ),
                ),
            };
            (outcome, detail, false)
        }
        AcceptanceCriterion::TripTime {
            residual_current_ma,
            bands,
            ..
        } => {
            let (outcome, detail) = evaluate_rcd(result, *residual_current_ma, bands);
            (outcome, detail, false)
        }
        AcceptanceCriterion::Qualitative => {
            let (outcome, detail) = match result.functional_ok {
                None => not_recorded("Functional check"),
                Some(true) => (Outcome::Pass, "Operates as intended".to_string()),
                Some(false) => (Outcome::Fail, "Does not operate as intended".to_string()),
            };
            (outcome, detail, false)
        }
    };

    TestVerdict {
        test: step.test,
        outcome,
        detail,
        against_estimate,
    }
}

fn not_recorded(what: &str) -> (Outcome, String) {
    (Outcome::NotRecorded, format!("{} not recorded", what))
}

/// Instrument readings are finite and never negative.
fn is_valid_reading(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

fn invalid_reading(what: &str, value: f64, unit: &str) -> (Outcome, String) {
    (Outcome::Fail, format!("{} reading {} {} is not a valid measurement", what, value, unit))
}

fn evaluate_ring(result: &TestResult, cpc_ratio: f64, tolerance: Ohms) -> (Outcome, String) {
    let (Some(r1), Some(rn), Some(r2)) = (result.ring_r1_ohms, result.ring_rn_ohms, result.ring_r2_ohms) else {
        return not_recorded("End-to-end r1, rn and r2");
    };
    if let Some((label, reading)) = [("r1", r1), ("rn", rn), ("r2", r2)]
        .into_iter()
        .find(|(_, reading)| !is_valid_reading(*reading))
    {
        return invalid_reading(label, reading, "Ω");
    }

    let line_neutral_diff = (r1 - rn).abs();
    let cpc_diff = (r2 - cpc_ratio * r1).abs();

    if line_neutral_diff > tolerance.value() {
        (
            Outcome::Fail,
            format!(
                "r1 {} and rn {} differ by {} (limit {})",
                Ohms(r1),
                Ohms(rn),
                Ohms(line_neutral_diff),
                tolerance
            ),
        )
    } else if cpc_diff > tolerance.value() {
        (
            Outcome::Fail,
            format!(
                "r2 {} differs from {:.2} × r1 by {} (limit {})",
                Ohms(r2),
                cpc_ratio,
                Ohms(cpc_diff),
                tolerance
            ),
        )
    } else {
        (
            Outcome::Pass,
            format!("r1 {}, rn {}, r2 {} consistent", Ohms(r1), Ohms(rn), Ohms(r2)),
        )
    }
}

fn evaluate_insulation(result: &TestResult, minimum: Megaohms) -> (Outcome, String) {
    let readings: Vec<(&str, f64)> = [
        ("L-N", result.insulation_live_neutral_megaohms),
        ("L-E", result.insulation_live_earth_megaohms),
        ("N-E", result.insulation_neutral_earth_megaohms),
    ]
    .into_iter()
    .filter_map(|(label, reading)| reading.map(|r| (label, r)))
    .collect();

    if let Some((label, reading)) = readings.iter().find(|(_, r)| !is_valid_reading(*r)) {
        return invalid_reading(label, *reading, "MΩ");
    }
    let lowest = readings.into_iter().min_by(|a, b| a.1.total_cmp(&b.1));

    match lowest {
        None => not_recorded("Insulation resistance"),
        Some((label, reading)) if reading >= minimum.value() => (
            Outcome::Pass,
            format!("Lowest reading {} {} ≥ {}", label, Megaohms(reading), minimum),
        ),
        Some((label, reading)) => (
            Outcome::Fail,
            format!("{} reading {} below minimum {}", label, Megaohms(reading), minimum),
        ),
    }
}

fn evaluate_rcd(result: &TestResult, residual_current_ma: u32, bands: &[RcdTripBand]) -> (Outcome, String) {
    let mut failures = Vec::new();
    let mut missing = false;

    for band in bands {
        if !band.must_trip {
            match result.rcd_half_rated_tripped {
                Some(false) => {}
                Some(true) => failures.push(format!("{}, but it tripped", band.describe(residual_current_ma))),
                None => missing = true,
            }
            continue;
        }

        let measured = if band.multiple > 1.0 {
            result.rcd_trip_time_5x_ms
        } else {
            result.rcd_trip_time_ms
        };
        match measured {
            Some(ms) if !is_valid_reading(ms) => failures.push(format!(
                "{}, reading {} ms is not a valid measurement",
                band.describe(residual_current_ma),
                ms
            )),
            Some(ms) if band.accepts(ms) => {}
            Some(ms) => failures.push(format!("{}, measured {} ms", band.describe(residual_current_ma), ms)),
            None => missing = true,
        }
    }

    if !failures.is_empty() {
        (Outcome::Fail, failures.join("; "))
    } else if missing {
        not_recorded("One or more RCD trip times")
    } else {
        (Outcome::Pass, "All trip times within limits".to_string())
    }
}
