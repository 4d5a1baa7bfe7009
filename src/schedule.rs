//! Schedule of test results: every circuit on a distribution board.
//!
//! Circuits are independent, so expected values and guidance are computed
//! in parallel. A schedule is produced whole or not at all.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::calculator::{default_calculator, Calculator};
use crate::circuit::CircuitSpec;
use crate::error::{EngineError, Result};
use crate::evaluation::{evaluate_with, CircuitEvaluation, TestResult};
use crate::guidance::{CircuitGuidance, GuidanceGenerator};

/// Input document: the circuits of one board in schedule order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default)]
    pub board: Option<String>,
    pub circuits: Vec<CircuitSpec>,
}

/// Guidance and expected values for every circuit, in schedule order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleReport {
    /// Edition of BS 7671 the values were computed from
    pub edition: String,
    pub circuits: Vec<CircuitGuidance>,
}

impl ScheduleReport {
    /// Number of circuits carrying at least one estimated value.
    pub fn estimated_count(&self) -> usize {
        self.circuits
            .iter()
            .filter(|c| c.expected.has_estimates())
            .count()
    }
}

/// Build a schedule report over the embedded tables.
pub fn build_schedule(circuits: &[CircuitSpec]) -> Result<ScheduleReport> {
    build_schedule_with(default_calculator(), circuits)
}

/// Build a schedule report over the given calculator.
///
/// Fails with `DuplicateCircuitNumber` before any computation, or with
/// `ScheduleFailed` carrying every circuit's error in schedule order.
pub fn build_schedule_with(calculator: &Calculator, circuits: &[CircuitSpec]) -> Result<ScheduleReport> {
    check_unique(circuits)?;

    let generator = GuidanceGenerator::new(calculator);
    let results: Vec<Result<CircuitGuidance>> = circuits
        .par_iter()
        .map(|circuit| generator.generate_circuit_guidance(circuit))
        .collect();

    let mut guidance = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(circuit) => guidance.push(circuit),
            Err(e) => {
                warn!("{}", e);
                failures.push(e);
            }
        }
    }

    if !failures.is_empty() {
        return Err(EngineError::ScheduleFailed { failures });
    }

    info!("Built schedule for {} circuits", guidance.len());

    Ok(ScheduleReport {
        edition: calculator.tables().edition().to_string(),
        circuits: guidance,
    })
}

/// Evaluate recorded results for every circuit, matched by circuit number.
///
/// A circuit with no recorded results gets an all-`NotRecorded` evaluation.
/// Results for circuits not on the schedule are ignored with a warning.
/// Two result rows for the same circuit fail with `DuplicateCircuitNumber`.
pub fn evaluate_schedule(
    calculator: &Calculator,
    circuits: &[CircuitSpec],
    results: &[TestResult],
) -> Result<Vec<CircuitEvaluation>> {
    check_unique(circuits)?;

    let mut by_number: HashMap<&str, &TestResult> = HashMap::with_capacity(results.len());
    for result in results {
        if by_number.insert(result.circuit_number.as_str(), result).is_some() {
            return Err(EngineError::DuplicateCircuitNumber {
                circuit: result.circuit_number.clone(),
            });
        }
    }
    for number in by_number.keys() {
        if !circuits.iter().any(|c| c.circuit_number == *number) {
            warn!("Ignoring results for unknown circuit {}", number);
        }
    }

    let evaluated: Vec<Result<CircuitEvaluation>> = circuits
        .par_iter()
        .map(|circuit| -> Result<CircuitEvaluation> {
            let blank = TestResult::new(circuit.circuit_number.clone());
            let result = by_number
                .get(circuit.circuit_number.as_str())
                .copied()
                .unwrap_or(&blank);
            Ok(CircuitEvaluation {
                circuit_number: circuit.circuit_number.clone(),
                verdicts: evaluate_with(calculator, circuit, result)?,
            })
        })
        .collect();

    let mut evaluations = Vec::with_capacity(evaluated.len());
    let mut failures = Vec::new();
    for result in evaluated {
        match result {
            Ok(evaluation) => evaluations.push(evaluation),
            Err(e) => failures.push(e),
        }
    }
    if !failures.is_empty() {
        return Err(EngineError::ScheduleFailed { failures });
    }

    debug!(
        "{} of {} circuits passed",
        evaluations.iter().filter(|e| e.passed()).count(),
        evaluations.len()
    );
    Ok(evaluations)
}

fn check_unique(circuits: &[CircuitSpec]) -> Result<()> {
    let mut seen = HashSet::new();
    for circuit in circuits {
        if !seen.insert(circuit.circuit_number.as_str()) {
            return Err(EngineError::DuplicateCircuitNumber {
                circuit: circuit.circuit_number.clone(),
            });
        }
    }
    Ok(())
}
