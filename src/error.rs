use thiserror::Error;

/// Fatal conditions that abort computation for a circuit.
///
/// Every variant carries the circuit number so a caller building a whole
/// schedule can point at the offending row.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    #[error("Circuit {circuit}: protective device '{device}' is not in the reference tables")]
    UnsupportedDeviceKind { circuit: String, device: String },

    #[error("Circuit {circuit}: {field} of {size_mm2} mm² is not a catalogued conductor size")]
    UnsupportedConductorSize {
        circuit: String,
        field: &'static str,
        size_mm2: f64,
    },

    #[error("Circuit {circuit}: required field '{field}' is missing")]
    MissingRequiredField { circuit: String, field: &'static str },

    #[error("Circuit {circuit}: {field} has invalid value {value}")]
    InvalidFieldValue {
        circuit: String,
        field: &'static str,
        value: f64,
    },

    #[error("Circuit number '{circuit}' appears more than once in the schedule")]
    DuplicateCircuitNumber { circuit: String },

    #[error("Circuit {circuit}: results were recorded for circuit {result_circuit}")]
    ResultCircuitMismatch { circuit: String, result_circuit: String },

    #[error("{} circuit(s) failed; schedule not produced", failures.len())]
    ScheduleFailed { failures: Vec<EngineError> },
}

impl EngineError {
    /// Circuit number the error refers to, if it refers to a single circuit.
    pub fn circuit(&self) -> Option<&str> {
        match self {
            EngineError::UnsupportedDeviceKind { circuit, .. }
            | EngineError::UnsupportedConductorSize { circuit, .. }
            | EngineError::MissingRequiredField { circuit, .. }
            | EngineError::InvalidFieldValue { circuit, .. }
            | EngineError::DuplicateCircuitNumber { circuit }
            | EngineError::ResultCircuitMismatch { circuit, .. } => Some(circuit),
            EngineError::ScheduleFailed { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_circuit() {
        let err = EngineError::UnsupportedDeviceKind {
            circuit: "4".to_string(),
            device: "MCB Z32".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Circuit 4: protective device 'MCB Z32' is not in the reference tables"
        );
        assert_eq!(err.circuit(), Some("4"));
    }

    #[test]
    fn test_schedule_failure_counts_failures() {
        let err = EngineError::ScheduleFailed {
            failures: vec![
                EngineError::MissingRequiredField {
                    circuit: "1".to_string(),
                    field: "phase_type",
                },
                EngineError::MissingRequiredField {
                    circuit: "2".to_string(),
                    field: "live_size_mm2",
                },
            ],
        };
        assert!(err.to_string().starts_with("2 circuit(s) failed"));
        assert_eq!(err.circuit(), None);
    }
}
