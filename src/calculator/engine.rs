//! Expected-value calculation for a single circuit.
//!
//! The `Calculator` maps a `CircuitSpec` onto the reference tables. It never
//! guesses: a value is either looked up exactly, computed from recorded
//! data, or computed from a nominal length and flagged as an estimate.

use tracing::{debug, warn};

use super::tables::ReferenceTables;
use super::types::*;
use crate::circuit::{CableType, CircuitSpec, DeviceKind, TripCurve};
use crate::error::{EngineError, Result};

/// Circuit fields after validation against the tables.
#[derive(Debug, Clone)]
struct CheckedCircuit {
    max_zs: Ohms,
    live_mohm_per_m: f64,
    cpc_mohm_per_m: f64,
    length_m: Option<f64>,
    ze_ohms: Option<f64>,
}

/// Computes expected test values from a fixed set of reference tables.
///
/// Holds no mutable state; share one instance freely between threads.
#[derive(Debug, Clone)]
pub struct Calculator {
    tables: ReferenceTables,
}

impl Calculator {
    /// Create a calculator over the given tables.
    ///
    /// # Arguments
    /// * `tables` - Reference tables (typically from `default_tables()` or `load_tables()`)
    pub fn new(tables: ReferenceTables) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &ReferenceTables {
        &self.tables
    }

    /// Maximum earth fault loop impedance for the circuit's device (Table 41.3
    /// for circuit-breakers, Table 41.2 for fuses).
    ///
    /// Independent of cable length. Fails with `UnsupportedDeviceKind` when
    /// the device family, curve, fuse standard or rating is not tabulated.
    pub fn compute_max_zs(&self, circuit: &CircuitSpec) -> Result<Ohms> {
        Ok(self.check(circuit)?.max_zs)
    }

    /// Expected R1+R2 at test temperature.
    ///
    /// Without a recorded length the nominal length from the tables is used
    /// and the result is returned with `estimated: true`.
    pub fn compute_expected_r1r2(&self, circuit: &CircuitSpec) -> Result<R1R2Estimate> {
        let checked = self.check(circuit)?;
        Ok(self.r1r2(circuit, &checked))
    }

    /// Minimum acceptable insulation resistance for the circuit's voltage band.
    pub fn compute_min_insulation_resistance(&self, circuit: &CircuitSpec) -> Megaohms {
        self.tables.insulation(circuit.voltage_band).minimum
    }

    /// Test voltage and minimum insulation resistance (Table 64).
    pub fn compute_insulation_requirement(&self, circuit: &CircuitSpec) -> InsulationRequirement {
        self.tables.insulation(circuit.voltage_band)
    }

    /// Expected end-to-end resistances, or `None` for a radial circuit.
    pub fn compute_ring_end_to_end(&self, circuit: &CircuitSpec) -> Result<Option<RingEndToEnd>> {
        let checked = self.check(circuit)?;
        Ok(self.ring_end_to_end(circuit, &checked))
    }

    /// RCD test parameters, or `None` when the circuit is not RCD-protected.
    pub fn compute_rcd_test(&self, circuit: &CircuitSpec) -> Result<Option<RcdTest>> {
        self.check(circuit)?;
        Ok(self.rcd_test(circuit))
    }

    /// Every expected value for the circuit, with non-fatal notices.
    pub fn compute_expected_values(&self, circuit: &CircuitSpec) -> Result<ExpectedValues> {
        let checked = self.check(circuit)?;
        let mut notices = Vec::new();

        let r1r2 = self.r1r2(circuit, &checked);
        if r1r2.estimated {
            notices.push(Notice::EstimationRequired {
                field: "R1+R2".to_string(),
                assumed_length_m: r1r2.length_m,
            });
        }

        let ring = self.ring_end_to_end(circuit, &checked);

        let rcd = self.rcd_test(circuit);
        if let Some(test) = rcd.as_ref().filter(|t| t.assumed_rating) {
            notices.push(Notice::AssumedResidualCurrent {
                residual_current_ma: test.residual_current_ma,
            });
        }
        if circuit.requires_additional_protection() && !circuit.is_rcd_protected() {
            notices.push(Notice::AdditionalProtectionRecommended);
        }

        let predicted_zs = checked.ze_ohms.map(|ze| {
            let multiplier = self.tables.temperature_multiplier(circuit.insulation);
            Ohms(ze + r1r2.value.value() * multiplier)
        });
        if let Some(predicted) = predicted_zs.filter(|p| p.value() > checked.max_zs.value()) {
            warn!(
                "Circuit {}: predicted Zs {} exceeds maximum {}",
                circuit.circuit_number, predicted, checked.max_zs
            );
            notices.push(Notice::PredictedZsExceedsLimit {
                predicted,
                limit: checked.max_zs,
            });
        }

        let max_measured_zs = Ohms(checked.max_zs.value() * self.tables.zs_correction_factor());

        debug!(
            "Circuit {}: max Zs {} (measured {}), R1+R2 {}{}, {} notice(s)",
            circuit.circuit_number,
            checked.max_zs,
            max_measured_zs,
            r1r2.value,
            if r1r2.estimated { " (estimated)" } else { "" },
            notices.len()
        );

        Ok(ExpectedValues {
            circuit_number: circuit.circuit_number.clone(),
            max_zs: checked.max_zs,
            max_measured_zs,
            r1r2,
            ring,
            insulation: self.compute_insulation_requirement(circuit),
            rcd,
            predicted_zs,
            notices,
        })
    }

    /// Validate a circuit against the tables.
    ///
    /// Device problems are reported before conductor problems so that an
    /// unrecognised device fails every call the same way.
    fn check(&self, circuit: &CircuitSpec) -> Result<CheckedCircuit> {
        let number = &circuit.circuit_number;
        let device = &circuit.protective_device;

        let unsupported_device = || EngineError::UnsupportedDeviceKind {
            circuit: number.clone(),
            device: device.to_string(),
        };

        let rating = || {
            device
                .rating_amps
                .ok_or_else(|| missing(number, "protective_device.rating_amps"))
        };
        let max_zs = match &device.kind {
            DeviceKind::Other(_) => return Err(unsupported_device()),
            DeviceKind::Fuse(standard) => self
                .tables
                .fuse_max_zs(*standard, rating()?)
                .ok_or_else(unsupported_device)?,
            DeviceKind::Mcb | DeviceKind::Rcbo => {
                let curve = device.curve.as_ref().ok_or_else(|| missing(number, "protective_device.curve"))?;
                if let TripCurve::Other(_) = curve {
                    return Err(unsupported_device());
                }
                self.tables
                    .max_zs(curve, rating()?)
                    .ok_or_else(unsupported_device)?
            }
        };

        if let Some(residual) = circuit.rcd.as_ref().and_then(|r| r.residual_current_ma) {
            if !self.tables.is_catalogued_residual(residual) {
                return Err(EngineError::UnsupportedDeviceKind {
                    circuit: number.clone(),
                    device: format!("RCD {} mA", residual),
                });
            }
        }

        circuit.phase_type.ok_or_else(|| missing(number, "phase_type"))?;

        let live_size_mm2 = circuit
            .live_size_mm2
            .ok_or_else(|| missing(number, "live_size_mm2"))?;
        let live_mohm_per_m = self
            .tables
            .resistance_per_metre(circuit.conductor_material, live_size_mm2)
            .ok_or_else(|| unsupported_size(number, "live_size_mm2", live_size_mm2))?;

        let cpc_size_mm2 = match (circuit.cpc_size_mm2, &circuit.cable_type) {
            (Some(size), _) => size,
            (None, Some(CableType::TwinAndEarth)) => self
                .tables
                .twin_and_earth_cpc(live_size_mm2)
                .ok_or_else(|| unsupported_size(number, "live_size_mm2", live_size_mm2))?,
            (None, _) => return Err(missing(number, "cpc_size_mm2")),
        };
        let cpc_mohm_per_m = self
            .tables
            .resistance_per_metre(circuit.conductor_material, cpc_size_mm2)
            .ok_or_else(|| unsupported_size(number, "cpc_size_mm2", cpc_size_mm2))?;

        let length_m = circuit.length_m;
        if let Some(length) = length_m.filter(|l| !l.is_finite() || *l <= 0.0) {
            return Err(invalid(number, "length_m", length));
        }
        let ze_ohms = circuit.ze_ohms;
        if let Some(ze) = ze_ohms.filter(|z| !z.is_finite() || *z < 0.0) {
            return Err(invalid(number, "ze_ohms", ze));
        }

        Ok(CheckedCircuit {
            max_zs,
            live_mohm_per_m,
            cpc_mohm_per_m,
            length_m,
            ze_ohms,
        })
    }

    fn r1r2(&self, circuit: &CircuitSpec, checked: &CheckedCircuit) -> R1R2Estimate {
        let ring = circuit.is_ring();
        let (length_m, estimated) = match checked.length_m {
            Some(length) => (length, false),
            None => (self.tables.nominal_length_m(ring), true),
        };

        let loop_ohms = (checked.live_mohm_per_m + checked.cpc_mohm_per_m) * length_m / 1000.0;
        // Ring: r1 and r2 in parallel halves give (r1 + r2) / 4 at the mid-point.
        let value = if ring { loop_ohms / 4.0 } else { loop_ohms };

        R1R2Estimate {
            value: Ohms(value),
            estimated,
            length_m,
        }
    }

    fn ring_end_to_end(&self, circuit: &CircuitSpec, checked: &CheckedCircuit) -> Option<RingEndToEnd> {
        if !circuit.is_ring() {
            return None;
        }
        let (length_m, estimated) = match checked.length_m {
            Some(length) => (length, false),
            None => (self.tables.nominal_length_m(true), true),
        };
        let r1 = checked.live_mohm_per_m * length_m / 1000.0;
        let r2 = checked.cpc_mohm_per_m * length_m / 1000.0;

        Some(RingEndToEnd {
            r1: Ohms(r1),
            rn: Ohms(r1),
            r2: Ohms(r2),
            cpc_ratio: checked.cpc_mohm_per_m / checked.live_mohm_per_m,
            tolerance: Ohms(self.tables.tolerances().ring_end_to_end_ohms),
            estimated,
        })
    }

    fn rcd_test(&self, circuit: &CircuitSpec) -> Option<RcdTest> {
        if !circuit.is_rcd_protected() {
            return None;
        }
        let rcd_type = circuit.rcd.as_ref().map(|r| r.rcd_type).unwrap_or_default();
        let (residual_current_ma, assumed_rating) =
            match circuit.rcd.as_ref().and_then(|r| r.residual_current_ma) {
                Some(residual) => (residual, false),
                None => (self.tables.assumed_rcbo_residual_ma(), true),
            };

        Some(RcdTest {
            residual_current_ma,
            rcd_type,
            assumed_rating,
            bands: self.tables.rcd_bands(rcd_type.is_selective(), residual_current_ma),
        })
    }
}

fn missing(circuit: &str, field: &'static str) -> EngineError {
    EngineError::MissingRequiredField {
        circuit: circuit.to_string(),
        field,
    }
}

fn unsupported_size(circuit: &str, field: &'static str, size_mm2: f64) -> EngineError {
    EngineError::UnsupportedConductorSize {
        circuit: circuit.to_string(),
        field,
        size_mm2,
    }
}

fn invalid(circuit: &str, field: &'static str, value: f64) -> EngineError {
    EngineError::InvalidFieldValue {
        circuit: circuit.to_string(),
        field,
        value,
    }
}
