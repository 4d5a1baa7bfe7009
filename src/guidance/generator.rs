//! Guidance generation engine.
//!
//! Sequences the BS 7671 Part 6 tests for a circuit and renders each one
//! with the circuit's expected values.

use tracing::debug;

use super::steps;
use super::types::{CircuitGuidance, GuidanceStep};
use crate::calculator::{Calculator, ExpectedValues};
use crate::circuit::CircuitSpec;
use crate::error::Result;

/// Generates testing guidance over a calculator's reference tables.
///
/// Stateless between calls; the same circuit always yields the same steps.
#[derive(Debug, Clone, Copy)]
pub struct GuidanceGenerator<'c> {
    calculator: &'c Calculator,
}

impl<'c> GuidanceGenerator<'c> {
    pub fn new(calculator: &'c Calculator) -> Self {
        Self { calculator }
    }

    pub fn calculator(&self) -> &'c Calculator {
        self.calculator
    }

    /// Ordered guidance steps for one circuit.
    ///
    /// Fails with the calculator's error when any expected value cannot be
    /// computed; never returns a partial sequence.
    pub fn generate(&self, circuit: &CircuitSpec) -> Result<Vec<GuidanceStep>> {
        Ok(self.generate_circuit_guidance(circuit)?.steps)
    }

    /// Steps plus the expected values they were rendered from.
    pub fn generate_circuit_guidance(&self, circuit: &CircuitSpec) -> Result<CircuitGuidance> {
        let expected = self.calculator.compute_expected_values(circuit)?;
        let steps = self.build_steps(circuit, &expected);

        debug!(
            "Circuit {}: generated {} guidance steps",
            circuit.circuit_number,
            steps.len()
        );

        Ok(CircuitGuidance {
            circuit_number: circuit.circuit_number.clone(),
            description: circuit.description.clone(),
            expected,
            steps,
        })
    }

    /// Assemble steps in canonical order, skipping tests that do not apply.
    fn build_steps(&self, circuit: &CircuitSpec, expected: &ExpectedValues) -> Vec<GuidanceStep> {
        let tolerance = self.calculator.tables().tolerances().r1r2_ohms;

        let mut result = vec![steps::continuity(circuit, expected, tolerance)];
        if let Some(ring) = &expected.ring {
            result.push(steps::ring_continuity(circuit, ring));
        }
        result.push(steps::insulation(circuit, expected));
        result.push(steps::polarity(circuit));
        result.push(steps::earth_fault_loop(circuit, expected));
        if let Some(rcd) = &expected.rcd {
            result.push(steps::rcd_operation(circuit, expected, rcd));
        }
        result.push(steps::functional(circuit, expected));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::{default_tables, Notice, Ohms};
    use crate::circuit::{
        FuseStandard, PhaseType, ProtectiveDevice, RcdProtection, RcdType, Topology, TripCurve, VoltageBand,
    };
    use crate::error::EngineError;
    use crate::guidance::{AcceptanceCriterion, TestKind};

    fn make_calculator() -> Calculator {
        Calculator::new(default_tables())
    }

    fn radial_b32() -> CircuitSpec {
        let mut circuit = CircuitSpec::new("1", ProtectiveDevice::mcb(TripCurve::B, 32));
        circuit.description = "Cooker".to_string();
        circuit.phase_type = Some(PhaseType::Single);
        circuit.live_size_mm2 = Some(2.5);
        circuit.cpc_size_mm2 = Some(1.5);
        circuit
    }

    fn kinds(steps: &[GuidanceStep]) -> Vec<TestKind> {
        steps.iter().map(|s| s.test).collect()
    }

    #[test]
    fn test_radial_mcb_has_five_steps() {
        let calculator = make_calculator();
        let steps = GuidanceGenerator::new(&calculator).generate(&radial_b32()).unwrap();

        assert_eq!(
            kinds(&steps),
            vec![
                TestKind::ProtectiveConductorContinuity,
                TestKind::InsulationResistance,
                TestKind::Polarity,
                TestKind::EarthFaultLoopImpedance,
                TestKind::Functional,
            ]
        );
        let zs = &steps[3];
        assert!(zs.acceptance_text.contains("1.37 Ω"), "got: {}", zs.acceptance_text);
        assert!(zs.acceptance_text.contains("1.10 Ω"), "got: {}", zs.acceptance_text);
    }

    #[test]
    fn test_rcbo_adds_rcd_step_before_functional() {
        let calculator = make_calculator();
        let mut circuit = radial_b32();
        circuit.protective_device = ProtectiveDevice::rcbo(TripCurve::B, 32);
        let steps = GuidanceGenerator::new(&calculator).generate(&circuit).unwrap();

        assert_eq!(steps.len(), 6);
        assert_eq!(steps[4].test, TestKind::RcdOperation);
        assert_eq!(steps[5].test, TestKind::Functional);

        let rcd = &steps[4];
        assert!(rcd.acceptance_text.contains("300 ms"));
        assert!(rcd.acceptance_text.contains("40 ms"));
        assert!(
            rcd.safety_notes.iter().any(|n| n.contains("30 mA assumed")),
            "assumed rating must be visible: {:?}",
            rcd.safety_notes
        );
    }

    #[test]
    fn test_ring_adds_ring_step_second() {
        let calculator = make_calculator();
        let mut circuit = radial_b32();
        circuit.topology = Some(Topology::Ring);
        circuit.length_m = Some(50.0);
        circuit.rcd = Some(RcdProtection {
            residual_current_ma: Some(30),
            rcd_type: RcdType::A,
        });
        let steps = GuidanceGenerator::new(&calculator).generate(&circuit).unwrap();

        assert_eq!(steps.len(), 7);
        assert_eq!(kinds(&steps), TestKind::CANONICAL_ORDER.to_vec());
        assert!(matches!(steps[1].acceptance, AcceptanceCriterion::RingEndToEnd { .. }));
    }

    #[test]
    fn test_estimated_values_are_flagged_in_text() {
        let calculator = make_calculator();
        let steps = GuidanceGenerator::new(&calculator).generate(&radial_b32()).unwrap();

        let continuity = &steps[0];
        assert!(continuity.acceptance_text.contains("estimate"));
        assert!(matches!(
            continuity.acceptance,
            AcceptanceCriterion::MaxResistance { estimated: true, .. }
        ));
        assert!(continuity.safety_notes.iter().any(|n| n.contains("nominal 20 m")));
    }

    #[test]
    fn test_exact_values_not_flagged() {
        let calculator = make_calculator();
        let mut circuit = radial_b32();
        circuit.length_m = Some(20.0);
        let steps = GuidanceGenerator::new(&calculator).generate(&circuit).unwrap();

        let continuity = &steps[0];
        assert!(!continuity.acceptance_text.contains("estimate"));
        match &continuity.acceptance {
            AcceptanceCriterion::MaxResistance { expected, limit, estimated } => {
                assert!(!estimated);
                assert!((expected.value() - 0.3902).abs() < 1e-9);
                assert!((limit.value() - 0.4402).abs() < 1e-9);
            }
            other => panic!("unexpected criterion {:?}", other),
        }
    }

    #[test]
    fn test_selv_insulation_text() {
        let calculator = make_calculator();
        let mut circuit = radial_b32();
        circuit.voltage_band = VoltageBand::SelvPelv;
        let steps = GuidanceGenerator::new(&calculator).generate(&circuit).unwrap();

        let insulation = &steps[1];
        assert!(insulation.acceptance_text.contains("0.5 MΩ"));
        assert!(insulation.acceptance_text.contains("250 V"));
    }

    #[test]
    fn test_three_phase_confirms_phase_sequence() {
        let calculator = make_calculator();
        let mut circuit = radial_b32();
        circuit.phase_type = Some(PhaseType::Three);
        let steps = GuidanceGenerator::new(&calculator).generate(&circuit).unwrap();

        let polarity = steps.iter().find(|s| s.test == TestKind::Polarity).unwrap();
        assert!(polarity.procedure.iter().any(|line| line.contains("phase rotation")));
        assert!(polarity.equipment.iter().any(|e| e.contains("61557-7")));
    }

    #[test]
    fn test_every_step_has_equipment_and_regulation() {
        let calculator = make_calculator();
        let mut circuit = radial_b32();
        circuit.protective_device = ProtectiveDevice::rcbo(TripCurve::C, 20);
        circuit.topology = Some(Topology::Ring);
        for step in GuidanceGenerator::new(&calculator).generate(&circuit).unwrap() {
            assert!(!step.equipment.is_empty(), "{} has no equipment", step.name);
            assert!(step.regulation.starts_with("Regulation 643"), "{}", step.regulation);
            assert!(!step.procedure.is_empty());
        }
    }

    #[test]
    fn test_predicted_zs_notice_in_zs_step() {
        let calculator = make_calculator();
        let mut circuit = radial_b32();
        circuit.length_m = Some(40.0);
        circuit.ze_ohms = Some(0.8);
        let guidance = GuidanceGenerator::new(&calculator)
            .generate_circuit_guidance(&circuit)
            .unwrap();

        assert!(guidance
            .expected
            .notices
            .iter()
            .any(|n| matches!(n, Notice::PredictedZsExceedsLimit { limit: Ohms(l), .. } if *l == 1.37)));
        let zs = &guidance.steps[3];
        assert!(zs.safety_notes.iter().any(|n| n.contains("exceeds")));
    }

    #[test]
    fn test_unsupported_curve_yields_no_steps() {
        let calculator = make_calculator();
        let mut circuit = radial_b32();
        circuit.protective_device.curve = Some(TripCurve::from_label("Z"));
        let err = GuidanceGenerator::new(&calculator).generate(&circuit).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedDeviceKind { .. }));
    }

    #[test]
    fn test_fuse_zs_step_cites_table_41_2() {
        let calculator = make_calculator();
        let mut circuit = radial_b32();
        circuit.protective_device = ProtectiveDevice::fuse(FuseStandard::Bs88_3, 32);
        let steps = GuidanceGenerator::new(&calculator).generate(&circuit).unwrap();

        assert_eq!(steps.len(), 5, "a fuse adds no RCD step");
        let zs = &steps[3];
        assert_eq!(zs.test, TestKind::EarthFaultLoopImpedance);
        assert_eq!(zs.regulation, "Regulation 643.7.3, Table 41.2");
        assert!(zs.acceptance_text.contains("0.85 Ω for BS 88-3 fuse 32A"), "got: {}", zs.acceptance_text);
        assert!(zs.acceptance_text.contains("0.68 Ω"), "got: {}", zs.acceptance_text);
    }

    #[test]
    fn test_generation_is_deterministic() {
        let calculator = make_calculator();
        let generator = GuidanceGenerator::new(&calculator);
        let circuit = radial_b32();
        assert_eq!(generator.generate(&circuit).unwrap(), generator.generate(&circuit).unwrap());
    }
}
