//! Builders for the individual guidance steps.
//!
//! Each builder renders one test from a circuit and its expected values.
//! They assume the expected values were computed from the same circuit.

use crate::calculator::{ExpectedValues, Notice, Ohms, RcdTest, RingEndToEnd};
use crate::circuit::{CircuitSpec, DeviceKind, PhaseType};

use super::types::{AcceptanceCriterion, GuidanceStep, TestKind};

const LOW_RESISTANCE_OHMMETER: &str = "Low-resistance ohmmeter (BS EN 61557-4)";
const INSULATION_TESTER: &str = "Insulation resistance tester (BS EN 61557-2)";
const LOOP_TESTER: &str = "Earth fault loop impedance tester (BS EN 61557-3)";
const RCD_TESTER: &str = "RCD tester (BS EN 61557-6)";
const PHASE_ROTATION_INDICATOR: &str = "Phase rotation indicator (BS EN 61557-7)";
const VOLTAGE_INDICATOR: &str = "Approved voltage indicator and proving unit (GS38)";
const LOCK_OFF_KIT: &str = "Lock-off kit and warning labels";

const ISOLATION_NOTE: &str = "Isolate and prove dead before connecting test leads; re-prove the voltage indicator afterwards";

fn step(test: TestKind, procedure: Vec<String>, acceptance: AcceptanceCriterion, acceptance_text: String) -> GuidanceStep {
    GuidanceStep {
        test,
        name: test.name().to_string(),
        regulation: test.regulation().to_string(),
        procedure,
        acceptance,
        acceptance_text,
        equipment: Vec::new(),
        safety_notes: Vec::new(),
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn is_three_phase(circuit: &CircuitSpec) -> bool {
    circuit.phase_type == Some(PhaseType::Three)
}

fn circuit_label(circuit: &CircuitSpec) -> String {
    if circuit.description.is_empty() {
        format!("circuit {}", circuit.circuit_number)
    } else {
        format!("circuit {} ({})", circuit.circuit_number, circuit.description)
    }
}

fn estimation_notes(expected: &ExpectedValues) -> impl Iterator<Item = String> + '_ {
    expected
        .notices
        .iter()
        .filter(|n| matches!(n, Notice::EstimationRequired { .. }))
        .map(|n| n.to_string())
}

pub(super) fn continuity(circuit: &CircuitSpec, expected: &ExpectedValues, tolerance_ohms: f64) -> GuidanceStep {
    let r1r2 = expected.r1r2;
    let limit = Ohms(r1r2.value.value() + tolerance_ohms);

    let mut procedure = vec![
        format!(
            "Isolate {} at the {} and secure the isolation; prove dead with an approved voltage indicator.",
            circuit_label(circuit),
            circuit.protective_device
        ),
        "Null the test leads of the low-resistance ohmmeter.".to_string(),
    ];
    if circuit.is_ring() {
        procedure.push(
            "Cross-connect the ring at the board (line of one end to CPC of the other, and vice versa) so every point reads the same value."
                .to_string(),
        );
    } else if is_three_phase(circuit) {
        procedure.push(
            "Temporarily link each line conductor (L1, L2, L3) in turn to the CPC at the distribution board.".to_string(),
        );
    } else {
        procedure.push("Temporarily link the line conductor to the CPC at the distribution board.".to_string());
    }
    procedure.push(
        "Measure between line and earth terminals at every point on the circuit and record the highest reading as R1+R2."
            .to_string(),
    );
    if let Some(method) = &circuit.reference_method {
        procedure.push(format!(
            "Cable route is {}; confirm the CPC is continuous at every accessory on the route.",
            method.description()
        ));
    }
    procedure.push(
        "Verify continuity of main protective bonding and any supplementary bonding back to the main earthing terminal."
            .to_string(),
    );
    procedure.push("Remove the temporary link before proceeding.".to_string());

    let basis = if circuit.is_ring() {
        format!("(r1 + r2)/4 for a {} m ring", r1r2.length_m)
    } else {
        format!("{} m run", r1r2.length_m)
    };
    let mut acceptance_text = format!(
        "Highest measured R1+R2 ≤ {} (expected {} for a {}, plus {:.2} Ω tolerance)",
        limit, r1r2.value, basis, tolerance_ohms
    );
    if r1r2.estimated {
        acceptance_text.push_str("; expected value is an estimate, compare against the measured cable length");
    }

    let mut step = step(
        TestKind::ProtectiveConductorContinuity,
        procedure,
        AcceptanceCriterion::MaxResistance {
            expected: r1r2.value,
            limit,
            estimated: r1r2.estimated,
        },
        acceptance_text,
    );
    step.equipment = strings(&[LOW_RESISTANCE_OHMMETER, "Wander lead", "Temporary shorting link", VOLTAGE_INDICATOR, LOCK_OFF_KIT]);
    step.safety_notes.push(ISOLATION_NOTE.to_string());
    step.safety_notes.extend(estimation_notes(expected));
    step
}

pub(super) fn ring_continuity(circuit: &CircuitSpec, ring: &RingEndToEnd) -> GuidanceStep {
    let quarter_ln = (ring.r1.value() + ring.rn.value()) / 4.0;
    let quarter_le = (ring.r1.value() + ring.r2.value()) / 4.0;

    let procedure = vec![
        format!(
            "With {} isolated, identify both ends of the line, neutral and CPC at the board.",
            circuit_label(circuit)
        ),
        "Measure the end-to-end resistance of the line (r1), neutral (rn) and CPC (r2) conductors.".to_string(),
        format!(
            "Cross-connect line and neutral ends and measure L-N at each socket-outlet; readings should be substantially the same, about {:.2} Ω.",
            quarter_ln
        ),
        format!(
            "Cross-connect line and CPC ends and measure L-E at each socket-outlet; the highest reading is R1+R2, about {:.2} Ω.",
            quarter_le
        ),
        "Investigate any socket-outlet reading noticeably higher than the rest; it indicates a spur or a break in the ring."
            .to_string(),
    ];

    let mut acceptance_text = format!(
        "r1 and rn within {} of each other (expected about {} each); r2 about {:.2} × r1 (expected about {}) within {}",
        ring.tolerance, ring.r1, ring.cpc_ratio, ring.r2, ring.tolerance
    );
    if ring.estimated {
        acceptance_text.push_str("; end-to-end values are estimates from a nominal ring length");
    }

    let mut step = step(
        TestKind::RingContinuity,
        procedure,
        AcceptanceCriterion::RingEndToEnd {
            r1: ring.r1,
            rn: ring.rn,
            r2: ring.r2,
            cpc_ratio: ring.cpc_ratio,
            tolerance: ring.tolerance,
            estimated: ring.estimated,
        },
        acceptance_text,
    );
    step.equipment = strings(&[LOW_RESISTANCE_OHMMETER, "Shorting leads or terminal connectors", VOLTAGE_INDICATOR]);
    step.safety_notes.push("Confirm no other circuit shares the ring terminals before disconnecting them".to_string());
    step
}

pub(super) fn insulation(circuit: &CircuitSpec, expected: &ExpectedValues) -> GuidanceStep {
    let requirement = expected.insulation;

    let mut procedure = vec![
        format!(
            "Confirm {} is isolated; disconnect surge protective devices and electronic equipment that could be damaged.",
            circuit_label(circuit)
        ),
        "Remove lamps, unplug equipment and close every switch so all conductors are tested.".to_string(),
        format!("Set the insulation resistance tester to {} V d.c.", requirement.test_voltage_v),
    ];
    if is_three_phase(circuit) {
        procedure.push("Test between each pair of line conductors (L1-L2, L2-L3, L3-L1).".to_string());
        procedure.push("Test each line conductor to neutral, then all live conductors linked together to earth.".to_string());
    } else {
        procedure.push("Test between line and neutral, line and earth, and neutral and earth.".to_string());
    }
    if circuit.is_rcd_protected() {
        procedure.push(
            "Where the RCD electronics cannot be disconnected, link line and neutral and test to earth only.".to_string(),
        );
    }
    procedure.push("Hold each test until the reading settles and record the lowest value.".to_string());

    let acceptance_text = format!(
        "Every reading ≥ {} at {} V d.c. (Table 64); investigate any reading below 2 MΩ",
        requirement.minimum, requirement.test_voltage_v
    );

    let mut step = step(
        TestKind::InsulationResistance,
        procedure,
        AcceptanceCriterion::MinInsulation {
            minimum: requirement.minimum,
            test_voltage_v: requirement.test_voltage_v,
        },
        acceptance_text,
    );
    step.equipment = strings(&[INSULATION_TESTER, VOLTAGE_INDICATOR, LOCK_OFF_KIT]);
    step.safety_notes = vec![
        ISOLATION_NOTE.to_string(),
        format!(
            "The {} V test voltage can damage connected electronic equipment; disconnect it first",
            requirement.test_voltage_v
        ),
        "Allow capacitive circuits to discharge before touching conductors".to_string(),
    ];
    step
}

pub(super) fn polarity(circuit: &CircuitSpec) -> GuidanceStep {
    let three_phase = is_three_phase(circuit);

    let mut procedure = vec![
        format!(
            "With {} isolated and the R1+R2 link still fitted, confirm every single-pole switch and protective device is in the line conductor only.",
            circuit_label(circuit)
        ),
        "Confirm centre-contact bayonet and Edison screw lampholders have the outer contact connected to neutral.".to_string(),
        "Confirm socket-outlets and similar accessories are correctly connected.".to_string(),
    ];
    if three_phase {
        procedure.push(
            "Confirm phase sequence L1-L2-L3 at the board with a phase rotation indicator (Regulation 643.9).".to_string(),
        );
    }

    let acceptance_text = if three_phase {
        "Correct or incorrect: switching and protective devices in the line conductors only, and phase sequence L1-L2-L3"
            .to_string()
    } else {
        "Correct or incorrect: switching and protective devices in the line conductor only".to_string()
    };

    let mut step = step(TestKind::Polarity, procedure, AcceptanceCriterion::Binary, acceptance_text);
    step.equipment = strings(&[LOW_RESISTANCE_OHMMETER, "Wander lead"]);
    if three_phase {
        step.equipment.push(PHASE_ROTATION_INDICATOR.to_string());
    }
    step
}

pub(super) fn earth_fault_loop(circuit: &CircuitSpec, expected: &ExpectedValues) -> GuidanceStep {
    let mut procedure = vec![
        format!(
            "Re-energise {} only after every dead test is satisfactory.",
            circuit_label(circuit)
        ),
        "Measure line-earth loop impedance at the point furthest from the board.".to_string(),
    ];
    if is_three_phase(circuit) {
        procedure.push("Repeat for each line conductor (L1, L2, L3) and record the highest value.".to_string());
    }
    if circuit.is_rcd_protected() {
        procedure.push("Use the tester's no-trip loop mode so the RCD does not operate.".to_string());
    }
    match expected.predicted_zs {
        Some(predicted) => procedure.push(format!(
            "Compare with the predicted Zs of {} from Ze + (R1+R2) at operating temperature.",
            predicted
        )),
        None => procedure.push(
            "Where a live test is impracticable, Zs may be derived as Ze + (R1+R2).".to_string(),
        ),
    }

    let acceptance_text = format!(
        "Measured Zs ≤ {} (tabulated maximum {} for {}, corrected for conductor temperature at test)",
        expected.max_measured_zs, expected.max_zs, circuit.protective_device
    );

    let mut step = step(
        TestKind::EarthFaultLoopImpedance,
        procedure,
        AcceptanceCriterion::MaxImpedance {
            limit: expected.max_measured_zs,
            tabulated: expected.max_zs,
        },
        acceptance_text,
    );
    if let DeviceKind::Fuse(_) = circuit.protective_device.kind {
        step.regulation = "Regulation 643.7.3, Table 41.2".to_string();
    }
    step.equipment = strings(&[LOOP_TESTER, "GS38 test probes and leads"]);
    step.safety_notes
        .push("Live test: keep fingers behind probe barriers and confirm the circuit is safe to energise".to_string());
    step.safety_notes.extend(
        expected
            .notices
            .iter()
            .filter(|n| matches!(n, Notice::PredictedZsExceedsLimit { .. }))
            .map(|n| n.to_string()),
    );
    step
}

pub(super) fn rcd_operation(circuit: &CircuitSpec, expected: &ExpectedValues, rcd: &RcdTest) -> GuidanceStep {
    let mut procedure = vec![
        format!(
            "Disconnect the load on {} so earth leakage from equipment does not affect the result.",
            circuit_label(circuit)
        ),
        format!(
            "Set the RCD tester to {} mA, {}.",
            rcd.residual_current_ma, rcd.rcd_type
        ),
    ];
    for band in &rcd.bands {
        let current = band.test_current_ma(rcd.residual_current_ma);
        if band.must_trip {
            procedure.push(format!(
                "Apply {} mA at 0° and 180° and record the longer trip time.",
                current
            ));
        } else {
            procedure.push(format!("Apply {} mA and confirm the device does not trip.", current));
        }
    }
    procedure.push("Operate the integral test button to confirm mechanical operation.".to_string());

    let acceptance_text = rcd
        .bands
        .iter()
        .map(|band| band.describe(rcd.residual_current_ma))
        .collect::<Vec<_>>()
        .join("; ");

    let mut step = step(
        TestKind::RcdOperation,
        procedure,
        AcceptanceCriterion::TripTime {
            residual_current_ma: rcd.residual_current_ma,
            rcd_type: rcd.rcd_type,
            bands: rcd.bands.clone(),
        },
        acceptance_text,
    );
    step.equipment = vec![RCD_TESTER.to_string()];
    step.safety_notes
        .push("Live test: warn occupants that supply to the circuit will be interrupted".to_string());
    step.safety_notes.extend(
        expected
            .notices
            .iter()
            .filter(|n| matches!(n, Notice::AssumedResidualCurrent { .. }))
            .map(|n| n.to_string()),
    );
    step
}

pub(super) fn functional(circuit: &CircuitSpec, expected: &ExpectedValues) -> GuidanceStep {
    let mut procedure = vec![format!(
        "Operate the switchgear, controls and interlocks on {} and confirm each works as intended.",
        circuit_label(circuit)
    )];
    if circuit.is_rcd_protected() {
        procedure.push("Confirm the RCD trips on its integral test button.".to_string());
    }
    procedure.push("Confirm equipment is properly mounted, adjusted and labelled.".to_string());

    let mut step = step(
        TestKind::Functional,
        procedure,
        AcceptanceCriterion::Qualitative,
        "All switchgear, controls and interlocks operate as intended".to_string(),
    );
    step.equipment = strings(&["Circuit chart for the distribution board", "Plug-in test lamp or socket tester"]);
    step.safety_notes.extend(
        expected
            .notices
            .iter()
            .filter(|n| matches!(n, Notice::AdditionalProtectionRecommended))
            .map(|n| n.to_string()),
    );
    step
}
