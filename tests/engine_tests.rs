use std::io::Write;
use std::path::PathBuf;

use eic_engine::calculator::{default_calculator, load_tables, Calculator, Notice};
use eic_engine::circuit::{CircuitSpec, PhaseType, ProtectiveDevice, TripCurve};
use eic_engine::evaluation::{Outcome, TestResult};
use eic_engine::guidance::TestKind;
use eic_engine::schedule::{build_schedule, evaluate_schedule, Schedule};
use eic_engine::{compute_max_zs, generate_testing_guidance, EngineError, Ohms};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn load_schedule() -> Schedule {
    let content = std::fs::read_to_string(fixture_path("schedule.json")).expect("Failed to read schedule fixture");
    serde_json::from_str(&content).expect("Failed to parse schedule fixture")
}

fn load_results() -> Vec<TestResult> {
    let content = std::fs::read_to_string(fixture_path("results.json")).expect("Failed to read results fixture");
    serde_json::from_str(&content).expect("Failed to parse results fixture")
}

fn circuit(schedule: &Schedule, number: &str) -> CircuitSpec {
    schedule
        .circuits
        .iter()
        .find(|c| c.circuit_number == number)
        .cloned()
        .unwrap_or_else(|| panic!("Circuit {} missing from fixture", number))
}

#[test]
fn test_fixture_schedule_builds_in_order() {
    let schedule = load_schedule();
    let report = build_schedule(&schedule.circuits).expect("Fixture schedule should build");

    let numbers: Vec<&str> = report.circuits.iter().map(|c| c.circuit_number.as_str()).collect();
    assert_eq!(numbers, vec!["1", "2", "3", "4", "5", "6", "7"]);
    assert_eq!(report.estimated_count(), 1, "Only the immersion circuit lacks a length");
}

#[test]
fn test_b32_radial_scenario() {
    let mut circuit = CircuitSpec::new("1", ProtectiveDevice::mcb(TripCurve::B, 32));
    circuit.phase_type = Some(PhaseType::Single);
    circuit.live_size_mm2 = Some(2.5);
    circuit.cpc_size_mm2 = Some(1.5);

    assert_eq!(compute_max_zs(&circuit).unwrap(), Ohms(1.37));

    let steps = generate_testing_guidance(&circuit).unwrap();
    assert_eq!(steps.len(), 5);
    let zs = steps
        .iter()
        .find(|s| s.test == TestKind::EarthFaultLoopImpedance)
        .expect("Zs step present");
    assert!(zs.acceptance_text.contains("1.37 Ω"), "Tabulated maximum shown: {}", zs.acceptance_text);
}

#[test]
fn test_ring_fixture_uses_quarter_rule() {
    let schedule = load_schedule();
    let ring = circuit(&schedule, "2");
    let expected = default_calculator().compute_expected_values(&ring).unwrap();

    // (7.41 + 12.10) mΩ/m x 45 m / 4, CPC inferred from twin and earth
    assert!((expected.r1r2.value.value() - 19.51 * 45.0 / 1000.0 / 4.0).abs() < 1e-9);
    let end_to_end = expected.ring.expect("Ring values present");
    assert!((end_to_end.r1.value() - 0.33345).abs() < 1e-9);

    let steps = generate_testing_guidance(&ring).unwrap();
    let kinds: Vec<TestKind> = steps.iter().map(|s| s.test).collect();
    assert_eq!(kinds, TestKind::CANONICAL_ORDER.to_vec());
}

#[test]
fn test_estimated_circuit_is_flagged() {
    let schedule = load_schedule();
    let expected = default_calculator()
        .compute_expected_values(&circuit(&schedule, "5"))
        .unwrap();

    assert!(expected.r1r2.estimated);
    assert!(expected.has_estimates());
    assert!(expected.notices.contains(&Notice::EstimationRequired {
        field: "R1+R2".to_string(),
        assumed_length_m: 20.0,
    }));
}

#[test]
fn test_rcbo_without_rating_assumes_30ma() {
    let schedule = load_schedule();
    let garden = circuit(&schedule, "6");
    let steps = generate_testing_guidance(&garden).unwrap();

    let rcd = steps
        .iter()
        .find(|s| s.test == TestKind::RcdOperation)
        .expect("RCBO circuit has an RCD step");
    assert!(rcd.acceptance_text.contains("150 mA"), "{}", rcd.acceptance_text);
    assert!(rcd.safety_notes.iter().any(|n| n.contains("assumed")));
}

#[test]
fn test_three_phase_fixture() {
    let schedule = load_schedule();
    let steps = generate_testing_guidance(&circuit(&schedule, "7")).unwrap();
    let insulation = steps
        .iter()
        .find(|s| s.test == TestKind::InsulationResistance)
        .unwrap();
    assert!(insulation.procedure.iter().any(|line| line.contains("L1-L2")));
}

#[test]
fn test_fixture_results_evaluation() {
    let schedule = load_schedule();
    let results = load_results();
    let evaluations = evaluate_schedule(default_calculator(), &schedule.circuits, &results).unwrap();

    assert_eq!(evaluations.len(), 7);
    for number in ["1", "2", "3"] {
        let evaluation = evaluations.iter().find(|e| e.circuit_number == number).unwrap();
        assert!(evaluation.passed(), "Circuit {} should pass: {:?}", number, evaluation.verdicts);
    }

    let shower = evaluations.iter().find(|e| e.circuit_number == "4").unwrap();
    let failures: Vec<TestKind> = shower.failures().map(|v| v.test).collect();
    assert_eq!(failures, vec![TestKind::EarthFaultLoopImpedance]);

    let immersion = evaluations.iter().find(|e| e.circuit_number == "5").unwrap();
    assert!(immersion.verdicts.iter().all(|v| v.outcome == Outcome::NotRecorded));
}

#[test]
fn test_unknown_curve_fails_schedule() {
    let mut schedule = load_schedule();
    schedule.circuits[2].protective_device.curve = Some(TripCurve::from_label("Z"));

    match build_schedule(&schedule.circuits) {
        Err(EngineError::ScheduleFailed { failures }) => {
            assert_eq!(failures.len(), 1);
            assert!(matches!(
                &failures[0],
                EngineError::UnsupportedDeviceKind { circuit, .. } if circuit == "3"
            ));
        }
        other => panic!("Expected ScheduleFailed, got {:?}", other),
    }
}

#[test]
fn test_custom_tables_change_nominal_length() {
    let embedded = std::fs::read_to_string(
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config").join("reference_tables.toml"),
    )
    .expect("Failed to read embedded tables");
    let amended = embedded.replace("nominal_radial_length_m = 20.0", "nominal_radial_length_m = 30.0");
    assert_ne!(embedded, amended, "Replacement should apply");

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(amended.as_bytes()).unwrap();
    let calculator = Calculator::new(load_tables(file.path()).unwrap());

    let schedule = load_schedule();
    let r1r2 = calculator
        .compute_expected_r1r2(&circuit(&schedule, "5"))
        .unwrap();
    assert!(r1r2.estimated);
    assert_eq!(r1r2.length_m, 30.0);
}

#[test]
fn test_report_serializes_for_exporters() {
    let schedule = load_schedule();
    let report = build_schedule(&schedule.circuits).unwrap();
    let json = serde_json::to_value(&report).unwrap();

    let first = &json["circuits"][0];
    assert_eq!(first["circuit_number"], "1");
    assert_eq!(first["expected"]["max_zs"], 7.28);
    assert_eq!(first["steps"][0]["test"], "protective_conductor_continuity");
    assert_eq!(first["steps"][0]["acceptance"]["type"], "max_resistance");
}

#[test]
fn test_fuse_circuit_from_form_labels() {
    let json = r#"{
        "circuit_number": "8",
        "description": "Outbuilding",
        "phase_type": "1P",
        "live_size_mm2": 4.0,
        "cpc_size_mm2": 2.5,
        "cable_type": "",
        "protective_device": { "kind": "BS 88-2 fuse", "curve": "", "rating_amps": 32 }
    }"#;
    let outbuilding: CircuitSpec = serde_json::from_str(json).expect("Form labels should parse");

    assert_eq!(compute_max_zs(&outbuilding).unwrap(), Ohms(1.04));
    let steps = generate_testing_guidance(&outbuilding).unwrap();
    let zs = steps
        .iter()
        .find(|s| s.test == TestKind::EarthFaultLoopImpedance)
        .expect("Zs step present");
    assert!(zs.regulation.ends_with("Table 41.2"), "{}", zs.regulation);

    let mut result = TestResult::new("8");
    result.zs_ohms = Some(-0.4);
    let evaluations = evaluate_schedule(default_calculator(), &[outbuilding], &[result]).unwrap();
    let verdict = evaluations[0]
        .verdicts
        .iter()
        .find(|v| v.test == TestKind::EarthFaultLoopImpedance)
        .unwrap();
    assert_eq!(verdict.outcome, Outcome::Fail, "A negative reading is never a pass");
}
