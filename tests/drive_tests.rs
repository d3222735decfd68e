use linkwork::{Drive, DriveFunc, Model, SolverConfig};

const TAU: f64 = core::f64::consts::TAU;
const DT: f64 = 1.0 / 60.0;

#[test]
fn linear_drive_is_exact() {
    let w0 = 0.25;
    let drive = Drive::new(DriveFunc::Linear, w0, TAU, 0.0, 2.0);
    assert!((drive.value(1.0) - (w0 + core::f64::consts::PI)).abs() < 1e-9);
    assert!((drive.value(2.0) - (w0 + TAU)).abs() < 1e-9);
    assert!((drive.rate(1.0) - TAU / 2.0).abs() < 1e-9);
}

#[test]
fn value_clamps_outside_window() {
    let drive = Drive::new(DriveFunc::Harmonic, 1.0, 2.0, 5.0, 2.0);
    assert_eq!(drive.value(0.0), 1.0);
    assert!((drive.value(100.0) - 3.0).abs() < 1e-12);
    assert_eq!(drive.rate(0.0), 0.0);
    assert_eq!(drive.rate(100.0), 0.0);
    assert_eq!(drive.rate_of_change(100.0), 0.0);
}

#[test]
fn quintic_has_quiet_endpoints() {
    let drive = Drive::new(DriveFunc::Quintic, 0.0, 1.0, 0.0, 1.0);
    assert!(drive.rate(0.0).abs() < 1e-12);
    assert!(drive.rate(1.0).abs() < 1e-12);
    assert!(drive.rate_of_change(0.0).abs() < 1e-12);
    assert!(drive.rate_of_change(1.0).abs() < 1e-12);
    assert!(drive.rate(0.5) > 1.0, "peak rate exceeds the average");
}

#[test]
fn bounce_repeat_compose() {
    let drive = Drive::new(DriveFunc::Linear, 0.0, 1.0, 0.0, 1.0)
        .with_bounce(true)
        .with_repeat(2);
    assert_eq!(drive.duration(), 4.0);
    // Two ping-pong cycles: peaks at t = 1 and t = 3, zeros at 0, 2, 4.
    assert!((drive.value(1.0) - 1.0).abs() < 1e-12);
    assert!(drive.value(2.0).abs() < 1e-12);
    assert!((drive.value(3.0) - 1.0).abs() < 1e-12);
    assert!(drive.value(4.0).abs() < 1e-12);
}

#[test]
fn driven_constraint_reaches_profile_angle() {
    let json = r#"{
        "nodes": [
            { "id": "A0", "x": 0, "y": 0, "base": true },
            { "id": "A1", "x": 100, "y": 0 }
        ],
        "constraints": [
            { "id": "c1", "p1": "A0", "p2": "A1",
              "len": { "type": "fixed" },
              "ori": { "type": "driven", "func": "linear", "t0": 0, "Dt": 2, "Dw": 6.283185307179586 } }
        ]
    }"#;
    let mut model = Model::from_json(json, SolverConfig::new()).expect("parse");
    assert!(model.valid(), "faults: {:?}", model.faults());

    for _ in 0..60 {
        model.tick(DT);
    }
    // t = 1: half the profile, a half turn from the initial angle 0.
    let w = model.constraint("c1").unwrap().w();
    assert!((w - core::f64::consts::PI).abs() < 1e-2, "w = {w}");

    for _ in 0..60 {
        model.tick(DT);
    }
    let w = model.constraint("c1").unwrap().w();
    assert!((w - TAU).abs() < 1e-2, "w = {w}");

    // The drive has ended; the mechanism holds its endpoint.
    for _ in 0..60 {
        model.tick(DT);
    }
    let w = model.constraint("c1").unwrap().w();
    assert!((w - TAU).abs() < 1e-2, "w = {w}");
    assert!(!model.is_active(), "drive finished and nothing else loads it");
}
