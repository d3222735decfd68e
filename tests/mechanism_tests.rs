use linkwork::{Model, SolverConfig, SubKind, Vec2};

const DT: f64 = 1.0 / 60.0;

fn pendulum_json() -> &'static str {
    r#"{
        "nodes": [
            { "id": "A0", "x": 0, "y": 0, "base": true },
            { "id": "A1", "x": 100, "y": 0 }
        ],
        "constraints": [
            { "id": "c1", "p1": "A0", "p2": "A1", "len": { "type": "fixed", "r0": 100.0 } }
        ]
    }"#
}

#[test]
fn rigid_link_holds_without_loads() {
    let mut model = Model::from_json(pendulum_json(), SolverConfig::new()).expect("parse");
    assert!(model.valid(), "faults: {:?}", model.faults());

    for _ in 0..1000 {
        model.tick(DT);
        let a = model.node("A0").unwrap().pos;
        let b = model.node("A1").unwrap().pos;
        let r = a.distance(b);
        assert!(
            (r - 100.0).abs() <= 1e-3,
            "link length drifted to {r} at t = {}",
            model.t(),
        );
    }
    // Nothing loads the mechanism, so it must not have moved at all.
    assert_eq!(model.node("A1").unwrap().pos, Vec2::new(100.0, 0.0));
}

#[test]
fn pendulum_swings_and_holds_length() {
    let mut model = Model::from_json(pendulum_json(), SolverConfig::new()).expect("parse");
    model.set_gravity(Some(Vec2::new(0.0, -10.0)));

    let mut min_y: f64 = 0.0;
    for _ in 0..1000 {
        model.tick(DT);
        let b = model.node("A1").unwrap().pos;
        let r = model.node("A0").unwrap().pos.distance(b);
        assert!((r - 100.0).abs() <= 1e-3, "link length drifted to {r}");
        min_y = min_y.min(b.y);
    }
    assert!(model.valid(), "faults: {:?}", model.faults());
    assert!(min_y < -50.0, "pendulum barely swung: min_y = {min_y}");
}

#[test]
fn pendulum_energy_drift_is_bounded() {
    let mut model = Model::from_json(pendulum_json(), SolverConfig::new()).expect("parse");
    model.set_gravity(Some(Vec2::new(0.0, -10.0)));

    let e0 = model.energy();
    // Release from horizontal; m*g*r = 1000 is the kinetic/potential swing
    // scale. Semi-implicit integration is only approximately
    // energy-conserving, so allow a bounded fraction of that scale over a
    // few oscillation periods.
    let scale = 1.0 * 10.0 * 100.0;
    for _ in 0..3000 {
        model.tick(DT);
        let drift = (model.energy() - e0).abs();
        assert!(
            drift < 0.2 * scale,
            "energy drifted by {drift} at t = {}",
            model.t(),
        );
    }
}

#[test]
fn reset_restores_initial_state() {
    let mut model = Model::from_json(pendulum_json(), SolverConfig::new()).expect("parse");
    model.set_gravity(Some(Vec2::new(0.0, -10.0)));

    for _ in 0..137 {
        model.tick(DT);
    }
    assert_ne!(model.node("A1").unwrap().pos, Vec2::new(100.0, 0.0));

    model.reset();
    assert!(model.valid());
    assert_eq!(model.t(), 0.0);
    let b = model.node("A1").unwrap();
    assert_eq!(b.pos, Vec2::new(100.0, 0.0));
    assert_eq!(b.vel, Vec2::zero());
    assert_eq!(b.acc, Vec2::zero());

    // Resetting again changes nothing.
    model.reset();
    assert_eq!(model.node("A1").unwrap().pos, Vec2::new(100.0, 0.0));
}

#[test]
fn stop_zeroes_motion_but_keeps_pose() {
    let mut model = Model::from_json(pendulum_json(), SolverConfig::new()).expect("parse");
    model.set_gravity(Some(Vec2::new(0.0, -10.0)));
    for _ in 0..100 {
        model.tick(DT);
    }
    let pose = model.node("A1").unwrap().pos;
    model.stop();
    let b = model.node("A1").unwrap();
    assert_eq!(b.pos, pose);
    assert_eq!(b.vel, Vec2::zero());
    assert_eq!(b.acc, Vec2::zero());
}

#[test]
fn spring_settles_at_gravity_equilibrium() {
    let json = r#"{
        "gravity": { "x": 0.0, "y": -10.0 },
        "nodes": [
            { "id": "A0", "x": 0, "y": 0, "base": true },
            { "id": "A1", "x": 0, "y": -10, "m": 1.0 }
        ],
        "loads": [
            { "type": "spring", "id": "S1", "p1": "A0", "p2": "A1", "k": 100.0, "len0": 10.0 }
        ]
    }"#;
    let mut model = Model::from_json(json, SolverConfig::new()).expect("parse");
    assert!(model.valid(), "faults: {:?}", model.faults());

    // Overdamp numerically by stopping between ticks, walking the mass to
    // static equilibrium: stretch = m*g/k = 0.1 below rest length.
    for _ in 0..2000 {
        model.tick(DT);
        model.stop();
    }
    let y = model.node("A1").unwrap().pos.y;
    assert!(
        (y + 10.1).abs() < 1e-2,
        "spring equilibrium off: y = {y}, expected -10.1",
    );
}

#[test]
fn geared_constraint_follows_at_ratio() {
    let json = r#"{
        "nodes": [
            { "id": "A0", "x": 0, "y": 0, "base": true },
            { "id": "B1", "x": 50, "y": 0 },
            { "id": "B2", "x": -30, "y": 0 }
        ],
        "constraints": [
            { "id": "crank", "p1": "A0", "p2": "B1",
              "len": { "type": "fixed" },
              "ori": { "type": "driven", "func": "linear", "t0": 0, "Dt": 4, "Dw": 1.5707963267948966 } },
            { "id": "follower", "p1": "A0", "p2": "B2",
              "len": { "type": "fixed" },
              "ori": { "type": "fixed", "ref": "crank", "reftype": "ori", "ratio": 2.0 } }
        ]
    }"#;
    let mut model = Model::from_json(json, SolverConfig::new()).expect("parse");
    assert!(model.valid(), "faults: {:?}", model.faults());
    let w0_crank = model.constraint("crank").unwrap().w();
    let w0_follower = model.constraint("follower").unwrap().w();

    for _ in 0..240 {
        model.tick(DT);
    }
    assert!(model.valid(), "faults: {:?}", model.faults());

    let dw_crank = model.constraint("crank").unwrap().w() - w0_crank;
    let dw_follower = model.constraint("follower").unwrap().w() - w0_follower;
    assert!(
        (dw_crank - core::f64::consts::FRAC_PI_2).abs() < 1e-2,
        "crank turned {dw_crank}",
    );
    assert!(
        (dw_follower - 2.0 * dw_crank).abs() < 2e-2,
        "follower at {dw_follower}, crank at {dw_crank}",
    );
}

#[test]
fn driven_input_moves_between_ticks() {
    let json = r#"{
        "nodes": [
            { "id": "A0", "x": 0, "y": 0, "base": true },
            { "id": "B1", "x": 10, "y": 0 }
        ],
        "constraints": [
            { "id": "c1", "p1": "A0", "p2": "B1",
              "len": { "type": "fixed" },
              "ori": { "type": "driven", "input": true } }
        ]
    }"#;
    let mut model = Model::from_json(json, SolverConfig::new()).expect("parse");
    assert!(model.valid(), "faults: {:?}", model.faults());

    model.set_input("c1", SubKind::Ori, 0.5);
    for _ in 0..60 {
        model.tick(DT);
    }
    let w = model.constraint("c1").unwrap().w();
    assert!((w - 0.5).abs() < 1e-2, "input target not reached: w = {w}");
}
