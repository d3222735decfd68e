use linkwork::{Model, SolverConfig, Vec2};

const DT: f64 = 1.0 / 60.0;

fn loaded_chain_json() -> &'static str {
    r#"{
        "gravity": { "x": 0.0, "y": -10.0 },
        "nodes": [
            { "id": "A0", "x": 0, "y": 0, "base": true },
            { "id": "A1", "x": 30, "y": 0 },
            { "id": "A2", "x": 60, "y": 0 },
            { "id": "A3", "x": 90, "y": 0 }
        ],
        "constraints": [
            { "id": "c1", "p1": "A0", "p2": "A1", "len": { "type": "fixed" } },
            { "id": "c2", "p1": "A1", "p2": "A2", "len": { "type": "fixed" } },
            { "id": "c3", "p1": "A2", "p2": "A3", "len": { "type": "fixed" } }
        ]
    }"#
}

fn total_velocity_iterations(config: SolverConfig, ticks: usize) -> usize {
    let mut model = Model::from_json(loaded_chain_json(), config).expect("parse");
    assert!(model.valid(), "faults: {:?}", model.faults());
    let mut total = 0;
    for _ in 0..ticks {
        model.tick(DT);
        total += model.itr_vel();
    }
    assert!(model.valid(), "faults: {:?}", model.faults());
    total
}

#[test]
fn warm_start_needs_no_more_velocity_iterations() {
    let warm = total_velocity_iterations(SolverConfig::new(), 600);
    let cold = total_velocity_iterations(SolverConfig::new().with_warm_start(false), 600);
    assert!(
        warm <= cold,
        "warm-started run took more velocity iterations ({warm}) than cold ({cold})",
    );
}

#[test]
fn both_modes_keep_links_rigid() {
    let run = |config: SolverConfig| -> Vec<Vec2> {
        let mut model = Model::from_json(loaded_chain_json(), config).expect("parse");
        for _ in 0..600 {
            model.tick(DT);
        }
        assert!(model.valid(), "faults: {:?}", model.faults());
        model.nodes().iter().map(|n| n.pos).collect()
    };
    for (label, config) in [
        ("warm", SolverConfig::new()),
        ("cold", SolverConfig::new().with_warm_start(false)),
    ] {
        let pos = run(config);
        for (i, j) in [(0, 1), (1, 2), (2, 3)] {
            let r = pos[i].distance(pos[j]);
            assert!(
                (r - 30.0).abs() <= 1e-3,
                "{label} run let link {i}-{j} drift to {r}",
            );
        }
    }
}
