use linkwork::{Constraint, Model, Node, SolverConfig, SubConstraint, Vec2};

#[test]
fn free_node_pair_has_four_dof() {
    let mut model = Model::new(SolverConfig::new());
    model.add_node(Node::new("A", Vec2::new(0.0, 0.0), 1.0)).unwrap();
    model.add_node(Node::new("B", Vec2::new(10.0, 0.0), 1.0)).unwrap();
    model.init();
    assert!(model.valid());
    assert_eq!(model.dof(), 4);
}

#[test]
fn constraints_remove_dof_one_restriction_at_a_time() {
    let mut model = Model::new(SolverConfig::new());
    model.add_node(Node::new("A", Vec2::new(0.0, 0.0), 1.0)).unwrap();
    model.add_node(Node::new("B", Vec2::new(10.0, 0.0), 1.0)).unwrap();

    model
        .add_constraint(Constraint::new("c1", "A", "B", SubConstraint::free(), SubConstraint::fixed()))
        .unwrap();
    model.init();
    assert_eq!(model.dof(), 3, "length-only constraint removes one dof");

    model
        .add_constraint(Constraint::new("c2", "A", "B", SubConstraint::fixed(), SubConstraint::free()))
        .unwrap();
    model.init();
    assert_eq!(model.dof(), 2, "orientation constraint removes another");
}

#[test]
fn base_nodes_contribute_no_dof() {
    let mut model = Model::new(SolverConfig::new());
    model.add_node(Node::base("A0", Vec2::new(0.0, 0.0))).unwrap();
    model.add_node(Node::new("A1", Vec2::new(10.0, 0.0), 1.0)).unwrap();
    model
        .add_constraint(Constraint::new("c1", "A0", "A1", SubConstraint::free(), SubConstraint::fixed()))
        .unwrap();
    model.init();
    // A pendulum: one free node (2) minus one restriction.
    assert_eq!(model.dof(), 1);
}

#[test]
fn over_constrained_mechanism_goes_negative() {
    let mut model = Model::new(SolverConfig::new());
    model.add_node(Node::base("A0", Vec2::new(0.0, 0.0))).unwrap();
    model.add_node(Node::base("B0", Vec2::new(10.0, 0.0))).unwrap();
    model.add_node(Node::new("P", Vec2::new(5.0, 5.0), 1.0)).unwrap();
    for (id, anchor) in [("c1", "A0"), ("c2", "B0")] {
        model
            .add_constraint(Constraint::new(id, anchor, "P", SubConstraint::fixed(), SubConstraint::fixed()))
            .unwrap();
    }
    model.init();
    assert!(model.dof() < 0, "dof = {}", model.dof());
}
