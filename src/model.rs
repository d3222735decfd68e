//! The mechanism model: entity collections and the tick pipeline.
//!
//! The model owns all nodes, constraints, and loads and advances them with a
//! fixed-timestep pipeline: predict, assemble positions, assemble
//! velocities, finalize. Assembly sweeps run in array order; corrections by
//! earlier constraints are visible to later ones in the same sweep
//! (Gauss-Seidel), so insertion order is part of the model's behavior and is
//! preserved across a run.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::config::SolverConfig;
use crate::constraint::{Constraint, RefGeom, SubKind, SubTarget};
use crate::error::Fault;
use crate::load::Load;
use crate::node::Node;
use crate::render::Renderer;
use crate::vec::Vec2;

/// A complete mechanism: nodes, constraints, loads, gravity, and timer.
///
/// Validation faults are recorded, never thrown: after [`init`](Model::init)
/// or [`tick`](Model::tick), check [`valid`](Model::valid) and
/// [`msg`](Model::msg). Structural edits are explicit calls outside the tick
/// pipeline and return `Result`.
#[derive(Clone, Debug)]
pub struct Model {
    pub id: Option<String>,
    nodes: Vec<Node>,
    constraints: Vec<Constraint>,
    loads: Vec<Load>,
    gravity: Option<Vec2>,
    config: SolverConfig,
    t: f64,
    dt: f64,
    valid: bool,
    faults: Vec<Fault>,
    itr_pos: usize,
    itr_vel: usize,
}

impl Model {
    pub fn new(config: SolverConfig) -> Self {
        Model {
            id: None,
            nodes: Vec::new(),
            constraints: Vec::new(),
            loads: Vec::new(),
            gravity: None,
            config,
            t: 0.0,
            dt: 0.0,
            valid: false,
            faults: Vec::new(),
            itr_pos: 0,
            itr_vel: 0,
        }
    }

    // ----------------------------------------------------------------------
    // Construction (before init) and read-only state
    // ----------------------------------------------------------------------

    /// Append a node. Duplicate ids are rejected here; everything else is
    /// checked at init.
    pub fn add_node(&mut self, node: Node) -> Result<(), Fault> {
        if self.nodes.iter().any(|n| n.id == node.id) {
            return Err(Fault::duplicate_id(node.id));
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Append a constraint. Endpoints and references must already exist
    /// (forward references are an init-time feature of the declarative
    /// format, not of incremental construction).
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<(), Fault> {
        if self.constraints.iter().any(|c| c.id == constraint.id) {
            return Err(Fault::duplicate_id(constraint.id));
        }
        for p in [&constraint.p1, &constraint.p2] {
            if !self.nodes.iter().any(|n| &n.id == p) {
                return Err(Fault::unknown_node(p.clone(), constraint.id.clone()));
            }
        }
        for sub in [&constraint.ori, &constraint.len] {
            if let Some(spec) = sub.target.reference() {
                if !self.constraints.iter().any(|c| c.id == spec.constraint) {
                    return Err(Fault::unknown_constraint(
                        spec.constraint.clone(),
                        constraint.id.clone(),
                    ));
                }
            }
        }
        self.constraints.push(constraint);
        Ok(())
    }

    /// Append a load. Referenced entities must already exist.
    pub fn add_load(&mut self, load: Load) -> Result<(), Fault> {
        if self.loads.iter().any(|l| l.id() == load.id()) {
            return Err(Fault::duplicate_id(load.id()));
        }
        match &load {
            Load::Force(f) => {
                if !self.nodes.iter().any(|n| n.id == f.node) {
                    return Err(Fault::unknown_node(f.node.clone(), f.id.clone()));
                }
                if let Some(wref) = &f.wref {
                    if !self.constraints.iter().any(|c| &c.id == wref) {
                        return Err(Fault::unknown_constraint(wref.clone(), f.id.clone()));
                    }
                }
            }
            Load::Spring(s) => {
                for p in [&s.p1, &s.p2] {
                    if !self.nodes.iter().any(|n| &n.id == p) {
                        return Err(Fault::unknown_node(p.clone(), s.id.clone()));
                    }
                }
            }
        }
        self.loads.push(load);
        Ok(())
    }

    /// Unchecked pushes for the document builder; init() records the faults
    /// a malformed document produces instead of failing construction.
    pub(crate) fn push_node(&mut self, node: Node) {
        self.nodes.push(node);
    }

    pub(crate) fn push_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub(crate) fn push_load(&mut self, load: Load) {
        self.loads.push(load);
    }

    /// Remove a node; refuses while a constraint or load references it.
    /// Re-validates and re-assembles the remaining mechanism.
    pub fn remove_node(&mut self, id: &str) -> Result<Node, Fault> {
        if let Some(c) = self.constraints.iter().find(|c| c.p1 == id || c.p2 == id) {
            return Err(Fault::InUse { id: id.into(), by: c.id.clone() });
        }
        if let Some(l) = self.loads.iter().find(|l| l.references_node(id)) {
            return Err(Fault::InUse { id: id.into(), by: l.id().into() });
        }
        let ix = self
            .nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| Fault::unknown_node(id, "model"))?;
        let node = self.nodes.remove(ix);
        self.revalidate();
        Ok(node)
    }

    /// Remove a constraint; refuses while another constraint or a load
    /// references it. Re-validates and re-assembles.
    pub fn remove_constraint(&mut self, id: &str) -> Result<Constraint, Fault> {
        let referenced_by = self.constraints.iter().find(|c| {
            c.id != id
                && [&c.ori, &c.len]
                    .iter()
                    .any(|s| s.target.reference().is_some_and(|r| r.constraint == id))
        });
        if let Some(c) = referenced_by {
            return Err(Fault::InUse { id: id.into(), by: c.id.clone() });
        }
        if let Some(l) = self.loads.iter().find(|l| l.references_constraint(id)) {
            return Err(Fault::InUse { id: id.into(), by: l.id().into() });
        }
        let ix = self
            .constraints
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| Fault::unknown_constraint(id, "model"))?;
        let constraint = self.constraints.remove(ix);
        self.revalidate();
        Ok(constraint)
    }

    /// Remove a load. Re-validates and re-assembles.
    pub fn remove_load(&mut self, id: &str) -> Option<Load> {
        let ix = self.loads.iter().position(|l| l.id() == id)?;
        let load = self.loads.remove(ix);
        self.revalidate();
        Some(load)
    }

    pub fn set_gravity(&mut self, gravity: Option<Vec2>) {
        self.gravity = gravity;
    }

    pub fn gravity(&self) -> Option<Vec2> {
        self.gravity
    }

    /// Set the external input of a driven sub-constraint (static profile).
    pub fn set_input(&mut self, constraint: &str, kind: SubKind, value: f64) {
        if let Some(c) = self.constraints.iter_mut().find(|c| c.id == constraint) {
            c.set_input(kind, value);
        }
    }

    pub fn valid(&self) -> bool {
        self.valid
    }

    /// The most recently recorded fault, if any.
    pub fn msg(&self) -> Option<&Fault> {
        self.faults.last()
    }

    /// All recorded faults, in record order.
    pub fn faults(&self) -> &[Fault] {
        &self.faults
    }

    pub fn t(&self) -> f64 {
        self.t
    }

    /// Timestep of the most recent tick.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Iteration count of the last position assembly.
    pub fn itr_pos(&self) -> usize {
        self.itr_pos
    }

    /// Iteration count of the last velocity assembly.
    pub fn itr_vel(&self) -> usize {
        self.itr_vel
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn loads(&self) -> &[Load] {
        &self.loads
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn constraint(&self, id: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.id == id)
    }

    /// Grübler-style mobility count: free node coordinates minus constraint
    /// restrictions. Negative values indicate an over-constrained mechanism.
    pub fn dof(&self) -> isize {
        let node_dof: isize = self.nodes.iter().map(|n| if n.base { 0 } else { 2 }).sum();
        let restricted: isize = self
            .constraints
            .iter()
            .map(|c| 2 - c.dof() as isize)
            .sum();
        node_dof - restricted
    }

    /// Mechanical energy: kinetic plus gravity potential (measured from the
    /// initial pose) plus spring strain.
    pub fn energy(&self) -> f64 {
        let mut e: f64 = self.nodes.iter().map(Node::energy).sum();
        if let Some(g) = self.gravity {
            for n in &self.nodes {
                if !n.base {
                    e -= n.mass * g.dot(n.pos - n.pos0);
                }
            }
        }
        for load in &self.loads {
            if let Load::Spring(s) = load {
                e += s.energy(&self.nodes);
            }
        }
        e
    }

    /// Whether ticking still does work: a running drive, or positive dof
    /// with loaded, unslept motion.
    pub fn is_active(&self) -> bool {
        if !self.valid {
            return false;
        }
        if self.constraints.iter().any(|c| c.is_driven_at(self.t)) {
            return true;
        }
        let loaded = self.gravity.is_some() || !self.loads.is_empty();
        self.dof() > 0 && loaded && self.nodes.iter().any(|n| !n.is_sleeping())
    }

    /// Read-only draw pass over every entity.
    pub fn draw<R: Renderer>(&self, renderer: &mut R) {
        for c in &self.constraints {
            c.draw(&self.nodes, renderer);
        }
        for load in &self.loads {
            match load {
                Load::Force(f) => f.draw(&self.nodes, renderer),
                Load::Spring(s) => s.draw(&self.nodes, renderer),
            }
        }
        for n in &self.nodes {
            n.draw(renderer);
        }
    }

    // ----------------------------------------------------------------------
    // Init, reset, pose
    // ----------------------------------------------------------------------

    /// Validate and cross-resolve every entity, capture initial values, and
    /// assemble the initial pose. Failures are recorded, not thrown.
    pub fn init(&mut self) {
        self.t = 0.0;
        self.revalidate();
        debug!(
            nodes = self.nodes.len(),
            constraints = self.constraints.len(),
            loads = self.loads.len(),
            dof = self.dof(),
            valid = self.valid,
            "model initialized"
        );
    }

    /// Return every node to its initial position with zero motion, zero all
    /// accumulated impulses, and recompute validity from scratch.
    pub fn reset(&mut self) {
        for n in &mut self.nodes {
            n.reset();
        }
        for c in &mut self.constraints {
            c.reset();
        }
        self.t = 0.0;
        self.itr_pos = 0;
        self.itr_vel = 0;
        self.revalidate();
    }

    /// Zero all velocities and accelerations, keeping the pose.
    pub fn stop(&mut self) {
        for n in &mut self.nodes {
            n.stop();
        }
    }

    /// Assemble positions only, without integration. Clears an earlier
    /// non-convergence fault and restores validity if assembly succeeds.
    pub fn pose(&mut self) -> bool {
        self.faults.retain(|f| !matches!(f, Fault::NotConverged { .. }));
        if self.faults.iter().any(Fault::is_fatal) {
            return false;
        }
        self.valid = true;
        self.assemble_positions();
        self.valid
    }

    /// Full validation/resolution pass plus initial-value capture and pose
    /// assembly. Used by init, reset, and structural edits.
    fn revalidate(&mut self) {
        self.faults.clear();
        self.valid = true;
        self.resolve_nodes();
        self.resolve_constraints();
        self.resolve_loads();
        if self.valid {
            for i in 0..self.constraints.len() {
                let (c, nodes) = (&mut self.constraints[i], &self.nodes);
                c.init_values(nodes);
            }
            self.assemble_positions();
        }
    }

    fn record(&mut self, fault: Fault) {
        warn!(code = fault.code(), "{fault}");
        if fault.is_fatal() {
            self.valid = false;
        }
        self.faults.push(fault);
    }

    fn resolve_nodes(&mut self) {
        let mut seen: HashSet<String> = HashSet::new();
        let mut faults = Vec::new();
        for n in &self.nodes {
            if !seen.insert(n.id.clone()) {
                faults.push(Fault::duplicate_id(n.id.clone()));
                continue;
            }
            if !n.base && n.mass.abs() < 1e-10 {
                faults.push(Fault::InvalidMass { id: n.id.clone(), mass: n.mass });
            }
        }
        for f in faults {
            self.record(f);
        }
    }

    fn resolve_constraints(&mut self) {
        let node_ix: HashMap<String, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();
        let con_ix: HashMap<String, usize> = self
            .constraints
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();
        // Free-ness of every sub-constraint, for driven-references-free
        // checks without aliasing the constraint being edited.
        let free: Vec<(bool, bool)> = self
            .constraints
            .iter()
            .map(|c| (c.ori.target.is_free(), c.len.target.is_free()))
            .collect();

        let mut seen: HashSet<String> = HashSet::new();
        let mut faults = Vec::new();
        for i in 0..self.constraints.len() {
            let c = &mut self.constraints[i];
            if !seen.insert(c.id.clone()) {
                faults.push(Fault::duplicate_id(c.id.clone()));
                continue;
            }
            if c.p1 == c.p2 {
                faults.push(Fault::SameNode { id: c.id.clone(), node: c.p1.clone() });
                continue;
            }
            let endpoints = (node_ix.get(&c.p1), node_ix.get(&c.p2));
            let (p1_ix, p2_ix) = match endpoints {
                (Some(&a), Some(&b)) => (a, b),
                _ => {
                    let missing = if endpoints.0.is_none() { &c.p1 } else { &c.p2 };
                    faults.push(Fault::unknown_node(missing.clone(), c.id.clone()));
                    continue;
                }
            };
            c.p1_ix = p1_ix;
            c.p2_ix = p2_ix;
            if self.nodes[p1_ix].pos.distance(self.nodes[p2_ix].pos) < 1e-9 {
                faults.push(Fault::Coincident { id: c.id.clone() });
            }

            for (sub_name, kind) in [("ori", SubKind::Ori), ("len", SubKind::Len)] {
                let id = c.id.clone();
                let sub = match kind {
                    SubKind::Ori => &mut c.ori,
                    SubKind::Len => &mut c.len,
                };
                let driven = matches!(sub.target, SubTarget::Driven { .. });
                if let SubTarget::Driven { drive, .. } = &sub.target {
                    if drive.func != crate::drive::DriveFunc::Static && drive.dt <= 0.0 {
                        faults.push(Fault::InvalidDriveDuration { id: id.clone(), sub: sub_name, dt: drive.dt });
                    }
                }
                let reference = match &mut sub.target {
                    SubTarget::Fixed { reference } => reference,
                    SubTarget::Driven { reference, .. } => reference,
                    SubTarget::Free => continue,
                };
                let Some(spec) = reference else { continue };
                let Some(&ref_ix) = con_ix.get(&spec.constraint) else {
                    faults.push(Fault::unknown_constraint(spec.constraint.clone(), id));
                    continue;
                };
                spec.ix = ref_ix;
                spec.passive = driven;
                let ref_free = match spec.kind {
                    SubKind::Ori => free[ref_ix].0,
                    SubKind::Len => free[ref_ix].1,
                };
                if driven && ref_free {
                    faults.push(Fault::DrivenRefFree {
                        id,
                        sub: sub_name,
                        reference: spec.constraint.clone(),
                        ref_sub: spec.kind.as_str(),
                    });
                    continue;
                }
                if driven && spec.ratio != 1.0 {
                    faults.push(Fault::RatioIgnored { id, sub: sub_name });
                    spec.ratio = 1.0;
                }
            }
        }
        for f in faults {
            self.record(f);
        }
        self.reject_reference_cycles();
    }

    /// Reference chains must be acyclic; a cycle would make chained targets
    /// mutually defined.
    fn reject_reference_cycles(&mut self) {
        let n = self.constraints.len();
        let adjacency: Vec<Vec<usize>> = self
            .constraints
            .iter()
            .map(|c| {
                [&c.ori, &c.len]
                    .iter()
                    .filter_map(|s| s.target.reference())
                    .filter(|spec| spec.ix < n && self.constraints[spec.ix].id == spec.constraint)
                    .map(|spec| spec.ix)
                    .collect()
            })
            .collect();
        // Iterative DFS; color 1 = on stack, 2 = done.
        let mut color = vec![0u8; n];
        for start in 0..n {
            if color[start] != 0 {
                continue;
            }
            color[start] = 1;
            let mut stack = vec![(start, 0usize)];
            while let Some((u, k)) = stack.pop() {
                if k < adjacency[u].len() {
                    stack.push((u, k + 1));
                    let v = adjacency[u][k];
                    if color[v] == 1 {
                        let id = self.constraints[v].id.clone();
                        self.record(Fault::ReferenceCycle { id });
                        return;
                    }
                    if color[v] == 0 {
                        color[v] = 1;
                        stack.push((v, 0));
                    }
                } else {
                    color[u] = 2;
                }
            }
        }
    }

    fn resolve_loads(&mut self) {
        let node_ix: HashMap<String, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();
        let con_ix: HashMap<String, usize> = self
            .constraints
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();

        let mut seen: HashSet<String> = HashSet::new();
        let mut faults = Vec::new();
        for load in &mut self.loads {
            if !seen.insert(load.id().to_string()) {
                faults.push(Fault::duplicate_id(load.id()));
                continue;
            }
            match load {
                Load::Force(f) => {
                    let Some(&ix) = node_ix.get(&f.node) else {
                        faults.push(Fault::unknown_node(f.node.clone(), f.id.clone()));
                        continue;
                    };
                    f.node_ix = ix;
                    f.wref_ix = None;
                    if let Some(wref) = &f.wref {
                        let Some(&cix) = con_ix.get(wref) else {
                            faults.push(Fault::unknown_constraint(wref.clone(), f.id.clone()));
                            continue;
                        };
                        f.wref_ix = Some(cix);
                    }
                }
                Load::Spring(s) => {
                    if s.k.abs() < 1e-10 {
                        faults.push(Fault::InvalidSpringRate { id: s.id.clone(), rate: s.k });
                        continue;
                    }
                    let endpoints = (node_ix.get(&s.p1), node_ix.get(&s.p2));
                    let (Some(&a), Some(&b)) = endpoints else {
                        let missing = if endpoints.0.is_none() { &s.p1 } else { &s.p2 };
                        faults.push(Fault::unknown_node(missing.clone(), s.id.clone()));
                        continue;
                    };
                    s.p1_ix = a;
                    s.p2_ix = b;
                }
            }
        }
        for f in faults {
            self.record(f);
        }
    }

    // ----------------------------------------------------------------------
    // Tick pipeline
    // ----------------------------------------------------------------------

    /// Advance the simulation one step. Does nothing while the model is
    /// invalid; call [`reset`](Model::reset) or [`pose`](Model::pose) to
    /// restore a valid pose after a failure.
    pub fn tick(&mut self, dt: f64) {
        if !self.valid || dt <= 0.0 {
            return;
        }
        self.dt = dt;
        self.t += dt;

        // 1. pre: loads, predictor, warm start, position assembly
        for n in &mut self.nodes {
            n.clear();
        }
        self.apply_loads();
        for n in &mut self.nodes {
            n.predict(dt);
        }
        if self.config.warm_start {
            for i in 0..self.constraints.len() {
                let (ori_ref, len_ref) = self.ref_geoms(i);
                let t = self.t;
                let c = &mut self.constraints[i];
                c.prepare(t, &mut self.nodes, ori_ref, len_ref);
            }
        } else {
            for c in &mut self.constraints {
                c.reset();
            }
        }
        self.assemble_positions();
        if !self.valid {
            return;
        }

        // 2. iterate: velocity assembly, accumulating warm-start impulses
        self.assemble_velocities();

        // 3. post: commit velocities, sleep bookkeeping, reaction forces
        for n in &mut self.nodes {
            n.finalize(dt);
        }
        let t = self.t;
        for n in &mut self.nodes {
            n.update_sleep(t, &self.config);
        }
        for i in 0..self.constraints.len() {
            let c = &mut self.constraints[i];
            c.post(&mut self.nodes, dt);
        }
    }

    fn apply_loads(&mut self) {
        if let Some(g) = self.gravity {
            for n in &mut self.nodes {
                if !n.base {
                    let w = g.scale(n.mass);
                    n.apply_force(w);
                }
            }
        }
        for load in &self.loads {
            match load {
                Load::Force(f) => {
                    let ref_w = f.wref_ix.map(|ix| self.constraints[ix].w());
                    f.apply(&mut self.nodes, ref_w);
                }
                Load::Spring(s) => s.apply(&mut self.nodes),
            }
        }
    }

    /// Snapshots of the referenced sub-constraints' geometry for constraint
    /// `i`, taken before its own mutable step.
    fn ref_geoms(&self, i: usize) -> (Option<RefGeom>, Option<RefGeom>) {
        let c = &self.constraints[i];
        let snap = |sub: &crate::constraint::SubConstraint| {
            sub.target.reference().map(|spec| {
                Constraint::chain(spec, self.constraints[spec.ix].sub_geom(spec.kind, &self.nodes))
            })
        };
        (snap(&c.ori), snap(&c.len))
    }

    /// Sweep `pos_step` over all constraints in array order until every one
    /// reports satisfied, up to the iteration ceiling. Reaching the ceiling
    /// is fatal: the model is marked invalid and stops advancing.
    fn assemble_positions(&mut self) {
        let mut itr = 0;
        loop {
            itr += 1;
            let mut satisfied = true;
            for i in 0..self.constraints.len() {
                let (ori_ref, len_ref) = self.ref_geoms(i);
                let t = self.t;
                let c = &mut self.constraints[i];
                satisfied &= c.pos_step(t, &mut self.nodes, ori_ref, len_ref, &self.config);
            }
            if satisfied {
                break;
            }
            if itr >= self.config.pos_itr_max {
                self.record(Fault::NotConverged { itr_max: self.config.pos_itr_max, t: self.t });
                break;
            }
        }
        self.itr_pos = itr;
    }

    /// Sweep `vel_step` over all constraints in array order. Reaching the
    /// velocity ceiling caps the sweep without invalidating the model.
    fn assemble_velocities(&mut self) {
        let mut itr = 0;
        loop {
            itr += 1;
            let mut satisfied = true;
            for i in 0..self.constraints.len() {
                let (ori_ref, len_ref) = self.ref_geoms(i);
                let t = self.t;
                let c = &mut self.constraints[i];
                satisfied &= c.vel_step(t, &mut self.nodes, ori_ref, len_ref, &self.config);
            }
            if satisfied {
                break;
            }
            if itr >= self.config.vel_itr_max {
                debug!(itr, t = self.t, "velocity assembly capped");
                break;
            }
        }
        self.itr_vel = itr;
    }
}
