//! Constraints: orientation and length sub-constraints between node pairs.
//!
//! A constraint joins two nodes through two scalar restrictions: the
//! orientation of the separation vector and its length. Each sub-constraint
//! is free, fixed, or driven, and may be chained to another constraint's
//! sub-constraint through a ratio (gearing). Corrections are sequential
//! impulses: a pseudo-impulse moves positions to remove drift, a true
//! impulse adjusts velocity increments, both weighted by inverse mass and
//! warm-started from the impulse accumulated last tick.

use serde::{Deserialize, Serialize};

use crate::config::SolverConfig;
use crate::drive::Drive;
use crate::node::Node;
use crate::render::Renderer;
use crate::vec::Vec2;

/// Which sub-constraint of a constraint is meant, e.g. by a reference.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubKind {
    Ori,
    Len,
}

impl SubKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SubKind::Ori => "ori",
            SubKind::Len => "len",
        }
    }
}

/// A chain to another constraint's sub-constraint.
///
/// Passive chains are one-way: the chained target follows the reference but
/// never pushes back on it. Driven sub-constraints chain passively (an
/// actuator on a moving base); fixed sub-constraints gear two-way.
#[derive(Clone, Debug)]
pub struct RefSpec {
    /// Referenced constraint id.
    pub constraint: String,
    /// Resolved index into the model's constraint array.
    pub ix: usize,
    /// Which sub-constraint of the referenced constraint.
    pub kind: SubKind,
    pub ratio: f64,
    pub passive: bool,
}

/// Target behavior of one sub-constraint.
#[derive(Clone, Debug)]
pub enum SubTarget {
    /// No restriction; the value is derived from current geometry.
    Free,
    /// Locked to the initial value, optionally offset by a ratio-scaled
    /// reference.
    Fixed { reference: Option<RefSpec> },
    /// Initial value plus drive output, optionally offset by a reference;
    /// `input` is the externally-set offset used with the static profile.
    Driven { drive: Drive, reference: Option<RefSpec>, input: f64 },
}

impl SubTarget {
    pub fn is_free(&self) -> bool {
        matches!(self, SubTarget::Free)
    }

    pub fn reference(&self) -> Option<&RefSpec> {
        match self {
            SubTarget::Free => None,
            SubTarget::Fixed { reference } => reference.as_ref(),
            SubTarget::Driven { reference, .. } => reference.as_ref(),
        }
    }
}

/// One scalar restriction plus its warm-started impulse accumulator.
#[derive(Clone, Debug)]
pub struct SubConstraint {
    pub target: SubTarget,
    /// Explicit initial value (w0 or r0) from the declarative document;
    /// derived from geometry when absent.
    pub val0_spec: Option<f64>,
    /// Initial value in effect, captured at init and kept across reset.
    pub val0: f64,
    captured: bool,
    /// Accumulated correction impulse, persisted across ticks.
    pub(crate) lambda: f64,
}

impl SubConstraint {
    pub fn new(target: SubTarget, val0_spec: Option<f64>) -> Self {
        SubConstraint { target, val0_spec, val0: 0.0, captured: false, lambda: 0.0 }
    }

    pub fn free() -> Self {
        SubConstraint {
            target: SubTarget::Free,
            val0_spec: None,
            val0: 0.0,
            captured: false,
            lambda: 0.0,
        }
    }

    pub fn fixed() -> Self {
        SubConstraint {
            target: SubTarget::Fixed { reference: None },
            val0_spec: None,
            val0: 0.0,
            captured: false,
            lambda: 0.0,
        }
    }

    /// Fixed at an explicit value instead of the initial geometry.
    pub fn fixed_at(val0: f64) -> Self {
        let mut sub = SubConstraint::fixed();
        sub.val0_spec = Some(val0);
        sub
    }

    pub fn driven(drive: Drive) -> Self {
        SubConstraint {
            target: SubTarget::Driven { drive, reference: None, input: 0.0 },
            val0_spec: None,
            val0: 0.0,
            captured: false,
            lambda: 0.0,
        }
    }

    /// Settle the initial value: the explicit spec wins, then a previously
    /// captured value (so reset preserves it), then current geometry.
    fn capture(&mut self, geometry: f64) {
        if let Some(v) = self.val0_spec {
            self.val0 = v;
        } else if !self.captured {
            self.val0 = geometry;
        }
        self.captured = true;
    }

    /// Degrees of freedom this sub-constraint leaves: 1 when free.
    pub fn dof(&self) -> usize {
        usize::from(self.target.is_free())
    }

    /// Target value and rate at time `t`, given the referenced
    /// sub-constraint's current value snapshot.
    fn target_at(&self, t: f64, reference: Option<&RefGeom>) -> (f64, f64) {
        match &self.target {
            SubTarget::Free => (0.0, 0.0),
            SubTarget::Fixed { .. } => match reference {
                Some(r) => (
                    self.val0 + r.ratio * (r.val - r.val0),
                    r.ratio * r.rate,
                ),
                None => (self.val0, 0.0),
            },
            SubTarget::Driven { drive, input, .. } => {
                let offset = reference.map_or(0.0, |r| r.val - r.val0);
                let offset_rate = reference.map_or(0.0, |r| r.rate);
                (drive.value(t) + input + offset, drive.rate(t) + offset_rate)
            }
        }
    }
}

/// Composite constraint type, derived from the two sub-constraint kinds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConstraintKind {
    /// Both sub-constraints free: no restriction.
    Free,
    /// Length restricted, orientation free: a pin joint / rigid link.
    Rotational,
    /// Orientation restricted, length free: a slider.
    Translational,
    /// Both restricted: welded or fully actuated.
    Rigid,
}

/// Snapshot of a referenced sub-constraint's geometry, taken immutably
/// before a correction step so the step itself only borrows the node slice.
#[derive(Copy, Clone, Debug)]
pub(crate) struct RefGeom {
    /// Direction the referenced value moves along (u for len, perp for ori).
    g: Vec2,
    /// Value units per unit of node motion along `g`: 1 for len, r for ori.
    scale: f64,
    /// Current value (continuous angle or projected length).
    val: f64,
    val0: f64,
    /// Current value rate from node velocities (including increments).
    rate: f64,
    p1_ix: usize,
    p2_ix: usize,
    im_sum: f64,
    ratio: f64,
    passive: bool,
}

/// A joint-like connection between two nodes.
#[derive(Clone, Debug)]
pub struct Constraint {
    pub id: String,
    /// Endpoint node ids.
    pub p1: String,
    pub p2: String,
    /// Resolved endpoint indices.
    pub p1_ix: usize,
    pub p2_ix: usize,
    pub ori: SubConstraint,
    pub len: SubConstraint,
    /// Continuous actual orientation, unwrapped across full turns.
    w_cur: f64,
    /// Trig cache of the current target orientation, refreshed per sub-step.
    cw: f64,
    sw: f64,
    /// Committed joint force along the link (analysis quantity).
    force: f64,
    /// Committed joint moment (analysis quantity).
    moment: f64,
}

fn wrap_to_pi(x: f64) -> f64 {
    use core::f64::consts::{PI, TAU};
    (x + PI).rem_euclid(TAU) - PI
}

impl Constraint {
    pub fn new(
        id: impl Into<String>,
        p1: impl Into<String>,
        p2: impl Into<String>,
        ori: SubConstraint,
        len: SubConstraint,
    ) -> Self {
        Constraint {
            id: id.into(),
            p1: p1.into(),
            p2: p2.into(),
            p1_ix: 0,
            p2_ix: 0,
            ori,
            len,
            w_cur: 0.0,
            cw: 1.0,
            sw: 0.0,
            force: 0.0,
            moment: 0.0,
        }
    }

    /// Composite type, derived from which sub-constraints are free.
    pub fn kind(&self) -> ConstraintKind {
        match (self.ori.target.is_free(), self.len.target.is_free()) {
            (true, true) => ConstraintKind::Free,
            (true, false) => ConstraintKind::Rotational,
            (false, true) => ConstraintKind::Translational,
            (false, false) => ConstraintKind::Rigid,
        }
    }

    /// Degrees of freedom this constraint leaves open, in {0, 1, 2}.
    pub fn dof(&self) -> usize {
        self.ori.dof() + self.len.dof()
    }

    /// Current continuous orientation of the separation vector.
    pub fn w(&self) -> f64 {
        self.w_cur
    }

    /// Current separation length.
    pub fn r(&self, nodes: &[Node]) -> f64 {
        nodes[self.p2_ix].pos.distance(nodes[self.p1_ix].pos)
    }

    /// Committed joint force along the link, from the last tick.
    pub fn force(&self) -> f64 {
        self.force
    }

    /// Committed joint moment, from the last tick.
    pub fn moment(&self) -> f64 {
        self.moment
    }

    /// Set the external input value of a driven sub-constraint (static
    /// profile). Ignored for free and fixed sub-constraints.
    pub fn set_input(&mut self, kind: SubKind, value: f64) {
        let sub = match kind {
            SubKind::Ori => &mut self.ori,
            SubKind::Len => &mut self.len,
        };
        if let SubTarget::Driven { input, .. } = &mut sub.target {
            *input = value;
        }
    }

    /// Whether either sub-constraint's drive is running at time `t`.
    pub fn is_driven_at(&self, t: f64) -> bool {
        [&self.ori, &self.len].iter().any(|s| match &s.target {
            SubTarget::Driven { drive, .. } => drive.is_running(t),
            _ => false,
        })
    }

    fn sep(&self, nodes: &[Node]) -> Vec2 {
        nodes[self.p2_ix].pos - nodes[self.p1_ix].pos
    }

    /// Relative endpoint velocity including pending increments.
    fn rel_vel(&self, nodes: &[Node]) -> Vec2 {
        let a = &nodes[self.p1_ix];
        let b = &nodes[self.p2_ix];
        (b.vel + b.dvel) - (a.vel + a.dvel)
    }

    fn im_sum(&self, nodes: &[Node]) -> f64 {
        nodes[self.p1_ix].im + nodes[self.p2_ix].im
    }

    /// Capture initial values (explicit `w0`/`r0` or current geometry) and
    /// prime the trig cache. Called by the model during init and reset.
    pub(crate) fn init_values(&mut self, nodes: &[Node]) {
        let d = self.sep(nodes);
        let geo_w = if d.length() > 1e-12 { d.angle() } else { 0.0 };
        self.ori.capture(geo_w);
        self.len.capture(d.length());
        if let SubTarget::Driven { drive, .. } = &mut self.ori.target {
            drive.z0 = self.ori.val0;
        }
        if let SubTarget::Driven { drive, .. } = &mut self.len.target {
            drive.z0 = self.len.val0;
        }
        self.w_cur = self.ori.val0 + wrap_to_pi(geo_w - self.ori.val0);
        self.cw = self.w_cur.cos();
        self.sw = self.w_cur.sin();
    }

    /// Geometry snapshot of one sub-constraint, for constraints that
    /// reference it. Values are measured from current geometry so chained
    /// corrections within a sweep see up-to-date state.
    pub(crate) fn sub_geom(&self, kind: SubKind, nodes: &[Node]) -> RefGeom {
        let d = self.sep(nodes);
        let r = d.length().max(1e-9);
        let u = d.scale(1.0 / r);
        let rv = self.rel_vel(nodes);
        match kind {
            SubKind::Len => RefGeom {
                g: u,
                scale: 1.0,
                val: r,
                val0: self.len.val0,
                rate: rv.dot(u),
                p1_ix: self.p1_ix,
                p2_ix: self.p2_ix,
                im_sum: self.im_sum(nodes),
                ratio: 1.0,
                passive: false,
            },
            SubKind::Ori => {
                let n = u.perp();
                RefGeom {
                    g: n,
                    scale: r,
                    val: self.w_cur + wrap_to_pi(d.angle() - self.w_cur),
                    val0: self.ori.val0,
                    rate: rv.dot(n) / r,
                    p1_ix: self.p1_ix,
                    p2_ix: self.p2_ix,
                    im_sum: self.im_sum(nodes),
                    ratio: 1.0,
                    passive: false,
                }
            }
        }
    }

    /// Apply a reference spec to a raw geometry snapshot.
    pub(crate) fn chain(spec: &RefSpec, mut geom: RefGeom) -> RefGeom {
        geom.ratio = spec.ratio;
        geom.passive = spec.passive;
        geom
    }

    /// Refresh the trig cache from the target orientation (or from geometry
    /// for a free orientation) and track the continuous actual angle.
    fn refresh_cache(&mut self, t: f64, nodes: &[Node], ori_ref: Option<&RefGeom>) {
        let d = self.sep(nodes);
        if d.length() > 1e-12 {
            self.w_cur += wrap_to_pi(d.angle() - self.w_cur);
        }
        match &self.ori.target {
            SubTarget::Free => {
                let r = d.length();
                if r > 1e-12 {
                    self.cw = d.x / r;
                    self.sw = d.y / r;
                }
            }
            _ => {
                let (w_t, _) = self.ori.target_at(t, ori_ref);
                self.cw = w_t.cos();
                self.sw = w_t.sin();
            }
        }
    }

    /// Effective-mass denominator: own endpoints plus the ratio-scaled
    /// referenced endpoints when the chain pushes back.
    fn inv_mass(&self, nodes: &[Node], kappa: f64, reference: Option<&RefGeom>) -> f64 {
        let mut den = self.im_sum(nodes);
        if let Some(r) = reference {
            if !r.passive {
                den += kappa * kappa * r.im_sum;
            }
        }
        den
    }

    /// Distribute a position pseudo-impulse over both endpoints and, for a
    /// two-way chain, the referenced endpoints.
    fn apply_pos(nodes: &mut [Node], p1: usize, p2: usize, g: Vec2, lambda: f64, kappa: f64, reference: Option<&RefGeom>) {
        let corr1 = g.scale(lambda * nodes[p1].im);
        let corr2 = g.scale(lambda * nodes[p2].im);
        nodes[p1].pos -= corr1;
        nodes[p2].pos += corr2;
        if let Some(r) = reference {
            if !r.passive {
                let back1 = r.g.scale(kappa * lambda * nodes[r.p1_ix].im);
                let back2 = r.g.scale(kappa * lambda * nodes[r.p2_ix].im);
                nodes[r.p1_ix].pos += back1;
                nodes[r.p2_ix].pos -= back2;
            }
        }
    }

    /// Same distribution at the velocity level, into the increments.
    fn apply_vel(nodes: &mut [Node], p1: usize, p2: usize, g: Vec2, lambda: f64, kappa: f64, reference: Option<&RefGeom>) {
        let corr1 = g.scale(lambda * nodes[p1].im);
        let corr2 = g.scale(lambda * nodes[p2].im);
        nodes[p1].dvel -= corr1;
        nodes[p2].dvel += corr2;
        if let Some(r) = reference {
            if !r.passive {
                let back1 = r.g.scale(kappa * lambda * nodes[r.p1_ix].im);
                let back2 = r.g.scale(kappa * lambda * nodes[r.p2_ix].im);
                nodes[r.p1_ix].dvel += back1;
                nodes[r.p2_ix].dvel -= back2;
            }
        }
    }

    /// Re-apply last tick's accumulated impulses to the velocity increments
    /// (warm start), after refreshing the trig cache.
    pub(crate) fn prepare(
        &mut self,
        t: f64,
        nodes: &mut [Node],
        ori_ref: Option<RefGeom>,
        len_ref: Option<RefGeom>,
    ) {
        self.refresh_cache(t, nodes, ori_ref.as_ref());
        let u = Vec2::new(self.cw, self.sw);
        let n = u.perp();
        if !self.len.target.is_free() && self.len.lambda != 0.0 {
            let kappa = len_ref.as_ref().map_or(0.0, |r| r.ratio / r.scale);
            Self::apply_vel(nodes, self.p1_ix, self.p2_ix, u, self.len.lambda, kappa, len_ref.as_ref());
        }
        if !self.ori.target.is_free() && self.ori.lambda != 0.0 {
            let r_cur = self.r(nodes).max(1e-9);
            let kappa = ori_ref.as_ref().map_or(0.0, |rf| rf.ratio * r_cur / rf.scale);
            Self::apply_vel(nodes, self.p1_ix, self.p2_ix, n, self.ori.lambda, kappa, ori_ref.as_ref());
        }
    }

    fn pos_step_ori(&mut self, nodes: &mut [Node], reference: Option<&RefGeom>, config: &SolverConfig) -> bool {
        let d = self.sep(nodes);
        let r = d.length();
        if r < 1e-9 {
            return true; // coincident endpoints, warned at init
        }
        let n = Vec2::new(-self.sw, self.cw);
        let c = d.dot(n);
        if c.abs() <= config.ang_tol * r {
            return true;
        }
        let kappa = reference.map_or(0.0, |rf| rf.ratio * r / rf.scale);
        let den = self.inv_mass(nodes, kappa, reference);
        if den < 1e-12 {
            return true; // both endpoints immovable
        }
        let lambda = -c / den;
        Self::apply_pos(nodes, self.p1_ix, self.p2_ix, n, lambda, kappa, reference);
        false
    }

    fn pos_step_len(&mut self, t: f64, nodes: &mut [Node], reference: Option<&RefGeom>, config: &SolverConfig) -> bool {
        let (r_t, _) = self.len.target_at(t, reference);
        let d = self.sep(nodes);
        let u = Vec2::new(self.cw, self.sw);
        let c = d.dot(u) - r_t;
        if c.abs() <= config.len_tol {
            return true;
        }
        let kappa = reference.map_or(0.0, |rf| rf.ratio / rf.scale);
        let den = self.inv_mass(nodes, kappa, reference);
        if den < 1e-12 {
            return true;
        }
        let lambda = -c / den;
        Self::apply_pos(nodes, self.p1_ix, self.p2_ix, u, lambda, kappa, reference);
        false
    }

    /// One position-correction sweep step. Returns whether both residuals
    /// are inside tolerance.
    pub(crate) fn pos_step(
        &mut self,
        t: f64,
        nodes: &mut [Node],
        ori_ref: Option<RefGeom>,
        len_ref: Option<RefGeom>,
        config: &SolverConfig,
    ) -> bool {
        self.refresh_cache(t, nodes, ori_ref.as_ref());
        match self.kind() {
            ConstraintKind::Free => true,
            ConstraintKind::Rotational => self.pos_step_len(t, nodes, len_ref.as_ref(), config),
            ConstraintKind::Translational => self.pos_step_ori(nodes, ori_ref.as_ref(), config),
            ConstraintKind::Rigid => {
                let ori_ok = self.pos_step_ori(nodes, ori_ref.as_ref(), config);
                let len_ok = self.pos_step_len(t, nodes, len_ref.as_ref(), config);
                ori_ok && len_ok
            }
        }
    }

    fn vel_step_ori(&mut self, t: f64, nodes: &mut [Node], reference: Option<&RefGeom>, config: &SolverConfig) -> bool {
        let r = self.r(nodes);
        if r < 1e-9 {
            return true;
        }
        let n = Vec2::new(-self.sw, self.cw);
        let (_, w_rate) = self.ori.target_at(t, reference);
        let c = self.rel_vel(nodes).dot(n) - r * w_rate;
        if c.abs() <= config.vel_tol {
            return true;
        }
        let kappa = reference.map_or(0.0, |rf| rf.ratio * r / rf.scale);
        let den = self.inv_mass(nodes, kappa, reference);
        if den < 1e-12 {
            return true;
        }
        let lambda = -c / den;
        Self::apply_vel(nodes, self.p1_ix, self.p2_ix, n, lambda, kappa, reference);
        self.ori.lambda += lambda;
        false
    }

    fn vel_step_len(&mut self, t: f64, nodes: &mut [Node], reference: Option<&RefGeom>, config: &SolverConfig) -> bool {
        let u = Vec2::new(self.cw, self.sw);
        let (_, r_rate) = self.len.target_at(t, reference);
        let c = self.rel_vel(nodes).dot(u) - r_rate;
        if c.abs() <= config.vel_tol {
            return true;
        }
        let kappa = reference.map_or(0.0, |rf| rf.ratio / rf.scale);
        let den = self.inv_mass(nodes, kappa, reference);
        if den < 1e-12 {
            return true;
        }
        let lambda = -c / den;
        Self::apply_vel(nodes, self.p1_ix, self.p2_ix, u, lambda, kappa, reference);
        self.len.lambda += lambda;
        false
    }

    /// One velocity-correction sweep step, accumulating impulse deltas for
    /// the next tick's warm start. Returns whether both velocity residuals
    /// are inside tolerance.
    pub(crate) fn vel_step(
        &mut self,
        t: f64,
        nodes: &mut [Node],
        ori_ref: Option<RefGeom>,
        len_ref: Option<RefGeom>,
        config: &SolverConfig,
    ) -> bool {
        match self.kind() {
            ConstraintKind::Free => true,
            ConstraintKind::Rotational => self.vel_step_len(t, nodes, len_ref.as_ref(), config),
            ConstraintKind::Translational => self.vel_step_ori(t, nodes, ori_ref.as_ref(), config),
            ConstraintKind::Rigid => {
                let ori_ok = self.vel_step_ori(t, nodes, ori_ref.as_ref(), config);
                let len_ok = self.vel_step_len(t, nodes, len_ref.as_ref(), config);
                ori_ok && len_ok
            }
        }
    }

    /// Commit accumulated impulses into analysis quantities and write the
    /// reaction forces into the endpoint accumulators for reporting.
    pub(crate) fn post(&mut self, nodes: &mut [Node], dt: f64) {
        if dt <= 0.0 {
            return;
        }
        let u = Vec2::new(self.cw, self.sw);
        let n = u.perp();
        let r = self.r(nodes);
        self.force = self.len.lambda / dt;
        self.moment = r * self.ori.lambda / dt;
        let reaction = (u.scale(self.len.lambda) + n.scale(self.ori.lambda)).scale(1.0 / dt);
        nodes[self.p1_ix].force -= reaction;
        nodes[self.p2_ix].force += reaction;
    }

    /// Zero the warm-start impulse accumulators and analysis quantities.
    pub(crate) fn reset(&mut self) {
        self.ori.lambda = 0.0;
        self.len.lambda = 0.0;
        self.force = 0.0;
        self.moment = 0.0;
    }

    /// Read-only draw hook for an external renderer.
    pub fn draw<R: Renderer>(&self, nodes: &[Node], renderer: &mut R) {
        renderer.bar(nodes[self.p1_ix].pos, nodes[self.p2_ix].pos);
    }
}
