//! Point-mass nodes with semi-implicit Euler prediction.

use crate::config::SolverConfig;
use crate::render::Renderer;
use crate::vec::Vec2;

/// A point mass. Base nodes have zero inverse mass and never move.
#[derive(Clone, Debug)]
pub struct Node {
    pub id: String,
    /// Current position.
    pub pos: Vec2,
    /// Initial position, recorded at construction and restored by reset.
    pub pos0: Vec2,
    /// Velocity.
    pub vel: Vec2,
    /// Acceleration, derived each tick from the committed velocity increment.
    pub acc: Vec2,
    /// Per-step velocity increment; only meaningful inside the tick pipeline.
    pub dvel: Vec2,
    pub mass: f64,
    /// Inverse mass; 0 marks a base (immovable) node.
    pub im: f64,
    /// Accumulated external force, zeroed each tick.
    pub force: Vec2,
    pub base: bool,
    sleep_count: u8,
}

impl Node {
    pub fn new(id: impl Into<String>, pos: Vec2, mass: f64) -> Self {
        let im = if mass.abs() < 1e-10 { 0.0 } else { 1.0 / mass };
        Node {
            id: id.into(),
            pos,
            pos0: pos,
            vel: Vec2::zero(),
            acc: Vec2::zero(),
            dvel: Vec2::zero(),
            mass,
            im,
            force: Vec2::zero(),
            base: false,
            sleep_count: 0,
        }
    }

    /// An immovable anchor.
    pub fn base(id: impl Into<String>, pos: Vec2) -> Self {
        let mut node = Node::new(id, pos, 1.0);
        node.base = true;
        node.im = 0.0;
        node
    }

    /// Zero the force accumulator and the velocity increment.
    pub fn clear(&mut self) {
        self.force = Vec2::zero();
        self.dvel = Vec2::zero();
    }

    pub fn apply_force(&mut self, force: Vec2) {
        if !self.base {
            self.force += force;
        }
    }

    /// Predictor: fold accumulated force into the velocity increment, then
    /// advance the position with the current velocity plus the increment.
    ///
    /// The 1.5 increment weighting is the reference behavior this crate
    /// reproduces; trajectories depend on it exactly.
    pub fn predict(&mut self, dt: f64) {
        if self.im == 0.0 {
            return;
        }
        self.dvel += self.force.scale(self.im * dt);
        self.pos += (self.vel + self.dvel.scale(1.5)).scale(dt);
    }

    /// Commit the velocity increment and derive acceleration from it.
    pub fn finalize(&mut self, dt: f64) {
        if self.im == 0.0 {
            return;
        }
        self.vel += self.dvel;
        self.acc = if dt > 0.0 { self.dvel.scale(1.0 / dt) } else { Vec2::zero() };
    }

    /// Update the sleep counter. Sleep testing is gated by a minimum model
    /// time and requires two consecutive quiet checks.
    pub fn update_sleep(&mut self, t: f64, config: &SolverConfig) {
        if self.base {
            return;
        }
        let quiet = self.vel.length() <= config.sleep_vel_tol
            && self.acc.length() <= config.sleep_acc_tol;
        if t >= config.sleep_min_time && quiet {
            self.sleep_count = (self.sleep_count + 1).min(2);
        } else {
            self.sleep_count = 0;
        }
    }

    /// Base nodes always sleep; other nodes sleep after two consecutive
    /// quiet checks.
    pub fn is_sleeping(&self) -> bool {
        self.base || self.sleep_count >= 2
    }

    /// Kinetic energy.
    pub fn energy(&self) -> f64 {
        if self.base {
            0.0
        } else {
            0.5 * self.mass * self.vel.length_sq()
        }
    }

    /// Return to the initial position with zero motion.
    pub fn reset(&mut self) {
        self.pos = self.pos0;
        self.vel = Vec2::zero();
        self.acc = Vec2::zero();
        self.dvel = Vec2::zero();
        self.force = Vec2::zero();
        self.sleep_count = 0;
    }

    /// Zero velocity and acceleration, keeping the pose.
    pub fn stop(&mut self) {
        self.vel = Vec2::zero();
        self.acc = Vec2::zero();
        self.dvel = Vec2::zero();
    }

    /// Read-only draw hook for an external renderer.
    pub fn draw<R: Renderer>(&self, renderer: &mut R) {
        renderer.node(self.pos, self.base);
    }
}
