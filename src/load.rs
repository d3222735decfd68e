//! Force and spring loads.
//!
//! Loads are purely functional: each tick they compute a force from current
//! model state and write it into node accumulators. They keep no state
//! beyond their configuration.

use crate::node::Node;
use crate::render::Renderer;
use crate::vec::Vec2;

/// A load acting on the mechanism.
#[derive(Clone, Debug)]
pub enum Load {
    Force(ForceLoad),
    Spring(SpringLoad),
}

/// Constant-magnitude force on one node, at a fixed orientation or tracking
/// a referenced constraint's orientation.
#[derive(Clone, Debug)]
pub struct ForceLoad {
    pub id: String,
    /// Target node id and resolved index.
    pub node: String,
    pub node_ix: usize,
    /// Force magnitude.
    pub value: f64,
    /// Orientation in radians; an offset when `wref` is set.
    pub w0: f64,
    /// Optional orientation-reference constraint id and resolved index.
    pub wref: Option<String>,
    pub wref_ix: Option<usize>,
}

/// Linear spring between two nodes.
#[derive(Clone, Debug)]
pub struct SpringLoad {
    pub id: String,
    pub p1: String,
    pub p2: String,
    pub p1_ix: usize,
    pub p2_ix: usize,
    /// Spring rate.
    pub k: f64,
    /// Rest length.
    pub len0: f64,
}

impl Load {
    pub fn id(&self) -> &str {
        match self {
            Load::Force(f) => &f.id,
            Load::Spring(s) => &s.id,
        }
    }

    /// Whether this load references the given node id.
    pub fn references_node(&self, node: &str) -> bool {
        match self {
            Load::Force(f) => f.node == node,
            Load::Spring(s) => s.p1 == node || s.p2 == node,
        }
    }

    /// Whether this load references the given constraint id.
    pub fn references_constraint(&self, constraint: &str) -> bool {
        match self {
            Load::Force(f) => f.wref.as_deref() == Some(constraint),
            Load::Spring(_) => false,
        }
    }
}

impl ForceLoad {
    /// Force orientation given the referenced constraint's current
    /// orientation, if any.
    pub fn orientation(&self, ref_w: Option<f64>) -> f64 {
        self.w0 + ref_w.unwrap_or(0.0)
    }

    /// Write the force into the target node's accumulator.
    pub fn apply(&self, nodes: &mut [Node], ref_w: Option<f64>) {
        let dir = Vec2::from_angle(self.orientation(ref_w));
        nodes[self.node_ix].apply_force(dir.scale(self.value));
    }

    pub fn draw<R: Renderer>(&self, nodes: &[Node], renderer: &mut R) {
        let at = nodes[self.node_ix].pos;
        renderer.load(at, Vec2::from_angle(self.w0));
    }
}

impl SpringLoad {
    /// Current length of the spring.
    pub fn len(&self, nodes: &[Node]) -> f64 {
        nodes[self.p1_ix].pos.distance(nodes[self.p2_ix].pos)
    }

    /// Write equal and opposite forces along the line of action.
    pub fn apply(&self, nodes: &mut [Node]) {
        let d = nodes[self.p2_ix].pos - nodes[self.p1_ix].pos;
        let len = d.length();
        if len < 1e-12 {
            return; // no line of action
        }
        let f = d.scale(self.k * (len - self.len0) / len);
        nodes[self.p1_ix].apply_force(f);
        nodes[self.p2_ix].apply_force(-f);
    }

    /// Strain energy stored in the spring.
    pub fn energy(&self, nodes: &[Node]) -> f64 {
        let stretch = self.len(nodes) - self.len0;
        0.5 * self.k * stretch * stretch
    }

    pub fn draw<R: Renderer>(&self, nodes: &[Node], renderer: &mut R) {
        renderer.bar(nodes[self.p1_ix].pos, nodes[self.p2_ix].pos);
    }
}
