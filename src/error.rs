//! Validation and runtime faults for mechanism models.
//!
//! Faults are recorded on model state rather than thrown: `init()` and
//! `tick()` never panic or return errors. Each fault carries a stable
//! severity-coded identifier (`E_*` fatal, `W_*` warning) for callers that
//! surface diagnostics.

use thiserror::Error;

/// Fault severity. Fatal faults invalidate the model; warnings are recorded
/// and processing continues.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Severity {
    Fatal,
    Warning,
}

/// Faults that can be recorded during model validation or simulation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Fault {
    /// Duplicate entity id.
    #[error("duplicate id '{id}'")]
    DuplicateId {
        /// The id that appeared more than once.
        id: String,
    },

    /// Reference to an unknown node.
    #[error("unknown node '{node}' referenced by '{by}'")]
    UnknownNode {
        /// The node id that could not be resolved.
        node: String,
        /// The entity holding the dangling reference.
        by: String,
    },

    /// Reference to an unknown constraint.
    #[error("unknown constraint '{constraint}' referenced by '{by}'")]
    UnknownConstraint {
        /// The constraint id that could not be resolved.
        constraint: String,
        /// The entity holding the dangling reference.
        by: String,
    },

    /// Constraint endpoints are the same node.
    #[error("constraint '{id}' connects node '{node}' to itself")]
    SameNode {
        /// The offending constraint.
        id: String,
        /// The node used for both endpoints.
        node: String,
    },

    /// Near-zero finite mass.
    #[error("node '{id}' has near-zero mass {mass}")]
    InvalidMass {
        /// The offending node.
        id: String,
        /// The rejected mass value.
        mass: f64,
    },

    /// Near-zero spring rate.
    #[error("spring '{id}' has near-zero rate {rate}")]
    InvalidSpringRate {
        /// The offending load.
        id: String,
        /// The rejected rate value.
        rate: f64,
    },

    /// A driven sub-constraint references a free sub-constraint, which has
    /// no well-defined initial value to offset from.
    #[error("driven {sub} of constraint '{id}' references free {ref_sub} of '{reference}'")]
    DrivenRefFree {
        /// The offending constraint.
        id: String,
        /// The driven sub-constraint ("ori" or "len").
        sub: &'static str,
        /// The referenced constraint.
        reference: String,
        /// The referenced sub-constraint ("ori" or "len").
        ref_sub: &'static str,
    },

    /// Constraint references form a cycle.
    #[error("constraint reference cycle through '{id}'")]
    ReferenceCycle {
        /// A constraint on the detected cycle.
        id: String,
    },

    /// Non-positive drive duration.
    #[error("drive on {sub} of constraint '{id}' has non-positive duration {dt}")]
    InvalidDriveDuration {
        /// The offending constraint.
        id: String,
        /// The driven sub-constraint ("ori" or "len").
        sub: &'static str,
        /// The rejected duration.
        dt: f64,
    },

    /// Structural edit refused: the entity is still referenced.
    #[error("'{id}' is still referenced by '{by}'")]
    InUse {
        /// The entity that was to be removed.
        id: String,
        /// A dependent that references it.
        by: String,
    },

    /// Position assembly hit the iteration ceiling without convergence.
    #[error("position assembly did not converge within {itr_max} iterations at t={t}")]
    NotConverged {
        /// The iteration ceiling that was reached.
        itr_max: usize,
        /// Model time of the failure.
        t: f64,
    },

    /// Constraint endpoints coincide at init; orientation is arbitrary until
    /// the nodes separate.
    #[error("constraint '{id}' endpoints coincide")]
    Coincident {
        /// The offending constraint.
        id: String,
    },

    /// A ratio was given together with a driven sub-constraint's reference;
    /// the driven target formula has no ratio term, so it is ignored.
    #[error("ratio on driven {sub} of constraint '{id}' is ignored")]
    RatioIgnored {
        /// The offending constraint.
        id: String,
        /// The driven sub-constraint ("ori" or "len").
        sub: &'static str,
    },
}

impl Fault {
    /// Stable severity-coded identifier for this fault.
    pub fn code(&self) -> &'static str {
        match self {
            Fault::DuplicateId { .. } => "E_ID_DUP",
            Fault::UnknownNode { .. } => "E_NODE_REF",
            Fault::UnknownConstraint { .. } => "E_CON_REF",
            Fault::SameNode { .. } => "E_CON_NODES",
            Fault::InvalidMass { .. } => "E_MASS",
            Fault::InvalidSpringRate { .. } => "E_SPRING_RATE",
            Fault::DrivenRefFree { .. } => "E_REF_FREE",
            Fault::ReferenceCycle { .. } => "E_REF_CYCLE",
            Fault::InvalidDriveDuration { .. } => "E_DRIVE_DURATION",
            Fault::InUse { .. } => "E_IN_USE",
            Fault::NotConverged { .. } => "E_NOT_CONVERGED",
            Fault::Coincident { .. } => "W_COINCIDENT",
            Fault::RatioIgnored { .. } => "W_RATIO_IGNORED",
        }
    }

    /// Severity derived from the identifier prefix.
    pub fn severity(&self) -> Severity {
        if self.code().starts_with("E_") {
            Severity::Fatal
        } else {
            Severity::Warning
        }
    }

    /// Whether this fault invalidates the model.
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Create an unknown-node fault.
    pub fn unknown_node(node: impl Into<String>, by: impl Into<String>) -> Self {
        Fault::UnknownNode { node: node.into(), by: by.into() }
    }

    /// Create an unknown-constraint fault.
    pub fn unknown_constraint(constraint: impl Into<String>, by: impl Into<String>) -> Self {
        Fault::UnknownConstraint { constraint: constraint.into(), by: by.into() }
    }

    /// Create a duplicate-id fault.
    pub fn duplicate_id(id: impl Into<String>) -> Self {
        Fault::DuplicateId { id: id.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_severities() {
        let f = Fault::unknown_node("B", "c1");
        assert_eq!(f.code(), "E_NODE_REF");
        assert_eq!(f.severity(), Severity::Fatal);

        let w = Fault::Coincident { id: "c2".into() };
        assert_eq!(w.code(), "W_COINCIDENT");
        assert_eq!(w.severity(), Severity::Warning);
        assert!(!w.is_fatal());
    }

    #[test]
    fn display_carries_context() {
        let f = Fault::DrivenRefFree {
            id: "c1".into(),
            sub: "ori",
            reference: "c2".into(),
            ref_sub: "ori",
        };
        let text = f.to_string();
        assert!(text.contains("c1"));
        assert!(text.contains("c2"));
        assert!(text.contains("ori"));
    }
}
