//! Constraint-based 2D linkage simulation.
//!
//! `linkwork` models planar mechanisms as point-mass nodes joined by
//! joint-like constraints that fix or drive the relative orientation and
//! distance of node pairs, loaded by forces, springs, and gravity. Motion is
//! integrated with a semi-implicit Euler predictor followed by sequential
//! (Gauss-Seidel) impulse correction with warm-started impulses, the
//! approach used by real-time rigid-body engines, specialized to 1-DOF
//! joints and driven motion profiles.
//!
//! # Features
//!
//! - **Joints**: pin (rotational), slider (translational), and rigid
//!   composites of orientation/length sub-constraints
//! - **Drives**: closed-form motion profiles (linear through quintic) with
//!   bounce and repeat
//! - **Gearing**: sub-constraints chained to other constraints via ratios
//! - **Loads**: node forces, springs, and model gravity
//! - **Diagnostics**: degrees of freedom, energy, iteration counts, and
//!   severity-coded validation faults
//! - **Declarative**: JSON documents round-trip through [`Model::as_json`]
//!
//! # Example
//!
//! ```
//! use linkwork::{Model, SolverConfig};
//!
//! // A pendulum: a rigid link from a fixed anchor to a swinging mass.
//! let mut model = Model::from_json(r#"{
//!     "gravity": { "x": 0.0, "y": -10.0 },
//!     "nodes": [
//!         { "id": "A0", "x": 0, "y": 0, "base": true },
//!         { "id": "A1", "x": 100, "y": 0 }
//!     ],
//!     "constraints": [
//!         { "id": "c1", "p1": "A0", "p2": "A1", "len": { "type": "fixed" } }
//!     ]
//! }"#, SolverConfig::new()).expect("valid JSON");
//!
//! assert!(model.valid());
//! for _ in 0..60 {
//!     model.tick(1.0 / 60.0);
//! }
//! assert!(model.node("A1").unwrap().pos.y < 0.0);
//! ```

pub mod config;
pub mod constraint;
pub mod drive;
pub mod error;
pub mod load;
pub mod model;
pub mod node;
pub mod render;
pub mod schema;
pub mod vec;

// Re-export primary API
pub use config::SolverConfig;
pub use constraint::{Constraint, ConstraintKind, RefSpec, SubConstraint, SubKind, SubTarget};
pub use drive::{Drive, DriveFunc};
pub use error::{Fault, Severity};
pub use load::{ForceLoad, Load, SpringLoad};
pub use model::Model;
pub use node::Node;
pub use render::{NullRenderer, Renderer};
pub use schema::Document;
pub use vec::Vec2;
