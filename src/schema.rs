//! Declarative model documents.
//!
//! A [`Document`] is the JSON-shaped description a mechanism is loaded from
//! and serialized back to. String ids cross-reference entities; resolution
//! to indices (including forward references between constraints) happens in
//! [`Model::init`]. Serializing a model and re-initializing the result
//! reproduces an equivalent initial pose.

use serde::{Deserialize, Serialize};

use crate::config::SolverConfig;
use crate::constraint::{Constraint, RefSpec, SubConstraint, SubKind, SubTarget};
use crate::drive::{Drive, DriveFunc};
use crate::load::{ForceLoad, Load, SpringLoad};
use crate::model::Model;
use crate::node::Node;
use crate::vec::Vec2;

fn is_false(b: &bool) -> bool {
    !*b
}

fn one() -> u32 {
    1
}

fn is_one(n: &u32) -> bool {
    *n == 1
}

/// Top-level declarative model document.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gravity: Option<GravityDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<NodeDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<ConstraintDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub loads: Vec<LoadDoc>,
}

/// Gravity vector; present means active.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct GravityDoc {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeDoc {
    pub id: String,
    pub x: f64,
    pub y: f64,
    /// Mass; defaults to 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub m: Option<f64>,
    /// Immovable anchor.
    #[serde(default, skip_serializing_if = "is_false")]
    pub base: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConstraintDoc {
    pub id: String,
    pub p1: String,
    pub p2: String,
    /// Orientation sub-constraint; free when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ori: Option<SubDoc>,
    /// Length sub-constraint; free when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub len: Option<SubDoc>,
}

/// Sub-constraint behavior tag.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubTypeDoc {
    Free,
    Fixed,
    Driven,
}

/// One sub-constraint of a declared constraint.
///
/// `w0`/`Dw` apply to orientation sub-constraints, `r0`/`Dr` to length
/// sub-constraints; initial values default to the initial geometry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubDoc {
    #[serde(rename = "type")]
    pub kind: SubTypeDoc,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w0: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r0: Option<f64>,
    /// Referenced constraint id for chained/geared targets.
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Which sub-constraint of the reference; defaults to the same kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reftype: Option<SubKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub func: Option<DriveFunc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t0: Option<f64>,
    #[serde(default, rename = "Dt", skip_serializing_if = "Option::is_none")]
    pub dt: Option<f64>,
    #[serde(default, rename = "Dw", skip_serializing_if = "Option::is_none")]
    pub dw: Option<f64>,
    #[serde(default, rename = "Dr", skip_serializing_if = "Option::is_none")]
    pub dr: Option<f64>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub bounce: bool,
    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub repeat: u32,
    /// Externally-driven input (static profile).
    #[serde(default, skip_serializing_if = "is_false")]
    pub input: bool,
}

impl SubDoc {
    fn to_sub(&self, which: SubKind) -> SubConstraint {
        let val0_spec = match which {
            SubKind::Ori => self.w0,
            SubKind::Len => self.r0,
        };
        let reference = self.reference.clone().map(|constraint| RefSpec {
            constraint,
            ix: 0,
            kind: self.reftype.unwrap_or(which),
            ratio: self.ratio.unwrap_or(1.0),
            passive: false,
        });
        let target = match self.kind {
            SubTypeDoc::Free => SubTarget::Free,
            SubTypeDoc::Fixed => SubTarget::Fixed { reference },
            SubTypeDoc::Driven => {
                let func = if self.input {
                    DriveFunc::Static
                } else {
                    self.func.unwrap_or(DriveFunc::Linear)
                };
                let dz = match which {
                    SubKind::Ori => self.dw,
                    SubKind::Len => self.dr,
                }
                .unwrap_or(0.0);
                let drive = Drive {
                    func,
                    t0: self.t0.unwrap_or(0.0),
                    dt: self.dt.unwrap_or(1.0),
                    dz,
                    z0: 0.0, // synced to the initial value at init
                    bounce: self.bounce,
                    repeat: self.repeat.max(1),
                };
                SubTarget::Driven { drive, reference, input: 0.0 }
            }
        };
        SubConstraint::new(target, val0_spec)
    }

    fn from_sub(sub: &SubConstraint, which: SubKind) -> Option<SubDoc> {
        let (w0, r0) = match which {
            SubKind::Ori => (Some(sub.val0), None),
            SubKind::Len => (None, Some(sub.val0)),
        };
        let mut doc = SubDoc {
            kind: SubTypeDoc::Free,
            w0,
            r0,
            reference: None,
            reftype: None,
            ratio: None,
            func: None,
            t0: None,
            dt: None,
            dw: None,
            dr: None,
            bounce: false,
            repeat: 1,
            input: false,
        };
        let reference = match &sub.target {
            SubTarget::Free => return None,
            SubTarget::Fixed { reference } => {
                doc.kind = SubTypeDoc::Fixed;
                reference
            }
            SubTarget::Driven { drive, reference, .. } => {
                doc.kind = SubTypeDoc::Driven;
                doc.func = Some(drive.func);
                doc.t0 = Some(drive.t0);
                doc.dt = Some(drive.dt);
                match which {
                    SubKind::Ori => doc.dw = Some(drive.dz),
                    SubKind::Len => doc.dr = Some(drive.dz),
                }
                doc.bounce = drive.bounce;
                doc.repeat = drive.repeat;
                doc.input = drive.func == DriveFunc::Static;
                reference
            }
        };
        if let Some(spec) = reference {
            doc.reference = Some(spec.constraint.clone());
            doc.reftype = Some(spec.kind);
            if spec.ratio != 1.0 {
                doc.ratio = Some(spec.ratio);
            }
        }
        Some(doc)
    }
}

/// A declared load.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LoadDoc {
    Force {
        id: String,
        /// Target node id.
        p: String,
        /// Force magnitude.
        value: f64,
        /// Orientation in radians; an offset when `wref` is set.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        w0: Option<f64>,
        /// Orientation-reference constraint id.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        wref: Option<String>,
    },
    Spring {
        id: String,
        p1: String,
        p2: String,
        /// Spring rate.
        k: f64,
        /// Rest length; defaults to the initial endpoint distance.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        len0: Option<f64>,
    },
}

impl Document {
    /// Parse a document from JSON text.
    pub fn from_json(json: &str) -> Result<Document, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize this document as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    fn node_pos(&self, id: &str) -> Option<Vec2> {
        self.nodes.iter().find(|n| n.id == id).map(|n| Vec2::new(n.x, n.y))
    }
}

impl Model {
    /// Construct a model from a declarative document. Cross-references stay
    /// unresolved until [`Model::init`]; a malformed document yields a model
    /// that records its faults there.
    pub fn from_document(doc: &Document, config: SolverConfig) -> Model {
        let mut model = Model::new(config);
        model.id = doc.id.clone();
        model.set_gravity(doc.gravity.map(|g| Vec2::new(g.x, g.y)));

        for n in &doc.nodes {
            let pos = Vec2::new(n.x, n.y);
            let node = if n.base {
                Node::base(&n.id, pos)
            } else {
                Node::new(&n.id, pos, n.m.unwrap_or(1.0))
            };
            model.push_node(node);
        }

        for c in &doc.constraints {
            let ori = c
                .ori
                .as_ref()
                .map_or_else(SubConstraint::free, |s| s.to_sub(SubKind::Ori));
            let len = c
                .len
                .as_ref()
                .map_or_else(SubConstraint::free, |s| s.to_sub(SubKind::Len));
            model.push_constraint(Constraint::new(&c.id, &c.p1, &c.p2, ori, len));
        }

        for l in &doc.loads {
            let load = match l {
                LoadDoc::Force { id, p, value, w0, wref } => Load::Force(ForceLoad {
                    id: id.clone(),
                    node: p.clone(),
                    node_ix: 0,
                    value: *value,
                    w0: w0.unwrap_or(0.0),
                    wref: wref.clone(),
                    wref_ix: None,
                }),
                LoadDoc::Spring { id, p1, p2, k, len0 } => {
                    let rest = len0.unwrap_or_else(|| {
                        match (doc.node_pos(p1), doc.node_pos(p2)) {
                            (Some(a), Some(b)) => a.distance(b),
                            _ => 0.0, // dangling endpoints fault at init
                        }
                    });
                    Load::Spring(SpringLoad {
                        id: id.clone(),
                        p1: p1.clone(),
                        p2: p2.clone(),
                        p1_ix: 0,
                        p2_ix: 0,
                        k: *k,
                        len0: rest,
                    })
                }
            };
            model.push_load(load);
        }

        model
    }

    /// Parse JSON, construct, and initialize. The `Err` case is a parse
    /// failure; validation faults are recorded on the returned model.
    pub fn from_json(json: &str, config: SolverConfig) -> Result<Model, serde_json::Error> {
        let doc = Document::from_json(json)?;
        let mut model = Model::from_document(&doc, config);
        model.init();
        Ok(model)
    }

    /// Snapshot this model as a declarative document describing its initial
    /// pose.
    pub fn as_document(&self) -> Document {
        Document {
            id: self.id.clone(),
            gravity: self.gravity().map(|g| GravityDoc { x: g.x, y: g.y }),
            nodes: self
                .nodes()
                .iter()
                .map(|n| NodeDoc {
                    id: n.id.clone(),
                    x: n.pos0.x,
                    y: n.pos0.y,
                    m: (!n.base && n.mass != 1.0).then_some(n.mass),
                    base: n.base,
                })
                .collect(),
            constraints: self
                .constraints()
                .iter()
                .map(|c| ConstraintDoc {
                    id: c.id.clone(),
                    p1: c.p1.clone(),
                    p2: c.p2.clone(),
                    ori: SubDoc::from_sub(&c.ori, SubKind::Ori),
                    len: SubDoc::from_sub(&c.len, SubKind::Len),
                })
                .collect(),
            loads: self
                .loads()
                .iter()
                .map(|load| match load {
                    Load::Force(f) => LoadDoc::Force {
                        id: f.id.clone(),
                        p: f.node.clone(),
                        value: f.value,
                        w0: (f.w0 != 0.0).then_some(f.w0),
                        wref: f.wref.clone(),
                    },
                    Load::Spring(s) => LoadDoc::Spring {
                        id: s.id.clone(),
                        p1: s.p1.clone(),
                        p2: s.p2.clone(),
                        k: s.k,
                        len0: Some(s.len0),
                    },
                })
                .collect(),
        }
    }

    /// Serialize this model's initial pose as pretty-printed JSON.
    pub fn as_json(&self) -> Result<String, serde_json::Error> {
        self.as_document().to_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_document_parses() {
        let doc = Document::from_json(
            r#"{
                "nodes": [
                    { "id": "A0", "x": 0, "y": 0, "base": true },
                    { "id": "A1", "x": 100, "y": 0 }
                ],
                "constraints": [
                    { "id": "c1", "p1": "A0", "p2": "A1", "len": { "type": "fixed" } }
                ]
            }"#,
        )
        .expect("document should parse");
        assert_eq!(doc.nodes.len(), 2);
        assert!(doc.nodes[0].base);
        assert_eq!(doc.constraints[0].len.as_ref().map(|s| s.kind), Some(SubTypeDoc::Fixed));
        assert!(doc.constraints[0].ori.is_none());
    }

    #[test]
    fn drive_fields_round_trip() {
        let json = r#"{
            "nodes": [
                { "id": "A0", "x": 0, "y": 0, "base": true },
                { "id": "A1", "x": 1, "y": 0 }
            ],
            "constraints": [
                { "id": "c1", "p1": "A0", "p2": "A1",
                  "ori": { "type": "driven", "func": "linear", "t0": 0, "Dt": 2,
                           "Dw": 6.283185307179586, "bounce": true, "repeat": 2 },
                  "len": { "type": "fixed" } }
            ]
        }"#;
        let model = Model::from_json(json, SolverConfig::new()).expect("parse");
        assert!(model.valid(), "faults: {:?}", model.faults());
        let doc = model.as_document();
        let ori = doc.constraints[0].ori.as_ref().expect("ori sub present");
        assert_eq!(ori.kind, SubTypeDoc::Driven);
        assert!(ori.bounce);
        assert_eq!(ori.repeat, 2);
        assert_eq!(ori.dt, Some(2.0));
    }
}
