//! Draw hooks for external rendering collaborators.
//!
//! The simulator never draws; entities expose read-only `draw` methods that
//! feed primitives to whatever [`Renderer`] the caller supplies. All methods
//! have default no-op implementations.

use crate::vec::Vec2;

/// Receiver for mechanism draw primitives.
pub trait Renderer {
    /// A node marker; `base` marks an immovable anchor.
    fn node(&mut self, _at: Vec2, _base: bool) {}

    /// A constraint bar between two nodes.
    fn bar(&mut self, _from: Vec2, _to: Vec2) {}

    /// A load glyph (force arrow or spring) attached at a point.
    fn load(&mut self, _at: Vec2, _direction: Vec2) {}

    /// A text label near a point.
    fn label(&mut self, _at: Vec2, _text: &str) {}
}

/// A renderer that draws nothing. Use when no visualization is attached.
pub struct NullRenderer;

impl Renderer for NullRenderer {}
