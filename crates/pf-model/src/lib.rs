//! Parametric Section and Loft Modeling
//!
//! This crate provides:
//! - Coordinate frames built from parent-relative transforms
//! - 2D sketches of boolean faces, evaluated and memoized per session
//! - Sections, extrusion and multi-section lofting with wire groups
//! - A boolean combiner for ordered fuse/cut reduction

pub mod boolean;
pub mod config;
pub mod constants;
pub mod error;
pub mod extrude;
pub mod frame;
pub mod loft;
pub mod section;
pub mod session;
pub mod sketch;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use boolean::{BooleanBuilder, BooleanOp, BooleanStep};
pub use config::{LoftConfig, ModelConfig, TessellationConfig};
pub use error::{GeometryOp, ModelError, ModelResult};
pub use extrude::ExtrusionBuilder;
pub use frame::{Frame, Transform};
pub use loft::{GroupWires, LoftBuilder, LoftGroups, SectionWires, expand_paths, group_wires};
pub use section::{GroupLabel, Section, SectionContent, WireGroups};
pub use session::Session;
pub use sketch::{
    Arc, Element, Face, FontWeight, GlyphOutliner, HAlign, LineSegment, Mode, Polyline,
    Primitive, Sketch, SketchKey, Text, TextOutline, VAlign,
};
