//! Extrusion of a section along its frame normal

use pf_kernel::Shape;

use crate::error::ModelResult;
use crate::section::Section;
use crate::session::Session;

/// Sweeps a section's region into a capped solid
#[derive(Debug, Clone)]
pub struct ExtrusionBuilder<'a> {
    section: &'a Section,
}

impl<'a> ExtrusionBuilder<'a> {
    pub fn new(section: &'a Section) -> Self {
        Self { section }
    }

    /// Prism of the placed region, `distance` along the frame normal
    ///
    /// A negative distance sweeps against the normal.
    pub fn build(&self, session: &Session, distance: f64) -> ModelResult<Shape> {
        let region = self.section.placed_region(session)?;
        let direction = self.section.frame.normal_offset(distance);
        tracing::debug!(%region, distance, "Extruding section");
        Ok(session.kernel().prism(region, direction)?)
    }
}
