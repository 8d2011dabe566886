//! Sections
//!
//! A [`Section`] anchors a sketch or a text outline to a [`Frame`] and labels
//! the wires of its region for lofting.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use pf_kernel::Shape;

use crate::error::ModelResult;
use crate::frame::Frame;
use crate::session::Session;
use crate::sketch::{Sketch, Text};

/// Connection group a wire belongs to
///
/// Auto-indexed wires never share a group with a character label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GroupLabel {
    /// Position of the wire among its section's outer (or inner) wires
    Index(usize),
    /// One character of a user label string
    Named(char),
}

impl std::fmt::Display for GroupLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupLabel::Index(i) => write!(f, "#{i}"),
            GroupLabel::Named(c) => write!(f, "'{c}'"),
        }
    }
}

/// Wire group labels of a section
///
/// The i-th entry labels the i-th outer (resp. inner) wire in face traversal
/// order. Each character of an entry names one group, so a wire may join
/// several groups. `None` or a missing entry auto-indexes the wire; an empty
/// string leaves it out of every group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireGroups {
    pub outer: Option<Vec<String>>,
    pub inner: Option<Vec<String>>,
}

impl WireGroups {
    pub fn new<S: Into<String>>(
        outer: impl IntoIterator<Item = S>,
        inner: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            outer: Some(outer.into_iter().map(Into::into).collect()),
            inner: Some(inner.into_iter().map(Into::into).collect()),
        }
    }

    pub fn outer<S: Into<String>>(labels: impl IntoIterator<Item = S>) -> Self {
        Self {
            outer: Some(labels.into_iter().map(Into::into).collect()),
            inner: None,
        }
    }

    pub fn outer_labels(&self, index: usize) -> Vec<GroupLabel> {
        labels_for(self.outer.as_deref(), index)
    }

    pub fn inner_labels(&self, index: usize) -> Vec<GroupLabel> {
        labels_for(self.inner.as_deref(), index)
    }
}

/// A wire joins each named group at most once
fn labels_for(entries: Option<&[String]>, index: usize) -> Vec<GroupLabel> {
    match entries.and_then(|e| e.get(index)) {
        Some(entry) => entry
            .chars()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(GroupLabel::Named)
            .collect(),
        None => vec![GroupLabel::Index(index)],
    }
}

/// What a section draws
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SectionContent {
    Sketch(Sketch),
    Text(Text),
}

impl From<Sketch> for SectionContent {
    fn from(sketch: Sketch) -> Self {
        SectionContent::Sketch(sketch)
    }
}

impl From<Text> for SectionContent {
    fn from(text: Text) -> Self {
        SectionContent::Text(text)
    }
}

/// 2D content placed on a frame
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub frame: Frame,
    pub content: SectionContent,
    pub wire_groups: WireGroups,
}

impl Section {
    pub fn new(frame: Frame, content: impl Into<SectionContent>) -> Self {
        Self {
            frame,
            content: content.into(),
            wire_groups: WireGroups::default(),
        }
    }

    pub fn with_wire_groups(mut self, wire_groups: WireGroups) -> Self {
        self.wire_groups = wire_groups;
        self
    }

    /// Region of the content in the canonical XY plane
    pub fn local_region(&self, session: &Session) -> ModelResult<Shape> {
        match &self.content {
            SectionContent::Sketch(sketch) => session.evaluate(sketch),
            SectionContent::Text(text) => Ok(session.text_outline(text)?.region),
        }
    }

    /// Region moved into the section's frame
    pub fn placed_region(&self, session: &Session) -> ModelResult<Shape> {
        let local = self.local_region(session)?;
        self.frame.place(session.kernel(), local)
    }
}
