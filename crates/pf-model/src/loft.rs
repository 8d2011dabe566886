//! Multi-section lofting
//!
//! Wires of every section are labelled through [`WireGroups`], gathered per
//! label across sections, and every combination of one wire per contributing
//! section is lofted. Path solids of a group are fused; outer groups are then
//! fused together before inner groups are cut away.
//!
//! [`WireGroups`]: crate::section::WireGroups

use std::collections::BTreeMap;

use pf_kernel::Shape;

use crate::boolean::BooleanBuilder;
use crate::config::LoftConfig;
use crate::constants::LOFT_PATH_WARNING_THRESHOLD;
use crate::error::{GeometryOp, ModelError, ModelResult};
use crate::section::{GroupLabel, Section};
use crate::session::Session;

/// Labelled wires of one section, in face traversal order
#[derive(Debug, Clone, PartialEq)]
pub struct SectionWires<W> {
    pub outer: Vec<(W, Vec<GroupLabel>)>,
    pub inner: Vec<(W, Vec<GroupLabel>)>,
}

impl<W> Default for SectionWires<W> {
    fn default() -> Self {
        Self {
            outer: Vec::new(),
            inner: Vec::new(),
        }
    }
}

/// Wires of one group: one list per section that contributes to it
#[derive(Debug, Clone, PartialEq)]
pub struct GroupWires<W> {
    pub outer: Vec<Vec<W>>,
    pub inner: Vec<Vec<W>>,
}

impl<W> Default for GroupWires<W> {
    fn default() -> Self {
        Self {
            outer: Vec::new(),
            inner: Vec::new(),
        }
    }
}

/// Wires of every group, keyed and ordered by label
pub type LoftGroups<W> = BTreeMap<GroupLabel, GroupWires<W>>;

/// Gather labelled wires per group across sections, preserving section order
pub fn group_wires<W: Clone>(sections: &[SectionWires<W>]) -> LoftGroups<W> {
    let mut groups = LoftGroups::new();
    for section in sections {
        for (label, wires) in by_label(&section.outer) {
            groups.entry(label).or_default().outer.push(wires);
        }
        for (label, wires) in by_label(&section.inner) {
            groups.entry(label).or_default().inner.push(wires);
        }
    }
    groups
}

fn by_label<W: Clone>(wires: &[(W, Vec<GroupLabel>)]) -> BTreeMap<GroupLabel, Vec<W>> {
    let mut map: BTreeMap<GroupLabel, Vec<W>> = BTreeMap::new();
    for (wire, labels) in wires {
        for label in labels {
            map.entry(*label).or_default().push(wire.clone());
        }
    }
    map
}

/// Cartesian product of the per-section lists, first section varying slowest
pub fn expand_paths<W: Clone>(lists: &[Vec<W>]) -> Vec<Vec<W>> {
    let mut paths: Vec<Vec<W>> = vec![Vec::with_capacity(lists.len())];
    for list in lists {
        paths = paths
            .iter()
            .flat_map(|path| {
                list.iter().map(move |wire| {
                    let mut next = path.clone();
                    next.push(wire.clone());
                    next
                })
            })
            .collect();
    }
    paths
}

/// Through-sections solid over an ordered list of sections
#[derive(Debug, Clone)]
pub struct LoftBuilder {
    sections: Vec<Section>,
    ruled: bool,
    solid: bool,
    precision: f64,
}

impl Default for LoftBuilder {
    fn default() -> Self {
        Self::from_config(&LoftConfig::default())
    }
}

impl LoftBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &LoftConfig) -> Self {
        Self {
            sections: Vec::new(),
            ruled: config.ruled,
            solid: config.solid,
            precision: config.precision,
        }
    }

    pub fn ruled(mut self, ruled: bool) -> Self {
        self.ruled = ruled;
        self
    }

    pub fn solid(mut self, solid: bool) -> Self {
        self.solid = solid;
        self
    }

    pub fn precision(mut self, precision: f64) -> Self {
        self.precision = precision;
        self
    }

    pub fn add(&mut self, section: Section) -> &mut Self {
        self.sections.push(section);
        self
    }

    pub fn extend(&mut self, sections: impl IntoIterator<Item = Section>) -> &mut Self {
        self.sections.extend(sections);
        self
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn settings(&self) -> LoftConfig {
        LoftConfig {
            ruled: self.ruled,
            solid: self.solid,
            precision: self.precision,
        }
    }

    /// Placed and labelled wires of one section
    fn decompose(
        &self,
        session: &Session,
        index: usize,
        section: &Section,
    ) -> ModelResult<SectionWires<Shape>> {
        let kernel = session.kernel();
        let region = section.placed_region(session)?;
        if !region.is_compound() {
            return Err(ModelError::MalformedSection(format!(
                "section {index} evaluated to a {} instead of a compound",
                region.kind
            )));
        }
        let faces = kernel.faces(region)?;
        if faces.is_empty() {
            return Err(ModelError::MalformedSection(format!(
                "section {index} has no faces"
            )));
        }

        let mut wires = SectionWires::default();
        for face in faces {
            let face_wires = kernel.face_wires(face)?;
            let labels = section.wire_groups.outer_labels(wires.outer.len());
            wires.outer.push((face_wires.outer, labels));
            for inner in face_wires.inner {
                let labels = section.wire_groups.inner_labels(wires.inner.len());
                wires.inner.push((inner, labels));
            }
        }
        tracing::debug!(
            index,
            outer = wires.outer.len(),
            inner = wires.inner.len(),
            "Decomposed loft section"
        );
        Ok(wires)
    }

    /// Wires of every group across all sections
    pub fn groups(&self, session: &Session) -> ModelResult<LoftGroups<Shape>> {
        let sections = self
            .sections
            .iter()
            .enumerate()
            .map(|(index, section)| self.decompose(session, index, section))
            .collect::<ModelResult<Vec<_>>>()?;
        Ok(group_wires(&sections))
    }

    /// Fused loft of every path through `lists`
    fn group_solid(
        &self,
        session: &Session,
        label: GroupLabel,
        lists: &[Vec<Shape>],
    ) -> ModelResult<Shape> {
        let kernel = session.kernel();
        let paths = expand_paths(lists);
        if paths.len() > LOFT_PATH_WARNING_THRESHOLD {
            tracing::warn!(
                %label,
                paths = paths.len(),
                "Loft group expands to many paths"
            );
        }

        let mut builder = BooleanBuilder::new();
        for path in &paths {
            let outcome = kernel.loft(path, self.ruled, self.solid, self.precision)?;
            if !outcome.done {
                return Err(ModelError::GeometryOperationFailed {
                    op: GeometryOp::Loft,
                    operands: path.clone(),
                });
            }
            builder.fuse(outcome.shape);
        }
        tracing::debug!(%label, paths = paths.len(), "Lofted group");
        builder.build(kernel, session.config().fuzzy_tolerance)
    }

    pub fn build(&self, session: &Session) -> ModelResult<Shape> {
        if self.sections.len() < 2 {
            return Err(ModelError::NotEnoughSections(self.sections.len()));
        }
        let groups = self.groups(session)?;
        if let Some((label, _)) = groups.iter().find(|(_, wires)| wires.outer.is_empty()) {
            return Err(ModelError::EmptyLoftGroup(*label));
        }
        tracing::info!(
            sections = self.sections.len(),
            groups = groups.len(),
            "Building loft"
        );

        let mut assembly = BooleanBuilder::fuse_before_cut();
        for (label, wires) in &groups {
            assembly.fuse(self.group_solid(session, *label, &wires.outer)?);
            if !wires.inner.is_empty() {
                assembly.cut(self.group_solid(session, *label, &wires.inner)?);
            }
        }
        assembly.build(session.kernel(), session.config().fuzzy_tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Frame, Transform};
    use crate::section::WireGroups;
    use crate::sketch::{Arc, Face, LineSegment, Polyline, Sketch};
    use crate::testing::CountingKernel;
    use approx::assert_relative_eq;
    use glam::DVec2;
    use std::f64::consts::PI;
    use std::sync::Arc as Shared;

    fn labelled(wires: &[(&'static str, &str)]) -> SectionWires<&'static str> {
        let groups = WireGroups::outer(wires.iter().map(|(_, l)| *l));
        SectionWires {
            outer: wires
                .iter()
                .enumerate()
                .map(|(i, (w, _))| (*w, groups.outer_labels(i)))
                .collect(),
            inner: Vec::new(),
        }
    }

    #[test]
    fn test_group_coverage() {
        let sections = [
            labelled(&[("a0", "a"), ("b0", "b"), ("c0", "c")]),
            labelled(&[("a1", "a"), ("bc1", "bc")]),
        ];
        let groups = group_wires(&sections);
        assert_eq!(groups.len(), 3);

        let paths = |c| expand_paths(&groups[&GroupLabel::Named(c)].outer);
        assert_eq!(paths('a'), vec![vec!["a0", "a1"]]);
        assert_eq!(paths('b'), vec![vec!["b0", "bc1"]]);
        assert_eq!(paths('c'), vec![vec!["c0", "bc1"]]);
    }

    #[test]
    fn test_absent_label_skips_section() {
        let sections = [
            labelled(&[("a0", "a")]),
            labelled(&[("b1", "b")]),
            labelled(&[("a2", "a")]),
        ];
        let groups = group_wires(&sections);
        assert_eq!(
            groups[&GroupLabel::Named('a')].outer,
            vec![vec!["a0"], vec!["a2"]]
        );
        assert_eq!(groups[&GroupLabel::Named('b')].outer, vec![vec!["b1"]]);
    }

    #[test]
    fn test_cross_product_order() {
        let paths = expand_paths(&[vec![1, 2], vec![3], vec![4, 5]]);
        assert_eq!(
            paths,
            vec![vec![1, 3, 4], vec![1, 3, 5], vec![2, 3, 4], vec![2, 3, 5]]
        );
        assert!(expand_paths(&[vec![1], Vec::<i32>::new()]).is_empty());
    }

    fn at_height(z: f64) -> Frame {
        Frame::build(None, &[Transform::translation(0.0, 0.0, z)]).unwrap()
    }

    fn square(center: DVec2, side: f64) -> Sketch {
        Sketch::new(vec![Face::add(vec![Polyline::rectangle(center, side, side).into()])])
    }

    #[test]
    fn test_prism_like_loft() {
        let session = Session::default();
        let mut loft = LoftBuilder::new();
        loft.add(Section::new(at_height(0.0), square(DVec2::ZERO, 2.0)))
            .add(Section::new(at_height(2.0), square(DVec2::ZERO, 2.0)));
        let solid = loft.build(&session).unwrap();
        assert_relative_eq!(session.kernel().volume(solid).unwrap(), 8.0, epsilon = 1e-6);
    }

    #[test]
    fn test_merging_wires_loft_each_path() {
        let kernel = Shared::new(CountingKernel::new());
        let session = Session::new(kernel.clone());
        let two = Sketch::new(vec![
            Face::add(vec![Polyline::rectangle(DVec2::new(-2.0, 0.0), 1.0, 1.0).into()]),
            Face::add(vec![Polyline::rectangle(DVec2::new(2.0, 0.0), 1.0, 1.0).into()]),
        ]);
        let bottom =
            Section::new(at_height(0.0), two).with_wire_groups(WireGroups::outer(["a", "b"]));
        let top = Section::new(at_height(3.0), square(DVec2::ZERO, 6.0))
            .with_wire_groups(WireGroups::outer(["ab"]));
        let mut loft = LoftBuilder::new();
        loft.add(bottom).add(top);

        let groups = loft.groups(&session).unwrap();
        assert_eq!(groups.len(), 2);
        let lofts = kernel.lofts();
        loft.build(&session).unwrap();
        assert_eq!(kernel.lofts() - lofts, 2);
    }

    #[test]
    fn test_tube_cuts_inner_group() {
        let session = Session::default();
        let annulus = Sketch::new(vec![
            Face::add(vec![Arc::circle(DVec2::ZERO, 2.0).into()]),
            Face::sub(vec![Arc::circle(DVec2::ZERO, 1.0).into()]),
        ]);
        let mut loft = LoftBuilder::new();
        loft.add(Section::new(at_height(0.0), annulus.clone()))
            .add(Section::new(at_height(4.0), annulus));
        let solid = loft.build(&session).unwrap();
        let volume = session.kernel().volume(solid).unwrap();
        assert_relative_eq!(volume, PI * 3.0 * 4.0, max_relative = 0.03);
    }

    #[test]
    fn test_inner_group_without_outer() {
        let session = Session::default();
        let annulus = Sketch::new(vec![
            Face::add(vec![Arc::circle(DVec2::ZERO, 2.0).into()]),
            Face::sub(vec![Arc::circle(DVec2::ZERO, 1.0).into()]),
        ]);
        let groups = WireGroups::new(["a"], ["x"]);
        let bottom = Section::new(at_height(0.0), annulus.clone()).with_wire_groups(groups.clone());
        let top = Section::new(at_height(1.0), annulus).with_wire_groups(groups);
        let mut loft = LoftBuilder::new();
        loft.add(bottom).add(top);
        assert!(matches!(
            loft.build(&session),
            Err(ModelError::EmptyLoftGroup(GroupLabel::Named('x')))
        ));
    }

    #[test]
    fn test_not_enough_sections() {
        let session = Session::default();
        let mut loft = LoftBuilder::new();
        loft.add(Section::new(Frame::world(), square(DVec2::ZERO, 1.0)));
        assert!(matches!(
            loft.build(&session),
            Err(ModelError::NotEnoughSections(1))
        ));
    }

    #[test]
    fn test_section_without_faces() {
        let session = Session::default();
        let mut loft = LoftBuilder::new();
        loft.add(Section::new(at_height(0.0), Sketch::default()))
            .add(Section::new(at_height(1.0), square(DVec2::ZERO, 1.0)));
        assert!(matches!(
            loft.build(&session),
            Err(ModelError::MalformedSection(_))
        ));
    }

    #[test]
    fn test_unclosed_section_is_malformed() {
        let session = Session::default();
        let open = Sketch::new(vec![Face::add(vec![
            LineSegment::new(DVec2::ZERO, DVec2::X).into(),
            LineSegment::new(DVec2::X, DVec2::ONE).into(),
        ])]);
        let mut loft = LoftBuilder::new();
        loft.add(Section::new(at_height(0.0), open))
            .add(Section::new(at_height(1.0), square(DVec2::ZERO, 1.0)));
        assert!(matches!(
            loft.build(&session),
            Err(ModelError::MalformedSection(_))
        ));
    }

    #[test]
    fn test_repeated_label_character_lofts_once() {
        let kernel = Shared::new(CountingKernel::new());
        let session = Session::new(kernel.clone());
        let bottom = Section::new(at_height(0.0), square(DVec2::ZERO, 2.0))
            .with_wire_groups(WireGroups::outer(["aa"]));
        let top = Section::new(at_height(2.0), square(DVec2::ZERO, 2.0))
            .with_wire_groups(WireGroups::outer(["a"]));
        let mut loft = LoftBuilder::new();
        loft.add(bottom).add(top);

        let groups = loft.groups(&session).unwrap();
        let counts: Vec<usize> = groups[&GroupLabel::Named('a')]
            .outer
            .iter()
            .map(Vec::len)
            .collect();
        assert_eq!(counts, vec![1, 1]);

        let solid = loft.build(&session).unwrap();
        assert_eq!(kernel.lofts(), 1);
        assert_relative_eq!(session.kernel().volume(solid).unwrap(), 8.0, epsilon = 1e-6);
    }

    #[test]
    fn test_group_in_one_section_fails_loft() {
        let session = Session::default();
        let two = Sketch::new(vec![
            Face::add(vec![Polyline::rectangle(DVec2::new(-2.0, 0.0), 1.0, 1.0).into()]),
            Face::add(vec![Polyline::rectangle(DVec2::new(2.0, 0.0), 1.0, 1.0).into()]),
        ]);
        let mut loft = LoftBuilder::new();
        loft.add(Section::new(at_height(0.0), two))
            .add(Section::new(at_height(1.0), square(DVec2::ZERO, 1.0)));

        // Auto-indexed group #1 only exists in the first section
        let groups = loft.groups(&session).unwrap();
        assert_eq!(groups[&GroupLabel::Index(1)].outer.len(), 1);
        match loft.build(&session) {
            Err(ModelError::GeometryOperationFailed { op, operands }) => {
                assert_eq!(op, GeometryOp::Loft);
                assert_eq!(operands.len(), 1);
            }
            other => panic!("expected a failed loft, got {other:?}"),
        }
    }
}
