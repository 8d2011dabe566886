//! End-to-end modeling scenarios on the reference kernel

use std::f64::consts::PI;
use std::sync::Arc as Shared;

use approx::assert_relative_eq;
use glam::{DVec2, DVec3};
use pf_kernel::{CadResult, GeometryKernel, Shape};
use pf_model::{
    Arc, ExtrusionBuilder, Face, Frame, GlyphOutliner, GroupLabel, HAlign, ModelConfig, Polyline,
    Section, Session, Sketch, Text, Transform, VAlign, WireGroups,
};

fn annulus() -> Sketch {
    Sketch::new(vec![
        Face::add(vec![Arc::circle(DVec2::ZERO, 12.0).into()]),
        Face::sub(vec![Arc::circle(DVec2::ZERO, 3.0).into()]),
    ])
}

#[test]
fn annulus_region() {
    let session = Session::default();
    let region = session.evaluate(&annulus()).unwrap();
    let kernel = session.kernel();

    assert_relative_eq!(
        kernel.area(region).unwrap(),
        PI * (144.0 - 9.0),
        max_relative = 0.02
    );
    let bb = kernel.bounding_box(region).unwrap();
    assert!(bb.min.abs_diff_eq(DVec3::new(-12.0, -12.0, 0.0), 1e-6));
    assert!(bb.max.abs_diff_eq(DVec3::new(12.0, 12.0, 0.0), 1e-6));
}

#[test]
fn repeated_evaluation_hits_cache() {
    let session = Session::default();
    let first = session.evaluate(&annulus()).unwrap();
    let second = session.evaluate(&annulus()).unwrap();

    let kernel = session.kernel();
    assert_eq!(
        kernel.bounding_box(first).unwrap(),
        kernel.bounding_box(second).unwrap()
    );
    let stats = session.cache_stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
}

#[test]
fn disc_extrusion_volume() {
    let session = Session::default();
    let disc = Sketch::new(vec![Face::add(vec![Arc::circle(DVec2::ZERO, 1.0).into()])]);
    let section = Section::new(Frame::world(), disc);
    let solid = ExtrusionBuilder::new(&section)
        .build(&session, 4.0)
        .unwrap();
    assert_relative_eq!(
        session.kernel().volume(solid).unwrap(),
        PI * 4.0,
        max_relative = 0.02
    );
}

#[test]
fn annulus_extrusion_end_to_end() {
    let session = Session::default();
    let kernel = session.kernel();
    let section = Section::new(Frame::world(), annulus());

    let region = section.placed_region(&session).unwrap();
    let faces = kernel.faces(region).unwrap();
    assert_eq!(faces.len(), 1);
    assert_eq!(kernel.face_wires(faces[0]).unwrap().inner.len(), 1);

    let solid = ExtrusionBuilder::new(&section)
        .build(&session, 12.0)
        .unwrap();
    assert_relative_eq!(
        kernel.volume(solid).unwrap(),
        PI * (144.0 - 9.0) * 12.0,
        max_relative = 0.02
    );
}

#[test]
fn loft_groups_share_merged_wire() {
    let session = Session::default();
    let three = Sketch::new(
        [-4.0, 0.0, 4.0]
            .into_iter()
            .map(|x| Face::add(vec![Polyline::rectangle(DVec2::new(x, 0.0), 2.0, 2.0).into()]))
            .collect(),
    );
    let two = Sketch::new(vec![
        Face::add(vec![Polyline::rectangle(DVec2::new(-4.0, 0.0), 2.0, 2.0).into()]),
        Face::add(vec![Polyline::rectangle(DVec2::new(2.0, 0.0), 6.0, 2.0).into()]),
    ]);
    let lid = Frame::build(None, &[Transform::translation(0.0, 0.0, 5.0)]).unwrap();

    let bottom =
        Section::new(Frame::world(), three).with_wire_groups(WireGroups::outer(["a", "b", "c"]));
    let top = Section::new(lid, two).with_wire_groups(WireGroups::outer(["a", "bc"]));
    let mut loft = session.loft_builder();
    loft.add(bottom).add(top);

    let groups = loft.groups(&session).unwrap();
    assert_eq!(groups.len(), 3);
    for group in groups.values() {
        assert_eq!(group.outer.len(), 2);
        assert!(group.outer.iter().all(|wires| wires.len() == 1));
        assert!(group.inner.is_empty());
    }
    assert_eq!(
        groups[&GroupLabel::Named('b')].outer[1],
        groups[&GroupLabel::Named('c')].outer[1]
    );

    let solid = loft.build(&session).unwrap();
    assert!(session.kernel().volume(solid).unwrap() > 0.0);
}

/// Outlines every character as a 1 x size box
struct BlockGlyphs;

impl GlyphOutliner for BlockGlyphs {
    fn outline(&self, kernel: &dyn GeometryKernel, text: &Text) -> CadResult<Shape> {
        let mut faces = Vec::new();
        for (i, _) in text.content.chars().enumerate() {
            let x = i as f64 * 1.5;
            let wire = kernel.make_polygon(&[
                DVec2::new(x, 0.0),
                DVec2::new(x + 1.0, 0.0),
                DVec2::new(x + 1.0, text.size),
                DVec2::new(x, text.size),
            ])?;
            faces.push(kernel.make_face(wire, &[])?);
        }
        kernel.make_compound(&faces)
    }
}

#[test]
fn text_section_extrusion() {
    let session = Session::default().with_outliner(Shared::new(BlockGlyphs));
    let text = Text::new("HI")
        .with_size(3.0)
        .with_alignment(HAlign::Centered, VAlign::Bottom);
    let section = Section::new(Frame::world(), text);
    let solid = ExtrusionBuilder::new(&section)
        .build(&session, 2.0)
        .unwrap();

    let bb = session.kernel().bounding_box(solid).unwrap();
    assert!(bb.min.abs_diff_eq(DVec3::new(-1.25, 0.0, 0.0), 1e-9));
    assert!(bb.max.abs_diff_eq(DVec3::new(1.25, 3.0, 2.0), 1e-9));
    assert_relative_eq!(
        session.kernel().volume(solid).unwrap(),
        12.0,
        epsilon = 1e-9
    );
}

#[test]
fn config_from_ron_drives_session() {
    let config = ModelConfig::from_ron_str("(tessellation: (linear_deflection: 0.05))").unwrap();
    let session = Session::default().with_config(config);
    assert_eq!(session.config().tessellation.linear_deflection, 0.05);

    let coarse = ModelConfig::from_ron_str(
        "(tessellation: (linear_deflection: 10.0, angular_deflection: 1.0))",
    )
    .unwrap();
    let coarse = Session::default().with_config(coarse);

    let disc = Sketch::new(vec![Face::add(vec![Arc::circle(DVec2::ZERO, 1.0).into()])]);
    let fine_region = session.evaluate(&disc).unwrap();
    let coarse_region = coarse.evaluate(&disc).unwrap();
    let fine_mesh = session.tessellate(fine_region).unwrap();
    let coarse_mesh = coarse.tessellate(coarse_region).unwrap();
    assert!(coarse_mesh.triangle_count() > 0);
    assert!(fine_mesh.triangle_count() > coarse_mesh.triangle_count());
}
