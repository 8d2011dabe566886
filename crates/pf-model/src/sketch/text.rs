//! Text outlines
//!
//! Glyph outlining is delegated to a [`GlyphOutliner`]; this module aligns the
//! raw outline, records its bounds and hull, and caches the result.

use std::collections::HashMap;

use geo::{ConvexHull, MultiPoint, Point};
use glam::{DAffine3, DVec2, DVec3};
use parking_lot::Mutex;
use pf_kernel::{Aabb, CadResult, GeometryKernel, Shape};
use serde::{Deserialize, Serialize};

use super::hash::{KeyHasher, SketchKey};
use crate::constants::{DEFAULT_FONT, DEFAULT_TEXT_SIZE};
use crate::error::{ModelError, ModelResult};

/// Horizontal placement of the outline relative to the local origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HAlign {
    /// Keep the outliner's placement
    #[default]
    None,
    Centered,
    /// Left edge on the origin
    Left,
    /// Right edge on the origin
    Right,
    /// Right edge on the origin, keeping the left side bearing as margin
    RightMargin,
}

/// Vertical placement of the outline relative to the local origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VAlign {
    #[default]
    None,
    Centered,
    Bottom,
    Top,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FontWeight {
    Regular,
    #[default]
    Bold,
}

/// Text primitive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub content: String,
    pub size: f64,
    pub h_align: HAlign,
    pub v_align: VAlign,
    /// Added after alignment
    pub offset: DVec2,
    pub font: String,
    pub weight: FontWeight,
}

impl Text {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            size: DEFAULT_TEXT_SIZE,
            h_align: HAlign::default(),
            v_align: VAlign::default(),
            offset: DVec2::ZERO,
            font: DEFAULT_FONT.to_string(),
            weight: FontWeight::default(),
        }
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    pub fn with_alignment(mut self, h_align: HAlign, v_align: VAlign) -> Self {
        self.h_align = h_align;
        self.v_align = v_align;
        self
    }

    pub fn with_offset(mut self, offset: DVec2) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_font(mut self, font: impl Into<String>, weight: FontWeight) -> Self {
        self.font = font.into();
        self.weight = weight;
        self
    }

    /// Structural key of every field
    pub fn key(&self) -> SketchKey {
        let h_align: &[u8] = match self.h_align {
            HAlign::None => b"none",
            HAlign::Centered => b"centered",
            HAlign::Left => b"left",
            HAlign::Right => b"right",
            HAlign::RightMargin => b"right_margin",
        };
        let v_align: &[u8] = match self.v_align {
            VAlign::None => b"none",
            VAlign::Centered => b"centered",
            VAlign::Bottom => b"bottom",
            VAlign::Top => b"top",
        };
        KeyHasher::new(b"text")
            .str(&self.content)
            .f64(self.size)
            .tag(h_align)
            .tag(v_align)
            .vec2(self.offset)
            .str(&self.font)
            .bool(self.weight == FontWeight::Bold)
            .finish()
    }

    /// Translation that applies alignment and offset to an outline with bounds `bb`
    ///
    /// The outline is also centered on z = 0.
    pub fn alignment_shift(&self, bb: &Aabb) -> DVec3 {
        let size = bb.size();
        let x = match self.h_align {
            HAlign::None => 0.0,
            HAlign::Centered => -bb.min.x - size.x * 0.5,
            HAlign::Left => -bb.min.x,
            HAlign::Right => -bb.min.x - size.x,
            HAlign::RightMargin => -bb.min.x * 2.0 - size.x,
        };
        let y = match self.v_align {
            VAlign::None => 0.0,
            VAlign::Centered => -bb.min.y - size.y * 0.5,
            VAlign::Bottom => -bb.min.y,
            VAlign::Top => -bb.min.y - size.y,
        };
        let z = -bb.min.z - size.z * 0.5;
        DVec3::new(x + self.offset.x, y + self.offset.y, z)
    }
}

/// Converts text into planar glyph outlines
pub trait GlyphOutliner: Send + Sync {
    /// Outline of `text.content` at `text.size` as faces in the XY plane,
    /// before any alignment
    fn outline(&self, kernel: &dyn GeometryKernel, text: &Text) -> CadResult<Shape>;
}

/// Aligned text region with its derived data
#[derive(Debug, Clone, PartialEq)]
pub struct TextOutline {
    pub region: Shape,
    pub bounds: Aabb,
    /// Counter-clockwise convex hull of the outline vertices in the XY plane
    pub hull: Vec<DVec2>,
}

/// Session-owned cache of aligned text outlines
#[derive(Debug, Default)]
pub struct TextCache {
    entries: Mutex<HashMap<SketchKey, TextOutline>>,
}

impl TextCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, text: &Text) -> Option<TextOutline> {
        self.entries.lock().get(&text.key()).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// Builds aligned text outlines through a glyph outliner
pub struct TextBuilder<'a> {
    kernel: &'a dyn GeometryKernel,
    outliner: Option<&'a dyn GlyphOutliner>,
    cache: &'a TextCache,
}

impl<'a> TextBuilder<'a> {
    pub fn new(
        kernel: &'a dyn GeometryKernel,
        outliner: Option<&'a dyn GlyphOutliner>,
        cache: &'a TextCache,
    ) -> Self {
        Self {
            kernel,
            outliner,
            cache,
        }
    }

    pub fn build(&self, text: &Text) -> ModelResult<TextOutline> {
        let key = text.key();
        if let Some(hit) = self.cache.entries.lock().get(&key) {
            tracing::debug!(%key, "Text cache hit");
            return Ok(hit.clone());
        }

        let outliner = self.outliner.ok_or_else(|| {
            ModelError::TextUnavailable(format!("no glyph outliner for {:?}", text.content))
        })?;
        let raw = outliner.outline(self.kernel, text)?;
        let shift = text.alignment_shift(&self.kernel.bounding_box(raw)?);
        let region = self
            .kernel
            .transform(raw, &DAffine3::from_translation(shift))?;

        let outline = TextOutline {
            region,
            bounds: self.kernel.bounding_box(region)?,
            hull: planar_hull(&self.kernel.vertices(region)?),
        };
        tracing::debug!(%key, content = %text.content, "Built text outline");
        self.cache.entries.lock().insert(key, outline.clone());
        Ok(outline)
    }
}

/// Convex hull of the vertices projected onto XY, without the closing point
fn planar_hull(vertices: &[DVec3]) -> Vec<DVec2> {
    if vertices.is_empty() {
        return Vec::new();
    }
    let points: MultiPoint<f64> = vertices.iter().map(|p| Point::new(p.x, p.y)).collect();
    let mut hull: Vec<DVec2> = points
        .convex_hull()
        .exterior()
        .coords()
        .map(|c| DVec2::new(c.x, c.y))
        .collect();
    if hull.len() > 1 && hull.first() == hull.last() {
        hull.pop();
    }
    hull
}
