//! Coordinate frames
//!
//! A [`Frame`] is an immutable, world-resolved coordinate system. Frames are
//! derived from a parent by applying [`Transform`]s expressed in the parent's
//! local coordinates; the result never shares state with the parent.

use std::sync::Arc;

use glam::{DAffine3, DQuat, DVec3};
use pf_kernel::{GeometryKernel, Shape};
use serde::{Deserialize, Serialize};

use crate::constants::AXIS_EPSILON;
use crate::error::{ModelError, ModelResult};

/// A frame-local transform step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Transform {
    /// Offsets along x_axis, y_axis and normal
    Translation(DVec3),
    /// Rotation about `axis` through `pivot`, both frame-local
    Rotation {
        angle_degrees: f64,
        axis: DVec3,
        pivot: DVec3,
    },
}

impl Transform {
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        Transform::Translation(DVec3::new(dx, dy, dz))
    }

    /// Rotation about the local +Z axis through the local origin
    pub fn rotation(angle_degrees: f64) -> Self {
        Self::rotation_about(angle_degrees, DVec3::Z)
    }

    pub fn rotation_about(angle_degrees: f64, axis: DVec3) -> Self {
        Transform::Rotation {
            angle_degrees,
            axis,
            pivot: DVec3::ZERO,
        }
    }

    /// Move the pivot of a rotation; translations are returned unchanged
    pub fn with_pivot(self, pivot: DVec3) -> Self {
        match self {
            Transform::Rotation {
                angle_degrees,
                axis,
                ..
            } => Transform::Rotation {
                angle_degrees,
                axis,
                pivot,
            },
            other => other,
        }
    }
}

/// World-resolved coordinate frame
#[derive(Debug, Clone)]
pub struct Frame {
    origin: DVec3,
    normal: DVec3,
    x_axis: DVec3,
    /// Frame this one was derived from, kept for inspection only
    parent: Option<Arc<Frame>>,
}

impl Default for Frame {
    fn default() -> Self {
        Self::world()
    }
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.origin == other.origin && self.normal == other.normal && self.x_axis == other.x_axis
    }
}

impl Frame {
    /// The canonical world frame: origin at zero, normal +Z, x_axis +X
    pub fn world() -> Self {
        Self {
            origin: DVec3::ZERO,
            normal: DVec3::Z,
            x_axis: DVec3::X,
            parent: None,
        }
    }

    /// Frame from explicit world axes
    ///
    /// `x_axis` is projected onto the plane of `normal` and both are normalized.
    pub fn from_axes(origin: DVec3, normal: DVec3, x_axis: DVec3) -> ModelResult<Self> {
        let (normal, x_axis) = orthonormalize(normal, x_axis)?;
        Ok(Self {
            origin,
            normal,
            x_axis,
            parent: None,
        })
    }

    /// Derive a frame from `parent` (or the world frame) by applying `transforms` in order
    pub fn build(parent: Option<&Frame>, transforms: &[Transform]) -> ModelResult<Frame> {
        let mut frame = match parent {
            Some(p) => Frame {
                origin: p.origin,
                normal: p.normal,
                x_axis: p.x_axis,
                parent: Some(Arc::new(p.clone())),
            },
            None => Frame::world(),
        };
        for transform in transforms {
            frame.apply(transform)?;
        }
        Ok(frame)
    }

    /// Shorthand for `Frame::build(Some(self), transforms)`
    pub fn transformed(&self, transforms: &[Transform]) -> ModelResult<Frame> {
        Frame::build(Some(self), transforms)
    }

    fn apply(&mut self, transform: &Transform) -> ModelResult<()> {
        match *transform {
            Transform::Translation(offset) => {
                self.origin += self.direction_to_global(offset);
            }
            Transform::Rotation {
                angle_degrees,
                axis,
                pivot,
            } => {
                let world_axis = self.direction_to_global(axis);
                if world_axis.length() < AXIS_EPSILON {
                    return Err(ModelError::DegenerateTransform(format!(
                        "rotation axis {axis} has zero length"
                    )));
                }
                if angle_degrees % 360.0 == 0.0 {
                    return Ok(());
                }
                let world_pivot = self.to_global(pivot);
                let rotation =
                    DQuat::from_axis_angle(world_axis.normalize(), angle_degrees.to_radians());
                let origin = world_pivot + rotation * (self.origin - world_pivot);
                let (normal, x_axis) =
                    orthonormalize(rotation * self.normal, rotation * self.x_axis)?;
                self.origin = origin;
                self.normal = normal;
                self.x_axis = x_axis;
            }
        }
        Ok(())
    }

    pub fn origin(&self) -> DVec3 {
        self.origin
    }

    pub fn normal(&self) -> DVec3 {
        self.normal
    }

    pub fn x_axis(&self) -> DVec3 {
        self.x_axis
    }

    /// `normal × x_axis`
    pub fn y_axis(&self) -> DVec3 {
        self.normal.cross(self.x_axis)
    }

    pub fn parent(&self) -> Option<&Frame> {
        self.parent.as_deref()
    }

    /// Map a point in local coordinates to world coordinates
    pub fn to_global(&self, local: DVec3) -> DVec3 {
        self.origin + self.direction_to_global(local)
    }

    /// Map a direction in local coordinates to world coordinates
    pub fn direction_to_global(&self, local: DVec3) -> DVec3 {
        local.x * self.x_axis + local.y * self.y_axis() + local.z * self.normal
    }

    /// Rigid local-to-world transform
    pub fn placement(&self) -> DAffine3 {
        DAffine3::from_cols(self.x_axis, self.y_axis(), self.normal, self.origin)
    }

    /// Sweep vector of length `distance` along the normal
    pub fn normal_offset(&self, distance: f64) -> DVec3 {
        self.normal * distance
    }

    /// Move a shape built in the canonical XY plane into this frame
    pub fn place(&self, kernel: &dyn GeometryKernel, shape: Shape) -> ModelResult<Shape> {
        Ok(kernel.transform(shape, &self.placement())?)
    }

    /// Compare origin and axes within `tolerance`
    pub fn approx_eq(&self, other: &Frame, tolerance: f64) -> bool {
        self.origin.abs_diff_eq(other.origin, tolerance)
            && self.normal.abs_diff_eq(other.normal, tolerance)
            && self.x_axis.abs_diff_eq(other.x_axis, tolerance)
    }
}

fn orthonormalize(normal: DVec3, x_axis: DVec3) -> ModelResult<(DVec3, DVec3)> {
    let normal = normal.try_normalize().ok_or_else(|| {
        ModelError::DegenerateTransform(format!("normal {normal} has zero length"))
    })?;
    let x_axis = (x_axis - normal * x_axis.dot(normal))
        .try_normalize()
        .ok_or_else(|| {
            ModelError::DegenerateTransform(format!("x axis {x_axis} is parallel to the normal"))
        })?;
    Ok((normal, x_axis))
}
