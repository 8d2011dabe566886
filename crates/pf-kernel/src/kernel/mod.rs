//! Geometry kernel abstraction
//!
//! The `GeometryKernel` trait is the seam between the modeling layer and a
//! B-rep backend. The faceted `MeshKernel` is the reference backend.

mod traits;

#[cfg(feature = "mesh")]
mod mesh;

pub use traits::*;

#[cfg(feature = "mesh")]
pub use mesh::{MeshKernel, MeshKernelConfig};
