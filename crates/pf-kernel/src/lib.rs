//! Geometry Kernel Abstraction
//!
//! This crate provides:
//! - The `GeometryKernel` trait and opaque shape handles
//! - A faceted pure-Rust reference backend (`mesh` feature)
//! - STL export of tessellated shapes

pub mod export;
pub mod kernel;

// Re-exports for convenience
pub use export::{save_stl, write_stl};
pub use kernel::{
    Aabb, CadError, CadResult, FaceWires, GeometryKernel, KernelOutcome, NullKernel, Shape,
    ShapeKind, TessellatedMesh, default_kernel,
};

#[cfg(feature = "mesh")]
pub use kernel::{MeshKernel, MeshKernelConfig};
