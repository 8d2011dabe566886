//! Modeling errors

use pf_kernel::{CadError, Shape};
use thiserror::Error;

use crate::section::GroupLabel;

/// Kernel operation that reported non-completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryOp {
    Fuse,
    Cut,
    Loft,
}

impl std::fmt::Display for GeometryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeometryOp::Fuse => f.write_str("fuse"),
            GeometryOp::Cut => f.write_str("cut"),
            GeometryOp::Loft => f.write_str("loft"),
        }
    }
}

/// Modeling-related errors
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("Degenerate transform: {0}")]
    DegenerateTransform(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Geometry operation {op} did not complete ({} operands)", operands.len())]
    GeometryOperationFailed {
        op: GeometryOp,
        operands: Vec<Shape>,
    },

    #[error("Malformed section: {0}")]
    MalformedSection(String),

    #[error("Loft group {0} has inner wires but no outer wires")]
    EmptyLoftGroup(GroupLabel),

    #[error("Boolean combination has no shapes")]
    EmptyBooleanSet,

    #[error("Loft needs at least two sections, got {0}")]
    NotEnoughSections(usize),

    #[error("Text outlines are unavailable: {0}")]
    TextUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File I/O error: {0}")]
    Io(String),

    #[error("Kernel error: {0}")]
    Kernel(#[from] CadError),
}

/// Result type for modeling operations
pub type ModelResult<T> = Result<T, ModelError>;
