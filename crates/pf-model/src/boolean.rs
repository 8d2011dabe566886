//! Boolean combiner
//!
//! Collects shapes with a fuse/cut operation and reduces them left to right.

use pf_kernel::{GeometryKernel, Shape};

use crate::error::{GeometryOp, ModelError, ModelResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BooleanOp {
    Fuse,
    Cut,
}

/// One queued operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BooleanStep {
    pub shape: Shape,
    pub op: BooleanOp,
}

/// Sort key applied (stably) to the steps before reduction
pub type SortFilter = fn(&BooleanStep) -> u8;

/// Ordered list of boolean operands
///
/// The first step (after sorting) is the base shape; its operation is ignored.
#[derive(Debug, Clone, Default)]
pub struct BooleanBuilder {
    steps: Vec<BooleanStep>,
    sort_filter: Option<SortFilter>,
}

impl BooleanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sort_filter(sort_filter: SortFilter) -> Self {
        Self {
            steps: Vec::new(),
            sort_filter: Some(sort_filter),
        }
    }

    /// Every fuse runs before any cut
    pub fn fuse_before_cut() -> Self {
        Self::with_sort_filter(|step| match step.op {
            BooleanOp::Fuse => 0,
            BooleanOp::Cut => 1,
        })
    }

    pub fn add(&mut self, shape: Shape, op: BooleanOp) -> &mut Self {
        self.steps.push(BooleanStep { shape, op });
        self
    }

    pub fn fuse(&mut self, shape: Shape) -> &mut Self {
        self.add(shape, BooleanOp::Fuse)
    }

    pub fn cut(&mut self, shape: Shape) -> &mut Self {
        self.add(shape, BooleanOp::Cut)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps in reduction order
    pub fn ordered_steps(&self) -> Vec<BooleanStep> {
        let mut steps = self.steps.clone();
        if let Some(key) = self.sort_filter {
            steps.sort_by_key(key);
        }
        steps
    }

    pub fn build(&self, kernel: &dyn GeometryKernel, fuzzy: f64) -> ModelResult<Shape> {
        let steps = self.ordered_steps();
        let (first, rest) = steps.split_first().ok_or(ModelError::EmptyBooleanSet)?;

        let mut shape = first.shape;
        for step in rest {
            let (outcome, op) = match step.op {
                BooleanOp::Fuse => (kernel.fuse(shape, step.shape, fuzzy)?, GeometryOp::Fuse),
                BooleanOp::Cut => (kernel.cut(shape, step.shape, fuzzy)?, GeometryOp::Cut),
            };
            if !outcome.done {
                return Err(ModelError::GeometryOperationFailed {
                    op,
                    operands: vec![shape, step.shape],
                });
            }
            shape = outcome.shape;
        }
        tracing::debug!(operands = steps.len(), "Boolean combination built");
        Ok(shape)
    }
}
