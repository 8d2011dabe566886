//! Build session
//!
//! A [`Session`] owns the kernel handle, the configuration and the caches
//! shared by every build that runs through it. Dropping the session drops its
//! caches.

use std::path::Path;
use std::sync::Arc;

use pf_kernel::{GeometryKernel, Shape, TessellatedMesh, default_kernel};

use crate::config::ModelConfig;
use crate::error::ModelResult;
use crate::loft::LoftBuilder;
use crate::sketch::{
    CacheStats, EvalCache, GlyphOutliner, Sketch, SketchEvaluator, Text, TextBuilder, TextCache,
    TextOutline,
};

pub struct Session {
    kernel: Arc<dyn GeometryKernel>,
    config: ModelConfig,
    sketches: EvalCache,
    texts: TextCache,
    outliner: Option<Arc<dyn GlyphOutliner>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Arc::from(default_kernel()))
    }
}

impl Session {
    pub fn new(kernel: Arc<dyn GeometryKernel>) -> Self {
        tracing::debug!(kernel = kernel.name(), "Created modeling session");
        Self {
            kernel,
            config: ModelConfig::default(),
            sketches: EvalCache::new(),
            texts: TextCache::new(),
            outliner: None,
        }
    }

    pub fn with_config(mut self, config: ModelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_outliner(mut self, outliner: Arc<dyn GlyphOutliner>) -> Self {
        self.outliner = Some(outliner);
        self
    }

    pub fn kernel(&self) -> &dyn GeometryKernel {
        &*self.kernel
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn text_builder(&self) -> TextBuilder<'_> {
        TextBuilder::new(self.kernel(), self.outliner.as_deref(), &self.texts)
    }

    pub fn evaluator(&self) -> SketchEvaluator<'_> {
        SketchEvaluator::new(
            self.kernel(),
            &self.config,
            &self.sketches,
            self.text_builder(),
        )
    }

    /// Region of a sketch in its own XY plane, memoized per session
    pub fn evaluate(&self, sketch: &Sketch) -> ModelResult<Shape> {
        self.evaluator().evaluate(sketch)
    }

    pub fn text_outline(&self, text: &Text) -> ModelResult<TextOutline> {
        self.text_builder().build(text)
    }

    /// Loft builder seeded with the session's loft settings
    pub fn loft_builder(&self) -> LoftBuilder {
        LoftBuilder::from_config(&self.config.loft)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.sketches.stats()
    }

    pub fn clear_caches(&self) {
        self.sketches.clear();
        self.texts.clear();
    }

    pub fn tessellate(&self, shape: Shape) -> ModelResult<TessellatedMesh> {
        let t = &self.config.tessellation;
        Ok(self
            .kernel
            .tessellate(shape, t.linear_deflection, t.angular_deflection)?)
    }

    /// Tessellate `shape` and write it as binary STL
    pub fn export_stl(&self, shape: Shape, path: impl AsRef<Path>) -> ModelResult<()> {
        let mesh = self.tessellate(shape)?;
        pf_kernel::save_stl(&mesh, path)?;
        Ok(())
    }
}
