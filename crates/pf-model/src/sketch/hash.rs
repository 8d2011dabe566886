//! Structural keys for the shape tree using BLAKE3
//!
//! key = hash(type tag || fields in declaration order || child keys in order)
//!
//! Equal trees always hash equal; reordering faces or elements changes the key.

use blake3::Hasher;
use glam::DVec2;
use serde::{Deserialize, Serialize};

/// 32-byte structural digest of a sketch or text node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SketchKey([u8; 32]);

impl SketchKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for SketchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short form is enough to tell entries apart in logs
        for byte in &self.0[..6] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Incremental structural hasher
pub(crate) struct KeyHasher(Hasher);

impl KeyHasher {
    pub fn new(tag: &[u8]) -> Self {
        let mut hasher = Hasher::new();
        hasher.update(&(tag.len() as u64).to_be_bytes());
        hasher.update(tag);
        Self(hasher)
    }

    pub fn tag(&mut self, tag: &[u8]) -> &mut Self {
        self.count(tag.len());
        self.0.update(tag);
        self
    }

    pub fn count(&mut self, len: usize) -> &mut Self {
        self.0.update(&(len as u64).to_be_bytes());
        self
    }

    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.0.update(&[value as u8]);
        self
    }

    /// Floats hash by value: both zeros agree and every NaN is one value
    pub fn f64(&mut self, value: f64) -> &mut Self {
        let canonical = if value == 0.0 {
            0.0f64
        } else if value.is_nan() {
            f64::NAN
        } else {
            value
        };
        self.0.update(&canonical.to_bits().to_be_bytes());
        self
    }

    pub fn vec2(&mut self, value: DVec2) -> &mut Self {
        self.f64(value.x).f64(value.y)
    }

    pub fn str(&mut self, value: &str) -> &mut Self {
        self.count(value.len());
        self.0.update(value.as_bytes());
        self
    }

    pub fn key(&mut self, key: &SketchKey) -> &mut Self {
        self.0.update(key.as_bytes());
        self
    }

    pub fn finish(&self) -> SketchKey {
        SketchKey(*self.0.finalize().as_bytes())
    }
}
