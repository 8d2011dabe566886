//! Modeling configuration
//!
//! Tolerances and default loft/tessellation settings, stored as RON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CLOSING_TOLERANCE, DEFAULT_FUZZY_TOLERANCE, DEFAULT_LOFT_PRECISION,
};
use crate::error::{ModelError, ModelResult};

/// Top-level configuration of a modeling session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Fuzzy tolerance passed to kernel booleans
    pub fuzzy_tolerance: f64,
    /// Polylines whose ends are farther apart than this get a closing vertex
    pub closing_tolerance: f64,
    pub loft: LoftConfig,
    pub tessellation: TessellationConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            fuzzy_tolerance: DEFAULT_FUZZY_TOLERANCE,
            closing_tolerance: DEFAULT_CLOSING_TOLERANCE,
            loft: LoftConfig::default(),
            tessellation: TessellationConfig::default(),
        }
    }
}

/// Default options of the loft orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoftConfig {
    /// Straight rulings between sections
    pub ruled: bool,
    /// Cap the ends to build solids instead of shells
    pub solid: bool,
    /// Kernel approximation tolerance
    pub precision: f64,
}

impl Default for LoftConfig {
    fn default() -> Self {
        Self {
            ruled: true,
            solid: true,
            precision: DEFAULT_LOFT_PRECISION,
        }
    }
}

/// Mesh export settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TessellationConfig {
    pub linear_deflection: f64,
    /// Radians
    pub angular_deflection: f64,
}

impl Default for TessellationConfig {
    fn default() -> Self {
        Self {
            linear_deflection: 0.1,
            angular_deflection: 0.5,
        }
    }
}

impl ModelConfig {
    /// Parse a configuration from RON text; missing fields take defaults
    pub fn from_ron_str(content: &str) -> ModelResult<Self> {
        let config: ModelConfig =
            ron::from_str(content).map_err(|e| ModelError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_ron_string(&self) -> ModelResult<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ModelError::Config(e.to_string()))
    }

    /// Load configuration from a file
    pub fn load(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ModelError::Io(e.to_string()))?;
        Self::from_ron_str(&content)
    }

    /// Save configuration to a file
    pub fn save(&self, path: impl AsRef<Path>) -> ModelResult<()> {
        let content = self.to_ron_string()?;
        std::fs::write(path, content).map_err(|e| ModelError::Io(e.to_string()))
    }

    pub fn validate(&self) -> ModelResult<()> {
        let checks = [
            ("fuzzy_tolerance", self.fuzzy_tolerance),
            ("closing_tolerance", self.closing_tolerance),
            ("loft.precision", self.loft.precision),
            (
                "tessellation.linear_deflection",
                self.tessellation.linear_deflection,
            ),
            (
                "tessellation.angular_deflection",
                self.tessellation.angular_deflection,
            ),
        ];
        for (name, value) in checks {
            if !value.is_finite() || value < 0.0 {
                return Err(ModelError::Config(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}
