//! Global constants for pf-model

/// Tolerance for fusing nearly coincident geometry in 2D booleans
pub const DEFAULT_FUZZY_TOLERANCE: f64 = 1e-5;

/// Distance below which a polyline counts as already closed
pub const DEFAULT_CLOSING_TOLERANCE: f64 = 1e-5;

/// Default approximation tolerance for through-sections lofting
pub const DEFAULT_LOFT_PRECISION: f64 = 1e-6;

/// Number of loft paths in one group above which a warning is logged
pub const LOFT_PATH_WARNING_THRESHOLD: usize = 64;

/// Default text height in sketch units
pub const DEFAULT_TEXT_SIZE: f64 = 12.0;

/// Default font family for text outlines
pub const DEFAULT_FONT: &str = "Arial";

/// Frame axes shorter than this are treated as degenerate
pub const AXIS_EPSILON: f64 = 1e-12;
