use thiserror::Error;

/// Errors originating from the core fractal engine.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid max iterations: {0} (must be >= 1)")]
    InvalidMaxIterations(u32),

    #[error("invalid escape radius: {0} (must be > 0.0)")]
    InvalidEscapeRadius(f64),

    #[error("invalid zoom: {0} (must be positive and finite)")]
    InvalidZoom(f64),

    #[error("invalid canvas size: {width}×{height}")]
    InvalidCanvas { width: u32, height: u32 },

    #[error("invalid viewport: {reason}")]
    InvalidViewport { reason: String },
}
