pub mod complex;
pub mod error;
pub mod escape;
pub mod fractal;
pub mod julia;
pub mod mandelbrot;
pub mod transform;
pub mod viewport;

// Re-export primary types for convenience.
pub use complex::Complex;
pub use error::CoreError;
pub use escape::{sample_field, EscapeMode};
pub use fractal::{Fractal, FractalParams, IterationResult, INTERIOR, MAX_ESCAPE_LEVEL};
pub use julia::Julia;
pub use mandelbrot::Mandelbrot;
pub use transform::{CurrentView, LiveTransform, ViewTransform, MAX_LIVE_SCALE, MIN_LIVE_SCALE};
pub use viewport::Viewport;

/// Convenience result type for the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;
