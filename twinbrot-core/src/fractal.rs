use crate::complex::Complex;
use crate::error::CoreError;

/// Grayscale value reserved for points that never escaped.
pub const INTERIOR: u8 = 255;

/// Highest grayscale value an escaping point may take.
pub const MAX_ESCAPE_LEVEL: u8 = 254;

/// The result of iterating a single point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationResult {
    /// The orbit left the bailout disc at 0-based iteration `iterations`.
    Escaped { iterations: u32 },

    /// No escape within `max_iterations`.
    Interior,
}

impl IterationResult {
    /// Map the result onto the 8-bit escape-speed scale.
    ///
    /// Escapes map to `round(255 * i / max_iterations)`, capped at 254 so
    /// that 255 stays unambiguous as the interior marker.
    #[inline]
    pub fn intensity(self, max_iterations: u32) -> u8 {
        match self {
            Self::Interior => INTERIOR,
            Self::Escaped { iterations } => {
                let n = max_iterations.max(1) as f64;
                let level = (255.0 * iterations as f64 / n).round();
                level.clamp(0.0, MAX_ESCAPE_LEVEL as f64) as u8
            }
        }
    }
}

/// Parameters controlling fractal iteration.
///
/// The cached `escape_radius_sq` field is recomputed on deserialization.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct FractalParams {
    /// Iteration cap before a point counts as interior.
    pub max_iterations: u32,

    /// Bailout radius on `|z|`.
    pub escape_radius: f64,

    #[serde(skip)]
    escape_radius_sq: f64,
}

impl<'de> serde::Deserialize<'de> for FractalParams {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(serde::Deserialize)]
        struct Raw {
            max_iterations: u32,
            #[serde(default = "default_escape_radius")]
            escape_radius: f64,
        }
        let raw = Raw::deserialize(deserializer)?;
        Self::new(raw.max_iterations, raw.escape_radius).map_err(serde::de::Error::custom)
    }
}

fn default_escape_radius() -> f64 {
    FractalParams::DEFAULT_ESCAPE_RADIUS
}

impl FractalParams {
    pub const DEFAULT_MAX_ITERATIONS: u32 = 300;
    /// `|z|² > 16` is the bailout test.
    pub const DEFAULT_ESCAPE_RADIUS: f64 = 4.0;

    pub fn new(max_iterations: u32, escape_radius: f64) -> crate::Result<Self> {
        if max_iterations < 1 {
            return Err(CoreError::InvalidMaxIterations(max_iterations));
        }
        if escape_radius <= 0.0 || !escape_radius.is_finite() {
            return Err(CoreError::InvalidEscapeRadius(escape_radius));
        }
        Ok(Self {
            max_iterations,
            escape_radius,
            escape_radius_sq: escape_radius * escape_radius,
        })
    }

    /// Standard bailout with a custom iteration cap.
    pub fn with_max_iterations(max_iterations: u32) -> crate::Result<Self> {
        Self::new(max_iterations, Self::DEFAULT_ESCAPE_RADIUS)
    }

    #[inline]
    pub fn escape_radius_sq(&self) -> f64 {
        self.escape_radius_sq
    }
}

impl Default for FractalParams {
    fn default() -> Self {
        Self {
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            escape_radius: Self::DEFAULT_ESCAPE_RADIUS,
            escape_radius_sq: Self::DEFAULT_ESCAPE_RADIUS * Self::DEFAULT_ESCAPE_RADIUS,
        }
    }
}

/// Trait implemented by the escape-time fractals.
///
/// Renderers are generic over `F: Fractal` so the iteration loop is
/// monomorphised and inlined.
pub trait Fractal {
    /// Iterate a single point of the complex plane.
    fn iterate(&self, point: Complex) -> IterationResult;

    fn params(&self) -> &FractalParams;

    /// Iterate `point` and map the result onto the grayscale scale.
    #[inline]
    fn intensity(&self, point: Complex) -> u8 {
        self.iterate(point).intensity(self.params().max_iterations)
    }
}
