use serde::{Deserialize, Serialize};

use crate::complex::Complex;
use crate::fractal::{Fractal, FractalParams};
use crate::julia::Julia;
use crate::mandelbrot::Mandelbrot;
use crate::viewport::Viewport;

/// Which quadratic map a request evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EscapeMode {
    /// `z₀ = 0`, `c` = pixel.
    Mandelbrot,
    /// `z₀` = pixel, `c` fixed.
    Julia { c: Complex },
}

impl EscapeMode {
    /// A request carrying a Julia parameter selects Julia mode.
    pub fn from_julia_param(c: Option<Complex>) -> Self {
        match c {
            Some(c) => Self::Julia { c },
            None => Self::Mandelbrot,
        }
    }
}

/// Single-threaded reference evaluation of a `width × height` field.
///
/// `viewport = None` selects [`Viewport::default_framing`]. Returns the
/// row-major grayscale values (255 = interior).
pub fn sample_field(
    mode: EscapeMode,
    params: FractalParams,
    viewport: Option<Viewport>,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let vp = viewport.unwrap_or_else(|| Viewport::default_framing(width, height));
    match mode {
        EscapeMode::Mandelbrot => sample_with(&Mandelbrot::new(params), &vp, width, height),
        EscapeMode::Julia { c } => sample_with(&Julia::new(c, params), &vp, width, height),
    }
}

fn sample_with<F: Fractal>(fractal: &F, vp: &Viewport, width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(width as usize * height as usize);
    for py in 0..height {
        for px in 0..width {
            out.push(fractal.intensity(vp.pixel_to_complex(px, py, width, height)));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fractal::INTERIOR;

    #[test]
    fn mode_from_param() {
        assert_eq!(EscapeMode::from_julia_param(None), EscapeMode::Mandelbrot);
        let c = Complex::new(0.1, 0.2);
        assert_eq!(
            EscapeMode::from_julia_param(Some(c)),
            EscapeMode::Julia { c }
        );
    }

    #[test]
    fn mode_serializes_with_kind_tag() {
        let json = serde_json::to_string(&EscapeMode::Mandelbrot).unwrap();
        assert_eq!(json, r#"{"kind":"mandelbrot"}"#);
    }

    #[test]
    fn julia_c_zero_interior_disc() {
        // For c = 0 the filled Julia set is the closed unit disc.
        let field = sample_field(
            EscapeMode::Julia { c: Complex::ZERO },
            FractalParams::default(),
            Some(Viewport::new(-2.0, 2.0, -2.0, 2.0).unwrap()),
            40,
            40,
        );
        // Pixel (20, 20) samples (0.05, 0.05), well inside the disc.
        assert_eq!(field[20 * 40 + 20], INTERIOR);
        // Pixel (0, 0) samples (-1.95, -1.95); z₁ already has |z|² ≈ 57.8.
        assert_eq!(field[0], 0);
    }

    #[test]
    fn default_framing_used_without_viewport() {
        let params = FractalParams::with_max_iterations(64).unwrap();
        let implicit = sample_field(EscapeMode::Mandelbrot, params, None, 30, 20);
        let explicit = sample_field(
            EscapeMode::Mandelbrot,
            params,
            Some(Viewport::default_framing(30, 20)),
            30,
            20,
        );
        assert_eq!(implicit, explicit);
    }
}
