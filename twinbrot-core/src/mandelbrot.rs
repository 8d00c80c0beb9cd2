use crate::complex::Complex;
use crate::fractal::{Fractal, FractalParams, IterationResult};

/// The Mandelbrot set: `z_{n+1} = z_n² + c`, starting from `z₀ = 0`.
///
/// The point `c` is the coordinate on the complex plane.
#[derive(Debug, Clone)]
pub struct Mandelbrot {
    params: FractalParams,
}

impl Mandelbrot {
    /// Centre of the default framing.
    pub const DEFAULT_CENTER: Complex = Complex { re: -0.75, im: 0.0 };

    pub fn new(params: FractalParams) -> Self {
        Self { params }
    }
}

impl Default for Mandelbrot {
    fn default() -> Self {
        Self::new(FractalParams::default())
    }
}

/// Returns `true` if `c` lies inside the main cardioid.
#[inline]
fn in_cardioid(re: f64, im: f64) -> bool {
    let im2 = im * im;
    let q = (re - 0.25) * (re - 0.25) + im2;
    q * (q + (re - 0.25)) <= 0.25 * im2
}

/// Returns `true` if `c` lies inside the period-2 bulb.
#[inline]
fn in_period2_bulb(re: f64, im: f64) -> bool {
    (re + 1.0) * (re + 1.0) + im * im <= 0.0625
}

impl Fractal for Mandelbrot {
    fn iterate(&self, c: Complex) -> IterationResult {
        // Both regions are bounded orbits, so skipping them cannot change
        // the classification.
        if in_cardioid(c.re, c.im) || in_period2_bulb(c.re, c.im) {
            return IterationResult::Interior;
        }

        let escape_radius_sq = self.params.escape_radius_sq();
        let mut z = Complex::ZERO;

        for n in 0..self.params.max_iterations {
            z = z.square_add(c);
            if z.norm_sq() > escape_radius_sq {
                return IterationResult::Escaped { iterations: n };
            }
        }

        IterationResult::Interior
    }

    fn params(&self) -> &FractalParams {
        &self.params
    }
}
