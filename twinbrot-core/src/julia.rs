use crate::complex::Complex;
use crate::fractal::{Fractal, FractalParams, IterationResult};

/// A Julia set: `z_{n+1} = z_n² + c`, where `c` is a fixed constant
/// and `z₀` is the point on the complex plane.
#[derive(Debug, Clone)]
pub struct Julia {
    params: FractalParams,
    c: Complex,
}

impl Julia {
    pub fn new(c: Complex, params: FractalParams) -> Self {
        Self { params, c }
    }

    /// Parameter shown before the user picks one on the Mandelbrot view.
    pub fn default_c() -> Complex {
        Complex::new(-0.5125324324513248, -0.5213923730185231)
    }
}

impl Default for Julia {
    fn default() -> Self {
        Self::new(Self::default_c(), FractalParams::default())
    }
}

impl Fractal for Julia {
    fn iterate(&self, point: Complex) -> IterationResult {
        let escape_radius_sq = self.params.escape_radius_sq();
        let mut z = point;

        for n in 0..self.params.max_iterations {
            z = z.square_add(self.c);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn far_point_escapes() {
        let result = Julia::default().iterate(Complex::new(10.0, 0.0));
        assert_eq!(result, IterationResult::Escaped { iterations: 0 });
    }

    #[test]
    fn c_zero_origin_is_fixed_point() {
        let j = Julia::new(Complex::ZERO, FractalParams::default());
        assert_eq!(j.iterate(Complex::ZERO), IterationResult::Interior);
        assert_eq!(j.intensity(Complex::ZERO), 255);
    }

    #[test]
    fn c_zero_escape_count() {
        // z₀ = 3: z₁ = 9 → |z₁|² = 81 > 16 at n = 0.
        let j = Julia::new(Complex::ZERO, FractalParams::default());
        assert_eq!(
            j.iterate(Complex::new(3.0, 0.0)),
            IterationResult::Escaped { iterations: 0 }
        );
        // z₀ = 1.5: 2.25, 5.0625 → escapes at n = 1.
        assert_eq!(
            j.iterate(Complex::new(1.5, 0.0)),
            IterationResult::Escaped { iterations: 1 }
        );
    }

    #[test]
    fn deterministic_results() {
        let j = Julia::default();
        let points = [
            Complex::new(0.0, 0.0),
            Complex::new(0.5, 0.5),
            Complex::new(-1.0, 0.3),
        ];
        let run1: Vec<_> = points.iter().map(|&p| j.iterate(p)).collect();
        let run2: Vec<_> = points.iter().map(|&p| j.iterate(p)).collect();
        assert_eq!(run1, run2);
    }
}
