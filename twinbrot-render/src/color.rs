use rayon::prelude::*;
use twinbrot_core::INTERIOR;

use crate::buffer::RenderBuffer;
use crate::contrast::GrayscaleMode;
use crate::gray_field::GrayField;

/// Glow level at which the curve switches from power shaping to band burn.
pub const GLOW_SPLIT: u8 = 50;
pub const MAX_GLOW: u8 = 100;

const LOW_EXPONENT_START: f64 = 3.0;
const LOW_EXPONENT_END: f64 = 0.25;

/// Colour settings for one surface.
///
/// `base_color` and `fill_interior` are shared between the two views;
/// `glow` and `grayscale` belong to each view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorConfig {
    pub base_color: [u8; 3],
    /// `0..=100`; larger values clamp to 100.
    pub glow: u8,
    pub fill_interior: bool,
    pub grayscale: GrayscaleMode,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            base_color: [0, 255, 255],
            glow: GLOW_SPLIT,
            fill_interior: false,
            grayscale: GrayscaleMode::Absolute,
        }
    }
}

impl ColorConfig {
    /// Brightness weight in `[0, 1]` for grayscale value `v`.
    pub fn weight(&self, v: u8) -> f64 {
        if v == 0 {
            return 0.0;
        }
        if self.fill_interior && v == INTERIOR {
            return 1.0;
        }
        let g = v as f64 / 255.0;
        let glow = self.glow.min(MAX_GLOW) as f64;
        let split = GLOW_SPLIT as f64;

        if glow <= split {
            let t = glow / split;
            let exponent = LOW_EXPONENT_START + (LOW_EXPONENT_END - LOW_EXPONENT_START) * t;
            let curved = g.powf(exponent).clamp(0.0, 1.0);
            curved * (1.0 - t) + g * t
        } else {
            let u = (glow - split) / split;
            let band = 1.0 - 0.8 * u;
            let burn = if g >= band { 1.0 } else { g / band };
            let to_linear = 1.0 - u;
            burn * (1.0 - to_linear) + g * to_linear
        }
    }

    #[inline]
    fn rgba(&self, w: f64) -> [u8; 4] {
        let ch = |c: u8| (c as f64 * w).round().clamp(0.0, 255.0) as u8;
        [
            ch(self.base_color[0]),
            ch(self.base_color[1]),
            ch(self.base_color[2]),
            255,
        ]
    }

    /// Colour for a single grayscale value.
    pub fn color(&self, v: u8) -> [u8; 4] {
        if v == 0 {
            return [0, 0, 0, 255];
        }
        self.rgba(self.weight(v))
    }

    /// One colour per grayscale value.
    fn lut(&self) -> [[u8; 4]; 256] {
        let mut lut = [[0, 0, 0, 255]; 256];
        for (v, entry) in lut.iter_mut().enumerate() {
            *entry = self.color(v as u8);
        }
        lut
    }
}

/// Map a grayscale field to RGBA. Pure: the field is not modified.
pub fn colorize(field: &GrayField, config: &ColorConfig) -> RenderBuffer {
    let mut pixels = vec![0u8; field.len() * 4];
    colorize_into(&field.data, config, &mut pixels);
    RenderBuffer {
        width: field.width,
        height: field.height,
        pixels,
    }
}

/// Colour `gray` into `out`, four bytes per value.
pub fn colorize_into(gray: &[u8], config: &ColorConfig, out: &mut [u8]) {
    debug_assert_eq!(out.len(), gray.len() * 4);
    let lut = config.lut();
    out.par_chunks_mut(4)
        .zip(gray.par_iter())
        .for_each(|(pixel, &v)| pixel.copy_from_slice(&lut[v as usize]));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(glow: u8) -> ColorConfig {
        ColorConfig {
            glow,
            ..ColorConfig::default()
        }
    }

    #[test]
    fn zero_is_black() {
        for glow in [0, 25, 50, 75, 100] {
            assert_eq!(cfg(glow).color(0), [0, 0, 0, 255]);
        }
    }

    #[test]
    fn interior_at_default_glow_is_base_colour() {
        assert_eq!(cfg(50).color(255), [0, 255, 255, 255]);
    }

    #[test]
    fn glow_50_is_linear() {
        // t = 1 → w = gNorm.
        let c = cfg(50);
        assert!((c.weight(51) - 0.2).abs() < 1e-12);
        assert_eq!(c.color(51), [0, 51, 51, 255]);
    }

    #[test]
    fn glow_0_is_cubic() {
        let c = cfg(0);
        let g: f64 = 128.0 / 255.0;
        assert!((c.weight(128) - g.powi(3)).abs() < 1e-12);
    }

    #[test]
    fn glow_100_burns_everything_nonzero() {
        // band = 0.2, to_linear = 0: any gNorm ≥ 0.2 saturates.
        let c = cfg(100);
        assert_eq!(c.weight(60), 1.0);
        assert!((c.weight(25) - (25.0 / 255.0) / 0.2).abs() < 1e-12);
    }

    #[test]
    fn fill_interior_forces_full_weight() {
        let c = ColorConfig {
            fill_interior: true,
            glow: 0,
            ..ColorConfig::default()
        };
        assert_eq!(c.weight(INTERIOR), 1.0);
    }

    #[test]
    fn weight_is_monotonic_in_value() {
        for glow in [0, 10, 50, 51, 80, 100] {
            let c = cfg(glow);
            let mut prev = 0.0;
            for v in 0..=255u8 {
                let w = c.weight(v);
                assert!((0.0..=1.0).contains(&w));
                assert!(w + 1e-12 >= prev, "glow {glow}, v {v}");
                prev = w;
            }
        }
    }

    #[test]
    fn colorize_maps_every_pixel() {
        let field = GrayField::from_data(3, 1, vec![0, 51, 255]).unwrap();
        let buf = colorize(&field, &cfg(50));
        assert_eq!(
            buf.pixels,
            vec![0, 0, 0, 255, 0, 51, 51, 255, 0, 255, 255, 255]
        );
    }
}
