use std::ops::Range;

use rayon::prelude::*;
use twinbrot_core::{INTERIOR, MAX_ESCAPE_LEVEL};

use crate::gray_field::GrayField;

/// Largest per-axis supersampling factor.
pub const MAX_SUPERSAMPLE: u32 = 6;

/// Cap on the number of samples in a supersampled field.
pub const MAX_SUPERSAMPLE_PIXELS: u64 = 10_000_000;

/// Per-axis supersampling factor for a stage of `scale`.
///
/// Only stages finer than the output (`0 < scale < 1`) supersample. The
/// factor is `round(1 / scale)` clamped to `[1, MAX_SUPERSAMPLE]`, then
/// reduced until the supersampled field fits in `MAX_SUPERSAMPLE_PIXELS`.
pub fn supersample_factor(scale: f64, width: u32, height: u32) -> u32 {
    if !(scale > 0.0 && scale < 1.0) {
        return 1;
    }
    let mut factor = ((1.0 / scale).round() as u32).clamp(1, MAX_SUPERSAMPLE);
    let (w, h) = (width as u64, height as u64);
    while factor > 1 && (w * factor as u64) * (h * factor as u64) > MAX_SUPERSAMPLE_PIXELS {
        factor -= 1;
    }
    factor
}

/// Box-filter `field` down by `factor` on each axis.
///
/// Each output pixel is the rounded mean of its `factor × factor` block.
/// A block with any escaping sample never averages to the interior marker.
pub fn downsample_box(field: &GrayField, factor: u32) -> GrayField {
    if factor <= 1 {
        return field.clone();
    }
    let out_w = field.width / factor;
    let out_h = field.height / factor;
    GrayField {
        width: out_w,
        height: out_h,
        data: downsample_rows(field, factor, 0..out_h),
    }
}

/// Output rows `rows` of [`downsample_box`], row-major.
///
/// Only the input rows behind `rows` are read, so a field that is still
/// being filled can be reduced band by band.
pub fn downsample_rows(field: &GrayField, factor: u32, rows: Range<u32>) -> Vec<u8> {
    let factor = factor.max(1);
    let out_w = (field.width / factor) as usize;
    let out_h = field.height / factor;
    let rows = rows.start.min(out_h)..rows.end.min(out_h);
    let mut out = vec![0u8; out_w * rows.len()];
    if out.is_empty() {
        return out;
    }
    let f = factor as usize;
    let in_w = field.width as usize;
    let samples = (f * f) as u32;
    let first = rows.start as usize;

    out.par_chunks_mut(out_w)
        .enumerate()
        .for_each(|(i, row)| {
            let oy = first + i;
            for (ox, px) in row.iter_mut().enumerate() {
                let mut sum = 0u32;
                let mut any_escaped = false;
                for sy in 0..f {
                    let base = (oy * f + sy) * in_w + ox * f;
                    for &v in &field.data[base..base + f] {
                        sum += v as u32;
                        any_escaped |= v != INTERIOR;
                    }
                }
                let mean = ((sum + samples / 2) / samples) as u8;
                *px = if any_escaped {
                    mean.min(MAX_ESCAPE_LEVEL)
                } else {
                    mean
                };
            }
        });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coarse_and_unit_stages_do_not_supersample() {
        assert_eq!(supersample_factor(4.0, 800, 600), 1);
        assert_eq!(supersample_factor(1.0, 800, 600), 1);
        assert_eq!(supersample_factor(0.0, 800, 600), 1);
        assert_eq!(supersample_factor(-0.5, 800, 600), 1);
        assert_eq!(supersample_factor(f64::NAN, 800, 600), 1);
    }

    #[test]
    fn factor_rounds_and_clamps() {
        assert_eq!(supersample_factor(0.25, 100, 100), 4);
        assert_eq!(supersample_factor(0.4, 100, 100), 3); // round(2.5) = 3
        assert_eq!(supersample_factor(0.01, 100, 100), MAX_SUPERSAMPLE);
    }

    #[test]
    fn factor_respects_pixel_budget() {
        // 1920×1080 × 4² = 33.2M > 10M; × 2² = 8.3M fits.
        assert_eq!(supersample_factor(0.25, 1920, 1080), 2);
        // Even factor 2 is too large here.
        assert_eq!(supersample_factor(0.25, 4000, 4000), 1);
    }

    #[test]
    fn block_mean_rounds_to_nearest() {
        let field = GrayField::from_data(2, 2, vec![0, 1, 1, 1]).unwrap();
        assert_eq!(downsample_box(&field, 2).data, vec![1]); // 0.75 → 1
        let field = GrayField::from_data(2, 2, vec![0, 0, 1, 1]).unwrap();
        assert_eq!(downsample_box(&field, 2).data, vec![1]); // 0.5 → 1
        let field = GrayField::from_data(2, 2, vec![0, 0, 0, 1]).unwrap();
        assert_eq!(downsample_box(&field, 2).data, vec![0]);
    }

    #[test]
    fn mixed_block_never_reads_as_interior() {
        let mut data = vec![INTERIOR; 16];
        data[0] = 253;
        let field = GrayField::from_data(4, 4, data).unwrap();
        let out = downsample_box(&field, 4);
        assert_eq!(out.data, vec![MAX_ESCAPE_LEVEL]);

        let all_interior = GrayField::filled(4, 4, INTERIOR);
        assert_eq!(downsample_box(&all_interior, 2).data, vec![INTERIOR; 4]);
    }

    #[test]
    fn output_dimensions() {
        let field = GrayField::filled(9, 6, 7);
        let out = downsample_box(&field, 3);
        assert_eq!((out.width, out.height), (3, 2));
        assert!(out.data.iter().all(|&v| v == 7));
    }

    #[test]
    fn row_bands_match_whole_field() {
        let data: Vec<u8> = (0..12 * 8).map(|i| (i * 7 % 250) as u8).collect();
        let field = GrayField::from_data(12, 8, data).unwrap();
        let whole = downsample_box(&field, 2);
        let mut banded = downsample_rows(&field, 2, 0..1);
        banded.extend(downsample_rows(&field, 2, 1..4));
        assert_eq!(banded, whole.data);
        assert!(downsample_rows(&field, 2, 4..9).is_empty());
    }
}
