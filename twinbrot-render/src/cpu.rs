use std::time::Instant;

use rayon::prelude::*;
use tracing::debug;

use twinbrot_core::{EscapeMode, Fractal, Julia, Mandelbrot, Viewport, INTERIOR};

use crate::backend::{ComputeBackend, FieldJob, RowsReady};
use crate::gate::CancelToken;
use crate::gray_field::GrayField;
use crate::tile::{build_tile_grid, Tile};
use crate::RenderError;

/// Tiled, Rayon-parallel `f64` evaluation. This is the reference backend.
#[derive(Debug, Default)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ComputeBackend for CpuBackend {
    fn render(
        &mut self,
        job: &FieldJob,
        cancel: &CancelToken,
        rows_ready: &mut RowsReady<'_>,
    ) -> crate::Result<GrayField> {
        job.validate()?;
        match job.mode {
            EscapeMode::Mandelbrot => render_field_rows(
                &Mandelbrot::new(job.params),
                &job.viewport,
                job.width,
                job.height,
                cancel,
                rows_ready,
            ),
            EscapeMode::Julia { c } => render_field_rows(
                &Julia::new(c, job.params),
                &job.viewport,
                job.width,
                job.height,
                cancel,
                rows_ready,
            ),
        }
    }
}

fn render_tile<F: Fractal>(
    fractal: &F,
    viewport: &Viewport,
    tile: &Tile,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let mut data = Vec::with_capacity(tile.pixel_count());
    for py in tile.y..tile.y + tile.height {
        for px in tile.x..tile.x + tile.width {
            data.push(fractal.intensity(viewport.pixel_to_complex(px, py, width, height)));
        }
    }
    data
}

/// Render a full field with tiles processed in parallel.
///
/// Each tile checks `cancel` before starting; if any tile was skipped the
/// whole field is discarded and [`RenderError::Cancelled`] is returned.
pub fn render_field<F: Fractal + Sync>(
    fractal: &F,
    viewport: &Viewport,
    width: u32,
    height: u32,
    cancel: &CancelToken,
) -> crate::Result<GrayField> {
    render_field_rows(fractal, viewport, width, height, cancel, &mut |_, _| {})
}

/// [`render_field`], one row of tiles at a time.
///
/// After each tile row lands, `rows_ready` sees the field with its leading
/// rows filled in and the count of those rows. Rows below are still
/// [`INTERIOR`] placeholders.
pub fn render_field_rows<F: Fractal + Sync>(
    fractal: &F,
    viewport: &Viewport,
    width: u32,
    height: u32,
    cancel: &CancelToken,
    rows_ready: &mut RowsReady<'_>,
) -> crate::Result<GrayField> {
    let start = Instant::now();
    let tiles = build_tile_grid(width, height);
    debug!(
        tile_count = tiles.len(),
        width,
        height,
        job_id = cancel.job_id(),
        "Starting tiled render"
    );

    let mut field = GrayField::filled(width, height, INTERIOR);
    for band in tiles.chunk_by(|a, b| a.y == b.y) {
        let tile_data: Vec<Option<Vec<u8>>> = band
            .par_iter()
            .map(|tile| {
                if cancel.is_cancelled() {
                    return None;
                }
                Some(render_tile(fractal, viewport, tile, width, height))
            })
            .collect();

        for (tile, data) in band.iter().zip(tile_data) {
            match data {
                Some(d) => field.blit_tile(tile, &d),
                None => {
                    debug!(job_id = cancel.job_id(), "Tiled render cancelled");
                    return Err(RenderError::Cancelled);
                }
            }
        }
        if let Some(tile) = band.first() {
            rows_ready(&field, tile.y + tile.height);
        }
    }

    debug!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        job_id = cancel.job_id(),
        "Tiled render complete"
    );
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use twinbrot_core::{sample_field, Complex, FractalParams};

    use crate::gate::JobGate;

    #[test]
    fn matches_reference_sampler() {
        let params = FractalParams::with_max_iterations(120).unwrap();
        let vp = Viewport::new(-2.0, 0.6, -1.1, 1.3).unwrap();
        for mode in [
            EscapeMode::Mandelbrot,
            EscapeMode::Julia {
                c: Complex::new(-0.8, 0.156),
            },
        ] {
            let job = FieldJob {
                mode,
                params,
                viewport: vp,
                width: 150,
                height: 97,
            };
            let field = CpuBackend::new()
                .render(&job, &CancelToken::detached(), &mut |_, _| {})
                .unwrap();
            let expected = sample_field(mode, params, Some(vp), 150, 97);
            assert_eq!(field.data, expected);
        }
    }

    #[test]
    fn rows_arrive_top_down_in_tile_bands() {
        let mut seen = Vec::new();
        let field = render_field_rows(
            &Mandelbrot::default(),
            &Viewport::default_framing(100, 150),
            100,
            150,
            &CancelToken::detached(),
            &mut |partial, rows| {
                assert_eq!((partial.width, partial.height), (100, 150));
                seen.push(rows);
            },
        )
        .unwrap();
        assert_eq!(seen, vec![64, 128, 150]);
        assert_eq!(field.len(), 100 * 150);
    }

    #[test]
    fn stale_token_cancels() {
        let gate = Arc::new(JobGate::new());
        gate.open(2);
        let stale = CancelToken::new(Arc::clone(&gate), 1);
        let result = render_field(
            &Mandelbrot::default(),
            &Viewport::default_framing(64, 64),
            64,
            64,
            &stale,
        );
        assert!(matches!(result, Err(RenderError::Cancelled)));
    }

    #[test]
    fn concurrent_cancel_is_advisory() {
        let gate = Arc::new(JobGate::new());
        gate.open(1);
        let token = CancelToken::new(Arc::clone(&gate), 1);
        let mandelbrot = Mandelbrot::new(FractalParams::with_max_iterations(20_000).unwrap());
        let vp = Viewport::new(-1.5, 0.5, -1.0, 1.0).unwrap();

        let closer = Arc::clone(&gate);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(5));
            closer.close();
        });

        // Either the render raced to completion or it was abandoned;
        // a partial field is never returned.
        match render_field(&mandelbrot, &vp, 512, 512, &token) {
            Ok(field) => assert_eq!(field.len(), 512 * 512),
            Err(e) => assert!(e.is_cancelled()),
        }
        handle.join().unwrap();
    }
}
