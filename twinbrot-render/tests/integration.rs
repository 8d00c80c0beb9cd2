use std::sync::Arc;
use std::time::{Duration, Instant};

use twinbrot_core::{Complex, Julia, INTERIOR};
use twinbrot_render::{
    colorize, process_request, CancelToken, ColorConfig, ComputeRequest, FallbackBackend,
    FractalSurface, GrayField, GrayscaleMode, RenderState, SurfaceConfig, SurfaceKind, WorkerReply,
    DEFAULT_STAGES,
};

fn cpu_surface(kind: SurfaceKind, width: u32, height: u32, max_iterations: u32) -> FractalSurface {
    let mut config = SurfaceConfig::new(kind, width, height);
    config.prefer_gpu = false;
    config.max_iterations = max_iterations;
    FractalSurface::new(config, Arc::new(|| {})).unwrap()
}

/// Tick until the surface reports idle with a frame, or give up.
fn run_until_idle(surface: &mut FractalSurface, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        surface.tick(Instant::now());
        if surface.status().render_state == RenderState::Idle && surface.frame().is_some() {
            return;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    panic!("surface did not become idle: {:?}", surface.status());
}

fn single_stage(julia_c: Option<Complex>, width: u32, height: u32, n: u32, grayscale: GrayscaleMode) -> GrayField {
    render_request(&ComputeRequest {
        job_id: 1,
        output_width: width,
        output_height: height,
        julia_c,
        viewport: None,
        max_iterations: n,
        stage_scale: 1.0,
        grayscale,
    })
}

/// The field the surface's last stage should produce for `c` and `n`.
fn final_julia_stage(surface: &FractalSurface, c: Complex, n: u32) -> GrayField {
    let (width, height) = surface.view().canvas_size();
    render_request(&ComputeRequest {
        job_id: 1,
        output_width: width,
        output_height: height,
        julia_c: Some(c),
        viewport: Some(surface.view().viewport()),
        max_iterations: n,
        stage_scale: *DEFAULT_STAGES.last().unwrap(),
        grayscale: GrayscaleMode::Absolute,
    })
}

fn render_request(req: &ComputeRequest) -> GrayField {
    let mut backend = FallbackBackend::cpu_only();
    let replies = process_request(&mut backend, req, &CancelToken::detached(), &mut |_| {});
    match replies.last() {
        Some(WorkerReply::Frame {
            width,
            height,
            gray,
            ..
        }) => GrayField::from_data(*width, *height, gray.clone()).unwrap(),
        other => panic!("expected a frame, got {other:?}"),
    }
}

#[test]
fn surface_renders_all_stages_on_cpu() {
    let mut surface = cpu_surface(SurfaceKind::Mandelbrot, 96, 64, 128);
    run_until_idle(&mut surface, Duration::from_secs(30));

    let frame = surface.frame().unwrap();
    assert_eq!((frame.buffer.width, frame.buffer.height), (96, 64));
    assert_eq!(frame.stage.index, frame.stage.count, "last stage presented");

    let status = surface.status();
    assert_eq!(status.backend, Some(twinbrot_render::BackendKind::Cpu));
    assert!(status.error.is_none());
}

#[test]
fn new_request_supersedes_running_job() {
    let mut surface = cpu_surface(SurfaceKind::Julia, 80, 60, 200);
    let deadline = Instant::now() + Duration::from_secs(30);
    while surface.frame_version() == 0 {
        assert!(Instant::now() < deadline, "first stage never arrived");
        surface.tick(Instant::now());
        std::thread::sleep(Duration::from_millis(1));
    }

    // Job 1 has presented a stage and dispatched the next one.
    let c = Complex::new(0.285, 0.01);
    surface.set_julia_param(c);
    surface.set_max_iterations(150);
    run_until_idle(&mut surface, Duration::from_secs(30));

    let expected = final_julia_stage(&surface, c, 150);
    let superseded = final_julia_stage(&surface, Julia::default_c(), 200);
    assert_ne!(expected, superseded);
    assert_eq!(surface.field(), Some(&expected));

    // A late frame from job 1 changes nothing.
    let version = surface.frame_version();
    surface.handle_reply(WorkerReply::Frame {
        job_id: 1,
        width: superseded.width,
        height: superseded.height,
        scale: *DEFAULT_STAGES.last().unwrap(),
        gray: superseded.data.clone(),
    });
    assert_eq!(surface.frame_version(), version);
    assert_eq!(surface.field(), Some(&expected));
}

#[test]
fn supersampled_stage_streams_bands_onto_the_frame() {
    let mut config = SurfaceConfig::new(SurfaceKind::Mandelbrot, 64, 160);
    config.prefer_gpu = false;
    config.max_iterations = 64;
    config.stages = vec![1.0, 0.5];
    let mut surface = FractalSurface::new(config, Arc::new(|| {})).unwrap();

    // Versions: stage 1, then at least one scan or band, then stage 2.
    run_until_idle(&mut surface, Duration::from_secs(30));
    assert!(surface.frame_version() > 2, "version {}", surface.frame_version());
    let frame = surface.frame().unwrap();
    assert_eq!(frame.stage.index, 2);
}

#[test]
fn recolor_reuses_cached_field() {
    let mut surface = cpu_surface(SurfaceKind::Mandelbrot, 64, 48, 64);
    run_until_idle(&mut surface, Duration::from_secs(30));

    let before = surface.frame_version();
    surface.recolor(ColorConfig {
        base_color: [255, 0, 0],
        ..surface.color()
    });
    assert_eq!(surface.frame_version(), before + 1);
    assert_eq!(surface.status().render_state, RenderState::Idle);

    let frame = surface.frame().unwrap();
    let field = surface.field().unwrap();
    for (i, v) in field.data.iter().enumerate() {
        let px = &frame.buffer.pixels[i * 4..i * 4 + 4];
        assert_eq!(px[1], 0, "green channel off for value {v}");
    }
}

#[test]
fn julia_relative_stretches_escape_range() {
    let field = single_stage(Some(Julia::default_c()), 100, 100, 500, GrayscaleMode::Relative);

    assert_eq!(field.data.len(), 100 * 100);
    assert!(field.data.iter().any(|&v| v == 0));
    assert_eq!(field.escaped_values().max(), Some(254));
}

#[test]
fn mandelbrot_center_pixel_is_interior_cyan() {
    let mut config = SurfaceConfig::new(SurfaceKind::Mandelbrot, 800, 600);
    config.prefer_gpu = false;
    config.stages = vec![1.0];
    let mut surface = FractalSurface::new(config, Arc::new(|| {})).unwrap();
    let (sx, sy) = surface.world_to_screen(Complex::new(-0.75, 0.0));
    assert!((sx - 400.0).abs() < 1e-6 && (sy - 300.0).abs() < 1e-6);

    run_until_idle(&mut surface, Duration::from_secs(60));
    let frame = surface.frame().unwrap();
    assert_eq!(surface.field().unwrap().get(400, 300), INTERIOR);
    assert_eq!(frame.buffer.pixel(400, 300), [0, 255, 255, 255]);
}

#[test]
fn colorize_matches_field_shape() {
    let field = single_stage(None, 64, 40, 100, GrayscaleMode::Absolute);
    let buffer = colorize(&field, &ColorConfig::default());
    assert_eq!(buffer.pixels.len(), 64 * 40 * 4);
    assert!(buffer.pixels.chunks_exact(4).all(|px| px[3] == 255));
}
