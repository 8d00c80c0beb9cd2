use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use twinbrot_core::{Complex, CurrentView, FractalParams, Julia, Mandelbrot, ViewTransform, Viewport};

use crate::backend::BackendKind;
use crate::buffer::RenderBuffer;
use crate::color::{colorize, colorize_into, ColorConfig};
use crate::contrast::{apply_relative, GrayscaleMode};
use crate::gate::JobGate;
use crate::gray_field::GrayField;
use crate::protocol::{ComputeRequest, WorkerReply};
use crate::scheduler::{RenderScheduler, StageDispatch, StageOutcome, DEFAULT_STAGES};
use crate::settle::{SettleTimer, DEFAULT_SETTLE};
use crate::worker::{spawn_render_worker, Notify, WorkerConfig, WorkerHandle};

/// Which set a surface shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    Mandelbrot,
    Julia,
}

impl SurfaceKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Mandelbrot => "mandelbrot",
            Self::Julia => "julia",
        }
    }

    /// Centre and zoom of the initial framing.
    pub fn default_view(self) -> (Complex, f64) {
        match self {
            Self::Mandelbrot => (Mandelbrot::DEFAULT_CENTER, 1.0),
            // Shorter side spans 3, matching the worker's fallback framing.
            Self::Julia => (Complex::ZERO, 4.0 / 3.0),
        }
    }
}

/// Why a render was requested. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderReason {
    Initial,
    Settled,
    Resized,
    ParamChanged,
    IterationsChanged,
    GrayscaleChanged,
    ViewReset,
}

/// Snapshot of everything a render job depends on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderParams {
    pub viewport: Viewport,
    pub output_width: u32,
    pub output_height: u32,
    pub julia_c: Option<Complex>,
    pub max_iterations: u32,
    pub grayscale: GrayscaleMode,
}

impl RenderParams {
    fn is_renderable(&self) -> bool {
        self.output_width > 0
            && self.output_height > 0
            && self.max_iterations > 0
            && self.viewport.is_valid()
            && self.julia_c.map_or(true, Complex::is_finite)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Idle,
    Working,
}

impl RenderState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Working => "working",
        }
    }
}

/// Most recent stage sent to (or returned by) the worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageProgress {
    /// 1-based for display.
    pub index: usize,
    pub count: usize,
    pub scale: f64,
}

impl fmt::Display for StageProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} (×{})", self.index, self.count, self.scale)
    }
}

/// Everything the status bar shows for one surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceStatus {
    pub render_state: RenderState,
    pub backend: Option<BackendKind>,
    pub stage: Option<StageProgress>,
    pub grayscale: GrayscaleMode,
    /// Last fatal failure; cleared by the next frame or request.
    pub error: Option<String>,
    /// Last non-fatal backend problem (GPU fallback); cleared by the next
    /// request or GPU-rendered stage.
    pub notice: Option<String>,
}

/// The frame currently on display and the world rectangle it covers.
#[derive(Debug, Clone)]
pub struct PresentedFrame {
    pub buffer: RenderBuffer,
    pub viewport: Viewport,
    pub stage: StageProgress,
}

/// Construction settings for a [`FractalSurface`].
#[derive(Debug, Clone)]
pub struct SurfaceConfig {
    pub kind: SurfaceKind,
    pub width: u32,
    pub height: u32,
    pub max_iterations: u32,
    pub stages: Vec<f64>,
    pub settle: Duration,
    pub prefer_gpu: bool,
    pub color: ColorConfig,
    /// Julia parameter; ignored by Mandelbrot surfaces.
    pub julia_c: Complex,
}

impl SurfaceConfig {
    pub fn new(kind: SurfaceKind, width: u32, height: u32) -> Self {
        Self {
            kind,
            width,
            height,
            max_iterations: FractalParams::DEFAULT_MAX_ITERATIONS,
            stages: DEFAULT_STAGES.to_vec(),
            settle: DEFAULT_SETTLE,
            prefer_gpu: true,
            color: ColorConfig::default(),
            julia_c: Julia::default_c(),
        }
    }
}

/// One interactive fractal view: view transform, staged job scheduling,
/// a worker thread, and the cached grayscale field behind the frame.
///
/// The UI thread owns the surface and drives it through [`tick`](Self::tick)
/// once per frame; requests made between ticks coalesce into one.
pub struct FractalSurface {
    kind: SurfaceKind,
    view: ViewTransform,
    scheduler: RenderScheduler<RenderParams>,
    settle: SettleTimer,
    gate: Arc<JobGate>,
    worker: WorkerHandle,
    worker_ready: bool,
    render_requested: Option<RenderReason>,
    max_iterations: u32,
    color: ColorConfig,
    julia_c: Complex,
    field: Option<GrayField>,
    frame: Option<PresentedFrame>,
    frame_version: u64,
    status: SurfaceStatus,
    job_started: Option<Instant>,
}

impl FractalSurface {
    /// Build the surface, spawn its worker and queue the initial render.
    pub fn new(config: SurfaceConfig, notify: Notify) -> crate::Result<Self> {
        let (center, zoom) = config.kind.default_view();
        let view = ViewTransform::from_center_zoom(center, zoom, config.width, config.height)?;
        let gate = Arc::new(JobGate::new());
        let worker = spawn_render_worker(
            WorkerConfig {
                name: format!("{}-worker", config.kind.label()),
                prefer_gpu: config.prefer_gpu,
            },
            Arc::clone(&gate),
            notify,
        )?;

        Ok(Self {
            kind: config.kind,
            view,
            scheduler: RenderScheduler::new(&config.stages),
            settle: SettleTimer::new(config.settle),
            gate,
            worker,
            worker_ready: false,
            render_requested: Some(RenderReason::Initial),
            max_iterations: config.max_iterations.max(1),
            color: config.color,
            julia_c: config.julia_c,
            field: None,
            frame: None,
            frame_version: 0,
            status: SurfaceStatus {
                render_state: RenderState::Working,
                backend: None,
                stage: None,
                grayscale: config.color.grayscale,
                error: None,
                notice: None,
            },
            job_started: None,
        })
    }

    pub fn kind(&self) -> SurfaceKind {
        self.kind
    }

    pub fn view(&self) -> &ViewTransform {
        &self.view
    }

    pub fn frame(&self) -> Option<&PresentedFrame> {
        self.frame.as_ref()
    }

    /// Bumped whenever the presented pixels change.
    pub fn frame_version(&self) -> u64 {
        self.frame_version
    }

    pub fn field(&self) -> Option<&GrayField> {
        self.field.as_ref()
    }

    pub fn color(&self) -> ColorConfig {
        self.color
    }

    pub fn julia_param(&self) -> Complex {
        self.julia_c
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn current_view(&self) -> CurrentView {
        self.view.current_view()
    }

    pub fn screen_to_world(&self, sx: f64, sy: f64) -> Complex {
        self.view.screen_to_world(sx, sy)
    }

    pub fn world_to_screen(&self, p: Complex) -> (f64, f64) {
        self.view.world_to_screen(p)
    }

    pub fn is_interacting(&self) -> bool {
        self.settle.is_interacting()
    }

    pub fn status(&self) -> SurfaceStatus {
        let busy = self.scheduler.active_job().is_some()
            || self.scheduler.has_pending()
            || self.render_requested.is_some()
            || self.settle.is_interacting();
        SurfaceStatus {
            render_state: if busy {
                RenderState::Working
            } else {
                RenderState::Idle
            },
            ..self.status.clone()
        }
    }

    /// Ask for a fresh render of the current view. Flushed on the next tick.
    pub fn request_render(&mut self, reason: RenderReason) {
        if self.render_requested.is_none() {
            debug!(surface = self.kind.label(), ?reason, "Render requested");
        }
        self.render_requested = Some(reason);
        self.status.error = None;
        self.status.notice = None;
    }

    // -- Interaction -------------------------------------------------------

    /// Note user input: restart the settle wait and abandon the running job.
    fn mark_interaction(&mut self, now: Instant) {
        self.settle.touch(now);
        if let Some(job_id) = self.scheduler.cancel() {
            trace!(surface = self.kind.label(), job_id, "Job cancelled by interaction");
        }
        self.gate.close();
    }

    pub fn zoom_at(&mut self, sx: f64, sy: f64, factor: f64, now: Instant) {
        self.view.zoom_at(sx, sy, factor);
        self.mark_interaction(now);
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64, now: Instant) {
        self.view.pan_by(dx, dy);
        self.mark_interaction(now);
    }

    pub fn begin_gesture(&mut self, now: Instant) {
        self.mark_interaction(now);
        self.settle.begin_gesture(now);
    }

    pub fn end_gesture(&mut self, now: Instant) {
        self.settle.end_gesture(now);
    }

    fn commit_view(&mut self) {
        match self.view.commit() {
            Ok(true) => {
                let view = self.view.current_view();
                debug!(
                    surface = self.kind.label(),
                    center_x = view.center_x,
                    center_y = view.center_y,
                    zoom = view.effective_zoom,
                    "View committed"
                );
            }
            Ok(false) => {}
            Err(e) => {
                warn!(surface = self.kind.label(), error = %e, "View commit rejected, reverting");
                self.view.discard_live();
            }
        }
    }

    /// Canvas size changed. Keeps centre and zoom and re-renders.
    pub fn resize(&mut self, width: u32, height: u32) {
        if (width, height) == self.view.canvas_size() || width == 0 || height == 0 {
            return;
        }
        match self.view.resize(width, height) {
            Ok(()) => self.request_render(RenderReason::Resized),
            Err(e) => {
                warn!(surface = self.kind.label(), error = %e, "Resize rejected");
                self.view.discard_live();
            }
        }
    }

    /// Jump to `center` at `zoom`, dropping any live transform.
    pub fn set_view(&mut self, center: Complex, zoom: f64) -> crate::Result<()> {
        self.view.set_view(center, zoom)?;
        self.request_render(RenderReason::ViewReset);
        Ok(())
    }

    pub fn reset_view(&mut self) -> crate::Result<()> {
        let (center, zoom) = self.kind.default_view();
        self.set_view(center, zoom)
    }

    // -- Parameters --------------------------------------------------------

    /// Retarget a Julia surface. No effect on Mandelbrot surfaces.
    pub fn set_julia_param(&mut self, c: Complex) {
        if self.kind != SurfaceKind::Julia || !c.is_finite() || c == self.julia_c {
            return;
        }
        self.julia_c = c;
        self.request_render(RenderReason::ParamChanged);
    }

    pub fn set_max_iterations(&mut self, max_iterations: u32) {
        let n = max_iterations.max(1);
        if n != self.max_iterations {
            self.max_iterations = n;
            self.request_render(RenderReason::IterationsChanged);
        }
    }

    /// Apply a new colour configuration.
    ///
    /// Colour-only changes recolour the cached field; a grayscale mode
    /// change needs the worker and triggers a render.
    pub fn recolor(&mut self, config: ColorConfig) {
        if config == self.color {
            return;
        }
        let grayscale_changed = config.grayscale != self.color.grayscale;
        self.color = config;
        if grayscale_changed {
            self.request_render(RenderReason::GrayscaleChanged);
        }
        self.repaint_from_field();
    }

    /// Stretch the cached field's contrast once and recolour.
    ///
    /// Returns `false` if there is no field or its range is degenerate.
    pub fn normalize_contrast_once(&mut self) -> bool {
        let applied = self.field.as_mut().map_or(false, apply_relative);
        if applied {
            self.repaint_from_field();
        }
        applied
    }

    fn repaint_from_field(&mut self) {
        if let (Some(field), Some(frame)) = (&self.field, self.frame.as_mut()) {
            frame.buffer = colorize(field, &self.color);
            self.frame_version += 1;
        }
    }

    // -- Driving -----------------------------------------------------------

    fn render_params(&self) -> RenderParams {
        let (w, h) = self.view.canvas_size();
        RenderParams {
            viewport: self.view.viewport(),
            output_width: w,
            output_height: h,
            julia_c: match self.kind {
                SurfaceKind::Mandelbrot => None,
                SurfaceKind::Julia => Some(self.julia_c),
            },
            max_iterations: self.max_iterations,
            grayscale: self.color.grayscale,
        }
    }

    /// Process worker replies, settle interaction and flush render
    /// requests. Call once per UI frame. Returns `true` if the presented
    /// frame changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let version = self.frame_version;

        while let Some(reply) = self.worker.try_recv() {
            self.handle_reply(reply);
        }

        if self.settle.poll(now) {
            self.commit_view();
            self.request_render(RenderReason::Settled);
        }

        if self.worker_ready && !self.settle.is_interacting() {
            if let Some(reason) = self.render_requested.take() {
                let params = self.render_params();
                if params.is_renderable() {
                    if let Some(dispatch) = self.scheduler.request_render(params) {
                        self.send_dispatch(dispatch);
                    }
                } else {
                    debug!(surface = self.kind.label(), ?reason, ?params, "Dropping degenerate render request");
                }
            }
        }

        self.frame_version != version
    }

    fn send_dispatch(&mut self, dispatch: StageDispatch<RenderParams>) {
        if dispatch.stage_index == 0 {
            self.job_started = Some(Instant::now());
        }
        self.gate.open(dispatch.job_id);
        self.status.stage = Some(StageProgress {
            index: dispatch.stage_index + 1,
            count: dispatch.stage_count,
            scale: dispatch.scale,
        });
        let p = dispatch.params;
        let request = ComputeRequest {
            job_id: dispatch.job_id,
            output_width: p.output_width,
            output_height: p.output_height,
            julia_c: p.julia_c,
            viewport: Some(p.viewport),
            max_iterations: p.max_iterations,
            stage_scale: dispatch.scale,
            grayscale: p.grayscale,
        };
        debug!(
            surface = self.kind.label(),
            job_id = dispatch.job_id,
            stage = dispatch.stage_index,
            scale = dispatch.scale,
            "Dispatching stage"
        );
        if let Err(e) = self.worker.send(request) {
            error!(surface = self.kind.label(), error = %e, "Could not reach render worker");
            self.status.error = Some(e.to_string());
            self.scheduler.cancel();
            self.gate.close();
        }
    }

    /// Apply one worker reply. Replies for stale jobs are dropped.
    pub fn handle_reply(&mut self, reply: WorkerReply) {
        match reply {
            WorkerReply::Ready => {
                debug!(surface = self.kind.label(), "Worker ready");
                self.worker_ready = true;
            }
            WorkerReply::Status {
                job_id,
                backend,
                grayscale,
            } => {
                if self.scheduler.is_active(job_id) {
                    self.status.backend = Some(backend);
                    self.status.grayscale = grayscale;
                    if backend == BackendKind::Gpu {
                        self.status.notice = None;
                    }
                } else {
                    trace!(surface = self.kind.label(), job_id, "Stale status");
                }
            }
            WorkerReply::Error {
                job_id,
                message,
                fatal,
            } => self.handle_error(job_id, message, fatal),
            WorkerReply::Frame {
                job_id,
                width,
                height,
                scale,
                gray,
            } => self.handle_frame(job_id, width, height, scale, gray),
            WorkerReply::Partial {
                job_id,
                width,
                height,
                y_start,
                y_end,
                gray,
            } => {
                if let Some(rows) = self.band_on_screen(job_id, width, height, y_start, y_end) {
                    self.apply_partial(rows, &gray);
                }
            }
            WorkerReply::Scan {
                job_id,
                width,
                height,
                y_start,
                y_end,
            } => {
                if let Some(rows) = self.band_on_screen(job_id, width, height, y_start, y_end) {
                    self.mark_scan(rows);
                }
            }
        }
    }

    /// Byte range of rows `y_start..y_end` in the cached field, if a band
    /// for `job_id` can be drawn over the presented frame.
    ///
    /// The job must be active and the presented frame must already show
    /// the job's viewport at the band's size.
    fn band_on_screen(
        &self,
        job_id: u64,
        width: u32,
        height: u32,
        y_start: u32,
        y_end: u32,
    ) -> Option<Range<usize>> {
        let Some(params) = self.scheduler.active_params(job_id) else {
            trace!(surface = self.kind.label(), job_id, "Stale band");
            return None;
        };
        let (field, frame) = (self.field.as_ref()?, self.frame.as_ref()?);
        if frame.viewport != params.viewport
            || (field.width, field.height) != (width, height)
            || y_start >= y_end
            || y_end > height
        {
            return None;
        }
        let stride = width as usize;
        Some(y_start as usize * stride..y_end as usize * stride)
    }

    fn apply_partial(&mut self, rows: Range<usize>, gray: &[u8]) {
        let (Some(field), Some(frame)) = (self.field.as_mut(), self.frame.as_mut()) else {
            return;
        };
        if gray.len() != rows.len() {
            warn!(surface = self.kind.label(), "Partial band has the wrong length");
            return;
        }
        field.data[rows.clone()].copy_from_slice(gray);
        colorize_into(
            gray,
            &self.color,
            &mut frame.buffer.pixels[rows.start * 4..rows.end * 4],
        );
        self.frame_version += 1;
    }

    /// Paint the band being computed in the base colour.
    fn mark_scan(&mut self, rows: Range<usize>) {
        let Some(frame) = self.frame.as_mut() else {
            return;
        };
        let [r, g, b] = self.color.base_color;
        for px in frame.buffer.pixels[rows.start * 4..rows.end * 4].chunks_exact_mut(4) {
            px.copy_from_slice(&[r, g, b, 255]);
        }
        self.frame_version += 1;
    }

    fn handle_error(&mut self, job_id: Option<u64>, message: String, fatal: bool) {
        if let Some(id) = job_id {
            if !self.scheduler.is_active(id) {
                trace!(surface = self.kind.label(), job_id = id, "Stale error");
                return;
            }
        }
        if !fatal {
            warn!(surface = self.kind.label(), ?job_id, %message, "Worker warning");
            self.status.notice = Some(message);
            return;
        }
        error!(surface = self.kind.label(), ?job_id, %message, "Render failed");
        self.status.error = Some(message);
        let next = match job_id {
            Some(id) => self.scheduler.on_job_failed(id),
            None => {
                self.scheduler.cancel();
                None
            }
        };
        match next {
            Some(dispatch) => self.send_dispatch(dispatch),
            None => self.gate.close(),
        }
    }

    fn handle_frame(&mut self, job_id: u64, width: u32, height: u32, scale: f64, gray: Vec<u8>) {
        let Some(params) = self.scheduler.active_params(job_id).copied() else {
            trace!(surface = self.kind.label(), job_id, "Stale frame");
            return;
        };
        let stage = self.status.stage.unwrap_or(StageProgress {
            index: 1,
            count: self.scheduler.stages().len(),
            scale,
        });
        let field = match GrayField::from_data(width, height, gray) {
            Ok(field) => field,
            Err(e) => {
                self.handle_error(Some(job_id), e.to_string(), true);
                return;
            }
        };

        let next = match self.scheduler.on_stage_complete(job_id) {
            StageOutcome::Stale => return,
            StageOutcome::Accepted { next } => next,
        };

        self.frame = Some(PresentedFrame {
            buffer: colorize(&field, &self.color),
            viewport: params.viewport,
            stage,
        });
        self.field = Some(field);
        self.frame_version += 1;
        self.status.error = None;

        match next {
            Some(dispatch) => self.send_dispatch(dispatch),
            None => {
                self.gate.close();
                if let Some(started) = self.job_started.take() {
                    info!(
                        surface = self.kind.label(),
                        job_id,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Render complete"
                    );
                }
            }
        }
    }
}
