use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use crate::backend::FallbackBackend;
use crate::contrast::post_process;
use crate::gate::{CancelToken, JobGate};
use crate::protocol::{ComputeRequest, WorkerReply};
use crate::gray_field::GrayField;
use crate::supersample::{downsample_box, downsample_rows};
use crate::tile::TILE_SIZE;
use crate::RenderError;

/// Called after the worker posts replies, e.g. to wake the UI.
pub type Notify = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Thread name, also used in log fields.
    pub name: String,
    pub prefer_gpu: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: "render-worker".into(),
            prefer_gpu: true,
        }
    }
}

/// The surface's end of a worker's channels.
pub struct WorkerHandle {
    tx: mpsc::Sender<ComputeRequest>,
    rx: mpsc::Receiver<WorkerReply>,
}

impl WorkerHandle {
    /// Queue a request. Fails only if the worker thread has exited.
    pub fn send(&self, request: ComputeRequest) -> crate::Result<()> {
        self.tx
            .send(request)
            .map_err(|_| RenderError::CpuFailure("render worker has stopped".into()))
    }

    pub fn try_recv(&self) -> Option<WorkerReply> {
        self.rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<WorkerReply> {
        self.rx.recv_timeout(timeout).ok()
    }
}

/// Start a worker thread. It replies [`WorkerReply::Ready`] first and then
/// serves requests until the handle is dropped.
pub fn spawn_render_worker(
    config: WorkerConfig,
    gate: Arc<JobGate>,
    notify: Notify,
) -> crate::Result<WorkerHandle> {
    let (tx_request, rx_request) = mpsc::channel::<ComputeRequest>();
    let (tx_reply, rx_reply) = mpsc::channel::<WorkerReply>();

    thread::Builder::new()
        .name(config.name.clone())
        .spawn(move || render_worker(config, gate, rx_request, tx_reply, notify))?;

    Ok(WorkerHandle {
        tx: tx_request,
        rx: rx_reply,
    })
}

fn drain_latest(initial: ComputeRequest, rx: &mpsc::Receiver<ComputeRequest>) -> ComputeRequest {
    let mut req = initial;
    while let Ok(newer) = rx.try_recv() {
        req = newer;
    }
    req
}

fn render_worker(
    config: WorkerConfig,
    gate: Arc<JobGate>,
    rx: mpsc::Receiver<ComputeRequest>,
    tx: mpsc::Sender<WorkerReply>,
    notify: Notify,
) {
    let mut backend = FallbackBackend::new(config.prefer_gpu);
    debug!(worker = %config.name, prefer_gpu = config.prefer_gpu, "Render worker started");
    if tx.send(WorkerReply::Ready).is_err() {
        return;
    }
    notify();

    while let Ok(initial) = rx.recv() {
        let req = drain_latest(initial, &rx);
        if !gate.is_current(req.job_id) {
            trace!(worker = %config.name, job_id = req.job_id, "Skipping stale request");
            continue;
        }

        let cancel = CancelToken::new(Arc::clone(&gate), req.job_id);
        let mut on_progress = |reply: WorkerReply| {
            if tx.send(reply).is_ok() {
                notify();
            }
        };
        for reply in process_request(&mut backend, &req, &cancel, &mut on_progress) {
            if tx.send(reply).is_err() {
                return;
            }
        }
        notify();
    }
    debug!(worker = %config.name, "Render worker stopped");
}

/// Run one stage: render (possibly supersampled), downsample, post-process.
///
/// Returns the replies in send order: an optional non-fatal GPU error,
/// then `status` and `frame`; or a single fatal `error`; or nothing if the
/// job was cancelled.
///
/// Supersampled stages also stream `scan` and `partial` replies through
/// `on_progress` while the field fills, as long as `cancel` is current.
/// Partial rows are reduced but not contrast-stretched.
pub fn process_request(
    backend: &mut FallbackBackend,
    req: &ComputeRequest,
    cancel: &CancelToken,
    on_progress: &mut dyn FnMut(WorkerReply),
) -> Vec<WorkerReply> {
    let start = Instant::now();
    let fatal = |e: RenderError| {
        error!(job_id = req.job_id, error = %e, "Stage failed");
        vec![WorkerReply::Error {
            job_id: Some(req.job_id),
            message: e.to_string(),
            fatal: true,
        }]
    };

    let job = match req.field_job() {
        Ok(job) => job,
        Err(e) => return fatal(e),
    };
    let factor = req.supersample();

    let (frame_w, frame_h) = req.frame_size();
    let streaming = factor > 1;
    let scan = |from: u32, supersampled_rows: u32| WorkerReply::Scan {
        job_id: req.job_id,
        width: frame_w,
        height: frame_h,
        y_start: from,
        y_end: supersampled_rows.div_ceil(factor).min(frame_h),
    };
    let mut streamed = 0u32;
    let mut rows_ready = |field: &GrayField, rows: u32| {
        if !streaming || cancel.is_cancelled() {
            return;
        }
        let done = (rows / factor).min(frame_h);
        if done > streamed {
            on_progress(WorkerReply::Partial {
                job_id: req.job_id,
                width: frame_w,
                height: frame_h,
                y_start: streamed,
                y_end: done,
                gray: downsample_rows(field, factor, streamed..done),
            });
            streamed = done;
        }
        if done < frame_h {
            on_progress(scan(done, rows + TILE_SIZE));
        }
    };

    let rendered = panic::catch_unwind(AssertUnwindSafe(|| {
        backend.render(&job, cancel, &mut rows_ready)
    }))
    .unwrap_or_else(|_| Err(RenderError::CpuFailure("render panicked".into())));
    let output = match rendered {
        Ok(output) => output,
        Err(RenderError::Cancelled) => {
            trace!(job_id = req.job_id, "Stage cancelled");
            return Vec::new();
        }
        Err(e) => return fatal(e),
    };

    let mut replies = Vec::with_capacity(3);
    if let Some(message) = output.gpu_error {
        warn!(job_id = req.job_id, %message, "Stage fell back to CPU");
        replies.push(WorkerReply::Error {
            job_id: Some(req.job_id),
            message,
            fatal: false,
        });
    }

    let mut field = downsample_box(&output.field, factor);
    let grayscale = post_process(&mut field, req.grayscale);

    info!(
        job_id = req.job_id,
        backend = %output.backend,
        scale = req.stage_scale,
        supersample = factor,
        width = field.width,
        height = field.height,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Stage complete"
    );

    replies.push(WorkerReply::Status {
        job_id: req.job_id,
        backend: output.backend,
        grayscale,
    });
    replies.push(WorkerReply::Frame {
        job_id: req.job_id,
        width: field.width,
        height: field.height,
        scale: req.stage_scale,
        gray: field.data,
    });
    replies
}
