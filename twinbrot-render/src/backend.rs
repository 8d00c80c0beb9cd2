use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use twinbrot_core::{EscapeMode, FractalParams, Viewport};

use crate::cpu::CpuBackend;
use crate::gate::CancelToken;
use crate::gpu::{f32_resolves, GpuBackend};
use crate::gray_field::GrayField;
use crate::RenderError;

/// Identifies which backend produced a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Gpu,
    Cpu,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gpu => "gpu",
            Self::Cpu => "cpu",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a backend needs to produce one grayscale field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldJob {
    pub mode: EscapeMode,
    pub params: FractalParams,
    pub viewport: Viewport,
    pub width: u32,
    pub height: u32,
}

impl FieldJob {
    pub fn validate(&self) -> crate::Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        self.viewport.validate()?;
        Ok(())
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Progress callback: the field being filled and how many of its leading
/// rows are final.
pub type RowsReady<'a> = dyn FnMut(&GrayField, u32) + 'a;

/// A way of evaluating the escape-time field for a [`FieldJob`].
pub trait ComputeBackend {
    /// Produce the `job.width × job.height` field, row 0 at `y_min`.
    ///
    /// Backends that fill the field incrementally report through
    /// `rows_ready`; others may never call it.
    fn render(
        &mut self,
        job: &FieldJob,
        cancel: &CancelToken,
        rows_ready: &mut RowsReady<'_>,
    ) -> crate::Result<GrayField>;
}

/// A field plus the backend that produced it.
#[derive(Debug)]
pub struct BackendOutput {
    pub field: GrayField,
    pub backend: BackendKind,
    /// Set when the GPU failed on this job and the CPU took over.
    pub gpu_error: Option<String>,
}

enum GpuSlot {
    Untried,
    Ready(GpuBackend),
    Disabled,
}

/// GPU-first backend with a CPU fallback.
///
/// The GPU is initialised lazily on the first job. An initialisation
/// failure disables it for the lifetime of this value; a failure on a
/// single job falls back to the CPU for that job only. Jobs whose pixel
/// spacing `f32` cannot resolve go straight to the CPU.
pub struct FallbackBackend {
    gpu: GpuSlot,
    cpu: CpuBackend,
}

impl FallbackBackend {
    pub fn new(prefer_gpu: bool) -> Self {
        Self {
            gpu: if prefer_gpu {
                GpuSlot::Untried
            } else {
                GpuSlot::Disabled
            },
            cpu: CpuBackend::new(),
        }
    }

    /// CPU only, never touches the GPU.
    pub fn cpu_only() -> Self {
        Self::new(false)
    }

    pub fn gpu_enabled(&self) -> bool {
        !matches!(self.gpu, GpuSlot::Disabled)
    }

    fn gpu(&mut self) -> Option<&mut GpuBackend> {
        if let GpuSlot::Untried = self.gpu {
            self.gpu = match GpuBackend::try_new() {
                Ok(gpu) => {
                    info!(adapter = %gpu.adapter_name(), "GPU backend ready");
                    GpuSlot::Ready(gpu)
                }
                Err(e) => {
                    info!(error = %e, "GPU backend unavailable, using CPU");
                    GpuSlot::Disabled
                }
            };
        }
        match &mut self.gpu {
            GpuSlot::Ready(gpu) => Some(gpu),
            _ => None,
        }
    }

    pub fn render(
        &mut self,
        job: &FieldJob,
        cancel: &CancelToken,
        rows_ready: &mut RowsReady<'_>,
    ) -> crate::Result<BackendOutput> {
        job.validate()?;

        let mut gpu_error = None;
        let resolved = f32_resolves(&job.viewport, job.width, job.height);
        if !resolved && self.gpu_enabled() {
            debug!(
                width = job.width,
                height = job.height,
                "Pixel spacing below f32 resolution, rendering on CPU"
            );
        }
        let gpu = if resolved { self.gpu() } else { None };
        if let Some(gpu) = gpu {
            match gpu.render(job, cancel, rows_ready) {
                Ok(field) => {
                    return Ok(BackendOutput {
                        field,
                        backend: BackendKind::Gpu,
                        gpu_error: None,
                    })
                }
                Err(RenderError::Cancelled) => return Err(RenderError::Cancelled),
                Err(e) => {
                    warn!(error = %e, "GPU render failed, falling back to CPU");
                    gpu_error = Some(e.to_string());
                }
            }
        }

        let field = self.cpu.render(job, cancel, rows_ready)?;
        Ok(BackendOutput {
            field,
            backend: BackendKind::Cpu,
            gpu_error,
        })
    }
}
