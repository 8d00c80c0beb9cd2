use thiserror::Error;

/// Errors originating from the rendering pipeline.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("GPU unavailable: {0}")]
    GpuUnavailable(String),

    #[error("failed to create GPU device: {0}")]
    GpuDevice(#[from] wgpu::RequestDeviceError),

    #[error("GPU buffer mapping failed: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("GPU validation error: {0}")]
    GpuValidation(String),

    #[error("GPU out of memory: {0}")]
    GpuOutOfMemory(String),

    #[error("invalid image dimensions: {width}×{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("render cancelled")]
    Cancelled,

    #[error("CPU render failed: {0}")]
    CpuFailure(String),

    #[error("failed to start render worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] twinbrot_core::CoreError),
}

impl RenderError {
    /// Whether the error is a superseded job rather than a real failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Map a popped wgpu error scope onto the matching variant.
    pub(crate) fn from_scope(e: wgpu::Error) -> Self {
        match e {
            wgpu::Error::OutOfMemory { .. } => Self::GpuOutOfMemory(e.to_string()),
            other => Self::GpuValidation(other.to_string()),
        }
    }
}
