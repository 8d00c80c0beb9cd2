pub mod backend;
pub mod buffer;
pub mod color;
pub mod contrast;
pub mod cpu;
pub mod error;
pub mod gate;
pub mod gpu;
pub mod gray_field;
pub mod protocol;
pub mod scheduler;
pub mod settle;
pub mod supersample;
pub mod surface;
pub mod tile;
pub mod worker;

pub use backend::{
    BackendKind, BackendOutput, ComputeBackend, FallbackBackend, FieldJob, RowsReady,
};
pub use buffer::RenderBuffer;
pub use color::{colorize, colorize_into, ColorConfig, GLOW_SPLIT, MAX_GLOW};
pub use contrast::{apply_relative, post_process, GrayscaleMode};
pub use cpu::{render_field, render_field_rows, CpuBackend};
pub use error::RenderError;
pub use gate::{CancelToken, JobGate};
pub use gpu::{f32_resolves, GpuBackend};
pub use gray_field::GrayField;
pub use protocol::{stage_dimensions, ComputeRequest, WorkerReply};
pub use scheduler::{RenderScheduler, StageDispatch, StageOutcome, DEFAULT_STAGES};
pub use settle::{SettleTimer, DEFAULT_SETTLE};
pub use supersample::{downsample_box, downsample_rows, supersample_factor};
pub use surface::{
    FractalSurface, PresentedFrame, RenderParams, RenderReason, RenderState, StageProgress,
    SurfaceConfig, SurfaceKind, SurfaceStatus,
};
pub use tile::TILE_SIZE;
pub use worker::{process_request, spawn_render_worker, Notify, WorkerConfig, WorkerHandle};

/// Convenience result type for the render crate.
pub type Result<T> = std::result::Result<T, RenderError>;
