//! Messages exchanged between a surface and its render worker.

use serde::{Deserialize, Serialize};
use twinbrot_core::{Complex, EscapeMode, FractalParams, Viewport};

use crate::backend::{BackendKind, FieldJob};
use crate::contrast::GrayscaleMode;
use crate::supersample::supersample_factor;

/// One stage of a render job, as sent to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeRequest {
    pub job_id: u64,
    /// Size of the presented frame in pixels.
    pub output_width: u32,
    pub output_height: u32,
    /// `Some` selects Julia mode with this parameter.
    pub julia_c: Option<Complex>,
    /// `None` selects the default framing for the stage size.
    pub viewport: Option<Viewport>,
    pub max_iterations: u32,
    pub stage_scale: f64,
    pub grayscale: GrayscaleMode,
}

/// Pixel size a stage is computed and reported at.
pub fn stage_dimensions(scale: f64, output_width: u32, output_height: u32) -> (u32, u32) {
    if scale >= 1.0 {
        let w = (output_width as f64 / scale).floor() as u32;
        let h = (output_height as f64 / scale).floor() as u32;
        (w.max(1), h.max(1))
    } else {
        (output_width, output_height)
    }
}

impl ComputeRequest {
    pub fn mode(&self) -> EscapeMode {
        EscapeMode::from_julia_param(self.julia_c)
    }

    /// `(width, height)` of the frame this request produces.
    pub fn frame_size(&self) -> (u32, u32) {
        stage_dimensions(self.stage_scale, self.output_width, self.output_height)
    }

    pub fn supersample(&self) -> u32 {
        let (w, h) = self.frame_size();
        supersample_factor(self.stage_scale, w, h)
    }

    /// Resolve into the backend job, including any supersampling.
    pub fn field_job(&self) -> crate::Result<FieldJob> {
        if self.output_width == 0 || self.output_height == 0 {
            return Err(crate::RenderError::InvalidDimensions {
                width: self.output_width,
                height: self.output_height,
            });
        }
        let params = FractalParams::with_max_iterations(self.max_iterations)?;
        let (w, h) = self.frame_size();
        let viewport = self
            .viewport
            .unwrap_or_else(|| Viewport::default_framing(w, h));
        let factor = self.supersample();
        let job = FieldJob {
            mode: self.mode(),
            params,
            viewport,
            width: w * factor,
            height: h * factor,
        };
        job.validate()?;
        Ok(job)
    }
}

/// Replies from the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerReply {
    /// The worker is running and accepts requests.
    Ready,
    /// Grayscale result of one stage.
    Frame {
        job_id: u64,
        width: u32,
        height: u32,
        scale: f64,
        gray: Vec<u8>,
    },
    /// Finished rows `y_start..y_end` of a `width × height` frame that is
    /// still being computed. `gray` holds just those rows.
    Partial {
        job_id: u64,
        width: u32,
        height: u32,
        y_start: u32,
        y_end: u32,
        gray: Vec<u8>,
    },
    /// Rows `y_start..y_end` of a `width × height` frame are being
    /// computed now.
    Scan {
        job_id: u64,
        width: u32,
        height: u32,
        y_start: u32,
        y_end: u32,
    },
    /// Sent before the matching frame.
    Status {
        job_id: u64,
        backend: BackendKind,
        grayscale: GrayscaleMode,
    },
    /// `fatal` means the stage produced nothing.
    Error {
        job_id: Option<u64>,
        message: String,
        fatal: bool,
    },
}

impl WorkerReply {
    pub fn job_id(&self) -> Option<u64> {
        match self {
            Self::Ready => None,
            Self::Frame { job_id, .. }
            | Self::Partial { job_id, .. }
            | Self::Scan { job_id, .. }
            | Self::Status { job_id, .. } => Some(*job_id),
            Self::Error { job_id, .. } => *job_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(scale: f64) -> ComputeRequest {
        ComputeRequest {
            job_id: 1,
            output_width: 800,
            output_height: 600,
            julia_c: None,
            viewport: None,
            max_iterations: 300,
            stage_scale: scale,
            grayscale: GrayscaleMode::Absolute,
        }
    }

    #[test]
    fn stage_sizes() {
        assert_eq!(stage_dimensions(4.0, 800, 600), (200, 150));
        assert_eq!(stage_dimensions(1.0, 800, 600), (800, 600));
        assert_eq!(stage_dimensions(0.25, 800, 600), (800, 600));
        assert_eq!(stage_dimensions(1000.0, 800, 600), (1, 1));
    }

    #[test]
    fn fine_stage_supersamples() {
        let job = request(0.25).field_job().unwrap();
        // 800×600×16 = 7.68M fits the budget.
        assert_eq!((job.width, job.height), (3200, 2400));
        let coarse = request(4.0).field_job().unwrap();
        assert_eq!((coarse.width, coarse.height), (200, 150));
    }

    #[test]
    fn missing_viewport_uses_default_framing() {
        let job = request(4.0).field_job().unwrap();
        assert_eq!(job.viewport, Viewport::default_framing(200, 150));
        assert_eq!(job.mode, EscapeMode::Mandelbrot);
    }

    #[test]
    fn invalid_requests_fail() {
        let mut r = request(1.0);
        r.max_iterations = 0;
        assert!(r.field_job().is_err());

        let mut r = request(1.0);
        r.output_width = 0;
        assert!(r.field_job().is_err());
    }

    #[test]
    fn reply_tags() {
        let json = serde_json::to_string(&WorkerReply::Ready).unwrap();
        assert_eq!(json, r#"{"type":"ready"}"#);

        let status = WorkerReply::Status {
            job_id: 3,
            backend: BackendKind::Gpu,
            grayscale: GrayscaleMode::Relative,
        };
        let value: serde_json::Value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["type"], "status");
        assert_eq!(value["backend"], "gpu");
        assert_eq!(value["grayscale"], "relative");
        assert_eq!(status.job_id(), Some(3));

        let partial = WorkerReply::Partial {
            job_id: 4,
            width: 2,
            height: 8,
            y_start: 2,
            y_end: 3,
            gray: vec![7, 9],
        };
        let value: serde_json::Value = serde_json::to_value(&partial).unwrap();
        assert_eq!(value["type"], "partial");
        assert_eq!(value["y_start"], 2);
        assert_eq!(partial.job_id(), Some(4));
    }
}
