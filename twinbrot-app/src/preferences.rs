use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use twinbrot_core::{Complex, FractalParams, Julia};
use twinbrot_render::{
    ColorConfig, GrayscaleMode, SurfaceConfig, SurfaceKind, DEFAULT_STAGES, GLOW_SPLIT, MAX_GLOW,
};

// ---------------------------------------------------------------------------
// Application preferences
// ---------------------------------------------------------------------------

/// Startup configuration. Read once; the app never writes it back, so the
/// view always opens at the default framing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppPreferences {
    #[serde(default = "default_window_width")]
    pub window_width: f32,
    #[serde(default = "default_window_height")]
    pub window_height: f32,
    /// Quiet period after the last input before a render is requested.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Stage scale factors, coarse to fine.
    #[serde(default = "default_stages")]
    pub stages: Vec<f64>,
    #[serde(default = "default_max_iterations")]
    pub mandelbrot_max_iterations: u32,
    #[serde(default = "default_max_iterations")]
    pub julia_max_iterations: u32,
    #[serde(default = "default_true")]
    pub prefer_gpu: bool,

    // Colour
    #[serde(default = "default_base_color")]
    pub base_color: [u8; 3],
    #[serde(default)]
    pub fill_interior: bool,
    #[serde(default = "default_glow")]
    pub mandelbrot_glow: u8,
    #[serde(default = "default_glow")]
    pub julia_glow: u8,
    #[serde(default)]
    pub mandelbrot_relative: bool,
    #[serde(default)]
    pub julia_relative: bool,

    /// Initial Julia parameter.
    #[serde(default = "default_julia_c")]
    pub julia_c: Complex,
}

fn default_window_width() -> f32 {
    1280.0
}
fn default_window_height() -> f32 {
    720.0
}
fn default_settle_delay_ms() -> u64 {
    50
}
fn default_stages() -> Vec<f64> {
    DEFAULT_STAGES.to_vec()
}
fn default_max_iterations() -> u32 {
    FractalParams::DEFAULT_MAX_ITERATIONS
}
fn default_true() -> bool {
    true
}
fn default_base_color() -> [u8; 3] {
    [0, 255, 255]
}
fn default_glow() -> u8 {
    GLOW_SPLIT
}
fn default_julia_c() -> Complex {
    Julia::default_c()
}

impl Default for AppPreferences {
    fn default() -> Self {
        Self {
            window_width: default_window_width(),
            window_height: default_window_height(),
            settle_delay_ms: default_settle_delay_ms(),
            stages: default_stages(),
            mandelbrot_max_iterations: default_max_iterations(),
            julia_max_iterations: default_max_iterations(),
            prefer_gpu: true,
            base_color: default_base_color(),
            fill_interior: false,
            mandelbrot_glow: default_glow(),
            julia_glow: default_glow(),
            mandelbrot_relative: false,
            julia_relative: false,
            julia_c: default_julia_c(),
        }
    }
}

impl AppPreferences {
    /// Load preferences from next to the executable, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&crate::app_dir::preferences_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            debug!("No preferences file at {}", path.display());
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(json) => match Self::from_json(&json) {
                Ok(prefs) => {
                    info!("Loaded preferences from {}", path.display());
                    prefs
                }
                Err(e) => {
                    error!("Failed to parse preferences: {e}");
                    Self::default()
                }
            },
            Err(e) => {
                error!("Failed to read preferences file: {e}");
                Self::default()
            }
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<Self>(json).map(Self::sanitized)
    }

    fn sanitized(mut self) -> Self {
        self.mandelbrot_glow = self.mandelbrot_glow.min(MAX_GLOW);
        self.julia_glow = self.julia_glow.min(MAX_GLOW);
        self.mandelbrot_max_iterations = self.mandelbrot_max_iterations.max(1);
        self.julia_max_iterations = self.julia_max_iterations.max(1);
        if !self.julia_c.is_finite() {
            self.julia_c = default_julia_c();
        }
        self
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn color_for(&self, kind: SurfaceKind) -> ColorConfig {
        let (glow, relative) = match kind {
            SurfaceKind::Mandelbrot => (self.mandelbrot_glow, self.mandelbrot_relative),
            SurfaceKind::Julia => (self.julia_glow, self.julia_relative),
        };
        ColorConfig {
            base_color: self.base_color,
            glow,
            fill_interior: self.fill_interior,
            grayscale: if relative {
                GrayscaleMode::Relative
            } else {
                GrayscaleMode::Absolute
            },
        }
    }

    /// Surface settings for a canvas of `width × height`.
    pub fn surface_config(&self, kind: SurfaceKind, width: u32, height: u32) -> SurfaceConfig {
        SurfaceConfig {
            max_iterations: match kind {
                SurfaceKind::Mandelbrot => self.mandelbrot_max_iterations,
                SurfaceKind::Julia => self.julia_max_iterations,
            },
            stages: self.stages.clone(),
            settle: self.settle_delay(),
            prefer_gpu: self.prefer_gpu,
            color: self.color_for(kind),
            julia_c: self.julia_c,
            ..SurfaceConfig::new(kind, width, height)
        }
    }
}
