use serde::{Deserialize, Serialize};

use crate::complex::Complex;
use crate::error::CoreError;

/// Complex-plane extent of the shorter canvas side at zoom 1.
pub const BASE_SPAN: f64 = 4.0;

/// Vertical extent of the fallback framing used when a request carries
/// no viewport.
pub const DEFAULT_SPAN_Y: f64 = 3.0;

/// A rectangle of the complex plane, in world coordinates.
///
/// Row 0 of a rendered field samples `y_min`; column 0 samples `x_min`.
/// [`Viewport::new`] enforces `x_min < x_max`, `y_min < y_max` and
/// finiteness; values built by hand can be checked with [`is_valid`](Self::is_valid).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Viewport {
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> crate::Result<Self> {
        let vp = Self {
            x_min,
            x_max,
            y_min,
            y_max,
        };
        vp.validate()?;
        Ok(vp)
    }

    /// Frame `center` so that the shorter canvas side spans `BASE_SPAN / zoom`.
    pub fn from_center_zoom(
        center: Complex,
        zoom: f64,
        width: u32,
        height: u32,
    ) -> crate::Result<Self> {
        if width == 0 || height == 0 {
            return Err(CoreError::InvalidCanvas { width, height });
        }
        if zoom <= 0.0 || !zoom.is_finite() {
            return Err(CoreError::InvalidZoom(zoom));
        }
        let pixel_size = BASE_SPAN / width.min(height) as f64 / zoom;
        Self::from_center_pixel_size(center, pixel_size, pixel_size, width, height)
    }

    pub(crate) fn from_center_pixel_size(
        center: Complex,
        pixel_x: f64,
        pixel_y: f64,
        width: u32,
        height: u32,
    ) -> crate::Result<Self> {
        let half_x = pixel_x * width as f64 / 2.0;
        let half_y = pixel_y * height as f64 / 2.0;
        Self::new(
            center.re - half_x,
            center.re + half_x,
            center.im - half_y,
            center.im + half_y,
        )
    }

    /// Symmetric framing around the origin: `span_y = 3`, `span_x` follows
    /// the canvas aspect ratio.
    pub fn default_framing(width: u32, height: u32) -> Self {
        let aspect = width.max(1) as f64 / height.max(1) as f64;
        let half_y = DEFAULT_SPAN_Y / 2.0;
        let half_x = half_y * aspect;
        Self {
            x_min: -half_x,
            x_max: half_x,
            y_min: -half_y,
            y_max: half_y,
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        let all_finite = [self.x_min, self.x_max, self.y_min, self.y_max]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(CoreError::InvalidViewport {
                reason: format!("non-finite bounds {self:?}"),
            });
        }
        if self.x_min >= self.x_max || self.y_min >= self.y_max {
            return Err(CoreError::InvalidViewport {
                reason: format!(
                    "empty or inverted rectangle x [{}, {}] y [{}, {}]",
                    self.x_min, self.x_max, self.y_min, self.y_max
                ),
            });
        }
        Ok(())
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    #[inline]
    pub fn span_x(&self) -> f64 {
        self.x_max - self.x_min
    }

    #[inline]
    pub fn span_y(&self) -> f64 {
        self.y_max - self.y_min
    }

    pub fn center(&self) -> Complex {
        Complex::new(
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    /// World point sampled by pixel `(px, py)` of a `width × height` grid.
    ///
    /// Samples are taken at pixel centres.
    #[inline]
    pub fn pixel_to_complex(&self, px: u32, py: u32, width: u32, height: u32) -> Complex {
        let u = (px as f64 + 0.5) / width as f64;
        let v = (py as f64 + 0.5) / height as f64;
        Complex::new(
            self.x_min + u * self.span_x(),
            self.y_min + v * self.span_y(),
        )
    }
}
