use crate::complex::Complex;
use crate::error::CoreError;
use crate::viewport::{Viewport, BASE_SPAN};

/// Lower clamp for the accumulated live zoom between commits.
pub const MIN_LIVE_SCALE: f64 = 1e-6;
/// Upper clamp for the accumulated live zoom between commits.
pub const MAX_LIVE_SCALE: f64 = 1e6;

/// Screen-space transform applied on top of the last presented frame while
/// the user is interacting: `screen = base * scale + offset`.
///
/// It lets the UI move and zoom the existing image immediately; the
/// transform is folded into the world viewport on [`ViewTransform::commit`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveTransform {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl LiveTransform {
    pub const IDENTITY: Self = Self {
        scale: 1.0,
        offset_x: 0.0,
        offset_y: 0.0,
    };

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    #[inline]
    fn to_base(self, sx: f64, sy: f64) -> (f64, f64) {
        (
            (sx - self.offset_x) / self.scale,
            (sy - self.offset_y) / self.scale,
        )
    }

    #[inline]
    fn to_screen(self, bx: f64, by: f64) -> (f64, f64) {
        (
            bx * self.scale + self.offset_x,
            by * self.scale + self.offset_y,
        )
    }
}

impl Default for LiveTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Centre and effective zoom of what is currently on screen, live transform
/// included.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentView {
    pub center_x: f64,
    pub center_y: f64,
    pub effective_zoom: f64,
}

/// Mapping between canvas pixels and the complex plane for one surface.
///
/// Holds the committed world `viewport`, the canvas size in pixels, and
/// the pending [`LiveTransform`]. Screen coordinates run from `(0, 0)` at
/// the top-left to `(width, height)`; screen row 0 maps to `y_min`.
#[derive(Debug, Clone)]
pub struct ViewTransform {
    viewport: Viewport,
    width: u32,
    height: u32,
    live: LiveTransform,
}

impl ViewTransform {
    pub fn new(viewport: Viewport, width: u32, height: u32) -> crate::Result<Self> {
        if width == 0 || height == 0 {
            return Err(CoreError::InvalidCanvas { width, height });
        }
        viewport.validate()?;
        Ok(Self {
            viewport,
            width,
            height,
            live: LiveTransform::IDENTITY,
        })
    }

    pub fn from_center_zoom(
        center: Complex,
        zoom: f64,
        width: u32,
        height: u32,
    ) -> crate::Result<Self> {
        let viewport = Viewport::from_center_zoom(center, zoom, width, height)?;
        Self::new(viewport, width, height)
    }

    /// The committed world rectangle. Ignores any pending live transform.
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn live(&self) -> LiveTransform {
        self.live
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    fn base_to_world(&self, bx: f64, by: f64) -> Complex {
        let vp = &self.viewport;
        Complex::new(
            vp.x_min + bx / self.width as f64 * vp.span_x(),
            vp.y_min + by / self.height as f64 * vp.span_y(),
        )
    }

    #[inline]
    fn world_to_base(&self, p: Complex) -> (f64, f64) {
        let vp = &self.viewport;
        (
            (p.re - vp.x_min) / vp.span_x() * self.width as f64,
            (p.im - vp.y_min) / vp.span_y() * self.height as f64,
        )
    }

    /// World point under screen position `(sx, sy)`, live transform included.
    pub fn screen_to_world(&self, sx: f64, sy: f64) -> Complex {
        let (bx, by) = self.live.to_base(sx, sy);
        self.base_to_world(bx, by)
    }

    /// Screen position of world point `p`; inverse of [`screen_to_world`](Self::screen_to_world).
    pub fn world_to_screen(&self, p: Complex) -> (f64, f64) {
        let (bx, by) = self.world_to_base(p);
        self.live.to_screen(bx, by)
    }

    /// Multiply the live scale by `factor`, keeping the world point under
    /// `(sx, sy)` fixed on screen. Non-positive or non-finite factors are
    /// ignored.
    pub fn zoom_at(&mut self, sx: f64, sy: f64, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let anchor = self.screen_to_world(sx, sy);
        self.live.scale = (self.live.scale * factor).clamp(MIN_LIVE_SCALE, MAX_LIVE_SCALE);
        self.lock_world_point(anchor, sx, sy);
    }

    /// Adjust the live offset so that world point `p` lands on `(sx, sy)`.
    fn lock_world_point(&mut self, p: Complex, sx: f64, sy: f64) {
        let (bx, by) = self.world_to_base(p);
        self.live.offset_x = sx - bx * self.live.scale;
        self.live.offset_y = sy - by * self.live.scale;
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.live.offset_x += dx;
        self.live.offset_y += dy;
    }

    /// Fold the live transform into the world viewport, computed from the
    /// world points under the two screen corners, and reset it to identity.
    ///
    /// Returns `Ok(false)` when there was nothing to fold. On error (the
    /// folded rectangle collapsed, e.g. past `f64` resolution) nothing is
    /// changed; callers may [`discard_live`](Self::discard_live).
    pub fn commit(&mut self) -> crate::Result<bool> {
        if self.live.is_identity() {
            return Ok(false);
        }
        let a = self.screen_to_world(0.0, 0.0);
        let b = self.screen_to_world(self.width as f64, self.height as f64);
        self.viewport = Viewport::new(
            a.re.min(b.re),
            a.re.max(b.re),
            a.im.min(b.im),
            a.im.max(b.im),
        )?;
        self.live = LiveTransform::IDENTITY;
        Ok(true)
    }

    pub fn discard_live(&mut self) {
        self.live = LiveTransform::IDENTITY;
    }

    /// Zoom of the committed viewport, on the `(4 / min(w, h)) / zoom`
    /// pixel-size scale.
    fn base_zoom(&self) -> f64 {
        let pixel_size = self.viewport.span_x() / self.width as f64;
        BASE_SPAN / self.width.min(self.height) as f64 / pixel_size
    }

    pub fn current_view(&self) -> CurrentView {
        let center = self.screen_to_world(self.width as f64 / 2.0, self.height as f64 / 2.0);
        CurrentView {
            center_x: center.re,
            center_y: center.im,
            effective_zoom: self.base_zoom() * self.live.scale,
        }
    }

    /// Resize the canvas, keeping the on-screen centre and the world size
    /// of a pixel. A pending live transform is folded first.
    pub fn resize(&mut self, width: u32, height: u32) -> crate::Result<()> {
        if width == 0 || height == 0 {
            return Err(CoreError::InvalidCanvas { width, height });
        }
        if (width, height) == (self.width, self.height) {
            return Ok(());
        }
        self.commit()?;
        let pixel_x = self.viewport.span_x() / self.width as f64;
        let pixel_y = self.viewport.span_y() / self.height as f64;
        self.viewport = Viewport::from_center_pixel_size(
            self.viewport.center(),
            pixel_x,
            pixel_y,
            width,
            height,
        )?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Replace the world view, dropping any live transform.
    pub fn set_view(&mut self, center: Complex, zoom: f64) -> crate::Result<()> {
        self.viewport = Viewport::from_center_zoom(center, zoom, self.width, self.height)?;
        self.live = LiveTransform::IDENTITY;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn mandelbrot_view() -> ViewTransform {
        ViewTransform::from_center_zoom(Complex::new(-0.75, 0.0), 1.0, 800, 600).unwrap()
    }

    #[test]
    fn centre_maps_to_canvas_middle() {
        let t = mandelbrot_view();
        let (sx, sy) = t.world_to_screen(Complex::new(-0.75, 0.0));
        assert!((sx - 400.0).abs() < EPSILON);
        assert!((sy - 300.0).abs() < EPSILON);
    }

    #[test]
    fn round_trip_with_live_transform() {
        let mut t = mandelbrot_view();
        t.zoom_at(123.0, 456.0, 2.5);
        t.pan_by(-37.5, 12.25);
        t.zoom_at(700.0, 20.0, 0.8);

        for &(sx, sy) in &[(0.0, 0.0), (799.0, 599.0), (400.5, 17.25), (-50.0, 900.0)] {
            let w = t.screen_to_world(sx, sy);
            let (bx, by) = t.world_to_screen(w);
            assert!((bx - sx).abs() < EPSILON, "x: {sx} → {bx}");
            assert!((by - sy).abs() < EPSILON, "y: {sy} → {by}");
        }
    }

    #[test]
    fn zoom_keeps_anchor_fixed() {
        let mut t = mandelbrot_view();
        let before = t.screen_to_world(200.0, 150.0);
        t.zoom_at(200.0, 150.0, 3.0);
        let after = t.screen_to_world(200.0, 150.0);
        assert!((before.re - after.re).abs() < EPSILON);
        assert!((before.im - after.im).abs() < EPSILON);
        assert!((t.live().scale - 3.0).abs() < EPSILON);
    }

    #[test]
    fn live_scale_is_clamped() {
        let mut t = mandelbrot_view();
        t.zoom_at(0.0, 0.0, 1e9);
        assert_eq!(t.live().scale, MAX_LIVE_SCALE);
        t.zoom_at(0.0, 0.0, 1e-20);
        assert_eq!(t.live().scale, MIN_LIVE_SCALE);

        let before = t.live();
        t.zoom_at(0.0, 0.0, f64::NAN);
        t.zoom_at(0.0, 0.0, -2.0);
        assert_eq!(t.live(), before);
    }

    #[test]
    fn commit_preserves_what_is_on_screen() {
        let mut t = mandelbrot_view();
        t.zoom_at(300.0, 200.0, 4.0);
        t.pan_by(25.0, -10.0);
        let sample = t.screen_to_world(512.0, 64.0);
        let view_before = t.current_view();

        assert!(t.commit().unwrap());
        assert!(t.live().is_identity());

        let after = t.screen_to_world(512.0, 64.0);
        assert!((sample.re - after.re).abs() < EPSILON);
        assert!((sample.im - after.im).abs() < EPSILON);

        let view_after = t.current_view();
        assert!((view_before.center_x - view_after.center_x).abs() < EPSILON);
        assert!((view_before.effective_zoom - view_after.effective_zoom).abs() < 1e-6);

        assert!(!t.commit().unwrap(), "identity commit is a no-op");
    }

    #[test]
    fn effective_zoom_tracks_live_scale() {
        let mut t = mandelbrot_view();
        assert!((t.current_view().effective_zoom - 1.0).abs() < EPSILON);
        t.zoom_at(400.0, 300.0, 2.0);
        let view = t.current_view();
        assert!((view.effective_zoom - 2.0).abs() < EPSILON);
        assert!((view.center_x + 0.75).abs() < EPSILON);
    }

    #[test]
    fn resize_keeps_centre_and_pixel_size() {
        let mut t = mandelbrot_view();
        let pixel = t.viewport().span_x() / 800.0;
        t.resize(400, 300).unwrap();
        let vp = t.viewport();
        assert!((vp.span_x() / 400.0 - pixel).abs() < EPSILON);
        assert!((vp.center().re + 0.75).abs() < EPSILON);
        assert_eq!(t.canvas_size(), (400, 300));
        assert!(t.resize(0, 10).is_err());
    }

    #[test]
    fn collapsed_commit_fails_without_mutation() {
        // A few ulps wide around 1.0: a 1e6 zoom drops below f64 resolution.
        let vp = Viewport::new(1.0, 1.0 + 1e-15, 1.0, 1.0 + 1e-15).unwrap();
        let mut t = ViewTransform::new(vp, 10, 10).unwrap();
        t.zoom_at(5.0, 5.0, MAX_LIVE_SCALE);
        assert!(t.commit().is_err());
        assert_eq!(t.viewport(), vp);
        assert!(!t.live().is_identity());

        t.discard_live();
        assert!(t.live().is_identity());
    }
}
