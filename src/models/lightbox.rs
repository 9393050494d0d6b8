//! Gesture state for the full-screen image viewer.
//!
//! The viewer's zoom/pan interaction is modelled as a small tagged state
//! machine instead of loose boolean flags, so invalid combinations
//! (dragging while not zoomed, closing mid-gesture) cannot be represented.
//! The GTK shell feeds pointer/gesture events in and renders whatever the
//! machine says; nothing in here touches a widget.
//!
//! Invariants held at every step:
//! - scale stays within `[MIN_SCALE, MAX_SCALE]`
//! - `Viewing` means scale == 1 and offset == (0, 0)
//! - whenever scale lands on 1, the offset is exactly (0, 0)
//! - the current index is always a valid position in the image list

use crate::models::GalleryImage;

pub const MIN_SCALE: f64 = 1.0;
pub const MAX_SCALE: f64 = 5.0;
/// Multiplicative wheel-zoom step (10% per notch).
pub const WHEEL_STEP: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Offset {
    pub x: f64,
    pub y: f64,
}

impl Offset {
    pub const ZERO: Offset = Offset { x: 0.0, y: 0.0 };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightboxState {
    Closed,
    /// One image shown at natural fit, no transform applied.
    Viewing { index: usize },
    /// Zoomed in; `panning` is true only between drag begin and drag end.
    Zoomed {
        index: usize,
        scale: f64,
        offset: Offset,
        panning: bool,
    },
}

#[derive(Debug)]
pub struct Lightbox {
    images: Vec<GalleryImage>,
    state: LightboxState,
    /// Viewport dimensions in logical pixels.
    viewport: (f64, f64),
    /// Rendered image size at scale 1 (already fitted to the viewport).
    image_size: (f64, f64),
    /// Scale at pinch begin; pinch ratios are relative to this baseline.
    pinch_base: Option<f64>,
    /// Offset at drag begin; drag deltas are relative to this origin.
    pan_origin: Option<Offset>,
}

impl Lightbox {
    pub fn new() -> Self {
        Self {
            images: Vec::new(),
            state: LightboxState::Closed,
            viewport: (0.0, 0.0),
            image_size: (0.0, 0.0),
            pinch_base: None,
            pan_origin: None,
        }
    }

    pub fn state(&self) -> LightboxState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.state, LightboxState::Closed)
    }

    pub fn is_zoomed(&self) -> bool {
        matches!(self.state, LightboxState::Zoomed { .. })
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        match self.state {
            LightboxState::Closed => None,
            LightboxState::Viewing { index } | LightboxState::Zoomed { index, .. } => Some(index),
        }
    }

    pub fn current_image(&self) -> Option<&GalleryImage> {
        self.current_index().and_then(|i| self.images.get(i))
    }

    pub fn image_at(&self, index: usize) -> Option<&GalleryImage> {
        self.images.get(index)
    }

    pub fn scale(&self) -> f64 {
        match self.state {
            LightboxState::Zoomed { scale, .. } => scale,
            _ => MIN_SCALE,
        }
    }

    pub fn offset(&self) -> Offset {
        match self.state {
            LightboxState::Zoomed { offset, .. } => offset,
            _ => Offset::ZERO,
        }
    }

    fn mid_gesture(&self) -> bool {
        self.pinch_base.is_some()
            || matches!(self.state, LightboxState::Zoomed { panning: true, .. })
    }

    /// Open the viewer over `images` starting at `start`.
    ///
    /// An empty list or out-of-range start index renders nothing: the
    /// machine stays closed and reports `false`.
    pub fn open(&mut self, images: Vec<GalleryImage>, start: usize) -> bool {
        if images.is_empty() || start >= images.len() {
            self.images.clear();
            self.state = LightboxState::Closed;
            return false;
        }
        self.images = images;
        self.state = LightboxState::Viewing { index: start };
        self.pinch_base = None;
        self.pan_origin = None;
        true
    }

    /// Close the viewer. Refused mid-gesture so a pan or pinch can never
    /// accidentally dismiss the image under the user's fingers.
    pub fn close(&mut self) -> bool {
        if !self.is_open() || self.mid_gesture() {
            return false;
        }
        self.state = LightboxState::Closed;
        self.images.clear();
        self.pinch_base = None;
        self.pan_origin = None;
        true
    }

    /// A click on the backdrop (outside the image). Closes only from the
    /// un-zoomed state; while zoomed it is part of panning, not dismissal.
    pub fn background_click(&mut self) -> bool {
        match self.state {
            LightboxState::Viewing { .. } => self.close(),
            _ => false,
        }
    }

    /// Step to the previous/next image. Clamped at both ends; a successful
    /// step always lands in `Viewing` (zoom and pan reset).
    pub fn navigate(&mut self, delta: i64) -> bool {
        let Some(index) = self.current_index() else {
            return false;
        };
        let target = index as i64 + delta;
        if target < 0 || target as usize >= self.images.len() {
            return false;
        }
        self.state = LightboxState::Viewing {
            index: target as usize,
        };
        self.pinch_base = None;
        self.pan_origin = None;
        true
    }

    pub fn can_navigate(&self, delta: i64) -> bool {
        match self.current_index() {
            Some(index) => {
                let target = index as i64 + delta;
                target >= 0 && (target as usize) < self.images.len()
            }
            None => false,
        }
    }

    /// Record the viewport size. The pan clamp depends on it, so a resize
    /// re-clamps any existing offset.
    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.viewport = (width.max(0.0), height.max(0.0));
        self.reclamp();
    }

    /// Record the rendered image size at scale 1 for the current image.
    pub fn set_image_size(&mut self, width: f64, height: f64) {
        self.image_size = (width.max(0.0), height.max(0.0));
        self.reclamp();
    }

    pub fn viewport(&self) -> (f64, f64) {
        self.viewport
    }

    pub fn image_size(&self) -> (f64, f64) {
        self.image_size
    }

    /// Largest legal offset magnitude per axis at `scale`: the image may
    /// pan until its edge meets the viewport edge, never past it.
    fn max_offset(&self, scale: f64) -> (f64, f64) {
        let (iw, ih) = self.image_size;
        let (vw, vh) = self.viewport;
        (
            ((iw * scale - vw) / 2.0).max(0.0),
            ((ih * scale - vh) / 2.0).max(0.0),
        )
    }

    fn clamp_offset(&self, offset: Offset, scale: f64) -> Offset {
        let (mx, my) = self.max_offset(scale);
        Offset {
            x: offset.x.clamp(-mx, mx),
            y: offset.y.clamp(-my, my),
        }
    }

    fn reclamp(&mut self) {
        if let LightboxState::Zoomed {
            index,
            scale,
            offset,
            panning,
        } = self.state
        {
            self.state = LightboxState::Zoomed {
                index,
                scale,
                offset: self.clamp_offset(offset, scale),
                panning,
            };
        }
    }

    /// Apply a new absolute scale, preserving (and re-clamping) the offset
    /// when staying zoomed, resetting it exactly to zero when landing on 1.
    fn apply_scale(&mut self, new_scale: f64) {
        let Some(index) = self.current_index() else {
            return;
        };
        let new_scale = new_scale.clamp(MIN_SCALE, MAX_SCALE);
        if new_scale <= MIN_SCALE {
            self.state = LightboxState::Viewing { index };
            self.pan_origin = None;
        } else {
            let offset = self.clamp_offset(self.offset(), new_scale);
            let panning = matches!(self.state, LightboxState::Zoomed { panning: true, .. });
            self.state = LightboxState::Zoomed {
                index,
                scale: new_scale,
                offset,
                panning,
            };
        }
    }

    /// Two contacts came down; subsequent pinch ratios are relative to the
    /// scale captured here.
    pub fn pinch_begin(&mut self) {
        if self.is_open() {
            self.pinch_base = Some(self.scale());
        }
    }

    /// `ratio` is current contact distance over the distance at begin.
    pub fn pinch_update(&mut self, ratio: f64) {
        let Some(base) = self.pinch_base else {
            return;
        };
        if ratio.is_finite() && ratio > 0.0 {
            self.apply_scale(base * ratio);
        }
    }

    pub fn pinch_end(&mut self) {
        self.pinch_base = None;
        // Snap back to exactly 1 if the gesture ended at or below the floor.
        if let LightboxState::Zoomed { index, scale, .. } = self.state {
            if scale <= MIN_SCALE {
                self.state = LightboxState::Viewing { index };
            }
        }
    }

    /// One discrete wheel notch with the zoom modifier held.
    pub fn wheel_zoom(&mut self, zoom_in: bool) {
        if !self.is_open() {
            return;
        }
        let factor = if zoom_in {
            1.0 + WHEEL_STEP
        } else {
            1.0 - WHEEL_STEP
        };
        self.apply_scale(self.scale() * factor);
    }

    /// Drag begin. Only meaningful while zoomed; at scale 1 there is
    /// nothing to pan and the press may become a backdrop click instead.
    pub fn pan_begin(&mut self) {
        if let LightboxState::Zoomed {
            index,
            scale,
            offset,
            ..
        } = self.state
        {
            self.state = LightboxState::Zoomed {
                index,
                scale,
                offset,
                panning: true,
            };
            self.pan_origin = Some(offset);
        }
    }

    /// Drag update with the raw pointer delta from drag start.
    pub fn pan_update(&mut self, dx: f64, dy: f64) {
        let Some(origin) = self.pan_origin else {
            return;
        };
        if let LightboxState::Zoomed {
            index,
            scale,
            panning: true,
            ..
        } = self.state
        {
            let next = Offset {
                x: origin.x + dx,
                y: origin.y + dy,
            };
            self.state = LightboxState::Zoomed {
                index,
                scale,
                offset: self.clamp_offset(next, scale),
                panning: true,
            };
        }
    }

    pub fn pan_end(&mut self) {
        self.pan_origin = None;
        if let LightboxState::Zoomed {
            index,
            scale,
            offset,
            ..
        } = self.state
        {
            self.state = LightboxState::Zoomed {
                index,
                scale,
                offset,
                panning: false,
            };
        }
    }
}

impl Default for Lightbox {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imgs(n: usize) -> Vec<GalleryImage> {
        (0..n)
            .map(|i| GalleryImage::new(i.to_string(), format!("http://img/{i}.jpg")))
            .collect()
    }

    fn open_fitted(n: usize, start: usize) -> Lightbox {
        let mut lb = Lightbox::new();
        assert!(lb.open(imgs(n), start));
        lb.set_viewport(800.0, 600.0);
        lb.set_image_size(800.0, 600.0);
        lb
    }

    #[test]
    fn test_open_resets_transform() {
        for start in 0..3 {
            let lb = open_fitted(3, start);
            assert_eq!(lb.current_index(), Some(start));
            assert_eq!(lb.scale(), 1.0);
            assert_eq!(lb.offset(), Offset::ZERO);
        }
    }

    #[test]
    fn test_open_rejects_bad_input() {
        let mut lb = Lightbox::new();
        assert!(!lb.open(vec![], 0));
        assert!(!lb.is_open());
        assert!(!lb.open(imgs(2), 2));
        assert!(!lb.is_open());
    }

    #[test]
    fn test_scale_bounded_under_gesture_sequences() {
        let mut lb = open_fitted(1, 0);
        lb.pinch_begin();
        lb.pinch_update(100.0);
        assert_eq!(lb.scale(), MAX_SCALE);
        lb.pinch_update(0.001);
        assert_eq!(lb.scale(), MIN_SCALE);
        lb.pinch_end();

        for _ in 0..100 {
            lb.wheel_zoom(true);
            assert!(lb.scale() <= MAX_SCALE);
        }
        assert_eq!(lb.scale(), MAX_SCALE);
        for _ in 0..100 {
            lb.wheel_zoom(false);
            assert!(lb.scale() >= MIN_SCALE);
        }
        assert_eq!(lb.scale(), MIN_SCALE);
    }

    #[test]
    fn test_offset_zero_whenever_scale_returns_to_one() {
        let mut lb = open_fitted(1, 0);
        // Zoom in, pan away from center, zoom back out with the wheel.
        lb.pinch_begin();
        lb.pinch_update(3.0);
        lb.pinch_end();
        lb.pan_begin();
        lb.pan_update(250.0, 130.0);
        lb.pan_end();
        assert_ne!(lb.offset(), Offset::ZERO);
        while lb.scale() > MIN_SCALE {
            lb.wheel_zoom(false);
        }
        assert_eq!(lb.offset(), Offset::ZERO);

        // Same via a pinch that collapses below the floor.
        lb.pinch_begin();
        lb.pinch_update(4.0);
        lb.pinch_end();
        lb.pan_begin();
        lb.pan_update(-300.0, 0.0);
        lb.pan_end();
        lb.pinch_begin();
        lb.pinch_update(0.01);
        lb.pinch_end();
        assert_eq!(lb.scale(), MIN_SCALE);
        assert_eq!(lb.offset(), Offset::ZERO);
    }

    #[test]
    fn test_navigation_clamped_and_resetting() {
        let mut lb = open_fitted(3, 0);
        assert!(!lb.navigate(-1));
        assert_eq!(lb.current_index(), Some(0));

        lb.pinch_begin();
        lb.pinch_update(2.5);
        lb.pinch_end();
        assert!(lb.is_zoomed());

        assert!(lb.navigate(1));
        assert_eq!(lb.current_index(), Some(1));
        assert_eq!(lb.scale(), 1.0);
        assert_eq!(lb.offset(), Offset::ZERO);

        assert!(lb.navigate(1));
        assert!(!lb.navigate(1));
        assert_eq!(lb.current_index(), Some(2));
    }

    #[test]
    fn test_background_click_close_rules() {
        let mut lb = open_fitted(1, 0);
        lb.pinch_begin();
        lb.pinch_update(2.0);
        lb.pinch_end();
        assert!(!lb.background_click());
        assert!(lb.is_open());

        // Back at scale 1 the same click dismisses.
        lb.pinch_begin();
        lb.pinch_update(0.1);
        lb.pinch_end();
        assert!(lb.background_click());
        assert!(!lb.is_open());
    }

    #[test]
    fn test_close_refused_mid_gesture() {
        let mut lb = open_fitted(1, 0);
        lb.pinch_begin();
        lb.pinch_update(2.0);
        assert!(!lb.close());
        lb.pinch_end();

        lb.pan_begin();
        assert!(!lb.close());
        lb.pan_end();
        assert!(lb.close());
    }

    #[test]
    fn test_pan_clamped_to_image_edges() {
        let mut lb = open_fitted(1, 0);
        lb.pinch_begin();
        lb.pinch_update(2.0);
        lb.pinch_end();
        // 800x600 image at 2x in an 800x600 viewport: half the overhang.
        lb.pan_begin();
        lb.pan_update(10_000.0, -10_000.0);
        lb.pan_end();
        assert_eq!(lb.offset(), Offset { x: 400.0, y: -300.0 });
    }

    #[test]
    fn test_pan_ignored_at_scale_one() {
        let mut lb = open_fitted(1, 0);
        lb.pan_begin();
        lb.pan_update(50.0, 50.0);
        lb.pan_end();
        assert_eq!(lb.offset(), Offset::ZERO);
        assert!(!lb.is_zoomed());
    }

    #[test]
    fn test_viewport_shrink_reclamps_offset() {
        let mut lb = open_fitted(1, 0);
        lb.pinch_begin();
        lb.pinch_update(2.0);
        lb.pinch_end();
        lb.pan_begin();
        lb.pan_update(400.0, 0.0);
        lb.pan_end();
        assert_eq!(lb.offset().x, 400.0);

        // Larger viewport leaves less overhang; the offset must shrink too.
        lb.set_viewport(1400.0, 600.0);
        assert_eq!(lb.offset().x, 100.0);
    }
}
