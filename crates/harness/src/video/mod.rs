//! Video compositor.
//!
//! The compositor reconstructs frames from the core's pixel stream. It provides:
//! 1. **Raster tracking:** Beam position follows the blank and sync strobes; only
//!    active samples are written.
//! 2. **Orientation:** Rotation and vertical flip are applied at write time, so the
//!    published frame is already in display orientation.
//! 3. **Double buffering:** The core writes into a working frame; a v-sync falling
//!    edge publishes it and the previously published frame becomes the new target.
//! 4. **Presentation:** [`VideoCompositor::update_texture`] hands the published frame
//!    to a [`Renderer`] at most once per publication.

/// Frame-rate estimation.
pub mod fps;

/// Framebuffers and rotation.
pub mod frame;

pub use fps::FpsCounter;
pub use frame::{Frame, Rotation};

use std::time::Instant;

use tracing::{debug, trace};

/// Metadata passed alongside a published frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMeta {
    /// Publications since the compositor was created or reset.
    pub frame_count: u64,
    /// Rolling frame-rate estimate.
    pub fps: f64,
    /// Orientation already applied to the pixels.
    pub rotation: Rotation,
    /// Whether rows were flipped.
    pub vflip: bool,
}

/// Presentation back end receiving published frames.
pub trait Renderer {
    /// Uploads a published frame; called only when a new frame exists.
    fn upload(&mut self, frame: &Frame, meta: FrameMeta);
}

/// Reconstructs frames from the pixel stream.
#[derive(Debug)]
pub struct VideoCompositor {
    width: u32,
    height: u32,
    rotation: Rotation,
    vflip: bool,
    working: Frame,
    published: Frame,
    x: u32,
    y: u32,
    line_active: bool,
    last_h_blank: bool,
    last_h_sync: bool,
    last_v_sync: bool,
    frame_count: u64,
    uploaded_count: u64,
    fps: FpsCounter,
}

impl VideoCompositor {
    /// Creates a compositor for a `width x height` active area.
    pub fn new(width: u32, height: u32, rotation: Rotation, vflip: bool, fps_window: usize) -> Self {
        let (w, h) = rotation.output_size(width, height);
        Self {
            width,
            height,
            rotation,
            vflip,
            working: Frame::new(w, h),
            published: Frame::new(w, h),
            x: 0,
            y: 0,
            line_active: false,
            last_h_blank: false,
            last_h_sync: false,
            last_v_sync: false,
            frame_count: 0,
            uploaded_count: 0,
            fps: FpsCounter::new(fps_window),
        }
    }

    /// Consumes one pixel-clock sample.
    ///
    /// Call on each pixel-clock rising edge while the core's pixel enable is high.
    pub fn clock(&mut self, h_blank: bool, v_blank: bool, h_sync: bool, v_sync: bool, colour: u32) {
        let line_end = (h_blank && !self.last_h_blank) || (h_sync && !self.last_h_sync);
        if line_end {
            if self.line_active {
                self.y = self.y.saturating_add(1);
            }
            self.x = 0;
            self.line_active = false;
        }

        if !h_blank && !v_blank {
            self.write(self.x, self.y, colour);
            self.x = self.x.saturating_add(1);
            self.line_active = true;
        }

        if !v_sync && self.last_v_sync {
            self.publish();
        }

        self.last_h_blank = h_blank;
        self.last_h_sync = h_sync;
        self.last_v_sync = v_sync;
    }

    #[inline]
    fn write(&mut self, x: u32, y: u32, colour: u32) {
        if x >= self.width || y >= self.height {
            return;
        }
        let (dx, mut dy) = self.rotation.map(x, y, self.width, self.height);
        if self.vflip {
            dy = self.working.height() - 1 - dy;
        }
        let _ = self.working.set(dx, dy, colour);
    }

    fn publish(&mut self) {
        std::mem::swap(&mut self.working, &mut self.published);
        self.working.clear();
        self.x = 0;
        self.y = 0;
        self.line_active = false;
        self.frame_count += 1;
        self.fps.record(Instant::now());
        trace!(frame = self.frame_count, "frame published");
    }

    /// Hands the published frame to `renderer` if it changed since the last upload.
    pub fn update_texture<R: Renderer + ?Sized>(&mut self, renderer: &mut R) -> bool {
        if self.frame_count == self.uploaded_count {
            return false;
        }
        self.uploaded_count = self.frame_count;
        renderer.upload(&self.published, self.meta());
        true
    }

    fn meta(&self) -> FrameMeta {
        FrameMeta {
            frame_count: self.frame_count,
            fps: self.fps.fps(),
            rotation: self.rotation,
            vflip: self.vflip,
        }
    }

    /// Changes the rotation; both buffers are reallocated and the raster restarts.
    pub fn set_rotation(&mut self, rotation: Rotation) {
        if rotation == self.rotation {
            return;
        }
        debug!(?rotation, "video rotation changed");
        self.rotation = rotation;
        let (w, h) = rotation.output_size(self.width, self.height);
        self.working = Frame::new(w, h);
        self.published = Frame::new(w, h);
        self.x = 0;
        self.y = 0;
        self.line_active = false;
    }

    /// Enables or disables vertical flip for subsequent writes.
    pub fn set_vflip(&mut self, vflip: bool) {
        self.vflip = vflip;
    }

    /// Clears both buffers and the raster position; counters restart from zero.
    pub fn reset(&mut self) {
        self.working.clear();
        self.published.clear();
        self.x = 0;
        self.y = 0;
        self.line_active = false;
        self.last_h_blank = false;
        self.last_h_sync = false;
        self.last_v_sync = false;
        self.frame_count = 0;
        self.uploaded_count = 0;
        self.fps.reset();
    }

    /// The most recently published frame.
    pub fn last_frame(&self) -> &Frame {
        &self.published
    }

    /// Publications so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Rolling frame-rate estimate.
    pub fn fps(&self) -> f64 {
        self.fps.fps()
    }

    /// Output dimensions after rotation.
    pub fn output_size(&self) -> (u32, u32) {
        (self.published.width(), self.published.height())
    }

    /// Current rotation.
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Current vertical flip setting.
    pub fn vflip(&self) -> bool {
        self.vflip
    }

    /// Current beam position in source coordinates.
    pub fn position(&self) -> (u32, u32) {
        (self.x, self.y)
    }
}
