use serde::{Deserialize, Serialize};

/// Lighting strategy used for opaque scene geometry.
///
/// Read once per frame by the render sequencer; toggled by an explicit
/// user action, never by the renderer itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Single pass, every pixel lit by every light while rasterising.
    Forward,
    /// Geometry into the G-buffer, then ambient and per-light passes.
    #[default]
    Deferred,
}

impl RenderMode {
    pub fn toggled(self) -> Self {
        match self {
            RenderMode::Forward => RenderMode::Deferred,
            RenderMode::Deferred => RenderMode::Forward,
        }
    }

    pub fn toggle(&mut self) {
        *self = self.toggled();
    }

    pub fn label(self) -> &'static str {
        match self {
            RenderMode::Forward => "Forward Rendering",
            RenderMode::Deferred => "Deferred Rendering",
        }
    }
}

/// Which eye a camera query is made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StereoMode {
    #[default]
    Monoscopic,
    Left,
    Right,
}

impl StereoMode {
    /// Signed eye offset along the camera's local right axis for the given
    /// interocular distance: negative for the left eye, positive for the right.
    /// `None` for monoscopic so callers can take the cached fast path.
    pub fn eye_offset(self, interocular: f32) -> Option<f32> {
        match self {
            StereoMode::Monoscopic => None,
            StereoMode::Left => Some(interocular * -0.5),
            StereoMode::Right => Some(interocular * 0.5),
        }
    }
}

/// Pixel extent of the back buffer and every G-buffer target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Extents are clamped to at least one pixel (minimised windows report zero).
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280, 960)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_mode_toggles_back_and_forth() {
        let mut mode = RenderMode::default();
        assert_eq!(mode, RenderMode::Deferred);
        mode.toggle();
        assert_eq!(mode, RenderMode::Forward);
        mode.toggle();
        assert_eq!(mode, RenderMode::Deferred);
    }

    #[test]
    fn eye_offsets_are_symmetric() {
        assert_eq!(StereoMode::Monoscopic.eye_offset(0.65), None);
        assert_eq!(StereoMode::Left.eye_offset(2.0), Some(-1.0));
        assert_eq!(StereoMode::Right.eye_offset(2.0), Some(1.0));
    }

    #[test]
    fn viewport_never_zero_sized() {
        let vp = Viewport::new(0, 0);
        assert_eq!(vp.width, 1);
        assert_eq!(vp.height, 1);
        assert_eq!(Viewport::new(1280, 960).aspect(), 1280.0 / 960.0);
    }
}
