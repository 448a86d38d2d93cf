use std::cell::Cell;
use std::rc::Rc;

use super::ColorDepth;

/// Largest supported internal upscaling factor.
pub const MAX_UPSCALING: u32 = 16;

/// Frontend-exposed renderer options.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RendererSettings {
    /// Render-target scale over native VRAM (1..=16).
    pub upscaling: u32,
    pub color_depth: ColorDepth,
    /// Index the dither matrix with upscaled coordinates instead of native ones.
    pub scale_dither: bool,
    /// Draw command primitives as outlines.
    pub wireframe: bool,
    /// Present all of VRAM instead of the display region.
    pub display_full_vram: bool,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            upscaling: 1,
            color_depth: ColorDepth::Bits16,
            scale_dither: false,
            wireframe: false,
            display_full_vram: false,
        }
    }
}

impl RendererSettings {
    /// Clamps out-of-range values, logging what was changed.
    pub fn sanitized(mut self) -> Self {
        if self.upscaling == 0 || self.upscaling > MAX_UPSCALING {
            let clamped = self.upscaling.clamp(1, MAX_UPSCALING);
            log::warn!("upscaling {}x out of range, using {}x", self.upscaling, clamped);
            self.upscaling = clamped;
        }
        self
    }
}

/// External source of renderer options.
///
/// The renderer only reads; it never drives the frontend's configuration UI.
pub trait SettingsProvider {
    fn settings(&self) -> RendererSettings;
}

/// In-memory settings shared between the host and a renderer.
///
/// Clones share the same value, so the host can keep a handle and change
/// options between frames.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings {
    value: Rc<Cell<RendererSettings>>,
}

impl StaticSettings {
    pub fn new(settings: RendererSettings) -> Self {
        Self {
            value: Rc::new(Cell::new(settings)),
        }
    }

    #[inline]
    pub fn get(&self) -> RendererSettings {
        self.value.get()
    }

    #[inline]
    pub fn set(&self, settings: RendererSettings) {
        self.value.set(settings);
    }

    /// Applies `f` to the current value.
    pub fn update(&self, f: impl FnOnce(&mut RendererSettings)) {
        let mut s = self.value.get();
        f(&mut s);
        self.value.set(s);
    }
}

impl SettingsProvider for StaticSettings {
    fn settings(&self) -> RendererSettings {
        self.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_value() {
        let host = StaticSettings::default();
        let renderer_side = host.clone();
        host.update(|s| s.upscaling = 4);
        assert_eq!(renderer_side.settings().upscaling, 4);
    }

    #[test]
    fn sanitized_clamps_upscaling() {
        let s = RendererSettings { upscaling: 0, ..RendererSettings::default() }.sanitized();
        assert_eq!(s.upscaling, 1);
        let s = RendererSettings { upscaling: 64, ..RendererSettings::default() }.sanitized();
        assert_eq!(s.upscaling, MAX_UPSCALING);
    }
}
