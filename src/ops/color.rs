use std::time::{Duration, Instant};

use bytemuck::{Pod, Zeroable};
use tracing::debug;

use crate::types::modes::{ColorEncoding, ResolutionScale, ToneMapOperator};

pub const DEFAULT_EXPOSURE: f32 = 1.0;
pub const EXPOSURE_STEP: f32 = 0.1;
pub const MIN_EXPOSURE: f32 = 0.5;
pub const MAX_EXPOSURE: f32 = 2.0;

pub const MIN_BRIGHTNESS: f32 = 0.1;
pub const MAX_BRIGHTNESS: f32 = 2.0;

pub const INDICATOR_TIMEOUT: Duration = Duration::from_millis(1500);

/// Transient overlay text. Every `show` restarts the hide deadline.
#[derive(Debug, Clone, Default)]
pub struct OverlayIndicator {
    text: String,
    hide_at: Option<Instant>,
}

impl OverlayIndicator {
    pub fn show(&mut self, text: String, now: Instant) {
        self.text = text;
        self.hide_at = Some(now + INDICATOR_TIMEOUT);
    }

    pub fn visible_text(&self, now: Instant) -> Option<&str> {
        match self.hide_at {
            Some(deadline) if now < deadline => Some(&self.text),
            _ => None,
        }
    }

    /// Time left before the indicator hides, used to schedule a repaint.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.hide_at
            .and_then(|deadline| deadline.checked_duration_since(now))
            .filter(|d| !d.is_zero())
    }
}

/// Uniform block read by the scene fragment shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ColorUniforms {
    /// rgb = brightness tint, a = exposure
    pub tint_exposure: [f32; 4],
    pub tone_mapping: u32,
    pub encoding: u32,
    pub decode_srgb: u32,
    pub _pad: u32,
}

/// Live-adjustable surface parameters. Setters only flag the material dirty;
/// nothing here touches the mesh or the texture.
#[derive(Debug, Clone)]
pub struct ColorPipeline {
    tone_mapping: ToneMapOperator,
    encoding: ColorEncoding,
    exposure: f32,
    resolution_scale: ResolutionScale,
    brightness: f32,
    dirty: bool,
    indicator: OverlayIndicator,
}

impl Default for ColorPipeline {
    fn default() -> Self {
        Self {
            tone_mapping: ToneMapOperator::default(),
            encoding: ColorEncoding::default(),
            exposure: DEFAULT_EXPOSURE,
            resolution_scale: ResolutionScale::default(),
            brightness: 1.0,
            dirty: true,
            indicator: OverlayIndicator::default(),
        }
    }
}

impl ColorPipeline {
    pub fn new(
        tone_mapping: ToneMapOperator,
        encoding: ColorEncoding,
        exposure: f32,
        resolution_scale: ResolutionScale,
    ) -> Self {
        Self {
            tone_mapping,
            encoding,
            exposure: exposure.clamp(MIN_EXPOSURE, MAX_EXPOSURE),
            resolution_scale,
            ..Self::default()
        }
    }

    pub fn tone_mapping(&self) -> ToneMapOperator {
        self.tone_mapping
    }

    pub fn encoding(&self) -> ColorEncoding {
        self.encoding
    }

    pub fn exposure(&self) -> f32 {
        self.exposure
    }

    pub fn resolution_scale(&self) -> ResolutionScale {
        self.resolution_scale
    }

    pub fn brightness(&self) -> f32 {
        self.brightness
    }

    pub fn indicator(&self) -> &OverlayIndicator {
        &self.indicator
    }

    pub fn set_tone_mapping(&mut self, op: ToneMapOperator) {
        debug!(?op, "tone mapping changed");
        self.tone_mapping = op;
        // Switching operator resets exposure to neutral.
        self.exposure = DEFAULT_EXPOSURE;
        self.dirty = true;
    }

    pub fn set_encoding(&mut self, encoding: ColorEncoding) {
        debug!(?encoding, "output encoding changed");
        self.encoding = encoding;
        self.dirty = true;
    }

    pub fn set_resolution_scale(&mut self, scale: ResolutionScale) {
        debug!(factor = scale.factor(), "resolution scale changed");
        self.resolution_scale = scale;
        self.dirty = true;
    }

    pub fn nudge_exposure(&mut self, delta: f32, now: Instant) -> f32 {
        self.exposure = (self.exposure + delta).clamp(MIN_EXPOSURE, MAX_EXPOSURE);
        self.dirty = true;
        self.indicator
            .show(format!("Exposure: {:.1}", self.exposure), now);
        self.exposure
    }

    pub fn set_brightness(&mut self, value: f32, now: Instant) {
        self.brightness = value.clamp(MIN_BRIGHTNESS, MAX_BRIGHTNESS);
        self.dirty = true;
        self.indicator.show(
            format!("Brightness: {}%", (self.brightness * 100.0).round() as i32),
            now,
        );
    }

    /// Uniform RGB multiplier applied to the mesh material.
    pub fn tint(&self) -> [f32; 3] {
        [self.brightness; 3]
    }

    /// Device pixel density after applying the quality setting.
    pub fn effective_pixel_ratio(&self, device_pixel_ratio: f32) -> f32 {
        device_pixel_ratio * self.resolution_scale.factor()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns fresh uniforms once per change; `None` while nothing changed.
    pub fn take_update(&mut self) -> Option<ColorUniforms> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        Some(self.uniforms())
    }

    pub fn uniforms(&self) -> ColorUniforms {
        let [r, g, b] = self.tint();
        ColorUniforms {
            tint_exposure: [r, g, b, self.exposure],
            tone_mapping: self.tone_mapping.shader_index(),
            encoding: self.encoding.shader_index(),
            decode_srgb: self.encoding.decodes_srgb_input() as u32,
            _pad: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brightness_tints_and_shows_indicator() {
        let start = Instant::now();
        let mut color = ColorPipeline::default();
        color.take_update();

        color.set_brightness(0.3, start);
        let tint = color.tint();
        assert!(tint.iter().all(|c| (c - 0.3).abs() < 1e-6));
        assert_eq!(
            color.indicator().visible_text(start + Duration::from_millis(100)),
            Some("Brightness: 30%")
        );
        assert_eq!(
            color.indicator().visible_text(start + Duration::from_millis(1500)),
            None
        );
        assert!(color.take_update().is_some());
        assert!(color.take_update().is_none());
    }

    #[test]
    fn test_indicator_timer_restarts_on_each_change() {
        let start = Instant::now();
        let mut color = ColorPipeline::default();
        color.set_brightness(0.5, start);
        color.set_brightness(0.6, start + Duration::from_millis(1000));
        let later = start + Duration::from_millis(2000);
        assert_eq!(color.indicator().visible_text(later), Some("Brightness: 60%"));
        assert_eq!(
            color
                .indicator()
                .visible_text(start + Duration::from_millis(2600)),
            None
        );
    }

    #[test]
    fn test_exposure_steps_and_clamps() {
        let now = Instant::now();
        let mut color = ColorPipeline::default();
        for _ in 0..20 {
            color.nudge_exposure(EXPOSURE_STEP, now);
        }
        assert_eq!(color.exposure(), MAX_EXPOSURE);
        for _ in 0..30 {
            color.nudge_exposure(-EXPOSURE_STEP, now);
        }
        assert_eq!(color.exposure(), MIN_EXPOSURE);
        assert_eq!(color.indicator().visible_text(now), Some("Exposure: 0.5"));
    }

    #[test]
    fn test_changes_only_flag_dirty() {
        let mut color = ColorPipeline::default();
        color.take_update();
        assert!(!color.is_dirty());

        color.set_encoding(ColorEncoding::Linear);
        let u = color.take_update().unwrap();
        assert_eq!(u.encoding, 0);
        assert_eq!(u.decode_srgb, 0);

        color.set_tone_mapping(ToneMapOperator::ACESFilmic);
        let u = color.take_update().unwrap();
        assert_eq!(u.tone_mapping, 4);
        assert_eq!(u.tint_exposure[3], DEFAULT_EXPOSURE);
    }

    #[test]
    fn test_effective_pixel_ratio() {
        let mut color = ColorPipeline::default();
        color.set_resolution_scale(ResolutionScale::Low);
        assert_eq!(color.effective_pixel_ratio(2.0), 1.0);
        assert_eq!(std::mem::size_of::<ColorUniforms>(), 32);
    }
}
