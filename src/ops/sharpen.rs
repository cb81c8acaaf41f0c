use bytemuck::{Pod, Zeroable};

pub const DEFAULT_STRENGTH: f32 = 0.5;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SharpenUniforms {
    pub texel: [f32; 2],
    pub strength: f32,
    pub _pad: f32,
}

/// Parameters of the full-screen pass that runs after the scene render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SharpenPass {
    strength: f32,
    resolution: (u32, u32),
}

impl Default for SharpenPass {
    fn default() -> Self {
        Self::new(DEFAULT_STRENGTH)
    }
}

impl SharpenPass {
    pub fn new(strength: f32) -> Self {
        Self {
            strength: strength.clamp(0.0, 1.0),
            resolution: (1, 1),
        }
    }

    pub fn strength(&self) -> f32 {
        self.strength
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    /// Must track the size of the scene target the pass samples from.
    pub fn set_resolution(&mut self, width: u32, height: u32) {
        self.resolution = (width.max(1), height.max(1));
    }

    pub fn uniforms(&self) -> SharpenUniforms {
        SharpenUniforms {
            texel: [1.0 / self.resolution.0 as f32, 1.0 / self.resolution.1 as f32],
            strength: self.strength,
            _pad: 0.0,
        }
    }
}
