use std::sync::OnceLock;

use half::f16;
use tracing::debug;


/// One decoded frame, tightly packed RGBA8.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl DecodedFrame {
    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.pixels.len() == self.width as usize * self.height as usize * 4
    }
}

/// Texel data ready for a `Rgba16Float` texture, linear filtering, no mips.
#[derive(Debug)]
pub struct TextureUpload<'a> {
    pub width: u32,
    pub height: u32,
    pub texels: &'a [f16],
    /// The texture must be (re)created before writing: first frame of a
    /// source, or the frame size changed.
    pub reallocate: bool,
}

fn widen_lut() -> &'static [f16; 256] {
    static LUT: OnceLock<[f16; 256]> = OnceLock::new();
    LUT.get_or_init(|| std::array::from_fn(|i| f16::from_f32(i as f32 / 255.0)))
}

/// Widens 8-bit channels to half floats in [0, 1].
pub fn widen_rgba8(src: &[u8], dst: &mut Vec<f16>) {
    let lut = widen_lut();
    dst.clear();
    dst.extend(src.iter().map(|b| lut[*b as usize]));
}

/// CPU side of the video texture. Holds the newest decoded frame and hands
/// it to the GPU at most once per render tick.
#[derive(Debug, Default)]
pub struct FrameBridge {
    pending: Option<DecodedFrame>,
    texels: Vec<f16>,
    allocated: Option<(u32, u32)>,
    dirty: bool,
}

impl FrameBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest frame wins; an unconsumed older frame is dropped.
    pub fn submit(&mut self, frame: DecodedFrame) {
        if frame.is_valid() {
            self.pending = Some(frame);
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Size of the GPU texture currently allocated, if any.
    pub fn allocated_size(&self) -> Option<(u32, u32)> {
        self.allocated
    }

    /// Forgets the texture. The next upload reallocates it.
    pub fn dispose(&mut self) {
        if self.allocated.take().is_some() {
            debug!("video texture disposed");
        }
        self.pending = None;
        self.texels = Vec::new();
        self.dirty = false;
    }

    /// Converts the pending frame when the texture was marked dirty.
    pub fn take_upload(&mut self) -> Option<TextureUpload<'_>> {
        if !self.dirty {
            return None;
        }
        let frame = self.pending.take()?;
        self.dirty = false;
        widen_rgba8(&frame.pixels, &mut self.texels);

        let size = (frame.width, frame.height);
        let reallocate = self.allocated != Some(size);
        if reallocate {
            debug!(width = size.0, height = size.1, "allocating video texture");
        }
        self.allocated = Some(size);
        Some(TextureUpload {
            width: frame.width,
            height: frame.height,
            texels: &self.texels,
            reallocate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(w: u32, h: u32, v: u8) -> DecodedFrame {
        DecodedFrame {
            width: w,
            height: h,
            pixels: vec![v; (w * h * 4) as usize],
        }
    }

    #[test]
    fn test_widen_maps_to_unit_range() {
        let mut out = Vec::new();
        widen_rgba8(&[0, 255, 128, 51], &mut out);
        assert_eq!(out[0], f16::ZERO);
        assert_eq!(out[1], f16::ONE);
        assert!((out[2].to_f32() - 128.0 / 255.0).abs() < 1e-3);
        assert!((out[3].to_f32() - 0.2).abs() < 1e-3);
    }

    #[test]
    fn test_upload_only_when_dirty() {
        let mut bridge = FrameBridge::new();
        bridge.submit(frame(4, 2, 10));
        assert!(bridge.take_upload().is_none());
        bridge.mark_dirty();
        let up = bridge.take_upload().unwrap();
        assert_eq!((up.width, up.height, up.texels.len()), (4, 2, 32));
        assert!(up.reallocate);
        // Nothing new arrived.
        bridge.mark_dirty();
        assert!(bridge.take_upload().is_none());
    }

    #[test]
    fn test_same_size_reuses_texture_and_resize_reallocates() {
        let mut bridge = FrameBridge::new();
        bridge.submit(frame(4, 2, 1));
        bridge.mark_dirty();
        assert!(bridge.take_upload().unwrap().reallocate);

        bridge.submit(frame(4, 2, 2));
        bridge.mark_dirty();
        assert!(!bridge.take_upload().unwrap().reallocate);

        bridge.submit(frame(8, 4, 3));
        bridge.mark_dirty();
        assert!(bridge.take_upload().unwrap().reallocate);
        assert_eq!(bridge.allocated_size(), Some((8, 4)));
    }

    #[test]
    fn test_latest_frame_wins_and_dispose_forces_realloc() {
        let mut bridge = FrameBridge::new();
        bridge.submit(frame(2, 2, 0));
        bridge.submit(frame(2, 2, 255));
        bridge.mark_dirty();
        assert_eq!(bridge.take_upload().unwrap().texels[0], f16::ONE);

        bridge.dispose();
        assert_eq!(bridge.allocated_size(), None);
        bridge.submit(frame(2, 2, 0));
        bridge.mark_dirty();
        assert!(bridge.take_upload().unwrap().reallocate);
    }

    #[test]
    fn test_malformed_frames_are_ignored() {
        let mut bridge = FrameBridge::new();
        bridge.submit(DecodedFrame {
            width: 4,
            height: 4,
            pixels: vec![0; 3],
        });
        bridge.mark_dirty();
        assert!(bridge.take_upload().is_none());
    }
}
