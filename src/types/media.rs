use std::path::Path;

use crate::types::error::PlayerError;

pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["mp4", "webm", "mkv", "mov"];

/// Used until the decoder has reported real dimensions.
pub const FALLBACK_RESOLUTION: (u32, u32) = (1920, 1080);

/// What the decoder has told us about the current source so far.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VideoMetadata {
    pub resolution: Option<(u32, u32)>,
    pub duration: Option<f64>,
}

impl VideoMetadata {
    pub fn resolution_or_default(&self) -> (u32, u32) {
        match self.resolution {
            Some((w, h)) if w > 0 && h > 0 => (w, h),
            _ => FALLBACK_RESOLUTION,
        }
    }

    pub fn aspect_ratio(&self) -> f32 {
        let (w, h) = self.resolution_or_default();
        w as f32 / h as f32
    }
}

/// Rejects files whose extension the player does not accept.
pub fn validate_video_path(path: &str) -> Result<(), PlayerError> {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(PlayerError::UnsupportedFormat { extension: ext })
    }
}

/// Converts a local path (or passes through a URL) into a GStreamer URI.
pub fn source_uri(path: &str) -> Result<String, PlayerError> {
    if path.starts_with("http://") || path.starts_with("https://") || path.starts_with("file://")
    {
        return Ok(path.to_string());
    }
    let abs = std::fs::canonicalize(path)?;
    gstreamer::glib::filename_to_uri(&abs, None)
        .map(|uri| uri.to_string())
        .map_err(PlayerError::from)
}
