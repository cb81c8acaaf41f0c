use std::path::PathBuf;

use clap::Parser;

use crate::audio::graph::DEFAULT_WIDTH_CAP;
use crate::ops::geometry::SphereDetail;
use crate::ops::sharpen::DEFAULT_STRENGTH;
use crate::renderer::render_loop::PlayerSettings;
use crate::types::modes::{ColorEncoding, ResolutionScale, ToneMapOperator, VideoMode};

#[derive(Parser, Debug, Clone)]
#[command(name = "orbview", version, about = "360° and flat video player")]
pub struct Config {
    /// Video to open on start-up.
    pub video: Option<PathBuf>,

    /// mono, stereo-lr, stereo-tb or flat
    #[arg(long, default_value = "mono")]
    pub mode: VideoMode,

    /// Render resolution scale: 1.0, 0.75 or 0.5
    #[arg(long, default_value = "1.0")]
    pub quality: ResolutionScale,

    #[arg(long, default_value = "Linear")]
    pub tone_mapping: ToneMapOperator,

    #[arg(long, default_value = "sRGBEncoding")]
    pub encoding: ColorEncoding,

    #[arg(long, default_value_t = 1.0)]
    pub exposure: f32,

    #[arg(long, default_value_t = DEFAULT_STRENGTH)]
    pub sharpen_strength: f32,

    /// Upper bound for the flat-mode stereo width gain.
    #[arg(long, default_value_t = DEFAULT_WIDTH_CAP)]
    pub stereo_width_cap: f32,

    /// primary (500x300) or fallback (300x150)
    #[arg(long, default_value = "primary")]
    pub sphere_detail: SphereDetail,

    /// Re-encode the start-up video with ffmpeg before playing it.
    #[arg(long, default_value_t = false)]
    pub preprocess: bool,

    /// tracing filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn player_settings(&self) -> PlayerSettings {
        PlayerSettings {
            mode: self.mode,
            sphere_detail: self.sphere_detail,
            tone_mapping: self.tone_mapping,
            encoding: self.encoding,
            exposure: self.exposure,
            resolution_scale: self.quality,
            sharpen_strength: self.sharpen_strength,
        }
    }
}
