use std::fmt;
use std::str::FromStr;

use crate::types::error::PlayerError;

/// How the decoded frame is laid out and which mesh displays it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoMode {
    #[default]
    Mono,
    StereoLR,
    StereoTB,
    Flat,
}

impl VideoMode {
    pub const ALL: [VideoMode; 4] = [
        VideoMode::Mono,
        VideoMode::StereoLR,
        VideoMode::StereoTB,
        VideoMode::Flat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoMode::Mono => "mono",
            VideoMode::StereoLR => "stereo-lr",
            VideoMode::StereoTB => "stereo-tb",
            VideoMode::Flat => "flat",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VideoMode::Mono => "Mono (Standard 360°)",
            VideoMode::StereoLR => "Stereo (Left-Right)",
            VideoMode::StereoTB => "Stereo (Top-Bottom)",
            VideoMode::Flat => "Flat (Regular Video)",
        }
    }

    /// Sphere modes share the spatial audio branch and the free camera.
    pub fn is_spherical(&self) -> bool {
        !matches!(self, VideoMode::Flat)
    }
}

impl fmt::Display for VideoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoMode {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mono" => Ok(VideoMode::Mono),
            "stereo-lr" | "stereo_lr" | "lr" => Ok(VideoMode::StereoLR),
            "stereo-tb" | "stereo_tb" | "tb" => Ok(VideoMode::StereoTB),
            "flat" => Ok(VideoMode::Flat),
            _ => Err(PlayerError::InvalidEnumValue {
                kind: "video mode",
                value: s.to_string(),
            }),
        }
    }
}

/// Which half of a stereo frame is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Eye {
    #[default]
    Left,
    Right,
}

impl Eye {
    pub fn offset(&self) -> f32 {
        match self {
            Eye::Left => 0.0,
            Eye::Right => 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToneMapOperator {
    None,
    ACESFilmic,
    #[default]
    Linear,
    Reinhard,
    Cineon,
}

impl ToneMapOperator {
    pub const ALL: [ToneMapOperator; 5] = [
        ToneMapOperator::None,
        ToneMapOperator::ACESFilmic,
        ToneMapOperator::Linear,
        ToneMapOperator::Reinhard,
        ToneMapOperator::Cineon,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ToneMapOperator::None => "No Tone Mapping",
            ToneMapOperator::ACESFilmic => "ACES Filmic",
            ToneMapOperator::Linear => "Linear",
            ToneMapOperator::Reinhard => "Reinhard",
            ToneMapOperator::Cineon => "Cineon",
        }
    }

    /// Selector consumed by the scene shader's `tone_map` switch.
    pub fn shader_index(&self) -> u32 {
        match self {
            ToneMapOperator::None => 0,
            ToneMapOperator::Linear => 1,
            ToneMapOperator::Reinhard => 2,
            ToneMapOperator::Cineon => 3,
            ToneMapOperator::ACESFilmic => 4,
        }
    }
}

impl fmt::Display for ToneMapOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ToneMapOperator {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "None" | "NoToneMapping" | "none" => Ok(ToneMapOperator::None),
            "ACESFilmic" | "aces" | "aces-filmic" => Ok(ToneMapOperator::ACESFilmic),
            "Linear" | "linear" => Ok(ToneMapOperator::Linear),
            "Reinhard" | "reinhard" => Ok(ToneMapOperator::Reinhard),
            "Cineon" | "cineon" => Ok(ToneMapOperator::Cineon),
            _ => Err(PlayerError::InvalidEnumValue {
                kind: "tone mapping",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorEncoding {
    Linear,
    #[default]
    Srgb,
    Gamma,
    Rgbe,
    LogLuv,
    Rgbm16,
    Rgbm7,
    Rgbd,
}

impl ColorEncoding {
    pub const ALL: [ColorEncoding; 8] = [
        ColorEncoding::Linear,
        ColorEncoding::Srgb,
        ColorEncoding::Gamma,
        ColorEncoding::Rgbe,
        ColorEncoding::LogLuv,
        ColorEncoding::Rgbm16,
        ColorEncoding::Rgbm7,
        ColorEncoding::Rgbd,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ColorEncoding::Linear => "Linear Encoding",
            ColorEncoding::Srgb => "sRGB Encoding",
            ColorEncoding::Gamma => "Gamma Encoding",
            ColorEncoding::Rgbe => "RGBE Encoding",
            ColorEncoding::LogLuv => "LogLuv Encoding",
            ColorEncoding::Rgbm16 => "RGBM16 Encoding",
            ColorEncoding::Rgbm7 => "RGBM7 Encoding",
            ColorEncoding::Rgbd => "RGBD Encoding",
        }
    }

    /// Selector consumed by the scene shader's `encode_output` switch.
    pub fn shader_index(&self) -> u32 {
        match self {
            ColorEncoding::Linear => 0,
            ColorEncoding::Srgb => 1,
            ColorEncoding::Gamma => 2,
            ColorEncoding::Rgbe => 3,
            ColorEncoding::LogLuv => 4,
            ColorEncoding::Rgbm16 => 5,
            ColorEncoding::Rgbm7 => 6,
            ColorEncoding::Rgbd => 7,
        }
    }

    /// Whether decoded frame samples must be linearised before shading.
    pub fn decodes_srgb_input(&self) -> bool {
        !matches!(self, ColorEncoding::Linear)
    }
}

impl fmt::Display for ColorEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ColorEncoding {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        let key = key.strip_suffix("Encoding").unwrap_or(key);
        match key.to_ascii_lowercase().as_str() {
            "linear" => Ok(ColorEncoding::Linear),
            "srgb" => Ok(ColorEncoding::Srgb),
            "gamma" => Ok(ColorEncoding::Gamma),
            "rgbe" => Ok(ColorEncoding::Rgbe),
            "logluv" => Ok(ColorEncoding::LogLuv),
            "rgbm16" => Ok(ColorEncoding::Rgbm16),
            "rgbm7" => Ok(ColorEncoding::Rgbm7),
            "rgbd" => Ok(ColorEncoding::Rgbd),
            _ => Err(PlayerError::InvalidEnumValue {
                kind: "color encoding",
                value: s.to_string(),
            }),
        }
    }
}

/// Render resolution relative to the device pixel density.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionScale {
    #[default]
    High,
    Medium,
    Low,
}

impl ResolutionScale {
    pub const ALL: [ResolutionScale; 3] = [
        ResolutionScale::High,
        ResolutionScale::Medium,
        ResolutionScale::Low,
    ];

    pub fn factor(&self) -> f32 {
        match self {
            ResolutionScale::High => 1.0,
            ResolutionScale::Medium => 0.75,
            ResolutionScale::Low => 0.5,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResolutionScale::High => "High (Native)",
            ResolutionScale::Medium => "Medium (0.75x)",
            ResolutionScale::Low => "Low (0.5x)",
        }
    }

    pub fn from_factor(factor: f32) -> Result<Self, PlayerError> {
        Self::ALL
            .into_iter()
            .find(|scale| (scale.factor() - factor).abs() < 1e-3)
            .ok_or_else(|| PlayerError::InvalidEnumValue {
                kind: "quality",
                value: factor.to_string(),
            })
    }
}

impl FromStr for ResolutionScale {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "native" => Ok(ResolutionScale::High),
            "medium" => Ok(ResolutionScale::Medium),
            "low" => Ok(ResolutionScale::Low),
            other => other
                .parse::<f32>()
                .map_err(|_| PlayerError::InvalidEnumValue {
                    kind: "quality",
                    value: s.to_string(),
                })
                .and_then(ResolutionScale::from_factor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_mode_parses_menu_strings() {
        assert_eq!("mono".parse::<VideoMode>().unwrap(), VideoMode::Mono);
        assert_eq!("stereo-lr".parse::<VideoMode>().unwrap(), VideoMode::StereoLR);
        assert_eq!("stereo-tb".parse::<VideoMode>().unwrap(), VideoMode::StereoTB);
        assert_eq!("flat".parse::<VideoMode>().unwrap(), VideoMode::Flat);
        for mode in VideoMode::ALL {
            assert_eq!(mode.as_str().parse::<VideoMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_unknown_strings_fail_fast() {
        let err = "cubemap".parse::<VideoMode>().unwrap_err();
        assert!(matches!(
            err,
            PlayerError::InvalidEnumValue { kind: "video mode", .. }
        ));
        assert!("Hable".parse::<ToneMapOperator>().is_err());
        assert!("YUVEncoding".parse::<ColorEncoding>().is_err());
        assert!("0.6".parse::<ResolutionScale>().is_err());
    }

    #[test]
    fn test_encoding_accepts_suffixed_and_bare_names() {
        assert_eq!(
            "sRGBEncoding".parse::<ColorEncoding>().unwrap(),
            ColorEncoding::Srgb
        );
        assert_eq!("Linear".parse::<ColorEncoding>().unwrap(), ColorEncoding::Linear);
        assert_eq!(
            "RGBM16Encoding".parse::<ColorEncoding>().unwrap(),
            ColorEncoding::Rgbm16
        );
    }

    #[test]
    fn test_tone_mapping_parses_menu_ids() {
        assert_eq!(
            "NoToneMapping".parse::<ToneMapOperator>().unwrap(),
            ToneMapOperator::None
        );
        assert_eq!(
            "ACESFilmic".parse::<ToneMapOperator>().unwrap(),
            ToneMapOperator::ACESFilmic
        );
    }

    #[test]
    fn test_quality_factors() {
        assert_eq!(ResolutionScale::from_factor(0.75).unwrap(), ResolutionScale::Medium);
        assert_eq!("0.5".parse::<ResolutionScale>().unwrap(), ResolutionScale::Low);
        assert_eq!("high".parse::<ResolutionScale>().unwrap().factor(), 1.0);
    }
}
