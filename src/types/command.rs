use std::path::PathBuf;

use crate::types::error::PlayerError;
use crate::types::modes::{ColorEncoding, ResolutionScale, ToneMapOperator, VideoMode};

/// Discrete requests coming from the shell (menus, dialogs, drops).
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    LoadVideo(PathBuf),
    SetMode(VideoMode),
    SetQuality(ResolutionScale),
    SetToneMapping(ToneMapOperator),
    SetEncoding(ColorEncoding),
    ToggleFullscreen,
    ResetCamera,
}

impl Command {
    /// Validates a loosely typed `(action, payload)` pair once, at the boundary.
    pub fn parse(action: &str, payload: Option<&str>) -> Result<Command, PlayerError> {
        let arg = |kind: &'static str| {
            payload.ok_or_else(|| PlayerError::InvalidEnumValue {
                kind,
                value: String::new(),
            })
        };
        match action {
            "video-selected" | "load-video" => {
                Ok(Command::LoadVideo(PathBuf::from(arg("video path")?)))
            }
            "set-mode" => Ok(Command::SetMode(arg("video mode")?.parse()?)),
            "set-quality" => Ok(Command::SetQuality(arg("quality")?.parse()?)),
            "set-tone-mapping" => Ok(Command::SetToneMapping(arg("tone mapping")?.parse()?)),
            "set-encoding" => Ok(Command::SetEncoding(arg("color encoding")?.parse()?)),
            "toggle-fullscreen" => Ok(Command::ToggleFullscreen),
            "reset-camera" => Ok(Command::ResetCamera),
            other => Err(PlayerError::InvalidEnumValue {
                kind: "command",
                value: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse("set-mode", Some("flat")).unwrap(),
            Command::SetMode(VideoMode::Flat)
        );
        assert_eq!(
            Command::parse("set-quality", Some("0.75")).unwrap(),
            Command::SetQuality(ResolutionScale::Medium)
        );
        assert_eq!(
            Command::parse("set-encoding", Some("RGBDEncoding")).unwrap(),
            Command::SetEncoding(ColorEncoding::Rgbd)
        );
        assert_eq!(
            Command::parse("reset-camera", None).unwrap(),
            Command::ResetCamera
        );
    }

    #[test]
    fn test_parse_rejects_bad_payloads() {
        assert!(Command::parse("set-mode", Some("fisheye")).is_err());
        assert!(Command::parse("set-mode", None).is_err());
        assert!(Command::parse("explode", None).is_err());
    }
}
