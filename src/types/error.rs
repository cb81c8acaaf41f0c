use thiserror::Error;

/// Errors surfaced by the player core. None of them are fatal to the process.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("unsupported video format: {extension:?}")]
    UnsupportedFormat { extension: String },

    #[error("invalid {kind} value: {value:?}")]
    InvalidEnumValue { kind: &'static str, value: String },

    #[error("playback failed: {0}")]
    Playback(String),

    #[error("media pipeline error: {0}")]
    Pipeline(String),

    #[error("video is {width}x{height} but the GPU allows at most {max} pixels per side")]
    TextureTooLarge { width: u32, height: u32, max: u32 },

    #[error("transcode failed: {0}")]
    Transcode(String),

    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<gstreamer::glib::Error> for PlayerError {
    fn from(err: gstreamer::glib::Error) -> Self {
        PlayerError::Pipeline(err.to_string())
    }
}

impl From<gstreamer::glib::BoolError> for PlayerError {
    fn from(err: gstreamer::glib::BoolError) -> Self {
        PlayerError::Pipeline(err.to_string())
    }
}

impl From<gstreamer::StateChangeError> for PlayerError {
    fn from(err: gstreamer::StateChangeError) -> Self {
        PlayerError::Playback(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
