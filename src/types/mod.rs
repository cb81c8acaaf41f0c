pub mod command;
pub mod error;
pub mod media;
pub mod modes;
pub mod playback_state;
pub mod track;
