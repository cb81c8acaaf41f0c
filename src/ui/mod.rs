pub mod app;
pub mod video_player;
