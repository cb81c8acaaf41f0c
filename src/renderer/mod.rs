pub mod frame_bridge;
pub mod gpu;
pub mod media_source;
pub mod render_loop;
