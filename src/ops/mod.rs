pub mod color;
pub mod geometry;
pub mod orientation;
pub mod sharpen;
pub mod transcode;
