pub mod graph;
pub mod output;
pub mod tracks;
