pub mod config;
pub mod play;
pub mod stats;
pub mod task;
