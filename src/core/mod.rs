pub mod cache;
pub mod config;
pub mod debug;
pub mod error;
pub mod geometry;
pub mod source;
pub mod vision;
