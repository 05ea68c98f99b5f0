//! Overlap-based keyframe selection for dense frame sequences.

pub mod api;
pub mod core;
pub mod selection;

#[cfg(test)]
pub(crate) mod test_utils;

pub use crate::api::{write_frame_list, write_summary, Selection, SparseFrameSelector};
pub use crate::core::config::SelectionConfig;
pub use crate::core::error::SelectError;

pub fn init_logging() {
    #[cfg(target_os = "android")]
    {
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(log::LevelFilter::Debug)
                .with_tag("sparse_frames"),
        );
    }

    #[cfg(not(target_os = "android"))]
    {
        // RUST_LOG 控制级别；重复初始化忽略
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .try_init();
    }
}
