pub mod config;
pub mod frame_store;
pub mod refresh_loop;
pub mod registry;
pub mod replay_source;
