//! Synthetic replay camera: continuously exposes a "current frame" while a
//! background loop advances through a local video or a remote dataset.

pub mod replay;
pub mod shared;
pub mod source;
