/// Frame rate used when the source does not report one and the config
/// does not override it.
pub const DEFAULT_FPS: f64 = 30.0;

/// Max images fetched from a remote dataset per activation. Fixed, not
/// configurable.
pub const DATASET_FETCH_LIMIT: usize = 100;

/// Consecutive source failures tolerated before the refresh loop gives up.
pub const MAX_CONSECUTIVE_FAILURES: usize = 3;

/// Reported intrinsic size; also the size of placeholder frames.
pub const INTRINSIC_WIDTH: u32 = 640;
pub const INTRINSIC_HEIGHT: u32 = 480;

pub const JPEG_MIME_TYPE: &str = "image/jpeg";
