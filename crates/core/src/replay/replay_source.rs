use std::io::Cursor;
use std::sync::Arc;

use thiserror::Error;

use crate::replay::config::{ConfigError, Mode, RawConfig};
use crate::replay::frame_store::FrameStore;
use crate::replay::refresh_loop::RefreshLoop;
use crate::shared::constants::{INTRINSIC_HEIGHT, INTRINSIC_WIDTH, JPEG_MIME_TYPE};
use crate::shared::frame::Frame;
use crate::source::domain::dataset_client::DatasetClient;
use crate::source::domain::frame_source::{FrameSource, SourceError};
use crate::source::infrastructure::dataset_source::DatasetSource;
use crate::source::infrastructure::file_source::FileSource;
use crate::source::infrastructure::http_dataset_client::HttpDatasetClient;

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to activate source: {0}")]
    Activation(#[from] SourceError),
    #[error("no frame available")]
    NoFrame,
    #[error("replay source is closed")]
    Closed,
    #[error("{0} not supported")]
    NotSupported(&'static str),
    #[error("failed to encode frame: {0}")]
    Encode(String),
}

/// Fixed capability report. This source serves one color stream at one
/// intrinsic size with one supported encoding; everything else is
/// explicitly unsupported.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Properties {
    pub supports_point_cloud: bool,
    pub color_stream: bool,
    pub intrinsic_width: u32,
    pub intrinsic_height: u32,
    pub mime_types: &'static [&'static str],
}

/// Produces `DatasetClient` instances for dataset-mode activation.
/// Injectable so tests can replay against an in-memory service.
pub type DatasetClientFactory = Box<dyn Fn() -> Box<dyn DatasetClient> + Send>;

/// The active adapter, one variant per configured mode.
enum ActiveSource {
    File(FileSource),
    Dataset(DatasetSource),
}

impl FrameSource for ActiveSource {
    fn activate(&mut self) -> Result<Frame, SourceError> {
        match self {
            ActiveSource::File(s) => s.activate(),
            ActiveSource::Dataset(s) => s.activate(),
        }
    }

    fn next(&mut self) -> Result<Frame, SourceError> {
        match self {
            ActiveSource::File(s) => s.next(),
            ActiveSource::Dataset(s) => s.next(),
        }
    }

    fn deactivate(&mut self) {
        match self {
            ActiveSource::File(s) => s.deactivate(),
            ActiveSource::Dataset(s) => s.deactivate(),
        }
    }

    fn fps(&self) -> f64 {
        match self {
            ActiveSource::File(s) => s.fps(),
            ActiveSource::Dataset(s) => s.fps(),
        }
    }
}

enum State {
    Running(RefreshLoop<ActiveSource>),
    Stopped,
    Closed,
}

/// The replay camera orchestrator.
///
/// Owns the frame store, the active source adapter, and the refresh loop's
/// lifetime. At most one loop runs at any moment: every transition
/// (reconfigure, close) stops and fully joins the previous loop before
/// anything new starts. Readers only ever touch the store.
pub struct ReplaySource {
    store: Arc<FrameStore>,
    state: State,
    mode: Mode,
    client_factory: DatasetClientFactory,
}

impl std::fmt::Debug for ReplaySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplaySource")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl ReplaySource {
    /// Validates the config, activates the source (publishing the first
    /// frame synchronously), and starts the refresh loop. On failure
    /// nothing is left running and no decoder handles are leaked.
    pub fn new(config: &RawConfig) -> Result<Self, ReplayError> {
        Self::with_client_factory(config, Box::new(|| Box::new(HttpDatasetClient::new())))
    }

    pub fn with_client_factory(
        config: &RawConfig,
        client_factory: DatasetClientFactory,
    ) -> Result<Self, ReplayError> {
        let mode = config.validate()?;
        let store = Arc::new(FrameStore::new());

        let source = build_source(&mode, &client_factory);
        let state = activate_and_start(source, &store)?;

        log::info!("replay source constructed in {} mode", mode.name());
        Ok(Self {
            store,
            state,
            mode,
            client_factory,
        })
    }

    /// Swaps the active source configuration.
    ///
    /// The current loop is always stopped and joined before the new
    /// adapter is activated; old and new loops never overlap. A dataset
    /// source's fetched images are reused when the dataset identity is
    /// unchanged. On activation failure the previous loop stays stopped
    /// and the error is surfaced; readers keep the last published frame.
    pub fn reconfigure(&mut self, config: &RawConfig) -> Result<(), ReplayError> {
        self.ensure_open()?;
        let new_mode = config.validate()?;

        let previous = self.stop_loop();

        let source = match (previous, &new_mode) {
            (
                Some(ActiveSource::Dataset(prev)),
                Mode::Dataset {
                    credentials,
                    fps_override,
                },
            ) if prev.credentials().same_dataset(credentials) && prev.cached_count() > 0 => {
                log::info!(
                    "dataset identity unchanged, reusing {} cached images",
                    prev.cached_count()
                );
                ActiveSource::Dataset(prev.reconfigured(credentials.clone(), *fps_override))
            }
            (previous, mode) => {
                if let Some(mut prev) = previous {
                    prev.deactivate();
                }
                build_source(mode, &self.client_factory)
            }
        };

        self.state = activate_and_start(source, &self.store)?;
        self.mode = new_mode;
        log::info!("reconfigured to {} mode", self.mode.name());
        Ok(())
    }

    /// The most recent decoded frame.
    pub fn latest(&self) -> Result<Arc<Frame>, ReplayError> {
        self.ensure_open()?;
        self.store.latest().ok_or(ReplayError::NoFrame)
    }

    /// The most recent frame encoded as JPEG bytes.
    pub fn latest_jpeg(&self) -> Result<Vec<u8>, ReplayError> {
        let frame = self.latest()?;
        encode_jpeg(&frame)
    }

    pub fn properties(&self) -> Result<Properties, ReplayError> {
        self.ensure_open()?;
        Ok(Properties {
            supports_point_cloud: false,
            color_stream: true,
            intrinsic_width: INTRINSIC_WIDTH,
            intrinsic_height: INTRINSIC_HEIGHT,
            mime_types: &[JPEG_MIME_TYPE],
        })
    }

    /// Point cloud retrieval is not implemented by this camera.
    pub fn point_cloud(&self) -> Result<Vec<u8>, ReplayError> {
        Err(ReplayError::NotSupported("point cloud"))
    }

    /// Arbitrary commands are not implemented by this camera.
    pub fn do_command(
        &self,
        _command: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<serde_json::Map<String, serde_json::Value>, ReplayError> {
        Err(ReplayError::NotSupported("do_command"))
    }

    /// Real-time RTP streaming is not implemented by this camera.
    pub fn subscribe_rtp(&self) -> Result<(), ReplayError> {
        Err(ReplayError::NotSupported("rtp subscription"))
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// Stops the loop, releases the source and the last published frame,
    /// and invalidates the orchestrator. Idempotent; every operation after
    /// the first close fails with [`ReplayError::Closed`].
    pub fn close(&mut self) {
        if matches!(self.state, State::Closed) {
            return;
        }
        if let Some(mut source) = self.stop_loop() {
            source.deactivate();
        }
        self.store.clear();
        self.state = State::Closed;
        log::info!("replay source closed");
    }

    fn ensure_open(&self) -> Result<(), ReplayError> {
        match self.state {
            State::Closed => Err(ReplayError::Closed),
            _ => Ok(()),
        }
    }

    /// Stops and joins the running loop, handing back its source. The loop
    /// may already have exited on its own (end of sequence, source
    /// failure); joining is still required.
    fn stop_loop(&mut self) -> Option<ActiveSource> {
        match std::mem::replace(&mut self.state, State::Stopped) {
            State::Running(refresh) => refresh.stop().map(|(source, _exit)| source),
            State::Stopped | State::Closed => None,
        }
    }
}

impl Drop for ReplaySource {
    fn drop(&mut self) {
        self.close();
    }
}

fn build_source(mode: &Mode, client_factory: &DatasetClientFactory) -> ActiveSource {
    match mode {
        Mode::Local {
            video_path,
            end_policy,
            fps_override,
        } => ActiveSource::File(FileSource::new(video_path.clone(), *end_policy, *fps_override)),
        Mode::Dataset {
            credentials,
            fps_override,
        } => ActiveSource::Dataset(DatasetSource::new(
            client_factory(),
            credentials.clone(),
            *fps_override,
        )),
    }
}

/// Activates the source, publishes its first frame, and starts the loop.
/// On activation failure the source is dropped (releasing anything it
/// acquired) and no loop is started.
fn activate_and_start(
    mut source: ActiveSource,
    store: &Arc<FrameStore>,
) -> Result<State, ReplayError> {
    match source.activate() {
        Ok(first) => {
            store.publish(first);
            Ok(State::Running(RefreshLoop::start(source, store.clone())))
        }
        Err(e) => {
            source.deactivate();
            Err(ReplayError::Activation(e))
        }
    }
}

fn encode_jpeg(frame: &Frame) -> Result<Vec<u8>, ReplayError> {
    let image = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
        .ok_or_else(|| ReplayError::Encode("frame buffer has unexpected length".to_string()))?;

    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Jpeg)
        .map_err(|e| ReplayError::Encode(e.to_string()))?;
    Ok(bytes)
}
