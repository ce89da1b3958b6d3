use crate::shared::constants::{
    DATASET_FETCH_LIMIT, DEFAULT_FPS, INTRINSIC_HEIGHT, INTRINSIC_WIDTH,
};
use crate::shared::frame::Frame;
use crate::source::domain::dataset_client::{DatasetClient, DatasetCredentials, DatasetImage};
use crate::source::domain::frame_source::{FrameSource, SourceError};

/// Cyclic frame source replaying a pre-fetched dataset of still images.
///
/// Images are fetched once on first activation and kept encoded in memory;
/// decoding happens lazily per tick. The index always wraps, so a dataset
/// replay never terminates. A corrupt entry is replaced by a deterministic
/// solid-color placeholder rather than stalling playback.
pub struct DatasetSource {
    client: Box<dyn DatasetClient>,
    credentials: DatasetCredentials,
    fps: f64,
    images: Vec<DatasetImage>,
    index: usize,
}

impl DatasetSource {
    pub fn new(
        client: Box<dyn DatasetClient>,
        credentials: DatasetCredentials,
        fps_override: Option<f64>,
    ) -> Self {
        Self {
            client,
            credentials,
            fps: fps_override.filter(|f| *f > 0.0).unwrap_or(DEFAULT_FPS),
            images: Vec::new(),
            index: 0,
        }
    }

    pub fn credentials(&self) -> &DatasetCredentials {
        &self.credentials
    }

    /// Number of images currently cached. Zero before activation and after
    /// deactivation.
    pub fn cached_count(&self) -> usize {
        self.images.len()
    }

    /// Carries the fetched image cache into a refreshed configuration.
    /// Only valid when the new credentials select the same dataset; the
    /// caller checks [`DatasetCredentials::same_dataset`] first.
    pub fn reconfigured(
        mut self,
        credentials: DatasetCredentials,
        fps_override: Option<f64>,
    ) -> Self {
        debug_assert!(self.credentials.same_dataset(&credentials));
        self.credentials = credentials;
        self.fps = fps_override.filter(|f| *f > 0.0).unwrap_or(DEFAULT_FPS);
        self
    }

    fn decode_current(&self) -> Frame {
        let entry = &self.images[self.index];
        match image::load_from_memory(&entry.data) {
            Ok(decoded) => {
                let rgb = decoded.to_rgb8();
                let (width, height) = rgb.dimensions();
                Frame::new(rgb.into_raw(), width, height, 3, entry.timestamp)
            }
            Err(e) => {
                log::warn!(
                    "failed to decode dataset image {} ({}), using placeholder: {e}",
                    self.index,
                    entry.filename
                );
                Frame::solid(
                    placeholder_color(self.index),
                    INTRINSIC_WIDTH,
                    INTRINSIC_HEIGHT,
                    entry.timestamp,
                )
            }
        }
    }
}

/// Solid fill for a placeholder frame, derived from the entry index so
/// consecutive placeholders are visually distinct.
fn placeholder_color(index: usize) -> [u8; 3] {
    [
        ((index * 150) % 255) as u8,
        ((index * 100) % 255) as u8,
        ((index * 50) % 255) as u8,
    ]
}

impl FrameSource for DatasetSource {
    fn activate(&mut self) -> Result<Frame, SourceError> {
        if self.images.is_empty() {
            log::info!(
                "fetching up to {DATASET_FETCH_LIMIT} images from dataset {}",
                self.credentials.dataset_id
            );
            let images = self
                .client
                .fetch_images(&self.credentials, DATASET_FETCH_LIMIT)?;
            if images.is_empty() {
                return Err(SourceError::EmptyDataset);
            }
            log::info!(
                "loaded {} images from dataset {}",
                images.len(),
                self.credentials.dataset_id
            );
            self.images = images;
            self.index = 0;
        }
        self.next()
    }

    fn next(&mut self) -> Result<Frame, SourceError> {
        if self.images.is_empty() {
            return Err(SourceError::EmptyDataset);
        }
        let frame = self.decode_current();
        log::debug!(
            "served dataset frame {} ({})",
            self.index,
            self.images[self.index].filename
        );
        self.index = (self.index + 1) % self.images.len();
        Ok(frame)
    }

    fn deactivate(&mut self) {
        self.images.clear();
        self.index = 0;
    }

    fn fps(&self) -> f64 {
        self.fps
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, SystemTime};

    use crate::source::domain::dataset_client::DatasetError;

    pub(crate) fn encoded_png(value: u8, width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([value, value, value]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    pub(crate) fn test_credentials() -> DatasetCredentials {
        DatasetCredentials {
            api_key: "key".to_string(),
            api_key_id: "key-id".to_string(),
            organization_id: "org-1".to_string(),
            dataset_id: "ds-1".to_string(),
        }
    }

    /// In-memory client serving a fixed image list, counting fetches.
    pub(crate) struct FakeClient {
        pub images: Vec<DatasetImage>,
        pub fetches: Arc<AtomicUsize>,
    }

    impl FakeClient {
        pub(crate) fn with_values(values: &[u8]) -> Self {
            let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
            let images = values
                .iter()
                .enumerate()
                .map(|(i, v)| DatasetImage {
                    data: encoded_png(*v, 8, 8),
                    timestamp: base + Duration::from_secs(i as u64),
                    filename: format!("dataset_image_{i}.jpg"),
                })
                .collect();
            Self {
                images,
                fetches: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl DatasetClient for FakeClient {
        fn fetch_images(
            &self,
            _credentials: &DatasetCredentials,
            limit: usize,
        ) -> Result<Vec<DatasetImage>, DatasetError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.images.iter().take(limit).cloned().collect())
        }
    }

    #[test]
    fn test_activate_fetches_and_returns_first_frame() {
        let client = FakeClient::with_values(&[10, 20, 30]);
        let mut source = DatasetSource::new(Box::new(client), test_credentials(), None);
        let frame = source.activate().unwrap();
        assert_eq!(frame.data()[0], 10);
        assert_eq!(source.cached_count(), 3);
    }

    #[test]
    fn test_next_wraps_cyclically() {
        let client = FakeClient::with_values(&[10, 20, 30]);
        let mut source = DatasetSource::new(Box::new(client), test_credentials(), None);
        source.activate().unwrap(); // serves image 0

        let second = source.next().unwrap();
        let third = source.next().unwrap();
        let wrapped = source.next().unwrap(); // 4th call on 3 images
        assert_eq!(second.data()[0], 20);
        assert_eq!(third.data()[0], 30);
        assert_eq!(wrapped.data()[0], 10);
    }

    #[test]
    fn test_empty_dataset_fails_activation() {
        let client = FakeClient::with_values(&[]);
        let mut source = DatasetSource::new(Box::new(client), test_credentials(), None);
        assert!(matches!(
            source.activate(),
            Err(SourceError::EmptyDataset)
        ));
    }

    #[test]
    fn test_corrupt_entry_yields_placeholder_not_error() {
        let mut client = FakeClient::with_values(&[10, 20]);
        client.images[1].data = vec![0xde, 0xad, 0xbe, 0xef];
        let mut source = DatasetSource::new(Box::new(client), test_credentials(), None);
        source.activate().unwrap();

        let placeholder = source.next().unwrap();
        assert_eq!(placeholder.width(), INTRINSIC_WIDTH);
        assert_eq!(placeholder.height(), INTRINSIC_HEIGHT);
        let expected = placeholder_color(1);
        assert_eq!(&placeholder.data()[..3], &expected);

        // The corrupt entry does not break the cycle.
        let wrapped = source.next().unwrap();
        assert_eq!(wrapped.data()[0], 10);
    }

    #[test]
    fn test_frame_timestamp_comes_from_dataset_entry() {
        let client = FakeClient::with_values(&[10]);
        let expected = client.images[0].timestamp;
        let mut source = DatasetSource::new(Box::new(client), test_credentials(), None);
        let frame = source.activate().unwrap();
        assert_eq!(frame.timestamp(), expected);
    }

    #[test]
    fn test_reactivation_with_cache_skips_fetch() {
        let client = FakeClient::with_values(&[10, 20]);
        let fetches = client.fetches.clone();
        let mut source = DatasetSource::new(Box::new(client), test_credentials(), None);
        source.activate().unwrap();
        source.activate().unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_deactivate_drops_cache() {
        let client = FakeClient::with_values(&[10]);
        let fetches = client.fetches.clone();
        let mut source = DatasetSource::new(Box::new(client), test_credentials(), None);
        source.activate().unwrap();
        source.deactivate();
        assert_eq!(source.cached_count(), 0);

        // Next activation fetches again.
        source.activate().unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_fetch_respects_fixed_limit() {
        let values: Vec<u8> = (0..150).map(|i| (i % 200) as u8).collect();
        let client = FakeClient::with_values(&values);
        let mut source = DatasetSource::new(Box::new(client), test_credentials(), None);
        source.activate().unwrap();
        assert_eq!(source.cached_count(), DATASET_FETCH_LIMIT);
    }

    #[test]
    fn test_placeholder_color_is_deterministic() {
        assert_eq!(placeholder_color(0), [0, 0, 0]);
        assert_eq!(placeholder_color(1), [150, 100, 50]);
        assert_eq!(placeholder_color(2), [45, 200, 100]);
    }
}
