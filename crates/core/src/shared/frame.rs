use std::time::SystemTime;

/// A single replayed frame: contiguous RGB bytes in row-major order plus
/// the capture/selection timestamp of the underlying source material.
///
/// Frames are immutable once produced; the refresh loop publishes them as
/// `Arc<Frame>` so readers share the payload without copying.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    timestamp: SystemTime,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, timestamp: SystemTime) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            timestamp,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// A solid-color frame. Used as the deterministic substitute when a
    /// dataset entry fails to decode.
    pub fn solid(color: [u8; 3], width: u32, height: u32, timestamp: SystemTime) -> Self {
        let mut data = Vec::with_capacity((width as usize) * (height as usize) * 3);
        for _ in 0..(width as usize) * (height as usize) {
            data.extend_from_slice(&color);
        }
        Self::new(data, width, height, 3, timestamp)
    }
}
