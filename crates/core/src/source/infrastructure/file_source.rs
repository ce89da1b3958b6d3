use std::path::PathBuf;
use std::time::SystemTime;

use crate::shared::constants::DEFAULT_FPS;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::source::domain::frame_source::{FrameSource, SourceError};

/// What to do when the video runs out of frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndPolicy {
    /// Reopen from the start and keep playing.
    Loop,
    /// Stop producing frames; the last published frame stays visible.
    Freeze,
}

/// Sequential frame source decoding a local video via ffmpeg-next
/// (libavformat + libavcodec).
///
/// Each decoded frame is converted to RGB24 and wrapped in a [`Frame`]
/// stamped with the decode time. Looping reopens the input rather than
/// seeking, which behaves uniformly across container formats.
pub struct FileSource {
    path: PathBuf,
    end_policy: EndPolicy,
    fps_override: Option<f64>,
    fps: f64,
    decoder: Option<OpenDecoder>,
    metadata: Option<VideoMetadata>,
    finished: bool,
}

// Safety: FileSource is only used from a single thread at a time (it moves
// between the orchestrator and the refresh loop, never shared). The raw
// pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FileSource {}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, end_policy: EndPolicy, fps_override: Option<f64>) -> Self {
        Self {
            path: path.into(),
            end_policy,
            fps_override,
            fps: DEFAULT_FPS,
            decoder: None,
            metadata: None,
            finished: false,
        }
    }

    /// Metadata of the currently open video, if activated.
    pub fn metadata(&self) -> Option<&VideoMetadata> {
        self.metadata.as_ref()
    }

    fn open(&mut self) -> Result<&mut OpenDecoder, SourceError> {
        let path_display = self.path.display().to_string();
        let open_err = move |e: &dyn std::fmt::Display| SourceError::Open {
            path: path_display.clone(),
            reason: e.to_string(),
        };

        ffmpeg_next::init().map_err(|e| open_err(&e))?;

        let ictx = ffmpeg_next::format::input(&self.path).map_err(|e| open_err(&e))?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| open_err(&"no video stream found"))?;

        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| open_err(&e))?;
        let decoder = codec_ctx.decoder().video().map_err(|e| open_err(&e))?;

        let rate = stream.rate();
        let detected_fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let width = decoder.width();
        let height = decoder.height();

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| open_err(&e))?;

        self.metadata = Some(VideoMetadata {
            width,
            height,
            fps: detected_fps,
            total_frames: stream.frames().max(0) as usize,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(self.path.clone()),
        });

        self.fps = self
            .fps_override
            .filter(|f| *f > 0.0)
            .unwrap_or(if detected_fps > 0.0 {
                detected_fps
            } else {
                DEFAULT_FPS
            });

        self.finished = false;
        Ok(self.decoder.insert(OpenDecoder {
            ictx,
            decoder,
            scaler,
            stream_index,
            width,
            height,
            flushing: false,
        }))
    }
}

impl FrameSource for FileSource {
    fn activate(&mut self) -> Result<Frame, SourceError> {
        self.deactivate();
        let first = self.open()?.decode_next()?;
        match first {
            Some(frame) => Ok(frame),
            None => {
                self.deactivate();
                Err(SourceError::Decode(format!(
                    "no decodable frame in {}",
                    self.path.display()
                )))
            }
        }
    }

    fn next(&mut self) -> Result<Frame, SourceError> {
        if self.finished {
            return Err(SourceError::EndOfSequence);
        }
        let open = self
            .decoder
            .as_mut()
            .ok_or_else(|| SourceError::Decode("source not activated".to_string()))?;

        if let Some(frame) = open.decode_next()? {
            return Ok(frame);
        }

        match self.end_policy {
            EndPolicy::Loop => {
                log::debug!("end of {} reached, reopening from start", self.path.display());
                let reopened = self.open()?.decode_next()?;
                match reopened {
                    Some(frame) => Ok(frame),
                    None => {
                        self.deactivate();
                        Err(SourceError::Decode(format!(
                            "no frames after reopening {}",
                            self.path.display()
                        )))
                    }
                }
            }
            EndPolicy::Freeze => {
                log::info!(
                    "end of {} reached, freezing on last frame (loop disabled)",
                    self.path.display()
                );
                self.finished = true;
                self.deactivate();
                Err(SourceError::EndOfSequence)
            }
        }
    }

    fn deactivate(&mut self) {
        self.decoder = None;
    }

    fn fps(&self) -> f64 {
        self.fps
    }
}

/// An open libav decode session for one input file.
struct OpenDecoder {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
    flushing: bool,
}

impl OpenDecoder {
    /// Decodes the next frame, or `None` cleanly at end of stream.
    fn decode_next(&mut self) -> Result<Option<Frame>, SourceError> {
        if let Some(frame) = self.try_receive()? {
            return Ok(Some(frame));
        }

        if self.flushing {
            return Ok(None);
        }

        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                return self.try_receive();
            };

            if stream.index() != self.stream_index {
                continue;
            }

            if self.decoder.send_packet(&packet).is_err() {
                // Corrupt packet; skip it and keep demuxing.
                continue;
            }

            if let Some(frame) = self.try_receive()? {
                return Ok(Some(frame));
            }
        }
    }

    fn try_receive(&mut self) -> Result<Option<Frame>, SourceError> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler
            .run(&decoded, &mut rgb_frame)
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        Ok(Some(Frame::new(
            pixels,
            self.width,
            self.height,
            3,
            SystemTime::now(),
        )))
    }
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer.
///
/// ffmpeg frames may have padding bytes at the end of each row
/// (stride > width*3); this strips that padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}
