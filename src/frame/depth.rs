//! Replayed depth image frame.
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::sync::Arc;

use crate::error::{ReplayError, Result};
use crate::frame::ReplayFrame;
use crate::frame::live::LiveDepthFrame;
use crate::frame::payload::{Payload, PayloadReader, ReadSeek};

/// Bytes per stored depth sample.
pub const DEPTH_SAMPLE_BYTES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepthImageFormat {
    #[default]
    Undefined,
    Resolution640x480Fps30,
    Resolution320x240Fps30,
    Resolution80x60Fps30,
    Other(i32),
}

impl DepthImageFormat {
    pub fn from_tag(tag: i32) -> Self {
        match tag {
            0 => DepthImageFormat::Undefined,
            1 => DepthImageFormat::Resolution640x480Fps30,
            2 => DepthImageFormat::Resolution320x240Fps30,
            3 => DepthImageFormat::Resolution80x60Fps30,
            other => DepthImageFormat::Other(other),
        }
    }

    pub fn tag(self) -> i32 {
        match self {
            DepthImageFormat::Undefined => 0,
            DepthImageFormat::Resolution640x480Fps30 => 1,
            DepthImageFormat::Resolution320x240Fps30 => 2,
            DepthImageFormat::Resolution80x60Fps30 => 3,
            DepthImageFormat::Other(tag) => tag,
        }
    }

    pub fn resolution(self) -> Option<(i32, i32)> {
        match self {
            DepthImageFormat::Resolution640x480Fps30 => Some((640, 480)),
            DepthImageFormat::Resolution320x240Fps30 => Some((320, 240)),
            DepthImageFormat::Resolution80x60Fps30 => Some((80, 60)),
            DepthImageFormat::Undefined | DepthImageFormat::Other(_) => None,
        }
    }
}

/// A depth frame read back from a log, or converted from a live frame.
///
/// Samples are stored little-endian, two bytes each; the payload is read
/// lazily the same way as for color frames.
#[derive(Debug, Clone)]
pub struct ReplayDepthImageFrame {
    frame_number: i32,
    timestamp: i64,
    width: i32,
    height: i32,
    bytes_per_pixel: i32,
    format: DepthImageFormat,
    payload: Payload,
}

impl ReplayDepthImageFrame {
    pub fn from_live(frame: &impl LiveDepthFrame) -> Self {
        let samples = frame.pixel_data();
        let mut bytes = vec![0u8; samples.len() * DEPTH_SAMPLE_BYTES];
        LittleEndian::write_i16_into(samples, &mut bytes);
        Self {
            frame_number: frame.frame_number(),
            timestamp: frame.timestamp(),
            width: frame.width(),
            height: frame.height(),
            bytes_per_pixel: frame.bytes_per_pixel(),
            format: frame.format(),
            payload: Payload::Owned(Arc::from(bytes)),
        }
    }

    /// Decode the record body that follows a depth tag.
    pub(crate) fn read_from(stream: &mut dyn ReadSeek, payload: &PayloadReader<'_>) -> Result<Self> {
        let timestamp = stream.read_i64::<LittleEndian>()?;
        let bytes_per_pixel = stream.read_i32::<LittleEndian>()?;
        let format = DepthImageFormat::from_tag(stream.read_i32::<LittleEndian>()?);
        let width = stream.read_i32::<LittleEndian>()?;
        let height = stream.read_i32::<LittleEndian>()?;
        let frame_number = stream.read_i32::<LittleEndian>()?;
        let samples = stream.read_i32::<LittleEndian>()?;
        if samples < 0 {
            return Err(ReplayError::format(format!("negative depth sample count {samples} in frame {frame_number}")));
        }
        let payload = payload.take(stream, samples as usize * DEPTH_SAMPLE_BYTES)?;
        Ok(Self { frame_number, timestamp, width, height, bytes_per_pixel, format, payload })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn bytes_per_pixel(&self) -> i32 {
        self.bytes_per_pixel
    }

    pub fn format(&self) -> DepthImageFormat {
        self.format
    }

    /// Number of depth samples (one per pixel).
    pub fn pixel_data_len(&self) -> usize {
        self.payload.byte_len() / DEPTH_SAMPLE_BYTES
    }

    pub fn is_lazy(&self) -> bool {
        self.payload.is_lazy()
    }

    pub fn copy_pixel_data_to(&self, pixels: &mut [i16]) -> Result<()> {
        let needed = self.pixel_data_len();
        if pixels.len() < needed {
            return Err(ReplayError::BufferTooSmall { needed, actual: pixels.len() });
        }
        let bytes = self.payload.to_vec()?;
        LittleEndian::read_i16_into(&bytes, &mut pixels[..needed]);
        Ok(())
    }

    pub fn pixel_data(&self) -> Result<Vec<i16>> {
        let mut out = vec![0i16; self.pixel_data_len()];
        self.copy_pixel_data_to(&mut out)?;
        Ok(out)
    }
}

impl ReplayFrame for ReplayDepthImageFrame {
    const KIND: &'static str = "depth";

    fn frame_number(&self) -> i32 {
        self.frame_number
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}
