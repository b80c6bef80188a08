//! Replayed color image frame.
use byteorder::{LittleEndian, ReadBytesExt};
use std::sync::Arc;

use crate::error::{ReplayError, Result};
use crate::frame::ReplayFrame;
use crate::frame::live::LiveColorFrame;
use crate::frame::payload::{Payload, PayloadReader, ReadSeek};

/// Color stream format tag as reported by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorImageFormat {
    #[default]
    Undefined,
    RgbResolution640x480Fps30,
    RgbResolution1280x960Fps12,
    YuvResolution640x480Fps15,
    RawYuvResolution640x480Fps15,
    InfraredResolution640x480Fps30,
    RawBayerResolution640x480Fps30,
    RawBayerResolution1280x960Fps12,
    /// Tag not known to this build; preserved as written.
    Other(i32),
}

impl ColorImageFormat {
    pub fn from_tag(tag: i32) -> Self {
        match tag {
            0 => ColorImageFormat::Undefined,
            1 => ColorImageFormat::RgbResolution640x480Fps30,
            2 => ColorImageFormat::RgbResolution1280x960Fps12,
            3 => ColorImageFormat::YuvResolution640x480Fps15,
            4 => ColorImageFormat::RawYuvResolution640x480Fps15,
            5 => ColorImageFormat::InfraredResolution640x480Fps30,
            6 => ColorImageFormat::RawBayerResolution640x480Fps30,
            7 => ColorImageFormat::RawBayerResolution1280x960Fps12,
            other => ColorImageFormat::Other(other),
        }
    }

    pub fn tag(self) -> i32 {
        match self {
            ColorImageFormat::Undefined => 0,
            ColorImageFormat::RgbResolution640x480Fps30 => 1,
            ColorImageFormat::RgbResolution1280x960Fps12 => 2,
            ColorImageFormat::YuvResolution640x480Fps15 => 3,
            ColorImageFormat::RawYuvResolution640x480Fps15 => 4,
            ColorImageFormat::InfraredResolution640x480Fps30 => 5,
            ColorImageFormat::RawBayerResolution640x480Fps30 => 6,
            ColorImageFormat::RawBayerResolution1280x960Fps12 => 7,
            ColorImageFormat::Other(tag) => tag,
        }
    }

    /// Nominal `(width, height)` of the format, if it names one.
    pub fn resolution(self) -> Option<(i32, i32)> {
        match self {
            ColorImageFormat::RgbResolution1280x960Fps12
            | ColorImageFormat::RawBayerResolution1280x960Fps12 => Some((1280, 960)),
            ColorImageFormat::Undefined | ColorImageFormat::Other(_) => None,
            _ => Some((640, 480)),
        }
    }
}

/// A color frame read back from a log, or converted from a live frame.
///
/// Pixels of a parsed frame stay in the log until [`copy_pixel_data_to`]
/// or [`pixel_data`] is called (unless the replay was opened in eager mode).
///
/// [`copy_pixel_data_to`]: ReplayColorImageFrame::copy_pixel_data_to
/// [`pixel_data`]: ReplayColorImageFrame::pixel_data
#[derive(Debug, Clone)]
pub struct ReplayColorImageFrame {
    frame_number: i32,
    timestamp: i64,
    width: i32,
    height: i32,
    bytes_per_pixel: i32,
    format: ColorImageFormat,
    payload: Payload,
}

impl ReplayColorImageFrame {
    pub fn from_live(frame: &impl LiveColorFrame) -> Self {
        Self {
            frame_number: frame.frame_number(),
            timestamp: frame.timestamp(),
            width: frame.width(),
            height: frame.height(),
            bytes_per_pixel: frame.bytes_per_pixel(),
            format: frame.format(),
            payload: Payload::Owned(Arc::from(frame.pixel_data())),
        }
    }

    /// Decode the record body that follows a color tag.
    pub(crate) fn read_from(stream: &mut dyn ReadSeek, payload: &PayloadReader<'_>) -> Result<Self> {
        let timestamp = stream.read_i64::<LittleEndian>()?;
        let bytes_per_pixel = stream.read_i32::<LittleEndian>()?;
        let format = ColorImageFormat::from_tag(stream.read_i32::<LittleEndian>()?);
        let width = stream.read_i32::<LittleEndian>()?;
        let height = stream.read_i32::<LittleEndian>()?;
        let frame_number = stream.read_i32::<LittleEndian>()?;
        let len = stream.read_i32::<LittleEndian>()?;
        if len < 0 {
            return Err(ReplayError::format(format!("negative color payload length {len} in frame {frame_number}")));
        }
        let payload = payload.take(stream, len as usize)?;
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

    pub fn format(&self) -> ColorImageFormat {
        self.format
    }

    /// Payload length in bytes.
    pub fn pixel_data_len(&self) -> usize {
        self.payload.byte_len()
    }

    /// Whether the pixels are still in the log rather than in memory.
    pub fn is_lazy(&self) -> bool {
        self.payload.is_lazy()
    }

    /// Copy the pixels into the front of `pixels`.
    pub fn copy_pixel_data_to(&self, pixels: &mut [u8]) -> Result<()> {
        let needed = self.pixel_data_len();
        if pixels.len() < needed {
            return Err(ReplayError::BufferTooSmall { needed, actual: pixels.len() });
        }
        self.payload.copy_to(pixels)
    }

    pub fn pixel_data(&self) -> Result<Vec<u8>> {
        self.payload.to_vec()
    }
}

impl ReplayFrame for ReplayColorImageFrame {
    const KIND: &'static str = "color";

    fn frame_number(&self) -> i32 {
        self.frame_number
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::live::ColorImageFrame;

    #[test]
    fn format_tags_round_trip() {
        for tag in 0..8 {
            assert_eq!(ColorImageFormat::from_tag(tag).tag(), tag);
        }
        assert_eq!(ColorImageFormat::from_tag(42), ColorImageFormat::Other(42));
        assert_eq!(ColorImageFormat::RgbResolution1280x960Fps12.resolution(), Some((1280, 960)));
        assert_eq!(ColorImageFormat::Undefined.resolution(), None);
    }

    #[test]
    fn from_live_owns_pixels() {
        let live = ColorImageFrame {
            frame_number: 3,
            timestamp: 120,
            width: 2,
            height: 1,
            bytes_per_pixel: 4,
            format: ColorImageFormat::RgbResolution640x480Fps30,
            pixels: vec![1, 2, 3, 4, 5, 6, 7, 8],
        };
        let frame = ReplayColorImageFrame::from_live(&live);
        assert_eq!(frame.frame_number(), 3);
        assert_eq!(frame.timestamp(), 120);
        assert!(!frame.is_lazy());
        assert_eq!(frame.pixel_data().unwrap(), live.pixels);

        let mut small = [0u8; 4];
        let err = frame.copy_pixel_data_to(&mut small).unwrap_err();
        assert!(matches!(err, ReplayError::BufferTooSmall { needed: 8, actual: 4 }));
    }
}
