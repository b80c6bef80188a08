use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;
use std::time::Instant;

use super::{ElapsedClock, FrameOrder, payload_len};
use crate::error::Result;
use crate::frame::LiveColorFrame;
use crate::options::Modality;

/// Appends color records: tag, elapsed, bpp, format, width, height,
/// frame number, byte count, bytes.
#[derive(Debug)]
pub(crate) struct ColorRecorder {
    clock: ElapsedClock,
    order: FrameOrder,
}

impl ColorRecorder {
    pub(crate) fn new(now: Instant) -> Self {
        Self { clock: ElapsedClock::new(now), order: FrameOrder::default() }
    }

    pub(crate) fn record<W: Write + ?Sized>(
        &mut self,
        w: &mut W,
        frame: &impl LiveColorFrame,
        now: Instant,
    ) -> Result<()> {
        self.order.check(Modality::Color, frame.frame_number())?;
        let pixels = frame.pixel_data();
        let len = payload_len(pixels.len(), "color")?;
        w.write_i32::<LittleEndian>(Modality::Color.tag())?;
        w.write_i64::<LittleEndian>(self.clock.tick(now))?;
        w.write_i32::<LittleEndian>(frame.bytes_per_pixel())?;
        w.write_i32::<LittleEndian>(frame.format().tag())?;
        w.write_i32::<LittleEndian>(frame.width())?;
        w.write_i32::<LittleEndian>(frame.height())?;
        w.write_i32::<LittleEndian>(frame.frame_number())?;
        w.write_i32::<LittleEndian>(len)?;
        w.write_all(pixels)?;
        self.order.advance(frame.frame_number());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{ColorImageFormat, ColorImageFrame};
    use std::time::Duration;

    #[test]
    fn record_layout_and_elapsed() {
        let t0 = Instant::now();
        let mut rec = ColorRecorder::new(t0);
        let frame = ColorImageFrame {
            frame_number: 12,
            timestamp: 0,
            width: 1,
            height: 2,
            bytes_per_pixel: 4,
            format: ColorImageFormat::RgbResolution640x480Fps30,
            pixels: vec![10, 11, 12, 13, 14, 15, 16, 17],
        };
        let mut out = Vec::new();
        rec.record(&mut out, &frame, t0 + Duration::from_millis(40)).unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&1i32.to_le_bytes());
        expected.extend_from_slice(&40i64.to_le_bytes());
        expected.extend_from_slice(&4i32.to_le_bytes());
        expected.extend_from_slice(&1i32.to_le_bytes());
        expected.extend_from_slice(&1i32.to_le_bytes());
        expected.extend_from_slice(&2i32.to_le_bytes());
        expected.extend_from_slice(&12i32.to_le_bytes());
        expected.extend_from_slice(&8i32.to_le_bytes());
        expected.extend_from_slice(&frame.pixels);
        assert_eq!(out, expected);

        // elapsed resets after each write
        out.clear();
        let next = ColorImageFrame { frame_number: 13, ..frame };
        rec.record(&mut out, &next, t0 + Duration::from_millis(73)).unwrap();
        assert_eq!(&out[4..12], &33i64.to_le_bytes());
    }
}
