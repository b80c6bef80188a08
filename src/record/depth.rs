use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::io::Write;
use std::time::Instant;

use super::{ElapsedClock, FrameOrder, payload_len};
use crate::error::Result;
use crate::frame::LiveDepthFrame;
use crate::frame::depth::DEPTH_SAMPLE_BYTES;
use crate::options::Modality;

/// Appends depth records. Same shape as color, but the count field is in
/// samples and each sample takes two bytes.
#[derive(Debug)]
pub(crate) struct DepthRecorder {
    clock: ElapsedClock,
    order: FrameOrder,
    scratch: Vec<u8>,
}

impl DepthRecorder {
    pub(crate) fn new(now: Instant) -> Self {
        Self { clock: ElapsedClock::new(now), order: FrameOrder::default(), scratch: Vec::new() }
    }

    pub(crate) fn record<W: Write + ?Sized>(
        &mut self,
        w: &mut W,
        frame: &impl LiveDepthFrame,
        now: Instant,
    ) -> Result<()> {
        self.order.check(Modality::Depth, frame.frame_number())?;
        let samples = frame.pixel_data();
        let count = payload_len(samples.len(), "depth")?;
        w.write_i32::<LittleEndian>(Modality::Depth.tag())?;
        w.write_i64::<LittleEndian>(self.clock.tick(now))?;
        w.write_i32::<LittleEndian>(frame.bytes_per_pixel())?;
        w.write_i32::<LittleEndian>(frame.format().tag())?;
        w.write_i32::<LittleEndian>(frame.width())?;
        w.write_i32::<LittleEndian>(frame.height())?;
        w.write_i32::<LittleEndian>(frame.frame_number())?;
        w.write_i32::<LittleEndian>(count)?;
        self.scratch.resize(samples.len() * DEPTH_SAMPLE_BYTES, 0);
        LittleEndian::write_i16_into(samples, &mut self.scratch);
        w.write_all(&self.scratch)?;
        self.order.advance(frame.frame_number());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{DepthImageFormat, DepthImageFrame};
    use std::time::Duration;

    #[test]
    fn samples_are_little_endian_pairs() {
        let t0 = Instant::now();
        let mut rec = DepthRecorder::new(t0);
        let frame = DepthImageFrame {
            frame_number: 5,
            timestamp: 0,
            width: 2,
            height: 1,
            bytes_per_pixel: 2,
            format: DepthImageFormat::Resolution320x240Fps30,
            pixels: vec![0x0102, -2],
        };
        let mut out = Vec::new();
        rec.record(&mut out, &frame, t0 + Duration::from_millis(5)).unwrap();

        assert_eq!(&out[0..4], &2i32.to_le_bytes());
        assert_eq!(&out[4..12], &5i64.to_le_bytes());
        assert_eq!(&out[16..20], &2i32.to_le_bytes()); // format tag
        assert_eq!(&out[28..32], &5i32.to_le_bytes()); // frame number
        assert_eq!(&out[32..36], &2i32.to_le_bytes()); // sample count
        assert_eq!(&out[36..], &[0x02, 0x01, 0xFE, 0xFF]);
    }
}
