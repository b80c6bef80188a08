//! Capture side: writes a multiplexed session log.
//!
//! A [`Recorder`] owns the output stream. It writes the [`LogHeader`] on
//! construction, keeps one codec per enabled modality and appends one
//! self-describing record per incoming frame, in call order. Records are
//! buffered; the buffer is pushed to the underlying stream only when the
//! configured flush interval has passed, and on [`Recorder::stop`].
mod color;
mod depth;
mod skeleton;

use std::io::{BufWriter, Write};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::error::{ReplayError, Result};
use crate::frame::{LiveColorFrame, LiveDepthFrame, LiveSkeletonFrame};
use crate::header::LogHeader;
use crate::options::{Modality, RecordOptions};

use color::ColorRecorder;
use depth::DepthRecorder;
use skeleton::SkeletonRecorder;

const WRITE_BUFFER_BYTES: usize = 1 << 20; // 1 MiB

#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Minimum time between durability flushes.
    pub flush_interval: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self { flush_interval: Duration::from_secs(60) }
    }
}

/// Milliseconds since the previous record of one modality.
#[derive(Debug)]
struct ElapsedClock {
    reference: Instant,
}

impl ElapsedClock {
    fn new(now: Instant) -> Self {
        Self { reference: now }
    }

    /// Whole milliseconds since the last tick (or construction), then reset.
    fn tick(&mut self, now: Instant) -> i64 {
        let elapsed = now.saturating_duration_since(self.reference).as_millis();
        self.reference = now;
        i64::try_from(elapsed).unwrap_or(i64::MAX)
    }
}

/// Last frame number written for one modality. Numbers must strictly increase.
#[derive(Debug, Default)]
struct FrameOrder {
    last: Option<i32>,
}

impl FrameOrder {
    fn check(&self, modality: Modality, frame_number: i32) -> Result<()> {
        match self.last {
            Some(last) if frame_number <= last => Err(ReplayError::invalid_operation(format!(
                "{modality} frame {frame_number} does not follow frame {last}"
            ))),
            _ => Ok(()),
        }
    }

    fn advance(&mut self, frame_number: i32) {
        self.last = Some(frame_number);
    }
}

fn payload_len(len: usize, what: &str) -> Result<i32> {
    i32::try_from(len).map_err(|_| ReplayError::format(format!("{what} payload of {len} elements does not fit in i32")))
}

/// Single-writer session log recorder.
pub struct Recorder<W: Write> {
    options: RecordOptions,
    config: RecorderConfig,
    writer: Option<BufWriter<W>>,
    color: Option<ColorRecorder>,
    depth: Option<DepthRecorder>,
    skeletons: Option<SkeletonRecorder>,
    previous_flush: Instant,
    records: u64,
}

impl<W: Write> Recorder<W> {
    /// Create a recorder with the default configuration and write the header.
    pub fn new(options: RecordOptions, writer: W, calibration: &[u8]) -> Result<Self> {
        Self::with_config(options, writer, calibration, RecorderConfig::default())
    }

    pub fn with_config(options: RecordOptions, writer: W, calibration: &[u8], config: RecorderConfig) -> Result<Self> {
        let mut writer = BufWriter::with_capacity(WRITE_BUFFER_BYTES, writer);
        LogHeader::new(options, calibration).write_to(&mut writer)?;

        let now = Instant::now();
        info!(%options, calibration_bytes = calibration.len(), "recording started");
        Ok(Self {
            options,
            writer: Some(writer),
            color: options.has(Modality::Color).then(|| ColorRecorder::new(now)),
            depth: options.has(Modality::Depth).then(|| DepthRecorder::new(now)),
            skeletons: options.has(Modality::Skeletons).then(|| SkeletonRecorder::new(now)),
            previous_flush: now,
            config,
            records: 0,
        })
    }

    pub fn options(&self) -> RecordOptions {
        self.options
    }

    pub fn is_stopped(&self) -> bool {
        self.writer.is_none()
    }

    /// Number of frame records appended so far.
    pub fn records_written(&self) -> u64 {
        self.records
    }

    pub fn record_color(&mut self, frame: &impl LiveColorFrame) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(stopped)?;
        let codec = self.color.as_mut().ok_or_else(|| not_enabled(Modality::Color))?;
        let now = Instant::now();
        codec.record(writer, frame, now)?;
        self.after_record(now)
    }

    pub fn record_depth(&mut self, frame: &impl LiveDepthFrame) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(stopped)?;
        let codec = self.depth.as_mut().ok_or_else(|| not_enabled(Modality::Depth))?;
        let now = Instant::now();
        codec.record(writer, frame, now)?;
        self.after_record(now)
    }

    pub fn record_skeletons(&mut self, frame: &impl LiveSkeletonFrame) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(stopped)?;
        let codec = self.skeletons.as_mut().ok_or_else(|| not_enabled(Modality::Skeletons))?;
        let now = Instant::now();
        codec.record(writer, frame, now)?;
        self.after_record(now)
    }

    fn after_record(&mut self, now: Instant) -> Result<()> {
        self.records += 1;
        if now.saturating_duration_since(self.previous_flush) > self.config.flush_interval {
            self.previous_flush = now;
            if let Some(writer) = self.writer.as_mut() {
                writer.flush()?;
                debug!(records = self.records, "log flushed");
            }
        }
        Ok(())
    }

    /// Flush and release the output stream. A recorder can only be stopped once.
    pub fn stop(&mut self) -> Result<()> {
        let writer = self.writer.take().ok_or_else(|| ReplayError::invalid_operation("recorder is already stopped"))?;
        let inner = writer.into_inner().map_err(|e| e.into_error())?;
        drop(inner);
        info!(records = self.records, "recording stopped");
        Ok(())
    }
}

fn stopped() -> ReplayError {
    ReplayError::invalid_operation("recorder is stopped")
}

fn not_enabled(modality: Modality) -> ReplayError {
    ReplayError::invalid_operation(format!("{modality} recording is not enabled on this recorder"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{ColorImageFormat, ColorImageFrame, DepthImageFormat, DepthImageFrame, ReplayFrame};
    use std::cell::Cell;
    use std::rc::Rc;

    fn color(n: i32) -> ColorImageFrame {
        ColorImageFrame {
            frame_number: n,
            timestamp: 0,
            width: 1,
            height: 1,
            bytes_per_pixel: 4,
            format: ColorImageFormat::RgbResolution640x480Fps30,
            pixels: vec![1, 2, 3, 4],
        }
    }

    fn depth(n: i32) -> DepthImageFrame {
        DepthImageFrame {
            frame_number: n,
            timestamp: 0,
            width: 1,
            height: 1,
            bytes_per_pixel: 2,
            format: DepthImageFormat::Resolution80x60Fps30,
            pixels: vec![800],
        }
    }

    /// Counts flushes reaching the underlying stream.
    struct CountingWriter {
        bytes: Vec<u8>,
        flushes: Rc<Cell<usize>>,
    }

    impl Write for CountingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.bytes.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            self.flushes.set(self.flushes.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn header_is_written_first() {
        let mut out = Vec::new();
        let mut rec = Recorder::new(RecordOptions::COLOR, &mut out, &[0xAA, 0xBB]).unwrap();
        rec.stop().unwrap();
        drop(rec);
        assert_eq!(out, vec![1, 0, 0, 0, 2, 0, 0, 0, 0xAA, 0xBB]);
    }

    #[test]
    fn disabled_modality_is_invalid_operation() {
        let mut out = Vec::new();
        let mut rec = Recorder::new(RecordOptions::DEPTH, &mut out, &[]).unwrap();
        let err = rec.record_color(&color(1)).unwrap_err();
        assert!(err.is_invalid_operation());
        rec.record_depth(&depth(1)).unwrap();
        assert_eq!(rec.records_written(), 1);
        rec.stop().unwrap();
    }

    #[test]
    fn record_after_stop_and_double_stop_fail() {
        let mut out = Vec::new();
        let mut rec = Recorder::new(RecordOptions::ALL, &mut out, &[]).unwrap();
        rec.record_color(&color(1)).unwrap();
        rec.stop().unwrap();
        assert!(rec.is_stopped());
        assert!(rec.record_color(&color(2)).unwrap_err().is_invalid_operation());
        assert!(rec.stop().unwrap_err().is_invalid_operation());
    }

    #[test]
    fn flush_only_after_interval() {
        let flushes = Rc::new(Cell::new(0));
        let sink = CountingWriter { bytes: Vec::new(), flushes: flushes.clone() };
        let config = RecorderConfig { flush_interval: Duration::from_secs(3600) };
        let mut rec = Recorder::with_config(RecordOptions::COLOR, sink, &[], config).unwrap();
        for n in 0..10 {
            rec.record_color(&color(n)).unwrap();
        }
        assert_eq!(flushes.get(), 0);
        rec.stop().unwrap();
        assert_eq!(flushes.get(), 1);
    }

    #[test]
    fn zero_interval_flushes_every_record() {
        let flushes = Rc::new(Cell::new(0));
        let sink = CountingWriter { bytes: Vec::new(), flushes: flushes.clone() };
        let config = RecorderConfig { flush_interval: Duration::ZERO };
        let mut rec = Recorder::with_config(RecordOptions::COLOR, sink, &[], config).unwrap();
        std::thread::sleep(Duration::from_millis(2));
        rec.record_color(&color(1)).unwrap();
        std::thread::sleep(Duration::from_millis(2));
        rec.record_color(&color(2)).unwrap();
        assert_eq!(flushes.get(), 2);
    }

    #[test]
    fn flush_requires_strictly_more_than_interval() {
        let flushes = Rc::new(Cell::new(0));
        let sink = CountingWriter { bytes: Vec::new(), flushes: flushes.clone() };
        let interval = Duration::from_millis(100);
        let config = RecorderConfig { flush_interval: interval };
        let mut rec = Recorder::with_config(RecordOptions::COLOR, sink, &[], config).unwrap();
        let t0 = rec.previous_flush;
        rec.after_record(t0 + interval).unwrap();
        assert_eq!(flushes.get(), 0);
        rec.after_record(t0 + interval + Duration::from_millis(1)).unwrap();
        assert_eq!(flushes.get(), 1);
        // the window restarts at the flush
        rec.after_record(t0 + interval * 2 + Duration::from_millis(1)).unwrap();
        assert_eq!(flushes.get(), 1);
    }

    #[test]
    fn duplicate_or_backwards_frame_numbers_are_rejected() {
        let mut out = Vec::new();
        let mut rec = Recorder::new(RecordOptions::ALL, &mut out, &[]).unwrap();
        rec.record_color(&color(5)).unwrap();
        assert!(rec.record_color(&color(5)).unwrap_err().is_invalid_operation());
        assert!(rec.record_color(&color(3)).unwrap_err().is_invalid_operation());
        // each modality keeps its own sequence
        rec.record_depth(&depth(3)).unwrap();
        rec.record_color(&color(6)).unwrap();
        assert_eq!(rec.records_written(), 3);
        rec.stop().unwrap();
        drop(rec);

        let replay = crate::Replay::open(std::io::Cursor::new(out)).unwrap();
        let units: Vec<i32> = replay.all_frames().iter().map(|u| u.color().frame_number()).collect();
        assert_eq!(units, vec![5, 6]);
    }

    #[test]
    fn elapsed_clock_truncates_to_millis() {
        let t0 = Instant::now();
        let mut clock = ElapsedClock::new(t0);
        assert_eq!(clock.tick(t0 + Duration::from_micros(2_900)), 2);
        assert_eq!(clock.tick(t0 + Duration::from_micros(2_900)), 0);
        // earlier instants saturate to zero
        assert_eq!(clock.tick(t0), 0);
    }
}
