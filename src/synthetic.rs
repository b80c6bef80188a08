//! Deterministic test-pattern sensor.
//!
//! Stands in for a device binding: it produces color, depth and skeleton
//! frames for the enabled streams and pushes them through the same
//! per-modality callbacks a real sensor would call.
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{ReplayError, Result};
use crate::frame::skeleton::SKELETON_COUNT;
use crate::frame::{
    ColorImageFormat, ColorImageFrame, DepthImageFormat, DepthImageFrame, JointTrackingState, JointType, Skeleton,
    SkeletonFrame, SkeletonPoint, SkeletonTrackingMode, SkeletonTrackingState,
};
use crate::options::{Modality, RecordOptions};
use crate::record::Recorder;

const COLOR_BYTES_PER_PIXEL: i32 = 4;
const NEAR_MM: i32 = 800;
const FAR_MM: i32 = 4000;

/// Receives frames as a sensor produces them.
pub trait FrameSink {
    fn color_frame_ready(&mut self, frame: &ColorImageFrame) -> Result<()>;
    fn depth_frame_ready(&mut self, frame: &DepthImageFrame) -> Result<()>;
    fn skeleton_frame_ready(&mut self, frame: &SkeletonFrame) -> Result<()>;
}

impl<W: Write> FrameSink for Recorder<W> {
    fn color_frame_ready(&mut self, frame: &ColorImageFrame) -> Result<()> {
        self.record_color(frame)
    }

    fn depth_frame_ready(&mut self, frame: &DepthImageFrame) -> Result<()> {
        self.record_depth(frame)
    }

    fn skeleton_frame_ready(&mut self, frame: &SkeletonFrame) -> Result<()> {
        self.record_skeletons(frame)
    }
}

/// Camera parameters stored as the log's calibration blob.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub width: i32,
    pub height: i32,
    pub color_focal_length: f32,
    pub depth_focal_length: f32,
}

impl Calibration {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[derive(Debug)]
pub struct TestPatternSensor {
    options: RecordOptions,
    width: i32,
    height: i32,
    color_frames: i32,
    depth_frames: i32,
    skeleton_frames: i32,
    started: Instant,
}

impl TestPatternSensor {
    pub fn new(options: RecordOptions, width: i32, height: i32) -> Result<Self> {
        if width <= 0 || height <= 0 {
            return Err(ReplayError::invalid_operation(format!("invalid resolution {width}x{height}")));
        }
        Ok(Self {
            options,
            width,
            height,
            color_frames: 0,
            depth_frames: 0,
            skeleton_frames: 0,
            started: Instant::now(),
        })
    }

    pub fn options(&self) -> RecordOptions {
        self.options
    }

    pub fn calibration(&self) -> Calibration {
        Calibration {
            width: self.width,
            height: self.height,
            color_focal_length: 531.15 * self.width as f32 / 640.0,
            depth_focal_length: 571.26 * self.width as f32 / 640.0,
        }
    }

    fn elapsed_ms(&self) -> i64 {
        i64::try_from(self.started.elapsed().as_millis()).unwrap_or(i64::MAX)
    }

    fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// BGRA gradient that scrolls one pixel per frame.
    pub fn next_color(&mut self) -> ColorImageFrame {
        let n = self.color_frames;
        self.color_frames += 1;
        let (w, h) = (self.width as usize, self.height as usize);
        let mut pixels = Vec::with_capacity(self.pixel_count() * COLOR_BYTES_PER_PIXEL as usize);
        for y in 0..h {
            for x in 0..w {
                let shifted = (x + n as usize) % w;
                pixels.extend_from_slice(&[
                    (shifted * 255 / w.max(1)) as u8,
                    (y * 255 / h.max(1)) as u8,
                    (n % 256) as u8,
                    0xFF,
                ]);
            }
        }
        let format = match (self.width, self.height) {
            (1280, 960) => ColorImageFormat::RgbResolution1280x960Fps12,
            (640, 480) => ColorImageFormat::RgbResolution640x480Fps30,
            _ => ColorImageFormat::Undefined,
        };
        ColorImageFrame {
            frame_number: n,
            timestamp: self.elapsed_ms(),
            width: self.width,
            height: self.height,
            bytes_per_pixel: COLOR_BYTES_PER_PIXEL,
            format,
            pixels,
        }
    }

    /// Diagonal distance ramp between the near and far limits, in
    /// millimetres shifted past the three player-index bits.
    pub fn next_depth(&mut self) -> DepthImageFrame {
        let n = self.depth_frames;
        self.depth_frames += 1;
        let (w, h) = (self.width, self.height);
        let span = FAR_MM - NEAR_MM;
        let mut pixels = Vec::with_capacity(self.pixel_count());
        for y in 0..h {
            for x in 0..w {
                let mm = NEAR_MM + (x + y + n).rem_euclid(span);
                pixels.push((mm << 3) as i16);
            }
        }
        let format = match (w, h) {
            (640, 480) => DepthImageFormat::Resolution640x480Fps30,
            (320, 240) => DepthImageFormat::Resolution320x240Fps30,
            (80, 60) => DepthImageFormat::Resolution80x60Fps30,
            _ => DepthImageFormat::Undefined,
        };
        DepthImageFrame {
            frame_number: n,
            timestamp: self.elapsed_ms(),
            width: w,
            height: h,
            bytes_per_pixel: 2,
            format,
            pixels,
        }
    }

    /// One tracked skeleton swaying side to side; the other slots are empty.
    pub fn next_skeletons(&mut self) -> SkeletonFrame {
        let n = self.skeleton_frames;
        self.skeleton_frames += 1;
        let sway = (n as f32 * 0.1).sin() * 0.25;

        let mut body = Skeleton {
            tracking_id: 1,
            tracking_state: SkeletonTrackingState::Tracked,
            position: SkeletonPoint::new(sway, 0.0, 2.2),
            user_index: 1,
            ..Skeleton::default()
        };
        for joint_type in JointType::ALL {
            let (x, y) = joint_offset(joint_type);
            let joint = body.joint_mut(joint_type);
            joint.tracking_state = JointTrackingState::Tracked;
            joint.position = SkeletonPoint::new(sway + x, y, 2.2);
        }

        let mut skeletons = vec![Skeleton::default(); SKELETON_COUNT];
        skeletons[0] = body;
        SkeletonFrame {
            frame_number: n,
            timestamp: self.elapsed_ms(),
            tracking_mode: SkeletonTrackingMode::Default,
            floor_clip_plane: [0.0, 1.0, 0.0, 0.9],
            skeletons,
        }
    }

    /// Emit one frame per enabled stream at `fps` until `limit` frames have
    /// been produced per stream or `stop` is set. Returns frames per stream.
    pub fn run<S: FrameSink>(&mut self, sink: &mut S, fps: u32, limit: Option<u64>, stop: &AtomicBool) -> Result<u64> {
        let interval = Duration::from_secs_f64(1.0 / f64::from(fps.max(1)));
        let mut next = Instant::now();
        let mut produced = 0u64;
        while limit.is_none_or(|limit| produced < limit) && !stop.load(Ordering::Relaxed) {
            if self.options.has(Modality::Color) {
                sink.color_frame_ready(&self.next_color())?;
            }
            if self.options.has(Modality::Depth) {
                sink.depth_frame_ready(&self.next_depth())?;
            }
            if self.options.has(Modality::Skeletons) {
                sink.skeleton_frame_ready(&self.next_skeletons())?;
            }
            produced += 1;

            next += interval;
            let now = Instant::now();
            if next > now {
                thread::sleep(next - now);
            } else {
                next = now;
            }
        }
        debug!(produced, options = %self.options, "test pattern stopped");
        Ok(produced)
    }
}

/// Rough standing pose relative to the root, in metres.
fn joint_offset(joint: JointType) -> (f32, f32) {
    match joint {
        JointType::HipCenter => (0.0, 0.0),
        JointType::Spine => (0.0, 0.1),
        JointType::ShoulderCenter => (0.0, 0.45),
        JointType::Head => (0.0, 0.65),
        JointType::ShoulderLeft => (-0.2, 0.4),
        JointType::ElbowLeft => (-0.3, 0.15),
        JointType::WristLeft => (-0.35, -0.05),
        JointType::HandLeft => (-0.37, -0.12),
        JointType::ShoulderRight => (0.2, 0.4),
        JointType::ElbowRight => (0.3, 0.15),
        JointType::WristRight => (0.35, -0.05),
        JointType::HandRight => (0.37, -0.12),
        JointType::HipLeft => (-0.1, -0.05),
        JointType::KneeLeft => (-0.12, -0.5),
        JointType::AnkleLeft => (-0.12, -0.9),
        JointType::FootLeft => (-0.12, -0.95),
        JointType::HipRight => (0.1, -0.05),
        JointType::KneeRight => (0.12, -0.5),
        JointType::AnkleRight => (0.12, -0.9),
        JointType::FootRight => (0.12, -0.95),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counts {
        color: usize,
        depth: usize,
        skeletons: usize,
    }

    impl FrameSink for Counts {
        fn color_frame_ready(&mut self, _: &ColorImageFrame) -> Result<()> {
            self.color += 1;
            Ok(())
        }
        fn depth_frame_ready(&mut self, _: &DepthImageFrame) -> Result<()> {
            self.depth += 1;
            Ok(())
        }
        fn skeleton_frame_ready(&mut self, _: &SkeletonFrame) -> Result<()> {
            self.skeletons += 1;
            Ok(())
        }
    }

    #[test]
    fn frames_have_expected_shape() {
        let mut sensor = TestPatternSensor::new(RecordOptions::ALL, 80, 60).unwrap();
        let color = sensor.next_color();
        assert_eq!(color.pixels.len(), 80 * 60 * 4);
        let depth = sensor.next_depth();
        assert_eq!(depth.pixels.len(), 80 * 60);
        assert_eq!(depth.format, DepthImageFormat::Resolution80x60Fps30);
        assert!(depth.pixels.iter().all(|&s| (s >> 3) as i32 >= NEAR_MM));
        let skeletons = sensor.next_skeletons();
        assert_eq!(skeletons.skeletons.len(), SKELETON_COUNT);
        assert_eq!(skeletons.skeletons.iter().filter(|s| s.is_tracked()).count(), 1);
        assert_eq!(sensor.next_color().frame_number, 1);
    }

    #[test]
    fn run_emits_only_enabled_streams() {
        let mut sensor = TestPatternSensor::new(RecordOptions::DEPTH | RecordOptions::SKELETONS, 4, 2).unwrap();
        let mut counts = Counts::default();
        let stop = AtomicBool::new(false);
        assert_eq!(sensor.run(&mut counts, 1000, Some(3), &stop).unwrap(), 3);
        assert_eq!((counts.color, counts.depth, counts.skeletons), (0, 3, 3));
    }

    #[test]
    fn stop_flag_ends_run() {
        let mut sensor = TestPatternSensor::new(RecordOptions::COLOR, 2, 2).unwrap();
        let stop = AtomicBool::new(true);
        assert_eq!(sensor.run(&mut Counts::default(), 30, None, &stop).unwrap(), 0);
    }

    #[test]
    fn calibration_round_trips() {
        let sensor = TestPatternSensor::new(RecordOptions::ALL, 640, 480).unwrap();
        let bytes = sensor.calibration().to_bytes().unwrap();
        assert_eq!(Calibration::from_bytes(&bytes).unwrap(), sensor.calibration());
    }

    #[test]
    fn rejects_empty_resolution() {
        assert!(TestPatternSensor::new(RecordOptions::COLOR, 0, 480).is_err());
    }
}
