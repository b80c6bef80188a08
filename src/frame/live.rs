//! Producer-side frame interface.
//!
//! A sensor binding implements these traits for its own frame objects; the
//! recorder only ever borrows the pixel buffer, so recording is zero-copy.
//! The owned `*Frame` structs below are simple in-memory implementations used
//! by the test-pattern sensor and by tests.
use crate::frame::color::ColorImageFormat;
use crate::frame::depth::DepthImageFormat;
use crate::frame::skeleton::{Skeleton, SkeletonTrackingMode};

pub trait LiveColorFrame {
    fn frame_number(&self) -> i32;
    /// Sensor timestamp in milliseconds.
    fn timestamp(&self) -> i64;
    fn width(&self) -> i32;
    fn height(&self) -> i32;
    fn bytes_per_pixel(&self) -> i32;
    fn format(&self) -> ColorImageFormat;
    fn pixel_data(&self) -> &[u8];
}

pub trait LiveDepthFrame {
    fn frame_number(&self) -> i32;
    fn timestamp(&self) -> i64;
    fn width(&self) -> i32;
    fn height(&self) -> i32;
    fn bytes_per_pixel(&self) -> i32;
    fn format(&self) -> DepthImageFormat;
    /// One sample per pixel.
    fn pixel_data(&self) -> &[i16];
}

pub trait LiveSkeletonFrame {
    fn frame_number(&self) -> i32;
    fn timestamp(&self) -> i64;
    fn tracking_mode(&self) -> SkeletonTrackingMode;
    fn floor_clip_plane(&self) -> [f32; 4];
    fn skeletons(&self) -> &[Skeleton];
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColorImageFrame {
    pub frame_number: i32,
    pub timestamp: i64,
    pub width: i32,
    pub height: i32,
    pub bytes_per_pixel: i32,
    pub format: ColorImageFormat,
    pub pixels: Vec<u8>,
}

impl LiveColorFrame for ColorImageFrame {
    fn frame_number(&self) -> i32 {
        self.frame_number
    }
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
    fn width(&self) -> i32 {
        self.width
    }
    fn height(&self) -> i32 {
        self.height
    }
    fn bytes_per_pixel(&self) -> i32 {
        self.bytes_per_pixel
    }
    fn format(&self) -> ColorImageFormat {
        self.format
    }
    fn pixel_data(&self) -> &[u8] {
        &self.pixels
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepthImageFrame {
    pub frame_number: i32,
    pub timestamp: i64,
    pub width: i32,
    pub height: i32,
    pub bytes_per_pixel: i32,
    pub format: DepthImageFormat,
    pub pixels: Vec<i16>,
}

impl LiveDepthFrame for DepthImageFrame {
    fn frame_number(&self) -> i32 {
        self.frame_number
    }
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
    fn width(&self) -> i32 {
        self.width
    }
    fn height(&self) -> i32 {
        self.height
    }
    fn bytes_per_pixel(&self) -> i32 {
        self.bytes_per_pixel
    }
    fn format(&self) -> DepthImageFormat {
        self.format
    }
    fn pixel_data(&self) -> &[i16] {
        &self.pixels
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonFrame {
    pub frame_number: i32,
    pub timestamp: i64,
    pub tracking_mode: SkeletonTrackingMode,
    pub floor_clip_plane: [f32; 4],
    pub skeletons: Vec<Skeleton>,
}

impl LiveSkeletonFrame for SkeletonFrame {
    fn frame_number(&self) -> i32 {
        self.frame_number
    }
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
    fn tracking_mode(&self) -> SkeletonTrackingMode {
        self.tracking_mode
    }
    fn floor_clip_plane(&self) -> [f32; 4] {
        self.floor_clip_plane
    }
    fn skeletons(&self) -> &[Skeleton] {
        &self.skeletons
    }
}
