//! Sensor session recorder and player library.
//!
//! This crate provides the core types and logic used by the `sensor_replay`
//! recorder binary and the `player` tool:
//!
//! - `options`: capability mask selecting which modalities a session carries
//! - `header`: log header (mask and calibration blob)
//! - `frame`: color, depth and skeleton frames, live and replayed, with lazy
//!   or eager pixel payloads
//! - `record`: per-modality record codecs and the [`Recorder`] that
//!   multiplexes them into one log
//! - `replay`: log parser, timestamp-driven playback systems, the correlated
//!   all-frames multiplexer and the [`Replay`] orchestrator
//! - `synthetic`: a deterministic test-pattern sensor
//!
//! Logs are little-endian: a header, then tagged records in capture order.
//! Each record carries the milliseconds elapsed since the previous record of
//! the same modality, which playback waits before emitting the frame.
pub mod error;
pub mod frame;
pub mod header;
pub mod options;
pub mod record;
pub mod replay;
pub mod synthetic;

pub use error::{ReplayError, Result};
pub use header::LogHeader;
pub use options::{Modality, RecordOptions};
pub use record::{Recorder, RecorderConfig};
pub use replay::{DispatchQueue, Dispatcher, Inline, Replay, ReplayAllFrames, ReplayConfig, ReplayMode, ReplaySystem};
