//! Replay side: parses a session log and plays it back with its recorded
//! timing.
//!
//! [`Replay`] parses the whole log when it is opened. Depending on the
//! header mask and the configured [`ReplayMode`] it builds either one
//! [`ReplaySystem`] per recorded modality, or a single correlated system over
//! [`ReplayAllFrames`] units. Notifications from the playback threads are
//! relayed to registered handlers through a [`Dispatcher`].
mod all_frames;
mod dispatch;
mod reader;
mod system;

pub use all_frames::{AllFramesSystem, ReplayAllFrames};
pub use dispatch::{DispatchQueue, Dispatcher, Inline, Job};
pub use system::{CancelToken, FrameReady, ReplaySystem};

use std::io::{Read, Seek};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{ReplayError, Result};
use crate::frame::{PayloadMode, ReplayColorImageFrame, ReplayDepthImageFrame, ReplayFrame, ReplaySkeletonFrame};
use crate::header::LogHeader;
use crate::options::{Modality, RecordOptions};
use reader::{LogReader, LogRecord};

/// How a log recorded with every modality is indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplayMode {
    /// Correlated units when the header mask is `ALL`, independent
    /// timelines otherwise.
    #[default]
    Auto,
    /// Always one timeline per recorded modality.
    Independent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayConfig {
    pub payload_mode: PayloadMode,
    pub mode: ReplayMode,
}

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handlers of one frame type, with the system that feeds them.
struct Channel<T: ReplayFrame> {
    system: ReplaySystem<T>,
    handlers: Vec<Handler<T>>,
}

impl<T: ReplayFrame> Channel<T> {
    fn new(frames: Vec<T>) -> Self {
        Self { system: ReplaySystem::new(frames), handlers: Vec::new() }
    }

    fn start(&mut self, dispatcher: &Arc<dyn Dispatcher>) -> Result<()> {
        let dispatcher = dispatcher.clone();
        let handlers: Arc<[Handler<T>]> = self.handlers.clone().into();
        self.system.start(move |ready: FrameReady<T>| {
            let handlers = handlers.clone();
            dispatcher.send(Box::new(move || {
                if ready.token.is_cancelled() {
                    return;
                }
                for handler in handlers.iter() {
                    handler(ready.frame.as_ref());
                }
            }));
        })
    }
}

/// A parsed session log ready to be played back.
///
/// Handlers registered with `on_*` are called once per frame, in order, on
/// the dispatcher's context; a playback thread does not move on to its next
/// frame until its handlers have returned. Handlers must be registered
/// before [`start`](Self::start).
///
/// In correlated mode only [`on_all_frames`](Self::on_all_frames) handlers
/// are called.
pub struct Replay {
    header: LogHeader,
    dispatcher: Arc<dyn Dispatcher>,
    color: Option<Channel<ReplayColorImageFrame>>,
    depth: Option<Channel<ReplayDepthImageFrame>>,
    skeletons: Option<Channel<ReplaySkeletonFrame>>,
    all_frames: Option<Channel<ReplayAllFrames>>,
    dropped: usize,
    started: bool,
}

impl Replay {
    /// Parse `reader` with the default configuration; handlers run on the
    /// playback threads.
    pub fn open<R: Read + Seek + Send + 'static>(reader: R) -> Result<Self> {
        Self::with_config(reader, ReplayConfig::default(), Arc::new(Inline))
    }

    pub fn with_config<R: Read + Seek + Send + 'static>(
        reader: R,
        config: ReplayConfig,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Result<Self> {
        let log = LogReader::new(reader, config.payload_mode)?;
        let header = log.read_header()?;
        let options = header.options;

        let mut replay = Self {
            header,
            dispatcher,
            color: None,
            depth: None,
            skeletons: None,
            all_frames: None,
            dropped: 0,
            started: false,
        };

        if options.is_all() && config.mode == ReplayMode::Auto {
            let mut all = AllFramesSystem::new();
            while let Some(record) = log.next_record()? {
                all.push(record);
            }
            replay.dropped = all.orphans() + all.duplicates();
            replay.all_frames = Some(Channel::new(all.into_units()));
        } else {
            let mut colors = Vec::new();
            let mut depths = Vec::new();
            let mut skeletons = Vec::new();
            while let Some(record) = log.next_record()? {
                if !options.has(record.modality()) {
                    warn!(
                        kind = %record.modality(),
                        frame = record.frame_number(),
                        "record of unrecorded modality skipped"
                    );
                    replay.dropped += 1;
                    continue;
                }
                match record {
                    LogRecord::Color(f) => colors.push(f),
                    LogRecord::Depth(f) => depths.push(f),
                    LogRecord::Skeletons(f) => skeletons.push(f),
                }
            }
            replay.color = options.has(Modality::Color).then(|| Channel::new(colors));
            replay.depth = options.has(Modality::Depth).then(|| Channel::new(depths));
            replay.skeletons = options.has(Modality::Skeletons).then(|| Channel::new(skeletons));
        }

        info!(
            %options,
            correlated = replay.is_correlated(),
            color = replay.color_frames().len(),
            depth = replay.depth_frames().len(),
            skeletons = replay.skeleton_frames().len(),
            units = replay.all_frames().len(),
            dropped = replay.dropped,
            "replay opened"
        );
        Ok(replay)
    }

    pub fn options(&self) -> RecordOptions {
        self.header.options
    }

    /// Calibration blob stored in the log header.
    pub fn calibration(&self) -> &[u8] {
        &self.header.calibration
    }

    pub fn is_correlated(&self) -> bool {
        self.all_frames.is_some()
    }

    /// Records left out of every sequence while parsing.
    pub fn dropped_records(&self) -> usize {
        self.dropped
    }

    pub fn color_frames(&self) -> &[Arc<ReplayColorImageFrame>] {
        self.color.as_ref().map(|c| c.system.frames()).unwrap_or(&[])
    }

    pub fn depth_frames(&self) -> &[Arc<ReplayDepthImageFrame>] {
        self.depth.as_ref().map(|c| c.system.frames()).unwrap_or(&[])
    }

    pub fn skeleton_frames(&self) -> &[Arc<ReplaySkeletonFrame>] {
        self.skeletons.as_ref().map(|c| c.system.frames()).unwrap_or(&[])
    }

    pub fn all_frames(&self) -> &[Arc<ReplayAllFrames>] {
        self.all_frames.as_ref().map(|c| c.system.frames()).unwrap_or(&[])
    }

    pub fn on_color(&mut self, handler: impl Fn(&ReplayColorImageFrame) + Send + Sync + 'static) {
        if let Some(channel) = self.color.as_mut() {
            channel.handlers.push(Arc::new(handler));
        }
    }

    pub fn on_depth(&mut self, handler: impl Fn(&ReplayDepthImageFrame) + Send + Sync + 'static) {
        if let Some(channel) = self.depth.as_mut() {
            channel.handlers.push(Arc::new(handler));
        }
    }

    pub fn on_skeletons(&mut self, handler: impl Fn(&ReplaySkeletonFrame) + Send + Sync + 'static) {
        if let Some(channel) = self.skeletons.as_mut() {
            channel.handlers.push(Arc::new(handler));
        }
    }

    pub fn on_all_frames(&mut self, handler: impl Fn(&ReplayAllFrames) + Send + Sync + 'static) {
        if let Some(channel) = self.all_frames.as_mut() {
            channel.handlers.push(Arc::new(handler));
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Start every playback system from its first frame.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(ReplayError::invalid_operation("replay is already started"));
        }
        self.started = true;
        if let Err(e) = self.start_systems() {
            self.stop();
            return Err(e);
        }
        info!(options = %self.header.options, correlated = self.is_correlated(), "replay started");
        Ok(())
    }

    fn start_systems(&mut self) -> Result<()> {
        let dispatcher = &self.dispatcher;
        if let Some(channel) = self.color.as_mut() {
            channel.start(dispatcher)?;
        }
        if let Some(channel) = self.depth.as_mut() {
            channel.start(dispatcher)?;
        }
        if let Some(channel) = self.skeletons.as_mut() {
            channel.start(dispatcher)?;
        }
        if let Some(channel) = self.all_frames.as_mut() {
            channel.start(dispatcher)?;
        }
        Ok(())
    }

    /// Stop every playback system. Calling it again, or before start, does
    /// nothing.
    pub fn stop(&mut self) {
        if let Some(channel) = self.color.as_mut() {
            channel.system.stop();
        }
        if let Some(channel) = self.depth.as_mut() {
            channel.system.stop();
        }
        if let Some(channel) = self.skeletons.as_mut() {
            channel.system.stop();
        }
        if let Some(channel) = self.all_frames.as_mut() {
            channel.system.stop();
        }
        if self.started {
            info!("replay stopped");
        }
        self.started = false;
    }

    /// True when every playback system has finished its run. A replay with
    /// no systems is always finished.
    pub fn is_finished(&self) -> bool {
        [
            self.color.as_ref().map(|c| c.system.is_finished()),
            self.depth.as_ref().map(|c| c.system.is_finished()),
            self.skeletons.as_ref().map(|c| c.system.is_finished()),
            self.all_frames.as_ref().map(|c| c.system.is_finished()),
        ]
        .into_iter()
        .flatten()
        .all(|finished| finished)
    }
}

impl Drop for Replay {
    fn drop(&mut self) {
        self.stop();
    }
}
