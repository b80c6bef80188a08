//! Correlated replay: groups records into units anchored on color frames.
use tracing::{debug, warn};

use crate::frame::{ReplayColorImageFrame, ReplayDepthImageFrame, ReplayFrame, ReplaySkeletonFrame};
use crate::replay::reader::LogRecord;

/// One color frame with the depth and skeleton frames captured alongside it.
#[derive(Debug)]
pub struct ReplayAllFrames {
    color: ReplayColorImageFrame,
    depth: Option<ReplayDepthImageFrame>,
    skeletons: Option<ReplaySkeletonFrame>,
}

impl ReplayAllFrames {
    pub fn color(&self) -> &ReplayColorImageFrame {
        &self.color
    }

    pub fn depth(&self) -> Option<&ReplayDepthImageFrame> {
        self.depth.as_ref()
    }

    pub fn skeletons(&self) -> Option<&ReplaySkeletonFrame> {
        self.skeletons.as_ref()
    }
}

impl ReplayFrame for ReplayAllFrames {
    const KIND: &'static str = "all";

    fn frame_number(&self) -> i32 {
        self.color.frame_number()
    }

    fn timestamp(&self) -> i64 {
        self.color.timestamp()
    }
}

/// Builds the correlated sequence from records in log order.
///
/// A color record always opens a new unit. A depth or skeleton record joins
/// the most recent unit if that unit has no member of its kind yet; the
/// first one wins and later ones are dropped. Records that arrive before the
/// first color record have no unit to join and are dropped.
#[derive(Debug, Default)]
pub struct AllFramesSystem {
    units: Vec<ReplayAllFrames>,
    orphans: usize,
    duplicates: usize,
}

impl AllFramesSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, record: LogRecord) {
        let kind = record.modality();
        let frame = record.frame_number();
        if let LogRecord::Color(color) = record {
            self.units.push(ReplayAllFrames { color, depth: None, skeletons: None });
            return;
        }
        let Some(unit) = self.units.last_mut() else {
            self.orphans += 1;
            warn!(%kind, frame, "record before first color frame dropped");
            return;
        };
        let attached = match record {
            LogRecord::Depth(depth) if unit.depth.is_none() => {
                unit.depth = Some(depth);
                true
            }
            LogRecord::Skeletons(skeletons) if unit.skeletons.is_none() => {
                unit.skeletons = Some(skeletons);
                true
            }
            _ => false,
        };
        if !attached {
            self.duplicates += 1;
            debug!(%kind, frame, "unit already has this modality; record dropped");
        }
    }

    /// Records dropped for preceding the first color record.
    pub fn orphans(&self) -> usize {
        self.orphans
    }

    /// Records dropped because their unit was already filled.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn into_units(self) -> Vec<ReplayAllFrames> {
        self.units
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{
        ColorImageFormat, ColorImageFrame, DepthImageFormat, DepthImageFrame, SkeletonFrame, SkeletonTrackingMode,
    };

    fn color(n: i32) -> LogRecord {
        LogRecord::Color(ReplayColorImageFrame::from_live(&ColorImageFrame {
            frame_number: n,
            timestamp: 33,
            width: 1,
            height: 1,
            bytes_per_pixel: 4,
            format: ColorImageFormat::RgbResolution640x480Fps30,
            pixels: vec![0; 4],
        }))
    }

    fn depth(n: i32) -> LogRecord {
        LogRecord::Depth(ReplayDepthImageFrame::from_live(&DepthImageFrame {
            frame_number: n,
            timestamp: 33,
            width: 1,
            height: 1,
            bytes_per_pixel: 2,
            format: DepthImageFormat::Resolution80x60Fps30,
            pixels: vec![0],
        }))
    }

    fn skeletons(n: i32) -> LogRecord {
        LogRecord::Skeletons(ReplaySkeletonFrame::from_live(&SkeletonFrame {
            frame_number: n,
            timestamp: 33,
            tracking_mode: SkeletonTrackingMode::Default,
            floor_clip_plane: [0.0; 4],
            skeletons: Vec::new(),
        }))
    }

    fn build(records: Vec<LogRecord>) -> AllFramesSystem {
        let mut system = AllFramesSystem::new();
        for record in records {
            system.push(record);
        }
        system
    }

    fn members(unit: &ReplayAllFrames) -> (i32, Option<i32>, Option<i32>) {
        (
            unit.color().frame_number(),
            unit.depth().map(|d| d.frame_number()),
            unit.skeletons().map(|s| s.frame_number()),
        )
    }

    #[test]
    fn groups_on_color_boundaries() {
        let system = build(vec![color(1), depth(1), skeletons(1), color(2), skeletons(2)]);
        let units = system.into_units();
        assert_eq!(units.len(), 2);
        assert_eq!(members(&units[0]), (1, Some(1), Some(1)));
        assert_eq!(members(&units[1]), (2, None, Some(2)));
        assert_eq!(units[1].timestamp(), 33);
    }

    #[test]
    fn leading_orphans_are_dropped() {
        let system = build(vec![depth(0), skeletons(0), color(1), depth(1)]);
        assert_eq!(system.orphans(), 2);
        let units = system.into_units();
        assert_eq!(units.len(), 1);
        assert_eq!(members(&units[0]), (1, Some(1), None));
    }

    #[test]
    fn only_orphans_produce_no_units() {
        let system = build(vec![depth(0), depth(1)]);
        assert!(system.is_empty());
        assert_eq!(system.orphans(), 2);
    }

    #[test]
    fn consecutive_colors_make_color_only_units() {
        let units = build(vec![color(1), color(2), depth(2)]).into_units();
        assert_eq!(members(&units[0]), (1, None, None));
        assert_eq!(members(&units[1]), (2, Some(2), None));
    }

    #[test]
    fn first_member_wins() {
        let system = build(vec![color(1), depth(10), depth(11)]);
        assert_eq!(system.duplicates(), 1);
        let units = system.into_units();
        assert_eq!(members(&units[0]), (1, Some(10), None));
    }
}
