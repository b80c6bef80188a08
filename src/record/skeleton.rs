use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;
use std::time::Instant;

use super::{ElapsedClock, FrameOrder};
use crate::error::{ReplayError, Result};
use crate::frame::skeleton::SKELETON_COUNT;
use crate::frame::{LiveSkeletonFrame, Skeleton};
use crate::options::Modality;

/// Appends skeleton records: tag, elapsed, tracking mode, floor plane,
/// frame number, then the skeleton array through bincode. The array always
/// holds `SKELETON_COUNT` slots; shorter frames are padded with untracked
/// skeletons.
#[derive(Debug)]
pub(crate) struct SkeletonRecorder {
    clock: ElapsedClock,
    order: FrameOrder,
}

impl SkeletonRecorder {
    pub(crate) fn new(now: Instant) -> Self {
        Self { clock: ElapsedClock::new(now), order: FrameOrder::default() }
    }

    pub(crate) fn record<W: Write + ?Sized>(
        &mut self,
        w: &mut W,
        frame: &impl LiveSkeletonFrame,
        now: Instant,
    ) -> Result<()> {
        self.order.check(Modality::Skeletons, frame.frame_number())?;
        let slots = frame.skeletons();
        if slots.len() > SKELETON_COUNT {
            return Err(ReplayError::invalid_operation(format!(
                "skeleton frame {} carries {} slots, at most {SKELETON_COUNT} allowed",
                frame.frame_number(),
                slots.len()
            )));
        }
        w.write_i32::<LittleEndian>(Modality::Skeletons.tag())?;
        w.write_i64::<LittleEndian>(self.clock.tick(now))?;
        w.write_i32::<LittleEndian>(frame.tracking_mode().tag())?;
        for coefficient in frame.floor_clip_plane() {
            w.write_f32::<LittleEndian>(coefficient)?;
        }
        w.write_i32::<LittleEndian>(frame.frame_number())?;
        // same layout as a bincode Vec: u64 length, then each element
        w.write_u64::<LittleEndian>(SKELETON_COUNT as u64)?;
        for slot in slots {
            bincode::serialize_into(&mut *w, slot)?;
        }
        let padding = Skeleton::default();
        for _ in slots.len()..SKELETON_COUNT {
            bincode::serialize_into(&mut *w, &padding)?;
        }
        self.order.advance(frame.frame_number());
        Ok(())
    }
}
