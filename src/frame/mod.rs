//! Frame model shared by recording and replay.
//!
//! - `live`: traits a sensor binding implements, plus owned implementations
//! - `color`, `depth`, `skeleton`: frames reconstructed from a log
//! - `payload`: lazy/eager pixel storage behind the image frames

pub mod color;
pub mod depth;
pub mod live;
pub mod payload;
pub mod skeleton;

pub use color::{ColorImageFormat, ReplayColorImageFrame};
pub use depth::{DepthImageFormat, ReplayDepthImageFrame};
pub use live::{ColorImageFrame, DepthImageFrame, LiveColorFrame, LiveDepthFrame, LiveSkeletonFrame, SkeletonFrame};
pub use payload::{PayloadMode, PayloadSource};
pub use skeleton::{
    Joint, JointTrackingState, JointType, ReplaySkeletonFrame, Skeleton, SkeletonPoint, SkeletonTrackingMode,
    SkeletonTrackingState,
};

/// Common view of every replayable frame.
pub trait ReplayFrame: std::fmt::Debug + Send + Sync + 'static {
    /// Short modality label used in logs and thread names.
    const KIND: &'static str;

    fn frame_number(&self) -> i32;

    /// Milliseconds elapsed since the previous record of the same modality
    /// at capture time; playback waits this long before emitting the frame.
    fn timestamp(&self) -> i64;
}
