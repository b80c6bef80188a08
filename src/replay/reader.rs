//! Sequential parser over a session log.
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Read, Seek, SeekFrom};
use tracing::{debug, warn};

use crate::error::{ReplayError, Result};
use crate::frame::payload::{PayloadReader, ReadSeek};
use crate::frame::{PayloadMode, PayloadSource, ReplayColorImageFrame, ReplayDepthImageFrame, ReplayFrame};
use crate::frame::ReplaySkeletonFrame;
use crate::header::LogHeader;
use crate::options::Modality;

/// One decoded record, in log order.
#[derive(Debug)]
pub(crate) enum LogRecord {
    Color(ReplayColorImageFrame),
    Depth(ReplayDepthImageFrame),
    Skeletons(ReplaySkeletonFrame),
}

impl LogRecord {
    pub(crate) fn modality(&self) -> Modality {
        match self {
            LogRecord::Color(_) => Modality::Color,
            LogRecord::Depth(_) => Modality::Depth,
            LogRecord::Skeletons(_) => Modality::Skeletons,
        }
    }

    pub(crate) fn frame_number(&self) -> i32 {
        match self {
            LogRecord::Color(f) => f.frame_number(),
            LogRecord::Depth(f) => f.frame_number(),
            LogRecord::Skeletons(f) => f.frame_number(),
        }
    }
}

/// Reads the header, then one tagged record at a time until the recorded
/// stream length is reached.
///
/// A record cut short by the end of the stream marks the end of the log: it
/// is dropped with a warning and parsing stops. A tag that names no modality
/// is a format error.
pub(crate) struct LogReader {
    source: PayloadSource,
    end: u64,
    payload_mode: PayloadMode,
}

impl LogReader {
    pub(crate) fn new<R: Read + Seek + Send + 'static>(mut stream: R, payload_mode: PayloadMode) -> Result<Self> {
        let start = stream.stream_position()?;
        let end = stream.seek(SeekFrom::End(0))?;
        stream.seek(SeekFrom::Start(start))?;
        Ok(Self { source: PayloadSource::new(stream), end, payload_mode })
    }

    pub(crate) fn read_header(&self) -> Result<LogHeader> {
        let mut stream = self.source.lock();
        let header = LogHeader::read_from(&mut **stream)?;
        debug!(
            options = %header.options,
            calibration_bytes = header.calibration.len(),
            log_bytes = self.end,
            "log header parsed"
        );
        Ok(header)
    }

    pub(crate) fn next_record(&self) -> Result<Option<LogRecord>> {
        let mut guard = self.source.lock();
        let stream: &mut dyn ReadSeek = &mut **guard;
        let offset = stream.stream_position()?;
        if offset >= self.end {
            return Ok(None);
        }
        match self.parse_record(stream, offset) {
            Ok(record) => {
                debug!(offset, kind = %record.modality(), frame = record.frame_number(), "record parsed");
                Ok(Some(record))
            }
            Err(e) if e.is_truncation() => {
                warn!(offset, remaining = self.end - offset, "truncated record at end of log dropped");
                stream.seek(SeekFrom::Start(self.end))?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn parse_record(&self, stream: &mut dyn ReadSeek, offset: u64) -> Result<LogRecord> {
        let tag = stream.read_i32::<LittleEndian>()?;
        let payload = PayloadReader { source: &self.source, mode: self.payload_mode, end: self.end };
        match Modality::from_tag(tag) {
            Some(Modality::Color) => Ok(LogRecord::Color(ReplayColorImageFrame::read_from(stream, &payload)?)),
            Some(Modality::Depth) => Ok(LogRecord::Depth(ReplayDepthImageFrame::read_from(stream, &payload)?)),
            Some(Modality::Skeletons) => Ok(LogRecord::Skeletons(ReplaySkeletonFrame::read_from(stream)?)),
            None => Err(ReplayError::format(format!("unknown record tag {tag} at offset {offset}"))),
        }
    }
}

impl Iterator for LogReader {
    type Item = Result<LogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
