//! Pixel payload storage for replayed image frames.
//!
//! A lazily-read payload only remembers where its bytes live in the log. The
//! log stream is shared between every lazy payload of a replay session behind
//! one mutex; each read saves the stream position, seeks, reads and restores
//! the position while holding the lock, so payload access is safe from any
//! playback thread and never disturbs an in-progress parse.
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use crate::error::Result;

/// Object-safe `Read + Seek` used for the shared log stream.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// How image payloads are materialized while a log is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadMode {
    /// Record offset and length, read bytes on demand.
    #[default]
    Lazy,
    /// Copy every payload into memory at parse time.
    Eager,
}

/// Shared handle to the log stream backing lazy payloads.
#[derive(Clone)]
pub struct PayloadSource {
    inner: Arc<Mutex<Box<dyn ReadSeek>>>,
}

impl PayloadSource {
    pub fn new<R: Read + Seek + Send + 'static>(stream: R) -> Self {
        Self { inner: Arc::new(Mutex::new(Box::new(stream))) }
    }

    /// Exclusive access to the stream, used by the parser.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Box<dyn ReadSeek>> {
        self.inner.lock()
    }

    /// Fill `buf` from absolute `offset`, leaving the stream position as it was.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let mut stream = self.inner.lock();
        let saved = stream.stream_position()?;
        stream.seek(SeekFrom::Start(offset))?;
        let read = stream.read_exact(buf);
        stream.seek(SeekFrom::Start(saved))?;
        read
    }
}

impl fmt::Debug for PayloadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadSource").finish_non_exhaustive()
    }
}

/// Raw little-endian payload bytes of one image frame.
#[derive(Debug, Clone)]
pub(crate) enum Payload {
    Owned(Arc<[u8]>),
    Lazy { source: PayloadSource, offset: u64, len: usize },
}

impl Payload {
    pub(crate) fn byte_len(&self) -> usize {
        match self {
            Payload::Owned(bytes) => bytes.len(),
            Payload::Lazy { len, .. } => *len,
        }
    }

    pub(crate) fn is_lazy(&self) -> bool {
        matches!(self, Payload::Lazy { .. })
    }

    /// Copy the payload into the front of `dst`; `dst` must be long enough.
    pub(crate) fn copy_to(&self, dst: &mut [u8]) -> Result<()> {
        let len = self.byte_len();
        match self {
            Payload::Owned(bytes) => dst[..len].copy_from_slice(bytes),
            Payload::Lazy { source, offset, .. } => source.read_at(*offset, &mut dst[..len])?,
        }
        Ok(())
    }

    pub(crate) fn to_vec(&self) -> Result<Vec<u8>> {
        let mut out = vec![0u8; self.byte_len()];
        self.copy_to(&mut out)?;
        Ok(out)
    }
}

/// Parse-time helper that turns the next `len` bytes of the stream into a
/// [`Payload`] according to the configured [`PayloadMode`].
pub(crate) struct PayloadReader<'a> {
    pub(crate) source: &'a PayloadSource,
    pub(crate) mode: PayloadMode,
    /// Stream length captured before parsing started.
    pub(crate) end: u64,
}

impl PayloadReader<'_> {
    pub(crate) fn take(&self, stream: &mut dyn ReadSeek, len: usize) -> Result<Payload> {
        let offset = stream.stream_position()?;
        if offset + len as u64 > self.end {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "payload runs past end of log").into());
        }
        match self.mode {
            PayloadMode::Lazy => {
                stream.seek(SeekFrom::Start(offset + len as u64))?;
                Ok(Payload::Lazy { source: self.source.clone(), offset, len })
            }
            PayloadMode::Eager => {
                let mut bytes = vec![0u8; len];
                stream.read_exact(&mut bytes)?;
                Ok(Payload::Owned(bytes.into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn read_at_restores_position() {
        let source = PayloadSource::new(Cursor::new((0u8..32).collect::<Vec<_>>()));
        source.lock().seek(SeekFrom::Start(5)).unwrap();

        let mut buf = [0u8; 4];
        source.read_at(20, &mut buf).unwrap();
        assert_eq!(buf, [20, 21, 22, 23]);
        assert_eq!(source.lock().stream_position().unwrap(), 5);
    }

    #[test]
    fn lazy_take_skips_and_reads_twice() {
        let source = PayloadSource::new(Cursor::new((0u8..16).collect::<Vec<_>>()));
        let reader = PayloadReader { source: &source, mode: PayloadMode::Lazy, end: 16 };
        let payload = {
            let mut stream = source.lock();
            stream.seek(SeekFrom::Start(2)).unwrap();
            let p = reader.take(&mut **stream, 6).unwrap();
            assert_eq!(stream.stream_position().unwrap(), 8);
            p
        };
        assert!(payload.is_lazy());
        let first = payload.to_vec().unwrap();
        let second = payload.to_vec().unwrap();
        assert_eq!(first, vec![2, 3, 4, 5, 6, 7]);
        assert_eq!(first, second);
        assert_eq!(source.lock().stream_position().unwrap(), 8);
    }

    #[test]
    fn eager_take_copies() {
        let source = PayloadSource::new(Cursor::new(vec![1u8, 2, 3, 4]));
        let reader = PayloadReader { source: &source, mode: PayloadMode::Eager, end: 4 };
        let payload = reader.take(&mut **source.lock(), 3).unwrap();
        assert!(!payload.is_lazy());
        assert_eq!(payload.to_vec().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn take_past_end_is_truncation() {
        let source = PayloadSource::new(Cursor::new(vec![0u8; 4]));
        let reader = PayloadReader { source: &source, mode: PayloadMode::Lazy, end: 4 };
        let err = reader.take(&mut **source.lock(), 10).unwrap_err();
        assert!(err.is_truncation());
    }
}
