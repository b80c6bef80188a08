//! Log header: capability mask followed by the calibration blob.
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::error::{ReplayError, Result};
use crate::options::RecordOptions;

/// Written once at the start of every log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogHeader {
    pub options: RecordOptions,
    /// Opaque sensor calibration parameters used to rebuild a coordinate
    /// mapper at replay time.
    pub calibration: Vec<u8>,
}

impl LogHeader {
    pub fn new(options: RecordOptions, calibration: impl Into<Vec<u8>>) -> Self {
        Self { options, calibration: calibration.into() }
    }

    pub fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        let len = i32::try_from(self.calibration.len())
            .map_err(|_| ReplayError::format("calibration blob exceeds i32::MAX bytes"))?;
        w.write_i32::<LittleEndian>(self.options.bits() as i32)?;
        w.write_i32::<LittleEndian>(len)?;
        w.write_all(&self.calibration)?;
        Ok(())
    }

    pub fn read_from<R: Read + ?Sized>(r: &mut R) -> Result<Self> {
        let bits = r.read_i32::<LittleEndian>()?;
        let options = RecordOptions::from_bits(bits)
            .ok_or_else(|| ReplayError::format(format!("unknown capability mask {bits:#x}")))?;
        let len = r.read_i32::<LittleEndian>()?;
        if len < 0 {
            return Err(ReplayError::format(format!("negative calibration length {len}")));
        }
        // grows with what the stream holds, not with what the header claims
        let mut calibration = Vec::new();
        (&mut *r).take(len as u64).read_to_end(&mut calibration)?;
        if calibration.len() != len as usize {
            return Err(ReplayError::format(format!(
                "calibration blob truncated: header claims {len} bytes, {} present",
                calibration.len()
            )));
        }
        Ok(Self { options, calibration })
    }

    /// Encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        8 + self.calibration.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_layout() {
        let h = LogHeader::new(RecordOptions::DEPTH, vec![9u8, 8, 7]);
        let mut buf = Vec::new();
        h.write_to(&mut buf).unwrap();
        assert_eq!(buf, vec![2, 0, 0, 0, 3, 0, 0, 0, 9, 8, 7]);
        assert_eq!(buf.len(), h.encoded_len());
        let back = LogHeader::read_from(&mut Cursor::new(buf)).unwrap();
        assert_eq!(back, h);
    }

    #[test]
    fn rejects_bad_mask_and_length() {
        let mut bad_mask = Vec::new();
        bad_mask.extend_from_slice(&16i32.to_le_bytes());
        bad_mask.extend_from_slice(&0i32.to_le_bytes());
        let err = LogHeader::read_from(&mut Cursor::new(bad_mask)).unwrap_err();
        assert!(matches!(err, ReplayError::Format(_)));

        let mut bad_len = Vec::new();
        bad_len.extend_from_slice(&1i32.to_le_bytes());
        bad_len.extend_from_slice(&(-4i32).to_le_bytes());
        let err = LogHeader::read_from(&mut Cursor::new(bad_len)).unwrap_err();
        assert!(matches!(err, ReplayError::Format(_)));
    }

    #[test]
    fn oversized_calibration_length_is_format_error() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&i32::MAX.to_le_bytes());
        bytes.extend_from_slice(&[1, 2, 3]);
        let err = LogHeader::read_from(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, ReplayError::Format(ref m) if m.contains("3 present")), "{err}");
    }
}
