use std::{io::Cursor, mem::size_of};

use binrw::{BinRead, Endian};
use bytemuck::{pod_read_unaligned, Pod};

use super::KhmLoadError;

/// Sequential, bounds-checked cursor over a KHM buffer.
///
/// Spans returned by the reader alias the buffer and live as long as it does.
#[derive(Debug, Clone)]
pub struct KhmReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> KhmReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    fn truncated(&self) -> KhmLoadError {
        KhmLoadError::TruncatedBuffer {
            offset: self.position,
            remaining: self.remaining(),
        }
    }

    /// Bytes at the cursor without advancing, at most `len` of them.
    pub fn peek(&self, len: usize) -> &'a [u8] {
        let end = self.position.saturating_add(len).min(self.buffer.len());
        &self.buffer[self.position..end]
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], KhmLoadError> {
        let end = self
            .position
            .checked_add(len)
            .filter(|end| *end <= self.buffer.len())
            .ok_or_else(|| self.truncated())?;
        let bytes = &self.buffer[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), KhmLoadError> {
        self.read_bytes(len).map(|_| ())
    }

    pub fn read_fixed<T: Pod>(&mut self) -> Result<T, KhmLoadError> {
        self.read_bytes(size_of::<T>()).map(pod_read_unaligned)
    }

    /// Raw span holding `count` records of `T`.
    pub fn read_span<T: Pod>(&mut self, count: usize) -> Result<&'a [u8], KhmLoadError> {
        let len = count
            .checked_mul(size_of::<T>())
            .ok_or_else(|| self.truncated())?;
        self.read_bytes(len)
    }

    pub fn skip_records<T: Pod>(&mut self, count: usize) -> Result<(), KhmLoadError> {
        self.read_span::<T>(count).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8, KhmLoadError> {
        self.read_fixed::<u8>()
    }

    /// A one-byte presence flag; any nonzero value is set.
    pub fn read_flag(&mut self) -> Result<bool, KhmLoadError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u32(&mut self) -> Result<u32, KhmLoadError> {
        self.read_le()
    }

    pub fn read_i32(&mut self) -> Result<i32, KhmLoadError> {
        self.read_le()
    }

    /// A signed element count; negative values are rejected.
    pub fn read_count(&mut self, what: &'static str) -> Result<usize, KhmLoadError> {
        let offset = self.position;
        let count = self.read_i32()?;
        usize::try_from(count).map_err(|_| KhmLoadError::NegativeCount {
            what,
            count,
            offset,
        })
    }

    /// Decode a little-endian `binrw` structure at the cursor.
    pub fn read_le<T>(&mut self) -> Result<T, KhmLoadError>
    where
        T: for<'b> BinRead<Args<'b> = ()>,
    {
        let mut cursor = Cursor::new(&self.buffer[self.position..]);
        match T::read_options(&mut cursor, Endian::Little, ()) {
            Ok(value) => {
                self.position += cursor.position() as usize;
                Ok(value)
            }
            Err(err) => Err(KhmLoadError::from_binrw(err, self.position, self.remaining())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_bytes_advances() {
        let data = [1u8, 2, 3, 4, 5];
        let mut reader = KhmReader::new(&data);
        assert_eq!(reader.read_bytes(2).unwrap(), &[1, 2]);
        assert_eq!(reader.position(), 2);
        reader.skip(1).unwrap();
        assert_eq!(reader.read_bytes(2).unwrap(), &[4, 5]);
        assert_eq!(reader.remaining(), 0);
        assert_eq!(reader.read_bytes(0).unwrap(), &[] as &[u8]);
    }

    #[test]
    fn test_read_past_end_fails_without_advancing() {
        let data = [1u8, 2, 3];
        let mut reader = KhmReader::new(&data);
        reader.skip(1).unwrap();
        let err = reader.read_bytes(3).unwrap_err();
        assert!(matches!(
            err,
            KhmLoadError::TruncatedBuffer {
                offset: 1,
                remaining: 2
            }
        ));
        assert_eq!(reader.position(), 1);
        assert!(reader.skip(usize::MAX).is_err());
        assert!(reader.read_span::<[f32; 3]>(usize::MAX / 4).is_err());
    }

    #[test]
    fn test_read_fixed_unaligned() {
        let mut data = vec![0u8];
        data.extend_from_slice(&0x1234_5678u32.to_le_bytes());
        data.extend_from_slice(&2.5f32.to_le_bytes());
        let mut reader = KhmReader::new(&data);
        assert!(!reader.read_flag().unwrap());
        assert_eq!(reader.read_u32().unwrap(), 0x1234_5678);
        assert_eq!(reader.read_le::<f32>().unwrap(), 2.5);
        assert!(matches!(
            reader.read_u32(),
            Err(KhmLoadError::TruncatedBuffer { offset: 9, .. })
        ));
    }

    #[test]
    fn test_negative_count() {
        let data = (-3i32).to_le_bytes();
        let mut reader = KhmReader::new(&data);
        assert!(matches!(
            reader.read_count("vertices"),
            Err(KhmLoadError::NegativeCount {
                what: "vertices",
                count: -3,
                offset: 0
            })
        ));
    }

    #[test]
    fn test_peek_is_clamped() {
        let data = [b'K', b'H'];
        let reader = KhmReader::new(&data);
        assert_eq!(reader.peek(4), b"KH");
    }
}
