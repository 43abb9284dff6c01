//! Growable raw byte buffer backing a record.
//!
//! [`RawBuffer`] holds a record's working representation: the 24 leader bytes
//! followed by each field's body and field terminator, in directory order. There
//! is no directory and no record terminator in here; those only exist in the
//! assembled output.
//!
//! Descriptors elsewhere in the engine store offsets into this buffer, never
//! pointers. Every shift moves bytes under those offsets, and every real
//! reallocation bumps [`RawBuffer::generation`]; anything cached against an
//! older generation must be rebuilt.

use crate::error::{MarcError, Result};
use std::ops::Range;

/// Default growth increment in bytes.
pub const DEFAULT_GROWTH_INCREMENT: usize = 4096;

/// Growable byte arena with a fixed-increment growth policy.
#[derive(Debug, Clone)]
pub struct RawBuffer {
    data: Vec<u8>,
    increment: usize,
    generation: u64,
}

impl Default for RawBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_GROWTH_INCREMENT)
    }
}

impl RawBuffer {
    /// Create an empty buffer that grows `increment` bytes at a time.
    #[must_use]
    pub fn new(increment: usize) -> Self {
        RawBuffer {
            data: Vec::new(),
            increment: increment.max(1),
            generation: 0,
        }
    }

    /// Wrap existing bytes; later growth uses `increment`.
    #[must_use]
    pub fn from_vec(data: Vec<u8>, increment: usize) -> Self {
        RawBuffer {
            data,
            increment: increment.max(1),
            generation: 0,
        }
    }

    /// Number of bytes in use.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if no bytes are in use.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes allocated.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Reallocation counter; changes whenever the backing storage moved.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The bytes in use.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Bytes in `range`.
    ///
    /// # Panics
    ///
    /// Panics if `range` is out of bounds; callers pass descriptor ranges that
    /// the directory keeps inside the buffer.
    #[must_use]
    pub fn slice(&self, range: Range<usize>) -> &[u8] {
        &self.data[range]
    }

    /// Byte at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<u8> {
        self.data.get(index).copied()
    }

    /// Make room for at least `needed` bytes in total.
    ///
    /// Grows in whole increments. On failure the buffer keeps its old
    /// allocation and contents.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::Allocation`] if the allocator refuses.
    pub fn ensure_capacity(&mut self, needed: usize) -> Result<()> {
        let capacity = self.data.capacity();
        if needed <= capacity {
            return Ok(());
        }
        let steps = (needed - capacity + self.increment - 1) / self.increment;
        let target = capacity + steps * self.increment;
        let additional = target - self.data.len();
        self.data
            .try_reserve_exact(additional)
            .map_err(|_| MarcError::Allocation {
                requested: additional,
            })?;
        self.generation += 1;
        tracing::trace!(
            from = capacity,
            to = self.data.capacity(),
            generation = self.generation,
            "raw buffer grown"
        );
        Ok(())
    }

    /// Move every byte from `from` to the end by `delta` positions.
    ///
    /// A positive `delta` opens a zero-filled gap at `from..from + delta`; a
    /// negative one closes the gap `from - |delta|..from`. Cost is proportional
    /// to the length of the moved tail.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::Allocation`] if opening the gap needs memory that
    /// cannot be had, or [`MarcError::CorruptField`] if the range lies outside
    /// the buffer.
    pub fn shift(&mut self, from: usize, delta: isize) -> Result<()> {
        let len = self.data.len();
        if from > len {
            return Err(MarcError::CorruptField {
                tag: 0,
                reason: "shift origin beyond end of buffer",
            });
        }
        let amount = delta.unsigned_abs();
        if delta > 0 {
            self.ensure_capacity(len + amount)?;
            self.data.resize(len + amount, 0);
            self.data.copy_within(from..len, from + amount);
            self.data[from..from + amount].fill(0);
        } else if delta < 0 {
            if amount > from {
                return Err(MarcError::CorruptField {
                    tag: 0,
                    reason: "shift would move bytes before start of buffer",
                });
            }
            self.data.copy_within(from..len, from - amount);
            self.data.truncate(len - amount);
        }
        Ok(())
    }

    /// Insert `bytes` at `at`, moving the tail up.
    ///
    /// # Errors
    ///
    /// See [`RawBuffer::shift`].
    pub fn insert(&mut self, at: usize, bytes: &[u8]) -> Result<()> {
        self.shift(at, to_delta(bytes.len()))?;
        self.data[at..at + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Remove `count` bytes starting at `at`, moving the tail down.
    ///
    /// # Errors
    ///
    /// See [`RawBuffer::shift`].
    pub fn remove(&mut self, at: usize, count: usize) -> Result<()> {
        self.shift(at + count, -to_delta(count))
    }

    /// Overwrite bytes starting at `at`; the range must already exist.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::CorruptField`] if the range is out of bounds.
    pub fn overwrite(&mut self, at: usize, bytes: &[u8]) -> Result<()> {
        let end = at + bytes.len();
        let target = self.data.get_mut(at..end).ok_or(MarcError::CorruptField {
            tag: 0,
            reason: "overwrite beyond end of buffer",
        })?;
        target.copy_from_slice(bytes);
        Ok(())
    }

    /// Append bytes at the end.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::Allocation`] if the buffer cannot grow.
    pub fn extend(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure_capacity(self.data.len() + bytes.len())?;
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Drop all bytes, keeping the allocation.
    pub fn clear(&mut self) {
        self.data.clear();
    }
}

/// Byte counts in a record are bounded far below `isize::MAX`.
#[allow(clippy::cast_possible_wrap)]
pub(crate) fn to_delta(count: usize) -> isize {
    count as isize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth_is_incremental() {
        let mut buffer = RawBuffer::new(16);
        buffer.ensure_capacity(10).unwrap();
        assert!(buffer.capacity() >= 16);
        assert_eq!(buffer.generation(), 1);

        // Already satisfied, no reallocation.
        buffer.ensure_capacity(12).unwrap();
        assert_eq!(buffer.generation(), 1);

        buffer.ensure_capacity(40).unwrap();
        assert!(buffer.capacity() >= 40);
        assert_eq!(buffer.generation(), 2);
    }

    #[test]
    fn test_shift_opens_and_closes_gap() {
        let mut buffer = RawBuffer::new(8);
        buffer.extend(b"abcdef").unwrap();

        buffer.shift(2, 3).unwrap();
        assert_eq!(buffer.as_slice(), b"ab\0\0\0cdef");

        buffer.shift(5, -3).unwrap();
        assert_eq!(buffer.as_slice(), b"abcdef");
    }

    #[test]
    fn test_shift_at_end() {
        let mut buffer = RawBuffer::new(8);
        buffer.extend(b"abc").unwrap();
        buffer.shift(3, 2).unwrap();
        assert_eq!(buffer.len(), 5);
        buffer.shift(5, -2).unwrap();
        assert_eq!(buffer.as_slice(), b"abc");
    }

    #[test]
    fn test_shift_out_of_range() {
        let mut buffer = RawBuffer::new(8);
        buffer.extend(b"abc").unwrap();
        assert!(buffer.shift(4, 1).is_err());
        assert!(buffer.shift(1, -2).is_err());
        assert_eq!(buffer.as_slice(), b"abc");
    }

    #[test]
    fn test_insert_remove_overwrite() {
        let mut buffer = RawBuffer::default();
        buffer.extend(b"leader").unwrap();
        buffer.insert(3, b"XYZ").unwrap();
        assert_eq!(buffer.as_slice(), b"leaXYZder");
        buffer.remove(3, 3).unwrap();
        assert_eq!(buffer.as_slice(), b"leader");
        buffer.overwrite(0, b"LE").unwrap();
        assert_eq!(buffer.as_slice(), b"LEader");
        assert!(buffer.overwrite(5, b"xx").is_err());
    }
}
