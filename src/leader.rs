//! MARC record leader.
//!
//! The leader is the 24-byte fixed-length header at the start of every MARC record.
//! The engine itself only interprets two of its fields; everything else carries
//! record-type semantics for callers.
//!
//! # Structure
//!
//! - Positions 0-4: Record length (5 digits)
//! - Position 5: Record status
//! - Position 6: Record type (a = language material, c = music, etc.)
//! - Position 7: Bibliographic level (m = monograph, s = serial, etc.)
//! - Position 8: Control record type
//! - Position 9: Character coding (space = MARC-8, a = UTF-8)
//! - Position 10: Indicator count (usually 2)
//! - Position 11: Subfield code count (usually 2)
//! - Positions 12-16: Base address of data (5 digits)
//! - Positions 17-19: Encoding level, cataloging form, multipart level
//! - Positions 20-23: Entry map (usually "4500")

use crate::error::{MarcError, Result};
use crate::LEADER_LEN;

/// Leader given to newly created records.
pub const DEFAULT_LEADER: &[u8; LEADER_LEN] = b"00000nam  2200000   4500";

/// MARC Leader - 24 bytes at the start of every MARC record.
///
/// A thin view over the raw bytes. Accessors decode single positions; the two
/// numeric fields are decoded on demand so a leader with garbage in them can
/// still be held and inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Leader([u8; LEADER_LEN]);

impl Default for Leader {
    fn default() -> Self {
        Leader(*DEFAULT_LEADER)
    }
}

impl From<[u8; LEADER_LEN]> for Leader {
    fn from(bytes: [u8; LEADER_LEN]) -> Self {
        Leader(bytes)
    }
}

impl Leader {
    /// Build a leader from the first 24 bytes of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than 24 bytes are supplied.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < LEADER_LEN {
            return Err(MarcError::InvalidLeader(format!(
                "Leader must be at least 24 bytes, got {}",
                bytes.len()
            )));
        }
        let mut raw = [0u8; LEADER_LEN];
        raw.copy_from_slice(&bytes[..LEADER_LEN]);
        Ok(Leader(raw))
    }

    /// The raw 24 bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; LEADER_LEN] {
        &self.0
    }

    /// Logical record length from positions 0-4.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::BadRecordLength`] if the positions are not all digits.
    pub fn record_length(&self) -> Result<usize> {
        parse_digits(&self.0[0..5]).ok_or_else(|| {
            MarcError::BadRecordLength(format!(
                "'{}' is not a 5-digit number",
                String::from_utf8_lossy(&self.0[0..5])
            ))
        })
    }

    /// Base address of data from positions 12-16.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::BadBaseAddress`] if the positions are not all digits.
    pub fn base_address(&self) -> Result<usize> {
        parse_digits(&self.0[12..17]).ok_or_else(|| {
            MarcError::BadBaseAddress(format!(
                "'{}' is not a 5-digit number",
                String::from_utf8_lossy(&self.0[12..17])
            ))
        })
    }

    /// Record status (position 5)
    #[must_use]
    pub fn record_status(&self) -> char {
        char::from(self.0[5])
    }

    /// Type of record (position 6)
    #[must_use]
    pub fn record_type(&self) -> char {
        char::from(self.0[6])
    }

    /// Bibliographic level (position 7)
    #[must_use]
    pub fn bibliographic_level(&self) -> char {
        char::from(self.0[7])
    }

    /// Character coding scheme (position 9)
    #[must_use]
    pub fn character_coding(&self) -> char {
        char::from(self.0[9])
    }

    /// Encoding level (position 17)
    #[must_use]
    pub fn encoding_level(&self) -> char {
        char::from(self.0[17])
    }

    /// Entry map (positions 20-23)
    #[must_use]
    pub fn entry_map(&self) -> &[u8] {
        &self.0[20..24]
    }
}

/// Parse an all-digit ASCII field, rejecting any non-digit byte.
pub(crate) fn parse_digits(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() {
        return None;
    }
    let mut result = 0usize;
    for &byte in bytes {
        if !byte.is_ascii_digit() {
            return None;
        }
        result = result * 10 + usize::from(byte - b'0');
    }
    Some(result)
}

/// Write `value` zero-padded into `out`, which must be wide enough.
pub(crate) fn write_digits(out: &mut [u8], mut value: usize) {
    for slot in out.iter_mut().rev() {
        // value % 10 < 10, the cast cannot truncate
        #[allow(clippy::cast_possible_truncation)]
        let digit = (value % 10) as u8;
        *slot = b'0' + digit;
        value /= 10;
    }
}
