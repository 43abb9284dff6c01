//! Validation and loading of serialized records.
//!
//! [`Record::load_record`] checks a wire-format record from the outside in:
//! record length, record terminator, base address, directory terminator,
//! directory characters, then each directory entry against the data area. Each
//! failure has its own [`MarcError`] variant, so callers can tell input that is
//! not MARC at all from input that was cut short or hand-edited.
//!
//! Loading is all-or-nothing. The new raw buffer and directory are built on the
//! side and only replace the record's contents once every check has passed.

use crate::buffer::RawBuffer;
use crate::config::EngineConfig;
use crate::cursor::Cursor;
use crate::directory::FieldDirectory;
use crate::error::{MarcError, Result};
use crate::leader::parse_digits;
use crate::record::Record;
use crate::{
    DIRECTORY_ENTRY_LEN, FIELD_TERMINATOR, FIXED_FIELD_LIMIT, LEADER_LEN, RECORD_TERMINATOR,
};

/// Smallest possible record: leader, directory terminator, record terminator.
const MIN_RECORD_LEN: usize = LEADER_LEN + 2;

/// One decoded directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DirectoryEntry {
    tag: u16,
    /// Length including the field terminator.
    length: usize,
    /// Offset from the base address.
    offset: usize,
}

/// Decode and check the packed directory.
fn parse_directory(directory: &[u8]) -> Result<Vec<DirectoryEntry>> {
    if let Some(position) = directory.iter().position(|byte| !byte.is_ascii_digit()) {
        return Err(MarcError::BadDirectory(format!(
            "non-digit byte 0x{:02X} at directory position {position}",
            directory[position]
        )));
    }
    if directory.len() % DIRECTORY_ENTRY_LEN != 0 {
        return Err(MarcError::BadDirectory(format!(
            "directory length {} is not a multiple of {DIRECTORY_ENTRY_LEN}",
            directory.len()
        )));
    }

    directory
        .chunks_exact(DIRECTORY_ENTRY_LEN)
        .enumerate()
        .map(|(index, chunk)| {
            // All digits, so every parse succeeds.
            let tag = parse_digits(&chunk[0..3]).unwrap_or_default();
            let length = parse_digits(&chunk[3..7]).unwrap_or_default();
            let offset = parse_digits(&chunk[7..12]).unwrap_or_default();
            if tag == 0 {
                return Err(MarcError::BadDirectory(format!(
                    "entry {index} uses the reserved tag 000"
                )));
            }
            if length == 0 {
                return Err(MarcError::BadDirectory(format!(
                    "entry {index} (tag {tag:03}) has zero length"
                )));
            }
            #[allow(clippy::cast_possible_truncation)]
            let tag = tag as u16;
            Ok(DirectoryEntry {
                tag,
                length,
                offset,
            })
        })
        .collect()
}

impl Record {
    /// Parse a wire-format record with the default configuration.
    ///
    /// ```
    /// use marc_engine::Record;
    ///
    /// let bytes = b"00044nam  2200037   4500245000600000\x1e  \x1faT\x1e\x1d";
    /// let mut record = Record::from_bytes(bytes)?;
    /// record.get_field(245, 0)?;
    /// assert_eq!(record.get_subfield(b'a', 0)?, b"T");
    /// # Ok::<(), marc_engine::MarcError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// As for [`Record::load_record`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut record = Record::new();
        record.load_record(bytes)?;
        Ok(record)
    }

    /// Parse a wire-format record into a record built with `config`.
    ///
    /// # Errors
    ///
    /// As for [`Record::with_config`] and [`Record::load_record`].
    pub fn from_bytes_with_config(bytes: &[u8], config: &EngineConfig) -> Result<Self> {
        let mut record = Record::with_config(config)?;
        record.load_record(bytes)?;
        Ok(record)
    }

    /// Replace this record's contents with a parsed wire-format record;
    /// returns the record length consumed from `bytes`.
    ///
    /// Bytes past the logical record length are ignored. On success the
    /// cursor, subfield cache, and saved positions are reset; on failure the
    /// record is left exactly as it was.
    ///
    /// # Errors
    ///
    /// - [`MarcError::ReadOnly`] on a duplicate
    /// - [`MarcError::TruncatedRecord`] if fewer bytes than the leader or the
    ///   declared record length are available
    /// - [`MarcError::BadRecordLength`] if positions 0-4 are not digits or
    ///   declare an impossible length
    /// - [`MarcError::BadRecordTerminator`] if the last byte is not 0x1D
    /// - [`MarcError::BadBaseAddress`] if positions 12-16 are not digits or
    ///   point outside the record
    /// - [`MarcError::BadDirectoryTerminator`] if the directory is not closed by 0x1E
    /// - [`MarcError::BadDirectory`] for non-digit, misaligned, out-of-range, or
    ///   overlapping entries
    /// - [`MarcError::DirectoryFull`] if there are more fields than the directory holds
    /// - [`MarcError::LengthMismatch`] if the entry lengths do not add up to the data area
    /// - [`MarcError::CorruptField`] if a field does not end with 0x1E, or a
    ///   variable field is too short to hold its indicators
    pub fn load_record(&mut self, bytes: &[u8]) -> Result<usize> {
        self.check_writable()?;

        if bytes.len() < LEADER_LEN {
            return Err(MarcError::TruncatedRecord(format!(
                "{} bytes is shorter than the leader",
                bytes.len()
            )));
        }
        let length = parse_digits(&bytes[0..5]).ok_or_else(|| {
            MarcError::BadRecordLength(format!(
                "non-digit record length {:?}",
                String::from_utf8_lossy(&bytes[0..5])
            ))
        })?;
        if length < MIN_RECORD_LEN {
            return Err(MarcError::BadRecordLength(format!(
                "record length {length} is below the minimum of {MIN_RECORD_LEN}"
            )));
        }
        if bytes.len() < length {
            return Err(MarcError::TruncatedRecord(format!(
                "leader declares {length} bytes, only {} available",
                bytes.len()
            )));
        }
        let bytes = &bytes[..length];

        let last = bytes[length - 1];
        if last != RECORD_TERMINATOR {
            return Err(MarcError::BadRecordTerminator { found: last });
        }

        let base = parse_digits(&bytes[12..17]).ok_or_else(|| {
            MarcError::BadBaseAddress(format!(
                "non-digit base address {:?}",
                String::from_utf8_lossy(&bytes[12..17])
            ))
        })?;
        if base <= LEADER_LEN || base >= length {
            return Err(MarcError::BadBaseAddress(format!(
                "base address {base} outside {}..{length}",
                LEADER_LEN + 1
            )));
        }
        let terminator = bytes[base - 1];
        if terminator != FIELD_TERMINATOR {
            return Err(MarcError::BadDirectoryTerminator { found: terminator });
        }

        let entries = parse_directory(&bytes[LEADER_LEN..base - 1])?;
        if entries.len() > self.fields.capacity() {
            return Err(MarcError::DirectoryFull {
                capacity: self.fields.capacity(),
            });
        }

        let data = &bytes[base..length - 1];
        let declared: usize = entries.iter().map(|entry| entry.length).sum();
        if declared != data.len() {
            return Err(MarcError::LengthMismatch {
                directory: declared,
                data: data.len(),
            });
        }

        let mut raw = Vec::with_capacity(LEADER_LEN + 1 + data.len());
        raw.extend_from_slice(&bytes[..LEADER_LEN]);
        raw.push(FIELD_TERMINATOR);
        let mut fields = FieldDirectory::new(self.fields.capacity());
        let mut expected_offset = 0;
        let mut fixed_seen = [false; FIXED_FIELD_LIMIT as usize];
        let mut spans = Vec::with_capacity(entries.len());

        for entry in &entries {
            let end = entry.offset + entry.length;
            if end > data.len() {
                return Err(MarcError::BadDirectory(format!(
                    "field {:03} at {}+{} runs past the data area ({} bytes)",
                    entry.tag,
                    entry.offset,
                    entry.length,
                    data.len()
                )));
            }
            if data[end - 1] != FIELD_TERMINATOR {
                return Err(MarcError::CorruptField {
                    tag: entry.tag,
                    reason: "field does not end with a field terminator",
                });
            }
            if entry.tag >= FIXED_FIELD_LIMIT && entry.length < 3 {
                return Err(MarcError::CorruptField {
                    tag: entry.tag,
                    reason: "missing indicators",
                });
            }
            if entry.offset != expected_offset {
                tracing::warn!(
                    tag = entry.tag,
                    offset = entry.offset,
                    expected = expected_offset,
                    "directory entry out of data order"
                );
            }
            expected_offset = end;
            spans.push((entry.offset, end, entry.tag));
            if let Some(seen) = fixed_seen.get_mut(usize::from(entry.tag)) {
                if *seen {
                    tracing::warn!(tag = entry.tag, "repeated fixed field");
                }
                *seen = true;
            }

            let body = &data[entry.offset..end - 1];
            let offset = raw.len();
            raw.extend_from_slice(body);
            raw.push(FIELD_TERMINATOR);
            fields.push(entry.tag, offset, body.len())?;
        }

        spans.sort_unstable();
        if let Some(pair) = spans.windows(2).find(|pair| pair[1].0 < pair[0].1) {
            return Err(MarcError::BadDirectory(format!(
                "field {:03} at {} overlaps field {:03} ending at {}",
                pair[1].2, pair[1].0, pair[0].2, pair[0].1
            )));
        }

        self.raw = RawBuffer::from_vec(raw, self.config.growth_increment);
        self.fields = fields;
        self.subfields.invalidate();
        self.cursor = Cursor::default();
        self.positions.clear();

        tracing::debug!(fields = entries.len(), length, "record parsed");
        Ok(length)
    }
}
