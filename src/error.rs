//! Error types for MARC record engine operations.
//!
//! This module provides the [`MarcError`] type for all engine operations
//! and the [`Result`] convenience type.
//!
//! Errors fall into three classes (see [`ErrorClass`]):
//!
//! - **Not found**: the field, subfield, occurrence, or position asked for is
//!   absent. These are routine; callers branch on them ("does 022 exist?").
//! - **Validation**: the caller supplied something illegal (bad tag, bad
//!   subfield code, control byte in data, malformed collation string). The
//!   record is left unchanged.
//! - **Structural**: a control structure is corrupt or exhausted, or the
//!   serialized form is malformed. The record being processed should not be
//!   used further.

use thiserror::Error;

/// Severity class of a [`MarcError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Expected, recoverable absence of something.
    NotFound,
    /// Illegal input rejected before any mutation took place.
    Validation,
    /// Corrupted or exhausted control structure, or malformed wire data.
    Structural,
}

/// Error type for all MARC record engine operations.
#[derive(Error, Debug)]
pub enum MarcError {
    /// No field with this tag exists.
    #[error("Field {tag:03} not found")]
    FieldNotFound {
        /// Requested tag
        tag: u16,
    },

    /// The tag exists but not with the requested occurrence.
    #[error("Field {tag:03} occurrence {occurrence} not found ({available} present)")]
    OccurrenceNotFound {
        /// Requested tag
        tag: u16,
        /// Requested occurrence (negative counts from the last)
        occurrence: i32,
        /// Number of occurrences actually present
        available: usize,
    },

    /// No subfield with this code exists in the current field.
    #[error("Subfield ${} not found in field {tag:03}", char::from(*.code))]
    SubfieldNotFound {
        /// Tag of the current field
        tag: u16,
        /// Requested subfield code
        code: u8,
    },

    /// The subfield code exists but not with the requested occurrence.
    #[error("Subfield ${} occurrence {occurrence} not found in field {tag:03} ({available} present)", char::from(*.code))]
    SubfieldOccurrenceNotFound {
        /// Tag of the current field
        tag: u16,
        /// Requested subfield code
        code: u8,
        /// Requested occurrence (negative counts from the last)
        occurrence: i32,
        /// Number of occurrences actually present
        available: usize,
    },

    /// The current variable field has indicators but no subfields.
    #[error("Field {tag:03} has no subfields")]
    EmptyField {
        /// Tag of the empty field
        tag: u16,
    },

    /// A fixed-field byte offset lies at or past the end of the field.
    #[error("Offset {offset} is beyond the {length} bytes of field {tag:03}")]
    FixedOffsetOutOfRange {
        /// Tag of the fixed field
        tag: u16,
        /// Requested offset
        offset: usize,
        /// Current field length
        length: usize,
    },

    /// A sequential walk ran off either end of the record or field.
    #[error("End of record")]
    EndOfRecord,

    /// An operation needs a current field but the cursor is not on one.
    #[error("No current field")]
    NoCurrentField,

    /// An operation needs a current subfield but the cursor is not on one.
    #[error("No current subfield")]
    NoCurrentSubfield,

    /// `restore_position` was called with nothing saved.
    #[error("No saved position to restore")]
    NoSavedPosition,

    /// The field a saved position pointed at was deleted.
    #[error("No matching saved position: field was deleted")]
    SavedFieldDeleted,

    /// Tag outside 0-999, or an illegal tag change.
    #[error("Invalid tag {tag}: {reason}")]
    InvalidTag {
        /// Offending tag
        tag: u16,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Fixed fields (tags below 010) may occur only once.
    #[error("Fixed field {tag:03} already present")]
    FixedFieldRepeated {
        /// Offending tag
        tag: u16,
    },

    /// Mutation attempted on a read-only duplicate.
    #[error("Record is read-only")]
    ReadOnly,

    /// The leader entry cannot be deleted.
    #[error("The leader cannot be deleted")]
    LeaderDeletion,

    /// A subfield operation was attempted on a fixed field (or vice versa).
    #[error("Operation not supported on field {tag:03}")]
    NotVariableField {
        /// Tag of the current field
        tag: u16,
    },

    /// The current subfield is one of the two indicator slots.
    #[error("Subfield ordinal {ordinal} is an indicator slot")]
    IndicatorSlot {
        /// Current subfield ordinal (0 or 1)
        ordinal: usize,
    },

    /// Subfield code fails the legality rule.
    #[error("Invalid subfield code 0x{code:02X}")]
    InvalidSubfieldCode {
        /// Offending code
        code: u8,
    },

    /// Subfield or fixed-field data contains NUL or a MARC control byte.
    #[error("Illegal byte 0x{byte:02X} at position {position} of data")]
    InvalidData {
        /// Offending byte
        byte: u8,
        /// Position within the supplied data
        position: usize,
    },

    /// A fixed-field write would run past the largest field a record can hold.
    #[error("Write of {length} bytes at offset {offset} exceeds the limit of field {tag:03}")]
    FixedWriteTooLong {
        /// Tag of the fixed field
        tag: u16,
        /// Requested offset
        offset: usize,
        /// Bytes to write
        length: usize,
    },

    /// Indicator value outside printable ASCII.
    #[error("Invalid indicator value 0x{value:02X}")]
    InvalidIndicator {
        /// Offending value
        value: u8,
    },

    /// Collation string could not be parsed.
    #[error("Invalid collation string: {0}")]
    InvalidCollation(String),

    /// Configuration value out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Leader content or leader write is invalid.
    #[error("Invalid leader: {0}")]
    InvalidLeader(String),

    /// The field directory is at its maximum capacity.
    #[error("Field directory full ({capacity} entries)")]
    DirectoryFull {
        /// Directory capacity
        capacity: usize,
    },

    /// The save-position stack is at its maximum depth.
    #[error("Position stack full ({depth} entries)")]
    PositionStackFull {
        /// Stack depth
        depth: usize,
    },

    /// Growing a buffer failed.
    #[error("Allocation of {requested} bytes failed")]
    Allocation {
        /// Bytes requested beyond the current length
        requested: usize,
    },

    /// Field bytes do not follow the indicator/delimiter layout.
    #[error("Corrupt field {tag:03}: {reason}")]
    CorruptField {
        /// Tag of the corrupt field
        tag: u16,
        /// What was wrong
        reason: &'static str,
    },

    /// A field is too long for the 4-digit directory length.
    #[error("Field {tag:03} length {length} exceeds 9999")]
    FieldTooLong {
        /// Tag of the field
        tag: u16,
        /// Length including terminator
        length: usize,
    },

    /// The assembled record would exceed the 5-digit record length.
    #[error("Record length {length} exceeds maximum {max}")]
    RecordTooLong {
        /// Computed logical record length
        length: usize,
        /// Format maximum
        max: usize,
    },

    /// Leader bytes 0-4 are not a usable decimal record length.
    #[error("Bad record length field: {0}")]
    BadRecordLength(String),

    /// The byte at `length - 1` is not the record terminator.
    #[error("Bad record terminator 0x{found:02X}")]
    BadRecordTerminator {
        /// Byte found in place of the terminator
        found: u8,
    },

    /// Leader bytes 12-16 are not a usable base address of data.
    #[error("Bad base address field: {0}")]
    BadBaseAddress(String),

    /// The byte before the base address is not the field terminator.
    #[error("Bad directory terminator 0x{found:02X}")]
    BadDirectoryTerminator {
        /// Byte found in place of the terminator
        found: u8,
    },

    /// The packed directory contains non-digits or is misaligned.
    #[error("Bad directory: {0}")]
    BadDirectory(String),

    /// Directory lengths disagree with the data area actually present.
    #[error("Length mismatch: directory accounts for {directory} bytes, data area holds {data}")]
    LengthMismatch {
        /// Bytes accounted for by the directory
        directory: usize,
        /// Bytes present in the data area
        data: usize,
    },

    /// The input ended before the declared record length.
    #[error("Truncated record: {0}")]
    TruncatedRecord(String),

    /// A record was written after [`MarcWriter::finish`](crate::MarcWriter::finish).
    #[error("Cannot write to a finished writer")]
    WriterFinished,

    /// IO error from the underlying source/destination.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl MarcError {
    /// Severity class of this error.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::FieldNotFound { .. }
            | Self::OccurrenceNotFound { .. }
            | Self::SubfieldNotFound { .. }
            | Self::SubfieldOccurrenceNotFound { .. }
            | Self::EmptyField { .. }
            | Self::FixedOffsetOutOfRange { .. }
            | Self::EndOfRecord
            | Self::NoCurrentField
            | Self::NoCurrentSubfield
            | Self::NoSavedPosition
            | Self::SavedFieldDeleted => ErrorClass::NotFound,
            Self::InvalidTag { .. }
            | Self::FixedFieldRepeated { .. }
            | Self::ReadOnly
            | Self::LeaderDeletion
            | Self::NotVariableField { .. }
            | Self::IndicatorSlot { .. }
            | Self::InvalidSubfieldCode { .. }
            | Self::InvalidData { .. }
            | Self::FixedWriteTooLong { .. }
            | Self::InvalidIndicator { .. }
            | Self::InvalidCollation(_)
            | Self::InvalidConfig(_)
            | Self::InvalidLeader(_)
            | Self::WriterFinished => ErrorClass::Validation,
            Self::DirectoryFull { .. }
            | Self::PositionStackFull { .. }
            | Self::Allocation { .. }
            | Self::CorruptField { .. }
            | Self::FieldTooLong { .. }
            | Self::RecordTooLong { .. }
            | Self::BadRecordLength(_)
            | Self::BadRecordTerminator { .. }
            | Self::BadBaseAddress(_)
            | Self::BadDirectoryTerminator { .. }
            | Self::BadDirectory(_)
            | Self::LengthMismatch { .. }
            | Self::TruncatedRecord(_)
            | Self::IoError(_) => ErrorClass::Structural,
        }
    }

    /// True for routine "not present" outcomes.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.class() == ErrorClass::NotFound
    }

    /// True for errors after which the record must not be used further.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        self.class() == ErrorClass::Structural
    }
}

/// Convenience type alias for [`std::result::Result`] with [`MarcError`].
pub type Result<T> = std::result::Result<T, MarcError>;
