#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # marc-engine: an in-memory MARC record engine
//!
//! A [`Record`] holds one MARC (ISO 2709) record in its working form: a raw
//! byte buffer plus a field directory of offsets into it. Fields and subfields
//! can be added in any order, located by tag and occurrence, walked with a
//! cursor, renamed, and deleted. [`Record::get_record`] assembles the exact
//! wire format (leader, directory, data, terminators), sorting fields by tag on
//! the way out; [`Record::load_record`] validates and reconstitutes it.
//!
//! ## Quick Start
//!
//! ```
//! use marc_engine::Record;
//!
//! # fn main() -> marc_engine::Result<()> {
//! let mut record = Record::new();
//! record.add_field(245)?;
//! record.add_subfield(b'a', b"The Great Gatsby /")?;
//! record.add_subfield(b'c', b"F. Scott Fitzgerald.")?;
//! record.add_field(1)?;
//! record.add_subfield(0, b"ocm00012345")?;
//!
//! let bytes = record.get_record()?.to_vec();
//! assert_eq!(&bytes[20..24], b"4500");
//!
//! let mut copy = Record::from_bytes(&bytes)?;
//! copy.get_field(245, 0)?;
//! assert_eq!(copy.get_subfield(b'c', -1)?, b"F. Scott Fitzgerald.");
//! # Ok(())
//! # }
//! ```
//!
//! ## Borrowed views
//!
//! Methods such as [`Record::get_subfield`] and [`Record::current_field_data`]
//! return slices into the record's buffers. Any mutating call may move or
//! reallocate those buffers, so the borrow checker ends the view at the next
//! mutation; re-fetch after changing the record.
//!
//! ## Modules
//!
//! - [`record`] — The [`Record`] aggregate and its field/subfield API
//! - [`cursor`] — Sequential navigation and saved positions
//! - [`assembler`] — Serialization to the wire format
//! - [`parser`] — Validation and loading of serialized records
//! - [`directory`] — Field descriptors
//! - [`subfields`] — Per-field subfield descriptors
//! - [`buffer`] — The raw byte arena
//! - [`collation`] — Subfield sort ranks
//! - [`leader`] — The 24-byte leader
//! - [`reader`] / [`writer`] — Sequential record files
//! - [`config`] — Engine configuration
//! - [`error`] — Error types and result type

pub mod assembler;
pub mod buffer;
pub mod collation;
pub mod config;
pub mod cursor;
pub mod directory;
pub mod error;
pub mod leader;
pub mod parser;
pub mod reader;
pub mod record;
pub mod subfields;
pub mod writer;

pub use buffer::RawBuffer;
pub use collation::CollationTable;
pub use config::{EngineConfig, SortOptions};
pub use cursor::Item;
pub use directory::{FieldDirectory, FieldEntry};
pub use error::{ErrorClass, MarcError, Result};
pub use leader::Leader;
pub use reader::MarcReader;
pub use record::{FieldView, FixedRead, Indicator, Record, SubfieldView};
pub use subfields::{SubfieldDirectory, SubfieldEntry};
pub use writer::MarcWriter;

/// Subfield delimiter (0x1F).
pub const SUBFIELD_DELIMITER: u8 = 0x1F;
/// Field terminator (0x1E); ends every field body and the directory.
pub const FIELD_TERMINATOR: u8 = 0x1E;
/// Record terminator (0x1D); ends the record.
pub const RECORD_TERMINATOR: u8 = 0x1D;
/// Fill byte used to pad fixed fields.
pub const FILL_CHAR: u8 = b'|';
/// Length of the leader.
pub const LEADER_LEN: usize = 24;
/// Length of one directory entry: tag(3) + length(4) + offset(5).
pub const DIRECTORY_ENTRY_LEN: usize = 12;
/// Largest logical record length the 5-digit leader field can express.
pub const MAX_RECORD_LENGTH: usize = 99_999;
/// Largest field length (terminator included) the 4-digit directory field can express.
pub const MAX_FIELD_LENGTH: usize = 9_999;
/// Highest legal tag.
pub const MAX_TAG: u16 = 999;
/// Tags below this are fixed fields.
pub const FIXED_FIELD_LIMIT: u16 = 10;
