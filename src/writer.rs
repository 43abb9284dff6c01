//! Writing MARC records to binary streams.
//!
//! This module provides [`MarcWriter`] for writing assembled ISO 2709 records
//! to any destination implementing [`std::io::Write`].
//!
//! # Examples
//!
//! ```
//! use marc_engine::{MarcWriter, Record};
//!
//! # fn main() -> marc_engine::Result<()> {
//! let mut buffer = Vec::new();
//! let mut writer = MarcWriter::new(&mut buffer);
//!
//! let mut record = Record::new();
//! record.add_field(245)?;
//! record.add_subfield(b'a', b"Title")?;
//! writer.write_record(&mut record)?;
//! writer.finish()?;
//!
//! assert_eq!(writer.records_written(), 1);
//! # Ok(())
//! # }
//! ```

use crate::error::{MarcError, Result};
use crate::leader::Leader;
use crate::record::Record;
use std::io::Write;

/// Writer for ISO 2709 binary MARC streams.
#[derive(Debug)]
pub struct MarcWriter<W: Write> {
    writer: W,
    records_written: usize,
    finished: bool,
}

impl<W: Write> MarcWriter<W> {
    /// Create a new MARC writer.
    ///
    /// # Arguments
    ///
    /// * `writer` - Any destination implementing [`std::io::Write`]
    pub fn new(writer: W) -> Self {
        MarcWriter {
            writer,
            records_written: 0,
            finished: false,
        }
    }

    /// Assemble `record` and write it.
    ///
    /// Assembly goes through [`Record::get_record`], so the record's own
    /// output buffer is reused between calls.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The writer has been finished
    /// - The record cannot be assembled
    /// - An I/O error occurs during writing
    pub fn write_record(&mut self, record: &mut Record) -> Result<()> {
        self.check_open()?;
        let bytes = record.get_record()?;
        self.writer.write_all(bytes)?;
        self.records_written += 1;
        Ok(())
    }

    /// Write an already serialized record, framed by the length in its leader.
    ///
    /// Bytes past that length are not written. The record is not otherwise
    /// validated.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer has been finished, the leader length is
    /// not numeric, `bytes` is shorter than it claims, or writing fails.
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.check_open()?;
        let length = Leader::from_bytes(bytes)?.record_length()?;
        let record = bytes.get(..length).ok_or_else(|| {
            MarcError::TruncatedRecord(format!(
                "leader declares {length} bytes, only {} supplied",
                bytes.len()
            ))
        })?;
        self.writer.write_all(record)?;
        self.records_written += 1;
        Ok(())
    }

    /// Flush the writer and mark it as finished.
    ///
    /// After calling `finish`, no more records can be written.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing the underlying writer fails.
    pub fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.finished = true;
        Ok(())
    }

    /// Returns the number of records written so far.
    #[must_use]
    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Recover the underlying destination.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn check_open(&self) -> Result<()> {
        if self.finished {
            Err(MarcError::WriterFinished)
        } else {
            Ok(())
        }
    }
}
