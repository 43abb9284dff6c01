//! Reading MARC records from binary streams.
//!
//! This module provides [`MarcReader`] for reading ISO 2709 records one after
//! another from any source that implements [`std::io::Read`]. Records are
//! framed by the length in their leader; each one is then validated and
//! loaded by [`Record::load_record`].
//!
//! # Examples
//!
//! Reading records from a file:
//!
//! ```no_run
//! use marc_engine::MarcReader;
//! use std::fs::File;
//!
//! let file = File::open("records.mrc")?;
//! let mut reader = MarcReader::new(file);
//!
//! while let Some(mut record) = reader.read_record()? {
//!     if record.get_field(245, 0).is_ok() {
//!         println!("{:?}", record.get_subfield(b'a', 0).ok());
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Reading from a buffer:
//!
//! ```
//! use marc_engine::{MarcReader, Record};
//! use std::io::Cursor;
//!
//! let mut record = Record::new();
//! record.add_field(245)?;
//! record.add_subfield(b'a', b"Title")?;
//! let bytes = record.to_bytes()?;
//!
//! let mut reader = MarcReader::new(Cursor::new(bytes));
//! assert!(reader.read_record()?.is_some());
//! assert!(reader.read_record()?.is_none());
//! # Ok::<(), marc_engine::MarcError>(())
//! ```

use crate::config::EngineConfig;
use crate::error::{MarcError, Result};
use crate::leader::Leader;
use crate::record::Record;
use crate::{LEADER_LEN, RECORD_TERMINATOR};
use std::io::{ErrorKind, Read};

/// Reader for ISO 2709 binary MARC streams.
///
/// `MarcReader` reads one record at a time. End of input on a record boundary
/// is `Ok(None)`; end of input inside a record is an error.
#[derive(Debug)]
pub struct MarcReader<R: Read> {
    reader: R,
    config: EngineConfig,
    records_read: usize,
}

impl<R: Read> MarcReader<R> {
    /// Create a new reader producing records with the default configuration.
    ///
    /// # Arguments
    ///
    /// * `reader` - Any source implementing [`std::io::Read`]
    pub fn new(reader: R) -> Self {
        MarcReader {
            reader,
            config: EngineConfig::default(),
            records_read: 0,
        }
    }

    /// Produce records built with `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate.
    pub fn with_config(mut self, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Read the next record's bytes without parsing them.
    ///
    /// The leader length frames the record; nothing else is interpreted
    /// beyond the trailing record terminator.
    ///
    /// # Errors
    ///
    /// - [`MarcError::TruncatedRecord`] if input ends inside a record
    /// - [`MarcError::BadRecordLength`] if the leader length is not usable
    /// - [`MarcError::BadRecordTerminator`] if the last byte is not 0x1D
    /// - [`MarcError::IoError`] for failures of the underlying reader
    pub fn read_raw(&mut self) -> Result<Option<Vec<u8>>> {
        let mut leader = [0u8; LEADER_LEN];
        match self.fill(&mut leader)? {
            0 => return Ok(None),
            LEADER_LEN => {},
            partial => {
                return Err(MarcError::TruncatedRecord(format!(
                    "input ended after {partial} leader bytes"
                )))
            },
        }

        let length = Leader::from(leader).record_length()?;
        if length < LEADER_LEN + 2 {
            return Err(MarcError::BadRecordLength(format!(
                "record length {length} is below the minimum of {}",
                LEADER_LEN + 2
            )));
        }

        let mut bytes = vec![0u8; length];
        bytes[..LEADER_LEN].copy_from_slice(&leader);
        match self.reader.read_exact(&mut bytes[LEADER_LEN..]) {
            Ok(()) => {},
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(MarcError::TruncatedRecord(format!(
                    "input ended inside a record of {length} bytes"
                )));
            },
            Err(e) => return Err(MarcError::IoError(e)),
        }
        let last = bytes[length - 1];
        if last != RECORD_TERMINATOR {
            return Err(MarcError::BadRecordTerminator { found: last });
        }
        Ok(Some(bytes))
    }

    /// Read and parse the next record.
    ///
    /// # Errors
    ///
    /// As for [`MarcReader::read_raw`] and [`Record::load_record`].
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        let Some(bytes) = self.read_raw()? else {
            return Ok(None);
        };
        let record = Record::from_bytes_with_config(&bytes, &self.config)?;
        self.records_read += 1;
        Ok(Some(record))
    }

    /// Read the next record into an existing one, reusing its buffers.
    /// Returns `false` at end of input.
    ///
    /// # Errors
    ///
    /// As for [`MarcReader::read_record`]; `record` is unchanged on error.
    pub fn read_into(&mut self, record: &mut Record) -> Result<bool> {
        let Some(bytes) = self.read_raw()? else {
            return Ok(false);
        };
        record.load_record(&bytes)?;
        self.records_read += 1;
        Ok(true)
    }

    /// Records successfully read so far.
    #[must_use]
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    /// Fill `buf` as far as input allows; returns the bytes read.
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {},
                Err(e) => return Err(MarcError::IoError(e)),
            }
        }
        Ok(filled)
    }
}

impl<R: Read> Iterator for MarcReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}
