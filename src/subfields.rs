//! Per-field subfield directory.
//!
//! A variable field's body is two indicator bytes followed by zero or more
//! `0x1F <code> <data>` groups. [`scan_field`] turns such a body into a list of
//! [`SubfieldEntry`] descriptors: two synthetic indicator entries at ordinals 0
//! and 1, then one entry per delimited subfield, each carrying its collation
//! rank and insertion order.
//!
//! [`SubfieldDirectory`] caches the scan for one field at a time. It records
//! which field it was built for; any mutation of the record clears that tag, and
//! the next subfield access rebuilds it.

use crate::collation::CollationTable;
use crate::error::{MarcError, Result};
use crate::{FIELD_TERMINATOR, RECORD_TERMINATOR, SUBFIELD_DELIMITER};
use smallvec::SmallVec;

/// Code stored on the synthetic entry for indicator 1.
pub const INDICATOR1_CODE: u8 = 0;
/// Code stored on the synthetic entry for indicator 2.
pub const INDICATOR2_CODE: u8 = 1;
/// Ordinal of the first real subfield.
pub const FIRST_SUBFIELD: usize = 2;

/// Inline storage for a field's subfield list.
pub type SubfieldList = SmallVec<[SubfieldEntry; 16]>;

/// Descriptor of one subfield (or indicator slot) in the raw buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubfieldEntry {
    /// Subfield code; [`INDICATOR1_CODE`]/[`INDICATOR2_CODE`] for the indicator slots.
    pub code: u8,
    /// Absolute raw-buffer offset of the data (after delimiter and code).
    pub start: usize,
    /// Data length in bytes.
    pub length: usize,
    /// Collation rank of `code`.
    pub rank: u8,
    /// Position in the field as stored.
    pub order: u16,
}

impl SubfieldEntry {
    /// Raw-buffer range of the whole group: delimiter, code, and data.
    /// For indicator slots this is just the indicator byte.
    #[must_use]
    pub fn span(&self, ordinal: usize) -> std::ops::Range<usize> {
        if ordinal < FIRST_SUBFIELD {
            self.start..self.start + 1
        } else {
            self.start - 2..self.start + self.length
        }
    }
}

/// True if `code` may be used as a subfield code.
///
/// The default rule accepts any printable, non-space ASCII byte (33-126). With
/// the `strict-subfield-codes` feature only `a-z` and `0-9` pass.
#[must_use]
pub fn is_legal_subfield_code(code: u8) -> bool {
    if cfg!(feature = "strict-subfield-codes") {
        code.is_ascii_lowercase() || code.is_ascii_digit()
    } else {
        (33..=126).contains(&code)
    }
}

/// Validate a subfield code.
///
/// # Errors
///
/// Returns [`MarcError::InvalidSubfieldCode`] if the code fails the legality rule.
pub fn check_subfield_code(code: u8) -> Result<()> {
    if is_legal_subfield_code(code) {
        Ok(())
    } else {
        Err(MarcError::InvalidSubfieldCode { code })
    }
}

/// Validate subfield or fixed-field content.
///
/// # Errors
///
/// Returns [`MarcError::InvalidData`] at the first NUL, subfield delimiter,
/// field terminator, or record terminator.
pub fn check_data(data: &[u8]) -> Result<()> {
    match memchr::memchr3(SUBFIELD_DELIMITER, FIELD_TERMINATOR, RECORD_TERMINATOR, data)
        .into_iter()
        .chain(memchr::memchr(0, data))
        .min()
    {
        Some(position) => Err(MarcError::InvalidData {
            byte: data[position],
            position,
        }),
        None => Ok(()),
    }
}

/// Parse a variable field body into subfield descriptors.
///
/// `base` is the raw-buffer offset of `body`; descriptor offsets are absolute.
///
/// # Errors
///
/// Returns [`MarcError::CorruptField`] if the body is shorter than its two
/// indicators, has bytes between the indicators and the first delimiter, or
/// ends in a delimiter with no code.
pub fn scan_field(
    tag: u16,
    body: &[u8],
    base: usize,
    collation: &CollationTable,
) -> Result<SubfieldList> {
    if body.len() < 2 {
        return Err(MarcError::CorruptField {
            tag,
            reason: "missing indicators",
        });
    }

    let mut entries = SubfieldList::new();
    entries.push(SubfieldEntry {
        code: INDICATOR1_CODE,
        start: base,
        length: 1,
        rank: 0,
        order: 0,
    });
    entries.push(SubfieldEntry {
        code: INDICATOR2_CODE,
        start: base + 1,
        length: 1,
        rank: 0,
        order: 1,
    });

    let content = &body[2..];
    if content.is_empty() {
        return Ok(entries);
    }
    if content[0] != SUBFIELD_DELIMITER {
        return Err(MarcError::CorruptField {
            tag,
            reason: "data before first subfield delimiter",
        });
    }

    let mut order: u16 = 2;
    for position in memchr::memchr_iter(SUBFIELD_DELIMITER, content) {
        // Close the previous subfield at this delimiter.
        if let Some(previous) = entries.last_mut().filter(|_| order > 2) {
            previous.length = base + 2 + position - previous.start;
        }
        let code = *content.get(position + 1).ok_or(MarcError::CorruptField {
            tag,
            reason: "subfield delimiter without code",
        })?;
        entries.push(SubfieldEntry {
            code,
            start: base + 2 + position + 2,
            length: 0,
            rank: collation.rank(code),
            order,
        });
        order = order.saturating_add(1);
    }
    if let Some(last) = entries.last_mut() {
        last.length = base + body.len() - last.start;
    }

    Ok(entries)
}

/// Lazily built subfield directory for one field.
#[derive(Debug, Clone, Default)]
pub struct SubfieldDirectory {
    field: Option<usize>,
    entries: SubfieldList,
}

impl SubfieldDirectory {
    /// True if the cached list describes the field at `index`.
    #[must_use]
    pub fn is_built_for(&self, index: usize) -> bool {
        self.field == Some(index)
    }

    /// Drop the cached list; the next access rebuilds it.
    pub fn invalidate(&mut self) {
        self.field = None;
        self.entries.clear();
    }

    /// Install a freshly scanned list for field `index`.
    pub fn install(&mut self, index: usize, entries: SubfieldList) {
        self.field = Some(index);
        self.entries = entries;
    }

    /// Field the cache was built for.
    #[must_use]
    pub fn field(&self) -> Option<usize> {
        self.field
    }

    /// All entries, indicator slots first.
    #[must_use]
    pub fn entries(&self) -> &[SubfieldEntry] {
        &self.entries
    }

    /// Number of entries including the two indicator slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of real subfields.
    #[must_use]
    pub fn data_count(&self) -> usize {
        self.entries.len().saturating_sub(FIRST_SUBFIELD)
    }

    /// Occurrences of `code` among the real subfields.
    #[must_use]
    pub fn count(&self, code: u8) -> usize {
        self.data_entries().filter(|entry| entry.code == code).count()
    }

    fn data_entries(
        &self,
    ) -> impl DoubleEndedIterator<Item = &SubfieldEntry> + ExactSizeIterator + Clone {
        self.entries.iter().skip(FIRST_SUBFIELD)
    }

    /// Ordinal of an occurrence of `code`.
    ///
    /// Occurrences count the same way as field lookups: `0` is the first match,
    /// `-1` the last, `-2` the one before it.
    ///
    /// # Errors
    ///
    /// [`MarcError::SubfieldNotFound`] if no subfield has the code,
    /// [`MarcError::SubfieldOccurrenceNotFound`] if too few do.
    pub fn find(&self, tag: u16, code: u8, occurrence: i32) -> Result<usize> {
        let matches = self
            .data_entries()
            .enumerate()
            .filter(|(_, entry)| entry.code == code)
            .map(|(index, _)| index + FIRST_SUBFIELD);
        let found = if occurrence >= 0 {
            matches.clone().nth(occurrence.unsigned_abs() as usize)
        } else {
            matches
                .clone()
                .rev()
                .nth(occurrence.unsigned_abs() as usize - 1)
        };
        found.ok_or_else(|| match matches.count() {
            0 => MarcError::SubfieldNotFound { tag, code },
            available => MarcError::SubfieldOccurrenceNotFound {
                tag,
                code,
                occurrence,
                available,
            },
        })
    }
}
