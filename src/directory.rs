//! The field directory.
//!
//! An ordered list of [`FieldEntry`] descriptors. Entry 0 is always the leader
//! (tag 0); the rest are fields in raw-buffer order. Each entry's body lives at
//! `offset..offset + length` in the record's raw buffer and is followed by one
//! field terminator byte, so for consecutive entries
//! `next.offset == prev.offset + prev.length + 1`.

use crate::error::{MarcError, Result};
use crate::{FIXED_FIELD_LIMIT, LEADER_LEN, MAX_TAG};

/// Default maximum number of fields (excluding the leader).
pub const DEFAULT_MAX_FIELDS: usize = 2048;

/// Descriptor of one field in the raw buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEntry {
    /// Tag, 0-999; 0 is the leader.
    pub tag: u16,
    /// Byte offset of the field body in the raw buffer.
    pub offset: usize,
    /// Body length, excluding the field terminator.
    pub length: usize,
    /// Insertion counter. Unique within a record and never reused, so it
    /// doubles as a stable identity across deletions.
    pub order: u32,
    /// Collation-rank range exempted from subfield sorting.
    pub protected_ranks: Option<(u8, u8)>,
}

impl FieldEntry {
    /// True for tags below 010 (including the leader).
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        self.tag < FIXED_FIELD_LIMIT
    }

    /// True when the field would be dropped from assembled output: a fixed
    /// field with no bytes, or a variable field with nothing past its
    /// indicators.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        if self.is_fixed() {
            self.length == 0
        } else {
            self.length < 3
        }
    }

    /// Bytes the field occupies in the raw buffer, terminator included.
    #[must_use]
    pub fn span(&self) -> usize {
        self.length + 1
    }
}

/// Check that `tag` is a legal tag number.
///
/// # Errors
///
/// Returns [`MarcError::InvalidTag`] for tags above 999.
pub fn check_tag(tag: u16) -> Result<()> {
    if tag > MAX_TAG {
        return Err(MarcError::InvalidTag {
            tag,
            reason: "must be in 0-999",
        });
    }
    Ok(())
}

/// Ordered list of field descriptors, leader first.
#[derive(Debug, Clone)]
pub struct FieldDirectory {
    entries: Vec<FieldEntry>,
    next_order: u32,
    capacity: usize,
}

impl FieldDirectory {
    /// Directory holding only the leader entry, with room for `capacity`
    /// further fields.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        FieldDirectory {
            entries: vec![FieldEntry {
                tag: 0,
                offset: 0,
                length: LEADER_LEN,
                order: 0,
                protected_ranks: None,
            }],
            next_order: 1,
            capacity,
        }
    }

    /// Number of entries, leader included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Never true: the leader entry is always present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of non-leader fields.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// All entries, leader first.
    #[must_use]
    pub fn entries(&self) -> &[FieldEntry] {
        &self.entries
    }

    /// Entry at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&FieldEntry> {
        self.entries.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut FieldEntry> {
        self.entries.get_mut(index)
    }

    /// Append a descriptor; returns its index.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::DirectoryFull`] when at capacity.
    pub fn push(&mut self, tag: u16, offset: usize, length: usize) -> Result<usize> {
        if self.entries.len() > self.capacity {
            return Err(MarcError::DirectoryFull {
                capacity: self.capacity,
            });
        }
        self.entries.push(FieldEntry {
            tag,
            offset,
            length,
            order: self.next_order,
            protected_ranks: None,
        });
        self.next_order += 1;
        Ok(self.entries.len() - 1)
    }

    /// Remove and return the entry at `index`. Offsets are not touched.
    pub(crate) fn remove(&mut self, index: usize) -> FieldEntry {
        self.entries.remove(index)
    }

    /// Add `delta` to the offset of every entry from `index` on.
    pub(crate) fn shift_from(&mut self, index: usize, delta: isize) {
        for entry in self.entries.iter_mut().skip(index) {
            entry.offset = entry.offset.wrapping_add_signed(delta);
        }
    }

    /// Index of the entry with insertion counter `order`.
    #[must_use]
    pub fn position_of_order(&self, order: u32) -> Option<usize> {
        self.entries.iter().position(|entry| entry.order == order)
    }

    /// True if any entry carries `tag`.
    #[must_use]
    pub fn contains(&self, tag: u16) -> bool {
        self.entries.iter().any(|entry| entry.tag == tag)
    }

    /// Number of entries carrying `tag`.
    #[must_use]
    pub fn count(&self, tag: u16) -> usize {
        self.entries.iter().filter(|entry| entry.tag == tag).count()
    }

    /// Index of an occurrence of `tag`.
    ///
    /// `occurrence >= 0` counts forward from the first match (0 is the first);
    /// `occurrence < 0` counts backward from the last (-1 is the last).
    ///
    /// # Errors
    ///
    /// [`MarcError::FieldNotFound`] if the tag is absent altogether,
    /// [`MarcError::OccurrenceNotFound`] if it is present too few times.
    pub fn find(&self, tag: u16, occurrence: i32) -> Result<usize> {
        let matches = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.tag == tag)
            .map(|(index, _)| index);
        let found = if occurrence >= 0 {
            matches.clone().nth(occurrence.unsigned_abs() as usize)
        } else {
            matches
                .clone()
                .rev()
                .nth(occurrence.unsigned_abs() as usize - 1)
        };
        found.ok_or_else(|| match matches.count() {
            0 => MarcError::FieldNotFound { tag },
            available => MarcError::OccurrenceNotFound {
                tag,
                occurrence,
                available,
            },
        })
    }

    /// Resolve a signed ordinal: `0..len` as is, `-1` the last entry, `-len`
    /// the leader.
    #[must_use]
    pub fn resolve_ordinal(&self, ordinal: isize) -> Option<usize> {
        resolve_signed(ordinal, self.entries.len())
    }
}

/// Map a signed index onto `0..len`; negative values count from the end.
pub(crate) fn resolve_signed(index: isize, len: usize) -> Option<usize> {
    if index >= 0 {
        let index = index.unsigned_abs();
        (index < len).then_some(index)
    } else {
        len.checked_sub(index.unsigned_abs())
    }
}
