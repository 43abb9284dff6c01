//! The record aggregate.
//!
//! A [`Record`] owns one [`RawBuffer`], one [`FieldDirectory`], and a lazily
//! built [`SubfieldDirectory`] for whichever field the cursor is on. Every
//! mutation goes through here so that offsets stay consistent: a change in one
//! field's length shifts the bytes of every later field and adds the same delta
//! to every later descriptor.
//!
//! Fixed fields (tags below 010, and the leader as tag 0) have no subfields.
//! Writes to them address bytes by offset; reads return what is there, flagging
//! a short read when fewer bytes exist than were asked for.

use crate::buffer::{to_delta, RawBuffer};
use crate::collation::CollationTable;
use crate::config::{EngineConfig, SortOptions};
use crate::cursor::{Cursor, PositionStack};
use crate::directory::{check_tag, FieldDirectory};
use crate::error::{MarcError, Result};
use crate::leader::{Leader, DEFAULT_LEADER};
use crate::subfields::{
    check_data, check_subfield_code, scan_field, SubfieldDirectory, FIRST_SUBFIELD,
};
use crate::{
    FIELD_TERMINATOR, FILL_CHAR, FIXED_FIELD_LIMIT, LEADER_LEN, MAX_FIELD_LENGTH,
    SUBFIELD_DELIMITER,
};
use bytes::BytesMut;

/// Which of the two indicators of a variable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    /// Indicator 1 (first byte of the body)
    First,
    /// Indicator 2 (second byte of the body)
    Second,
}

impl Indicator {
    fn position(self) -> usize {
        match self {
            Indicator::First => 0,
            Indicator::Second => 1,
        }
    }
}

/// Result of reading bytes from a fixed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedRead<'a> {
    /// Bytes actually available.
    pub data: &'a [u8],
    /// True when fewer bytes than requested were available.
    pub short: bool,
}

/// Borrowed view of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldView<'a> {
    /// Directory ordinal (0 is the leader).
    pub ordinal: usize,
    /// Tag
    pub tag: u16,
    /// Field body without terminator.
    pub data: &'a [u8],
}

/// Borrowed view of one subfield or indicator slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubfieldView<'a> {
    /// Ordinal within the field; 0 and 1 are the indicators.
    pub ordinal: usize,
    /// Subfield code, `None` for the indicator slots.
    pub code: Option<u8>,
    /// Subfield data (the single indicator byte for the indicator slots).
    pub data: &'a [u8],
}

/// An in-memory MARC record.
///
/// # Examples
///
/// ```
/// use marc_engine::Record;
///
/// # fn main() -> marc_engine::Result<()> {
/// let mut record = Record::new();
/// record.add_field(650)?;
/// record.add_subfield(b'a', b"Whales")?;
/// record.add_subfield(b'v', b"Juvenile fiction.")?;
///
/// record.get_field(650, -1)?;
/// assert_eq!(record.get_subfield(b'v', 0)?, b"Juvenile fiction.");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Record {
    pub(crate) raw: RawBuffer,
    pub(crate) fields: FieldDirectory,
    pub(crate) subfields: SubfieldDirectory,
    pub(crate) collation: CollationTable,
    pub(crate) read_only: bool,
    pub(crate) cursor: Cursor,
    pub(crate) positions: PositionStack,
    pub(crate) output: BytesMut,
    pub(crate) config: EngineConfig,
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

impl Record {
    /// Create an empty record with the default leader and configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::build(EngineConfig::default(), CollationTable::default())
    }

    /// Create an empty record with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate.
    pub fn with_config(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let collation = config.collation_table()?;
        Ok(Self::build(config.clone(), collation))
    }

    fn build(config: EngineConfig, collation: CollationTable) -> Self {
        Record {
            raw: initial_raw(config.growth_increment),
            fields: FieldDirectory::new(config.max_fields),
            subfields: SubfieldDirectory::default(),
            collation,
            read_only: false,
            cursor: Cursor::default(),
            positions: PositionStack::new(config.position_stack_depth),
            output: BytesMut::new(),
            config,
        }
    }

    /// A read-only deep copy of this record.
    ///
    /// The copy carries the same fields, cursor, and options, and rejects
    /// every mutating call with [`MarcError::ReadOnly`]. It does not see later
    /// changes to the original.
    #[must_use]
    pub fn duplicate(&self) -> Record {
        let mut copy = self.clone();
        copy.read_only = true;
        copy
    }

    /// True for records produced by [`Record::duplicate`].
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// The configuration this record was created with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The collation table used for subfield sorting.
    #[must_use]
    pub fn collation(&self) -> &CollationTable {
        &self.collation
    }

    /// Current output ordering.
    #[must_use]
    pub fn sort_options(&self) -> SortOptions {
        self.config.sort
    }

    /// Change the output ordering for later assemblies.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidConfig`] for a malformed protected range.
    pub fn set_sort_options(&mut self, sort: SortOptions) -> Result<()> {
        EngineConfig {
            sort,
            ..self.config.clone()
        }
        .validate()?;
        self.config.sort = sort;
        Ok(())
    }

    /// The leader as currently stored.
    #[must_use]
    pub fn leader(&self) -> Leader {
        // The leader entry always spans the first 24 bytes.
        let mut bytes = [0u8; LEADER_LEN];
        bytes.copy_from_slice(self.raw.slice(0..LEADER_LEN));
        Leader::from(bytes)
    }

    /// Replace the leader bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::ReadOnly`] on a duplicate, or
    /// [`MarcError::InvalidData`] if the leader holds a control byte.
    pub fn set_leader(&mut self, leader: &Leader) -> Result<()> {
        self.check_writable()?;
        check_data(leader.as_bytes())?;
        self.raw.overwrite(0, leader.as_bytes())
    }

    /// Number of fields, leader excluded.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len() - 1
    }

    /// The field directory.
    #[must_use]
    pub fn directory(&self) -> &FieldDirectory {
        &self.fields
    }

    /// Iterate over every field, leader first.
    pub fn fields(&self) -> impl Iterator<Item = FieldView<'_>> {
        self.fields
            .entries()
            .iter()
            .enumerate()
            .map(|(ordinal, entry)| FieldView {
                ordinal,
                tag: entry.tag,
                data: self.raw.slice(entry.offset..entry.offset + entry.length),
            })
    }

    // ---------------------------------------------------------------------
    // Fields
    // ---------------------------------------------------------------------

    /// Append a new field and make it current.
    ///
    /// Variable fields (tag 010 and up) start with two blank indicators; fixed
    /// fields start empty. A field left without content is dropped from the
    /// assembled record, so callers may add speculatively.
    ///
    /// # Errors
    ///
    /// - [`MarcError::ReadOnly`] on a duplicate
    /// - [`MarcError::InvalidTag`] for tags above 999
    /// - [`MarcError::FixedFieldRepeated`] for a second occurrence of a tag below 010
    /// - [`MarcError::DirectoryFull`] when the directory is at capacity
    pub fn add_field(&mut self, tag: u16) -> Result<()> {
        self.check_writable()?;
        check_tag(tag)?;
        if tag < FIXED_FIELD_LIMIT && self.fields.contains(tag) {
            return Err(MarcError::FixedFieldRepeated { tag });
        }
        if self.field_count() >= self.fields.capacity() {
            return Err(MarcError::DirectoryFull {
                capacity: self.fields.capacity(),
            });
        }

        let offset = self.raw.len();
        let length = if tag < FIXED_FIELD_LIMIT {
            self.raw.extend(&[FIELD_TERMINATOR])?;
            0
        } else {
            self.raw.extend(&[b' ', b' ', FIELD_TERMINATOR])?;
            2
        };
        let index = self.fields.push(tag, offset, length)?;

        self.subfields.invalidate();
        self.cursor.field = Some(index);
        self.cursor.subfield = None;
        Ok(())
    }

    /// Delete the current field.
    ///
    /// The cursor moves to the preceding field, so a following
    /// [`Record::next_field`] continues with the field after the deleted one.
    ///
    /// # Errors
    ///
    /// [`MarcError::ReadOnly`], [`MarcError::NoCurrentField`], or
    /// [`MarcError::LeaderDeletion`] when positioned on the leader.
    pub fn delete_field(&mut self) -> Result<()> {
        self.check_writable()?;
        let index = self.current_index()?;
        if index == 0 {
            return Err(MarcError::LeaderDeletion);
        }
        let entry = self.fields.remove(index);
        let span = entry.span();
        self.raw.remove(entry.offset, span)?;
        self.fields.shift_from(index, -to_delta(span));

        self.subfields.invalidate();
        self.cursor.field = Some(index - 1);
        self.cursor.subfield = None;
        Ok(())
    }

    /// Make an occurrence of `tag` current; returns its directory ordinal.
    ///
    /// `occurrence` 0 is the first match, 1 the second; -1 is the last match,
    /// -2 the one before it. Tag 0 finds the leader.
    ///
    /// # Errors
    ///
    /// [`MarcError::FieldNotFound`] if the tag is absent,
    /// [`MarcError::OccurrenceNotFound`] if it occurs too few times. The cursor
    /// does not move on failure.
    pub fn get_field(&mut self, tag: u16, occurrence: i32) -> Result<usize> {
        let index = self.fields.find(tag, occurrence)?;
        self.cursor.field = Some(index);
        self.cursor.subfield = None;
        Ok(index)
    }

    /// Make the field at a directory ordinal current; returns its tag.
    ///
    /// 0 is the leader; negative ordinals count from the end, -1 being the
    /// last field.
    ///
    /// # Errors
    ///
    /// [`MarcError::EndOfRecord`] if the ordinal is out of range.
    pub fn pos_field(&mut self, ordinal: isize) -> Result<u16> {
        let index = self
            .fields
            .resolve_ordinal(ordinal)
            .ok_or(MarcError::EndOfRecord)?;
        self.cursor.field = Some(index);
        self.cursor.subfield = None;
        Ok(self.fields.entries()[index].tag)
    }

    /// Change the tag of the current field in place.
    ///
    /// # Errors
    ///
    /// - [`MarcError::ReadOnly`] or [`MarcError::NoCurrentField`]
    /// - [`MarcError::InvalidTag`] for tags above 999, for the leader, or for a
    ///   change between fixed and variable
    /// - [`MarcError::FixedFieldRepeated`] if the new fixed tag already exists
    pub fn rename_field(&mut self, new_tag: u16) -> Result<()> {
        self.check_writable()?;
        let index = self.current_index()?;
        check_tag(new_tag)?;
        let old_tag = self.fields.entries()[index].tag;
        if index == 0 || new_tag == 0 {
            return Err(MarcError::InvalidTag {
                tag: new_tag,
                reason: "the leader cannot be renamed",
            });
        }
        if (old_tag < FIXED_FIELD_LIMIT) != (new_tag < FIXED_FIELD_LIMIT) {
            return Err(MarcError::InvalidTag {
                tag: new_tag,
                reason: "cannot change between fixed and variable field",
            });
        }
        if new_tag != old_tag && new_tag < FIXED_FIELD_LIMIT && self.fields.contains(new_tag) {
            return Err(MarcError::FixedFieldRepeated { tag: new_tag });
        }
        if let Some(entry) = self.fields.get_mut(index) {
            entry.tag = new_tag;
        }
        Ok(())
    }

    /// Tag of the current field.
    ///
    /// # Errors
    ///
    /// [`MarcError::NoCurrentField`] if the cursor is not on a field.
    pub fn current_tag(&self) -> Result<u16> {
        Ok(self.fields.entries()[self.current_index()?].tag)
    }

    /// Directory ordinal of the current field.
    ///
    /// # Errors
    ///
    /// [`MarcError::NoCurrentField`] if the cursor is not on a field.
    pub fn current_ordinal(&self) -> Result<usize> {
        self.current_index()
    }

    /// Body of the current field, without terminator.
    ///
    /// # Errors
    ///
    /// [`MarcError::NoCurrentField`] if the cursor is not on a field.
    pub fn current_field_data(&self) -> Result<&[u8]> {
        let entry = &self.fields.entries()[self.current_index()?];
        Ok(self.raw.slice(entry.offset..entry.offset + entry.length))
    }

    /// True if the current field would be dropped from assembled output.
    ///
    /// # Errors
    ///
    /// [`MarcError::NoCurrentField`] if the cursor is not on a field.
    pub fn is_empty_field(&self) -> Result<bool> {
        let index = self.current_index()?;
        Ok(index != 0 && self.fields.entries()[index].is_empty())
    }

    /// Number of fields carrying `tag`.
    #[must_use]
    pub fn field_occurrences(&self, tag: u16) -> usize {
        self.fields.count(tag)
    }

    /// Offset of the first occurrence of `needle` in the current field body.
    ///
    /// # Errors
    ///
    /// [`MarcError::NoCurrentField`] if the cursor is not on a field.
    pub fn find_in_field(&self, needle: &[u8]) -> Result<Option<usize>> {
        let body = self.current_field_data()?;
        Ok(memchr::memmem::find(body, needle))
    }

    // ---------------------------------------------------------------------
    // Subfields
    // ---------------------------------------------------------------------

    /// Append a subfield to the current field.
    ///
    /// For variable fields the group `0x1F code data` is appended after the
    /// last subfield, in insertion order; it becomes the current subfield. For
    /// fixed fields `code` is taken as a byte offset and the call behaves like
    /// [`Record::put_fixed`].
    ///
    /// # Errors
    ///
    /// - [`MarcError::ReadOnly`] or [`MarcError::NoCurrentField`]
    /// - [`MarcError::InvalidSubfieldCode`] for an illegal code
    /// - [`MarcError::InvalidData`] if `data` holds NUL or a MARC control byte
    /// - [`MarcError::CorruptField`] if the existing field body is malformed
    ///
    /// The record is unchanged on any of these.
    pub fn add_subfield(&mut self, code: u8, data: &[u8]) -> Result<()> {
        self.check_writable()?;
        let index = self.current_index()?;
        if self.fields.entries()[index].is_fixed() {
            return self.put_fixed(usize::from(code), data);
        }
        check_subfield_code(code)?;
        check_data(data)?;
        self.ensure_subfields()?;

        let entry = &self.fields.entries()[index];
        let at = entry.offset + entry.length;
        let mut group = Vec::with_capacity(data.len() + 2);
        group.push(SUBFIELD_DELIMITER);
        group.push(code);
        group.extend_from_slice(data);
        self.resize_field(index, at, &group, 0)?;

        self.ensure_subfields()?;
        self.cursor.subfield = Some(self.subfields.len() - 1);
        Ok(())
    }

    /// Write `data` into the current fixed field at byte `offset`.
    ///
    /// Overwrites existing bytes and extends the field as needed. An offset
    /// past the current end is reached by padding with `|`. The leader cannot
    /// grow past 24 bytes.
    ///
    /// # Errors
    ///
    /// - [`MarcError::ReadOnly`] or [`MarcError::NoCurrentField`]
    /// - [`MarcError::NotVariableField`] if the current field is variable
    /// - [`MarcError::InvalidData`] if `data` holds NUL or a MARC control byte
    /// - [`MarcError::InvalidLeader`] for a leader write past position 23
    /// - [`MarcError::FixedWriteTooLong`] if the field would not fit in a
    ///   record, terminator included
    pub fn put_fixed(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        self.check_writable()?;
        let index = self.current_index()?;
        let entry = &self.fields.entries()[index];
        if !entry.is_fixed() {
            return Err(MarcError::NotVariableField { tag: entry.tag });
        }
        check_data(data)?;
        let end = offset
            .checked_add(data.len())
            .filter(|&end| end < MAX_FIELD_LENGTH)
            .ok_or(MarcError::FixedWriteTooLong {
                tag: entry.tag,
                offset,
                length: data.len(),
            })?;
        if index == 0 && end > LEADER_LEN {
            return Err(MarcError::InvalidLeader(format!(
                "write of {} bytes at position {offset} runs past the leader",
                data.len()
            )));
        }

        let (field_offset, length) = (entry.offset, entry.length);
        let grow = end.saturating_sub(length);
        if grow > 0 {
            let fill = vec![FILL_CHAR; grow];
            self.resize_field(index, field_offset + length, &fill, 0)?;
        }
        self.raw.overwrite(field_offset + offset, data)?;
        self.subfields.invalidate();
        Ok(())
    }

    /// Read up to `count` bytes from the current fixed field at `offset`.
    ///
    /// Asking for more bytes than remain is not an error: the available bytes
    /// come back with `short` set.
    ///
    /// # Errors
    ///
    /// - [`MarcError::NoCurrentField`]
    /// - [`MarcError::NotVariableField`] if the current field is variable
    /// - [`MarcError::FixedOffsetOutOfRange`] if `offset` is at or past the end
    pub fn get_fixed(&self, offset: usize, count: usize) -> Result<FixedRead<'_>> {
        let index = self.current_index()?;
        let entry = &self.fields.entries()[index];
        if !entry.is_fixed() {
            return Err(MarcError::NotVariableField { tag: entry.tag });
        }
        if offset >= entry.length {
            return Err(MarcError::FixedOffsetOutOfRange {
                tag: entry.tag,
                offset,
                length: entry.length,
            });
        }
        let available = (entry.length - offset).min(count);
        let start = entry.offset + offset;
        Ok(FixedRead {
            data: self.raw.slice(start..start + available),
            short: available < count,
        })
    }

    /// Locate an occurrence of subfield `code` in the current field and make
    /// it current; returns its data.
    ///
    /// Occurrences count like field occurrences: 0 first, -1 last.
    ///
    /// # Errors
    ///
    /// - [`MarcError::NoCurrentField`]
    /// - [`MarcError::NotVariableField`] on a fixed field
    /// - [`MarcError::EmptyField`] if the field has indicators but no subfields
    /// - [`MarcError::SubfieldNotFound`] / [`MarcError::SubfieldOccurrenceNotFound`]
    pub fn get_subfield(&mut self, code: u8, occurrence: i32) -> Result<&[u8]> {
        let tag = self.variable_tag()?;
        self.ensure_subfields()?;
        if self.subfields.data_count() == 0 {
            return Err(MarcError::EmptyField { tag });
        }
        let ordinal = self.subfields.find(tag, code, occurrence)?;
        self.cursor.subfield = Some(ordinal);
        let entry = self.subfields.entries()[ordinal];
        Ok(self.raw.slice(entry.start..entry.start + entry.length))
    }

    /// Make the subfield at `ordinal` current. 0 and 1 are the indicators;
    /// negative ordinals count from the last subfield.
    ///
    /// # Errors
    ///
    /// [`MarcError::NoCurrentField`], [`MarcError::NotVariableField`], or
    /// [`MarcError::EndOfRecord`] if the ordinal is out of range.
    pub fn pos_subfield(&mut self, ordinal: isize) -> Result<SubfieldView<'_>> {
        self.variable_tag()?;
        self.ensure_subfields()?;
        let resolved = crate::directory::resolve_signed(ordinal, self.subfields.len())
            .ok_or(MarcError::EndOfRecord)?;
        self.cursor.subfield = Some(resolved);
        self.current_subfield()
    }

    /// The current subfield.
    ///
    /// # Errors
    ///
    /// [`MarcError::NoCurrentField`] or [`MarcError::NoCurrentSubfield`].
    pub fn current_subfield(&self) -> Result<SubfieldView<'_>> {
        let index = self.current_index()?;
        let ordinal = self.cursor.subfield.ok_or(MarcError::NoCurrentSubfield)?;
        if !self.subfields.is_built_for(index) {
            return Err(MarcError::NoCurrentSubfield);
        }
        let entry = self
            .subfields
            .entries()
            .get(ordinal)
            .ok_or(MarcError::NoCurrentSubfield)?;
        Ok(SubfieldView {
            ordinal,
            code: (ordinal >= FIRST_SUBFIELD).then_some(entry.code),
            data: self.raw.slice(entry.start..entry.start + entry.length),
        })
    }

    /// Data of the current subfield.
    ///
    /// # Errors
    ///
    /// [`MarcError::NoCurrentField`] or [`MarcError::NoCurrentSubfield`].
    pub fn subfield_data(&self) -> Result<&[u8]> {
        Ok(self.current_subfield()?.data)
    }

    /// Number of subfields in the current field, indicators excluded.
    ///
    /// # Errors
    ///
    /// [`MarcError::NoCurrentField`] or [`MarcError::NotVariableField`].
    pub fn subfield_count(&mut self) -> Result<usize> {
        self.variable_tag()?;
        self.ensure_subfields()?;
        Ok(self.subfields.data_count())
    }

    /// Occurrences of subfield `code` in the current field.
    ///
    /// # Errors
    ///
    /// [`MarcError::NoCurrentField`] or [`MarcError::NotVariableField`].
    pub fn subfield_occurrences(&mut self, code: u8) -> Result<usize> {
        self.variable_tag()?;
        self.ensure_subfields()?;
        Ok(self.subfields.count(code))
    }

    /// Delete the current subfield.
    ///
    /// The cursor moves to the preceding subfield.
    ///
    /// # Errors
    ///
    /// - [`MarcError::ReadOnly`], [`MarcError::NoCurrentField`], or
    ///   [`MarcError::NoCurrentSubfield`]
    /// - [`MarcError::NotVariableField`] on a fixed field
    /// - [`MarcError::IndicatorSlot`] when on one of the indicators
    pub fn delete_subfield(&mut self) -> Result<()> {
        self.check_writable()?;
        let index = self.current_index()?;
        let ordinal = self.current_data_ordinal()?;
        let span = self.subfields.entries()[ordinal].span(ordinal);
        self.resize_field(index, span.start, &[], span.len())?;
        self.cursor.subfield = Some(ordinal - 1);
        self.ensure_subfields()
    }

    /// Change the code of the current subfield.
    ///
    /// After [`Record::add_subfield`] the current subfield is the one just
    /// added, so this renames the last subfield written.
    ///
    /// # Errors
    ///
    /// As for [`Record::delete_subfield`], plus
    /// [`MarcError::InvalidSubfieldCode`] for an illegal code.
    pub fn rename_subfield(&mut self, new_code: u8) -> Result<()> {
        self.check_writable()?;
        let ordinal = self.current_data_ordinal()?;
        check_subfield_code(new_code)?;
        let start = self.subfields.entries()[ordinal].start;
        self.raw.overwrite(start - 1, &[new_code])?;
        self.subfields.invalidate();
        self.ensure_subfields()
    }

    /// Replace the data of the current subfield.
    ///
    /// # Errors
    ///
    /// As for [`Record::delete_subfield`], plus [`MarcError::InvalidData`].
    pub fn replace_subfield(&mut self, data: &[u8]) -> Result<()> {
        self.check_writable()?;
        let index = self.current_index()?;
        let ordinal = self.current_data_ordinal()?;
        check_data(data)?;
        let entry = self.subfields.entries()[ordinal];
        self.resize_field(index, entry.start, data, entry.length)?;
        self.ensure_subfields()
    }

    /// Read one indicator of the current variable field.
    ///
    /// # Errors
    ///
    /// [`MarcError::NoCurrentField`], [`MarcError::NotVariableField`], or
    /// [`MarcError::CorruptField`] if the field has no indicators.
    pub fn indicator(&self, which: Indicator) -> Result<u8> {
        let position = self.indicator_position(which)?;
        self.raw.get(position).ok_or(MarcError::CorruptField {
            tag: self.current_tag()?,
            reason: "missing indicators",
        })
    }

    /// Set one indicator of the current variable field.
    ///
    /// # Errors
    ///
    /// - [`MarcError::ReadOnly`], [`MarcError::NoCurrentField`], or
    ///   [`MarcError::NotVariableField`]
    /// - [`MarcError::InvalidIndicator`] unless `value` is printable ASCII (32-126)
    /// - [`MarcError::CorruptField`] if the field has no indicators
    pub fn set_indicator(&mut self, which: Indicator, value: u8) -> Result<()> {
        self.check_writable()?;
        self.variable_tag()?;
        if !(32..=126).contains(&value) {
            return Err(MarcError::InvalidIndicator { value });
        }
        let position = self.indicator_position(which)?;
        self.raw.overwrite(position, &[value])
    }

    /// Raw offset of one indicator of the current variable field.
    fn indicator_position(&self, which: Indicator) -> Result<usize> {
        let tag = self.variable_tag()?;
        let entry = &self.fields.entries()[self.current_index()?];
        if entry.length < 2 {
            return Err(MarcError::CorruptField {
                tag,
                reason: "missing indicators",
            });
        }
        Ok(entry.offset + which.position())
    }

    /// Exempt the subfield codes ranked from `first` to `last` in the
    /// collation table from subfield sorting in the current field; they keep
    /// their insertion order, placed where `first` would sort.
    ///
    /// # Errors
    ///
    /// [`MarcError::ReadOnly`], [`MarcError::NoCurrentField`],
    /// [`MarcError::NotVariableField`], or [`MarcError::InvalidSubfieldCode`].
    pub fn protect_subfields(&mut self, first: u8, last: u8) -> Result<()> {
        self.check_writable()?;
        self.variable_tag()?;
        check_subfield_code(first)?;
        check_subfield_code(last)?;
        let (low, high) = (self.collation.rank(first), self.collation.rank(last));
        let index = self.current_index()?;
        if let Some(entry) = self.fields.get_mut(index) {
            entry.protected_ranks = Some((low.min(high), low.max(high)));
        }
        Ok(())
    }

    /// Remove subfield sort protection from the current field.
    ///
    /// # Errors
    ///
    /// [`MarcError::ReadOnly`] or [`MarcError::NoCurrentField`].
    pub fn clear_subfield_protection(&mut self) -> Result<()> {
        self.check_writable()?;
        let index = self.current_index()?;
        if let Some(entry) = self.fields.get_mut(index) {
            entry.protected_ranks = None;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    pub(crate) fn check_writable(&self) -> Result<()> {
        if self.read_only {
            Err(MarcError::ReadOnly)
        } else {
            Ok(())
        }
    }

    pub(crate) fn current_index(&self) -> Result<usize> {
        self.cursor
            .field
            .filter(|&index| index < self.fields.len())
            .ok_or(MarcError::NoCurrentField)
    }

    /// Tag of the current field, which must be variable.
    fn variable_tag(&self) -> Result<u16> {
        let tag = self.current_tag()?;
        if tag < FIXED_FIELD_LIMIT {
            return Err(MarcError::NotVariableField { tag });
        }
        Ok(tag)
    }

    /// Ordinal of the current subfield, which must be a real subfield.
    fn current_data_ordinal(&mut self) -> Result<usize> {
        self.variable_tag()?;
        let ordinal = self.cursor.subfield.ok_or(MarcError::NoCurrentSubfield)?;
        self.ensure_subfields()?;
        if ordinal < FIRST_SUBFIELD {
            return Err(MarcError::IndicatorSlot { ordinal });
        }
        if ordinal >= self.subfields.len() {
            return Err(MarcError::NoCurrentSubfield);
        }
        Ok(ordinal)
    }

    /// Build the subfield directory for the current field unless it is
    /// already cached. Fixed fields have none.
    pub(crate) fn ensure_subfields(&mut self) -> Result<()> {
        let index = self.current_index()?;
        if self.subfields.is_built_for(index) {
            return Ok(());
        }
        let entry = &self.fields.entries()[index];
        if entry.is_fixed() {
            self.subfields.invalidate();
            return Ok(());
        }
        let body = self.raw.slice(entry.offset..entry.offset + entry.length);
        let entries = scan_field(entry.tag, body, entry.offset, &self.collation)?;
        tracing::trace!(
            tag = entry.tag,
            subfields = entries.len() - FIRST_SUBFIELD,
            "subfield directory rebuilt"
        );
        self.subfields.install(index, entries);
        Ok(())
    }

    /// Replace `remove` bytes at raw offset `at` (inside field `index`) with
    /// `insert`, then fix up the field length and every later offset.
    fn resize_field(&mut self, index: usize, at: usize, insert: &[u8], remove: usize) -> Result<()> {
        let delta = to_delta(insert.len()) - to_delta(remove);
        let reuse = insert.len().min(remove);
        self.raw.overwrite(at, &insert[..reuse])?;
        match insert.len().cmp(&remove) {
            std::cmp::Ordering::Greater => self.raw.insert(at + reuse, &insert[reuse..])?,
            std::cmp::Ordering::Less => self.raw.remove(at + reuse, remove - reuse)?,
            std::cmp::Ordering::Equal => {},
        }
        if let Some(entry) = self.fields.get_mut(index) {
            entry.length = entry.length.wrapping_add_signed(delta);
        }
        self.fields.shift_from(index + 1, delta);
        self.subfields.invalidate();
        Ok(())
    }
}

/// Raw buffer holding only the default leader and its terminator.
pub(crate) fn initial_raw(increment: usize) -> RawBuffer {
    let mut data = Vec::with_capacity(increment.max(LEADER_LEN + 1));
    data.extend_from_slice(DEFAULT_LEADER);
    data.push(FIELD_TERMINATOR);
    RawBuffer::from_vec(data, increment)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offsets_are_contiguous(record: &Record) -> bool {
        record
            .fields
            .entries()
            .windows(2)
            .all(|pair| pair[1].offset == pair[0].offset + pair[0].length + 1)
            && record
                .fields
                .entries()
                .last()
                .is_some_and(|last| last.offset + last.length + 1 == record.raw.len())
    }

    #[test]
    fn test_new_record() {
        let record = Record::new();
        assert_eq!(record.field_count(), 0);
        assert_eq!(record.leader().as_bytes(), DEFAULT_LEADER);
        assert!(!record.is_read_only());
        assert!(offsets_are_contiguous(&record));
    }

    #[test]
    fn test_add_field_variable_gets_blank_indicators() {
        let mut record = Record::new();
        record.add_field(245).unwrap();
        assert_eq!(record.current_tag().unwrap(), 245);
        assert_eq!(record.current_field_data().unwrap(), b"  ");
        assert!(record.is_empty_field().unwrap());
        assert!(offsets_are_contiguous(&record));
    }

    #[test]
    fn test_add_field_fixed_starts_empty() {
        let mut record = Record::new();
        record.add_field(8).unwrap();
        assert_eq!(record.current_field_data().unwrap(), b"");
        assert!(matches!(
            record.add_field(8),
            Err(MarcError::FixedFieldRepeated { tag: 8 })
        ));
        assert!(matches!(
            record.add_field(0),
            Err(MarcError::FixedFieldRepeated { tag: 0 })
        ));
        assert!(matches!(
            record.add_field(1000),
            Err(MarcError::InvalidTag { tag: 1000, .. })
        ));
    }

    #[test]
    fn test_add_field_respects_capacity() {
        let config = EngineConfig {
            max_fields: 2,
            ..EngineConfig::default()
        };
        let mut record = Record::with_config(&config).unwrap();
        record.add_field(500).unwrap();
        record.add_field(500).unwrap();
        assert!(matches!(
            record.add_field(500),
            Err(MarcError::DirectoryFull { capacity: 2 })
        ));
    }

    #[test]
    fn test_add_subfield_shifts_later_fields() {
        let mut record = Record::new();
        record.add_field(100).unwrap();
        record.add_subfield(b'a', b"Smith").unwrap();
        record.add_field(245).unwrap();
        record.add_subfield(b'a', b"Title").unwrap();

        record.get_field(100, 0).unwrap();
        record.add_subfield(b'd', b"1900-").unwrap();
        assert_eq!(
            record.current_field_data().unwrap(),
            b"  \x1faSmith\x1fd1900-"
        );
        assert!(offsets_are_contiguous(&record));

        record.get_field(245, 0).unwrap();
        assert_eq!(record.current_field_data().unwrap(), b"  \x1faTitle");
    }

    #[test]
    fn test_add_subfield_rejects_illegal_content() {
        let mut record = Record::new();
        record.add_field(245).unwrap();
        record.add_subfield(b'a', b"ok").unwrap();
        let before = record.raw.as_slice().to_vec();

        for bad in [&b"a\x1fb"[..], b"a\x1eb", b"a\x1db", b"a\0b"] {
            assert!(matches!(
                record.add_subfield(b'b', bad),
                Err(MarcError::InvalidData { position: 1, .. })
            ));
        }
        assert!(matches!(
            record.add_subfield(b' ', b"x"),
            Err(MarcError::InvalidSubfieldCode { code: b' ' })
        ));
        assert_eq!(record.raw.as_slice(), &before[..]);
    }

    #[test]
    fn test_delete_field_compacts() {
        let mut record = Record::new();
        for (tag, text) in [(100, &b"one"[..]), (245, b"two"), (500, b"three")] {
            record.add_field(tag).unwrap();
            record.add_subfield(b'a', text).unwrap();
        }
        let before = record.raw.len();
        record.get_field(245, 0).unwrap();
        record.delete_field().unwrap();

        assert_eq!(record.field_count(), 2);
        assert_eq!(record.raw.len(), before - (2 + 5 + 1));
        assert_eq!(record.current_tag().unwrap(), 100);
        assert!(offsets_are_contiguous(&record));

        record.get_field(500, 0).unwrap();
        assert_eq!(record.get_subfield(b'a', 0).unwrap(), b"three");
    }

    #[test]
    fn test_delete_leader_fails() {
        let mut record = Record::new();
        record.pos_field(0).unwrap();
        assert!(matches!(
            record.delete_field(),
            Err(MarcError::LeaderDeletion)
        ));
    }

    #[test]
    fn test_rename_field() {
        let mut record = Record::new();
        record.add_field(1).unwrap();
        record.add_field(3).unwrap();
        record.add_field(100).unwrap();

        record.rename_field(700).unwrap();
        assert_eq!(record.current_tag().unwrap(), 700);
        assert!(matches!(
            record.rename_field(5),
            Err(MarcError::InvalidTag { .. })
        ));

        record.get_field(3, 0).unwrap();
        assert!(matches!(
            record.rename_field(1),
            Err(MarcError::FixedFieldRepeated { tag: 1 })
        ));
        record.rename_field(5).unwrap();
        assert_eq!(record.field_occurrences(5), 1);
    }

    #[test]
    fn test_pos_field_negative() {
        let mut record = Record::new();
        record.add_field(100).unwrap();
        record.add_field(245).unwrap();
        assert_eq!(record.pos_field(-1).unwrap(), 245);
        assert_eq!(record.pos_field(-3).unwrap(), 0);
        assert!(matches!(record.pos_field(-4), Err(MarcError::EndOfRecord)));
        assert!(matches!(record.pos_field(3), Err(MarcError::EndOfRecord)));
    }

    #[test]
    fn test_fixed_field_writes_pad() {
        let mut record = Record::new();
        record.add_field(8).unwrap();
        record.put_fixed(3, b"abc").unwrap();
        assert_eq!(record.current_field_data().unwrap(), b"|||abc");

        record.put_fixed(1, b"XY").unwrap();
        assert_eq!(record.current_field_data().unwrap(), b"|XYabc");

        record.add_subfield(5, b"Z!").unwrap();
        assert_eq!(record.current_field_data().unwrap(), b"|XYabZ!");
        assert!(offsets_are_contiguous(&record));
    }

    #[test]
    fn test_fixed_field_partial_read() {
        let mut record = Record::new();
        record.get_field(0, 0).unwrap();
        let read = record.get_fixed(20, 10).unwrap();
        assert_eq!(read.data, b"4500");
        assert!(read.short);

        let read = record.get_fixed(5, 3).unwrap();
        assert_eq!(read.data, b"nam");
        assert!(!read.short);

        assert!(matches!(
            record.get_fixed(24, 1),
            Err(MarcError::FixedOffsetOutOfRange { .. })
        ));
    }

    #[test]
    fn test_leader_writes_stay_in_bounds() {
        let mut record = Record::new();
        record.pos_field(0).unwrap();
        record.put_fixed(5, b"c").unwrap();
        assert_eq!(record.leader().record_status(), 'c');
        assert!(matches!(
            record.put_fixed(22, b"xyz"),
            Err(MarcError::InvalidLeader(_))
        ));
    }

    #[test]
    fn test_get_subfield_occurrences() {
        let mut record = Record::new();
        record.add_field(650).unwrap();
        record.add_subfield(b'a', b"Whales").unwrap();
        record.add_subfield(b'x', b"Anatomy").unwrap();
        record.add_subfield(b'x', b"Physiology").unwrap();

        assert_eq!(record.get_subfield(b'x', 0).unwrap(), b"Anatomy");
        assert_eq!(record.get_subfield(b'x', -1).unwrap(), b"Physiology");
        assert_eq!(record.get_subfield(b'x', -2).unwrap(), b"Anatomy");
        assert!(matches!(
            record.get_subfield(b'x', -3),
            Err(MarcError::SubfieldOccurrenceNotFound { available: 2, .. })
        ));
        assert!(matches!(
            record.get_subfield(b'z', 0),
            Err(MarcError::SubfieldNotFound { code: b'z', .. })
        ));
        assert_eq!(record.subfield_occurrences(b'x').unwrap(), 2);
        assert_eq!(record.subfield_count().unwrap(), 3);
    }

    #[test]
    fn test_empty_field_condition() {
        let mut record = Record::new();
        record.add_field(245).unwrap();
        assert!(matches!(
            record.get_subfield(b'a', 0),
            Err(MarcError::EmptyField { tag: 245 })
        ));
    }

    #[test]
    fn test_subfield_ops_on_fixed_field() {
        let mut record = Record::new();
        record.add_field(1).unwrap();
        assert!(matches!(
            record.get_subfield(b'a', 0),
            Err(MarcError::NotVariableField { tag: 1 })
        ));
        assert!(matches!(
            record.set_indicator(Indicator::First, b'1'),
            Err(MarcError::NotVariableField { tag: 1 })
        ));
    }

    #[test]
    fn test_delete_subfield() {
        let mut record = Record::new();
        record.add_field(245).unwrap();
        record.add_subfield(b'a', b"Title").unwrap();
        record.add_subfield(b'b', b"subtitle").unwrap();
        record.add_subfield(b'c', b"Author").unwrap();
        record.add_field(500).unwrap();
        record.add_subfield(b'a', b"Note").unwrap();

        record.get_field(245, 0).unwrap();
        record.get_subfield(b'b', 0).unwrap();
        record.delete_subfield().unwrap();
        assert_eq!(
            record.current_field_data().unwrap(),
            b"  \x1faTitle\x1fcAuthor"
        );
        assert_eq!(record.current_subfield().unwrap().code, Some(b'a'));
        assert!(offsets_are_contiguous(&record));

        record.pos_subfield(1).unwrap();
        assert!(matches!(
            record.delete_subfield(),
            Err(MarcError::IndicatorSlot { ordinal: 1 })
        ));
    }

    #[test]
    fn test_rename_subfield_after_add() {
        let mut record = Record::new();
        record.add_field(245).unwrap();
        record.add_subfield(b'a', b"Title").unwrap();
        record.add_subfield(b'h', b"[sound recording]").unwrap();
        record.rename_subfield(b'k').unwrap();
        assert_eq!(
            record.current_field_data().unwrap(),
            b"  \x1faTitle\x1fk[sound recording]"
        );
        assert!(matches!(
            record.rename_subfield(0x1F),
            Err(MarcError::InvalidSubfieldCode { .. })
        ));
    }

    #[test]
    fn test_replace_subfield() {
        let mut record = Record::new();
        record.add_field(20).unwrap();
        record.add_subfield(b'a', b"0123456789").unwrap();
        record.add_field(245).unwrap();
        record.add_subfield(b'a', b"Title").unwrap();

        record.get_field(20, 0).unwrap();
        record.get_subfield(b'a', 0).unwrap();
        record.replace_subfield(b"978-0-12-345678-9").unwrap();
        assert_eq!(record.get_subfield(b'a', 0).unwrap(), b"978-0-12-345678-9");
        record.replace_subfield(b"short").unwrap();
        assert_eq!(record.get_subfield(b'a', 0).unwrap(), b"short");
        assert!(offsets_are_contiguous(&record));

        record.get_field(245, 0).unwrap();
        assert_eq!(record.get_subfield(b'a', 0).unwrap(), b"Title");
    }

    #[test]
    fn test_fixed_write_limits() {
        let mut record = Record::new();
        record.add_field(8).unwrap();
        record.put_fixed(0, b"abc").unwrap();

        for offset in [usize::MAX, usize::MAX / 2, MAX_FIELD_LENGTH, MAX_FIELD_LENGTH - 1] {
            let err = record.put_fixed(offset, b"x").unwrap_err();
            assert!(matches!(err, MarcError::FixedWriteTooLong { tag: 8, .. }));
            assert_eq!(err.class(), crate::ErrorClass::Validation);
        }
        assert_eq!(record.current_field_data().unwrap(), b"abc");

        record.put_fixed(MAX_FIELD_LENGTH - 2, b"x").unwrap();
        assert_eq!(record.current_field_data().unwrap().len(), MAX_FIELD_LENGTH - 1);
        assert!(record.to_bytes().is_ok());
    }

    #[test]
    fn test_indicators_need_indicator_bytes() {
        let mut record = Record::new();
        record.add_field(245).unwrap();
        record.add_field(500).unwrap();
        record.add_subfield(b'a', b"Note").unwrap();
        let before = record.raw.as_slice().to_vec();

        record.get_field(245, 0).unwrap();
        if let Some(entry) = record.fields.get_mut(1) {
            entry.length = 1;
        }
        assert!(matches!(
            record.set_indicator(Indicator::Second, b'9'),
            Err(MarcError::CorruptField { tag: 245, .. })
        ));
        assert!(matches!(
            record.indicator(Indicator::First),
            Err(MarcError::CorruptField { tag: 245, .. })
        ));
        assert_eq!(record.raw.as_slice(), &before[..]);
    }

    #[test]
    fn test_indicators() {
        let mut record = Record::new();
        record.add_field(245).unwrap();
        record.set_indicator(Indicator::First, b'1').unwrap();
        record.set_indicator(Indicator::Second, b'4').unwrap();
        assert_eq!(record.indicator(Indicator::First).unwrap(), b'1');
        assert_eq!(record.indicator(Indicator::Second).unwrap(), b'4');
        assert!(matches!(
            record.set_indicator(Indicator::First, 0x1F),
            Err(MarcError::InvalidIndicator { value: 0x1F })
        ));
    }

    #[test]
    fn test_duplicate_is_read_only_deep_copy() {
        let mut record = Record::new();
        record.add_field(245).unwrap();
        record.add_subfield(b'a', b"Original").unwrap();

        let mut copy = record.duplicate();
        assert!(copy.is_read_only());
        assert!(matches!(copy.add_field(500), Err(MarcError::ReadOnly)));
        assert!(matches!(
            copy.add_subfield(b'b', b"x"),
            Err(MarcError::ReadOnly)
        ));
        assert!(matches!(copy.delete_field(), Err(MarcError::ReadOnly)));

        record.replace_subfield(b"Changed").unwrap();
        copy.get_field(245, 0).unwrap();
        assert_eq!(copy.get_subfield(b'a', 0).unwrap(), b"Original");
    }

    #[test]
    fn test_find_in_field() {
        let mut record = Record::new();
        record.add_field(856).unwrap();
        record.add_subfield(b'u', b"http://example.org/item").unwrap();
        assert_eq!(record.find_in_field(b"example").unwrap(), Some(11));
        assert_eq!(record.find_in_field(b"missing").unwrap(), None);
    }

    #[test]
    fn test_fields_iterator() {
        let mut record = Record::new();
        record.add_field(1).unwrap();
        record.add_subfield(0, b"id1").unwrap();
        let views: Vec<_> = record.fields().collect();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].tag, 0);
        assert_eq!(views[1].data, b"id1");
    }
}
