//! Sequential navigation and saved positions.
//!
//! A record carries one cursor: a current field (directory ordinal) and,
//! within a variable field, a current subfield (ordinal in the subfield
//! directory, indicators at 0 and 1). A fresh or rewound record has no current
//! field; the first [`Record::next_field`] lands on the leader.
//!
//! Positions are saved by the field's insertion counter rather than its
//! ordinal, so a saved field can be found again after other fields were added
//! or deleted around it.

use crate::error::{MarcError, Result};
use crate::record::{Record, SubfieldView};
use crate::FIXED_FIELD_LIMIT;

/// Deepest allowed save-position stack.
pub const MAX_POSITION_DEPTH: usize = 31;

/// Current field and subfield.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    /// Directory ordinal of the current field.
    pub field: Option<usize>,
    /// Subfield ordinal within the current field.
    pub subfield: Option<usize>,
}

/// Bounded stack of saved field identities.
#[derive(Debug, Clone)]
pub struct PositionStack {
    orders: Vec<u32>,
    depth: usize,
}

impl PositionStack {
    /// Empty stack holding at most `depth` positions.
    #[must_use]
    pub fn new(depth: usize) -> Self {
        PositionStack {
            orders: Vec::with_capacity(depth),
            depth,
        }
    }

    /// Number of saved positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// True if nothing is saved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Maximum depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    fn push(&mut self, order: u32) -> Result<()> {
        if self.orders.len() >= self.depth {
            return Err(MarcError::PositionStackFull { depth: self.depth });
        }
        self.orders.push(order);
        Ok(())
    }

    fn pop(&mut self) -> Option<u32> {
        self.orders.pop()
    }

    pub(crate) fn clear(&mut self) {
        self.orders.clear();
    }
}

/// One step of [`Record::next_item`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Item {
    /// Directory ordinal of the field.
    pub ordinal: usize,
    /// Field tag.
    pub tag: u16,
    /// Subfield ordinal, `None` when the step landed on a fixed field.
    pub subfield: Option<usize>,
}

impl Record {
    /// Move to the next field; returns its tag.
    ///
    /// # Errors
    ///
    /// [`MarcError::EndOfRecord`] past the last field. The cursor stays put.
    pub fn next_field(&mut self) -> Result<u16> {
        let next = self.cursor.field.map_or(0, |index| index + 1);
        self.move_to_field(next)
    }

    /// Move to the previous field; returns its tag. With no current field
    /// this moves to the last one.
    ///
    /// # Errors
    ///
    /// [`MarcError::EndOfRecord`] before the leader. The cursor stays put.
    pub fn prev_field(&mut self) -> Result<u16> {
        let previous = match self.cursor.field {
            None => self.fields.len() - 1,
            Some(0) => return Err(MarcError::EndOfRecord),
            Some(index) => index - 1,
        };
        self.move_to_field(previous)
    }

    fn move_to_field(&mut self, index: usize) -> Result<u16> {
        let tag = self.fields.get(index).ok_or(MarcError::EndOfRecord)?.tag;
        self.cursor.field = Some(index);
        self.cursor.subfield = None;
        Ok(tag)
    }

    /// Move to the next subfield of the current field. Starting with no
    /// current subfield, the first step lands on indicator 1.
    ///
    /// # Errors
    ///
    /// - [`MarcError::NoCurrentField`]
    /// - [`MarcError::NotVariableField`] on a fixed field
    /// - [`MarcError::EndOfRecord`] past the last subfield
    pub fn next_subfield(&mut self) -> Result<SubfieldView<'_>> {
        self.require_variable()?;
        self.ensure_subfields()?;
        let next = self.cursor.subfield.map_or(0, |ordinal| ordinal + 1);
        if next >= self.subfields.len() {
            return Err(MarcError::EndOfRecord);
        }
        self.cursor.subfield = Some(next);
        self.current_subfield()
    }

    /// Move to the previous subfield of the current field. Starting with no
    /// current subfield, the first step lands on the last subfield.
    ///
    /// # Errors
    ///
    /// As for [`Record::next_subfield`]; [`MarcError::EndOfRecord`] before
    /// indicator 1.
    pub fn prev_subfield(&mut self) -> Result<SubfieldView<'_>> {
        self.require_variable()?;
        self.ensure_subfields()?;
        let previous = match self.cursor.subfield {
            None => self.subfields.len() - 1,
            Some(0) => return Err(MarcError::EndOfRecord),
            Some(ordinal) => ordinal - 1,
        };
        self.cursor.subfield = Some(previous);
        self.current_subfield()
    }

    /// Step through the record field by field and, inside variable fields,
    /// subfield by subfield, starting each variable field at indicator 1.
    ///
    /// ```
    /// use marc_engine::{MarcError, Record};
    ///
    /// # fn main() -> marc_engine::Result<()> {
    /// let mut record = Record::new();
    /// record.add_field(245)?;
    /// record.add_subfield(b'a', b"Title")?;
    /// record.rewind();
    ///
    /// let mut steps = Vec::new();
    /// loop {
    ///     match record.next_item() {
    ///         Ok(item) => steps.push((item.tag, item.subfield)),
    ///         Err(MarcError::EndOfRecord) => break,
    ///         Err(e) => return Err(e),
    ///     }
    /// }
    /// assert_eq!(steps, [(0, None), (245, Some(0)), (245, Some(1)), (245, Some(2))]);
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// [`MarcError::EndOfRecord`] after the last subfield of the last field,
    /// or [`MarcError::CorruptField`] if a field body does not scan.
    pub fn next_item(&mut self) -> Result<Item> {
        if let Some(index) = self.cursor.field {
            if self.fields.get(index).is_some_and(|entry| !entry.is_fixed()) {
                self.ensure_subfields()?;
                let next = self.cursor.subfield.map_or(0, |ordinal| ordinal + 1);
                if next < self.subfields.len() {
                    self.cursor.subfield = Some(next);
                    return Ok(Item {
                        ordinal: index,
                        tag: self.fields.entries()[index].tag,
                        subfield: Some(next),
                    });
                }
            }
        }

        let tag = self.next_field()?;
        let ordinal = self.current_index()?;
        let subfield = if tag < FIXED_FIELD_LIMIT {
            None
        } else {
            self.ensure_subfields()?;
            Some(0)
        };
        self.cursor.subfield = subfield;
        Ok(Item {
            ordinal,
            tag,
            subfield,
        })
    }

    /// Clear the cursor so the next forward step starts at the leader.
    /// Saved positions are kept.
    pub fn rewind(&mut self) {
        self.cursor = Cursor::default();
    }

    /// Push the current field onto the position stack.
    ///
    /// # Errors
    ///
    /// [`MarcError::NoCurrentField`], or [`MarcError::PositionStackFull`] when
    /// the stack is at its configured depth.
    pub fn save_position(&mut self) -> Result<()> {
        let index = self.current_index()?;
        let order = self.fields.entries()[index].order;
        self.positions.push(order)
    }

    /// Pop the most recent saved position and make that field current again;
    /// returns its ordinal. The subfield cursor is cleared.
    ///
    /// The saved entry is consumed even if its field no longer exists.
    ///
    /// # Errors
    ///
    /// [`MarcError::NoSavedPosition`] if the stack is empty, or
    /// [`MarcError::SavedFieldDeleted`] if the field was deleted since.
    pub fn restore_position(&mut self) -> Result<usize> {
        let order = self.positions.pop().ok_or(MarcError::NoSavedPosition)?;
        let index = self
            .fields
            .position_of_order(order)
            .ok_or(MarcError::SavedFieldDeleted)?;
        self.cursor.field = Some(index);
        self.cursor.subfield = None;
        Ok(index)
    }

    /// Number of saved positions.
    #[must_use]
    pub fn saved_positions(&self) -> usize {
        self.positions.len()
    }

    fn require_variable(&self) -> Result<()> {
        let tag = self.current_tag()?;
        if tag < FIXED_FIELD_LIMIT {
            return Err(MarcError::NotVariableField { tag });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn sample() -> Record {
        let mut record = Record::new();
        record.add_field(1).unwrap();
        record.add_subfield(0, b"id").unwrap();
        record.add_field(245).unwrap();
        record.add_subfield(b'a', b"Title").unwrap();
        record.add_subfield(b'c', b"Author").unwrap();
        record.add_field(500).unwrap();
        record.add_subfield(b'a', b"Note").unwrap();
        record.rewind();
        record
    }

    #[test]
    fn test_next_field_walks_from_leader() {
        let mut record = sample();
        assert_eq!(record.next_field().unwrap(), 0);
        assert_eq!(record.next_field().unwrap(), 1);
        assert_eq!(record.next_field().unwrap(), 245);
        assert_eq!(record.next_field().unwrap(), 500);
        assert!(matches!(record.next_field(), Err(MarcError::EndOfRecord)));
        assert_eq!(record.current_tag().unwrap(), 500);
    }

    #[test]
    fn test_prev_field_walks_from_end() {
        let mut record = sample();
        assert_eq!(record.prev_field().unwrap(), 500);
        assert_eq!(record.prev_field().unwrap(), 245);
        assert_eq!(record.prev_field().unwrap(), 1);
        assert_eq!(record.prev_field().unwrap(), 0);
        assert!(matches!(record.prev_field(), Err(MarcError::EndOfRecord)));
    }

    #[test]
    fn test_subfield_stepping() {
        let mut record = sample();
        record.get_field(245, 0).unwrap();
        assert_eq!(record.next_subfield().unwrap().data, b" ");
        assert_eq!(record.next_subfield().unwrap().ordinal, 1);
        let view = record.next_subfield().unwrap();
        assert_eq!((view.code, view.data), (Some(b'a'), &b"Title"[..]));
        assert_eq!(record.next_subfield().unwrap().code, Some(b'c'));
        assert!(matches!(
            record.next_subfield(),
            Err(MarcError::EndOfRecord)
        ));
        assert_eq!(record.prev_subfield().unwrap().code, Some(b'a'));
    }

    #[test]
    fn test_subfield_stepping_on_fixed_field() {
        let mut record = sample();
        record.get_field(1, 0).unwrap();
        assert!(matches!(
            record.next_subfield(),
            Err(MarcError::NotVariableField { tag: 1 })
        ));
    }

    #[test]
    fn test_next_item_rolls_over_fields() {
        let mut record = sample();
        let mut steps = Vec::new();
        while let Ok(item) = record.next_item() {
            steps.push((item.tag, item.subfield));
        }
        assert_eq!(
            steps,
            [
                (0, None),
                (1, None),
                (245, Some(0)),
                (245, Some(1)),
                (245, Some(2)),
                (245, Some(3)),
                (500, Some(0)),
                (500, Some(1)),
                (500, Some(2)),
            ]
        );
    }

    #[test]
    fn test_save_and_restore_survive_insertions() {
        let mut record = sample();
        record.get_field(245, 0).unwrap();
        record.save_position().unwrap();
        record.get_field(1, 0).unwrap();
        record.delete_field().unwrap();
        record.add_field(650).unwrap();

        let ordinal = record.restore_position().unwrap();
        assert_eq!(ordinal, 1);
        assert_eq!(record.current_tag().unwrap(), 245);
        assert_eq!(record.saved_positions(), 0);
    }

    #[test]
    fn test_restore_after_delete_fails_distinctly() {
        let mut record = sample();
        record.get_field(500, 0).unwrap();
        record.save_position().unwrap();
        record.delete_field().unwrap();
        assert!(matches!(
            record.restore_position(),
            Err(MarcError::SavedFieldDeleted)
        ));
        assert!(matches!(
            record.restore_position(),
            Err(MarcError::NoSavedPosition)
        ));
    }

    #[test]
    fn test_position_stack_is_bounded() {
        let config = EngineConfig {
            position_stack_depth: 2,
            ..EngineConfig::default()
        };
        let mut record = Record::with_config(&config).unwrap();
        record.add_field(245).unwrap();
        record.save_position().unwrap();
        record.save_position().unwrap();
        assert!(matches!(
            record.save_position(),
            Err(MarcError::PositionStackFull { depth: 2 })
        ));
    }

    #[test]
    fn test_save_without_current_field() {
        let mut record = sample();
        assert!(matches!(
            record.save_position(),
            Err(MarcError::NoCurrentField)
        ));
    }
}
