//! Serialization of a record to the ISO 2709 wire format.
//!
//! Assembly never touches the working copy's field order: fields (and,
//! optionally, subfields) are sorted into a list of references and copied out
//! in that order. Empty fields are left out entirely.
//!
//! # Output layout
//!
//! ```text
//! leader(24) | directory entries(12 each) FT | field body FT ... | RT
//! ```
//!
//! Each directory entry is `tag(3) length(4) offset(5)`, where length counts the
//! field terminator and offset is relative to the base address of data.

use crate::buffer::RawBuffer;
use crate::collation::CollationTable;
use crate::config::SortOptions;
use crate::directory::{FieldDirectory, FieldEntry};
use crate::error::{MarcError, Result};
use crate::leader::write_digits;
use crate::record::Record;
use crate::subfields::{scan_field, FIRST_SUBFIELD};
use crate::{
    DIRECTORY_ENTRY_LEN, FIELD_TERMINATOR, LEADER_LEN, MAX_FIELD_LENGTH, MAX_RECORD_LENGTH,
    RECORD_TERMINATOR,
};
use bytes::{BufMut, BytesMut};

/// Fields selected for output, with the sizes derived from them.
struct Plan<'a> {
    fields: Vec<&'a FieldEntry>,
    directory_len: usize,
    total_len: usize,
}

impl Plan<'_> {
    fn base_address(&self) -> usize {
        LEADER_LEN + self.directory_len
    }
}

/// Select non-empty fields, check lengths, and order them for output.
fn plan<'a>(fields: &'a FieldDirectory, sort: &SortOptions) -> Result<Plan<'a>> {
    let mut emitted: Vec<&FieldEntry> = fields
        .entries()
        .iter()
        .skip(1)
        .filter(|entry| !entry.is_empty())
        .collect();

    let mut data_len = 1;
    for entry in &emitted {
        if entry.span() > MAX_FIELD_LENGTH {
            return Err(MarcError::FieldTooLong {
                tag: entry.tag,
                length: entry.span(),
            });
        }
        data_len += entry.span();
    }
    let directory_len = emitted.len() * DIRECTORY_ENTRY_LEN + 1;
    let total_len = LEADER_LEN + directory_len + data_len;
    if total_len > MAX_RECORD_LENGTH {
        return Err(MarcError::RecordTooLong {
            length: total_len,
            max: MAX_RECORD_LENGTH,
        });
    }

    if sort.sort_fields {
        // sort_by_key is stable; order breaks the remaining ties anyway.
        emitted.sort_by_key(|entry| (field_sort_key(entry.tag, sort.protected_tags), entry.order));
    }

    Ok(Plan {
        fields: emitted,
        directory_len,
        total_len,
    })
}

/// Primary sort key of a field. Every tag inside the protected range sorts as
/// the range start, so those fields keep their insertion order among
/// themselves.
fn field_sort_key(tag: u16, protected: Option<(u16, u16)>) -> u16 {
    match protected {
        Some((first, last)) if (first..=last).contains(&tag) => first,
        _ => tag,
    }
}

/// Primary sort key of a subfield, with the same treatment of a protected
/// rank range.
fn subfield_sort_key(rank: u8, protected: Option<(u8, u8)>) -> u8 {
    match protected {
        Some((first, last)) if (first..=last).contains(&rank) => first,
        _ => rank,
    }
}

/// Assemble the record into `out`; returns the logical record length.
///
/// `out` holds the record followed by one NUL byte that is not counted.
pub(crate) fn assemble(
    raw: &RawBuffer,
    fields: &FieldDirectory,
    collation: &CollationTable,
    sort: &SortOptions,
    out: &mut BytesMut,
) -> Result<usize> {
    let plan = plan(fields, sort)?;

    out.clear();
    out.reserve(plan.total_len + 1);

    let mut leader = [0u8; LEADER_LEN];
    leader.copy_from_slice(raw.slice(0..LEADER_LEN));
    write_digits(&mut leader[0..5], plan.total_len);
    write_digits(&mut leader[12..17], plan.base_address());
    out.put_slice(&leader);

    let mut offset = 0;
    for entry in &plan.fields {
        let mut directory_entry = [0u8; DIRECTORY_ENTRY_LEN];
        write_digits(&mut directory_entry[0..3], usize::from(entry.tag));
        write_digits(&mut directory_entry[3..7], entry.span());
        write_digits(&mut directory_entry[7..12], offset);
        out.put_slice(&directory_entry);
        offset += entry.span();
    }
    out.put_u8(FIELD_TERMINATOR);

    for entry in &plan.fields {
        let body = raw.slice(entry.offset..entry.offset + entry.length);
        if sort.sort_subfields && !entry.is_fixed() {
            put_sorted_subfields(raw, entry, body, collation, out)?;
        } else {
            out.put_slice(body);
        }
        out.put_u8(FIELD_TERMINATOR);
    }
    out.put_u8(RECORD_TERMINATOR);

    if out.len() != plan.total_len {
        return Err(MarcError::CorruptField {
            tag: 0,
            reason: "assembled length disagrees with directory",
        });
    }
    out.put_u8(0);

    tracing::debug!(
        fields = plan.fields.len(),
        length = plan.total_len,
        base_address = plan.base_address(),
        "record assembled"
    );
    Ok(plan.total_len)
}

/// Copy a variable field with its subfields in collation order.
fn put_sorted_subfields(
    raw: &RawBuffer,
    entry: &FieldEntry,
    body: &[u8],
    collation: &CollationTable,
    out: &mut BytesMut,
) -> Result<()> {
    let subfields = scan_field(entry.tag, body, entry.offset, collation)?;
    let mut order: Vec<usize> = (FIRST_SUBFIELD..subfields.len()).collect();
    order.sort_by_key(|&ordinal| {
        let subfield = &subfields[ordinal];
        (
            subfield_sort_key(subfield.rank, entry.protected_ranks),
            subfield.order,
        )
    });

    out.put_slice(&body[..FIRST_SUBFIELD]);
    for ordinal in order {
        out.put_slice(raw.slice(subfields[ordinal].span(ordinal)));
    }
    Ok(())
}

impl Record {
    /// Assemble the record in wire format and return it.
    ///
    /// The returned slice lives in a buffer owned by the record and reused by
    /// the next call; copy it out to keep it. The leader of the working copy
    /// is updated with the new record length and base address.
    ///
    /// # Errors
    ///
    /// - [`MarcError::FieldTooLong`] if a field exceeds 9999 bytes
    /// - [`MarcError::RecordTooLong`] if the record would exceed 99999 bytes
    /// - [`MarcError::CorruptField`] if a field fails to scan during subfield sorting
    ///
    /// Nothing is returned on failure; the record itself is unchanged.
    pub fn get_record(&mut self) -> Result<&[u8]> {
        let length = assemble(
            &self.raw,
            &self.fields,
            &self.collation,
            &self.config.sort,
            &mut self.output,
        )?;
        self.raw.overwrite(0, &self.output[..LEADER_LEN])?;
        Ok(&self.output[..length])
    }

    /// Assemble the record into a fresh vector, leaving the record untouched.
    ///
    /// # Errors
    ///
    /// As for [`Record::get_record`].
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = BytesMut::new();
        let length = assemble(
            &self.raw,
            &self.fields,
            &self.collation,
            &self.config.sort,
            &mut out,
        )?;
        out.truncate(length);
        Ok(out.to_vec())
    }

    /// Length the assembled record would have, without assembling it.
    ///
    /// # Errors
    ///
    /// [`MarcError::FieldTooLong`] or [`MarcError::RecordTooLong`].
    pub fn serialized_len(&self) -> Result<usize> {
        Ok(plan(&self.fields, &self.config.sort)?.total_len)
    }
}
