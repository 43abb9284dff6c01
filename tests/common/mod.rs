//! Common test helpers shared across the integration test suite.

use marc_engine::{Record, DIRECTORY_ENTRY_LEN, LEADER_LEN};

/// Builds a record from `(tag, subfields)` pairs.
///
/// Fixed fields take their single entry's data as the field body (the code is
/// ignored); variable fields get blank indicators and one subfield per entry.
#[allow(dead_code)]
pub fn build_record(fields: &[(u16, Vec<(u8, &str)>)]) -> Record {
    let mut record = Record::new();
    for (tag, subfields) in fields {
        let tag = *tag;
        record.add_field(tag).expect("add_field failed");
        for &(code, data) in subfields {
            if tag < 10 {
                record.put_fixed(0, data.as_bytes()).expect("put_fixed failed");
            } else {
                record
                    .add_subfield(code, data.as_bytes())
                    .expect("add_subfield failed");
            }
        }
    }
    record
}

/// A small, realistic book record.
#[allow(dead_code)]
pub fn create_book_record() -> Record {
    build_record(&[
        (1, vec![(0, "ocm00012345")]),
        (8, vec![(0, "750101s1925    nyu           000 1 eng  ")]),
        (100, vec![(b'a', "Fitzgerald, F. Scott,"), (b'd', "1896-1940.")]),
        (
            245,
            vec![
                (b'a', "The great Gatsby /"),
                (b'c', "by F. Scott Fitzgerald."),
            ],
        ),
        (650, vec![(b'a', "Rich people"), (b'z', "New York (State)")]),
        (650, vec![(b'a', "Long Island (N.Y.)"), (b'v', "Fiction.")]),
    ])
}

/// Decodes the directory of an assembled record into `(tag, length, offset)`.
#[allow(dead_code)]
pub fn directory_entries(bytes: &[u8]) -> Vec<(u16, usize, usize)> {
    let digits = |range: std::ops::Range<usize>, source: &[u8]| -> usize {
        std::str::from_utf8(&source[range])
            .expect("non-UTF-8 digits")
            .parse()
            .expect("non-numeric digits")
    };
    let base = digits(12..17, bytes);
    bytes[LEADER_LEN..base - 1]
        .chunks(DIRECTORY_ENTRY_LEN)
        .map(|entry| {
            let tag = u16::try_from(digits(0..3, entry)).expect("tag out of range");
            (tag, digits(3..7, entry), digits(7..12, entry))
        })
        .collect()
}

/// Tags of an assembled record, in directory order.
#[allow(dead_code)]
pub fn assembled_tags(bytes: &[u8]) -> Vec<u16> {
    directory_entries(bytes)
        .into_iter()
        .map(|(tag, _, _)| tag)
        .collect()
}
