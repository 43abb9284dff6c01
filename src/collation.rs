//! Subfield collation tables.
//!
//! A [`CollationTable`] assigns each subfield code a sort rank, used only when
//! the assembler sorts subfields on output. Tables are built from strings such
//! as `"aqzb-pr-y1-9"`: single codes and `first-last` ranges, ranked in the
//! order they appear. Codes the string does not mention rank after every
//! listed code; ties are broken by insertion order at sort time.

use crate::error::{MarcError, Result};
use crate::subfields::is_legal_subfield_code;
use lazy_static::lazy_static;
use std::fmt;

/// Collation string used when no other is configured.
pub const DEFAULT_COLLATION: &str = "aqzb-pr-y1-9";

/// Rank given to codes not mentioned in the collation string.
pub const UNRANKED: u8 = u8::MAX;

lazy_static! {
    static ref DEFAULT_TABLE: CollationTable = CollationTable::build(DEFAULT_COLLATION)
        .unwrap_or_else(|_| CollationTable::unranked());
}

/// Mapping from subfield code (0-127) to sort rank.
#[derive(Clone, PartialEq, Eq)]
pub struct CollationTable {
    ranks: [u8; 128],
    source: String,
}

impl fmt::Debug for CollationTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollationTable")
            .field("source", &self.source)
            .field("ranked_codes", &self.ranked_codes())
            .finish()
    }
}

impl Default for CollationTable {
    fn default() -> Self {
        DEFAULT_TABLE.clone()
    }
}

impl CollationTable {
    /// The process-wide default table, built from [`DEFAULT_COLLATION`].
    #[must_use]
    pub fn default_table() -> &'static CollationTable {
        &DEFAULT_TABLE
    }

    /// Parse a collation string.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidCollation`] for an illegal code, a range
    /// without an end, a descending range, or a code listed twice.
    ///
    /// # Examples
    ///
    /// ```
    /// use marc_engine::CollationTable;
    ///
    /// let table = CollationTable::parse("aqzb-p")?;
    /// assert!(table.rank(b'a') < table.rank(b'q'));
    /// assert!(table.rank(b'z') < table.rank(b'b'));
    /// assert!(table.rank(b'p') < table.rank(b'x'));
    /// # Ok::<(), marc_engine::MarcError>(())
    /// ```
    pub fn parse(spec: &str) -> Result<Self> {
        Self::build(spec)
    }

    fn unranked() -> Self {
        CollationTable {
            ranks: [UNRANKED; 128],
            source: String::new(),
        }
    }

    fn build(spec: &str) -> Result<Self> {
        let mut table = Self::unranked();
        table.source = spec.to_string();
        let bytes = spec.as_bytes();
        let mut next_rank: u8 = 0;
        let mut i = 0;

        while i < bytes.len() {
            let first = bytes[i];
            check_code(first, i)?;

            let last = if bytes.get(i + 1) == Some(&b'-') {
                let last = *bytes.get(i + 2).ok_or_else(|| {
                    MarcError::InvalidCollation(format!("range at position {i} has no end"))
                })?;
                check_code(last, i + 2)?;
                if last < first {
                    return Err(MarcError::InvalidCollation(format!(
                        "descending range {}-{}",
                        char::from(first),
                        char::from(last)
                    )));
                }
                i += 3;
                last
            } else {
                i += 1;
                first
            };

            for code in first..=last {
                let slot = &mut table.ranks[usize::from(code)];
                if *slot != UNRANKED {
                    return Err(MarcError::InvalidCollation(format!(
                        "code '{}' listed twice",
                        char::from(code)
                    )));
                }
                *slot = next_rank;
                next_rank += 1;
            }
        }

        Ok(table)
    }

    /// Sort rank of `code`; [`UNRANKED`] for codes not in the table.
    #[must_use]
    pub fn rank(&self, code: u8) -> u8 {
        self.ranks
            .get(usize::from(code))
            .copied()
            .unwrap_or(UNRANKED)
    }

    /// Number of codes given an explicit rank.
    #[must_use]
    pub fn ranked_codes(&self) -> usize {
        self.ranks.iter().filter(|&&rank| rank != UNRANKED).count()
    }

    /// The string this table was built from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

fn check_code(code: u8, position: usize) -> Result<()> {
    if code == b'-' || !is_legal_subfield_code(code) {
        return Err(MarcError::InvalidCollation(format!(
            "illegal code 0x{code:02X} at position {position}"
        )));
    }
    Ok(())
}
