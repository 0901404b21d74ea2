use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Relative orientation of a query sequence against its reference.
///
/// `Forward` orders before `Reverse`, matching the `+` < `-` ordering used when
/// grouping alignments for joining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Strand {
    /// Query aligns in its forward orientation (`+`).
    Forward,
    /// Query aligns as its reverse complement (`-`).
    Reverse,
}

impl Strand {
    /// Single-character tag used in MAF, BED and trimmed-read names.
    pub fn symbol(self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }

    /// Parse a `+`/`-` character.
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '+' => Some(Strand::Forward),
            '-' => Some(Strand::Reverse),
            _ => None,
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for Strand {
    type Err = AlignmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                Strand::from_symbol(c).ok_or_else(|| AlignmentError::InvalidStrand(s.to_string()))
            }
            _ => Err(AlignmentError::InvalidStrand(s.to_string())),
        }
    }
}

/// Errors raised while constructing alignments.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AlignmentError {
    /// Strand field was not `+` or `-`.
    #[error("invalid strand '{0}' (expected '+' or '-')")]
    InvalidStrand(String),

    /// Interval is empty or extends past the end of its sequence.
    #[error("invalid {axis} interval [{start}, {end}) for sequence of length {length}")]
    InvalidInterval {
        /// Which axis was rejected (`reference` or `query`).
        axis: &'static str,
        /// Interval start.
        start: u64,
        /// Interval end.
        end: u64,
        /// Full sequence length.
        length: u64,
    },
}

/// One pairwise alignment block between a reference and a query sequence.
///
/// Reference coordinates are half-open and always increase along the
/// reference. Query coordinates are half-open and always expressed on the
/// forward strand of the query, whatever the alignment strand is; only
/// [`Alignment::join`] and [`Alignment::shrink`] interpret `query_strand`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Alignment {
    /// Reference sequence name.
    pub ref_name: String,
    /// Full reference sequence length.
    pub ref_length: u64,
    /// 0-based reference start.
    pub ref_start: u64,
    /// Reference end (exclusive).
    pub ref_end: u64,
    /// Query sequence name.
    pub query_name: String,
    /// Full query sequence length.
    pub query_length: u64,
    /// 0-based forward-strand query start.
    pub query_start: u64,
    /// Forward-strand query end (exclusive).
    pub query_end: u64,
    /// Orientation of the query against the reference.
    pub query_strand: Strand,
}

impl Alignment {
    /// Construct an alignment, validating both intervals.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ref_name: impl Into<String>,
        ref_length: u64,
        ref_start: u64,
        ref_end: u64,
        query_name: impl Into<String>,
        query_length: u64,
        query_start: u64,
        query_end: u64,
        query_strand: Strand,
    ) -> Result<Self, AlignmentError> {
        if ref_start >= ref_end || ref_end > ref_length {
            return Err(AlignmentError::InvalidInterval {
                axis: "reference",
                start: ref_start,
                end: ref_end,
                length: ref_length,
            });
        }
        if query_start >= query_end || query_end > query_length {
            return Err(AlignmentError::InvalidInterval {
                axis: "query",
                start: query_start,
                end: query_end,
                length: query_length,
            });
        }
        Ok(Self {
            ref_name: ref_name.into(),
            ref_length,
            ref_start,
            ref_end,
            query_name: query_name.into(),
            query_length,
            query_start,
            query_end,
            query_strand,
        })
    }

    /// Number of reference bases spanned.
    pub fn ref_span(&self) -> u64 {
        self.ref_end - self.ref_start
    }

    /// Number of query bases spanned.
    pub fn query_span(&self) -> u64 {
        self.query_end - self.query_start
    }

    /// Whether `other` describes the same reference, query and orientation.
    pub fn same_track(&self, other: &Alignment) -> bool {
        self.ref_name == other.ref_name
            && self.query_name == other.query_name
            && self.query_strand == other.query_strand
    }

    /// Merge two co-linear alignments into their outer envelope.
    ///
    /// `self` is tried both before and after `other` along the query. On the
    /// forward strand the later block must also lie later on the reference;
    /// on the reverse strand it must lie earlier, so the reference gap is
    /// measured the other way round. Gaps are signed, so slightly overlapping
    /// blocks pass. Returns `None` when the two blocks cannot belong to one
    /// continuous alignment.
    pub fn join(&self, other: &Alignment, ref_gap: u64, query_gap: u64) -> Option<Alignment> {
        if !self.same_track(other) {
            return None;
        }
        let colinear = |first: &Alignment, second: &Alignment| {
            if first.query_start > second.query_start
                || gap(first.query_end, second.query_start) > query_gap as i64
            {
                return false;
            }
            match first.query_strand {
                Strand::Forward => {
                    first.ref_start <= second.ref_start
                        && gap(first.ref_end, second.ref_start) <= ref_gap as i64
                }
                Strand::Reverse => {
                    second.ref_start <= first.ref_start
                        && gap(second.ref_end, first.ref_start) <= ref_gap as i64
                }
            }
        };
        if !colinear(self, other) && !colinear(other, self) {
            return None;
        }

        Some(Alignment {
            ref_name: self.ref_name.clone(),
            ref_length: self.ref_length,
            ref_start: self.ref_start.min(other.ref_start),
            ref_end: self.ref_end.max(other.ref_end),
            query_name: self.query_name.clone(),
            query_length: self.query_length,
            query_start: self.query_start.min(other.query_start),
            query_end: self.query_end.max(other.query_end),
            query_strand: self.query_strand,
        })
    }

    /// Truncate to a query span of exactly `to_length`.
    ///
    /// The query interval keeps its start. On the reference the retained
    /// block keeps the alignment's start as seen from the read: `ref_start`
    /// for forward alignments, `ref_end` for reverse ones. The reference
    /// side is clamped to the sequence bounds.
    pub fn shrink(&mut self, to_length: u64) {
        self.query_end = self.query_start + to_length;
        match self.query_strand {
            Strand::Forward => {
                self.ref_end = (self.ref_start + to_length).min(self.ref_length);
            }
            Strand::Reverse => {
                self.ref_start = self.ref_end.saturating_sub(to_length);
            }
        }
    }

    /// BED6 rendering with a fixed score of 0 (no trailing newline).
    pub fn to_bed(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t0\t{}",
            self.ref_name, self.ref_start, self.ref_end, self.query_name, self.query_strand
        )
    }

    /// Ordering key used by the join engine.
    pub(crate) fn join_order(&self, other: &Alignment) -> Ordering {
        self.query_strand
            .cmp(&other.query_strand)
            .then_with(|| self.ref_name.cmp(&other.ref_name))
            .then_with(|| self.ref_start.cmp(&other.ref_start))
    }
}

/// Signed distance from the end of one block to the start of the next.
fn gap(from_end: u64, to_start: u64) -> i64 {
    to_start as i64 - from_end as i64
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_bed())
    }
}

/// Reverse complement of a nucleotide sequence.
///
/// Only `ACGT` (either case) are complemented; other symbols are kept as-is.
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|&base| match base {
            b'A' => b'T',
            b'C' => b'G',
            b'G' => b'C',
            b'T' => b'A',
            b'a' => b't',
            b'c' => b'g',
            b'g' => b'c',
            b't' => b'a',
            other => other,
        })
        .collect()
}
