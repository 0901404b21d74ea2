//! Strand-aware trimming of reads that start inside the insertion consensus.
//!
//! A targeted read begins in the inserted element and runs out into the
//! genome. Trimming keeps the genomic flank plus the stretch of consensus
//! between the target window midpoint and the read's entry point, oriented so
//! that upstream flanks end in, and downstream flanks start in, the element.

use std::collections::HashMap;

use crate::genomics::{reverse_complement, Alignment, Strand};

/// Parameters of the trimmer.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TrimParams {
    /// Reads whose consensus alignment starts later than this are rejected.
    pub max_trim_length: u64,
    /// Start of the targeted region on the consensus.
    pub target_start: u64,
    /// End of the targeted region on the consensus (exclusive).
    pub target_end: u64,
    /// Padding added to both sides of the target region.
    pub padding: u64,
}

impl TrimParams {
    /// Construct parameters with the default trim length and padding.
    pub fn for_target(target_start: u64, target_end: u64) -> Self {
        Self {
            max_trim_length: 100,
            target_start,
            target_end,
            padding: 20,
        }
    }

    /// Padded target window `(start, end, midpoint)`.
    pub fn window(&self) -> (u64, u64, u64) {
        let start = self.target_start.saturating_sub(self.padding);
        let end = self.target_end + self.padding;
        (start, end, (start + end) / 2)
    }
}

/// A trimmed read and the side of the breakpoint it flanks.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TrimmedRead {
    /// Consensus stub plus genomic flank.
    pub sequence: Vec<u8>,
    /// `-` for upstream flanks, `+` for downstream flanks.
    pub strand: Strand,
}

impl TrimmedRead {
    /// Whether this read lies upstream of the insertion.
    pub fn is_upstream(&self) -> bool {
        self.strand == Strand::Reverse
    }
}

/// Slice `seq[start..end]`, empty when inverted, clamped to the sequence.
fn slice_or_empty(seq: &[u8], start: u64, end: u64) -> &[u8] {
    let len = seq.len() as u64;
    let start = start.min(len) as usize;
    let end = end.min(len) as usize;
    if start >= end {
        &[]
    } else {
        &seq[start..end]
    }
}

/// Trim one read given its first alignment to the consensus.
pub fn trim_read(
    read: &[u8],
    aln: &Alignment,
    consensus: &[u8],
    params: &TrimParams,
) -> Option<TrimmedRead> {
    if aln.query_start > params.max_trim_length {
        return None;
    }
    let (window_start, window_end, mid) = params.window();
    let flank = slice_or_empty(read, aln.query_start, read.len() as u64);

    match aln.query_strand {
        Strand::Forward => {
            if !(window_start..=window_end).contains(&aln.ref_start) {
                return None;
            }
            let mut sequence = slice_or_empty(consensus, mid, aln.ref_start).to_vec();
            sequence.extend_from_slice(flank);
            Some(TrimmedRead {
                sequence,
                strand: Strand::Forward,
            })
        }
        Strand::Reverse => {
            if !(window_start..=window_end).contains(&aln.ref_end) {
                return None;
            }
            let mut sequence = reverse_complement(flank);
            sequence.extend_from_slice(slice_or_empty(consensus, aln.ref_end, mid));
            Some(TrimmedRead {
                sequence,
                strand: Strand::Reverse,
            })
        }
    }
}

/// First consensus alignment (lowest query start) of every read.
pub fn first_alignments<I>(alignments: I) -> HashMap<String, Alignment>
where
    I: IntoIterator<Item = Alignment>,
{
    let mut first: HashMap<String, Alignment> = HashMap::new();
    for aln in alignments {
        match first.get(&aln.query_name) {
            Some(kept) if kept.query_start <= aln.query_start => {}
            _ => {
                first.insert(aln.query_name.clone(), aln);
            }
        }
    }
    first
}

/// Trim every read that has a consensus alignment.
pub fn trim_reads<I>(
    reads: I,
    first_alns: &HashMap<String, Alignment>,
    consensus: &[u8],
    params: &TrimParams,
) -> HashMap<String, TrimmedRead>
where
    I: IntoIterator<Item = (String, Vec<u8>)>,
{
    reads
        .into_iter()
        .filter_map(|(name, seq)| {
            let aln = first_alns.get(&name)?;
            let trimmed = trim_read(&seq, aln, consensus, params)?;
            Some((name, trimmed))
        })
        .collect()
}
