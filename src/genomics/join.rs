//! Read-level consolidation of alignment fragments.
//!
//! [`join_all`] folds a read's fragments into co-linear super-alignments and
//! [`GenomeFilter`] uses it to pick one anchor alignment per read for the
//! coverage track.

use std::collections::HashSet;

use tracing::debug;

use crate::genomics::Alignment;

/// Reference gap allowed when joining a read's genome fragments.
pub const GENOME_REF_GAP: u64 = 200;
/// Query gap allowed when joining a read's genome fragments.
pub const GENOME_QUERY_GAP: u64 = 1_000;
/// Query span of an emitted anchor alignment.
pub const ANCHOR_LENGTH: u64 = 200;

/// Greedily merge alignments into the fewest co-linear blocks.
///
/// Input is sorted by `(query_strand, ref_name, ref_start)` and folded left
/// to right; each alignment is joined into the last accumulated block or
/// appended. A successful join is retried against the preceding block so no
/// two neighbours in the output remain joinable.
pub fn join_all<I>(alignments: I, ref_gap: u64, query_gap: u64) -> Vec<Alignment>
where
    I: IntoIterator<Item = Alignment>,
{
    let mut sorted: Vec<Alignment> = alignments.into_iter().collect();
    sorted.sort_by(|a, b| a.join_order(b));

    let mut joined: Vec<Alignment> = Vec::with_capacity(sorted.len());
    for aln in sorted {
        let merged = match joined.last() {
            Some(prev) => prev.join(&aln, ref_gap, query_gap),
            None => None,
        };
        match merged {
            Some(block) => {
                let last = joined.len() - 1;
                joined[last] = block;
                collapse_tail(&mut joined, ref_gap, query_gap);
            }
            None => joined.push(aln),
        }
    }
    joined
}

fn collapse_tail(joined: &mut Vec<Alignment>, ref_gap: u64, query_gap: u64) {
    while joined.len() >= 2 {
        let n = joined.len();
        match joined[n - 2].join(&joined[n - 1], ref_gap, query_gap) {
            Some(block) => {
                joined.pop();
                joined[n - 2] = block;
            }
            None => break,
        }
    }
}

/// Which reference contigs may carry anchor alignments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContigFilter {
    /// Drop fragments on the listed contigs (mitochondrial, viral decoys).
    Exclude(HashSet<String>),
    /// Keep only fragments on the listed contigs.
    Include(HashSet<String>),
}

impl ContigFilter {
    /// Whether fragments on `contig` survive the filter.
    pub fn allows(&self, contig: &str) -> bool {
        match self {
            ContigFilter::Exclude(names) => !names.contains(contig),
            ContigFilter::Include(names) => names.contains(contig),
        }
    }
}

impl Default for ContigFilter {
    fn default() -> Self {
        ContigFilter::Exclude(["chrM", "chrEBV"].iter().map(|s| s.to_string()).collect())
    }
}

/// Thresholds applied to each read's genome alignments.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct FilterParams {
    /// Reads shorter than this are ignored.
    pub min_read_length: u64,
    /// Anchors covering at least this fraction of the read are rejected.
    pub max_proportion: f64,
    /// Anchors covering at most this fraction of the read are rejected.
    pub min_proportion: f64,
    /// Minimum number of read bases left outside the anchor.
    pub min_unaligned: u64,
    /// Exogenous insertions need no second genomic fragment.
    pub exogenous: bool,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            min_read_length: 500,
            max_proportion: 0.99,
            min_proportion: 0.4,
            min_unaligned: 100,
            exogenous: false,
        }
    }
}

/// Selects one shrunken anchor alignment per read.
#[derive(Debug, Clone, Default)]
pub struct GenomeFilter {
    params: FilterParams,
    contigs: ContigFilter,
}

impl GenomeFilter {
    /// Construct a filter from thresholds and a contig filter.
    pub fn new(params: FilterParams, contigs: ContigFilter) -> Self {
        Self { params, contigs }
    }

    /// Thresholds in use.
    pub fn params(&self) -> &FilterParams {
        &self.params
    }

    /// Decide the anchor for one read, given all of its alignments.
    pub fn anchor_for_read(&self, read_length: u64, alignments: Vec<Alignment>) -> Option<Alignment> {
        let params = &self.params;
        if read_length < params.min_read_length {
            return None;
        }

        let joined: Vec<Alignment> = join_all(alignments, GENOME_REF_GAP, GENOME_QUERY_GAP)
            .into_iter()
            .filter(|aln| self.contigs.allows(&aln.ref_name))
            .collect();
        if !params.exogenous && joined.len() < 2 {
            return None;
        }

        // max_by_key keeps the last maximum; fold keeps the first.
        let mut anchor = joined.into_iter().fold(None::<Alignment>, |best, aln| match best {
            Some(b) if b.ref_span() >= aln.ref_span() => Some(b),
            _ => Some(aln),
        })?;

        // The longest block is chosen on the reference; coverage of the read is
        // measured on the query.
        let span = anchor.query_span();
        let proportion = span as f64 / read_length as f64;
        if proportion >= params.max_proportion || proportion <= params.min_proportion {
            return None;
        }
        if read_length.saturating_sub(span) < params.min_unaligned {
            return None;
        }

        anchor.shrink(ANCHOR_LENGTH);
        Some(anchor)
    }

    /// Run the filter over a stream of alignments grouped by read.
    ///
    /// Consecutive alignments sharing `(query_name, query_length)` form one
    /// read, so the stream must be grouped the way an aligner emits it.
    pub fn filter<I>(&self, alignments: I) -> Vec<(String, Alignment)>
    where
        I: IntoIterator<Item = Alignment>,
    {
        let mut anchors = Vec::new();
        let mut considered = 0usize;
        for (name, length, group) in ReadGroups::new(alignments.into_iter()) {
            considered += 1;
            if let Some(anchor) = self.anchor_for_read(length, group) {
                anchors.push((name, anchor));
            }
        }
        debug!(considered, accepted = anchors.len(), "genome alignment filter finished");
        anchors
    }
}

/// Iterator adaptor grouping consecutive alignments of the same read.
#[derive(Debug)]
pub struct ReadGroups<I: Iterator<Item = Alignment>> {
    inner: std::iter::Peekable<I>,
}

impl<I: Iterator<Item = Alignment>> ReadGroups<I> {
    /// Wrap an alignment iterator.
    pub fn new(inner: I) -> Self {
        Self {
            inner: inner.peekable(),
        }
    }
}

impl<I: Iterator<Item = Alignment>> Iterator for ReadGroups<I> {
    type Item = (String, u64, Vec<Alignment>);

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.inner.next()?;
        let name = first.query_name.clone();
        let length = first.query_length;
        let mut group = vec![first];
        while let Some(next) = self
            .inner
            .next_if(|aln| aln.query_name == name && aln.query_length == length)
        {
            group.push(next);
        }
        Some((name, length, group))
    }
}
