//! In-process interval arithmetic: sorting, genome coverage, intersection and
//! subtraction over half-open BED-style intervals.

use std::collections::HashMap;
use std::fmt;

use crate::genomics::Alignment;

/// Ordered mapping of contig names to lengths.
///
/// Iteration follows insertion order, which is the order coverage is
/// reported in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContigLengths {
    names: Vec<String>,
    lengths: HashMap<String, u64>,
}

impl ContigLengths {
    /// Empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or update a contig. Updating keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, length: u64) {
        let name = name.into();
        if self.lengths.insert(name.clone(), length).is_none() {
            self.names.push(name);
        }
    }

    /// Length of `name`, if known.
    pub fn get(&self, name: &str) -> Option<u64> {
        self.lengths.get(name).copied()
    }

    /// Number of contigs.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the mapping is empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Contigs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.names
            .iter()
            .map(move |name| (name.as_str(), self.lengths[name]))
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for ContigLengths {
    fn from_iter<T: IntoIterator<Item = (S, u64)>>(iter: T) -> Self {
        let mut contigs = ContigLengths::new();
        for (name, length) in iter {
            contigs.insert(name, length);
        }
        contigs
    }
}

/// One record of a coverage track (bedgraph line).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct CoverageRecord {
    /// Contig name.
    pub chrom: String,
    /// Interval start.
    pub start: u64,
    /// Interval end (exclusive).
    pub end: u64,
    /// Number of intervals covering every base of the record.
    pub depth: u32,
}

impl fmt::Display for CoverageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}\t{}", self.chrom, self.start, self.end, self.depth)
    }
}

/// Named genomic interval, as read from or written to BED.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Interval {
    /// Contig name.
    pub chrom: String,
    /// Start (0-based).
    pub start: u64,
    /// End (exclusive).
    pub end: u64,
    /// Name column; read name for anchors.
    pub name: String,
}

impl Interval {
    /// Construct an interval.
    pub fn new(chrom: impl Into<String>, start: u64, end: u64, name: impl Into<String>) -> Self {
        Self {
            chrom: chrom.into(),
            start,
            end,
            name: name.into(),
        }
    }

    /// Whether the two intervals share at least one base.
    pub fn overlaps(&self, chrom: &str, start: u64, end: u64) -> bool {
        self.chrom == chrom && self.start < end && self.end > start
    }
}

impl From<&Alignment> for Interval {
    fn from(aln: &Alignment) -> Self {
        Interval::new(aln.ref_name.clone(), aln.ref_start, aln.ref_end, aln.query_name.clone())
    }
}

/// Length shared by `[start1, end1)` and `[start2, end2)`; 0 when disjoint.
pub fn overlap_length(start1: u64, end1: u64, start2: u64, end2: u64) -> u64 {
    if start1 >= end2 || end1 <= start2 {
        return 0;
    }
    end1.min(end2) - start1.max(start2)
}

/// Sort intervals by `(chrom, start, end)`.
pub fn sort_intervals(intervals: &mut [Interval]) {
    intervals.sort_by(|a, b| {
        a.chrom
            .cmp(&b.chrom)
            .then(a.start.cmp(&b.start))
            .then(a.end.cmp(&b.end))
    });
}

/// Per-base coverage of `intervals`, reported as constant-depth runs.
///
/// Every contig of `contigs` is covered end to end in map order, zero-depth
/// runs included, so the track doubles as input for peak detection.
/// Intervals on unknown contigs are ignored and the rest are clamped to
/// the contig length.
pub fn genome_coverage(intervals: &[Interval], contigs: &ContigLengths) -> Vec<CoverageRecord> {
    let mut events: HashMap<&str, Vec<(u64, i64)>> = HashMap::new();
    for iv in intervals {
        let Some(length) = contigs.get(&iv.chrom) else {
            continue;
        };
        let start = iv.start.min(length);
        let end = iv.end.min(length);
        if start >= end {
            continue;
        }
        let entry = events.entry(iv.chrom.as_str()).or_default();
        entry.push((start, 1));
        entry.push((end, -1));
    }

    let mut track = Vec::new();
    for (chrom, length) in contigs.iter() {
        if length == 0 {
            continue;
        }
        let mut points = events.remove(chrom).unwrap_or_default();
        points.sort_unstable();

        let mut depth: i64 = 0;
        let mut run_start = 0u64;
        let mut idx = 0;
        while idx < points.len() {
            let pos = points[idx].0;
            let mut next_depth = depth;
            while idx < points.len() && points[idx].0 == pos {
                next_depth += points[idx].1;
                idx += 1;
            }
            if next_depth != depth {
                push_run(&mut track, chrom, run_start, pos, depth);
                run_start = pos;
                depth = next_depth;
            }
        }
        push_run(&mut track, chrom, run_start, length, depth);
    }
    track
}

fn push_run(track: &mut Vec<CoverageRecord>, chrom: &str, start: u64, end: u64, depth: i64) {
    if start >= end {
        return;
    }
    track.push(CoverageRecord {
        chrom: chrom.to_string(),
        start,
        end,
        depth: depth.max(0) as u32,
    });
}

/// Names of intervals overlapping `[start, end)` on `chrom`.
///
/// `sorted` must be ordered by [`sort_intervals`]. Names are returned
/// deduplicated in first-seen order.
pub fn overlapping_names(sorted: &[Interval], chrom: &str, start: u64, end: u64) -> Vec<String> {
    let first = sorted.partition_point(|iv| iv.chrom.as_str() < chrom);
    let mut names: Vec<String> = Vec::new();
    for iv in &sorted[first..] {
        if iv.chrom != chrom || iv.start >= end {
            break;
        }
        if iv.overlaps(chrom, start, end) && !names.contains(&iv.name) {
            names.push(iv.name.clone());
        }
    }
    names
}

/// Drop every region that overlaps any mask interval.
pub fn subtract_overlapping<T, F>(regions: Vec<T>, mask: &[Interval], locus: F) -> Vec<T>
where
    F: Fn(&T) -> (&str, u64, u64),
{
    regions
        .into_iter()
        .filter(|region| {
            let (chrom, start, end) = locus(region);
            !mask.iter().any(|m| m.overlaps(chrom, start, end))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contigs() -> ContigLengths {
        [("chr2", 100u64), ("chr1", 50u64)].into_iter().collect()
    }

    #[test]
    fn overlap_length_handles_disjoint_and_nested() {
        assert_eq!(overlap_length(0, 10, 10, 20), 0);
        assert_eq!(overlap_length(0, 10, 5, 20), 5);
        assert_eq!(overlap_length(0, 100, 20, 30), 10);
    }

    #[test]
    fn coverage_includes_zero_runs_in_contig_order() {
        let mut intervals = vec![
            Interval::new("chr2", 10, 30, "a"),
            Interval::new("chr2", 20, 40, "b"),
            Interval::new("chr1", 45, 80, "c"),
        ];
        sort_intervals(&mut intervals);
        let track = genome_coverage(&intervals, &contigs());
        let rendered: Vec<String> = track.iter().map(|r| r.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "chr2\t0\t10\t0",
                "chr2\t10\t20\t1",
                "chr2\t20\t30\t2",
                "chr2\t30\t40\t1",
                "chr2\t40\t100\t0",
                "chr1\t0\t45\t0",
                "chr1\t45\t50\t1",
            ]
        );
    }

    #[test]
    fn abutting_intervals_keep_depth_constant() {
        let intervals = vec![Interval::new("chr1", 0, 10, "a"), Interval::new("chr1", 10, 20, "b")];
        let lengths: ContigLengths = [("chr1", 20u64)].into_iter().collect();
        let track = genome_coverage(&intervals, &lengths);
        assert_eq!(track.len(), 1);
        assert_eq!(track[0].depth, 1);
    }

    #[test]
    fn overlapping_names_finds_reads_in_window() {
        let mut intervals = vec![
            Interval::new("chr1", 100, 300, "r1"),
            Interval::new("chr1", 350, 550, "r2"),
            Interval::new("chr2", 100, 300, "r3"),
            Interval::new("chr1", 600, 800, "r4"),
        ];
        sort_intervals(&mut intervals);
        assert_eq!(overlapping_names(&intervals, "chr1", 250, 400), vec!["r1", "r2"]);
        assert!(overlapping_names(&intervals, "chr1", 300, 350).is_empty());
    }

    #[test]
    fn subtract_drops_overlapping_regions() {
        let regions = vec![("chr1", 0u64, 100u64), ("chr1", 200, 300)];
        let mask = vec![Interval::new("chr1", 250, 260, "target")];
        let kept = subtract_overlapping(regions, &mask, |r| (r.0, r.1, r.2));
        assert_eq!(kept, vec![("chr1", 0, 100)]);
    }
}
