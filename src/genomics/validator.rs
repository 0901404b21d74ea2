//! Breakpoint validation of reassembled peak contigs.
//!
//! A contig supports an insertion when two of its reference alignments on
//! the same strand flank the peak, one ending inside it (upstream) and one
//! starting inside it (downstream), and the contig stretch between them is
//! covered by alignments to the insertion library.

use std::ops::Range;

use tracing::trace;

use crate::genomics::{overlap_length, reverse_complement, Alignment, Peak, Strand};

/// Acceptance thresholds for the bracketed insertion.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ValidationThresholds {
    /// Fraction of the bracketed gap that insertion alignments must cover.
    pub min_insert_proportion: f64,
    /// Covered insertion length must exceed this.
    pub min_insert_length: u64,
}

impl Default for ValidationThresholds {
    fn default() -> Self {
        Self {
            min_insert_proportion: 0.5,
            min_insert_length: 50,
        }
    }
}

/// Where and what was inserted, as read off one contig.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Breakpoint {
    /// Reference coordinate of the insertion (upstream flank end).
    pub position: u64,
    /// Start of the inserted sequence on the contig.
    pub insert_start: u64,
    /// End of the inserted sequence on the contig (exclusive).
    pub insert_end: u64,
    /// Strand of the contig against the reference.
    pub strand: Strand,
    /// Insertion reference contributing the most overlap.
    pub insertion_name: String,
}

impl Breakpoint {
    /// Length of the bracketed insertion on the contig.
    pub fn insert_length(&self) -> u64 {
        self.insert_end.saturating_sub(self.insert_start)
    }
}

#[derive(Debug, Default)]
struct FlankSlots {
    upstream: Option<usize>,
    downstream: Option<usize>,
}

impl FlankSlots {
    fn slot(slots: &mut [FlankSlots; 2], strand: Strand) -> &mut FlankSlots {
        match strand {
            Strand::Forward => &mut slots[0],
            Strand::Reverse => &mut slots[1],
        }
    }
}

/// Decide whether a contig brackets an insertion at the peak `chrom:range`.
///
/// `ref_alns` are the contig's alignments to the reference and
/// `insert_alns` its alignments to the insertion library. Strands are
/// tracked independently. When a strand has both flanks but the insertion
/// test fails, the pair is dropped and the current alignment is re-seated
/// on the opposite side if it qualifies, so a later flank can still pair
/// with it.
pub fn validate_breakpoint(
    chrom: &str,
    range: Range<u64>,
    ref_alns: &[Alignment],
    insert_alns: &[Alignment],
    thresholds: &ValidationThresholds,
) -> Option<Breakpoint> {
    if ref_alns.len() < 2 {
        return None;
    }
    let mut alns: Vec<&Alignment> = ref_alns.iter().collect();
    alns.sort_by_key(|aln| aln.query_start);

    let mut slots: [FlankSlots; 2] = Default::default();
    for (idx, aln) in alns.iter().enumerate() {
        let on_chrom = aln.ref_name == chrom;
        let ends_inside = range.contains(&aln.ref_end);
        let starts_inside = range.contains(&aln.ref_start);
        if on_chrom && ends_inside {
            FlankSlots::slot(&mut slots, aln.query_strand).upstream = Some(idx);
        }
        if on_chrom && starts_inside {
            FlankSlots::slot(&mut slots, aln.query_strand).downstream = Some(idx);
        }

        for tracker in slots.iter_mut() {
            let (Some(up), Some(down)) = (tracker.upstream, tracker.downstream) else {
                continue;
            };
            if let Some(call) = check_insertion(alns[up], alns[down], insert_alns, thresholds) {
                return Some(call);
            }
            trace!(upstream = up, downstream = down, "flank pair rejected");
            *tracker = FlankSlots::default();
            if ends_inside && down == idx {
                tracker.upstream = Some(idx);
            } else if starts_inside && up == idx {
                tracker.downstream = Some(idx);
            }
        }
    }
    None
}

fn check_insertion(
    upstream: &Alignment,
    downstream: &Alignment,
    insert_alns: &[Alignment],
    thresholds: &ValidationThresholds,
) -> Option<Breakpoint> {
    let insert_start = upstream.query_end.min(downstream.query_end);
    let insert_end = upstream.query_start.max(downstream.query_start);
    if insert_end <= insert_start {
        return None;
    }

    // Per-name totals in first-seen order, so ties go to the earliest name.
    let mut per_name: Vec<(&str, u64)> = Vec::new();
    let mut covered = 0u64;
    for ins in insert_alns {
        let overlap = overlap_length(insert_start, insert_end, ins.query_start, ins.query_end);
        covered += overlap;
        match per_name.iter_mut().find(|(name, _)| *name == ins.ref_name) {
            Some((_, total)) => *total += overlap,
            None => per_name.push((ins.ref_name.as_str(), overlap)),
        }
    }

    let proportion = covered as f64 / (insert_end - insert_start) as f64;
    if covered <= thresholds.min_insert_length || proportion < thresholds.min_insert_proportion {
        return None;
    }

    let (best_name, _) = per_name
        .iter()
        .fold(None::<(&str, u64)>, |best, &(name, total)| match best {
            Some(b) if b.1 >= total => Some(b),
            _ => Some((name, total)),
        })?;

    Some(Breakpoint {
        position: upstream.ref_end,
        insert_start,
        insert_end,
        strand: upstream.query_strand,
        insertion_name: best_name.to_string(),
    })
}

/// A validated breakpoint together with the peak and contig it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointCall {
    /// Peak the contig was assembled for.
    pub peak: Peak,
    /// Number of reads behind the contig.
    pub support: usize,
    /// Breakpoint read off the contig.
    pub breakpoint: Breakpoint,
    /// Contig sequence.
    pub contig: Vec<u8>,
}

impl BreakpointCall {
    /// Inserted sequence plus the preceding anchor base, on the reference strand.
    pub fn alt_allele(&self) -> Vec<u8> {
        let len = self.contig.len() as u64;
        let start = self.breakpoint.insert_start.saturating_sub(1).min(len) as usize;
        let end = self.breakpoint.insert_end.min(len) as usize;
        let slice = if start < end { &self.contig[start..end] } else { &[][..] };
        match self.breakpoint.strand {
            Strand::Forward => slice.to_vec(),
            Strand::Reverse => reverse_complement(slice),
        }
    }
}

/// Streaming suppression of calls that repeat the previous accepted call.
///
/// Calls must arrive in genomic order. A call on the same chromosome as the
/// last accepted one and closer than `max_distance` is dropped.
#[derive(Debug, Clone)]
pub struct BreakpointDeduplicator {
    max_distance: u64,
    last: Option<(String, u64)>,
}

impl BreakpointDeduplicator {
    /// Default distance under which neighbouring calls are merged.
    pub const DEFAULT_DISTANCE: u64 = 100;

    /// Create a deduplicator with the given distance.
    pub fn new(max_distance: u64) -> Self {
        Self {
            max_distance,
            last: None,
        }
    }

    /// Returns `true` and records the call if it should be kept.
    pub fn admit(&mut self, chrom: &str, position: u64) -> bool {
        if let Some((last_chrom, last_pos)) = &self.last {
            if last_chrom == chrom && last_pos.abs_diff(position) < self.max_distance {
                return false;
            }
        }
        self.last = Some((chrom.to_string(), position));
        true
    }
}

impl Default for BreakpointDeduplicator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DISTANCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ref_aln(ref_range: (u64, u64), query: (u64, u64), strand: Strand) -> Alignment {
        Alignment::new("chr1", 10_000, ref_range.0, ref_range.1, "peak1-4", 1_000, query.0, query.1, strand)
            .unwrap()
    }

    fn ins_aln(name: &str, query: (u64, u64)) -> Alignment {
        Alignment::new(name, 6_000, 0, query.1 - query.0, "peak1-4", 1_000, query.0, query.1, Strand::Forward)
            .unwrap()
    }

    fn thresholds() -> ValidationThresholds {
        ValidationThresholds {
            min_insert_proportion: 0.8,
            min_insert_length: 50,
        }
    }

    #[test]
    fn accepts_fully_covered_gap() {
        let refs = vec![
            ref_aln((350, 550), (0, 200), Strand::Forward),
            ref_aln((560, 800), (260, 500), Strand::Forward),
        ];
        let ins = vec![ins_aln("AluY", (200, 260))];
        let call = validate_breakpoint("chr1", 500..600, &refs, &ins, &thresholds()).unwrap();
        assert_eq!(call.position, 550);
        assert_eq!((call.insert_start, call.insert_end), (200, 260));
        assert_eq!(call.insert_length(), 60);
        assert_eq!(call.insertion_name, "AluY");
        assert_eq!(call.strand, Strand::Forward);
    }

    #[test]
    fn partial_coverage_is_no_call() {
        let refs = vec![
            ref_aln((350, 550), (0, 200), Strand::Forward),
            ref_aln((560, 800), (260, 500), Strand::Forward),
        ];
        let ins = vec![ins_aln("AluY", (200, 230))];
        assert!(validate_breakpoint("chr1", 500..600, &refs, &ins, &thresholds()).is_none());
    }

    #[test]
    fn rescans_after_false_pairing() {
        // The first downstream candidate leaves no room for an insertion; the
        // later one brackets the inserted sequence.
        let refs = vec![
            ref_aln((350, 550), (0, 200), Strand::Forward),
            ref_aln((555, 580), (205, 230), Strand::Forward),
            ref_aln((570, 900), (400, 730), Strand::Forward),
        ];
        let ins = vec![ins_aln("L1HS", (230, 400))];
        let call = validate_breakpoint("chr1", 500..600, &refs, &ins, &thresholds()).unwrap();
        assert_eq!((call.insert_start, call.insert_end), (230, 400));
        assert_eq!(call.position, 580);
    }

    #[test]
    fn reverse_strand_pairs_independently() {
        let refs = vec![
            ref_aln((560, 900), (0, 340), Strand::Reverse),
            ref_aln((300, 540), (500, 740), Strand::Reverse),
            ref_aln((100, 200), (900, 1_000), Strand::Forward),
        ];
        let ins = vec![ins_aln("SVA", (340, 500))];
        let call = validate_breakpoint("chr1", 500..600, &refs, &ins, &thresholds()).unwrap();
        assert_eq!(call.strand, Strand::Reverse);
        assert_eq!(call.position, 540);
        assert_eq!((call.insert_start, call.insert_end), (340, 500));
    }

    #[test]
    fn best_library_member_wins() {
        let refs = vec![
            ref_aln((350, 550), (0, 200), Strand::Forward),
            ref_aln((560, 800), (400, 640), Strand::Forward),
        ];
        let ins = vec![ins_aln("AluY", (200, 260)), ins_aln("L1HS", (260, 400))];
        let call = validate_breakpoint("chr1", 500..600, &refs, &ins, &thresholds()).unwrap();
        assert_eq!(call.insertion_name, "L1HS");
    }

    #[test]
    fn too_few_alignments_or_wrong_contig_is_no_call() {
        let one = vec![ref_aln((350, 550), (0, 200), Strand::Forward)];
        let ins = vec![ins_aln("AluY", (200, 260))];
        assert!(validate_breakpoint("chr1", 500..600, &one, &ins, &thresholds()).is_none());

        let refs = vec![
            ref_aln((350, 550), (0, 200), Strand::Forward),
            ref_aln((560, 800), (260, 500), Strand::Forward),
        ];
        assert!(validate_breakpoint("chr2", 500..600, &refs, &ins, &thresholds()).is_none());
    }

    #[test]
    fn alt_allele_follows_contig_strand() {
        let mut call = BreakpointCall {
            peak: Peak::new("chr1", 500, 600, 12),
            support: 4,
            breakpoint: Breakpoint {
                position: 550,
                insert_start: 3,
                insert_end: 6,
                strand: Strand::Forward,
                insertion_name: "AluY".into(),
            },
            contig: b"AACGTTGG".to_vec(),
        };
        assert_eq!(call.alt_allele(), b"CGTT".to_vec());
        call.breakpoint.strand = Strand::Reverse;
        assert_eq!(call.alt_allele(), b"AACG".to_vec());
        call.breakpoint.insert_start = 0;
        call.breakpoint.insert_end = 2;
        assert_eq!(call.alt_allele(), b"TT".to_vec());
    }

    #[test]
    fn deduplicator_suppresses_nearby_calls() {
        let mut dedup = BreakpointDeduplicator::new(50);
        assert!(dedup.admit("chr1", 1_000));
        assert!(!dedup.admit("chr1", 1_040));
        assert!(dedup.admit("chr1", 1_100));
        assert!(dedup.admit("chr2", 1_100));
    }
}
