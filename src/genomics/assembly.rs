//! Pairing of upstream and downstream flank reads ahead of local assembly.

use std::collections::HashMap;

use crate::genomics::TrimmedRead;

/// One upstream flank joined to one downstream flank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlankPair {
    /// `upstream+downstream` read names.
    pub name: String,
    /// Upstream sequence followed by downstream sequence.
    pub sequence: Vec<u8>,
}

/// Reads selected for reassembling one peak.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyPlan {
    /// Contig name, `peak{n}-{support}`.
    pub contig_name: String,
    /// Twice the number of reads on the smaller flank side.
    pub support: usize,
    /// Pairs to feed the assembler, longest first.
    pub pairs: Vec<FlankPair>,
}

impl AssemblyPlan {
    /// A single pair is used as the contig directly instead of being assembled.
    pub fn is_direct(&self) -> bool {
        self.support == 2
    }

    /// FASTA text of the assembler input.
    pub fn to_fasta(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for pair in &self.pairs {
            out.push(b'>');
            out.extend_from_slice(pair.name.as_bytes());
            out.push(b'\n');
            out.extend_from_slice(&pair.sequence);
            out.push(b'\n');
        }
        out
    }

    /// FASTA of the contig when no assembly is needed.
    pub fn direct_contig(&self) -> Option<Vec<u8>> {
        if !self.is_direct() {
            return None;
        }
        let pair = self.pairs.first()?;
        let mut out = format!(">{}\n", self.contig_name).into_bytes();
        out.extend_from_slice(&pair.sequence);
        out.push(b'\n');
        Some(out)
    }
}

/// Build the assembly input for peak number `peak_index` from its read names.
///
/// Returns `None` when either flank side has no reads: such a peak cannot be
/// reassembled into a contig that brackets the insertion. Each side is sorted
/// by length and the longest remaining reads are paired, up to `sample` pairs;
/// a `sample` of zero yields no plan.
pub fn plan_assembly(
    peak_index: usize,
    read_names: &[String],
    trimmed: &HashMap<String, TrimmedRead>,
    sample: usize,
) -> Option<AssemblyPlan> {
    let mut upstream: Vec<(&str, &[u8])> = Vec::new();
    let mut downstream: Vec<(&str, &[u8])> = Vec::new();
    for name in read_names {
        let Some(read) = trimmed.get(name) else {
            continue;
        };
        let entry = (name.as_str(), read.sequence.as_slice());
        if read.is_upstream() {
            upstream.push(entry);
        } else {
            downstream.push(entry);
        }
    }
    if upstream.is_empty() || downstream.is_empty() {
        return None;
    }

    upstream.sort_by_key(|(name, seq)| (seq.len(), *name));
    downstream.sort_by_key(|(name, seq)| (seq.len(), *name));
    let support = upstream.len().min(downstream.len()) * 2;

    let pairs: Vec<FlankPair> = upstream
        .iter()
        .rev()
        .zip(downstream.iter().rev())
        .take(sample)
        .map(|((up_name, up_seq), (down_name, down_seq))| {
            let mut sequence = up_seq.to_vec();
            sequence.extend_from_slice(down_seq);
            FlankPair {
                name: format!("{up_name}+{down_name}"),
                sequence,
            }
        })
        .collect();
    if pairs.is_empty() {
        return None;
    }

    Some(AssemblyPlan {
        contig_name: format!("peak{peak_index}-{support}"),
        support,
        pairs,
    })
}
