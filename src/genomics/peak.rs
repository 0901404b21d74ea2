use std::fmt;

use thiserror::Error;

use crate::genomics::{ContigLengths, CoverageRecord};

/// Half-width of the window emitted around a coverage maximum.
pub const PEAK_HALF_WIDTH: u64 = 200;
/// Largest gap bridged when merging covered intervals.
pub const MERGE_GAP: u64 = 200;

/// Candidate insertion region.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Peak {
    /// Contig name.
    pub chrom: String,
    /// Window start.
    pub start: u64,
    /// Window end (exclusive).
    pub end: u64,
    /// Coverage of the interval the peak was centred on.
    pub coverage: u32,
}

impl Peak {
    /// Construct a peak.
    pub fn new(chrom: impl Into<String>, start: u64, end: u64, coverage: u32) -> Self {
        Self {
            chrom: chrom.into(),
            start,
            end,
            coverage,
        }
    }

    /// `chrom:start-end` label used in the BED name column.
    pub fn label(&self) -> String {
        format!("{}:{}-{}", self.chrom, self.start, self.end)
    }

    /// Locus triple, handy for interval helpers.
    pub fn locus(&self) -> (&str, u64, u64) {
        (self.chrom.as_str(), self.start, self.end)
    }
}

impl fmt::Display for Peak {
    /// BED5: chrom, start, end, label, coverage.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.chrom,
            self.start,
            self.end,
            self.label(),
            self.coverage
        )
    }
}

/// Errors raised by the peak detector.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeakError {
    /// Coverage track names a contig missing from the length map.
    #[error("contig '{0}' is not present in the contig length table")]
    UnknownContig(String),
}

/// Peak calling strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum PeakMode {
    /// Fixed window around the highest-coverage interval of each covered run.
    #[default]
    Windowed,
    /// Merge nearby covered intervals and keep sufficiently wide merges.
    MergeByGap,
}

/// Peak detection parameters.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct PeakParams {
    /// Minimum coverage for a peak.
    pub min_coverage: u32,
    /// Minimum merged width (merge-by-gap mode only).
    pub min_width: u64,
    /// Detection strategy.
    pub mode: PeakMode,
}

impl Default for PeakParams {
    fn default() -> Self {
        Self {
            min_coverage: 10,
            min_width: 300,
            mode: PeakMode::Windowed,
        }
    }
}

/// Detect peaks with the configured strategy.
pub fn call_peaks(
    track: &[CoverageRecord],
    contigs: &ContigLengths,
    params: &PeakParams,
) -> Result<Vec<Peak>, PeakError> {
    match params.mode {
        PeakMode::Windowed => detect_peaks(track, contigs, params.min_coverage),
        PeakMode::MergeByGap => Ok(merge_peaks(track, params.min_coverage, params.min_width)),
    }
}

#[derive(Debug)]
struct Run<'a> {
    chrom: &'a str,
    start: u64,
    end: u64,
    coverage: u32,
}

/// Windowed detector over a sorted coverage track.
///
/// Within each run of non-zero coverage the single interval with the highest
/// coverage is tracked (first one wins ties). When the run ends, at a zero
/// record, a contig change or the end of the track, a window of
/// ±[`PEAK_HALF_WIDTH`] around that interval's midpoint is emitted if its
/// coverage reaches `min_coverage`, clamped to `[0, contig length]`.
pub fn detect_peaks(
    track: &[CoverageRecord],
    contigs: &ContigLengths,
    min_coverage: u32,
) -> Result<Vec<Peak>, PeakError> {
    let mut peaks = Vec::new();
    let mut best: Option<Run<'_>> = None;

    for record in track {
        if record.depth == 0 {
            if let Some(run) = best.take() {
                emit_window(&mut peaks, &run, contigs, min_coverage)?;
            }
            continue;
        }
        match best.as_mut() {
            Some(run) if run.chrom == record.chrom => {
                if record.depth > run.coverage {
                    run.start = record.start;
                    run.end = record.end;
                    run.coverage = record.depth;
                }
            }
            _ => {
                if let Some(run) = best.take() {
                    emit_window(&mut peaks, &run, contigs, min_coverage)?;
                }
                best = Some(Run {
                    chrom: &record.chrom,
                    start: record.start,
                    end: record.end,
                    coverage: record.depth,
                });
            }
        }
    }
    if let Some(run) = best {
        emit_window(&mut peaks, &run, contigs, min_coverage)?;
    }
    Ok(peaks)
}

fn emit_window(
    peaks: &mut Vec<Peak>,
    run: &Run<'_>,
    contigs: &ContigLengths,
    min_coverage: u32,
) -> Result<(), PeakError> {
    if run.coverage < min_coverage {
        return Ok(());
    }
    let length = contigs
        .get(run.chrom)
        .ok_or_else(|| PeakError::UnknownContig(run.chrom.to_string()))?;
    let mid = (run.start + run.end) / 2;
    peaks.push(Peak::new(
        run.chrom,
        mid.saturating_sub(PEAK_HALF_WIDTH),
        (mid + PEAK_HALF_WIDTH).min(length),
        run.coverage,
    ));
    Ok(())
}

/// Merge-by-gap detector.
///
/// Intervals below `min_coverage` are skipped. An open peak absorbs the next
/// interval on the same contig when the gap to it is under [`MERGE_GAP`];
/// otherwise the open peak is emitted if it is at least `min_width` wide.
pub fn merge_peaks(track: &[CoverageRecord], min_coverage: u32, min_width: u64) -> Vec<Peak> {
    let mut peaks = Vec::new();
    let mut open: Option<Peak> = None;

    for record in track.iter().filter(|r| r.depth >= min_coverage) {
        match open.as_mut() {
            Some(peak)
                if peak.chrom == record.chrom
                    && record.start.saturating_sub(peak.end) < MERGE_GAP =>
            {
                peak.end = record.end;
                peak.coverage = peak.coverage.max(record.depth);
            }
            _ => {
                if let Some(peak) = open.take() {
                    if peak.end - peak.start >= min_width {
                        peaks.push(peak);
                    }
                }
                open = Some(Peak::new(record.chrom.clone(), record.start, record.end, record.depth));
            }
        }
    }
    if let Some(peak) = open {
        if peak.end - peak.start >= min_width {
            peaks.push(peak);
        }
    }
    peaks
}
