//! Genomics primitives and algorithms for insertion breakpoint inference.
//!
//! This module exposes the alignment model, the interval engine used to pick
//! one anchor per read, coverage peak detection, read trimming, flank
//! pairing and breakpoint validation, plus the file formats that connect
//! the pipeline stages.

mod alignment;
mod assembly;
mod coverage;
pub mod io;
mod join;
mod maf;
mod peak;
mod trimmer;
mod validator;
pub mod vcf;

pub use alignment::{reverse_complement, Alignment, AlignmentError, Strand};
pub use assembly::{plan_assembly, AssemblyPlan, FlankPair};
pub use coverage::{
    genome_coverage, overlap_length, overlapping_names, sort_intervals, subtract_overlapping,
    ContigLengths, CoverageRecord, Interval,
};
pub use io::ParseError;
pub use join::{
    join_all, ContigFilter, FilterParams, GenomeFilter, ReadGroups, ANCHOR_LENGTH,
    GENOME_QUERY_GAP, GENOME_REF_GAP,
};
pub use maf::{parse_maf_str, MafReader};
pub use peak::{
    call_peaks, detect_peaks, merge_peaks, Peak, PeakError, PeakMode, PeakParams, MERGE_GAP,
    PEAK_HALF_WIDTH,
};
pub use trimmer::{first_alignments, trim_read, trim_reads, TrimParams, TrimmedRead};
pub use validator::{
    validate_breakpoint, Breakpoint, BreakpointCall, BreakpointDeduplicator, ValidationThresholds,
};
