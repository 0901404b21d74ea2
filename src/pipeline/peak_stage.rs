use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::external::{mask_reference, LastAligner};
use crate::genomics::io::{open_input, read_contig_lengths, read_fastx, read_first_sequence, write_trimmed_fasta};
use crate::genomics::{
    call_peaks, first_alignments, genome_coverage, parse_maf_str, subtract_overlapping, trim_reads,
    Alignment, ContigLengths, GenomeFilter, Interval, MafReader, Peak, TrimParams, TrimmedRead,
};
use crate::pipeline::{create_dir, io_err, PipelineConfig, PipelineError};

/// Inputs of the `peak` stage.
#[derive(Debug, Clone)]
pub struct PeakInputs {
    /// Reads (FASTA/FASTQ).
    pub reads: PathBuf,
    /// Reference genome FASTA.
    pub reference: PathBuf,
    /// Insertion consensus FASTA; the first record is used.
    pub insertion: PathBuf,
    /// Reads aligned to the genome (MAF).
    pub genome_maf: PathBuf,
    /// Reads aligned to the consensus (MAF).
    pub insert_maf: PathBuf,
    /// `name length` table; derived from the reference when absent.
    pub genome_lengths: Option<PathBuf>,
    /// First targeted consensus position.
    pub target_start: u64,
    /// Last targeted consensus position (inclusive).
    pub target_end: u64,
    /// RepeatMasker annotation used to soft-mask the validation database.
    pub mask: Option<PathBuf>,
}

/// How the `validate` database is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationDb<'a> {
    /// Reference plus consensus, for insertions absent from the reference.
    Exogenous,
    /// Repeat-masked reference plus consensus.
    Masked(&'a Path),
    /// Copy of the reference database.
    ReferenceCopy,
}

impl<'a> ValidationDb<'a> {
    /// Pick the database for a run. Exogenous mode ignores the mask.
    pub fn select(exogenous: bool, mask: Option<&'a Path>) -> Self {
        match (exogenous, mask) {
            (true, _) => ValidationDb::Exogenous,
            (false, Some(rmsk)) => ValidationDb::Masked(rmsk),
            (false, None) => ValidationDb::ReferenceCopy,
        }
    }
}

/// Everything the peak stage hands to validation.
#[derive(Debug, Clone, Default)]
pub struct PeakAnalysis {
    /// Anchor alignments sorted by `(contig, start, end)`.
    pub anchors: Vec<Alignment>,
    /// Trimmed reads of anchored reads.
    pub trimmed: HashMap<String, TrimmedRead>,
    /// Candidate insertion peaks in track order.
    pub peaks: Vec<Peak>,
}

impl PeakAnalysis {
    /// Anchors as named intervals, in sorted order.
    pub fn anchor_intervals(&self) -> Vec<Interval> {
        self.anchors.iter().map(Interval::from).collect()
    }
}

/// Filter, trim and detect peaks entirely in memory.
///
/// Only reads that have both an anchor and a trimmed sequence are kept.
pub fn analyze_peaks(
    genome_alns: Vec<Alignment>,
    insert_alns: Vec<Alignment>,
    reads: Vec<(String, Vec<u8>)>,
    consensus: &[u8],
    contigs: &ContigLengths,
    trim: &TrimParams,
    config: &PipelineConfig,
) -> Result<PeakAnalysis, PipelineError> {
    let filter = GenomeFilter::new(config.filter.clone(), config.contigs.clone());
    let mut anchors = filter.filter(genome_alns);

    let first = first_alignments(insert_alns);
    let read_count = reads.len();
    let mut trimmed = trim_reads(reads, &first, consensus, trim);
    debug!(anchors = anchors.len(), trimmed = trimmed.len(), "before intersecting read sets");

    anchors.retain(|(name, _)| trimmed.contains_key(name));
    let anchored: HashSet<&str> = anchors.iter().map(|(name, _)| name.as_str()).collect();
    trimmed.retain(|name, _| anchored.contains(name.as_str()));

    let mut anchors: Vec<Alignment> = anchors.into_iter().map(|(_, aln)| aln).collect();
    anchors.sort_by(|a, b| {
        a.ref_name
            .cmp(&b.ref_name)
            .then(a.ref_start.cmp(&b.ref_start))
            .then(a.ref_end.cmp(&b.ref_end))
    });
    let intervals: Vec<Interval> = anchors.iter().map(Interval::from).collect();

    let coverage = genome_coverage(&intervals, contigs);
    let peaks = call_peaks(&coverage, contigs, &config.peak)?;

    info!(
        reads = read_count,
        anchors = anchors.len(),
        trimmed = trimmed.len(),
        peaks = peaks.len(),
        "peak analysis finished"
    );
    Ok(PeakAnalysis {
        anchors,
        trimmed,
        peaks,
    })
}

/// Drop peaks overlapping reference hits of the target region.
///
/// `hits` are alignments of the target (reference side) to the genome
/// (query side), so the genome interval is the query interval.
pub fn mask_reference_copies(peaks: Vec<Peak>, hits: &[Alignment]) -> Vec<Peak> {
    let mask: Vec<Interval> = hits
        .iter()
        .map(|hit| Interval::new(hit.query_name.clone(), hit.query_start, hit.query_end, hit.ref_name.clone()))
        .collect();
    let before = peaks.len();
    let kept = subtract_overlapping(peaks, &mask, Peak::locus);
    debug!(masked = before - kept.len(), "removed peaks on reference copies");
    kept
}

fn read_maf(path: &Path) -> Result<Vec<Alignment>, PipelineError> {
    let alignments = MafReader::new(open_input(path)?).collect::<Result<Vec<_>, _>>()?;
    Ok(alignments)
}

fn contig_lengths(inputs: &PeakInputs) -> Result<ContigLengths, PipelineError> {
    match &inputs.genome_lengths {
        Some(path) => Ok(read_contig_lengths(open_input(path)?)?),
        None => Ok(read_fastx(&inputs.reference)?
            .into_iter()
            .map(|(name, seq)| (name, seq.len() as u64))
            .collect()),
    }
}

/// Copy the files of database `from` under the name `to`.
fn copy_database(lastdb_dir: &Path, from: &str, to: &str) -> Result<(), PipelineError> {
    for entry in fs::read_dir(lastdb_dir).map_err(io_err(lastdb_dir))? {
        let entry = entry.map_err(io_err(lastdb_dir))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(suffix) = name.strip_prefix(from) {
            let target = lastdb_dir.join(format!("{to}{suffix}"));
            fs::copy(entry.path(), &target).map_err(io_err(&target))?;
        }
    }
    Ok(())
}

/// Run the `peak` stage and write `peak/sorted.bed`, `peak/peaks.bed` and
/// `peak/trimmed_reads.fasta`.
///
/// Also prepares the `validate` database (see [`ValidationDb`]). For
/// endogenous insertions, peaks on reference copies of the target are
/// masked.
pub fn run_peak_stage(config: &PipelineConfig, inputs: &PeakInputs) -> Result<PeakAnalysis, PipelineError> {
    let layout = config.layout();
    create_dir(&layout.peak_dir())?;

    let consensus = read_first_sequence(&inputs.insertion)?;
    if inputs.target_start > inputs.target_end || inputs.target_end as usize >= consensus.len() {
        return Err(PipelineError::TargetOutOfRange {
            start: inputs.target_start,
            end: inputs.target_end,
            length: consensus.len(),
        });
    }
    let trim = TrimParams {
        max_trim_length: config.max_trim_length,
        target_start: inputs.target_start,
        target_end: inputs.target_end + 1,
        padding: config.padding,
    };

    let contigs = contig_lengths(inputs)?;
    let mut analysis = analyze_peaks(
        read_maf(&inputs.genome_maf)?,
        read_maf(&inputs.insert_maf)?,
        read_fastx(&inputs.reads)?,
        &consensus,
        &contigs,
        &trim,
        config,
    )?;

    let last = LastAligner::new(config.threads);
    create_dir(&layout.lastdb_dir())?;
    match ValidationDb::select(config.filter.exogenous, inputs.mask.as_deref()) {
        ValidationDb::Exogenous => {
            last.index(&layout.db("validate"), &[inputs.reference.as_path(), inputs.insertion.as_path()])?;
        }
        ValidationDb::Masked(rmsk) => {
            let masked = layout.lastdb_dir().join("validate.masked.fa");
            mask_reference(rmsk, &inputs.reference, &masked)?;
            last.index_masked(&layout.db("validate"), &[masked.as_path(), inputs.insertion.as_path()])?;
            fs::remove_file(&masked).map_err(io_err(&masked))?;
        }
        ValidationDb::ReferenceCopy => copy_database(&layout.lastdb_dir(), "ref", "validate")?,
    }
    if !config.filter.exogenous {
        let target = &consensus[inputs.target_start as usize..=inputs.target_end as usize];
        let mut fasta = b">target\n".to_vec();
        fasta.extend_from_slice(target);
        fasta.push(b'\n');
        last.index_fasta(&layout.db("target"), &fasta)?;
        let hits = parse_maf_str(&last.align(&layout.db("target"), &inputs.reference)?)?;
        analysis.peaks = mask_reference_copies(analysis.peaks, &hits);
    }

    write_peak_outputs(config, &analysis)?;
    info!(peaks = analysis.peaks.len(), "peak stage finished");
    Ok(analysis)
}

/// Write the three peak stage files.
pub fn write_peak_outputs(config: &PipelineConfig, analysis: &PeakAnalysis) -> Result<(), PipelineError> {
    let layout = config.layout();
    create_dir(&layout.peak_dir())?;

    let path = layout.sorted_bed();
    let mut out = BufWriter::new(File::create(&path).map_err(io_err(&path))?);
    for aln in &analysis.anchors {
        writeln!(out, "{}", aln.to_bed()).map_err(io_err(&path))?;
    }
    out.flush().map_err(io_err(&path))?;

    let path = layout.peaks_bed();
    let mut out = BufWriter::new(File::create(&path).map_err(io_err(&path))?);
    for peak in &analysis.peaks {
        writeln!(out, "{peak}").map_err(io_err(&path))?;
    }
    out.flush().map_err(io_err(&path))?;

    let path = layout.trimmed_fasta();
    let mut out = BufWriter::new(File::create(&path).map_err(io_err(&path))?);
    let mut names: Vec<&String> = analysis.trimmed.keys().collect();
    names.sort();
    write_trimmed_fasta(&mut out, names.into_iter().map(|n| (n, &analysis.trimmed[n]))).map_err(io_err(&path))?;
    out.flush().map_err(io_err(&path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::Strand;

    #[test]
    fn validation_database_follows_mode_and_mask() {
        let rmsk = Path::new("hg38.fa.out");
        assert_eq!(ValidationDb::select(false, Some(rmsk)), ValidationDb::Masked(rmsk));
        assert_eq!(ValidationDb::select(false, None), ValidationDb::ReferenceCopy);
        assert_eq!(ValidationDb::select(true, Some(rmsk)), ValidationDb::Exogenous);
    }

    #[test]
    fn masking_uses_genome_side_of_hits() {
        let peaks = vec![Peak::new("chr1", 100, 500, 20), Peak::new("chr1", 900, 1_300, 15)];
        let hit = Alignment::new("target", 100, 0, 100, "chr1", 5_000, 1_000, 1_100, Strand::Forward).unwrap();
        let kept = mask_reference_copies(peaks, &[hit]);
        assert_eq!(kept, vec![Peak::new("chr1", 100, 500, 20)]);
    }
}
