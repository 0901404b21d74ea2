use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{debug, info, warn};

use crate::external::{Assembler, ContigAligner, LastAligner, LastContigAligner, Lamassemble};
use crate::genomics::io::{open_input, read_bed, read_fastx_from, read_peaks_bed, read_trimmed_fasta};
use crate::genomics::vcf::{write_vcf_header, write_vcf_record};
use crate::genomics::{
    overlapping_names, parse_maf_str, plan_assembly, sort_intervals, validate_breakpoint, AssemblyPlan,
    BreakpointCall, BreakpointDeduplicator, Interval, Peak, TrimmedRead,
};
use crate::pipeline::{create_dir, io_err, Layout, PipelineConfig, PipelineError, ValidationParams};

/// Inputs of the `valid` stage when run on its own.
#[derive(Debug, Clone)]
pub struct ValidateInputs {
    /// Trimmed reads FASTA with strand-suffixed names.
    pub trimmed_reads: PathBuf,
    /// Peak BED.
    pub peaks_bed: PathBuf,
    /// Sorted anchor BED.
    pub anchors_bed: PathBuf,
    /// Optional insertion library FASTA replacing the consensus database.
    pub library: Option<PathBuf>,
}

/// A validated peak with everything written to the result files.
#[derive(Debug, Clone)]
pub struct ValidatedPeak {
    /// The call.
    pub call: BreakpointCall,
    /// Contig FASTA as produced by the assembler.
    pub contig_fasta: Vec<u8>,
    /// Contig-to-reference MAF.
    pub reference_maf: String,
}

#[derive(Debug)]
struct PeakJob {
    peak: Peak,
    plan: AssemblyPlan,
}

/// Pair flanks for every peak; peaks without both flank sides are skipped.
fn plan_jobs(
    peaks: &[Peak],
    anchors: &[Interval],
    trimmed: &HashMap<String, TrimmedRead>,
    sample: usize,
) -> Vec<PeakJob> {
    peaks
        .iter()
        .enumerate()
        .filter_map(|(idx, peak)| {
            let names = overlapping_names(anchors, &peak.chrom, peak.start, peak.end);
            match plan_assembly(idx + 1, &names, trimmed, sample) {
                Some(plan) => Some(PeakJob {
                    peak: peak.clone(),
                    plan,
                }),
                None => {
                    debug!(peak = %peak.label(), reads = ?names, "skipping peak without both flank sides");
                    None
                }
            }
        })
        .collect()
}

fn validate_job(
    job: &PeakJob,
    assembler: &dyn Assembler,
    aligner: &dyn ContigAligner,
    params: &ValidationParams,
) -> Result<Option<ValidatedPeak>, PipelineError> {
    let contig_fasta = match job.plan.direct_contig() {
        Some(fasta) => fasta,
        None => assembler.assemble(&job.plan.contig_name, &job.plan.to_fasta())?,
    };
    let Some((_, contig)) = read_fastx_from(contig_fasta.as_slice())?.into_iter().next() else {
        return Ok(None);
    };

    let tag = format!("{}_{}_{}", job.peak.chrom, job.peak.start, job.peak.end);
    let reference_maf = aligner.align_to_reference(&tag, &contig_fasta)?;
    let ref_alns = parse_maf_str(&reference_maf)?;
    let mut insert_alns = parse_maf_str(&aligner.align_to_insertions(&contig_fasta)?)?;
    if let Some(names) = &params.library_names {
        insert_alns.retain(|aln| names.contains(&aln.ref_name));
    }
    if ref_alns.is_empty() || insert_alns.is_empty() {
        return Ok(None);
    }

    let breakpoint = validate_breakpoint(
        &job.peak.chrom,
        job.peak.start..job.peak.end,
        &ref_alns,
        &insert_alns,
        &params.thresholds,
    );
    Ok(breakpoint.map(|breakpoint| ValidatedPeak {
        call: BreakpointCall {
            peak: job.peak.clone(),
            support: job.plan.support,
            breakpoint,
            contig,
        },
        contig_fasta,
        reference_maf,
    }))
}

/// Assemble and validate every peak on a pool of `threads` workers.
///
/// Results come back in peak order. A failing tool run for one peak is
/// logged and treated as a no-call.
pub fn validate_peaks(
    peaks: &[Peak],
    anchors: &[Interval],
    trimmed: &HashMap<String, TrimmedRead>,
    assembler: &dyn Assembler,
    aligner: &dyn ContigAligner,
    params: &ValidationParams,
    threads: usize,
) -> Result<Vec<ValidatedPeak>, PipelineError> {
    let jobs = plan_jobs(peaks, anchors, trimmed, params.sample);
    info!(peaks = peaks.len(), assembled = jobs.len(), threads, "validating peaks");

    let pool = ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()
        .map_err(|e| PipelineError::ThreadPool(e.to_string()))?;
    let results: Vec<Option<ValidatedPeak>> = pool.install(|| {
        jobs.par_iter()
            .map(|job| match validate_job(job, assembler, aligner, params) {
                Ok(result) => {
                    if result.is_none() {
                        debug!(peak = %job.peak.label(), contig = %job.plan.contig_name, "no breakpoint");
                    }
                    result
                }
                Err(err) => {
                    let reads: Vec<&str> = job.plan.pairs.iter().map(|p| p.name.as_str()).collect();
                    debug!(peak = %job.peak.label(), reads = ?reads, error = %err, "peak validation failed");
                    None
                }
            })
            .collect()
    });
    Ok(results.into_iter().flatten().collect())
}

/// Streaming deduplication over results in peak order.
pub fn dedup_results(results: Vec<ValidatedPeak>, distance: u64) -> Vec<ValidatedPeak> {
    let mut dedup = BreakpointDeduplicator::new(distance);
    results
        .into_iter()
        .filter(|r| dedup.admit(&r.call.peak.chrom, r.call.breakpoint.position))
        .collect()
}

fn render_err(path: &Path) -> impl FnOnce(anyhow::Error) -> PipelineError + '_ {
    move |err| PipelineError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::other(err.to_string()),
    }
}

/// Write `result/validate.{maf,bed,fasta}` and optionally `validate.vcf`.
pub fn write_results(layout: &Layout, results: &[ValidatedPeak], write_vcf: bool) -> Result<(), PipelineError> {
    let dir = layout.result_dir();
    create_dir(&dir)?;
    let open = |name: &str| -> Result<(PathBuf, BufWriter<File>), PipelineError> {
        let path = dir.join(name);
        let file = File::create(&path).map_err(io_err(&path))?;
        Ok((path, BufWriter::new(file)))
    };

    let (maf_path, mut maf) = open("validate.maf")?;
    let (bed_path, mut bed) = open("validate.bed")?;
    let (fasta_path, mut fasta) = open("validate.fasta")?;
    writeln!(maf, "# caspeak validated\n").map_err(io_err(&maf_path))?;

    let mut vcf = None;
    if write_vcf {
        let (path, mut out) = open("validate.vcf")?;
        write_vcf_header(&mut out).map_err(render_err(&path))?;
        vcf = Some((path, out));
    }

    for (idx, result) in results.iter().enumerate() {
        let count = idx + 1;
        let call = &result.call;
        for line in result.reference_maf.lines().filter(|l| !l.starts_with('#')) {
            writeln!(maf, "{line}").map_err(io_err(&maf_path))?;
        }
        writeln!(
            bed,
            "{}\t{}\t{}\tpeak{}\t{}",
            call.peak.chrom, call.peak.start, call.peak.end, count, call.peak.coverage
        )
        .map_err(io_err(&bed_path))?;
        fasta
            .write_all(String::from_utf8_lossy(&result.contig_fasta).trim_end().as_bytes())
            .and_then(|_| fasta.write_all(b"\n"))
            .map_err(io_err(&fasta_path))?;
        if let Some((path, out)) = vcf.as_mut() {
            write_vcf_record(out, count, call).map_err(render_err(path))?;
        }
    }

    maf.flush().map_err(io_err(&maf_path))?;
    bed.flush().map_err(io_err(&bed_path))?;
    fasta.flush().map_err(io_err(&fasta_path))?;
    if let Some((path, mut out)) = vcf {
        out.flush().map_err(io_err(&path))?;
    }
    Ok(())
}

/// Run the `valid` stage from peak stage output held in memory.
///
/// Trains assembly parameters on the trimmed reads, indexes the optional
/// library, validates every peak and writes the deduplicated results.
pub fn run_validate_stage(
    config: &PipelineConfig,
    peaks: &[Peak],
    anchors: &[Interval],
    trimmed: &HashMap<String, TrimmedRead>,
    library: Option<&Path>,
) -> Result<Vec<ValidatedPeak>, PipelineError> {
    let layout = config.layout();
    let tmp = layout.tmp_dir();
    create_dir(&tmp)?;

    let last = LastAligner::new(config.threads);
    let train_file = tmp.join("assembly.train");
    let mut reads_fasta = Vec::new();
    for (name, read) in trimmed {
        reads_fasta.extend_from_slice(format!(">{name}\n").as_bytes());
        reads_fasta.extend_from_slice(&read.sequence);
        reads_fasta.push(b'\n');
    }
    info!("training assembly parameters");
    last.train_fasta(&layout.db("ref"), &reads_fasta, &train_file)?;

    let insert_db = match library {
        Some(lib) => {
            last.index(&layout.db("lib"), &[lib])?;
            layout.db("lib")
        }
        None => layout.db("insert"),
    };

    let assembler = Lamassemble::new(train_file, config.threads);
    let aligner = LastContigAligner::new(layout.db("validate"), insert_db, tmp.clone());
    let results = validate_peaks(
        peaks,
        anchors,
        trimmed,
        &assembler,
        &aligner,
        &config.validation,
        config.threads,
    )?;
    let results = dedup_results(results, config.validation.dedup_distance);

    write_results(&layout, &results, config.validation.write_vcf)?;
    if let Err(err) = fs::remove_dir_all(&tmp) {
        warn!(path = %tmp.display(), error = %err, "could not remove scratch directory");
    }
    info!(calls = results.len(), "validation finished");
    Ok(results)
}

/// Load the peak stage files named in `inputs`.
pub fn load_validate_inputs(
    inputs: &ValidateInputs,
) -> Result<(Vec<Peak>, Vec<Interval>, HashMap<String, TrimmedRead>), PipelineError> {
    let peaks = read_peaks_bed(open_input(&inputs.peaks_bed)?)?;
    let mut anchors: Vec<Interval> = read_bed(open_input(&inputs.anchors_bed)?)?
        .into_iter()
        .map(|record| record.interval)
        .collect();
    sort_intervals(&mut anchors);
    let trimmed = read_trimmed_fasta(&inputs.trimmed_reads)?;
    Ok((peaks, anchors, trimmed))
}
