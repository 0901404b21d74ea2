use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use caspeak::external::{require_tools, ToolError, MASK_TOOLS, REQUIRED_TOOLS};
use caspeak::genomics::{ContigFilter, PeakMode, ValidationThresholds};
use caspeak::pipeline::{
    load_validate_inputs, run_align_stage, run_peak_stage, run_validate_stage, AlignInputs,
    PeakInputs, PipelineConfig, ValidateInputs,
};
use caspeak::{LogContext, LogLevel};

#[derive(Parser, Debug)]
#[command(
    name = "caspeak",
    version,
    about = "Find non-reference mobile element insertions from targeted long reads"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Working directory for lastdb/, lastal/, peak/ and result/.
    #[arg(long, global = true, default_value = ".", value_name = "DIR")]
    workdir: PathBuf,
    /// Number of threads.
    #[arg(long, global = true, default_value_t = 1)]
    threads: usize,
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,
    /// Write logs to this file instead of standard error.
    #[arg(long, global = true, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SequenceArgs {
    /// Read FASTA/FASTQ file.
    #[arg(long, value_name = "FILE")]
    read: PathBuf,
    /// Reference genome FASTA file.
    #[arg(long = "ref", value_name = "FILE")]
    reference: PathBuf,
    /// Insertion consensus FASTA file.
    #[arg(long, value_name = "FILE")]
    insert: PathBuf,
}

#[derive(Args, Debug)]
struct PeakArgs {
    /// First targeted position on the consensus.
    #[arg(long, value_name = "START")]
    target_start: u64,
    /// Last targeted position on the consensus (inclusive).
    #[arg(long, value_name = "END")]
    target_end: u64,
    /// Treat the insertion as exogenous (absent from the reference).
    #[arg(short = 'x', long)]
    exog: bool,
    /// RepeatMasker annotation used to soft-mask the validation database.
    #[arg(long, value_name = "RMSK", conflicts_with = "exog")]
    mask: Option<PathBuf>,
    /// `name length` table of reference contigs (default: from --ref).
    #[arg(long, value_name = "FILE")]
    genome: Option<PathBuf>,
    /// Minimum read length.
    #[arg(long, default_value_t = 500)]
    min_read_length: u64,
    /// Reject anchors covering at least this fraction of the read.
    #[arg(long, default_value_t = 0.99)]
    max_prop: f64,
    /// Reject anchors covering at most this fraction of the read.
    #[arg(long, default_value_t = 0.4)]
    min_prop: f64,
    /// Reference contigs to ignore (repeatable).
    #[arg(long, value_name = "NAME", conflicts_with = "include_contig")]
    exclude_contig: Vec<String>,
    /// Only anchor reads on these contigs (repeatable).
    #[arg(long, value_name = "NAME")]
    include_contig: Vec<String>,
    /// Maximum read prefix before the consensus hit.
    #[arg(long, default_value_t = 100)]
    max_trim_length: u64,
    /// Padding around the target window.
    #[arg(long, default_value_t = 20)]
    padding: u64,
    /// Minimum peak coverage.
    #[arg(long, default_value_t = 10)]
    min_cov: u32,
    /// Minimum merged peak width (with --merge-peaks).
    #[arg(long, default_value_t = 300)]
    min_width: u64,
    /// Merge nearby covered intervals instead of windowing around maxima.
    #[arg(long)]
    merge_peaks: bool,
}

#[derive(Args, Debug)]
struct ValidArgs {
    /// Maximum flank pairs assembled per peak.
    #[arg(long, default_value_t = 500, value_parser = clap::value_parser!(u64).range(1..))]
    sample: u64,
    /// Minimum fraction of the bracketed gap covered by insertion hits.
    #[arg(long, default_value_t = 0.5)]
    min_insprop: f64,
    /// Minimum covered insertion length.
    #[arg(long, default_value_t = 50)]
    min_inslen: u64,
    /// Also write result/validate.vcf.
    #[arg(long)]
    vcf: bool,
    /// Insertion library FASTA used for validation instead of the consensus.
    #[arg(long, value_name = "FILE")]
    lib: Option<PathBuf>,
    /// Library members to accept (repeatable; default: all).
    #[arg(long = "lib-name", value_name = "NAME", requires = "lib")]
    lib_names: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index the reference and consensus and align the reads to both.
    Align {
        #[command(flatten)]
        seqs: SequenceArgs,
    },
    /// Anchor and trim reads, then detect coverage peaks.
    Peak {
        #[command(flatten)]
        seqs: SequenceArgs,
        #[command(flatten)]
        peak: PeakArgs,
        /// Read-to-genome alignments.
        #[arg(long, default_value = "lastal/read_to_ref.maf", value_name = "MAF")]
        genome_maf: PathBuf,
        /// Read-to-consensus alignments.
        #[arg(long, default_value = "lastal/read_to_insert.maf", value_name = "MAF")]
        insert_maf: PathBuf,
    },
    /// Reassemble peaks and validate insertion breakpoints.
    Valid {
        /// Trimmed reads from the peak stage.
        #[arg(long, default_value = "peak/trimmed_reads.fasta", value_name = "FILE")]
        trim_read: PathBuf,
        /// Peak BED from the peak stage.
        #[arg(long, default_value = "peak/peaks.bed", value_name = "FILE")]
        peak_bed: PathBuf,
        /// Sorted anchor BED from the peak stage.
        #[arg(long, default_value = "peak/sorted.bed", value_name = "FILE")]
        anchor_bed: PathBuf,
        #[command(flatten)]
        valid: ValidArgs,
    },
    /// Run align, peak and valid in sequence.
    Exec {
        #[command(flatten)]
        seqs: SequenceArgs,
        #[command(flatten)]
        peak: PeakArgs,
        #[command(flatten)]
        valid: ValidArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log = LogContext {
        level: LogLevel::from_flags(cli.global.verbose, cli.global.quiet),
        log_file: cli.global.log_file.clone(),
    };
    log.install().context("failed to initialise logging")?;

    let mut config = PipelineConfig {
        workdir: cli.global.workdir.clone(),
        threads: cli.global.threads.max(1),
        ..PipelineConfig::default()
    };

    match cli.command {
        Commands::Align { seqs } => {
            require_tools(&["lastdb", "lastal", "last-train"])?;
            run_align_stage(&config, &align_inputs(&seqs)).context("align stage failed")?;
        }
        Commands::Peak {
            seqs,
            peak,
            genome_maf,
            insert_maf,
        } => {
            require_tools(&["lastdb", "lastal"])?;
            require_mask_tools(&peak)?;
            apply_peak_args(&mut config, &peak);
            let inputs = PeakInputs {
                genome_maf: config.workdir.join(genome_maf),
                insert_maf: config.workdir.join(insert_maf),
                ..peak_inputs(&config, &seqs, &peak)
            };
            run_peak_stage(&config, &inputs).context("peak stage failed")?;
        }
        Commands::Valid {
            trim_read,
            peak_bed,
            anchor_bed,
            valid,
        } => {
            require_tools(REQUIRED_TOOLS)?;
            apply_valid_args(&mut config, &valid);
            let inputs = ValidateInputs {
                trimmed_reads: config.workdir.join(trim_read),
                peaks_bed: config.workdir.join(peak_bed),
                anchors_bed: config.workdir.join(anchor_bed),
                library: valid.lib.clone(),
            };
            let (peaks, anchors, trimmed) =
                load_validate_inputs(&inputs).context("failed to load peak stage output")?;
            run_validate_stage(&config, &peaks, &anchors, &trimmed, inputs.library.as_deref())
                .context("validation stage failed")?;
        }
        Commands::Exec { seqs, peak, valid } => {
            require_tools(REQUIRED_TOOLS)?;
            require_mask_tools(&peak)?;
            apply_peak_args(&mut config, &peak);
            apply_valid_args(&mut config, &valid);
            run_align_stage(&config, &align_inputs(&seqs)).context("align stage failed")?;
            let analysis = run_peak_stage(&config, &peak_inputs(&config, &seqs, &peak))
                .context("peak stage failed")?;
            run_validate_stage(
                &config,
                &analysis.peaks,
                &analysis.anchor_intervals(),
                &analysis.trimmed,
                valid.lib.as_deref(),
            )
            .context("validation stage failed")?;
        }
    }

    info!("finished");
    Ok(())
}

fn align_inputs(seqs: &SequenceArgs) -> AlignInputs {
    AlignInputs {
        reads: seqs.read.clone(),
        reference: seqs.reference.clone(),
        insertion: seqs.insert.clone(),
    }
}

fn peak_inputs(config: &PipelineConfig, seqs: &SequenceArgs, peak: &PeakArgs) -> PeakInputs {
    let layout = config.layout();
    PeakInputs {
        reads: seqs.read.clone(),
        reference: seqs.reference.clone(),
        insertion: seqs.insert.clone(),
        genome_maf: layout.read_to_ref_maf(),
        insert_maf: layout.read_to_insert_maf(),
        genome_lengths: peak.genome.clone(),
        target_start: peak.target_start,
        target_end: peak.target_end,
        mask: peak.mask.clone(),
    }
}

fn require_mask_tools(peak: &PeakArgs) -> Result<(), ToolError> {
    match peak.mask {
        Some(_) => require_tools(MASK_TOOLS),
        None => Ok(()),
    }
}

fn apply_peak_args(config: &mut PipelineConfig, args: &PeakArgs) {
    config.filter.min_read_length = args.min_read_length;
    config.filter.max_proportion = args.max_prop;
    config.filter.min_proportion = args.min_prop;
    config.filter.exogenous = args.exog;
    if !args.include_contig.is_empty() {
        config.contigs = ContigFilter::Include(args.include_contig.iter().cloned().collect());
    } else if !args.exclude_contig.is_empty() {
        config.contigs = ContigFilter::Exclude(args.exclude_contig.iter().cloned().collect());
    }
    config.max_trim_length = args.max_trim_length;
    config.padding = args.padding;
    config.peak.min_coverage = args.min_cov;
    config.peak.min_width = args.min_width;
    config.peak.mode = if args.merge_peaks {
        PeakMode::MergeByGap
    } else {
        PeakMode::Windowed
    };
}

fn apply_valid_args(config: &mut PipelineConfig, args: &ValidArgs) {
    let validation = &mut config.validation;
    validation.sample = usize::try_from(args.sample).unwrap_or(usize::MAX);
    validation.thresholds = ValidationThresholds {
        min_insert_proportion: args.min_insprop,
        min_insert_length: args.min_inslen,
    };
    validation.write_vcf = args.vcf;
    if !args.lib_names.is_empty() {
        validation.library_names = Some(args.lib_names.iter().cloned().collect::<HashSet<_>>());
    }
}
