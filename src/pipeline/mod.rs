//! The `align`, `peak` and `valid` stages and their on-disk hand-off.

mod config;
mod peak_stage;
mod validate_stage;

pub use config::{Layout, PipelineConfig, ValidationParams};
pub use peak_stage::{
    analyze_peaks, mask_reference_copies, run_peak_stage, write_peak_outputs, PeakAnalysis, PeakInputs,
    ValidationDb,
};
pub use validate_stage::{
    dedup_results, load_validate_inputs, run_validate_stage, validate_peaks, write_results,
    ValidateInputs, ValidatedPeak,
};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::external::{LastAligner, ToolError};
use crate::genomics::{ParseError, PeakError};

/// Errors that abort a stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An input file could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A setup step of an external tool failed.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// Peak detection failed.
    #[error(transparent)]
    Peak(#[from] PeakError),

    /// A file or directory could not be written.
    #[error("cannot write {path}: {source}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The validation worker pool could not be built.
    #[error("cannot start worker pool: {0}")]
    ThreadPool(String),

    /// The target window lies outside the insertion consensus.
    #[error("target window {start}-{end} is outside the insertion consensus of length {length}")]
    TargetOutOfRange {
        /// Target start.
        start: u64,
        /// Target end (inclusive).
        end: u64,
        /// Consensus length.
        length: usize,
    },
}

pub(crate) fn io_err(path: &Path) -> impl FnOnce(io::Error) -> PipelineError + '_ {
    move |source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    }
}

pub(crate) fn create_dir(path: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(path).map_err(io_err(path))
}

/// Inputs of the `align` stage.
#[derive(Debug, Clone)]
pub struct AlignInputs {
    /// Reads (FASTA/FASTQ).
    pub reads: PathBuf,
    /// Reference genome FASTA.
    pub reference: PathBuf,
    /// Insertion consensus FASTA.
    pub insertion: PathBuf,
}

/// Index the reference and consensus and split-align the reads to both.
pub fn run_align_stage(config: &PipelineConfig, inputs: &AlignInputs) -> Result<(), PipelineError> {
    let layout = config.layout();
    let last = LastAligner::new(config.threads);
    create_dir(&layout.lastdb_dir())?;
    create_dir(&layout.lastal_dir())?;

    info!("indexing reference and insertion consensus");
    last.index(&layout.db("ref"), &[inputs.reference.as_path()])?;
    last.index(&layout.db("insert"), &[inputs.insertion.as_path()])?;

    for (db, out) in [
        ("ref", layout.read_to_ref_maf()),
        ("insert", layout.read_to_insert_maf()),
    ] {
        info!(database = db, "aligning reads");
        let params = layout.lastal_dir().join(format!("read_to_{db}.train"));
        last.train(&layout.db(db), &inputs.reads, &params)?;
        last.align_split(&layout.db(db), &params, &inputs.reads, &out)?;
    }
    Ok(())
}
