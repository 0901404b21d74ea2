use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::genomics::{ContigFilter, FilterParams, PeakParams, ValidationThresholds};

/// Validation stage parameters.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ValidationParams {
    /// Insertion acceptance thresholds.
    pub thresholds: ValidationThresholds,
    /// Calls closer than this to the previous accepted call are dropped.
    pub dedup_distance: u64,
    /// Maximum number of flank pairs fed to the assembler per peak.
    pub sample: usize,
    /// Restrict insertion-library hits to these member names.
    pub library_names: Option<HashSet<String>>,
    /// Also write `result/validate.vcf`.
    pub write_vcf: bool,
}

impl Default for ValidationParams {
    fn default() -> Self {
        Self {
            thresholds: ValidationThresholds::default(),
            dedup_distance: 100,
            sample: 500,
            library_names: None,
            write_vcf: false,
        }
    }
}

/// Settings shared by every stage.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory holding `lastdb/`, `lastal/`, `peak/`, `result/` and `tmp/`.
    pub workdir: PathBuf,
    /// Worker threads for external tools and per-peak validation.
    pub threads: usize,
    /// Genome alignment filter thresholds.
    pub filter: FilterParams,
    /// Reference contigs allowed to carry anchors.
    pub contigs: ContigFilter,
    /// Padding of the consensus target window.
    pub padding: u64,
    /// Reads whose consensus hit starts later than this are not trimmed.
    pub max_trim_length: u64,
    /// Peak detection parameters.
    pub peak: PeakParams,
    /// Validation parameters.
    pub validation: ValidationParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("."),
            threads: 1,
            filter: FilterParams::default(),
            contigs: ContigFilter::default(),
            padding: 20,
            max_trim_length: 100,
            peak: PeakParams::default(),
            validation: ValidationParams::default(),
        }
    }
}

impl PipelineConfig {
    /// Output locations under the working directory.
    pub fn layout(&self) -> Layout {
        Layout::new(&self.workdir)
    }
}

/// Fixed file layout of a run.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    /// Layout rooted at `workdir`.
    pub fn new(workdir: &Path) -> Self {
        Self {
            root: workdir.to_path_buf(),
        }
    }

    /// LAST database directory.
    pub fn lastdb_dir(&self) -> PathBuf {
        self.root.join("lastdb")
    }

    /// LAST database named `name`.
    pub fn db(&self, name: &str) -> PathBuf {
        self.lastdb_dir().join(name)
    }

    /// Read alignment directory.
    pub fn lastal_dir(&self) -> PathBuf {
        self.root.join("lastal")
    }

    /// Reads aligned to the reference genome.
    pub fn read_to_ref_maf(&self) -> PathBuf {
        self.lastal_dir().join("read_to_ref.maf")
    }

    /// Reads aligned to the insertion consensus.
    pub fn read_to_insert_maf(&self) -> PathBuf {
        self.lastal_dir().join("read_to_insert.maf")
    }

    /// Peak stage directory.
    pub fn peak_dir(&self) -> PathBuf {
        self.root.join("peak")
    }

    /// Sorted anchor BED.
    pub fn sorted_bed(&self) -> PathBuf {
        self.peak_dir().join("sorted.bed")
    }

    /// Peak BED.
    pub fn peaks_bed(&self) -> PathBuf {
        self.peak_dir().join("peaks.bed")
    }

    /// Trimmed reads FASTA.
    pub fn trimmed_fasta(&self) -> PathBuf {
        self.peak_dir().join("trimmed_reads.fasta")
    }

    /// Result directory.
    pub fn result_dir(&self) -> PathBuf {
        self.root.join("result")
    }

    /// Scratch directory removed after validation.
    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }
}
