#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use caspeak::external::{Assembler, ContigAligner, ToolError};
use caspeak::genomics::{Alignment, Strand};

fn snapshot_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("snapshots")
}

pub fn assert_snapshot(name: &str, actual: &str) {
    let path = snapshot_root().join(name);
    if std::env::var("CASPEAK_UPDATE_SNAPSHOTS").is_ok() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create snapshot directory");
        }
        fs::write(&path, actual).expect("write snapshot");
        return;
    }

    let expected =
        fs::read_to_string(&path).unwrap_or_else(|_| panic!("snapshot {:?} not found", path));
    if normalize(&expected) != normalize(actual) {
        panic!(
            "Snapshot mismatch for {:?}. Set CASPEAK_UPDATE_SNAPSHOTS=1 to regenerate.\nExpected:\n{}\nActual:\n{}",
            path,
            expected,
            actual
        );
    }
}

fn normalize(input: &str) -> String {
    input.replace("\r\n", "\n")
}

/// Contig-to-reference alignment on chr1 for a contig named `peak1-4`.
pub fn contig_hit(
    ref_start: u64,
    ref_end: u64,
    query_start: u64,
    query_end: u64,
    strand: Strand,
) -> Alignment {
    Alignment::new("chr1", 100_000, ref_start, ref_end, "peak1-4", 2_000, query_start, query_end, strand)
        .expect("valid contig alignment")
}

/// Contig-to-library alignment against insertion `name`.
pub fn insertion_hit(name: &str, query_start: u64, query_end: u64) -> Alignment {
    let span = query_end - query_start;
    Alignment::new(name, 6_000, 0, span, "peak1-4", 2_000, query_start, query_end, Strand::Forward)
        .expect("valid insertion alignment")
}

/// MAF text for pairwise alignments, reference line first.
pub fn to_maf(alignments: &[Alignment]) -> String {
    let mut out = String::from("# test\n\n");
    for aln in alignments {
        let (start, strand) = match aln.query_strand {
            Strand::Forward => (aln.query_start, '+'),
            Strand::Reverse => (aln.query_length - aln.query_end, '-'),
        };
        out.push_str("a score=100\n");
        out.push_str(&format!(
            "s {} {} {} + {} N\n",
            aln.ref_name,
            aln.ref_start,
            aln.ref_end - aln.ref_start,
            aln.ref_length
        ));
        out.push_str(&format!(
            "s {} {} {} {} {} N\n\n",
            aln.query_name,
            start,
            aln.query_end - aln.query_start,
            strand,
            aln.query_length
        ));
    }
    out
}

/// Assembler stand-in returning a fixed contig and recording its inputs.
#[derive(Debug)]
pub struct FakeAssembler {
    pub contig: Vec<u8>,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl FakeAssembler {
    pub fn new(contig: Vec<u8>) -> Self {
        Self {
            contig,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl Assembler for FakeAssembler {
    fn assemble(&self, contig_name: &str, pairs_fasta: &[u8]) -> Result<Vec<u8>, ToolError> {
        self.calls
            .lock()
            .expect("assembler log poisoned")
            .push((contig_name.to_string(), String::from_utf8_lossy(pairs_fasta).into_owned()));
        let mut out = format!(">{contig_name}\n").into_bytes();
        out.extend_from_slice(&self.contig);
        out.push(b'\n');
        Ok(out)
    }
}

/// Contig aligner stand-in returning canned MAF text.
#[derive(Debug, Clone, Default)]
pub struct FakeAligner {
    pub reference: Vec<Alignment>,
    pub insertions: Vec<Alignment>,
    pub fail: bool,
}

impl ContigAligner for FakeAligner {
    fn align_to_reference(&self, _tag: &str, _contig_fasta: &[u8]) -> Result<String, ToolError> {
        if self.fail {
            return Err(ToolError::Failed {
                tool: "lastal".into(),
                status: "exit status: 1".into(),
                stderr: "database not found".into(),
            });
        }
        Ok(to_maf(&self.reference))
    }

    fn align_to_insertions(&self, _contig_fasta: &[u8]) -> Result<String, ToolError> {
        Ok(to_maf(&self.insertions))
    }
}

/// Deterministic nucleotide sequence of `len` bases.
pub fn sequence(len: usize, seed: usize) -> Vec<u8> {
    (0..len).map(|i| b"ACGT"[(i * 7 + seed) % 4]).collect()
}
