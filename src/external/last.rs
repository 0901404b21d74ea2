use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::external::{run_tool, ContigAligner, Sink, ToolError};

/// LAST indexing and read alignment for the setup stages.
#[derive(Debug, Clone)]
pub struct LastAligner {
    threads: usize,
}

impl LastAligner {
    /// Use `threads` for every LAST invocation.
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
        }
    }

    fn thread_flag(&self) -> String {
        format!("-P{}", self.threads)
    }

    fn index_args(&self, db: &Path, inputs: &[&Path], keep_lowercase: bool) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![self.thread_flag().into(), "-uRY4".into()];
        if keep_lowercase {
            args.push("-R11".into());
            args.push("-c".into());
        }
        args.push(db.as_os_str().to_owned());
        args.extend(inputs.iter().map(|p| p.as_os_str().to_owned()));
        args
    }

    /// Build a soft-masking database `db` from FASTA files.
    pub fn index(&self, db: &Path, inputs: &[&Path]) -> Result<(), ToolError> {
        run_tool("lastdb", &self.index_args(db, inputs, false), None, Sink::Capture)?;
        Ok(())
    }

    /// Build `db` from pre-masked FASTA, keeping lower-case letters masked.
    pub fn index_masked(&self, db: &Path, inputs: &[&Path]) -> Result<(), ToolError> {
        run_tool("lastdb", &self.index_args(db, inputs, true), None, Sink::Capture)?;
        Ok(())
    }

    /// Build a plain database `db` from in-memory FASTA.
    pub fn index_fasta(&self, db: &Path, fasta: &[u8]) -> Result<(), ToolError> {
        run_tool("lastdb", &[db.as_os_str()], Some(fasta), Sink::Capture)?;
        Ok(())
    }

    /// Train substitution and gap parameters of `reads` against `db`.
    pub fn train(&self, db: &Path, reads: &Path, params_out: &Path) -> Result<(), ToolError> {
        let file = File::create(params_out).map_err(|e| ToolError::io("last-train", e))?;
        let args: Vec<OsString> = vec![self.thread_flag().into(), "-Q0".into(), db.as_os_str().to_owned(), reads.as_os_str().to_owned()];
        run_tool("last-train", &args, None, Sink::File(file))?;
        Ok(())
    }

    /// Train parameters from in-memory FASTA.
    pub fn train_fasta(&self, db: &Path, fasta: &[u8], params_out: &Path) -> Result<(), ToolError> {
        let file = File::create(params_out).map_err(|e| ToolError::io("last-train", e))?;
        let args: Vec<OsString> = vec![self.thread_flag().into(), "-Q0".into(), db.as_os_str().to_owned(), "-".into()];
        run_tool("last-train", &args, Some(fasta), Sink::File(file))?;
        Ok(())
    }

    /// Split-align `reads` to `db` with trained `params`, writing MAF to `out`.
    pub fn align_split(&self, db: &Path, params: &Path, reads: &Path, out: &Path) -> Result<(), ToolError> {
        let file = File::create(out).map_err(|e| ToolError::io("lastal", e))?;
        let args: Vec<OsString> = vec![
            self.thread_flag().into(),
            "--split".into(),
            "-p".into(),
            params.as_os_str().to_owned(),
            db.as_os_str().to_owned(),
            reads.as_os_str().to_owned(),
        ];
        run_tool("lastal", &args, None, Sink::File(file))?;
        Ok(())
    }

    /// Align all sequences of `query` to `db` without splitting; returns MAF.
    pub fn align(&self, db: &Path, query: &Path) -> Result<String, ToolError> {
        let args: Vec<OsString> = vec![self.thread_flag().into(), db.as_os_str().to_owned(), query.as_os_str().to_owned()];
        let out = run_tool("lastal", &args, None, Sink::Capture)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

/// Per-contig alignment against the validation and insertion databases.
#[derive(Debug, Clone)]
pub struct LastContigAligner {
    validate_db: PathBuf,
    insert_db: PathBuf,
    scratch: PathBuf,
}

impl LastContigAligner {
    /// `scratch` receives one trained parameter file per contig.
    pub fn new(validate_db: PathBuf, insert_db: PathBuf, scratch: PathBuf) -> Self {
        Self {
            validate_db,
            insert_db,
            scratch,
        }
    }
}

impl ContigAligner for LastContigAligner {
    fn align_to_reference(&self, tag: &str, contig_fasta: &[u8]) -> Result<String, ToolError> {
        let params = self.scratch.join(format!("{tag}.train"));
        let trainer = LastAligner::new(1);
        trainer.train_fasta(&self.validate_db, contig_fasta, &params)?;

        let args: Vec<OsString> = vec![
            "-p".into(),
            params.as_os_str().to_owned(),
            "--split".into(),
            self.validate_db.as_os_str().to_owned(),
            "-".into(),
        ];
        let out = run_tool("lastal", &args, Some(contig_fasta), Sink::Capture);
        let _ = fs::remove_file(&params);
        Ok(String::from_utf8_lossy(&out?).into_owned())
    }

    fn align_to_insertions(&self, contig_fasta: &[u8]) -> Result<String, ToolError> {
        let args: Vec<OsString> = vec!["--split".into(), self.insert_db.as_os_str().to_owned(), "-".into()];
        let out = run_tool("lastal", &args, Some(contig_fasta), Sink::Capture)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}
