//! Wrappers around the external aligner and assembler binaries.
//!
//! The validation stage only sees the [`Assembler`] and [`ContigAligner`]
//! traits, so the pipeline can run against in-process fakes in tests.

mod lamassemble;
mod last;
mod seg;

pub use lamassemble::Lamassemble;
pub use last::{LastAligner, LastContigAligner};
pub use seg::{mask_reference, MASK_TOOLS};

use std::env;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use thiserror::Error;
use tracing::debug;

/// Tools every full run needs on `PATH`.
pub const REQUIRED_TOOLS: &[&str] = &["lastdb", "lastal", "last-train", "lamassemble"];

/// Failure of an external program, naming the tool involved.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Binary is not on `PATH`.
    #[error("{tool} is not found in PATH")]
    NotFound {
        /// Program name.
        tool: String,
    },

    /// The process could not be started or its pipes failed.
    #[error("failed to run {tool}: {source}")]
    Io {
        /// Program name.
        tool: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The process exited unsuccessfully.
    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        /// Program name.
        tool: String,
        /// Exit status description.
        status: String,
        /// Captured standard error, trimmed.
        stderr: String,
    },
}

impl ToolError {
    fn io(tool: &str, source: io::Error) -> Self {
        ToolError::Io {
            tool: tool.to_string(),
            source,
        }
    }
}

/// Locate `tool` on `PATH`.
pub fn find_in_path(tool: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(tool))
        .find(|candidate| candidate.is_file())
}

/// Fail with the first tool missing from `PATH`.
pub fn require_tools(tools: &[&str]) -> Result<(), ToolError> {
    for tool in tools {
        if find_in_path(tool).is_none() {
            return Err(ToolError::NotFound {
                tool: tool.to_string(),
            });
        }
    }
    Ok(())
}

/// Where a tool's standard output goes.
#[derive(Debug)]
pub enum Sink {
    /// Capture into memory and return it.
    Capture,
    /// Stream into a file.
    File(File),
}

/// Run `tool` with `args`, optionally feeding `input` on standard input.
///
/// Returns captured standard output (empty when streamed to a file).
pub fn run_tool<S: AsRef<OsStr>>(
    tool: &str,
    args: &[S],
    input: Option<&[u8]>,
    sink: Sink,
) -> Result<Vec<u8>, ToolError> {
    debug!(tool, args = ?args.iter().map(|a| a.as_ref().to_string_lossy().into_owned()).collect::<Vec<_>>(), "running external tool");

    let stdout = match sink {
        Sink::Capture => Stdio::piped(),
        Sink::File(file) => Stdio::from(file),
    };
    let mut child = Command::new(tool)
        .args(args)
        .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(stdout)
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ToolError::NotFound {
                tool: tool.to_string(),
            },
            _ => ToolError::io(tool, e),
        })?;

    let stdin = child.stdin.take();
    let output = thread::scope(|scope| {
        let writer = scope.spawn(move || -> io::Result<()> {
            if let (Some(mut pipe), Some(bytes)) = (stdin, input) {
                pipe.write_all(bytes)?;
            }
            Ok(())
        });
        let output = child.wait_with_output();
        let fed = writer
            .join()
            .unwrap_or_else(|_| Err(io::Error::other("stdin writer panicked")));
        output.and_then(|out| fed.map(|_| out))
    })
    .map_err(|e| ToolError::io(tool, e))?;

    if !output.status.success() {
        return Err(ToolError::Failed {
            tool: tool.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}

/// Consensus assembly of flank pairs into one contig.
pub trait Assembler: Send + Sync {
    /// Assemble `pairs_fasta` into a FASTA record named `contig_name`.
    fn assemble(&self, contig_name: &str, pairs_fasta: &[u8]) -> Result<Vec<u8>, ToolError>;
}

/// Alignment of assembled contigs for breakpoint validation.
pub trait ContigAligner: Send + Sync {
    /// MAF of the contig against the reference (plus insertion) database.
    fn align_to_reference(&self, tag: &str, contig_fasta: &[u8]) -> Result<String, ToolError>;

    /// MAF of the contig against the insertion library.
    fn align_to_insertions(&self, contig_fasta: &[u8]) -> Result<String, ToolError>;
}
