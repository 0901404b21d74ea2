use std::ffi::OsStr;
use std::path::PathBuf;

use crate::external::{run_tool, Assembler, Sink, ToolError};

/// `lamassemble` consensus assembly with a trained LAST parameter file.
#[derive(Debug, Clone)]
pub struct Lamassemble {
    train_file: PathBuf,
    threads: usize,
}

impl Lamassemble {
    /// Assemble with parameters trained on the trimmed reads.
    pub fn new(train_file: PathBuf, threads: usize) -> Self {
        Self {
            train_file,
            threads: threads.max(1),
        }
    }
}

/// Upper-case sequence lines, leaving headers alone.
pub(crate) fn uppercase_sequences(fasta: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(fasta.len());
    for line in fasta.split_inclusive(|&b| b == b'\n') {
        if line.first() == Some(&b'>') {
            out.extend_from_slice(line);
        } else {
            out.extend(line.iter().map(u8::to_ascii_uppercase));
        }
    }
    out
}

impl Assembler for Lamassemble {
    fn assemble(&self, contig_name: &str, pairs_fasta: &[u8]) -> Result<Vec<u8>, ToolError> {
        let threads = self.threads.to_string();
        let args = [
            OsStr::new("-n"),
            OsStr::new(contig_name),
            OsStr::new("-P"),
            OsStr::new(&threads),
            self.train_file.as_os_str(),
            OsStr::new("-"),
        ];
        let raw = run_tool("lamassemble", &args, Some(pairs_fasta), Sink::Capture)?;
        Ok(uppercase_sequences(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_keep_case() {
        let fasta = b">peak1-4 acgt\nacgtNn\nAC\n";
        assert_eq!(uppercase_sequences(fasta), b">peak1-4 acgt\nACGTNN\nAC\n".to_vec());
    }
}
