//! Streaming reader for pairwise MAF output.
//!
//! Each alignment block holds two `s` lines: the reference first, the query
//! second. Other line types (`a`, `p`, `q`, `i`, `e`, comments) are skipped.

use std::io::BufRead;

use crate::genomics::io::ParseError;
use crate::genomics::{Alignment, Strand};

#[derive(Debug)]
struct SeqLine {
    name: String,
    start: u64,
    size: u64,
    strand: Strand,
    src_length: u64,
}

fn parse_s_line(line: &str, line_no: usize) -> Result<SeqLine, ParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 6 {
        return Err(ParseError::malformed(line_no, "'s' line needs at least 6 fields"));
    }
    let number = |idx: usize, what: &str| -> Result<u64, ParseError> {
        fields[idx]
            .parse()
            .map_err(|_| ParseError::malformed(line_no, format!("invalid {what} '{}'", fields[idx])))
    };
    Ok(SeqLine {
        name: fields[1].to_string(),
        start: number(2, "start")?,
        size: number(3, "size")?,
        strand: fields[4]
            .parse()
            .map_err(|source| ParseError::Alignment { line: line_no, source })?,
        src_length: number(5, "source length")?,
    })
}

/// Iterator over the alignments of a MAF stream.
///
/// Reverse-strand query coordinates are converted to the forward strand.
#[derive(Debug)]
pub struct MafReader<R> {
    reader: R,
    line_no: usize,
    buf: String,
    pending: Option<(SeqLine, usize)>,
    done: bool,
}

impl<R: BufRead> MafReader<R> {
    /// Wrap a buffered reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            buf: String::new(),
            pending: None,
            done: false,
        }
    }

    fn build(reference: SeqLine, query: SeqLine, line_no: usize) -> Result<Alignment, ParseError> {
        let (query_start, query_end) = match query.strand {
            Strand::Forward => (query.start, query.start + query.size),
            Strand::Reverse => {
                let end = query.src_length.checked_sub(query.start).ok_or_else(|| {
                    ParseError::malformed(line_no, "query start beyond source length")
                })?;
                (end.saturating_sub(query.size), end)
            }
        };
        Alignment::new(
            reference.name,
            reference.src_length,
            reference.start,
            reference.start + reference.size,
            query.name,
            query.src_length,
            query_start,
            query_end,
            query.strand,
        )
        .map_err(|source| ParseError::Alignment { line: line_no, source })
    }

    fn unpaired(&mut self) -> Option<ParseError> {
        self.pending
            .take()
            .map(|(_, line)| ParseError::malformed(line, "reference 's' line without a query line"))
    }
}

impl<R: BufRead> Iterator for MafReader<R> {
    type Item = Result<Alignment, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => {
                    self.done = true;
                    return self.unpaired().map(Err);
                }
                Ok(_) => {}
                Err(err) => {
                    self.done = true;
                    return Some(Err(err.into()));
                }
            }
            self.line_no += 1;
            let line = self.buf.trim_end();

            if line.starts_with('a') {
                if let Some(err) = self.unpaired() {
                    return Some(Err(err));
                }
                continue;
            }
            if !line.starts_with("s ") && !line.starts_with("s\t") {
                continue;
            }

            let seq = match parse_s_line(line, self.line_no) {
                Ok(seq) => seq,
                Err(err) => return Some(Err(err)),
            };
            match self.pending.take() {
                None => self.pending = Some((seq, self.line_no)),
                Some((reference, _)) => return Some(Self::build(reference, seq, self.line_no)),
            }
        }
    }
}

/// Parse every alignment of an in-memory MAF document.
pub fn parse_maf_str(text: &str) -> Result<Vec<Alignment>, ParseError> {
    MafReader::new(text.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAF: &str = "\
# LAST version 1500
a score=120
s chr1   1000 200 + 50000 ACGT
s read1    10 200 - 1000  ACGT

a score=90
s chr2    500 100 + 9000 ACGT
s read1   400 100 + 1000 ACGT
";

    #[test]
    fn reverse_query_is_converted_to_forward_coordinates() {
        let alns = parse_maf_str(MAF).unwrap();
        assert_eq!(alns.len(), 2);
        let first = &alns[0];
        assert_eq!((first.ref_start, first.ref_end), (1_000, 1_200));
        assert_eq!((first.query_start, first.query_end), (790, 990));
        assert_eq!(first.query_strand, Strand::Reverse);
        assert_eq!(alns[1].query_start, 400);
    }

    #[test]
    fn dangling_reference_line_is_an_error() {
        let text = "a score=1\ns chr1 0 10 + 100 A\na score=2\n";
        match parse_maf_str(text) {
            Err(ParseError::Malformed { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {other:?}"),
        }
        let truncated = "a score=1\ns chr1 0 10 + 100 A\n";
        assert!(parse_maf_str(truncated).is_err());
    }

    #[test]
    fn bad_strand_is_reported() {
        let text = "a\ns chr1 0 10 + 100 A\ns r 0 10 * 100 A\n";
        assert!(matches!(
            parse_maf_str(text),
            Err(ParseError::Alignment { line: 3, .. })
        ));
    }
}
