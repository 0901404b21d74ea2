//! Plain-text readers and writers for the files exchanged between stages.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;
use std::str::FromStr;

use flate2::read::MultiGzDecoder;
use needletail::parse_fastx_reader;
use thiserror::Error;

use crate::genomics::{AlignmentError, ContigLengths, CoverageRecord, Interval, Peak, Strand, TrimmedRead};

/// Errors raised while reading input files.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A line did not have the expected shape.
    #[error("line {line}: {message}")]
    Malformed {
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        message: String,
    },

    /// A record described an impossible alignment.
    #[error("line {line}: {source}")]
    Alignment {
        /// 1-based line number.
        line: usize,
        /// Rejected interval or strand.
        #[source]
        source: AlignmentError,
    },

    /// FASTA/FASTQ parser failure.
    #[error("sequence parse error: {0}")]
    Fastx(String),
}

impl ParseError {
    pub(crate) fn malformed(line: usize, message: impl Into<String>) -> Self {
        ParseError::Malformed {
            line,
            message: message.into(),
        }
    }
}

/// Open `path` for buffered reading.
///
/// `-` reads standard input; a `.gz` suffix is decompressed on the fly.
pub fn open_input(path: &Path) -> Result<Box<dyn BufRead + Send>, ParseError> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Read every FASTA/FASTQ record as `(name, sequence)`.
///
/// The name is the first whitespace-delimited token of the header.
pub fn read_fastx(path: &Path) -> Result<Vec<(String, Vec<u8>)>, ParseError> {
    read_fastx_from(open_input(path)?)
}

/// Like [`read_fastx`], over any reader (e.g. captured tool output).
pub fn read_fastx_from<R: Read + Send>(input: R) -> Result<Vec<(String, Vec<u8>)>, ParseError> {
    let mut reader = parse_fastx_reader(input).map_err(|e| ParseError::Fastx(e.to_string()))?;
    let mut records = Vec::new();
    while let Some(result) = reader.next() {
        let record = result.map_err(|e| ParseError::Fastx(e.to_string()))?;
        let id = String::from_utf8_lossy(record.id());
        let name = id.split_whitespace().next().unwrap_or_default().to_string();
        records.push((name, record.seq().to_vec()));
    }
    Ok(records)
}

/// Sequence of the first record in a FASTA/FASTQ file, upper-cased.
pub fn read_first_sequence(path: &Path) -> Result<Vec<u8>, ParseError> {
    let (_, mut seq) = read_fastx(path)?
        .into_iter()
        .next()
        .ok_or_else(|| ParseError::Fastx(format!("{} contains no records", path.display())))?;
    seq.make_ascii_uppercase();
    Ok(seq)
}

fn field<'a>(fields: &[&'a str], idx: usize, line: usize, what: &str) -> Result<&'a str, ParseError> {
    fields
        .get(idx)
        .copied()
        .ok_or_else(|| ParseError::malformed(line, format!("missing {what} column")))
}

fn number<T: FromStr>(fields: &[&str], idx: usize, line: usize, what: &str) -> Result<T, ParseError> {
    let raw = field(fields, idx, line, what)?;
    raw.parse()
        .map_err(|_| ParseError::malformed(line, format!("invalid {what} '{raw}'")))
}

/// Iterate non-empty, non-comment lines as `(line_number, fields)`.
fn for_each_record<R, F>(reader: R, mut f: F) -> Result<(), ParseError>
where
    R: BufRead,
    F: FnMut(usize, &[&str]) -> Result<(), ParseError>,
{
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("track") {
            continue;
        }
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        f(idx + 1, &fields)?;
    }
    Ok(())
}

/// Read a `name length` table, keeping file order.
pub fn read_contig_lengths<R: BufRead>(reader: R) -> Result<ContigLengths, ParseError> {
    let mut contigs = ContigLengths::new();
    for_each_record(reader, |line, fields| {
        let name = field(fields, 0, line, "contig name")?;
        contigs.insert(name, number(fields, 1, line, "contig length")?);
        Ok(())
    })?;
    Ok(contigs)
}

/// Read a `chrom start end coverage` track.
pub fn read_coverage<R: BufRead>(reader: R) -> Result<Vec<CoverageRecord>, ParseError> {
    let mut track = Vec::new();
    for_each_record(reader, |line, fields| {
        track.push(CoverageRecord {
            chrom: field(fields, 0, line, "chrom")?.to_string(),
            start: number(fields, 1, line, "start")?,
            end: number(fields, 2, line, "end")?,
            depth: number(fields, 3, line, "coverage")?,
        });
        Ok(())
    })?;
    Ok(track)
}

/// Read peaks written as BED5 (`chrom start end label coverage`).
///
/// Three-column BED is accepted with zero coverage.
pub fn read_peaks_bed<R: BufRead>(reader: R) -> Result<Vec<Peak>, ParseError> {
    let mut peaks = Vec::new();
    for_each_record(reader, |line, fields| {
        let coverage = if fields.len() >= 5 {
            number(fields, 4, line, "coverage")?
        } else {
            0
        };
        peaks.push(Peak::new(
            field(fields, 0, line, "chrom")?,
            number(fields, 1, line, "start")?,
            number(fields, 2, line, "end")?,
            coverage,
        ));
        Ok(())
    })?;
    Ok(peaks)
}

/// One BED record, as written by [`Alignment::to_bed`](crate::genomics::Alignment::to_bed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BedRecord {
    /// Interval with the name column.
    pub interval: Interval,
    /// Strand column, when present and not `.`.
    pub strand: Option<Strand>,
}

/// Read BED records with at least four columns.
pub fn read_bed<R: BufRead>(reader: R) -> Result<Vec<BedRecord>, ParseError> {
    let mut records = Vec::new();
    for_each_record(reader, |line, fields| {
        let strand = match fields.get(5) {
            None | Some(&".") => None,
            Some(raw) => Some(
                raw.parse::<Strand>()
                    .map_err(|source| ParseError::Alignment { line, source })?,
            ),
        };
        records.push(BedRecord {
            interval: Interval::new(
                field(fields, 0, line, "chrom")?,
                number(fields, 1, line, "start")?,
                number(fields, 2, line, "end")?,
                field(fields, 3, line, "name")?,
            ),
            strand,
        });
        Ok(())
    })?;
    Ok(records)
}

/// Write trimmed reads as FASTA, appending the strand symbol to each name.
pub fn write_trimmed_fasta<'a, W, I>(writer: &mut W, reads: I) -> io::Result<()>
where
    W: Write,
    I: IntoIterator<Item = (&'a String, &'a TrimmedRead)>,
{
    for (name, read) in reads {
        writeln!(writer, ">{}{}", name, read.strand.symbol())?;
        writer.write_all(&read.sequence)?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

/// Read trimmed reads back, splitting the strand symbol off each name.
pub fn read_trimmed_fasta(path: &Path) -> Result<HashMap<String, TrimmedRead>, ParseError> {
    let mut reads = HashMap::new();
    for (mut name, sequence) in read_fastx(path)? {
        let strand = name
            .pop()
            .and_then(Strand::from_symbol)
            .ok_or_else(|| ParseError::Fastx(format!("record '{name}' lacks a strand suffix")))?;
        reads.insert(name, TrimmedRead { sequence, strand });
    }
    Ok(reads)
}
