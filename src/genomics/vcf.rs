use anyhow::{anyhow, Result};
use std::io::Write;

use super::BreakpointCall;

const HEADER: &str = "##fileformat=VCFv4.2\n\
##source=caspeak\n\
##INFO=<ID=END,Number=1,Type=Integer,Description=\"End position of the structural variant\">\n\
##INFO=<ID=SVTYPE,Number=1,Type=String,Description=\"Type of structural variant\">\n\
##INFO=<ID=SVLEN,Number=1,Type=Integer,Description=\"Length of structural variant\">\n\
##INFO=<ID=SUPP_READS,Number=1,Type=Integer,Description=\"Number of supporting reads\">\n\
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tSAMPLE\n";

/// Write the VCF header.
///
/// No `##fileDate` line is written, so output depends only on the calls.
pub fn write_vcf_header<W: Write>(writer: &mut W) -> Result<()> {
    writer.write_all(HEADER.as_bytes())?;
    Ok(())
}

/// Write one insertion record; `id` numbers the call within the output.
pub fn write_vcf_record<W: Write>(writer: &mut W, id: usize, call: &BreakpointCall) -> Result<()> {
    let mut alt = call.alt_allele();
    if alt.is_empty() {
        alt.push(b'N');
    }
    let bp = &call.breakpoint;
    let line = format!(
        "{chrom}\t{pos}\tcaspeak_{id}_{name}\t{ref_base}\t{alt}\t.\tPASS\tEND={pos};SVTYPE=INS;SVLEN={len};SUPP_READS={support}\tGT\t./.\n",
        chrom = call.peak.chrom,
        pos = bp.position,
        name = bp.insertion_name,
        ref_base = alt[0] as char,
        alt = String::from_utf8_lossy(&alt),
        len = bp.insert_length(),
        support = call.support,
    );
    writer.write_all(line.as_bytes())?;
    Ok(())
}

/// Write a complete VCF, numbering calls from 1.
pub fn write_vcf<W: Write>(writer: &mut W, calls: &[BreakpointCall]) -> Result<()> {
    write_vcf_header(writer)?;
    for (idx, call) in calls.iter().enumerate() {
        write_vcf_record(writer, idx + 1, call)?;
    }
    writer.flush()?;
    Ok(())
}

/// Render calls into a VCF string (useful for tests and snapshots).
pub fn render_vcf(calls: &[BreakpointCall]) -> Result<String> {
    let mut buffer = Vec::new();
    write_vcf(&mut buffer, calls)?;
    String::from_utf8(buffer).map_err(|_| anyhow!("rendered VCF is not valid UTF-8"))
}
