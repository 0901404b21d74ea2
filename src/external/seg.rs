use std::ffi::OsString;
use std::fs::{self, File};
use std::path::Path;

use tracing::info;

use crate::external::{run_tool, Sink, ToolError};

/// Tools needed to soft-mask the reference from a RepeatMasker annotation.
pub const MASK_TOOLS: &[&str] = &["seg-import", "seg-mask"];

fn import_args(rmsk: &Path) -> Vec<OsString> {
    vec!["rmsk".into(), rmsk.as_os_str().to_owned()]
}

fn mask_args(segments: &Path, reference: &Path) -> Vec<OsString> {
    vec!["-c".into(), segments.as_os_str().to_owned(), reference.as_os_str().to_owned()]
}

/// Soft-mask `reference` with the repeats of a RepeatMasker `.out` file.
///
/// Segments are staged next to `masked_out` and removed afterwards; the
/// lower-cased FASTA is written to `masked_out`.
pub fn mask_reference(rmsk: &Path, reference: &Path, masked_out: &Path) -> Result<(), ToolError> {
    let segments = masked_out.with_extension("seg");
    info!(rmsk = %rmsk.display(), "masking reference repeats");

    let result = stage_and_mask(rmsk, reference, &segments, masked_out);
    let _ = fs::remove_file(&segments);
    result
}

fn stage_and_mask(rmsk: &Path, reference: &Path, segments: &Path, masked_out: &Path) -> Result<(), ToolError> {
    let file = File::create(segments).map_err(|e| ToolError::io("seg-import", e))?;
    run_tool("seg-import", &import_args(rmsk), None, Sink::File(file))?;

    let file = File::create(masked_out).map_err(|e| ToolError::io("seg-mask", e))?;
    run_tool("seg-mask", &mask_args(segments, reference), None, Sink::File(file))?;
    Ok(())
}
