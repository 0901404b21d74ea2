//! # Insertion breakpoint inference from targeted long reads
//!
//! Reads enriched for a mobile element (e.g. by Cas9 targeting) start inside
//! the element and run out into the flanking genome. This crate turns their
//! alignments into validated insertion calls:
//!
//! 1. **Anchoring**: one shrunken genome alignment per read ([`GenomeFilter`])
//! 2. **Trimming**: strand-aware cut of each read at the element boundary
//! 3. **Peaks**: coverage of anchors, windowed around local maxima
//! 4. **Validation**: flank pairing, local reassembly and a check that the
//!    contig brackets insertion sequence between two reference flanks
//!
//! ## Usage Example
//!
//! ```
//! use caspeak::genomics::{Alignment, Strand};
//!
//! let a = Alignment::new("chr1", 10_000, 100, 200, "read", 1_000, 0, 100, Strand::Forward).unwrap();
//! let b = Alignment::new("chr1", 10_000, 250, 400, "read", 1_000, 150, 300, Strand::Forward).unwrap();
//! let joined = a.join(&b, 200, 1_000).unwrap();
//! assert_eq!((joined.ref_start, joined.ref_end), (100, 400));
//! ```

#![warn(missing_docs, missing_debug_implementations)]

pub mod external; // LAST / lamassemble wrappers
pub mod genomics; // Alignment model, interval engine, peaks, validation
pub mod logging; // Subscriber setup for the binary
pub mod pipeline; // align / peak / valid stages

// Re-exports for convenience
pub use genomics::{
    Alignment, Breakpoint, BreakpointCall, GenomeFilter, Peak, Strand, TrimParams, TrimmedRead,
};
pub use logging::{LogContext, LogLevel};
pub use pipeline::{PipelineConfig, PipelineError};
