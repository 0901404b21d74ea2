#[path = "common/mod.rs"]
mod common;

use std::collections::{HashMap, HashSet};
use std::fs;

use caspeak::genomics::{
    sort_intervals, Alignment, ContigLengths, Interval, Peak, Strand, TrimParams, TrimmedRead,
};
use caspeak::pipeline::{
    analyze_peaks, dedup_results, load_validate_inputs, validate_peaks, write_peak_outputs,
    write_results, Layout, PeakAnalysis, PipelineConfig, ValidateInputs, ValidationParams,
};
use common::{contig_hit, insertion_hit, sequence, FakeAligner, FakeAssembler};
use tempfile::tempdir;

const READ_LENGTH: u64 = 2_000;

fn genome_fragments(name: &str) -> Vec<Alignment> {
    vec![
        Alignment::new("chr1", 10_000, 1_000, 2_000, name, READ_LENGTH, 300, 1_300, Strand::Forward)
            .expect("anchor fragment"),
        Alignment::new("chr2", 10_000, 5_000, 5_300, name, READ_LENGTH, 1_500, 1_800, Strand::Forward)
            .expect("second fragment"),
    ]
}

fn consensus_hit(name: &str, upstream: bool) -> Alignment {
    if upstream {
        Alignment::new("L1", 400, 20, 130, name, READ_LENGTH, 5, 115, Strand::Reverse)
    } else {
        Alignment::new("L1", 400, 150, 300, name, READ_LENGTH, 10, 160, Strand::Forward)
    }
    .expect("consensus hit")
}

/// Twelve reads anchored at chr1:1000, half upstream, plus one read
/// without a consensus hit.
fn synthetic_analysis() -> PeakAnalysis {
    let names: Vec<String> = (1..=12).map(|i| format!("r{i:02}")).collect();
    let mut genome = Vec::new();
    let mut insert = Vec::new();
    let mut reads = Vec::new();
    for (i, name) in names.iter().enumerate() {
        genome.extend(genome_fragments(name));
        insert.push(consensus_hit(name, i % 2 == 0));
        reads.push((name.clone(), sequence(READ_LENGTH as usize, i)));
    }
    genome.extend(genome_fragments("orphan"));
    reads.push(("orphan".to_string(), sequence(READ_LENGTH as usize, 99)));

    let contigs: ContigLengths = [("chr1", 10_000u64), ("chr2", 10_000u64)].into_iter().collect();
    analyze_peaks(
        genome,
        insert,
        reads,
        &sequence(400, 3),
        &contigs,
        &TrimParams::for_target(100, 181),
        &PipelineConfig::default(),
    )
    .expect("peak analysis succeeds")
}

#[test]
fn analysis_finds_single_peak_over_anchors() {
    let analysis = synthetic_analysis();
    assert_eq!(analysis.peaks, vec![Peak::new("chr1", 900, 1_300, 12)]);
    assert_eq!(analysis.anchors.len(), 12);
    assert_eq!(analysis.trimmed.len(), 12);
    assert!(!analysis.trimmed.contains_key("orphan"));
    for anchor in &analysis.anchors {
        assert_eq!((anchor.ref_start, anchor.ref_end), (1_000, 1_200));
        assert_eq!((anchor.query_start, anchor.query_end), (300, 500));
    }
    let upstream = analysis.trimmed.values().filter(|t| t.is_upstream()).count();
    assert_eq!(upstream, 6);
}

#[test]
fn peak_outputs_reload_for_validation() {
    let dir = tempdir().expect("tempdir");
    let config = PipelineConfig {
        workdir: dir.path().to_path_buf(),
        ..PipelineConfig::default()
    };
    let analysis = synthetic_analysis();
    write_peak_outputs(&config, &analysis).expect("write peak outputs");

    let layout = config.layout();
    let peaks_text = fs::read_to_string(layout.peaks_bed()).expect("peaks bed");
    assert_eq!(peaks_text, "chr1\t900\t1300\tchr1:900-1300\t12\n");

    let inputs = ValidateInputs {
        trimmed_reads: layout.trimmed_fasta(),
        peaks_bed: layout.peaks_bed(),
        anchors_bed: layout.sorted_bed(),
        library: None,
    };
    let (peaks, anchors, trimmed) = load_validate_inputs(&inputs).expect("reload");
    assert_eq!(peaks, analysis.peaks);
    assert_eq!(anchors, analysis.anchor_intervals());
    assert_eq!(trimmed, analysis.trimmed);
}

fn flank(strand: Strand, seed: usize) -> TrimmedRead {
    TrimmedRead {
        sequence: sequence(300 + seed, seed),
        strand,
    }
}

struct Fixture {
    peaks: Vec<Peak>,
    anchors: Vec<Interval>,
    trimmed: HashMap<String, TrimmedRead>,
}

/// Peak 1 has two reads on each side; peak 2 only has an upstream read.
fn fixture() -> Fixture {
    let mut anchors = vec![
        Interval::new("chr1", 520, 720, "u1"),
        Interval::new("chr1", 530, 730, "u2"),
        Interval::new("chr1", 540, 740, "d1"),
        Interval::new("chr1", 510, 710, "d2"),
        Interval::new("chr1", 3_100, 3_300, "u9"),
    ];
    sort_intervals(&mut anchors);
    let trimmed = [
        ("u1", flank(Strand::Reverse, 1)),
        ("u2", flank(Strand::Reverse, 2)),
        ("d1", flank(Strand::Forward, 3)),
        ("d2", flank(Strand::Forward, 4)),
        ("u9", flank(Strand::Reverse, 5)),
    ]
    .into_iter()
    .map(|(name, read)| (name.to_string(), read))
    .collect();
    Fixture {
        peaks: vec![Peak::new("chr1", 500, 600, 12), Peak::new("chr1", 3_000, 3_400, 8)],
        anchors,
        trimmed,
    }
}

fn bracketing_aligner() -> FakeAligner {
    FakeAligner {
        reference: vec![
            contig_hit(350, 550, 0, 200, Strand::Forward),
            contig_hit(560, 800, 260, 500, Strand::Forward),
        ],
        insertions: vec![insertion_hit("AluY", 200, 260)],
        fail: false,
    }
}

#[test]
fn validates_assembled_peak() {
    let fx = fixture();
    let assembler = FakeAssembler::new(sequence(2_000, 0));
    let results = validate_peaks(
        &fx.peaks,
        &fx.anchors,
        &fx.trimmed,
        &assembler,
        &bracketing_aligner(),
        &ValidationParams::default(),
        2,
    )
    .expect("validation runs");

    assert_eq!(results.len(), 1);
    let call = &results[0].call;
    assert_eq!(call.peak, fx.peaks[0]);
    assert_eq!(call.support, 4);
    assert_eq!(call.breakpoint.position, 550);
    assert_eq!((call.breakpoint.insert_start, call.breakpoint.insert_end), (200, 260));
    assert_eq!(call.breakpoint.insertion_name, "AluY");
    assert_eq!(call.alt_allele(), sequence(2_000, 0)[199..260].to_vec());

    let calls = assembler.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "peak1-4");
    assert!(calls[0].1.starts_with(">u2+d2\n"), "longest reads pair first: {}", calls[0].1);
}

#[test]
fn insufficient_insertion_coverage_is_no_call() {
    let fx = fixture();
    let aligner = FakeAligner {
        insertions: vec![insertion_hit("AluY", 200, 230)],
        ..bracketing_aligner()
    };
    let results = validate_peaks(
        &fx.peaks,
        &fx.anchors,
        &fx.trimmed,
        &FakeAssembler::new(sequence(2_000, 0)),
        &aligner,
        &ValidationParams::default(),
        1,
    )
    .unwrap();
    assert!(results.is_empty());
}

#[test]
fn library_name_filter_and_tool_failures_yield_no_calls() {
    let fx = fixture();
    let assembler = FakeAssembler::new(sequence(2_000, 0));
    let params = ValidationParams {
        library_names: Some(HashSet::from(["L1HS".to_string()])),
        ..ValidationParams::default()
    };
    let filtered = validate_peaks(&fx.peaks, &fx.anchors, &fx.trimmed, &assembler, &bracketing_aligner(), &params, 1)
        .unwrap();
    assert!(filtered.is_empty());

    let failing = FakeAligner {
        fail: true,
        ..bracketing_aligner()
    };
    let failed = validate_peaks(
        &fx.peaks,
        &fx.anchors,
        &fx.trimmed,
        &assembler,
        &failing,
        &ValidationParams::default(),
        1,
    )
    .unwrap();
    assert!(failed.is_empty());
}

#[test]
fn single_pair_skips_the_assembler() {
    let mut fx = fixture();
    fx.trimmed.remove("u2");
    fx.trimmed.remove("d2");
    let assembler = FakeAssembler::new(Vec::new());
    let aligner = FakeAligner {
        reference: vec![
            contig_hit(350, 550, 0, 200, Strand::Forward),
            contig_hit(560, 800, 300, 500, Strand::Forward),
        ],
        insertions: vec![insertion_hit("AluY", 200, 300)],
        fail: false,
    };
    let results = validate_peaks(
        &fx.peaks,
        &fx.anchors,
        &fx.trimmed,
        &assembler,
        &aligner,
        &ValidationParams::default(),
        1,
    )
    .unwrap();

    assert!(assembler.calls.lock().unwrap().is_empty());
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].call.support, 2);
    let mut expected = fx.trimmed["u1"].sequence.clone();
    expected.extend_from_slice(&fx.trimmed["d1"].sequence);
    assert_eq!(results[0].call.contig, expected);
}

#[test]
fn results_are_written_and_deduplicated() {
    let fx = fixture();
    let mut peaks = fx.peaks.clone();
    peaks[1] = Peak::new("chr1", 520, 620, 9);
    let mut anchors = fx.anchors.clone();
    anchors.push(Interval::new("chr1", 530, 700, "d9"));
    sort_intervals(&mut anchors);
    let mut trimmed = fx.trimmed.clone();
    trimmed.insert("d9".to_string(), flank(Strand::Forward, 9));

    let results = validate_peaks(
        &peaks,
        &anchors,
        &trimmed,
        &FakeAssembler::new(sequence(2_000, 0)),
        &bracketing_aligner(),
        &ValidationParams::default(),
        2,
    )
    .unwrap();
    assert_eq!(results.len(), 2);
    let results = dedup_results(results, 100);
    assert_eq!(results.len(), 1);

    let dir = tempdir().unwrap();
    let layout = Layout::new(dir.path());
    write_results(&layout, &results, true).expect("write results");

    let result_dir = layout.result_dir();
    let bed = fs::read_to_string(result_dir.join("validate.bed")).unwrap();
    assert_eq!(bed, "chr1\t500\t600\tpeak1\t12\n");

    let maf = fs::read_to_string(result_dir.join("validate.maf")).unwrap();
    assert!(maf.starts_with("# caspeak validated\n\n"));
    assert!(!maf.contains("# test"));
    assert_eq!(maf.matches("s chr1 ").count(), 2);

    let fasta = fs::read_to_string(result_dir.join("validate.fasta")).unwrap();
    assert!(fasta.starts_with(">peak1-4\n"));
    assert_eq!(fasta.lines().count(), 2);

    let vcf = fs::read_to_string(result_dir.join("validate.vcf")).unwrap();
    let records: Vec<&str> = vcf.lines().filter(|l| !l.starts_with('#')).collect();
    assert_eq!(records.len(), 1);
    assert!(records[0].starts_with("chr1\t550\tcaspeak_1_AluY\t"));
    assert!(records[0].contains("SVLEN=60;SUPP_READS=4"));
}
