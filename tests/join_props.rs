use proptest::prelude::*;
use caspeak::genomics::{join_all, Alignment, Strand};

fn strand() -> impl Strategy<Value = Strand> {
    prop_oneof![Just(Strand::Forward), Just(Strand::Reverse)]
}

fn fragment(ref_name: &'static str, query_name: &'static str) -> impl Strategy<Value = Alignment> {
    (0u64..20_000, 1u64..2_000, 0u64..8_000, 1u64..2_000, strand()).prop_map(
        move |(ref_start, ref_span, query_start, query_span, strand)| {
            Alignment::new(
                ref_name,
                100_000,
                ref_start,
                ref_start + ref_span,
                query_name,
                10_000,
                query_start,
                query_start + query_span,
                strand,
            )
            .expect("generated alignment is valid")
        },
    )
}

fn read_fragments() -> impl Strategy<Value = Vec<Alignment>> {
    proptest::collection::vec(
        prop_oneof![fragment("chr1", "read"), fragment("chr2", "read")],
        0..24,
    )
}

proptest! {
    #[test]
    fn shrink_yields_exact_query_span(mut aln in fragment("chr1", "read"), length in 1u64..5_000) {
        let before = aln.clone();
        aln.shrink(length);
        prop_assert_eq!(aln.query_span(), length);
        prop_assert_eq!(aln.query_start, before.query_start);
        prop_assert!(aln.ref_start <= aln.ref_end);
        prop_assert!(aln.ref_end <= aln.ref_length);
        match aln.query_strand {
            Strand::Forward => prop_assert_eq!(aln.ref_start, before.ref_start),
            Strand::Reverse => prop_assert_eq!(aln.ref_end, before.ref_end),
        }
    }

    #[test]
    fn join_requires_matching_track(
        a in fragment("chr1", "read"),
        b in fragment("chr2", "read"),
        c in fragment("chr1", "other"),
    ) {
        prop_assert!(a.join(&b, u64::MAX / 4, u64::MAX / 4).is_none());
        prop_assert!(a.join(&c, u64::MAX / 4, u64::MAX / 4).is_none());
        let mut flipped = a.clone();
        flipped.query_strand = match a.query_strand {
            Strand::Forward => Strand::Reverse,
            Strand::Reverse => Strand::Forward,
        };
        prop_assert!(a.join(&flipped, u64::MAX / 4, u64::MAX / 4).is_none());
    }

    #[test]
    fn join_is_symmetric_and_covers_both_inputs(
        a in fragment("chr1", "read"),
        b in fragment("chr1", "read"),
    ) {
        let ab = a.join(&b, 200, 1_000);
        prop_assert_eq!(ab.clone(), b.join(&a, 200, 1_000));
        if let Some(joined) = ab {
            prop_assert!(joined.ref_start <= a.ref_start.min(b.ref_start));
            prop_assert!(joined.ref_end >= a.ref_end.max(b.ref_end));
            prop_assert!(joined.query_start <= joined.query_end);
            prop_assert!(joined.ref_start < joined.ref_end);
        }
    }

    #[test]
    fn join_all_is_sorted_and_idempotent(fragments in read_fragments()) {
        let once = join_all(fragments.clone(), 200, 1_000);
        prop_assert!(once.len() <= fragments.len());
        for pair in once.windows(2) {
            let key = |a: &Alignment| (a.query_strand, a.ref_name.clone(), a.ref_start);
            prop_assert!(key(&pair[0]) <= key(&pair[1]));
        }
        let twice = join_all(once.clone(), 200, 1_000);
        prop_assert_eq!(once, twice);
    }
}
