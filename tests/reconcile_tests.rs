use gradecheck::reconcile::{
    Bucket, DuplicatePolicy, ExpectedCase, LineGrammar, MissReason, Orientation, OutputFilter,
    parse_buckets, reconcile,
};
use proptest::prelude::*;

fn case(bucket: u64, tokens: &[i64]) -> ExpectedCase {
    ExpectedCase::new("testCase1:", "Index:", bucket, tokens.to_vec())
}

#[test]
fn parser_skips_noise_between_buckets() {
    let patterns = LineGrammar::bucket_blocks().compile().expect("preset compiles");
    let lines = [
        "noise",
        "Bucket 3:",
        "Node key: 10",
        "garbage",
        "Node key: 20",
        "Bucket 4:",
        "Node key: 99",
    ];

    assert_eq!(
        parse_buckets(&lines, &patterns),
        vec![Bucket::new(3, [10, 20]), Bucket::new(4, [99])]
    );
}

#[test]
fn parser_drops_empty_buckets_and_orphan_tokens() {
    let patterns = LineGrammar::bucket_blocks().compile().expect("preset compiles");
    let lines = [
        "Node key: 5",
        "Bucket 0:",
        "Bucket 1:",
        "Node key: -7",
        "Bucket 2:",
    ];

    assert_eq!(parse_buckets(&lines, &patterns), vec![Bucket::new(1, [-7])]);
}

#[test]
fn overflowing_marker_closes_the_open_bucket() {
    let patterns = LineGrammar::bucket_blocks().compile().expect("preset compiles");
    let lines = [
        "Bucket 3:",
        "Node key: 1",
        "Bucket 99999999999999999999:",
        "Node key: 2",
    ];

    assert_eq!(parse_buckets(&lines, &patterns), vec![Bucket::new(3, [1])]);

    let cases = [case(3, &[1])];
    let result = reconcile(&cases, &parse_buckets(&lines, &patterns), DuplicatePolicy::default());
    assert!(result.is_complete());
}

#[test]
fn parser_reads_indexed_rows() {
    let patterns = LineGrammar::indexed_rows().compile().expect("preset compiles");
    let lines = [
        "testCase3:",
        "Index: 4: 114 510",
        "Index: 5:",
        "  Index: 6: 611",
    ];

    assert_eq!(
        parse_buckets(&lines, &patterns),
        vec![Bucket::new(4, [114, 510]), Bucket::new(6, [611])]
    );
}

#[test]
fn grammar_without_index_group_is_rejected() {
    let grammar = LineGrammar {
        bucket_start: r"^Bucket (\d+):".to_string(),
        token:        None,
    };
    assert!(grammar.compile().is_err());

    let grammar = LineGrammar {
        bucket_start: r"^Bucket (?P<index>\d+):".to_string(),
        token:        Some(r"^key (\d+)".to_string()),
    };
    assert!(grammar.compile().is_err());
}

#[test]
fn filter_drops_excluded_and_blank_lines() {
    let filter = OutputFilter::new(&[r"^add key:\s*\d+$", r"^isEmpty:\s*\d+$"])
        .expect("patterns compile");
    let out = "add key: 4\n\nIndex: 4: 4\n   \nisEmpty: 0\nadd key: x\n";

    assert_eq!(filter.apply(out), vec!["Index: 4: 4", "add key: x"]);
}

#[test]
fn forward_and_reversed_buckets_match() {
    let cases = [case(6, &[50]), case(1, &[23, 67, 34])];
    let buckets = [Bucket::new(6, [50]), Bucket::new(1, [34, 67, 23])];

    let result = reconcile(&cases, &buckets, DuplicatePolicy::default());

    assert!(result.is_complete());
    let orientations: Vec<Orientation> = result.matched.iter().map(|m| m.orientation).collect();
    assert_eq!(orientations, vec![Orientation::Forward, Orientation::Reversed]);
}

#[test]
fn permutation_that_is_not_a_mirror_does_not_match() {
    let cases = [case(2, &[1, 2, 3])];
    let buckets = [Bucket::new(2, [2, 1, 3])];

    let result = reconcile(&cases, &buckets, DuplicatePolicy::default());

    assert!(result.matched.is_empty());
    assert_eq!(
        result.not_matched[0].reason,
        MissReason::Mismatch {
            actual: vec![2, 1, 3],
        }
    );
}

#[test]
fn missing_bucket_is_not_found() {
    let cases = [case(9, &[42, 53, 86, 9])];
    let buckets = [Bucket::new(1, [42, 53, 86, 9])];

    let result = reconcile(&cases, &buckets, DuplicatePolicy::default());

    assert_eq!(result.not_matched.len(), 1);
    assert_eq!(result.not_matched[0].reason, MissReason::NotFound);
}

#[test]
fn empty_output_matches_nothing() {
    let patterns = LineGrammar::bucket_blocks().compile().expect("preset compiles");
    let buckets = parse_buckets::<&str>(&[], &patterns);
    assert!(buckets.is_empty());

    let cases = [case(0, &[1]), case(1, &[2]), case(2, &[3])];
    let result = reconcile(&cases, &buckets, DuplicatePolicy::default());

    assert!(result.matched.is_empty());
    assert_eq!(result.not_matched.len(), 3);
    assert_eq!(result.ratio(), 0.0);
}

#[test]
fn every_case_lands_in_exactly_one_list_in_catalog_order() {
    let cases = [
        case(0, &[110]),
        case(1, &[111]),
        case(3, &[113]),
        case(4, &[510, 114]),
        case(5, &[115]),
        case(9, &[108]),
    ];
    let buckets = [
        Bucket::new(0, [110]),
        Bucket::new(3, [999]),
        Bucket::new(4, [114, 510]),
        Bucket::new(9, [108]),
    ];

    let result = reconcile(&cases, &buckets, DuplicatePolicy::default());

    assert_eq!(result.total(), cases.len());
    let matched: Vec<u64> = result.matched.iter().map(|m| m.case.bucket).collect();
    let missed: Vec<u64> = result.not_matched.iter().map(|m| m.case.bucket).collect();
    assert_eq!(matched, vec![0, 4, 9]);
    assert_eq!(missed, vec![1, 3, 5]);
}

#[test]
fn reconcile_is_idempotent() {
    let cases = [case(1, &[23, 67, 34]), case(3, &[80]), case(7, &[1, 2])];
    let buckets = [Bucket::new(1, [34, 67, 23]), Bucket::new(7, [1, 3])];

    let first = reconcile(&cases, &buckets, DuplicatePolicy::AnyBucket);
    let second = reconcile(&cases, &buckets, DuplicatePolicy::AnyBucket);

    assert_eq!(first, second);
}

#[test]
fn duplicate_indices_follow_the_policy() {
    let cases = [case(4, &[103, 202])];
    let buckets = [Bucket::new(4, [103]), Bucket::new(4, [103, 202])];

    assert!(reconcile(&cases, &buckets, DuplicatePolicy::AnyBucket).is_complete());
    assert!(!reconcile(&cases, &buckets, DuplicatePolicy::FirstWins).is_complete());
    assert!(!reconcile(&cases, &buckets, DuplicatePolicy::Merge).is_complete());

    let split = [Bucket::new(4, [103]), Bucket::new(4, [202])];
    assert!(reconcile(&cases, &split, DuplicatePolicy::Merge).is_complete());
    assert!(!reconcile(&cases, &split, DuplicatePolicy::AnyBucket).is_complete());
}

#[test]
fn cases_sharing_an_index_are_judged_independently() {
    let cases = [case(3, &[80]), case(3, &[102])];
    let buckets = [Bucket::new(3, [80])];

    let result = reconcile(&cases, &buckets, DuplicatePolicy::AnyBucket);

    assert_eq!(result.matched.len(), 1);
    assert_eq!(result.matched[0].case.tokens, vec![80]);
    assert_eq!(result.not_matched[0].case.tokens, vec![102]);
}

fn policy() -> impl Strategy<Value = DuplicatePolicy> {
    prop_oneof![
        Just(DuplicatePolicy::AnyBucket),
        Just(DuplicatePolicy::FirstWins),
        Just(DuplicatePolicy::Merge),
    ]
}

fn cases() -> impl Strategy<Value = Vec<ExpectedCase>> {
    prop::collection::vec(
        (0u64..8, prop::collection::vec(-5i64..5, 1..4)),
        0..12,
    )
    .prop_map(|raw| raw.into_iter().map(|(b, t)| case(b, &t)).collect())
}

fn buckets() -> impl Strategy<Value = Vec<Bucket>> {
    prop::collection::vec(
        (0u64..8, prop::collection::vec(-5i64..5, 1..4)),
        0..12,
    )
    .prop_map(|raw| raw.into_iter().map(|(b, t)| Bucket::new(b, t)).collect())
}

proptest! {
    #[test]
    fn any_catalog_is_partitioned_in_order(
        cases in cases(),
        buckets in buckets(),
        policy in policy(),
    ) {
        let result = reconcile(&cases, &buckets, policy);
        prop_assert_eq!(result.total(), cases.len());

        let mut matched = result.matched.iter().map(|m| &m.case).peekable();
        let mut missed = result.not_matched.iter().map(|m| &m.case).peekable();
        for case in &cases {
            if matched.peek() == Some(&case) {
                matched.next();
            } else {
                prop_assert_eq!(missed.next(), Some(case));
            }
        }
        prop_assert!(matched.next().is_none());
        prop_assert!(missed.next().is_none());
    }

    #[test]
    fn reconciling_twice_gives_the_same_answer(
        cases in cases(),
        buckets in buckets(),
        policy in policy(),
    ) {
        prop_assert_eq!(
            reconcile(&cases, &buckets, policy),
            reconcile(&cases, &buckets, policy)
        );
    }

    #[test]
    fn a_mirrored_bucket_always_matches(
        index in 0u64..100,
        tokens in prop::collection::vec(any::<i64>(), 1..8),
    ) {
        let mirrored: Vec<i64> = tokens.iter().rev().copied().collect();
        let result = reconcile(
            &[case(index, &tokens)],
            &[Bucket::new(index, mirrored)],
            DuplicatePolicy::default(),
        );
        prop_assert!(result.is_complete());
    }
}
