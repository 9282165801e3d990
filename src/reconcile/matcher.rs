#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{collections::HashMap, fmt::Display};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::parser::Bucket;

/// One expected bucket of a test case, as listed in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedCase {
    /// Test case the bucket belongs to, e.g. `testCase2:`.
    pub test:   String,
    /// Label printed before the index, e.g. `Index:`.
    pub label:  String,
    /// Bucket index the tokens must appear under.
    pub bucket: u64,
    /// Expected tokens, in forward order.
    pub tokens: Vec<i64>,
}

impl ExpectedCase {
    /// Creates an expected case.
    pub fn new(
        test: impl Into<String>,
        label: impl Into<String>,
        bucket: u64,
        tokens: impl Into<Vec<i64>>,
    ) -> Self {
        Self {
            test: test.into(),
            label: label.into(),
            bucket,
            tokens: tokens.into(),
        }
    }
}

impl Display for ExpectedCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} [{}]",
            self.test,
            self.label,
            self.bucket,
            self.tokens.iter().join(", ")
        )
    }
}

/// What to do when the output prints the same bucket index more than once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// A case matches if any bucket with its index matches.
    #[default]
    AnyBucket,
    /// Only the first bucket printed with the index counts.
    FirstWins,
    /// Tokens of every bucket with the index are concatenated in output
    /// order and compared as one bucket.
    Merge,
}

/// Order in which a matched bucket printed the expected tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Same order as expected.
    Forward,
    /// Exactly reversed.
    Reversed,
}

/// Why an expected case was not matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissReason {
    /// No bucket with the expected index was printed.
    NotFound,
    /// The bucket was printed with other tokens, or a permutation that is
    /// neither forward nor reversed.
    Mismatch {
        /// Tokens of the first candidate bucket.
        actual: Vec<i64>,
    },
}

/// An expected case found in the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedCase {
    /// The catalog entry.
    pub case:        ExpectedCase,
    /// Order the tokens were printed in.
    pub orientation: Orientation,
}

/// An expected case missing from the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissedCase {
    /// The catalog entry.
    pub case:   ExpectedCase,
    /// Why it did not match.
    pub reason: MissReason,
}

/// Partition of a case list into matched and missing cases, each in
/// catalog order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// Cases found in the output.
    pub matched:     Vec<MatchedCase>,
    /// Cases not found in the output.
    pub not_matched: Vec<MissedCase>,
}

impl Reconciliation {
    /// Number of cases that were evaluated.
    pub fn total(&self) -> usize {
        self.matched.len() + self.not_matched.len()
    }

    /// Fraction of cases matched, `0.0` for an empty case list.
    pub fn ratio(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.matched.len() as f64 / self.total() as f64
        }
    }

    /// True when nothing is missing.
    pub fn is_complete(&self) -> bool {
        self.not_matched.is_empty()
    }
}

/// Compares expected tokens against one printed bucket.
fn orientation(expected: &[i64], actual: &[i64]) -> Option<Orientation> {
    if expected == actual {
        Some(Orientation::Forward)
    } else if expected.len() == actual.len() && expected.iter().eq(actual.iter().rev()) {
        Some(Orientation::Reversed)
    } else {
        None
    }
}

/// Classifies every case against the parsed buckets.
///
/// Each case is looked up by bucket index alone; buckets are never consumed,
/// so two cases with the same index can both match the same bucket.
pub fn reconcile(
    cases: &[ExpectedCase],
    buckets: &[Bucket],
    policy: DuplicatePolicy,
) -> Reconciliation {
    let by_index: HashMap<u64, Vec<&[i64]>> = buckets
        .iter()
        .map(|b| (b.index, b.tokens.as_slice()))
        .into_group_map();

    let merged: HashMap<u64, Vec<i64>> = match policy {
        DuplicatePolicy::Merge => by_index
            .iter()
            .map(|(index, groups)| (*index, groups.concat()))
            .collect(),
        DuplicatePolicy::AnyBucket | DuplicatePolicy::FirstWins => HashMap::new(),
    };

    cases
        .iter()
        .fold(Reconciliation::default(), |mut acc, case| {
            let candidates: Vec<&[i64]> = match policy {
                DuplicatePolicy::AnyBucket => by_index.get(&case.bucket).cloned().unwrap_or_default(),
                DuplicatePolicy::FirstWins => by_index
                    .get(&case.bucket)
                    .and_then(|groups| groups.first().copied())
                    .into_iter()
                    .collect(),
                DuplicatePolicy::Merge => merged
                    .get(&case.bucket)
                    .map(Vec::as_slice)
                    .into_iter()
                    .collect(),
            };

            let Some(first) = candidates.first() else {
                acc.not_matched.push(MissedCase {
                    case:   case.clone(),
                    reason: MissReason::NotFound,
                });
                return acc;
            };

            match candidates
                .iter()
                .find_map(|actual| orientation(&case.tokens, actual))
            {
                Some(orientation) => acc.matched.push(MatchedCase {
                    case: case.clone(),
                    orientation,
                }),
                None => acc.not_matched.push(MissedCase {
                    case:   case.clone(),
                    reason: MissReason::Mismatch {
                        actual: first.to_vec(),
                    },
                }),
            }
            acc
        })
}
