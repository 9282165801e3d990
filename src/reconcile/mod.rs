#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Reconciles captured program output against expected test cases.

/// Keyed expected-case tables and variant dispatch.
pub mod catalog;
/// Fuzzy matching of expected cases against parsed buckets.
pub mod matcher;
/// Line grammar and bucket extraction.
pub mod parser;
/// Positional full/partial matching of printed records.
pub mod records;

use serde::{Deserialize, Serialize};

pub use catalog::{CaseCatalog, CatalogError, CatalogSpec, Variant, VariantProfile, VariantSpec};
pub use matcher::{
    DuplicatePolicy, ExpectedCase, MatchedCase, MissReason, MissedCase, Orientation,
    Reconciliation, reconcile,
};
pub use parser::{Bucket, LineGrammar, LinePatterns, OutputFilter, parse_buckets};
pub use records::{
    ExpectedRecord, RecordCheck, RecordProfile, RecordReconciliation, RecordResult, RecordStatus,
    match_records,
};

/// Everything derived from one run's stdout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciledOutput {
    /// Lines left after the exclusion filter.
    pub lines:          Vec<String>,
    /// Buckets parsed from those lines.
    pub buckets:        Vec<Bucket>,
    /// Matched and missing cases.
    pub reconciliation: Reconciliation,
    /// Record check result, when the variant has one.
    #[serde(default)]
    pub records:        Option<RecordReconciliation>,
}

impl ReconciledOutput {
    /// Share of the expected output that was printed. Each case is worth
    /// one, as is each full record; a partial record is worth half.
    pub fn score(&self) -> f64 {
        let (mut earned, mut total) = (
            self.reconciliation.matched.len() as f64,
            self.reconciliation.total(),
        );
        if let Some(records) = &self.records {
            earned += records.earned();
            total += records.total();
        }
        if total == 0 { 0.0 } else { earned / total as f64 }
    }

    /// `N/M expected cases found`, `F full, P partial of T expected records`,
    /// or both.
    pub fn summary(&self) -> String {
        let r = &self.reconciliation;
        let cases = (r.total() > 0)
            .then(|| format!("{}/{} expected cases found", r.matched.len(), r.total()));
        let records = self.records.as_ref().map(|rec| {
            format!(
                "{} full, {} partial of {} expected records",
                rec.count(RecordStatus::Full),
                rec.count(RecordStatus::Partial),
                rec.total()
            )
        });
        cases.into_iter().chain(records).collect::<Vec<_>>().join(", ")
    }
}

/// Filters, parses and matches stdout with one variant's profile.
#[derive(Debug, Clone, Copy)]
pub struct OutputReconciler<'a> {
    /// Profile selected by variant dispatch.
    profile: &'a VariantProfile,
}

impl<'a> OutputReconciler<'a> {
    /// Creates a reconciler for `profile`.
    pub fn new(profile: &'a VariantProfile) -> Self {
        Self { profile }
    }

    /// Runs the full pipeline on raw stdout.
    pub fn run(&self, stdout: &str) -> ReconciledOutput {
        let lines = self.profile.filter().apply(stdout);
        let buckets = self
            .profile
            .patterns()
            .map(|patterns| parse_buckets(&lines, patterns))
            .unwrap_or_default();
        let reconciliation = reconcile(self.profile.cases(), &buckets, self.profile.duplicates());
        let records = self.profile.records().map(|check| check.run(&lines));

        let output = ReconciledOutput {
            lines,
            buckets,
            reconciliation,
            records,
        };
        tracing::debug!("{}: {}", self.profile.key(), output.summary());
        output
    }
}
