#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::fmt::Display;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::catalog::CatalogError;

/// Fields of the key pair every record starts with, e.g. `key` and `50`.
const KEY_FIELDS: usize = 2;

/// One record the program must print, as an ordered list of fields such as
/// `["key", "50", "Name", "John Doe5", "Address", "1234 State St"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpectedRecord {
    /// Fields that must all appear on the printed line.
    pub fields: Vec<String>,
}

impl ExpectedRecord {
    /// Creates a record from its fields.
    pub fn new<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// The leading key pair.
    pub fn key(&self) -> &[String] {
        &self.fields[..KEY_FIELDS.min(self.fields.len())]
    }
}

impl Display for ExpectedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.fields.join(" "))
    }
}

/// Serialized record check of a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCheck {
    /// Regex selecting the lines that print records, e.g. `key` or
    /// `(?i)^Fifo info`.
    pub line:     String,
    /// Records in the order the program prints them.
    pub expected: Vec<ExpectedRecord>,
}

impl RecordCheck {
    /// Compiles the line pattern and checks every record has a key pair.
    pub fn compile(&self) -> Result<RecordProfile, CatalogError> {
        let line = Regex::new(&self.line).map_err(|e| {
            CatalogError::Malformed(format!("invalid record line pattern `{}`: {e}", self.line))
        })?;
        if self.expected.is_empty() {
            return Err(CatalogError::Malformed(
                "record check lists no expected records".to_string(),
            ));
        }
        if let Some(short) = self.expected.iter().find(|r| r.fields.len() < KEY_FIELDS) {
            return Err(CatalogError::Malformed(format!(
                "record `{short}` has no key pair"
            )));
        }

        Ok(RecordProfile {
            line,
            expected: self.expected.clone(),
        })
    }
}

/// A compiled [`RecordCheck`].
#[derive(Debug, Clone)]
pub struct RecordProfile {
    /// Selects record lines.
    line:     Regex,
    /// Records in print order.
    expected: Vec<ExpectedRecord>,
}

impl RecordProfile {
    /// Expected records.
    pub fn expected(&self) -> &[ExpectedRecord] {
        &self.expected
    }

    /// Keeps the lines that print records, in order.
    pub fn select<S: AsRef<str>>(&self, lines: &[S]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.as_ref())
            .filter(|l: &&str| self.line.is_match(l))
            .map(str::to_string)
            .collect()
    }

    /// Selects record lines and matches them against the expected records.
    pub fn run<S: AsRef<str>>(&self, lines: &[S]) -> RecordReconciliation {
        match_records(&self.expected, &self.select(lines))
    }
}

/// How much of a record was printed at its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Every field is on the line.
    Full,
    /// Only the key pair is on the line.
    Partial,
    /// The line is absent or lacks the key pair.
    Missing,
}

/// Outcome for one expected record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordResult {
    /// The catalog entry.
    pub expected: ExpectedRecord,
    /// Record line printed at the same position, if any.
    pub actual:   Option<String>,
    /// How well it matched.
    pub status:   RecordStatus,
}

/// Every expected record with its status, plus the printed record lines
/// that matched nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordReconciliation {
    /// One result per expected record, in catalog order.
    pub results:   Vec<RecordResult>,
    /// Record lines that did not match the record at their position.
    pub unmatched: Vec<String>,
}

impl RecordReconciliation {
    /// Number of records with the given status.
    pub fn count(&self, status: RecordStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    /// Number of expected records.
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Full records count 1, partial ones half.
    pub fn earned(&self) -> f64 {
        self.count(RecordStatus::Full) as f64 + self.count(RecordStatus::Partial) as f64 / 2.0
    }

    /// Earned share of the expected records, `0.0` when none are expected.
    pub fn score(&self) -> f64 {
        if self.results.is_empty() {
            0.0
        } else {
            self.earned() / self.total() as f64
        }
    }
}

/// True if every field appears somewhere on `line`.
fn contains_all(line: &str, fields: &[String]) -> bool {
    fields.iter().all(|f| line.contains(f.as_str()))
}

/// Compares record lines against expected records position by position.
/// A field matches when it appears anywhere on the line.
pub fn match_records<S: AsRef<str>>(
    expected: &[ExpectedRecord],
    lines: &[S],
) -> RecordReconciliation {
    let results: Vec<RecordResult> = expected
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let actual: Option<&str> = lines.get(i).map(|l| l.as_ref());
            let status = match actual {
                Some(line) if contains_all(line, &record.fields) => RecordStatus::Full,
                Some(line) if contains_all(line, record.key()) => RecordStatus::Partial,
                _ => RecordStatus::Missing,
            };
            RecordResult {
                expected: record.clone(),
                actual: actual.map(str::to_string),
                status,
            }
        })
        .collect();

    let unmatched = lines
        .iter()
        .enumerate()
        .filter(|(i, _)| {
            results
                .get(*i)
                .is_none_or(|r| r.status == RecordStatus::Missing)
        })
        .map(|(_, line)| line.as_ref().to_string())
        .collect();

    RecordReconciliation { results, unmatched }
}
