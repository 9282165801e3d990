#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{fmt::Display, path::PathBuf};

use anyhow::{Context, Result};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tabled::{Table, settings::Style};
use typed_builder::TypedBuilder;

use crate::{
    build::BuildOutcome,
    grade::{Grade, GradeResult, HeaderSummary, MethodReport},
    reconcile::{MissReason, Orientation, ReconciledOutput, RecordStatus},
};

/// What the extra credit script reported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtraCredit {
    /// Points awarded.
    pub points: Grade,
    /// Script stdout.
    pub output: String,
}

#[derive(Debug, Clone, TypedBuilder, Serialize, Deserialize)]
#[builder(field_defaults(default, setter(into)))]
/// Everything gathered while grading one submission.
pub struct SubmissionReport {
    /// GitHub username, or `XXX<n>` when the repository name has none.
    pub username:      String,
    /// Repository directory name.
    pub repo:          String,
    /// Last commit as `<hash> <author> <date> <subject>`.
    pub timestamp:     String,
    /// Build and run result, `None` when building is disabled.
    pub outcome:       Option<BuildOutcome>,
    /// Reconciled program output, `None` when the program never ran.
    pub output:        Option<ReconciledOutput>,
    /// File header findings.
    pub headers:       HeaderSummary,
    /// Class and method findings.
    pub methods:       MethodReport,
    /// Some file mentions a list type.
    pub uses_list:     bool,
    /// Some header contains a prime literal.
    pub prime_literal: bool,
    /// Extra credit result, `None` when disabled.
    pub extra_credit:  Option<ExtraCredit>,
    /// One row per graded requirement.
    pub grades:        Vec<GradeResult>,
    /// Final grade.
    pub total:         Grade,
}

impl SubmissionReport {
    /// Case and record counts, if the output was checked.
    pub fn found_line(&self) -> Option<String> {
        self.output.as_ref().map(ReconciledOutput::summary)
    }
}

/// Writes an underlined section title followed by a blank line.
fn section(f: &mut std::fmt::Formatter<'_>, title: &str) -> std::fmt::Result {
    writeln!(f, "{title}")?;
    writeln!(f, "{}", "=".repeat(title.chars().count()))?;
    writeln!(f)
}

/// Renders a yes/no flag.
fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

/// Renders a found/missing flag.
fn found(flag: bool) -> &'static str {
    if flag { "FOUND" } else { "MISSING" }
}

impl Display for SubmissionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        section(f, "GitHub Username")?;
        writeln!(f, "{}\n", self.username)?;

        section(f, "Timestamp")?;
        writeln!(f, "{}\n", self.timestamp.trim())?;

        section(f, "File Headers")?;
        if self.headers.findings.is_empty() {
            writeln!(f, "No .hpp or .cpp files found.")?;
        }
        for finding in &self.headers.findings {
            match finding.problem {
                None => writeln!(f, "{}: OK", finding.file)?,
                Some(problem) => writeln!(f, "{}: MISSING ({problem})", finding.file)?,
            }
            if let Some(header) = &finding.header {
                writeln!(f, "{header}")?;
            }
            writeln!(f)?;
        }

        section(f, "Methods")?;
        let m = &self.methods;
        writeln!(f, "{} class {}", found(m.class_declared), m.class)?;
        for method in &m.methods {
            writeln!(
                f,
                "{}: declared in .hpp: {}, defined in .cpp: {}",
                method.signature,
                yes_no(method.declared),
                yes_no(method.defined)
            )?;
        }
        writeln!(f, "Uses a list type: {}", yes_no(self.uses_list))?;
        writeln!(f, "Prime literal in .hpp: {}\n", yes_no(self.prime_literal))?;

        section(f, "Method Headers")?;
        writeln!(f, "{} method header for class {}.", found(m.class_commented), m.class)?;
        for method in &m.methods {
            writeln!(f, "{} method header for {}.", found(method.commented), method.signature)?;
        }
        writeln!(f)?;

        section(f, "Extra Credit")?;
        match &self.extra_credit {
            Some(ec) => {
                writeln!(f, "Points: {}", ec.points)?;
                writeln!(f, "Output: {}\n", ec.output.trim())?;
            }
            None => writeln!(f, "Not checked.\n")?,
        }

        section(f, "Output Check")?;
        match &self.output {
            Some(output) => {
                let r = &output.reconciliation;
                writeln!(f, "{}\n", output.summary())?;
                writeln!(f, "Output:")?;
                for miss in &r.not_matched {
                    match &miss.reason {
                        MissReason::NotFound => {
                            writeln!(f, "MISSING: {} (index not printed)", miss.case)?
                        }
                        MissReason::Mismatch { actual } => writeln!(
                            f,
                            "MISSING: {} (printed [{}])",
                            miss.case,
                            actual.iter().join(", ")
                        )?,
                    }
                }
                if let Some(records) = &output.records {
                    for result in &records.results {
                        match (&result.status, &result.actual) {
                            (RecordStatus::Missing, Some(actual)) => writeln!(
                                f,
                                "MISSING: {} (printed \"{actual}\")",
                                result.expected
                            )?,
                            (RecordStatus::Missing, None) => {
                                writeln!(f, "MISSING: {} (not printed)", result.expected)?
                            }
                            _ => {}
                        }
                    }
                    for line in &records.unmatched {
                        writeln!(f, "UNEXPECTED: {line}")?;
                    }
                }
                writeln!(f, "\nManifest:")?;
                for hit in &r.matched {
                    match hit.orientation {
                        Orientation::Forward => writeln!(f, "FOUND: {}", hit.case)?,
                        Orientation::Reversed => writeln!(f, "FOUND: {} (reversed)", hit.case)?,
                    }
                }
                for result in output.records.iter().flat_map(|r| &r.results) {
                    match (&result.status, &result.actual) {
                        (RecordStatus::Full, _) => writeln!(f, "FULL: {}", result.expected)?,
                        (RecordStatus::Partial, Some(actual)) => writeln!(
                            f,
                            "PARTIAL: {} (printed \"{actual}\")",
                            result.expected
                        )?,
                        _ => {}
                    }
                }
                writeln!(f)?;
            }
            None => writeln!(f, "Not checked: the program did not run.\n")?,
        }

        section(f, "Build Output")?;
        if let Some(output) = &self.output {
            for line in &output.lines {
                writeln!(f, "{line}")?;
            }
        }
        writeln!(f)?;

        section(f, "Raw Build Output")?;
        match &self.outcome {
            Some(build) if build.run.is_some() => writeln!(f, "{}", build.stdout())?,
            Some(build) => {
                writeln!(f, "{}", build.status())?;
                writeln!(f, "{}", build.build.stdout)?;
                writeln!(f, "{}", build.build.stderr)?;
            }
            None => writeln!(f, "Building is disabled.")?,
        }
        writeln!(f)?;

        section(f, "Grade")?;
        writeln!(f, "{}", Table::new(&self.grades).with(Style::modern()))?;
        writeln!(f, "Total: {}", self.total)
    }
}

/// Writes one plain-text report per submission into a directory.
#[derive(Debug, Clone)]
pub struct TextReportWriter {
    /// Reports directory.
    dir: PathBuf,
}

impl TextReportWriter {
    /// Creates a writer for `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Writes `<dir>/<username>_report.txt` and returns its path.
    pub fn write(&self, report: &SubmissionReport) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Could not create {}", self.dir.display()))?;
        let path = self.dir.join(format!("{}_report.txt", report.username));
        std::fs::write(&path, report.to_string())
            .with_context(|| format!("Could not write {}", path.display()))?;
        Ok(path)
    }
}
