#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    collections::BTreeMap,
    ffi::OsStr,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use itertools::Itertools;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Panel, Style, object::Rows},
};

use crate::{
    build::{BuildDriver, BuildOutcome},
    config::{GradingWeights, GraderConfig},
    grade::{
        Grade, GradeResult, SourceFiles, check_headers, check_methods, has_prime_literal,
        total_grade, uses_list,
    },
    process::ProcessRunner,
    reconcile::{CaseCatalog, OutputReconciler, RecordStatus},
    report::{ExtraCredit, SubmissionReport, TextReportWriter},
    util::repo_username,
};

/// Directory inside the submissions directory that holds reports.
const REPORTS_DIR: &str = "reports";

/// Prints the last commit as `<hash> <author> <date> <subject>`.
const LAST_COMMIT: &str = r#"git log -n 1 --pretty=format:"%h %an %ad %s""#;

/// Result of grading one submission.
#[derive(Debug, Clone)]
pub enum SubmissionEntry {
    /// The submission went through the whole pipeline.
    Graded(Box<SubmissionReport>),
    /// Grading stopped early.
    Failed {
        /// What went wrong.
        reason: String,
    },
}

/// One line of the console summary.
#[derive(Tabled)]
struct SummaryRow {
    /// Username.
    #[tabled(rename = "Submission")]
    submission: String,
    /// Build status.
    #[tabled(rename = "Build")]
    build:      String,
    /// `found/total`, plus partial records.
    #[tabled(rename = "Output")]
    output:     String,
    /// Final grade, or the failure reason.
    #[tabled(rename = "Grade")]
    grade:      String,
}

/// Every submission of a batch, keyed by username.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    /// Entries in username order.
    pub entries: BTreeMap<String, SubmissionEntry>,
}

impl BatchSummary {
    /// Number of submissions graded to the end.
    pub fn graded(&self) -> usize {
        self.entries
            .values()
            .filter(|e| matches!(e, SubmissionEntry::Graded(_)))
            .count()
    }

    /// Number of submissions that failed.
    pub fn failed(&self) -> usize {
        self.entries.len() - self.graded()
    }

    /// `username`, suffixed with `-<n>` if an entry already uses it.
    fn unique_key(&self, username: String) -> String {
        let mut key = username.clone();
        let mut n = 2;
        while self.entries.contains_key(&key) {
            key = format!("{username}-{n}");
            n += 1;
        }
        key
    }

    /// Console summary table.
    pub fn table(&self) -> String {
        let rows = self
            .entries
            .iter()
            .map(|(name, entry)| match entry {
                SubmissionEntry::Graded(report) => SummaryRow {
                    submission: name.clone(),
                    build:      report
                        .outcome
                        .as_ref()
                        .map(BuildOutcome::status)
                        .unwrap_or_else(|| "skipped".to_string()),
                    output:     report
                        .output
                        .as_ref()
                        .map(|o| {
                            let (mut found, mut total, mut partial) =
                                (o.reconciliation.matched.len(), o.reconciliation.total(), 0);
                            if let Some(records) = &o.records {
                                found += records.count(RecordStatus::Full);
                                partial += records.count(RecordStatus::Partial);
                                total += records.total();
                            }
                            if partial > 0 {
                                format!("{found}/{total} +{partial} partial")
                            } else {
                                format!("{found}/{total}")
                            }
                        })
                        .unwrap_or_else(|| "-".to_string()),
                    grade:      report.total.to_string(),
                },
                SubmissionEntry::Failed { reason } => SummaryRow {
                    submission: name.clone(),
                    build:      "-".to_string(),
                    output:     "-".to_string(),
                    grade:      format!("failed: {reason}"),
                },
            })
            .collect::<Vec<_>>();

        Table::new(rows)
            .with(Panel::header("Grading Overview"))
            .with(Panel::footer(format!(
                "{} graded, {} failed",
                self.graded(),
                self.failed()
            )))
            .with(
                Modify::new(Rows::first())
                    .with(Alignment::center())
                    .with(Alignment::center_vertical()),
            )
            .with(Style::modern())
            .to_string()
    }
}

/// Grades every submission directory, one at a time.
pub struct BatchGrader<'a, R: ProcessRunner> {
    /// Grading configuration.
    config:   &'a GraderConfig,
    /// Expected output cases.
    catalog:  &'a CaseCatalog,
    /// Runs cmake, git and the extra credit script.
    builder:  &'a R,
    /// Runs student programs.
    executor: &'a R,
    /// Writes reports, if reporting is on.
    writer:   Option<TextReportWriter>,
}

impl<'a, R: ProcessRunner> BatchGrader<'a, R> {
    /// Creates a grader that does not write reports.
    pub fn new(
        config: &'a GraderConfig,
        catalog: &'a CaseCatalog,
        builder: &'a R,
        executor: &'a R,
    ) -> Self {
        Self {
            config,
            catalog,
            builder,
            executor,
            writer: None,
        }
    }

    /// Writes a report per submission with `writer`.
    pub fn with_writer(mut self, writer: TextReportWriter) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Submission directories, sorted by name.
    pub fn submissions(&self) -> Result<Vec<PathBuf>> {
        let dir = self.config.submissions_dir();
        let mut found = std::fs::read_dir(&dir)
            .with_context(|| format!("Could not list submissions in {}", dir.display()))?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| p.is_dir() && p.file_name() != Some(OsStr::new(REPORTS_DIR)))
            .collect::<Vec<_>>();
        found.sort();
        Ok(found)
    }

    /// Grades every submission. Only failing to list the submissions is an
    /// error; anything going wrong with one submission is recorded and the
    /// batch moves on.
    pub async fn grade_all(&self) -> Result<BatchSummary> {
        let mut summary = BatchSummary::default();
        let mut unnamed = 0;

        for dir in self.submissions()? {
            let repo = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let username = repo_username(&repo, &self.config.milestone, &self.config.glob)
                .unwrap_or_else(|| {
                    let name = format!("XXX{unnamed}");
                    unnamed += 1;
                    name
                });
            let username = summary.unique_key(username);
            tracing::info!("grading {repo} as {username}");

            let entry = match self.grade_one(&dir, &username).await {
                Ok(report) => {
                    self.write_report(&report);
                    SubmissionEntry::Graded(Box::new(report))
                }
                Err(e) => {
                    tracing::error!("could not grade {repo}: {e:#}");
                    SubmissionEntry::Failed {
                        reason: format!("{e:#}"),
                    }
                }
            };
            summary.entries.insert(username, entry);
        }

        Ok(summary)
    }

    /// Writes `report` if reporting is on. Failures are logged.
    fn write_report(&self, report: &SubmissionReport) {
        if let Some(writer) = &self.writer {
            match writer.write(report) {
                Ok(path) => tracing::info!("wrote {}", path.display()),
                Err(e) => tracing::error!("could not write report for {}: {e:#}", report.username),
            }
        }
    }

    /// Runs the whole pipeline for the submission in `dir`.
    pub async fn grade_one(&self, dir: &Path, username: &str) -> Result<SubmissionReport> {
        let profile = self
            .catalog
            .lookup(&self.config.milestone, &self.config.prof)?;

        let timestamp = self.last_commit(dir).await;
        let files = SourceFiles::discover(dir, &self.config.class)?;

        let build = if self.config.options.build {
            Some(
                BuildDriver::new(self.builder, self.executor)
                    .build_and_run(dir)
                    .await?,
            )
        } else {
            None
        };
        let output = build
            .as_ref()
            .filter(|b| b.run.is_some())
            .map(|b| OutputReconciler::new(profile).run(b.stdout()));

        let headers = check_headers(&files);
        let methods = check_methods(&self.config.class, &self.config.methods, &files);
        let extra_credit = if self.config.extra_credit.enabled {
            Some(self.extra_credit(dir).await)
        } else {
            None
        };

        let mut report = SubmissionReport::builder()
            .username(username)
            .repo(
                dir.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            )
            .timestamp(timestamp)
            .outcome(build)
            .output(output)
            .uses_list(uses_list(&files))
            .prime_literal(has_prime_literal(&files))
            .headers(headers)
            .methods(methods)
            .extra_credit(extra_credit)
            .build();
        report.grades = grade_rows(&self.config.grading, &report);
        report.total = total_grade(self.config.grading.total, &report.grades);

        Ok(report)
    }

    /// Last commit line, or `unknown` when git cannot tell.
    async fn last_commit(&self, dir: &Path) -> String {
        match self.builder.run(LAST_COMMIT, Some(dir)).await {
            Ok(out) if out.success() => out.stdout.trim().to_string(),
            Ok(out) => {
                tracing::warn!("git log failed in {}: {}", dir.display(), out.stderr.trim());
                "unknown".to_string()
            }
            Err(e) => {
                tracing::warn!("git log failed in {}: {e:#}", dir.display());
                "unknown".to_string()
            }
        }
    }

    /// Runs the extra credit script. Its stdout is the number of points
    /// earned, capped at the configured maximum.
    async fn extra_credit(&self, dir: &Path) -> ExtraCredit {
        let ec = &self.config.extra_credit;
        let command = std::iter::once(ec.script.as_str())
            .chain(ec.args.iter().map(String::as_str))
            .join(" ");

        let (earned, output) = match self.builder.run(&command, Some(dir)).await {
            Ok(out) => match out.stdout.trim().parse::<f64>() {
                Ok(points) if points.is_finite() => (points.clamp(0.0, ec.points), out.stdout),
                _ => {
                    tracing::warn!("`{command}` did not print a number of points");
                    (0.0, out.stdout)
                }
            },
            Err(e) => {
                tracing::warn!("`{command}` failed: {e:#}");
                (0.0, format!("{e:#}"))
            }
        };

        ExtraCredit {
            points: Grade::new(earned, ec.points),
            output,
        }
    }
}

/// One grade row per requirement. Build and output rows only appear when
/// building is enabled, list and prime rows only when they carry weight.
fn grade_rows(weights: &GradingWeights, report: &SubmissionReport) -> Vec<GradeResult> {
    let mut rows = Vec::new();
    let headers = &report.headers;
    let methods = &report.methods;

    if let Some(build) = &report.outcome {
        rows.push(
            GradeResult::builder()
                .requirement("Build")
                .grade(Grade::scaled(weights.build, if build.built() { 1.0 } else { 0.0 }))
                .reason(build.status())
                .build(),
        );

        let (ratio, reason) = match &report.output {
            Some(o) => (o.score(), o.summary()),
            None => (0.0, "program did not run".to_string()),
        };
        rows.push(
            GradeResult::builder()
                .requirement("Output")
                .grade(Grade::scaled(weights.output, ratio))
                .reason(reason)
                .build(),
        );
    }

    let bad_headers = headers
        .findings
        .iter()
        .filter_map(|f| f.problem.map(|p| format!("{}: {p}", f.file)))
        .join("; ");
    rows.push(
        GradeResult::builder()
            .requirement("File Headers")
            .grade(Grade::scaled(weights.headers, headers.score()))
            .reason(if headers.findings.is_empty() {
                "no source files".to_string()
            } else {
                bad_headers
            })
            .build(),
    );

    let mut missing = methods
        .methods
        .iter()
        .flat_map(|m| {
            [
                (!m.declared).then(|| format!("{} not declared", m.signature)),
                (!m.defined).then(|| format!("{} not defined", m.signature)),
            ]
        })
        .flatten()
        .collect::<Vec<_>>();
    if !methods.class_declared {
        missing.insert(0, format!("class {} not declared", methods.class));
    }
    rows.push(
        GradeResult::builder()
            .requirement("Methods")
            .grade(Grade::scaled(weights.methods, methods.method_score()))
            .reason(missing.join("; "))
            .build(),
    );

    let uncommented = (!methods.class_commented)
        .then(|| format!("class {}", methods.class))
        .into_iter()
        .chain(
            methods
                .methods
                .iter()
                .filter(|m| !m.commented)
                .map(|m| m.signature.clone()),
        )
        .join(", ");
    rows.push(
        GradeResult::builder()
            .requirement("Method Headers")
            .grade(Grade::scaled(weights.comments, methods.comment_score()))
            .reason(if uncommented.is_empty() {
                String::new()
            } else {
                format!("no comment on {uncommented}")
            })
            .build(),
    );

    if weights.list > 0.0 {
        rows.push(
            GradeResult::builder()
                .requirement("List")
                .grade(Grade::scaled(weights.list, if report.uses_list { 1.0 } else { 0.0 }))
                .reason(if report.uses_list { "" } else { "no list type used" })
                .build(),
        );
    }
    if weights.prime > 0.0 {
        rows.push(
            GradeResult::builder()
                .requirement("Prime")
                .grade(Grade::scaled(weights.prime, if report.prime_literal { 1.0 } else { 0.0 }))
                .reason(if report.prime_literal { "" } else { "no prime literal in .hpp" })
                .build(),
        );
    }

    if let Some(ec) = &report.extra_credit {
        rows.push(
            GradeResult::builder()
                .requirement("Extra Credit")
                .grade(ec.points)
                .bonus(true)
                .build(),
        );
    }

    rows
}
