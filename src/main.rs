#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # gradecheck
//!
//! Fetches C++ homework repositories from a GitHub organisation, builds and
//! runs them, and grades their output and sources.
//!
//! ```text
//! gradecheck milestone2-hugh --fetch --grade --report
//! ```
//!
//! Settings are read from `_<milestone>-<variant>.json` unless `--config` is
//! given. `GITHUB_USERNAME` and `GITHUB_PAT` (for `--fetch`) may be put in a
//! `.env` file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bpaf::*;
use colored::Colorize;
use dotenvy::dotenv;
use gradecheck::{
    batch::BatchGrader,
    config::{self, GithubEnv, GraderConfig},
    fetch::Fetcher,
    process::ShellRunner,
    report::TextReportWriter,
    util::split_target,
};
use tracing::{Level, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Parsed command line.
#[derive(Debug, Clone)]
struct Options {
    /// Log debug messages.
    verbose: bool,
    /// Fetch repositories.
    fetch:   bool,
    /// Grade fetched repositories.
    grade:   bool,
    /// Grade and write reports.
    report:  bool,
    /// Config file overriding the default path.
    config:  Option<PathBuf>,
    /// `<milestone>-<variant>`.
    target:  String,
}

/// Parse the command line arguments and return `Options`
fn options() -> Options {
    let verbose = short('v')
        .long("verbose")
        .help("Print debug logs")
        .switch();
    let fetch = short('f')
        .long("fetch")
        .help("Fetch GitHub repositories")
        .switch();
    let grade = short('g')
        .long("grade")
        .help("Grade fetched repositories")
        .switch();
    let report = short('r')
        .long("report")
        .help("Grade fetched repositories and write reports")
        .switch();
    let config_help = format!(
        "Config file, default {}",
        GraderConfig::default_path("<milestone>", "<variant>").display()
    );
    let config = long("config")
        .help(config_help.as_str())
        .argument::<PathBuf>("PATH")
        .optional();
    let target = positional::<String>("MILESTONE")
        .help("Milestone and variant, e.g. milestone2-hugh")
        .guard(|t| split_target(t).is_some(), "expected <milestone>-<variant>");

    construct!(Options {
        verbose,
        fetch,
        grade,
        report,
        config,
        target
    })
    .to_options()
    .descr("Grade checker for C++ homework repositories")
    .run()
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let opts = options();

    let fmt = fmt::layer()
        .without_time()
        .with_file(false)
        .with_line_number(false);
    let filter_layer =
        LevelFilter::from_level(if opts.verbose { Level::DEBUG } else { Level::INFO });
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();

    let (milestone, variant) =
        split_target(&opts.target).context("MILESTONE must look like milestone2-hugh")?;
    let path = opts
        .config
        .clone()
        .unwrap_or_else(|| GraderConfig::default_path(&milestone, &variant));
    let config = GraderConfig::load(&path)?;
    if !config.milestone.eq_ignore_ascii_case(&milestone)
        || !config.prof.eq_ignore_ascii_case(&variant)
    {
        tracing::warn!(
            "{} is for {}-{}, not {}",
            path.display(),
            config.milestone,
            config.prof,
            opts.target
        );
    }

    if !(opts.fetch || opts.grade || opts.report) {
        eprintln!("Nothing to do. Pass --fetch, --grade or --report.");
        return Ok(());
    }

    let builder = ShellRunner::new(Some(config::build_timeout()))?;
    let executor = builder.with_deadline(Some(config::run_timeout()));

    if opts.fetch {
        let env = GithubEnv::from_env()?;
        let summary = Fetcher::new(&config, env, &builder)?.fetch().await?;
        eprintln!(
            "{}",
            format!(
                "Fetched {} of {} matching repositories",
                summary.cloned.len(),
                summary.selected.len()
            )
            .green()
        );
        for name in &summary.failed {
            eprintln!("{} {name}", "Failed to clone".red());
        }
    }

    if opts.grade || opts.report {
        let catalog = config
            .load_catalog()
            .context("Could not load the expected case catalog")?;
        let mut grader = BatchGrader::new(&config, &catalog, &builder, &executor);
        if opts.report {
            grader = grader.with_writer(TextReportWriter::new(config.reports_dir()));
        }

        let summary = grader.grade_all().await?;
        eprintln!("{}", summary.table());
        if summary.failed() > 0 {
            eprintln!(
                "{}",
                format!("{} submissions could not be graded", summary.failed()).red()
            );
        }
    }

    Ok(())
}
