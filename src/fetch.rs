#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use glob::Pattern;
use serde::Deserialize;

use crate::{
    config::{GithubEnv, GraderConfig},
    process::ProcessRunner,
    util::fmt_milestone,
};

/// GitHub REST API root.
pub const GITHUB_API: &str = "https://api.github.com";

/// Repositories requested in the single listing call.
const PER_PAGE: u32 = 100;

/// One repository as listed by the GitHub API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteRepo {
    /// Repository name.
    pub name:       String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last push.
    pub pushed_at:  DateTime<Utc>,
}

/// Outcome of a fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    /// Repositories that matched the filters.
    pub selected: Vec<String>,
    /// Repositories that were cloned.
    pub cloned:   Vec<String>,
    /// Repositories whose clone failed.
    pub failed:   Vec<String>,
}

/// Glob submission repositories are named by: `<milestone-N>-<glob>-*`.
pub fn repo_pattern(config: &GraderConfig) -> Result<Pattern> {
    let pattern = format!("{}-{}-*", fmt_milestone(&config.milestone), config.glob);
    Pattern::new(&pattern).with_context(|| format!("Invalid repository glob `{pattern}`"))
}

/// True if `time` falls on or after `min`, or there is no minimum.
fn on_or_after(time: &DateTime<Utc>, min: Option<NaiveDate>) -> bool {
    min.is_none_or(|min| time.date_naive() >= min)
}

/// Keeps the repositories whose name matches `pattern` and that were created
/// and last pushed no earlier than the given dates.
pub fn select_repos<'r>(
    repos: &'r [RemoteRepo],
    pattern: &Pattern,
    min_created: Option<NaiveDate>,
    min_pushed: Option<NaiveDate>,
) -> Vec<&'r RemoteRepo> {
    repos
        .iter()
        .filter(|r| on_or_after(&r.created_at, min_created))
        .filter(|r| on_or_after(&r.pushed_at, min_pushed))
        .filter(|r| pattern.matches(&r.name))
        .collect()
}

/// Lists an organisation's repositories and clones the submissions.
pub struct Fetcher<'a, R: ProcessRunner> {
    /// Grading configuration.
    config:   &'a GraderConfig,
    /// GitHub credentials.
    env:      GithubEnv,
    /// Runs `git clone`.
    runner:   &'a R,
    /// Shared HTTP client.
    client:   reqwest::Client,
    /// API root, overridable for tests.
    api_base: String,
}

impl<'a, R: ProcessRunner> Fetcher<'a, R> {
    /// Creates a fetcher talking to the public GitHub API.
    pub fn new(config: &'a GraderConfig, env: GithubEnv, runner: &'a R) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("gradecheck/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            config,
            env,
            runner,
            client,
            api_base: GITHUB_API.to_string(),
        })
    }

    /// Points the fetcher at another API root.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Lists up to one page of the organisation's repositories.
    pub async fn list(&self) -> Result<Vec<RemoteRepo>> {
        let url = format!(
            "{}/orgs/{}/repos",
            self.api_base.trim_end_matches('/'),
            self.config.org
        );
        tracing::debug!("listing {url} as {}", self.env.username());

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.env.token())
            .header(reqwest::header::ACCEPT, "application/vnd.github.v3+json")
            .query(&[("per_page", PER_PAGE)])
            .send()
            .await
            .with_context(|| format!("Failed to call {url}"))?
            .error_for_status()
            .with_context(|| format!("GitHub returned an error status for {url}"))?;

        response
            .json()
            .await
            .context("Failed to deserialize repository listing")
    }

    /// Lists, filters and clones submissions into the submissions directory.
    pub async fn fetch(&self) -> Result<FetchSummary> {
        let dir = self.config.submissions_dir();
        prepare_dir(&dir, self.config.fetch.clear)?;

        let pattern = repo_pattern(self.config)?;
        let repos = self.list().await?;
        let selected = select_repos(
            &repos,
            &pattern,
            self.config.fetch.min_created,
            self.config.fetch.min_pushed,
        );
        tracing::info!(
            "{} of {} repositories match {}",
            selected.len(),
            repos.len(),
            pattern.as_str()
        );

        let mut summary = FetchSummary {
            selected: selected.iter().map(|r| r.name.clone()).collect(),
            ..Default::default()
        };
        if !self.config.clone {
            for name in &summary.selected {
                tracing::info!("{name}");
            }
            return Ok(summary);
        }

        for repo in selected {
            let command = format!("git clone git@github.com:{}/{}.git", self.config.org, repo.name);
            tracing::info!("cloning {}", repo.name);
            match self.runner.run(&command, Some(&dir)).await {
                Ok(out) if out.success() => summary.cloned.push(repo.name.clone()),
                Ok(out) => {
                    tracing::warn!("failed to clone {}: {}", repo.name, out.stderr.trim());
                    summary.failed.push(repo.name.clone());
                }
                Err(e) => {
                    tracing::warn!("failed to clone {}: {e:#}", repo.name);
                    summary.failed.push(repo.name.clone());
                }
            }
        }

        Ok(summary)
    }
}

/// Creates `dir`, emptying it first when `clear` is set.
fn prepare_dir(dir: &Path, clear: bool) -> Result<()> {
    if clear && dir.exists() {
        std::fs::remove_dir_all(dir).with_context(|| format!("Could not delete {}", dir.display()))?;
    }
    std::fs::create_dir_all(dir).with_context(|| format!("Could not create {}", dir.display()))
}
