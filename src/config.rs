#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::reconcile::{CaseCatalog, CatalogError};

/// Seconds a student program may run before it is killed.
const DEFAULT_RUN_TIMEOUT_SECS: u64 = 60;
/// Seconds a CMake configure and build may take.
const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 300;

/// Errors raised while loading configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Could not read config file {path}: {source}")]
    Io {
        /// Path that was read.
        path:   PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The config file is not valid JSON for [`GraderConfig`].
    #[error("Could not parse config file {path}: {source}")]
    Parse {
        /// Path that was parsed.
        path:   PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },
    /// The config parsed but a value is unusable.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    /// A required environment variable is unset or empty.
    #[error("Environment variable {0} is not set")]
    MissingEnv(&'static str),
}

/// Repository fetch settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchOptions {
    /// Delete previously fetched submissions before cloning.
    #[serde(default)]
    pub clear:       bool,
    /// Skip repositories created before this date.
    #[serde(default)]
    pub min_created: Option<NaiveDate>,
    /// Skip repositories last pushed before this date.
    #[serde(default)]
    pub min_pushed:  Option<NaiveDate>,
}

/// Pipeline switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Build and run each submission with CMake.
    #[serde(default = "enabled")]
    pub build: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self { build: true }
    }
}

/// Serde default for switches that are on unless turned off.
fn enabled() -> bool {
    true
}

/// Point weights. Each requirement deducts up to its weight from `total`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingWeights {
    /// Points a perfect submission receives.
    pub total:    f64,
    /// Deducted when the project does not build.
    pub build:    f64,
    /// Scaled by the fraction of expected output cases missing.
    pub output:   f64,
    /// Scaled by the fraction of file kinds without a valid header.
    pub headers:  f64,
    /// Scaled by the fraction of missing declarations and definitions.
    pub methods:  f64,
    /// Scaled by the fraction of declarations without a comment.
    pub comments: f64,
    /// Deducted when no file mentions a list type. `0` leaves the check
    /// out of the grade.
    pub list:     f64,
    /// Deducted when no header holds a prime literal. `0` leaves the check
    /// out of the grade.
    pub prime:    f64,
}

impl Default for GradingWeights {
    fn default() -> Self {
        Self {
            total:    10.0,
            build:    2.0,
            output:   4.0,
            headers:  1.0,
            methods:  2.0,
            comments: 1.0,
            list:     0.0,
            prime:    0.0,
        }
    }
}

impl GradingWeights {
    /// Sum of every deductible weight.
    pub fn deductible(&self) -> f64 {
        self.build + self.output + self.headers + self.methods + self.comments + self.list + self.prime
    }
}

/// Extra credit script settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraCreditOptions {
    /// Run the script at all.
    #[serde(default)]
    pub enabled: bool,
    /// Script to run inside each submission.
    #[serde(default = "default_ec_script")]
    pub script:  String,
    /// Arguments passed to the script, e.g. `--gtest`.
    #[serde(default)]
    pub args:    Vec<String>,
    /// Most extra credit a submission can earn.
    #[serde(default)]
    pub points:  f64,
}

impl Default for ExtraCreditOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            script:  default_ec_script(),
            args:    Vec::new(),
            points:  0.0,
        }
    }
}

/// Serde default for [`ExtraCreditOptions::script`].
fn default_ec_script() -> String {
    "./check-ec.sh".to_string()
}

/// Serde default for [`GraderConfig::repos_dir`].
fn default_repos_dir() -> PathBuf {
    PathBuf::from("repos")
}

/// Everything one grading run needs, loaded from
/// `_<milestone>-<variant>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraderConfig {
    /// Assignment milestone, e.g. `milestone2`.
    pub milestone:    String,
    /// Grading variant (professor), e.g. `hugh`.
    pub prof:         String,
    /// GitHub organisation holding the submissions.
    pub org:          String,
    /// Assignment part of repository names, e.g. `hashtable`.
    pub glob:         String,
    /// Clone matching repositories, or only list them.
    #[serde(default = "enabled")]
    pub clone:        bool,
    /// Class every submission must implement.
    pub class:        String,
    /// Required methods as `<return type> <name>`, e.g. `bool insert`.
    #[serde(default)]
    pub methods:      Vec<String>,
    /// Where submissions are cloned to.
    #[serde(default = "default_repos_dir")]
    pub repos_dir:    PathBuf,
    /// External case catalog replacing the built-in one.
    #[serde(default)]
    pub catalog:      Option<PathBuf>,
    /// Fetch settings.
    #[serde(default)]
    pub fetch:        FetchOptions,
    /// Pipeline switches.
    #[serde(default)]
    pub options:      PipelineOptions,
    /// Point weights.
    #[serde(default)]
    pub grading:      GradingWeights,
    /// Extra credit settings.
    #[serde(default)]
    pub extra_credit: ExtraCreditOptions,
}

impl GraderConfig {
    /// Config file used when none is given: `_<milestone>-<variant>.json`.
    pub fn default_path(milestone: &str, variant: &str) -> PathBuf {
        PathBuf::from(format!("_{milestone}-{variant}.json"))
    }

    /// Reads, parses and validates a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("milestone", &self.milestone),
            ("prof", &self.prof),
            ("org", &self.org),
            ("glob", &self.glob),
            ("class", &self.class),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("`{name}` must not be empty")));
            }
        }

        let g = &self.grading;
        for (name, value) in [
            ("total", g.total),
            ("build", g.build),
            ("output", g.output),
            ("headers", g.headers),
            ("methods", g.methods),
            ("comments", g.comments),
            ("list", g.list),
            ("prime", g.prime),
            ("extra_credit.points", self.extra_credit.points),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "grading weight `{name}` must be a non-negative number, got {value}"
                )));
            }
        }
        if g.deductible() > g.total {
            return Err(ConfigError::Invalid(format!(
                "grading weights add up to {:.2}, more than the total of {:.2}",
                g.deductible(),
                g.total
            )));
        }

        if let Some(bad) = self.methods.iter().find(|m| m.split_whitespace().count() < 2) {
            return Err(ConfigError::Invalid(format!(
                "method `{bad}` must be written as `<return type> <name>`"
            )));
        }

        Ok(())
    }

    /// `<repos_dir>/<milestone>-<prof>`, where submissions are cloned.
    pub fn submissions_dir(&self) -> PathBuf {
        self.repos_dir.join(format!("{}-{}", self.milestone, self.prof))
    }

    /// Directory reports are written to, inside the submissions directory.
    pub fn reports_dir(&self) -> PathBuf {
        self.submissions_dir().join("reports")
    }

    /// Loads the external catalog if one is configured, the built-in one
    /// otherwise.
    pub fn load_catalog(&self) -> Result<CaseCatalog, CatalogError> {
        match &self.catalog {
            Some(path) => CaseCatalog::from_path(path),
            None => CaseCatalog::builtin(),
        }
    }
}

/// GitHub credentials loaded from the environment.
#[derive(Clone)]
pub struct GithubEnv {
    /// Account the token belongs to.
    username: String,
    /// Personal access token.
    token:    String,
}

impl std::fmt::Debug for GithubEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubEnv")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl GithubEnv {
    /// Reads `GITHUB_USERNAME` and `GITHUB_PAT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(read_env("GITHUB_USERNAME")?, read_env("GITHUB_PAT")?))
    }

    /// Creates credentials from explicit values.
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token:    token.into(),
        }
    }

    /// Returns the account name.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the access token.
    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Reads a required, non-empty environment variable.
fn read_env(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingEnv(name))
}

/// How long a student program may run (`GRADECHECK_RUN_TIMEOUT_SECS`).
pub fn run_timeout() -> Duration {
    read_timeout_secs("GRADECHECK_RUN_TIMEOUT_SECS", DEFAULT_RUN_TIMEOUT_SECS)
}

/// How long a configure and build may take
/// (`GRADECHECK_BUILD_TIMEOUT_SECS`).
pub fn build_timeout() -> Duration {
    read_timeout_secs("GRADECHECK_BUILD_TIMEOUT_SECS", DEFAULT_BUILD_TIMEOUT_SECS)
}

/// Parses an environment variable into a `Duration`, falling back to
/// `default_secs` when parsing fails or the variable is missing.
fn read_timeout_secs(env: &str, default_secs: u64) -> Duration {
    std::env::var(env)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default_secs))
}
