#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::catalog::CatalogError;

/// Matches every (optionally negative) integer in a run of text.
static INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+").expect("integer regex is valid"));

/// Name of the capture group holding the bucket index.
const INDEX_GROUP: &str = "index";
/// Name of the capture group holding inline tokens on a bucket start line.
const TOKENS_GROUP: &str = "tokens";
/// Name of the capture group holding the token on a token line.
const TOKEN_GROUP: &str = "token";

/// Uncompiled line grammar as it appears in a catalog file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineGrammar {
    /// Regex for a line that opens a bucket. Must have an `index` group and
    /// may have a `tokens` group.
    pub bucket_start: String,
    /// Regex for a line carrying one token of the current bucket, with a
    /// `token` group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token:        Option<String>,
}

impl LineGrammar {
    /// `Bucket 3:` opens a bucket, each following `Node key: 10` adds a token.
    pub fn bucket_blocks() -> Self {
        Self {
            bucket_start: r"^\s*Bucket\s+(?P<index>\d+)\s*:".to_string(),
            token:        Some(r"^\s*Node key:\s*(?P<token>-?\d+)".to_string()),
        }
    }

    /// `Index: 4: 114 510` is a whole bucket on one line.
    pub fn indexed_rows() -> Self {
        Self {
            bucket_start: r"^\s*Index:\s*(?P<index>\d+):\s*(?P<tokens>.*)$".to_string(),
            token:        None,
        }
    }

    /// Compiles the grammar, checking the required capture groups exist.
    pub fn compile(&self) -> Result<LinePatterns, CatalogError> {
        let bucket_start = Regex::new(&self.bucket_start).map_err(|e| {
            CatalogError::Malformed(format!("invalid bucket pattern `{}`: {e}", self.bucket_start))
        })?;
        if !has_group(&bucket_start, INDEX_GROUP) {
            return Err(CatalogError::Malformed(format!(
                "bucket pattern `{}` has no `{INDEX_GROUP}` group",
                self.bucket_start
            )));
        }

        let token = match &self.token {
            Some(pattern) => {
                let re = Regex::new(pattern).map_err(|e| {
                    CatalogError::Malformed(format!("invalid token pattern `{pattern}`: {e}"))
                })?;
                if !has_group(&re, TOKEN_GROUP) {
                    return Err(CatalogError::Malformed(format!(
                        "token pattern `{pattern}` has no `{TOKEN_GROUP}` group"
                    )));
                }
                Some(re)
            }
            None => None,
        };

        Ok(LinePatterns {
            bucket_start,
            token,
        })
    }
}

/// Returns true if `re` declares a named group called `name`.
fn has_group(re: &Regex, name: &str) -> bool {
    re.capture_names().flatten().any(|n| n == name)
}

/// A compiled [`LineGrammar`].
#[derive(Debug, Clone)]
pub struct LinePatterns {
    /// Opens a new bucket.
    bucket_start: Regex,
    /// Adds one token to the open bucket, if the grammar uses token lines.
    token:        Option<Regex>,
}

/// One group of tokens found under a bucket marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    /// Index printed on the marker line.
    pub index:  u64,
    /// Tokens in the order they were printed.
    pub tokens: Vec<i64>,
}

impl Bucket {
    /// Creates a bucket.
    pub fn new(index: u64, tokens: impl Into<Vec<i64>>) -> Self {
        Self {
            index,
            tokens: tokens.into(),
        }
    }
}

/// Scans `lines` for buckets. Lines the grammar does not recognise are
/// skipped, and buckets that end up without tokens are dropped.
pub fn parse_buckets<S: AsRef<str>>(lines: &[S], patterns: &LinePatterns) -> Vec<Bucket> {
    let mut buckets = Vec::new();
    let mut current: Option<Bucket> = None;

    for line in lines {
        let line = line.as_ref();

        if let Some(caps) = patterns.bucket_start.captures(line) {
            flush(&mut buckets, current.take());

            // A marker whose index overflows u64 still ends the previous
            // bucket; the tokens under it are dropped.
            let Some(index) = caps
                .name(INDEX_GROUP)
                .and_then(|m| m.as_str().parse::<u64>().ok())
            else {
                continue;
            };

            let mut bucket = Bucket::new(index, Vec::new());
            if let Some(inline) = caps.name(TOKENS_GROUP) {
                bucket.tokens.extend(integers(inline.as_str()));
            }
            current = Some(bucket);
            continue;
        }

        if let (Some(token_re), Some(bucket)) = (&patterns.token, current.as_mut())
            && let Some(token) = token_re
                .captures(line)
                .and_then(|caps| caps.name(TOKEN_GROUP))
                .and_then(|m| m.as_str().parse::<i64>().ok())
        {
            bucket.tokens.push(token);
        }
    }

    flush(&mut buckets, current);
    tracing::debug!("parsed {} buckets from {} lines", buckets.len(), lines.len());
    buckets
}

/// Pushes `bucket` onto `buckets` unless it is absent or empty.
fn flush(buckets: &mut Vec<Bucket>, bucket: Option<Bucket>) {
    if let Some(bucket) = bucket
        && !bucket.tokens.is_empty()
    {
        buckets.push(bucket);
    }
}

/// Every integer in `text` that fits an `i64`.
fn integers(text: &str) -> impl Iterator<Item = i64> + '_ {
    INTEGER
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<i64>().ok())
}

/// Drops lines that are blank or match any of the exclusion patterns.
#[derive(Debug, Clone, Default)]
pub struct OutputFilter {
    /// Lines matching any of these are removed.
    exclude: Vec<Regex>,
}

impl OutputFilter {
    /// Compiles the exclusion patterns.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, CatalogError> {
        let exclude = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|e| {
                    CatalogError::Malformed(format!("invalid exclude pattern `{}`: {e}", p.as_ref()))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { exclude })
    }

    /// Splits `output` into lines and keeps the ones worth parsing.
    pub fn apply(&self, output: &str) -> Vec<String> {
        output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter(|line| !self.exclude.iter().any(|re| re.is_match(line)))
            .map(str::to_string)
            .collect()
    }
}
