#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use anyhow::{Context, Result};
use glob::glob;
use regex::Regex;
use which::which;

/// `<milestone>-<variant>` as given on the command line.
static TARGET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)-(\w+)$").expect("target regex is valid"));

/// A word prefix followed by a trailing number, e.g. `milestone2`.
static NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\D*?)-?(\d+)$").expect("milestone regex is valid"));

/// One capitalised word of a class name.
static CLASS_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z][a-z]*").expect("class word regex is valid"));

/// Finds and returns the path to the bash binary
pub fn bash_path() -> Result<OsString> {
    which("bash")
        .map(PathBuf::into_os_string)
        .context("Cannot find bash on path")
}

/// A glob utility function to find paths to files with certain extension
///
/// * `extension`: the file extension to find paths for
/// * `search_depth`: how many folders deep to search for
/// * `root_dir`: the root directory where search starts
pub fn find_files(extension: &str, search_depth: i8, root_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut pattern = root_dir.to_path_buf();

    for _ in 0..search_depth {
        pattern.push("**");
    }

    pattern.push(format!("*.{extension}"));
    let pattern = pattern
        .to_str()
        .context("Could not convert root_dir to string")?
        .to_string();

    let mut found: Vec<PathBuf> = glob(&pattern)
        .context("Could not create glob")?
        .filter_map(Result::ok)
        .collect();
    found.sort();
    found.dedup();
    Ok(found)
}

/// Splits a `<milestone>-<variant>` argument into its two parts.
pub fn split_target(arg: &str) -> Option<(String, String)> {
    let caps = TARGET.captures(arg.trim())?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

/// Formats `milestone2` as `milestone-2`, the way repositories are named.
/// Anything without a trailing number is returned unchanged.
pub fn fmt_milestone(milestone: &str) -> String {
    match NUMBERED.captures(milestone) {
        Some(caps) if !caps[1].is_empty() => format!("{}-{}", &caps[1], &caps[2]),
        _ => milestone.to_string(),
    }
}

/// Splits a class name into its capitalised words: `HashTable` -> `Hash`,
/// `Table`.
pub fn split_class_name(class: &str) -> Vec<&str> {
    CLASS_WORD.find_iter(class).map(|m| m.as_str()).collect()
}

/// Extracts the GitHub username from a repository named
/// `<milestone-N>-<glob>-<username>`.
pub fn repo_username(repo: &str, milestone: &str, glob: &str) -> Option<String> {
    let pattern = format!(
        "^{}-{}-(.+)$",
        regex::escape(&fmt_milestone(milestone)),
        regex::escape(glob)
    );
    let re = Regex::new(&pattern).ok()?;
    re.captures(repo).map(|caps| caps[1].to_string())
}
