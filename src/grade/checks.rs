#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    fmt::Display,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use itertools::Itertools;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::util::{find_files, split_class_name};

/// Date-like runs in a header, e.g. `02/27/25` or `2025-02-27`.
static DATE_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{1,4}[/.-]\d{1,2}[/.-]\d{1,4}\b").expect("date regex is valid")
});

/// Author line of a header.
static AUTHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(Created by|Modified by)\s+\w").expect("author regex is valid")
});

/// Names of list types a submission is expected to use.
static LIST_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(list|SLL|DLL|SinglyLinkedList|DoublyLinkedList)\b")
        .expect("list regex is valid")
});

/// Bare integer literals.
static INTEGER_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+\b").expect("literal regex is valid"));

/// Formats accepted for header dates.
const DATE_FORMATS: &[&str] = &[
    "%m/%d/%y", "%m/%d/%Y", "%Y-%m-%d", "%Y/%m/%d", "%m-%d-%y", "%m-%d-%Y", "%d.%m.%Y",
];

/// Prime literals in this range count as a deliberately chosen table size.
const PRIME_RANGE: std::ops::RangeInclusive<u32> = 11..=10_000;

/// Directory names never searched for sources.
const SKIPPED_DIRS: &[&str] = &["build", ".git"];

/// Kind of C++ file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FileKind {
    /// `.hpp`
    Header,
    /// `.cpp`
    Source,
}

impl FileKind {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            FileKind::Header => "hpp",
            FileKind::Source => "cpp",
        }
    }

    /// Kind of `path`, judged by its extension.
    pub fn of(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "hpp" => Some(FileKind::Header),
            "cpp" => Some(FileKind::Source),
            _ => None,
        }
    }
}

impl Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, ".{}", self.extension())
    }
}

/// A C++ file read into memory.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Where the file was read from.
    path:     PathBuf,
    /// Header or source.
    kind:     FileKind,
    /// File contents.
    contents: String,
}

impl SourceFile {
    /// Creates a file from contents already in memory.
    pub fn new(path: impl Into<PathBuf>, kind: FileKind, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            contents: contents.into(),
        }
    }

    /// Reads a `.hpp` or `.cpp` file.
    pub fn read(path: &Path) -> Result<Self> {
        let Some(kind) = FileKind::of(path) else {
            bail!("{} is neither a .hpp nor a .cpp file", path.display());
        };
        let bytes =
            std::fs::read(path).with_context(|| format!("Could not read {}", path.display()))?;
        Ok(Self::new(path, kind, String::from_utf8_lossy(&bytes)))
    }

    /// File name without directories.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Path the file was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Header or source.
    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// File contents.
    pub fn contents(&self) -> &str {
        &self.contents
    }
}

/// The `.hpp` and `.cpp` files of one submission.
#[derive(Debug, Clone, Default)]
pub struct SourceFiles {
    /// All files, headers first.
    files: Vec<SourceFile>,
}

impl SourceFiles {
    /// Wraps files already in memory.
    pub fn new(mut files: Vec<SourceFile>) -> Self {
        files.sort_by(|a, b| (a.kind, &a.path).cmp(&(b.kind, &b.path)));
        Self { files }
    }

    /// Finds the files implementing `class` under `root`.
    ///
    /// Files whose name contains the class name (ignoring case and
    /// separators) are preferred; when none of a kind match, every file of
    /// that kind is used.
    pub fn discover(root: &Path, class: &str) -> Result<Self> {
        let wanted = split_class_name(class).concat().to_lowercase();
        let mut files = Vec::new();

        for kind in [FileKind::Header, FileKind::Source] {
            let found: Vec<PathBuf> = find_files(kind.extension(), 4, root)?
                .into_iter()
                .filter(|p| !in_skipped_dir(root, p))
                .collect();
            let (named, other): (Vec<PathBuf>, Vec<PathBuf>) =
                found.into_iter().partition(|p| stem_matches(p, &wanted));
            let chosen = if named.is_empty() { other } else { named };

            for path in chosen {
                files.push(SourceFile::read(&path)?);
            }
        }

        tracing::debug!(
            "found {} source files for {class} under {}",
            files.len(),
            root.display()
        );
        Ok(Self::new(files))
    }

    /// All files, headers first.
    pub fn all(&self) -> &[SourceFile] {
        &self.files
    }

    /// Files of one kind.
    pub fn of_kind(&self, kind: FileKind) -> impl Iterator<Item = &SourceFile> {
        self.files.iter().filter(move |f| f.kind == kind)
    }

    /// True when no files were found.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// True if `path` lies in a build or VCS directory below `root`.
fn in_skipped_dir(root: &Path, path: &Path) -> bool {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .any(|c| SKIPPED_DIRS.iter().any(|d| c.as_os_str() == *d))
}

/// True if the file stem, lowercased and without separators, contains
/// `wanted`.
fn stem_matches(path: &Path, wanted: &str) -> bool {
    let stem: String = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect();
    !wanted.is_empty() && stem.contains(wanted)
}

/// Why a file header was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeaderProblem {
    /// The first line does not open a `/**` block.
    NoOpening,
    /// The block is never closed.
    Unterminated,
    /// The header does not mention the file name.
    MissingFileName,
    /// The header has no parseable date.
    MissingDate,
    /// The header has no `Created by`/`Modified by` line.
    MissingAuthor,
}

impl Display for HeaderProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            HeaderProblem::NoOpening => "file does not start with a /** comment block",
            HeaderProblem::Unterminated => "comment block is never closed",
            HeaderProblem::MissingFileName => "header does not name the file",
            HeaderProblem::MissingDate => "header has no date",
            HeaderProblem::MissingAuthor => "header has no `Created by` or `Modified by` line",
        };
        f.write_str(msg)
    }
}

/// Result of checking one file's header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderFinding {
    /// File name.
    pub file:    String,
    /// Header or source.
    pub kind:    FileKind,
    /// Text of the comment block, when one was found.
    pub header:  Option<String>,
    /// First problem found, `None` for a valid header.
    pub problem: Option<HeaderProblem>,
}

impl HeaderFinding {
    /// True when the header is valid.
    pub fn ok(&self) -> bool {
        self.problem.is_none()
    }
}

/// Checks that `file` opens with a comment block naming the file, a date and
/// an author.
pub fn check_header(file: &SourceFile) -> HeaderFinding {
    let name = file.name();
    let finding = |header: Option<&str>, problem| HeaderFinding {
        file: name.clone(),
        kind: file.kind,
        header: header.map(str::to_string),
        problem,
    };

    let text = file.contents();
    if !text.lines().next().is_some_and(|l| l.contains("/**")) {
        return finding(None, Some(HeaderProblem::NoOpening));
    }
    let Some(end) = text.find("*/") else {
        return finding(None, Some(HeaderProblem::Unterminated));
    };
    let header = text[..end + 2].trim();

    let problem = if !header.contains(&name) {
        Some(HeaderProblem::MissingFileName)
    } else if !has_date(header) {
        Some(HeaderProblem::MissingDate)
    } else if !AUTHOR.is_match(header) {
        Some(HeaderProblem::MissingAuthor)
    } else {
        None
    };
    finding(Some(header), problem)
}

/// True if any date-like run in `text` parses as a calendar date.
fn has_date(text: &str) -> bool {
    DATE_LIKE.find_iter(text).any(|m| {
        DATE_FORMATS
            .iter()
            .any(|fmt| NaiveDate::parse_from_str(m.as_str(), fmt).is_ok())
    })
}

/// Header findings for every file of a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderSummary {
    /// One finding per file, headers first.
    pub findings: Vec<HeaderFinding>,
}

impl HeaderSummary {
    /// True when at least one file of `kind` exists and all have valid
    /// headers.
    pub fn passed(&self, kind: FileKind) -> bool {
        let mut of_kind = self.findings.iter().filter(|f| f.kind == kind).peekable();
        of_kind.peek().is_some() && of_kind.all(HeaderFinding::ok)
    }

    /// Fraction of file kinds that passed.
    pub fn score(&self) -> f64 {
        let passed = [FileKind::Header, FileKind::Source]
            .iter()
            .filter(|k| self.passed(**k))
            .count();
        passed as f64 / 2.0
    }
}

/// Checks the header of every file.
pub fn check_headers(files: &SourceFiles) -> HeaderSummary {
    HeaderSummary {
        findings: files.all().iter().map(check_header).collect(),
    }
}

/// What was found for one required method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodFinding {
    /// Method as configured, e.g. `bool insert`.
    pub signature: String,
    /// Declared in a `.hpp` file.
    pub declared:  bool,
    /// Defined as `Class::name` in a `.cpp` file.
    pub defined:   bool,
    /// The declaration is directly preceded by a comment.
    pub commented: bool,
}

/// Result of checking the required class and methods.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodReport {
    /// Class that was looked for.
    pub class:           String,
    /// `class <Class>` is declared in a `.hpp` file.
    pub class_declared:  bool,
    /// The class declaration is directly preceded by a comment.
    pub class_commented: bool,
    /// One finding per required method, in configured order.
    pub methods:         Vec<MethodFinding>,
}

impl MethodReport {
    /// Fraction of the class declaration and the method declarations and
    /// definitions that are present.
    pub fn method_score(&self) -> f64 {
        let missing = usize::from(!self.class_declared)
            + self
                .methods
                .iter()
                .map(|m| usize::from(!m.declared) + usize::from(!m.defined))
                .sum::<usize>();
        1.0 - missing as f64 / (2 * self.methods.len() + 1) as f64
    }

    /// Fraction of the class and method declarations that carry a comment.
    pub fn comment_score(&self) -> f64 {
        let uncommented = self.methods.iter().filter(|m| !m.commented).count()
            + usize::from(!self.class_commented);
        1.0 - uncommented as f64 / (self.methods.len() + 1) as f64
    }
}

/// Collapses whitespace runs to single spaces.
fn squash(text: &str) -> String {
    text.split_whitespace().join(" ")
}

/// True if `line` is, or ends, a comment.
fn is_comment(line: &str) -> bool {
    line.contains("*/") || line.contains("//")
}

/// Finds the first line of any header file accepted by `matches`, and
/// whether the line before it is a comment.
fn find_declaration(files: &SourceFiles, matches: impl Fn(&str) -> bool) -> Option<bool> {
    files.of_kind(FileKind::Header).find_map(|file| {
        let lines: Vec<&str> = file.contents().lines().collect();
        lines.iter().position(|l| matches(*l)).map(|idx| {
            idx.checked_sub(1)
                .and_then(|prev| lines.get(prev))
                .is_some_and(|prev| is_comment(prev))
        })
    })
}

/// Checks that `class` and each of `methods` (written `<return type>
/// <name>`) are declared, defined and commented.
pub fn check_methods(class: &str, methods: &[String], files: &SourceFiles) -> MethodReport {
    let class_decl = Regex::new(&format!(r"^\s*class\s+{}\b[^;]*$", regex::escape(class))).ok();
    let class_found =
        class_decl.and_then(|re| find_declaration(files, |line| re.is_match(line)));

    let definitions = files
        .of_kind(FileKind::Source)
        .map(|f| squash(f.contents()))
        .collect::<Vec<_>>();

    let methods = methods
        .iter()
        .map(|signature| {
            let signature = squash(signature);
            let declaration = format!("{signature}(");
            let definition = match signature.rsplit_once(' ') {
                Some((ret, name)) => format!("{ret} {class}::{name}("),
                None => format!("{class}::{signature}("),
            };

            let found = find_declaration(files, |line| squash(line).contains(&declaration));
            MethodFinding {
                declared: found.is_some(),
                commented: found.unwrap_or(false),
                defined: definitions.iter().any(|d| d.contains(&definition)),
                signature,
            }
        })
        .collect();

    MethodReport {
        class: class.to_string(),
        class_declared: class_found.is_some(),
        class_commented: class_found.unwrap_or(false),
        methods,
    }
}

/// True if any file mentions a list type.
pub fn uses_list(files: &SourceFiles) -> bool {
    files.all().iter().any(|f| LIST_TYPE.is_match(f.contents()))
}

/// True if any header contains a prime integer literal, the usual sign of a
/// deliberately sized hash table.
pub fn has_prime_literal(files: &SourceFiles) -> bool {
    files.of_kind(FileKind::Header).any(|f| {
        INTEGER_LITERAL
            .find_iter(f.contents())
            .filter_map(|m| m.as_str().parse::<u32>().ok())
            .any(|n| PRIME_RANGE.contains(&n) && is_prime(n))
    })
}

/// Trial-division primality test.
fn is_prime(n: u32) -> bool {
    let n = u64::from(n);
    n >= 2 && (2u64..).take_while(|d| d * d <= n).all(|d| n % d != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primes() {
        let found: Vec<u32> = (0..30).filter(|n| is_prime(*n)).collect();
        assert_eq!(found, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
    }

    #[test]
    fn header_dates() {
        assert!(has_date("Date: 02/27/25"));
        assert!(has_date("on 2025-02-27"));
        assert!(!has_date("version 13/45/99"));
        assert!(!has_date("no date here"));
    }

    #[test]
    fn skipped_dirs() {
        let root = Path::new("/r");
        assert!(in_skipped_dir(root, Path::new("/r/build/CMakeFiles/a.cpp")));
        assert!(!in_skipped_dir(root, Path::new("/r/src/HashTable.cpp")));
    }
}
