use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::bail;
use gradecheck::{
    batch::{BatchGrader, SubmissionEntry},
    config::GraderConfig,
    process::{CommandOutput, ProcessRunner},
    reconcile::CaseCatalog,
    report::TextReportWriter,
};
use serde_json::json;
use uuid::Uuid;

const CATALOG: &str = r#"{
  "variants": [
    {
      "milestone": "milestone2",
      "variant": "demo",
      "grammar": { "bucket_start": "^\\s*Index:\\s*(?P<index>\\d+):\\s*(?P<tokens>.*)$" },
      "exclude": ["^add key:\\s*\\d+$"],
      "cases": [
        { "test": "testCase1:", "label": "Index:", "bucket": 1, "tokens": [10, 20] },
        { "test": "testCase1:", "label": "Index:", "bucket": 2, "tokens": [30] }
      ]
    }
  ]
}"#;

const HPP: &str = "/**
 * HashTable.hpp
 * Created by Ada on 02/27/25
 */
/** Chained hash table. */
class HashTable {
    // Adds a key.
    bool insert(int key);
};
";

const CPP: &str = "/**
 * HashTable.cpp
 * Created by Ada on 02/27/25
 */
bool HashTable::insert(int key) { return true; }
";

/// Answers the commands the grader issues without touching cmake or git.
struct FakeRunner;

impl ProcessRunner for FakeRunner {
    async fn run(&self, command: &str, cwd: Option<&Path>) -> anyhow::Result<CommandOutput> {
        let repo = cwd
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stdout = if command.starts_with("git log") {
            format!("abc1234 {repo} Thu Feb 27 10:00:00 2025 final")
        } else if command.contains("cmake") {
            if repo.ends_with("crash") {
                bail!("cmake is not installed");
            }
            String::new()
        } else if command == "./build/hash" {
            if repo.starts_with("milestone") {
                "add key: 10\nIndex: 1: 10 20\nIndex: 2: 30\n".to_string()
            } else {
                "Index: 1: 20 10\n".to_string()
            }
        } else if command == "./check-ec.sh" {
            "1.5\n".to_string()
        } else {
            bail!("unexpected command `{command}`");
        };

        Ok(CommandOutput {
            stdout,
            ..Default::default()
        })
    }
}

fn add_submission(dir: &Path, cmake: bool) {
    fs::create_dir_all(dir).expect("create submission");
    fs::write(dir.join("HashTable.hpp"), HPP).expect("write hpp");
    fs::write(dir.join("HashTable.cpp"), CPP).expect("write cpp");
    if cmake {
        fs::write(dir.join("CMakeLists.txt"), "add_executable(hash main.cpp HashTable.cpp)")
            .expect("write CMakeLists.txt");
    }
}

fn setup() -> (PathBuf, GraderConfig) {
    let root = std::env::temp_dir().join(format!("gradecheck-batch-{}", Uuid::new_v4()));
    let config: GraderConfig = serde_json::from_value(json!({
        "milestone": "milestone2",
        "prof": "demo",
        "org": "some-org",
        "glob": "hashtable",
        "class": "HashTable",
        "methods": ["bool insert"],
        "repos_dir": root,
        "extra_credit": { "enabled": true, "points": 2 }
    }))
    .expect("config parses");
    config.validate().expect("config is valid");

    let submissions = config.submissions_dir();
    add_submission(&submissions.join("milestone-2-hashtable-ada"), true);
    add_submission(&submissions.join("milestone-2-hashtable-bob"), false);
    add_submission(&submissions.join("milestone-2-hashtable-crash"), true);
    add_submission(&submissions.join("scratch-project"), true);

    (root, config)
}

fn graded(entry: Option<&SubmissionEntry>) -> &gradecheck::report::SubmissionReport {
    match entry {
        Some(SubmissionEntry::Graded(report)) => report,
        other => panic!("expected a graded submission, got {other:?}"),
    }
}

#[tokio::test]
async fn grades_every_submission_and_records_failures() {
    let (root, config) = setup();
    let catalog = CaseCatalog::from_json(CATALOG).expect("catalog parses");

    let summary = BatchGrader::new(&config, &catalog, &FakeRunner, &FakeRunner)
        .grade_all()
        .await
        .expect("batch runs");

    let names: Vec<&str> = summary.entries.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["XXX0", "ada", "bob", "crash"]);
    assert_eq!(summary.graded(), 3);
    assert_eq!(summary.failed(), 1);

    let ada = graded(summary.entries.get("ada"));
    assert_eq!(ada.found_line().as_deref(), Some("2/2 expected cases found"));
    assert_eq!(ada.timestamp, "abc1234 milestone-2-hashtable-ada Thu Feb 27 10:00:00 2025 final");
    assert_eq!(ada.total.grade, 11.5);

    let bob = graded(summary.entries.get("bob"));
    assert!(bob.output.is_none());
    assert!(bob.outcome.as_ref().is_some_and(|o| !o.built()));
    assert_eq!(bob.total.grade, 5.5);

    let unnamed = graded(summary.entries.get("XXX0"));
    assert_eq!(unnamed.repo, "scratch-project");
    assert_eq!(unnamed.found_line().as_deref(), Some("1/2 expected cases found"));

    match summary.entries.get("crash") {
        Some(SubmissionEntry::Failed { reason }) => {
            assert!(reason.contains("cmake is not installed"))
        }
        other => panic!("expected a failed submission, got {other:?}"),
    }

    let table = summary.table();
    assert!(table.contains("Grading Overview"));
    assert!(table.contains("3 graded, 1 failed"));

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn reports_are_written_and_skipped_on_the_next_run() {
    let (root, config) = setup();
    let catalog = CaseCatalog::from_json(CATALOG).expect("catalog parses");
    let grader = BatchGrader::new(&config, &catalog, &FakeRunner, &FakeRunner)
        .with_writer(TextReportWriter::new(config.reports_dir()));

    let first = grader.grade_all().await.expect("first run");
    for name in ["ada", "bob", "XXX0"] {
        assert!(config.reports_dir().join(format!("{name}_report.txt")).is_file());
    }
    assert!(!config.reports_dir().join("crash_report.txt").exists());

    let second = grader.grade_all().await.expect("second run");
    assert_eq!(first.entries.len(), second.entries.len());

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn unknown_variant_fails_each_submission() {
    let (root, mut config) = setup();
    config.prof = "nobody".to_string();
    let catalog = CaseCatalog::from_json(CATALOG).expect("catalog parses");

    let err = BatchGrader::new(&config, &catalog, &FakeRunner, &FakeRunner)
        .grade_all()
        .await;

    // The submissions directory is named after the variant, so it is absent.
    assert!(err.is_err());

    let submissions = config.submissions_dir();
    add_submission(&submissions.join("milestone-2-hashtable-ada"), true);
    let summary = BatchGrader::new(&config, &catalog, &FakeRunner, &FakeRunner)
        .grade_all()
        .await
        .expect("batch runs");
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.graded(), 0);

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn list_and_prime_rows_count_when_weighted() {
    let (root, mut config) = setup();
    config.grading.total = 12.0;
    config.grading.list = 1.0;
    config.grading.prime = 1.0;
    config.validate().expect("config is valid");
    let bob_hpp = config
        .submissions_dir()
        .join("milestone-2-hashtable-bob")
        .join("HashTable.hpp");
    fs::write(&bob_hpp, format!("{HPP}std::list<int> table[101];\n")).expect("write hpp");
    let catalog = CaseCatalog::from_json(CATALOG).expect("catalog parses");

    let summary = BatchGrader::new(&config, &catalog, &FakeRunner, &FakeRunner)
        .grade_all()
        .await
        .expect("batch runs");

    let ada = graded(summary.entries.get("ada"));
    let row = |name: &str| {
        ada.grades
            .iter()
            .find(|r| r.requirement == name)
            .unwrap_or_else(|| panic!("no {name} row"))
            .clone()
    };
    assert_eq!(row("List").grade_value(), 0.0);
    assert_eq!(row("List").reason, "no list type used");
    assert_eq!(row("Prime").grade_value(), 0.0);
    assert_eq!(ada.total.grade, 11.5);

    let bob = graded(summary.entries.get("bob"));
    assert!(bob.uses_list && bob.prime_literal);
    assert_eq!(bob.total.grade, 7.5);

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn unweighted_list_and_prime_add_no_rows() {
    let (root, config) = setup();
    let catalog = CaseCatalog::from_json(CATALOG).expect("catalog parses");

    let summary = BatchGrader::new(&config, &catalog, &FakeRunner, &FakeRunner)
        .grade_all()
        .await
        .expect("batch runs");

    let ada = graded(summary.entries.get("ada"));
    assert!(
        ada.grades
            .iter()
            .all(|r| r.requirement != "List" && r.requirement != "Prime")
    );

    let _ = fs::remove_dir_all(root);
}

const RECORD_CATALOG: &str = r#"{
  "variants": [
    {
      "milestone": "milestone2",
      "variant": "demo",
      "records": {
        "line": "^Index",
        "expected": [["Index: 1", "10", "20"], ["Index: 2", "30", "40"]]
      }
    }
  ]
}"#;

#[tokio::test]
async fn partial_records_earn_half_of_their_share() {
    let (root, config) = setup();
    let catalog = CaseCatalog::from_json(RECORD_CATALOG).expect("catalog parses");

    let summary = BatchGrader::new(&config, &catalog, &FakeRunner, &FakeRunner)
        .grade_all()
        .await
        .expect("batch runs");

    // ada prints `Index: 1: 10 20` and `Index: 2: 30`.
    let ada = graded(summary.entries.get("ada"));
    assert_eq!(
        ada.found_line().as_deref(),
        Some("1 full, 1 partial of 2 expected records")
    );
    let output = ada
        .grades
        .iter()
        .find(|r| r.requirement == "Output")
        .expect("output row");
    assert_eq!(output.grade.grade, 3.0);
    assert!(summary.table().contains("1/2 +1 partial"));

    let _ = fs::remove_dir_all(root);
}
