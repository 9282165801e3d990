use std::{fs, path::Path, sync::Mutex};

use chrono::{DateTime, NaiveDate, Utc};
use gradecheck::{
    config::{GithubEnv, GraderConfig},
    fetch::{Fetcher, RemoteRepo, repo_pattern, select_repos},
    process::{CommandOutput, ProcessRunner},
};
use serde_json::json;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};
use uuid::Uuid;

fn config(root: &Path, clone: bool) -> GraderConfig {
    serde_json::from_value(json!({
        "milestone": "milestone2",
        "prof": "hugh",
        "org": "some-org",
        "glob": "hashtable",
        "clone": clone,
        "class": "HashTable",
        "methods": ["bool insert"],
        "repos_dir": root,
        "fetch": { "min_pushed": "2025-02-01" }
    }))
    .expect("config parses")
}

fn at(date: &str) -> DateTime<Utc> {
    format!("{date}T12:00:00Z").parse().expect("valid timestamp")
}

fn repo(name: &str, created: &str, pushed: &str) -> RemoteRepo {
    RemoteRepo {
        name:       name.to_string(),
        created_at: at(created),
        pushed_at:  at(pushed),
    }
}

#[test]
fn pattern_uses_the_dashed_milestone() {
    let cfg = config(Path::new("repos"), true);
    let pattern = repo_pattern(&cfg).expect("pattern compiles");

    assert_eq!(pattern.as_str(), "milestone-2-hashtable-*");
    assert!(pattern.matches("milestone-2-hashtable-ada"));
    assert!(!pattern.matches("milestone2-hashtable-ada"));
    assert!(!pattern.matches("milestone-2-linkedlist-ada"));
}

#[test]
fn selection_filters_by_name_and_dates() {
    let cfg = config(Path::new("repos"), true);
    let pattern = repo_pattern(&cfg).expect("pattern compiles");
    let repos = vec![
        repo("milestone-2-hashtable-ada", "2025-01-10", "2025-02-20"),
        repo("milestone-2-hashtable-old", "2024-01-10", "2025-02-20"),
        repo("milestone-2-hashtable-stale", "2025-01-10", "2025-01-31"),
        repo("milestone-3-hashtable-ada", "2025-01-10", "2025-02-20"),
    ];

    let all: Vec<&str> = select_repos(&repos, &pattern, None, None)
        .into_iter()
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(all.len(), 3);

    let recent: Vec<&str> = select_repos(
        &repos,
        &pattern,
        NaiveDate::from_ymd_opt(2025, 1, 1),
        NaiveDate::from_ymd_opt(2025, 2, 1),
    )
    .into_iter()
    .map(|r| r.name.as_str())
    .collect();
    assert_eq!(recent, vec!["milestone-2-hashtable-ada"]);
}

/// Records clone commands and fails the ones for `-broken` repositories.
#[derive(Default)]
struct CloneRecorder {
    commands: Mutex<Vec<String>>,
}

impl ProcessRunner for CloneRecorder {
    async fn run(&self, command: &str, _cwd: Option<&Path>) -> anyhow::Result<CommandOutput> {
        self.commands
            .lock()
            .expect("lock is not poisoned")
            .push(command.to_string());
        Ok(CommandOutput {
            exit_code: if command.contains("-broken") { 128 } else { 0 },
            ..Default::default()
        })
    }
}

/// Serves one canned repository listing and returns its base URL.
async fn serve_listing(body: String) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.expect("read request");
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.expect("write response");
        let _ = socket.shutdown().await;
    });
    format!("http://{addr}")
}

fn listing() -> String {
    json!([
        { "name": "milestone-2-hashtable-ada", "created_at": "2025-01-10T12:00:00Z", "pushed_at": "2025-02-20T12:00:00Z" },
        { "name": "milestone-2-hashtable-broken", "created_at": "2025-01-10T12:00:00Z", "pushed_at": "2025-02-21T12:00:00Z" },
        { "name": "milestone-2-hashtable-stale", "created_at": "2025-01-10T12:00:00Z", "pushed_at": "2025-01-02T12:00:00Z" },
        { "name": "unrelated", "created_at": "2025-01-10T12:00:00Z", "pushed_at": "2025-02-20T12:00:00Z" }
    ])
    .to_string()
}

#[tokio::test]
async fn fetch_clones_selected_repositories() {
    let root = std::env::temp_dir().join(format!("gradecheck-fetch-{}", Uuid::new_v4()));
    let cfg = config(&root, true);
    let runner = CloneRecorder::default();
    let api = serve_listing(listing()).await;

    let summary = Fetcher::new(&cfg, GithubEnv::new("grader", "secret"), &runner)
        .expect("client builds")
        .with_api_base(api)
        .fetch()
        .await
        .expect("fetch succeeds");

    assert_eq!(
        summary.selected,
        vec!["milestone-2-hashtable-ada", "milestone-2-hashtable-broken"]
    );
    assert_eq!(summary.cloned, vec!["milestone-2-hashtable-ada"]);
    assert_eq!(summary.failed, vec!["milestone-2-hashtable-broken"]);
    assert!(cfg.submissions_dir().is_dir());

    let commands = runner.commands.lock().expect("lock is not poisoned");
    assert_eq!(
        commands[0],
        "git clone git@github.com:some-org/milestone-2-hashtable-ada.git"
    );

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn listing_only_mode_does_not_clone() {
    let root = std::env::temp_dir().join(format!("gradecheck-fetch-{}", Uuid::new_v4()));
    let cfg = config(&root, false);
    let runner = CloneRecorder::default();
    let api = serve_listing(listing()).await;

    let summary = Fetcher::new(&cfg, GithubEnv::new("grader", "secret"), &runner)
        .expect("client builds")
        .with_api_base(api)
        .fetch()
        .await
        .expect("fetch succeeds");

    assert_eq!(summary.selected.len(), 2);
    assert!(summary.cloned.is_empty());
    assert!(runner.commands.lock().expect("lock is not poisoned").is_empty());

    let _ = fs::remove_dir_all(root);
}

#[test]
fn token_is_not_printed() {
    let env = GithubEnv::new("grader", "ghp_secret");
    let shown = format!("{env:?}");
    assert!(shown.contains("grader"));
    assert!(!shown.contains("ghp_secret"));
}
