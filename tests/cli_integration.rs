use std::{cell::RefCell, future::Future, io::Write, path::Path};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use prqueue::{
    ApiError, CiState, Command, Forge, Label, OutputFormat, PullRequest, PullRequestSummary,
    QueueProgress, QueueSpec, Repo, Review, ReviewQueue, StatsSpec, build_review_queue,
    fetch_pull_request_history, parse_args_with_default_config,
};

const VIEWER: &str = "alice";
const NO_DEFAULT_CONFIG: &str = "/nonexistent/prqueue/settings.json";

/// Mock GitHub hub for testing
pub struct MockHub {
    pub viewer: String,
    pub open_prs: Vec<PullRequest>,
    pub history: Vec<PullRequestSummary>,
}

impl MockHub {
    pub fn new(open_prs: Vec<PullRequest>) -> Self {
        Self {
            viewer: VIEWER.to_string(),
            open_prs,
            history: vec![],
        }
    }
}

#[async_trait]
impl Forge for MockHub {
    async fn viewer_login(&self) -> Result<String> {
        Ok(self.viewer.clone())
    }

    async fn fetch_open_pull_requests(&self, _org: &str) -> Result<Vec<PullRequest>> {
        Ok(self.open_prs.clone())
    }

    async fn fetch_all_pull_requests(&self, _repo: &Repo) -> Result<Vec<PullRequestSummary>> {
        Ok(self.history.clone())
    }
}

/// Forge whose every call fails the way GitHub does during an outage.
pub struct OutageHub;

#[async_trait]
impl Forge for OutageHub {
    async fn viewer_login(&self) -> Result<String> {
        Err(outage().into())
    }

    async fn fetch_open_pull_requests(&self, _org: &str) -> Result<Vec<PullRequest>> {
        Err(outage().into())
    }

    async fn fetch_all_pull_requests(&self, _repo: &Repo) -> Result<Vec<PullRequestSummary>> {
        Err(outage().into())
    }
}

/// Progress observer that records every step and status line.
#[derive(Default)]
pub struct RecordingProgress {
    pub lines: RefCell<Vec<String>>,
}

impl QueueProgress for RecordingProgress {
    fn step<T, Fut>(&self, message: String, work: Fut) -> impl Future<Output = T>
    where
        Fut: Future<Output = T>,
    {
        self.lines.borrow_mut().push(format!("step: {message}"));
        work
    }

    fn status(&self, message: String) {
        self.lines.borrow_mut().push(format!("status: {message}"));
    }
}

fn outage() -> ApiError {
    ApiError::ServerError {
        status: 503,
        reason: "Service Unavailable".to_string(),
        url: "https://api.github.com/graphql".to_string(),
    }
}

fn parse(raw_args: Vec<&str>) -> Result<Command> {
    parse_args_with_default_config(raw_args, Path::new(NO_DEFAULT_CONFIG))
}

fn parse_queue(raw_args: Vec<&str>) -> Result<QueueSpec> {
    match parse(raw_args)? {
        Command::Queue(spec) => Ok(spec),
        other => anyhow::bail!("expected queue command, got {other:?}"),
    }
}

fn write_settings(json: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, d, 9, 30, 0).unwrap()
}

fn queue_spec(ignore: &[&str]) -> QueueSpec {
    QueueSpec {
        org: "OneBusAway".to_string(),
        output: OutputFormat::Table,
        ignore: ignore.iter().map(|s| s.to_string()).collect(),
        open_browser: false,
    }
}

/// Helper to create mock GitHub data for testing
/// Covers every attention rule plus PRs that need nothing from the viewer.
fn create_mock_github_data() -> Vec<PullRequest> {
    let base = |repo: &str, number: u64, created: u32| PullRequest {
        repo: repo.to_string(),
        number,
        title: format!("Change #{number}"),
        url: format!("https://github.com/OneBusAway/{repo}/pull/{number}"),
        created_at: day(created),
        is_draft: false,
        author: "bob".to_string(),
        labels: vec![],
        comment_count: 0,
        review_count: 1,
        requested_reviewers: vec![],
        reviews: vec![Review {
            author: "carol".to_string(),
            created_at: day(created + 1),
        }],
        last_commit_date: Some(day(created)),
        ci_state: Some(CiState::Success),
    };

    vec![
        // PR 101: reviewed by carol only - nothing for alice
        base("maglev", 101, 1),
        // PR 102: alice is a requested reviewer
        PullRequest {
            requested_reviewers: vec!["dave".to_string(), VIEWER.to_string()],
            ..base("maglev", 102, 8)
        },
        // PR 103: nobody reviewed yet
        PullRequest {
            review_count: 0,
            reviews: vec![],
            labels: vec![Label {
                name: "good first issue".to_string(),
                color: "7057ff".to_string(),
            }],
            ..base("onebusaway-ios", 103, 3)
        },
        // PR 104: alice reviewed, then new commits were pushed
        PullRequest {
            review_count: 2,
            reviews: vec![
                Review {
                    author: VIEWER.to_string(),
                    created_at: day(6),
                },
                Review {
                    author: "carol".to_string(),
                    created_at: day(7),
                },
            ],
            last_commit_date: Some(day(9)),
            ci_state: Some(CiState::Failure),
            ..base("onebusaway-android", 104, 5)
        },
        // PR 105: alice reviewed after the last commit - nothing new
        PullRequest {
            reviews: vec![Review {
                author: VIEWER.to_string(),
                created_at: day(12),
            }],
            last_commit_date: Some(day(11)),
            ..base("onebusaway-android", 105, 2)
        },
        // PR 106: unreviewed, but in a repo that is usually ignored
        PullRequest {
            review_count: 0,
            reviews: vec![],
            ..base("sandbox", 106, 4)
        },
    ]
}

fn numbers(queue: &ReviewQueue) -> Vec<u64> {
    queue.entries.iter().map(|e| e.pr.number).collect()
}

#[test]
fn test_cli_queue_org_only() {
    let spec = parse_queue(vec!["prqueue", "queue", "OneBusAway"]).unwrap();
    assert_eq!(spec.org, "OneBusAway");
    assert_eq!(spec.output, OutputFormat::Table);
    assert!(spec.ignore.is_empty());
    assert!(spec.open_browser);
}

#[test]
fn test_cli_queue_all_flags() {
    let spec = parse_queue(vec![
        "prqueue",
        "queue",
        "OneBusAway",
        "--output",
        "html",
        "--ignore",
        "sandbox, docs",
        "--no-open",
    ])
    .unwrap();
    assert_eq!(spec.output, OutputFormat::Html);
    assert!(spec.ignore.contains("sandbox"));
    assert!(spec.ignore.contains("docs"));
    assert_eq!(spec.ignore.len(), 2);
    assert!(!spec.open_browser);
}

#[test]
fn test_cli_queue_without_args_needs_default_config() {
    let err = parse(vec!["prqueue", "queue"]).unwrap_err();
    assert!(
        err.to_string()
            .contains("No arguments given and /nonexistent/prqueue/settings.json not found")
    );
}

#[test]
fn test_cli_queue_uses_default_config_when_present() {
    let settings = write_settings(r#"{"org": "OneBusAway", "ignore": ["sandbox"]}"#);
    let command =
        parse_args_with_default_config(vec!["prqueue", "queue"], settings.path()).unwrap();
    let Command::Queue(spec) = command else {
        panic!("expected queue command");
    };
    assert_eq!(spec.org, "OneBusAway");
    assert!(spec.ignore.contains("sandbox"));
}

#[test]
fn test_cli_config_file_supplies_defaults() {
    let settings = write_settings(
        r#"{"org": "OneBusAway", "output": "html", "ignore": ["sandbox", "website"], "open": false}"#,
    );
    let path = settings.path().to_str().unwrap();

    let spec = parse_queue(vec!["prqueue", "queue", "--config", path]).unwrap();
    assert_eq!(spec.org, "OneBusAway");
    assert_eq!(spec.output, OutputFormat::Html);
    assert_eq!(spec.ignore.len(), 2);
    assert!(!spec.open_browser);
}

#[test]
fn test_cli_args_override_config_file() {
    let settings = write_settings(
        r#"{"org": "OneBusAway", "output": "html", "ignore": ["sandbox", "website"]}"#,
    );
    let path = settings.path().to_str().unwrap();

    let spec = parse_queue(vec![
        "prqueue", "queue", "Other", "--config", path, "--output", "table", "--ignore", "docs",
    ])
    .unwrap();
    assert_eq!(spec.org, "Other");
    assert_eq!(spec.output, OutputFormat::Table);
    // --ignore replaces the configured list rather than extending it.
    assert_eq!(spec.ignore.len(), 1);
    assert!(spec.ignore.contains("docs"));
    assert!(spec.open_browser);
}

#[test]
fn test_cli_empty_ignore_keeps_config_list() {
    let settings = write_settings(r#"{"org": "OneBusAway", "ignore": ["sandbox", "website"]}"#);
    let path = settings.path().to_str().unwrap();

    for empty in ["", " , "] {
        let spec =
            parse_queue(vec!["prqueue", "queue", "--config", path, "--ignore", empty]).unwrap();
        assert_eq!(spec.ignore.len(), 2, "--ignore {empty:?} dropped the settings list");
        assert!(spec.ignore.contains("sandbox"));
        assert!(spec.ignore.contains("website"));
    }
}

#[test]
fn test_cli_config_without_org_fails() {
    let settings = write_settings(r#"{"output": "html"}"#);
    let path = settings.path().to_str().unwrap();

    let err = parse(vec!["prqueue", "queue", "--config", path]).unwrap_err();
    assert_eq!(err.to_string(), "org is required (via argument or --config)");
}

#[test]
fn test_cli_rejects_unknown_output_format() {
    let err = parse(vec!["prqueue", "queue", "OneBusAway", "--output", "pdf"]).unwrap_err();
    assert!(err.downcast_ref::<clap::Error>().is_some());
}

#[test]
fn test_cli_help_is_a_clap_error() {
    let err = parse(vec!["prqueue", "--help"]).unwrap_err();
    let clap_err = err.downcast_ref::<clap::Error>().unwrap();
    assert_eq!(clap_err.kind(), clap::error::ErrorKind::DisplayHelp);
}

#[test]
fn test_cli_stats() {
    let command = parse(vec!["prqueue", "stats", "onebusaway/maglev", "-o", "prs.csv"]).unwrap();
    let Command::Stats(spec) = command else {
        panic!("expected stats command");
    };
    assert_eq!(spec.repo, Repo::new("onebusaway", "maglev").unwrap());
    assert_eq!(spec.output.as_deref(), Some(Path::new("prs.csv")));
}

#[test]
fn test_cli_stats_malformed_repo() {
    for bad in ["maglev", "onebusaway/maglev/extra", "/maglev", "onebusaway/"] {
        let result = parse(vec!["prqueue", "stats", bad]);
        assert!(result.is_err(), "expected '{bad}' to be rejected");
    }
}

#[tokio::test]
async fn test_queue_orders_attention_first() {
    let provider = MockHub::new(create_mock_github_data());

    let queue = build_review_queue(&queue_spec(&[]), &provider, &()).await.unwrap();

    assert_eq!(queue.viewer, VIEWER);
    // Attention (oldest first): 103 (day 3), 106 (day 4), 104 (day 5), 102 (day 8)
    // Then the rest (oldest first): 101 (day 1), 105 (day 2)
    assert_eq!(numbers(&queue), vec![103, 106, 104, 102, 101, 105]);
    assert_eq!(queue.needs_attention_count(), 4);
}

#[tokio::test]
async fn test_queue_reports_each_step() {
    let provider = MockHub::new(create_mock_github_data());
    let progress = RecordingProgress::default();

    let queue = build_review_queue(&queue_spec(&["sandbox"]), &provider, &progress)
        .await
        .unwrap();
    assert_eq!(queue.len(), 5);

    assert_eq!(
        progress.lines.into_inner(),
        vec![
            "step: Fetching open PRs for OneBusAway…",
            "status: Found 5 open PRs",
            "step: Identifying reviewer…",
            "status: Logged in as alice",
            "step: Sorting by review priority…",
            "status: 3 PRs need your attention",
        ]
    );
}

#[tokio::test]
async fn test_queue_reports_single_pr_in_singular() {
    let single: Vec<PullRequest> = create_mock_github_data()
        .into_iter()
        .filter(|pr| pr.number == 103)
        .collect();
    let provider = MockHub::new(single);
    let progress = RecordingProgress::default();

    build_review_queue(&queue_spec(&[]), &provider, &progress)
        .await
        .unwrap();

    let lines = progress.lines.into_inner();
    assert!(lines.contains(&"status: Found 1 open PR".to_string()));
    assert!(lines.contains(&"status: 1 PR needs your attention".to_string()));
}

#[tokio::test]
async fn test_queue_outage_stops_before_identifying_viewer() {
    let progress = RecordingProgress::default();

    let result = build_review_queue(&queue_spec(&[]), &OutageHub, &progress).await;
    assert!(result.is_err());
    assert_eq!(
        progress.lines.into_inner(),
        vec!["step: Fetching open PRs for OneBusAway…"]
    );
}

#[tokio::test]
async fn test_queue_ignores_repositories() {
    let provider = MockHub::new(create_mock_github_data());

    let queue = build_review_queue(&queue_spec(&["sandbox", "maglev"]), &provider, &())
        .await
        .unwrap();

    let prs = numbers(&queue);
    assert_eq!(prs, vec![103, 104, 105]);
    assert!(queue.entries.iter().all(|e| e.pr.repo != "sandbox"));
}

#[tokio::test]
async fn test_queue_ignore_is_exact_match() {
    let provider = MockHub::new(create_mock_github_data());

    let queue = build_review_queue(&queue_spec(&["onebusaway"]), &provider, &())
        .await
        .unwrap();
    assert_eq!(queue.len(), 6);
}

#[tokio::test]
async fn test_queue_depends_on_viewer() {
    let mut provider = MockHub::new(create_mock_github_data());
    provider.viewer = "dave".to_string();

    let queue = build_review_queue(&queue_spec(&[]), &provider, &()).await.unwrap();

    // dave is requested on 102; 103 and 106 are unreviewed. 104's new
    // commits only matter to alice.
    let flagged: Vec<u64> = queue
        .entries
        .iter()
        .filter(|e| e.needs_attention)
        .map(|e| e.pr.number)
        .collect();
    assert_eq!(flagged, vec![103, 106, 102]);
}

#[tokio::test]
async fn test_queue_empty_org() {
    let provider = MockHub::new(vec![]);
    let queue = build_review_queue(&queue_spec(&[]), &provider, &()).await.unwrap();
    assert!(queue.is_empty());
    assert_eq!(queue.needs_attention_count(), 0);
}

#[tokio::test]
async fn test_queue_outage_surfaces_api_error() {
    let err = build_review_queue(&queue_spec(&[]), &OutageHub, &())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("OneBusAway"));
    let api_err = err.downcast_ref::<ApiError>().unwrap();
    assert!(matches!(api_err, ApiError::ServerError { status: 503, .. }));
    assert!(format!("{err:#}").contains("githubstatus.com"));
}

#[tokio::test]
async fn test_stats_history() {
    let mut provider = MockHub::new(vec![]);
    provider.history = vec![
        PullRequestSummary {
            number: 1,
            title: "Initial import".to_string(),
            author: "alice".to_string(),
            created_at: Some(day(1)),
            closed_at: Some(day(2)),
        },
        PullRequestSummary {
            number: 2,
            title: "Open work".to_string(),
            author: "bob".to_string(),
            created_at: Some(day(3)),
            closed_at: None,
        },
    ];
    let spec = StatsSpec {
        repo: Repo::parse("onebusaway/maglev").unwrap(),
        output: None,
    };

    let prs = fetch_pull_request_history(&spec, &provider).await.unwrap();
    assert_eq!(prs.len(), 2);
    assert!(prs[1].closed_at.is_none());
}

#[tokio::test]
async fn test_stats_outage() {
    let spec = StatsSpec {
        repo: Repo::parse("onebusaway/maglev").unwrap(),
        output: None,
    };
    let err = fetch_pull_request_history(&spec, &OutageHub)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("onebusaway/maglev"));
    assert!(err.downcast_ref::<ApiError>().is_some());
}
