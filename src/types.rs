use std::{collections::BTreeSet, fmt, path::PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Login used for pull requests and reviews whose author account was deleted.
pub const GHOST_LOGIN: &str = "ghost";

/// Rolled-up CI state of a pull request's head commit.
///
/// Mirrors GitHub's `StatusState` GraphQL enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CiState {
    Success,
    Failure,
    Error,
    Pending,
    Expected,
    #[serde(other)]
    Unknown,
}

impl CiState {
    pub fn is_failing(&self) -> bool {
        matches!(self, CiState::Failure | CiState::Error)
    }
}

impl fmt::Display for CiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CiState::Success => "Success",
            CiState::Failure => "Failure",
            CiState::Error => "Error",
            CiState::Pending => "Pending",
            CiState::Expected => "Expected",
            CiState::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    /// Six hex digits without the leading `#`, as GitHub reports it.
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    pub author: String,
    pub created_at: DateTime<Utc>,
}

/// An open pull request together with the review and CI state needed to
/// decide whether it needs the viewer's attention.
#[derive(Debug, Clone)]
pub struct PullRequest {
    /// Repository name within the organization.
    pub repo: String,
    pub number: u64,
    pub title: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub is_draft: bool,
    pub author: String,
    pub labels: Vec<Label>,
    pub comment_count: u64,
    /// Total number of reviews, not just the ones in `reviews`.
    pub review_count: u64,
    /// Users with a pending review request. Team requests are not included.
    pub requested_reviewers: Vec<String>,
    /// The most recent reviews (at most ten).
    pub reviews: Vec<Review>,
    pub last_commit_date: Option<DateTime<Utc>>,
    pub ci_state: Option<CiState>,
}

impl PullRequest {
    pub fn is_review_requested_from(&self, login: &str) -> bool {
        self.requested_reviewers.iter().any(|r| r == login)
    }

    /// Timestamp of the most recent review written by `login`, if any.
    pub fn last_review_by(&self, login: &str) -> Option<DateTime<Utc>> {
        self.reviews
            .iter()
            .filter(|review| review.author == login)
            .map(|review| review.created_at)
            .max()
    }
}

/// A pull request paired with its classification.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub pr: PullRequest,
    pub needs_attention: bool,
}

/// Open pull requests ordered by review priority for a single viewer.
#[derive(Debug, Clone)]
pub struct ReviewQueue {
    pub viewer: String,
    pub entries: Vec<QueueEntry>,
}

impl ReviewQueue {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn needs_attention_count(&self) -> usize {
        self.entries.iter().filter(|e| e.needs_attention).count()
    }
}

/// Minimal view of a pull request (open or closed) used for history exports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestSummary {
    pub number: u64,
    pub title: String,
    pub author: String,
    pub created_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepoError {
    #[error("repo must be in owner/repo format (e.g. onebusaway/maglev), got '{0}'")]
    InvalidFormat(String),
    #[error("repository owner cannot be empty")]
    EmptyOwner,
    #[error("repository name cannot be empty")]
    EmptyName,
}

/// A GitHub repository identified by owner and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repo {
    owner: String,
    name: String,
}

impl Repo {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self, RepoError> {
        let owner = owner.into();
        let name = name.into();
        if owner.trim().is_empty() {
            return Err(RepoError::EmptyOwner);
        }
        if name.trim().is_empty() {
            return Err(RepoError::EmptyName);
        }
        Ok(Self { owner, name })
    }

    /// Parses `owner/repo`.
    pub fn parse(s: &str) -> Result<Self, RepoError> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        match parts.as_slice() {
            [owner, name] => Repo::new(*owner, *name),
            _ => Err(RepoError::InvalidFormat(s.to_string())),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Html,
}

/// Fully resolved parameters of the `queue` command.
#[derive(Debug, Clone)]
pub struct QueueSpec {
    pub org: String,
    pub output: OutputFormat,
    /// Repository names to leave out of the queue.
    pub ignore: BTreeSet<String>,
    pub open_browser: bool,
}

/// Fully resolved parameters of the `stats` command.
#[derive(Debug, Clone)]
pub struct StatsSpec {
    pub repo: Repo,
    /// Destination file; stdout when `None`.
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum Command {
    Queue(QueueSpec),
    Stats(StatsSpec),
}

/// Source of pull request data.
///
/// Implemented by [`crate::GitHub`] against the live API and by in-memory
/// fakes in tests.
#[async_trait]
pub trait Forge {
    /// Login of the user the credentials belong to.
    async fn viewer_login(&self) -> anyhow::Result<String>;

    /// Open pull requests across all non-fork, non-archived repositories
    /// of `org`.
    async fn fetch_open_pull_requests(&self, org: &str) -> anyhow::Result<Vec<PullRequest>>;

    /// Every pull request of `repo`, open and closed.
    async fn fetch_all_pull_requests(&self, repo: &Repo)
    -> anyhow::Result<Vec<PullRequestSummary>>;
}
