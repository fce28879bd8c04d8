//! prqueue: review queue for a GitHub organization's open pull requests.
//!
//! Fetches every open pull request across an organization through the
//! GitHub GraphQL API, classifies each one by whether it needs the
//! authenticated user's review, and orders them so those come first. Also
//! exports the complete pull request history of a single repository.

pub mod attention;
pub mod cli;
pub mod config;
pub mod error;
pub mod github;
pub mod graphql;
pub mod query;
pub mod types;

pub use attention::{classify, needs_attention};
pub use cli::{parse_args, parse_args_with_default_config};
pub use error::ApiError;
pub use github::GitHub;
pub use query::{
    QueueProgress, build_review_queue, fetch_pull_request_history, fetch_review_candidates,
    identify_viewer, plural,
};
pub use types::{
    CiState, Command, Forge, GHOST_LOGIN, Label, OutputFormat, PullRequest, PullRequestSummary,
    QueueEntry, QueueSpec, Repo, RepoError, Review, ReviewQueue, StatsSpec,
};
