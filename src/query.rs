use std::future::Future;

use anyhow::Context;
use tracing::debug;

use crate::{
    attention::classify,
    types::{Forge, PullRequest, PullRequestSummary, QueueSpec, ReviewQueue, StatsSpec},
};

/// Observer of the queue pipeline's steps.
///
/// The binary drives a spinner through it; `()` ignores everything.
pub trait QueueProgress {
    /// Runs one step of the pipeline, described by `message`.
    fn step<T, Fut>(&self, message: String, work: Fut) -> impl Future<Output = T>
    where
        Fut: Future<Output = T>;

    /// Reports the outcome of a finished step.
    fn status(&self, message: String);
}

impl QueueProgress for () {
    fn step<T, Fut>(&self, _message: String, work: Fut) -> impl Future<Output = T>
    where
        Fut: Future<Output = T>,
    {
        work
    }

    fn status(&self, _message: String) {}
}

/// `""` for one, `"s"` otherwise.
pub fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}

/// Fetches the open pull requests of the spec's organization, leaving out
/// repositories on the ignore list.
pub async fn fetch_review_candidates<F>(spec: &QueueSpec, forge: &F) -> anyhow::Result<Vec<PullRequest>>
where
    F: Forge + Sync,
{
    let all_prs = forge
        .fetch_open_pull_requests(&spec.org)
        .await
        .with_context(|| format!("Failed to fetch open pull requests for '{}'", spec.org))?;

    let fetched = all_prs.len();
    let candidates: Vec<PullRequest> = all_prs
        .into_iter()
        .filter(|pr| !spec.ignore.contains(&pr.repo))
        .collect();
    debug!(
        fetched,
        ignored = fetched - candidates.len(),
        "Applied repository ignore list"
    );

    Ok(candidates)
}

pub async fn identify_viewer<F>(forge: &F) -> anyhow::Result<String>
where
    F: Forge + Sync,
{
    forge
        .viewer_login()
        .await
        .context("Failed to identify the authenticated user")
}

/// Runs the whole queue pipeline: fetch, identify the viewer, classify.
pub async fn build_review_queue<F, P>(
    spec: &QueueSpec,
    forge: &F,
    progress: &P,
) -> anyhow::Result<ReviewQueue>
where
    F: Forge + Sync,
    P: QueueProgress,
{
    let candidates = progress
        .step(
            format!("Fetching open PRs for {}…", spec.org),
            fetch_review_candidates(spec, forge),
        )
        .await?;
    progress.status(format!(
        "Found {} open PR{}",
        candidates.len(),
        plural(candidates.len())
    ));

    let viewer = progress
        .step("Identifying reviewer…".to_string(), identify_viewer(forge))
        .await?;
    progress.status(format!("Logged in as {viewer}"));

    let queue = progress
        .step("Sorting by review priority…".to_string(), async {
            classify(candidates, &viewer)
        })
        .await;
    let needs = queue.needs_attention_count();
    progress.status(format!(
        "{needs} PR{} need{} your attention",
        plural(needs),
        if needs == 1 { "s" } else { "" }
    ));

    Ok(queue)
}

pub async fn fetch_pull_request_history<F>(
    spec: &StatsSpec,
    forge: &F,
) -> anyhow::Result<Vec<PullRequestSummary>>
where
    F: Forge + Sync,
{
    forge
        .fetch_all_pull_requests(&spec.repo)
        .await
        .with_context(|| format!("Failed to fetch pull requests for {}", spec.repo))
}
