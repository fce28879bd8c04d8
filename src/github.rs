use std::process::Command;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;

use crate::{
    error::ApiError,
    graphql::{
        GraphQLResponse, OrganizationData, PageInfo, ViewerData, convert_repositories,
        open_pull_requests_payload, viewer_payload,
    },
    types::{Forge, GHOST_LOGIN, PullRequest, PullRequestSummary, Repo},
};

pub const GITHUB_API_URL: &str = "https://api.github.com";
pub const GITHUB_GRAPHQL_URL: &str = "https://api.github.com/graphql";

const PULLS_PER_PAGE: usize = 100;

pub fn get_github_token() -> Result<String> {
    // Prefer environment variables over gh CLI to avoid subprocess overhead.
    for var in ["GITHUB_TOKEN", "GH_TOKEN"] {
        if let Ok(token) = std::env::var(var)
            && !token.trim().is_empty()
        {
            return Ok(token.trim().to_string());
        }
    }

    let output = Command::new("gh")
        .args(["auth", "token"])
        .output()
        .context("GITHUB_TOKEN environment variable is required (gh CLI not available)")?;

    if !output.status.success() {
        anyhow::bail!(
            "GITHUB_TOKEN environment variable is required (or run 'gh auth login' first)"
        );
    }

    let token = String::from_utf8(output.stdout)?.trim().to_string();
    if token.is_empty() {
        anyhow::bail!("Empty token returned from gh CLI; set GITHUB_TOKEN instead");
    }

    Ok(token)
}

/// A request against the GitHub API.
enum Request<'a> {
    /// REST `GET` of a route relative to the API root.
    Get(String),
    /// GraphQL query payload.
    GraphQL(&'a serde_json::Value),
}

/// Pull request as listed by the REST `pulls` endpoint.
#[derive(Debug, Deserialize)]
struct RestPullRequest {
    number: u64,
    title: Option<String>,
    user: Option<RestUser>,
    created_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RestUser {
    login: String,
}

impl From<RestPullRequest> for PullRequestSummary {
    fn from(pr: RestPullRequest) -> Self {
        Self {
            number: pr.number,
            title: pr.title.unwrap_or_default(),
            author: pr
                .user
                .map(|user| user.login)
                .unwrap_or_else(|| GHOST_LOGIN.to_string()),
            created_at: pr.created_at,
            closed_at: pr.closed_at,
        }
    }
}

/// [`Forge`] backed by the live GitHub API.
pub struct GitHub {
    octocrab: Octocrab,
}

impl GitHub {
    pub fn new(octocrab: Octocrab) -> Self {
        Self { octocrab }
    }

    /// Creates a client authenticated with the token found by
    /// [`get_github_token`].
    pub fn from_env() -> Result<Self> {
        let token = get_github_token().context("Failed to obtain GitHub authentication token")?;
        let octocrab = Octocrab::builder()
            .personal_token(token)
            .build()
            .context("Failed to create GitHub client")?;
        Ok(Self::new(octocrab))
    }

    /// Sends `request` and decodes its JSON body.
    ///
    /// The status is checked before the body is read: outage pages from
    /// GitHub's front end are HTML, not JSON.
    async fn request_json<R: DeserializeOwned>(&self, request: Request<'_>, url: &str) -> Result<R> {
        let response = match request {
            Request::Get(route) => self.octocrab._get(route).await,
            Request::GraphQL(payload) => self.octocrab._post("/graphql", Some(payload)).await,
        }
        .with_context(|| format!("GitHub API request to {url} failed"))?;

        let status = response.status();
        if let Some(err) = ApiError::from_status(status.as_u16(), status.canonical_reason(), url) {
            return Err(err.into());
        }
        if !status.is_success() {
            anyhow::bail!("GitHub API request to {url} failed: {status}");
        }

        let body = self
            .octocrab
            .body_to_string(response)
            .await
            .with_context(|| format!("Failed to read response from {url}"))?;
        serde_json::from_str(&body).with_context(|| format!("Malformed response from {url}"))
    }
}

#[async_trait]
impl Forge for GitHub {
    async fn viewer_login(&self) -> Result<String> {
        let payload = viewer_payload();
        let response: GraphQLResponse<ViewerData> = self
            .request_json(Request::GraphQL(&payload), GITHUB_GRAPHQL_URL)
            .await?;

        Ok(response.into_data("viewer")?.viewer.login)
    }

    async fn fetch_open_pull_requests(&self, org: &str) -> Result<Vec<PullRequest>> {
        let mut all_prs = Vec::new();
        let mut cursor: Option<String> = None;
        let mut page = 0usize;

        loop {
            page += 1;
            let payload = open_pull_requests_payload(org, cursor.as_deref());
            let response: GraphQLResponse<OrganizationData> = self
                .request_json(Request::GraphQL(&payload), GITHUB_GRAPHQL_URL)
                .await?;

            let repositories = response
                .into_data("organization")?
                .organization
                .ok_or_else(|| ApiError::OrganizationNotFound(org.to_string()))?
                .repositories;

            let before = all_prs.len();
            let repo_count = repositories.nodes.len();
            all_prs.extend(convert_repositories(repositories.nodes));
            debug!(
                org,
                page,
                repositories = repo_count,
                pull_requests = all_prs.len() - before,
                "Fetched repository page"
            );

            let PageInfo {
                has_next_page,
                end_cursor,
            } = repositories.page_info;
            match (has_next_page, end_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        Ok(all_prs)
    }

    async fn fetch_all_pull_requests(&self, repo: &Repo) -> Result<Vec<PullRequestSummary>> {
        let route = format!("/repos/{}/{}/pulls", repo.owner(), repo.name());
        let url = format!("{GITHUB_API_URL}{route}");
        let mut all_prs = Vec::new();
        let mut page: u32 = 1;

        loop {
            let results: Vec<RestPullRequest> = self
                .request_json(
                    Request::Get(format!(
                        "{route}?state=all&per_page={PULLS_PER_PAGE}&page={page}"
                    )),
                    &url,
                )
                .await?;

            let count = results.len();
            debug!(%repo, page, pull_requests = count, "Fetched pull request page");
            all_prs.extend(results.into_iter().map(PullRequestSummary::from));

            if count < PULLS_PER_PAGE {
                break;
            }
            page += 1;
        }

        Ok(all_prs)
    }
}
