use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{
    error::ApiError,
    types::{CiState, GHOST_LOGIN, Label, PullRequest, Review},
};

pub const VIEWER_QUERY: &str = "{ viewer { login } }";

pub const OPEN_PULL_REQUESTS_QUERY: &str = r#"
query($org: String!, $cursor: String) {
  organization(login: $org) {
    repositories(first: 100, after: $cursor, isFork: false, isArchived: false, orderBy: {field: UPDATED_AT, direction: DESC}) {
      pageInfo {
        hasNextPage
        endCursor
      }
      nodes {
        name
        pullRequests(states: OPEN, first: 100, orderBy: {field: UPDATED_AT, direction: DESC}) {
          nodes {
            number
            title
            url
            createdAt
            isDraft
            author { login }
            labels(first: 10) { nodes { name color } }
            comments { totalCount }
            reviewRequests(first: 10) { nodes { requestedReviewer { ... on User { login } } } }
            reviews(last: 10) { totalCount nodes { author { login } createdAt } }
            commits(last: 1) {
              nodes {
                commit {
                  committedDate
                  statusCheckRollup { state }
                }
              }
            }
          }
        }
      }
    }
  }
}
"#;

pub fn viewer_payload() -> serde_json::Value {
    serde_json::json!({ "query": VIEWER_QUERY })
}

pub fn open_pull_requests_payload(org: &str, cursor: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "query": OPEN_PULL_REQUESTS_QUERY,
        "variables": {
            "org": org,
            "cursor": cursor,
        }
    })
}

/// Envelope of every GraphQL response. GitHub answers 200 even when the
/// query fails, reporting problems in `errors`.
#[derive(Debug, Deserialize)]
pub struct GraphQLResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQLError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLError {
    pub message: String,
}

impl<T> GraphQLResponse<T> {
    /// Returns the data, or the reported errors when there are any.
    pub fn into_data(self, what: &str) -> Result<T, ApiError> {
        if !self.errors.is_empty() {
            return Err(ApiError::GraphQL(
                self.errors.into_iter().map(|e| e.message).collect(),
            ));
        }
        self.data
            .ok_or_else(|| ApiError::EmptyResponse(what.to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct ViewerData {
    pub viewer: Viewer,
}

#[derive(Debug, Deserialize)]
pub struct Viewer {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct OrganizationData {
    pub organization: Option<Organization>,
}

#[derive(Debug, Deserialize)]
pub struct Organization {
    pub repositories: RepositoryConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryConnection {
    pub page_info: PageInfo,
    pub nodes: Vec<RepositoryNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryNode {
    pub name: String,
    pub pull_requests: Connection<PullRequestNode>,
}

#[derive(Debug, Deserialize)]
pub struct Connection<T> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountedConnection<T> {
    pub total_count: u64,
    #[serde(default = "Vec::new")]
    pub nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalCount {
    pub total_count: u64,
}

#[derive(Debug, Deserialize)]
pub struct Actor {
    pub login: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestNode {
    pub number: u64,
    pub title: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub is_draft: bool,
    pub author: Option<Actor>,
    pub labels: Option<Connection<LabelNode>>,
    pub comments: TotalCount,
    pub review_requests: Option<Connection<ReviewRequestNode>>,
    pub reviews: CountedConnection<ReviewNode>,
    pub commits: Connection<CommitNode>,
}

#[derive(Debug, Deserialize)]
pub struct LabelNode {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequestNode {
    pub requested_reviewer: Option<RequestedReviewer>,
}

/// Only `User` reviewers carry a login; teams and bots come back as `{}`.
#[derive(Debug, Deserialize)]
pub struct RequestedReviewer {
    pub login: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewNode {
    pub author: Option<Actor>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CommitNode {
    pub commit: Commit,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    pub committed_date: Option<DateTime<Utc>>,
    pub status_check_rollup: Option<StatusCheckRollup>,
}

#[derive(Debug, Deserialize)]
pub struct StatusCheckRollup {
    pub state: CiState,
}

fn login_or_ghost(actor: Option<Actor>) -> String {
    actor
        .map(|a| a.login)
        .unwrap_or_else(|| GHOST_LOGIN.to_string())
}

/// Converts a GraphQL pull request node of repository `repo` into a
/// [`PullRequest`].
pub fn convert_pull_request(repo: &str, node: PullRequestNode) -> PullRequest {
    let head = node.commits.nodes.into_iter().next().map(|c| c.commit);
    let (last_commit_date, ci_state) = match head {
        Some(commit) => (
            commit.committed_date,
            commit.status_check_rollup.map(|rollup| rollup.state),
        ),
        None => (None, None),
    };

    let requested_reviewers = node
        .review_requests
        .map(|conn| conn.nodes)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|request| request.requested_reviewer.and_then(|r| r.login))
        .collect();

    let labels = node
        .labels
        .map(|conn| conn.nodes)
        .unwrap_or_default()
        .into_iter()
        .map(|label| Label {
            name: label.name,
            color: label.color,
        })
        .collect();

    let reviews = node
        .reviews
        .nodes
        .into_iter()
        .map(|review| Review {
            author: login_or_ghost(review.author),
            created_at: review.created_at,
        })
        .collect();

    PullRequest {
        repo: repo.to_string(),
        number: node.number,
        title: node.title,
        url: node.url,
        created_at: node.created_at,
        is_draft: node.is_draft,
        author: login_or_ghost(node.author),
        labels,
        comment_count: node.comments.total_count,
        review_count: node.reviews.total_count,
        requested_reviewers,
        reviews,
        last_commit_date,
        ci_state,
    }
}

/// Flattens one page of repositories into pull requests.
pub fn convert_repositories(nodes: Vec<RepositoryNode>) -> Vec<PullRequest> {
    nodes
        .into_iter()
        .flat_map(|repo| {
            let name = repo.name;
            repo.pull_requests
                .nodes
                .into_iter()
                .map(move |node| convert_pull_request(&name, node))
        })
        .collect()
}
