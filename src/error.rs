/// Failures reported by the GitHub API that deserve a tailored message.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(
        "GitHub API error: {status} {reason}\nURL: {url}\nGitHub may be experiencing an outage. Check https://www.githubstatus.com for details."
    )]
    ServerError {
        status: u16,
        reason: String,
        url: String,
    },
    #[error("GitHub rejected the credentials ({url}); check GITHUB_TOKEN")]
    Unauthorized { url: String },
    #[error("GraphQL errors: {}", .0.join("; "))]
    GraphQL(Vec<String>),
    #[error("organization '{0}' not found")]
    OrganizationNotFound(String),
    #[error("GraphQL response for {0} contained no data")]
    EmptyResponse(String),
}

impl ApiError {
    /// The tailored error for an HTTP status, if it has one.
    pub fn from_status(status: u16, reason: Option<&str>, url: &str) -> Option<Self> {
        match status {
            500..=599 => Some(Self::ServerError {
                status,
                reason: reason.unwrap_or_default().to_string(),
                url: url.to_string(),
            }),
            401 => Some(Self::Unauthorized {
                url: url.to_string(),
            }),
            _ => None,
        }
    }
}
