//! Clients for the external services the bot talks to: the shuttle
//! telemetry feed it reads from, and the social platforms it posts to.

pub mod bluesky;
pub mod instagram;
pub mod shuttles;

use thiserror::Error;

/// HTTP User-Agent sent on every outbound request.
pub const USER_AGENT: &str = concat!("shuttle-watch/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum PostError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{platform} API error: HTTP {status}: {body}")]
    Api {
        platform: &'static str,
        status: u16,
        body: String,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Pass a successful response through; turn anything else into an API error
/// carrying whatever body the service returned.
pub(crate) async fn expect_success(
    platform: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, PostError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PostError::Api {
        platform,
        status: status.as_u16(),
        body,
    })
}
