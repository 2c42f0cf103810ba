//! Instagram Graph API publisher.
//!
//! Publishing is two calls: create a media container pointing at a publicly
//! reachable image URL, then publish the container. The image itself is
//! pre-rendered and hosted elsewhere; this bot only selects which template
//! URL to send.

use serde::Deserialize;
use tracing::{debug, info};

use super::{expect_success, PostError, USER_AGENT};

pub const DEFAULT_API_BASE: &str = "https://graph.instagram.com/v22.0";

pub struct InstagramClient {
    http: reqwest::Client,
    api_base: String,
    account_id: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct MediaResponse {
    id: String,
}

impl InstagramClient {
    pub fn new(
        account_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self, PostError> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            api_base: DEFAULT_API_BASE.to_string(),
            account_id: account_id.into(),
            access_token: access_token.into(),
        })
    }

    /// Publish a status image with a caption. Returns the published media id.
    pub async fn publish_photo(
        &self,
        image_url: &str,
        caption: &str,
    ) -> Result<String, PostError> {
        let response = self
            .http
            .post(format!("{}/{}/media", self.api_base, self.account_id))
            .form(&[
                ("caption", caption),
                ("access_token", self.access_token.as_str()),
                ("media_type", "IMAGE"),
                ("image_url", image_url),
            ])
            .send()
            .await?;
        let container: MediaResponse = expect_success("instagram", response).await?.json().await?;
        debug!(container_id = %container.id, "Created Instagram media container");

        let response = self
            .http
            .post(format!("{}/{}/media_publish", self.api_base, self.account_id))
            .form(&[
                ("creation_id", container.id.as_str()),
                ("access_token", self.access_token.as_str()),
            ])
            .send()
            .await?;
        let published: MediaResponse = expect_success("instagram", response).await?.json().await?;
        info!(media_id = %published.id, "Published Instagram post");
        Ok(published.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_response_parses_container_id() {
        let media: MediaResponse = serde_json::from_str(r#"{"id":"17900001234"}"#).unwrap();
        assert_eq!(media.id, "17900001234");
    }
}
