//! Minimal AT Protocol client for posting report threads to Bluesky.
//!
//! Only the two XRPC calls the bot needs: `createSession` for an
//! app-password login and `createRecord` for `app.bsky.feed.post` records.
//! Sessions are created fresh for each reporting cycle and passed to the
//! posting call explicitly; nothing here is process-global.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::{expect_success, PostError, USER_AGENT};

pub const DEFAULT_SERVICE: &str = "https://bsky.social";

pub struct BlueskyClient {
    http: reqwest::Client,
    service: String,
    identifier: String,
    password: String,
}

/// An authenticated session, scoped to one reporting cycle.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub did: String,
    pub access_jwt: String,
}

/// A strong reference to a posted record, used to chain thread replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordRef {
    pub uri: String,
    pub cid: String,
}

impl BlueskyClient {
    pub fn new(
        service: impl Into<String>,
        identifier: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, PostError> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            service: service.into(),
            identifier: identifier.into(),
            password: password.into(),
        })
    }

    /// Log in with the configured app password.
    pub async fn create_session(&self) -> Result<Session, PostError> {
        let response = self
            .http
            .post(format!(
                "{}/xrpc/com.atproto.server.createSession",
                self.service
            ))
            .json(&json!({
                "identifier": self.identifier,
                "password": self.password,
            }))
            .send()
            .await?;
        let session: Session = expect_success("bluesky", response).await?.json().await?;
        info!(did = %session.did, "Created Bluesky session");
        Ok(session)
    }

    /// Post messages as one thread: the first message is the root, each
    /// following message replies to the previous one with the root pinned.
    pub async fn post_thread(
        &self,
        session: &Session,
        messages: &[String],
    ) -> Result<Vec<RecordRef>, PostError> {
        let mut refs: Vec<RecordRef> = Vec::with_capacity(messages.len());
        for text in messages {
            let reply = refs.first().zip(refs.last());
            let record = post_record(text, reply, &Utc::now().to_rfc3339());
            let response = self
                .http
                .post(format!("{}/xrpc/com.atproto.repo.createRecord", self.service))
                .bearer_auth(&session.access_jwt)
                .json(&json!({
                    "repo": session.did,
                    "collection": "app.bsky.feed.post",
                    "record": record,
                }))
                .send()
                .await?;
            let posted: RecordRef = expect_success("bluesky", response).await?.json().await?;
            refs.push(posted);
        }
        info!(posts = refs.len(), "Posted Bluesky thread");
        Ok(refs)
    }
}

/// Build one `app.bsky.feed.post` record body.
fn post_record(text: &str, reply: Option<(&RecordRef, &RecordRef)>, created_at: &str) -> Value {
    let mut record = json!({
        "$type": "app.bsky.feed.post",
        "text": text,
        "createdAt": created_at,
    });
    if let Some((root, parent)) = reply {
        record["reply"] = json!({ "root": root, "parent": parent });
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_ref(n: u32) -> RecordRef {
        RecordRef {
            uri: format!("at://did:plc:abc/app.bsky.feed.post/{n}"),
            cid: format!("bafy{n}"),
        }
    }

    #[test]
    fn root_post_carries_no_reply() {
        let record = post_record("hello", None, "2026-01-12T14:00:00Z");
        assert_eq!(record["$type"], "app.bsky.feed.post");
        assert_eq!(record["text"], "hello");
        assert_eq!(record["createdAt"], "2026-01-12T14:00:00Z");
        assert!(record.get("reply").is_none());
    }

    #[test]
    fn replies_pin_the_thread_root() {
        let root = record_ref(1);
        let parent = record_ref(2);
        let record = post_record("third", Some((&root, &parent)), "2026-01-12T14:00:00Z");
        assert_eq!(record["reply"]["root"]["uri"], root.uri);
        assert_eq!(record["reply"]["parent"]["cid"], parent.cid);
    }

    #[test]
    fn session_parses_xrpc_response() {
        let session: Session = serde_json::from_str(
            r#"{"did":"did:plc:abc","accessJwt":"jwt-token","refreshJwt":"r","handle":"bot.example"}"#,
        )
        .unwrap();
        assert_eq!(session.did, "did:plc:abc");
        assert_eq!(session.access_jwt, "jwt-token");
    }
}
