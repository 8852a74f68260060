//! Reqwest-backed Matrix client-server API adapter.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::json;

use crate::MatrixClient;
use crate::error::MatrixError;

/// Thin client-server API adapter; one bot account, one access token.
#[derive(Debug)]
pub struct HttpMatrixClient {
    client: reqwest::Client,
    homeserver_url: String,
    access_token: String,
    txn_counter: AtomicU64,
}

impl HttpMatrixClient {
    pub fn new(homeserver_url: String, access_token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            homeserver_url: homeserver_url.trim_end_matches('/').to_owned(),
            access_token,
            txn_counter: AtomicU64::new(0),
        }
    }

    fn next_txn_id(&self) -> String {
        let counter = self.txn_counter.fetch_add(1, Ordering::Relaxed);
        format!("triage-{}-{counter}", uuid::Uuid::new_v4())
    }

    async fn put_json(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, MatrixError> {
        let response = self
            .client
            .put(url)
            .bearer_auth(&self.access_token)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(MatrixError::from_status(status.as_u16(), body));
        }
        serde_json::from_str(&body)
            .map_err(|_| MatrixError::from_status(status.as_u16(), body))
    }

    async fn send_message(
        &self,
        room_id: &str,
        content: serde_json::Value,
    ) -> Result<String, MatrixError> {
        let url = format!(
            "{}/_matrix/client/v3/rooms/{}/send/m.room.message/{}",
            self.homeserver_url,
            urlencode(room_id),
            self.next_txn_id(),
        );
        let response = self.put_json(&url, &content).await?;
        response
            .get("event_id")
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| MatrixError::from_status(200, response.to_string()))
    }
}

/// One sync batch: normalized timeline events plus the next batch token.
#[derive(Debug)]
pub struct SyncBatch {
    pub next_batch: String,
    pub events: Vec<crate::events::IncomingRoomEvent>,
}

impl HttpMatrixClient {
    /// One `/sync` long-poll against the client-server API.
    pub async fn sync_once(
        &self,
        since: Option<&str>,
        timeout_ms: u64,
    ) -> Result<SyncBatch, MatrixError> {
        let mut url = format!(
            "{}/_matrix/client/v3/sync?timeout={timeout_ms}",
            self.homeserver_url
        );
        if let Some(since) = since {
            url.push_str(&format!("&since={}", urlencode(since)));
        }

        let response = self.client.get(&url).bearer_auth(&self.access_token).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(MatrixError::from_status(status.as_u16(), body));
        }
        let parsed: serde_json::Value = serde_json::from_str(&body)
            .map_err(|_| MatrixError::from_status(status.as_u16(), body))?;

        let next_batch = parsed
            .get("next_batch")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_owned();

        let mut events = Vec::new();
        if let Some(rooms) = parsed
            .get("rooms")
            .and_then(|rooms| rooms.get("join"))
            .and_then(serde_json::Value::as_object)
        {
            for (room_id, room) in rooms {
                let Some(timeline) = room
                    .get("timeline")
                    .and_then(|timeline| timeline.get("events"))
                    .and_then(serde_json::Value::as_array)
                else {
                    continue;
                };
                for raw_event in timeline {
                    if let Some(event) =
                        crate::events::IncomingRoomEvent::from_timeline_event(room_id, raw_event)
                    {
                        events.push(event);
                    }
                }
            }
        }

        Ok(SyncBatch { next_batch, events })
    }
}

#[async_trait]
impl MatrixClient for HttpMatrixClient {
    async fn send_text(&self, room_id: &str, body: &str) -> Result<String, MatrixError> {
        self.send_message(room_id, json!({"msgtype": "m.text", "body": body})).await
    }

    async fn send_formatted(
        &self,
        room_id: &str,
        body: &str,
        formatted_body: &str,
    ) -> Result<String, MatrixError> {
        self.send_message(
            room_id,
            json!({
                "msgtype": "m.text",
                "body": body,
                "format": "org.matrix.custom.html",
                "formatted_body": formatted_body,
            }),
        )
        .await
    }

    async fn redact_event(&self, room_id: &str, event_id: &str) -> Result<(), MatrixError> {
        let url = format!(
            "{}/_matrix/client/v3/rooms/{}/redact/{}/{}",
            self.homeserver_url,
            urlencode(room_id),
            urlencode(event_id),
            self.next_txn_id(),
        );
        self.put_json(&url, &json!({"reason": "retention cleanup"})).await?;
        Ok(())
    }

    async fn download_media(&self, mxc_url: &str) -> Result<Vec<u8>, MatrixError> {
        let (server_name, media_id) = parse_mxc_url(mxc_url)?;
        let url = format!(
            "{}/_matrix/client/v1/media/download/{server_name}/{media_id}",
            self.homeserver_url,
        );
        let response = self.client.get(&url).bearer_auth(&self.access_token).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MatrixError::from_status(status.as_u16(), body));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

fn parse_mxc_url(mxc_url: &str) -> Result<(String, String), MatrixError> {
    let rest = mxc_url
        .strip_prefix("mxc://")
        .ok_or_else(|| MatrixError::InvalidMediaUrl(mxc_url.to_owned()))?;
    match rest.split_once('/') {
        Some((server, media)) if !server.is_empty() && !media.is_empty() => {
            Ok((server.to_owned(), media.to_owned()))
        }
        _ => Err(MatrixError::InvalidMediaUrl(mxc_url.to_owned())),
    }
}

fn urlencode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            other => encoded.push_str(&format!("%{other:02X}")),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn mxc_urls_are_parsed() {
        let (server, media) = parse_mxc_url("mxc://example.org/abc123").unwrap();
        assert_eq!(server, "example.org");
        assert_eq!(media, "abc123");

        assert!(parse_mxc_url("https://example.org/abc").is_err());
        assert!(parse_mxc_url("mxc://example.org/").is_err());
    }

    #[test]
    fn room_ids_are_percent_encoded() {
        assert_eq!(urlencode("!room:example.org"), "%21room%3Aexample.org");
    }

    #[tokio::test]
    async fn send_text_returns_event_id() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path_regex(r"^/_matrix/client/v3/rooms/.+/send/m\.room\.message/.+$"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"event_id": "$ev1"})),
            )
            .mount(&server)
            .await;

        let client = HttpMatrixClient::new(server.uri(), "token".to_owned());
        let event_id = client.send_text("!room:example.org", "hello").await.unwrap();
        assert_eq!(event_id, "$ev1");
    }

    #[tokio::test]
    async fn rate_limited_send_surfaces_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path_regex(r"^/_matrix/client/v3/rooms/.+/send/m\.room\.message/.+$"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "errcode": "M_LIMIT_EXCEEDED",
                "retry_after_ms": 750
            })))
            .mount(&server)
            .await;

        let client = HttpMatrixClient::new(server.uri(), "token".to_owned());
        let error = client.send_text("!room:example.org", "hello").await.unwrap_err();
        assert_eq!(error.retry_after_ms(), Some(750));
    }
}
