use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::models::block::Block;
use crate::core::sink::MessageSink;

pub const DEFAULT_BASE_URL: &str = "https://slack.com/api";

#[derive(Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    blocks: &'a [Block],
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ts: Option<&'a str>,
}

#[derive(Deserialize)]
struct PostMessageResponse {
    ok: bool,
    ts: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct OpenedChannel {
    id: String,
}

#[derive(Deserialize)]
struct OpenConversationResponse {
    ok: bool,
    channel: Option<OpenedChannel>,
    error: Option<String>,
}

/// Slack user ids start with `U`; anything else is treated as a channel id.
pub fn is_user_id(destination: &str) -> bool {
    destination.starts_with('U')
}

/// Posts through the Slack Web API with a bot token.
pub struct SlackSink {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl SlackSink {
    pub fn new(client: reqwest::Client, token: String) -> Self {
        Self {
            client,
            token,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Open (or reuse) the direct-message channel with `user`.
    async fn open_dm(&self, user: &str) -> Result<String> {
        let response: OpenConversationResponse = self
            .client
            .post(format!("{}/conversations.open", self.base_url))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "users": user }))
            .send()
            .await
            .context("Failed to call conversations.open")?
            .json()
            .await
            .context("Failed to parse conversations.open response")?;

        match response.channel {
            Some(channel) if response.ok => Ok(channel.id),
            _ => anyhow::bail!(
                "Error opening DM: {}",
                response.error.unwrap_or_else(|| "unknown error".to_string())
            ),
        }
    }

    async fn resolve_channel(&self, destination: &str) -> String {
        if !is_user_id(destination) {
            return destination.to_string();
        }
        match self.open_dm(destination).await {
            Ok(channel) => channel,
            Err(e) => {
                tracing::error!("{:#}", e);
                destination.to_string()
            }
        }
    }

    async fn try_post(
        &self,
        channel: &str,
        blocks: &[Block],
        fallback_text: &str,
        thread_ts: Option<&str>,
    ) -> Result<String> {
        let request = PostMessageRequest {
            channel,
            blocks,
            text: fallback_text,
            thread_ts,
        };
        let response: PostMessageResponse = self
            .client
            .post(format!("{}/chat.postMessage", self.base_url))
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .context("Error calling Slack API")?
            .json()
            .await
            .context("Failed to parse Slack response")?;

        if !response.ok {
            anyhow::bail!(
                "Error sending message to Slack: {}",
                response.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
        response.ts.context("Slack response has no message ts")
    }
}

impl MessageSink for SlackSink {
    async fn post_message(
        &self,
        channel: &str,
        blocks: &[Block],
        fallback_text: &str,
        thread_ts: Option<&str>,
    ) -> Option<String> {
        let channel = self.resolve_channel(channel).await;
        match self.try_post(&channel, blocks, fallback_text, thread_ts).await {
            Ok(ts) => {
                tracing::info!(%channel, %ts, "Message successfully sent to Slack");
                Some(ts)
            }
            Err(e) => {
                tracing::error!("{:#}", e);
                None
            }
        }
    }
}
