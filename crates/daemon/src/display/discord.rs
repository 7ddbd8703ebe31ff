//! Discord renderer for the status display.
//!
//! Uses the bot REST API directly:
//! - `POST   /channels/{channel}/messages`
//! - `PATCH  /channels/{channel}/messages/{message}`
//! - `DELETE /channels/{channel}/messages/{message}`
//!
//! The button's custom id is `turn_on`; the chat front end routes clicks on
//! it to the power-on flow.

use std::time::Duration;

use protocol::{ChannelId, MessageId};
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{DisplayError, DisplayFuture, DisplayRenderer, HostStatus};
use crate::device::DisplayBinding;

/// Default REST API base URL.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Custom id carried by the power-on button.
pub const TURN_ON_CUSTOM_ID: &str = "turn_on";

/// Discord button style "success" (green).
const BUTTON_STYLE_SUCCESS: u8 = 3;

/// Builds the message body for a display.
pub fn render_message(status: Option<HostStatus>) -> Value {
    let embeds: Vec<Value> = status
        .map(|s| json!({ "title": s.title(), "color": s.color() }))
        .into_iter()
        .collect();

    json!({
        "embeds": embeds,
        "components": [{
            "type": 1,
            "components": [{
                "type": 2,
                "style": BUTTON_STYLE_SUCCESS,
                "label": "Turn On PC",
                "custom_id": TURN_ON_CUSTOM_ID,
            }],
        }],
    })
}

#[derive(Debug, Deserialize)]
struct CreatedMessage {
    id: String,
}

/// Renders the display through a Discord bot account.
#[derive(Debug, Clone)]
pub struct DiscordDisplay {
    client: reqwest::Client,
    api_base: String,
    token: String,
}

impl DiscordDisplay {
    /// Creates a renderer; `timeout` bounds every HTTP request.
    pub fn new(
        api_base: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DisplayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pcwake/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn messages_url(&self, channel: ChannelId) -> String {
        format!("{}/channels/{}/messages", self.api_base, channel)
    }

    fn message_url(&self, binding: DisplayBinding) -> String {
        format!(
            "{}/{}",
            self.messages_url(binding.channel_id),
            binding.message_id
        )
    }

    async fn request(
        &self,
        method: Method,
        url: String,
        body: Option<Value>,
    ) -> Result<Response, DisplayError> {
        let mut builder = self
            .client
            .request(method, url)
            .header(AUTHORIZATION, format!("Bot {}", self.token));
        if let Some(body) = body {
            builder = builder.json(&body);
        }
        check_status(builder.send().await?).await
    }
}

/// Maps HTTP status codes onto display errors.
async fn check_status(response: Response) -> Result<Response, DisplayError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(DisplayError::NotFound);
    }
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(DisplayError::Rejected {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response)
}

impl DisplayRenderer for DiscordDisplay {
    fn post(&self, channel: ChannelId, status: Option<HostStatus>) -> DisplayFuture<'_, MessageId> {
        Box::pin(async move {
            let response = self
                .request(
                    Method::POST,
                    self.messages_url(channel),
                    Some(render_message(status)),
                )
                .await?;

            let created: CreatedMessage = response.json().await?;
            let id = created
                .id
                .parse::<MessageId>()
                .map_err(|e| DisplayError::InvalidResponse(format!("message id: {}", e)))?;

            tracing::debug!(%channel, message = %id, "Posted status display");
            Ok(id)
        })
    }

    fn edit(&self, binding: DisplayBinding, status: HostStatus) -> DisplayFuture<'_, ()> {
        Box::pin(async move {
            self.request(
                Method::PATCH,
                self.message_url(binding),
                Some(render_message(Some(status))),
            )
            .await?;
            Ok(())
        })
    }

    fn delete(&self, binding: DisplayBinding) -> DisplayFuture<'_, ()> {
        Box::pin(async move {
            self.request(Method::DELETE, self.message_url(binding), None)
                .await?;
            Ok(())
        })
    }
}
