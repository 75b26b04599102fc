//! Slack delivery of the rendered report
//!
//! Two targets: an incoming webhook, or `chat.postMessage` with a channel
//! and a bot token. Delivery failures are logged and never fail the run.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";

const TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlackTarget {
    Webhook { url: String },
    Channel { channel: String, token: String },
}

impl SlackTarget {
    /// Target from CLI flags; a webhook wins when both are given.
    ///
    /// A channel without a token (or the reverse) is ignored with a warning.
    pub fn from_flags(
        webhook_url: Option<&str>,
        channel: Option<&str>,
        token: Option<&str>,
    ) -> Option<Self> {
        if let Some(url) = webhook_url.filter(|u| !u.is_empty()) {
            return Some(SlackTarget::Webhook {
                url: url.to_string(),
            });
        }
        match (channel, token) {
            (Some(channel), Some(token)) if !channel.is_empty() && !token.is_empty() => {
                Some(SlackTarget::Channel {
                    channel: channel.to_string(),
                    token: token.to_string(),
                })
            }
            (None, None) => None,
            _ => {
                warn!("Slack channel and auth token must be given together, skipping notification");
                None
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Slack rejected the message: {0}")]
    Rejected(String),
}

#[derive(Serialize)]
struct WebhookMessage<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

pub struct SlackNotifier {
    target: SlackTarget,
}

impl SlackNotifier {
    pub fn new(target: SlackTarget) -> Self {
        Self { target }
    }

    /// Send `report`, logging instead of failing
    pub fn notify(&self, report: &str) {
        match self.send(report) {
            Ok(()) => info!("Report sent to Slack"),
            Err(e) => warn!(error = %e, "Failed to send report to Slack"),
        }
    }

    pub fn send(&self, report: &str) -> Result<(), NotifyError> {
        let text = format_message(report);
        let client = reqwest::blocking::Client::builder()
            .timeout(TIMEOUT)
            .user_agent(format!("kor/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        match &self.target {
            SlackTarget::Webhook { url } => {
                debug!("Posting report to Slack webhook");
                client
                    .post(url)
                    .json(&WebhookMessage { text: &text })
                    .send()?
                    .error_for_status()?;
                Ok(())
            }
            SlackTarget::Channel { channel, token } => {
                debug!(channel = %channel, "Posting report with chat.postMessage");
                let response: PostMessageResponse = client
                    .post(POST_MESSAGE_URL)
                    .bearer_auth(token)
                    .json(&PostMessage {
                        channel,
                        text: &text,
                    })
                    .send()?
                    .error_for_status()?
                    .json()?;
                if response.ok {
                    Ok(())
                } else {
                    Err(NotifyError::Rejected(
                        response.error.unwrap_or_else(|| "unknown error".to_string()),
                    ))
                }
            }
        }
    }
}

/// Wrap the report in a code block so Slack keeps the layout
fn format_message(report: &str) -> String {
    format!("```\n{}\n```", report.trim_end())
}
