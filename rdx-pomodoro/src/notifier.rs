//! Outbound notifications that forward session transitions to Slack.

use crate::common::SessionState;
use anyhow::Context;
use serde::Serialize;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::debug;

/// The message body posted to a `response_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlackMessage {
    pub response_type: &'static str,
    pub text: String,
}

impl SlackMessage {
    /// Visible only to the user who ran the command.
    pub fn ephemeral(text: impl Into<String>) -> Self {
        Self {
            response_type: "ephemeral",
            text: text.into(),
        }
    }

    /// Visible to the whole channel.
    pub fn in_channel(text: impl Into<String>) -> Self {
        Self {
            response_type: "in_channel",
            text: text.into(),
        }
    }
}

/// The channel message announcing that a session entered `state`.
pub fn announcement(state: SessionState, user_name: &str) -> String {
    match state {
        SessionState::New => format!("{user_name} set up a pomodoro."),
        SessionState::Focusing => format!(":tomato: {user_name} is focusing. Please hold messages."),
        SessionState::OnBreak => format!(":coffee: {user_name} is on a break."),
        SessionState::Invalid => format!("{user_name} ended their pomodoro."),
    }
}

/// Posts transitions to Slack response URLs.
///
/// Observers built here block on the HTTP request, which is fine because the
/// session runs observers on tokio's blocking pool. Failures come back as
/// errors and are logged by the dispatcher.
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    client: reqwest::Client,
    runtime: Handle,
}

impl SlackNotifier {
    pub fn new(runtime: Handle, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, runtime })
    }

    /// Sends one message, failing on transport errors and non-2xx answers.
    pub async fn post(&self, response_url: &str, message: &SlackMessage) -> anyhow::Result<()> {
        self.client
            .post(response_url)
            .json(message)
            .send()
            .await
            .with_context(|| format!("could not reach {response_url}"))?
            .error_for_status()
            .context("Slack rejected the notification")?;
        debug!(response_url, text = %message.text, "Notification delivered.");
        Ok(())
    }

    /// Builds a session observer announcing each state on `response_url`.
    pub fn observer_for(
        &self,
        response_url: String,
        user_name: String,
    ) -> impl Fn(SessionState) -> anyhow::Result<()> + Send + Sync + 'static {
        let notifier = self.clone();
        move |state| {
            let message = SlackMessage::in_channel(announcement(state, &user_name));
            notifier
                .runtime
                .block_on(notifier.post(&response_url, &message))
        }
    }
}
