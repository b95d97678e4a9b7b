//! The HTTP listener that receives slash commands and drives sessions.
//!
//! Each Slack user gets at most one session. `start` creates and starts it,
//! `status` reports on it and `stop` tears it down. When notifications are
//! enabled, every transition is also announced on the command's
//! `response_url`.

use crate::common::{SessionId, SessionState};
use crate::config::PomodoroConfig;
use crate::notifier::{SlackMessage, SlackNotifier};
use crate::session::Session;
use crate::slack::{PomodoroCommand, SlashCommand};
use anyhow::Context;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use slotmap::SlotMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tokio::sync::RwLock;
use tracing::{info, warn};

const HELP_TEXT: &str = "Usage:\n\
    • `start [focus_minutes] [break_minutes]` starts a pomodoro\n\
    • `status` shows where you are in the cycle\n\
    • `stop` ends your pomodoro";

/// Live sessions, one per Slack user.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: SlotMap<SessionId, Session>,
    by_user: HashMap<String, SessionId>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `session` for `user_id`, tearing down any session it replaces.
    pub fn insert(&mut self, user_id: String, session: Session) -> SessionId {
        if let Some(previous) = self.remove(&user_id) {
            previous.teardown();
        }
        let id = self.sessions.insert(session);
        self.by_user.insert(user_id, id);
        id
    }

    pub fn get(&self, user_id: &str) -> Option<&Session> {
        self.by_user
            .get(user_id)
            .and_then(|id| self.sessions.get(*id))
    }

    /// Forgets the session for `user_id` without tearing it down.
    pub fn remove(&mut self, user_id: &str) -> Option<Session> {
        let id = self.by_user.remove(user_id)?;
        self.sessions.remove(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Tears down and forgets every session. Returns how many were live.
    pub fn teardown_all(&mut self) -> usize {
        self.by_user.clear();
        let mut torn_down = 0;
        for (_, session) in self.sessions.drain() {
            if session.current_state().is_running() {
                torn_down += 1;
            }
            session.teardown();
        }
        torn_down
    }
}

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    config: Arc<PomodoroConfig>,
    registry: Arc<RwLock<SessionRegistry>>,
    notifier: Option<SlackNotifier>,
}

impl AppState {
    pub fn new(config: PomodoroConfig, notifier: Option<SlackNotifier>) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(RwLock::new(SessionRegistry::new())),
            notifier,
        }
    }

    pub fn registry(&self) -> &Arc<RwLock<SessionRegistry>> {
        &self.registry
    }

    /// Runs one parsed command for the user in `cmd` and returns the reply.
    pub async fn execute(&self, command: PomodoroCommand, cmd: &SlashCommand) -> String {
        match command {
            PomodoroCommand::Start { focus, rest } => self.start(focus, rest, cmd).await,
            PomodoroCommand::Stop => match self.registry.write().await.remove(&cmd.user_id) {
                Some(session) => {
                    session.teardown();
                    info!(user = %cmd.user_name, "Session stopped.");
                    "Pomodoro stopped.".to_string()
                }
                None => "You have no pomodoro running.".to_string(),
            },
            PomodoroCommand::Status => match self.registry.read().await.get(&cmd.user_id) {
                Some(session) => format!(
                    "You are {} since {}.",
                    describe(session.current_state()),
                    session.state_timestamp().format("%H:%M:%S UTC")
                ),
                None => "You have no pomodoro running.".to_string(),
            },
            PomodoroCommand::Help => HELP_TEXT.to_string(),
        }
    }

    async fn start(
        &self,
        focus: Option<Duration>,
        rest: Option<Duration>,
        cmd: &SlashCommand,
    ) -> String {
        let mut registry = self.registry.write().await;
        if let Some(existing) = registry.get(&cmd.user_id) {
            let state = existing.current_state();
            if state.is_running() {
                return format!("You already have a pomodoro running ({}).", describe(state));
            }
        }

        let focus = focus.unwrap_or_else(|| self.config.session.focus_duration());
        let rest = rest.unwrap_or_else(|| self.config.session.break_duration());
        let session = match Session::new(focus, rest) {
            Ok(session) => session,
            Err(e) => return format!("Could not create a pomodoro: {}", e),
        };
        if let Some(notifier) = &self.notifier {
            if !cmd.response_url.is_empty() {
                session.add_observer(
                    notifier.observer_for(cmd.response_url.clone(), cmd.user_name.clone()),
                );
            }
        }
        if let Err(e) = session.start() {
            return format!("Could not start the pomodoro: {}", e);
        }
        registry.insert(cmd.user_id.clone(), session);
        info!(user = %cmd.user_name, ?focus, ?rest, "Session started.");
        format!(
            "Pomodoro started: {} focus, {} break.",
            human(focus),
            human(rest)
        )
    }

    /// Tears down every live session.
    pub async fn shutdown(&self) {
        let torn_down = self.registry.write().await.teardown_all();
        info!("Tore down {} live session(s).", torn_down);
    }
}

fn describe(state: SessionState) -> &'static str {
    match state {
        SessionState::New => "not started",
        SessionState::Focusing => "focusing",
        SessionState::OnBreak => "on a break",
        SessionState::Invalid => "stopped",
    }
}

fn human(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs % 60 == 0 {
        format!("{} min", secs / 60)
    } else {
        format!("{} s", secs)
    }
}

/// Builds the listener's routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(handle_command))
        .route("/health", get(health))
        .with_state(state)
}

async fn handle_command(State(state): State<AppState>, body: Bytes) -> Response {
    let cmd = match SlashCommand::decode(&body) {
        Ok(cmd) => cmd,
        Err(e) => {
            warn!("error reading request body: {}", e);
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };
    info!(command = %cmd.command, user = %cmd.user_name, text = %cmd.text, "Slash command received.");

    let reply = match PomodoroCommand::parse(&cmd.text) {
        Ok(command) => state.execute(command, &cmd).await,
        Err(e) => e.to_string(),
    };
    Json(SlackMessage::ephemeral(reply)).into_response()
}

async fn health() -> &'static str {
    "ok"
}

/// Binds the listener and serves until Ctrl+C, then tears down all sessions.
pub async fn run(config: PomodoroConfig) -> anyhow::Result<()> {
    let notifier = if config.notifier.enabled {
        Some(SlackNotifier::new(Handle::current(), config.notifier.timeout())?)
    } else {
        None
    };
    let bind_addr = config.server.bind_addr.clone();
    let state = AppState::new(config, notifier);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind to {bind_addr}"))?;
    info!("Listening for slash commands on {}. Press Ctrl+C to shut down.", bind_addr);

    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received.");
        })
        .await?;

    state.shutdown().await;
    info!("Pomodoro server has shut down.");
    Ok(())
}
