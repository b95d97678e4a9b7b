use anyhow::Result;
use pomodoro::config::PomodoroConfig;
use pomodoro::{ENGINE_NAME, VERSION};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize structured logging. RUST_LOG overrides the default level.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    // 2. Load configuration from `pomodoro.toml` and POMODORO__* variables.
    let config = PomodoroConfig::load()?;
    info!(
        "{} v{} (focus {}s, break {}s, notifications {}).",
        ENGINE_NAME,
        VERSION,
        config.session.focus_secs,
        config.session.break_secs,
        if config.notifier.enabled { "on" } else { "off" }
    );

    // 3. Serve slash commands until Ctrl+C.
    pomodoro::server::run(config).await
}
