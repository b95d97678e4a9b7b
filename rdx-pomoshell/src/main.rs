use anyhow::Result;
use colored::Colorize;
use pomodoro::prelude::*;
use pomodoro::{ENGINE_NAME, VERSION as LIB_VERSION};
use rustyline::highlight::Highlighter;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::env;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SHELL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A custom helper struct for rustyline that enables syntax highlighting.
#[derive(Completer, Helper, Hinter, Validator)]
struct MyHighlighter;

impl Highlighter for MyHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if let Some((command, rest)) = line.split_once(' ') {
            let colored_command = command.yellow().bold();
            let colored_rest = rest.yellow();
            Cow::Owned(format!("{} {}", colored_command, colored_rest))
        } else {
            Cow::Owned(line.yellow().bold().to_string())
        }
    }
    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn print_banner() {
    if env::var("QUIET_MODE").is_ok() {
        return;
    }
    println!("{}", "pomoshell :: focus / break".cyan().bold());

    let version_string = format!(
        "          Shell   v{:<8} Library   v{:<8}",
        SHELL_VERSION, LIB_VERSION
    );

    println!("{}", "-----------------------------------------------------------------------------------------------".dimmed());

    let license_blurb = "
    This software is provided 'as is', without warranty of any kind.
    Distributed under the MIT OR Apache-2.0 license. Use at your own risk.
    ";

    println!("{}", version_string);
    println!("{}", license_blurb.dimmed());

    println!("{}", "-----------------------------------------------------------------------------------------------".dimmed());
}

fn paint(state: SessionState) -> colored::ColoredString {
    match state {
        SessionState::New => state.as_str().normal(),
        SessionState::Focusing => state.as_str().red().bold(),
        SessionState::OnBreak => state.as_str().green().bold(),
        SessionState::Invalid => state.as_str().dimmed(),
    }
}

/// Prints every transition of the session behind `handle`.
fn watch(session: &Session, handle: usize) {
    session.add_observer(move |state| {
        println!("\n<-- [SESSION #{}] now {}\n>> ", handle, paint(state));
        Ok(())
    });
}

fn parse_handle(arg: Option<&&str>, usage: &str) -> Option<usize> {
    match arg.map(|s| s.parse::<usize>()) {
        Some(Ok(handle)) => Some(handle),
        Some(Err(_)) => {
            println!("Error: Handle must be a number (e.g., '0', '1').");
            None
        }
        None => {
            println!("Usage: {}", usage);
            None
        }
    }
}

fn parse_secs(arg: Option<&&str>) -> Option<Duration> {
    arg.and_then(|s| s.parse::<u64>().ok()).map(Duration::from_secs)
}

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_target(false)
        .init();

    // The shell's state management variables.
    let mut sessions: BTreeMap<usize, Session> = BTreeMap::new();
    let mut next_handle: usize = 0;

    let mut rl = Editor::new()?;
    let helper = MyHighlighter {};
    rl.set_helper(Some(helper));

    println!("{} is ready. Type 'help' for commands or 'exit' to quit.", ENGINE_NAME.cyan());

    loop {
        let prompt = format!("{}", ">> ".cyan().bold());
        let readline = rl.readline(&prompt);
        match readline {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let args = line.split_whitespace().collect::<Vec<_>>();

                if let Some(command) = args.first() {
                    match *command {
                        "new" => match (parse_secs(args.get(1)), parse_secs(args.get(2))) {
                            (Some(focus), Some(rest)) => match Session::new(focus, rest) {
                                Ok(session) => {
                                    let handle = next_handle;
                                    next_handle += 1;
                                    sessions.insert(handle, session);
                                    println!("--> Created session with handle: #{}", handle);
                                }
                                Err(e) => println!("Error: {}", e),
                            },
                            _ => println!("Usage: new <FOCUS_SECONDS> <BREAK_SECONDS>"),
                        },
                        "start" => {
                            if let Some(handle) = parse_handle(args.get(1), "start <HANDLE>") {
                                match sessions.get(&handle) {
                                    Some(session) => match session.start() {
                                        Ok(()) => println!("--> Session #{} started.", handle),
                                        Err(e) => println!("--> Error: {}", e),
                                    },
                                    None => println!("Error: Invalid handle #{}. Use 'list' to see sessions.", handle),
                                }
                            }
                        }
                        "state" => {
                            if let Some(handle) = parse_handle(args.get(1), "state <HANDLE>") {
                                match sessions.get(&handle) {
                                    Some(session) => println!(
                                        "--> #{} is {} since {}",
                                        handle,
                                        paint(session.current_state()),
                                        session.state_timestamp().format("%H:%M:%S%.3f")
                                    ),
                                    None => println!("Error: Invalid handle #{}. Use 'list' to see sessions.", handle),
                                }
                            }
                        }
                        "watch" => {
                            if let Some(handle) = parse_handle(args.get(1), "watch <HANDLE>") {
                                match sessions.get(&handle) {
                                    Some(session) => {
                                        watch(session, handle);
                                        println!("--> Watching session #{}.", handle);
                                    }
                                    None => println!("Error: Invalid handle #{}. Use 'list' to see sessions.", handle),
                                }
                            }
                        }
                        "teardown" => {
                            if let Some(handle) = parse_handle(args.get(1), "teardown <HANDLE>") {
                                match sessions.get(&handle) {
                                    Some(session) => {
                                        session.teardown();
                                        println!("--> Session #{} torn down.", handle);
                                    }
                                    None => println!("Error: Invalid handle #{}. Use 'list' to see sessions.", handle),
                                }
                            }
                        }
                        "list" => {
                            println!("Sessions:");
                            for (handle, session) in &sessions {
                                println!(
                                    "  Handle #{}: {} (focus {:?}, break {:?}, {} observer(s))",
                                    handle,
                                    paint(session.current_state()),
                                    session.focus_duration(),
                                    session.break_duration(),
                                    session.observer_count()
                                );
                            }
                        }
                        "help" => {
                            println!("Available commands:");
                            println!("  new <F> <B>           - Creates a session with F-second focus and B-second break.");
                            println!("  start <H>             - Starts the session with handle H.");
                            println!("  state <H>             - Shows the current state of a session.");
                            println!("  watch <H>             - Prints every transition of a session.");
                            println!("  teardown <H>          - Stops a session for good.");
                            println!("  list                  - Shows sessions and their handles.");
                            println!("  exit                  - Quits the shell.");
                        }
                        "exit" => break,
                        _ => println!("Unknown command: '{}'. Type 'help'.", line),
                    }
                }
            }
            Err(_) => {
                println!("Exiting pomoshell...");
                break;
            }
        }
    }

    for session in sessions.values() {
        session.teardown();
    }
    info!("All sessions torn down.");

    Ok(())
}
