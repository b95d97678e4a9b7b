//! Decoding of inbound Slack slash commands.
//!
//! Slack posts slash commands as `application/x-www-form-urlencoded` bodies.
//! `SlashCommand::decode` turns such a body into a flat record and
//! `PomodoroCommand::parse` interprets its free-text argument.

use std::time::Duration;
use thiserror::Error;

/// A decoded slash command. Unknown form fields are ignored, missing ones are
/// left empty and a repeated field keeps its last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlashCommand {
    pub token: String,
    pub command: String,
    pub text: String,
    pub response_url: String,
    pub trigger_id: String,
    pub user_id: String,
    pub user_name: String,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("request body is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("invalid percent escape at byte {offset}")]
    InvalidEscape { offset: usize },

    #[error("could not parse as Slack command: {0}")]
    Form(#[from] serde_urlencoded::de::Error),
}

impl SlashCommand {
    /// Decodes a form-encoded request body.
    pub fn decode(body: &[u8]) -> Result<Self, DecodeError> {
        let body = std::str::from_utf8(body)?;
        check_escapes(body)?;
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(body)?;
        let mut cmd = SlashCommand::default();
        for (key, value) in pairs {
            let field = match key.as_str() {
                "token" => &mut cmd.token,
                "command" => &mut cmd.command,
                "text" => &mut cmd.text,
                "response_url" => &mut cmd.response_url,
                "trigger_id" => &mut cmd.trigger_id,
                "user_id" => &mut cmd.user_id,
                "user_name" => &mut cmd.user_name,
                _ => continue,
            };
            *field = value;
        }
        Ok(cmd)
    }
}

/// Rejects a `%` that is not followed by two hex digits.
fn check_escapes(body: &str) -> Result<(), DecodeError> {
    let bytes = body.as_bytes();
    for (offset, _) in body.match_indices('%') {
        let valid = bytes
            .get(offset + 1..offset + 3)
            .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
        if !valid {
            return Err(DecodeError::InvalidEscape { offset });
        }
    }
    Ok(())
}

/// What a user asked for in the slash command's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PomodoroCommand {
    /// Start a session. Missing lengths fall back to the configured ones.
    Start {
        focus: Option<Duration>,
        rest: Option<Duration>,
    },
    Stop,
    Status,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown subcommand `{0}`; try `help`")]
    UnknownVerb(String),

    #[error("`{0}` is not a positive number of minutes")]
    InvalidMinutes(String),

    #[error("too many arguments for `{0}`")]
    TooManyArguments(&'static str),
}

impl PomodoroCommand {
    /// Parses `start [focus_minutes] [break_minutes]`, `stop`, `status` or
    /// `help`. Empty text means `start` with the configured lengths.
    pub fn parse(text: &str) -> Result<Self, CommandError> {
        let mut args = text.split_whitespace();
        let verb = args.next().map(str::to_ascii_lowercase);
        let command = match verb.as_deref() {
            None | Some("start") => {
                let focus = args.next().map(parse_minutes).transpose()?;
                let rest = args.next().map(parse_minutes).transpose()?;
                PomodoroCommand::Start { focus, rest }
            }
            Some("stop") => PomodoroCommand::Stop,
            Some("status") => PomodoroCommand::Status,
            Some("help") => PomodoroCommand::Help,
            Some(other) => return Err(CommandError::UnknownVerb(other.to_string())),
        };
        if args.next().is_some() {
            return Err(CommandError::TooManyArguments(command.verb()));
        }
        Ok(command)
    }

    pub fn verb(&self) -> &'static str {
        match self {
            PomodoroCommand::Start { .. } => "start",
            PomodoroCommand::Stop => "stop",
            PomodoroCommand::Status => "status",
            PomodoroCommand::Help => "help",
        }
    }
}

fn parse_minutes(arg: &str) -> Result<Duration, CommandError> {
    match arg.parse::<u64>() {
        Ok(minutes) if minutes > 0 => minutes
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| CommandError::InvalidMinutes(arg.to_string())),
        _ => Err(CommandError::InvalidMinutes(arg.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_known_fields_and_ignores_the_rest() {
        let body = b"token=gIkuvaNzQIHg97ATvDxqgjtO&team_id=T0001&command=%2Fpomodoro\
            &text=start+25+5&response_url=https%3A%2F%2Fhooks.slack.com%2Fcommands%2F1234\
            &trigger_id=13345224609.738474920.8088930838d88f008e0&user_id=U2147483697&user_name=Steve";
        let cmd = SlashCommand::decode(body).unwrap();
        assert_eq!(cmd.token, "gIkuvaNzQIHg97ATvDxqgjtO");
        assert_eq!(cmd.command, "/pomodoro");
        assert_eq!(cmd.text, "start 25 5");
        assert_eq!(cmd.response_url, "https://hooks.slack.com/commands/1234");
        assert_eq!(cmd.trigger_id, "13345224609.738474920.8088930838d88f008e0");
        assert_eq!(cmd.user_id, "U2147483697");
        assert_eq!(cmd.user_name, "Steve");
    }

    #[test]
    fn missing_fields_are_empty() {
        let cmd = SlashCommand::decode(b"command=%2Fpomodoro").unwrap();
        assert_eq!(cmd.command, "/pomodoro");
        assert!(cmd.text.is_empty());
        assert!(cmd.user_id.is_empty());
        assert_eq!(SlashCommand::decode(b"").unwrap(), SlashCommand::default());
    }

    #[test]
    fn rejects_malformed_escapes() {
        assert!(matches!(
            SlashCommand::decode(b"text=100%zz"),
            Err(DecodeError::InvalidEscape { offset: 8 })
        ));
        assert!(matches!(
            SlashCommand::decode(b"text=%4"),
            Err(DecodeError::InvalidEscape { offset: 5 })
        ));
    }

    #[test]
    fn rejects_non_utf8_bodies() {
        assert!(matches!(
            SlashCommand::decode(b"text=\xff\xfe"),
            Err(DecodeError::Utf8(_))
        ));
    }

    #[test]
    fn repeated_fields_keep_the_last_value() {
        let cmd = SlashCommand::decode(b"user_id=U1&text=stop&user_id=U2").unwrap();
        assert_eq!(cmd.user_id, "U2");
        assert_eq!(cmd.text, "stop");
    }

    #[test]
    fn parses_start_with_optional_lengths() {
        assert_eq!(
            PomodoroCommand::parse("").unwrap(),
            PomodoroCommand::Start {
                focus: None,
                rest: None
            }
        );
        assert_eq!(
            PomodoroCommand::parse("START 50").unwrap(),
            PomodoroCommand::Start {
                focus: Some(Duration::from_secs(50 * 60)),
                rest: None
            }
        );
        assert_eq!(
            PomodoroCommand::parse(" start 25  5 ").unwrap(),
            PomodoroCommand::Start {
                focus: Some(Duration::from_secs(25 * 60)),
                rest: Some(Duration::from_secs(5 * 60))
            }
        );
    }

    #[test]
    fn parses_other_verbs() {
        assert_eq!(PomodoroCommand::parse("stop").unwrap(), PomodoroCommand::Stop);
        assert_eq!(PomodoroCommand::parse("Status").unwrap(), PomodoroCommand::Status);
        assert_eq!(PomodoroCommand::parse("help").unwrap(), PomodoroCommand::Help);
    }

    #[test]
    fn reports_bad_arguments() {
        assert_eq!(
            PomodoroCommand::parse("start 0"),
            Err(CommandError::InvalidMinutes("0".into()))
        );
        assert_eq!(
            PomodoroCommand::parse("start ten"),
            Err(CommandError::InvalidMinutes("ten".into()))
        );
        assert_eq!(
            PomodoroCommand::parse("start 307445734561825862"),
            Err(CommandError::InvalidMinutes("307445734561825862".into()))
        );
        assert_eq!(
            PomodoroCommand::parse("start 25 307445734561825862"),
            Err(CommandError::InvalidMinutes("307445734561825862".into()))
        );
        assert_eq!(
            PomodoroCommand::parse("snooze"),
            Err(CommandError::UnknownVerb("snooze".into()))
        );
        assert_eq!(
            PomodoroCommand::parse("stop now"),
            Err(CommandError::TooManyArguments("stop"))
        );
        assert_eq!(
            PomodoroCommand::parse("start 1 2 3"),
            Err(CommandError::TooManyArguments("start"))
        );
    }
}
