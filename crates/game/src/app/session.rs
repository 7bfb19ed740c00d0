use std::fs;
use std::path::{Path, PathBuf};

use roadbot_engine::sim::Instruction;
use roadbot_engine::{AppState, MapLoadError, Pick, StartupError};
use thiserror::Error;

pub(crate) const DEFAULT_FRAME_MS: u64 = 16;
/// Longest simulated span a single `run` line may request.
pub(crate) const MAX_RUN_SECONDS: f32 = 3600.0;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SessionCommand {
    Asset { jobs: Vec<String> },
    Fail { job: String, reason: String },
    Pick(Pick),
    Press(Instruction),
    Run { seconds: f32 },
    FrameMs(u64),
    ExpectState(AppState),
    ExpectScore(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SessionLine {
    pub(crate) line: usize,
    pub(crate) command: SessionCommand,
}

#[derive(Debug, Error)]
pub(crate) enum SessionError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Maps(#[from] MapLoadError),
    #[error("failed to read session script {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}:{line}: {reason}. usage: {usage}")]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
        usage: String,
    },
    #[error("session line {line}: expected {expected}, found {actual}")]
    Expectation {
        line: usize,
        expected: String,
        actual: String,
    },
    #[error("failed to encode session summary: {0}")]
    EncodeSummary(#[from] serde_json::Error),
    #[error("failed to write session summary {path}: {source}")]
    WriteSummary {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct CommandParseError {
    reason: String,
    usage: &'static str,
}

impl CommandParseError {
    fn new(reason: impl Into<String>, usage: &'static str) -> Self {
        Self {
            reason: reason.into(),
            usage,
        }
    }
}

const ASSET_USAGE: &str = "asset <job...>";
const FAIL_USAGE: &str = "fail <job> <reason...>";
const PICK_USAGE: &str = "pick <id>";
const PRESS_USAGE: &str = "press <instruction>";
const RUN_USAGE: &str = "run <seconds>";
const FRAME_MS_USAGE: &str = "frame_ms <n>";
const EXPECT_USAGE: &str = "expect state <STATE> | expect score <n>";
const COMMANDS_USAGE: &str = "asset|fail|pick|press|run|frame_ms|expect";

pub(crate) fn load_script(path: &Path) -> Result<Vec<SessionLine>, SessionError> {
    let raw = fs::read_to_string(path).map_err(|source| SessionError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_script(path, &raw)
}

pub(crate) fn parse_script(path: &Path, raw: &str) -> Result<Vec<SessionLine>, SessionError> {
    let mut lines = Vec::new();
    for (index, text) in raw.lines().enumerate() {
        let line = index + 1;
        let text = strip_comment(text).trim();
        if text.is_empty() {
            continue;
        }
        let command = tokenize_line(text)
            .map_err(|reason| CommandParseError::new(reason, COMMANDS_USAGE))
            .and_then(|tokens| parse_command(&tokens))
            .map_err(|error| SessionError::Parse {
                path: path.to_path_buf(),
                line,
                reason: error.reason,
                usage: error.usage.to_string(),
            })?;
        lines.push(SessionLine { line, command });
    }
    Ok(lines)
}

fn strip_comment(text: &str) -> &str {
    match text.find('#') {
        Some(start) => &text[..start],
        None => text,
    }
}

fn tokenize_line(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            _ => {
                current.push(ch);
                has_token = true;
            }
        }
    }

    if in_quotes {
        return Err("unterminated quoted string".to_string());
    }
    if has_token {
        tokens.push(current);
    }
    Ok(tokens)
}

fn parse_command(tokens: &[String]) -> Result<SessionCommand, CommandParseError> {
    let Some((name, args)) = tokens.split_first() else {
        return Err(CommandParseError::new("empty command", COMMANDS_USAGE));
    };
    match name.to_ascii_lowercase().as_str() {
        "asset" => parse_asset(args),
        "fail" => parse_fail(args),
        "pick" => parse_pick(args),
        "press" => parse_press(args),
        "run" => parse_run(args),
        "frame_ms" => parse_frame_ms(args),
        "expect" => parse_expect(args),
        _ => Err(CommandParseError::new(
            format!("unknown command '{name}'"),
            COMMANDS_USAGE,
        )),
    }
}

fn parse_asset(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    if args.is_empty() {
        return Err(CommandParseError::new(
            "missing required argument <job...>",
            ASSET_USAGE,
        ));
    }
    Ok(SessionCommand::Asset {
        jobs: args.to_vec(),
    })
}

fn parse_fail(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    if args.len() < 2 {
        return Err(CommandParseError::new(
            "expected a job name and a reason",
            FAIL_USAGE,
        ));
    }
    Ok(SessionCommand::Fail {
        job: args[0].clone(),
        reason: args[1..].join(" "),
    })
}

fn parse_pick(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    let [id] = args else {
        return Err(CommandParseError::new(
            "expected exactly one argument <id>",
            PICK_USAGE,
        ));
    };
    Ok(SessionCommand::Pick(Pick::parse(id)))
}

fn parse_press(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    let [name] = args else {
        return Err(CommandParseError::new(
            "expected exactly one argument <instruction>",
            PRESS_USAGE,
        ));
    };
    Instruction::from_name(name)
        .map(SessionCommand::Press)
        .ok_or_else(|| {
            CommandParseError::new(
                format!(
                    "unknown instruction '{name}' (expected forward|back|left|right|honk|pause|go|clear|grid)"
                ),
                PRESS_USAGE,
            )
        })
}

fn parse_run(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    let [raw] = args else {
        return Err(CommandParseError::new(
            "expected exactly one argument <seconds>",
            RUN_USAGE,
        ));
    };
    match raw.parse::<f32>() {
        Ok(seconds) if (0.0..=MAX_RUN_SECONDS).contains(&seconds) => {
            Ok(SessionCommand::Run { seconds })
        }
        _ => Err(CommandParseError::new(
            format!("invalid duration '{raw}' (expected 0 to {MAX_RUN_SECONDS} seconds)"),
            RUN_USAGE,
        )),
    }
}

fn parse_frame_ms(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    let [raw] = args else {
        return Err(CommandParseError::new(
            "expected exactly one argument <n>",
            FRAME_MS_USAGE,
        ));
    };
    match raw.parse::<u64>() {
        Ok(frame_ms) if frame_ms > 0 => Ok(SessionCommand::FrameMs(frame_ms)),
        _ => Err(CommandParseError::new(
            format!("invalid frame length '{raw}' (expected u64 > 0)"),
            FRAME_MS_USAGE,
        )),
    }
}

fn parse_expect(args: &[String]) -> Result<SessionCommand, CommandParseError> {
    let [subject, value] = args else {
        return Err(CommandParseError::new(
            "expected a subject and a value",
            EXPECT_USAGE,
        ));
    };
    match subject.to_ascii_lowercase().as_str() {
        "state" => AppState::from_name(value)
            .map(SessionCommand::ExpectState)
            .ok_or_else(|| {
                CommandParseError::new(format!("unknown app state '{value}'"), EXPECT_USAGE)
            }),
        "score" => value
            .parse::<i64>()
            .map(SessionCommand::ExpectScore)
            .map_err(|_| {
                CommandParseError::new(format!("invalid score '{value}' (expected i64)"), EXPECT_USAGE)
            }),
        _ => Err(CommandParseError::new(
            format!("unknown expectation '{subject}' (expected state|score)"),
            EXPECT_USAGE,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<Vec<SessionLine>, SessionError> {
        parse_script(Path::new("test.session"), raw)
    }

    fn commands(raw: &str) -> Vec<SessionCommand> {
        parse(raw)
            .expect("script")
            .into_iter()
            .map(|line| line.command)
            .collect()
    }

    #[test]
    fn parses_every_command() {
        let script = r#"
# boot
asset bot sky "winner audio"
fail audio no output device
pick retryButton
pick 3   # map
press honk
frame_ms 20
run 1.5
expect state selectmap
expect score -100
"#;
        assert_eq!(
            commands(script),
            vec![
                SessionCommand::Asset {
                    jobs: vec!["bot".into(), "sky".into(), "winner audio".into()]
                },
                SessionCommand::Fail {
                    job: "audio".into(),
                    reason: "no output device".into()
                },
                SessionCommand::Pick(Pick::Named("retryButton".into())),
                SessionCommand::Pick(Pick::Button(3)),
                SessionCommand::Press(Instruction::Fire),
                SessionCommand::FrameMs(20),
                SessionCommand::Run { seconds: 1.5 },
                SessionCommand::ExpectState(AppState::SelectMap),
                SessionCommand::ExpectScore(-100),
            ]
        );
    }

    #[test]
    fn keeps_source_line_numbers() {
        let lines = parse("\n\nrun 1\n# note\npress go\n").expect("script");
        assert_eq!(
            lines.iter().map(|line| line.line).collect::<Vec<_>>(),
            vec![3, 5]
        );
    }

    #[test]
    fn parse_errors_report_line_and_usage() {
        let err = parse("run 1\npress jump\n").expect_err("bad instruction");
        let message = err.to_string();
        assert!(message.starts_with("test.session:2: unknown instruction 'jump'"));
        assert!(message.ends_with("usage: press <instruction>"));

        let err = parse("expect mood happy").expect_err("bad expectation");
        assert!(err.to_string().contains("unknown expectation 'mood'"));

        let err = parse("run -2").expect_err("negative run");
        assert!(err.to_string().contains("usage: run <seconds>"));
    }

    #[test]
    fn run_durations_are_bounded() {
        assert_eq!(
            commands("run 3600"),
            vec![SessionCommand::Run {
                seconds: MAX_RUN_SECONDS
            }]
        );
        for raw in ["run 1e30", "run 3600.5", "run inf", "run NaN"] {
            let err = parse(raw).expect_err("out of range");
            let SessionError::Parse { reason, .. } = err else {
                panic!("expected parse error for {raw}");
            };
            assert!(reason.starts_with("invalid duration"), "{reason}");
        }
    }

    #[test]
    fn tokenizer_handles_quotes_and_errors() {
        assert_eq!(
            tokenize_line("asset \"winner audio\" map").expect("tokens"),
            vec!["asset", "winner audio", "map"]
        );
        assert_eq!(tokenize_line("pick \"\"").expect("tokens"), vec!["pick", ""]);
        assert!(tokenize_line("asset \"oops").is_err());

        let err = parse("asset \"oops").expect_err("unterminated");
        assert!(err.to_string().contains("unterminated quoted string"));
    }

    #[test]
    fn unknown_commands_are_rejected() {
        let err = parse("teleport 1 2").expect_err("unknown");
        let SessionError::Parse { line, reason, .. } = err else {
            panic!("expected parse error");
        };
        assert_eq!(line, 1);
        assert_eq!(reason, "unknown command 'teleport'");
    }

    #[test]
    fn missing_script_reports_path() {
        let err = load_script(Path::new("/definitely/missing.session")).expect_err("missing");
        assert!(err.to_string().contains("missing.session"));
    }
}
