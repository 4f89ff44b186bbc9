use clap::Parser;
use eventline::OverflowMode;
use std::path::PathBuf;

use crate::logging::LogFormat;
use crate::render::OutputFormat;

/// Decode a Server-Sent Events stream with a bounded line buffer.
#[derive(Debug, Parser)]
#[command(name = "eventline", version, about, long_about = None)]
pub struct Cli {
    /// File to decode, or `-` for stdin (the default)
    #[arg(value_name = "INPUT", conflicts_with = "url")]
    pub input: Option<PathBuf>,

    /// Fetch the stream over HTTP(S) instead of reading a file
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Sent as `Last-Event-ID` when fetching from a URL
    #[arg(long, value_name = "ID", requires = "url")]
    pub last_event_id: Option<String>,

    /// YAML settings file; flags override its values
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Longest accepted line in bytes
    #[arg(long, value_name = "BYTES")]
    pub max_line_size: Option<usize>,

    /// fail-stream, log-and-skip, truncate or dead-letter
    #[arg(long, value_name = "MODE")]
    pub overflow: Option<OverflowMode>,

    /// Directory receiving dead-lettered lines
    #[arg(long, value_name = "DIR")]
    pub dead_letter_dir: Option<PathBuf>,

    /// Event output format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Log output format (logs go to stderr, level from RUST_LOG)
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Where the chunk source comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Stdin,
    File(PathBuf),
    Url(String),
}

impl Cli {
    pub fn input(&self) -> Input {
        if let Some(url) = &self.url {
            return Input::Url(url.clone());
        }
        match &self.input {
            Some(path) if path.as_os_str() != "-" => Input::File(path.clone()),
            _ => Input::Stdin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("eventline").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults_to_stdin() {
        let cli = parse(&[]).unwrap();
        assert_eq!(cli.input(), Input::Stdin);
        assert_eq!(cli.log_format, LogFormat::Text);
        assert!(cli.overflow.is_none());

        assert_eq!(parse(&["-"]).unwrap().input(), Input::Stdin);
    }

    #[test]
    fn test_file_input_and_overrides() {
        let cli = parse(&[
            "events.txt",
            "--max-line-size",
            "4096",
            "--overflow",
            "dead-letter",
            "--dead-letter-dir",
            "out",
            "--format",
            "text",
        ])
        .unwrap();

        assert_eq!(cli.input(), Input::File(PathBuf::from("events.txt")));
        assert_eq!(cli.max_line_size, Some(4096));
        assert_eq!(cli.overflow, Some(OverflowMode::DeadLetter));
        assert_eq!(cli.dead_letter_dir, Some(PathBuf::from("out")));
        assert_eq!(cli.format, Some(OutputFormat::Text));
    }

    #[test]
    fn test_overflow_spellings() {
        for spelling in ["log_and_skip", "log-and-skip", "LogAndSkip"] {
            let cli = parse(&["--overflow", spelling]).unwrap();
            assert_eq!(cli.overflow, Some(OverflowMode::LogAndSkip));
        }
        assert!(parse(&["--overflow", "explode"]).is_err());
    }

    #[test]
    fn test_url_input() {
        let cli = parse(&["--url", "http://localhost:8080/events", "--last-event-id", "41"]).unwrap();
        assert_eq!(
            cli.input(),
            Input::Url("http://localhost:8080/events".to_string())
        );
        assert_eq!(cli.last_event_id.as_deref(), Some("41"));
    }

    #[test]
    fn test_url_conflicts_with_file() {
        assert!(parse(&["events.txt", "--url", "http://localhost/"]).is_err());
        assert!(parse(&["--last-event-id", "1"]).is_err());
    }
}
