mod cli;
mod dead_letter;
mod logging;
mod render;
mod settings;
mod source;

use clap::Parser;
use eventline::{decode_events, ChannelSink, DiagnosticSink, TracingSink};
use futures::StreamExt;
use std::process::ExitCode;
use std::sync::Arc;

use crate::cli::Cli;
use crate::render::EventWriter;
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitClass {
    ConfigInvalid,
    SourceFailed,
    DecodeFailed,
    OutputFailed,
}

impl ExitClass {
    fn code(self) -> u8 {
        match self {
            Self::ConfigInvalid => 2,
            Self::SourceFailed => 3,
            Self::DecodeFailed => 4,
            Self::OutputFailed => 5,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::ConfigInvalid => "config_invalid",
            Self::SourceFailed => "source_failed",
            Self::DecodeFailed => "decode_failed",
            Self::OutputFailed => "output_failed",
        }
    }
}

struct Failure {
    class: ExitClass,
    error: anyhow::Error,
}

impl Failure {
    fn new(class: ExitClass, error: impl Into<anyhow::Error>) -> Self {
        Self {
            class,
            error: error.into(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = logging::init(cli.log_format) {
        eprintln!("{:#}", err);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            tracing::error!(exit_class = failure.class.label(), "{:#}", failure.error);
            ExitCode::from(failure.class.code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), Failure> {
    let settings =
        Settings::resolve(&cli).map_err(|err| Failure::new(ExitClass::ConfigInvalid, err))?;

    let source = source::open(&cli.input(), cli.last_event_id.as_deref())
        .await
        .map_err(|err| Failure::new(ExitClass::SourceFailed, err))?;

    let (sink, writer) = match &settings.dead_letter_dir {
        Some(dir) => {
            let (sink, rx) = ChannelSink::new(dead_letter::QUEUE_CAPACITY);
            let sink: Arc<dyn DiagnosticSink> = Arc::new(sink);
            (sink, Some(dead_letter::spawn(dir.clone(), rx)))
        }
        None => (Arc::new(TracingSink) as Arc<dyn DiagnosticSink>, None),
    };

    tracing::debug!(
        max_line_size = settings.decoder.max_line_size,
        overflow_mode = %settings.decoder.overflow_mode,
        "decoding"
    );

    let mut events = decode_events(source, &settings.decoder, sink);
    let mut output = EventWriter::new(tokio::io::stdout(), settings.output);

    let outcome = loop {
        let next = tokio::select! {
            next = events.next() => next,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                None
            }
        };
        match next {
            Some(Ok(event)) => {
                if let Err(err) = output.write(&event).await {
                    break Err(Failure::new(ExitClass::OutputFailed, err));
                }
            }
            Some(Err(err)) => break Err(Failure::new(ExitClass::DecodeFailed, err)),
            None => break Ok(()),
        }
    };

    let stats = events.line_stats();
    tracing::info!(
        events = events.event_count(),
        lines = stats.lines,
        dropped = stats.dropped,
        truncated = stats.truncated,
        rerouted = stats.rerouted,
        last_event_id = events.last_event_id(),
        "stream finished"
    );

    // Closes the diagnostic channel so the writer can drain and exit.
    drop(events);
    if let Some(writer) = writer {
        match writer.await {
            Ok(Ok(written)) if written > 0 => {
                tracing::info!(written, "dead-letter files written");
            }
            Ok(Ok(_)) => {}
            Ok(Err(err)) => return Err(Failure::new(ExitClass::OutputFailed, err)),
            Err(err) => return Err(Failure::new(ExitClass::OutputFailed, err)),
        }
    }

    outcome
}
