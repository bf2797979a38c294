//! Self-logging
//!
//! The forwarder's own messages go through `tracing` to stdout or stderr,
//! rendered with a `%(field)s` pattern such as `%(asctime)s %(levelname)s:
//! %(message)s`.

use crate::destination::ConsoleStream;
use crate::formatter::TimeFormat;
use chrono::Local;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, prelude::*};

static FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"%\((?P<name>[A-Za-z_]+)\)(?P<left>-)?(?P<width>\d+)?s|%%")
        .unwrap_or_else(|e| panic!("self-log field pattern is invalid: {e}"))
});

/// Crates whose debug output drowns out ours.
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "h2", "rustls"];

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid self-log format: {0}")]
    InvalidFormat(String),
    #[error("Invalid self-log filter '{directives}': {reason}")]
    InvalidFilter { directives: String, reason: String },
    #[error("Self-logging is already set up")]
    AlreadyInitialized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Attribute {
    AscTime,
    LevelName,
    Name,
    Message,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Field {
        attribute: Attribute,
        width: usize,
        left: bool,
    },
}

/// Event formatter for a `%(field)s` self-log pattern.
#[derive(Debug, Clone)]
pub struct SelfLogFormat {
    pieces: Vec<Piece>,
    time_format: TimeFormat,
}

impl SelfLogFormat {
    pub fn parse(pattern: &str, time_format: TimeFormat) -> Result<Self, LoggingError> {
        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut last = 0;

        for found in FIELD.captures_iter(pattern) {
            let Some(whole) = found.get(0) else { continue };
            literal.push_str(&pattern[last..whole.start()]);
            last = whole.end();

            let Some(name) = found.name("name") else {
                literal.push('%');
                continue;
            };
            let attribute = match name.as_str() {
                "asctime" => Attribute::AscTime,
                "levelname" => Attribute::LevelName,
                "name" => Attribute::Name,
                "message" => Attribute::Message,
                other => {
                    return Err(LoggingError::InvalidFormat(format!(
                        "unsupported field '%({other})s'"
                    )));
                }
            };
            if !literal.is_empty() {
                pieces.push(Piece::Literal(std::mem::take(&mut literal)));
            }
            pieces.push(Piece::Field {
                attribute,
                width: found
                    .name("width")
                    .and_then(|w| w.as_str().parse().ok())
                    .unwrap_or(0),
                left: found.name("left").is_some(),
            });
        }
        literal.push_str(&pattern[last..]);
        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        Ok(Self {
            pieces,
            time_format,
        })
    }
}

fn level_name(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARNING",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
}

impl<S, N> FormatEvent<S, N> for SelfLogFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut value = String::new();
        for piece in &self.pieces {
            let (attribute, width, left) = match piece {
                Piece::Literal(text) => {
                    writer.write_str(text)?;
                    continue;
                }
                Piece::Field {
                    attribute,
                    width,
                    left,
                } => (attribute, *width, *left),
            };

            value.clear();
            match attribute {
                Attribute::AscTime => {
                    value.push_str(&self.time_format.render(&Local::now().fixed_offset()))
                }
                Attribute::LevelName => value.push_str(level_name(event.metadata().level())),
                Attribute::Name => value.push_str(event.metadata().target()),
                Attribute::Message => ctx.format_fields(Writer::new(&mut value), event)?,
            }
            if left {
                write!(writer, "{value:<width$}")?;
            } else {
                write!(writer, "{value:>width$}")?;
            }
        }
        writeln!(writer)
    }
}

/// Where and how self-log messages are written.
#[derive(Debug, Clone)]
pub struct SelfLogSettings {
    pub dest: ConsoleStream,
    pub format: String,
    pub time_format: String,
    pub debug: bool,
}

impl SelfLogSettings {
    pub fn filter_directives(&self) -> String {
        let level = if self.debug { "debug" } else { "info" };
        std::iter::once(level.to_string())
            .chain(QUIET_TARGETS.iter().map(|target| format!("{target}=warn")))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Install the global self-log subscriber. Can succeed only once per
/// process.
pub fn setup_self_logging(settings: &SelfLogSettings) -> Result<(), LoggingError> {
    let time_format = TimeFormat::parse(&settings.time_format)
        .map_err(|e| LoggingError::InvalidFormat(e.to_string()))?;
    let format = SelfLogFormat::parse(&settings.format, time_format)?;

    let directives = settings.filter_directives();
    let filter =
        EnvFilter::try_new(&directives).map_err(|e| LoggingError::InvalidFilter {
            directives: directives.clone(),
            reason: e.to_string(),
        })?;

    let writer = match settings.dest {
        ConsoleStream::Stdout => BoxMakeWriter::new(std::io::stdout),
        ConsoleStream::Stderr => BoxMakeWriter::new(std::io::stderr),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .event_format(format),
        )
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Capture {
        type Writer = Capture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture(pattern: &str, emit: impl FnOnce()) -> String {
        let sink = Capture::default();
        let format = SelfLogFormat::parse(pattern, TimeFormat::Iso8601).unwrap();
        let subscriber = tracing_subscriber::registry().with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(sink.clone())
                .event_format(format),
        );
        tracing::subscriber::with_default(subscriber, emit);
        let bytes = sink.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_default_pattern() {
        let out = capture("%(levelname)s: %(message)s", || {
            tracing::warn!("Logging off from HMC");
        });
        assert_eq!(out, "WARNING: Logging off from HMC\n");
    }

    #[test]
    fn test_name_and_padding() {
        let out = capture("[%(levelname)-7s] %(name)s %% %(message)s", || {
            tracing::info!(target: "hmc_log_forwarder", "stopped");
        });
        assert_eq!(out, "[INFO   ] hmc_log_forwarder % stopped\n");
    }

    #[test]
    fn test_asctime_uses_time_format() {
        let out = capture("%(asctime)s %(message)s", || tracing::info!("x"));
        let (stamp, rest) = out.split_once(' ').unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
        assert_eq!(rest, "x\n");
    }

    #[test]
    fn test_unknown_attribute_rejected() {
        assert!(matches!(
            SelfLogFormat::parse("%(process)d %(funcName)s", TimeFormat::Iso8601),
            Err(LoggingError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_filter_directives() {
        let settings = SelfLogSettings {
            dest: ConsoleStream::Stderr,
            format: "%(message)s".into(),
            time_format: "iso8601".into(),
            debug: true,
        };
        let directives = settings.filter_directives();
        assert!(directives.starts_with("debug,"));
        assert!(directives.contains("reqwest=warn"));
    }
}
