//! Named, leveled loggers and banner formatting.
//!
//! A `Logger` is a `tracing` subscriber with a fixed line format:
//!
//! ```text
//! 2026-10-17T09:14:03.512803Z - task_dispatch - INFO - message
//! ```
//!
//! Loggers are independent of each other. Use `in_scope` to route the
//! dispatcher's own `tracing` events through a logger for the duration of a
//! closure, or `install_global` to make it the process-wide default.

use anyhow::{Context, Result};
use std::fmt;
use tracing::{Dispatch, Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::registry::LookupSpan;

/// Default padding on each side of a banner title.
pub const DEFAULT_HEADER_PADDING: usize = 3;

/// Default banner rule character.
pub const DEFAULT_HEADER_CHAR: char = '=';

/// `{timestamp} - {name} - {LEVEL} - {message}`
struct LineFormat {
    name: String,
    timer: SystemTime,
}

impl<S, N> FormatEvent<S, N> for LineFormat
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
        self.timer.format_time(&mut writer)?;
        write!(writer, " - {} - {} - ", self.name, event.metadata().level())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// A named logger writing formatted lines at or above its level.
#[derive(Clone)]
pub struct Logger {
    name: String,
    level: Level,
    dispatch: Dispatch,
}

impl Logger {
    pub const DEFAULT_NAME: &'static str = "task_dispatch";
    pub const DEFAULT_LEVEL: Level = Level::DEBUG;

    /// Creates a logger writing to stderr.
    ///
    /// `name` defaults to `task_dispatch` and `level` to `DEBUG`.
    pub fn new(name: Option<&str>, level: Option<Level>) -> Self {
        Self::with_writer(name, level, std::io::stderr)
    }

    /// Creates a logger writing to `writer`.
    pub fn with_writer<W>(name: Option<&str>, level: Option<Level>, writer: W) -> Self
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let name = name.unwrap_or(Self::DEFAULT_NAME).to_string();
        let level = level.unwrap_or(Self::DEFAULT_LEVEL);

        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_ansi(false)
            .with_writer(writer)
            .event_format(LineFormat {
                name: name.clone(),
                timer: SystemTime,
            })
            .finish();

        Self {
            name,
            level,
            dispatch: Dispatch::new(subscriber),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> Level {
        self.level
    }

    /// Runs `f` with this logger as the current thread's default subscriber.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    /// Makes this logger the process-wide default. Fails if one is already set.
    pub fn install_global(&self) -> Result<()> {
        tracing::dispatcher::set_global_default(self.dispatch.clone())
            .with_context(|| format!("Cannot install logger {:?} globally", self.name))
    }

    pub fn log(&self, level: Level, message: &str) {
        self.in_scope(|| match level {
            Level::ERROR => tracing::error!("{}", message),
            Level::WARN => tracing::warn!("{}", message),
            Level::INFO => tracing::info!("{}", message),
            Level::DEBUG => tracing::debug!("{}", message),
            _ => tracing::trace!("{}", message),
        });
    }

    pub fn error(&self, message: &str) {
        self.log(Level::ERROR, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::WARN, message);
    }

    pub fn info(&self, message: &str) {
        self.log(Level::INFO, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(Level::DEBUG, message);
    }

    /// Logs `text` as a default banner at INFO.
    pub fn header(&self, text: &str) {
        self.info(&format_header(text, DEFAULT_HEADER_PADDING, DEFAULT_HEADER_CHAR));
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &self.level)
            .finish()
    }
}

/// Formats a three-line banner around `text`.
///
/// The title is upper-cased and right-aligned after `padding` fill columns;
/// the rules above and below are `padding` characters wider than the text on
/// each side. The result starts and ends with a newline.
pub fn format_header(text: &str, padding: usize, pad_char: char) -> String {
    let length = text.chars().count();
    let rule: String = std::iter::repeat(pad_char).take(padding * 2 + length).collect();
    let title = format!("{:>width$}", text.to_uppercase(), width = padding + length);
    format!("\n{}\n{}\n{}\n", rule, title, rule)
}
