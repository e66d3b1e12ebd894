use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tracing_appender::rolling;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Prefix of every file written by the rolling appender.
const LOG_FILE_PREFIX: &str = "emg.log";

/// Log severity level, mirrored from tracing so hosts don't need it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for LogLevel {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => LogLevel::Trace,
            tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::INFO => LogLevel::Info,
            tracing::Level::WARN => LogLevel::Warn,
            tracing::Level::ERROR => LogLevel::Error,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// One captured log line.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Severity.
    pub level: LogLevel,
    /// Module path of the call site.
    pub target: String,
    /// Rendered message and fields.
    pub message: String,
}

/// Shared ring buffer of recent log entries.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    inner: Arc<Mutex<VecDeque<LogEntry>>>,
    capacity: usize,
}

impl LogBuffer {
    /// Buffer keeping at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest one when full.
    pub fn push(&self, entry: LogEntry) {
        if self.capacity == 0 {
            return;
        }
        if let Ok(mut buf) = self.inner.lock() {
            if buf.len() >= self.capacity {
                buf.pop_front();
            }
            buf.push_back(entry);
        }
    }

    /// Remove and return every buffered entry, oldest first.
    pub fn drain(&self) -> Vec<LogEntry> {
        match self.inner.lock() {
            Ok(mut buf) => buf.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Number of buffered entries at or above `level`.
    pub fn count_at_least(&self, level: LogLevel) -> usize {
        match self.inner.lock() {
            Ok(buf) => buf.iter().filter(|e| e.level >= level).count(),
            Err(_) => 0,
        }
    }

    /// Entries currently held.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|b| b.len()).unwrap_or(0)
    }

    /// Whether no entry is held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Knobs for [`init`]. The host fills these from its own configuration.
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Filter used when neither `EMG_LOG` nor `RUST_LOG` is set.
    pub default_filter: String,
    /// Rolled files older than this are deleted at start-up.
    pub retention_days: u64,
    /// Capacity of the in-memory [`LogBuffer`].
    pub buffer_lines: usize,
    /// Also write human-readable lines to stderr.
    pub stderr: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            retention_days: 7,
            buffer_lines: 1000,
            stderr: false,
        }
    }
}

/// Return the log directory path.
///
/// Precedence: `EMG_LOG_DIR` env var > platform data dir > `./logs`.
pub fn log_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("EMG_LOG_DIR") {
        return PathBuf::from(dir);
    }
    if let Some(data) = dirs::data_dir() {
        return data.join("emg").join("logs");
    }
    PathBuf::from("logs")
}

/// Oldest modification time a log may have to survive cleanup, or `None`
/// when the window reaches past what `SystemTime` can represent.
fn retention_cutoff(now: SystemTime, max_age_days: u64) -> Option<SystemTime> {
    let window = max_age_days.checked_mul(86_400).map(Duration::from_secs)?;
    now.checked_sub(window)
}

/// Delete rolled `emg.log*` files older than `max_age_days` in `log_path`.
/// Other files in the directory are left alone.
fn cleanup_old_logs(log_path: &Path, max_age_days: u64) {
    let Some(cutoff) = retention_cutoff(SystemTime::now(), max_age_days) else {
        return;
    };
    let Ok(entries) = std::fs::read_dir(log_path) else {
        return;
    };
    for entry in entries.flatten() {
        if !entry.file_name().to_string_lossy().starts_with(LOG_FILE_PREFIX) {
            continue;
        }
        let stale = entry
            .metadata()
            .and_then(|m| m.modified())
            .map(|modified| modified < cutoff)
            .unwrap_or(false);
        if stale {
            let _ = std::fs::remove_file(entry.path());
        }
    }
}

/// Tracing layer feeding a [`LogBuffer`].
struct BufferLayer {
    buffer: LogBuffer,
}

impl<S: tracing::Subscriber> Layer<S> for BufferLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.buffer.push(LogEntry {
            level: (*event.metadata().level()).into(),
            target: event.metadata().target().to_string(),
            message: visitor.finish(),
        });
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn finish(self) -> String {
        match (self.message, self.fields.is_empty()) {
            (Some(msg), true) => msg,
            (Some(msg), false) => format!("{} {}", msg, self.fields.join(" ")),
            (None, _) => self.fields.join(" "),
        }
    }
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }
}

/// Initialize the logging subsystem and return the shared recent-log buffer.
///
/// Filter: `EMG_LOG`, then `RUST_LOG`, then `settings.default_filter`.
/// File output: daily rotation in [`log_dir`], pruned to
/// `settings.retention_days`.
pub fn init(settings: &LogSettings) -> LogBuffer {
    let buffer = LogBuffer::new(settings.buffer_lines);

    let filter = EnvFilter::try_from_env("EMG_LOG")
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(&settings.default_filter));

    let log_path = log_dir();
    if let Err(e) = std::fs::create_dir_all(&log_path) {
        eprintln!(
            "warning: failed to create log directory {:?}: {}",
            log_path, e
        );
    }
    cleanup_old_logs(&log_path, settings.retention_days);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(rolling::daily(&log_path, LOG_FILE_PREFIX))
        .with_ansi(false)
        .with_target(true);

    let stderr_layer = settings.stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .with(BufferLayer {
            buffer: buffer.clone(),
        })
        .init();

    buffer
}
