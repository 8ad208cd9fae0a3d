//! Log history + broadcast store backing the `get-log` command.

use std::{
    collections::VecDeque,
    fmt::{self, Write as _},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::{SystemTime, UNIX_EPOCH},
};

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::traits::LogSink;

/// Default history size limit (1 MB).
const HISTORY_BYTES: usize = 1024 * 1024;

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        })
    }
}

/// One recorded log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Unix epoch milliseconds.
    pub timestamp_ms: u64,
    pub level: LogLevel,
    /// Who reported the entry, e.g. `session-3` or `popup`.
    pub source: String,
    pub message: String,
}

impl LogEntry {
    /// Create an entry stamped with the current time.
    #[must_use]
    pub fn now(level: LogLevel, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp_ms: now_ms(),
            level,
            source: source.into(),
            message: message.into(),
        }
    }

    fn approx_bytes(&self) -> usize {
        self.source.len() + self.message.len() + 32
    }

    /// Convert to an SSE event (requires `sse` feature).
    #[cfg(feature = "sse")]
    #[must_use]
    pub fn to_sse_event(&self) -> axum::response::sse::Event {
        axum::response::sse::Event::default()
            .event(self.level.to_string())
            .json_data(self)
            .unwrap_or_else(|_| axum::response::sse::Event::default().data(self.to_string()))
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}: {}",
            self.timestamp_ms, self.level, self.source, self.message
        )
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[derive(Clone)]
struct StoredEntry {
    entry: LogEntry,
    bytes: usize,
}

struct Inner {
    history: VecDeque<StoredEntry>,
    total_bytes: usize,
}

/// Log store with bounded history and live broadcast.
///
/// Every entry is also mirrored to `tracing`.
pub struct LogStore {
    inner: RwLock<Inner>,
    sender: broadcast::Sender<LogEntry>,
    limit_bytes: usize,
}

impl Default for LogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LogStore {
    /// Create a log store with the default history limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(HISTORY_BYTES)
    }

    /// Create a log store that keeps roughly `limit_bytes` of history.
    #[must_use]
    pub fn with_limit(limit_bytes: usize) -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self {
            inner: RwLock::new(Inner {
                history: VecDeque::with_capacity(32),
                total_bytes: 0,
            }),
            sender,
            limit_bytes,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Push an entry to live listeners and history.
    pub fn push(&self, entry: LogEntry) {
        mirror(&entry);
        let _ = self.sender.send(entry.clone()); // live listeners
        let bytes = entry.approx_bytes();

        let mut inner = self.write();
        while inner.total_bytes.saturating_add(bytes) > self.limit_bytes {
            if let Some(front) = inner.history.pop_front() {
                inner.total_bytes = inner.total_bytes.saturating_sub(front.bytes);
            } else {
                break;
            }
        }
        inner.history.push_back(StoredEntry { entry, bytes });
        inner.total_bytes = inner.total_bytes.saturating_add(bytes);
    }

    /// Get a receiver for live entries.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }

    /// Get a snapshot of the history.
    #[must_use]
    pub fn history(&self) -> Vec<LogEntry> {
        self.read().history.iter().map(|s| s.entry.clone()).collect()
    }

    /// Render the history as one line per entry.
    #[must_use]
    pub fn render(&self) -> String {
        let inner = self.read();
        let mut out = String::with_capacity(inner.total_bytes);
        for stored in &inner.history {
            let _ = writeln!(out, "{}", stored.entry);
        }
        out
    }

    /// Stream that yields history first, then live entries.
    #[must_use]
    pub fn history_plus_stream(&self) -> futures::stream::BoxStream<'static, LogEntry> {
        let (history, rx) = (self.history(), self.subscribe());

        let hist = futures::stream::iter(history);
        let live = BroadcastStream::new(rx).filter_map(|res| async move { res.ok() });

        Box::pin(hist.chain(live))
    }

    /// SSE stream (requires `sse` feature).
    #[cfg(feature = "sse")]
    #[must_use]
    pub fn sse_stream(
        &self,
    ) -> futures::stream::BoxStream<'static, Result<axum::response::sse::Event, std::convert::Infallible>>
    {
        self.history_plus_stream()
            .map(|entry| Ok::<_, std::convert::Infallible>(entry.to_sse_event()))
            .boxed()
    }
}

impl LogSink for LogStore {
    fn record(&self, entry: LogEntry) {
        self.push(entry);
    }
}

fn mirror(entry: &LogEntry) {
    let (source, message) = (&entry.source, &entry.message);
    match entry.level {
        LogLevel::Debug => tracing::debug!(%source, "{message}"),
        LogLevel::Info => tracing::info!(%source, "{message}"),
        LogLevel::Warn => tracing::warn!(%source, "{message}"),
        LogLevel::Error => tracing::error!(%source, "{message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(message: &str) -> LogEntry {
        LogEntry {
            timestamp_ms: 1_000,
            level: LogLevel::Info,
            source: "session-1".to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_render_one_line_per_entry() {
        let store = LogStore::new();
        store.record(entry("joined"));
        store.record(LogEntry {
            level: LogLevel::Warn,
            ..entry("lost mic")
        });

        assert_eq!(
            store.render(),
            "1000 [info] session-1: joined\n1000 [warn] session-1: lost mic\n"
        );
    }

    #[test]
    fn test_history_evicts_oldest() {
        let one = entry("first").approx_bytes();
        let store = LogStore::with_limit(one * 2);

        store.push(entry("first"));
        store.push(entry("secnd"));
        store.push(entry("third"));

        let messages: Vec<_> = store.history().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["secnd", "third"]);
    }

    #[test]
    fn test_entry_wire_format() {
        let json = serde_json::to_value(entry("hi")).unwrap();
        assert_eq!(json["timestampMs"], 1_000);
        assert_eq!(json["level"], "info");
    }

    #[tokio::test]
    async fn test_history_then_live() {
        let store = LogStore::new();
        store.push(entry("before"));

        let mut stream = store.history_plus_stream();
        store.push(entry("after"));

        assert_eq!(stream.next().await.unwrap().message, "before");
        assert_eq!(stream.next().await.unwrap().message, "after");
    }

    #[test]
    fn test_live_subscriber_receives_entries() {
        let store = LogStore::new();
        let mut rx = store.subscribe();
        store.push(entry("live"));

        let received = tokio_test::block_on(rx.recv()).unwrap();
        assert_eq!(received.message, "live");
    }
}
