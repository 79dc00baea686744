use std::collections::VecDeque;

use chrono::Local;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;

/// Nivel de un evento del sink, tal como lo muestra el dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogKind {
    #[serde(rename = "INFO")]
    Info,
    #[serde(rename = "ERROR")]
    Error,
    #[serde(rename = "PLAY")]
    Play,
}

/// Entrada estructurada del log del bot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub time: String,
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub message: String,
}

/// Sink de logs proceso-global: append-only, retiene las últimas N entradas
/// y las difunde en vivo a los suscriptores del dashboard.
pub struct LogSink {
    capacity: usize,
    entries: Mutex<VecDeque<LogEntry>>,
    tx: broadcast::Sender<LogEntry>,
}

impl LogSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
            tx,
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(LogKind::Info, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(LogKind::Error, message.into());
    }

    pub fn play(&self, message: impl Into<String>) {
        self.push(LogKind::Play, message.into());
    }

    fn push(&self, kind: LogKind, message: String) {
        let entry = LogEntry {
            time: Local::now().format("[%H:%M:%S]").to_string(),
            kind,
            message,
        };

        {
            let mut entries = self.entries.lock();
            entries.push_back(entry.clone());
            while entries.len() > self.capacity {
                entries.pop_front();
            }
        }

        // Sin suscriptores el send falla; no es un error
        let _ = self.tx.send(entry);
    }

    /// Últimas `limit` entradas, de más vieja a más nueva
    pub fn recent(&self, limit: usize) -> Vec<LogEntry> {
        let entries = self.entries.lock();
        let skip = entries.len().saturating_sub(limit);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Stream en vivo para el WebSocket del dashboard
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_retains_most_recent_entries() {
        let sink = LogSink::new(3);
        for i in 0..5 {
            sink.info(format!("m{i}"));
        }

        let messages: Vec<String> = sink.recent(10).into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["m2", "m3", "m4"]);
        assert_eq!(sink.len(), 3);
    }

    #[test]
    fn test_recent_respects_limit() {
        let sink = LogSink::new(10);
        for i in 0..6 {
            sink.play(format!("t{i}"));
        }

        let messages: Vec<String> = sink.recent(2).into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["t4", "t5"]);
    }

    #[tokio::test]
    async fn test_broadcasts_to_subscribers() {
        let sink = LogSink::new(10);
        let mut rx = sink.subscribe();

        sink.error("se rompió algo");

        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.kind, LogKind::Error);
        assert_eq!(entry.message, "se rompió algo");
    }
}
