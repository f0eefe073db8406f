//! Reader over entries listed inline in the task config
//!
//! Mostly useful for smoke tests and one-off repairs: the entries are sent
//! once in order, then the stream ends.

use contracts::{Entry, Reader, StaticReaderOptions, Statusable};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::producer::ReadLifecycle;

const NAME: &str = "static_reader";

/// Inline entry reader
pub struct StaticReader {
    entries: Vec<Entry>,
    lifecycle: ReadLifecycle,
}

impl StaticReader {
    /// Create from config options
    pub fn new(options: &StaticReaderOptions, capacity: usize) -> Self {
        let entries = options
            .entries
            .iter()
            .map(|argv| Entry::new(argv.clone()).with_db(options.db))
            .collect();
        Self::from_entries(entries, capacity)
    }

    /// Create from ready-made entries
    pub fn from_entries(entries: Vec<Entry>, capacity: usize) -> Self {
        Self {
            entries,
            lifecycle: ReadLifecycle::new(NAME, capacity),
        }
    }
}

impl Statusable for StaticReader {
    fn status(&self) -> serde_json::Value {
        let snap = self.lifecycle.metrics().snapshot();
        json!({
            "name": NAME,
            "total": self.entries.len(),
            "sent": snap.entries_read,
            "backlog": self.lifecycle.backlog(),
            "finished": snap.finished,
        })
    }

    fn status_string(&self) -> String {
        let snap = self.lifecycle.metrics().snapshot();
        format!("sent=[{}/{}]", snap.entries_read, self.entries.len())
    }

    fn status_consistent(&self) -> bool {
        self.lifecycle.metrics().snapshot().finished && self.lifecycle.backlog() == 0
    }
}

impl Reader for StaticReader {
    fn start_read(&self, cancel: CancellationToken) -> async_channel::Receiver<Entry> {
        let entries = self.entries.clone();
        self.lifecycle.start(cancel, move |sender| async move {
            for entry in entries {
                if !sender.send(entry).await {
                    return;
                }
            }
            sender.metrics().mark_finished();
        })
    }

    fn shutdown(&self) {
        self.lifecycle.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sends_entries_in_order() {
        let options = StaticReaderOptions {
            entries: vec![
                vec!["SET".into(), "a".into(), "1".into()],
                vec!["DEL".into(), "a".into()],
            ],
            db: 2,
        };
        let reader = StaticReader::new(&options, 16);
        let rx = reader.start_read(CancellationToken::new());

        let first = rx.recv().await.unwrap();
        assert_eq!(first.argv[0], "SET");
        assert_eq!(first.db, 2);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.argv[0], "DEL");
        assert!(rx.recv().await.is_err());

        assert!(reader.status_consistent());
        assert_eq!(reader.status()["sent"], 2);
        assert_eq!(reader.id_offset(), None);
    }

    #[tokio::test]
    async fn test_not_consistent_before_finish() {
        let reader = StaticReader::from_entries(vec![Entry::from_args(["PING"])], 4);
        assert!(!reader.status_consistent());
        assert_eq!(reader.status_string(), "sent=[0/1]");
    }
}
