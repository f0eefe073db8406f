//! Streaming pipeline: reader channel → filter → writer
//!
//! Runs until the reader channel closes. The pipeline keeps no buffer of
//! its own; a slow writer blocks `write`, which stops draining the reader
//! channel, which in turn blocks the reader.

use std::sync::Arc;

use async_channel::Receiver;
use contracts::{Entry, FilterOptions};
use status::Aggregator;
use tracing::{debug, instrument, warn};
use writer::WriterHandle;

/// Per-run totals, logged when the stream ends
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    pub read: u64,
    pub written: u64,
    pub filtered: u64,
    pub parse_errors: u64,
}

/// Drain `rx` into `writer`, emitting count events tagged with `seq`
#[instrument(name = "pipeline", skip_all, fields(seq = seq))]
pub async fn run(
    rx: Receiver<Entry>,
    writer: Arc<WriterHandle>,
    aggregator: Aggregator,
    filter: FilterOptions,
    seq: u64,
) -> PipelineSummary {
    let mut summary = PipelineSummary::default();

    while let Ok(mut entry) = rx.recv().await {
        if let Err(e) = entry.parse() {
            warn!(error = %e, "dropping unparsable entry");
            summary.parse_errors += 1;
            continue;
        }

        let cmd = entry.cmd_name.clone();
        observability::record_entry_read(&cmd);
        if let Err(e) = aggregator.add_read_count(seq, cmd.clone()).await {
            debug!(error = %e, "read count not recorded");
        }
        summary.read += 1;

        if !filter.allows(&cmd) {
            summary.filtered += 1;
            continue;
        }

        writer.write(entry).await;
        observability::record_entry_written(&cmd);
        if let Err(e) = aggregator.add_write_count(seq, cmd).await {
            debug!(error = %e, "write count not recorded");
        }
        summary.written += 1;
    }

    debug!(?summary, "reader channel closed");
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ContractError, EntrySink};
    use status::AggregatorSettings;
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    struct CollectSink {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl EntrySink for CollectSink {
        fn name(&self) -> &str {
            "collect"
        }

        async fn write(&mut self, entry: &Entry) -> Result<(), ContractError> {
            self.seen.lock().unwrap().push(entry.to_text());
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    fn feed(argvs: &[&[&str]]) -> Receiver<Entry> {
        let (tx, rx) = async_channel::unbounded();
        for argv in argvs {
            tx.try_send(Entry::from_args(argv.iter().copied())).unwrap();
        }
        rx
    }

    fn collect() -> (Arc<WriterHandle>, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = CollectSink { seen: seen.clone() };
        (Arc::new(WriterHandle::spawn(sink, 8)), seen)
    }

    #[tokio::test]
    async fn test_forwards_in_order() {
        let agg = Aggregator::spawn(AggregatorSettings::default(), None, CancellationToken::new());
        let (writer, seen) = collect();
        let rx = feed(&[&["SET", "a", "1"], &["SET", "b", "2"], &["DEL", "a"]]);

        let summary = run(rx, writer.clone(), agg, FilterOptions::default(), 1).await;
        writer.close().await;

        assert_eq!(summary.read, 3);
        assert_eq!(summary.written, 3);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["SET a 1".to_string(), "SET b 2".into(), "DEL a".into()]
        );
    }

    #[tokio::test]
    async fn test_unparsable_entry_skipped() {
        let agg = Aggregator::spawn(AggregatorSettings::default(), None, CancellationToken::new());
        let (writer, seen) = collect();
        let (tx, rx) = async_channel::unbounded();
        tx.try_send(Entry::new(Vec::new())).unwrap();
        tx.try_send(Entry::from_args(["PING"])).unwrap();
        drop(tx);

        let summary = run(rx, writer.clone(), agg, FilterOptions::default(), 1).await;
        writer.close().await;

        assert_eq!(summary.parse_errors, 1);
        assert_eq!(summary.written, 1);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_filter_blocks_writes_only() {
        let agg = Aggregator::spawn(AggregatorSettings::default(), None, CancellationToken::new());
        let (writer, seen) = collect();
        let rx = feed(&[&["SET", "a", "1"], &["FLUSHALL"], &["del", "a"]]);
        let filter = FilterOptions {
            block_commands: vec!["flushall".into()],
            ..Default::default()
        };

        let summary = run(rx, writer.clone(), agg, filter, 1).await;
        writer.close().await;

        assert_eq!(summary.read, 3);
        assert_eq!(summary.filtered, 1);
        assert_eq!(summary.written, 2);
        assert!(!seen.lock().unwrap().iter().any(|s| s.starts_with("FLUSHALL")));
    }
}
