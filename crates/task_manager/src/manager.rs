//! TaskManager - single-active-task lifecycle
//!
//! Idle → Running → Idle. The active slot sits behind an async mutex held
//! across construction, so concurrent starts serialise and the second one
//! sees the first task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_channel::Receiver;
use contracts::{AdvancedOptions, Entry, FilterOptions, Reader, TaskConfig};
use status::{Aggregator, Attachment, TaskSnapshot};
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use writer::WriterHandle;

use crate::error::TaskError;
use crate::factory::{ComponentFactory, ConfiguredFactory, ReaderGuard};
use crate::pipeline;

/// The running task
struct ActiveTask {
    seq: u64,
    id: String,
    cancel: CancellationToken,
    reader: Arc<dyn Reader>,
    writer: Arc<WriterHandle>,
}

type Slot = Arc<Mutex<Option<ActiveTask>>>;

/// Owns the active-task slot
pub struct TaskManager<F = ConfiguredFactory> {
    factory: F,
    advanced: AdvancedOptions,
    aggregator: Aggregator,
    slot: Slot,
    next_seq: AtomicU64,
    /// `true` while a task occupies the slot
    running: watch::Sender<bool>,
}

impl<F> TaskManager<F>
where
    F: ComponentFactory + Send + Sync + 'static,
{
    pub fn new(factory: F, advanced: AdvancedOptions, aggregator: Aggregator) -> Self {
        Self {
            factory,
            advanced,
            aggregator,
            slot: Arc::new(Mutex::new(None)),
            next_seq: AtomicU64::new(0),
            running: watch::Sender::new(false),
        }
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Validate, construct and start a task
    ///
    /// # Errors
    /// - `AlreadyActive` when a task is running
    /// - `MissingTaskId` / `InvalidConfig` for a bad config
    /// - `Construction` when the reader or writer cannot be built
    #[instrument(name = "task_start", skip(self, config), fields(task_id = %config.task_id))]
    pub async fn start(&self, config: TaskConfig) -> Result<(), TaskError> {
        let mut slot = self.slot.lock().await;
        if let Some(active) = slot.as_ref() {
            return Err(TaskError::AlreadyActive(active.id.clone()));
        }
        if config.task_id.trim().is_empty() {
            return Err(TaskError::MissingTaskId);
        }
        config_loader::validate_task(&config, &self.advanced).map_err(TaskError::InvalidConfig)?;

        let reader = self
            .factory
            .create_reader(&config)
            .map_err(TaskError::from_factory)?;
        let guard = ReaderGuard::new(reader);
        let writer = self
            .factory
            .create_writer(&config)
            .await
            .map_err(TaskError::from_factory)?;
        let reader = guard.into_inner();

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let attached = self
            .aggregator
            .attach(Attachment {
                seq,
                task_id: config.task_id.clone(),
                config: config.to_json_value(),
                reader: Arc::clone(&reader),
                writer: writer.clone(),
            })
            .await;
        if let Err(e) = attached {
            writer.close().await;
            reader.shutdown();
            return Err(e.into());
        }

        let cancel = CancellationToken::new();
        let rx = reader.start_read(cancel.clone());
        tokio::spawn(drive(
            rx,
            Arc::clone(&self.slot),
            self.running.clone(),
            self.aggregator.clone(),
            writer.clone(),
            config.filter.clone(),
            seq,
        ));

        info!(seq, "task started");
        *slot = Some(ActiveTask {
            seq,
            id: config.task_id,
            cancel,
            reader,
            writer,
        });
        self.running.send_replace(true);
        Ok(())
    }

    /// Stop the task if `task_id` is the active one
    ///
    /// The slot is released before teardown, so a slow target never holds
    /// up other requests.
    #[instrument(name = "task_cancel", skip(self))]
    pub async fn cancel(&self, task_id: &str) -> Result<(), TaskError> {
        let task = {
            let mut slot = self.slot.lock().await;
            if !slot.as_ref().is_some_and(|t| t.id == task_id) {
                return Err(TaskError::NoTask);
            }
            slot.take().ok_or(TaskError::NoTask)?
        };

        teardown(&task).await;
        if let Err(e) = self.aggregator.detach(task.seq).await {
            warn!(error = %e, "failed to detach stat");
        }
        mark_idle(&self.slot, &self.running).await;
        info!("task cancelled");
        Ok(())
    }

    /// Config and statistics of the running or just-completed task
    pub async fn info(&self, task_id: &str) -> Result<TaskSnapshot, TaskError> {
        self.aggregator
            .snapshot(task_id)
            .await?
            .ok_or(TaskError::NoTask)
    }

    /// Liveness of the running task
    pub async fn health(&self, task_id: &str) -> Result<(), TaskError> {
        let slot = self.slot.lock().await;
        match slot.as_ref() {
            Some(task) if task.id == task_id => Ok(()),
            _ => Err(TaskError::NoTask),
        }
    }

    /// Id of the running task
    pub async fn active_task_id(&self) -> Option<String> {
        self.slot.lock().await.as_ref().map(|t| t.id.clone())
    }

    /// Resolves once no task is running
    pub async fn wait_idle(&self) {
        let mut rx = self.running.subscribe();
        let _ = rx.wait_for(|running| !*running).await;
    }

    /// Cancel the running task, if any, on process exit
    #[instrument(name = "task_manager_shutdown", skip(self))]
    pub async fn shutdown(&self) {
        let Some(task_id) = self.active_task_id().await else {
            return;
        };
        if let Err(e) = self.cancel(&task_id).await {
            // 任务恰好自然结束
            info!(error = %e, "nothing to cancel on shutdown");
        }
    }
}

/// Cancel the reader, then drain and close the writer
async fn teardown(task: &ActiveTask) {
    task.cancel.cancel();
    task.writer.close().await;
    task.reader.shutdown();
}

/// Report idle unless another task took the slot meanwhile
async fn mark_idle(slot: &Slot, running: &watch::Sender<bool>) {
    let slot = slot.lock().await;
    if slot.is_none() {
        running.send_replace(false);
    }
}

/// Run the pipeline and complete the task when the stream ends on its own
async fn drive(
    rx: Receiver<Entry>,
    slot: Slot,
    running: watch::Sender<bool>,
    aggregator: Aggregator,
    writer: Arc<WriterHandle>,
    filter: FilterOptions,
    seq: u64,
) {
    let summary = pipeline::run(rx, Arc::clone(&writer), aggregator.clone(), filter, seq).await;
    writer.close().await;

    let task = {
        let mut slot = slot.lock().await;
        if !slot.as_ref().is_some_and(|t| t.seq == seq) {
            // 已被 cancel 清理
            return;
        }
        slot.take()
    };
    let Some(task) = task else {
        return;
    };

    task.reader.shutdown();
    if let Err(e) = aggregator.complete(seq).await {
        warn!(error = %e, "failed to record completed stat");
    }
    mark_idle(&slot, &running).await;
    info!(
        task_id = %task.id,
        read = summary.read,
        written = summary.written,
        filtered = summary.filtered,
        "task completed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use contracts::{
        ContractError, EntrySink, LogWriterOptions, MockReaderOptions, RedisWriterOptions,
        StaticReaderOptions, Statusable,
    };
    use rand::Rng;
    use status::{AggregatorSettings, TaskState};

    /// Reader wrapper counting `shutdown` calls
    struct TrackedReader {
        inner: Arc<dyn Reader>,
        shutdowns: Arc<AtomicUsize>,
    }

    impl Statusable for TrackedReader {
        fn status(&self) -> serde_json::Value {
            self.inner.status()
        }

        fn status_string(&self) -> String {
            self.inner.status_string()
        }

        fn status_consistent(&self) -> bool {
            self.inner.status_consistent()
        }
    }

    impl Reader for TrackedReader {
        fn start_read(&self, cancel: CancellationToken) -> Receiver<Entry> {
            self.inner.start_read(cancel)
        }

        fn shutdown(&self) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            self.inner.shutdown();
        }
    }

    struct CountingSink {
        written: Arc<std::sync::Mutex<Vec<String>>>,
        closes: Arc<AtomicUsize>,
        /// Target that stops reading
        stalled: bool,
    }

    impl EntrySink for CountingSink {
        fn name(&self) -> &str {
            "counting"
        }

        async fn write(&mut self, entry: &Entry) -> Result<(), ContractError> {
            if self.stalled {
                std::future::pending::<()>().await;
            }
            self.written.lock().unwrap().push(entry.to_text());
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockFactory {
        fail_writer: bool,
        stall_writes: bool,
        reader_shutdowns: Arc<AtomicUsize>,
        sink_closes: Arc<AtomicUsize>,
        written: Arc<std::sync::Mutex<Vec<String>>>,
    }

    impl ComponentFactory for MockFactory {
        fn create_reader(&self, task: &TaskConfig) -> Result<Arc<dyn Reader>, ContractError> {
            Ok(Arc::new(TrackedReader {
                inner: reader::create_reader(task, 16)?,
                shutdowns: self.reader_shutdowns.clone(),
            }))
        }

        async fn create_writer(
            &self,
            _task: &TaskConfig,
        ) -> Result<Arc<WriterHandle>, ContractError> {
            if self.fail_writer {
                return Err(ContractError::sink_connection("counting", "connection refused"));
            }
            let sink = CountingSink {
                written: self.written.clone(),
                closes: self.sink_closes.clone(),
                stalled: self.stall_writes,
            };
            Ok(Arc::new(
                WriterHandle::spawn(sink, 16).with_close_timeout(Duration::from_millis(300)),
            ))
        }
    }

    fn manager(factory: MockFactory) -> TaskManager<MockFactory> {
        let settings = AggregatorSettings {
            log_interval: Duration::ZERO,
            ..Default::default()
        };
        let aggregator = Aggregator::spawn(settings, None, CancellationToken::new());
        TaskManager::new(factory, AdvancedOptions::default(), aggregator)
    }

    fn static_task(id: &str, entries: &[&[&str]]) -> TaskConfig {
        TaskConfig {
            task_id: id.to_string(),
            static_reader: Some(StaticReaderOptions {
                entries: entries
                    .iter()
                    .map(|argv| argv.iter().map(|s| s.to_string()).collect())
                    .collect(),
                db: 0,
            }),
            log_writer: Some(LogWriterOptions {}),
            ..Default::default()
        }
    }

    /// 持续产生数据直到被取消的任务
    fn endless_task(id: &str) -> TaskConfig {
        TaskConfig {
            task_id: id.to_string(),
            mock_reader: Some(MockReaderOptions {
                rate: 200.0,
                ..Default::default()
            }),
            log_writer: Some(LogWriterOptions {}),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_natural_completion_scenario() {
        let factory = MockFactory::default();
        let closes = factory.sink_closes.clone();
        let written = factory.written.clone();
        let mgr = manager(factory);

        mgr.start(static_task(
            "t1",
            &[&["SET", "a", "1"], &["SET", "b", "2"], &["DEL", "a"]],
        ))
        .await
        .unwrap();
        mgr.wait_idle().await;

        let snap = mgr.info("t1").await.unwrap();
        assert_eq!(snap.state, TaskState::Completed);
        let stat = &snap.stat;
        assert_eq!(stat.total_entries_count.read_count, 3);
        assert_eq!(stat.total_entries_count.write_count, 3);
        assert_eq!(stat.per_cmd_entries_count["SET"].read_count, 2);
        assert_eq!(stat.per_cmd_entries_count["SET"].write_count, 2);
        assert_eq!(stat.per_cmd_entries_count["DEL"].read_count, 1);
        assert_eq!(stat.per_cmd_entries_count["DEL"].write_count, 1);
        assert_eq!(snap.config["task_id"], "t1");

        assert_eq!(written.lock().unwrap().len(), 3);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(matches!(mgr.health("t1").await, Err(TaskError::NoTask)));
        assert_eq!(mgr.active_task_id().await, None);
    }

    #[tokio::test]
    async fn test_second_start_rejected() {
        let mgr = manager(MockFactory::default());
        mgr.start(endless_task("t1")).await.unwrap();

        let err = mgr.start(endless_task("t2")).await.unwrap_err();
        assert!(matches!(err, TaskError::AlreadyActive(ref id) if id == "t1"));
        assert_eq!(err.code(), 1);

        let snap = mgr.info("t1").await.unwrap();
        assert_eq!(snap.state, TaskState::Running);
        assert_eq!(snap.task_id, "t1");
        assert!(mgr.health("t1").await.is_ok());

        mgr.cancel("t1").await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_scenario() {
        let factory = MockFactory::default();
        let closes = factory.sink_closes.clone();
        let shutdowns = factory.reader_shutdowns.clone();
        let mgr = manager(factory);
        mgr.start(endless_task("t1")).await.unwrap();

        let err = mgr.cancel("x").await.unwrap_err();
        assert!(matches!(err, TaskError::NoTask));
        assert_eq!(mgr.active_task_id().await.as_deref(), Some("t1"));

        mgr.cancel("t1").await.unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(shutdowns.load(Ordering::SeqCst) >= 1);

        assert!(matches!(mgr.info("t1").await, Err(TaskError::NoTask)));
        assert!(matches!(mgr.health("t1").await, Err(TaskError::NoTask)));
        assert!(matches!(mgr.cancel("t1").await, Err(TaskError::NoTask)));

        // pipeline 退出后也只关闭一次
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        mgr.wait_idle().await;
    }

    #[tokio::test]
    async fn test_missing_task_id() {
        let mgr = manager(MockFactory::default());
        let err = mgr.start(static_task("", &[&["PING"]])).await.unwrap_err();
        assert!(matches!(err, TaskError::MissingTaskId));
        assert_ne!(err.code(), 0);
        assert_eq!(mgr.active_task_id().await, None);
    }

    #[tokio::test]
    async fn test_writer_failure_releases_reader() {
        let factory = MockFactory {
            fail_writer: true,
            ..Default::default()
        };
        let shutdowns = factory.reader_shutdowns.clone();
        let mgr = manager(factory);

        let err = mgr.start(endless_task("t1")).await.unwrap_err();
        assert!(matches!(err, TaskError::Construction(_)));
        assert_eq!(err.code(), 3);
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
        assert_eq!(mgr.active_task_id().await, None);

        // 槽位空闲，可以再次启动
        let mgr = manager(MockFactory::default());
        mgr.start(endless_task("t1")).await.unwrap();
        mgr.shutdown().await;
        assert_eq!(mgr.active_task_id().await, None);
    }

    #[tokio::test]
    async fn test_cancel_releases_slot_while_sink_stalls() {
        let factory = MockFactory {
            stall_writes: true,
            ..Default::default()
        };
        let mgr = Arc::new(manager(factory));
        mgr.start(endless_task("t1")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let cancelling = tokio::spawn({
            let mgr = Arc::clone(&mgr);
            async move { mgr.cancel("t1").await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        // 写端仍在关闭，其他请求不受影响
        let health = tokio::time::timeout(Duration::from_millis(100), mgr.health("t1"))
            .await
            .expect("slot lock held during teardown");
        assert!(matches!(health, Err(TaskError::NoTask)));

        tokio::time::timeout(Duration::from_secs(5), cancelling)
            .await
            .expect("cancel was not bounded")
            .unwrap()
            .unwrap();
        mgr.wait_idle().await;
    }

    #[tokio::test]
    async fn test_silent_target_reports_construction_error() {
        // Accepts TCP, never answers AUTH
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let aggregator = Aggregator::spawn(
            AggregatorSettings::default(),
            None,
            CancellationToken::new(),
        );
        let mgr = Arc::new(TaskManager::new(
            ConfiguredFactory::default(),
            AdvancedOptions::default(),
            aggregator,
        ));
        let task = TaskConfig {
            task_id: "t1".into(),
            mock_reader: Some(MockReaderOptions::default()),
            redis_writer: Some(RedisWriterOptions {
                address,
                password: "secret".into(),
                ..Default::default()
            }),
            ..Default::default()
        };

        let starting = tokio::spawn({
            let mgr = Arc::clone(&mgr);
            async move { mgr.start(task).await }
        });
        tokio::time::sleep(Duration::from_millis(200)).await;

        let health = tokio::time::timeout(Duration::from_secs(10), mgr.health("other"))
            .await
            .expect("health blocked behind a stuck start");
        assert!(matches!(health, Err(TaskError::NoTask)));

        let err = tokio::time::timeout(Duration::from_secs(10), starting)
            .await
            .expect("start was not bounded")
            .unwrap()
            .unwrap_err();
        assert_eq!(err.code(), 3);
        assert_eq!(mgr.active_task_id().await, None);
    }

    #[tokio::test]
    async fn test_off_reply_with_panic_rejected() {
        let mgr = manager(MockFactory::default());
        let task = TaskConfig {
            task_id: "t1".into(),
            mock_reader: Some(MockReaderOptions::default()),
            redis_writer: Some(RedisWriterOptions {
                address: "127.0.0.1:6379".into(),
                off_reply: true,
                ..Default::default()
            }),
            ..Default::default()
        };

        let err = mgr.start(task).await.unwrap_err();
        assert!(matches!(err, TaskError::InvalidConfig(_)));
        assert_eq!(err.code(), 2);
        assert_eq!(mgr.active_task_id().await, None);
    }

    #[tokio::test]
    async fn test_random_distribution_sums() {
        const CMDS: &[&str] = &["SET", "DEL", "HSET", "INCR", "LPUSH"];
        let mut rng = rand::rng();
        let mut entries: Vec<Vec<String>> = Vec::new();
        let mut expected: HashMap<&str, u64> = HashMap::new();
        for i in 0..500 {
            let cmd = CMDS[rng.random_range(0..CMDS.len())];
            *expected.entry(cmd).or_default() += 1;
            entries.push(vec![cmd.to_string(), format!("k{i}"), "v".to_string()]);
        }

        let mgr = manager(MockFactory::default());
        let task = TaskConfig {
            task_id: "rand".into(),
            static_reader: Some(StaticReaderOptions { entries, db: 0 }),
            log_writer: Some(LogWriterOptions {}),
            ..Default::default()
        };
        mgr.start(task).await.unwrap();
        mgr.wait_idle().await;

        let stat = mgr.info("rand").await.unwrap().stat;
        assert_eq!(stat.total_entries_count.read_count, 500);
        assert_eq!(stat.total_entries_count.write_count, 500);

        let per_cmd_reads: u64 = stat.per_cmd_entries_count.values().map(|c| c.read_count).sum();
        let per_cmd_writes: u64 = stat.per_cmd_entries_count.values().map(|c| c.write_count).sum();
        assert_eq!(per_cmd_reads, 500);
        assert_eq!(per_cmd_writes, 500);
        for (cmd, n) in expected {
            assert_eq!(stat.per_cmd_entries_count[cmd].read_count, n);
        }
    }

    #[tokio::test]
    async fn test_concurrent_starts_serialise() {
        let mgr = Arc::new(manager(MockFactory::default()));
        let a = tokio::spawn({
            let mgr = mgr.clone();
            async move { mgr.start(endless_task("a")).await }
        });
        let b = tokio::spawn({
            let mgr = mgr.clone();
            async move { mgr.start(endless_task("b")).await }
        });

        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(TaskError::AlreadyActive(_)))));
        mgr.shutdown().await;
    }
}
