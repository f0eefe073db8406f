//! 统计聚合器
//!
//! 单个 actor 独占全部 `Stat` 状态。所有修改和查询都是闭包，经有界
//! `mpsc` 队列提交，按提交顺序依次执行；队列满时提交方等待。
//!
//! 周期任务各自是独立的定时器：
//! - stat tick：刷新 reader/writer 快照、一致性和 OPS
//! - log tick：输出一行汇总 (间隔为 0 时关闭)
//! - heartbeat / checkpoint：配置了 admin 时推送，HTTP 请求在闭包外执行

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use contracts::{AdvancedOptions, Reader, Statusable};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::StatusError;
use crate::reporter::{AdminReporter, Checkpoint};
use crate::stat::Stat;

/// 任务队列容量
pub const QUEUE_CAPACITY: usize = 4096;

type Job = Box<dyn FnOnce(&mut StatState) + Send>;

/// 定时器间隔
#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    pub stat_interval: Duration,
    /// 为零时不输出汇总日志
    pub log_interval: Duration,
    pub heartbeat_interval: Duration,
    pub checkpoint_interval: Duration,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self::from_advanced(&AdvancedOptions::default())
    }
}

impl AggregatorSettings {
    pub fn from_advanced(advanced: &AdvancedOptions) -> Self {
        Self {
            stat_interval: Duration::from_secs(advanced.stat_interval.max(1)),
            log_interval: Duration::from_secs(advanced.log_interval),
            heartbeat_interval: Duration::from_secs(advanced.heartbeat_interval.max(1)),
            checkpoint_interval: Duration::from_secs(advanced.checkpoint_interval.max(1)),
        }
    }
}

/// 任务在查询结果中的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Running,
    Completed,
}

/// 查询返回的任务快照
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    pub task_id: String,
    pub state: TaskState,
    pub config: Value,
    pub stat: Stat,
}

/// 当前挂载的任务
struct AttachedTask {
    seq: u64,
    task_id: String,
    config: Value,
    stat: Stat,
    reader: Arc<dyn Reader>,
    writer: Arc<dyn Statusable>,
    last_tick: Instant,
}

/// 自然结束后保留的最终统计
struct CompletedTask {
    task_id: String,
    config: Value,
    stat: Stat,
}

/// Actor 独占的状态
#[derive(Default)]
pub struct StatState {
    active: Option<AttachedTask>,
    completed: Option<CompletedTask>,
}

impl StatState {
    fn active_mut(&mut self, seq: u64) -> Option<&mut AttachedTask> {
        self.active.as_mut().filter(|task| task.seq == seq)
    }

    /// 当前挂载任务的序号
    pub fn active_seq(&self) -> Option<u64> {
        self.active.as_ref().map(|task| task.seq)
    }

    /// 当前挂载任务的统计
    pub fn active_stat(&self) -> Option<&Stat> {
        self.active.as_ref().map(|task| &task.stat)
    }

    fn refresh(&mut self) {
        if let Some(task) = self.active.as_ref() {
            let elapsed = task.last_tick.elapsed();
            self.refresh_elapsed(elapsed);
        }
    }

    fn refresh_elapsed(&mut self, elapsed: Duration) {
        let Some(task) = self.active.as_mut() else {
            return;
        };

        task.stat.reader = task.reader.status();
        task.stat.writer = task.writer.status();
        task.stat.consistent = task.reader.status_consistent() && task.writer.status_consistent();
        task.stat.update_ops(elapsed.as_secs_f64());
        task.last_tick = Instant::now();

        let total = &task.stat.total_entries_count;
        observability::record_consistency(task.stat.consistent);
        observability::record_ops(total.read_ops, total.write_ops);
    }

    fn log_summary(&self) {
        if let Some(task) = self.active.as_ref() {
            info!(
                task_id = %task.task_id,
                "{}, {}",
                task.stat.total_entries_count,
                task.reader.status_string()
            );
        }
    }

    fn snapshot(&self, task_id: &str) -> Option<TaskSnapshot> {
        if let Some(task) = self.active.as_ref().filter(|t| t.task_id == task_id) {
            return Some(TaskSnapshot {
                task_id: task.task_id.clone(),
                state: TaskState::Running,
                config: task.config.clone(),
                stat: task.stat.clone(),
            });
        }
        self.completed
            .as_ref()
            .filter(|t| t.task_id == task_id)
            .map(|task| TaskSnapshot {
                task_id: task.task_id.clone(),
                state: TaskState::Completed,
                config: task.config.clone(),
                stat: task.stat.clone(),
            })
    }

    fn checkpoint(&self) -> Option<Checkpoint> {
        let task = self.active.as_ref()?;
        let (repl_id, repl_offset) = task.reader.id_offset()?;
        Some(Checkpoint {
            task_id: task.task_id.clone(),
            repl_id,
            repl_offset,
        })
    }
}

/// 挂载任务时提供的信息
pub struct Attachment {
    pub seq: u64,
    pub task_id: String,
    pub config: Value,
    pub reader: Arc<dyn Reader>,
    pub writer: Arc<dyn Statusable>,
}

/// 聚合器句柄，可廉价克隆
#[derive(Clone)]
pub struct Aggregator {
    tx: mpsc::Sender<Job>,
}

impl Aggregator {
    /// 启动 actor 与定时器
    ///
    /// `reporter` 为 `None` 时不启动 heartbeat / checkpoint 定时器。
    /// `shutdown` 触发后定时器退出，actor 执行完已排队的闭包后退出。
    pub fn spawn(
        settings: AggregatorSettings,
        reporter: Option<AdminReporter>,
        shutdown: CancellationToken,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel::<Job>(QUEUE_CAPACITY);

        let consumer_shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut state = StatState::default();
            loop {
                tokio::select! {
                    biased;
                    job = rx.recv() => match job {
                        Some(job) => job(&mut state),
                        None => break,
                    },
                    _ = consumer_shutdown.cancelled() => break,
                }
            }
            debug!("statistics aggregator stopped");
        });

        let aggregator = Self { tx };

        let agg = aggregator.clone();
        spawn_ticker("stat", settings.stat_interval, shutdown.clone(), move || {
            let agg = agg.clone();
            async move {
                let _ = agg.submit(StatState::refresh).await;
            }
        });

        if settings.log_interval.is_zero() {
            info!("summary log is disabled (log_interval = 0)");
        } else {
            let agg = aggregator.clone();
            spawn_ticker("log", settings.log_interval, shutdown.clone(), move || {
                let agg = agg.clone();
                async move {
                    let _ = agg.submit(|state| state.log_summary()).await;
                }
            });
        }

        if let Some(reporter) = reporter {
            let heartbeat = reporter.clone();
            spawn_ticker(
                "heartbeat",
                settings.heartbeat_interval,
                shutdown.clone(),
                move || {
                    let reporter = heartbeat.clone();
                    async move {
                        tokio::spawn(async move { reporter.report_heartbeat().await });
                    }
                },
            );

            let agg = aggregator.clone();
            spawn_ticker(
                "checkpoint",
                settings.checkpoint_interval,
                shutdown,
                move || {
                    let agg = agg.clone();
                    let reporter = reporter.clone();
                    async move {
                        match agg.checkpoint().await {
                            Ok(Some(checkpoint)) => {
                                tokio::spawn(async move {
                                    reporter.report_checkpoint(checkpoint).await
                                });
                            }
                            // 空闲或不可续传，本轮跳过
                            Ok(None) => debug!("no resumable task, checkpoint skipped"),
                            Err(_) => {}
                        }
                    }
                },
            );
        }

        aggregator
    }

    /// 提交一个修改闭包，队列满时等待
    pub async fn submit<F>(&self, job: F) -> Result<(), StatusError>
    where
        F: FnOnce(&mut StatState) + Send + 'static,
    {
        self.tx
            .send(Box::new(job))
            .await
            .map_err(|_| StatusError::Closed)
    }

    /// 在 actor 内执行查询并等待结果
    pub async fn query<F, R>(&self, f: F) -> Result<R, StatusError>
    where
        F: FnOnce(&mut StatState) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(move |state| {
            let _ = reply_tx.send(f(state));
        })
        .await?;
        reply_rx.await.map_err(|_| StatusError::Closed)
    }

    /// 挂载新任务，清除上一个已完成任务的记录
    pub async fn attach(&self, attachment: Attachment) -> Result<(), StatusError> {
        self.submit(move |state| {
            let mut stat = Stat::new();
            stat.reader = attachment.reader.status();
            stat.writer = attachment.writer.status();
            state.completed = None;
            state.active = Some(AttachedTask {
                seq: attachment.seq,
                task_id: attachment.task_id,
                config: attachment.config,
                stat,
                reader: attachment.reader,
                writer: attachment.writer,
                last_tick: Instant::now(),
            });
        })
        .await
    }

    /// 卸载任务并丢弃其统计
    pub async fn detach(&self, seq: u64) -> Result<(), StatusError> {
        self.submit(move |state| {
            if state.active_seq() == Some(seq) {
                state.active = None;
            }
        })
        .await
    }

    /// 任务自然结束：最后刷新一次，保留为已完成记录
    pub async fn complete(&self, seq: u64) -> Result<(), StatusError> {
        self.submit(move |state| {
            if state.active_seq() != Some(seq) {
                return;
            }
            state.refresh();
            if let Some(task) = state.active.take() {
                info!(
                    task_id = %task.task_id,
                    consistent = task.stat.consistent,
                    "task completed, {}",
                    task.stat.total_entries_count
                );
                state.completed = Some(CompletedTask {
                    task_id: task.task_id,
                    config: task.config,
                    stat: task.stat,
                });
            }
        })
        .await
    }

    /// 记录一次读取，任务已卸载时忽略
    pub async fn add_read_count(&self, seq: u64, cmd: String) -> Result<(), StatusError> {
        self.submit(move |state| {
            if let Some(task) = state.active_mut(seq) {
                task.stat.record_read(&cmd);
            }
        })
        .await
    }

    /// 记录一次写入，任务已卸载时忽略
    pub async fn add_write_count(&self, seq: u64, cmd: String) -> Result<(), StatusError> {
        self.submit(move |state| {
            if let Some(task) = state.active_mut(seq) {
                task.stat.record_write(&cmd);
            }
        })
        .await
    }

    /// 立即刷新快照、一致性与 OPS
    pub async fn refresh(&self) -> Result<(), StatusError> {
        self.submit(StatState::refresh).await
    }

    /// 按 id 查询运行中或刚完成的任务
    pub async fn snapshot(&self, task_id: &str) -> Result<Option<TaskSnapshot>, StatusError> {
        let task_id = task_id.to_string();
        self.query(move |state| state.snapshot(&task_id)).await
    }

    /// 当前任务的可续传位置
    pub async fn checkpoint(&self) -> Result<Option<Checkpoint>, StatusError> {
        self.query(|state| state.checkpoint()).await
    }
}

/// 固定间隔执行 `on_tick`，首个 tick 在一个间隔之后
fn spawn_ticker<F, Fut>(name: &'static str, period: Duration, shutdown: CancellationToken, mut on_tick: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => on_tick().await,
            }
        }
        debug!(timer = name, "timer stopped");
    });
}
