//! Mock 复制源
//!
//! 用于无 Redis 环境的测试与压测。按固定速率生成写命令，
//! 偏移量按命令的 RESP 编码长度递增，与真实复制流一致。

use std::time::Duration;

use contracts::{Entry, MockReaderOptions, Reader, Statusable};
use serde_json::json;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::producer::ReadLifecycle;

const NAME: &str = "mock_reader";

/// 节流 tick 的最小间隔
const MIN_TICK: Duration = Duration::from_millis(1);

/// Mock 复制源
pub struct MockReader {
    options: MockReaderOptions,
    lifecycle: ReadLifecycle,
}

impl MockReader {
    /// 创建新的 Mock 源
    pub fn new(options: &MockReaderOptions, capacity: usize) -> Self {
        Self {
            options: options.clone(),
            lifecycle: ReadLifecycle::new(NAME, capacity),
        }
    }
}

/// 第 `seq` 条生成的命令
///
/// 在 key 空间内轮转，覆盖 string / hash / list / generic 几类命令。
pub fn generate(seq: u64, key_space: u64) -> Vec<String> {
    let key = format!("key:{}", seq % key_space.max(1));
    let value = seq.to_string();
    match seq % 5 {
        0 => vec!["SET".into(), key, value],
        1 => vec!["INCR".into(), format!("counter:{}", seq % 16)],
        2 => vec!["HSET".into(), format!("hash:{}", seq % 64), key, value],
        3 => vec!["RPUSH".into(), "list:events".into(), value],
        _ => vec!["EXPIRE".into(), key, "3600".into()],
    }
}

/// RESP 数组编码后的字节数
fn resp_len(argv: &[String]) -> i64 {
    let header = format!("*{}\r\n", argv.len()).len();
    let body: usize = argv
        .iter()
        .map(|arg| format!("${}\r\n", arg.len()).len() + arg.len() + 2)
        .sum();
    (header + body) as i64
}

/// 每个 tick 发送的条数与 tick 间隔
fn pacing(rate: f64) -> Option<(Duration, u64)> {
    if rate <= 0.0 {
        return None;
    }
    let period = Duration::from_secs_f64(1.0 / rate).max(MIN_TICK);
    let per_tick = (rate * period.as_secs_f64()).round().max(1.0) as u64;
    Some((period, per_tick))
}

impl Statusable for MockReader {
    fn status(&self) -> serde_json::Value {
        let snap = self.lifecycle.metrics().snapshot();
        json!({
            "name": NAME,
            "rate": self.options.rate,
            "repl_id": self.options.repl_id,
            "offset": snap.offset,
            "entries_read": snap.entries_read,
            "backlog": self.lifecycle.backlog(),
            "finished": snap.finished,
        })
    }

    fn status_string(&self) -> String {
        let snap = self.lifecycle.metrics().snapshot();
        format!(
            "offset=[{}], entries=[{}], backlog=[{}]",
            snap.offset,
            snap.entries_read,
            self.lifecycle.backlog()
        )
    }

    fn status_consistent(&self) -> bool {
        // 生成器没有滞后，只要下游消费完即视为追平
        self.lifecycle.backlog() == 0
    }

    fn id_offset(&self) -> Option<(String, i64)> {
        let repl_id = self.options.repl_id.clone()?;
        Some((repl_id, self.lifecycle.metrics().snapshot().offset))
    }
}

impl Reader for MockReader {
    fn start_read(&self, cancel: CancellationToken) -> async_channel::Receiver<Entry> {
        let options = self.options.clone();

        self.lifecycle.start(cancel, move |sender| async move {
            let mut ticker = pacing(options.rate).map(|(period, per_tick)| {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                (interval, per_tick)
            });
            let mut seq = 0u64;
            let mut offset = 0i64;

            loop {
                let batch = match ticker.as_mut() {
                    Some((interval, per_tick)) => {
                        tokio::select! {
                            _ = sender.stopped() => return,
                            _ = interval.tick() => *per_tick,
                        }
                    }
                    None => 1,
                };

                for _ in 0..batch {
                    if options.count > 0 && seq >= options.count {
                        sender.metrics().mark_finished();
                        return;
                    }
                    let argv = generate(seq, options.key_space);
                    offset += resp_len(&argv);
                    seq += 1;

                    if !sender.send(Entry::new(argv)).await {
                        return;
                    }
                    sender.metrics().set_offset(offset);
                }

                trace!(seq, offset, "mock batch sent");
                if sender.is_stopped() {
                    return;
                }
            }
        })
    }

    fn shutdown(&self) {
        self.lifecycle.shutdown();
    }
}
