//! Stat - live statistics of one task

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::entry_count::EntryCount;

const START_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 任务统计
///
/// 只由统计聚合器持有和修改。
#[derive(Debug, Clone, Serialize)]
pub struct Stat {
    /// 任务开始时间 (本地时间)
    pub start_time: String,
    /// 读写两端是否都已追平
    pub consistent: bool,
    pub total_entries_count: EntryCount,
    /// 按命令名分组的计数
    pub per_cmd_entries_count: BTreeMap<String, EntryCount>,
    /// Reader 状态快照
    pub reader: Value,
    /// Writer 状态快照
    pub writer: Value,
}

impl Default for Stat {
    fn default() -> Self {
        Self::new()
    }
}

impl Stat {
    pub fn new() -> Self {
        Self {
            start_time: chrono::Local::now().format(START_TIME_FORMAT).to_string(),
            consistent: false,
            total_entries_count: EntryCount::default(),
            per_cmd_entries_count: BTreeMap::new(),
            reader: Value::Null,
            writer: Value::Null,
        }
    }

    pub fn record_read(&mut self, cmd: &str) {
        self.total_entries_count.add_read(1);
        self.cmd_entry(cmd).add_read(1);
    }

    pub fn record_write(&mut self, cmd: &str) {
        self.total_entries_count.add_write(1);
        self.cmd_entry(cmd).add_write(1);
    }

    /// 重新计算全局和每条命令的 OPS
    pub fn update_ops(&mut self, elapsed_secs: f64) {
        self.total_entries_count.update_ops(elapsed_secs);
        for count in self.per_cmd_entries_count.values_mut() {
            count.update_ops(elapsed_secs);
        }
    }

    fn cmd_entry(&mut self, cmd: &str) -> &mut EntryCount {
        self.per_cmd_entries_count
            .entry(cmd.to_string())
            .or_default()
    }
}
