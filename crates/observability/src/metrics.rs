//! 同步任务指标
//!
//! 命令计数按命令名打标签；一致性与 OPS 为全局 gauge，
//! 由统计聚合器在每次 tick 时刷新。

use metrics::{counter, gauge};

/// 记录读取一条命令
pub fn record_entry_read(cmd: &str) {
    counter!("redis_syncer_entries_read_total", "cmd" => cmd.to_string()).increment(1);
}

/// 记录写出一条命令
pub fn record_entry_written(cmd: &str) {
    counter!("redis_syncer_entries_written_total", "cmd" => cmd.to_string()).increment(1);
}

/// 记录一致性状态 (1 = 已追平)
pub fn record_consistency(consistent: bool) {
    gauge!("redis_syncer_consistent").set(if consistent { 1.0 } else { 0.0 });
}

/// 记录当前读写 OPS
pub fn record_ops(read_ops: f64, write_ops: f64) {
    gauge!("redis_syncer_read_ops").set(read_ops);
    gauge!("redis_syncer_write_ops").set(write_ops);
}

/// 记录上报失败 (heartbeat / checkpoint)
pub fn record_report_failure(kind: &str) {
    counter!("redis_syncer_report_failures_total", "kind" => kind.to_string()).increment(1);
}
