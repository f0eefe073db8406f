//! EntryCount - read/write counters with sampled OPS

use std::fmt;

use serde::Serialize;

/// Read and write totals plus OPS over the last sampling interval
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntryCount {
    pub read_count: u64,
    pub read_ops: f64,
    pub write_count: u64,
    pub write_ops: f64,
    #[serde(skip)]
    last_read_count: u64,
    #[serde(skip)]
    last_write_count: u64,
}

impl EntryCount {
    pub fn add_read(&mut self, n: u64) {
        self.read_count += n;
    }

    pub fn add_write(&mut self, n: u64) {
        self.write_count += n;
    }

    /// Recompute OPS from the counts gained since the previous call
    ///
    /// A non-positive interval yields zero OPS.
    pub fn update_ops(&mut self, elapsed_secs: f64) {
        if elapsed_secs > 0.0 {
            self.read_ops = (self.read_count - self.last_read_count) as f64 / elapsed_secs;
            self.write_ops = (self.write_count - self.last_write_count) as f64 / elapsed_secs;
        } else {
            self.read_ops = 0.0;
            self.write_ops = 0.0;
        }
        self.last_read_count = self.read_count;
        self.last_write_count = self.write_count;
    }
}

impl fmt::Display for EntryCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "read_count=[{}], read_ops=[{:.2}], write_count=[{}], write_ops=[{:.2}]",
            self.read_count, self.read_ops, self.write_count, self.write_ops
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ops_over_interval() {
        let mut count = EntryCount::default();
        count.add_read(100);
        count.add_write(40);
        count.update_ops(10.0);
        assert_eq!(count.read_ops, 10.0);
        assert_eq!(count.write_ops, 4.0);

        // 无新事件时 OPS 归零
        count.update_ops(10.0);
        assert_eq!(count.read_ops, 0.0);
        assert_eq!(count.write_ops, 0.0);
        assert_eq!(count.read_count, 100);
    }

    #[test]
    fn test_zero_interval() {
        let mut count = EntryCount::default();
        count.add_read(5);
        count.update_ops(0.0);
        assert_eq!(count.read_ops, 0.0);

        // 基线已推进
        count.add_read(2);
        count.update_ops(1.0);
        assert_eq!(count.read_ops, 2.0);
    }

    #[test]
    fn test_display() {
        let mut count = EntryCount::default();
        count.add_read(3);
        count.add_write(3);
        count.update_ops(2.0);
        assert_eq!(
            count.to_string(),
            "read_count=[3], read_ops=[1.50], write_count=[3], write_ops=[1.50]"
        );
    }

    #[test]
    fn test_serialize_hides_baseline() {
        let value = serde_json::to_value(EntryCount::default()).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 4);
        assert!(obj.contains_key("read_ops"));
    }
}
