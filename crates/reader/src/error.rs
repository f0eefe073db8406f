//! Reader 错误类型

use contracts::ContractError;
use thiserror::Error;

/// Reader 错误
#[derive(Debug, Error)]
pub enum ReaderError {
    /// 源文件无法打开
    #[error("failed to open {path}: {source}")]
    Open {
        /// 文件路径
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 单行无法解析为命令
    #[error("line {line}: {message}")]
    Parse {
        /// 行号 (从 1 开始)
        line: u64,
        /// 错误消息
        message: String,
    },
}

impl ReaderError {
    /// Reader name used when converted to a contract error
    pub(crate) fn into_contract(self, reader: &str) -> ContractError {
        ContractError::reader_open(reader, self.to_string())
    }
}

/// Reader Result 类型别名
pub type Result<T> = std::result::Result<T, ReaderError>;
