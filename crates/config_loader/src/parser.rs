//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。

use contracts::{AppConfig, ContractError, TaskConfig};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<AppConfig, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<AppConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<AppConfig, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

/// 解析控制面提交的任务 JSON
pub fn parse_task_json(body: &[u8]) -> Result<TaskConfig, ContractError> {
    serde_json::from_slice(body).map_err(|e| ContractError::ConfigParse {
        message: format!("task body parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[advanced]
dir = "/tmp/syncer"
log_file = "syncer.log"
"#;
        let result = parse_toml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.advanced.log_file, "syncer.log");
        assert!(config.http_server.is_none());
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "advanced": { "rdb_restore_command_behavior": "rewrite" },
            "metrics": { "port": 9100 }
        }"#;
        let config = parse_json(content).unwrap();
        assert_eq!(config.metrics.port, 9100);
        assert_eq!(
            config.advanced.rdb_restore_command_behavior,
            contracts::RestoreBehavior::Rewrite
        );
    }

    #[test]
    fn test_parse_invalid_toml() {
        let result = parse_toml("[advanced\nlog_level = ");
        assert!(matches!(result, Err(ContractError::ConfigParse { .. })));
    }

    #[test]
    fn test_parse_task_json() {
        let task = parse_task_json(br#"{"task_id":"t1","log_writer":{}}"#).unwrap();
        assert_eq!(task.task_id, "t1");

        let err = parse_task_json(b"not json").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
