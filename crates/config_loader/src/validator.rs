//! 配置校验模块
//!
//! 校验规则：
//! - advanced 数值范围 (validator derive)
//! - log_level ∈ {debug, info, warn}
//! - http_server.enable 时 host / http_port / admin_url 必填且合法
//! - 任务：task_id 非空，reader / writer 各有一项，选项组合兼容

use contracts::{
    AdvancedOptions, AppConfig, ContractError, HttpServerOptions, ReaderOptions, RestoreBehavior,
    TaskConfig, WriterOptions, LOG_LEVELS,
};
use validator::{Validate, ValidateUrl, ValidationErrors};

/// 校验 AppConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。独立模式下同时校验文件中的任务。
pub fn validate(config: &AppConfig) -> Result<(), ContractError> {
    validate_advanced(&config.advanced)?;
    if let Some(http) = &config.http_server {
        validate_http_server(http)?;
    }
    if !config.control_plane_enabled() {
        validate_task(&config.task, &config.advanced)?;
    }
    Ok(())
}

/// 校验任务配置
///
/// 控制面在构造 reader / writer 之前调用。
pub fn validate_task(task: &TaskConfig, advanced: &AdvancedOptions) -> Result<(), ContractError> {
    if task.task_id.trim().is_empty() {
        return Err(ContractError::config_validation("task_id", "missing task id"));
    }

    match task.reader_options()? {
        ReaderOptions::File(opts) if opts.filepath.as_os_str().is_empty() => {
            return Err(ContractError::config_validation(
                "file_reader.filepath",
                "filepath cannot be empty",
            ));
        }
        ReaderOptions::Mock(opts) if opts.rate.is_nan() || opts.rate < 0.0 => {
            return Err(ContractError::config_validation(
                "mock_reader.rate",
                format!("rate must be >= 0, got {}", opts.rate),
            ));
        }
        _ => {}
    }

    match task.writer_options()? {
        WriterOptions::Redis(opts) => {
            if opts.address.is_empty() {
                return Err(ContractError::config_validation(
                    "redis_writer.address",
                    "address cannot be empty",
                ));
            }
            // 关闭回复后无法得知 RESTORE 冲突
            if opts.off_reply && advanced.rdb_restore_command_behavior == RestoreBehavior::Panic {
                return Err(ContractError::config_validation(
                    "redis_writer.off_reply",
                    "off_reply=true is incompatible with rdb_restore_command_behavior=panic",
                ));
            }
        }
        WriterOptions::File(opts) if opts.filepath.as_os_str().is_empty() => {
            return Err(ContractError::config_validation(
                "file_writer.filepath",
                "filepath cannot be empty",
            ));
        }
        WriterOptions::Udp(opts) => {
            if opts.address.is_empty() {
                return Err(ContractError::config_validation(
                    "udp_writer.address",
                    "address cannot be empty",
                ));
            }
            if opts.max_packet_size == 0 {
                return Err(ContractError::config_validation(
                    "udp_writer.max_packet_size",
                    "max_packet_size must be > 0",
                ));
            }
        }
        _ => {}
    }

    Ok(())
}

/// 校验 advanced 段
fn validate_advanced(advanced: &AdvancedOptions) -> Result<(), ContractError> {
    advanced
        .validate()
        .map_err(|e| from_validation_errors("advanced", &e))?;

    if !LOG_LEVELS.contains(&advanced.log_level.as_str()) {
        return Err(ContractError::config_validation(
            "advanced.log_level",
            format!(
                "unknown log level '{}', expected one of {}",
                advanced.log_level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }
    Ok(())
}

/// 校验 http_server 段 (仅在启用时)
fn validate_http_server(http: &HttpServerOptions) -> Result<(), ContractError> {
    if !http.enable {
        return Ok(());
    }
    if http.host.is_empty() {
        return Err(ContractError::config_validation(
            "http_server.host",
            "host is required when http_server is enabled",
        ));
    }
    if http.http_port == 0 {
        return Err(ContractError::config_validation(
            "http_server.http_port",
            "http_port must be >= 1",
        ));
    }
    if http.admin_url.is_empty() {
        return Err(ContractError::config_validation(
            "http_server.admin_url",
            "admin_url is required when http_server is enabled",
        ));
    }
    if !http.admin_url.validate_url() {
        return Err(ContractError::config_validation(
            "http_server.admin_url",
            format!("'{}' is not a valid URL", http.admin_url),
        ));
    }
    Ok(())
}

fn from_validation_errors(section: &str, errors: &ValidationErrors) -> ContractError {
    let mut fields: Vec<_> = errors.field_errors().into_keys().collect();
    fields.sort();
    let field = match fields.first() {
        Some(name) => format!("{section}.{name}"),
        None => section.to_string(),
    };
    ContractError::config_validation(field, errors.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{LogWriterOptions, MockReaderOptions, RedisWriterOptions};

    fn minimal_task() -> TaskConfig {
        TaskConfig {
            task_id: "t1".into(),
            mock_reader: Some(MockReaderOptions::default()),
            log_writer: Some(LogWriterOptions {}),
            ..Default::default()
        }
    }

    fn control_plane_config() -> AppConfig {
        AppConfig {
            http_server: Some(HttpServerOptions {
                enable: true,
                host: "127.0.0.1".into(),
                http_port: 8080,
                admin_url: "http://admin:9000".into(),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&control_plane_config()).is_ok());

        let standalone = AppConfig {
            task: minimal_task(),
            ..Default::default()
        };
        assert!(validate(&standalone).is_ok());
    }

    #[test]
    fn test_unknown_log_level() {
        let mut config = control_plane_config();
        config.advanced.log_level = "verbose".into();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("advanced.log_level"), "got: {err}");
    }

    #[test]
    fn test_zero_capacity() {
        let mut config = control_plane_config();
        config.advanced.reader_channel_capacity = 0;
        let err = validate(&config).unwrap_err();
        assert!(
            err.to_string().contains("advanced.reader_channel_capacity"),
            "got: {err}"
        );
    }

    #[test]
    fn test_http_server_requires_fields() {
        let mut config = control_plane_config();
        config.http_server.as_mut().unwrap().host.clear();
        assert!(validate(&config).is_err());

        let mut config = control_plane_config();
        config.http_server.as_mut().unwrap().http_port = 0;
        assert!(validate(&config).is_err());

        let mut config = control_plane_config();
        config.http_server.as_mut().unwrap().admin_url = "not a url".into();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("admin_url"), "got: {err}");
    }

    #[test]
    fn test_disabled_http_server_is_standalone() {
        let mut config = control_plane_config();
        config.http_server.as_mut().unwrap().enable = false;
        config.http_server.as_mut().unwrap().host.clear();
        // 独立模式下文件必须描述任务
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("missing task id"), "got: {err}");

        config.task = minimal_task();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_task_missing_sections() {
        let advanced = AdvancedOptions::default();
        let task = TaskConfig {
            task_id: "t1".into(),
            log_writer: Some(LogWriterOptions {}),
            ..Default::default()
        };
        let err = validate_task(&task, &advanced).unwrap_err();
        assert!(err.to_string().contains("no reader config entry found"));
    }

    #[test]
    fn test_off_reply_incompatible_with_panic() {
        let mut advanced = AdvancedOptions::default();
        let mut task = minimal_task();
        task.redis_writer = Some(RedisWriterOptions {
            address: "127.0.0.1:6379".into(),
            off_reply: true,
            ..Default::default()
        });

        let err = validate_task(&task, &advanced).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("off_reply"), "got: {err}");

        advanced.rdb_restore_command_behavior = RestoreBehavior::Rewrite;
        assert!(validate_task(&task, &advanced).is_ok());
    }

    #[test]
    fn test_negative_mock_rate() {
        let mut task = minimal_task();
        task.mock_reader.as_mut().unwrap().rate = -1.0;
        assert!(validate_task(&task, &AdvancedOptions::default()).is_err());
    }
}
