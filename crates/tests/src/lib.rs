//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置合约测试
//! - 端到端任务流转（文件 reader 到文件 writer）
//! - 真实监听端口上的控制面与 admin 上报

#[cfg(test)]
mod contract_tests {
    use contracts::{ReaderOptions, WriterOptions};

    #[test]
    fn test_task_json_selects_sections() {
        let task = config_loader::parse_task_json(
            br#"{"task_id": "t1", "mock_reader": {"count": 5}, "udp_writer": {"address": "127.0.0.1:9"}}"#,
        )
        .unwrap();
        assert!(matches!(task.reader_options().unwrap(), ReaderOptions::Mock(ref m) if m.count == 5));
        assert!(matches!(task.writer_options().unwrap(), WriterOptions::Udp(_)));
        assert!(config_loader::validate_task(&task, &Default::default()).is_ok());
    }

    #[test]
    fn test_reader_factory_rejects_missing_section() {
        let task = config_loader::parse_task_json(br#"{"task_id": "t1", "log_writer": {}}"#).unwrap();
        let err = reader::create_reader(&task, 16).err().unwrap();
        assert!(err.is_config());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::{extract::State, routing::post, Json, Router};
    use contracts::{AdvancedOptions, TaskConfig};
    use serde_json::{json, Value};
    use status::{AdminReporter, Aggregator, AggregatorSettings, TaskState, WorkerIdentity};
    use task_manager::{ConfiguredFactory, TaskError, TaskManager};
    use tokio::net::TcpListener;
    use tokio_util::sync::CancellationToken;

    fn manager_with(settings: AggregatorSettings, reporter: Option<AdminReporter>) -> TaskManager {
        let aggregator = Aggregator::spawn(settings, reporter, CancellationToken::new());
        TaskManager::new(
            ConfiguredFactory::default(),
            AdvancedOptions::default(),
            aggregator,
        )
    }

    fn manager() -> TaskManager {
        manager_with(AggregatorSettings::default(), None)
    }

    fn task(body: Value) -> TaskConfig {
        config_loader::parse_task_json(body.to_string().as_bytes()).unwrap()
    }

    /// End-to-end test: FileReader -> pipeline -> FileSink
    ///
    /// 验证完整的数据流：
    /// 1. FileReader 逐行解析命令
    /// 2. 过滤器丢弃被屏蔽的命令
    /// 3. FileSink 以 RESP 格式落盘，统计在任务结束后仍可查询
    #[tokio::test]
    async fn test_e2e_file_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("cmds.txt");
        let output = dir.path().join("out.aof");
        std::fs::write(&input, "SET a 1\nSET b 2\nFLUSHALL\nDEL a\n").unwrap();

        let manager = manager();
        manager
            .start(task(json!({
                "task_id": "file-sync",
                "file_reader": {"filepath": input},
                "file_writer": {"filepath": output},
                "filter": {"block_commands": ["FLUSHALL"]}
            })))
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), manager.wait_idle())
            .await
            .expect("task did not complete");

        let snapshot = manager.info("file-sync").await.unwrap();
        assert_eq!(snapshot.state, TaskState::Completed);
        assert_eq!(snapshot.stat.total_entries_count.read_count, 4);
        assert_eq!(snapshot.stat.total_entries_count.write_count, 3);
        assert_eq!(snapshot.stat.per_cmd_entries_count["SET"].write_count, 2);
        assert_eq!(snapshot.stat.per_cmd_entries_count["FLUSHALL"].write_count, 0);
        assert_eq!(snapshot.config["file_reader"]["filepath"], json!(input));

        let written = std::fs::read_to_string(&output).unwrap();
        // AOF opens with the db selection, then the commands in order
        assert!(written.starts_with("*2\r\n$6\r\nSELECT\r\n$1\r\n0\r\n*3\r\n$3\r\nSET\r\n$1\r\na\r\n$1\r\n1\r\n"));
        assert!(written.contains("DEL"));
        assert!(!written.contains("FLUSHALL"));

        // 槽位已释放
        assert!(matches!(
            manager.health("file-sync").await,
            Err(TaskError::NoTask)
        ));
        assert!(manager.active_task_id().await.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_target_frees_slot() {
        let manager = manager();
        let err = manager
            .start(task(json!({
                "task_id": "t1",
                "mock_reader": {"rate": 0},
                "redis_writer": {"address": "127.0.0.1:1"}
            })))
            .await
            .unwrap_err();
        assert_eq!(err.code(), 3);
        assert!(manager.active_task_id().await.is_none());

        // 失败后可以立即启动新任务
        manager
            .start(task(json!({
                "task_id": "t2",
                "mock_reader": {"rate": 50},
                "log_writer": {}
            })))
            .await
            .unwrap();
        assert_eq!(manager.active_task_id().await.as_deref(), Some("t2"));
        manager.cancel("t2").await.unwrap();
    }

    #[tokio::test]
    async fn test_control_plane_over_tcp() {
        let manager = Arc::new(manager());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(control_plane::serve_on(
            listener,
            control_plane::router(manager.clone()),
            async move {
                stop_rx.await.ok();
            },
        ));

        let client = reqwest::Client::new();
        let body: Value = client
            .post(format!("{base}/task/start"))
            .json(&json!({"task_id": "t1", "mock_reader": {"rate": 100}, "log_writer": {}}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["code"], 0);

        let body: Value = client
            .get(format!("{base}/task/health/t1"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({"code": 0, "message": "ok"}));

        let body: Value = client
            .post(format!("{base}/task/cancel/t1"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["code"], 0);
        assert!(manager.active_task_id().await.is_none());

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    type Received = Arc<Mutex<Vec<(String, Value)>>>;

    async fn record(
        State((received, path)): State<(Received, &'static str)>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        received.lock().unwrap().push((path.to_string(), body));
        Json(json!({"code": 0, "message": "ok"}))
    }

    #[tokio::test]
    async fn test_heartbeat_and_checkpoint_pushed() {
        let received: Received = Arc::new(Mutex::new(Vec::new()));
        let admin = Router::new()
            .route(
                "/worker/status",
                post(record).with_state((received.clone(), "heartbeat")),
            )
            .route(
                "/msa/task/offset",
                post(record).with_state((received.clone(), "checkpoint")),
            );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let admin_url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, admin).await.unwrap();
        });

        let reporter = AdminReporter::new(
            &admin_url,
            WorkerIdentity {
                ip: "127.0.0.1".into(),
                port: 8080,
            },
        )
        .unwrap();
        let settings = AggregatorSettings {
            stat_interval: Duration::from_millis(50),
            log_interval: Duration::ZERO,
            heartbeat_interval: Duration::from_millis(50),
            checkpoint_interval: Duration::from_millis(50),
        };
        let manager = manager_with(settings, Some(reporter));
        manager
            .start(task(json!({
                "task_id": "t1",
                "mock_reader": {"rate": 200, "repl_id": "r1"},
                "log_writer": {}
            })))
            .await
            .unwrap();

        let mut checkpoint = None;
        for _ in 0..100 {
            checkpoint = received
                .lock()
                .unwrap()
                .iter()
                .find(|(kind, body)| kind == "checkpoint" && body["repl_offset"].as_i64() > Some(0))
                .map(|(_, body)| body.clone());
            if checkpoint.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        manager.cancel("t1").await.unwrap();

        let checkpoint = checkpoint.expect("no checkpoint received");
        assert_eq!(checkpoint["task_id"], "t1");
        assert_eq!(checkpoint["repl_id"], "r1");

        let received = received.lock().unwrap();
        let heartbeat = received
            .iter()
            .find(|(kind, _)| kind == "heartbeat")
            .expect("no heartbeat received");
        assert_eq!(
            heartbeat.1,
            json!({"ip": "127.0.0.1", "port": 8080, "role": "reader"})
        );
    }
}
