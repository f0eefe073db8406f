//! RedisSink - replays entries against a standalone Redis
//!
//! Commands are pipelined on one connection. A background task frames the
//! replies and counts them, so the sink reports itself consistent only
//! when every command sent has been answered.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::{Buf, BytesMut};
use contracts::{
    ContractError, Entry, EntrySink, RedisWriterOptions, RestoreBehavior, Statusable,
};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use crate::error::WriterError;
use crate::resp::{self, Reply};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Process-wide options that shape the Redis writer
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisSinkSettings {
    /// Handling of `RESTORE` conflicts
    pub restore: RestoreBehavior,
    /// Send `FLUSHALL` before the first entry
    pub flush_all: bool,
}

/// Reply accounting shared with the reply reader task
struct ReplyState {
    address: String,
    off_reply: bool,
    restore: RestoreBehavior,
    sent: AtomicU64,
    replied: AtomicU64,
    errors: AtomicU64,
    /// `BUSYKEY` replies under `RestoreBehavior::Panic`; the target has
    /// diverged from the source, so the sink stays inconsistent
    restore_conflicts: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl ReplyState {
    fn on_reply(&self, reply: Reply) {
        self.replied.fetch_add(1, Ordering::AcqRel);
        let Reply::Error(message) = reply else {
            return;
        };
        let busy_key = message.starts_with("BUSYKEY");
        if busy_key && self.restore == RestoreBehavior::Skip {
            debug!(address = %self.address, "restore skipped, key exists");
            return;
        }
        self.errors.fetch_add(1, Ordering::Relaxed);
        if busy_key && self.restore == RestoreBehavior::Panic {
            self.restore_conflicts.fetch_add(1, Ordering::AcqRel);
            error!(
                address = %self.address,
                reply = %message,
                rdb_restore_command_behavior = "panic",
                "RESTORE hit an existing key, target is no longer consistent"
            );
        } else {
            error!(address = %self.address, reply = %message, "target replied with error");
        }
        if let Ok(mut last) = self.last_error.lock() {
            *last = Some(message);
        }
    }
}

impl Statusable for ReplyState {
    fn status(&self) -> serde_json::Value {
        json!({
            "address": self.address,
            "off_reply": self.off_reply,
            "sent": self.sent.load(Ordering::Acquire),
            "replied": self.replied.load(Ordering::Acquire),
            "errors": self.errors.load(Ordering::Relaxed),
            "restore_conflicts": self.restore_conflicts.load(Ordering::Acquire),
            "last_error": self.last_error.lock().ok().and_then(|e| e.clone()),
        })
    }

    fn status_string(&self) -> String {
        format!(
            "target=[{}], unanswered=[{}]",
            self.address,
            self.sent
                .load(Ordering::Acquire)
                .saturating_sub(self.replied.load(Ordering::Acquire))
        )
    }

    fn status_consistent(&self) -> bool {
        if self.restore_conflicts.load(Ordering::Acquire) > 0 {
            return false;
        }
        self.off_reply || self.sent.load(Ordering::Acquire) == self.replied.load(Ordering::Acquire)
    }
}

/// Sink that writes entries to a Redis server
pub struct RedisSink {
    name: String,
    writer: Option<BufWriter<OwnedWriteHalf>>,
    reply_task: Option<JoinHandle<()>>,
    state: Arc<ReplyState>,
    current_db: i32,
    buf: BytesMut,
}

impl RedisSink {
    /// Connect, authenticate and prepare the target
    ///
    /// # Errors
    /// `SinkConnection` when the target is unreachable or rejects `AUTH`.
    #[instrument(name = "redis_sink_connect", skip(options), fields(address = %options.address))]
    pub async fn connect(
        options: &RedisWriterOptions,
        settings: RedisSinkSettings,
    ) -> Result<Self, ContractError> {
        let name = "redis_writer";
        let connection_err = |e: WriterError| ContractError::sink_connection(name, e.to_string());

        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(&options.address))
            .await
            .map_err(|_| {
                ContractError::sink_connection(
                    name,
                    format!("connect to {} timed out", options.address),
                )
            })?
            .map_err(|e| connection_err(e.into()))?;
        stream.set_nodelay(true)?;
        let (mut read_half, write_half) = stream.into_split();
        let mut writer = BufWriter::new(write_half);
        let mut read_buf = BytesMut::with_capacity(4096);

        timeout(
            CONNECT_TIMEOUT,
            handshake(options, &mut writer, &mut read_half, &mut read_buf),
        )
        .await
        .map_err(|_| {
            ContractError::sink_connection(
                name,
                format!("handshake with {} timed out", options.address),
            )
        })??;

        let state = Arc::new(ReplyState {
            address: options.address.clone(),
            off_reply: options.off_reply,
            restore: settings.restore,
            sent: AtomicU64::new(0),
            replied: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            restore_conflicts: AtomicU64::new(0),
            last_error: Mutex::new(None),
        });
        let reply_task = tokio::spawn(read_replies(read_half, read_buf, Arc::clone(&state)));

        let mut sink = Self {
            name: name.to_string(),
            writer: Some(writer),
            reply_task: Some(reply_task),
            state,
            current_db: 0,
            buf: BytesMut::with_capacity(4096),
        };

        if settings.flush_all {
            info!(address = %options.address, "empty_db_before_sync set, sending FLUSHALL");
            sink.send_command(&["FLUSHALL".to_string()]).await?;
            sink.flush().await?;
        }

        info!(address = %options.address, off_reply = options.off_reply, "RedisSink connected");
        Ok(sink)
    }

    fn queue_command<S: AsRef<str>>(&mut self, argv: &[S]) {
        resp::encode_into(&mut self.buf, argv);
        if !self.state.off_reply {
            self.state.sent.fetch_add(1, Ordering::AcqRel);
        }
    }

    async fn send_command(&mut self, argv: &[String]) -> Result<(), ContractError> {
        self.queue_command(argv);
        self.write_buffered().await
    }

    async fn write_buffered(&mut self) -> Result<(), ContractError> {
        let data = self.buf.split().freeze();
        let Some(writer) = self.writer.as_mut() else {
            return Err(ContractError::sink_write(&self.name, "connection closed"));
        };
        writer
            .write_all(&data)
            .await
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    /// Argv to send for `entry`, honouring the restore behaviour
    fn command_for<'a>(&self, entry: &'a Entry) -> std::borrow::Cow<'a, [String]> {
        let is_restore = entry.cmd_name == "RESTORE";
        let has_replace = entry.argv.iter().any(|a| a.eq_ignore_ascii_case("REPLACE"));
        if is_restore && self.state.restore == RestoreBehavior::Rewrite && !has_replace {
            let mut argv = entry.argv.clone();
            argv.push("REPLACE".to_string());
            std::borrow::Cow::Owned(argv)
        } else {
            std::borrow::Cow::Borrowed(&entry.argv)
        }
    }
}

/// AUTH and CLIENT REPLY OFF, before the reply reader takes the read half
async fn handshake(
    options: &RedisWriterOptions,
    writer: &mut BufWriter<OwnedWriteHalf>,
    read_half: &mut OwnedReadHalf,
    read_buf: &mut BytesMut,
) -> Result<(), ContractError> {
    let name = "redis_writer";
    if !options.password.is_empty() {
        let mut auth = vec!["AUTH".to_string()];
        if !options.username.is_empty() {
            auth.push(options.username.clone());
        }
        auth.push(options.password.clone());
        writer.write_all(&resp::encode(&auth)).await?;
        writer.flush().await?;

        let reply = read_one_reply(read_half, read_buf)
            .await
            .map_err(|e| ContractError::sink_connection(name, e.to_string()))?;
        if let Reply::Error(message) = reply {
            return Err(ContractError::sink_connection(
                name,
                format!("auth failed: {message}"),
            ));
        }
    }

    if options.off_reply {
        writer
            .write_all(&resp::encode(&["CLIENT", "REPLY", "OFF"]))
            .await?;
        writer.flush().await?;
    }
    Ok(())
}

/// Read until one complete reply is framed
async fn read_one_reply(
    read_half: &mut OwnedReadHalf,
    buf: &mut BytesMut,
) -> Result<Reply, WriterError> {
    loop {
        if let Some((reply, n)) = resp::parse_reply(buf)? {
            buf.advance(n);
            return Ok(reply);
        }
        if read_half.read_buf(buf).await? == 0 {
            return Err(WriterError::Protocol(
                "connection closed during handshake".to_string(),
            ));
        }
    }
}

/// Count replies until the target closes the connection
async fn read_replies(mut read_half: OwnedReadHalf, mut buf: BytesMut, state: Arc<ReplyState>) {
    loop {
        loop {
            match resp::parse_reply(&buf) {
                Ok(Some((reply, n))) => {
                    buf.advance(n);
                    state.on_reply(reply);
                }
                Ok(None) => break,
                Err(e) => {
                    error!(address = %state.address, error = %e, "reply stream corrupted");
                    return;
                }
            }
        }

        match read_half.read_buf(&mut buf).await {
            Ok(0) => {
                debug!(address = %state.address, "connection closed by target");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(address = %state.address, error = %e, "reply read failed");
                return;
            }
        }
    }
}

impl EntrySink for RedisSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, entry: &Entry) -> Result<(), ContractError> {
        if self.writer.is_none() {
            return Err(ContractError::sink_write(&self.name, "connection closed"));
        }
        if entry.db != self.current_db {
            self.queue_command(&["SELECT".to_string(), entry.db.to_string()]);
            self.current_db = entry.db;
        }
        let argv = self.command_for(entry);
        self.queue_command(&*argv);
        self.write_buffered().await
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush().await?;
        }
        Ok(())
    }

    #[instrument(name = "redis_sink_close", skip(self), fields(address = %self.state.address))]
    async fn close(&mut self) -> Result<(), ContractError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().await?;
            // FIN lets the server answer what is in flight, then hang up
            if let Err(e) = writer.shutdown().await {
                debug!(error = %e, "shutdown write half failed");
            }
        }
        if let Some(mut task) = self.reply_task.take() {
            if timeout(CLOSE_TIMEOUT, &mut task).await.is_err() {
                warn!(
                    unanswered = self.state.status_string(),
                    "target did not close in time, dropping reply reader"
                );
                task.abort();
            }
        }
        debug!(sink = %self.name, "RedisSink closed");
        Ok(())
    }

    fn status_probe(&self) -> Option<Arc<dyn Statusable>> {
        Some(self.state.clone())
    }
}
