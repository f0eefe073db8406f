//! FileSink - appends entries to an AOF-style file
//!
//! Entries are RESP encoded, with a `SELECT` emitted whenever the database
//! changes, so the output can be replayed with `redis-cli --pipe`.

use std::path::{Path, PathBuf};

use bytes::BytesMut;
use contracts::{ContractError, Entry, EntrySink};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};

use crate::resp;

/// Sink that appends RESP commands to a file
pub struct FileSink {
    name: String,
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    current_db: Option<i32>,
    buf: BytesMut,
}

impl FileSink {
    /// Open (or create) the output file in append mode
    #[instrument(name = "file_sink_open", skip(name))]
    pub async fn open(name: impl Into<String>, path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;

        Ok(Self {
            name: name.into(),
            path: path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
            current_db: None,
            buf: BytesMut::with_capacity(4096),
        })
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>, ContractError> {
        let name = &self.name;
        self.writer
            .as_mut()
            .ok_or_else(|| ContractError::sink_write(name, "file already closed"))
    }
}

impl EntrySink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, entry: &Entry) -> Result<(), ContractError> {
        self.buf.clear();
        if self.current_db != Some(entry.db) {
            resp::encode_into(&mut self.buf, &["SELECT".to_string(), entry.db.to_string()]);
            self.current_db = Some(entry.db);
        }
        resp::encode_into(&mut self.buf, &entry.argv);

        let data = self.buf.split().freeze();
        let name = self.name.clone();
        self.writer()?
            .write_all(&data)
            .await
            .map_err(|e| ContractError::sink_write(name, e.to_string()))
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush().await?;
        }
        Ok(())
    }

    #[instrument(name = "file_sink_close", skip(self), fields(path = %self.path.display()))]
    async fn close(&mut self) -> Result<(), ContractError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().await?;
            writer.into_inner().sync_all().await?;
        }
        debug!(sink = %self.name, "FileSink closed");
        Ok(())
    }
}
