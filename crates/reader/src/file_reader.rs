//! Reader over a command file
//!
//! One command per line, either whitespace separated (`text`) or a JSON
//! array of strings (`json`). `SELECT <db>` lines switch the database of the
//! following entries and are not forwarded. The byte offset after the last
//! forwarded line is exposed as a checkpoint, so a task can be restarted
//! with `start_offset` set to it.

use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use contracts::{ContractError, Entry, FileFormat, FileReaderOptions, Reader, Statusable};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{ReaderError, Result};
use crate::producer::ReadLifecycle;

const NAME: &str = "file_reader";

/// Command file reader
pub struct FileReader {
    path: PathBuf,
    format: FileFormat,
    start_offset: u64,
    file: Mutex<Option<File>>,
    lifecycle: ReadLifecycle,
}

impl FileReader {
    /// Open the file and seek to `start_offset`
    ///
    /// # Errors
    /// `ReaderOpen` when the file cannot be opened or seeked.
    pub fn open(
        options: &FileReaderOptions,
        capacity: usize,
    ) -> std::result::Result<Self, ContractError> {
        Self::open_file(&options.filepath, options.start_offset)
            .map(|file| Self {
                path: options.filepath.clone(),
                format: options.format,
                start_offset: options.start_offset,
                file: Mutex::new(Some(file)),
                lifecycle: ReadLifecycle::new(NAME, capacity),
            })
            .map_err(|e| e.into_contract(NAME))
    }

    fn open_file(path: &Path, offset: u64) -> Result<File> {
        let open_err = |source| ReaderError::Open {
            path: path.display().to_string(),
            source,
        };
        let mut file = File::open(path).map_err(open_err)?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).map_err(open_err)?;
        }
        Ok(file)
    }
}

/// Decode one line into an argv
///
/// Returns `Ok(None)` for blank lines and `#` comments.
fn parse_line(line: &str, format: FileFormat, line_no: u64) -> Result<Option<Vec<String>>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let argv = match format {
        FileFormat::Text => trimmed.split_whitespace().map(str::to_string).collect(),
        FileFormat::Json => {
            serde_json::from_str::<Vec<String>>(trimmed).map_err(|e| ReaderError::Parse {
                line: line_no,
                message: e.to_string(),
            })?
        }
    };

    Ok(Some(argv))
}

/// `SELECT <db>` switches the current database
fn select_db(argv: &[String]) -> Option<i32> {
    match argv {
        [cmd, db] if cmd.eq_ignore_ascii_case("select") => db.parse().ok(),
        _ => None,
    }
}

impl Statusable for FileReader {
    fn status(&self) -> serde_json::Value {
        let snap = self.lifecycle.metrics().snapshot();
        json!({
            "name": NAME,
            "filepath": self.path.display().to_string(),
            "offset": snap.offset,
            "entries_read": snap.entries_read,
            "parse_errors": snap.parse_errors,
            "backlog": self.lifecycle.backlog(),
            "finished": snap.finished,
        })
    }

    fn status_string(&self) -> String {
        let snap = self.lifecycle.metrics().snapshot();
        format!(
            "file=[{}], offset=[{}], entries=[{}]",
            self.path.display(),
            snap.offset,
            snap.entries_read
        )
    }

    fn status_consistent(&self) -> bool {
        self.lifecycle.metrics().snapshot().finished && self.lifecycle.backlog() == 0
    }

    fn id_offset(&self) -> Option<(String, i64)> {
        if !self.lifecycle.is_started() {
            return None;
        }
        let offset = self.lifecycle.metrics().snapshot().offset;
        Some((self.path.display().to_string(), offset))
    }
}

impl Reader for FileReader {
    fn start_read(&self, cancel: CancellationToken) -> async_channel::Receiver<Entry> {
        let file = self.file.lock().ok().and_then(|mut slot| slot.take());
        let format = self.format;
        let path = self.path.display().to_string();
        self.lifecycle.metrics().set_offset(self.start_offset as i64);
        let start_offset = self.start_offset;

        self.lifecycle.start(cancel, move |sender| async move {
            let Some(file) = file else {
                warn!(path = %path, "file handle already consumed");
                return;
            };
            let mut lines = BufReader::new(tokio::fs::File::from_std(file));
            let mut buf = String::new();
            let mut offset = start_offset as i64;
            let mut line_no = 0u64;
            let mut db = 0;

            loop {
                buf.clear();
                let read = tokio::select! {
                    _ = sender.stopped() => return,
                    read = lines.read_line(&mut buf) => read,
                };
                let n = match read {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) => {
                        warn!(path = %path, error = %e, "read failed, stopping");
                        return;
                    }
                };
                line_no += 1;
                offset += n as i64;

                let argv = match parse_line(&buf, format, line_no) {
                    Ok(Some(argv)) => argv,
                    Ok(None) => {
                        sender.metrics().set_offset(offset);
                        continue;
                    }
                    Err(e) => {
                        warn!(path = %path, error = %e, "skipping unparsable line");
                        sender.metrics().record_parse_error(NAME);
                        sender.metrics().set_offset(offset);
                        continue;
                    }
                };

                if let Some(selected) = select_db(&argv) {
                    db = selected;
                    sender.metrics().set_offset(offset);
                    continue;
                }

                if !sender.send(Entry::new(argv).with_db(db)).await {
                    return;
                }
                sender.metrics().set_offset(offset);
            }

            debug!(path = %path, offset, "reached end of file");
            sender.metrics().mark_finished();
        })
    }

    fn shutdown(&self) {
        self.lifecycle.shutdown();
        // 未启动时也释放文件句柄
        if let Ok(mut slot) = self.file.lock() {
            slot.take();
        }
    }
}
