//! Append-only JSONL message logs.
//!
//! Each session gets a `<sessionId>.jsonl` file under the messages
//! directory. Every record is one self-delimiting JSON line carrying its
//! monotonic `seq`; records never reference later records. The log is the
//! authoritative source for `message_count` — the index is derived.

use std::path::{Path, PathBuf};

use sg_domain::error::{Error, Result};
use sg_domain::message::Message;

/// Writes and reads per-session JSONL message logs.
pub struct MessageLog {
    base_dir: PathBuf,
}

impl MessageLog {
    pub fn new(base_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(base_dir).map_err(Error::Io)?;
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
        })
    }

    fn path(&self, session_id: &str) -> PathBuf {
        self.base_dir.join(format!("{session_id}.jsonl"))
    }

    /// Append one message. The caller has already assigned `seq`.
    pub fn append(&self, session_id: &str, msg: &Message) -> Result<()> {
        let json = serde_json::to_string(msg)
            .map_err(|e| Error::Write(format!("serializing message: {e}")))?;

        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(session_id))
            .map_err(|e| Error::Write(format!("opening message log: {e}")))?;
        file.write_all(json.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .map_err(|e| Error::Write(format!("appending message: {e}")))?;
        Ok(())
    }

    /// Read the full log in order. Malformed lines are skipped with a
    /// warning so one bad record cannot wedge a session.
    pub fn read_all(&self, session_id: &str) -> Result<Vec<Message>> {
        let path = self.path(session_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
        let mut messages = Vec::new();
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Message>(line) {
                Ok(msg) => messages.push(msg),
                Err(e) => {
                    tracing::warn!(
                        session_id = session_id,
                        error = %e,
                        "skipping malformed message log line"
                    );
                }
            }
        }
        Ok(messages)
    }

    /// Number of records in the log.
    pub fn count(&self, session_id: &str) -> Result<u64> {
        Ok(self.read_all(session_id)?.len() as u64)
    }

    /// Delete a session's log file. Missing files are fine.
    pub fn remove(&self, session_id: &str) -> Result<()> {
        let path = self.path(session_id);
        if path.exists() {
            std::fs::remove_file(path).map_err(Error::Io)?;
        }
        Ok(())
    }
}
