//! Append-only per-session tool execution logs.
//!
//! Distinct from the message log: every status transition of a tool
//! invocation is appended as its own record, so the file is a full audit
//! trail. The latest record per `tool_id` is the current state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use uuid::Uuid;

use sg_domain::error::{Error, Result};
use sg_domain::tool::ToolExecutionRecord;

pub struct ToolLog {
    base_dir: PathBuf,
    /// Next seq per session, lazily initialized from the file.
    next_seq: Mutex<HashMap<String, u64>>,
}

impl ToolLog {
    pub fn new(base_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(base_dir).map_err(Error::Io)?;
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            next_seq: Mutex::new(HashMap::new()),
        })
    }

    fn path(&self, session_id: &str) -> PathBuf {
        self.base_dir.join(format!("{session_id}.tools.jsonl"))
    }

    /// Append a record, assigning its per-session `seq`. Returns the seq.
    pub fn append(&self, mut record: ToolExecutionRecord) -> Result<u64> {
        let session_id = record.session_id.clone();
        let seq = {
            let mut seqs = self.next_seq.lock();
            let counter = match seqs.get_mut(&session_id) {
                Some(c) => c,
                None => {
                    let start = self.read_all(&session_id)?.len() as u64;
                    seqs.entry(session_id.clone()).or_insert(start)
                }
            };
            *counter += 1;
            *counter
        };
        record.seq = seq;

        let json = serde_json::to_string(&record)
            .map_err(|e| Error::Write(format!("serializing tool record: {e}")))?;

        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(&session_id))
            .map_err(|e| Error::Write(format!("opening tool log: {e}")))?;
        file.write_all(json.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .map_err(|e| Error::Write(format!("appending tool record: {e}")))?;

        Ok(seq)
    }

    /// Read the full transition history in order.
    pub fn read_all(&self, session_id: &str) -> Result<Vec<ToolExecutionRecord>> {
        let path = self.path(session_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
        let mut records = Vec::new();
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ToolExecutionRecord>(line) {
                Ok(r) => records.push(r),
                Err(e) => {
                    tracing::warn!(
                        session_id = session_id,
                        error = %e,
                        "skipping malformed tool log line"
                    );
                }
            }
        }
        Ok(records)
    }

    /// Current state per tool id (last record wins).
    pub fn latest(&self, session_id: &str) -> Result<HashMap<Uuid, ToolExecutionRecord>> {
        let mut latest = HashMap::new();
        for record in self.read_all(session_id)? {
            latest.insert(record.tool_id, record);
        }
        Ok(latest)
    }

    pub fn remove(&self, session_id: &str) -> Result<()> {
        self.next_seq.lock().remove(session_id);
        let path = self.path(session_id);
        if path.exists() {
            std::fs::remove_file(path).map_err(Error::Io)?;
        }
        Ok(())
    }
}
