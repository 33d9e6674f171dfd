use serde_json::{Value, json};
use std::fs::{File, OpenOptions, create_dir_all};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use uuid::Uuid;

use super::types::{PipelineRun, RunEntry, StageResult};

/// Appends run events to `<log_dir>/runs.jsonl`.
pub struct RunLogger {
    path: PathBuf,
    file: Mutex<File>,
}

impl RunLogger {
    pub fn new(log_dir: impl AsRef<Path>) -> io::Result<Self> {
        create_dir_all(log_dir.as_ref())?;
        let path = log_dir.as_ref().join("runs.jsonl");
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Note: `flush` only pushes to OS buffers; it does not guarantee durability on disk.
    pub fn log_event(&self, run_id: Uuid, event: &str, data: Value) -> io::Result<()> {
        let record = json!({
            "ts": Utc::now().timestamp_millis(),
            "run_id": run_id.to_string(),
            "event": event,
            "data": data,
        });

        let line = serde_json::to_string(&record).map_err(io::Error::other)?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("logger mutex poisoned"))?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        Ok(())
    }

    pub fn log_entry(&self, run_id: Uuid, entry: &RunEntry) -> io::Result<()> {
        let (status, detail) = match &entry.result {
            StageResult::Structured(_) => ("structured", Value::Null),
            StageResult::Raw(text) => ("raw", json!({ "chars": text.chars().count() })),
            StageResult::Failed(reason) => ("failed", json!({ "reason": reason })),
        };
        self.log_event(
            run_id,
            "stage",
            json!({
                "stage": entry.stage,
                "status": status,
                "raw": entry.result.is_raw(),
                "elapsed_ms": entry.elapsed_ms,
                "detail": detail,
            }),
        )
    }

    pub fn log_finished(&self, run: &PipelineRun) -> io::Result<()> {
        self.log_event(
            run.run_id,
            "finished",
            json!({
                "pipeline": run.pipeline,
                "status": run.status,
                "stages": run.entries.len(),
                "raw_stages": run.raw_stages(),
                "failure": run.failure,
            }),
        )
    }
}
