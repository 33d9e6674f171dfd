//! Last successful run per pipeline, kept verbatim so it can be shown again
//! without re-running. Stored in `.relayrs/last/<pipeline>.json`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::pipeline::PipelineRun;

pub struct LastRunCache {
    dir: PathBuf,
}

impl LastRunCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, pipeline: &str) -> PathBuf {
        self.dir.join(format!("{pipeline}.json"))
    }

    /// Store `run`; unsuccessful runs are ignored and `Ok(false)` is returned.
    pub fn save(&self, run: &PipelineRun) -> anyhow::Result<bool> {
        if !run.succeeded() {
            return Ok(false);
        }
        fs::create_dir_all(&self.dir)?;
        let content = serde_json::to_string_pretty(run)?;
        fs::write(self.path_for(&run.pipeline), content)?;
        Ok(true)
    }

    pub fn load(&self, pipeline: &str) -> anyhow::Result<Option<PipelineRun>> {
        let path = self.path_for(pipeline);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
