use serde::Serialize;
use std::sync::{Arc, Mutex};

/// A single progress notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub stage: String,
    /// Fraction of the pipeline completed, in [0, 1].
    pub fraction: f64,
    pub message: String,
}

pub type ProgressCallback = Arc<dyn Fn(&ProgressUpdate) + Send + Sync>;

/// Per-run progress sink. Reported fractions never go backwards.
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    current: Mutex<f64>,
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            current: Mutex::new(0.0),
        }
    }

    pub fn silent() -> Self {
        Self {
            callback: None,
            current: Mutex::new(0.0),
        }
    }

    pub fn current(&self) -> f64 {
        self.current.lock().map(|c| *c).unwrap_or(0.0)
    }

    /// Start over at zero for a new run.
    pub fn reset(&self) {
        if let Ok(mut current) = self.current.lock() {
            *current = 0.0;
        }
    }

    /// Announce that `stage` is starting, at the current fraction.
    pub fn stage_started(&self, stage: &str, message: impl Into<String>) {
        let fraction = self.current();
        self.emit(stage, fraction, message.into());
    }

    /// Move to `fraction` (clamped to [current, 1]) and announce it.
    pub fn advance(&self, stage: &str, fraction: f64, message: impl Into<String>) -> f64 {
        let fraction = {
            let Ok(mut current) = self.current.lock() else {
                return 0.0;
            };
            let next = fraction.clamp(*current, 1.0);
            *current = next;
            next
        };
        self.emit(stage, fraction, message.into());
        fraction
    }

    fn emit(&self, stage: &str, fraction: f64, message: String) {
        log::debug!("progress {:.0}% [{stage}] {message}", fraction * 100.0);
        if let Some(cb) = &self.callback {
            cb(&ProgressUpdate {
                stage: stage.to_string(),
                fraction,
                message,
            });
        }
    }
}
