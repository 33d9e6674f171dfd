use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::PipelineError;

use super::contract::{Stage, StageInput};
use super::logging::RunLogger;
use super::progress::ProgressReporter;
use super::runner::StageRunner;
use super::types::{PipelineInput, PipelineRun, RunEntry, RunFailure, RunStatus, StageResult};

/// Runs a fixed, ordered list of stages end to end.
pub struct PipelineCoordinator {
    runner: StageRunner,
    logger: Option<Arc<RunLogger>>,
}

impl PipelineCoordinator {
    pub fn new(runner: StageRunner) -> Self {
        Self {
            runner,
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: Arc<RunLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn runner(&self) -> &StageRunner {
        &self.runner
    }

    /// Every stage's required parameters, checked before anything runs.
    fn check_configuration(
        input: &PipelineInput,
        stages: &[Arc<dyn Stage>],
    ) -> Result<(), PipelineError> {
        let mut missing: Vec<&str> = Vec::new();
        for key in stages.iter().flat_map(|s| s.required_params().iter().copied()) {
            if input.param(key).is_none() && !missing.contains(&key) {
                missing.push(key);
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::Configuration(missing.join(", ")))
        }
    }

    /// Execute `stages` in order. Only configuration problems are returned as
    /// `Err`; stage failures end up in the returned run.
    pub async fn execute(
        &self,
        pipeline: &str,
        input: &PipelineInput,
        stages: &[Arc<dyn Stage>],
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<PipelineRun, PipelineError> {
        Self::check_configuration(input, stages)?;
        progress.reset();

        let mut run = PipelineRun::new(pipeline);
        run.status = RunStatus::Running;
        log::info!(
            "run {} ({pipeline}) starting with {} stages",
            run.run_id,
            stages.len()
        );

        let total = stages.len();
        for (index, stage) in stages.iter().enumerate() {
            if cancel.is_cancelled() {
                let reason = PipelineError::Cancelled(stage.name().to_string()).to_string();
                self.fail(&mut run, stage.name(), reason);
                break;
            }

            let started = Instant::now();
            let prior = run.entries.last().map(|e| &e.result);
            let stage_input = StageInput {
                pipeline: input,
                prior,
            };

            let result = match stage.validate_input(&stage_input) {
                Err(e) => StageResult::Failed(e.to_string()),
                Ok(()) => match stage.build_request(&stage_input).await {
                    Err(e) => StageResult::Failed(e.to_string()),
                    Ok(request) => self.runner.run(stage.as_ref(), &request, progress).await,
                },
            };

            let entry = RunEntry {
                stage: stage.name().to_string(),
                result,
                elapsed_ms: started.elapsed().as_millis() as u64,
            };
            if let Some(logger) = &self.logger
                && let Err(e) = logger.log_entry(run.run_id, &entry)
            {
                log::warn!("failed to write run log: {e}");
            }

            let failure = entry.result.failure_reason().map(str::to_string);
            if entry.result.is_raw() {
                log::warn!("run {}: stage '{}' produced raw output", run.run_id, entry.stage);
            }
            run.entries.push(entry);

            if let Some(reason) = failure {
                self.fail(&mut run, stage.name(), reason);
                break;
            }

            let fraction = (index + 1) as f64 / total as f64;
            run.progress = progress.advance(
                stage.name(),
                fraction,
                format!("{} complete", stage.name()),
            );
        }

        if run.status == RunStatus::Running {
            run.status = RunStatus::Succeeded;
            run.final_output = run.entries.last().map(|e| e.result.clone());
            log::info!("run {} ({pipeline}) succeeded", run.run_id);
        }
        run.finished_at = Some(Utc::now());

        if let Some(logger) = &self.logger
            && let Err(e) = logger.log_finished(&run)
        {
            log::warn!("failed to write run log: {e}");
        }
        Ok(run)
    }

    fn fail(&self, run: &mut PipelineRun, stage: &str, reason: String) {
        log::error!("run {}: stage '{stage}' failed: {reason}", run.run_id);
        run.status = RunStatus::Failed;
        run.failure = Some(RunFailure {
            stage: stage.to_string(),
            reason,
        });
    }
}

impl Default for PipelineCoordinator {
    fn default() -> Self {
        Self::new(StageRunner::default())
    }
}
