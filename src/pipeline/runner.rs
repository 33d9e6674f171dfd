use chrono::Utc;
use std::time::Duration;

use crate::api::Message;
use crate::providers::InferenceRequest;

use super::contract::Stage;
use super::progress::ProgressReporter;
use super::resolve::{AgentResponse, ContentMarker, resolve};
use super::types::{StageRequest, StageResult};

#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub stage_timeout: Duration,
    pub temperature: Option<f32>,
    pub markers: Vec<ContentMarker>,
    /// Append the current date and time to every stage's instructions.
    pub add_datetime: bool,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            stage_timeout: Duration::from_secs(300),
            temperature: Some(0.2),
            markers: ContentMarker::defaults(),
            add_datetime: true,
        }
    }
}

/// Executes exactly one stage against its agent and resolves the response.
pub struct StageRunner {
    settings: RunnerSettings,
}

impl StageRunner {
    pub fn new(settings: RunnerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    fn inference_request(&self, stage: &dyn Stage, request: &StageRequest) -> InferenceRequest {
        let mut system = request.system.clone();
        if self.settings.add_datetime {
            system.push_str(&format!(
                "\n\nCurrent date and time: {}",
                Utc::now().format("%Y-%m-%d %H:%M UTC")
            ));
        }

        let message = if request.attachments.is_empty() {
            Message::user(request.prompt.clone())
        } else {
            Message::user_with_attachments(request.prompt.clone(), &request.attachments)
        };

        InferenceRequest {
            model: request.model.clone(),
            messages: vec![message],
            max_tokens: request.model.max_tokens(),
            temperature: self.settings.temperature,
            system,
            json_mode: stage.output_schema().expects_json(),
        }
    }

    /// Invoke the stage's agent once. Never retries.
    pub async fn run(
        &self,
        stage: &dyn Stage,
        request: &StageRequest,
        progress: &ProgressReporter,
    ) -> StageResult {
        progress.stage_started(
            stage.name(),
            format!("Running {} ({})", stage.name(), request.model),
        );

        if !request.attachments.is_empty() && !stage.agent().supports_images() {
            return StageResult::Failed(format!(
                "upstream call error: provider '{}' cannot accept image attachments",
                stage.agent().name()
            ));
        }

        let inference = self.inference_request(stage, request);
        let call = stage.agent().infer(&inference);

        let response = match tokio::time::timeout(self.settings.stage_timeout, call).await {
            Err(_) => {
                log::warn!(
                    "stage '{}' timed out after {}s",
                    stage.name(),
                    self.settings.stage_timeout.as_secs()
                );
                return StageResult::Failed(format!(
                    "upstream call error: timed out after {}s",
                    self.settings.stage_timeout.as_secs()
                ));
            }
            Ok(Err(e)) => {
                log::warn!("stage '{}' upstream error: {e}", stage.name());
                return StageResult::Failed(format!("upstream call error: {e}"));
            }
            Ok(Ok(response)) => response,
        };

        log::debug!(
            "stage '{}' finished ({}), tokens in/out {}/{}",
            stage.name(),
            response.stop_reason,
            response.usage.input_tokens,
            response.usage.output_tokens
        );

        let agent_response = AgentResponse::from(response);
        let result = resolve(&agent_response, stage.output_schema(), &self.settings.markers);
        if result.is_raw() {
            log::warn!(
                "stage '{}' output did not match {}; forwarding raw text",
                stage.name(),
                stage.output_schema().describe()
            );
        }
        result
    }
}

impl Default for StageRunner {
    fn default() -> Self {
        Self::new(RunnerSettings::default())
    }
}
