pub mod api;
pub mod app_config;
pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod errors;
pub mod evals;
pub mod knowledge;
pub mod label;
pub mod pipeline;
pub mod providers;
pub mod render;
pub mod sanitize;
pub mod search;
pub mod types;
pub mod ui;

#[cfg(test)]
pub(crate) mod test_support;

pub use crate::app_config::AppConfig;
pub use crate::errors::PipelineError;
pub use crate::pipeline::{
    PipelineCoordinator, PipelineInput, PipelineRun, ProgressReporter, Stage, StageResult,
};
pub use crate::types::ModelId;
