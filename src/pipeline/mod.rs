pub mod contract;
pub mod coordinator;
pub mod logging;
pub mod progress;
pub mod resolve;
pub mod runner;
pub mod types;

pub use contract::{OutputSchema, Stage, StageContract, StageInput};
pub use coordinator::PipelineCoordinator;
pub use logging::RunLogger;
pub use progress::{ProgressCallback, ProgressReporter, ProgressUpdate};
pub use resolve::{AgentResponse, ContentMarker, resolve};
pub use runner::{RunnerSettings, StageRunner};
pub use types::{
    Payload, PipelineInput, PipelineRun, RunEntry, RunFailure, RunStatus, StageRequest,
    StageResult, StructuredPayload,
};
