use thiserror::Error;

/// Errors raised by a model provider while talking to its backend.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    ApiError(String),

    #[error("Missing API key for {0}")]
    MissingApiKey(String),

    #[error("Provider configuration error: {0}")]
    Config(String),
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Search API Error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid search response: {0}")]
    InvalidResponse(String),
}

#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Knowledge base unreachable at {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("Knowledge base error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid knowledge base response: {0}")]
    InvalidResponse(String),
}

/// Errors local to one pipeline run.
///
/// Only `Configuration` escapes `PipelineCoordinator::execute`; everything else
/// is folded into a `StageResult::Failed` entry in the run log.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("missing configuration: {0}")]
    Configuration(String),

    #[error("invalid input for stage '{stage}': {reason}")]
    InvalidInput { stage: String, reason: String },

    #[error("upstream call error: {0}")]
    UpstreamCall(String),

    #[error("unparseable response")]
    UnparseableResponse,

    #[error("pipeline cancelled before stage '{0}'")]
    Cancelled(String),
}

impl PipelineError {
    pub fn invalid_input(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            stage: stage.into(),
            reason: reason.into(),
        }
    }
}

impl From<ProviderError> for PipelineError {
    fn from(err: ProviderError) -> Self {
        Self::UpstreamCall(err.to_string())
    }
}

impl From<SearchError> for PipelineError {
    fn from(err: SearchError) -> Self {
        Self::UpstreamCall(format!("web search: {err}"))
    }
}

impl From<KnowledgeError> for PipelineError {
    fn from(err: KnowledgeError) -> Self {
        match err {
            KnowledgeError::Unreachable { .. } => Self::Configuration(err.to_string()),
            other => Self::UpstreamCall(format!("knowledge base: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_message_is_prefixed() {
        let err: PipelineError =
            ProviderError::ApiError("Groq API Error 401: bad key".into()).into();
        assert_eq!(
            err.to_string(),
            "upstream call error: Groq API Error 401: bad key"
        );
    }

    #[test]
    fn unreachable_knowledge_base_is_configuration() {
        let err: PipelineError = KnowledgeError::Unreachable {
            url: "http://localhost:5532".into(),
            reason: "connection refused".into(),
        }
        .into();
        assert!(matches!(err, PipelineError::Configuration(_)));
        assert!(err.to_string().starts_with("missing configuration"));
    }

    #[test]
    fn invalid_input_names_stage() {
        let err = PipelineError::invalid_input("linguist", "empty ingredient list");
        assert_eq!(
            err.to_string(),
            "invalid input for stage 'linguist': empty ingredient list"
        );
    }
}
