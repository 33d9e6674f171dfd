use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn llama4_scout() -> Self {
        Self::new("meta-llama/llama-4-scout-17b-16e-instruct")
    }

    pub fn llama4_maverick() -> Self {
        Self::new("meta-llama/llama-4-maverick-17b-128e-instruct")
    }

    pub fn gpt_4o_mini() -> Self {
        Self::new("gpt-4o-mini")
    }

    pub fn claude_sonnet() -> Self {
        Self::new("claude-3-5-sonnet-20241022")
    }

    /// Completion budget for a model, leaving headroom below its context window.
    pub fn max_tokens(&self) -> u32 {
        let model = self.0.to_lowercase();
        match model.as_str() {
            m if m.contains("llama-4") => 8192,
            m if m.contains("mixtral") => 8192,
            m if m.contains("gemma") => 4096,
            m if m.contains("gpt-4o") => 16384,
            m if m.contains("gpt-4") => 4096,
            m if m.contains("claude") => 8192,
            _ => 4096,
        }
    }

    /// Whether the model accepts image attachments.
    pub fn supports_vision(&self) -> bool {
        let model = self.0.to_lowercase();
        model.contains("llama-4")
            || model.contains("gpt-4o")
            || model.contains("claude-3")
            || model.contains("vision")
            || model.contains("llava")
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
