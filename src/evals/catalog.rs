use crate::types::ModelId;

/// A selectable Groq model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelOption {
    pub label: &'static str,
    pub id: &'static str,
}

pub const MODEL_OPTIONS: &[ModelOption] = &[
    ModelOption {
        label: "Llama4 Scout",
        id: "meta-llama/llama-4-scout-17b-16e-instruct",
    },
    ModelOption {
        label: "Llama4 Maverick",
        id: "meta-llama/llama-4-maverick-17b-128e-instruct",
    },
    ModelOption {
        label: "Gemma 7B (Groq)",
        id: "gemma-7b-it",
    },
    ModelOption {
        label: "Mixtral 8x7B (Groq)",
        id: "mixtral-8x7b-32768",
    },
];

pub fn default_planning_model() -> ModelId {
    ModelId::llama4_scout()
}

pub fn default_framework_model() -> ModelId {
    ModelId::llama4_maverick()
}

/// Resolve a catalog label (case-insensitive) to its model id. Anything else
/// is taken as a literal model id.
pub fn resolve_model(name: &str) -> ModelId {
    let name = name.trim();
    MODEL_OPTIONS
        .iter()
        .find(|opt| opt.label.eq_ignore_ascii_case(name))
        .map(|opt| ModelId::new(opt.id))
        .unwrap_or_else(|| ModelId::new(name))
}
