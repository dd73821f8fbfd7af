//! Model catalog
//!
//! Curated registry of selectable models. Template families are resolved
//! here, once, rather than re-derived from identifiers at render time.

use once_cell::sync::Lazy;

use super::types::ModelDescriptor;
use crate::template::TemplateFamily;

static CATALOG: Lazy<Vec<ModelDescriptor>> = Lazy::new(|| {
    vec![
        ModelDescriptor {
            id: "phi-3-mini-4k-instruct-Q4_K_M".to_string(),
            name: "Phi-3 Mini 4K".to_string(),
            size: "2.4 GB".to_string(),
            size_bytes: 2_400_000_000,
            params: "3.8B".to_string(),
            description: "Fast and efficient. Great for general conversations and quick responses."
                .to_string(),
            repo_url: "https://huggingface.co/bartowski/Phi-3-mini-4k-instruct-GGUF".to_string(),
            filename: "Phi-3-mini-4k-instruct-Q4_K_M.gguf".to_string(),
            quantization: "Q4_K_M".to_string(),
            template_family: TemplateFamily::RoleTag,
        },
        ModelDescriptor {
            id: "Mistral-7B-Instruct-v0.3-Q4_K_M".to_string(),
            name: "Mistral 7B Instruct".to_string(),
            size: "4.4 GB".to_string(),
            size_bytes: 4_400_000_000,
            params: "7B".to_string(),
            description: "Excellent reasoning capabilities. Best for complex problem-solving."
                .to_string(),
            repo_url: "https://huggingface.co/bartowski/Mistral-7B-Instruct-v0.3-GGUF".to_string(),
            filename: "Mistral-7B-Instruct-v0.3-Q4_K_M.gguf".to_string(),
            quantization: "Q4_K_M".to_string(),
            template_family: TemplateFamily::Instruct,
        },
        ModelDescriptor {
            id: "Meta-Llama-3.1-8B-Instruct-Q4_K_M".to_string(),
            name: "Llama 3.1 8B".to_string(),
            size: "4.9 GB".to_string(),
            size_bytes: 4_900_000_000,
            params: "8B".to_string(),
            description: "Optimized for coding tasks. Perfect for development assistance."
                .to_string(),
            repo_url: "https://huggingface.co/bartowski/Meta-Llama-3.1-8B-Instruct-GGUF"
                .to_string(),
            filename: "Meta-Llama-3.1-8B-Instruct-Q4_K_M.gguf".to_string(),
            quantization: "Q4_K_M".to_string(),
            template_family: TemplateFamily::HeaderTag,
        },
        ModelDescriptor {
            id: "gemma-2-2b-it-Q4_K_M".to_string(),
            name: "Gemma 2 2B".to_string(),
            size: "1.7 GB".to_string(),
            size_bytes: 1_700_000_000,
            params: "2B".to_string(),
            description: "Lightweight and fast. Ideal for devices with limited storage."
                .to_string(),
            repo_url: "https://huggingface.co/bartowski/gemma-2-2b-it-GGUF".to_string(),
            filename: "gemma-2-2b-it-Q4_K_M.gguf".to_string(),
            quantization: "Q4_K_M".to_string(),
            template_family: TemplateFamily::TurnMarker,
        },
    ]
});

/// All selectable models.
pub fn catalog() -> &'static [ModelDescriptor] {
    &CATALOG
}

/// Look up a catalog entry by id.
pub fn find(model_id: &str) -> Option<&'static ModelDescriptor> {
    CATALOG.iter().find(|m| m.id == model_id)
}
