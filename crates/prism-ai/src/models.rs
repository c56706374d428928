//! Model catalog with public lookup API.

/// A model the backend can route to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelInfo {
    /// Routing id sent to the backend (e.g., "anthropic/claude-sonnet-4")
    pub id: &'static str,
    /// Human-readable name
    pub name: &'static str,
    pub description: &'static str,
    /// Lab that trains the model
    pub lab: &'static str,
    /// Whether the model accepts a reasoning level
    pub reasoning: bool,
}

const fn model(
    lab: &'static str,
    id: &'static str,
    name: &'static str,
    description: &'static str,
    reasoning: bool,
) -> ModelInfo {
    ModelInfo {
        id,
        name,
        description,
        lab,
        reasoning,
    }
}

static MODELS: &[ModelInfo] = &[
    model("Anthropic", "anthropic/claude-opus-4", "Claude 4 Opus", "Anthropic's most intelligent model yet.", true),
    model("Anthropic", "anthropic/claude-sonnet-4", "Claude 4 Sonnet", "Anthropic's flagship hybrid reasoning model.", true),
    model("Anthropic", "anthropic/claude-3.7-sonnet:thinking", "Claude 3.7 Sonnet", "Anthropic's previous flagship model.", true),
    model("Anthropic", "anthropic/claude-3.5-sonnet", "Claude 3.5 Sonnet", "Anthropic's previous flagship model.", false),
    model("DeepSeek", "deepseek/deepseek-r1-0528", "DeepSeek R1 (05/28)", "Updated DeepSeek R1, released on May 28th.", true),
    model("DeepSeek", "deepseek/deepseek-chat-v3-0324", "DeepSeek V3 (03/24)", "Updated DeepSeek V3, released on March 24th.", false),
    model("DeepSeek", "deepseek/deepseek-r1", "DeepSeek R1", "Original DeepSeek R1.", true),
    model("Google", "google/gemini-2.5-pro-preview", "Gemini 2.5 Pro", "Google's Gemini 2.5 Pro model.", true),
    model("Google", "google/gemini-2.5-flash-preview-05-20", "Gemini 2.5 Flash", "Google's Gemini 2.5 Flash model.", false),
    model("Google", "google/gemini-2.0-flash-001", "Gemini 2.0 Flash", "Google's Gemini 2.0 Flash model.", false),
    model("Meta", "meta-llama/llama-4-maverick", "Llama 4 Maverick", "Meta's Llama 4 Maverick model.", false),
    model("Meta", "meta-llama/llama-4-scout", "Llama 4 Scout", "Meta's Llama 4 Scout model.", false),
    model("Meta", "meta-llama/llama-3.3-70b-instruct", "Llama 3.3 70B", "Meta's Llama 3.3 70B model.", false),
    model("OpenAI", "openai/o3", "o3", "OpenAI's o3 model.", true),
    model("OpenAI", "openai/o4-mini", "o4 mini", "OpenAI's o4 mini model.", true),
    model("OpenAI", "openai/o3-mini", "o3 mini", "OpenAI's o3 mini model.", true),
    model("OpenAI", "openai/gpt-4.1", "GPT 4.1", "OpenAI's GPT 4.1 model.", false),
    model("OpenAI", "openai/gpt-4.1-mini", "GPT 4.1 Mini", "OpenAI's GPT 4.1 Mini model.", false),
    model("OpenAI", "openai/gpt-4o", "GPT 4o", "OpenAI's GPT 4o model.", false),
    model("Qwen", "qwen/qwen3-235b-a22b", "Qwen 3 235B A22B", "Qwen's 3 235B model.", true),
    model("Qwen", "qwen/qwen3-32b", "Qwen 3 32B", "Qwen's 3 32B model.", true),
    model("xAI", "x-ai/grok-3-beta", "Grok 3", "xAI's Grok 3 model.", false),
    model("xAI", "x-ai/grok-3-mini-beta", "Grok 3 Mini", "xAI's Grok 3 Mini model.", false),
];

/// The model used when nothing is configured.
pub fn default_model() -> &'static ModelInfo {
    &MODELS[0]
}

/// Look up a model by exact ID.
pub fn get_model(id: &str) -> Option<&'static ModelInfo> {
    MODELS.iter().find(|m| m.id == id)
}

/// Get all registered models.
pub fn get_all_models() -> &'static [ModelInfo] {
    MODELS
}

/// Get all models from one lab (case-insensitive).
pub fn get_models_by_lab(lab: &str) -> Vec<&'static ModelInfo> {
    MODELS
        .iter()
        .filter(|m| m.lab.eq_ignore_ascii_case(lab))
        .collect()
}

/// Find the first model whose id or name contains `query` (case-insensitive).
pub fn find_model(query: &str) -> Option<&'static ModelInfo> {
    if let Some(exact) = get_model(query) {
        return Some(exact);
    }
    let query = query.to_lowercase();
    MODELS.iter().find(|m| {
        m.id.to_lowercase().contains(&query) || m.name.to_lowercase().contains(&query)
    })
}

/// Whether a reasoning level should be sent for this model.
///
/// Models outside the catalog are assumed to accept it; the backend decides.
pub fn supports_reasoning(id: &str) -> bool {
    get_model(id).map(|m| m.reasoning).unwrap_or(true)
}

/// Display name for a model id, falling back to the id itself.
pub fn display_name(id: &str) -> &str {
    get_model(id).map(|m| m.name).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_is_first_entry() {
        assert_eq!(default_model().id, "anthropic/claude-opus-4");
    }

    #[test]
    fn test_get_model_exact() {
        let m = get_model("openai/gpt-4o").unwrap();
        assert_eq!(m.name, "GPT 4o");
        assert!(!m.reasoning);
    }

    #[test]
    fn test_find_model_by_name_fragment() {
        let m = find_model("sonnet").unwrap();
        assert_eq!(m.id, "anthropic/claude-sonnet-4");
    }

    #[test]
    fn test_models_by_lab() {
        let google = get_models_by_lab("google");
        assert!(!google.is_empty());
        assert!(google.iter().all(|m| m.id.starts_with("google/")));
    }

    #[test]
    fn test_supports_reasoning() {
        assert!(supports_reasoning("deepseek/deepseek-r1"));
        assert!(!supports_reasoning("openai/gpt-4.1"));
        assert!(supports_reasoning("someone/custom-model"));
    }

    #[test]
    fn test_display_name_fallback() {
        assert_eq!(display_name("x-ai/grok-3-beta"), "Grok 3");
        assert_eq!(display_name("unknown/model"), "unknown/model");
    }

    #[test]
    fn test_ids_unique() {
        let mut ids: Vec<_> = MODELS.iter().map(|m| m.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), MODELS.len());
    }
}
