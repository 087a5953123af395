#[cfg(test)]
#[path = "provider_test.rs"]
mod tests;

use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;

/// Known LLM providers. Every provider except Claude speaks the OpenAI chat
/// completions dialect, which is also what `Custom` expects behind its URL.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, EnumIter, EnumVariantNames, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ProviderName {
    #[default]
    OpenAI,
    DeepSeek,
    Claude,
    Ollama,
    Custom,
}

impl ProviderName {
    pub fn parse(text: String) -> Option<ProviderName> {
        return ProviderName::iter().find(|e| return e.to_string() == text);
    }

    pub fn default_url(&self) -> &'static str {
        match self {
            ProviderName::OpenAI => return "https://api.openai.com/v1",
            ProviderName::DeepSeek => return "https://api.deepseek.com/v1",
            ProviderName::Claude => return "https://api.anthropic.com/v1",
            ProviderName::Ollama => return "http://localhost:11434/v1",
            ProviderName::Custom => return "",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderName::OpenAI => return "gpt-4o",
            ProviderName::DeepSeek => return "deepseek-chat",
            ProviderName::Claude => return "claude-3-5-sonnet-20241022",
            ProviderName::Ollama => return "llama3.2",
            ProviderName::Custom => return "",
        }
    }

    /// Environment variables checked, in order, when no API key is configured.
    pub fn api_key_vars(&self) -> &'static [&'static str] {
        match self {
            ProviderName::OpenAI => return &["OPENAI_API_KEY", "LLM_API_KEY"],
            ProviderName::DeepSeek => return &["DEEPSEEK_API_KEY", "LLM_API_KEY"],
            ProviderName::Claude => return &["ANTHROPIC_API_KEY", "CLAUDE_API_KEY", "LLM_API_KEY"],
            ProviderName::Ollama => return &[],
            ProviderName::Custom => return &["LLM_API_KEY"],
        }
    }

    /// Local Ollama servers accept requests without a key.
    pub fn requires_api_key(&self) -> bool {
        return *self != ProviderName::Ollama;
    }
}
