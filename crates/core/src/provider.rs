use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Missing API key for {provider_name}: {env_var} is not set")]
    MissingApiKey {
        provider_name: String,
        env_var: String,
    },

    #[error("Unknown provider: {0}")]
    Unknown(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Provider {
    #[default]
    Anthropic,
    Grok,
    Openai,
    Gemini,
}

/// Wire format spoken by a provider's completion endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiStyle {
    AnthropicMessages,
    ChatCompletions,
}

pub struct ProviderConfig {
    pub api_url: &'static str,
    pub model: &'static str,
    pub env_var: &'static str,
    pub style: ApiStyle,
}

impl Provider {
    pub fn config(&self) -> ProviderConfig {
        match self {
            Provider::Anthropic => ProviderConfig {
                api_url: "https://api.anthropic.com/v1/messages",
                model: "claude-sonnet-4-20250514",
                env_var: "ANTHROPIC_API_KEY",
                style: ApiStyle::AnthropicMessages,
            },
            Provider::Grok => ProviderConfig {
                api_url: "https://api.x.ai/v1/chat/completions",
                model: "grok-4-fast",
                env_var: "XAI_API_KEY",
                style: ApiStyle::ChatCompletions,
            },
            Provider::Openai => ProviderConfig {
                api_url: "https://api.openai.com/v1/chat/completions",
                model: "gpt-5.1",
                env_var: "OPENAI_API_KEY",
                style: ApiStyle::ChatCompletions,
            },
            Provider::Gemini => ProviderConfig {
                api_url: "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions",
                model: "gemini-3-pro",
                env_var: "GEMINI_API_KEY",
                style: ApiStyle::ChatCompletions,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Anthropic => "Anthropic",
            Provider::Grok => "Grok",
            Provider::Openai => "OpenAI",
            Provider::Gemini => "Gemini",
        }
    }

    /// Validate that the API key is set for this provider
    pub fn validate_api_key(&self) -> Result<String, ProviderError> {
        let config = self.config();
        std::env::var(config.env_var)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ProviderError::MissingApiKey {
                provider_name: self.name().to_string(),
                env_var: config.env_var.to_string(),
            })
    }
}

impl FromStr for Provider {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            "grok" | "xai" => Ok(Provider::Grok),
            "openai" => Ok(Provider::Openai),
            "gemini" => Ok(Provider::Gemini),
            other => Err(ProviderError::Unknown(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_aliases() {
        assert_eq!("Claude".parse::<Provider>().unwrap(), Provider::Anthropic);
        assert_eq!("xai".parse::<Provider>().unwrap(), Provider::Grok);
        assert!(matches!(
            "mistral".parse::<Provider>(),
            Err(ProviderError::Unknown(_))
        ));
    }

    #[test]
    fn only_anthropic_uses_messages_api() {
        assert_eq!(Provider::Anthropic.config().style, ApiStyle::AnthropicMessages);
        assert_eq!(Provider::Gemini.config().style, ApiStyle::ChatCompletions);
    }
}
