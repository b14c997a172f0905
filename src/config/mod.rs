//! 配置模块：后端配置档案、提供商配置与持久化存储。
//!
//! # Configuration Module
//!
//! - [`BackendKind`] / [`BackendProfile`]: the closed set of supported backends
//!   and their defaults (base URL, alternate regional host, model, timeout).
//! - [`ProvidersConfig`]: the single `providerConfig` record the registry owns
//!   and persists through a [`store::ConfigStore`].
//! - [`credentials`]: API key resolution from config, environment and keyring.
//!
//! ```rust
//! use ai_agent_providers::config::{BackendKind, ProvidersConfig};
//!
//! let mut config = ProvidersConfig::default();
//! config.primary = Some("zhipu".into());
//! let zhipu = config.provider("zhipu").unwrap();
//! assert_eq!(zhipu.kind, BackendKind::Zhipu);
//! assert_eq!(zhipu.alternate_base_urls().len(), 1);
//! assert!(config.validate().is_ok());
//! ```

pub mod credentials;
pub mod store;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::time::Duration;

use crate::error::ErrorContext;
use crate::{Error, Result};

pub use credentials::CredentialOptions;
pub use store::{ConfigStore, FileConfigStore, MemoryConfigStore, CONFIG_KEY};

/// Overrides the default request timeout for every backend without an explicit value.
pub const HTTP_TIMEOUT_ENV: &str = "AI_AGENT_HTTP_TIMEOUT_MS";

/// Supported chat-completion backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    OpenAi,
    OpenRouter,
    DeepSeek,
    Groq,
    Moonshot,
    Zhipu,
    Ollama,
    LmStudio,
}

/// Static defaults for one backend kind.
#[derive(Debug, Clone, Copy)]
pub struct BackendProfile {
    pub base_url: &'static str,
    pub alternate_base_urls: &'static [&'static str],
    pub model: &'static str,
    pub requires_key: bool,
    pub timeout_ms: u64,
    pub supports_vision: bool,
}

impl BackendKind {
    pub const ALL: [BackendKind; 8] = [
        BackendKind::OpenAi,
        BackendKind::OpenRouter,
        BackendKind::DeepSeek,
        BackendKind::Groq,
        BackendKind::Moonshot,
        BackendKind::Zhipu,
        BackendKind::Ollama,
        BackendKind::LmStudio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::OpenAi => "openai",
            BackendKind::OpenRouter => "openrouter",
            BackendKind::DeepSeek => "deepseek",
            BackendKind::Groq => "groq",
            BackendKind::Moonshot => "moonshot",
            BackendKind::Zhipu => "zhipu",
            BackendKind::Ollama => "ollama",
            BackendKind::LmStudio => "lmstudio",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
    }

    pub fn profile(&self) -> BackendProfile {
        match self {
            BackendKind::OpenAi => BackendProfile {
                base_url: "https://api.openai.com/v1",
                alternate_base_urls: &[],
                model: "gpt-4o-mini",
                requires_key: true,
                timeout_ms: 120_000,
                supports_vision: true,
            },
            BackendKind::OpenRouter => BackendProfile {
                base_url: "https://openrouter.ai/api/v1",
                alternate_base_urls: &[],
                model: "openai/gpt-4o-mini",
                requires_key: true,
                timeout_ms: 120_000,
                supports_vision: true,
            },
            BackendKind::DeepSeek => BackendProfile {
                base_url: "https://api.deepseek.com/v1",
                alternate_base_urls: &[],
                model: "deepseek-chat",
                requires_key: true,
                timeout_ms: 180_000,
                supports_vision: false,
            },
            BackendKind::Groq => BackendProfile {
                base_url: "https://api.groq.com/openai/v1",
                alternate_base_urls: &[],
                model: "llama-3.3-70b-versatile",
                requires_key: true,
                timeout_ms: 120_000,
                supports_vision: false,
            },
            BackendKind::Moonshot => BackendProfile {
                base_url: "https://api.moonshot.ai/v1",
                alternate_base_urls: &["https://api.moonshot.cn/v1"],
                model: "kimi-k2-0905-preview",
                requires_key: true,
                timeout_ms: 180_000,
                supports_vision: false,
            },
            BackendKind::Zhipu => BackendProfile {
                base_url: "https://api.z.ai/api/paas/v4",
                alternate_base_urls: &["https://open.bigmodel.cn/api/paas/v4"],
                model: "glm-4.6",
                requires_key: true,
                timeout_ms: 300_000,
                supports_vision: false,
            },
            BackendKind::Ollama => BackendProfile {
                base_url: "http://localhost:11434",
                alternate_base_urls: &[],
                model: "qwen2.5:7b",
                requires_key: false,
                timeout_ms: 300_000,
                supports_vision: false,
            },
            BackendKind::LmStudio => BackendProfile {
                base_url: "http://localhost:1234/v1",
                alternate_base_urls: &[],
                model: "local-model",
                requires_key: false,
                timeout_ms: 300_000,
                supports_vision: false,
            },
        }
    }

    pub fn is_local(&self) -> bool {
        !self.profile().requires_key
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sampling parameters applied when a request does not set its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_penalty: Option<f64>,
}

fn default_enabled() -> bool {
    true
}

/// Per-backend configuration. Unset fields fall back to the kind's profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub kind: BackendKind,
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_base_urls: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub sampling: SamplingDefaults,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_vision: Option<bool>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl ProviderConfig {
    pub fn for_kind(kind: BackendKind) -> Self {
        Self {
            kind,
            api_key: String::new(),
            base_url: None,
            alternate_base_urls: None,
            model: None,
            sampling: SamplingDefaults::default(),
            request_timeout_ms: None,
            supports_vision: None,
            enabled: true,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_alternate_base_urls(mut self, urls: Vec<String>) -> Self {
        self.alternate_base_urls = Some(urls);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.request_timeout_ms = Some(ms);
        self
    }

    pub fn base_url(&self) -> String {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(self.kind.profile().base_url)
            .trim_end_matches('/')
            .to_string()
    }

    /// Alternate regional hosts. An explicit empty list disables failover; a
    /// custom base URL without explicit alternates has none.
    pub fn alternate_base_urls(&self) -> Vec<String> {
        match &self.alternate_base_urls {
            Some(urls) => urls.clone(),
            None if self.base_url.is_none() => self
                .kind
                .profile()
                .alternate_base_urls
                .iter()
                .map(|s| s.to_string())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn model(&self) -> String {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(self.kind.profile().model)
            .to_string()
    }

    pub fn request_timeout(&self) -> Duration {
        let ms = self
            .request_timeout_ms
            .or_else(|| env::var(HTTP_TIMEOUT_ENV).ok().and_then(|s| s.trim().parse().ok()))
            .unwrap_or(self.kind.profile().timeout_ms);
        Duration::from_millis(ms)
    }

    pub fn vision_enabled(&self) -> bool {
        self.supports_vision
            .unwrap_or(self.kind.profile().supports_vision)
    }
}

/// The persisted `providerConfig` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvidersConfig {
    #[serde(default)]
    pub primary: Option<String>,
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
    #[serde(default)]
    pub credentials: CredentialOptions,
}

impl Default for ProvidersConfig {
    /// One entry per backend kind, keyed by the kind's name, no primary.
    fn default() -> Self {
        Self {
            primary: None,
            providers: BackendKind::ALL
                .into_iter()
                .map(|k| (k.as_str().to_string(), ProviderConfig::for_kind(k)))
                .collect(),
            credentials: CredentialOptions::default(),
        }
    }
}

impl ProvidersConfig {
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    /// Check the record before it is persisted or applied.
    pub fn validate(&self) -> Result<()> {
        if let Some(primary) = &self.primary {
            match self.providers.get(primary) {
                None => {
                    return Err(Error::configuration_with_context(
                        format!("primary provider '{}' is not configured", primary),
                        ErrorContext::new()
                            .with_field_path("primary")
                            .with_source("providers_config"),
                    ))
                }
                Some(p) if !p.enabled => {
                    return Err(Error::configuration_with_context(
                        format!("primary provider '{}' is disabled", primary),
                        ErrorContext::new()
                            .with_field_path(format!("providers.{}.enabled", primary))
                            .with_source("providers_config"),
                    ))
                }
                Some(_) => {}
            }
        }

        for (name, provider) in &self.providers {
            let urls = std::iter::once(provider.base_url()).chain(provider.alternate_base_urls());
            for (i, u) in urls.enumerate() {
                if let Err(e) = url::Url::parse(&u) {
                    let field = if i == 0 {
                        format!("providers.{}.baseUrl", name)
                    } else {
                        format!("providers.{}.alternateBaseUrls[{}]", name, i - 1)
                    };
                    return Err(Error::configuration_with_context(
                        format!("invalid URL '{}'", u),
                        ErrorContext::new()
                            .with_field_path(field)
                            .with_details(e.to_string())
                            .with_source("providers_config"),
                    ));
                }
            }
        }
        Ok(())
    }
}
