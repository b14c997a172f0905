use keyring::Entry;
use serde::{Deserialize, Serialize};
use std::env;

use super::ProviderConfig;

/// Service name under which API keys are stored in the OS keyring.
pub const KEYRING_SERVICE: &str = "ai-agent-providers";

/// Where API keys may be looked up when the config leaves them empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialOptions {
    /// Consult the OS keyring (entry: service [`KEYRING_SERVICE`], user = provider name).
    #[serde(default)]
    pub keyring: bool,
}

/// Environment variable holding the key for a provider, e.g. `ZHIPU_API_KEY`.
pub fn env_var_name(provider: &ProviderConfig) -> String {
    format!("{}_API_KEY", provider.kind.as_str().to_uppercase())
}

/// Resolve the API key for `name`: explicit config value, then the
/// environment, then the keyring when enabled.
pub fn resolve_api_key(name: &str, provider: &ProviderConfig, opts: &CredentialOptions) -> Option<String> {
    let explicit = provider.api_key.trim();
    if !explicit.is_empty() {
        return Some(explicit.to_string());
    }

    if let Some(key) = env::var(env_var_name(provider))
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
    {
        return Some(key);
    }

    if opts.keyring {
        match Entry::new(KEYRING_SERVICE, name).and_then(|e| e.get_password()) {
            Ok(key) if !key.trim().is_empty() => return Some(key.trim().to_string()),
            Ok(_) => {}
            Err(e) => tracing::debug!(provider = name, error = %e, "no keyring entry"),
        }
    }
    None
}
