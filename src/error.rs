use crate::error_code::ErrorCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "providers.zhipu.base_url")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "config_store", "registry")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Provider-side error descriptor parsed from an OpenAI-style `{"error": {...}}` body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderErrorDescriptor {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub param: Option<String>,
    /// Text the model tried to emit when the backend rejected its tool call.
    #[serde(default)]
    pub failed_generation: Option<String>,
}

impl ProviderErrorDescriptor {
    /// Parse the `error` object of a response body. Returns `None` for non-JSON
    /// bodies or bodies without an `error` object.
    pub fn from_body(body: &str) -> Option<Self> {
        let json: serde_json::Value = serde_json::from_str(body).ok()?;
        let error = json.get("error")?;
        if !error.is_object() {
            return None;
        }
        // Some backends send numeric codes; normalize them to strings.
        let mut error = error.clone();
        if let Some(code) = error.get("code").filter(|c| c.is_number()).cloned() {
            error["code"] = serde_json::Value::String(code.to_string());
        }
        serde_json::from_value(error).ok()
    }

    pub fn is_tool_use_failed(&self) -> bool {
        self.code.as_deref() == Some("tool_use_failed")
            || self.error_type.as_deref() == Some("tool_use_failed")
    }
}

/// Unified error type for the provider runtime.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Request timed out after {timeout_ms}ms")]
    RequestTimeout { timeout_ms: u64 },

    #[error("Rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded {
        attempts: u32,
        retry_after_ms: Option<u64>,
    },

    #[error("Provider HTTP error {status}: {message}")]
    ProviderHttp {
        status: u16,
        message: String,
        descriptor: Option<ProviderErrorDescriptor>,
    },

    #[error("Provider rejected the tool call (HTTP {status}): {message}")]
    ToolUseFailed {
        status: u16,
        message: String,
        failed_generation: Option<String>,
    },

    #[error("No primary provider is selected")]
    PrimaryProviderMissing,

    #[error("Provider '{provider}' is not configured: missing API key")]
    ProviderNotConfigured { provider: String },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Network transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid provider response: {message}")]
    InvalidResponse { message: String },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Configuration store error: {message}")]
    Store { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Error::InvalidResponse {
            message: msg.into(),
        }
    }

    /// Build the error for a non-success, non-429 HTTP response.
    ///
    /// A `tool_use_failed` descriptor is promoted to [`Error::ToolUseFailed`].
    pub fn from_http_response(status: u16, body: &str) -> Self {
        let descriptor = ProviderErrorDescriptor::from_body(body);
        let message = descriptor
            .as_ref()
            .and_then(|d| d.message.clone())
            .unwrap_or_else(|| truncate_body(body));

        match descriptor {
            Some(d) if d.is_tool_use_failed() => Error::ToolUseFailed {
                status,
                message,
                failed_generation: d.failed_generation,
            },
            descriptor => Error::ProviderHttp {
                status,
                message,
                descriptor,
            },
        }
    }

    /// Machine-checkable error code for the agent loop.
    pub fn code(&self) -> &'static str {
        match self {
            Error::RequestTimeout { .. } => "REQUEST_TIMEOUT",
            Error::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            Error::ProviderHttp { .. } => "PROVIDER_HTTP_ERROR",
            Error::ToolUseFailed { .. } => "TOOL_USE_FAILED",
            Error::PrimaryProviderMissing => "PRIMARY_PROVIDER_MISSING",
            Error::ProviderNotConfigured { .. } => "PROVIDER_NOT_CONFIGURED",
            Error::Cancelled => "CANCELLED",
            Error::Transport(_) => "TRANSPORT_ERROR",
            Error::InvalidResponse { .. } => "INVALID_RESPONSE",
            Error::Configuration { .. } => "CONFIGURATION_ERROR",
            Error::Store { .. } => "STORE_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// HTTP status attached to this error, if the backend responded at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::RateLimitExceeded { .. } => Some(429),
            Error::ProviderHttp { status, .. } | Error::ToolUseFailed { status, .. } => {
                Some(*status)
            }
            Error::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Standard classification used for structured logging.
    pub fn standard_code(&self) -> ErrorCode {
        match self {
            Error::RequestTimeout { .. } => ErrorCode::Timeout,
            Error::RateLimitExceeded { .. } => ErrorCode::RateLimited,
            Error::ToolUseFailed { .. } => ErrorCode::ToolUseFailed,
            Error::ProviderHttp {
                status, descriptor, ..
            } => descriptor
                .as_ref()
                .and_then(|d| {
                    d.code
                        .as_deref()
                        .and_then(ErrorCode::from_provider_code)
                        .or_else(|| d.error_type.as_deref().and_then(ErrorCode::from_provider_code))
                })
                .unwrap_or_else(|| ErrorCode::from_http_status(*status)),
            Error::PrimaryProviderMissing => ErrorCode::PrimaryMissing,
            Error::ProviderNotConfigured { .. } => ErrorCode::Authentication,
            Error::Cancelled => ErrorCode::Cancelled,
            Error::Transport(_) => ErrorCode::Unreachable,
            _ => ErrorCode::Unknown,
        }
    }

    /// Human-readable remediation hint for the user-facing layer.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            Error::ProviderNotConfigured { .. } => {
                Some("Configure an API key for this provider in the extension settings.")
            }
            Error::PrimaryProviderMissing => Some("Select a primary provider before starting a task."),
            Error::RateLimitExceeded { .. } => {
                Some("The provider is rate limiting requests; wait a moment or switch providers.")
            }
            Error::RequestTimeout { .. } => {
                Some("The provider did not answer in time; try a faster model or raise the timeout.")
            }
            Error::ProviderHttp { status: 401, .. } | Error::ProviderHttp { status: 403, .. } => {
                Some("The provider rejected the credentials; check the API key.")
            }
            Error::Transport(_) => Some("The provider could not be reached; check the base URL and network."),
            _ => None,
        }
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 500;
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX {
        trimmed.to_string()
    } else {
        trimmed.chars().take(MAX).collect()
    }
}
