use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::ChatProvider;
use crate::config::{BackendKind, ProviderConfig};
use crate::drivers::{create_driver, ProviderDriver, RequestParams};
use crate::resilience::failover::HostFailover;
use crate::telemetry::ThrottledLogger;
use crate::toolcalls::{normalize_tool_calls, recover_tool_use_failed};
use crate::transport::{CallOptions, RequestExecutor};
use crate::types::chat::{ChatRequest, ChatResult};
use crate::{Error, Result};

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// One configured backend: driver + executor + host failover + the
/// normalization pipeline.
///
/// Holds an immutable snapshot of its [`ProviderConfig`]; the registry builds
/// a new adapter whenever the configuration changes.
#[derive(Debug)]
pub struct ProviderAdapter {
    name: String,
    config: ProviderConfig,
    model: String,
    api_key: Option<String>,
    driver: Box<dyn ProviderDriver>,
    executor: RequestExecutor,
    hosts: HostFailover,
    logger: Arc<ThrottledLogger>,
}

impl ProviderAdapter {
    pub fn new(
        name: impl Into<String>,
        config: ProviderConfig,
        api_key: Option<String>,
        logger: Arc<ThrottledLogger>,
    ) -> Result<Self> {
        let name = name.into();
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        let driver = create_driver(config.kind);

        let mut executor = RequestExecutor::new(name.clone(), api_key.clone())?;
        for (header, value) in driver.extra_headers() {
            executor = executor.with_header(header, value);
        }
        let hosts = HostFailover::new(config.base_url(), config.alternate_base_urls());

        Ok(Self {
            model: config.model(),
            name,
            config,
            api_key,
            driver,
            executor,
            hosts,
            logger,
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Whether the backend has what it needs to be called.
    pub fn is_configured(&self) -> bool {
        !self.config.kind.profile().requires_key || self.api_key.is_some()
    }

    /// Alternate host that took over after a failover, if any.
    pub fn preferred_base_url(&self) -> Option<String> {
        self.hosts.preferred()
    }

    pub fn current_base_url(&self) -> String {
        self.hosts.current()
    }

    async fn send(&self, request: &ChatRequest) -> Result<serde_json::Value> {
        let params = RequestParams {
            model: &self.model,
            sampling: &self.config.sampling,
            vision: self.config.vision_enabled(),
        };
        let body = self.driver.build_request(request, &params)?;
        let opts = CallOptions::new(
            request
                .options
                .timeout
                .unwrap_or_else(|| self.config.request_timeout()),
        )
        .with_cancel(request.options.cancel.clone());

        let path = self.driver.chat_path();
        let executor = &self.executor;
        let (body, opts) = (&body, &opts);
        self.hosts
            .run(|base| {
                let url = format!("{}{}", base, path);
                async move { executor.execute(&url, body, opts).await }
            })
            .await
    }
}

#[async_trait]
impl ChatProvider for ProviderAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        self.config.kind
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResult> {
        if !self.is_configured() {
            return Err(Error::ProviderNotConfigured {
                provider: self.name.clone(),
            });
        }

        let started = Instant::now();
        // A tool-use rejection may come as an error status or inside a 200 body.
        let parsed = self
            .send(request)
            .await
            .and_then(|raw| Ok((self.driver.parse_response(&raw)?, raw)));
        let (response, raw) = match parsed {
            Ok(parsed) => parsed,
            Err(err @ Error::ToolUseFailed { .. }) => {
                tracing::info!(
                    provider = self.name.as_str(),
                    "backend rejected a tool call, attempting recovery"
                );
                return recover_tool_use_failed(err);
            }
            Err(err) => return Err(err),
        };

        let offered = request.tool_names();
        let tool_calls = normalize_tool_calls(
            &response.message,
            &response.content,
            response.reasoning.as_deref(),
            &offered,
        );

        if !offered.is_empty() && tool_calls.is_empty() && response.content.is_empty() {
            self.logger.warn(
                &format!("{}.empty_response", self.name),
                &format!("{} returned neither text nor a tool call", self.name),
            );
        }
        tracing::debug!(
            provider = self.name.as_str(),
            model = self.model.as_str(),
            tool_calls = tool_calls.len(),
            finish_reason = response.finish_reason.as_deref().unwrap_or("-"),
            duration_ms = started.elapsed().as_millis() as u64,
            "chat completed"
        );

        Ok(ChatResult {
            text: response.content,
            tool_calls,
            thinking: response.reasoning,
            usage: response.usage,
            raw,
        })
    }

    async fn is_available(&self) -> bool {
        if !self.is_configured() {
            return false;
        }
        let url = format!("{}{}", self.hosts.current(), self.driver.probe_path());
        let available = self
            .executor
            .probe(&url, &CallOptions::new(PROBE_TIMEOUT))
            .await;
        if !available && self.config.kind.is_local() {
            self.logger.warn(
                &format!("{}.unreachable", self.name),
                &format!("{} is not reachable at {}", self.name, self.hosts.current()),
            );
        }
        available
    }
}
