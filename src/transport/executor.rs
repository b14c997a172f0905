use reqwest::header::HeaderMap;
use reqwest::{Proxy, StatusCode};
use serde_json::Value;
use std::env;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::resilience::backoff::{retry_after_header_ms, RetryPolicy};
use crate::{Error, Result};

/// Correlation header attached to every outbound request.
pub const REQUEST_ID_HEADER: &str = "x-agent-request-id";

/// Per-call limits threaded through one `execute`.
#[derive(Debug, Clone)]
pub struct CallOptions {
    pub timeout: Duration,
    pub cancel: Option<CancellationToken>,
}

impl CallOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: Option<CancellationToken>) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Issues chat-completion HTTP calls for one backend configuration.
///
/// Owns the per-attempt timeout, the bounded 429 retry loop and error
/// classification. It keeps no state between calls.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    client: reqwest::Client,
    provider: String,
    api_key: Option<String>,
    headers: Vec<(String, String)>,
    retry: RetryPolicy,
}

impl RequestExecutor {
    pub fn new(provider: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            provider: provider.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            headers: Vec::new(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// POST `body` to `url` and return the decoded JSON response.
    ///
    /// 429 responses are retried in a loop up to the policy budget; any other
    /// non-success status fails immediately.
    pub async fn execute(&self, url: &str, body: &Value, opts: &CallOptions) -> Result<Value> {
        let started = Instant::now();
        let mut attempt: u32 = 0;
        let mut waited_ms: u64 = 0;

        loop {
            let (status, headers, text) = self.send_once(url, body, opts).await?;

            if status.is_success() {
                tracing::debug!(
                    provider = self.provider.as_str(),
                    http_status = status.as_u16(),
                    attempt,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "chat request succeeded"
                );
                return serde_json::from_str(&text).map_err(|e| {
                    Error::invalid_response(format!("response body is not JSON: {}", e))
                });
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt >= self.retry.max_retries {
                    tracing::warn!(
                        provider = self.provider.as_str(),
                        attempts = attempt + 1,
                        waited_ms,
                        "rate limit retries exhausted"
                    );
                    return Err(Error::RateLimitExceeded {
                        attempts: attempt + 1,
                        retry_after_ms: retry_after_header_ms(&headers),
                    });
                }
                let delay = self.retry.delay_for(attempt, &headers, &text);
                tracing::warn!(
                    provider = self.provider.as_str(),
                    http_status = 429,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "rate limited, backing off"
                );
                sleep_or_cancel(delay, opts.cancel.as_ref()).await?;
                waited_ms += delay.as_millis() as u64;
                attempt += 1;
                continue;
            }

            let err = Error::from_http_response(status.as_u16(), &text);
            let code = err.standard_code();
            tracing::warn!(
                provider = self.provider.as_str(),
                http_status = status.as_u16(),
                code = code.code(),
                category = code.category(),
                "chat request failed"
            );
            return Err(err);
        }
    }

    async fn send_once(
        &self,
        url: &str,
        body: &Value,
        opts: &CallOptions,
    ) -> Result<(StatusCode, HeaderMap, String)> {
        let mut req = self
            .client
            .post(url)
            .json(body)
            .header(REQUEST_ID_HEADER, uuid::Uuid::new_v4().to_string());
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        for (name, value) in &self.headers {
            req = req.header(name.as_str(), value.as_str());
        }

        let exchange = async {
            let resp = req.send().await?;
            let status = resp.status();
            let headers = resp.headers().clone();
            let text = resp.text().await?;
            Ok::<_, Error>((status, headers, text))
        };
        bounded(exchange, opts).await
    }

    /// GET `url`; `true` when the backend answers with a success status.
    pub async fn probe(&self, url: &str, opts: &CallOptions) -> bool {
        let mut req = self.client.get(url);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let check = async { Ok::<_, Error>(req.send().await?.status().is_success()) };
        match bounded(check, opts).await {
            Ok(ok) => ok,
            Err(e) => {
                tracing::debug!(provider = self.provider.as_str(), url, error = %e, "probe failed");
                false
            }
        }
    }
}

/// Apply the timeout and cancellation token to one network exchange. Dropping
/// the future aborts the underlying request.
async fn bounded<T, F>(fut: F, opts: &CallOptions) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    let timed = tokio::time::timeout(opts.timeout, fut);
    let outcome = match &opts.cancel {
        Some(token) => tokio::select! {
            _ = token.cancelled() => return Err(Error::Cancelled),
            r = timed => r,
        },
        None => timed.await,
    };
    outcome.unwrap_or_else(|_| {
        Err(Error::RequestTimeout {
            timeout_ms: opts.timeout.as_millis() as u64,
        })
    })
}

async fn sleep_or_cancel(delay: Duration, cancel: Option<&CancellationToken>) -> Result<()> {
    match cancel {
        Some(token) => tokio::select! {
            _ = token.cancelled() => Err(Error::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        },
        None => {
            tokio::time::sleep(delay).await;
            Ok(())
        }
    }
}

fn build_client() -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .pool_max_idle_per_host(
            env::var("AI_AGENT_HTTP_POOL_MAX_IDLE_PER_HOST")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(8),
        )
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .connect_timeout(Duration::from_secs(15));

    if let Ok(proxy_url) = env::var("AI_AGENT_PROXY_URL") {
        match Proxy::all(&proxy_url) {
            Ok(proxy) => builder = builder.proxy(proxy),
            Err(e) => tracing::warn!(error = %e, "ignoring invalid AI_AGENT_PROXY_URL"),
        }
    }

    Ok(builder.build()?)
}
