use serde_json::{json, Value};

use super::openai::{build_chat_body, parse_chat_response, SamplingSupport};
use super::{DriverResponse, ProviderDriver, RequestParams};
use crate::config::BackendKind;
use crate::types::chat::ChatRequest;
use crate::Result;

/// LM Studio's OpenAI-compatible local server.
#[derive(Debug, Clone, Copy, Default)]
pub struct LmStudioDriver;

impl ProviderDriver for LmStudioDriver {
    fn kind(&self) -> BackendKind {
        BackendKind::LmStudio
    }

    fn build_request(&self, request: &ChatRequest, params: &RequestParams<'_>) -> Result<Value> {
        let support = SamplingSupport {
            top_k: true,
            repeat_penalty: Some("repeat_penalty"),
        };
        let mut body = build_chat_body(request, params, support);
        if request.options.disable_thinking {
            body["chat_template_kwargs"] = json!({ "enable_thinking": false });
        }
        Ok(body)
    }

    fn parse_response(&self, body: &Value) -> Result<DriverResponse> {
        parse_chat_response(body)
    }
}
