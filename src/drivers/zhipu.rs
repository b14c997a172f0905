use serde_json::{json, Value};

use super::openai::{build_chat_body, parse_chat_response, SamplingSupport};
use super::{DriverResponse, ProviderDriver, RequestParams};
use crate::config::BackendKind;
use crate::types::chat::ChatRequest;
use crate::Result;

/// Zhipu GLM (`api.z.ai` / `open.bigmodel.cn`).
///
/// GLM models frequently imitate tool calls as `<tool_call>` tag soup in the
/// content or reasoning channel; the adapter's fallback pass handles that.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZhipuDriver;

impl ProviderDriver for ZhipuDriver {
    fn kind(&self) -> BackendKind {
        BackendKind::Zhipu
    }

    fn build_request(&self, request: &ChatRequest, params: &RequestParams<'_>) -> Result<Value> {
        let mut body = build_chat_body(request, params, SamplingSupport::default());
        let mode = if request.options.disable_thinking {
            "disabled"
        } else {
            "enabled"
        };
        body["thinking"] = json!({ "type": mode });
        // Only "auto" is accepted.
        if body.get("tool_choice").is_some() {
            body["tool_choice"] = Value::String("auto".into());
        }
        Ok(body)
    }

    fn parse_response(&self, body: &Value) -> Result<DriverResponse> {
        parse_chat_response(body)
    }
}
