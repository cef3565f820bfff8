//! Minimal OpenAI-compatible chat-completions client.
//!
//! Non-streaming on purpose: the engine consumes whole responses. Any
//! endpoint speaking the chat-completions dialect works (the engine
//! itself only ever sees the [`ChatModel`] trait).

use async_trait::async_trait;
use serde_json::{Value, json};

use relay_core::{Message, ToolCall};

use crate::model::{ChatModel, ChatRequest, ChatResponse, ModelError};

pub struct OpenAiCompatModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiCompatModel {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn wire_messages(&self, request: &ChatRequest) -> Vec<Value> {
        let mut wire = vec![json!({"role": "system", "content": request.system_prompt})];
        for message in &request.messages {
            match message {
                Message::Human { content, .. } => {
                    wire.push(json!({"role": "user", "content": content}));
                }
                Message::Ai {
                    content,
                    tool_calls,
                    ..
                } => {
                    let mut entry = json!({"role": "assistant", "content": content});
                    if !tool_calls.is_empty() {
                        entry["tool_calls"] = tool_calls
                            .iter()
                            .map(|c| {
                                json!({
                                    "id": c.id,
                                    "type": "function",
                                    "function": {
                                        "name": c.name,
                                        "arguments": c.arguments.to_string(),
                                    },
                                })
                            })
                            .collect();
                    }
                    wire.push(entry);
                }
                Message::Tool {
                    content,
                    tool_call_id,
                    ..
                } => {
                    wire.push(json!({
                        "role": "tool",
                        "tool_call_id": tool_call_id,
                        "content": content,
                    }));
                }
            }
        }
        wire
    }

    fn parse_response(&self, body: Value) -> Result<ChatResponse, ModelError> {
        let message = body
            .pointer("/choices/0/message")
            .ok_or_else(|| ModelError::Malformed("missing choices[0].message".into()))?;

        let content = message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut tool_calls = Vec::new();
        if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
            for call in calls {
                let id = call
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ModelError::Malformed("tool call without id".into()))?;
                let name = call
                    .pointer("/function/name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ModelError::Malformed("tool call without name".into()))?;
                let raw_args = call
                    .pointer("/function/arguments")
                    .and_then(Value::as_str)
                    .unwrap_or("{}");
                let arguments: Value = serde_json::from_str(raw_args)
                    .map_err(|e| ModelError::Malformed(format!("tool arguments: {e}")))?;
                tool_calls.push(ToolCall::new(id, name, arguments));
            }
        }

        Ok(ChatResponse {
            content,
            tool_calls,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatModel {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ModelError> {
        let mut body = json!({
            "model": self.model,
            "messages": self.wire_messages(&request),
        });
        if !request.tools.is_empty() {
            body["tools"] = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        },
                    })
                })
                .collect();
            if !request.parallel_tool_calls {
                body["parallel_tool_calls"] = json!(false);
            }
        }

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let mut http = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key);
        }

        let response = http.send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ModelError::Provider(format!("{status}: {detail}")));
        }

        self.parse_response(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ToolSchema;

    fn model() -> OpenAiCompatModel {
        OpenAiCompatModel::new("http://localhost:8080/v1", "test-model")
    }

    #[test]
    fn test_wire_messages_roles() {
        let request = ChatRequest {
            system_prompt: "be helpful".into(),
            messages: vec![
                Message::human("hi"),
                Message::ai_named("supervisor", "checking"),
                Message::tool_result("c1", "lookup", "found it", false),
            ],
            tools: vec![],
            parallel_tool_calls: true,
        };
        let wire = model().wire_messages(&request);
        assert_eq!(wire[0]["role"], "system");
        assert_eq!(wire[1]["role"], "user");
        assert_eq!(wire[2]["role"], "assistant");
        assert_eq!(wire[3]["role"], "tool");
        assert_eq!(wire[3]["tool_call_id"], "c1");
    }

    #[test]
    fn test_wire_messages_serializes_tool_calls() {
        let call = ToolCall::new("c1", "transfer_to_billing", json!({"message_for_subagent": "go"}));
        let request = ChatRequest {
            system_prompt: String::new(),
            messages: vec![Message::ai_with_tool_calls("supervisor", "", vec![call])],
            tools: vec![ToolSchema {
                name: "transfer_to_billing".into(),
                description: "billing agent".into(),
                parameters: json!({"type": "object"}),
            }],
            parallel_tool_calls: false,
        };
        let wire = model().wire_messages(&request);
        let serialized = wire[1]["tool_calls"][0]["function"]["arguments"]
            .as_str()
            .unwrap();
        // Arguments travel as a JSON string on the wire.
        let parsed: Value = serde_json::from_str(serialized).unwrap();
        assert_eq!(parsed["message_for_subagent"], "go");
    }

    #[test]
    fn test_parse_text_response() {
        let body = json!({
            "choices": [{"message": {"role": "assistant", "content": "hello"}}]
        });
        let response = model().parse_response(body).unwrap();
        assert_eq!(response.content, "hello");
        assert!(response.tool_calls.is_empty());
    }

    #[test]
    fn test_parse_tool_call_response() {
        let body = json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "process_refund", "arguments": "{\"order_id\":\"12345\"}"},
                }],
            }}]
        });
        let response = model().parse_response(body).unwrap();
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "process_refund");
        assert_eq!(response.tool_calls[0].arguments["order_id"], "12345");
    }

    #[test]
    fn test_parse_rejects_missing_choices() {
        let err = model().parse_response(json!({})).unwrap_err();
        assert!(matches!(err, ModelError::Malformed(_)));
    }
}
