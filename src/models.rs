use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";
pub const MODELS_PATH: &str = "/v1/models";

pub const TEMPERATURE: f64 = 0.7;
pub const MAX_TOKENS: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "Assistant",
        }
    }
}

/// One transcript entry. Never edited once appended.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: u64,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// The unit of work handed to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    pub endpoint: String,
    pub method: Method,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl RequestDescriptor {
    pub fn chat(base_url: &str, request: &ChatCompletionRequest) -> serde_json::Result<Self> {
        Ok(RequestDescriptor {
            endpoint: endpoint(base_url, CHAT_COMPLETIONS_PATH),
            method: Method::Post,
            body: Some(serde_json::to_value(request)?),
        })
    }

    pub fn models(base_url: &str) -> Self {
        RequestDescriptor {
            endpoint: endpoint(base_url, MODELS_PATH),
            method: Method::Get,
            body: None,
        }
    }
}

/// Joins a base URL and an API path without doubling the separator.
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// What the relay hands back: `{"kind": "json", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum RelayResult {
    Json(Value),
}

impl RelayResult {
    pub fn into_json(self) -> Value {
        match self {
            RelayResult::Json(data) => data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub stream: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        ChatMessage {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// Content of the first choice, if there is any non-empty text.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.as_deref())
            .filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct ModelList {
    #[serde(default)]
    pub data: Option<Vec<ModelEntry>>,
}

#[derive(Debug, Deserialize)]
pub struct ModelEntry {
    #[serde(default)]
    pub id: Option<String>,
}

impl ModelList {
    /// Model ids from `data[].id`, or `None` when the server sent no list.
    pub fn ids(&self) -> Option<Vec<String>> {
        self.data
            .as_ref()
            .map(|entries| entries.iter().filter_map(|e| e.id.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_never_doubles_separator() {
        assert_eq!(endpoint("http://x/", CHAT_COMPLETIONS_PATH), "http://x/v1/chat/completions");
        assert_eq!(endpoint("http://x", CHAT_COMPLETIONS_PATH), "http://x/v1/chat/completions");
        assert_eq!(endpoint("http://localhost:1234/", MODELS_PATH), "http://localhost:1234/v1/models");
    }

    #[test]
    fn test_models_descriptor_is_get_without_body() {
        let descriptor = RequestDescriptor::models("http://localhost:1234");
        assert_eq!(descriptor.method, Method::Get);
        assert!(descriptor.body.is_none());

        let wire = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(wire, json!({ "endpoint": "http://localhost:1234/v1/models", "method": "GET" }));
    }

    #[test]
    fn test_chat_descriptor_body() {
        let request = ChatCompletionRequest {
            model: "local-model".to_string(),
            messages: vec![ChatMessage { role: Role::User, content: "hello".to_string() }],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            stream: false,
        };
        let descriptor = RequestDescriptor::chat("http://x/", &request).unwrap();
        assert_eq!(descriptor.method, Method::Post);
        assert_eq!(descriptor.endpoint, "http://x/v1/chat/completions");
        assert_eq!(
            descriptor.body,
            Some(json!({
                "model": "local-model",
                "messages": [{ "role": "user", "content": "hello" }],
                "temperature": 0.7,
                "max_tokens": 1000,
                "stream": false
            }))
        );
    }

    #[test]
    fn test_relay_result_wire_shape() {
        let result = RelayResult::Json(json!({ "ok": true }));
        assert_eq!(serde_json::to_value(&result).unwrap(), json!({ "kind": "json", "data": { "ok": true } }));
    }

    #[test]
    fn test_first_content_handles_missing_and_empty() {
        let full: ChatCompletionResponse =
            serde_json::from_value(json!({ "choices": [{ "message": { "content": "hi" } }] })).unwrap();
        assert_eq!(full.first_content(), Some("hi"));

        let empty: ChatCompletionResponse =
            serde_json::from_value(json!({ "choices": [{ "message": { "content": "" } }] })).unwrap();
        assert_eq!(empty.first_content(), None);

        let no_message: ChatCompletionResponse = serde_json::from_value(json!({ "choices": [{}] })).unwrap();
        assert_eq!(no_message.first_content(), None);

        let no_choices: ChatCompletionResponse = serde_json::from_value(json!({ "choices": [] })).unwrap();
        assert_eq!(no_choices.first_content(), None);

        assert!(serde_json::from_value::<ChatCompletionResponse>(json!({ "error": "nope" })).is_err());
    }

    #[test]
    fn test_model_list_ids() {
        let list: ModelList =
            serde_json::from_value(json!({ "data": [{ "id": "llama-3" }, { "id": "qwen" }, { "object": "model" }] }))
                .unwrap();
        assert_eq!(list.ids(), Some(vec!["llama-3".to_string(), "qwen".to_string()]));

        let bare: ModelList = serde_json::from_value(json!({ "object": "list" })).unwrap();
        assert_eq!(bare.ids(), None);
    }
}
