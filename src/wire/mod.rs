use serde::{Deserialize, Serialize};
use serde_json::Value;

/// ========================================
/// Generative text API wire protocol
/// ========================================

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Msg>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Msg {
    pub role: String,
    pub content: String,
}

impl ChatRequest {
    /// The prompt is sent as the only message, with the user role.
    pub fn single_prompt(model: &str, prompt: &str, temperature: f32, max_tokens: u32) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![Msg { role: "user".into(), content: prompt.to_string() }],
            temperature,
            max_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MsgResponse {
    #[serde(default)]
    pub content: Vec<Block>,
}

#[derive(Debug, Deserialize)]
pub struct Block {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub r#type: String,
}

impl MsgResponse {
    /// Concatenated text of every "text" segment.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter(|b| b.r#type == "text")
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("")
    }
}

const RAW_ERROR_PREVIEW_CHARS: usize = 300;

/// Best-effort human message from an error body: `error.message`, `message`,
/// or a string `error`; otherwise the first characters of the raw text.
pub fn error_message(body: &str) -> String {
    if let Ok(v) = serde_json::from_str::<Value>(body) {
        let candidates = [
            v.pointer("/error/message"),
            v.get("message"),
            v.get("error").filter(|e| e.is_string()),
        ];
        if let Some(msg) = candidates.into_iter().flatten().find_map(|m| m.as_str()) {
            return msg.to_string();
        }
    }
    body.chars().take(RAW_ERROR_PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_only_text_segments() {
        let resp: MsgResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"Hello "},{"type":"tool_use","id":"x"},{"type":"text","text":"farm"}]}"#,
        )
        .unwrap();
        assert_eq!(resp.joined_text(), "Hello farm");
    }

    #[test]
    fn error_message_prefers_nested_message() {
        let body = r#"{"type":"error","error":{"type":"not_found_error","message":"model: foo"}}"#;
        assert_eq!(error_message(body), "model: foo");
        assert_eq!(error_message(r#"{"message":"quota exceeded"}"#), "quota exceeded");
    }

    #[test]
    fn error_message_truncates_raw_text() {
        let body = "x".repeat(1000);
        assert_eq!(error_message(&body).len(), 300);
        assert_eq!(error_message("<html>bad gateway</html>"), "<html>bad gateway</html>");
    }

    #[test]
    fn request_body_shape() {
        let req = ChatRequest::single_prompt("m1", "plan please", 0.6, 1200);
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["model"], "m1");
        assert_eq!(v["messages"][0]["role"], "user");
        assert_eq!(v["messages"][0]["content"], "plan please");
        assert_eq!(v["max_tokens"], 1200);
    }
}
