use serde_json::{json, Value};

use crate::config::SYSTEM_PROMPT;
use crate::llm::media::EncodedFile;

/// Bumped whenever `SYSTEM_PROMPT` or `response_schema` changes shape.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub user_text: Option<String>,
    pub file: Option<EncodedFile>,
}

impl GenerationRequest {
    pub fn is_empty(&self) -> bool {
        self.user_text.is_none() && self.file.is_none()
    }
}

pub fn build_request(user_text: Option<&str>, file: Option<EncodedFile>) -> GenerationRequest {
    let user_text = user_text
        .filter(|text| !text.trim().is_empty())
        .map(str::to_string);
    GenerationRequest { user_text, file }
}

pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "recommendations": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING" },
                        "type": { "type": "STRING" },
                        "reason": { "type": "STRING" }
                    }
                }
            },
            "answer": { "type": "STRING" },
            "imagePrompt": { "type": "STRING" },
            "videoPrompt": { "type": "STRING" },
            "codeBlock": {
                "type": "OBJECT",
                "properties": {
                    "language": { "type": "STRING" },
                    "code": { "type": "STRING" }
                }
            }
        }
    })
}

pub fn build_parts(request: &GenerationRequest) -> Vec<Value> {
    let mut parts = Vec::new();
    if let Some(text) = request.user_text.as_deref() {
        parts.push(json!({ "text": text }));
    }
    if let Some(file) = request.file.as_ref() {
        parts.push(json!({
            "inlineData": {
                "mimeType": file.mime_type,
                "data": file.data
            }
        }));
    }
    parts
}

pub fn to_payload(request: &GenerationRequest) -> Value {
    json!({
        "contents": [{ "role": "user", "parts": build_parts(request) }],
        "systemInstruction": { "parts": [{ "text": SYSTEM_PROMPT }] },
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": response_schema(),
        },
    })
}
