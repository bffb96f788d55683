use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::{Config, IMAGE_SYSTEM_PROMPT};
use crate::errors::GenerationError;
use crate::llm::request::{to_payload, GenerationRequest, SCHEMA_VERSION};
use crate::llm::response::{decode_primary, GeneratedImage, PrimaryResponse};
use crate::llm::GenerationBackend;
use crate::utils::http::get_http_client;
use crate::utils::timing::log_llm_timing;

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
    Other(Value),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub image_model: String,
    /// `None` leaves timing to the transport.
    pub timeout: Option<Duration>,
}

impl GeminiSettings {
    pub fn from_config(config: &Config) -> Self {
        GeminiSettings {
            api_key: config.gemini_api_key.clone(),
            base_url: config.gemini_api_base.clone(),
            model: config.gemini_model.clone(),
            image_model: config.gemini_image_model.clone(),
            timeout: config.gemini_timeout,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    settings: GeminiSettings,
    client: Client,
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn is_invalid_key_message(message: &str) -> bool {
    message.contains("API key not valid") || message.contains("API_KEY_INVALID")
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

fn summarize_gemini_parts(parts: &[Value]) -> Vec<Value> {
    parts
        .iter()
        .map(|part| {
            if let Some(text) = part.get("text").and_then(|value| value.as_str()) {
                json!({ "text": truncate_for_log(text, 200) })
            } else if let Some(inline_data) = part.get("inlineData") {
                let mime_type = inline_data
                    .get("mimeType")
                    .and_then(|value| value.as_str())
                    .unwrap_or("unknown");
                let data_len = inline_data
                    .get("data")
                    .and_then(|value| value.as_str())
                    .map(|value| value.len())
                    .unwrap_or(0);
                json!({ "inlineData": { "mimeType": mime_type, "dataLen": data_len } })
            } else {
                json!({ "unknownPart": true })
            }
        })
        .collect()
}

fn summarize_gemini_payload(payload: &Value, system_prompt_label: &str) -> Value {
    let mut summary = Map::new();

    if payload.pointer("/systemInstruction").is_some() {
        summary.insert(
            "systemInstruction".to_string(),
            Value::String(system_prompt_label.to_string()),
        );
    }

    if let Some(parts) = payload
        .pointer("/contents/0/parts")
        .and_then(|value| value.as_array())
    {
        summary.insert(
            "parts".to_string(),
            Value::Array(summarize_gemini_parts(parts)),
        );
    }

    if let Some(mime) = payload.pointer("/generationConfig/responseMimeType") {
        summary.insert("responseMimeType".to_string(), mime.clone());
    }
    if let Some(modalities) = payload.pointer("/generationConfig/responseModalities") {
        summary.insert("responseModalities".to_string(), modalities.clone());
    }

    Value::Object(summary)
}

fn summarize_gemini_response(response: &GeminiResponse) -> Value {
    let mut text_parts = 0usize;
    let mut image_parts = 0usize;
    let mut other_parts = Vec::new();
    let mut text_preview = None;

    for part in response_parts(response) {
        match part {
            GeminiPart::Text { text } => {
                text_parts += 1;
                if text_preview.is_none() && !text.trim().is_empty() {
                    text_preview = Some(truncate_for_log(text, 200));
                }
            }
            GeminiPart::InlineData { inline_data } => {
                if inline_data.mime_type.starts_with("image/") {
                    image_parts += 1;
                }
            }
            GeminiPart::Other(value) => match value.as_object() {
                Some(fields) => other_parts.extend(fields.keys().cloned()),
                None => other_parts.push("unknown".to_string()),
            },
        }
    }

    json!({
        "candidates": response.candidates.as_ref().map(|candidates| candidates.len()).unwrap_or(0),
        "textParts": text_parts,
        "imageParts": image_parts,
        "otherParts": other_parts,
        "textPreview": text_preview
    })
}

fn response_parts(response: &GeminiResponse) -> impl Iterator<Item = &GeminiPart> {
    response
        .candidates
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .filter_map(|candidate| candidate.content.as_ref())
        .filter_map(|content| content.parts.as_deref())
        .flatten()
}

/// `candidates[0].content.parts[0].text`, the slot the structured output lands in.
fn first_candidate_text(response: &GeminiResponse) -> Option<&str> {
    let part = response
        .candidates
        .as_ref()?
        .first()?
        .content
        .as_ref()?
        .parts
        .as_ref()?
        .first()?;
    match part {
        GeminiPart::Text { text } => Some(text.as_str()),
        _ => None,
    }
}

fn extract_first_image(response: &GeminiResponse) -> Option<GeneratedImage> {
    response_parts(response).find_map(|part| match part {
        GeminiPart::InlineData { inline_data } if inline_data.mime_type.starts_with("image/") => {
            match general_purpose::STANDARD.decode(&inline_data.data) {
                Ok(bytes) => Some(GeneratedImage {
                    bytes,
                    mime_type: inline_data.mime_type.clone(),
                }),
                Err(err) => {
                    warn!("Skipping undecodable Gemini image part: {err}");
                    None
                }
            }
        }
        _ => None,
    })
}

impl GeminiClient {
    pub fn new(settings: GeminiSettings) -> Self {
        GeminiClient {
            settings,
            client: get_http_client().clone(),
        }
    }

    fn redact(&self, text: &str) -> String {
        let key = self.settings.api_key.trim();
        if key.is_empty() {
            return text.to_string();
        }
        text.replace(key, "[redacted]")
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.settings.base_url.trim_end_matches('/'),
            model,
            self.settings.api_key
        )
    }

    fn post_builder(&self, model: &str, payload: &Value) -> RequestBuilder {
        let builder = self.client.post(self.endpoint(model)).json(payload);
        match self.settings.timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    async fn call_gemini_api(
        &self,
        model: &str,
        payload: &Value,
        system_prompt_label: &str,
    ) -> Result<GeminiResponse, GenerationError> {
        if self.settings.api_key.trim().is_empty() {
            return Err(GenerationError::Auth("GEMINI_API_KEY is not set".to_string()));
        }

        if tracing::enabled!(tracing::Level::DEBUG) {
            let payload_summary = summarize_gemini_payload(payload, system_prompt_label);
            debug!(target: "llm.gemini", model = model, payload = %payload_summary);
        }

        let response = self
            .post_builder(model, payload)
            .send()
            .await
            .map_err(|err| {
                let err_text = self.redact(&err.to_string());
                warn!(
                    "Gemini request failed to send: {} (timeout={}, connect={})",
                    err_text,
                    err.is_timeout(),
                    err.is_connect()
                );
                GenerationError::Transport(err_text)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|err| {
            GenerationError::Transport(self.redact(&format!("failed to read response body: {err}")))
        })?;

        if !status.is_success() {
            let (message, body_summary) = summarize_error_body(&body);
            warn!(
                "Gemini API error: status={}, body={}",
                status,
                self.redact(&body_summary)
            );
            let raw_detail = message.unwrap_or(body_summary);
            let detail = self.redact(&raw_detail);
            if status == StatusCode::UNAUTHORIZED || is_invalid_key_message(&raw_detail) {
                return Err(GenerationError::Auth(detail));
            }
            return Err(GenerationError::Http {
                status: status.as_u16(),
                message: detail,
            });
        }

        let value: Value = serde_json::from_str(&body).map_err(|err| {
            GenerationError::MalformedResponse(format!("response body is not JSON: {err}"))
        })?;
        if let Some(message) = value.pointer("/error/message").and_then(|v| v.as_str()) {
            if is_invalid_key_message(message) {
                return Err(GenerationError::Auth(self.redact(message)));
            }
        }

        let parsed = serde_json::from_value::<GeminiResponse>(value).map_err(|err| {
            GenerationError::MalformedResponse(format!("unexpected response shape: {err}"))
        })?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            let response_summary = summarize_gemini_response(&parsed);
            debug!(target: "llm.gemini", model = model, response = %response_summary);
        }
        Ok(parsed)
    }

    pub async fn generate_structured(
        &self,
        request: &GenerationRequest,
    ) -> Result<PrimaryResponse, GenerationError> {
        let payload = to_payload(request);
        let model = self.settings.model.as_str();
        let metadata = json!({
            "schemaVersion": SCHEMA_VERSION,
            "hasText": request.user_text.is_some(),
            "attachmentMime": request.file.as_ref().map(|file| file.mime_type.clone()),
        });

        log_llm_timing("gemini", model, "generate_structured", Some(metadata), || async {
            let response = self
                .call_gemini_api(model, &payload, "librarian_system_prompt")
                .await?;
            let text = first_candidate_text(&response).ok_or_else(|| {
                GenerationError::MalformedResponse(
                    "missing candidates[0].content.parts[0].text".to_string(),
                )
            })?;
            decode_primary(text)
        })
        .await
    }

    pub async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, GenerationError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }

        let payload = json!({
            "systemInstruction": { "parts": [{ "text": IMAGE_SYSTEM_PROMPT }] },
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "responseModalities": ["TEXT", "IMAGE"] },
        });
        let model = self.settings.image_model.as_str();

        log_llm_timing("gemini", model, "generate_image", None, || async {
            let response = self
                .call_gemini_api(model, &payload, "image_generation_system_prompt")
                .await?;
            extract_first_image(&response).ok_or_else(|| {
                GenerationError::MalformedResponse(format!(
                    "no image returned by Gemini (model: {model})"
                ))
            })
        })
        .await
    }
}

#[async_trait]
impl GenerationBackend for GeminiClient {
    async fn generate_structured(
        &self,
        request: &GenerationRequest,
    ) -> Result<PrimaryResponse, GenerationError> {
        GeminiClient::generate_structured(self, request).await
    }

    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, GenerationError> {
        GeminiClient::generate_image(self, prompt).await
    }
}
