use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use url::Url;

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub gemini_api_key: String,
    pub gemini_api_base: String,
    pub gemini_model: String,
    pub gemini_image_model: String,
    pub gemini_timeout: Option<Duration>,
    pub export_dir: Option<PathBuf>,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_optional_path(name: &str) -> Option<PathBuf> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn timeout_from_seconds(seconds: u64) -> Option<Duration> {
    if seconds == 0 {
        None
    } else {
        Some(Duration::from_secs(seconds))
    }
}

fn normalize_api_base(value: &str) -> Result<String> {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(DEFAULT_GEMINI_API_BASE.to_string());
    }

    let parsed = Url::parse(trimmed)
        .map_err(|err| anyhow!("Invalid GEMINI_API_BASE '{trimmed}': {err}"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(anyhow!("GEMINI_API_BASE must use http or https, got '{other}'")),
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Ok(Config {
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            gemini_api_key: env_string("GEMINI_API_KEY", "").trim().to_string(),
            gemini_api_base: normalize_api_base(&env_string(
                "GEMINI_API_BASE",
                DEFAULT_GEMINI_API_BASE,
            ))?,
            gemini_model: env_string("GEMINI_MODEL", "gemini-2.5-flash"),
            gemini_image_model: env_string(
                "GEMINI_IMAGE_MODEL",
                "gemini-2.5-flash-image-preview",
            ),
            gemini_timeout: timeout_from_seconds(env_u64("GEMINI_TIMEOUT_SECONDS", 0)),
            export_dir: env_optional_path("EXPORT_DIR"),
        })
    }

    /// Problems worth reporting once logging is up. Loading happens before that.
    pub fn startup_warnings(&self) -> Vec<&'static str> {
        let mut warnings = Vec::new();
        if self.gemini_api_key.is_empty() {
            warnings.push("GEMINI_API_KEY is not set; generation requests will be rejected.");
        }
        warnings
    }
}

pub const SYSTEM_PROMPT: &str = "You are a helpful AI assistant. Your goal is to provide accurate and relevant information to the user.\n\nYou can respond in several ways:\n- If the user asks a question, provide a clear and concise answer.\n- If the user asks for code, you MUST provide a code block in the requested language.\n- If the user's query is best answered with a list of resources (e.g., books, articles, tutorials), you can provide recommendations.\n- You can also generate prompts for images and videos if the user's query suggests it.\n\nPlease adhere to the following rules:\n- When asked for code, prioritize generating the code over providing recommendations.\n- Use the codeBlock field in the response for code.\n- Use the recommendations field for books, articles, etc.\n- Use the answer field for plain text answers.\n- Use imagePrompt or videoPrompt for multimedia generation prompts.";

pub const IMAGE_SYSTEM_PROMPT: &str =
    "Generate an image based on the prompt. CRITICAL: response be an image, NOT TEXT.";
