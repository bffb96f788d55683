use serde::{Deserialize, Serialize};

use crate::errors::GenerationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub code: String,
}

/// Decoded structured output. Any subset of the fields may be populated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryResponse {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub recommendations: Option<Vec<Recommendation>>,
    #[serde(default)]
    pub code_block: Option<CodeBlock>,
    #[serde(default)]
    pub image_prompt: Option<String>,
    #[serde(default)]
    pub video_prompt: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|text| !text.trim().is_empty())
}

impl PrimaryResponse {
    pub fn answer(&self) -> Option<&str> {
        present(&self.answer)
    }

    pub fn recommendations(&self) -> Option<&[Recommendation]> {
        self.recommendations
            .as_deref()
            .filter(|items| !items.is_empty())
    }

    pub fn code_block(&self) -> Option<&CodeBlock> {
        self.code_block
            .as_ref()
            .filter(|block| !block.code.trim().is_empty())
    }

    pub fn image_prompt(&self) -> Option<&str> {
        present(&self.image_prompt)
    }

    pub fn video_prompt(&self) -> Option<&str> {
        present(&self.video_prompt)
    }
}

pub fn decode_primary(text: &str) -> Result<PrimaryResponse, GenerationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(GenerationError::MalformedResponse(
            "response text is empty".to_string(),
        ));
    }
    serde_json::from_str::<PrimaryResponse>(trimmed).map_err(|err| {
        GenerationError::MalformedResponse(format!("response text is not schema JSON: {err}"))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Recommendations,
    Answer,
    Code,
    Image,
    Video,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecondaryCall {
    Image(String),
    Video(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub branch: Branch,
    pub secondary: Option<SecondaryCall>,
}

impl Classification {
    /// Only the image path reaches the network; video concepts are built locally.
    pub fn needs_secondary_call(&self) -> bool {
        matches!(self.secondary, Some(SecondaryCall::Image(_)))
    }
}

pub fn classify(response: &PrimaryResponse) -> Classification {
    let secondary = if let Some(prompt) = response.image_prompt() {
        Some(SecondaryCall::Image(prompt.to_string()))
    } else {
        response
            .video_prompt()
            .map(|prompt| SecondaryCall::Video(prompt.to_string()))
    };

    let branch = if response.recommendations().is_some() {
        Branch::Recommendations
    } else if response.answer().is_some() {
        Branch::Answer
    } else if response.code_block().is_some() {
        Branch::Code
    } else {
        match secondary {
            Some(SecondaryCall::Image(_)) => Branch::Image,
            Some(SecondaryCall::Video(_)) => Branch::Video,
            None => Branch::Empty,
        }
    };

    Classification { branch, secondary }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextResult {
    Answer(String),
    Recommendations(Vec<Recommendation>),
    Code { language: String, source: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaResult {
    /// `image` is `None` when generation failed and only the prompt survives.
    Image {
        image: Option<GeneratedImage>,
        prompt: String,
    },
    Video { prompt: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Answer,
    Recommendations,
    Code,
    Image,
    Video,
    Empty,
}

/// Final outcome of one run. Text and media are independent axes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultView {
    pub text: Option<TextResult>,
    pub media: Option<MediaResult>,
}

impl ResultView {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.media.is_none()
    }

    pub fn kind(&self) -> ResultKind {
        match (&self.text, &self.media) {
            (Some(TextResult::Answer(_)), _) => ResultKind::Answer,
            (Some(TextResult::Recommendations(_)), _) => ResultKind::Recommendations,
            (Some(TextResult::Code { .. }), _) => ResultKind::Code,
            (None, Some(MediaResult::Image { .. })) => ResultKind::Image,
            (None, Some(MediaResult::Video { .. })) => ResultKind::Video,
            (None, None) => ResultKind::Empty,
        }
    }

    pub fn answer(&self) -> Option<&str> {
        match &self.text {
            Some(TextResult::Answer(text)) => Some(text),
            _ => None,
        }
    }

    pub fn image(&self) -> Option<&GeneratedImage> {
        match &self.media {
            Some(MediaResult::Image { image, .. }) => image.as_ref(),
            _ => None,
        }
    }
}

pub fn text_result(response: &PrimaryResponse, branch: Branch) -> Option<TextResult> {
    match branch {
        Branch::Recommendations => response
            .recommendations()
            .map(|items| TextResult::Recommendations(items.to_vec())),
        Branch::Answer => response
            .answer()
            .map(|text| TextResult::Answer(text.to_string())),
        Branch::Code => response.code_block().map(|block| TextResult::Code {
            language: block.language.clone(),
            source: block.code.clone(),
        }),
        Branch::Image | Branch::Video | Branch::Empty => None,
    }
}

pub fn video_concept(prompt: &str) -> MediaResult {
    MediaResult::Video {
        prompt: prompt.trim().to_string(),
    }
}
