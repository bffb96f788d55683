pub mod gemini;
pub mod media;
pub mod request;
pub mod response;

use async_trait::async_trait;

use crate::errors::GenerationError;
use crate::llm::request::GenerationRequest;
use crate::llm::response::{GeneratedImage, PrimaryResponse};

pub use gemini::{GeminiClient, GeminiSettings};

/// The two network calls the orchestrator sequences.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate_structured(
        &self,
        request: &GenerationRequest,
    ) -> Result<PrimaryResponse, GenerationError>;

    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, GenerationError>;
}
