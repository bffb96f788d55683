use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::errors::{classify_error, ClassifiedError, GenerationError};
use crate::export::export_result;
use crate::handlers::responses::{render_error, render_result};
use crate::llm::media::{encode_file, EncodedFile};
use crate::llm::GenerationBackend;
use crate::orchestrator::Orchestrator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub rendered: String,
    pub exported: Vec<PathBuf>,
    pub error: Option<ClassifiedError>,
}

impl SubmitOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// One user session: the orchestrator plus what the user has staged for the next submit.
#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
    attachment: Arc<Mutex<Option<EncodedFile>>>,
    export_dir: Arc<Mutex<Option<PathBuf>>>,
}

impl AppState {
    pub fn new(backend: Arc<dyn GenerationBackend>, export_dir: Option<PathBuf>) -> Self {
        AppState {
            orchestrator: Arc::new(Orchestrator::new(backend)),
            attachment: Arc::new(Mutex::new(None)),
            export_dir: Arc::new(Mutex::new(export_dir)),
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn attachment(&self) -> Option<EncodedFile> {
        self.attachment.lock().clone()
    }

    pub fn export_dir(&self) -> Option<PathBuf> {
        self.export_dir.lock().clone()
    }

    pub fn set_export_dir(&self, dir: Option<PathBuf>) {
        *self.export_dir.lock() = dir;
    }

    /// Replaces the staged attachment. A failed read leaves the previous one untouched.
    pub async fn attach(&self, path: &Path) -> Result<EncodedFile, ClassifiedError> {
        let encoded = encode_file(path)
            .await
            .map_err(|err| classify_error(&err))?;
        info!("Attached {} ({})", encoded.name, encoded.mime_type);
        *self.attachment.lock() = Some(encoded.clone());
        Ok(encoded)
    }

    pub fn clear_attachment(&self) -> Option<EncodedFile> {
        self.attachment.lock().take()
    }

    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        let file = self.attachment();
        match self.orchestrator.generate(Some(text), file).await {
            Ok(view) => {
                let mut rendered = render_result(&view);
                let mut exported = Vec::new();
                if let Some(dir) = self.export_dir() {
                    match export_result(&view, &dir).await {
                        Ok(paths) => exported = paths,
                        Err(err) => {
                            warn!("Export to {} failed: {err:#}", dir.display());
                            rendered.push_str(&format!("\n\nExport failed: {err}"));
                        }
                    }
                }
                SubmitOutcome {
                    rendered,
                    exported,
                    error: None,
                }
            }
            Err(err) => {
                if !matches!(err, GenerationError::EmptyInput | GenerationError::Superseded) {
                    warn!("Generation failed: {err}");
                }
                let classified = classify_error(&err);
                SubmitOutcome {
                    rendered: render_error(&classified),
                    exported: Vec::new(),
                    error: Some(classified),
                }
            }
        }
    }

    /// Session teardown: abandons any in-flight run.
    pub fn shutdown(&self) -> bool {
        self.orchestrator.cancel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ErrorCategory, NOTHING_SUBMITTED_MESSAGE};
    use crate::llm::request::GenerationRequest;
    use crate::llm::response::{decode_primary, GeneratedImage, PrimaryResponse};
    use async_trait::async_trait;

    struct EchoBackend {
        seen: Mutex<Vec<GenerationRequest>>,
    }

    #[async_trait]
    impl GenerationBackend for EchoBackend {
        async fn generate_structured(
            &self,
            request: &GenerationRequest,
        ) -> Result<PrimaryResponse, GenerationError> {
            self.seen.lock().push(request.clone());
            decode_primary(r#"{"codeBlock":{"language":"python","code":"print('hi')"}}"#)
        }

        async fn generate_image(&self, _prompt: &str) -> Result<GeneratedImage, GenerationError> {
            Err(GenerationError::EmptyPrompt)
        }
    }

    fn session(export_dir: Option<PathBuf>) -> (Arc<EchoBackend>, AppState) {
        let backend = Arc::new(EchoBackend {
            seen: Mutex::new(Vec::new()),
        });
        (backend.clone(), AppState::new(backend, export_dir))
    }

    #[tokio::test]
    async fn attachment_is_sent_until_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();
        let (backend, state) = session(None);

        let attached = state.attach(&path).await.unwrap();
        assert_eq!(attached.mime_type, "text/csv");
        state.submit("summarize").await;
        assert!(state.clear_attachment().is_some());
        state.submit("again").await;

        let seen = backend.seen.lock();
        assert_eq!(seen[0].file.as_ref().map(|f| f.name.as_str()), Some("data.csv"));
        assert_eq!(seen[1].file, None);
    }

    #[tokio::test]
    async fn failed_attach_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("notes.txt");
        std::fs::write(&good, "hello").unwrap();
        let (_, state) = session(None);

        state.attach(&good).await.unwrap();
        let err = state.attach(&dir.path().join("missing.txt")).await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::FileUnreadable);
        assert_eq!(state.attachment().map(|f| f.name), Some("notes.txt".to_string()));
    }

    #[tokio::test]
    async fn submit_exports_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let (_, state) = session(Some(dir.path().to_path_buf()));

        let outcome = state.submit("write hello world").await;
        assert!(outcome.succeeded());
        assert!(outcome.rendered.starts_with("```python"));
        assert_eq!(outcome.exported, vec![dir.path().join("code.py")]);
    }

    #[tokio::test]
    async fn blank_submit_reports_nothing_submitted() {
        let (backend, state) = session(None);
        let outcome = state.submit("   ").await;
        assert_eq!(
            outcome.error.map(|error| error.message),
            Some(NOTHING_SUBMITTED_MESSAGE.to_string())
        );
        assert!(backend.seen.lock().is_empty());
    }
}
