//! Sequences one request through the primary call, classification and the
//! optional image or video step.
//!
//! Only the newest run may touch the shared state. Starting a run (or calling
//! [`Orchestrator::cancel`]) bumps the run id; older runs stop at their next
//! suspension point and return [`GenerationError::Superseded`] without writing.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::errors::{classify_error, ClassifiedError, GenerationError};
use crate::llm::media::EncodedFile;
use crate::llm::request::build_request;
use crate::llm::response::{
    classify, text_result, video_concept, MediaResult, ResultView, SecondaryCall,
};
use crate::llm::GenerationBackend;
use crate::utils::timing::{complete_run_timer, start_run_timer};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrchestrationState {
    pub phase: Phase,
    pub result: Option<ResultView>,
    pub error: Option<ClassifiedError>,
}

impl OrchestrationState {
    fn running() -> Self {
        OrchestrationState {
            phase: Phase::Running,
            ..Default::default()
        }
    }

    fn failed(error: ClassifiedError) -> Self {
        OrchestrationState {
            phase: Phase::Failed,
            result: None,
            error: Some(error),
        }
    }
}

struct RunSlot {
    run_id: u64,
    state: OrchestrationState,
}

async fn superseded(mut current: watch::Receiver<u64>, run_id: u64) {
    loop {
        let stale = *current.borrow_and_update() != run_id;
        if stale {
            return;
        }
        if current.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub struct Orchestrator {
    backend: Arc<dyn GenerationBackend>,
    slot: Mutex<RunSlot>,
    current_run: watch::Sender<u64>,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        let (current_run, _) = watch::channel(0);
        Orchestrator {
            backend,
            slot: Mutex::new(RunSlot {
                run_id: 0,
                state: OrchestrationState::default(),
            }),
            current_run,
        }
    }

    pub fn state(&self) -> OrchestrationState {
        self.slot.lock().state.clone()
    }

    pub fn run_id(&self) -> u64 {
        self.slot.lock().run_id
    }

    /// Abandons any in-flight run and resets to `Idle`. Returns whether a run was in flight.
    pub fn cancel(&self) -> bool {
        let mut slot = self.slot.lock();
        let was_running = slot.state.phase == Phase::Running;
        slot.run_id += 1;
        slot.state = OrchestrationState::default();
        self.current_run.send_replace(slot.run_id);
        if was_running {
            info!("Cancelled in-flight generation (now run {})", slot.run_id);
        }
        was_running
    }

    fn begin_run(&self, initial: OrchestrationState) -> u64 {
        let mut slot = self.slot.lock();
        if slot.state.phase == Phase::Running {
            info!("Run {} superseded by a new request", slot.run_id);
        }
        slot.run_id += 1;
        slot.state = initial;
        self.current_run.send_replace(slot.run_id);
        slot.run_id
    }

    /// Applies `update` only if `run_id` is still current.
    fn commit(&self, run_id: u64, update: impl FnOnce(&mut OrchestrationState)) -> bool {
        let mut slot = self.slot.lock();
        if slot.run_id != run_id {
            debug!("Discarding stale result from run {run_id} (current {})", slot.run_id);
            return false;
        }
        update(&mut slot.state);
        true
    }

    /// Drives `fut` until it completes or `run_id` stops being current.
    async fn guarded<F: Future>(&self, run_id: u64, fut: F) -> Option<F::Output> {
        let current = self.current_run.subscribe();
        tokio::select! {
            biased;
            _ = superseded(current, run_id) => None,
            output = fut => Some(output),
        }
    }

    pub async fn generate(
        &self,
        user_text: Option<&str>,
        file: Option<EncodedFile>,
    ) -> Result<ResultView, GenerationError> {
        let has_text = user_text.is_some_and(|text| !text.trim().is_empty());
        if !has_text && file.is_none() {
            let err = GenerationError::EmptyInput;
            let run_id = self.begin_run(OrchestrationState::failed(classify_error(&err)));
            info!("Rejected empty submission as run {run_id}");
            return Err(err);
        }

        let run_id = self.begin_run(OrchestrationState::running());
        let mut timer = start_run_timer(
            run_id,
            user_text,
            file.as_ref().map(|attachment| attachment.name.as_str()),
        );

        let outcome = self.run(run_id, user_text, file).await;
        match &outcome {
            Ok(view) => {
                complete_run_timer(&mut timer, "success", Some(format!("kind={:?}", view.kind())))
            }
            Err(GenerationError::Superseded) => complete_run_timer(&mut timer, "superseded", None),
            Err(err) => complete_run_timer(&mut timer, "error", Some(err.to_string())),
        }
        outcome
    }

    async fn run(
        &self,
        run_id: u64,
        user_text: Option<&str>,
        file: Option<EncodedFile>,
    ) -> Result<ResultView, GenerationError> {
        let request = build_request(user_text, file);
        debug_assert!(!request.is_empty());
        let primary = match self
            .guarded(run_id, self.backend.generate_structured(&request))
            .await
        {
            None => return Err(GenerationError::Superseded),
            Some(Ok(primary)) => primary,
            Some(Err(err)) => {
                warn!("Primary generation failed for run {run_id}: {err}");
                let classified = classify_error(&err);
                if !self.commit(run_id, |state| *state = OrchestrationState::failed(classified)) {
                    return Err(GenerationError::Superseded);
                }
                return Err(err);
            }
        };
        drop(request);

        let classification = classify(&primary);
        debug!(
            "Run {run_id} classified as {:?} (secondary={:?}, network={})",
            classification.branch,
            classification.secondary,
            classification.needs_secondary_call()
        );

        let media = match classification.secondary {
            Some(SecondaryCall::Image(prompt)) => {
                let image = match self
                    .guarded(run_id, self.backend.generate_image(&prompt))
                    .await
                {
                    None => return Err(GenerationError::Superseded),
                    Some(Ok(image)) => Some(image),
                    Some(Err(err)) => {
                        warn!("Image generation failed for run {run_id}, keeping text result: {err}");
                        None
                    }
                };
                Some(MediaResult::Image { image, prompt })
            }
            Some(SecondaryCall::Video(prompt)) => Some(video_concept(&prompt)),
            None => None,
        };

        let view = ResultView {
            text: text_result(&primary, classification.branch),
            media,
        };

        let committed = self.commit(run_id, |state| {
            *state = OrchestrationState {
                phase: Phase::Succeeded,
                result: Some(view.clone()),
                error: None,
            }
        });
        if !committed {
            return Err(GenerationError::Superseded);
        }
        Ok(view)
    }
}
