// Detection Orchestrator
// Runs validate -> fingerprint -> classify -> normalize for one artifact and reports
// either the verdict or a typed failure tagged with the stage it happened in.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::classifier::{
    ClassificationError, Classifier, DeterministicHeuristicClassifier, ServiceBackedClassifier,
};
use super::fingerprint::{fingerprint, Fingerprint};
use super::normalizer::normalize;
use super::validator::{validate, ValidationError};
use crate::models::{Artifact, Modality, Verdict};
use crate::services::config_store::AppConfig;
use crate::services::providers::{
    get_api_key, InferenceService, ProviderClient, ProviderError, ProviderSettings,
};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DetectionStage {
    Idle,
    Validating,
    Fingerprinting,
    Classifying,
    Normalizing,
    Done,
    Failed,
}

impl DetectionStage {
    fn next(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::Validating),
            Self::Validating => Some(Self::Fingerprinting),
            Self::Fingerprinting => Some(Self::Classifying),
            Self::Classifying => Some(Self::Normalizing),
            Self::Normalizing => Some(Self::Done),
            Self::Done | Self::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for DetectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Fingerprinting => "fingerprinting",
            Self::Classifying => "classifying",
            Self::Normalizing => "normalizing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Stage bookkeeping for one pipeline invocation. Moves strictly forward; never retries.
#[derive(Debug, Clone)]
pub struct DetectionRun {
    stage: DetectionStage,
    trace: Vec<DetectionStage>,
}

impl Default for DetectionRun {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionRun {
    pub fn new() -> Self {
        Self {
            stage: DetectionStage::Idle,
            trace: vec![DetectionStage::Idle],
        }
    }

    pub fn stage(&self) -> DetectionStage {
        self.stage
    }

    pub fn trace(&self) -> &[DetectionStage] {
        &self.trace
    }

    /// Step to the successor stage. Terminal runs stay where they are.
    fn advance(&mut self) -> DetectionStage {
        if let Some(next) = self.stage.next() {
            debug!(from = %self.stage, to = %next, "detection.stage");
            self.stage = next;
            self.trace.push(next);
        }
        self.stage
    }

    /// Record a failure in the current stage and move to `Failed`.
    fn fail(&mut self) -> DetectionStage {
        let failed_at = self.stage;
        if self.stage != DetectionStage::Idle && !self.stage.is_terminal() {
            self.stage = DetectionStage::Failed;
            self.trace.push(DetectionStage::Failed);
        }
        failed_at
    }
}

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("{modality} classification failed: {source}")]
    Classification {
        modality: Modality,
        #[source]
        source: ClassificationError,
    },
}

#[derive(Debug, Error)]
#[error("{error} (failed while {stage})")]
pub struct DetectionFailure {
    pub stage: DetectionStage,
    pub error: DetectionError,
}

#[derive(Debug, Clone)]
pub struct DetectionOutcome {
    pub verdict: Verdict,
    pub fingerprint: Fingerprint,
    pub classifier: &'static str,
    pub trace: Vec<DetectionStage>,
}

/// Routes each modality to its classifier. Holds no per-request state, so one instance
/// is shared by every concurrent submission.
#[derive(Clone)]
pub struct DetectionOrchestrator {
    text: Arc<dyn Classifier>,
    image: Arc<dyn Classifier>,
    audio: Arc<dyn Classifier>,
    video: Arc<dyn Classifier>,
}

impl Default for DetectionOrchestrator {
    fn default() -> Self {
        Self::offline()
    }
}

impl DetectionOrchestrator {
    pub fn new(
        text: Arc<dyn Classifier>,
        image: Arc<dyn Classifier>,
        audio: Arc<dyn Classifier>,
        video: Arc<dyn Classifier>,
    ) -> Self {
        Self { text, image, audio, video }
    }

    /// Every modality on the deterministic heuristic.
    pub fn offline() -> Self {
        let heuristic: Arc<dyn Classifier> = Arc::new(DeterministicHeuristicClassifier::new());
        Self::new(heuristic.clone(), heuristic.clone(), heuristic.clone(), heuristic)
    }

    /// Text and image go to the configured inference provider when an API key is available;
    /// otherwise they fall back to the heuristic. Audio and video are always heuristic.
    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        let heuristic: Arc<dyn Classifier> = Arc::new(DeterministicHeuristicClassifier::new());
        let inference = &config.inference;

        let Some(api_key) = get_api_key(inference.provider, config) else {
            warn!(
                provider = inference.provider.as_str(),
                "No API key configured, using local detection for text and image"
            );
            return Ok(Self::offline());
        };

        let service: Arc<dyn InferenceService> = Arc::new(ProviderClient::new(ProviderSettings {
            kind: inference.provider,
            base_url: inference.base_url.clone(),
            api_key,
            timeout: inference.timeout(),
            proxy: config.proxy_url(),
        })?);
        info!(
            provider = inference.provider.as_str(),
            text_model = %inference.text_model,
            image_model = %inference.image_model,
            "inference provider configured"
        );

        Ok(Self::new(
            Arc::new(ServiceBackedClassifier::text(
                service.clone(),
                inference.text_model.clone(),
                inference.timeout(),
            )),
            Arc::new(ServiceBackedClassifier::image(
                service,
                inference.image_model.clone(),
                inference.timeout(),
            )),
            heuristic.clone(),
            heuristic,
        ))
    }

    pub fn classifier_for(&self, modality: Modality) -> &Arc<dyn Classifier> {
        match modality {
            Modality::Text => &self.text,
            Modality::Image => &self.image,
            Modality::Audio => &self.audio,
            Modality::Video => &self.video,
        }
    }

    pub async fn detect(&self, artifact: &Artifact) -> Result<DetectionOutcome, DetectionFailure> {
        let span = info_span!(
            "detect",
            modality = %artifact.modality,
            uploader = ?artifact.uploader,
            bytes = artifact.byte_size,
            fingerprint = tracing::field::Empty,
        );
        self.run(artifact).instrument(span).await
    }

    async fn run(&self, artifact: &Artifact) -> Result<DetectionOutcome, DetectionFailure> {
        let started = Instant::now();
        let mut run = DetectionRun::new();

        run.advance();
        if let Err(err) = validate(artifact) {
            info!(kind = ?err.kind, message = %err.message, "detection.rejected");
            return Err(DetectionFailure {
                stage: run.fail(),
                error: err.into(),
            });
        }

        run.advance();
        let fp = fingerprint(artifact);
        tracing::Span::current().record("fingerprint", fp.as_str());

        run.advance();
        let classifier = self.classifier_for(artifact.modality);
        let raw = match classifier.classify(artifact, &fp).await {
            Ok(raw) => raw,
            Err(source) => {
                error!(classifier = classifier.name(), error = %source, "detection.classification_failed");
                return Err(DetectionFailure {
                    stage: run.fail(),
                    error: DetectionError::Classification {
                        modality: artifact.modality,
                        source,
                    },
                });
            }
        };

        run.advance();
        let verdict = normalize(&raw, artifact.modality);

        run.advance();
        info!(
            classifier = classifier.name(),
            label = %verdict.label,
            confidence = verdict.confidence,
            fallback = verdict.confidence_fallback,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "detection.done"
        );

        Ok(DetectionOutcome {
            verdict,
            fingerprint: fp,
            classifier: classifier.name(),
            trace: run.trace().to_vec(),
        })
    }
}
