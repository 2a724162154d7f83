// Modality Classifiers
// Service-backed classification for text/image and a deterministic heuristic for
// audio/video (and for text/image when no inference credentials are configured).

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use super::fingerprint::Fingerprint;
use super::validator::MIB;
use crate::models::{Artifact, Modality, RawVerdict, Uploader};
use crate::services::providers::{Attachment, InferenceService, ProviderError};

const TEXT_PROMPT: &str = "Is this text written by a human or AI? Just reply with \"Human\" or \"AI\" and a confidence score from 0 to 100.";
const IMAGE_PROMPT: &str = "Tell if this image is AI-generated or human-made. Only say 'AI' or 'Human' with confidence from 0 to 100.";

#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("inference provider failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("inference timed out after {0:?}")]
    Timeout(Duration),
    #[error("{classifier} classifier cannot handle a {modality} artifact")]
    UnsupportedArtifact {
        classifier: &'static str,
        modality: Modality,
    },
}

/// Capability seam: anything that turns an artifact into a raw verdict.
#[async_trait]
pub trait Classifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn classify(
        &self,
        artifact: &Artifact,
        fingerprint: &Fingerprint,
    ) -> Result<RawVerdict, ClassificationError>;
}

// ============================================================================
// Heuristic classifier
// ============================================================================

/// How "small payload" is measured for the lowered cutoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SmallPayload {
    /// Trimmed length in UTF-16 code units below this value
    CharsBelow(usize),
    /// Byte size below this value
    BytesBelow(u64),
}

/// Label thresholds of the placeholder heuristic.
///
/// These constants are arbitrary and carry no detection evidence; they are kept only so
/// verdicts stay identical to what earlier clients displayed for the same artifact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelPolicy {
    pub base_cutoff: f64,
    pub small_cutoff: f64,
    pub small: SmallPayload,
}

pub const SMALL_PAYLOAD_CUTOFF: f64 = 0.3;

pub fn label_policy(uploader: Uploader, modality: Modality) -> LabelPolicy {
    let (base_cutoff, small) = match (uploader, modality) {
        (Uploader::Text, _) => (0.5, SmallPayload::CharsBelow(100)),
        (Uploader::Image, _) => (0.5, SmallPayload::BytesBelow(2 * MIB)),
        (Uploader::Media, Modality::Video) => (0.4, SmallPayload::BytesBelow(5 * MIB)),
        (Uploader::Media, _) => (0.5, SmallPayload::BytesBelow(5 * MIB)),
        (Uploader::Video, _) => (0.5, SmallPayload::BytesBelow(10 * MIB)),
    };
    LabelPolicy {
        base_cutoff,
        small_cutoff: SMALL_PAYLOAD_CUTOFF,
        small,
    }
}

impl LabelPolicy {
    pub fn is_small(&self, artifact: &Artifact) -> bool {
        match self.small {
            SmallPayload::CharsBelow(limit) => artifact
                .as_text()
                .map(|t| t.trim().encode_utf16().count() < limit)
                .unwrap_or(false),
            SmallPayload::BytesBelow(limit) => artifact.byte_size < limit,
        }
    }

    pub fn cutoff(&self, artifact: &Artifact) -> f64 {
        if self.is_small(artifact) {
            self.small_cutoff
        } else {
            self.base_cutoff
        }
    }
}

/// Confidence band of the heuristic: `floor(seed * 20 + 70)`, always in [70, 90).
pub fn heuristic_confidence(seed: f64) -> f64 {
    (seed * 20.0 + 70.0).floor()
}

/// Seed-driven stand-in for a real model. Same artifact attributes, same verdict.
#[derive(Debug, Default, Clone)]
pub struct DeterministicHeuristicClassifier;

impl DeterministicHeuristicClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn verdict_for(&self, artifact: &Artifact, fingerprint: &Fingerprint) -> RawVerdict {
        let seed = fingerprint.seed();
        let policy = label_policy(artifact.uploader, artifact.modality);
        let cutoff = policy.cutoff(artifact);
        let label = if seed > cutoff {
            artifact.modality.ai_label()
        } else {
            artifact.modality.human_label()
        };
        debug!(seed, cutoff, modality = %artifact.modality, "heuristic.verdict");
        RawVerdict::Structured {
            label,
            confidence: heuristic_confidence(seed),
        }
    }
}

#[async_trait]
impl Classifier for DeterministicHeuristicClassifier {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn classify(
        &self,
        artifact: &Artifact,
        fingerprint: &Fingerprint,
    ) -> Result<RawVerdict, ClassificationError> {
        Ok(self.verdict_for(artifact, fingerprint))
    }
}

// ============================================================================
// Service-backed classifier
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServicePrompt {
    Text,
    Image,
}

/// Delegates to an external inference service. One attempt, bounded by `timeout`.
pub struct ServiceBackedClassifier {
    service: Arc<dyn InferenceService>,
    model: String,
    prompt: ServicePrompt,
    timeout: Duration,
}

impl ServiceBackedClassifier {
    pub fn text(service: Arc<dyn InferenceService>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            service,
            model: model.into(),
            prompt: ServicePrompt::Text,
            timeout,
        }
    }

    pub fn image(service: Arc<dyn InferenceService>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            service,
            model: model.into(),
            prompt: ServicePrompt::Image,
            timeout,
        }
    }

    fn unsupported(&self, artifact: &Artifact) -> ClassificationError {
        ClassificationError::UnsupportedArtifact {
            classifier: self.name(),
            modality: artifact.modality,
        }
    }
}

#[async_trait]
impl Classifier for ServiceBackedClassifier {
    fn name(&self) -> &'static str {
        match self.prompt {
            ServicePrompt::Text => "service-text",
            ServicePrompt::Image => "service-image",
        }
    }

    async fn classify(
        &self,
        artifact: &Artifact,
        _fingerprint: &Fingerprint,
    ) -> Result<RawVerdict, ClassificationError> {
        let call = match self.prompt {
            ServicePrompt::Text => {
                let text = artifact.as_text().ok_or_else(|| self.unsupported(artifact))?;
                let prompt = format!("{}\n\nText:\n{}", TEXT_PROMPT, text);
                tokio::time::timeout(self.timeout, self.service.generate(&self.model, &prompt, None))
                    .await
            }
            ServicePrompt::Image => {
                if artifact.is_text() {
                    return Err(self.unsupported(artifact));
                }
                let attachment = Attachment {
                    mime_type: &artifact.declared_mime_type,
                    data: artifact.as_bytes(),
                };
                tokio::time::timeout(
                    self.timeout,
                    self.service.generate(&self.model, IMAGE_PROMPT, Some(attachment)),
                )
                .await
            }
        };

        let result = call.map_err(|_| ClassificationError::Timeout(self.timeout))??;
        info!(
            provider = self.service.name(),
            model = %self.model,
            latency_ms = result.latency_ms,
            "classifier.service_reply"
        );
        Ok(RawVerdict::Unstructured { text: result.content })
    }
}
