// NeuroScope Data Models
// Artifacts, verdicts and the wire types of the detection API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============ Modality & Uploader ============

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
    Audio,
    Video,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }

    /// Capitalized noun used in verdict labels ("AI-Generated Image").
    pub fn noun(&self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Image => "Image",
            Self::Audio => "Audio",
            Self::Video => "Video",
        }
    }

    pub fn ai_label(&self) -> String {
        format!("AI-Generated {}", self.noun())
    }

    pub fn human_label(&self) -> String {
        format!("Human-Made {}", self.noun())
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intake surface an artifact arrived through.
///
/// Size limits and heuristic label policy belong to the uploader rather than the modality:
/// the combined audio-or-video uploader and the video-only uploader accept overlapping
/// content under different limits.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Uploader {
    Text,
    Image,
    /// Combined audio-or-video uploader
    Media,
    /// Video-only uploader
    Video,
}

impl Uploader {
    /// Resolve the modality an artifact with this mime type is classified as.
    pub fn modality_for(&self, mime_type: &str) -> Modality {
        match self {
            Self::Text => Modality::Text,
            Self::Image => Modality::Image,
            Self::Video => Modality::Video,
            Self::Media => {
                if mime_type.starts_with("video/") {
                    Modality::Video
                } else {
                    Modality::Audio
                }
            }
        }
    }
}

// ============ Artifact ============

#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactContent {
    Text(String),
    Bytes(Vec<u8>),
}

/// One submitted unit of analysis. Never persisted by the pipeline.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub modality: Modality,
    pub uploader: Uploader,
    pub content: ArtifactContent,
    pub declared_mime_type: String,
    pub byte_size: u64,
    pub original_name: Option<String>,
    /// Client-reported last-modified time, epoch milliseconds
    pub last_modified: Option<i64>,
}

impl Artifact {
    /// Pasted text, or the decoded contents of a text file when `original_name` is set.
    pub fn text(content: impl Into<String>, original_name: Option<String>) -> Self {
        let content = content.into();
        Self {
            modality: Modality::Text,
            uploader: Uploader::Text,
            byte_size: content.len() as u64,
            content: ArtifactContent::Text(content),
            declared_mime_type: "text/plain".to_string(),
            original_name,
            last_modified: None,
        }
    }

    pub fn file(
        uploader: Uploader,
        original_name: Option<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
        last_modified: Option<i64>,
    ) -> Self {
        let declared_mime_type = mime_type.into();
        Self {
            modality: uploader.modality_for(&declared_mime_type),
            uploader,
            byte_size: bytes.len() as u64,
            content: ArtifactContent::Bytes(bytes),
            declared_mime_type,
            original_name,
            last_modified,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.declared_mime_type = mime_type.into();
        self.modality = self.uploader.modality_for(&self.declared_mime_type);
        self
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            ArtifactContent::Text(s) => Some(s.as_str()),
            ArtifactContent::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match &self.content {
            ArtifactContent::Text(s) => s.as_bytes(),
            ArtifactContent::Bytes(b) => b.as_slice(),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.content, ArtifactContent::Text(_))
    }
}

// ============ Verdicts ============

/// Classifier output before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawVerdict {
    /// Free-form reply of an inference service
    Unstructured { text: String },
    /// Already shaped by a local heuristic
    Structured { label: String, confidence: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub label: String,
    /// 0..=100
    pub confidence: f64,
    pub modality: Modality,
    /// Set when the upstream reply carried no usable confidence and the default was used.
    #[serde(default)]
    pub confidence_fallback: bool,
}

// ============ Detection API ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDetectRequest {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    /// Mime type of the uploaded text file; pasted text is `text/plain`
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectResponse {
    pub result: String,
    pub confidence: f64,
    pub modality: Modality,
    pub fingerprint: String,
    pub confidence_fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// ============ History ============

/// Maximum number of characters of submitted text kept in a history record.
pub const RECORD_INPUT_PREVIEW_CHARS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRecord {
    pub id: Uuid,
    pub subject_id: String,
    pub modality: Modality,
    pub result: String,
    pub confidence: f64,
    pub input_data: String,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub file_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DetectionRecord {
    pub fn new(subject_id: impl Into<String>, artifact: &Artifact, verdict: &Verdict) -> Self {
        let (input_data, file_size, file_type) = match artifact.as_text() {
            Some(text) => (
                text.chars().take(RECORD_INPUT_PREVIEW_CHARS).collect(),
                None,
                None,
            ),
            None => (
                artifact.original_name.clone().unwrap_or_default(),
                Some(artifact.byte_size),
                Some(artifact.declared_mime_type.clone()),
            ),
        };

        Self {
            id: Uuid::new_v4(),
            subject_id: subject_id.into(),
            modality: verdict.modality,
            result: verdict.label.clone(),
            confidence: verdict.confidence,
            input_data,
            file_name: artifact.original_name.clone(),
            file_size,
            file_type,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryListResponse {
    pub items: Vec<DetectionRecord>,
}
