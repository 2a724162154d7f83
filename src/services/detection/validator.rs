// Artifact Validation
// Per-uploader type, size and emptiness rules checked before any classification

use crate::models::{Artifact, Uploader};
use thiserror::Error;

pub const MIB: u64 = 1024 * 1024;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ValidationErrorKind {
    WrongType,
    TooLarge,
    Empty,
}

impl ValidationErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::WrongType => "WRONG_TYPE",
            Self::TooLarge => "TOO_LARGE",
            Self::Empty => "EMPTY",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub message: String,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: &str) -> Self {
        Self {
            kind,
            message: message.to_string(),
        }
    }
}

/// Acceptance rules of one uploader.
#[derive(Debug, Clone, Copy)]
pub struct UploadRules {
    pub accepted_prefixes: &'static [&'static str],
    pub accepted_exact: &'static [&'static str],
    /// Inclusive upper bound in bytes
    pub max_bytes: u64,
    pub wrong_type_message: &'static str,
    pub too_large_message: &'static str,
    pub empty_message: Option<&'static str>,
}

impl UploadRules {
    pub fn accepts_mime(&self, mime_type: &str) -> bool {
        let mime = mime_type.trim().to_ascii_lowercase();
        self.accepted_prefixes.iter().any(|p| mime.starts_with(p))
            || self.accepted_exact.iter().any(|e| mime == *e)
    }
}

pub fn upload_rules(uploader: Uploader) -> UploadRules {
    match uploader {
        Uploader::Text => UploadRules {
            accepted_prefixes: &["text/"],
            accepted_exact: &["application/json"],
            max_bytes: MIB,
            wrong_type_message: "Please upload a valid text file (e.g., .txt, .md, .json).",
            too_large_message: "File size exceeds 1MB limit.",
            empty_message: Some("Please enter some text to analyze."),
        },
        Uploader::Image => UploadRules {
            accepted_prefixes: &["image/"],
            accepted_exact: &[],
            max_bytes: 10 * MIB,
            wrong_type_message: "Please upload a valid image file.",
            too_large_message: "File size exceeds 10MB.",
            empty_message: Some("Uploaded file is empty."),
        },
        Uploader::Media => UploadRules {
            accepted_prefixes: &["audio/", "video/"],
            accepted_exact: &[],
            max_bytes: 20 * MIB,
            wrong_type_message: "Please upload a valid audio or video file.",
            too_large_message: "File size exceeds 20MB limit.",
            empty_message: None,
        },
        Uploader::Video => UploadRules {
            accepted_prefixes: &["video/"],
            accepted_exact: &[],
            max_bytes: 50 * MIB,
            wrong_type_message: "Please upload a valid video file.",
            too_large_message: "File size exceeds 50MB limit.",
            empty_message: None,
        },
    }
}

/// Check an artifact against its uploader's rules: type first, then size, then emptiness.
pub fn validate(artifact: &Artifact) -> Result<(), ValidationError> {
    let rules = upload_rules(artifact.uploader);

    if !rules.accepts_mime(&artifact.declared_mime_type) {
        return Err(ValidationError::new(
            ValidationErrorKind::WrongType,
            rules.wrong_type_message,
        ));
    }

    if artifact.byte_size > rules.max_bytes {
        return Err(ValidationError::new(
            ValidationErrorKind::TooLarge,
            rules.too_large_message,
        ));
    }

    if let Some(message) = rules.empty_message {
        let empty = match artifact.as_text() {
            Some(text) => text.trim().is_empty(),
            None => artifact.byte_size == 0,
        };
        if empty {
            return Err(ValidationError::new(ValidationErrorKind::Empty, message));
        }
    }

    Ok(())
}
