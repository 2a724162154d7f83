// Result Normalization
// Maps raw classifier output onto the {label, confidence} verdict contract

use crate::models::{Modality, RawVerdict, Verdict};
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::warn;

/// Confidence substituted when a service reply carries no usable number.
pub const FALLBACK_CONFIDENCE: f64 = 70.0;
pub const UNKNOWN_LABEL: &str = "Unknown";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("empty response")]
    EmptyResponse,
    #[error("no confidence after label {label:?}")]
    MissingConfidence { label: String },
    #[error("confidence token {token:?} is not a number")]
    InvalidConfidence { label: String, token: String },
}

impl ParseError {
    /// Label recovered before the failure, if any.
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::EmptyResponse => None,
            Self::MissingConfidence { label } | Self::InvalidConfidence { label, .. } => {
                Some(label.as_str())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedVerdict {
    pub label: String,
    pub confidence: f64,
}

fn leading_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?")
            .expect("leading number pattern is valid")
    })
}

/// Parse a free-form `"<label>[,:] <confidence>"` reply.
///
/// The label is everything before the first `,` or `:`. The confidence is the leading
/// number of the following token, so `"AI: 85%"` and `"Human, 62 (fairly sure)"` both parse.
pub fn parse_verdict(text: &str) -> Result<ParsedVerdict, ParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseError::EmptyResponse);
    }

    let mut tokens = text.split([',', ':']);
    let label = tokens.next().unwrap_or_default().trim().to_string();

    let token = match tokens.next() {
        Some(t) => t.trim(),
        None => return Err(ParseError::MissingConfidence { label }),
    };

    let number = leading_number_re()
        .find(token)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|n| n.is_finite());

    match number {
        Some(confidence) => Ok(ParsedVerdict { label, confidence }),
        None => Err(ParseError::InvalidConfidence {
            label,
            token: token.to_string(),
        }),
    }
}

/// Canonicalize "AI"/"Human" answers into modality phrasing; keep anything else verbatim.
pub fn canonical_label(label: &str, modality: Modality) -> String {
    let trimmed = label.trim().trim_matches(|c| c == '"' || c == '\'' || c == '*').trim();
    let lower = trimmed.to_lowercase();
    if lower.is_empty() {
        UNKNOWN_LABEL.to_string()
    } else if starts_with_word(&lower, "ai") {
        modality.ai_label()
    } else if lower.starts_with("human") {
        modality.human_label()
    } else {
        trimmed.to_string()
    }
}

/// `prefix` at the start of `s`, not followed by another letter or digit.
fn starts_with_word(s: &str, prefix: &str) -> bool {
    s.strip_prefix(prefix)
        .map_or(false, |rest| !rest.starts_with(|c: char| c.is_alphanumeric()))
}

fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        return FALLBACK_CONFIDENCE;
    }
    confidence.clamp(0.0, 100.0)
}

pub fn normalize(raw: &RawVerdict, modality: Modality) -> Verdict {
    match raw {
        RawVerdict::Structured { label, confidence } => Verdict {
            label: label.clone(),
            confidence: clamp_confidence(*confidence),
            modality,
            confidence_fallback: false,
        },
        RawVerdict::Unstructured { text } => match parse_verdict(text) {
            Ok(parsed) => Verdict {
                label: canonical_label(&parsed.label, modality),
                confidence: clamp_confidence(parsed.confidence),
                modality,
                confidence_fallback: false,
            },
            Err(err) => {
                warn!(
                    modality = %modality,
                    error = %err,
                    fallback_confidence = FALLBACK_CONFIDENCE,
                    "normalizer.confidence_fallback"
                );
                Verdict {
                    label: canonical_label(err.label().unwrap_or_default(), modality),
                    confidence: FALLBACK_CONFIDENCE,
                    modality,
                    confidence_fallback: true,
                }
            }
        },
    }
}
