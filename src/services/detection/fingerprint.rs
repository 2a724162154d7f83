// Fingerprinting
// Weak, deterministic identity for an artifact. Seeds the heuristic classifier; not a hash
// in any cryptographic sense and not meant to detect duplicates across sessions.

use crate::models::{Artifact, ArtifactContent};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    value: String,
    code_sum: u64,
}

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Sum of UTF-16 code units the seed is reduced from.
    pub fn code_sum(&self) -> u64 {
        self.code_sum
    }

    /// `(code_sum mod 100) / 100`, always in [0, 1).
    pub fn seed(&self) -> f64 {
        (self.code_sum % 100) as f64 / 100.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

fn utf16_code_sum(s: &str) -> u64 {
    s.encode_utf16().map(u64::from).sum()
}

/// Text: the character-code sum of the trimmed content.
/// Files: `name-size-mime-lastModified`, seeded by the code sum of that string.
pub fn fingerprint(artifact: &Artifact) -> Fingerprint {
    match &artifact.content {
        ArtifactContent::Text(text) => {
            let code_sum = utf16_code_sum(text.trim());
            Fingerprint {
                value: code_sum.to_string(),
                code_sum,
            }
        }
        ArtifactContent::Bytes(_) => {
            let value = format!(
                "{}-{}-{}-{}",
                artifact.original_name.as_deref().unwrap_or(""),
                artifact.byte_size,
                artifact.declared_mime_type,
                artifact.last_modified.unwrap_or(0)
            );
            let code_sum = utf16_code_sum(&value);
            Fingerprint { value, code_sum }
        }
    }
}
