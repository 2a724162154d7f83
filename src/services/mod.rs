// NeuroScope Core Services

pub mod config_store;
pub mod providers;
pub mod detection;
pub mod history;

pub use config_store::*;
pub use providers::*;
pub use history::*;

pub use detection::{
    fingerprint,
    normalize,
    parse_verdict,
    validate,
    Classifier,
    DetectionFailure,
    DetectionOrchestrator,
    DetectionOutcome,
    DetectionStage,
    DeterministicHeuristicClassifier,
    Fingerprint,
    ServiceBackedClassifier,
    ValidationError,
    ValidationErrorKind,
};
