// Detection Module
// Content fingerprinting and classification dispatch:
// - validator: per-uploader type/size/emptiness rules
// - fingerprint: deterministic artifact identity and heuristic seed
// - classifier: service-backed and heuristic classifiers behind one trait
// - normalizer: raw classifier output -> {label, confidence}
// - orchestrator: runs the stages in order and reports typed failures

pub mod validator;
pub mod fingerprint;
pub mod classifier;
pub mod normalizer;
pub mod orchestrator;

pub use validator::{upload_rules, validate, UploadRules, ValidationError, ValidationErrorKind, MIB};
pub use fingerprint::{fingerprint, Fingerprint};
pub use classifier::{
    heuristic_confidence,
    label_policy,
    ClassificationError,
    Classifier,
    DeterministicHeuristicClassifier,
    LabelPolicy,
    ServiceBackedClassifier,
};
pub use normalizer::{normalize, parse_verdict, ParseError, ParsedVerdict, FALLBACK_CONFIDENCE};
pub use orchestrator::{
    DetectionError,
    DetectionFailure,
    DetectionOrchestrator,
    DetectionOutcome,
    DetectionRun,
    DetectionStage,
};
