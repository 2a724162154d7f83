use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use neuroscope_lib::models::{Artifact, Uploader};
use neuroscope_lib::services::{ConfigStore, DetectionOrchestrator};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Instant, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum UploaderArg {
    Text,
    Image,
    Media,
    Video,
}

impl From<UploaderArg> for Uploader {
    fn from(arg: UploaderArg) -> Self {
        match arg {
            UploaderArg::Text => Uploader::Text,
            UploaderArg::Image => Uploader::Image,
            UploaderArg::Media => Uploader::Media,
            UploaderArg::Video => Uploader::Video,
        }
    }
}

/// Run the detection pipeline once on a local file or inline text and print the verdict.
#[derive(Debug, Parser)]
#[command(name = "detect_file", version)]
struct Args {
    /// File to analyze
    path: Option<PathBuf>,

    /// Analyze this text instead of a file
    #[arg(long, conflicts_with = "path")]
    text: Option<String>,

    /// Intake rules to apply (inferred from the detected mime type when omitted)
    #[arg(long, value_enum)]
    uploader: Option<UploaderArg>,

    /// Directory holding config.json
    #[arg(long, env = "NEUROSCOPE_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Skip the inference provider and use the local heuristic for every modality
    #[arg(long)]
    offline: bool,

    /// Also write the report to this JSON file
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    source: String,
    mime_type: String,
    result: String,
    confidence: f64,
    modality: String,
    fingerprint: String,
    confidence_fallback: bool,
    classifier: String,
    elapsed_ms: u128,
}

fn sniff_mime(path: &Path, bytes: &[u8]) -> String {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_string();
    }
    let is_json = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
    match std::str::from_utf8(bytes) {
        Ok(_) if is_json => "application/json".to_string(),
        Ok(_) => "text/plain".to_string(),
        Err(_) => "application/octet-stream".to_string(),
    }
}

fn uploader_for_mime(mime: &str) -> Option<Uploader> {
    if mime.starts_with("text/") || mime == "application/json" {
        Some(Uploader::Text)
    } else if mime.starts_with("image/") {
        Some(Uploader::Image)
    } else if mime.starts_with("video/") {
        Some(Uploader::Video)
    } else if mime.starts_with("audio/") {
        Some(Uploader::Media)
    } else {
        None
    }
}

fn load_artifact(args: &Args) -> anyhow::Result<(String, Artifact)> {
    if let Some(text) = args.text.as_ref() {
        return Ok(("<inline>".to_string(), Artifact::text(text.clone(), None)));
    }

    let Some(path) = args.path.as_ref() else {
        bail!("either a file path or --text is required");
    };

    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let mime = sniff_mime(path, &bytes);
    let uploader = match args.uploader {
        Some(u) => u.into(),
        None => uploader_for_mime(&mime)
            .with_context(|| format!("cannot pick an uploader for {mime}; pass --uploader"))?,
    };

    let name = path.file_name().map(|n| n.to_string_lossy().to_string());
    let artifact = if uploader == Uploader::Text {
        Artifact::text(String::from_utf8_lossy(&bytes).to_string(), name).with_mime_type(mime)
    } else {
        let last_modified = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64);
        Artifact::file(uploader, name, mime, bytes, last_modified)
    };

    Ok((path.display().to_string(), artifact))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    neuroscope_lib::init_cli_logging();

    let orchestrator = if args.offline {
        DetectionOrchestrator::offline()
    } else {
        let config = match args.config_dir.clone().or_else(ConfigStore::default_config_dir) {
            Some(dir) => ConfigStore::new(dir).load()?,
            None => Default::default(),
        };
        DetectionOrchestrator::from_config(&config)?
    };

    let (source, artifact) = load_artifact(&args)?;
    let started = Instant::now();
    let outcome = orchestrator.detect(&artifact).await?;

    let report = Report {
        source,
        mime_type: artifact.declared_mime_type.clone(),
        result: outcome.verdict.label,
        confidence: outcome.verdict.confidence,
        modality: outcome.verdict.modality.to_string(),
        fingerprint: outcome.fingerprint.to_string(),
        confidence_fallback: outcome.verdict.confidence_fallback,
        classifier: outcome.classifier.to_string(),
        elapsed_ms: started.elapsed().as_millis(),
    };

    let json = serde_json::to_string_pretty(&report)?;
    println!("{json}");

    if let Some(out) = args.out.as_ref() {
        std::fs::write(out, &json).with_context(|| format!("writing {}", out.display()))?;
        eprintln!("Wrote {}", out.display());
    }

    Ok(())
}
