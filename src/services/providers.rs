// Inference Provider Service
// Gemini and OpenAI-compatible generative API calls

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::{Duration, Instant};
use thiserror::Error;

use super::config_store::AppConfig;

pub const GEMINI_DEFAULT_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MAX_TOKENS: i32 = 64;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Missing content in response")]
    MissingContent,
    #[error("JSON parse error: {0}")]
    JsonError(String),
    #[error("API key not configured")]
    MissingApiKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Gemini,
    Openai,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Openai => "openai",
        }
    }

    fn default_url(&self) -> &'static str {
        match self {
            Self::Gemini => GEMINI_DEFAULT_URL,
            Self::Openai => OPENAI_DEFAULT_URL,
        }
    }
}

/// Binary payload sent next to the instruction (e.g. an image).
#[derive(Debug, Clone, Copy)]
pub struct Attachment<'a> {
    pub mime_type: &'a str,
    pub data: &'a [u8],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResult {
    pub content: String,
    pub latency_ms: i64,
}

/// External generative inference service: prompt (+ optional attachment) in, text out.
#[async_trait]
pub trait InferenceService: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        attachment: Option<Attachment<'_>>,
    ) -> Result<ChatResult, ProviderError>;
}

/// Everything the client needs; no process-wide state is consulted after construction.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub base_url: Option<String>,
    pub api_key: String,
    pub timeout: Duration,
    pub proxy: Option<String>,
}

pub struct ProviderClient {
    client: Client,
    kind: ProviderKind,
    url: String,
    api_key: String,
}

impl ProviderClient {
    pub fn new(settings: ProviderSettings) -> Result<Self, ProviderError> {
        if settings.api_key.trim().is_empty() {
            return Err(ProviderError::MissingApiKey);
        }

        let mut builder = Client::builder().timeout(settings.timeout);
        if let Some(proxy_url) = settings.proxy.as_deref() {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }
        let client = builder.build()?;

        let url = settings
            .base_url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| settings.kind.default_url().to_string());

        Ok(Self {
            client,
            kind: settings.kind,
            url: url.trim_end_matches('/').to_string(),
            api_key: settings.api_key,
        })
    }

    async fn call_gemini_api(
        &self,
        model: &str,
        prompt: &str,
        attachment: Option<Attachment<'_>>,
    ) -> Result<ChatResult, ProviderError> {
        let mut parts = vec![serde_json::json!({ "text": prompt })];
        if let Some(att) = attachment {
            parts.push(serde_json::json!({
                "inline_data": {
                    "mime_type": att.mime_type,
                    "data": BASE64.encode(att.data),
                }
            }));
        }

        let request = serde_json::json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": { "temperature": 0.0, "maxOutputTokens": DEFAULT_MAX_TOKENS }
        });

        let url = format!("{}/models/{}:generateContent", self.url, model);
        let start = Instant::now();

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        // {"candidates":[{"content":{"parts":[{"text":"..."}]}}]}
        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        let content = data["candidates"][0]["content"]["parts"]
            .as_array()
            .and_then(|parts| parts.iter().find_map(|p| p["text"].as_str()))
            .map(|s| s.to_string())
            .ok_or(ProviderError::MissingContent)?;

        Ok(ChatResult { content, latency_ms })
    }

    async fn call_chat_api(
        &self,
        model: &str,
        prompt: &str,
        attachment: Option<Attachment<'_>>,
    ) -> Result<ChatResult, ProviderError> {
        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Option<Vec<ChatChoice>>,
        }

        #[derive(Deserialize)]
        struct ChatChoice {
            message: Option<ChatMessageResponse>,
        }

        #[derive(Deserialize)]
        struct ChatMessageResponse {
            content: Option<String>,
        }

        let content = match attachment {
            None => serde_json::json!(prompt),
            Some(att) => serde_json::json!([
                { "type": "text", "text": prompt },
                {
                    "type": "image_url",
                    "image_url": {
                        "url": format!("data:{};base64,{}", att.mime_type, BASE64.encode(att.data))
                    }
                }
            ]),
        };

        let request = serde_json::json!({
            "model": model,
            "messages": [{ "role": "user", "content": content }],
            "max_tokens": DEFAULT_MAX_TOKENS,
            "temperature": 0.0
        });

        let start = Instant::now();

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        let content = data
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or(ProviderError::MissingContent)?;

        Ok(ChatResult { content, latency_ms })
    }
}

#[async_trait]
impl InferenceService for ProviderClient {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        attachment: Option<Attachment<'_>>,
    ) -> Result<ChatResult, ProviderError> {
        match self.kind {
            ProviderKind::Gemini => self.call_gemini_api(model, prompt, attachment).await,
            ProviderKind::Openai => self.call_chat_api(model, prompt, attachment).await,
        }
    }
}

/// Get API key from environment or config file
pub fn get_api_key(provider: ProviderKind, config: &AppConfig) -> Option<String> {
    let env_keys = match provider {
        ProviderKind::Gemini => ["GEMINI_API_KEY", "NEUROSCOPE_GEMINI_API_KEY"],
        ProviderKind::Openai => ["OPENAI_API_KEY", "NEUROSCOPE_OPENAI_API_KEY"],
    };

    for key in env_keys {
        if let Ok(val) = env::var(key) {
            let v = val.trim();
            if !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }

    config
        .api_keys
        .get(provider.as_str())
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(kind: ProviderKind, base_url: String) -> ProviderSettings {
        ProviderSettings {
            kind,
            base_url: Some(base_url),
            api_key: "test-key".to_string(),
            timeout: Duration::from_secs(5),
            proxy: None,
        }
    }

    #[test]
    fn test_client_requires_api_key() {
        let mut s = settings(ProviderKind::Gemini, "http://localhost".to_string());
        s.api_key = "  ".to_string();
        assert!(matches!(ProviderClient::new(s), Err(ProviderError::MissingApiKey)));
    }

    #[test]
    fn test_default_url_used_when_unset() {
        let mut s = settings(ProviderKind::Openai, String::new());
        s.base_url = None;
        let client = ProviderClient::new(s).unwrap();
        assert_eq!(client.url, OPENAI_DEFAULT_URL);
    }

    #[tokio::test]
    async fn test_gemini_generate_with_inline_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-pro-vision:generateContent"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{ "content": { "parts": [{ "text": "AI, 91" }] } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ProviderClient::new(settings(ProviderKind::Gemini, server.uri())).unwrap();
        let result = client
            .generate(
                "gemini-pro-vision",
                "classify",
                Some(Attachment { mime_type: "image/png", data: &[1, 2, 3] }),
            )
            .await
            .unwrap();
        assert_eq!(result.content, "AI, 91");

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(
            body["contents"][0]["parts"][1]["inline_data"]["data"],
            BASE64.encode([1u8, 2, 3])
        );
    }

    #[tokio::test]
    async fn test_openai_chat_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "content": "Human: 64" } }]
            })))
            .mount(&server)
            .await;

        let url = format!("{}/chat/completions", server.uri());
        let client = ProviderClient::new(settings(ProviderKind::Openai, url)).unwrap();
        let result = client.generate("gpt-4o-mini", "classify", None).await.unwrap();
        assert_eq!(result.content, "Human: 64");
    }

    #[tokio::test]
    async fn test_non_success_status_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let client = ProviderClient::new(settings(ProviderKind::Gemini, server.uri())).unwrap();
        let err = client.generate("gemini-pro", "classify", None).await.unwrap_err();
        match err {
            ProviderError::ApiError { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "overloaded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_candidates_is_missing_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let client = ProviderClient::new(settings(ProviderKind::Gemini, server.uri())).unwrap();
        let err = client.generate("gemini-pro", "classify", None).await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingContent));
    }
}
