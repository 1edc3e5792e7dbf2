use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::ProviderError;
use crate::provider::{ChatProvider, ChatSession, GenerationConfig, SafetySetting, SessionOptions};
use crate::state::{HistoryEntry, Role};

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

impl Content {
    fn new(role: Role, text: &str) -> Self {
        Self {
            role: wire_role(role).to_string(),
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfigPayload {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

impl From<&GenerationConfig> for GenerationConfigPayload {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_k: config.top_k,
            top_p: config.top_p,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct SafetySettingPayload {
    category: &'static str,
    threshold: &'static str,
}

impl From<&SafetySetting> for SafetySettingPayload {
    fn from(setting: &SafetySetting) -> Self {
        Self {
            category: setting.category.as_str(),
            threshold: setting.threshold.as_str(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: &'a [Content],
    generation_config: &'a GenerationConfigPayload,
    safety_settings: &'a [SafetySettingPayload],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

/// Client for the Gemini REST API
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: Option<&str>, model: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string),
            model: model.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn model_url(&self, api_key: &str) -> String {
        format!("{}/models/{}?key={}", self.base_url, self.model, api_key)
    }

    fn generate_url(&self, api_key: &str) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, api_key
        )
    }

    /// Fetch the model's metadata, which fails on a bad key or unknown model
    async fn verify_model(&self, api_key: &str) -> Result<(), ProviderError> {
        let response = self
            .client
            .get(self.model_url(api_key))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body));
        }

        Ok(())
    }
}

#[async_trait]
impl ChatProvider for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn start_session(
        &self,
        history: Vec<HistoryEntry>,
        options: &SessionOptions,
    ) -> Result<Arc<dyn ChatSession>, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or(ProviderError::MissingApiKey)?;

        self.verify_model(api_key).await?;
        tracing::info!(model = %self.model, seeded = history.len(), "gemini session opened");

        let contents = history
            .iter()
            .map(|entry| Content::new(entry.role, &entry.text))
            .collect();

        Ok(Arc::new(GeminiSession {
            client: self.client.clone(),
            url: self.generate_url(api_key),
            generation: GenerationConfigPayload::from(&options.generation),
            safety: options.safety.iter().map(SafetySettingPayload::from).collect(),
            history: Mutex::new(contents),
        }))
    }
}

/// A Gemini chat session.
///
/// The REST API is stateless, so the session carries the conversation
/// itself: seed history plus every exchange that completed successfully.
pub struct GeminiSession {
    client: Client,
    url: String,
    generation: GenerationConfigPayload,
    safety: Vec<SafetySettingPayload>,
    history: Mutex<Vec<Content>>,
}

impl GeminiSession {
    fn request<'a>(&'a self, contents: &'a [Content]) -> GenerateContentRequest<'a> {
        GenerateContentRequest {
            contents,
            generation_config: &self.generation,
            safety_settings: &self.safety,
        }
    }
}

#[async_trait]
impl ChatSession for GeminiSession {
    async fn reply(&self, text: &str) -> Result<String, ProviderError> {
        // Held for the whole exchange so replies are recorded in order
        let mut history = self.history.lock().await;

        let user = Content::new(Role::User, text);
        let mut contents = history.clone();
        contents.push(user.clone());

        let response = self
            .client
            .post(&self.url)
            .json(&self.request(&contents))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(transport_error)?;
        let reply = extract_reply(parsed)?;

        history.push(user);
        history.push(Content::new(Role::Assistant, &reply));
        Ok(reply)
    }
}

fn extract_reply(response: GenerateContentResponse) -> Result<String, ProviderError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ProviderError::Blocked(reason));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(ProviderError::EmptyResponse)?;

    let text: String = candidate
        .content
        .map(|content| content.parts.into_iter().filter_map(|part| part.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(match candidate.finish_reason.as_deref() {
            Some("SAFETY") => ProviderError::Blocked("SAFETY".to_string()),
            _ => ProviderError::EmptyResponse,
        });
    }

    Ok(text)
}

/// The request URL carries the API key, so it never reaches an error message
fn transport_error(err: reqwest::Error) -> ProviderError {
    ProviderError::Http(err.without_url())
}

fn map_http_error(status: StatusCode, body: &str) -> ProviderError {
    let message = serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| {
            let status_text = wrapper.error.status.unwrap_or_default();
            let msg = wrapper.error.message.unwrap_or_else(|| body.to_string());
            if status_text.is_empty() {
                msg
            } else {
                format!("{status_text}: {msg}")
            }
        })
        .unwrap_or_else(|_| body.to_string());

    ProviderError::Api {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{uniform_safety, HarmThreshold};
    use serde_json::json;

    fn session() -> GeminiSession {
        let options = SessionOptions {
            safety: uniform_safety(HarmThreshold::BlockMediumAndAbove),
            ..SessionOptions::default()
        };
        GeminiSession {
            client: Client::new(),
            url: "http://localhost/unused".to_string(),
            generation: GenerationConfigPayload::from(&options.generation),
            safety: options.safety.iter().map(SafetySettingPayload::from).collect(),
            history: Mutex::new(Vec::new()),
        }
    }

    fn parse(value: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(value).expect("valid response json")
    }

    #[test]
    fn test_request_body_shape() {
        let contents = vec![
            Content::new(Role::User, "hi"),
            Content::new(Role::Assistant, "hello"),
            Content::new(Role::User, "how are you?"),
        ];
        let session = session();
        let body = serde_json::to_value(session.request(&contents)).unwrap();

        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][2]["parts"][0]["text"], "how are you?");
        assert_eq!(body["generationConfig"]["topK"], 1);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 2048);
        assert_eq!(body["safetySettings"].as_array().map(Vec::len), Some(4));
        assert_eq!(body["safetySettings"][1]["category"], "HARM_CATEGORY_HATE_SPEECH");
        assert_eq!(body["safetySettings"][1]["threshold"], "BLOCK_MEDIUM_AND_ABOVE");
    }

    #[test]
    fn test_extract_reply_joins_parts() {
        let response = parse(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Hello, " }, { "text": "world" }] },
                "finishReason": "STOP"
            }]
        }));
        assert_eq!(extract_reply(response).unwrap(), "Hello, world");
    }

    #[test]
    fn test_extract_reply_prompt_blocked() {
        let response = parse(json!({ "promptFeedback": { "blockReason": "SAFETY" } }));
        assert!(matches!(extract_reply(response), Err(ProviderError::Blocked(r)) if r == "SAFETY"));
    }

    #[test]
    fn test_extract_reply_candidate_blocked() {
        let response = parse(json!({ "candidates": [{ "finishReason": "SAFETY" }] }));
        assert!(matches!(extract_reply(response), Err(ProviderError::Blocked(_))));
    }

    #[test]
    fn test_extract_reply_empty() {
        assert!(matches!(
            extract_reply(parse(json!({}))),
            Err(ProviderError::EmptyResponse)
        ));
        let blank = parse(json!({ "candidates": [{ "content": { "parts": [{ "text": "  " }] } }] }));
        assert!(matches!(extract_reply(blank), Err(ProviderError::EmptyResponse)));
    }

    #[test]
    fn test_map_http_error_reads_error_body() {
        let body = r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#;
        match map_http_error(StatusCode::BAD_REQUEST, body) {
            ProviderError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "INVALID_ARGUMENT: API key not valid.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_map_http_error_plain_body() {
        match map_http_error(StatusCode::BAD_GATEWAY, "upstream down") {
            ProviderError::Api { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "upstream down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_blank_api_key_is_missing() {
        let client = GeminiClient::new(Some("   "), DEFAULT_MODEL);
        assert!(client.api_key.is_none());
        let client = GeminiClient::new(Some("abc"), "gemini-pro").with_base_url("http://x/v1/");
        assert_eq!(client.generate_url("abc"), "http://x/v1/models/gemini-pro:generateContent?key=abc");
    }

    #[tokio::test]
    async fn test_start_session_without_key_fails() {
        let client = GeminiClient::new(None, DEFAULT_MODEL);
        let result = client.start_session(Vec::new(), &SessionOptions::default()).await;
        assert!(matches!(result, Err(ProviderError::MissingApiKey)));
    }

    #[tokio::test]
    async fn test_transport_error_hides_api_key() {
        // Nothing listens on the discard port
        let client = GeminiClient::new(Some("secret-key"), DEFAULT_MODEL)
            .with_base_url("http://127.0.0.1:9");
        let err = match client.start_session(Vec::new(), &SessionOptions::default()).await {
            Err(err) => err,
            Ok(_) => panic!("expected a connection failure"),
        };
        assert!(matches!(err, ProviderError::Http(_)));
        assert!(!err.to_string().contains("secret-key"));
    }
}
