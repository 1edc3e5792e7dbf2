//! The seam between the conversation controller and a remote chat service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::state::HistoryEntry;

/// Content categories the remote service filters on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarmCategory {
    Harassment,
    HateSpeech,
    SexuallyExplicit,
    DangerousContent,
}

impl HarmCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            HarmCategory::Harassment => "HARM_CATEGORY_HARASSMENT",
            HarmCategory::HateSpeech => "HARM_CATEGORY_HATE_SPEECH",
            HarmCategory::SexuallyExplicit => "HARM_CATEGORY_SEXUALLY_EXPLICIT",
            HarmCategory::DangerousContent => "HARM_CATEGORY_DANGEROUS_CONTENT",
        }
    }

    pub fn all() -> Vec<HarmCategory> {
        vec![
            HarmCategory::Harassment,
            HarmCategory::HateSpeech,
            HarmCategory::SexuallyExplicit,
            HarmCategory::DangerousContent,
        ]
    }
}

/// Severity at which a category is blocked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HarmThreshold {
    BlockNone,
    BlockOnlyHigh,
    #[default]
    BlockMediumAndAbove,
    BlockLowAndAbove,
}

impl HarmThreshold {
    pub fn as_str(&self) -> &'static str {
        match self {
            HarmThreshold::BlockNone => "BLOCK_NONE",
            HarmThreshold::BlockOnlyHigh => "BLOCK_ONLY_HIGH",
            HarmThreshold::BlockMediumAndAbove => "BLOCK_MEDIUM_AND_ABOVE",
            HarmThreshold::BlockLowAndAbove => "BLOCK_LOW_AND_ABOVE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: HarmThreshold,
}

/// One threshold applied to every category for the whole session
pub fn uniform_safety(threshold: HarmThreshold) -> Vec<SafetySetting> {
    HarmCategory::all()
        .into_iter()
        .map(|category| SafetySetting { category, threshold })
        .collect()
}

/// Sampling parameters, fixed for the lifetime of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.9,
            top_k: 1,
            top_p: 1.0,
            max_output_tokens: 2048,
        }
    }
}

/// Everything a provider needs to open a session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub generation: GenerationConfig,
    pub safety: Vec<SafetySetting>,
    /// Upper bound on any single remote call
    pub request_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            generation: GenerationConfig::default(),
            safety: uniform_safety(HarmThreshold::default()),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// A remote conversational context.
///
/// The session keeps its own memory of the exchange: callers pass only the
/// newest user text.
#[async_trait]
pub trait ChatSession: Send + Sync {
    async fn reply(&self, text: &str) -> Result<String, ProviderError>;
}

/// Something that can open chat sessions
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn start_session(
        &self,
        history: Vec<HistoryEntry>,
        options: &SessionOptions,
    ) -> Result<Arc<dyn ChatSession>, ProviderError>;
}
