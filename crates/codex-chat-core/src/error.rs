use std::time::Duration;

use thiserror::Error;

use crate::state::NoticeCategory;

/// Failures reported by a chat backend.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no Gemini API key configured (set GEMINI_API_KEY)")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Http(#[source] reqwest::Error),
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("response blocked by safety filter: {0}")]
    Blocked(String),
    #[error("response contained no text")]
    EmptyResponse,
    #[error("no response after {0:?}")]
    Timeout(Duration),
    #[error("background task failed: {0}")]
    TaskFailed(String),
}

/// Everything the conversation controller can refuse or fail with.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("failed to start chat session: {0}")]
    SessionInit(#[source] ProviderError),
    #[error("message is empty")]
    EmptyMessage,
    #[error("failed to send message: {0}")]
    Send(#[source] ProviderError),
    #[error("a request is already in flight")]
    Busy,
    #[error("chat session is not available")]
    Unavailable,
}

impl ChatError {
    /// Notice category this error is surfaced under, if it is surfaced at all.
    pub fn category(&self) -> Option<NoticeCategory> {
        match self {
            ChatError::SessionInit(_) | ChatError::Send(_) => Some(NoticeCategory::Error),
            ChatError::EmptyMessage => Some(NoticeCategory::Validation),
            ChatError::Unavailable => Some(NoticeCategory::Unavailable),
            ChatError::Busy => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            ChatError::SessionInit(ProviderError::MissingApiKey).category(),
            Some(NoticeCategory::Error)
        );
        assert_eq!(
            ChatError::Send(ProviderError::EmptyResponse).category(),
            Some(NoticeCategory::Error)
        );
        assert_eq!(ChatError::EmptyMessage.category(), Some(NoticeCategory::Validation));
        assert_eq!(ChatError::Unavailable.category(), Some(NoticeCategory::Unavailable));
        assert_eq!(ChatError::Busy.category(), None);
    }

    #[test]
    fn test_display_includes_source() {
        let err = ChatError::Send(ProviderError::Api {
            status: 429,
            message: "RESOURCE_EXHAUSTED: quota".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "failed to send message: API error 429: RESOURCE_EXHAUSTED: quota"
        );
    }
}
