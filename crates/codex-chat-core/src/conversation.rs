//! The conversation controller.
//!
//! [`Conversation`] owns the transcript, the remote session handle and the
//! single in-flight request. Remote work runs on spawned tasks that report
//! back over a channel; only [`Conversation::apply`] mutates state with the
//! result, so all state changes happen on the task that owns the controller.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::config::{Config, Strings};
use crate::error::{ChatError, ProviderError};
use crate::input::InputBuffer;
use crate::provider::{ChatProvider, ChatSession, SessionOptions};
use crate::state::{NoticeCategory, Notices, Phase, RequestState, Transcript, Turn};

/// Result of a remote call, delivered back to the controller
pub enum Outcome {
    SessionStarted(Result<Arc<dyn ChatSession>, ProviderError>),
    Replied(Result<String, ProviderError>),
}

pub struct Conversation {
    provider: Arc<dyn ChatProvider>,
    options: SessionOptions,
    strings: Strings,

    transcript: Transcript,
    input: InputBuffer,
    session: Option<Arc<dyn ChatSession>>,
    sessions_started: usize,

    phase: Phase,
    request: RequestState,
    last_error: Option<String>,
    notices: Notices,

    outcome_tx: mpsc::UnboundedSender<Outcome>,
    outcome_rx: mpsc::UnboundedReceiver<Outcome>,
}

impl Conversation {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        options: SessionOptions,
        strings: Strings,
        notice_duration: Duration,
    ) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        Self {
            provider,
            options,
            strings,
            transcript: Transcript::new(),
            input: InputBuffer::new(),
            session: None,
            sessions_started: 0,
            phase: Phase::Uninitialized,
            request: RequestState::Idle,
            last_error: None,
            notices: Notices::new(notice_duration),
            outcome_tx,
            outcome_rx,
        }
    }

    pub fn from_config(provider: Arc<dyn ChatProvider>, config: &Config) -> Self {
        Self::new(
            provider,
            config.session_options(),
            config.strings.clone(),
            config.notice_duration(),
        )
    }

    /// Start from an existing transcript; it seeds the session on initialize
    pub fn with_transcript(mut self, transcript: Transcript) -> Self {
        self.transcript = transcript;
        self
    }

    // Accessors
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn input(&self) -> &InputBuffer {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputBuffer {
        &mut self.input
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn request_state(&self) -> RequestState {
        self.request
    }

    pub fn is_pending(&self) -> bool {
        self.request == RequestState::Pending
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn sessions_started(&self) -> usize {
        self.sessions_started
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn notices(&self) -> &Notices {
        &self.notices
    }

    pub fn notices_mut(&mut self) -> &mut Notices {
        &mut self.notices
    }

    pub fn strings(&self) -> &Strings {
        &self.strings
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Open the remote session, seeded with the current transcript.
    ///
    /// Does nothing (and returns false) once a session exists or while any
    /// request is in flight.
    pub fn initialize(&mut self) -> bool {
        if self.session.is_some() || self.is_pending() {
            return false;
        }

        self.phase = Phase::Connecting;
        self.request = RequestState::Pending;

        let provider = self.provider.clone();
        let history = self.transcript.history();
        let options = self.options.clone();
        let timeout = options.request_timeout;
        tracing::info!(
            provider = provider.name(),
            seeded = history.len(),
            "starting chat session"
        );

        self.spawn_remote(timeout, Outcome::SessionStarted, async move {
            provider.start_session(history, &options).await
        });
        true
    }

    /// Manual retry after the session failed to start
    pub fn retry_session(&mut self) -> bool {
        if self.phase != Phase::Unavailable {
            return false;
        }
        self.initialize()
    }

    /// Send the composed input. Every UI trigger goes through here.
    ///
    /// The draft is cleared as soon as the message is accepted (or rejected
    /// as empty); it is kept when the send is refused for any other reason.
    pub fn submit(&mut self) -> Result<(), ChatError> {
        let text = self.input.as_str().to_string();
        let result = self.send(&text);

        if matches!(result, Ok(()) | Err(ChatError::EmptyMessage)) {
            self.input.take();
        }
        result
    }

    /// Commit a user turn and ask the session for a reply.
    ///
    /// The user turn is appended before this returns; the reply arrives
    /// later through [`Conversation::apply`].
    pub fn send(&mut self, text: &str) -> Result<(), ChatError> {
        if self.is_pending() {
            tracing::debug!("send ignored, request already in flight");
            return Err(ChatError::Busy);
        }

        let text = text.trim();
        if text.is_empty() {
            self.notify_rejection(&ChatError::EmptyMessage);
            return Err(ChatError::EmptyMessage);
        }

        let Some(session) = self.session.clone() else {
            self.notify_rejection(&ChatError::Unavailable);
            return Err(ChatError::Unavailable);
        };

        self.transcript.append(Turn::user(text));
        self.request = RequestState::Pending;
        self.phase = Phase::Sending;
        tracing::debug!(chars = text.chars().count(), "sending message");

        let text = text.to_string();
        self.spawn_remote(self.options.request_timeout, Outcome::Replied, async move {
            session.reply(&text).await
        });
        Ok(())
    }

    /// Wait for the next remote call to finish
    pub async fn next_outcome(&mut self) -> Outcome {
        match self.outcome_rx.recv().await {
            Some(outcome) => outcome,
            // The controller keeps a sender alive, so the channel never closes
            None => std::future::pending().await,
        }
    }

    /// Commit the result of a remote call. Always releases the request.
    pub fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::SessionStarted(Ok(session)) => {
                self.session = Some(session);
                self.sessions_started += 1;
                self.phase = Phase::Ready;
                tracing::info!(provider = self.provider.name(), "chat session ready");
            }
            Outcome::SessionStarted(Err(err)) => {
                let err = ChatError::SessionInit(err);
                tracing::error!(error = %err, "error initializing chat");
                let message = self.strings.session_failed.clone();
                self.record_failure(message);
                self.phase = Phase::Unavailable;
            }
            Outcome::Replied(Ok(text)) if !text.trim().is_empty() => {
                self.transcript.append(Turn::assistant(text));
                self.phase = Phase::Ready;
            }
            Outcome::Replied(result) => {
                let err = ChatError::Send(result.err().unwrap_or(ProviderError::EmptyResponse));
                tracing::error!(error = %err, "error sending message");
                let message = self.strings.send_failed.clone();
                self.record_failure(message);
                self.phase = Phase::Ready;
            }
        }

        self.request = RequestState::Idle;
    }

    /// Wait for the in-flight call and commit it
    pub async fn settle(&mut self) {
        let outcome = self.next_outcome().await;
        self.apply(outcome);
    }

    fn record_failure(&mut self, message: String) {
        self.last_error = Some(message.clone());
        self.notices.notify(NoticeCategory::Error, message);
    }

    fn notify_rejection(&mut self, err: &ChatError) {
        let message = match err {
            ChatError::EmptyMessage => self.strings.empty_input.clone(),
            ChatError::Unavailable => self.strings.unavailable.clone(),
            _ => return,
        };
        if let Some(category) = err.category() {
            self.notices.notify(category, message);
        }
    }

    /// Run a remote call off the UI task, bounded by `timeout`, and post its
    /// result back. A panic or timeout is reported as a failure so the
    /// pending request is always released.
    fn spawn_remote<T, F>(
        &self,
        timeout: Duration,
        wrap: fn(Result<T, ProviderError>) -> Outcome,
        call: F,
    ) where
        T: Send + 'static,
        F: Future<Output = Result<T, ProviderError>> + Send + 'static,
    {
        let tx = self.outcome_tx.clone();
        tokio::spawn(async move {
            let mut task = tokio::spawn(call);
            let waited = tokio::time::timeout(timeout, &mut task).await;
            let result = match waited {
                Ok(Ok(result)) => result,
                Ok(Err(join_err)) => Err(ProviderError::TaskFailed(join_err.to_string())),
                Err(_) => {
                    task.abort();
                    match task.await {
                        // Finished before the abort landed; the session has
                        // already recorded the exchange
                        Ok(result) => result,
                        Err(join_err) if join_err.is_cancelled() => {
                            Err(ProviderError::Timeout(timeout))
                        }
                        Err(join_err) => Err(ProviderError::TaskFailed(join_err.to_string())),
                    }
                }
            };
            let _ = tx.send(wrap(result));
        });
    }
}
