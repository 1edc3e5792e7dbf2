//! UI-agnostic conversation state types
//!
//! Everything here is plain data that the terminal front end reads while
//! rendering. Nothing in this module talks to the network.

use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Who said a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Local>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Local::now(),
        }
    }
}

/// A turn as replayed into a new remote session (no timestamp)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub text: String,
}

impl From<&Turn> for HistoryEntry {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role,
            text: turn.text.clone(),
        }
    }
}

/// Append-only record of the conversation.
///
/// Turns are never edited, removed or reordered once pushed. There is no
/// size cap; a transcript lives only as long as the process.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Seed history for a freshly created session
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.turns.iter().map(HistoryEntry::from).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggle(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn is_dark(self) -> bool {
        self == Theme::Dark
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestState {
    #[default]
    Idle,
    Pending,
}

/// Where the controller is in its lifecycle.
///
/// `Uninitialized -> Connecting -> Ready <-> Sending`, with
/// `Connecting -> Unavailable -> Connecting` when session start fails and
/// the user retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Uninitialized,
    Connecting,
    Ready,
    Sending,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeCategory {
    Error,
    Validation,
    /// Raised on a send attempt while no session exists
    Unavailable,
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub id: u64,
    pub category: NoticeCategory,
    pub message: String,
    pub raised_at: Instant,
}

/// Transient notifications, each dismissed after a fixed duration
#[derive(Debug, Clone)]
pub struct Notices {
    items: Vec<Notice>,
    ttl: Duration,
    next_id: u64,
}

impl Notices {
    pub fn new(ttl: Duration) -> Self {
        Self {
            items: Vec::new(),
            ttl,
            next_id: 0,
        }
    }

    pub fn notify(&mut self, category: NoticeCategory, message: impl Into<String>) {
        let message = message.into();
        match category {
            NoticeCategory::Validation => tracing::warn!(%message, "validation notice"),
            NoticeCategory::Error | NoticeCategory::Unavailable => {
                tracing::error!(?category, %message, "error notice")
            }
        }

        self.next_id += 1;
        self.items.push(Notice {
            id: self.next_id,
            category,
            message,
            raised_at: Instant::now(),
        });
    }

    /// Drop every notice older than the configured duration
    pub fn expire(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.items
            .retain(|notice| now.saturating_duration_since(notice.raised_at) < ttl);
    }

    pub fn dismiss_all(&mut self) {
        self.items.clear();
    }

    pub fn active(&self) -> &[Notice] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
