pub mod ai;
pub mod config;
pub mod conversation;
pub mod error;
pub mod input;
pub mod provider;
pub mod state;

// Re-export main types for convenience
pub use ai::{GeminiClient, GeminiSession};
pub use config::{Config, Palette, Strings, ThemeColors};
pub use conversation::{Conversation, Outcome};
pub use error::{ChatError, ProviderError};
pub use input::InputBuffer;
pub use provider::{ChatProvider, ChatSession, GenerationConfig, HarmThreshold, SessionOptions};
pub use state::{
    HistoryEntry, Notice, NoticeCategory, Notices, Phase, RequestState, Role, Theme, Transcript,
    Turn,
};
