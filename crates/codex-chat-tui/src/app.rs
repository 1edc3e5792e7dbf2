use codex_chat_core::{ChatError, Config, Conversation, Outcome, Palette, Theme};

pub struct App {
    // Core state
    pub should_quit: bool,
    pub conversation: Conversation,
    pub model: String,

    // Presentation
    pub theme: Theme,
    pub palette: Palette,

    // Transcript scrolling
    pub scroll: u16,
    pub follow_tail: bool,
    pub transcript_height: u16, // inner height, updated during render
    pub transcript_lines: u16,  // wrapped line count, updated during render

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
}

impl App {
    pub fn new(conversation: Conversation, config: &Config) -> Self {
        Self {
            should_quit: false,
            conversation,
            model: config.model.clone(),
            theme: config.theme,
            palette: config.palette.clone(),
            scroll: 0,
            follow_tail: true,
            transcript_height: 0,
            transcript_lines: 0,
            animation_frame: 0,
        }
    }

    /// Kick off the one-time session start
    pub fn start(&mut self) {
        self.conversation.initialize();
    }

    pub fn submit(&mut self) {
        match self.conversation.submit() {
            Ok(()) => self.follow_tail = true,
            // Send control is disabled while a reply is outstanding
            Err(ChatError::Busy) => {}
            Err(err) => tracing::debug!(error = %err, "message not sent"),
        }
    }

    pub fn apply(&mut self, outcome: Outcome) {
        self.conversation.apply(outcome);
        self.follow_tail = true;
    }

    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.toggle();
    }

    pub fn retry_session(&mut self) {
        if self.conversation.retry_session() {
            tracing::info!("retrying chat session");
        }
    }

    pub fn dismiss_notices(&mut self) {
        self.conversation.notices_mut().dismiss_all();
    }

    pub fn on_tick(&mut self) {
        if self.conversation.is_pending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        self.conversation
            .notices_mut()
            .expire(tokio::time::Instant::now());
    }

    fn max_scroll(&self) -> u16 {
        self.transcript_lines.saturating_sub(self.transcript_height)
    }

    pub fn scroll_up(&mut self, lines: u16) {
        if self.follow_tail {
            self.scroll = self.max_scroll();
            self.follow_tail = false;
        }
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines);
        if self.scroll >= self.max_scroll() {
            self.follow_tail = true;
        }
    }

    /// Scroll offset to render with, pinned to the bottom while following
    pub fn effective_scroll(&mut self) -> u16 {
        if self.follow_tail {
            self.scroll = self.max_scroll();
        }
        self.scroll.min(self.max_scroll())
    }
}
