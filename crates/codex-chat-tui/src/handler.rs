use codex_chat_core::InputBuffer;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use crate::app::App;
use crate::tui::AppEvent;

const PAGE: u16 = 10;

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {}
        AppEvent::Tick => app.on_tick(),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') => app.should_quit = true,
            KeyCode::Char('t') => app.toggle_theme(),
            KeyCode::Char('r') => app.retry_session(),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Enter => app.submit(),
        KeyCode::Esc => app.dismiss_notices(),
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::PageUp => app.scroll_up(PAGE),
        KeyCode::PageDown => app.scroll_down(PAGE),
        code => edit_input(app.conversation.input_mut(), code),
    }
}

fn edit_input(input: &mut InputBuffer, code: KeyCode) {
    match code {
        KeyCode::Backspace => input.backspace(),
        KeyCode::Delete => input.delete(),
        KeyCode::Left => input.move_left(),
        KeyCode::Right => input.move_right(),
        KeyCode::Home => input.move_home(),
        KeyCode::End => input.move_end(),
        KeyCode::Char(c) => input.insert(c),
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollUp => app.scroll_up(3),
        MouseEventKind::ScrollDown => app.scroll_down(3),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codex_chat_core::{Config, Conversation, GeminiClient, NoticeCategory, Phase, Theme};
    use std::sync::Arc;

    fn offline_app() -> App {
        let config = Config::new();
        let client = GeminiClient::new(None, &config.model);
        App::new(Conversation::from_config(Arc::new(client), &config), &config)
    }

    fn press(app: &mut App, code: KeyCode) {
        handle_event(app, AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE)));
    }

    fn ctrl(app: &mut App, c: char) {
        let key = KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL);
        handle_event(app, AppEvent::Key(key));
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn test_typing_and_editing() {
        let mut app = offline_app();
        type_text(&mut app, "helo");
        press(&mut app, KeyCode::Left);
        type_text(&mut app, "l");
        press(&mut app, KeyCode::End);
        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.conversation.input().as_str(), "hell");
    }

    #[test]
    fn test_enter_on_blank_input_raises_validation() {
        let mut app = offline_app();
        type_text(&mut app, "   ");
        press(&mut app, KeyCode::Enter);

        assert!(app.conversation.transcript().is_empty());
        assert!(app.conversation.input().is_empty());
        let notices = app.conversation.notices().active();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].category, NoticeCategory::Validation);

        press(&mut app, KeyCode::Esc);
        assert!(app.conversation.notices().is_empty());
    }

    #[test]
    fn test_enter_without_session_keeps_draft() {
        let mut app = offline_app();
        type_text(&mut app, "hello");
        press(&mut app, KeyCode::Enter);

        assert!(app.conversation.transcript().is_empty());
        assert_eq!(app.conversation.input().as_str(), "hello");
        assert_eq!(
            app.conversation.notices().active()[0].category,
            NoticeCategory::Unavailable
        );
    }

    #[test]
    fn test_theme_toggle_leaves_conversation_alone() {
        let mut app = offline_app();
        type_text(&mut app, "draft");
        ctrl(&mut app, 't');
        assert_eq!(app.theme, Theme::Dark);
        ctrl(&mut app, 't');
        assert_eq!(app.theme, Theme::Light);

        assert_eq!(app.conversation.input().as_str(), "draft");
        assert!(app.conversation.transcript().is_empty());
        assert_eq!(app.conversation.phase(), Phase::Uninitialized);
    }

    #[test]
    fn test_ctrl_c_quits() {
        let mut app = offline_app();
        ctrl(&mut app, 'c');
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_missing_key_then_retry() {
        let mut app = offline_app();
        app.start();
        assert!(app.conversation.is_pending());

        let outcome = app.conversation.next_outcome().await;
        app.apply(outcome);
        assert_eq!(app.conversation.phase(), Phase::Unavailable);
        assert_eq!(
            app.conversation.last_error(),
            Some("Failed to start chat. Please try again.")
        );

        ctrl(&mut app, 'r');
        assert_eq!(app.conversation.phase(), Phase::Connecting);
        app.conversation.settle().await;
        assert_eq!(app.conversation.phase(), Phase::Unavailable);
    }

    #[test]
    fn test_scrolling_releases_and_regains_tail() {
        let mut app = offline_app();
        app.transcript_lines = 40;
        app.transcript_height = 10;

        press(&mut app, KeyCode::PageUp);
        assert!(!app.follow_tail);
        assert_eq!(app.effective_scroll(), 20);

        press(&mut app, KeyCode::PageDown);
        assert!(app.follow_tail);
        assert_eq!(app.effective_scroll(), 30);
    }
}
