use std::str::FromStr;

use codex_chat_core::{NoticeCategory, Phase, Role, ThemeColors, Turn};
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{block::Title, Block, Borders, Clear, Paragraph},
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::app::App;

const TOAST_WIDTH: u16 = 48;

struct Colors {
    primary: Color,
    secondary: Color,
    accent: Color,
    text: Color,
    muted: Color,
}

impl Colors {
    fn new(theme: &ThemeColors, dark: bool) -> Self {
        Self {
            primary: parse_color(&theme.primary),
            secondary: parse_color(&theme.secondary),
            accent: parse_color(&theme.accent),
            text: parse_color(&theme.text),
            muted: if dark { Color::Gray } else { Color::DarkGray },
        }
    }
}

fn parse_color(value: &str) -> Color {
    Color::from_str(value).unwrap_or(Color::Reset)
}

/// Split `text` after as many characters as fit in `width` columns.
/// Always takes at least one character so a too-wide glyph still advances.
fn split_at_width(text: &str, width: usize) -> (&str, &str) {
    let mut used = 0;
    for (idx, c) in text.char_indices() {
        let w = c.width().unwrap_or(0);
        if used + w > width && idx > 0 {
            return text.split_at(idx);
        }
        used += w;
    }
    (text, "")
}

/// Word-wrap to `width` terminal columns, keeping explicit newlines.
/// Words wider than a line are split.
fn wrap_text_to_width(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let first_row = lines.len();
        let mut current = String::new();
        let mut current_width = 0;

        for mut word in paragraph.split_whitespace() {
            // Hard-split words that cannot fit on any line
            while word.width() > width {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                    current_width = 0;
                }
                let (head, rest) = split_at_width(word, width);
                lines.push(head.to_string());
                word = rest;
            }
            if word.is_empty() {
                continue;
            }

            let word_width = word.width();
            if current.is_empty() {
                current.push_str(word);
                current_width = word_width;
            } else if current_width + 1 + word_width <= width {
                current.push(' ');
                current.push_str(word);
                current_width += 1 + word_width;
            } else {
                lines.push(std::mem::replace(&mut current, word.to_string()));
                current_width = word_width;
            }
        }

        // Blank paragraphs still take a row
        if !current.is_empty() || lines.len() == first_row {
            lines.push(current);
        }
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// The part of the input that fits in `width` columns with the cursor in
/// view, and the cursor's column within it. `cursor` is a character index.
fn input_view(text: &str, cursor: usize, width: usize) -> (String, usize) {
    let chars: Vec<char> = text.chars().collect();
    let cursor = cursor.min(chars.len());
    let char_width = |c: &char| c.width().unwrap_or(0);

    // Scroll right until the cursor cell itself fits
    let mut start = 0;
    let mut before: usize = chars[..cursor].iter().map(char_width).sum();
    while start < cursor && before >= width {
        before -= char_width(&chars[start]);
        start += 1;
    }

    let mut used = 0;
    let visible = chars[start..]
        .iter()
        .take_while(|c| {
            used += char_width(*c);
            used <= width
        })
        .collect();
    (visible, before)
}

/// Style `**bold**` runs. `bold` carries an unclosed run over to the next line.
fn markdown_line(text: &str, base: Style, bold: &mut bool) -> Line<'static> {
    let spans: Vec<Span<'static>> = text
        .split("**")
        .enumerate()
        .filter_map(|(i, part)| {
            if i > 0 {
                *bold = !*bold;
            }
            if part.is_empty() {
                return None;
            }
            let style = if *bold { base.add_modifier(Modifier::BOLD) } else { base };
            Some(Span::styled(part.to_string(), style))
        })
        .collect();

    Line::from(spans)
}

fn turn_lines(app: &App, turn: &Turn, colors: &Colors, width: usize) -> Vec<Line<'static>> {
    let strings = app.conversation.strings();
    let (label, alignment, body_style) = match turn.role {
        Role::User => (
            strings.user_label.clone(),
            Alignment::Right,
            Style::default().fg(colors.accent),
        ),
        Role::Assistant => (
            strings.assistant_name.clone(),
            Alignment::Left,
            Style::default().fg(colors.text),
        ),
    };

    let mut lines = vec![Line::from(vec![
        Span::styled(label, body_style.add_modifier(Modifier::BOLD)),
        Span::styled(
            format!(" · {}", turn.timestamp.format("%H:%M:%S")),
            Style::default().fg(colors.muted),
        ),
    ])
    .alignment(alignment)];

    let mut bold = false;
    for row in wrap_text_to_width(&turn.text, width) {
        let line = match turn.role {
            Role::User => Line::styled(row, body_style),
            Role::Assistant => markdown_line(&row, body_style, &mut bold),
        };
        lines.push(line.alignment(alignment));
    }
    lines.push(Line::default());
    lines
}

fn transcript_lines(app: &App, colors: &Colors, width: usize) -> Vec<Line<'static>> {
    let conversation = &app.conversation;
    let strings = conversation.strings();

    if conversation.transcript().is_empty() && conversation.phase() != Phase::Sending {
        let hint = match conversation.phase() {
            Phase::Uninitialized | Phase::Connecting => format!("Connecting to {}...", app.model),
            Phase::Unavailable => strings.unavailable.clone(),
            Phase::Ready | Phase::Sending => strings.placeholder.clone(),
        };
        return vec![Line::styled(hint, Style::default().fg(colors.muted).italic())];
    }

    let mut lines: Vec<Line<'static>> = conversation
        .transcript()
        .turns()
        .iter()
        .flat_map(|turn| turn_lines(app, turn, colors, width))
        .collect();

    if conversation.phase() == Phase::Sending {
        lines.push(Line::styled(
            strings.assistant_name.clone(),
            Style::default().fg(colors.text).add_modifier(Modifier::BOLD),
        ));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::styled(
            format!("{}{}", strings.thinking, dots),
            Style::default().fg(colors.muted).add_modifier(Modifier::ITALIC),
        ));
    }

    lines
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let colors = Colors::new(app.palette.colors(app.theme), app.theme.is_dark());

    frame.render_widget(Block::default().bg(colors.primary), area);

    let [header_area, transcript_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(3),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area, &colors);
    render_transcript(app, frame, transcript_area, &colors);
    render_input(app, frame, input_area, &colors);
    render_footer(app, frame, footer_area, &colors);
    render_notices(app, frame, transcript_area, &colors);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect, colors: &Colors) {
    let title = Line::from(vec![
        Span::styled(
            format!(" {} ", app.conversation.strings().title),
            Style::default().fg(colors.text).bold(),
        ),
        Span::styled(
            format!("{} · {}", app.conversation.provider_name(), app.model),
            Style::default().fg(colors.muted),
        ),
    ]);
    let switch = if app.theme.is_dark() {
        Span::styled(" ☾ dark ", Style::default().fg(colors.primary).bg(colors.text))
    } else {
        Span::styled(" ☀ light ", Style::default().fg(colors.primary).bg(colors.accent))
    };
    let switch = Line::from(vec![switch, Span::styled(" ^T ", Style::default().fg(colors.muted))]);

    let [title_area, switch_area] =
        Layout::horizontal([Constraint::Min(0), Constraint::Length(switch.width() as u16)])
            .areas(area);
    frame.render_widget(Paragraph::new(title), title_area);
    frame.render_widget(Paragraph::new(switch).alignment(Alignment::Right), switch_area);
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect, colors: &Colors) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(colors.muted))
        .style(Style::default().bg(colors.secondary));

    let inner = block.inner(area);
    let lines = transcript_lines(app, colors, inner.width.saturating_sub(1) as usize);

    app.transcript_height = inner.height;
    app.transcript_lines = u16::try_from(lines.len()).unwrap_or(u16::MAX);
    let scroll = app.effective_scroll();

    let transcript = Paragraph::new(Text::from(lines))
        .block(block)
        .scroll((scroll, 0));
    frame.render_widget(transcript, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect, colors: &Colors) {
    let conversation = &app.conversation;
    let pending = conversation.is_pending();

    let send_hint = if pending {
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        Line::styled(format!(" sending{dots:<3} "), Style::default().fg(colors.muted))
    } else {
        Line::styled(" ⏎ send ", Style::default().fg(colors.accent).bold())
    };

    let border = if pending { colors.muted } else { colors.accent };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(Title::from(" Message "))
        .title(Title::from(send_hint).alignment(Alignment::Right));

    let input = conversation.input();
    let inner_width = area.width.saturating_sub(2) as usize;
    let (visible, cursor_x) = input_view(input.as_str(), input.cursor(), inner_width);

    let paragraph = if input.is_empty() {
        Paragraph::new(Span::styled(
            conversation.strings().placeholder.clone(),
            Style::default().fg(colors.muted),
        ))
    } else {
        Paragraph::new(visible).style(Style::default().fg(colors.text))
    };
    frame.render_widget(paragraph.block(block), area);

    frame.set_cursor_position((area.x + cursor_x as u16 + 1, area.y + 1));
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect, colors: &Colors) {
    let hints = " ^T theme  ^R reconnect  PgUp/PgDn scroll  Esc dismiss  ^C quit";
    frame.render_widget(
        Paragraph::new(Span::styled(hints, Style::default().fg(colors.muted))),
        area,
    );

    let conversation = &app.conversation;
    let (status, status_color) = match conversation.phase() {
        Phase::Uninitialized | Phase::Connecting => ("connecting", colors.muted),
        Phase::Ready => ("ready", colors.accent),
        Phase::Sending => ("waiting for reply", colors.accent),
        Phase::Unavailable => ("offline", Color::Red),
    };

    let mut spans = Vec::new();
    if let Some(error) = conversation.last_error() {
        spans.push(Span::styled(format!("{error}  "), Style::default().fg(Color::Red)));
    }
    spans.push(Span::styled(format!("{status} "), Style::default().fg(status_color).bold()));
    frame.render_widget(Paragraph::new(Line::from(spans)).alignment(Alignment::Right), area);
}

/// Stack of toasts in the top-right corner of `area`, oldest first
fn render_notices(app: &App, frame: &mut Frame, area: Rect, colors: &Colors) {
    let width = TOAST_WIDTH.min(area.width.saturating_sub(2));
    if width < 8 {
        return;
    }

    let x = area.x + area.width - width - 1;
    let mut y = area.y + 1;
    let bottom = area.y + area.height;

    for notice in app.conversation.notices().active() {
        let (title, color) = match notice.category {
            NoticeCategory::Error => (" Error ", Color::Red),
            NoticeCategory::Validation => (" Notice ", Color::Yellow),
            NoticeCategory::Unavailable => (" Offline ", Color::Magenta),
        };

        let rows = wrap_text_to_width(&notice.message, width.saturating_sub(4) as usize);
        let height = rows.len() as u16 + 2;
        if y + height > bottom {
            break;
        }

        let toast_area = Rect::new(x, y, width, height);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color))
            .title(Span::styled(title, Style::default().fg(color).bold()))
            .style(Style::default().bg(colors.primary));
        let text: Vec<Line> = rows
            .into_iter()
            .map(|row| Line::styled(format!(" {row}"), Style::default().fg(colors.text)))
            .collect();

        frame.render_widget(Clear, toast_area);
        frame.render_widget(Paragraph::new(text).block(block), toast_area);
        y += height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codex_chat_core::{Config, Conversation, GeminiClient, Transcript};
    use ratatui::{backend::TestBackend, Terminal};
    use std::sync::Arc;

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer.content().iter().map(|cell| cell.symbol()).collect()
    }

    fn app_with(transcript: Transcript) -> App {
        let config = Config::new();
        let client = GeminiClient::new(None, &config.model);
        let conversation =
            Conversation::from_config(Arc::new(client), &config).with_transcript(transcript);
        App::new(conversation, &config)
    }

    #[test]
    fn test_wrap_text_to_width() {
        assert_eq!(
            wrap_text_to_width("the quick brown fox", 9),
            vec!["the quick", "brown fox"]
        );
        assert_eq!(wrap_text_to_width("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert_eq!(wrap_text_to_width("one\n\ntwo", 10), vec!["one", "", "two"]);
        assert_eq!(wrap_text_to_width("", 10), vec![""]);
    }

    #[test]
    fn test_wrap_counts_display_columns() {
        assert_eq!(wrap_text_to_width("甲乙丙丁戊", 4), vec!["甲乙", "丙丁", "戊"]);
        assert_eq!(wrap_text_to_width("ab 甲乙丙", 5), vec!["ab", "甲乙", "丙"]);
        // A glyph wider than the line still makes progress
        assert_eq!(wrap_text_to_width("甲乙", 1), vec!["甲", "乙"]);
        assert!(wrap_text_to_width("日本語のテキストをここに", 7)
            .iter()
            .all(|row| row.width() <= 7));
    }

    #[test]
    fn test_input_view_keeps_cursor_in_columns() {
        assert_eq!(input_view("hello", 2, 10), ("hello".to_string(), 2));
        assert_eq!(input_view("abcdefgh", 8, 5), ("efgh".to_string(), 4));
        assert_eq!(input_view("甲乙丙丁", 4, 5), ("丙丁".to_string(), 4));
        assert_eq!(input_view("甲乙丙丁", 0, 5), ("甲乙".to_string(), 0));
    }

    #[test]
    fn test_render_wide_reply_keeps_every_character() {
        let reply = "甲乙丙丁戊己庚辛壬癸子丑寅卯辰巳午未申酉戌亥春夏秋冬東西南北天地人山川日月星辰風雨雪";
        let mut transcript = Transcript::new();
        transcript.append(Turn::assistant(reply));
        let mut app = app_with(transcript);

        let mut terminal = Terminal::new(TestBackend::new(40, 20)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let screen = screen_text(&terminal);
        let missing: Vec<char> = reply.chars().filter(|c| !screen.contains(*c)).collect();
        assert!(missing.is_empty(), "not rendered: {missing:?}");
        // label, three wrapped rows, blank
        assert_eq!(app.transcript_lines, 5);
    }

    #[test]
    fn test_markdown_bold_carries_across_lines() {
        let mut bold = false;
        let first = markdown_line("plain **strong", Style::default(), &mut bold);
        assert!(bold);
        assert_eq!(first.spans.len(), 2);
        assert!(first.spans[1].style.add_modifier.contains(Modifier::BOLD));

        let second = markdown_line("still** done", Style::default(), &mut bold);
        assert!(!bold);
        assert!(second.spans[0].style.add_modifier.contains(Modifier::BOLD));
        assert!(!second.spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_render_transcript_and_header() {
        let mut transcript = Transcript::new();
        transcript.append(Turn::user("What is Rust?"));
        transcript.append(Turn::assistant("A systems programming language."));
        let mut app = app_with(transcript);

        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let screen = screen_text(&terminal);
        assert!(screen.contains("Codex Chatbot"));
        assert!(screen.contains("What is Rust?"));
        assert!(screen.contains("A systems programming language."));
        assert!(screen.contains("light"));
        assert_eq!(app.transcript_lines, 6);
    }

    #[test]
    fn test_render_toasts() {
        let mut app = app_with(Transcript::new());
        app.conversation.send("").ok();
        app.toggle_theme();

        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let screen = screen_text(&terminal);
        assert!(screen.contains("Notice"));
        assert!(screen.contains("dark"));
    }
}
