use hubchat_core::format::{self, Segment};
use hubchat_core::input::MAX_INPUT_ROWS;
use hubchat_core::{ChatRole, DomainStats, EntryBody, InputSurface, SurfaceKind, SUGGESTIONS};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};

use crate::app::{App, BackendStatus, Focus, NoticeLevel};

const BOT_LABEL: &str = "Hub:";

/// Convert formatted segments into a styled line
fn segments_to_line(segments: Vec<Segment>, base: Style) -> Line<'static> {
    let spans: Vec<Span<'static>> = segments
        .into_iter()
        .map(|seg| {
            let mut style = base;
            if seg.style.bold {
                style = style.add_modifier(Modifier::BOLD);
            }
            if seg.style.italic {
                style = style.add_modifier(Modifier::ITALIC);
            }
            if seg.style.code {
                style = style.fg(Color::LightGreen);
            }
            Span::styled(seg.text, style)
        })
        .collect();

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

/// Split an input value into display rows the same way
/// `InputSurface::cursor_position` counts them.
fn wrap_input(value: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut rows = vec![String::new()];
    let mut col = 0;
    for c in value.chars() {
        if c == '\n' {
            rows.push(String::new());
            col = 0;
            continue;
        }
        if let Some(row) = rows.last_mut() {
            row.push(c);
        }
        col += 1;
        if col == width {
            rows.push(String::new());
            col = 0;
        }
    }
    rows
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    if app.controller.panel_visible() {
        render_chat_view(app, frame, body_area);
    } else {
        app.chat_area = None;
        render_landing_view(app, frame, body_area);
    }

    render_footer(app, frame, footer_area);

    if app.show_clear_confirm {
        render_clear_confirm(frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let status = match &app.backend_status {
        BackendStatus::Checking => {
            Span::styled(" checking backend... ", Style::default().fg(Color::Gray))
        }
        BackendStatus::Healthy(version) => Span::styled(
            match version {
                Some(v) => format!(" backend ok ({}) ", v),
                None => " backend ok ".to_string(),
            },
            Style::default().fg(Color::Green),
        ),
        BackendStatus::Unreachable(reason) => {
            let reason: String = reason.chars().take(40).collect();
            Span::styled(
                format!(" backend unreachable: {} ", reason),
                Style::default().fg(Color::Red),
            )
        }
    };

    let mut spans = vec![
        Span::styled(" Travel Hub Assistant ", Style::default().fg(Color::Cyan).bold()),
        status,
    ];
    if let Some(session) = app.controller.session_id() {
        spans.push(Span::styled(
            format!(" session {} ", session),
            Style::default().fg(Color::Gray),
        ));
    }
    spans.push(Span::styled(
        format!("v{}", env!("CARGO_PKG_VERSION")),
        Style::default().fg(Color::Gray),
    ));

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    if let Some(notice) = &app.notice {
        let style = match notice.level {
            NoticeLevel::Info => Style::default().fg(Color::Green),
            NoticeLevel::Warning => Style::default().fg(Color::Yellow),
        };
        frame.render_widget(Paragraph::new(format!(" {}", notice.text)).style(style), area);
        return;
    }

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints = match app.focus {
        Focus::Hero | Focus::Bottom if app.controller.is_pending() => vec![
            Span::styled(" Esc ", key_style),
            Span::styled(" cancel ", label_style),
        ],
        Focus::Hero | Focus::Bottom => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Shift+Enter ", key_style),
            Span::styled(" newline ", label_style),
        ],
        Focus::Suggestions => vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" nav ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" ask ", label_style),
        ],
        Focus::Transcript => vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" g/G ", key_style),
            Span::styled(" top/bottom ", label_style),
            Span::styled(" i ", key_style),
            Span::styled(" type ", label_style),
        ],
    };

    hints.extend([
        Span::styled(" Tab ", key_style),
        Span::styled(" focus ", label_style),
    ]);
    if app.controller.panel_visible() {
        hints.extend([
            Span::styled(" ^L ", key_style),
            Span::styled(" clear ", label_style),
            Span::styled(" ^E ", key_style),
            Span::styled(" export ", label_style),
        ]);
    }
    hints.extend([
        Span::styled(" ^C ", key_style),
        Span::styled(" quit ", label_style),
    ]);

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}

/// Height an input needs for its current value, borders included
fn input_height(input: &InputSurface, width: u16) -> u16 {
    input.content_rows(width.saturating_sub(2), MAX_INPUT_ROWS) + 2
}

fn render_landing_view(app: &mut App, frame: &mut Frame, area: Rect) {
    let hero_height = input_height(app.controller.surface(SurfaceKind::Hero), area.width);
    let [intro_area, hero_area, suggestions_area, _] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(hero_height),
        Constraint::Length(SUGGESTIONS.len() as u16 + 2),
        Constraint::Min(0),
    ])
    .areas(area);

    let intro = Text::from(vec![
        Line::default(),
        Line::from(Span::styled(
            "Ask about airlines, hotels, travel packages and customer reviews.",
            Style::default().fg(Color::Gray),
        )),
    ]);
    frame.render_widget(Paragraph::new(intro).wrap(Wrap { trim: true }), intro_area);

    render_input(app, frame, hero_area, SurfaceKind::Hero);

    let focused = app.focus == Focus::Suggestions;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Try asking ");

    let items: Vec<ListItem> = SUGGESTIONS.iter().map(|s| ListItem::new(format!(" {} ", s))).collect();
    let mut list = List::new(items).block(block);
    if focused {
        list = list
            .highlight_style(
                Style::default()
                    .bg(Color::Blue)
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");
    }

    let list_area = match app.stats {
        Some(stats) => {
            let [list_area, stats_area] = Layout::horizontal([
                Constraint::Min(0),
                Constraint::Length(22),
            ])
            .areas(suggestions_area);
            render_stats(stats, frame, stats_area);
            list_area
        }
        None => suggestions_area,
    };

    frame.render_stateful_widget(list, list_area, &mut app.suggestion_state);
}

fn render_stats(stats: DomainStats, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Records ");

    let lines: Vec<Line> = stats
        .entries()
        .into_iter()
        .map(|(label, count)| {
            Line::from(vec![
                Span::styled(format!(" {:<10}", label), Style::default().fg(Color::Gray)),
                Span::styled(format!("{:>7}", count), Style::default().fg(Color::Cyan)),
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_chat_view(app: &mut App, frame: &mut Frame, area: Rect) {
    let hero_height = input_height(app.controller.surface(SurfaceKind::Hero), area.width);
    let bottom_height = input_height(app.controller.surface(SurfaceKind::Bottom), area.width);
    let [hero_area, chat_area, bottom_area] = Layout::vertical([
        Constraint::Length(hero_height),
        Constraint::Min(3),
        Constraint::Length(bottom_height),
    ])
    .areas(area);

    render_input(app, frame, hero_area, SurfaceKind::Hero);
    render_transcript(app, frame, chat_area);
    render_input(app, frame, bottom_area, SurfaceKind::Bottom);
}

/// The transcript as one unbordered paragraph. Rendering and scroll
/// bounds both go through here so they agree on wrapped line counts.
pub fn transcript_paragraph(app: &App) -> Paragraph<'static> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    for entry in app.controller.transcript().entries() {
        match &entry.body {
            EntryBody::Message(msg) => {
                let (label_color, text_style) = match msg.role {
                    ChatRole::User => (Color::Cyan, Style::default()),
                    ChatRole::Bot if msg.error => (Color::Red, Style::default().fg(Color::Red)),
                    ChatRole::Bot => (Color::Yellow, Style::default()),
                };
                let label = match msg.role {
                    ChatRole::User => "You:",
                    ChatRole::Bot => BOT_LABEL,
                };
                lines.push(Line::from(Span::styled(
                    label,
                    Style::default().fg(label_color).add_modifier(Modifier::BOLD),
                )));
                for segments in format::to_lines(&msg.content) {
                    lines.push(segments_to_line(segments, text_style));
                }
            }
            EntryBody::TypingIndicator => {
                lines.push(Line::from(Span::styled(
                    BOT_LABEL,
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )));
                // Animated ellipsis: cycles through ".", "..", "..."
                let dots = ".".repeat((app.animation_frame as usize) + 1);
                lines.push(Line::from(Span::styled(
                    format!("Thinking{}", dots),
                    Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
                )));
            }
        }
        lines.push(Line::default());
    }

    Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false })
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store chat area for mouse hit-testing and its inner size for scroll calculations
    app.chat_area = Some(area);
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);
    if app.follow_tail {
        app.scroll_chat_to_bottom();
    }

    let focused = app.focus == Focus::Transcript;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Conversation ");

    let chat = transcript_paragraph(app)
        .block(block)
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect, kind: SurfaceKind) {
    let input = app.controller.surface(kind);
    let focused = app.focus == Focus::from(kind);

    let border_color = if !input.is_enabled() {
        Color::DarkGray
    } else if focused {
        Color::Yellow
    } else {
        Color::Gray
    };
    let title = if input.is_enabled() {
        match kind {
            SurfaceKind::Hero => " Ask ",
            SurfaceKind::Bottom => " Message ",
        }
    } else {
        " Waiting for response... "
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let inner_width = area.width.saturating_sub(2);
    let inner_height = area.height.saturating_sub(2).max(1);
    let (cursor_row, cursor_col) = input.cursor_position(inner_width);

    // Keep the cursor row visible
    let scroll_offset = if cursor_row >= inner_height {
        cursor_row - inner_height + 1
    } else {
        0
    };

    let paragraph = if input.value().is_empty() {
        Paragraph::new(Span::styled(
            input.placeholder(),
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let text_style = if input.is_enabled() {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let rows: Vec<Line> = wrap_input(input.value(), inner_width as usize)
            .into_iter()
            .map(Line::from)
            .collect();
        Paragraph::new(Text::from(rows))
            .style(text_style)
            .scroll((scroll_offset, 0))
    };

    frame.render_widget(paragraph.block(block), area);

    if focused && input.is_enabled() && !app.show_clear_confirm {
        frame.set_cursor_position((
            area.x + 1 + cursor_col,
            area.y + 1 + cursor_row - scroll_offset,
        ));
    }
}

fn render_clear_confirm(frame: &mut Frame, area: Rect) {
    let popup_width = 44.min(area.width.saturating_sub(4));
    let popup_height = 5;

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Clear conversation ");

    let text = Text::from(vec![
        Line::from("Clear the whole conversation?"),
        Line::default(),
        Line::from(vec![
            Span::styled(" y ", Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(" yes   "),
            Span::styled(" n ", Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(" no"),
        ]),
    ]);

    frame.render_widget(Paragraph::new(text).block(block), popup_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use hubchat_core::{ChatClient, ClientError, DomainStats, RawReply};
    use ratatui::{backend::TestBackend, Terminal};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn test_app() -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        let client = ChatClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        App::new(client, tx)
    }

    fn draw(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 30)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();
        let buffer = terminal.backend().buffer();
        let mut screen = String::new();
        for row in buffer.content.chunks(buffer.area.width as usize) {
            for cell in row {
                screen.push_str(cell.symbol());
            }
            screen.push('\n');
        }
        screen
    }

    #[test]
    fn test_wrap_input_matches_cursor_rows() {
        assert_eq!(wrap_input("abcdef", 4), vec!["abcd", "ef"]);
        assert_eq!(wrap_input("ab\ncd", 10), vec!["ab", "cd"]);
        assert_eq!(wrap_input("", 5), vec![""]);
    }

    #[test]
    fn test_segments_keep_styles() {
        let line = segments_to_line(format::to_lines("**a** b").remove(0), Style::default());
        assert_eq!(line.spans[0].content, "a");
        assert!(line.spans[0].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(line.spans[1].content, " b");
    }

    #[test]
    fn test_landing_view_lists_suggestions() {
        let mut app = test_app();
        let screen = draw(&mut app);
        assert!(screen.contains("Try asking"));
        assert!(screen.contains(SUGGESTIONS[0]));
        assert!(!screen.contains("Conversation"));
    }

    #[test]
    fn test_chat_view_shows_typing_indicator_then_reply() {
        let mut app = test_app();
        app.controller.begin_send_text(SurfaceKind::Hero, "hello there");
        let screen = draw(&mut app);
        assert!(screen.contains("Conversation"));
        assert!(screen.contains("hello there"));
        assert!(screen.contains("Thinking"));
        assert!(screen.contains("Waiting for response"));

        app.on_reply(Ok(RawReply {
            status: 200,
            body: r#"{"response":"**Top** airline"}"#.to_string(),
        }));
        let screen = draw(&mut app);
        assert!(!screen.contains("Thinking"));
        assert!(screen.contains("Top airline"));
        assert!(!screen.contains("**"));
    }

    #[test]
    fn test_error_reply_is_rendered() {
        let mut app = test_app();
        app.controller.begin_send_text(SurfaceKind::Bottom, "hi");
        app.on_reply(Err(ClientError::Status(502)));
        let screen = draw(&mut app);
        assert!(screen.contains("Error:"));
    }

    fn long_reply(tag: usize) -> RawReply {
        let words: Vec<String> = ('a'..='j').map(|c| c.to_string().repeat(50)).collect();
        RawReply {
            status: 200,
            body: format!(r#"{{"response":"{} END{}"}}"#, words.join(" "), tag),
        }
    }

    #[test]
    fn test_newest_long_reply_is_fully_visible() {
        let mut app = test_app();
        for i in 0..3 {
            app.controller.begin_send_text(SurfaceKind::Bottom, &format!("question {}", i));
            draw(&mut app);
            app.on_reply(Ok(long_reply(i)));
        }

        let screen = draw(&mut app);
        assert!(screen.contains("END2"));
    }

    #[test]
    fn test_reply_is_visible_after_scrolling_up_while_waiting() {
        let mut app = test_app();
        for i in 0..2 {
            app.controller.begin_send_text(SurfaceKind::Bottom, &format!("question {}", i));
            app.on_reply(Ok(long_reply(i)));
        }
        app.controller.begin_send_text(SurfaceKind::Bottom, "question 2");
        draw(&mut app);
        app.scroll_chat_to_top();
        draw(&mut app);

        app.on_reply(Ok(long_reply(2)));
        let screen = draw(&mut app);
        assert!(screen.contains("END2"));
    }

    #[test]
    fn test_landing_view_shows_record_counts() {
        let mut app = test_app();
        app.stats = Some(DomainStats {
            flights: 1000,
            hotels: 500,
            packages: 300,
            reviews: 800,
        });
        let screen = draw(&mut app);
        assert!(screen.contains("Records"));
        assert!(screen.contains("Flights"));
        assert!(screen.contains("1000"));
        assert!(screen.contains(SUGGESTIONS[0]));
    }

    #[test]
    fn test_clear_popup_is_drawn() {
        let mut app = test_app();
        app.controller.begin_send_text(SurfaceKind::Hero, "hi");
        app.show_clear_confirm = true;
        let screen = draw(&mut app);
        assert!(screen.contains("Clear the whole conversation?"));
    }
}
