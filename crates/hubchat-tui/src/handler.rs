use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, Focus};
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {
            if app.follow_tail {
                app.scroll_chat_to_bottom();
            }
        }
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Reply(result) => app.on_reply(result),
        AppEvent::ClearDone(result) => app.on_clear_done(result),
        AppEvent::Health(result) => app.on_health(result),
        AppEvent::Stats(result) => app.on_stats(result),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Global keys that work in any mode
    if ctrl && key.code == KeyCode::Char('c') {
        app.should_quit = true;
        return;
    }

    // Any key dismisses the last notice
    app.notice = None;

    if app.show_clear_confirm {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => app.clear_confirmed(),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.clear_declined(),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Char('l') if ctrl => {
            app.request_clear();
            return;
        }
        KeyCode::Char('e') if ctrl => {
            app.export_transcript();
            return;
        }
        KeyCode::Char('r') if ctrl => {
            app.check_health();
            return;
        }
        KeyCode::Char('d') if ctrl => {
            app.scroll_half_page_down();
            return;
        }
        KeyCode::Char('u') if ctrl => {
            app.scroll_half_page_up();
            return;
        }
        KeyCode::Esc if app.controller.is_pending() => {
            app.cancel_pending();
            return;
        }
        KeyCode::Tab | KeyCode::BackTab => {
            app.cycle_focus();
            return;
        }
        KeyCode::PageUp => {
            app.scroll_up(app.chat_height.max(1));
            return;
        }
        KeyCode::PageDown => {
            app.scroll_down(app.chat_height.max(1));
            return;
        }
        _ => {}
    }

    match app.focus {
        Focus::Suggestions => handle_suggestions(app, key),
        Focus::Transcript => handle_transcript(app, key),
        Focus::Hero | Focus::Bottom => handle_input(app, key),
    }
}

fn handle_suggestions(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.suggestion_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.suggestion_nav_up(),
        KeyCode::Enter => app.activate_selected_suggestion(),
        KeyCode::Esc => app.set_focus(Focus::Hero),
        KeyCode::Char('q') => app.should_quit = true,
        _ => {}
    }
}

fn handle_transcript(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::Char('g') | KeyCode::Home => app.scroll_chat_to_top(),
        KeyCode::Char('G') | KeyCode::End => app.scroll_chat_to_bottom(),
        KeyCode::Char('i') | KeyCode::Enter => app.set_focus(Focus::Bottom),
        KeyCode::Char('q') => app.should_quit = true,
        _ => {}
    }
}

fn handle_input(app: &mut App, key: KeyEvent) {
    let Some(kind) = app.focus.surface() else {
        return;
    };

    // Shift/Alt+Enter adds a line; plain Enter sends
    if key.code == KeyCode::Enter {
        if key.modifiers.intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) {
            app.controller.surface_mut(kind).insert_newline();
        } else {
            app.submit(kind);
        }
        return;
    }
    if key.code == KeyCode::Esc {
        if app.controller.panel_visible() {
            app.set_focus(Focus::Transcript);
        }
        return;
    }

    let input = app.controller.surface_mut(kind);
    match key.code {
        KeyCode::Backspace => {
            input.backspace();
        }
        KeyCode::Delete => {
            input.delete();
        }
        KeyCode::Left => input.move_left(),
        KeyCode::Right => input.move_right(),
        KeyCode::Home => input.move_home(),
        KeyCode::End => input.move_end(),
        KeyCode::Char('a') if key.modifiers.contains(KeyModifiers::CONTROL) => input.move_home(),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            input.insert_char(c);
        }
        _ => {}
    }
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventKind, KeyEventState, KeyModifiers, MouseEvent};
    use hubchat_core::{ChatClient, ClientError, SurfaceKind};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn test_app() -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = ChatClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        (App::new(client, tx), rx)
    }

    fn key(code: KeyCode, modifiers: KeyModifiers) -> AppEvent {
        AppEvent::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_event(app, key(KeyCode::Char(c), KeyModifiers::NONE));
        }
    }

    #[tokio::test]
    async fn test_typing_goes_to_focused_surface() {
        let (mut app, _rx) = test_app();
        type_text(&mut app, "hey");
        handle_event(&mut app, key(KeyCode::Backspace, KeyModifiers::NONE));
        assert_eq!(app.controller.surface(SurfaceKind::Hero).value(), "he");
        assert_eq!(app.controller.surface(SurfaceKind::Bottom).value(), "");
    }

    #[tokio::test]
    async fn test_shift_enter_inserts_newline() {
        let (mut app, _rx) = test_app();
        type_text(&mut app, "a");
        handle_event(&mut app, key(KeyCode::Enter, KeyModifiers::SHIFT));
        type_text(&mut app, "b");
        assert_eq!(app.controller.surface(SurfaceKind::Hero).value(), "a\nb");
        assert!(!app.controller.panel_visible());
    }

    #[tokio::test]
    async fn test_enter_sends_and_blocks_typing() {
        let (mut app, _rx) = test_app();
        type_text(&mut app, "hello");
        handle_event(&mut app, key(KeyCode::Enter, KeyModifiers::NONE));

        assert!(app.controller.is_pending());
        assert!(app.controller.panel_visible());
        type_text(&mut app, "more");
        assert_eq!(app.controller.surface(SurfaceKind::Hero).value(), "");
    }

    #[tokio::test]
    async fn test_enter_on_blank_input_does_nothing() {
        let (mut app, _rx) = test_app();
        type_text(&mut app, "   ");
        handle_event(&mut app, key(KeyCode::Enter, KeyModifiers::NONE));
        assert!(!app.controller.is_pending());
        assert!(app.controller.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_ctrl_l_asks_before_clearing() {
        let (mut app, _rx) = test_app();
        app.controller.begin_send_text(SurfaceKind::Hero, "hi");
        handle_event(&mut app, AppEvent::Reply(Err(ClientError::Cancelled)));

        handle_event(&mut app, key(KeyCode::Char('l'), KeyModifiers::CONTROL));
        assert!(app.show_clear_confirm);
        handle_event(&mut app, key(KeyCode::Char('n'), KeyModifiers::NONE));
        assert!(!app.show_clear_confirm);
        assert!(!app.controller.transcript().is_empty());

        handle_event(&mut app, key(KeyCode::Char('l'), KeyModifiers::CONTROL));
        handle_event(&mut app, key(KeyCode::Char('y'), KeyModifiers::NONE));
        assert!(app.controller.transcript().is_empty());
        assert!(!app.controller.panel_visible());
    }

    #[tokio::test]
    async fn test_ctrl_l_on_landing_view_still_asks() {
        let (mut app, _rx) = test_app();
        handle_event(&mut app, key(KeyCode::Char('l'), KeyModifiers::CONTROL));
        assert!(app.show_clear_confirm);
        // Confirmation keys must not leak into the input
        handle_event(&mut app, key(KeyCode::Char('n'), KeyModifiers::NONE));
        assert!(!app.show_clear_confirm);
        assert_eq!(app.controller.surface(SurfaceKind::Hero).value(), "");
    }

    #[tokio::test]
    async fn test_esc_cancels_pending_request() {
        let (mut app, _rx) = test_app();
        type_text(&mut app, "hello");
        handle_event(&mut app, key(KeyCode::Enter, KeyModifiers::NONE));
        handle_event(&mut app, key(KeyCode::Esc, KeyModifiers::NONE));
        assert!(app.notice.is_some());
        // Cancellation only stops the request; the reply still settles the send
        assert!(app.controller.is_pending());
    }

    #[tokio::test]
    async fn test_ctrl_c_quits() {
        let (mut app, _rx) = test_app();
        handle_event(&mut app, key(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_mouse_scroll_outside_chat_is_ignored() {
        let (mut app, _rx) = test_app();
        app.chat_area = Some(Rect::new(0, 5, 40, 10));
        app.chat_scroll = 2;
        let scroll = |row| {
            AppEvent::Mouse(MouseEvent {
                kind: MouseEventKind::ScrollUp,
                column: 1,
                row,
                modifiers: KeyModifiers::NONE,
            })
        };

        handle_event(&mut app, scroll(1));
        assert_eq!(app.chat_scroll, 2);
        handle_event(&mut app, scroll(6));
        assert_eq!(app.chat_scroll, 0);
    }
}
