use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use hubchat_core::{
    ChatClient, ChatController, ClientError, DomainStats, HealthStatus, OutgoingMessage, RawReply,
    SurfaceKind, SUGGESTIONS,
};
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::sync::mpsc::UnboundedSender;

use crate::tui::AppEvent;
use crate::ui;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Hero,
    Suggestions,
    Transcript,
    Bottom,
}

impl Focus {
    pub fn surface(&self) -> Option<SurfaceKind> {
        match self {
            Focus::Hero => Some(SurfaceKind::Hero),
            Focus::Bottom => Some(SurfaceKind::Bottom),
            Focus::Suggestions | Focus::Transcript => None,
        }
    }
}

impl From<SurfaceKind> for Focus {
    fn from(kind: SurfaceKind) -> Self {
        match kind {
            SurfaceKind::Hero => Focus::Hero,
            SurfaceKind::Bottom => Focus::Bottom,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendStatus {
    Checking,
    Healthy(Option<String>),
    Unreachable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
}

/// One-line status message shown in the footer until the next key press
#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub controller: ChatController,
    pub client: ChatClient,
    pub focus: Focus,
    events: UnboundedSender<AppEvent>,

    // Landing view
    pub suggestion_state: ListState,
    pub stats: Option<DomainStats>,

    // Clear confirmation
    pub show_clear_confirm: bool,

    // Status
    pub backend_status: BackendStatus,
    pub notice: Option<Notice>,
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Transcript viewport
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,
    pub follow_tail: bool,

    // Layout areas for mouse hit-testing
    pub chat_area: Option<Rect>,

    pub export_dir: PathBuf,
}

impl App {
    pub fn new(client: ChatClient, events: UnboundedSender<AppEvent>) -> Self {
        let mut suggestion_state = ListState::default();
        suggestion_state.select(Some(0));

        Self {
            should_quit: false,
            controller: ChatController::new(),
            client,
            focus: Focus::Hero,
            events,

            suggestion_state,
            stats: None,

            show_clear_confirm: false,

            backend_status: BackendStatus::Checking,
            notice: None,
            animation_frame: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            follow_tail: true,

            chat_area: None,

            export_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    pub fn set_focus(&mut self, focus: Focus) {
        self.focus = focus;
        match focus.surface() {
            Some(kind) => self.controller.focus(kind),
            None => self.controller.blur(),
        }
    }

    /// Keep our focus in line with whatever the controller focused
    fn sync_focus(&mut self) {
        if let Some(kind) = self.controller.focused_surface() {
            self.focus = Focus::from(kind);
        }
    }

    pub fn cycle_focus(&mut self) {
        let next = if self.controller.panel_visible() {
            match self.focus {
                Focus::Hero => Focus::Transcript,
                Focus::Transcript => Focus::Bottom,
                Focus::Bottom | Focus::Suggestions => Focus::Hero,
            }
        } else {
            match self.focus {
                Focus::Hero => Focus::Suggestions,
                _ => Focus::Hero,
            }
        };
        self.set_focus(next);
    }

    pub fn set_notice(&mut self, level: NoticeLevel, text: impl Into<String>) {
        self.notice = Some(Notice {
            level,
            text: text.into(),
        });
    }

    // Send lifecycle

    pub fn submit(&mut self, kind: SurfaceKind) {
        if let Some(outgoing) = self.controller.begin_send(kind) {
            self.dispatch(outgoing);
        }
    }

    pub fn activate_selected_suggestion(&mut self) {
        let Some(idx) = self.suggestion_state.selected() else {
            return;
        };
        if let Some(outgoing) = self.controller.activate_suggestion(idx) {
            self.set_focus(Focus::Hero);
            self.dispatch(outgoing);
        }
    }

    fn dispatch(&mut self, outgoing: OutgoingMessage) {
        self.follow_tail = true;
        self.animation_frame = 0;
        self.scroll_chat_to_bottom();

        let client = self.client.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = client.send_chat(&outgoing.text, &outgoing.cancel).await;
            let _ = events.send(AppEvent::Reply(result));
        });
    }

    pub fn on_reply(&mut self, result: Result<RawReply, ClientError>) {
        let rendered = self.controller.finish_send(result);
        self.sync_focus();
        // A new outcome always comes into view, even if the user scrolled away
        if rendered.is_some() {
            self.scroll_chat_to_bottom();
        }
    }

    pub fn cancel_pending(&mut self) {
        if self.controller.cancel_pending() {
            self.set_notice(NoticeLevel::Info, "Request cancelled");
        }
    }

    // Clear lifecycle

    /// Ask for confirmation. Also offered with nothing on screen so a
    /// failed backend clear can be retried.
    pub fn request_clear(&mut self) {
        self.show_clear_confirm = true;
    }

    pub fn clear_declined(&mut self) {
        self.show_clear_confirm = false;
    }

    /// Reset locally right away; the backend call reports back later
    pub fn clear_confirmed(&mut self) {
        self.show_clear_confirm = false;
        self.controller.reset_conversation();
        self.set_focus(Focus::Hero);
        self.chat_scroll = 0;
        self.follow_tail = true;

        let client = self.client.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = client.clear_session().await;
            let _ = events.send(AppEvent::ClearDone(result));
        });
    }

    pub fn on_clear_done(&mut self, result: Result<(), ClientError>) {
        if let Err(err) = result {
            tracing::warn!(error = %err, "Backend session was not cleared");
            self.set_notice(
                NoticeLevel::Warning,
                format!("Server session may not have been cleared: {}", err),
            );
        }
    }

    // Health check

    pub fn check_health(&mut self) {
        self.backend_status = BackendStatus::Checking;
        let client = self.client.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = client.health().await;
            let _ = events.send(AppEvent::Health(result));
        });
    }

    pub fn on_health(&mut self, result: Result<HealthStatus, ClientError>) {
        self.backend_status = match result {
            Ok(health) => {
                tracing::info!(status = %health.status, "Backend health check passed");
                BackendStatus::Healthy(health.version)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Backend health check failed");
                BackendStatus::Unreachable(err.to_string())
            }
        };
    }

    // Landing stats

    pub fn load_stats(&mut self) {
        let client = self.client.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = client.stats().await;
            let _ = events.send(AppEvent::Stats(result));
        });
    }

    pub fn on_stats(&mut self, result: Result<DomainStats, ClientError>) {
        match result {
            Ok(stats) => self.stats = Some(stats),
            Err(err) => {
                tracing::warn!(error = %err, "Could not load data stats");
                self.stats = None;
            }
        }
    }

    // Export

    pub fn export_transcript(&mut self) {
        match write_transcript_html(&self.export_dir, &self.controller.transcript().to_html()) {
            Ok(path) => {
                tracing::info!(path = %path.display(), "Transcript exported");
                self.set_notice(NoticeLevel::Info, format!("Saved {}", path.display()));
            }
            Err(err) => {
                tracing::warn!(error = %err, "Transcript export failed");
                self.set_notice(NoticeLevel::Warning, format!("Export failed: {}", err));
            }
        }
    }

    // Suggestions

    pub fn suggestion_nav_down(&mut self) {
        let i = match self.suggestion_state.selected() {
            Some(i) => (i + 1).min(SUGGESTIONS.len().saturating_sub(1)),
            None => 0,
        };
        self.suggestion_state.select(Some(i));
    }

    pub fn suggestion_nav_up(&mut self) {
        let i = self.suggestion_state.selected().unwrap_or(0).saturating_sub(1);
        self.suggestion_state.select(Some(i));
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.controller.transcript().has_typing_indicator() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Transcript scrolling

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_tail = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.max_chat_scroll();
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max);
        self.follow_tail = self.chat_scroll >= max;
    }

    pub fn scroll_half_page_down(&mut self) {
        self.scroll_down((self.chat_height / 2).max(1));
    }

    pub fn scroll_half_page_up(&mut self) {
        self.scroll_up((self.chat_height / 2).max(1));
    }

    pub fn scroll_chat_to_top(&mut self) {
        self.chat_scroll = 0;
        self.follow_tail = false;
    }

    /// Scroll so the newest entry is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        self.chat_scroll = self.max_chat_scroll();
        self.follow_tail = true;
    }

    fn max_chat_scroll(&self) -> u16 {
        // Default sizes until the first render reports the real ones
        let visible_height = if self.chat_height > 0 { self.chat_height } else { 20 };
        self.total_chat_lines().saturating_sub(visible_height)
    }

    /// Rows the transcript takes at the chat width, counted by the same
    /// paragraph the renderer draws
    pub fn total_chat_lines(&self) -> u16 {
        let wrap_width = if self.chat_width > 0 { self.chat_width } else { 50 };
        ui::transcript_paragraph(self)
            .line_count(wrap_width)
            .min(u16::MAX as usize) as u16
    }
}

fn write_transcript_html(dir: &Path, fragment: &str) -> Result<PathBuf> {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let path = dir.join(format!("hubchat-transcript-{}.html", stamp));

    let document = format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Chat transcript</title></head>\n<body>\n{}</body>\n</html>\n",
        fragment
    );
    std::fs::create_dir_all(dir)?;
    std::fs::write(&path, document)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn test_app(base_url: &str) -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = ChatClient::new(base_url, Duration::from_secs(5)).unwrap();
        (App::new(client, tx), rx)
    }

    #[tokio::test]
    async fn test_submit_round_trip_through_event_channel() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/api/chat"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_string(r#"{"response":"hello back"}"#),
            )
            .mount(&server)
            .await;

        let (mut app, mut rx) = test_app(&server.uri());
        app.controller.surface_mut(SurfaceKind::Hero).set_value("hello");
        app.submit(SurfaceKind::Hero);
        assert!(app.controller.is_pending());
        assert!(app.controller.transcript().has_typing_indicator());

        match rx.recv().await {
            Some(AppEvent::Reply(result)) => app.on_reply(result),
            other => panic!("unexpected event: {:?}", other),
        }

        assert!(!app.controller.is_pending());
        assert_eq!(
            app.controller.transcript().last_message().unwrap().content,
            "hello back"
        );
        assert_eq!(app.focus, Focus::Hero);
    }

    #[tokio::test]
    async fn test_clear_confirmation_flow() {
        let (mut app, _rx) = test_app("http://127.0.0.1:9");
        app.controller.begin_send_text(SurfaceKind::Hero, "hi");
        app.controller.finish_send(Err(ClientError::Cancelled));

        app.request_clear();
        assert!(app.show_clear_confirm);
        app.clear_declined();
        assert!(!app.show_clear_confirm);
        assert!(app.controller.panel_visible());
        assert!(!app.controller.transcript().is_empty());

        app.request_clear();
        app.clear_confirmed();
        assert!(app.controller.transcript().is_empty());
        assert!(!app.controller.panel_visible());
        assert_eq!(app.focus, Focus::Hero);
    }

    #[tokio::test]
    async fn test_failed_clear_sets_warning() {
        let (mut app, _rx) = test_app("http://127.0.0.1:9");
        app.on_clear_done(Err(ClientError::Status(500)));
        let notice = app.notice.unwrap();
        assert_eq!(notice.level, NoticeLevel::Warning);
        assert!(notice.text.contains("500"));
    }

    #[tokio::test]
    async fn test_cycle_focus_depends_on_panel() {
        let (mut app, _rx) = test_app("http://127.0.0.1:9");
        app.cycle_focus();
        assert_eq!(app.focus, Focus::Suggestions);
        assert_eq!(app.controller.focused_surface(), None);
        app.cycle_focus();
        assert_eq!(app.focus, Focus::Hero);

        app.controller.begin_send_text(SurfaceKind::Hero, "hi");
        app.controller.finish_send(Err(ClientError::Cancelled));
        app.cycle_focus();
        assert_eq!(app.focus, Focus::Transcript);
        app.cycle_focus();
        assert_eq!(app.focus, Focus::Bottom);
        assert_eq!(app.controller.focused_surface(), Some(SurfaceKind::Bottom));
    }

    #[tokio::test]
    async fn test_export_writes_html_file() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _rx) = test_app("http://127.0.0.1:9");
        app.export_dir = dir.path().to_path_buf();
        app.controller.begin_send_text(SurfaceKind::Hero, "<i>tag</i>");

        app.export_transcript();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let html = std::fs::read_to_string(entries[0].as_ref().unwrap().path()).unwrap();
        assert!(html.contains("&lt;i&gt;tag&lt;/i&gt;"));
        assert_eq!(app.notice.unwrap().level, NoticeLevel::Info);
    }

    #[tokio::test]
    async fn test_scroll_follows_tail_until_user_scrolls_up() {
        let (mut app, _rx) = test_app("http://127.0.0.1:9");
        app.chat_height = 4;
        app.chat_width = 40;
        for i in 0..5 {
            app.controller.begin_send_text(SurfaceKind::Bottom, &format!("message {}", i));
            app.on_reply(Ok(RawReply {
                status: 200,
                body: r#"{"response":"ok"}"#.to_string(),
            }));
        }
        assert!(app.follow_tail);
        assert_eq!(app.chat_scroll, app.total_chat_lines() - 4);

        app.scroll_up(2);
        assert!(!app.follow_tail);
        app.scroll_down(100);
        assert!(app.follow_tail);
    }

    #[tokio::test]
    async fn test_reply_scrolls_into_view_after_user_scrolled_up() {
        let (mut app, _rx) = test_app("http://127.0.0.1:9");
        app.chat_height = 4;
        app.chat_width = 40;
        for i in 0..3 {
            app.controller.begin_send_text(SurfaceKind::Bottom, &format!("message {}", i));
            app.on_reply(Ok(RawReply {
                status: 200,
                body: r#"{"response":"ok"}"#.to_string(),
            }));
        }

        app.controller.begin_send_text(SurfaceKind::Bottom, "one more");
        app.scroll_chat_to_top();
        assert!(!app.follow_tail);

        app.on_reply(Ok(RawReply {
            status: 200,
            body: r#"{"response":"latest"}"#.to_string(),
        }));
        assert!(app.follow_tail);
        assert_eq!(app.chat_scroll, app.total_chat_lines() - 4);
    }

    #[tokio::test]
    async fn test_line_count_respects_word_wrapping() {
        let (mut app, _rx) = test_app("http://127.0.0.1:9");
        app.chat_width = 26;
        // 44 chars would fit two rows by length, but no two words share a row
        app.controller.begin_send_text(
            SurfaceKind::Hero,
            "aaaaaaaaaaaaaa bbbbbbbbbbbbbb cccccccccccccc",
        );
        app.controller.finish_send(Err(ClientError::Cancelled));

        // "You:" + 3 wrapped rows + blank, then "Hub:" + "Error: Request cancelled" + blank
        assert_eq!(app.total_chat_lines(), 8);
    }

    #[tokio::test]
    async fn test_clear_can_be_retried_after_backend_failure() {
        let (mut app, _rx) = test_app("http://127.0.0.1:9");
        app.controller.begin_send_text(SurfaceKind::Hero, "hi");
        app.controller.finish_send(Err(ClientError::Cancelled));
        app.request_clear();
        app.clear_confirmed();
        app.on_clear_done(Err(ClientError::Status(503)));
        assert!(app.controller.transcript().is_empty());

        app.request_clear();
        assert!(app.show_clear_confirm);
    }

    #[tokio::test]
    async fn test_stats_arrive_through_event_channel() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/api/stats"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(
                r#"{"flights":1000,"hotels":500,"packages":300,"reviews":800}"#,
            ))
            .mount(&server)
            .await;

        let (mut app, mut rx) = test_app(&server.uri());
        app.load_stats();
        match rx.recv().await {
            Some(AppEvent::Stats(result)) => app.on_stats(result),
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(app.stats.map(|s| s.hotels), Some(500));

        app.on_stats(Err(ClientError::Status(500)));
        assert!(app.stats.is_none());
    }
}
