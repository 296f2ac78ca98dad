//! Chat controller: owns the transcript and both input surfaces, and
//! drives the send and clear lifecycles.
//!
//! A send is split in two so an event loop can run the request on its
//! own task: [`ChatController::begin_send`] does everything up to the
//! request and hands back an [`OutgoingMessage`];
//! [`ChatController::finish_send`] takes the request's result and
//! renders exactly one outcome. [`ChatController::handle_message`]
//! runs both with a request in between.

use tokio_util::sync::CancellationToken;

use crate::api::{ChatClient, RawReply, ReplyOutcome};
use crate::error::ClientError;
use crate::input::{InputSurface, SurfaceKind, SUGGESTIONS};
use crate::state::{ChatMessage, ChatRole, EntryId, Transcript};

pub const PROCESSING_TEXT: &str = "Processing your request...";
pub const UNEXPECTED_FORMAT_TEXT: &str = "Unexpected response format";
pub const NO_DETAILS_TEXT: &str = "No additional details";

const HERO_PLACEHOLDER: &str = "Ask about flights, hotels, packages or reviews...";
const BOTTOM_PLACEHOLDER: &str = "Type your message...";

#[derive(Debug)]
struct PendingSend {
    surface: SurfaceKind,
    typing: EntryId,
    placeholder: EntryId,
    cancel: CancellationToken,
    /// Conversation was cleared while the request was in flight
    stale: bool,
}

/// A message ready to be posted to the backend
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub text: String,
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    Declined,
    Cleared { backend_synced: bool },
}

#[derive(Debug)]
pub struct ChatController {
    transcript: Transcript,
    hero: InputSurface,
    bottom: InputSurface,
    panel_visible: bool,
    pending: Option<PendingSend>,
    session_id: Option<String>,
}

impl Default for ChatController {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatController {
    pub fn new() -> Self {
        let mut hero = InputSurface::new(SurfaceKind::Hero, HERO_PLACEHOLDER);
        hero.set_focused(true);
        Self {
            transcript: Transcript::new(),
            hero,
            bottom: InputSurface::new(SurfaceKind::Bottom, BOTTOM_PLACEHOLDER),
            panel_visible: false,
            pending: None,
            session_id: None,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn surface(&self, kind: SurfaceKind) -> &InputSurface {
        match kind {
            SurfaceKind::Hero => &self.hero,
            SurfaceKind::Bottom => &self.bottom,
        }
    }

    pub fn surface_mut(&mut self, kind: SurfaceKind) -> &mut InputSurface {
        match kind {
            SurfaceKind::Hero => &mut self.hero,
            SurfaceKind::Bottom => &mut self.bottom,
        }
    }

    pub fn focused_surface(&self) -> Option<SurfaceKind> {
        if self.hero.is_focused() {
            Some(SurfaceKind::Hero)
        } else if self.bottom.is_focused() {
            Some(SurfaceKind::Bottom)
        } else {
            None
        }
    }

    pub fn focus(&mut self, kind: SurfaceKind) {
        self.hero.set_focused(kind == SurfaceKind::Hero);
        self.bottom.set_focused(kind == SurfaceKind::Bottom);
    }

    pub fn blur(&mut self) {
        self.hero.set_focused(false);
        self.bottom.set_focused(false);
    }

    pub fn panel_visible(&self) -> bool {
        self.panel_visible
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Start sending whatever is typed into `surface`
    pub fn begin_send(&mut self, surface: SurfaceKind) -> Option<OutgoingMessage> {
        let text = self.surface(surface).value().to_string();
        self.begin_send_text(surface, &text)
    }

    /// Everything that happens before the request goes out.
    ///
    /// Returns `None` without touching any state when the trimmed text is
    /// empty or another send is still in flight.
    pub fn begin_send_text(&mut self, surface: SurfaceKind, text: &str) -> Option<OutgoingMessage> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if self.pending.is_some() {
            tracing::warn!(surface = surface.label(), "Send ignored: a request is already in flight");
            return None;
        }

        if !self.panel_visible {
            tracing::debug!("Revealing chat panel");
            self.panel_visible = true;
        }

        self.transcript.add_message(text, ChatRole::User);

        for input in [&mut self.hero, &mut self.bottom] {
            input.clear();
            input.set_enabled(false);
        }

        let typing = self.transcript.add_typing_indicator();
        let placeholder = self.transcript.add_message(PROCESSING_TEXT, ChatRole::Bot);
        let cancel = CancellationToken::new();

        self.pending = Some(PendingSend {
            surface,
            typing,
            placeholder,
            cancel: cancel.clone(),
            stale: false,
        });

        tracing::info!(surface = surface.label(), chars = text.chars().count(), "Sending chat message");

        Some(OutgoingMessage {
            text: text.to_string(),
            cancel,
        })
    }

    /// Render the result of the in-flight request.
    ///
    /// Returns the id of the outcome message, or `None` if nothing was
    /// pending or the conversation was cleared in the meantime.
    pub fn finish_send(&mut self, result: Result<RawReply, ClientError>) -> Option<EntryId> {
        let Some(pending) = self.pending.take() else {
            tracing::warn!("Reply arrived with no request in flight");
            return None;
        };

        self.transcript.remove_typing_indicator(pending.typing);
        self.transcript.remove(pending.placeholder);

        for input in [&mut self.hero, &mut self.bottom] {
            input.set_enabled(true);
        }
        if pending.stale {
            tracing::debug!("Discarding reply for a cleared conversation");
            self.focus(SurfaceKind::Hero);
            return None;
        }
        self.focus(pending.surface);

        let message = match result {
            Ok(reply) => self.outcome_message(&reply),
            Err(err) => {
                tracing::warn!(error = %err, "Chat request failed");
                transport_error_message(&err)
            }
        };

        Some(self.transcript.push_message(message))
    }

    fn outcome_message(&mut self, reply: &RawReply) -> ChatMessage {
        let outcome = reply.classify();
        tracing::debug!(status = reply.status, outcome = outcome_kind(&outcome), "Chat reply received");

        match outcome {
            ReplyOutcome::Response { text, session_id } => {
                if session_id.is_some() {
                    self.session_id = session_id;
                }
                ChatMessage::bot(text)
            }
            ReplyOutcome::BackendError { error, details } => ChatMessage::bot_error(format!(
                "Error: {}\n\nDetails: {}",
                error,
                details.as_deref().unwrap_or(NO_DETAILS_TEXT)
            )),
            ReplyOutcome::Unrecognized => ChatMessage::bot_error(UNEXPECTED_FORMAT_TEXT),
            ReplyOutcome::Malformed { status, excerpt } => ChatMessage::bot_error(format!(
                "Error: Server returned an invalid response (status {})\n\nResponse: {}",
                status, excerpt
            )),
        }
    }

    /// Cancel the in-flight request, if any. Its result still has to be
    /// passed to [`ChatController::finish_send`].
    pub fn cancel_pending(&self) -> bool {
        match &self.pending {
            Some(pending) if !pending.cancel.is_cancelled() => {
                tracing::info!("Cancelling chat request");
                pending.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Send one message end to end
    pub async fn handle_message(
        &mut self,
        client: &ChatClient,
        surface: SurfaceKind,
        text: &str,
    ) -> Option<EntryId> {
        let outgoing = self.begin_send_text(surface, text)?;
        let result = client.send_chat(&outgoing.text, &outgoing.cancel).await;
        self.finish_send(result)
    }

    /// Put a canned prompt into the hero input and start sending it
    pub fn activate_suggestion(&mut self, index: usize) -> Option<OutgoingMessage> {
        let suggestion = SUGGESTIONS.get(index)?;
        if !self.hero.is_enabled() {
            return None;
        }
        self.hero.set_value(suggestion);
        self.begin_send(SurfaceKind::Hero)
    }

    /// Clear the conversation after `confirm` agrees.
    ///
    /// The local reset happens even when the backend call fails; the
    /// outcome reports whether the backend session was actually cleared.
    pub async fn clear_conversation<F>(&mut self, client: &ChatClient, confirm: F) -> ClearOutcome
    where
        F: FnOnce() -> bool,
    {
        if !confirm() {
            return ClearOutcome::Declined;
        }

        let backend_synced = match client.clear_session().await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to clear backend session");
                false
            }
        };

        self.reset_conversation();
        ClearOutcome::Cleared { backend_synced }
    }

    /// Local half of a clear: empty the transcript, hide the panel, and
    /// return focus to the hero input.
    pub fn reset_conversation(&mut self) {
        if let Some(pending) = self.pending.as_mut() {
            pending.stale = true;
            pending.cancel.cancel();
        }
        self.transcript.clear();
        self.panel_visible = false;
        self.session_id = None;
        self.focus(SurfaceKind::Hero);
        tracing::info!("Conversation cleared");
    }
}

fn transport_error_message(err: &ClientError) -> ChatMessage {
    let chain = err.source_chain();
    if chain.is_empty() {
        ChatMessage::bot_error(format!("Error: {}", err))
    } else {
        ChatMessage::bot_error(format!("Error: {}\n\n{}", err, chain.join("\n")))
    }
}

fn outcome_kind(outcome: &ReplyOutcome) -> &'static str {
    match outcome {
        ReplyOutcome::Response { .. } => "response",
        ReplyOutcome::BackendError { .. } => "backend_error",
        ReplyOutcome::Unrecognized => "unrecognized",
        ReplyOutcome::Malformed { .. } => "malformed",
    }
}
