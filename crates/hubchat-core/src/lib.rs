pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod format;
pub mod input;
pub mod state;

// Re-export main types for convenience
pub use api::{ChatClient, DomainStats, HealthStatus, RawReply, ReplyOutcome};
pub use config::Config;
pub use controller::{ChatController, ClearOutcome, OutgoingMessage};
pub use error::ClientError;
pub use input::{InputSurface, SurfaceKind, SUGGESTIONS};
pub use state::{ChatMessage, ChatRole, Entry, EntryBody, EntryId, Transcript};
