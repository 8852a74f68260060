//! Matrix chat adapter boundary for the EDA triage bot.
//!
//! The orchestration layer talks to chat through the [`MatrixClient`] trait;
//! the reqwest-backed client-server adapter, the pt-BR message templates,
//! and the strict reply-event filters live here.

pub mod error;
pub mod events;
pub mod http;
pub mod templates;

pub use error::MatrixError;
pub use events::{IncomingRoomEvent, PdfOriginEvent, ReplyEvent};
pub use http::{HttpMatrixClient, SyncBatch};

use async_trait::async_trait;

/// Chat transport port used by message flow services and cleanup.
#[async_trait]
pub trait MatrixClient: Send + Sync {
    /// Post a plaintext message; returns the delivered event id.
    async fn send_text(&self, room_id: &str, body: &str) -> Result<String, MatrixError>;

    /// Post a message with an HTML rendition; returns the delivered event id.
    async fn send_formatted(
        &self,
        room_id: &str,
        body: &str,
        formatted_body: &str,
    ) -> Result<String, MatrixError>;

    /// Redact one event in a room.
    async fn redact_event(&self, room_id: &str, event_id: &str) -> Result<(), MatrixError>;

    /// Download media content for an `mxc://` URL.
    async fn download_media(&self, mxc_url: &str) -> Result<Vec<u8>, MatrixError>;
}
