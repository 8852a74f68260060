//! LLM wire layer for the EDA triage bot.
//!
//! Provider-facing chat-completion client with transient-error retry,
//! deterministic stage clients for runtime validation mode, and the strict
//! v1.1 response schemas for both pipeline stages.

pub mod ai_types;
pub mod client;
pub mod deterministic;
pub mod error;
pub mod schema;

pub use client::{CompletionClient, OpenAiClient};
pub use deterministic::{DeterministicClient, DeterministicStage};
pub use error::LlmError;
pub use schema::{Llm1Response, Llm2Response};
