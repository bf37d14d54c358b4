//! Conversation core for the Cortex chat service.
//!
//! This crate holds the two pieces of the chat service that carry real
//! logic:
//!
//! - [`prompt`] turns a stored conversation into the single text document
//!   sent to the model, keeping only a sliding window of recent turns.
//! - [`completion`] calls the hosted model and, when the service rejects the
//!   structured generation options, retries once with the temperature folded
//!   into the prompt text.
//!
//! [`cortex`] is the concrete transport that talks to Snowflake Cortex
//! through the SQL REST API.

pub mod completion;
pub mod cortex;
pub mod error;
pub mod message;
pub mod models;
pub mod prompt;

pub use completion::{
    CompletionClient, CompletionResponse, CompletionService, FailureKind, GenerationOptions,
    classify_failure,
};
pub use cortex::{CortexSqlService, CortexSqlServiceBuilder};
pub use error::ServiceError;
pub use message::{ConversationSummary, Message, Role, UNTITLED_CONVERSATION};
pub use models::CortexModel;
pub use prompt::{DEFAULT_MAX_TURNS, DEFAULT_SYSTEM_INSTRUCTION, PromptBuilder, build_prompt};
