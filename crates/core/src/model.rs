//! Token source traits: the abstraction over generative model backends.
//!
//! The engine never sees a vendor request or response shape. A
//! [`ModelClient`] opens one [`TokenSource`] per turn, and the turn processor
//! pulls text chunks from it until it ends, fails, or is cancelled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TokenSourceError;
use crate::message::Message;

/// Everything a model backend needs to start one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRequest {
    /// System instruction for this turn (may differ turn to turn)
    pub system_instruction: String,

    /// Full conversation history so far
    pub messages: Vec<Message>,
}

/// An incremental stream of model text.
///
/// `None` from [`next_chunk`](TokenSource::next_chunk) is the terminal
/// "done" signal. Sources that can stop generation early report it through
/// [`can_cancel`](TokenSource::can_cancel); the turn processor only relies
/// on early exit when it is supported.
#[async_trait]
pub trait TokenSource: Send {
    /// Await the next chunk of text.
    async fn next_chunk(&mut self) -> Option<std::result::Result<String, TokenSourceError>>;

    /// Whether [`cancel`](TokenSource::cancel) actually stops generation.
    fn can_cancel(&self) -> bool {
        false
    }

    /// Release the source; no further chunks are wanted.
    fn cancel(&mut self) {}
}

/// A model backend that can open a token stream for a turn.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// A human-readable name for this backend (for logs).
    fn name(&self) -> &str;

    /// Start generating for the given request.
    async fn open(
        &self,
        request: TurnRequest,
    ) -> std::result::Result<Box<dyn TokenSource>, TokenSourceError>;
}
