//! # CampusPilot Core
//!
//! Domain types, collaborator traits, and error definitions for the CampusPilot
//! assistant engine. This crate has **no orchestration logic**; it defines the
//! vocabulary that the agent crate drives and that host applications implement.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here:
//! - [`ModelClient`] / [`TokenSource`]: where model text comes from
//! - [`ToolHandler`]: what a named tool does when the model asks for it
//! - [`EventSink`]: where progress and answers are pushed for the UI
//!
//! Hosts plug concrete implementations in; tests plug scripted ones in.

pub mod error;
pub mod event;
pub mod message;
pub mod model;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result, TokenSourceError, ToolError};
pub use event::{AgentEvent, BroadcastSink, ChannelSink, CollectingSink, EventKind, EventSink, NullSink};
pub use message::{CallerId, ConversationId, Message, Role};
pub use model::{ModelClient, TokenSource, TurnRequest};
pub use tool::{ToolCall, ToolContext, ToolHandler, ToolOutcome, ToolRegistry};
