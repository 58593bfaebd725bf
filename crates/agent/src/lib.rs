//! The streaming orchestration core of CampusPilot.
//!
//! The model writes prose with lightweight tags in it. This crate turns
//! that stream into conversation state:
//!
//! 1. **Scan** each arriving chunk for complete `<thinking>`, `<answer>`,
//!    `<title>` and `<tool>` regions ([`scanner`])
//! 2. **Emit** thinking and answers to the UI as soon as they close ([`emitter`])
//! 3. **Decode and dispatch** tool regions, feeding results back as history
//!    ([`decoder`], [`dispatcher`])
//! 4. **Repeat** turns until the model answers or the step limit trips
//!    ([`turn`], [`driver`])

pub mod decoder;
pub mod dispatcher;
pub mod driver;
pub mod emitter;
pub mod scanner;
pub mod source;
pub mod turn;

#[cfg(test)]
mod test_helpers;

pub use dispatcher::{Dispatched, ToolDispatcher};
pub use driver::{ConversationDriver, DriverConfig, RunFailure, RunReport, Termination};
pub use emitter::EventEmitter;
pub use scanner::{TagKind, TagRegion};
pub use source::{ChannelTokenSource, StreamTokenSource};
pub use turn::{RunMarkers, ToolScanMode, TurnOutcome, TurnProcessor, TurnResult};
