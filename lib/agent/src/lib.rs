//! Agent invocation plumbing for the runforge platform.
//!
//! The LLM agent core sits behind the [`AgentCore`] trait; this crate
//! owns everything around one invocation: model resolution, ordered
//! event forwarding into the journal, cancellation, timeouts, and a
//! scripted agent for tests.

pub mod core;
pub mod driver;
pub mod echo;
pub mod error;
pub mod event;
pub mod scripted;
pub mod selector;
pub mod sink;

pub use core::{AgentCore, AgentRequest, AgentRunResult, ModelSource};
pub use driver::{AgentDriver, PhaseTimeouts};
pub use echo::EchoAgent;
pub use error::{AgentError, SelectorError};
pub use event::{AgentEvent, AgentEventKind};
pub use scripted::{ScriptedAgent, ScriptedAttempt};
pub use selector::{ModelChoice, ModelSelector};
pub use sink::EventSink;
