//! # scriptcast-server
//!
//! Server side of the scriptcast system: accepts connections, runs
//! the per-connection upload state machine, orchestrates script
//! execution, and streams screen output back through the core
//! protocol.

pub mod capability;
pub mod config;
pub mod executor;
pub mod host;
pub mod runtime;
pub mod session;

pub use capability::{CapabilityArgs, CapabilityTable, CapabilityValue, ScriptValue};
pub use config::ServerConfig;
pub use executor::{ExecutionRequest, Orchestrator};
pub use host::SessionHost;
pub use runtime::{AssistantClient, AudioPlayer, ProcessRuntime, ScriptRuntime};
pub use session::Session;
