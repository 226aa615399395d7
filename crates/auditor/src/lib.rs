//! hs-auditor library - exposes the state machine and its backends for testing.

pub mod backend;
pub mod config;
pub mod orchestrator;
pub mod pipeline;
pub mod prompts;

pub use backend::{Backends, BackendError};
pub use config::{AuditConfig, DeploymentMode};
pub use orchestrator::{Orchestrator, RunOutcome};
pub use prompts::PromptSet;
