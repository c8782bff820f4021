pub mod aggregate;
pub mod classify;
pub mod cleanup;
pub mod engine;
pub mod errors;
pub mod intent;
pub mod ledger;
pub mod logging;
pub mod memory;
pub mod owner;
pub mod session;
pub mod stage;
pub mod sweep_config;
pub mod workflow;

pub use engine::{Collaborators, EngineOptions, EngineState, LaunchMode, WorkflowEngine};
pub use errors::WorkflowError;
pub use intent::{Intent, IntentOutcome};
pub use owner::EngineHandle;
