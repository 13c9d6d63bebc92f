//! Import orchestration services

mod locks;
mod orchestrator;
mod retry;
mod run;
mod sequencer;

pub use locks::{IdentityLocks, IdentityTicket};
pub use orchestrator::ImportOrchestrator;
pub use retry::RetryPolicy;
pub use run::ImportRun;
pub use sequencer::{Release, VersionSequencer};
