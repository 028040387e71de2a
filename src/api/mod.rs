//! Runtime units of the monitor
//!
//! The wireless link state machine, the posture sensing loop, and the
//! orchestrator that runs both concurrently around one shared balance slot.

pub mod link;
pub mod orchestrator;
pub mod sensing;
pub mod types;

pub use link::{LinkState, LinkStateMachine};
pub use orchestrator::Orchestrator;
pub use sensing::PostureSensingLoop;
pub use types::{
    shutdown_channel, LinkStats, RunReport, SensingExit, SensingSummary, ShutdownSignal, ShutdownTrigger,
};
