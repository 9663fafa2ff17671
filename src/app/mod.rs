//! Usage: Host-facing layer (connection orchestration, navigation, logging, wiring).

pub mod bootstrap;
pub mod logging;
pub mod orchestrator;
pub mod user_agent;
