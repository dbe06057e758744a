//! # nexus-core
//!
//! Session engine for Nexus Monitor, the live tracker for two-person
//! infiltration missions.
//!
//! This crate owns every piece of session state and is transport-agnostic.
//! It is used by:
//! - the HTTP/WebSocket server (`nexus-http`)
//! - the daemon binary (`nexus-daemon`)
//!
//! ## Key Concepts
//!
//! - **Session**: one team's live mission, keyed by a client-supplied id
//! - **CompletedRecord**: the frozen session plus its scored performance
//! - **SessionEvent**: a state change fanned out to every subscriber

pub mod analytics;
pub mod config;
pub mod context;
pub mod event_bus;
pub mod leaderboard;
pub mod mission;
pub mod monitors;
pub mod persistence;
pub mod scoring;
pub mod session;

// Re-export commonly used types
pub use context::EngineContext;
pub use event_bus::{EventBus, SessionEvent};
pub use session::{RegistryError, Session, SessionKey, SessionRegistry};
