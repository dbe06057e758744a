//! Session lifecycle: state, the registry that owns it, and history records.
//!
//! A session is born on `start`, mutated by `update`, and dies exactly once,
//! either through `complete` (leaving a [`CompletedRecord`]) or `evict`.

mod clock;
mod record;
mod registry;
mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use record::{CompletedRecord, SessionStatus};
pub use registry::{RegistryError, SessionRegistry, UpdateOutcome};
pub use state::{derive_alerts, Alert, Session, SessionKey, SessionStart, SessionUpdate};
