//! EngineContext - the shared state every Nexus interface works against.
//!
//! The HTTP server and the daemon only hold an `EngineContext`; all session
//! logic lives behind it in this crate.
//!
//! ```text
//!                 ┌──────────────────────────┐
//!                 │       EngineContext      │
//!                 ├──────────────────────────┤
//!                 │  - SessionRegistry       │
//!                 │  - EventBus              │
//!                 │  - AnalyticsCache        │
//!                 │  - SessionStore          │
//!                 └────────────┬─────────────┘
//!                              │
//!              ┌───────────────┼───────────────┐
//!              ▼               ▼               ▼
//!       ┌─────────────┐ ┌─────────────┐ ┌─────────────┐
//!       │ REST routes │ │  WebSocket  │ │  Monitors   │
//!       └─────────────┘ └─────────────┘ └─────────────┘
//! ```

use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use crate::analytics::AnalyticsCache;
use crate::config::EngineConfig;
use crate::event_bus::{event_channel, spawn_dispatcher, EventBus, EventReceiver};
use crate::mission::ObjectiveCatalog;
use crate::monitors;
use crate::persistence::{NullStore, SessionStore, StoreError};
use crate::session::{Clock, SessionRegistry};

/// Configuration for building an EngineContext.
#[derive(Default)]
pub struct EngineContextBuilder {
    config: Option<EngineConfig>,
    catalog: Option<Arc<ObjectiveCatalog>>,
    event_bus: Option<Arc<EventBus>>,
    clock: Option<Arc<dyn Clock>>,
    store: Option<Arc<dyn SessionStore>>,
}

impl EngineContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a custom objective catalog instead of the standard nine.
    pub fn catalog(mut self, catalog: Arc<ObjectiveCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Use an existing EventBus (for testing or custom configurations).
    pub fn event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> EngineContext {
        let config = self.config.unwrap_or_default();
        let catalog = self
            .catalog
            .unwrap_or_else(|| Arc::new(ObjectiveCatalog::standard()));
        let event_bus = self.event_bus.unwrap_or_else(|| Arc::new(EventBus::new()));
        let store = self.store.unwrap_or_else(|| Arc::new(NullStore));

        let (sender, receiver) = event_channel();
        let mut registry =
            SessionRegistry::new(&config, Arc::clone(&catalog), sender).with_store(Arc::clone(&store));
        if let Some(clock) = self.clock {
            registry = registry.with_clock(clock);
        }

        EngineContext {
            config,
            catalog,
            registry: Arc::new(registry),
            event_bus,
            analytics: Arc::new(AnalyticsCache::new()),
            store,
            pending_events: Arc::new(Mutex::new(Some(receiver))),
        }
    }
}

/// Central shared state. Cloning copies the handles, not the data.
#[derive(Clone)]
pub struct EngineContext {
    pub config: EngineConfig,
    pub catalog: Arc<ObjectiveCatalog>,
    pub registry: Arc<SessionRegistry>,
    pub event_bus: Arc<EventBus>,
    /// Latest aggregator output. Readers never trigger a recompute.
    pub analytics: Arc<AnalyticsCache>,
    store: Arc<dyn SessionStore>,
    /// Registry-side end of the event channel, held until the dispatcher starts.
    pending_events: Arc<Mutex<Option<EventReceiver>>>,
}

impl EngineContext {
    pub fn builder() -> EngineContextBuilder {
        EngineContextBuilder::new()
    }

    /// Seed the registry's history from the store. Returns how many records were loaded.
    pub fn restore_from_store(&self) -> Result<usize, StoreError> {
        let records = self.store.load_completed()?;
        let count = records.len();
        self.registry.restore_history(records);
        Ok(count)
    }

    /// Spawn the event dispatcher, the reaper and the analytics aggregator.
    ///
    /// Must be called from inside a tokio runtime. Only the first call starts
    /// anything; later calls return an empty task set.
    pub fn start_background(&self) -> BackgroundTasks {
        let receiver = self
            .pending_events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(receiver) = receiver else {
            log::warn!("Background tasks already started");
            return BackgroundTasks::default();
        };

        let handles = vec![
            spawn_dispatcher(receiver, Arc::clone(&self.event_bus)),
            monitors::spawn_reaper(
                Arc::clone(&self.registry),
                self.config.reaper_interval,
                self.config.inactivity_threshold,
            ),
            monitors::spawn_analytics(
                Arc::clone(&self.registry),
                Arc::clone(&self.analytics),
                self.config.analytics_interval,
            ),
        ];
        BackgroundTasks { handles }
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Handles to the tasks started by [`EngineContext::start_background`].
#[derive(Default)]
pub struct BackgroundTasks {
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Abort every task.
    pub fn shutdown(self) {
        for handle in self.handles {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::SessionEvent;
    use crate::mission::{AgentRole, DifficultyMode};
    use crate::persistence::JsonlStore;
    use crate::scoring::PerformanceInputs;
    use crate::session::{SessionKey, SessionStart};
    use std::time::Duration;

    fn start_req(key: &str) -> SessionStart {
        SessionStart {
            key: SessionKey::new(key),
            team_name: "Night Owls".to_string(),
            role: AgentRole::Hacker,
            agent_color: "#00E5FF".to_string(),
            difficulty: DifficultyMode::Tactical,
        }
    }

    #[test]
    fn builder_creates_context_with_defaults() {
        let ctx = EngineContext::builder().build();
        assert_eq!(ctx.config, EngineConfig::default());
        assert_eq!(ctx.catalog.len(), 9);
        assert_eq!(ctx.registry.active_count(), 0);
    }

    #[test]
    fn builder_uses_provided_event_bus() {
        let bus = Arc::new(EventBus::new());
        let ctx = EngineContext::builder().event_bus(Arc::clone(&bus)).build();
        assert!(Arc::ptr_eq(&ctx.event_bus, &bus));
    }

    #[test]
    fn context_is_cheaply_clonable() {
        let ctx = EngineContext::default();
        let ctx2 = ctx.clone();
        assert!(Arc::ptr_eq(&ctx.registry, &ctx2.registry));
        assert!(Arc::ptr_eq(&ctx.analytics, &ctx2.analytics));
    }

    #[test]
    fn restore_from_store_loads_history() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn SessionStore> = Arc::new(JsonlStore::open(dir.path()).unwrap());

        let first = EngineContext::builder().store(Arc::clone(&store)).build();
        first.registry.start(start_req("a")).unwrap();
        first
            .registry
            .complete(&SessionKey::new("a"), &PerformanceInputs::default())
            .unwrap();

        let second = EngineContext::builder().store(store).build();
        assert_eq!(second.restore_from_store().unwrap(), 1);
        assert_eq!(second.registry.history(), first.registry.history());
    }

    #[tokio::test]
    async fn background_dispatcher_delivers_registry_events() {
        let ctx = EngineContext::default();
        let mut subscription = ctx.event_bus.subscribe();
        let tasks = ctx.start_background();
        assert_eq!(tasks.len(), 3);

        ctx.registry.start(start_req("a")).unwrap();
        let event = tokio::time::timeout(Duration::from_secs(1), subscription.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, SessionEvent::SessionStarted { .. }));

        tasks.shutdown();
    }

    #[tokio::test]
    async fn background_starts_only_once() {
        let ctx = EngineContext::default();
        let first = ctx.start_background();
        let second = ctx.clone().start_background();
        assert!(!first.is_empty());
        assert!(second.is_empty());
        first.shutdown();
    }
}
