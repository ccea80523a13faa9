//! State cache
//!
//! Named snapshots of the app's internal state. Each entry is defined once
//! at suite setup with a driver (how to reach the state through the real
//! UI) and a waiter (how to tell the state is visibly there). `populate`
//! drives the real app and captures the live model through the injected
//! helper; `restore` pushes the captured model back and re-runs the same
//! waiter, so populate and restore converge on an observably identical UI
//! state. `navigate_to` bypasses the cache entirely and re-drives the real
//! sequence, for states where caching is unsafe (time-mocking
//! interactions, for one).
//!
//! Entries are process-wide: populated exactly once, read-only afterwards.
//! Restoring before populating and populating twice are both immediate
//! errors — they are suite-ordering bugs, not conditions to paper over.

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info};

use cubedrill_patch::HELPERS_GLOBAL;

use crate::bridge::Driver;
use crate::error::{E2eError, E2eResult};

/// Drive the real app from the start path to this entry's state. The
/// context allows reaching through other cached states.
pub type DriveFn =
    std::sync::Arc<dyn for<'a> Fn(StateContext<'a>) -> BoxFuture<'a, E2eResult<()>> + Send + Sync>;

/// Resolve once the state is visibly on screen.
pub type WaitFn =
    std::sync::Arc<dyn for<'a> Fn(&'a dyn Driver) -> BoxFuture<'a, E2eResult<()>> + Send + Sync>;

/// One named state: how to get there and how to see that you are there
pub struct StateDefinition {
    pub name: String,
    pub drive: DriveFn,
    pub wait: WaitFn,
}

impl StateDefinition {
    pub fn new(name: impl Into<String>, drive: DriveFn, wait: WaitFn) -> Self {
        Self {
            name: name.into(),
            drive,
            wait,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum RecallMode {
    Restore,
    Navigate,
}

/// Handed to a drive function so it can reach other registered states the
/// same way the current operation does: restores recall through the cache,
/// navigations re-drive for real.
pub struct StateContext<'a> {
    pub driver: &'a dyn Driver,
    registry: &'a StateRegistry,
    mode: RecallMode,
}

impl<'a> StateContext<'a> {
    pub fn recall(&self, name: &str) -> BoxFuture<'a, E2eResult<()>> {
        let registry = self.registry;
        let driver = self.driver;
        let mode = self.mode;
        let name = name.to_string();
        Box::pin(async move {
            match mode {
                RecallMode::Restore => registry.restore(&name, driver).await,
                RecallMode::Navigate => registry.navigate_to(&name, driver).await,
            }
        })
    }
}

struct StateEntry {
    definition: StateDefinition,
    snapshot: Mutex<Option<Value>>,
}

/// The process-wide registry of named state caches
pub struct StateRegistry {
    start_path: String,
    entries: Vec<StateEntry>,
}

impl std::fmt::Debug for StateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateRegistry")
            .field("start_path", &self.start_path)
            .field(
                "entries",
                &self
                    .entries
                    .iter()
                    .map(|e| &e.definition.name)
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl StateRegistry {
    /// Register the suite's states. `start_path` must be a path, not a
    /// URL; a dot in it means someone passed a host name by accident.
    pub fn build(start_path: &str, definitions: Vec<StateDefinition>) -> E2eResult<Self> {
        if start_path.contains('.') {
            return Err(cubedrill_common::Error::InvalidConfig(format!(
                "state registry takes a path, not a URL; got `{start_path}`"
            ))
            .into());
        }
        let mut entries: Vec<StateEntry> = Vec::with_capacity(definitions.len());
        for definition in definitions {
            if entries.iter().any(|e| e.definition.name == definition.name) {
                return Err(cubedrill_common::Error::InvalidConfig(format!(
                    "duplicate state name `{}`",
                    definition.name
                ))
                .into());
            }
            entries.push(StateEntry {
                definition,
                snapshot: Mutex::new(None),
            });
        }
        Ok(Self {
            start_path: start_path.to_string(),
            entries,
        })
    }

    fn entry(&self, name: &str) -> E2eResult<&StateEntry> {
        self.entries
            .iter()
            .find(|e| e.definition.name == name)
            .ok_or_else(|| E2eError::UnknownState(name.to_string()))
    }

    pub fn is_populated(&self, name: &str) -> E2eResult<bool> {
        Ok(self.entry(name)?.snapshot.lock().is_some())
    }

    /// Drive the real app to this state and capture the live model.
    pub async fn populate(&self, name: &str, driver: &dyn Driver) -> E2eResult<()> {
        let entry = self.entry(name)?;
        if entry.snapshot.lock().is_some() {
            return Err(E2eError::CacheRepopulated {
                name: name.to_string(),
            });
        }
        info!(state = name, "populating state cache");
        driver.navigate(&self.start_path).await?;
        (entry.definition.drive)(StateContext {
            driver,
            registry: self,
            mode: RecallMode::Restore,
        })
        .await?;
        (entry.definition.wait)(driver).await?;
        let model = driver
            .eval(&format!("window.{HELPERS_GLOBAL}.getModel()"))
            .await?;
        *entry.snapshot.lock() = Some(model);
        Ok(())
    }

    /// Populate every registered entry, in registration order.
    pub async fn populate_all(&self, driver: &dyn Driver) -> E2eResult<()> {
        for entry in &self.entries {
            self.populate(&entry.definition.name, driver).await?;
        }
        Ok(())
    }

    /// Push the captured snapshot into the running app and wait for the
    /// state to visibly appear. Fails before any browser interaction when
    /// the entry was never populated.
    pub async fn restore(&self, name: &str, driver: &dyn Driver) -> E2eResult<()> {
        let entry = self.entry(name)?;
        let snapshot = entry
            .snapshot
            .lock()
            .clone()
            .ok_or_else(|| E2eError::UnpopulatedCache {
                name: name.to_string(),
            })?;
        debug!(state = name, "restoring state from cache");
        let serialized = serde_json::to_string(&snapshot)?;
        driver
            .eval(&format!("window.{HELPERS_GLOBAL}.setModel({serialized})"))
            .await?;
        (entry.definition.wait)(driver).await?;
        Ok(())
    }

    /// Re-drive the real interaction sequence, ignoring the cache.
    pub async fn navigate_to(&self, name: &str, driver: &dyn Driver) -> E2eResult<()> {
        let entry = self.entry(name)?;
        info!(state = name, "navigating to state without cache");
        driver.navigate(&self.start_path).await?;
        (entry.definition.drive)(StateContext {
            driver,
            registry: self,
            mode: RecallMode::Navigate,
        })
        .await?;
        (entry.definition.wait)(driver).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDriver;
    use serde_json::json;
    use std::sync::Arc;

    fn noop_drive() -> DriveFn {
        Arc::new(|_ctx: StateContext<'_>| Box::pin(async { Ok(()) }))
    }

    fn wait_marker(marker: &'static str) -> WaitFn {
        Arc::new(move |driver: &dyn Driver| {
            Box::pin(async move {
                driver.wait_for(marker, crate::bridge::WaitState::Visible, 100).await
            })
        })
    }

    fn registry_with(name: &str) -> StateRegistry {
        StateRegistry::build(
            "/trainer",
            vec![StateDefinition::new(name, noop_drive(), wait_marker("#marker"))],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn restore_before_populate_fails_without_browser_interaction() {
        let registry = registry_with("startPage");
        let driver = FakeDriver::new();
        let err = registry.restore("startPage", &driver).await.unwrap_err();
        assert!(matches!(err, E2eError::UnpopulatedCache { name } if name == "startPage"));
        assert!(driver.commands().is_empty());
    }

    #[tokio::test]
    async fn populate_then_restore_round_trips_the_snapshot() {
        let registry = registry_with("startPage");
        let driver = FakeDriver::new();
        driver.push_eval_result(json!({"screen": "start"}));
        registry.populate("startPage", &driver).await.unwrap();
        assert!(registry.is_populated("startPage").unwrap());

        registry.restore("startPage", &driver).await.unwrap();
        let commands = driver.commands();
        assert_eq!(
            commands,
            vec![
                "navigate /trainer",
                "waitFor #marker",
                "eval window.E2E_TEST_HELPERS.getModel()",
                "eval window.E2E_TEST_HELPERS.setModel({\"screen\":\"start\"})",
                "waitFor #marker",
            ]
        );
    }

    #[tokio::test]
    async fn populating_twice_is_rejected() {
        let registry = registry_with("startPage");
        let driver = FakeDriver::new();
        driver.push_eval_result(json!(1));
        registry.populate("startPage", &driver).await.unwrap();
        let err = registry.populate("startPage", &driver).await.unwrap_err();
        assert!(matches!(err, E2eError::CacheRepopulated { .. }));
    }

    #[tokio::test]
    async fn drives_can_recall_other_states() {
        let deep_drive: DriveFn = Arc::new(|ctx: StateContext<'_>| {
            Box::pin(async move {
                ctx.recall("startPage").await?;
                ctx.driver.click("#go-deeper").await
            })
        });
        let registry = StateRegistry::build(
            "/trainer",
            vec![
                StateDefinition::new("startPage", noop_drive(), wait_marker("#start")),
                StateDefinition::new(
                    "deepPage",
                    deep_drive,
                    wait_marker("#deep"),
                ),
            ],
        )
        .unwrap();

        let driver = FakeDriver::new();
        driver.push_eval_result(json!("start-model"));
        driver.push_eval_result(json!("deep-model"));
        registry.populate_all(&driver).await.unwrap();

        let commands = driver.commands();
        // populating deepPage recalls startPage through the cache
        assert_eq!(
            commands,
            vec![
                "navigate /trainer",
                "waitFor #start",
                "eval window.E2E_TEST_HELPERS.getModel()",
                "navigate /trainer",
                "eval window.E2E_TEST_HELPERS.setModel(\"start-model\")",
                "waitFor #start",
                "click #go-deeper",
                "waitFor #deep",
                "eval window.E2E_TEST_HELPERS.getModel()",
            ]
        );
    }

    #[test]
    fn url_like_start_paths_are_rejected() {
        let err = StateRegistry::build("example.com/trainer", vec![]).unwrap_err();
        assert!(matches!(err, E2eError::Config(_)));
    }

    #[tokio::test]
    async fn unknown_state_names_error() {
        let registry = registry_with("startPage");
        let driver = FakeDriver::new();
        let err = registry.populate("nope", &driver).await.unwrap_err();
        assert!(matches!(err, E2eError::UnknownState(_)));
    }

    #[tokio::test]
    async fn navigate_to_ignores_the_cache() {
        let registry = registry_with("startPage");
        let driver = FakeDriver::new();
        // never populated; navigation still works
        registry.navigate_to("startPage", &driver).await.unwrap();
        assert_eq!(driver.commands(), vec!["navigate /trainer", "waitFor #marker"]);
    }
}
