//! CubeDrill E2E Test Harness
//!
//! This crate drives the trainer web app through a real browser and lets
//! tests jump straight into deep UI states instead of replaying every
//! interaction:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     E2E Harness (Rust)                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ServerHandle       spawn the app's static server            │
//! │  InterceptionProxy  rewrite served HTML/JS in flight         │
//! │    └── cubedrill-patch: helper install + state observers     │
//! │  PageSession        persistent Playwright page, one ordered  │
//! │                     command queue (JSON line protocol)       │
//! │  StateRegistry      named snapshots: populate / restore /    │
//! │                     navigate                                 │
//! │  Clock              deterministic timers: install/tick/jump  │
//! │  elements           page-object DSL over data-testid         │
//! │  scenario           full trainer runs with call tracking     │
//! │  VisualTester       baseline screenshot comparison           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Browser ↔ harness flow: the browser talks to the proxy, the proxy talks
//! to the app server, and every served document/bundle passes through the
//! transformer chains before the browser sees it. All shared registrations
//! (interceptors, state entries) are process-wide and mutable exactly once;
//! the harness assumes serial test execution per process.

pub mod bridge;
pub mod clock;
pub mod elements;
pub mod error;
pub mod proxy;
pub mod scenario;
pub mod server;
pub mod state;
pub mod testing;
pub mod visual;

pub use bridge::{BridgeConfig, Browser, Driver, PageSession, WaitState};
pub use clock::{format_timer, Clock};
pub use elements::{Element, ElementCategory, ElementKind, RootCategory};
pub use error::{E2eError, E2eResult};
pub use proxy::{standard_interception, InterceptionProxy, ProxyConfig};
pub use scenario::{CallTracker, Outcome, ScenarioParams, TrainerElements};
pub use server::{ServerConfig, ServerHandle};
pub use state::{StateDefinition, StateRegistry};
pub use visual::{VisualConfig, VisualTester};
