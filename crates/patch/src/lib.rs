//! CubeDrill bundle patching
//!
//! The trainer front end is a compiled bundle whose exact token stream is
//! owned by a third-party compiler and minifier. To capture and restore the
//! application's internal state from tests, this crate rewrites the served
//! bundle in flight:
//!
//! - [`locator`] finds the runtime's state handoff function by structural
//!   fingerprint, across the unminified form and two known minifier outputs
//! - [`scope`] walks brace-balanced regions to find the enclosing
//!   initialize function
//! - [`patcher`] splices state observers and a model-updater registration
//!   into the located region
//! - [`seed`] pins the runtime's randomness seed so test cases are
//!   reproducible
//! - [`hooks`] carries the browser-side helper script the patched code
//!   reports into, and the markup transforms that install it
//!
//! Everything here is pure text processing; all I/O lives in the harness
//! crate.

pub mod error;
pub mod hooks;
#[cfg(test)]
pub(crate) mod test_fixtures;
pub mod locator;
pub mod patcher;
pub mod scope;
pub mod seed;

pub use error::{PatchError, PatchResult};
pub use hooks::{inject_helpers, test_mode_overrides, HELPERS_GLOBAL};
pub use locator::{locate_handoff, HandoffNames, LocatedHandoff};
pub use patcher::add_state_observers;
pub use scope::{enclosing_function_span, FunctionSpan};
pub use seed::fix_randomness_seed;
