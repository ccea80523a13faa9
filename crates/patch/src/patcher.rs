//! State-observer splicing
//!
//! Takes the served bundle, locates the state handoff (locator) and its
//! enclosing initialize function (scope), partitions the text into five
//! ordered segments, and rewrites the two segments inside the initialize
//! function so that:
//!
//! - every relevant assignment to the model variable also forwards the
//!   assigned value to the browser-side helper, via comma sequencing so the
//!   expression keeps its value and stays legal in expression position
//! - a model-updater registration is appended right after the handoff
//!   definition, where it cannot land in the middle of a comma operator or
//!   a multi-assignment `var` statement in minified output
//!
//! Reassembly concatenates the five segments in order, so every byte
//! outside the two rewritten segments is identical to the input. Failures
//! from the locator or the scope extractor propagate unchanged; a patch
//! failure means front-end toolchain drift and is fatal for the run, never
//! retried. Patching already-patched text is unsupported: the fingerprint
//! no longer matches and raises the same structural-mismatch error.

use regex::Regex;
use tracing::debug;

use cubedrill_common::{ProgramText, TextKind};

use crate::error::{PatchError, PatchResult};
use crate::hooks::HELPERS_GLOBAL;
use crate::locator::{locate_handoff, HandoffNames};
use crate::scope::enclosing_function_span;

/// The serialized no-effect command, passed to the effect dispatch when
/// forcing a model so that subscriptions re-register without running any
/// new effects. Captured from the runtime with an initial command of none.
const NO_OP_COMMAND: &str = r#"{"$":3,"o":{"$":2,"m":{"$":"[]"}}}"#;

struct Segments<'t> {
    before_initialize: &'t str,
    before_handoff: &'t str,
    handoff: &'t str,
    after_handoff: &'t str,
    after_initialize: &'t str,
}

/// Patch a script bundle so the helper installed by [`crate::hooks`] can
/// observe every model assignment and force a model of its own.
pub fn add_state_observers(script: &ProgramText) -> PatchResult<ProgramText> {
    if script.kind() != TextKind::Script {
        return Err(PatchError::WrongTextKind {
            expected: "script",
            got: "markup",
        });
    }
    let text = script.as_str();

    let located = locate_handoff(text)?;
    let initialize = enclosing_function_span(text, located.span)?;
    debug_assert!(initialize.start <= located.span.start);
    debug_assert!(located.span.end <= initialize.end);

    let segments = Segments {
        before_initialize: &text[..initialize.start],
        before_handoff: &text[initialize.start..located.span.start],
        handoff: located.span.slice(text),
        after_handoff: &text[located.span.end..initialize.end],
        after_initialize: &text[initialize.end..],
    };
    let names = &located.names;
    debug!(
        grammar = located.grammar,
        handoff_len = segments.handoff.len(),
        "splicing state observers"
    );

    let mut patched = String::with_capacity(text.len() + 512);
    patched.push_str(segments.before_initialize);
    // Only the first assignment before the handoff is the model's real
    // initialization; later matches there would be unrelated locals.
    patched.push_str(&observe_model_assignments(
        segments.before_handoff,
        &names.model,
        true,
    ));
    patched.push_str(&observe_model_assignments(
        segments.handoff,
        &names.model,
        false,
    ));
    patched.push_str(&registration(names));
    patched.push_str(&observe_model_assignments(
        segments.after_handoff,
        &names.model,
        false,
    ));
    patched.push_str(segments.after_initialize);

    Ok(script.with_text(patched))
}

/// Rewrite `model = <expr>` into a form that also forwards the assigned
/// value to the helper, preserving the expression's resulting value:
/// `model = (window.<global>.internal.setModel(<expr>), <expr>)`.
fn observe_model_assignments(segment: &str, model: &str, first_only: bool) -> String {
    // Word boundaries keep variables that merely contain the model's name
    // as a substring from matching; the value class covers identifiers and
    // field accesses, which is all the fingerprinted sites assign.
    let pattern = Regex::new(&format!(
        r"(\b{model}\b\s*=\s*)([\w.]+)",
        model = regex::escape(model)
    ))
    .expect("model assignment pattern");
    let replacement = format!("${{1}}(window.{HELPERS_GLOBAL}.internal.setModel(${{2}}),${{2}})");
    if first_only {
        pattern.replace(segment, replacement.as_str()).into_owned()
    } else {
        pattern
            .replace_all(segment, replacement.as_str())
            .into_owned()
    }
}

/// The model-updater registration appended after the handoff definition.
///
/// The callback must, in order: overwrite the model variable, run the
/// rendering updater synchronously, and dispatch a no-op command together
/// with the new model's subscriptions. Skipping the dispatch leaves event
/// listeners subscribed against the old model after a forced state change.
fn registration(names: &HandoffNames) -> String {
    format!(
        ";window.{global}.internal.registerModelUpdater((newModel) => {{\n\
         \x20   {model} = newModel;\n\
         \x20   {updater}(newModel, true);\n\
         \x20   {dispatch}(\n\
         \x20       {managers},\n\
         \x20       {cmd},\n\
         \x20       {subscriptions}(newModel),\n\
         \x20   )\n\
         }});",
        global = HELPERS_GLOBAL,
        model = names.model,
        updater = names.updater,
        dispatch = names.effect_dispatch,
        managers = names.managers,
        cmd = NO_OP_COMMAND,
        subscriptions = names.subscriptions,
    )
}
