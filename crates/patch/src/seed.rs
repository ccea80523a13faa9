//! Randomness seed pinning
//!
//! The trainer picks test cases through the runtime's randomness manager,
//! which seeds itself from the current time at startup. Deterministic runs
//! pin that seed instead: each supported lexical form gets a dedicated
//! two-step fixer — find the manager registration to learn the init
//! function's name, then rewrite the seed expression inside that init
//! definition. Fixers run in fixed order and the first success wins, the
//! same fallback scheme the handoff locator uses.

use regex::Regex;
use tracing::debug;

use cubedrill_common::{ProgramText, TextKind};

use crate::error::{GrammarAttempt, MatchDiagnostics, PatchError, PatchResult};

/// Pin the bundle's randomness seed to `seed`.
pub fn fix_randomness_seed(script: &ProgramText, seed: u64) -> PatchResult<ProgramText> {
    if script.kind() != TextKind::Script {
        return Err(PatchError::WrongTextKind {
            expected: "script",
            got: "markup",
        });
    }
    let text = script.as_str();

    let fixers: [(&'static str, FixerFn); 3] = [
        ("readable", fix_seed_readable),
        ("minifier-a", fix_seed_minifier_a),
        ("minifier-b", fix_seed_minifier_b),
    ];

    let mut attempts = Vec::new();
    for (grammar, fixer) in fixers {
        match fixer(text, seed) {
            Ok(patched) => {
                debug!(grammar, seed, "pinned randomness seed");
                return Ok(script.with_text(patched));
            }
            Err(candidates) => attempts.push(GrammarAttempt {
                grammar,
                candidates,
            }),
        }
    }

    Err(MatchDiagnostics {
        what: "randomness seed expression",
        attempts,
        searched: text.to_string(),
    }
    .into_error())
}

/// A fixer either rewrites the text or reports how many candidates its
/// failing step saw (zero or several, never one).
type FixerFn = fn(&str, u64) -> Result<String, usize>;

/// Run a pattern expected to match exactly once; on success hand back the
/// single capture set.
fn single_match<'t>(pattern: &Regex, text: &'t str) -> Result<regex::Captures<'t>, usize> {
    let mut iter = pattern.captures_iter(text);
    let first = iter.next().ok_or(0usize)?;
    let extra = iter.count();
    if extra > 0 {
        return Err(1 + extra);
    }
    Ok(first)
}

/// Unminified form. Registration looks like:
/// `_Platform_effectManagers['Random'] = _Platform_createManager(<init>, ...);`
/// and the init definition opens three nested calls before the
/// time-derived seed expression we overwrite.
fn fix_seed_readable(text: &str, seed: u64) -> Result<String, usize> {
    let registration =
        Regex::new(r"\['Random'\]\s*=\s*\w+\s*\((.+?),").expect("readable random registration");
    let init_name = single_match(&registration, text)?
        .get(1)
        .expect("registration captures the init name")
        .as_str()
        .to_string();

    let definition = Regex::new(&format!(
        concat!(
            // keep the whole prefix so the replacement is anchored by context
            "(",
            "{name}",
            r"\b\s*=.*?\(",
            // pass through three nested call openings
            r"[\s\S]+?\(",
            r"[\s\S]+?\(",
            r"[\s\S]+?\(",
            ")",
            // the time-derived argument we replace, up to its closing paren
            r"[\s\S]+?\)",
        ),
        name = regex::escape(&init_name)
    ))
    .expect("readable seed definition pattern");
    single_match(&definition, text)?;
    Ok(definition
        .replace(text, format!("${{1}}{seed}").as_str())
        .into_owned())
}

/// First minifier's form. Registration: `<obj>.Random=<fn>(<init>,...)`;
/// the init definition wraps the seed in a temporary function closure.
fn fix_seed_minifier_a(text: &str, seed: u64) -> Result<String, usize> {
    let registration =
        Regex::new(r"\.Random=\w+\((\w+),").expect("minifier-a random registration");
    let init_name = single_match(&registration, text)?
        .get(1)
        .expect("registration captures the init name")
        .as_str()
        .to_string();

    let definition = Regex::new(&format!(
        concat!(
            "(",
            r"\b{name}\b=\w+\(",
            r"\w+,\(function\(\w+\)\{{return ",
            r"\w+\(function\(\w+\)\{{.+?\}}",
            r"\(",
            ")",
            // the value handed to the closure
            r"[^)]+",
            r"(\))",
        ),
        name = regex::escape(&init_name)
    ))
    .expect("minifier-a seed definition pattern");
    single_match(&definition, text)?;
    Ok(definition
        .replace(text, format!("${{1}}{seed}${{2}}").as_str())
        .into_owned())
}

/// Second minifier's form. Registration assigns an object literal:
/// `<obj>.Random={b:<init>,...}`; the init definition seeds through a
/// comma-operator sequence whose first element we replace.
fn fix_seed_minifier_b(text: &str, seed: u64) -> Result<String, usize> {
    let registration =
        Regex::new(r"\.Random=\{.*?:(\w+),").expect("minifier-b random registration");
    let init_name = single_match(&registration, text)?
        .get(1)
        .expect("registration captures the init name")
        .as_str()
        .to_string();

    let definition = Regex::new(&format!(
        concat!(
            "(",
            r"\b{name}\b=\w+\(",
            r"\w+,function\(\w+\)\{{return ",
            r"\w+\(\(",
            ")",
            // first element of the comma sequence
            r"[^,]+",
            "(,)",
        ),
        name = regex::escape(&init_name)
    ))
    .expect("minifier-b seed definition pattern");
    single_match(&definition, text)?;
    Ok(definition
        .replace(text, format!("${{1}}{seed}${{2}}").as_str())
        .into_owned())
}
