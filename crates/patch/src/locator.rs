//! Handoff-function location
//!
//! Finds the trainer runtime's state handoff function inside the served
//! bundle: the two-argument function that computes an update pair, assigns
//! the pair's `.a` field into the model variable in the first argument of
//! the rendering-updater call, and immediately dispatches effects over the
//! shared managers value with the subscriptions of the new model.
//!
//! The bundle arrives in one of three lexical forms — unminified output,
//! or the output of one of two known minifiers with different joining and
//! bracing conventions — so three dedicated fingerprints are tried in
//! fixed order and the first one producing exactly one candidate wins.
//! This is a tiny purpose-built parser over program text, not an AST: the
//! token stream is owned by a third-party compiler and changes with its
//! versions, which is exactly why the match is structural rather than
//! syntactic.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::{GrammarAttempt, MatchDiagnostics, PatchResult};
use crate::scope::{net_brace_depth, FunctionSpan};

/// The five identifier names captured out of the handoff function.
/// All are guaranteed non-empty on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffNames {
    /// Rendering-updater function, called as `updater(model = pair.a, meta)`
    pub updater: String,
    /// The model variable holding the full application state
    pub model: String,
    /// Effect-dispatch function re-registering subscriptions
    pub effect_dispatch: String,
    /// Shared managers value, first argument of every effect dispatch
    pub managers: String,
    /// Pure subscriptions function applied to the model
    pub subscriptions: String,
}

/// A successful location: the handoff function's span plus its captured
/// identifiers and the fingerprint that found it.
#[derive(Debug, Clone)]
pub struct LocatedHandoff {
    pub span: FunctionSpan,
    pub names: HandoffNames,
    pub grammar: &'static str,
}

/// Unminified output: whitespace everywhere, the updater call statement is
/// terminated by a semicolon and a line break before the effect dispatch.
static READABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        // function keyword, name, exactly two arguments
        r"function \w+\s*\(\s*\w+\s*,\s*\w+\s*\)",
        // the body opens
        r"[\s\n]*\{",
        // simple statements only (no braces, dots or quotes), so the match
        // cannot escape the handoff body
        r"[\s\n\w(),;=]*?",
        // CAPTURE 1: the rendering-updater's name
        r"(\w+)\s*\(",
        // CAPTURE 2: the model variable, assigned from the pair's `.a`
        r"(\w+)\s*=\s*\w+\.a\s*,",
        // the second argument, which we don't care about
        r"\s*\w+\s*\)",
        // statement ends and the line breaks here in readable output
        r"\s*;\s*\n",
        r"[\s\n\w(),;=]*?",
        // CAPTURE 3: the effect-dispatch function's name
        r"(\w+)\s*\(",
        // CAPTURE 4: the shared managers value
        r"\s*(\w+),",
        // second dispatch argument, ignored
        r"[^,]+,",
        // CAPTURE 5: the subscriptions function, applied to the model
        r"\s*(\w+)\s*\(",
        // the rest of the handoff body
        r"[\s\S]+?\}",
    ))
    .expect("readable handoff fingerprint")
});

/// First minifier's output: no whitespace around punctuation, and the
/// updater call is joined to the effect dispatch with a comma operator.
static MINIFIER_A: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"function \w+\(\w+,\w+\)\{",
        r"[\s\w(),;=]*?",
        r"(\w+)\(",
        r"(\w+)=\w+\.a,",
        // second argument, closing paren, comma-operator join
        r"\w+\),",
        r"(\w+)\(",
        r"(\w+),",
        r"[^,]+,",
        r"(\w+)\(",
        r"[^{}]+?\}",
    ))
    .expect("first minifier handoff fingerprint")
});

/// Second minifier's output: like the first but statements stay
/// semicolon-separated instead of comma-joined.
static MINIFIER_B: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"function \w+\(\w+,\w+\)\{",
        r"[\s\w(),;=]*?",
        r"(\w+)\(",
        r"(\w+)=\w+\.a,",
        // second argument, closing paren, semicolon join
        r"\w+\);",
        r"(\w+)\(",
        r"(\w+),",
        r"[^,]+,",
        r"(\w+)\(",
        r"[^{}]+?\}",
    ))
    .expect("second minifier handoff fingerprint")
});

fn grammars() -> [(&'static str, &'static Regex); 3] {
    [
        ("readable", &*READABLE),
        ("minifier-a", &*MINIFIER_A),
        ("minifier-b", &*MINIFIER_B),
    ]
}

/// Locate the handoff function in a script, trying each fingerprint in
/// fixed order and returning the first that matches exactly once.
///
/// Zero or multiple candidates from every fingerprint is
/// `AmbiguousOrMissingMatch`, carrying the per-fingerprint candidate
/// counts and the full searched text. If a later fingerprint would also
/// have matched the text that an earlier one claimed, a warning is logged:
/// the fixed order keeps the outcome deterministic, but overlapping
/// fingerprints mean the minifier landscape has shifted and the patterns
/// deserve a fresh look.
pub fn locate_handoff(script: &str) -> PatchResult<LocatedHandoff> {
    let mut attempts = Vec::new();
    let mut located: Option<LocatedHandoff> = None;

    for (grammar, regex) in grammars() {
        let candidates: Vec<regex::Captures<'_>> = regex.captures_iter(script).collect();
        match (candidates.len(), &located) {
            (1, None) => {
                let captures = &candidates[0];
                located = Some(build_location(grammar, script, captures));
            }
            (0, _) => attempts.push(GrammarAttempt {
                grammar,
                candidates: 0,
            }),
            (n, None) => attempts.push(GrammarAttempt {
                grammar,
                candidates: n,
            }),
            (n, Some(first)) => {
                warn!(
                    first = first.grammar,
                    also = grammar,
                    candidates = n,
                    "a second handoff fingerprint also matches this bundle; \
                     keeping the first in fallback order"
                );
            }
        }
    }

    located.ok_or_else(|| {
        MatchDiagnostics {
            what: "state handoff function",
            attempts,
            searched: script.to_string(),
        }
        .into_error()
    })
}

fn build_location(
    grammar: &'static str,
    script: &str,
    captures: &regex::Captures<'_>,
) -> LocatedHandoff {
    let whole = captures.get(0).expect("group 0 always present");
    let span = FunctionSpan::new(whole.start(), whole.end());
    debug_assert_eq!(net_brace_depth(span.slice(script)), 0);

    let group = |index: usize| -> String {
        captures
            .get(index)
            .expect("fingerprints define five capture groups")
            .as_str()
            .to_string()
    };
    let names = HandoffNames {
        updater: group(1),
        model: group(2),
        effect_dispatch: group(3),
        managers: group(4),
        subscriptions: group(5),
    };
    debug!(
        grammar,
        start = span.start,
        end = span.end,
        model = %names.model,
        "located state handoff"
    );
    LocatedHandoff {
        span,
        names,
        grammar,
    }
}
