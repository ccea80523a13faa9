//! Enclosing-scope extraction
//!
//! Given an anchor inside a function body, find the span of the enclosing
//! function by walking a brace-depth counter outward in both directions.
//! The scanner is a plain depth counter over the two-symbol alphabet
//! `{`/`}`, so it works the same regardless of which fingerprint located
//! the anchor.
//!
//! Only `function`-keyword declarations are supported. Arrow functions
//! cannot be recognized walking backward (there is no keyword to land on)
//! and are a documented limitation, not a silently mishandled case.

use crate::error::{PatchError, PatchResult};

/// A function declaration's byte span: from the `function` keyword through
/// (one past) its balanced closing brace. `start < end` always holds, and
/// the spanned substring brace-balances to zero net depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionSpan {
    pub start: usize,
    pub end: usize,
}

impl FunctionSpan {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start < end);
        Self { start, end }
    }

    pub fn slice<'t>(&self, text: &'t str) -> &'t str {
        &text[self.start..self.end]
    }
}

/// Net brace depth of a text fragment (`{` opens, `}` closes).
pub fn net_brace_depth(text: &str) -> i64 {
    text.bytes().fold(0i64, |depth, byte| match byte {
        b'{' => depth + 1,
        b'}' => depth - 1,
        _ => depth,
    })
}

/// Find the span of the function enclosing `anchor`.
///
/// Scans backward from `anchor.start`: an opening brace *decrements* the
/// depth counter (we are leaving a scope when moving backward) and a
/// closing brace increments it. The enclosing function starts where depth
/// first reaches -1 and the text at that position spells the `function`
/// keyword. Scans forward from just past `anchor.end` with the mirrored
/// convention until depth reaches -1; that exclusive index is the end.
///
/// Malformed input (no balancing point before either edge of the text) is
/// a contract violation and reported as [`PatchError::UnbalancedBraces`]
/// rather than scanning forever.
pub fn enclosing_function_span(text: &str, anchor: FunctionSpan) -> PatchResult<FunctionSpan> {
    let start = scan_backward_to_function(text, anchor.start)?;
    let end = scan_forward_to_close(text, anchor.end)?;
    Ok(FunctionSpan::new(start, end))
}

const KEYWORD: &str = "function";

fn scan_backward_to_function(text: &str, from: usize) -> PatchResult<usize> {
    let bytes = text.as_bytes();
    let mut index = from;
    let mut depth: i64 = 0;
    loop {
        if depth == -1 && bytes[index..].starts_with(KEYWORD.as_bytes()) {
            return Ok(index);
        }
        match bytes.get(index) {
            Some(b'{') => depth -= 1,
            Some(b'}') => depth += 1,
            _ => {}
        }
        if index == 0 {
            return Err(PatchError::UnbalancedBraces {
                direction: "backward",
                from,
                edge: "start",
            });
        }
        index -= 1;
    }
}

fn scan_forward_to_close(text: &str, from: usize) -> PatchResult<usize> {
    let bytes = text.as_bytes();
    // The first byte examined is bytes[from], the one just past the
    // anchor's own closing brace.
    let mut end = from + 1;
    let mut depth: i64 = 0;
    loop {
        let Some(&byte) = bytes.get(end - 1) else {
            return Err(PatchError::UnbalancedBraces {
                direction: "forward",
                from,
                edge: "end",
            });
        };
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == -1 {
                    return Ok(end);
                }
            }
            _ => {}
        }
        end += 1;
    }
}
