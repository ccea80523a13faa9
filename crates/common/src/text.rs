//! Classified program text
//!
//! Intercepted response bodies and build artifacts move through the
//! transformation pipeline as [`ProgramText`] values: an immutable string
//! tagged with what it is (markup or script). Transformations always
//! produce a new value; nothing rewrites a body in place.

/// What kind of program text a body is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    /// An HTML document
    Markup,
    /// A JavaScript bundle
    Script,
}

/// An immutable, classified piece of program text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramText {
    kind: TextKind,
    text: String,
}

impl ProgramText {
    pub fn markup(text: impl Into<String>) -> Self {
        Self {
            kind: TextKind::Markup,
            text: text.into(),
        }
    }

    pub fn script(text: impl Into<String>) -> Self {
        Self {
            kind: TextKind::Script,
            text: text.into(),
        }
    }

    pub fn kind(&self) -> TextKind {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Produce a new value of the same kind with different content
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            kind: self.kind,
            text: text.into(),
        }
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_text_preserves_kind() {
        let markup = ProgramText::markup("<html></html>");
        let rewritten = markup.with_text("<html><head></head></html>");
        assert_eq!(rewritten.kind(), TextKind::Markup);
        assert_eq!(rewritten.as_str(), "<html><head></head></html>");
        // the source value is untouched
        assert_eq!(markup.as_str(), "<html></html>");
    }
}
