//! Parser error type.

use thiserror::Error;

use crate::source::SourceExtent;

/// A syntax error.
///
/// Carries the extent of the offending token and the name of the grammar
/// rule that rejected it. The parser never recovers: the first error
/// terminates parsing.
#[derive(Debug, Clone, Error)]
#[error("SyntaxError: {message} in {rule} at {extent}")]
pub struct ParseError {
    /// Extent spanning the offending token.
    pub extent: SourceExtent,
    /// Grammar rule that rejected the input.
    pub rule: &'static str,
    /// Human-readable description.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceFile;

    #[test]
    fn display_names_rule_and_position() {
        let file = SourceFile::new("script.js", "var !");
        let err = ParseError {
            extent: SourceExtent::new(file, 4, 5),
            rule: "variable statement",
            message: "unexpected token".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "SyntaxError: unexpected token in variable statement at script.js:1:5-1:6"
        );
    }
}
