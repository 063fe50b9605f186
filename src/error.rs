//! Error types for dom-facade.
//!
//! Every facade operation reports failure through this enum instead of
//! returning in-band text, so extracted content can never be mistaken for
//! an error message.

/// Error type for query, mutation and plugin operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The DOM engine failed while parsing, selecting or serializing.
    #[error("HTML parsing failed: {0}")]
    ParseError(String),

    /// The CSS selector could not be compiled.
    #[error("Invalid CSS selector `{selector}`: {reason}")]
    InvalidSelector {
        /// Selector as given by the caller.
        selector: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// The XPath expression could not be parsed or does not select nodes.
    #[error("Invalid XPath expression `{expression}`: {reason}")]
    InvalidXPath {
        /// Expression as given by the caller.
        expression: String,
        /// Parser or evaluator diagnostic.
        reason: String,
    },

    /// The selector is valid but matched nothing.
    #[error("No match found")]
    NoMatch {
        /// Selector that produced no match.
        selector: String,
    },

    /// A plugin regex pattern could not be compiled.
    #[error("Invalid pattern `{pattern}`: {reason}")]
    InvalidPattern {
        /// Pattern as given by the caller.
        pattern: String,
        /// Regex compiler diagnostic.
        reason: String,
    },
}

impl Error {
    /// Returns `true` for [`Error::NoMatch`].
    #[must_use]
    pub fn is_no_match(&self) -> bool {
        matches!(self, Self::NoMatch { .. })
    }

    pub(crate) fn no_match(selector: &str) -> Self {
        Self::NoMatch {
            selector: selector.to_string(),
        }
    }

    pub(crate) fn invalid_xpath(expression: &str, reason: impl Into<String>) -> Self {
        Self::InvalidXPath {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for facade operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_match_displays_legacy_wording() {
        let err = Error::no_match("span");
        assert_eq!(err.to_string(), "No match found");
        assert!(err.is_no_match());
    }

    #[test]
    fn invalid_selector_names_the_selector() {
        let err = Error::InvalidSelector {
            selector: "p[".to_string(),
            reason: "unexpected end of input".to_string(),
        };
        assert!(err.to_string().contains("`p[`"));
        assert!(!err.is_no_match());
    }
}
