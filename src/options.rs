//! Configuration options for the query facade.
//!
//! The `Options` struct controls how text is extracted, whether the plugin
//! chain runs ahead of parsing, and how mutated documents are serialized.

/// Configuration options for [`DocumentQuery`](crate::DocumentQuery).
///
/// All fields are public for easy configuration. Use `Default::default()`
/// for standard settings.
///
/// # Example
///
/// ```rust
/// use dom_facade::Options;
///
/// // Use defaults
/// let options = Options::default();
/// assert!(options.collapse_whitespace);
///
/// // Customize specific fields
/// let options = Options {
///     preprocess_with_plugins: true,
///     ..Options::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Options {
    /// Collapse whitespace runs in extracted text to single spaces and trim
    /// the ends, the way a browser renders visible text.
    ///
    /// When disabled, text is returned exactly as the text nodes hold it.
    ///
    /// Default: `true`
    pub collapse_whitespace: bool,

    /// Run the plugin chain over the input HTML before parsing it in every
    /// query and mutation operation.
    ///
    /// Default: `false`
    pub preprocess_with_plugins: bool,

    /// Serialize only the `<body>` inner markup after a mutation instead of
    /// the whole `<html>` document.
    ///
    /// Useful when the input was a fragment and the caller wants a fragment
    /// back.
    ///
    /// Default: `false`
    pub fragment_mode: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            collapse_whitespace: true,
            preprocess_with_plugins: false,
            fragment_mode: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = Options::default();
        assert!(options.collapse_whitespace);
        assert!(!options.preprocess_with_plugins);
        assert!(!options.fragment_mode);
    }

    #[test]
    fn test_struct_update_syntax() {
        let options = Options {
            fragment_mode: true,
            ..Options::default()
        };
        assert!(options.fragment_mode);
        assert!(options.collapse_whitespace);
    }
}
