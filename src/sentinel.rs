//! Adapters to the legacy in-band error convention.
//!
//! Older callers detect failure by looking for an `"Error: "` prefix in the
//! returned text. These helpers flatten a [`Result`] into that shape for code
//! that has not been ported to match on [`Error`] yet. New code should match
//! on the `Result` directly: flattened output cannot tell real content that
//! starts with `"Error:"` apart from a failure.

use crate::error::{Error, Result};

/// Prefix that marks a flattened error.
pub const ERROR_PREFIX: &str = "Error: ";

/// Flatten a single-value result: `Ok(s)` is `s`, `Err(e)` is `"Error: {e}"`.
///
/// # Example
///
/// ```rust
/// use dom_facade::{sentinel, DocumentQuery};
///
/// let query = DocumentQuery::new();
/// let text = sentinel::text(query.select_first("<p>x</p>", "span", false));
/// assert_eq!(text, "Error: No match found");
/// ```
#[must_use]
pub fn text(result: Result<String>) -> String {
    result.unwrap_or_else(|err| format!("{ERROR_PREFIX}{err}"))
}

/// Flatten a list result into a single-entry sentinel list on failure.
///
/// A no-match becomes `["Error: No matches found"]`, any other error
/// `["Error: {e}"]`.
#[must_use]
pub fn list(result: Result<Vec<String>>) -> Vec<String> {
    match result {
        Ok(items) => items,
        Err(Error::NoMatch { .. }) => vec![format!("{ERROR_PREFIX}No matches found")],
        Err(err) => vec![format!("{ERROR_PREFIX}{err}")],
    }
}

/// `true` when `value` carries the error prefix.
#[must_use]
pub fn is_error(value: &str) -> bool {
    value.starts_with(ERROR_PREFIX)
}
