//! `{{key}}` placeholder rendering.
//!
//! Rendering is literal substitution: each key is replaced once, left to
//! right over the whole string, in the order the context yields its
//! entries. Replacement values are never re-scanned for placeholders of
//! keys that were already processed.

use regex::Regex;
use std::sync::LazyLock;

/// Match a `{{ identifier }}` placeholder, capturing the identifier.
#[allow(clippy::expect_used)]
static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("valid regex")
});

/// Replace every literal `{{key}}` in `template` with its value.
///
/// Placeholders with no entry in `context` are left verbatim. The context
/// can be any iterable of key/value pairs; its iteration order is the
/// substitution order.
///
/// # Example
///
/// ```rust
/// use dom_facade::template::render_template;
///
/// let html = render_template("<p>{{name}} {{missing}}</p>", [("name", "Ana")]);
/// assert_eq!(html, "<p>Ana {{missing}}</p>");
/// ```
#[must_use]
pub fn render_template<I, K, V>(template: &str, context: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut rendered = template.to_string();
    for (key, value) in context {
        let placeholder = format!("{{{{{}}}}}", key.as_ref());
        if rendered.contains(&placeholder) {
            rendered = rendered.replace(&placeholder, value.as_ref());
        }
    }
    rendered
}

/// Distinct placeholder identifiers in `template`, in order of first
/// appearance.
///
/// Whitespace inside the braces is tolerated here (`{{ name }}` yields
/// `name`), but note that [`render_template`] only substitutes the exact
/// `{{name}}` spelling.
///
/// # Example
///
/// ```rust
/// use dom_facade::template::{placeholders, render_template};
///
/// let rendered = render_template("{{a}}-{{b}}-{{a}}", [("a", "1")]);
/// assert_eq!(placeholders(&rendered), vec!["b".to_string()]);
/// ```
#[must_use]
pub fn placeholders(template: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for caps in PLACEHOLDER_RE.captures_iter(template) {
        if let Some(key) = caps.get(1) {
            if !found.iter().any(|k| k == key.as_str()) {
                found.push(key.as_str().to_string());
            }
        }
    }
    found
}
