//! Text-to-text plugin chain.
//!
//! Plugins only ever see raw HTML text. A plugin that needs structure has
//! to parse and serialize on its own, the way [`StripElements`] does.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::dom;
use crate::error::{Error, Result};

/// A named text transformation applied to raw HTML.
pub trait Plugin: Send + Sync {
    /// Name used in logs and by [`PluginChain::names`].
    fn name(&self) -> &str;

    /// Transform `html` into new text.
    fn transform(&self, html: &str) -> String;
}

/// Plugin backed by a closure.
///
/// # Example
///
/// ```rust
/// use dom_facade::plugin::{FnPlugin, Plugin};
///
/// let upper = FnPlugin::new("uppercase", |s: &str| s.to_uppercase());
/// assert_eq!(upper.transform("ab"), "AB");
/// ```
pub struct FnPlugin<F> {
    name: String,
    func: F,
}

impl<F> FnPlugin<F>
where
    F: Fn(&str) -> String + Send + Sync,
{
    /// Wrap `func` under `name`.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Plugin for FnPlugin<F>
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&self, html: &str) -> String {
        (self.func)(html)
    }
}

/// Regex substitution over the raw text.
///
/// The replacement string supports `$1` / `${name}` capture references.
#[derive(Debug, Clone)]
pub struct RegexReplace {
    name: String,
    pattern: Regex,
    replacement: String,
}

impl RegexReplace {
    /// Compile `pattern`; every match is replaced by `replacement`.
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        replacement: impl Into<String>,
    ) -> Result<Self> {
        let compiled = Regex::new(pattern).map_err(|err| Error::InvalidPattern {
            pattern: pattern.to_string(),
            reason: err.to_string(),
        })?;
        Ok(Self {
            name: name.into(),
            pattern: compiled,
            replacement: replacement.into(),
        })
    }
}

impl Plugin for RegexReplace {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&self, html: &str) -> String {
        self.pattern
            .replace_all(html, self.replacement.as_str())
            .into_owned()
    }
}

/// Document-level markup: a doctype or an explicit `html`/`head`/`body` tag.
#[allow(clippy::expect_used)]
static DOCUMENT_MARKUP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(?:!doctype|html|head|body)[\s>/]").expect("valid regex")
});

/// Removes every element matching a CSS selector.
///
/// Parses its input and serializes it back, so the output is normalized
/// markup rather than the original text. A full document (doctype or
/// explicit `html`/`head`/`body` tags) comes back as a full document, head
/// included; a fragment comes back as a fragment.
#[derive(Debug, Clone)]
pub struct StripElements {
    selector: String,
}

impl StripElements {
    /// Build a plugin that strips `selector` matches.
    ///
    /// The selector is compiled once here to reject bad syntax early.
    pub fn new(selector: &str) -> Result<Self> {
        dom::compile_selector(selector)?;
        Ok(Self {
            selector: selector.to_string(),
        })
    }
}

impl Plugin for StripElements {
    fn name(&self) -> &str {
        &self.selector
    }

    fn transform(&self, html: &str) -> String {
        let Ok(matcher) = dom::compile_selector(&self.selector) else {
            return html.to_string();
        };
        let doc = dom::parse(html);
        dom::select_all(&doc, &matcher).remove();
        dom::serialize(&doc, !DOCUMENT_MARKUP_RE.is_match(html))
    }
}

/// Ordered, append-only sequence of plugins.
#[derive(Default)]
pub struct PluginChain {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginChain {
    /// Empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plugin; insertion order is execution order.
    pub fn push(&mut self, plugin: impl Plugin + 'static) {
        self.plugins.push(Box::new(plugin));
    }

    /// Feed `html` through every plugin, each consuming the prior output.
    #[must_use]
    pub fn run(&self, html: &str) -> String {
        let mut processed = html.to_string();
        for plugin in &self.plugins {
            processed = plugin.transform(&processed);
            tracing::trace!(plugin = plugin.name(), len = processed.len(), "plugin applied");
        }
        processed
    }

    /// Number of registered plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// `true` when no plugin is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Plugin names in execution order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }
}

impl fmt::Debug for PluginChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
