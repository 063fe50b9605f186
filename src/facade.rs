//! The query facade.
//!
//! Every operation reparses its input; nothing about a document survives
//! the call. The only instance state is the plugin chain and the options,
//! both fixed by the builder (the chain can grow later through `&mut self`).

use std::fmt;

use crate::dom::{self, Document};
use crate::error::{Error, Result};
use crate::options::Options;
use crate::plugin::{Plugin, PluginChain};
use crate::template;
use crate::xpath::{self, XPathNode, XPathValue};

/// Convenience operations for selecting, extracting and mutating HTML.
///
/// # Example
///
/// ```rust
/// use dom_facade::DocumentQuery;
///
/// let query = DocumentQuery::new();
/// let html = "<div id='a'><span>hi</span></div>";
///
/// assert_eq!(query.select_first(html, "span", false)?, "hi");
/// assert_eq!(query.select_first(html, "span", true)?, "<span>hi</span>");
/// # Ok::<(), dom_facade::Error>(())
/// ```
#[derive(Default)]
pub struct DocumentQuery {
    plugins: PluginChain,
    options: Options,
}

/// Builder for [`DocumentQuery`].
///
/// # Example
///
/// ```rust
/// use dom_facade::{DocumentQuery, Options};
/// use dom_facade::plugin::FnPlugin;
///
/// let query = DocumentQuery::builder()
///     .plugin(FnPlugin::new("uppercase", |s: &str| s.to_uppercase()))
///     .plugin(FnPlugin::new("bang", |s: &str| format!("{s}!")))
///     .options(Options::default())
///     .build();
///
/// assert_eq!(query.run_plugin_chain("ab"), "AB!");
/// ```
#[derive(Default)]
pub struct DocumentQueryBuilder {
    plugins: PluginChain,
    options: Options,
}

impl DocumentQueryBuilder {
    /// Append a plugin to the chain.
    #[must_use]
    pub fn plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Replace the options.
    #[must_use]
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> DocumentQuery {
        DocumentQuery {
            plugins: self.plugins,
            options: self.options,
        }
    }
}

impl DocumentQuery {
    /// Facade with default options and no plugins.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Facade with the given options and no plugins.
    #[must_use]
    pub fn with_options(options: Options) -> Self {
        Self {
            plugins: PluginChain::new(),
            options,
        }
    }

    /// Start a builder.
    #[must_use]
    pub fn builder() -> DocumentQueryBuilder {
        DocumentQueryBuilder::default()
    }

    /// Active options.
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Registered plugins, in execution order.
    #[must_use]
    pub fn plugins(&self) -> &PluginChain {
        &self.plugins
    }

    // === Plugins ===

    /// Append `plugin` to the chain.
    pub fn add_plugin(&mut self, plugin: impl Plugin + 'static) {
        tracing::debug!(plugin = plugin.name(), position = self.plugins.len(), "plugin registered");
        self.plugins.push(plugin);
    }

    /// Feed `html` through every plugin in insertion order.
    #[must_use]
    pub fn run_plugin_chain(&self, html: &str) -> String {
        self.plugins.run(html)
    }

    /// Parse `html`, running the plugin chain first when
    /// [`Options::preprocess_with_plugins`] is set.
    fn load(&self, html: &str) -> Document {
        if self.options.preprocess_with_plugins && !self.plugins.is_empty() {
            dom::parse(&self.plugins.run(html))
        } else {
            dom::parse(html)
        }
    }

    fn extract(&self, node: &dom::NodeRef, include_outer_markup: bool) -> String {
        if include_outer_markup {
            dom::outer_html(node)
        } else {
            dom::visible_text(node, self.options.collapse_whitespace)
        }
    }

    // === Selection ===

    /// Text (or outer markup) of every element matching `selector`, in
    /// document order.
    ///
    /// Returns [`Error::NoMatch`] when nothing matches.
    pub fn select_all(
        &self,
        html: &str,
        selector: &str,
        include_outer_markup: bool,
    ) -> Result<Vec<String>> {
        let result = dom::guarded("select_all", || {
            let matcher = dom::compile_selector(selector)?;
            let doc = self.load(html);
            let matches: Vec<String> = dom::select_all(&doc, &matcher)
                .nodes()
                .iter()
                .map(|node| self.extract(node, include_outer_markup))
                .collect();
            if matches.is_empty() {
                return Err(Error::no_match(selector));
            }
            Ok(matches)
        });
        log_outcome("select_all", selector, result.as_ref().map(Vec::len));
        result
    }

    /// Alias for [`select_all`](Self::select_all) returning text.
    pub fn all_matches(&self, html: &str, selector: &str) -> Result<Vec<String>> {
        self.select_all(html, selector, false)
    }

    /// Text (or outer markup) of the first element matching `selector`.
    pub fn select_first(
        &self,
        html: &str,
        selector: &str,
        include_outer_markup: bool,
    ) -> Result<String> {
        let result = dom::guarded("select_first", || {
            let matcher = dom::compile_selector(selector)?;
            let doc = self.load(html);
            dom::select_first(&doc, &matcher)
                .map(|node| self.extract(&node, include_outer_markup))
                .ok_or_else(|| Error::no_match(selector))
        });
        log_outcome("select_first", selector, result.as_ref().map(|_| 1));
        result
    }

    /// Alias for [`select_first`](Self::select_first) returning text.
    pub fn first_match(&self, html: &str, selector: &str) -> Result<String> {
        self.select_first(html, selector, false)
    }

    /// Outer markup of the first `tag` element.
    pub fn outer_markup_by_tag(&self, html: &str, tag: &str) -> Result<String> {
        self.select_first(html, tag, true)
    }

    /// Value of `attribute` on the first element matching `selector`.
    ///
    /// A missing attribute yields an empty string; a missing element yields
    /// [`Error::NoMatch`].
    pub fn select_attribute(&self, html: &str, selector: &str, attribute: &str) -> Result<String> {
        let result = dom::guarded("select_attribute", || {
            let matcher = dom::compile_selector(selector)?;
            let doc = self.load(html);
            let node = dom::select_first(&doc, &matcher).ok_or_else(|| Error::no_match(selector))?;
            Ok(dom::get_attribute(&node, attribute).unwrap_or_default())
        });
        log_outcome("select_attribute", selector, result.as_ref().map(|_| 1));
        result
    }

    // === Mutation ===

    /// Replace the inner markup of the element with id `id`.
    ///
    /// Returns the serialized document; an unknown id leaves it unchanged.
    pub fn replace_inner_by_id(&self, html: &str, id: &str, new_inner_markup: &str) -> Result<String> {
        dom::guarded("replace_inner_by_id", || {
            let doc = self.load(html);
            match dom::find_by_id(&doc, id) {
                Some(node) => dom::set_inner_html(&node, new_inner_markup),
                None => tracing::debug!(id, "replace_inner_by_id: id not found"),
            }
            Ok(dom::serialize(&doc, self.options.fragment_mode))
        })
    }

    /// Append `fragment` as the last child of the first `selector` match.
    ///
    /// Returns the serialized document; no match leaves it unchanged.
    pub fn append_child(&self, html: &str, selector: &str, fragment: &str) -> Result<String> {
        dom::guarded("append_child", || {
            let matcher = dom::compile_selector(selector)?;
            let doc = self.load(html);
            match dom::select_first(&doc, &matcher) {
                Some(parent) => dom::append_html(&parent, fragment),
                None => tracing::debug!(selector, "append_child: no parent matched"),
            }
            Ok(dom::serialize(&doc, self.options.fragment_mode))
        })
    }

    /// Remove the element with id `id`, if present.
    pub fn remove_by_id(&self, html: &str, id: &str) -> Result<String> {
        dom::guarded("remove_by_id", || {
            let doc = self.load(html);
            match dom::find_by_id(&doc, id) {
                Some(node) => dom::remove(&node),
                None => tracing::debug!(id, "remove_by_id: id not found"),
            }
            Ok(dom::serialize(&doc, self.options.fragment_mode))
        })
    }

    // === XPath ===

    /// Nodes selected by the XPath `expression`, in document order.
    ///
    /// An empty node-set is `Ok(vec![])`. Expressions that evaluate to a
    /// number, string or boolean are rejected with [`Error::InvalidXPath`];
    /// use [`evaluate_xpath_value`](Self::evaluate_xpath_value) for those.
    pub fn evaluate_xpath(&self, html: &str, expression: &str) -> Result<Vec<XPathNode>> {
        let result = dom::guarded("evaluate_xpath", || {
            let compiled = xpath::compile(expression)?;
            let doc = self.load(html);
            compiled.select(&doc, self.options.collapse_whitespace)
        });
        log_outcome("evaluate_xpath", expression, result.as_ref().map(Vec::len));
        result
    }

    /// Result of the XPath `expression`, whatever its type.
    pub fn evaluate_xpath_value(&self, html: &str, expression: &str) -> Result<XPathValue> {
        dom::guarded("evaluate_xpath_value", || {
            let compiled = xpath::compile(expression)?;
            let doc = self.load(html);
            compiled.evaluate(&doc, self.options.collapse_whitespace)
        })
    }

    // === Templates ===

    /// Substitute `{{key}}` placeholders; see [`template::render_template`].
    #[must_use]
    pub fn render_template<I, K, V>(&self, template: &str, context: I) -> String
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        template::render_template(template, context)
    }

    // === Bytes ===

    /// Decode raw HTML bytes using the document's declared charset.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> String {
        crate::encoding::decode_html(bytes)
    }
}

impl fmt::Debug for DocumentQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentQuery")
            .field("plugins", &self.plugins)
            .field("options", &self.options)
            .finish()
    }
}

fn log_outcome(operation: &str, query: &str, outcome: std::result::Result<usize, &Error>) {
    match outcome {
        Ok(count) => tracing::debug!(operation, query, count, "query matched"),
        Err(err) if err.is_no_match() => tracing::debug!(operation, query, "no match"),
        Err(err) => tracing::debug!(operation, query, error = %err, "query failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::FnPlugin;

    const SAMPLE: &str = "<div id='a'><span>hi</span></div>";

    #[test]
    fn select_first_text_and_markup() {
        let query = DocumentQuery::new();
        assert_eq!(query.select_first(SAMPLE, "span", false).unwrap(), "hi");
        assert_eq!(query.select_first(SAMPLE, "span", true).unwrap(), "<span>hi</span>");
    }

    #[test]
    fn select_all_preserves_document_order() {
        let query = DocumentQuery::new();
        let html = "<p>a</p><div><p>b</p></div><p>c</p>";
        assert_eq!(query.select_all(html, "p", false).unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn invalid_selector_is_reported() {
        let query = DocumentQuery::new();
        let err = query.select_all(SAMPLE, "span[", false).unwrap_err();
        assert!(matches!(err, Error::InvalidSelector { .. }));
    }

    #[test]
    fn preprocess_runs_plugins_before_parsing() {
        let query = DocumentQuery::builder()
            .plugin(FnPlugin::new("rename", |s: &str| s.replace("<b>", "<i>").replace("</b>", "</i>")))
            .options(Options {
                preprocess_with_plugins: true,
                ..Options::default()
            })
            .build();
        assert_eq!(query.select_first("<b>x</b>", "i", false).unwrap(), "x");

        let plain = DocumentQuery::new();
        assert!(plain.select_first("<b>x</b>", "i", false).unwrap_err().is_no_match());
    }

    #[test]
    fn whitespace_is_kept_when_collapse_disabled() {
        let query = DocumentQuery::with_options(Options {
            collapse_whitespace: false,
            ..Options::default()
        });
        assert_eq!(query.select_first("<p> a  b </p>", "p", false).unwrap(), " a  b ");
    }

    #[test]
    fn add_plugin_appends() {
        let mut query = DocumentQuery::new();
        query.add_plugin(FnPlugin::new("one", |s: &str| format!("{s}1")));
        query.add_plugin(FnPlugin::new("two", |s: &str| format!("{s}2")));
        assert_eq!(query.plugins().names(), vec!["one", "two"]);
        assert_eq!(query.run_plugin_chain("x"), "x12");
    }

    #[test]
    fn debug_shows_plugins_and_options() {
        let query = DocumentQuery::builder()
            .plugin(FnPlugin::new("noop", str::to_string))
            .build();
        let debug = format!("{query:?}");
        assert!(debug.contains("noop"));
        assert!(debug.contains("collapse_whitespace"));
    }
}
