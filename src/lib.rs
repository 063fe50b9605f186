//! # dom-facade
//!
//! A small facade over [`dom_query`] for scripted HTML querying: select
//! text, markup or attributes with CSS selectors or XPath, apply simple
//! mutations, run raw-text plugins, and fill `{{key}}` templates.
//!
//! ## Quick Start
//!
//! ```rust
//! use dom_facade::{DocumentQuery, Error};
//!
//! let query = DocumentQuery::new();
//! let html = r#"<ul id="list"><li>one</li><li class="x">two</li></ul>"#;
//!
//! assert_eq!(query.select_all(html, "li", false)?, vec!["one", "two"]);
//! assert_eq!(query.select_attribute(html, "li.x", "class")?, "x");
//! assert!(matches!(query.select_first(html, "table", false), Err(Error::NoMatch { .. })));
//!
//! let updated = query.append_child(html, "#list", "<li>three</li>")?;
//! assert_eq!(query.select_all(&updated, "li", false)?.len(), 3);
//! # Ok::<(), dom_facade::Error>(())
//! ```
//!
//! ## Features
//!
//! - **Selection**: CSS selectors via `dom_query`, XPath 1.0 via [`xpath`]
//! - **Mutation**: replace inner markup or remove by id, append children
//! - **Plugins**: ordered text-to-text transformations ([`plugin`])
//! - **Templates**: literal `{{key}}` substitution ([`template`])
//!
//! Every operation returns a [`Result`]; content and failures never share a
//! channel. The [`sentinel`] module flattens results into the legacy
//! `"Error: ..."` strings for callers that still expect them.

mod error;
mod facade;
mod options;

/// DOM operations adapter over `dom_query`.
pub mod dom;

/// Text-to-text plugin chain.
pub mod plugin;

/// `{{key}}` template rendering.
pub mod template;

/// XPath 1.0 evaluated on the `dom_query` tree.
pub mod xpath;

/// Legacy `"Error: ..."` string adapters.
pub mod sentinel;

/// Character encoding detection and transcoding.
pub mod encoding;

// Public API - re-exports
pub use error::{Error, Result};
pub use facade::{DocumentQuery, DocumentQueryBuilder};
pub use options::Options;
pub use plugin::{FnPlugin, Plugin, PluginChain};
pub use xpath::{XPathNode, XPathValue};

/// Render a template with a fresh context; see [`template::render_template`].
///
/// # Example
///
/// ```rust
/// let html = dom_facade::render_template("<p>{{name}}</p>", [("name", "Ana")]);
/// assert_eq!(html, "<p>Ana</p>");
/// ```
#[must_use]
pub fn render_template<I, K, V>(template: &str, context: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    template::render_template(template, context)
}
