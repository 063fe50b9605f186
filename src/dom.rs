//! DOM Operations Adapter
//!
//! Thin layer over the `dom_query` crate. Every facade operation reaches the
//! DOM engine through these functions, so the engine's quirks (selector
//! compilation errors, text node handling, serialization scope) are handled
//! in one place.

use std::panic::{self, AssertUnwindSafe};

pub use dom_query::{Document, Matcher, NodeRef, Selection};

use dom_query::NodeData;

use crate::error::{Error, Result};

/// Elements whose text children are not part of the visible text of an
/// enclosing element.
const NON_VISIBLE_TAGS: &[&str] = &["script", "style", "template", "noscript"];

// === Parsing ===

/// Parse an HTML string into a document.
///
/// Never fails: html5ever repairs malformed input into a best-effort tree.
#[inline]
#[must_use]
pub fn parse(html: &str) -> Document {
    Document::from(html)
}

/// Compile a CSS selector, reporting syntax errors instead of panicking.
///
/// `Document::select` panics on an invalid selector, so the facade always
/// compiles first and selects with the resulting [`Matcher`].
pub fn compile_selector(selector: &str) -> Result<Matcher> {
    Matcher::new(selector).map_err(|err| Error::InvalidSelector {
        selector: selector.to_string(),
        reason: format!("{err:?}"),
    })
}

/// Select every element matching `matcher`, in document order.
#[inline]
#[must_use]
pub fn select_all<'a>(doc: &'a Document, matcher: &Matcher) -> Selection<'a> {
    doc.select_matcher(matcher)
}

/// Select the first element matching `matcher`, if any.
#[must_use]
pub fn select_first<'a>(doc: &'a Document, matcher: &Matcher) -> Option<NodeRef<'a>> {
    doc.select_matcher(matcher).nodes().first().copied()
}

/// Find the element whose `id` attribute equals `id` exactly.
///
/// Walks the tree instead of compiling `#id`, so ids that are not valid CSS
/// identifiers (`"1st"`, `"a.b"`) still resolve.
#[must_use]
pub fn find_by_id<'a>(doc: &'a Document, id: &str) -> Option<NodeRef<'a>> {
    doc.root()
        .descendants()
        .into_iter()
        .find(|node| node.is_element() && node.attr("id").is_some_and(|value| &*value == id))
}

// === Extraction ===

/// Get tag name (lowercase)
#[must_use]
pub fn tag_name(node: &NodeRef) -> Option<String> {
    node.node_name().map(|t| t.to_ascii_lowercase())
}

/// Get an attribute value of a node
#[inline]
#[must_use]
pub fn get_attribute(node: &NodeRef, name: &str) -> Option<String> {
    node.attr(name).map(|s| s.to_string())
}

/// Get all attributes as name/value pairs, in source order.
#[must_use]
pub fn attributes(node: &NodeRef) -> Vec<(String, String)> {
    node.attrs()
        .iter()
        .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
        .collect()
}

/// Visual block boundaries: text on either side is separated by a space.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "caption", "dd", "details", "dialog",
    "div", "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3",
    "h4", "h5", "h6", "header", "hgroup", "hr", "li", "main", "nav", "ol", "p", "pre",
    "section", "summary", "table", "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

enum Walk<'a> {
    Enter(NodeRef<'a>),
    Leave,
}

/// Visible text of a node.
///
/// Text inside nested `script`/`style`/`template`/`noscript` elements is
/// skipped. A node that is itself one of those still yields its own text.
/// Text on either side of a block element or `<br>` is separated by a
/// single space, never inserted next to existing whitespace. With
/// `collapse` set, whitespace runs become single spaces and the result is
/// trimmed.
#[must_use]
pub fn visible_text(node: &NodeRef, collapse: bool) -> String {
    if node.is_text() {
        return finish_text(&node.text(), collapse);
    }

    let mut raw = String::new();
    let mut boundary = false;
    let mut stack: Vec<Walk> = node.children().into_iter().rev().map(Walk::Enter).collect();
    while let Some(step) = stack.pop() {
        let child = match step {
            Walk::Leave => {
                boundary = true;
                continue;
            }
            Walk::Enter(child) => child,
        };

        if child.is_text() {
            let text = child.text();
            if text.is_empty() {
                continue;
            }
            if boundary
                && !raw.is_empty()
                && !raw.ends_with(char::is_whitespace)
                && !text.starts_with(char::is_whitespace)
            {
                raw.push(' ');
            }
            boundary = false;
            raw.push_str(&text);
        } else if child.is_element() {
            let tag = tag_name(&child).unwrap_or_default();
            if NON_VISIBLE_TAGS.contains(&tag.as_str()) {
                continue;
            }
            if BLOCK_TAGS.contains(&tag.as_str()) {
                boundary = true;
                stack.push(Walk::Leave);
            }
            stack.extend(child.children().into_iter().rev().map(Walk::Enter));
        }
    }
    finish_text(&raw, collapse)
}

fn finish_text(raw: &str, collapse: bool) -> String {
    if collapse {
        collapse_whitespace(raw)
    } else {
        raw.to_string()
    }
}

/// Collapse whitespace runs to single spaces and trim the ends.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Serialized outer markup of a node.
#[must_use]
pub fn outer_html(node: &NodeRef) -> String {
    Selection::from(*node).html().to_string()
}

/// Contents of a comment node, `None` for any other node kind.
#[must_use]
pub fn comment_text(node: &NodeRef) -> Option<String> {
    node.query(|tree_node| match &tree_node.data {
        NodeData::Comment { contents } => Some(contents.to_string()),
        _ => None,
    })
    .flatten()
}

/// Target of a processing-instruction node, `None` for any other node kind.
#[must_use]
pub fn processing_instruction_target(node: &NodeRef) -> Option<String> {
    node.query(|tree_node| match &tree_node.data {
        NodeData::ProcessingInstruction { target, .. } => Some(target.to_string()),
        _ => None,
    })
    .flatten()
}

// === Tree Manipulation ===

/// Replace the children of `node` with the parsed `markup`.
#[inline]
pub fn set_inner_html(node: &NodeRef, markup: &str) {
    Selection::from(*node).set_html(markup);
}

/// Parse `markup` and append the resulting nodes as last children of `node`.
#[inline]
pub fn append_html(node: &NodeRef, markup: &str) {
    Selection::from(*node).append_html(markup);
}

/// Detach `node` (and its subtree) from the tree.
#[inline]
pub fn remove(node: &NodeRef) {
    Selection::from(*node).remove();
}

// === Serialization ===

/// Serialize the document.
///
/// With `fragment_only` set, only the inner markup of `<body>` is returned,
/// which round-trips a fragment input without the implied `html`/`head`/
/// `body` wrappers.
#[must_use]
pub fn serialize(doc: &Document, fragment_only: bool) -> String {
    if fragment_only {
        doc.select("body").inner_html().to_string()
    } else {
        doc.html().to_string()
    }
}

// === Failure boundary ===

/// Run `op` with engine panics converted into [`Error::ParseError`].
///
/// `dom_query` asserts on some internal invariants; a panic there must not
/// cross the facade boundary. The process panic hook still runs before the
/// panic is caught, so the default hook prints the message to stderr;
/// binaries wanting quiet output install their own hook, as `query_stdin`
/// does.
pub fn guarded<T>(operation: &str, op: impl FnOnce() -> Result<T>) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(op)).unwrap_or_else(|payload| {
        let detail = payload
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown engine failure".to_string());
        tracing::warn!(operation, %detail, "DOM engine panicked");
        Err(Error::ParseError(format!("{operation}: {detail}")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_selector_rejects_garbage() {
        let err = compile_selector("p[").err();
        assert!(matches!(err, Some(Error::InvalidSelector { .. })));
    }

    #[test]
    fn test_select_all_in_document_order() {
        let doc = parse(r#"<ul><li>1</li><li>2</li><li>3</li></ul>"#);
        let matcher = compile_selector("li").unwrap();
        let texts: Vec<String> = select_all(&doc, &matcher)
            .nodes()
            .iter()
            .map(|n| visible_text(n, true))
            .collect();
        assert_eq!(texts, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_select_first_none() {
        let doc = parse("<div>content</div>");
        let matcher = compile_selector("span").unwrap();
        assert!(select_first(&doc, &matcher).is_none());
    }

    #[test]
    fn test_find_by_id_non_css_identifier() {
        let doc = parse(r#"<p id="1st">one</p><p id="a.b">two</p>"#);
        let first = find_by_id(&doc, "1st").unwrap();
        let dotted = find_by_id(&doc, "a.b").unwrap();
        assert_eq!(visible_text(&first, true), "one");
        assert_eq!(visible_text(&dotted, true), "two");
        assert!(find_by_id(&doc, "missing").is_none());
    }

    #[test]
    fn test_visible_text_skips_nested_script() {
        let doc = parse("<div>Hello <script>var x = 1;</script>world</div>");
        let matcher = compile_selector("div").unwrap();
        let div = select_first(&doc, &matcher).unwrap();
        assert_eq!(visible_text(&div, true), "Hello world");
    }

    #[test]
    fn test_visible_text_of_script_itself() {
        let doc = parse("<div><script>var x = 1;</script></div>");
        let matcher = compile_selector("script").unwrap();
        let script = select_first(&doc, &matcher).unwrap();
        assert_eq!(visible_text(&script, true), "var x = 1;");
    }

    #[test]
    fn test_visible_text_without_collapse() {
        let doc = parse("<p>  a\n  b </p>");
        let matcher = compile_selector("p").unwrap();
        let p = select_first(&doc, &matcher).unwrap();
        assert_eq!(visible_text(&p, false), "  a\n  b ");
        assert_eq!(visible_text(&p, true), "a b");
    }

    #[test]
    fn test_outer_html() {
        let doc = parse(r#"<div id="a"><span>hi</span></div>"#);
        let div = find_by_id(&doc, "a").unwrap();
        assert_eq!(outer_html(&div), r#"<div id="a"><span>hi</span></div>"#);
    }

    #[test]
    fn test_visible_text_separates_blocks() {
        let doc = parse("<div><p>a</p><p>b</p></div><ul><li>one</li><li>two</li></ul>");
        let div = select_first(&doc, &compile_selector("div").unwrap()).unwrap();
        let list = select_first(&doc, &compile_selector("ul").unwrap()).unwrap();
        assert_eq!(visible_text(&div, true), "a b");
        assert_eq!(visible_text(&list, true), "one two");
    }

    #[test]
    fn test_visible_text_breaks_at_br_and_after_blocks() {
        let doc = parse("<p>line1<br>line2</p><section><div>x</div>tail</section>");
        let p = select_first(&doc, &compile_selector("p").unwrap()).unwrap();
        let section = select_first(&doc, &compile_selector("section").unwrap()).unwrap();
        assert_eq!(visible_text(&p, true), "line1 line2");
        assert_eq!(visible_text(&section, true), "x tail");
    }

    #[test]
    fn test_visible_text_keeps_inline_runs_together() {
        let doc = parse("<p>con<b>cat</b><i>enated</i> word</p>");
        let p = select_first(&doc, &compile_selector("p").unwrap()).unwrap();
        assert_eq!(visible_text(&p, true), "concatenated word");
        assert_eq!(visible_text(&p, false), "concatenated word");
    }

    #[test]
    fn test_comment_text() {
        let doc = parse("<div><!-- note --><p>x</p></div>");
        let div = select_first(&doc, &compile_selector("div").unwrap()).unwrap();
        let children = div.children();
        assert_eq!(comment_text(&children[0]), Some(" note ".to_string()));
        assert_eq!(comment_text(&children[1]), None);
        assert_eq!(processing_instruction_target(&children[0]), None);
    }

    #[test]
    fn test_attributes_in_source_order() {
        let doc = parse(r#"<a href="/x" class="link" title="X">x</a>"#);
        let matcher = compile_selector("a").unwrap();
        let a = select_first(&doc, &matcher).unwrap();
        let attrs = attributes(&a);
        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs[0], ("href".to_string(), "/x".to_string()));
        assert_eq!(get_attribute(&a, "title"), Some("X".to_string()));
        assert_eq!(get_attribute(&a, "rel"), None);
    }

    #[test]
    fn test_mutations() {
        let doc = parse(r#"<div id="box">old</div><p id="gone">x</p>"#);
        let boxed = find_by_id(&doc, "box").unwrap();
        set_inner_html(&boxed, "<b>new</b>");
        append_html(&boxed, "<i>tail</i>");
        remove(&find_by_id(&doc, "gone").unwrap());

        let out = serialize(&doc, true);
        assert_eq!(out, r#"<div id="box"><b>new</b><i>tail</i></div>"#);
    }

    #[test]
    fn test_serialize_full_document() {
        let doc = parse("<p>x</p>");
        let out = serialize(&doc, false);
        assert!(out.starts_with("<html>"));
        assert!(out.contains("<body><p>x</p></body>"));
    }

    #[test]
    fn test_guarded_converts_panics() {
        let result: Result<()> = guarded("select", || panic!("boom"));
        assert_eq!(result, Err(Error::ParseError("select: boom".to_string())));
    }

    #[test]
    fn test_guarded_passes_through() {
        let result = guarded("select", || Ok(7));
        assert_eq!(result, Ok(7));
    }
}
