//! XPath 1.0
//!
//! Evaluates XPath expressions directly against the `dom_query` tree, so
//! CSS and XPath queries share one parser and one document model.
//!
//! Covers the XPath 1.0 expression language without variables: absolute
//! and relative location paths over all thirteen axes with their
//! abbreviations, name / `*` / `text()` / `node()` / `comment()` /
//! `processing-instruction()` tests, predicates, unions, comparisons,
//! arithmetic, and the whole core function library. Element and attribute
//! names match case-insensitively, as HTML names do, and the `namespace`
//! axis is always empty.
//!
//! Expressions nested deeper than 128 levels are rejected at compile time.
//!
//! Results are owned [`XPathNode`] snapshots: the parsed document does not
//! outlive the call that produced it.

mod eval;
mod parser;

use serde::Serialize;

use crate::dom::{self, Document};
use crate::error::{Error, Result};

use eval::{Evaluator, Item, Value};

/// Owned snapshot of one node selected by an XPath expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum XPathNode {
    /// An element.
    Element {
        /// Lowercase tag name.
        name: String,
        /// Attributes in source order.
        attributes: Vec<(String, String)>,
        /// Visible text of the element.
        text: String,
        /// Serialized outer markup.
        markup: String,
    },
    /// A text node, content verbatim.
    Text {
        /// Raw text content.
        content: String,
    },
    /// An attribute selected through the `attribute` axis.
    Attribute {
        /// Attribute name.
        name: String,
        /// Attribute value.
        value: String,
    },
    /// A comment node.
    Comment {
        /// Comment text without the `<!--`/`-->` delimiters.
        content: String,
    },
    /// The document node (`/`).
    Document {
        /// Serialized document.
        markup: String,
    },
    /// Any other node kind (doctype, processing instruction).
    Other {
        /// Serialized node.
        markup: String,
    },
}

impl XPathNode {
    /// Text carried by the node: element text, text or comment content, or
    /// attribute value.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Element { text, .. } => text,
            Self::Text { content } | Self::Comment { content } => content,
            Self::Attribute { value, .. } => value,
            Self::Document { .. } | Self::Other { .. } => "",
        }
    }

    /// Serialized markup, for node kinds that have one.
    #[must_use]
    pub fn markup(&self) -> Option<&str> {
        match self {
            Self::Element { markup, .. } | Self::Document { markup } | Self::Other { markup } => {
                Some(markup)
            }
            Self::Text { .. } | Self::Comment { .. } | Self::Attribute { .. } => None,
        }
    }

    /// Element or attribute name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Element { name, .. } | Self::Attribute { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Result of an XPath expression of any type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum XPathValue {
    /// Node-set, in document order.
    Nodes(Vec<XPathNode>),
    /// String result.
    String(String),
    /// Number result.
    Number(f64),
    /// Boolean result.
    Boolean(bool),
}

/// A parsed XPath expression, reusable across documents.
///
/// # Example
///
/// ```rust
/// use dom_facade::{dom, xpath};
///
/// let expr = xpath::compile("//li[2]")?;
/// let doc = dom::parse("<ul><li>a</li><li>b</li></ul>");
/// let nodes = expr.select(&doc, true)?;
/// assert_eq!(nodes[0].text(), "b");
/// # Ok::<(), dom_facade::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    ast: parser::Expr,
}

/// Parse an XPath expression.
pub fn compile(expression: &str) -> Result<Expression> {
    let ast = parser::parse(expression).map_err(|reason| Error::invalid_xpath(expression, reason))?;
    Ok(Expression {
        source: expression.to_string(),
        ast,
    })
}

impl Expression {
    /// Evaluate against `doc`, returning a value of whatever type the
    /// expression produces.
    pub fn evaluate(&self, doc: &Document, collapse_whitespace: bool) -> Result<XPathValue> {
        let evaluator = Evaluator::new(doc.root());
        let value = evaluator
            .evaluate(&self.ast)
            .map_err(|reason| Error::invalid_xpath(&self.source, reason))?;
        Ok(match value {
            Value::Nodes(items) => XPathValue::Nodes(
                items
                    .iter()
                    .map(|item| snapshot(&evaluator, item, collapse_whitespace))
                    .collect(),
            ),
            Value::Str(s) => XPathValue::String(s),
            Value::Num(n) => XPathValue::Number(n),
            Value::Bool(b) => XPathValue::Boolean(b),
        })
    }

    /// Evaluate against `doc`, requiring a node-set result.
    pub fn select(&self, doc: &Document, collapse_whitespace: bool) -> Result<Vec<XPathNode>> {
        match self.evaluate(doc, collapse_whitespace)? {
            XPathValue::Nodes(nodes) => Ok(nodes),
            _ => Err(Error::invalid_xpath(
                &self.source,
                "expression does not select nodes",
            )),
        }
    }
}

fn snapshot(evaluator: &Evaluator<'_>, item: &Item<'_>, collapse: bool) -> XPathNode {
    match item {
        Item::Attr { name, value, .. } => XPathNode::Attribute {
            name: name.clone(),
            value: value.clone(),
        },
        Item::Node(node) if node.is_element() => XPathNode::Element {
            name: dom::tag_name(node).unwrap_or_default(),
            attributes: dom::attributes(node),
            text: dom::visible_text(node, collapse),
            markup: dom::outer_html(node),
        },
        Item::Node(node) if node.is_text() => XPathNode::Text {
            content: Evaluator::string_value(item),
        },
        Item::Node(node) if node.is_comment() => XPathNode::Comment {
            content: Evaluator::string_value(item),
        },
        Item::Node(node) if node.id == evaluator.root().id => XPathNode::Document {
            markup: dom::outer_html(node),
        },
        Item::Node(node) => XPathNode::Other {
            markup: dom::outer_html(node),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(html: &str, expression: &str) -> Vec<XPathNode> {
        let doc = dom::parse(html);
        compile(expression).unwrap().select(&doc, true).unwrap()
    }

    fn texts(nodes: &[XPathNode]) -> Vec<&str> {
        nodes.iter().map(XPathNode::text).collect()
    }

    const LIST: &str = r#"
        <div id="main">
            <ul id="list">
                <li class="a">one</li>
                <li class="b">two</li>
                <li class="a">three</li>
            </ul>
            <p>para <b>bold</b></p>
        </div>
    "#;

    #[test]
    fn selects_descendants_in_document_order() {
        let nodes = select(LIST, "//li");
        assert_eq!(texts(&nodes), vec!["one", "two", "three"]);
        assert_eq!(nodes[0].name(), Some("li"));
    }

    #[test]
    fn positional_and_last_predicates() {
        assert_eq!(texts(&select(LIST, "//li[2]")), vec!["two"]);
        assert_eq!(texts(&select(LIST, "//li[last()]")), vec!["three"]);
        assert_eq!(texts(&select(LIST, "//li[position() > 1]")), vec!["two", "three"]);
    }

    #[test]
    fn attribute_predicates() {
        assert_eq!(texts(&select(LIST, "//li[@class='a']")), vec!["one", "three"]);
        assert_eq!(texts(&select(LIST, "//li[@class!='a']")), vec!["two"]);
        assert_eq!(texts(&select(LIST, "//*[@id]")).len(), 2);
    }

    #[test]
    fn attribute_axis_returns_attributes() {
        let nodes = select(LIST, "//ul/@id");
        assert_eq!(
            nodes,
            vec![XPathNode::Attribute {
                name: "id".to_string(),
                value: "list".to_string(),
            }]
        );
    }

    #[test]
    fn text_nodes() {
        let nodes = select(LIST, "//p/text()");
        assert_eq!(
            nodes,
            vec![XPathNode::Text {
                content: "para ".to_string(),
            }]
        );
    }

    #[test]
    fn string_functions_in_predicates() {
        assert_eq!(texts(&select(LIST, "//li[contains(., 'o')]")), vec!["one", "two"]);
        assert_eq!(texts(&select(LIST, "//li[starts-with(text(), 't')]")), vec!["two", "three"]);
        assert_eq!(texts(&select(LIST, "//li[text()='two']")), vec!["two"]);
        assert_eq!(texts(&select(LIST, "//li[not(@class='a')]")), vec!["two"]);
    }

    #[test]
    fn parent_and_sibling_axes() {
        let parent = select(LIST, "//b/..");
        assert_eq!(parent[0].name(), Some("p"));

        let following = select(LIST, "//li[1]/following-sibling::li");
        assert_eq!(texts(&following), vec!["two", "three"]);

        // Reverse axis: position 1 is the nearest sibling.
        let preceding = select(LIST, "//li[3]/preceding-sibling::li[1]");
        assert_eq!(texts(&preceding), vec!["two"]);

        let ancestors = select(LIST, "//b/ancestor::*[@id]");
        assert_eq!(ancestors[0].name(), Some("div"));
    }

    #[test]
    fn union_is_sorted_and_deduplicated() {
        let nodes = select(LIST, "//p | //li[1] | //li");
        assert_eq!(texts(&nodes), vec!["one", "two", "three", "para bold"]);
    }

    #[test]
    fn filter_expression_with_trailing_path() {
        let nodes = select(LIST, "(//ul)[1]/li[@class='b']");
        assert_eq!(texts(&nodes), vec!["two"]);
    }

    #[test]
    fn names_match_case_insensitively() {
        assert_eq!(texts(&select(LIST, "//LI[@CLASS='b']")), vec!["two"]);
    }

    #[test]
    fn root_selects_document_node() {
        let nodes = select("<p>x</p>", "/");
        assert!(matches!(nodes.as_slice(), [XPathNode::Document { .. }]));
    }

    #[test]
    fn element_snapshot_carries_markup_and_attributes() {
        let nodes = select(r#"<a href="/x" class="c">link</a>"#, "//a");
        let XPathNode::Element { attributes, markup, .. } = &nodes[0] else {
            panic!("expected an element");
        };
        assert_eq!(attributes[0], ("href".to_string(), "/x".to_string()));
        assert_eq!(markup, r#"<a href="/x" class="c">link</a>"#);
    }

    #[test]
    fn empty_match_is_empty_vec() {
        assert!(select(LIST, "//table").is_empty());
    }

    #[test]
    fn scalar_results() {
        let doc = dom::parse(LIST);
        let count = compile("count(//li)").unwrap().evaluate(&doc, true).unwrap();
        assert_eq!(count, XPathValue::Number(3.0));

        let joined = compile("concat(//li[1], '-', //li[3])").unwrap().evaluate(&doc, true).unwrap();
        assert_eq!(joined, XPathValue::String("one-three".to_string()));

        let arithmetic = compile("(1 + 2) * 4 div 2 - 7 mod 4").unwrap().evaluate(&doc, true).unwrap();
        assert_eq!(arithmetic, XPathValue::Number(3.0));

        let boolean = compile("//li[@class='b'] and not(//table)").unwrap().evaluate(&doc, true).unwrap();
        assert_eq!(boolean, XPathValue::Boolean(true));
    }

    #[test]
    fn select_rejects_scalar_results() {
        let doc = dom::parse(LIST);
        let err = compile("count(//li)").unwrap().select(&doc, true).unwrap_err();
        assert!(matches!(err, Error::InvalidXPath { ref reason, .. } if reason.contains("does not select nodes")));
    }

    #[test]
    fn compile_reports_expression() {
        let err = compile("//li[").unwrap_err();
        assert!(matches!(err, Error::InvalidXPath { ref expression, .. } if expression == "//li["));
    }

    #[test]
    fn number_comparison_against_node_text() {
        let html = "<table><tr><td>5</td></tr><tr><td>15</td></tr></table>";
        let nodes = select(html, "//td[. > 10]");
        assert_eq!(texts(&nodes), vec!["15"]);
        let total = compile("sum(//td)").unwrap().evaluate(&dom::parse(html), true).unwrap();
        assert_eq!(total, XPathValue::Number(20.0));
    }

    fn value(html: &str, expression: &str) -> XPathValue {
        compile(expression).unwrap().evaluate(&dom::parse(html), true).unwrap()
    }

    fn scalar(expression: &str) -> XPathValue {
        value("<p>x</p>", expression)
    }

    #[test]
    fn substring_follows_xpath_rounding() {
        assert_eq!(scalar("substring('12345', 2, 3)"), XPathValue::String("234".to_string()));
        assert_eq!(scalar("substring('12345', 2)"), XPathValue::String("2345".to_string()));
        assert_eq!(scalar("substring('12345', 1.5, 2.6)"), XPathValue::String("234".to_string()));
        assert_eq!(scalar("substring('12345', 0, 3)"), XPathValue::String("12".to_string()));
        assert_eq!(scalar("substring('12345', 0 div 0, 3)"), XPathValue::String(String::new()));
        assert_eq!(
            scalar("substring('12345', -42, 1 div 0)"),
            XPathValue::String("12345".to_string())
        );
    }

    #[test]
    fn translate_maps_and_drops_characters() {
        assert_eq!(scalar("translate('bar', 'abc', 'ABC')"), XPathValue::String("BAr".to_string()));
        assert_eq!(scalar("translate('--aaa--', 'abc-', 'ABC')"), XPathValue::String("AAA".to_string()));
    }

    #[test]
    fn rounding_functions() {
        assert_eq!(scalar("round(2.5)"), XPathValue::Number(3.0));
        assert_eq!(scalar("round(-2.5)"), XPathValue::Number(-2.0));
        assert_eq!(scalar("floor(2.7)"), XPathValue::Number(2.0));
        assert_eq!(scalar("ceiling(2.1)"), XPathValue::Number(3.0));
    }

    #[test]
    fn substring_in_predicate() {
        assert_eq!(texts(&select(LIST, "//li[substring(., 1, 1) = 't']")), vec!["two", "three"]);
    }

    #[test]
    fn id_function_selects_by_whitespace_separated_ids() {
        let nodes = select(LIST, "id('list main')");
        let names: Vec<_> = nodes.iter().map(XPathNode::name).collect();
        assert_eq!(names, vec![Some("div"), Some("ul")]);
        assert!(select(LIST, "id('nope')").is_empty());
        assert_eq!(texts(&select(LIST, "id('list')/li[2]")), vec!["two"]);
    }

    #[test]
    fn lang_matches_nearest_declaration_and_subtags() {
        let html = r#"<div lang="en-GB"><p>a</p><p lang="fr">b</p></div>"#;
        assert_eq!(texts(&select(html, "//p[lang('en')]")), vec!["a"]);
        assert_eq!(texts(&select(html, "//p[lang('FR')]")), vec!["b"]);
        assert!(select(html, "//p[lang('de')]").is_empty());
    }

    #[test]
    fn following_and_preceding_axes() {
        let html = "<div><p>1</p><section><p>2</p></section></div><p>3</p>";
        assert_eq!(texts(&select(html, "//section/following::p")), vec!["3"]);
        assert_eq!(texts(&select(html, "(//p)[1]/following::p")), vec!["2", "3"]);
        assert_eq!(texts(&select(html, "(//p)[3]/preceding::p")), vec!["1", "2"]);
        // Reverse axis: position 1 is the nearest preceding node.
        assert_eq!(texts(&select(html, "(//p)[3]/preceding::p[1]")), vec!["2"]);
        // Ancestors are not preceding nodes.
        assert!(select(html, "//section/p/preceding::section").is_empty());
    }

    #[test]
    fn comment_nodes() {
        let nodes = select("<div><!-- note --><p>x</p></div>", "//div/comment()");
        assert_eq!(
            nodes,
            vec![XPathNode::Comment {
                content: " note ".to_string(),
            }]
        );
        assert_eq!(
            value("<div><!--a--><!--b--></div>", "count(//comment())"),
            XPathValue::Number(2.0)
        );
    }

    #[test]
    fn namespace_axis_and_uri_are_empty() {
        assert!(select(LIST, "//ul/namespace::*").is_empty());
        assert_eq!(value(LIST, "namespace-uri(//ul)"), XPathValue::String(String::new()));
        assert!(select(LIST, "//processing-instruction()").is_empty());
    }

    #[test]
    fn deeply_nested_expression_is_an_error() {
        let expression = format!("{}1{}", "(".repeat(1500), ")".repeat(1500));
        let err = compile(&expression).unwrap_err();
        assert!(matches!(err, Error::InvalidXPath { ref reason, .. } if reason.contains("nested too deeply")));
    }
}
