//! XPath evaluator over a `dom_query` tree.
//!
//! Node-sets are kept in document order, determined once per evaluation by a
//! pre-order walk from the document node. Attributes sort directly after
//! their owner element, in source order.

use std::collections::HashMap;

use dom_query::{NodeId, NodeRef};

use super::parser::{ArithOp, Axis, CmpOp, Expr, LocationPath, NodeTest, PResult, Step};
use crate::dom;

/// One member of a node-set.
#[derive(Clone)]
pub(crate) enum Item<'a> {
    Node(NodeRef<'a>),
    Attr {
        owner: NodeRef<'a>,
        index: usize,
        name: String,
        value: String,
    },
}

/// Result of evaluating an expression.
pub(crate) enum Value<'a> {
    Nodes(Vec<Item<'a>>),
    Str(String),
    Num(f64),
    Bool(bool),
}

#[derive(Clone)]
struct Context<'a> {
    item: Item<'a>,
    position: usize,
    size: usize,
}

pub(crate) struct Evaluator<'a> {
    root: NodeRef<'a>,
    order: HashMap<NodeId, usize>,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(root: NodeRef<'a>) -> Self {
        let mut order = HashMap::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            let next = order.len();
            order.insert(node.id, next);
            let children: Vec<NodeRef<'a>> = node.children().into_iter().collect();
            stack.extend(children.into_iter().rev());
        }
        Self { root, order }
    }

    /// Evaluate `expr` with the document node as context.
    pub(crate) fn evaluate(&self, expr: &Expr) -> PResult<Value<'a>> {
        let ctx = Context {
            item: Item::Node(self.root),
            position: 1,
            size: 1,
        };
        self.eval(expr, &ctx)
    }

    pub(crate) fn root(&self) -> NodeRef<'a> {
        self.root
    }

    // === Expressions ===

    fn eval(&self, expr: &Expr, ctx: &Context<'a>) -> PResult<Value<'a>> {
        Ok(match expr {
            Expr::Literal(s) => Value::Str(s.clone()),
            Expr::Number(n) => Value::Num(*n),
            Expr::Or(lhs, rhs) => {
                Value::Bool(self.truthy(lhs, ctx)? || self.truthy(rhs, ctx)?)
            }
            Expr::And(lhs, rhs) => {
                Value::Bool(self.truthy(lhs, ctx)? && self.truthy(rhs, ctx)?)
            }
            Expr::Compare(op, lhs, rhs) => {
                let lhs = self.eval(lhs, ctx)?;
                let rhs = self.eval(rhs, ctx)?;
                Value::Bool(self.compare(*op, &lhs, &rhs))
            }
            Expr::Arith(op, lhs, rhs) => {
                let a = self.number(&self.eval(lhs, ctx)?);
                let b = self.number(&self.eval(rhs, ctx)?);
                Value::Num(match op {
                    ArithOp::Add => a + b,
                    ArithOp::Sub => a - b,
                    ArithOp::Mul => a * b,
                    ArithOp::Div => a / b,
                    ArithOp::Mod => a % b,
                })
            }
            Expr::Negate(operand) => Value::Num(-self.number(&self.eval(operand, ctx)?)),
            Expr::Union(lhs, rhs) => {
                let mut items = self.node_set(lhs, ctx, "union operands")?;
                items.extend(self.node_set(rhs, ctx, "union operands")?);
                Value::Nodes(self.normalize(items))
            }
            Expr::Function(name, args) => self.call(name, args, ctx)?,
            Expr::Path(path) => Value::Nodes(self.eval_path(path, ctx)?),
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                let base = self.node_set(primary, ctx, "filtered expressions")?;
                let filtered = self.apply_predicates(self.normalize(base), predicates)?;
                Value::Nodes(self.apply_steps(filtered, steps)?)
            }
        })
    }

    fn truthy(&self, expr: &Expr, ctx: &Context<'a>) -> PResult<bool> {
        Ok(self.boolean(&self.eval(expr, ctx)?))
    }

    fn node_set(&self, expr: &Expr, ctx: &Context<'a>, what: &str) -> PResult<Vec<Item<'a>>> {
        match self.eval(expr, ctx)? {
            Value::Nodes(items) => Ok(items),
            _ => Err(format!("{what} must be node-sets")),
        }
    }

    // === Location paths ===

    fn eval_path(&self, path: &LocationPath, ctx: &Context<'a>) -> PResult<Vec<Item<'a>>> {
        let start = if path.absolute {
            vec![Item::Node(self.root)]
        } else {
            vec![ctx.item.clone()]
        };
        self.apply_steps(start, &path.steps)
    }

    fn apply_steps(&self, mut current: Vec<Item<'a>>, steps: &[Step]) -> PResult<Vec<Item<'a>>> {
        for step in steps {
            let mut next = Vec::new();
            for item in &current {
                let candidates: Vec<Item<'a>> = Self::axis(step.axis, item)
                    .into_iter()
                    .filter(|candidate| Self::node_test(step.axis, &step.test, candidate))
                    .collect();
                next.extend(self.apply_predicates(candidates, &step.predicates)?);
            }
            current = self.normalize(next);
        }
        Ok(current)
    }

    /// Filter `items` by each predicate in turn; positions are 1-based within
    /// the list as given (axis order for steps).
    fn apply_predicates(&self, mut items: Vec<Item<'a>>, predicates: &[Expr]) -> PResult<Vec<Item<'a>>> {
        for predicate in predicates {
            let size = items.len();
            let mut kept = Vec::with_capacity(size);
            for (index, item) in items.into_iter().enumerate() {
                let ctx = Context {
                    item: item.clone(),
                    position: index + 1,
                    size,
                };
                let keep = match self.eval(predicate, &ctx)? {
                    Value::Num(n) => n == (index + 1) as f64,
                    other => self.boolean(&other),
                };
                if keep {
                    kept.push(item);
                }
            }
            items = kept;
        }
        Ok(items)
    }

    /// Items reachable along `axis`, nearest first for reverse axes.
    fn axis(axis: Axis, item: &Item<'a>) -> Vec<Item<'a>> {
        let node = match item {
            Item::Node(node) => *node,
            Item::Attr { owner, .. } => {
                return match axis {
                    Axis::SelfAxis => vec![item.clone()],
                    Axis::Parent => vec![Item::Node(*owner)],
                    Axis::Ancestor => Self::ancestors(*owner, true),
                    Axis::AncestorOrSelf => {
                        let mut items = vec![item.clone()];
                        items.extend(Self::ancestors(*owner, true));
                        items
                    }
                    Axis::Following => {
                        let mut items = Self::descendants(*owner);
                        items.extend(Self::following(*owner));
                        items
                    }
                    Axis::Preceding => Self::preceding(*owner),
                    _ => Vec::new(),
                };
            }
        };

        match axis {
            Axis::Child => node.children().into_iter().map(Item::Node).collect(),
            Axis::Descendant => Self::descendants(node),
            Axis::DescendantOrSelf => {
                let mut items = vec![Item::Node(node)];
                items.extend(Self::descendants(node));
                items
            }
            Axis::Parent => node.parent().map(Item::Node).into_iter().collect(),
            Axis::Ancestor => Self::ancestors(node, false),
            Axis::AncestorOrSelf => Self::ancestors(node, true),
            Axis::SelfAxis => vec![Item::Node(node)],
            Axis::Attribute => {
                if !node.is_element() {
                    return Vec::new();
                }
                dom::attributes(&node)
                    .into_iter()
                    .enumerate()
                    .map(|(index, (name, value))| Item::Attr {
                        owner: node,
                        index,
                        name,
                        value,
                    })
                    .collect()
            }
            Axis::FollowingSibling => {
                let mut items = Vec::new();
                let mut sibling = node.next_sibling();
                while let Some(s) = sibling {
                    items.push(Item::Node(s));
                    sibling = s.next_sibling();
                }
                items
            }
            Axis::PrecedingSibling => {
                let mut items = Vec::new();
                let mut sibling = node.prev_sibling();
                while let Some(s) = sibling {
                    items.push(Item::Node(s));
                    sibling = s.prev_sibling();
                }
                items
            }
            Axis::Following => Self::following(node),
            Axis::Preceding => Self::preceding(node),
            // HTML documents carry no namespace nodes.
            Axis::Namespace => Vec::new(),
        }
    }

    /// Everything after `node` in document order, minus its descendants.
    fn following(node: NodeRef<'a>) -> Vec<Item<'a>> {
        let mut items = Vec::new();
        let mut current = Some(node);
        while let Some(anchor) = current {
            let mut sibling = anchor.next_sibling();
            while let Some(s) = sibling {
                items.push(Item::Node(s));
                items.extend(Self::descendants(s));
                sibling = s.next_sibling();
            }
            current = anchor.parent();
        }
        items
    }

    /// Everything before `node` in document order, minus its ancestors,
    /// nearest first.
    fn preceding(node: NodeRef<'a>) -> Vec<Item<'a>> {
        let mut items = Vec::new();
        let mut current = Some(node);
        while let Some(anchor) = current {
            let mut sibling = anchor.prev_sibling();
            while let Some(s) = sibling {
                let mut subtree = vec![Item::Node(s)];
                subtree.extend(Self::descendants(s));
                items.extend(subtree.into_iter().rev());
                sibling = s.prev_sibling();
            }
            current = anchor.parent();
        }
        items
    }

    fn descendants(node: NodeRef<'a>) -> Vec<Item<'a>> {
        let mut items = Vec::new();
        let mut stack: Vec<NodeRef<'a>> = node.children().into_iter().collect();
        stack.reverse();
        while let Some(current) = stack.pop() {
            items.push(Item::Node(current));
            let children: Vec<NodeRef<'a>> = current.children().into_iter().collect();
            stack.extend(children.into_iter().rev());
        }
        items
    }

    fn ancestors(node: NodeRef<'a>, include_self: bool) -> Vec<Item<'a>> {
        let mut items = Vec::new();
        if include_self {
            items.push(Item::Node(node));
        }
        let mut current = node.parent();
        while let Some(parent) = current {
            items.push(Item::Node(parent));
            current = parent.parent();
        }
        items
    }

    fn node_test(axis: Axis, test: &NodeTest, item: &Item<'a>) -> bool {
        match (item, test) {
            (Item::Attr { name, .. }, NodeTest::Name(wanted)) => {
                axis == Axis::Attribute && name.eq_ignore_ascii_case(wanted)
            }
            (Item::Attr { .. }, NodeTest::Any) => axis == Axis::Attribute,
            (Item::Attr { .. }, NodeTest::Node) => true,
            (
                Item::Attr { .. },
                NodeTest::Text | NodeTest::Comment | NodeTest::ProcessingInstruction(_),
            ) => false,
            (Item::Node(node), NodeTest::Name(wanted)) => {
                node.is_element()
                    && dom::tag_name(node).is_some_and(|tag| tag.eq_ignore_ascii_case(wanted))
            }
            (Item::Node(node), NodeTest::Any) => node.is_element(),
            (Item::Node(node), NodeTest::Text) => node.is_text(),
            (Item::Node(node), NodeTest::Comment) => node.is_comment(),
            (Item::Node(node), NodeTest::ProcessingInstruction(target)) => {
                dom::processing_instruction_target(node)
                    .is_some_and(|found| target.as_ref().is_none_or(|wanted| *wanted == found))
            }
            (Item::Node(_), NodeTest::Node) => true,
        }
    }

    // === Document order ===

    fn order_key(&self, item: &Item<'a>) -> (usize, usize) {
        let position = |node: &NodeRef<'a>| self.order.get(&node.id).copied().unwrap_or(usize::MAX);
        match item {
            Item::Node(node) => (position(node), 0),
            Item::Attr { owner, index, .. } => (position(owner), index + 1),
        }
    }

    /// Sort into document order and drop duplicates.
    pub(crate) fn normalize(&self, mut items: Vec<Item<'a>>) -> Vec<Item<'a>> {
        items.sort_by_key(|item| self.order_key(item));
        items.dedup_by(|a, b| self.order_key(a) == self.order_key(b));
        items
    }

    // === Conversions ===

    pub(crate) fn string_value(item: &Item<'a>) -> String {
        match item {
            Item::Node(node) => dom::comment_text(node).unwrap_or_else(|| node.text().to_string()),
            Item::Attr { value, .. } => value.clone(),
        }
    }

    fn node_name(item: &Item<'a>) -> String {
        match item {
            Item::Node(node) if node.is_element() => dom::tag_name(node).unwrap_or_default(),
            Item::Node(_) => String::new(),
            Item::Attr { name, .. } => name.clone(),
        }
    }

    fn string(&self, value: &Value<'a>) -> String {
        match value {
            Value::Nodes(items) => items.first().map(Self::string_value).unwrap_or_default(),
            Value::Str(s) => s.clone(),
            Value::Num(n) => format_number(*n),
            Value::Bool(b) => b.to_string(),
        }
    }

    fn number(&self, value: &Value<'a>) -> f64 {
        match value {
            Value::Num(n) => *n,
            Value::Bool(b) => f64::from(u8::from(*b)),
            other => parse_number(&self.string(other)),
        }
    }

    fn boolean(&self, value: &Value<'a>) -> bool {
        match value {
            Value::Nodes(items) => !items.is_empty(),
            Value::Str(s) => !s.is_empty(),
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Bool(b) => *b,
        }
    }

    // === Comparisons ===

    fn compare(&self, op: CmpOp, lhs: &Value<'a>, rhs: &Value<'a>) -> bool {
        match (lhs, rhs) {
            (Value::Nodes(a), Value::Nodes(b)) => a.iter().any(|x| {
                let x = Value::Str(Self::string_value(x));
                b.iter()
                    .any(|y| self.compare_atomic(op, &x, &Value::Str(Self::string_value(y))))
            }),
            (Value::Nodes(a), Value::Bool(b)) => {
                self.compare_atomic(op, &Value::Bool(!a.is_empty()), &Value::Bool(*b))
            }
            (Value::Bool(a), Value::Nodes(b)) => {
                self.compare_atomic(op, &Value::Bool(*a), &Value::Bool(!b.is_empty()))
            }
            (Value::Nodes(a), other) => a
                .iter()
                .any(|x| self.compare_atomic(op, &Value::Str(Self::string_value(x)), other)),
            (other, Value::Nodes(b)) => b
                .iter()
                .any(|y| self.compare_atomic(op, other, &Value::Str(Self::string_value(y)))),
            (a, b) => self.compare_atomic(op, a, b),
        }
    }

    fn compare_atomic(&self, op: CmpOp, lhs: &Value<'a>, rhs: &Value<'a>) -> bool {
        match op {
            CmpOp::Eq | CmpOp::Ne => {
                let equal = if matches!(lhs, Value::Bool(_)) || matches!(rhs, Value::Bool(_)) {
                    self.boolean(lhs) == self.boolean(rhs)
                } else if matches!(lhs, Value::Num(_)) || matches!(rhs, Value::Num(_)) {
                    self.number(lhs) == self.number(rhs)
                } else {
                    self.string(lhs) == self.string(rhs)
                };
                equal == (op == CmpOp::Eq)
            }
            CmpOp::Lt => self.number(lhs) < self.number(rhs),
            CmpOp::Le => self.number(lhs) <= self.number(rhs),
            CmpOp::Gt => self.number(lhs) > self.number(rhs),
            CmpOp::Ge => self.number(lhs) >= self.number(rhs),
        }
    }

    // === Functions ===

    fn call(&self, name: &str, args: &[Expr], ctx: &Context<'a>) -> PResult<Value<'a>> {
        let arg = |index: usize| -> PResult<Value<'a>> {
            let expr = args
                .get(index)
                .ok_or_else(|| format!("function `{name}()` is missing argument {}", index + 1))?;
            self.eval(expr, ctx)
        };
        let string_or_context = || -> PResult<String> {
            if args.is_empty() {
                Ok(Self::string_value(&ctx.item))
            } else {
                Ok(self.string(&arg(0)?))
            }
        };

        Ok(match name {
            "last" => Value::Num(ctx.size as f64),
            "position" => Value::Num(ctx.position as f64),
            "count" => match arg(0)? {
                Value::Nodes(items) => Value::Num(items.len() as f64),
                _ => return Err("count() expects a node-set".to_string()),
            },
            "sum" => match arg(0)? {
                Value::Nodes(items) => Value::Num(
                    items
                        .iter()
                        .map(|item| parse_number(&Self::string_value(item)))
                        .sum(),
                ),
                _ => return Err("sum() expects a node-set".to_string()),
            },
            "contains" => {
                let haystack = self.string(&arg(0)?);
                Value::Bool(haystack.contains(self.string(&arg(1)?).as_str()))
            }
            "starts-with" => {
                let haystack = self.string(&arg(0)?);
                Value::Bool(haystack.starts_with(self.string(&arg(1)?).as_str()))
            }
            "substring-before" => {
                let haystack = self.string(&arg(0)?);
                let needle = self.string(&arg(1)?);
                Value::Str(
                    haystack
                        .find(needle.as_str())
                        .map(|at| haystack[..at].to_string())
                        .unwrap_or_default(),
                )
            }
            "substring-after" => {
                let haystack = self.string(&arg(0)?);
                let needle = self.string(&arg(1)?);
                Value::Str(
                    haystack
                        .find(needle.as_str())
                        .map(|at| haystack[at + needle.len()..].to_string())
                        .unwrap_or_default(),
                )
            }
            "substring" => {
                let text = self.string(&arg(0)?);
                let start = xpath_round(self.number(&arg(1)?));
                let end = if args.len() > 2 {
                    start + xpath_round(self.number(&arg(2)?))
                } else {
                    f64::INFINITY
                };
                Value::Str(
                    text.chars()
                        .enumerate()
                        .filter(|(index, _)| {
                            let position = (index + 1) as f64;
                            position >= start && position < end
                        })
                        .map(|(_, c)| c)
                        .collect(),
                )
            }
            "translate" => {
                let text = self.string(&arg(0)?);
                let from: Vec<char> = self.string(&arg(1)?).chars().collect();
                let to: Vec<char> = self.string(&arg(2)?).chars().collect();
                Value::Str(
                    text.chars()
                        .filter_map(|c| match from.iter().position(|&f| f == c) {
                            Some(index) => to.get(index).copied(),
                            None => Some(c),
                        })
                        .collect(),
                )
            }
            "string" => Value::Str(string_or_context()?),
            "normalize-space" => Value::Str(dom::collapse_whitespace(&string_or_context()?)),
            "string-length" => Value::Num(string_or_context()?.chars().count() as f64),
            "concat" => {
                let mut joined = String::new();
                for index in 0..args.len() {
                    joined.push_str(&self.string(&arg(index)?));
                }
                Value::Str(joined)
            }
            "not" => Value::Bool(!self.boolean(&arg(0)?)),
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            "boolean" => Value::Bool(self.boolean(&arg(0)?)),
            "lang" => {
                let wanted = self.string(&arg(0)?).to_ascii_lowercase();
                Value::Bool(Self::language(&ctx.item).is_some_and(|lang| {
                    let lang = lang.to_ascii_lowercase();
                    lang == wanted
                        || lang
                            .strip_prefix(wanted.as_str())
                            .is_some_and(|rest| rest.starts_with('-'))
                }))
            }
            "floor" => Value::Num(self.number(&arg(0)?).floor()),
            "ceiling" => Value::Num(self.number(&arg(0)?).ceil()),
            "round" => Value::Num(xpath_round(self.number(&arg(0)?))),
            "id" => {
                let ids: Vec<String> = match arg(0)? {
                    Value::Nodes(items) => items.iter().map(Self::string_value).collect(),
                    other => vec![self.string(&other)],
                };
                let wanted: Vec<&str> = ids.iter().flat_map(|value| value.split_whitespace()).collect();
                Value::Nodes(self.elements_with_ids(&wanted))
            }
            "namespace-uri" => {
                if let Some(expr) = args.first() {
                    if !matches!(self.eval(expr, ctx)?, Value::Nodes(_)) {
                        return Err("namespace-uri() expects a node-set".to_string());
                    }
                }
                // HTML names are matched without namespaces.
                Value::Str(String::new())
            }
            "number" => {
                if args.is_empty() {
                    Value::Num(parse_number(&Self::string_value(&ctx.item)))
                } else {
                    Value::Num(self.number(&arg(0)?))
                }
            }
            "name" | "local-name" => {
                if args.is_empty() {
                    Value::Str(Self::node_name(&ctx.item))
                } else {
                    match arg(0)? {
                        Value::Nodes(items) => {
                            Value::Str(items.first().map(Self::node_name).unwrap_or_default())
                        }
                        _ => return Err(format!("{name}() expects a node-set")),
                    }
                }
            }
            other => return Err(format!("unknown function `{other}()`")),
        })
    }

    /// Elements whose `id` attribute is one of `ids`, in document order.
    fn elements_with_ids(&self, ids: &[&str]) -> Vec<Item<'a>> {
        if ids.is_empty() {
            return Vec::new();
        }
        Self::descendants(self.root)
            .into_iter()
            .filter(|item| match item {
                Item::Node(node) => {
                    node.is_element()
                        && dom::get_attribute(node, "id").is_some_and(|id| ids.contains(&id.as_str()))
                }
                Item::Attr { .. } => false,
            })
            .collect()
    }

    /// Language in scope for `item`: the nearest `lang` or `xml:lang`.
    fn language(item: &Item<'a>) -> Option<String> {
        let start = match item {
            Item::Node(node) => *node,
            Item::Attr { owner, .. } => *owner,
        };
        Self::ancestors(start, true).iter().find_map(|item| match item {
            Item::Node(node) if node.is_element() => dom::get_attribute(node, "xml:lang")
                .or_else(|| dom::get_attribute(node, "lang")),
            _ => None,
        })
    }
}

/// XPath `round()`: halves round towards positive infinity.
fn xpath_round(n: f64) -> f64 {
    if n.is_finite() {
        (n + 0.5).floor()
    } else {
        n
    }
}

/// XPath `number()` conversion: optional minus, digits, optional fraction.
/// Anything else is NaN.
fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    let unsigned = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let valid = !unsigned.is_empty()
        && unsigned.chars().any(|c| c.is_ascii_digit())
        && unsigned.chars().all(|c| c.is_ascii_digit() || c == '.')
        && unsigned.matches('.').count() <= 1;
    if valid {
        trimmed.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

/// XPath `string()` conversion of a number.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        String::from(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_number_follows_xpath_grammar() {
        assert_eq!(parse_number(" 42 "), 42.0);
        assert_eq!(parse_number("-1.5"), -1.5);
        assert_eq!(parse_number(".5"), 0.5);
        assert!(parse_number("1e3").is_nan());
        assert!(parse_number("inf").is_nan());
        assert!(parse_number("").is_nan());
        assert!(parse_number("1.2.3").is_nan());
    }

    #[test]
    fn format_number_drops_integral_fraction() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.25), "0.25");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn xpath_round_rounds_halves_up() {
        assert_eq!(xpath_round(2.5), 3.0);
        assert_eq!(xpath_round(-2.5), -2.0);
        assert_eq!(xpath_round(1.4), 1.0);
        assert!(xpath_round(f64::NAN).is_nan());
        assert_eq!(xpath_round(f64::INFINITY), f64::INFINITY);
    }
}
