//! XPath 1.0 lexer and recursive-descent parser.
//!
//! Operator names (`and`, `or`, `div`, `mod`) and `*` are disambiguated by
//! parser position rather than in the lexer: where an operator is expected
//! they are operators, where a step is expected they are name tests.

/// Parser diagnostics are plain strings; the caller attaches the expression.
pub(crate) type PResult<T> = std::result::Result<T, String>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Comma,
    Pipe,
    Dot,
    DotDot,
    DoubleColon,
    Star,
    Plus,
    Minus,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    Literal(String),
    Number(f64),
    Name(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Parent,
    Ancestor,
    AncestorOrSelf,
    SelfAxis,
    Attribute,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
    Namespace,
}

impl Axis {
    fn from_name(name: &str) -> PResult<Self> {
        Ok(match name {
            "child" => Self::Child,
            "descendant" => Self::Descendant,
            "descendant-or-self" => Self::DescendantOrSelf,
            "parent" => Self::Parent,
            "ancestor" => Self::Ancestor,
            "ancestor-or-self" => Self::AncestorOrSelf,
            "self" => Self::SelfAxis,
            "attribute" => Self::Attribute,
            "following-sibling" => Self::FollowingSibling,
            "preceding-sibling" => Self::PrecedingSibling,
            "following" => Self::Following,
            "preceding" => Self::Preceding,
            "namespace" => Self::Namespace,
            other => return Err(format!("unsupported axis `{other}`")),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NodeTest {
    Name(String),
    Any,
    Text,
    Node,
    Comment,
    ProcessingInstruction(Option<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

impl Step {
    fn abbreviated(axis: Axis) -> Self {
        Self {
            axis,
            test: NodeTest::Node,
            predicates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LocationPath {
    pub absolute: bool,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
    Negate(Box<Expr>),
    Union(Box<Expr>, Box<Expr>),
    Literal(String),
    Number(f64),
    Function(String, Vec<Expr>),
    Path(LocationPath),
    Filter {
        primary: Box<Expr>,
        predicates: Vec<Expr>,
        steps: Vec<Step>,
    },
}

/// The XPath 1.0 core function library with (min, max) arity.
const FUNCTIONS: &[(&str, usize, usize)] = &[
    // node-set
    ("last", 0, 0),
    ("position", 0, 0),
    ("count", 1, 1),
    ("id", 1, 1),
    ("local-name", 0, 1),
    ("namespace-uri", 0, 1),
    ("name", 0, 1),
    // string
    ("string", 0, 1),
    ("concat", 2, usize::MAX),
    ("starts-with", 2, 2),
    ("contains", 2, 2),
    ("substring-before", 2, 2),
    ("substring-after", 2, 2),
    ("substring", 2, 3),
    ("string-length", 0, 1),
    ("normalize-space", 0, 1),
    ("translate", 3, 3),
    // boolean
    ("boolean", 1, 1),
    ("not", 1, 1),
    ("true", 0, 0),
    ("false", 0, 0),
    ("lang", 1, 1),
    // number
    ("number", 0, 1),
    ("sum", 1, 1),
    ("floor", 1, 1),
    ("ceiling", 1, 1),
    ("round", 1, 1),
];

/// Deepest nesting accepted, both while parsing and in the finished tree.
/// Keeps parser and evaluator recursion well inside a thread stack.
pub(crate) const MAX_DEPTH: usize = 128;

const TOO_DEEP: &str = "expression nested too deeply";

const NODE_TYPES: &[&str] = &["text", "node", "comment", "processing-instruction"];

// === Lexer ===

pub(crate) fn tokenize(input: &str) -> PResult<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '/' if next == Some('/') => {
                tokens.push(Token::DoubleSlash);
                i += 2;
                continue;
            }
            '.' if next == Some('.') => {
                tokens.push(Token::DotDot);
                i += 2;
                continue;
            }
            '.' if next.is_some_and(|n| n.is_ascii_digit()) => {
                let (number, end) = lex_number(&chars, i);
                tokens.push(Token::Number(number));
                i = end;
                continue;
            }
            ':' if next == Some(':') => {
                tokens.push(Token::DoubleColon);
                i += 2;
                continue;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Neq);
                i += 2;
                continue;
            }
            '<' if next == Some('=') => {
                tokens.push(Token::Le);
                i += 2;
                continue;
            }
            '>' if next == Some('=') => {
                tokens.push(Token::Ge);
                i += 2;
                continue;
            }
            '"' | '\'' => {
                let close = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == c)
                    .ok_or_else(|| "unterminated string literal".to_string())?;
                let literal: String = chars[i + 1..i + 1 + close].iter().collect();
                tokens.push(Token::Literal(literal));
                i += close + 2;
                continue;
            }
            c if c.is_ascii_digit() => {
                let (number, end) = lex_number(&chars, i);
                tokens.push(Token::Number(number));
                i = end;
                continue;
            }
            c if is_name_start(c) => {
                let start = i;
                while i < chars.len() && is_name_char(chars[i]) {
                    i += 1;
                }
                tokens.push(Token::Name(chars[start..i].iter().collect()));
                continue;
            }
            _ => {}
        }

        let token = match c {
            '/' => Token::Slash,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '@' => Token::At,
            ',' => Token::Comma,
            '|' => Token::Pipe,
            '.' => Token::Dot,
            '*' => Token::Star,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '=' => Token::Eq,
            '<' => Token::Lt,
            '>' => Token::Gt,
            '$' => return Err("variable references are not supported".to_string()),
            other => return Err(format!("unexpected character `{other}`")),
        };
        tokens.push(token);
        i += 1;
    }

    Ok(tokens)
}

fn lex_number(chars: &[char], start: usize) -> (f64, usize) {
    let mut end = start;
    let mut seen_dot = false;
    while end < chars.len() {
        let ch = chars[end];
        if ch.is_ascii_digit() {
            end += 1;
        } else if ch == '.' && !seen_dot {
            seen_dot = true;
            end += 1;
        } else {
            break;
        }
    }
    let text: String = chars[start..end].iter().collect();
    (text.parse().unwrap_or(f64::NAN), end)
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

// === Parser ===

pub(crate) fn parse(input: &str) -> PResult<Expr> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        nesting: 0,
    };
    let parsed = parser.parse_expr()?;
    match parser.peek() {
        None => Ok(parsed.expr),
        Some(token) => Err(format!("unexpected token {token:?}")),
    }
}

/// An expression together with the depth of its tree.
struct Parsed {
    expr: Expr,
    depth: usize,
}

impl Parsed {
    fn leaf(expr: Expr) -> Self {
        Self { expr, depth: 1 }
    }

    /// Wrap `expr` one level above children at most `child_depth` deep.
    fn wrap(child_depth: usize, expr: Expr) -> PResult<Self> {
        let depth = child_depth + 1;
        if depth > MAX_DEPTH {
            return Err(TOO_DEEP.to_string());
        }
        Ok(Self { expr, depth })
    }

    fn join(
        lhs: Self,
        rhs: Self,
        build: impl FnOnce(Box<Expr>, Box<Expr>) -> Expr,
    ) -> PResult<Self> {
        Self::wrap(
            lhs.depth.max(rhs.depth),
            build(Box::new(lhs.expr), Box::new(rhs.expr)),
        )
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    nesting: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: &Token) -> PResult<()> {
        match self.bump() {
            Some(ref token) if token == expected => Ok(()),
            Some(token) => Err(format!("expected {expected:?}, found {token:?}")),
            None => Err(format!("expected {expected:?}, found end of expression")),
        }
    }

    fn peek_operator_name(&self, name: &str) -> bool {
        matches!(self.peek(), Some(Token::Name(n)) if n == name)
    }

    /// Run `f` one recursion level deeper, failing past [`MAX_DEPTH`].
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.nesting >= MAX_DEPTH {
            return Err(TOO_DEEP.to_string());
        }
        self.nesting += 1;
        let result = f(self);
        self.nesting -= 1;
        result
    }

    /// A complete sub-expression: the top level, parentheses, predicates
    /// and function arguments.
    fn parse_expr(&mut self) -> PResult<Parsed> {
        self.nested(Self::parse_or)
    }

    fn parse_or(&mut self) -> PResult<Parsed> {
        let mut lhs = self.parse_and()?;
        while self.peek_operator_name("or") {
            self.bump();
            let rhs = self.parse_and()?;
            lhs = Parsed::join(lhs, rhs, Expr::Or)?;
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> PResult<Parsed> {
        let mut lhs = self.parse_equality()?;
        while self.peek_operator_name("and") {
            self.bump();
            let rhs = self.parse_equality()?;
            lhs = Parsed::join(lhs, rhs, Expr::And)?;
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> PResult<Parsed> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => CmpOp::Eq,
                Some(Token::Neq) => CmpOp::Ne,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.parse_relational()?;
            lhs = Parsed::join(lhs, rhs, |l, r| Expr::Compare(op, l, r))?;
        }
    }

    fn parse_relational(&mut self) -> PResult<Parsed> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => CmpOp::Lt,
                Some(Token::Le) => CmpOp::Le,
                Some(Token::Gt) => CmpOp::Gt,
                Some(Token::Ge) => CmpOp::Ge,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.parse_additive()?;
            lhs = Parsed::join(lhs, rhs, |l, r| Expr::Compare(op, l, r))?;
        }
    }

    fn parse_additive(&mut self) -> PResult<Parsed> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => ArithOp::Add,
                Some(Token::Minus) => ArithOp::Sub,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.parse_multiplicative()?;
            lhs = Parsed::join(lhs, rhs, |l, r| Expr::Arith(op, l, r))?;
        }
    }

    fn parse_multiplicative(&mut self) -> PResult<Parsed> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => ArithOp::Mul,
                Some(Token::Name(n)) if n == "div" => ArithOp::Div,
                Some(Token::Name(n)) if n == "mod" => ArithOp::Mod,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = Parsed::join(lhs, rhs, |l, r| Expr::Arith(op, l, r))?;
        }
    }

    fn parse_unary(&mut self) -> PResult<Parsed> {
        if self.peek() == Some(&Token::Minus) {
            self.bump();
            let operand = self.nested(Self::parse_unary)?;
            return Parsed::wrap(operand.depth, Expr::Negate(Box::new(operand.expr)));
        }
        self.parse_union()
    }

    fn parse_union(&mut self) -> PResult<Parsed> {
        let mut lhs = self.parse_path_expr()?;
        while self.peek() == Some(&Token::Pipe) {
            self.bump();
            let rhs = self.parse_path_expr()?;
            lhs = Parsed::join(lhs, rhs, Expr::Union)?;
        }
        Ok(lhs)
    }

    fn starts_filter_expr(&self) -> bool {
        match self.peek() {
            Some(Token::Literal(_) | Token::Number(_) | Token::LParen) => true,
            Some(Token::Name(name)) => {
                self.peek_at(1) == Some(&Token::LParen) && !NODE_TYPES.contains(&name.as_str())
            }
            _ => false,
        }
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Dot | Token::DotDot | Token::At | Token::Star | Token::Name(_))
        )
    }

    fn parse_path_expr(&mut self) -> PResult<Parsed> {
        if !self.starts_filter_expr() {
            let (path, depth) = self.parse_location_path()?;
            return Parsed::wrap(depth, Expr::Path(path));
        }

        let primary = self.parse_primary()?;
        let (predicates, mut depth) = self.parse_predicates()?;
        let mut steps = Vec::new();
        match self.peek() {
            Some(Token::Slash) => {
                self.bump();
                depth = depth.max(self.parse_relative_steps(&mut steps)?);
            }
            Some(Token::DoubleSlash) => {
                self.bump();
                steps.push(Step::abbreviated(Axis::DescendantOrSelf));
                depth = depth.max(self.parse_relative_steps(&mut steps)?);
            }
            _ => {}
        }

        if predicates.is_empty() && steps.is_empty() {
            return Ok(primary);
        }
        Parsed::wrap(
            depth.max(primary.depth),
            Expr::Filter {
                primary: Box::new(primary.expr),
                predicates,
                steps,
            },
        )
    }

    /// A location path and the depth of its deepest predicate.
    fn parse_location_path(&mut self) -> PResult<(LocationPath, usize)> {
        let mut steps = Vec::new();
        let absolute = match self.peek() {
            Some(Token::Slash) => {
                self.bump();
                if !self.starts_step() {
                    return Ok((
                        LocationPath {
                            absolute: true,
                            steps,
                        },
                        0,
                    ));
                }
                true
            }
            Some(Token::DoubleSlash) => {
                self.bump();
                steps.push(Step::abbreviated(Axis::DescendantOrSelf));
                true
            }
            _ => false,
        };
        let depth = self.parse_relative_steps(&mut steps)?;
        Ok((LocationPath { absolute, steps }, depth))
    }

    /// Parse `step (('/' | '//') step)*` into `steps`, returning the depth
    /// of the deepest predicate seen.
    fn parse_relative_steps(&mut self, steps: &mut Vec<Step>) -> PResult<usize> {
        let (step, mut depth) = self.parse_step()?;
        steps.push(step);
        loop {
            match self.peek() {
                Some(Token::Slash) => {
                    self.bump();
                }
                Some(Token::DoubleSlash) => {
                    self.bump();
                    steps.push(Step::abbreviated(Axis::DescendantOrSelf));
                }
                _ => return Ok(depth),
            }
            let (step, step_depth) = self.parse_step()?;
            steps.push(step);
            depth = depth.max(step_depth);
        }
    }

    fn parse_step(&mut self) -> PResult<(Step, usize)> {
        match self.peek() {
            Some(Token::Dot) => {
                self.bump();
                return Ok((Step::abbreviated(Axis::SelfAxis), 0));
            }
            Some(Token::DotDot) => {
                self.bump();
                return Ok((Step::abbreviated(Axis::Parent), 0));
            }
            _ => {}
        }

        let axis = if self.peek() == Some(&Token::At) {
            self.bump();
            Axis::Attribute
        } else if let (Some(Token::Name(name)), Some(Token::DoubleColon)) =
            (self.peek(), self.peek_at(1))
        {
            let axis = Axis::from_name(name)?;
            self.bump();
            self.bump();
            axis
        } else {
            Axis::Child
        };

        let test = self.parse_node_test()?;
        let (predicates, depth) = self.parse_predicates()?;
        Ok((
            Step {
                axis,
                test,
                predicates,
            },
            depth,
        ))
    }

    fn parse_node_test(&mut self) -> PResult<NodeTest> {
        match self.bump() {
            Some(Token::Star) => Ok(NodeTest::Any),
            Some(Token::Name(name)) if self.peek() == Some(&Token::LParen) => {
                self.bump();
                let test = match name.as_str() {
                    "text" => NodeTest::Text,
                    "node" => NodeTest::Node,
                    "comment" => NodeTest::Comment,
                    "processing-instruction" => match self.peek() {
                        Some(Token::Literal(target)) => {
                            let target = target.clone();
                            self.bump();
                            NodeTest::ProcessingInstruction(Some(target))
                        }
                        _ => NodeTest::ProcessingInstruction(None),
                    },
                    other => return Err(format!("unknown node type test `{other}()`")),
                };
                self.expect(&Token::RParen)?;
                Ok(test)
            }
            Some(Token::Name(name)) => Ok(NodeTest::Name(name)),
            Some(token) => Err(format!("expected a node test, found {token:?}")),
            None => Err("expected a node test, found end of expression".to_string()),
        }
    }

    fn parse_predicates(&mut self) -> PResult<(Vec<Expr>, usize)> {
        let mut predicates = Vec::new();
        let mut depth = 0;
        while self.peek() == Some(&Token::LBracket) {
            self.bump();
            let predicate = self.parse_expr()?;
            self.expect(&Token::RBracket)?;
            depth = depth.max(predicate.depth);
            predicates.push(predicate.expr);
        }
        Ok((predicates, depth))
    }

    fn parse_primary(&mut self) -> PResult<Parsed> {
        match self.bump() {
            Some(Token::Literal(s)) => Ok(Parsed::leaf(Expr::Literal(s))),
            Some(Token::Number(n)) => Ok(Parsed::leaf(Expr::Number(n))),
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Name(name)) => {
                self.expect(&Token::LParen)?;
                let mut args = Vec::new();
                let mut depth = 0;
                if self.peek() != Some(&Token::RParen) {
                    loop {
                        let arg = self.parse_expr()?;
                        depth = depth.max(arg.depth);
                        args.push(arg.expr);
                        if self.peek() != Some(&Token::Comma) {
                            break;
                        }
                        self.bump();
                    }
                }
                self.expect(&Token::RParen)?;
                check_arity(&name, args.len())?;
                Parsed::wrap(depth, Expr::Function(name, args))
            }
            Some(token) => Err(format!("unexpected token {token:?}")),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

fn check_arity(name: &str, count: usize) -> PResult<()> {
    let Some(&(_, min, max)) = FUNCTIONS.iter().find(|(n, _, _)| *n == name) else {
        return Err(format!("unknown function `{name}()`"));
    };
    if count < min || count > max {
        return Err(format!("function `{name}()` called with {count} argument(s)"));
    }
    Ok(())
}
