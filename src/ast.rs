//! This module defines the canonical AST produced by the reader. The main enum, [`Node`],
//! is a closed set of literal values, [`Symbol`]s, [`Operator`]s used as values, ordered
//! lists and the [`Node::ExpandGroup`] splice marker. Every structural form of the surface
//! syntax (quote, scoped and grouped symbols, relative-time sampling, slicing) is lowered
//! to a list headed by one of the structural operators, so downstream passes only ever
//! match on this one type.
//!
//! Helper functions such as [`sym`], [`op`], [`val`], [`nil`] and [`group`] build ASTs
//! tersely in code and tests, and `From` conversions cover Rust literals, arrays and
//! vectors.

use std::fmt;

/// Integer type of the language. All literal radices normalize to it.
pub type Int = i64;

/// A named identifier. Two symbols are equal iff their names are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(name: impl Into<String>) -> Self {
        Symbol(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reserved tokens of the language.
///
/// The primitive operators can be typed directly. The structural operators are only ever
/// synthesized by the transformer to tag structured forms, and their spellings are not
/// reserved: a symbol named `slice` stays a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Eq,
    Neq,
    Gt,
    Lt,
    Ge,
    Le,
    Not,
    Pow,
    Quote,
    Scoped,
    ResolveGroup,
    RelEval,
    Slice,
}

impl Operator {
    /// Operators a user can type, in the order the grammar tries them.
    /// Multi-character spellings precede their single-character prefixes.
    pub const PRIMITIVES: [Operator; 14] = [
        Operator::Pow,
        Operator::And,
        Operator::Or,
        Operator::Neq,
        Operator::Ge,
        Operator::Le,
        Operator::Add,
        Operator::Sub,
        Operator::Mul,
        Operator::Div,
        Operator::Eq,
        Operator::Gt,
        Operator::Lt,
        Operator::Not,
    ];

    pub const STRUCTURAL: [Operator; 5] = [
        Operator::Quote,
        Operator::Scoped,
        Operator::ResolveGroup,
        Operator::RelEval,
        Operator::Slice,
    ];

    /// Canonical spelling of the operator
    pub const fn spelling(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::Eq => "=",
            Operator::Neq => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Not => "!",
            Operator::Pow => "**",
            Operator::Quote => "quote",
            Operator::Scoped => "scoped",
            Operator::ResolveGroup => "resolve-group",
            Operator::RelEval => "rel-eval",
            Operator::Slice => "slice",
        }
    }

    /// Look up a reserved primitive spelling. Structural spellings never match.
    pub fn from_reserved(name: &str) -> Option<Operator> {
        Self::PRIMITIVES
            .into_iter()
            .find(|candidate| candidate.spelling() == name)
    }

    /// Look up any operator, structural ones included, by its canonical spelling
    pub fn from_spelling(name: &str) -> Option<Operator> {
        Self::PRIMITIVES
            .into_iter()
            .chain(Self::STRUCTURAL)
            .find(|candidate| candidate.spelling() == name)
    }

    pub fn is_structural(self) -> bool {
        Self::STRUCTURAL.contains(&self)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spelling())
    }
}

/// Core AST type produced by the reader
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    Int(Int),
    Bool(bool),
    Str(String),
    Symbol(Symbol),
    /// An operator standing where a value is expected, e.g. the head of a call
    Operator(Operator),
    /// Ordered sequence; the uniform container for calls and structural tags
    List(Vec<Node>),
    /// Forms that must be spliced as siblings at the position where this node appears.
    /// Only the timed-list form `expr@<t1 t2 ...>` produces it, and only as a top-level
    /// form or a list element, never as the operand of a structural form.
    ExpandGroup(Vec<Node>),
}

impl Node {
    /// Build a structural list `(tag args...)`
    pub fn tagged(tag: Operator, args: impl IntoIterator<Item = Node>) -> Node {
        let mut elements = vec![Node::Operator(tag)];
        elements.extend(args);
        Node::List(elements)
    }

    /// Structural tag heading this list, if any
    pub fn tag(&self) -> Option<Operator> {
        match self {
            Node::List(elements) => match elements.first() {
                Some(Node::Operator(tag)) if tag.is_structural() => Some(*tag),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Node::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Node::List(elements) => Some(elements),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Node::List(list) if list.is_empty())
    }

    /// Flatten every ExpandGroup in this tree, including inside nested lists.
    /// A group at the root becomes a plain list of its members.
    pub fn splice_all(self) -> Node {
        match self {
            Node::List(elements) => Node::List(splice_deep(elements)),
            Node::ExpandGroup(members) => Node::List(splice_deep(members)),
            other => other,
        }
    }
}

/// Flatten ExpandGroups one level deep: each group is replaced in place by its members.
pub fn splice(nodes: impl IntoIterator<Item = Node>) -> Vec<Node> {
    let mut out = Vec::new();
    for node in nodes {
        match node {
            Node::ExpandGroup(members) => out.extend(members),
            other => out.push(other),
        }
    }
    out
}

fn splice_deep(nodes: Vec<Node>) -> Vec<Node> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::ExpandGroup(members) => out.extend(splice_deep(members)),
            Node::List(elements) => out.push(Node::List(splice_deep(elements))),
            other => out.push(other),
        }
    }
    out
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Str(s.to_owned())
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::Str(s)
    }
}

impl From<bool> for Node {
    fn from(b: bool) -> Self {
        Node::Bool(b)
    }
}

impl From<Symbol> for Node {
    fn from(s: Symbol) -> Self {
        Node::Symbol(s)
    }
}

impl From<Operator> for Node {
    fn from(o: Operator) -> Self {
        Node::Operator(o)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Node {
            fn from(n: $int_type) -> Self {
                Node::Int(Int::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(Int);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Node>> From<Vec<T>> for Node {
    fn from(v: Vec<T>) -> Self {
        Node::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Node>, const N: usize> From<[T; N]> for Node {
    fn from(arr: [T; N]) -> Self {
        Node::List(arr.into_iter().map(Into::into).collect())
    }
}

/// Symbol node from a name
pub fn sym<S: AsRef<str>>(name: S) -> Node {
    Node::Symbol(Symbol::new(name.as_ref()))
}

/// Operator node
pub fn op(operator: Operator) -> Node {
    Node::Operator(operator)
}

/// Any node convertible from a Rust value
pub fn val<T: Into<Node>>(value: T) -> Node {
    value.into()
}

/// Empty list
pub fn nil() -> Node {
    Node::List(vec![])
}

/// ExpandGroup over the given members
pub fn group(members: impl IntoIterator<Item = Node>) -> Node {
    Node::ExpandGroup(members.into_iter().collect())
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Int(n) => write!(f, "{n}"),
            Node::Bool(b) => f.write_str(if *b { "#t" } else { "#f" }),
            Node::Str(s) => {
                f.write_str("\"")?;
                for ch in s.chars() {
                    match ch {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\t' => f.write_str("\\t")?,
                        '\r' => f.write_str("\\r")?,
                        c if c.is_control() => write!(f, "\\x{:02x}", u32::from(c))?,
                        c => write!(f, "{c}")?,
                    }
                }
                f.write_str("\"")
            }
            Node::Symbol(s) => write!(f, "{s}"),
            Node::Operator(o) => write!(f, "{o}"),
            Node::List(elements) => write_sequence(f, "(", elements, ")"),
            Node::ExpandGroup(members) => write_sequence(f, "#<expand ", members, ">"),
        }
    }
}

fn write_sequence(f: &mut fmt::Formatter<'_>, open: &str, items: &[Node], close: &str) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str(close)
}
