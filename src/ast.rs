//! This module defines the abstract syntax tree produced by the parser. A [`Node`] is
//! one of four variants: a literal [`Literal`] fixed at parse time, a word resolved
//! against the environment, an array literal, or an application of an operator to
//! arguments. Nodes are immutable trees with no back-references; the caller of
//! [`crate::parser::parse`] owns the result.
//!
//! Ergonomic helpers [`val`], [`word`], [`array`] and [`apply`] build trees in code
//! and tests. `Display` renders a node back to source text.

use std::fmt;

/// Characters that terminate a word (in addition to whitespace)
pub(crate) const WORD_DELIMITERS: &str = "(),#\"[]";

/// Check if a character may appear inside a word
pub(crate) fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !WORD_DELIMITERS.contains(c)
}

/// A primitive value fixed at parse time
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
    Bool(bool),
}

/// Core AST type
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal value
    Value(Literal),
    /// Identifier, looked up at evaluation time
    Word(String),
    /// Array literal, evaluated element-wise into a fresh array
    Array(Vec<Node>),
    /// Special-form invocation or function call
    Apply { operator: Box<Node>, args: Vec<Node> },
}

impl Node {
    /// The identifier name if this node is a word
    pub fn as_word(&self) -> Option<&str> {
        match self {
            Node::Word(name) => Some(name),
            _ => None,
        }
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(s.to_owned())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::String(s)
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}

impl From<f64> for Literal {
    fn from(n: f64) -> Self {
        Literal::Number(n)
    }
}

macro_rules! impl_literal_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Literal {
            fn from(n: $int_type) -> Self {
                Literal::Number(f64::from(n))
            }
        }
    };
}

impl_literal_from_integer!(i8);
impl_literal_from_integer!(i16);
impl_literal_from_integer!(i32);
impl_literal_from_integer!(u8);
impl_literal_from_integer!(u16);
impl_literal_from_integer!(u32);

/// Literal node
pub fn val<T: Into<Literal>>(value: T) -> Node {
    Node::Value(value.into())
}

/// Word node
pub fn word(name: &str) -> Node {
    Node::Word(name.to_owned())
}

/// Array-literal node
pub fn array<I>(elements: I) -> Node
where
    I: IntoIterator<Item = Node>,
{
    Node::Array(elements.into_iter().collect())
}

/// Application node
pub fn apply<I>(operator: Node, args: I) -> Node
where
    I: IntoIterator<Item = Node>,
{
    Node::Apply {
        operator: Box::new(operator),
        args: args.into_iter().collect(),
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "\"{s}\""),
            Literal::Number(n) => write!(f, "{n}"),
            Literal::Bool(b) => write!(f, "{b}"),
        }
    }
}

fn write_separated(f: &mut fmt::Formatter<'_>, nodes: &[Node]) -> fmt::Result {
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{node}")?;
    }
    Ok(())
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Value(literal) => write!(f, "{literal}"),
            Node::Word(name) => write!(f, "{name}"),
            Node::Array(elements) => {
                write!(f, "[")?;
                write_separated(f, elements)?;
                write!(f, "]")
            }
            Node::Apply { operator, args } => {
                write!(f, "{operator}(")?;
                write_separated(f, args)?;
                write!(f, ")")
            }
        }
    }
}
