//! Typed HCL2 syntax tree.
//!
//! Every node carries the byte span of the source text it was parsed from.
//! Nodes are built by the parser and immutable afterwards.

use std::fmt;

use crate::token::Span;

/// An identifier together with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

/// Immediate values that can appear as literals in source text.
#[derive(Debug, Clone, PartialEq)]
pub enum LitValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// One segment of an interpolated string.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Lit(String),
    Interp(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    And,
    Or,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::LtEq => "<=",
            BinOp::GtEq => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        })
    }
}

/// Projection applied to each element of a splat.
///
/// Attribute splats (`e.*`) carry only `Attr` trailers; index splats
/// (`e[*]`) may mix `Attr` and `Index`.
#[derive(Debug, Clone, PartialEq)]
pub enum Trailer {
    Attr(Ident),
    Index(Expr),
}

impl Trailer {
    pub fn span(&self) -> Span {
        match self {
            Trailer::Attr(ident) => ident.span,
            Trailer::Index(expr) => expr.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(LitValue),
    /// Interpolated string; evaluates to the concatenation of its parts.
    Template(Vec<TemplatePart>),
    Identifier(String),
    Array(Vec<Expr>),
    /// Key/value pairs in source order. Bare identifier keys have already
    /// been converted to string literals by the parser; any other key
    /// expression is evaluated at runtime.
    Object(Vec<(Expr, Expr)>),
    GetAttr {
        on: Box<Expr>,
        name: Ident,
    },
    GetIndex {
        on: Box<Expr>,
        key: Box<Expr>,
    },
    AttrSplat {
        on: Box<Expr>,
        trailers: Vec<Trailer>,
    },
    IndexSplat {
        on: Box<Expr>,
        trailers: Vec<Trailer>,
    },
    FunctionCall {
        name: Ident,
        args: Vec<Expr>,
        /// The trailing `...` form: the last argument is spliced.
        var_args: bool,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    /// Kept so tooling can distinguish `(a)` from `a`; semantically
    /// transparent.
    Parenthesis(Box<Expr>),
    ForTuple {
        key_var: Option<Ident>,
        value_var: Ident,
        collection: Box<Expr>,
        value: Box<Expr>,
        cond: Option<Box<Expr>>,
    },
    ForObject {
        key_var: Option<Ident>,
        value_var: Ident,
        collection: Box<Expr>,
        key: Box<Expr>,
        value: Box<Expr>,
        /// The `...` grouping form: values accumulate into arrays per key.
        grouping: bool,
        cond: Option<Box<Expr>>,
    },
}

/// A block label, either bare (`foo`) or quoted (`"foo"`).
#[derive(Debug, Clone, PartialEq)]
pub struct BlockLabel {
    pub value: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub key: Ident,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub ident: Ident,
    pub labels: Vec<BlockLabel>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

impl Block {
    /// `type.label1.label2...` — the key path this block contributes to
    /// when its enclosing body is evaluated.
    pub fn key_path(&self) -> Vec<&str> {
        let mut path = vec![self.ident.name.as_str()];
        path.extend(self.labels.iter().map(|label| label.value.as_str()));
        path
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.body.iter().filter_map(|stmt| match stmt {
            Stmt::Attribute(attr) => Some(attr),
            Stmt::Block(_) => None,
        })
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.body.iter().filter_map(|stmt| match stmt {
            Stmt::Block(block) => Some(block),
            Stmt::Attribute(_) => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Attribute(Attribute),
    Block(Block),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Attribute(attr) => attr.span,
            Stmt::Block(block) => block.span,
        }
    }

    /// The key path this statement defines in its enclosing body.
    pub fn key_path(&self) -> Vec<&str> {
        match self {
            Stmt::Attribute(attr) => vec![attr.key.name.as_str()],
            Stmt::Block(block) => block.key_path(),
        }
    }
}

/// A parsed configuration: the statements of a file or block body.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

impl Body {
    /// Top-level blocks, optionally restricted to one block type.
    pub fn get_blocks(&self, block_type: Option<&str>) -> Vec<&Block> {
        self.stmts
            .iter()
            .filter_map(|stmt| match stmt {
                Stmt::Block(block)
                    if block_type.is_none_or(|wanted| block.ident.name == wanted) =>
                {
                    Some(block)
                }
                _ => None,
            })
            .collect()
    }

    /// First block matching the given type and exact label sequence.
    pub fn get_block(&self, block_type: &str, labels: &[&str]) -> Option<&Block> {
        self.get_blocks(Some(block_type))
            .into_iter()
            .find(|block| {
                block.labels.len() == labels.len()
                    && block
                        .labels
                        .iter()
                        .zip(labels)
                        .all(|(label, wanted)| label.value == *wanted)
            })
    }
}
