//! Recursive-descent parser for HCL2.
//!
//! The token stream comes from [`crate::lexer`]; this module builds the
//! typed AST, expands `${...}` string templates (by re-lexing the
//! interpolation bodies at their absolute offsets), and applies heredoc
//! indent trimming.

use thiserror::Error;

use crate::ast::{
    Attribute, BinOp, Block, BlockLabel, Body, Expr, ExprKind, Ident, LitValue, Stmt, TemplatePart,
    Trailer, UnaryOp,
};
use crate::lexer::{self, LexError};
use crate::token::{Span, Token, TokenKind};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("Expected {expected}, got {found} at {span}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },
    #[error("Invalid escape sequence '\\{character}' at {span}")]
    InvalidEscape { character: char, span: Span },
    #[error("Unterminated interpolation at {span}")]
    UnterminatedInterpolation { span: Span },
    #[error("Block labels must be identifiers or static strings at {span}")]
    InvalidBlockLabel { span: Span },
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parse a full configuration body.
pub fn parse_file(input: &str) -> ParseResult<Body> {
    let tokens = lexer::tokenize(input)?;
    let mut parser = Parser::new(tokens);
    let stmts = parser.parse_stmts(false)?;
    parser.expect(TokenKind::Eof, "end of input")?;
    Ok(Body {
        stmts,
        span: Span::new(0, input.len()),
    })
}

/// Parse a single expression (as used by tests and REPL-like tools).
pub fn parse_expression(input: &str) -> ParseResult<Expr> {
    let tokens = lexer::tokenize(input)?;
    let mut parser = Parser::new(tokens);
    parser.skip_newlines();
    let expr = parser.parse_expr()?;
    parser.skip_newlines();
    parser.expect(TokenKind::Eof, "end of input")?;
    Ok(expr)
}

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    current: Token<'a>,
    prev_end: usize,
}

impl<'a> Parser<'a> {
    fn new(mut tokens: Vec<Token<'a>>) -> Self {
        if tokens.is_empty() {
            tokens.push(Token::new(TokenKind::Eof, Span::default()));
        }
        let current = tokens[0].clone();
        Self {
            tokens,
            pos: 0,
            current,
            prev_end: 0,
        }
    }

    // ------------------------------------------------------------------
    // Statements

    fn parse_stmts(&mut self, until_brace: bool) -> ParseResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        loop {
            self.skip_newlines();
            let done = if until_brace {
                matches!(self.current.kind, TokenKind::RBrace)
            } else {
                matches!(self.current.kind, TokenKind::Eof)
            };
            if done {
                return Ok(stmts);
            }
            stmts.push(self.parse_stmt()?);
        }
    }

    fn parse_stmt(&mut self) -> ParseResult<Stmt> {
        let ident = self.expect_ident("attribute or block name")?;
        if matches!(self.current.kind, TokenKind::Assign) {
            self.advance();
            self.parse_attribute(ident).map(Stmt::Attribute)
        } else {
            self.parse_block(ident).map(Stmt::Block)
        }
    }

    fn parse_attribute(&mut self, key: Ident) -> ParseResult<Attribute> {
        let value = self.parse_expr()?;
        match self.current.kind {
            TokenKind::Newline => {
                self.advance();
            }
            TokenKind::Eof | TokenKind::RBrace => {}
            _ => return Err(self.error("newline after attribute")),
        }
        let span = key.span.to(value.span);
        Ok(Attribute { key, value, span })
    }

    fn parse_block(&mut self, ident: Ident) -> ParseResult<Block> {
        let mut labels = Vec::new();
        loop {
            match self.current.kind {
                TokenKind::Ident(name) => {
                    labels.push(BlockLabel {
                        value: name.to_string(),
                        span: self.current.span,
                    });
                    self.advance();
                }
                TokenKind::Str(raw) => {
                    let span = self.current.span;
                    let expr = expand_template(raw, span)?;
                    let ExprKind::Literal(LitValue::String(value)) = expr.kind else {
                        return Err(ParseError::InvalidBlockLabel { span });
                    };
                    labels.push(BlockLabel { value, span });
                    self.advance();
                }
                _ => break,
            }
        }
        self.expect(TokenKind::LBrace, "'{'")?;
        let body = self.parse_stmts(true)?;
        self.expect(TokenKind::RBrace, "'}'")?;
        let span = Span::new(ident.span.start, self.prev_end);
        Ok(Block {
            ident,
            labels,
            body,
            span,
        })
    }

    // ------------------------------------------------------------------
    // Expressions, lowest precedence first

    fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.parse_conditional()
    }

    fn parse_conditional(&mut self) -> ParseResult<Expr> {
        let cond = self.parse_or()?;
        if !matches!(self.current.kind, TokenKind::Question) {
            return Ok(cond);
        }
        self.advance();
        self.skip_newlines();
        let then_expr = self.parse_expr()?;
        self.skip_newlines();
        self.expect(TokenKind::Colon, "':'")?;
        self.skip_newlines();
        // Recursing through parse_expr makes `a ? b : c ? d : e`
        // right-associative.
        let else_expr = self.parse_expr()?;
        let span = cond.span.to(else_expr.span);
        Ok(Expr::new(
            ExprKind::Conditional {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
            span,
        ))
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_and()?;
        while matches!(self.current.kind, TokenKind::Or) {
            self.advance();
            self.skip_newlines();
            let right = self.parse_and()?;
            expr = binary(BinOp::Or, expr, right);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_not()?;
        while matches!(self.current.kind, TokenKind::And) {
            self.advance();
            self.skip_newlines();
            let right = self.parse_not()?;
            expr = binary(BinOp::And, expr, right);
        }
        Ok(expr)
    }

    /// Logical negation sits between `&&` and `==` in the grammar, so
    /// `!a == b` parses as `!(a == b)` while `!a && b` is `(!a) && b`.
    fn parse_not(&mut self) -> ParseResult<Expr> {
        if matches!(self.current.kind, TokenKind::Bang) {
            let start = self.current.span;
            self.advance();
            let expr = self.parse_not()?;
            let span = start.to(expr.span);
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    expr: Box::new(expr),
                },
                span,
            ));
        }
        self.parse_equality()
    }

    fn parse_equality(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_comparison()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Eq => BinOp::Eq,
                TokenKind::NotEq => BinOp::NotEq,
                _ => return Ok(expr),
            };
            self.advance();
            self.skip_newlines();
            let right = self.parse_comparison()?;
            expr = binary(op, expr, right);
        }
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_additive()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::LtEq => BinOp::LtEq,
                TokenKind::GtEq => BinOp::GtEq,
                _ => return Ok(expr),
            };
            self.advance();
            self.skip_newlines();
            let right = self.parse_additive()?;
            expr = binary(op, expr, right);
        }
    }

    fn parse_additive(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_multiplicative()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => return Ok(expr),
            };
            self.advance();
            self.skip_newlines();
            let right = self.parse_multiplicative()?;
            expr = binary(op, expr, right);
        }
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_negation()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => return Ok(expr),
            };
            self.advance();
            self.skip_newlines();
            let right = self.parse_negation()?;
            expr = binary(op, expr, right);
        }
    }

    fn parse_negation(&mut self) -> ParseResult<Expr> {
        if matches!(self.current.kind, TokenKind::Minus) {
            let start = self.current.span;
            self.advance();
            let expr = self.parse_negation()?;
            let span = start.to(expr.span);
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Neg,
                    expr: Box::new(expr),
                },
                span,
            ));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.current.kind {
                TokenKind::Dot => {
                    self.advance();
                    match self.current.kind {
                        TokenKind::Star => {
                            self.advance();
                            expr = self.parse_attr_splat(expr)?;
                        }
                        TokenKind::Ident(_) => {
                            let name = self.expect_ident("attribute name")?;
                            let span = expr.span.to(name.span);
                            expr = Expr::new(
                                ExprKind::GetAttr {
                                    on: Box::new(expr),
                                    name,
                                },
                                span,
                            );
                        }
                        _ => return Err(self.error("attribute name or '*'")),
                    }
                }
                TokenKind::LBracket => {
                    self.advance();
                    if matches!(self.current.kind, TokenKind::Star) {
                        self.advance();
                        self.expect(TokenKind::RBracket, "']'")?;
                        expr = self.parse_index_splat(expr)?;
                    } else {
                        self.skip_newlines();
                        let key = self.parse_expr()?;
                        self.skip_newlines();
                        self.expect(TokenKind::RBracket, "']'")?;
                        let span = Span::new(expr.span.start, self.prev_end);
                        expr = Expr::new(
                            ExprKind::GetIndex {
                                on: Box::new(expr),
                                key: Box::new(key),
                            },
                            span,
                        );
                    }
                }
                _ => return Ok(expr),
            }
        }
    }

    /// `e.*` followed by attribute projections only; a subsequent `[i]`
    /// indexes the collected array instead.
    fn parse_attr_splat(&mut self, on: Expr) -> ParseResult<Expr> {
        let mut trailers = Vec::new();
        while matches!(self.current.kind, TokenKind::Dot)
            && matches!(self.peek_kind(), TokenKind::Ident(_))
        {
            self.advance();
            let name = self.expect_ident("attribute name")?;
            trailers.push(Trailer::Attr(name));
        }
        let span = Span::new(on.span.start, self.prev_end);
        Ok(Expr::new(
            ExprKind::AttrSplat {
                on: Box::new(on),
                trailers,
            },
            span,
        ))
    }

    /// `e[*]` followed by any mix of `.attr` and `[index]` projections.
    fn parse_index_splat(&mut self, on: Expr) -> ParseResult<Expr> {
        let mut trailers = Vec::new();
        loop {
            match self.current.kind {
                TokenKind::Dot if matches!(self.peek_kind(), TokenKind::Ident(_)) => {
                    self.advance();
                    let name = self.expect_ident("attribute name")?;
                    trailers.push(Trailer::Attr(name));
                }
                TokenKind::LBracket if !matches!(self.peek_kind(), TokenKind::Star) => {
                    self.advance();
                    self.skip_newlines();
                    let key = self.parse_expr()?;
                    self.skip_newlines();
                    self.expect(TokenKind::RBracket, "']'")?;
                    trailers.push(Trailer::Index(key));
                }
                _ => break,
            }
        }
        let span = Span::new(on.span.start, self.prev_end);
        Ok(Expr::new(
            ExprKind::IndexSplat {
                on: Box::new(on),
                trailers,
            },
            span,
        ))
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let span = self.current.span;
        match self.current.kind {
            TokenKind::Int(value) => {
                self.advance();
                Ok(Expr::new(ExprKind::Literal(LitValue::Int(value)), span))
            }
            TokenKind::Float(value) => {
                self.advance();
                Ok(Expr::new(ExprKind::Literal(LitValue::Float(value)), span))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::new(ExprKind::Literal(LitValue::Bool(true)), span))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::new(ExprKind::Literal(LitValue::Bool(false)), span))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::new(ExprKind::Literal(LitValue::Null), span))
            }
            TokenKind::Str(raw) => {
                self.advance();
                expand_template(raw, span)
            }
            TokenKind::Heredoc { body, trim } => {
                self.advance();
                let value = heredoc_value(body, trim);
                Ok(Expr::new(ExprKind::Literal(LitValue::String(value)), span))
            }
            TokenKind::Ident(name) => {
                let ident = Ident::new(name, span);
                self.advance();
                if matches!(self.current.kind, TokenKind::LParen) {
                    self.parse_call(ident)
                } else {
                    Ok(Expr::new(ExprKind::Identifier(ident.name), span))
                }
            }
            TokenKind::LParen => {
                self.advance();
                self.skip_newlines();
                let inner = self.parse_expr()?;
                self.skip_newlines();
                self.expect(TokenKind::RParen, "')'")?;
                let full = Span::new(span.start, self.prev_end);
                Ok(Expr::new(ExprKind::Parenthesis(Box::new(inner)), full))
            }
            TokenKind::LBracket => {
                self.advance();
                self.skip_newlines();
                if self.at_keyword("for") {
                    self.parse_for_tuple(span)
                } else {
                    self.parse_array(span)
                }
            }
            TokenKind::LBrace => {
                self.advance();
                self.skip_newlines();
                if self.at_keyword("for") {
                    self.parse_for_object(span)
                } else {
                    self.parse_object(span)
                }
            }
            _ => Err(self.error("expression")),
        }
    }

    fn parse_call(&mut self, name: Ident) -> ParseResult<Expr> {
        self.expect(TokenKind::LParen, "'('")?;
        self.skip_newlines();
        let mut args = Vec::new();
        let mut var_args = false;
        if !matches!(self.current.kind, TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                self.skip_newlines();
                if matches!(self.current.kind, TokenKind::Ellipsis) {
                    self.advance();
                    self.skip_newlines();
                    var_args = true;
                    break;
                }
                if matches!(self.current.kind, TokenKind::Comma) {
                    self.advance();
                    self.skip_newlines();
                    if matches!(self.current.kind, TokenKind::RParen) {
                        break;
                    }
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        let span = Span::new(name.span.start, self.prev_end);
        Ok(Expr::new(
            ExprKind::FunctionCall {
                name,
                args,
                var_args,
            },
            span,
        ))
    }

    fn parse_array(&mut self, start: Span) -> ParseResult<Expr> {
        let mut items = Vec::new();
        loop {
            self.skip_newlines();
            if matches!(self.current.kind, TokenKind::RBracket) {
                break;
            }
            items.push(self.parse_expr()?);
            if !self.consume_separator() && !matches!(self.current.kind, TokenKind::RBracket) {
                return Err(self.error("',' or ']'"));
            }
        }
        self.expect(TokenKind::RBracket, "']'")?;
        let span = Span::new(start.start, self.prev_end);
        Ok(Expr::new(ExprKind::Array(items), span))
    }

    fn parse_object(&mut self, start: Span) -> ParseResult<Expr> {
        let mut items = Vec::new();
        loop {
            self.skip_newlines();
            if matches!(self.current.kind, TokenKind::RBrace) {
                break;
            }
            let key = self.parse_object_key()?;
            if !matches!(self.current.kind, TokenKind::Assign | TokenKind::Colon) {
                return Err(self.error("'=' or ':'"));
            }
            self.advance();
            self.skip_newlines();
            let value = self.parse_expr()?;
            items.push((key, value));
            if !self.consume_separator() && !matches!(self.current.kind, TokenKind::RBrace) {
                return Err(self.error("',' or '}'"));
            }
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        let span = Span::new(start.start, self.prev_end);
        Ok(Expr::new(ExprKind::Object(items), span))
    }

    /// A bare identifier key is its own string; anything else is an
    /// expression evaluated at runtime.
    fn parse_object_key(&mut self) -> ParseResult<Expr> {
        if let TokenKind::Ident(name) = self.current.kind
            && matches!(self.peek_kind(), TokenKind::Assign | TokenKind::Colon)
        {
            let span = self.current.span;
            self.advance();
            return Ok(Expr::new(
                ExprKind::Literal(LitValue::String(name.to_string())),
                span,
            ));
        }
        self.parse_expr()
    }

    /// Consumes newline and/or comma separators; true if any were seen.
    fn consume_separator(&mut self) -> bool {
        let mut seen = false;
        loop {
            match self.current.kind {
                TokenKind::Newline | TokenKind::Comma => {
                    seen = true;
                    self.advance();
                }
                _ => return seen,
            }
        }
    }

    fn parse_for_intro(&mut self) -> ParseResult<(Option<Ident>, Ident, Expr)> {
        self.advance(); // 'for'
        let first = self.expect_ident("loop variable")?;
        let (key_var, value_var) = if matches!(self.current.kind, TokenKind::Comma) {
            self.advance();
            let second = self.expect_ident("loop variable")?;
            (Some(first), second)
        } else {
            (None, first)
        };
        if !self.at_keyword("in") {
            return Err(self.error("'in'"));
        }
        self.advance();
        let collection = self.parse_expr()?;
        self.expect(TokenKind::Colon, "':'")?;
        self.skip_newlines();
        Ok((key_var, value_var, collection))
    }

    fn parse_for_cond(&mut self) -> ParseResult<Option<Expr>> {
        if self.at_keyword("if") {
            self.advance();
            self.skip_newlines();
            return Ok(Some(self.parse_expr()?));
        }
        Ok(None)
    }

    fn parse_for_tuple(&mut self, start: Span) -> ParseResult<Expr> {
        let (key_var, value_var, collection) = self.parse_for_intro()?;
        let value = self.parse_expr()?;
        let cond = self.parse_for_cond()?;
        self.skip_newlines();
        self.expect(TokenKind::RBracket, "']'")?;
        let span = Span::new(start.start, self.prev_end);
        Ok(Expr::new(
            ExprKind::ForTuple {
                key_var,
                value_var,
                collection: Box::new(collection),
                value: Box::new(value),
                cond: cond.map(Box::new),
            },
            span,
        ))
    }

    fn parse_for_object(&mut self, start: Span) -> ParseResult<Expr> {
        let (key_var, value_var, collection) = self.parse_for_intro()?;
        let key = self.parse_expr()?;
        self.expect(TokenKind::FatArrow, "'=>'")?;
        self.skip_newlines();
        let value = self.parse_expr()?;
        let grouping = if matches!(self.current.kind, TokenKind::Ellipsis) {
            self.advance();
            true
        } else {
            false
        };
        let cond = self.parse_for_cond()?;
        self.skip_newlines();
        self.expect(TokenKind::RBrace, "'}'")?;
        let span = Span::new(start.start, self.prev_end);
        Ok(Expr::new(
            ExprKind::ForObject {
                key_var,
                value_var,
                collection: Box::new(collection),
                key: Box::new(key),
                value: Box::new(value),
                grouping,
                cond: cond.map(Box::new),
            },
            span,
        ))
    }

    // ------------------------------------------------------------------
    // Token plumbing

    fn skip_newlines(&mut self) {
        while matches!(self.current.kind, TokenKind::Newline) {
            self.advance();
        }
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.current.kind, TokenKind::Ident(name) if name == keyword)
    }

    fn expect_ident(&mut self, expected: &str) -> ParseResult<Ident> {
        if let TokenKind::Ident(name) = self.current.kind {
            let ident = Ident::new(name, self.current.span);
            self.advance();
            Ok(ident)
        } else {
            Err(self.error(expected))
        }
    }

    fn expect(&mut self, kind: TokenKind<'_>, expected: &str) -> ParseResult<()> {
        if self.current.kind == kind {
            self.advance();
            Ok(())
        } else {
            Err(self.error(expected))
        }
    }

    fn advance(&mut self) -> Token<'a> {
        let next = self
            .tokens
            .get(self.pos + 1)
            .cloned()
            .unwrap_or_else(|| Token::new(TokenKind::Eof, Span::default()));
        self.pos = self.pos.saturating_add(1);
        self.prev_end = self.current.span.end;
        std::mem::replace(&mut self.current, next)
    }

    fn peek_kind(&self) -> TokenKind<'a> {
        self.tokens
            .get(self.pos + 1)
            .map(|token| token.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn error(&self, expected: &str) -> ParseError {
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: self.current.kind.describe(),
            span: self.current.span,
        }
    }
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    let span = left.span.to(right.span);
    Expr::new(
        ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        span,
    )
}

/// Expand a raw string literal into a plain literal or a template.
///
/// `span` is the token span including the quotes; interpolation bodies are
/// re-lexed at their absolute offsets so their nodes carry real positions.
fn expand_template(raw: &str, span: Span) -> ParseResult<Expr> {
    let base = span.start + 1;
    let mut parts: Vec<TemplatePart> = Vec::new();
    let mut buf = String::new();
    let mut i = 0;

    while i < raw.len() {
        let c = raw[i..].chars().next().expect("index is on a char boundary");
        if c == '\\' {
            let Some(escaped) = raw[i + 1..].chars().next() else {
                return Err(ParseError::InvalidEscape {
                    character: '\\',
                    span: Span::new(base + i, base + i + 1),
                });
            };
            let decoded = match escaped {
                'n' => '\n',
                'r' => '\r',
                't' => '\t',
                '"' => '"',
                '\\' => '\\',
                '$' => '$',
                character => {
                    return Err(ParseError::InvalidEscape {
                        character,
                        span: Span::new(base + i, base + i + 1 + escaped.len_utf8()),
                    });
                }
            };
            buf.push(decoded);
            i += 1 + escaped.len_utf8();
        } else if raw[i..].starts_with("$$") {
            if raw[i + 2..].starts_with('{') {
                buf.push_str("${");
                i += 3;
            } else {
                buf.push_str("$$");
                i += 2;
            }
        } else if raw[i..].starts_with("${") {
            if !buf.is_empty() {
                parts.push(TemplatePart::Lit(std::mem::take(&mut buf)));
            }
            let inner_start = i + 2;
            let inner_end = find_interp_end(raw, inner_start)
                .ok_or(ParseError::UnterminatedInterpolation { span })?;
            let inner = &raw[inner_start..inner_end];
            let tokens = lexer::tokenize_with_offset(inner, base + inner_start)?;
            let mut sub = Parser::new(tokens);
            sub.skip_newlines();
            let expr = sub.parse_expr()?;
            sub.skip_newlines();
            sub.expect(TokenKind::Eof, "end of interpolation")?;
            parts.push(TemplatePart::Interp(expr));
            i = inner_end + 1;
        } else {
            buf.push(c);
            i += c.len_utf8();
        }
    }
    if !buf.is_empty() {
        parts.push(TemplatePart::Lit(buf));
    }

    let kind = if parts.is_empty() {
        ExprKind::Literal(LitValue::String(String::new()))
    } else if parts.len() == 1 && matches!(parts[0], TemplatePart::Lit(_)) {
        let Some(TemplatePart::Lit(text)) = parts.pop() else {
            unreachable!()
        };
        ExprKind::Literal(LitValue::String(text))
    } else {
        ExprKind::Template(parts)
    };
    Ok(Expr::new(kind, span))
}

/// Find the `}` closing the interpolation whose body starts at `start`,
/// skipping nested strings, braces, and interpolations.
fn find_interp_end(raw: &str, start: usize) -> Option<usize> {
    let mut modes: Vec<bool> = vec![false]; // true = in string, false = in braces
    let mut i = start;
    while i < raw.len() {
        let c = raw[i..].chars().next()?;
        let mut step = c.len_utf8();
        if *modes.last()? {
            match c {
                '\\' => step += raw[i + 1..].chars().next().map_or(0, char::len_utf8),
                '"' => {
                    modes.pop();
                }
                '$' if raw[i + 1..].starts_with('$') => step += 1,
                '$' if raw[i + 1..].starts_with('{') => {
                    step += 1;
                    modes.push(false);
                }
                _ => {}
            }
        } else {
            match c {
                '"' => modes.push(true),
                '{' => modes.push(false),
                '}' => {
                    modes.pop();
                    if modes.is_empty() {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        i += step;
    }
    None
}

/// Heredoc body processing. The `<<-` form removes the shortest leading
/// whitespace common to all non-blank lines; blank lines do not constrain
/// the minimum and lose their whitespace entirely.
fn heredoc_value(body: &str, trim: bool) -> String {
    if !trim {
        return body.to_string();
    }
    let min_indent = body
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);
    body.lines()
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                &line[min_indent..]
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    /// Compact s-expression rendering used to assert tree shapes without
    /// spelling out spans.
    fn sexpr(expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Literal(LitValue::Null) => "null".to_string(),
            ExprKind::Literal(LitValue::Bool(b)) => b.to_string(),
            ExprKind::Literal(LitValue::Int(i)) => i.to_string(),
            ExprKind::Literal(LitValue::Float(f)) => format!("{f:?}"),
            ExprKind::Literal(LitValue::String(s)) => format!("{s:?}"),
            ExprKind::Template(parts) => {
                let parts = parts
                    .iter()
                    .map(|part| match part {
                        TemplatePart::Lit(text) => format!("{text:?}"),
                        TemplatePart::Interp(expr) => sexpr(expr),
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                format!("(template {parts})")
            }
            ExprKind::Identifier(name) => name.clone(),
            ExprKind::Array(items) => {
                let items = items.iter().map(sexpr).collect::<Vec<_>>().join(" ");
                format!("(array {items})")
            }
            ExprKind::Object(items) => {
                let items = items
                    .iter()
                    .map(|(k, v)| format!("({} {})", sexpr(k), sexpr(v)))
                    .collect::<Vec<_>>()
                    .join(" ");
                format!("(object {items})")
            }
            ExprKind::GetAttr { on, name } => format!("(attr {} {})", sexpr(on), name.name),
            ExprKind::GetIndex { on, key } => format!("(index {} {})", sexpr(on), sexpr(key)),
            ExprKind::AttrSplat { on, trailers } => {
                format!("(attr-splat {}{})", sexpr(on), trailer_list(trailers))
            }
            ExprKind::IndexSplat { on, trailers } => {
                format!("(index-splat {}{})", sexpr(on), trailer_list(trailers))
            }
            ExprKind::FunctionCall {
                name,
                args,
                var_args,
            } => {
                let args = args.iter().map(sexpr).collect::<Vec<_>>().join(" ");
                let ellipsis = if *var_args { " ..." } else { "" };
                format!("(call {} {args}{ellipsis})", name.name)
            }
            ExprKind::Unary { op, expr } => format!("({op} {})", sexpr(expr)),
            ExprKind::Binary { op, left, right } => {
                format!("({op} {} {})", sexpr(left), sexpr(right))
            }
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => format!(
                "(if {} {} {})",
                sexpr(cond),
                sexpr(then_expr),
                sexpr(else_expr)
            ),
            ExprKind::Parenthesis(inner) => format!("(paren {})", sexpr(inner)),
            ExprKind::ForTuple {
                key_var,
                value_var,
                collection,
                value,
                cond,
            } => {
                let key = key_var
                    .as_ref()
                    .map(|k| format!("{} ", k.name))
                    .unwrap_or_default();
                let cond = cond
                    .as_ref()
                    .map(|c| format!(" if {}", sexpr(c)))
                    .unwrap_or_default();
                format!(
                    "(for-tuple {key}{} in {}: {}{cond})",
                    value_var.name,
                    sexpr(collection),
                    sexpr(value)
                )
            }
            ExprKind::ForObject {
                key_var,
                value_var,
                collection,
                key,
                value,
                grouping,
                cond,
            } => {
                let kv = key_var
                    .as_ref()
                    .map(|k| format!("{} ", k.name))
                    .unwrap_or_default();
                let group = if *grouping { " ..." } else { "" };
                let cond = cond
                    .as_ref()
                    .map(|c| format!(" if {}", sexpr(c)))
                    .unwrap_or_default();
                format!(
                    "(for-object {kv}{} in {}: {} => {}{group}{cond})",
                    value_var.name,
                    sexpr(collection),
                    sexpr(key),
                    sexpr(value)
                )
            }
        }
    }

    fn trailer_list(trailers: &[Trailer]) -> String {
        trailers
            .iter()
            .map(|trailer| match trailer {
                Trailer::Attr(ident) => format!(" .{}", ident.name),
                Trailer::Index(expr) => format!(" [{}]", sexpr(expr)),
            })
            .collect()
    }

    fn parsed(input: &str) -> String {
        sexpr(&parse_expression(input).expect("parse failed"))
    }

    #[test]
    fn parses_literals() {
        assert_eq!(parsed("null"), "null");
        assert_eq!(parsed("true"), "true");
        assert_eq!(parsed("false"), "false");
        assert_eq!(parsed("42"), "42");
        assert_eq!(parsed("42.5"), "42.5");
        assert_eq!(parsed(r#""Hello World""#), "\"Hello World\"");
    }

    #[test]
    fn parses_identifiers() {
        assert_eq!(parsed("foo"), "foo");
        assert_eq!(parsed("foo-bar"), "foo-bar");
    }

    #[test]
    fn parses_unary_expressions() {
        assert_eq!(parsed("-a"), "(- a)");
        assert_eq!(parsed("!a"), "(! a)");
        assert_eq!(parsed("!!a"), "(! (! a))");
    }

    #[test]
    fn parses_binary_expressions() {
        assert_eq!(parsed("a == b"), "(== a b)");
        assert_eq!(parsed("a != b"), "(!= a b)");
        assert_eq!(parsed("a < b"), "(< a b)");
        assert_eq!(parsed("a > b"), "(> a b)");
        assert_eq!(parsed("a <= b"), "(<= a b)");
        assert_eq!(parsed("a >= b"), "(>= a b)");
        assert_eq!(parsed("a + b"), "(+ a b)");
        assert_eq!(parsed("a - b"), "(- a b)");
        assert_eq!(parsed("a * b"), "(* a b)");
        assert_eq!(parsed("a / b"), "(/ a b)");
        assert_eq!(parsed("a % b"), "(% a b)");
        assert_eq!(parsed("a && b"), "(&& a b)");
        assert_eq!(parsed("a || b"), "(|| a b)");
    }

    #[test]
    fn applies_operator_precedence() {
        assert_eq!(parsed("a + b * c"), "(+ a (* b c))");
        assert_eq!(parsed("a * b + c"), "(+ (* a b) c)");
        assert_eq!(parsed("a < b + c"), "(< a (+ b c))");
        assert_eq!(parsed("a + b < c"), "(< (+ a b) c)");
        assert_eq!(parsed("a == b >= c"), "(== a (>= b c))");
        assert_eq!(parsed("a >= b == c"), "(== (>= a b) c)");
        assert_eq!(parsed("a == b && c"), "(&& (== a b) c)");
        assert_eq!(parsed("a && b == c"), "(&& a (== b c))");
        assert_eq!(parsed("a || b && c"), "(|| a (&& b c))");
        assert_eq!(parsed("a && b || c"), "(|| (&& a b) c)");
        assert_eq!(parsed("!a && b"), "(&& (! a) b)");
        assert_eq!(parsed("-a * b"), "(* (- a) b)");
    }

    #[test]
    fn binary_operators_are_left_associative() {
        assert_eq!(parsed("a - b - c"), "(- (- a b) c)");
        assert_eq!(parsed("a / b / c"), "(/ (/ a b) c)");
    }

    #[test]
    fn conditional_is_right_associative() {
        assert_eq!(parsed("a ? b : c"), "(if a b c)");
        assert_eq!(parsed("a ? b : c ? d : e"), "(if a b (if c d e))");
    }

    #[test]
    fn parses_parenthesis() {
        assert_eq!(parsed("(a)"), "(paren a)");
        assert_eq!(parsed("(a + b) * c"), "(* (paren (+ a b)) c)");
    }

    #[test]
    fn parses_arrays() {
        assert_eq!(parsed("[1, 2, 3]"), "(array 1 2 3)");
        assert_eq!(parsed("[]"), "(array )");
        assert_eq!(parsed("[1,\n 2,\n]"), "(array 1 2)");
        assert_eq!(parsed("[(for), foo, baz]"), "(array (paren for) foo baz)");
    }

    #[test]
    fn rejects_bare_for_in_array() {
        parse_expression("[for, foo, baz]").expect_err("expected parse failure");
    }

    #[test]
    fn parses_objects() {
        assert_eq!(parsed(r#"{ foo = "bar" }"#), r#"(object ("foo" "bar"))"#);
        assert_eq!(parsed("{ foo: bar }"), r#"(object ("foo" bar))"#);
        assert_eq!(parsed("{ (foo) = bar }"), "(object ((paren foo) bar))");
        assert_eq!(
            parsed(r#"{ foo = "bar", baz = 42 }"#),
            r#"(object ("foo" "bar") ("baz" 42))"#
        );
        assert_eq!(
            parsed("{ \"for\" = 1, baz = 2 }"),
            r#"(object ("for" 1) ("baz" 2))"#
        );
        assert_eq!(parsed("{}"), "(object )");
    }

    #[test]
    fn rejects_bare_for_as_first_object_key() {
        parse_expression("{ for = 1, baz = 2 }").expect_err("expected parse failure");
    }

    #[test]
    fn parses_function_calls() {
        assert_eq!(parsed("foo()"), "(call foo )");
        assert_eq!(parsed("foo(1, 2, 3)"), "(call foo 1 2 3)");
        assert_eq!(parsed("foo(1, 2, 3...)"), "(call foo 1 2 3 ...)");
        assert_eq!(parsed("provider::foo(1)"), "(call provider::foo 1)");
    }

    #[test]
    fn parses_get_attr_and_index() {
        assert_eq!(parsed("foo.bar"), "(attr foo bar)");
        assert_eq!(parsed("foo.bar.baz"), "(attr (attr foo bar) baz)");
        assert_eq!(parsed("foo[0]"), "(index foo 0)");
        assert_eq!(parsed("foo[bar]"), "(index foo bar)");
        assert_eq!(parsed("foo.bar[0]"), "(index (attr foo bar) 0)");
    }

    #[test]
    fn parses_attr_splat() {
        assert_eq!(parsed("foo.*"), "(attr-splat foo)");
        assert_eq!(parsed("foo.*.bar"), "(attr-splat foo .bar)");
        assert_eq!(parsed("foo.*.bar.baz"), "(attr-splat foo .bar .baz)");
        // An index after an attr splat applies to the collected array.
        assert_eq!(parsed("foo.*.bar[0]"), "(index (attr-splat foo .bar) 0)");
    }

    #[test]
    fn parses_index_splat() {
        assert_eq!(parsed("foo[*]"), "(index-splat foo)");
        assert_eq!(parsed("foo[*].bar"), "(index-splat foo .bar)");
        assert_eq!(parsed("foo[*][3]"), "(index-splat foo [3])");
        assert_eq!(parsed("foo[*].bar[3]"), "(index-splat foo .bar [3])");
    }

    #[test]
    fn parses_for_tuple_expressions() {
        assert_eq!(parsed("[for a in b: a]"), "(for-tuple a in b: a)");
        assert_eq!(parsed("[for a, b in c: a]"), "(for-tuple a b in c: a)");
        assert_eq!(parsed("[for a in b: a if a]"), "(for-tuple a in b: a if a)");
        assert_eq!(
            parsed("[for a, b in c: a if a]"),
            "(for-tuple a b in c: a if a)"
        );
    }

    #[test]
    fn parses_for_object_expressions() {
        assert_eq!(
            parsed("{for a, b in c: a => b}"),
            "(for-object a b in c: a => b)"
        );
        assert_eq!(parsed("{for a in b: a => a}"), "(for-object a in b: a => a)");
        assert_eq!(
            parsed("{for a in b: a => a if a}"),
            "(for-object a in b: a => a if a)"
        );
        assert_eq!(
            parsed("{for i, v in array : v => i...}"),
            "(for-object i v in array: v => i ...)"
        );
        assert_eq!(
            parsed("{for i, v in array : v => i... if i}"),
            "(for-object i v in array: v => i ... if i)"
        );
    }

    #[test]
    fn expands_string_templates() {
        assert_eq!(parsed(r#""a${b}c""#), r#"(template "a" b "c")"#);
        assert_eq!(parsed(r#""${a}${b}""#), "(template a b)");
        assert_eq!(parsed(r#""${i}:${v}""#), r#"(template i ":" v)"#);
        assert_eq!(parsed(r#""x${1 + 2}""#), r#"(template "x" (+ 1 2))"#);
    }

    #[test]
    fn decodes_escapes() {
        assert_eq!(parsed(r#""a\nb""#), "\"a\\nb\"");
        assert_eq!(parsed(r#""quote: \"hi\"""#), "\"quote: \\\"hi\\\"\"");
        assert_eq!(parsed(r#""$${not_interp}""#), "\"${not_interp}\"");
    }

    #[test]
    fn rejects_unknown_escape() {
        let err = parse_expression(r#""a\qb""#).expect_err("expected parse failure");
        assert!(matches!(err, ParseError::InvalidEscape { character: 'q', .. }));
    }

    #[test]
    fn expands_nested_templates() {
        assert_eq!(
            parsed(r#""outer ${ "inner ${x}" }""#),
            r#"(template "outer " (template "inner " x))"#
        );
    }

    #[test]
    fn template_sub_expressions_carry_absolute_spans() {
        let expr = parse_expression(r#""a${b}""#).expect("parse failed");
        let ExprKind::Template(parts) = &expr.kind else {
            panic!("expected template, got {expr:?}");
        };
        let TemplatePart::Interp(inner) = &parts[1] else {
            panic!("expected interpolation");
        };
        assert_eq!(inner.span, Span::new(4, 5));
    }

    #[test]
    fn parses_heredocs() {
        let expr = parse_expression("<<EOT\nhello\nworld\nEOT").expect("parse failed");
        assert_eq!(
            expr.kind,
            ExprKind::Literal(LitValue::String("hello\nworld".to_string()))
        );
    }

    #[test]
    fn trims_heredoc_common_indentation() {
        let expr = parse_expression("<<-EOT\n    a\n      b\n\n    c\n    EOT").expect("parse failed");
        assert_eq!(
            expr.kind,
            ExprKind::Literal(LitValue::String("a\n  b\n\nc".to_string()))
        );
    }

    #[test]
    fn parses_attribute_spans() {
        let expr = parse_expression("foo.bar").expect("parse failed");
        assert_eq!(expr.span, Span::new(0, 7));
        let ExprKind::GetAttr { on, name } = &expr.kind else {
            panic!("expected get-attr");
        };
        assert_eq!(on.span, Span::new(0, 3));
        assert_eq!(name.span, Span::new(4, 7));
    }

    #[test]
    fn parses_file_with_attributes_and_blocks() {
        let body = parse_file(indoc! {r#"
            version = 1

            locals {
                a = b
            }

            resource "a" {
                a = b
            }

            resource a "b" {
                a = b
            }
        "#})
        .expect("parse failed");

        assert_eq!(body.stmts.len(), 4);
        let Stmt::Attribute(attr) = &body.stmts[0] else {
            panic!("expected attribute");
        };
        assert_eq!(attr.key.name, "version");

        let Stmt::Block(locals) = &body.stmts[1] else {
            panic!("expected block");
        };
        assert_eq!(locals.ident.name, "locals");
        assert!(locals.labels.is_empty());
        assert_eq!(locals.body.len(), 1);

        let Stmt::Block(resource) = &body.stmts[2] else {
            panic!("expected block");
        };
        assert_eq!(resource.key_path(), vec!["resource", "a"]);

        let Stmt::Block(labeled) = &body.stmts[3] else {
            panic!("expected block");
        };
        assert_eq!(labeled.key_path(), vec!["resource", "a", "b"]);
    }

    #[test]
    fn parses_one_line_and_adjacent_blocks() {
        let body =
            parse_file(r#"foo "x" { a = 1 }  foo "y" { b = 2 }"#).expect("parse failed");
        assert_eq!(body.stmts.len(), 2);
        assert_eq!(body.stmts[0].key_path(), vec!["foo", "x"]);
        assert_eq!(body.stmts[1].key_path(), vec!["foo", "y"]);
    }

    #[test]
    fn rejects_attributes_without_separator() {
        parse_file("a = 1 b = 2").expect_err("expected parse failure");
    }

    #[test]
    fn rejects_interpolated_block_labels() {
        let err = parse_file(r#"resource "a${b}" { }"#).expect_err("expected parse failure");
        assert!(matches!(err, ParseError::InvalidBlockLabel { .. }));
    }

    #[test]
    fn finds_blocks_by_type_and_labels() {
        let body = parse_file(indoc! {r#"
            resource "a" { x = 1 }
            resource "b" { x = 2 }
            output { x = 3 }
        "#})
        .expect("parse failed");

        assert_eq!(body.get_blocks(None).len(), 3);
        assert_eq!(body.get_blocks(Some("resource")).len(), 2);
        let block = body.get_block("resource", &["b"]).expect("block not found");
        assert_eq!(block.key_path(), vec!["resource", "b"]);
        assert!(body.get_block("resource", &["c"]).is_none());
    }
}
