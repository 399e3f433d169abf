use thiserror::Error;

use crate::token::{Span, Token, TokenKind};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("Unexpected character '{character}' at position {position}")]
    UnexpectedCharacter { character: char, position: usize },
    #[error("Invalid number literal '{literal}' at position {position}")]
    InvalidNumber { literal: String, position: usize },
    #[error("Unterminated string literal at position {position}")]
    UnterminatedString { position: usize },
    #[error("Unterminated heredoc at position {position}")]
    UnterminatedHeredoc { position: usize },
    #[error("Heredoc tag must start on its own line at position {position}")]
    InvalidHeredocTag { position: usize },
    #[error("Unterminated block comment at position {position}")]
    UnterminatedBlockComment { position: usize },
}

pub type LexResult<T> = Result<T, LexError>;

/// Hand-written lexer over a source slice.
///
/// Newlines are significant and emitted as tokens; spaces, tabs, and
/// comments are skipped. String and heredoc tokens carry their raw contents;
/// escape decoding and `${...}` template expansion happen in the parser.
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    /// Added to every span, so sub-lexers for template interpolations
    /// report positions in the outer source.
    base: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self::with_offset(input, 0)
    }

    pub fn with_offset(input: &'a str, base: usize) -> Self {
        Self { input, pos: 0, base }
    }

    pub fn next_token(&mut self) -> LexResult<Token<'a>> {
        loop {
            self.consume_while(|c| c == ' ' || c == '\t' || c == '\r');

            let start = self.pos;
            let Some(ch) = self.peek_char() else {
                return Ok(self.token(TokenKind::Eof, start, start));
            };

            match ch {
                '\n' => {
                    self.consume_char();
                    return Ok(self.token(TokenKind::Newline, start, self.pos));
                }
                '#' => {
                    self.consume_while(|c| c != '\n');
                }
                '/' if self.char_at(self.pos + 1) == Some('/') => {
                    self.consume_while(|c| c != '\n');
                }
                '/' if self.char_at(self.pos + 1) == Some('*') => {
                    if self.skip_block_comment(start)? {
                        // A comment spanning lines separates statements the
                        // same way the newline it swallowed would have.
                        return Ok(self.token(TokenKind::Newline, start, self.pos));
                    }
                }
                '"' => return self.read_string(start),
                '<' if self.char_at(self.pos + 1) == Some('<') => {
                    return self.read_heredoc(start);
                }
                c if c.is_ascii_digit() => return self.read_number(start),
                c if c.is_alphabetic() || c == '_' => return Ok(self.read_identifier(start)),
                _ => return self.read_operator(start),
            }
        }
    }

    fn read_operator(&mut self, start: usize) -> LexResult<Token<'a>> {
        let ch = self.consume_char().expect("read_operator called at EOF");
        let kind = match ch {
            '=' => match self.peek_char() {
                Some('=') => self.consume_and(TokenKind::Eq),
                Some('>') => self.consume_and(TokenKind::FatArrow),
                _ => TokenKind::Assign,
            },
            '!' => match self.peek_char() {
                Some('=') => self.consume_and(TokenKind::NotEq),
                _ => TokenKind::Bang,
            },
            '<' => match self.peek_char() {
                Some('=') => self.consume_and(TokenKind::LtEq),
                _ => TokenKind::Lt,
            },
            '>' => match self.peek_char() {
                Some('=') => self.consume_and(TokenKind::GtEq),
                _ => TokenKind::Gt,
            },
            '&' => match self.peek_char() {
                Some('&') => self.consume_and(TokenKind::And),
                _ => {
                    return Err(LexError::UnexpectedCharacter {
                        character: '&',
                        position: self.base + start,
                    });
                }
            },
            '|' => match self.peek_char() {
                Some('|') => self.consume_and(TokenKind::Or),
                _ => {
                    return Err(LexError::UnexpectedCharacter {
                        character: '|',
                        position: self.base + start,
                    });
                }
            },
            '.' => {
                if self.peek_char() == Some('.') && self.char_at(self.pos + 1) == Some('.') {
                    self.consume_char();
                    self.consume_char();
                    TokenKind::Ellipsis
                } else {
                    TokenKind::Dot
                }
            }
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '?' => TokenKind::Question,
            ':' => TokenKind::Colon,
            ',' => TokenKind::Comma,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            character => {
                return Err(LexError::UnexpectedCharacter {
                    character,
                    position: self.base + start,
                });
            }
        };
        Ok(self.token(kind, start, self.pos))
    }

    fn consume_and(&mut self, kind: TokenKind<'a>) -> TokenKind<'a> {
        self.consume_char();
        kind
    }

    /// Identifiers continue through `[A-Za-z0-9_-]` and embedded `::`.
    fn read_identifier(&mut self, start: usize) -> Token<'a> {
        loop {
            match self.peek_char() {
                Some(c) if c.is_alphanumeric() || c == '_' || c == '-' => {
                    self.consume_char();
                }
                Some(':') if self.char_at(self.pos + 1) == Some(':') => {
                    self.consume_char();
                    self.consume_char();
                }
                _ => break,
            }
        }
        let ident = &self.input[start..self.pos];
        let kind = match ident {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            _ => TokenKind::Ident(ident),
        };
        self.token(kind, start, self.pos)
    }

    fn read_number(&mut self, start: usize) -> LexResult<Token<'a>> {
        self.consume_while(|c| c.is_ascii_digit());
        let mut is_float = false;

        if self.peek_char() == Some('.')
            && self
                .char_at(self.pos + 1)
                .is_some_and(|c| c.is_ascii_digit())
        {
            is_float = true;
            self.consume_char();
            self.consume_while(|c| c.is_ascii_digit());
        }

        if matches!(self.peek_char(), Some('e' | 'E')) {
            let mut after_sign = self.pos + 1;
            if matches!(self.char_at(after_sign), Some('+' | '-')) {
                after_sign += 1;
            }
            if self.char_at(after_sign).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                while self.pos < after_sign {
                    self.consume_char();
                }
                self.consume_while(|c| c.is_ascii_digit());
            }
        }

        let literal = &self.input[start..self.pos];
        let kind = if is_float {
            let value = literal.parse::<f64>().map_err(|_| LexError::InvalidNumber {
                literal: literal.to_string(),
                position: self.base + start,
            })?;
            TokenKind::Float(value)
        } else {
            let value = literal.parse::<i64>().map_err(|_| LexError::InvalidNumber {
                literal: literal.to_string(),
                position: self.base + start,
            })?;
            TokenKind::Int(value)
        };
        Ok(self.token(kind, start, self.pos))
    }

    /// Scan a quoted string, returning its raw contents.
    ///
    /// The closing quote is found while honoring `\` escapes and `${...}`
    /// interpolations, which may themselves contain strings and further
    /// interpolations. The mode stack tracks whether we are inside quotes
    /// (`true`) or inside interpolation braces (`false`).
    fn read_string(&mut self, start: usize) -> LexResult<Token<'a>> {
        self.consume_char(); // opening quote
        let content_start = self.pos;
        let mut modes = vec![true];

        while let Some(c) = self.consume_char() {
            let in_string = *modes.last().expect("mode stack is never empty");
            if in_string {
                match c {
                    '\\' => {
                        if self.consume_char().is_none() {
                            break;
                        }
                    }
                    '"' => {
                        modes.pop();
                        if modes.is_empty() {
                            let content = &self.input[content_start..self.pos - 1];
                            return Ok(self.token(TokenKind::Str(content), start, self.pos));
                        }
                    }
                    '$' => {
                        if self.peek_char() == Some('$') {
                            self.consume_char();
                        } else if self.peek_char() == Some('{') {
                            self.consume_char();
                            modes.push(false);
                        }
                    }
                    '\n' => break,
                    _ => {}
                }
            } else {
                match c {
                    '"' => modes.push(true),
                    '{' => modes.push(false),
                    '}' => {
                        modes.pop();
                    }
                    _ => {}
                }
            }
        }

        Err(LexError::UnterminatedString {
            position: self.base + start,
        })
    }

    /// `<<TAG` / `<<-TAG` up to a line holding only the tag (leading
    /// whitespace allowed). The body excludes the newline before that line.
    fn read_heredoc(&mut self, start: usize) -> LexResult<Token<'a>> {
        self.consume_char();
        self.consume_char(); // <<
        let trim = if self.peek_char() == Some('-') {
            self.consume_char();
            true
        } else {
            false
        };

        let tag_start = self.pos;
        if !self
            .peek_char()
            .is_some_and(|c| c.is_alphabetic() || c == '_')
        {
            return Err(LexError::InvalidHeredocTag {
                position: self.base + self.pos,
            });
        }
        self.consume_while(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.');
        let tag = &self.input[tag_start..self.pos];

        self.consume_while(|c| c == ' ' || c == '\t' || c == '\r');
        if self.consume_char() != Some('\n') {
            return Err(LexError::InvalidHeredocTag {
                position: self.base + self.pos,
            });
        }

        let body_start = self.pos;
        loop {
            let line_start = self.pos;
            self.consume_while(|c| c != '\n');
            let line = self.input[line_start..self.pos].trim();
            let at_eof = self.peek_char().is_none();

            if line == tag {
                let body_end = line_start.saturating_sub(1).max(body_start);
                let body = &self.input[body_start..body_end];
                return Ok(self.token(TokenKind::Heredoc { body, trim }, start, self.pos));
            }
            if at_eof {
                return Err(LexError::UnterminatedHeredoc {
                    position: self.base + start,
                });
            }
            self.consume_char(); // newline
        }
    }

    /// Returns true when the comment spanned more than one line.
    fn skip_block_comment(&mut self, start: usize) -> LexResult<bool> {
        self.consume_char();
        self.consume_char(); // /*
        let mut saw_newline = false;
        loop {
            match self.consume_char() {
                Some('*') if self.peek_char() == Some('/') => {
                    self.consume_char();
                    return Ok(saw_newline);
                }
                Some('\n') => saw_newline = true,
                Some(_) => {}
                None => {
                    return Err(LexError::UnterminatedBlockComment {
                        position: self.base + start,
                    });
                }
            }
        }
    }

    fn token(&self, kind: TokenKind<'a>, start: usize, end: usize) -> Token<'a> {
        Token::new(kind, Span::new(self.base + start, self.base + end))
    }

    fn consume_while<P>(&mut self, keep_predicate: P) -> usize
    where
        P: Fn(char) -> bool,
    {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if !keep_predicate(c) {
                break;
            }
            self.consume_char();
        }
        self.pos - start
    }

    fn char_at(&self, index: usize) -> Option<char> {
        self.input.get(index..).and_then(|rest| rest.chars().next())
    }

    fn peek_char(&self) -> Option<char> {
        self.char_at(self.pos)
    }

    fn consume_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }
}

pub fn tokenize(input: &str) -> LexResult<Vec<Token<'_>>> {
    tokenize_with_offset(input, 0)
}

pub(crate) fn tokenize_with_offset(input: &str, base: usize) -> LexResult<Vec<Token<'_>>> {
    let mut lexer = Lexer::with_offset(input, base);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let is_eof = matches!(token.kind, TokenKind::Eof);
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    Ok(tokens)
}
