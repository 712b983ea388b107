//! Quill lexer — converts script source text to a token stream.
//!
//! - Newlines are plain whitespace; `;` separates expressions.
//! - `#` starts a comment running to end of line.
//! - Integer and floating literals are distinct token kinds.
//! - Error recovery: collects up to [`quill_types::MAX_ERRORS`] errors
//!   instead of stopping at the first.

use quill_types::{ErrorCode, ParseErrors, ScriptError, SourceFile, Span};

use crate::token::{Token, TokenKind};

/// The Quill lexer.
pub struct Lexer<'src> {
    /// The full source text as bytes.
    source: &'src [u8],
    /// Source file for error context.
    source_file: &'src SourceFile,
    /// Current byte offset into `source`.
    pos: usize,
    /// Current line number (1-based).
    line: u32,
    /// Current column number (1-based).
    col: u32,
    /// Collected errors.
    errors: ParseErrors,
}

/// Result of lexing: tokens plus any errors collected.
pub struct LexResult {
    /// The token stream (always ends with [`TokenKind::Eof`]).
    pub tokens: Vec<Token>,
    /// Errors encountered during lexing.
    pub errors: ParseErrors,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given source file.
    pub fn new(source_file: &'src SourceFile) -> Self {
        Self {
            source: source_file.source.as_bytes(),
            source_file,
            pos: 0,
            line: 1,
            col: 1,
            errors: ParseErrors::empty(),
        }
    }

    /// Lex the entire source into a token stream.
    pub fn lex(mut self) -> LexResult {
        let mut tokens = Vec::new();
        loop {
            if self.errors.total_errors >= quill_types::MAX_ERRORS {
                tokens.push(Token::new(TokenKind::Eof, self.here()));
                break;
            }
            let token = self.scan_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        LexResult {
            tokens,
            errors: self.errors,
        }
    }

    // ── Cursor ────────────────────────────────────────────────────────────

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        if byte == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(byte)
    }

    /// Zero-width span at the current position.
    fn here(&self) -> Span {
        Span::point(self.line, self.col)
    }

    fn span_from(&self, start: Span) -> Span {
        start.merge(Span::point(self.line, self.col.saturating_sub(1)))
    }

    fn error(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
        let source_line = self
            .source_file
            .line(span.start_line)
            .unwrap_or("")
            .to_string();
        self.errors.push_error(ScriptError::new(
            self.source_file.name.clone(),
            code,
            message,
            span,
            source_line,
        ));
    }

    // ── Scanning ──────────────────────────────────────────────────────────

    /// Scan the next token. Bad characters report an error and are
    /// skipped, so one call always produces a token.
    fn scan_token(&mut self) -> Token {
        loop {
            self.skip_trivia();
            let start = self.here();
            let Some(byte) = self.bump() else {
                return Token::new(TokenKind::Eof, start);
            };

            let kind = match byte {
                b'+' => TokenKind::Plus,
                b'-' => TokenKind::Minus,
                b'*' => TokenKind::Star,
                b'/' => TokenKind::Slash,
                b'(' => TokenKind::LParen,
                b')' => TokenKind::RParen,
                b'[' => TokenKind::LBracket,
                b']' => TokenKind::RBracket,
                b',' => TokenKind::Comma,
                b';' => TokenKind::Semicolon,
                b'.' => TokenKind::Dot,
                b'@' => TokenKind::At,
                b':' => {
                    if self.peek() == Some(b'=') {
                        self.bump();
                        TokenKind::ColonEq
                    } else {
                        TokenKind::Colon
                    }
                }
                b'=' => {
                    if self.peek() == Some(b'=') {
                        self.bump();
                        TokenKind::EqEq
                    } else {
                        self.error(
                            ErrorCode::UNEXPECTED_CHARACTER,
                            "'=' is not an operator; use '==' to compare or ':=' to bind",
                            self.span_from(start),
                        );
                        continue;
                    }
                }
                b'!' => {
                    if self.peek() == Some(b'=') {
                        self.bump();
                        TokenKind::BangEq
                    } else {
                        self.error(
                            ErrorCode::UNEXPECTED_CHARACTER,
                            "'!' is not an operator; use 'not' or '!='",
                            self.span_from(start),
                        );
                        continue;
                    }
                }
                b'<' => {
                    if self.peek() == Some(b'=') {
                        self.bump();
                        TokenKind::LessEq
                    } else {
                        TokenKind::Less
                    }
                }
                b'>' => {
                    if self.peek() == Some(b'=') {
                        self.bump();
                        TokenKind::GreaterEq
                    } else {
                        TokenKind::Greater
                    }
                }
                b'"' => return self.scan_string(start),
                b'0'..=b'9' => return self.scan_number(start),
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => return self.scan_word(start),
                other => {
                    self.error(
                        ErrorCode::UNEXPECTED_CHARACTER,
                        format!("unexpected character '{}'", other as char),
                        self.span_from(start),
                    );
                    continue;
                }
            };
            return Token::new(kind, self.span_from(start));
        }
    }

    /// Skip whitespace (including newlines) and `#` comments.
    fn skip_trivia(&mut self) {
        while let Some(byte) = self.peek() {
            match byte {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.bump();
                }
                b'#' => {
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_word(&mut self, start: Span) -> Token {
        let begin = self.pos - 1;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.bump();
            } else {
                break;
            }
        }
        let word = std::str::from_utf8(&self.source[begin..self.pos]).unwrap_or_default();
        let kind = match word {
            "if" => TokenKind::If,
            "then" => TokenKind::Then,
            "else" => TokenKind::Else,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "do" => TokenKind::Do,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "xor" => TokenKind::Xor,
            "not" => TokenKind::Not,
            "mod" => TokenKind::Mod,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "nil" => TokenKind::Nil,
            _ => TokenKind::Identifier(word.to_string()),
        };
        Token::new(kind, self.span_from(start))
    }

    fn scan_number(&mut self, start: Span) -> Token {
        let begin = self.pos - 1;
        let mut is_double = false;

        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.bump();
        }
        // A '.' only belongs to the number when a digit follows; otherwise
        // it is member access on an integer literal.
        if self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(b'0'..=b'9')) {
            is_double = true;
            self.bump();
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let mut lookahead = 1;
            if matches!(self.peek_at(1), Some(b'+' | b'-')) {
                lookahead = 2;
            }
            if matches!(self.peek_at(lookahead), Some(b'0'..=b'9')) {
                is_double = true;
                for _ in 0..=lookahead {
                    self.bump();
                }
                while matches!(self.peek(), Some(b'0'..=b'9')) {
                    self.bump();
                }
            }
        }

        let text = std::str::from_utf8(&self.source[begin..self.pos]).unwrap_or_default();
        let span = self.span_from(start);
        if is_double {
            match text.parse::<f64>() {
                Ok(value) => Token::new(TokenKind::DoubleLit(value), span),
                Err(_) => {
                    self.error(
                        ErrorCode::MALFORMED_NUMBER,
                        format!("malformed number '{text}'"),
                        span,
                    );
                    Token::new(TokenKind::DoubleLit(0.0), span)
                }
            }
        } else {
            match text.parse::<i64>() {
                Ok(value) => Token::new(TokenKind::IntLit(value), span),
                Err(_) => {
                    self.error(
                        ErrorCode::MALFORMED_NUMBER,
                        format!("integer '{text}' is out of range"),
                        span,
                    );
                    Token::new(TokenKind::IntLit(0), span)
                }
            }
        }
    }

    fn scan_string(&mut self, start: Span) -> Token {
        let mut value = String::new();
        loop {
            match self.bump() {
                None | Some(b'\n') => {
                    self.error(
                        ErrorCode::UNTERMINATED_STRING,
                        "unterminated string literal",
                        self.span_from(start),
                    );
                    break;
                }
                Some(b'"') => break,
                Some(b'\\') => match self.bump() {
                    Some(b'"') => value.push('"'),
                    Some(b'\\') => value.push('\\'),
                    Some(b'n') => value.push('\n'),
                    Some(b't') => value.push('\t'),
                    Some(b'r') => value.push('\r'),
                    other => {
                        let shown = other.map(|b| (b as char).to_string()).unwrap_or_default();
                        self.error(
                            ErrorCode::INVALID_ESCAPE,
                            format!("invalid escape sequence '\\{shown}'"),
                            self.span_from(start),
                        );
                    }
                },
                Some(byte) => {
                    // Collect the full UTF-8 sequence for multibyte chars.
                    let mut buf = vec![byte];
                    let extra = match byte {
                        0xC0..=0xDF => 1,
                        0xE0..=0xEF => 2,
                        0xF0..=0xF7 => 3,
                        _ => 0,
                    };
                    for _ in 0..extra {
                        if let Some(b) = self.bump() {
                            buf.push(b);
                        }
                    }
                    value.push_str(&String::from_utf8_lossy(&buf));
                }
            }
        }
        Token::new(TokenKind::StringLit(value), self.span_from(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let sf = SourceFile::new("<test>", source);
        let result = Lexer::new(&sf).lex();
        assert!(
            !result.errors.has_errors(),
            "unexpected lex errors: {:?}",
            result.errors.errors
        );
        result.tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn int_dot_is_member_access() {
        assert_eq!(
            kinds("1.x"),
            vec![
                TokenKind::IntLit(1),
                TokenKind::Dot,
                TokenKind::Identifier("x".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn double_with_exponent() {
        assert_eq!(
            kinds("1.5e3"),
            vec![TokenKind::DoubleLit(1500.0), TokenKind::Eof]
        );
    }

    #[test]
    fn colon_eq_vs_colon() {
        assert_eq!(
            kinds("x := 1"),
            vec![
                TokenKind::Identifier("x".into()),
                TokenKind::ColonEq,
                TokenKind::IntLit(1),
                TokenKind::Eof
            ]
        );
        assert_eq!(
            kinds("x: 1"),
            vec![
                TokenKind::Identifier("x".into()),
                TokenKind::Colon,
                TokenKind::IntLit(1),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("1 # the rest is ignored\n+ 2"),
            vec![
                TokenKind::IntLit(1),
                TokenKind::Plus,
                TokenKind::IntLit(2),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let sf = SourceFile::new("<test>", "\"abc");
        let result = Lexer::new(&sf).lex();
        assert!(result.errors.has_errors());
        assert_eq!(result.errors.errors[0].code, ErrorCode::UNTERMINATED_STRING);
    }
}
