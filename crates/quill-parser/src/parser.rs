//! Core parser infrastructure: token cursor, error reporting, helpers.

use quill_lexer::token::{Token, TokenKind};
use quill_lexer::Lexer;
use quill_types::ast::Expr;
use quill_types::{ErrorCode, ParseErrors, ScriptError, SourceFile, Span};

/// The Quill parser.
///
/// Consumes a token stream produced by the lexer and builds an expression
/// tree. Collects errors and attempts recovery when possible; the caller
/// must treat any collected error as "do not evaluate".
pub struct Parser<'src> {
    /// The token stream.
    tokens: Vec<Token>,
    /// Current index into `tokens`.
    pos: usize,
    /// Source file for error context.
    source_file: &'src SourceFile,
    /// Collected errors.
    errors: ParseErrors,
    /// Current expression nesting depth (capped).
    pub(crate) expr_depth: u32,
}

/// Result of parsing one source.
pub struct ParseResult {
    /// The expression tree, present when recovery produced one. Only
    /// meaningful when `errors` is empty.
    pub expr: Option<Expr>,
    pub errors: ParseErrors,
}

/// Lex and parse a source file in one step.
pub fn parse_source(source_file: &SourceFile) -> ParseResult {
    let lexed = Lexer::new(source_file).lex();
    let mut result = Parser::new(lexed.tokens, source_file).parse();
    let mut errors = lexed.errors;
    errors.extend(result.errors);
    result.errors = errors;
    result
}

impl<'src> Parser<'src> {
    /// Create a new parser from a token stream and its source file.
    pub fn new(tokens: Vec<Token>, source_file: &'src SourceFile) -> Self {
        Self {
            tokens,
            pos: 0,
            source_file,
            errors: ParseErrors::empty(),
            expr_depth: 0,
        }
    }

    /// Parse the whole token stream as one (possibly `;`-sequenced)
    /// expression.
    pub fn parse(mut self) -> ParseResult {
        let expr = self.parse_sequence();
        if !self.at_end() {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("expected end of input, got '{}'", self.peek_kind()),
            );
        }
        ParseResult {
            expr,
            errors: self.errors,
        }
    }

    // ── Token cursor ──────────────────────────────────────────────────────

    /// Returns the current token without advancing.
    pub(crate) fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or_else(|| {
            self.tokens
                .last()
                .expect("token stream should end with Eof")
        })
    }

    /// Returns the kind of the current token.
    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    /// Look ahead by `n` tokens from the current position.
    pub(crate) fn look_ahead(&self, n: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    /// Advance the cursor by one and return the consumed token.
    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    /// Returns the span of the current token.
    pub(crate) fn current_span(&self) -> Span {
        self.peek().span
    }

    /// Returns `true` if the current token is `Eof`.
    pub(crate) fn at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    /// Check if the current token matches the given kind exactly.
    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    /// If the current token matches, advance and return `true`.
    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume the given token or report a `MISSING_TOKEN` error.
    pub(crate) fn expect(&mut self, kind: &TokenKind, context: &str) -> bool {
        if self.eat(kind) {
            true
        } else {
            self.error_at_current(
                ErrorCode::MISSING_TOKEN,
                format!("expected '{kind}' {context}, got '{}'", self.peek_kind()),
            );
            false
        }
    }

    // ── Errors ────────────────────────────────────────────────────────────

    pub(crate) fn error_at_current(&mut self, code: ErrorCode, message: impl Into<String>) {
        let span = self.current_span();
        self.error_at(code, message, span);
    }

    pub(crate) fn error_at(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
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
}
