//! Parser state machine and low-level token/tree-building operations.
//!
//! Trivia tokens (whitespace, comments) are buffered and flushed as leading
//! trivia when starting a new node. This gives predictable trivia
//! attachment without backtracking (the classification in [`crate::trivia`]
//! runs afterward, over the finished tree).

use rowan::{Checkpoint, GreenNode, GreenNodeBuilder, TextRange, TextSize};

use crate::ast::Suite;
use crate::cst::token_sets::SYNC_POINTS;
use crate::cst::{SyntaxKind, SyntaxNode, TokenSet};
use crate::diagnostics::{Diagnostics, DiagnosticKind};
use crate::lexer::{token_text, LineIndex, Token};
use scaf_core::Error;

#[derive(Debug)]
pub struct ParseResult {
    pub root: Suite,
    pub diagnostics: Diagnostics,
    pub recovered: bool,
    pub exec_fuel_consumed: u32,
}

#[derive(Debug, Clone, Copy)]
pub(super) struct OpenDelimiter {
    pub kind: SyntaxKind,
    pub span: TextRange,
}

pub struct Parser<'src> {
    pub(super) source: &'src str,
    pub(super) line_index: LineIndex,
    pub(super) tokens: Vec<Token>,
    pub(super) pos: usize,
    pub(super) trivia_buffer: Vec<Token>,
    pub(super) builder: GreenNodeBuilder<'static>,
    pub(super) diagnostics: Diagnostics,
    pub(super) depth: u32,
    pub(super) last_diagnostic_pos: Option<TextSize>,
    pub(super) delimiter_stack: Vec<OpenDelimiter>,
    pub(super) recovered: bool,
    exec_fuel_remaining: Option<u32>,
    exec_fuel_initial: Option<u32>,
    recursion_fuel_limit: Option<u32>,
    fatal_error: Option<Error>,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str, tokens: Vec<Token>) -> Self {
        Self {
            source,
            line_index: LineIndex::new(source),
            tokens,
            pos: 0,
            trivia_buffer: Vec::with_capacity(4),
            builder: GreenNodeBuilder::new(),
            diagnostics: Diagnostics::new(),
            depth: 0,
            last_diagnostic_pos: None,
            delimiter_stack: Vec::with_capacity(8),
            recovered: false,
            exec_fuel_remaining: None,
            exec_fuel_initial: None,
            recursion_fuel_limit: None,
            fatal_error: None,
        }
    }

    pub fn with_exec_fuel(mut self, limit: Option<u32>) -> Self {
        self.exec_fuel_initial = limit;
        self.exec_fuel_remaining = limit;
        self
    }

    pub fn with_recursion_fuel(mut self, limit: Option<u32>) -> Self {
        self.recursion_fuel_limit = limit;
        self
    }

    pub fn max_diagnostics(mut self, max: usize) -> Self {
        self.diagnostics.set_cap(max);
        self
    }

    pub(crate) fn finish(mut self) -> Result<(GreenNode, Diagnostics, bool, u32), Error> {
        self.drain_trivia();
        if let Some(err) = self.fatal_error {
            return Err(err);
        }
        let consumed = match (self.exec_fuel_initial, self.exec_fuel_remaining) {
            (Some(initial), Some(remaining)) => initial.saturating_sub(remaining),
            _ => 0,
        };
        Ok((self.builder.finish(), self.diagnostics, self.recovered, consumed))
    }

    pub(super) fn has_fatal_error(&self) -> bool {
        self.fatal_error.is_some()
    }

    pub(super) fn current(&self) -> SyntaxKind {
        self.nth(0)
    }

    pub(super) fn nth(&self, lookahead: usize) -> SyntaxKind {
        self.tokens
            .get(self.pos + lookahead)
            .map_or(SyntaxKind::Error, |t| t.kind)
    }

    fn consume_exec_fuel(&mut self) {
        if let Some(remaining) = &mut self.exec_fuel_remaining {
            if *remaining == 0 {
                if self.fatal_error.is_none() {
                    self.fatal_error = Some(Error::ExecFuelExhausted);
                }
                return;
            }
            *remaining -= 1;
        }
    }

    pub(super) fn current_span(&self) -> TextRange {
        self.tokens
            .get(self.pos)
            .map_or_else(|| TextRange::empty(self.eof_offset()), |t| t.span)
    }

    pub(super) fn current_scaf_span(&self) -> scaf_core::Span {
        self.line_index.span(self.current_span())
    }

    pub(super) fn eof_offset(&self) -> TextSize {
        TextSize::from(self.source.len() as u32)
    }

    pub(super) fn eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub(super) fn should_stop(&self) -> bool {
        self.eof() || self.has_fatal_error()
    }

    pub(super) fn at(&self, kind: SyntaxKind) -> bool {
        self.current() == kind
    }

    pub(super) fn at_set(&self, set: TokenSet) -> bool {
        set.contains(self.current())
    }

    pub(super) fn peek(&mut self) -> SyntaxKind {
        self.skip_trivia_to_buffer();
        self.current()
    }

    pub(super) fn peek_nth(&mut self, n: usize) -> SyntaxKind {
        self.skip_trivia_to_buffer();
        let mut count = 0;
        let mut pos = self.pos;
        while pos < self.tokens.len() {
            let kind = self.tokens[pos].kind;
            if !kind.is_trivia() {
                if count == n {
                    return kind;
                }
                count += 1;
            }
            pos += 1;
        }
        SyntaxKind::Error
    }

    pub(super) fn skip_trivia_to_buffer(&mut self) {
        while self.pos < self.tokens.len() && self.tokens[self.pos].kind.is_trivia() {
            self.trivia_buffer.push(self.tokens[self.pos]);
            self.pos += 1;
        }
    }

    pub(super) fn drain_trivia(&mut self) {
        for token in self.trivia_buffer.drain(..) {
            let text = token_text(self.source, &token);
            self.builder.token(token.kind.into(), text);
        }
    }

    pub(super) fn start_node(&mut self, kind: SyntaxKind) {
        self.skip_trivia_to_buffer();
        self.drain_trivia();
        self.builder.start_node(kind.into());
    }

    pub(super) fn start_node_at(&mut self, checkpoint: Checkpoint, kind: SyntaxKind) {
        self.builder.start_node_at(checkpoint, kind.into());
    }

    pub(super) fn finish_node(&mut self) {
        self.builder.finish_node();
    }

    pub(super) fn checkpoint(&mut self) -> Checkpoint {
        self.skip_trivia_to_buffer();
        self.drain_trivia();
        self.builder.checkpoint()
    }

    pub(super) fn bump(&mut self) {
        self.skip_trivia_to_buffer();
        self.drain_trivia();
        assert!(!self.eof(), "bump called at EOF");
        self.consume_exec_fuel();
        let token = self.tokens[self.pos];
        let text = token_text(self.source, &token);
        self.builder.token(token.kind.into(), text);
        self.pos += 1;
    }

    pub(super) fn eat(&mut self, kind: SyntaxKind) -> bool {
        self.skip_trivia_to_buffer();
        if self.current() == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    /// On mismatch: emit a diagnostic but don't consume, so the caller can
    /// attempt its own recovery.
    pub(super) fn expect(&mut self, kind: SyntaxKind, what: &str) -> bool {
        if self.eat(kind) {
            return true;
        }
        self.error_msg(DiagnosticKind::ParseError, format!("expected {what}"));
        false
    }

    pub(super) fn error(&mut self, kind: DiagnosticKind) {
        self.error_msg(kind, kind.default_message());
    }

    pub(super) fn error_msg(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        let range = self.current_span();
        let pos = range.start();
        if self.last_diagnostic_pos == Some(pos) {
            return;
        }
        self.last_diagnostic_pos = Some(pos);
        let span = self.line_index.span(range);
        self.diagnostics.report(kind, span).message(message).emit();
    }

    /// Skip forward to the next synchronization point (§4.3), wrapping the
    /// skipped span in an `Error` node. Returns whether recovery advanced.
    pub(super) fn synchronize(&mut self) -> bool {
        if self.should_stop() || self.at_sync_point() {
            return false;
        }

        self.recovered = true;
        self.start_node(SyntaxKind::Error);
        let mut local_delims = 0i32;
        while !self.should_stop() {
            self.skip_trivia_to_buffer();
            match self.current() {
                k if crate::cst::token_sets::DELIMITERS_OPEN.contains(k) => local_delims += 1,
                k if crate::cst::token_sets::DELIMITERS_CLOSE.contains(k) => {
                    if local_delims == 0 && SYNC_POINTS.contains(k) {
                        break;
                    }
                    local_delims -= 1;
                }
                k if local_delims == 0 && SYNC_POINTS.contains(k) => break,
                _ => {}
            }
            if self.eof() {
                break;
            }
            self.bump();
        }
        self.finish_node();
        true
    }

    fn at_sync_point(&mut self) -> bool {
        SYNC_POINTS.contains(self.peek())
    }

    pub(super) fn enter_recursion(&mut self) -> bool {
        if let Some(limit) = self.recursion_fuel_limit {
            if self.depth >= limit {
                if self.fatal_error.is_none() {
                    self.fatal_error = Some(Error::RecursionLimitExceeded);
                }
                return false;
            }
        }
        self.depth += 1;
        true
    }

    pub(super) fn exit_recursion(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub(super) fn push_delimiter(&mut self, kind: SyntaxKind) {
        self.delimiter_stack.push(OpenDelimiter {
            kind,
            span: self.current_span(),
        });
    }

    pub(super) fn pop_delimiter(&mut self) -> Option<OpenDelimiter> {
        self.delimiter_stack.pop()
    }
}
