//! Lexer for the scaf DSL.
//!
//! Produces span-based tokens without storing text; text is sliced from
//! source only when needed. Mirrors the teacher's error-coalescing policy:
//! consecutive unrecognized bytes become a single `Garbage` token rather than
//! one diagnostic per byte.

use std::ops::Range;
use std::sync::Mutex;

use logos::Logos;
use rowan::TextRange;

use crate::cst::SyntaxKind;

/// Zero-copy token: kind + span, text retrieved via [`token_text`] when needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: SyntaxKind,
    pub span: TextRange,
}

impl Token {
    #[inline]
    pub fn new(kind: SyntaxKind, span: TextRange) -> Self {
        Self { kind, span }
    }
}

fn range_to_text_range(range: Range<usize>) -> TextRange {
    TextRange::new((range.start as u32).into(), (range.end as u32).into())
}

/// Lexing is guarded by a process-wide lock (per the concurrency model in
/// §5): the definition layer is a singleton, so concurrent parses must
/// serialize their lex+trivia-attach critical section.
static LEX_LOCK: Mutex<()> = Mutex::new(());

/// Tokenizes source into a vector of span-based tokens, holding the
/// process-wide lexer lock for the duration of the scan.
pub fn lex(source: &str) -> Vec<Token> {
    let _guard = LEX_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    lex_unlocked(source)
}

fn lex_unlocked(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut lexer = SyntaxKind::lexer(source);
    let mut error_start: Option<usize> = None;

    loop {
        match lexer.next() {
            Some(Ok(kind)) => {
                if let Some(start) = error_start.take() {
                    let end = lexer.span().start;
                    tokens.push(Token::new(
                        SyntaxKind::Garbage,
                        range_to_text_range(start..end),
                    ));
                }
                tokens.push(Token::new(kind, range_to_text_range(lexer.span())));
            }
            Some(Err(())) => {
                if error_start.is_none() {
                    error_start = Some(lexer.span().start);
                }
            }
            None => {
                if let Some(start) = error_start.take() {
                    tokens.push(Token::new(
                        SyntaxKind::Garbage,
                        range_to_text_range(start..source.len()),
                    ));
                }
                break;
            }
        }
    }

    tokens
}

/// Retrieves the text slice for a token. O(1) slice into source.
#[inline]
pub fn token_text<'s>(source: &'s str, token: &Token) -> &'s str {
    &source[std::ops::Range::<usize>::from(token.span)]
}

/// Maps byte offsets to 1-based line/column, built once per file and reused
/// by the diagnostic engine and position utilities (C10).
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset of the start of each line.
    line_starts: Vec<u32>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0u32];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        Self { line_starts }
    }

    /// Converts a byte offset into a [`scaf_core::Position`].
    pub fn position(&self, offset: u32) -> scaf_core::Position {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let col = offset - self.line_starts[line] + 1;
        scaf_core::Position::new((line + 1) as u32, col, offset)
    }

    pub fn span(&self, range: TextRange) -> scaf_core::Span {
        scaf_core::Span::new(
            self.position(range.start().into()),
            self.position(range.end().into()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cst::SyntaxKind::*;

    fn kinds(source: &str) -> Vec<SyntaxKind> {
        lex(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_keywords_and_punctuation() {
        assert_eq!(
            kinds("fn import setup teardown test group assert where"),
            vec![
                KwFn, Whitespace, KwImport, Whitespace, KwSetup, Whitespace, KwTeardown,
                Whitespace, KwTest, Whitespace, KwGroup, Whitespace, KwAssert, Whitespace, KwWhere
            ]
        );
    }

    #[test]
    fn coalesces_consecutive_garbage() {
        let toks = lex("a \u{7} \u{7} b");
        let garbage: Vec<_> = toks.iter().filter(|t| t.kind == Garbage).collect();
        assert_eq!(garbage.len(), 1, "adjacent-ish garbage runs should coalesce, got {toks:?}");
    }

    #[test]
    fn numeric_literal_bases_and_separators() {
        for lit in ["0x1_F", "0o17", "0b1010", "1_000", "1.5e10", "1.5e-10"] {
            let toks = lex(lit);
            assert_eq!(toks.len(), 1, "{lit:?} should lex as one token, got {toks:?}");
            assert_eq!(toks[0].kind, Number);
        }
    }

    #[test]
    fn dollar_prefixed_identifier() {
        let toks = lex("$name");
        assert_eq!(toks.len(), 1);
        assert_eq!(toks[0].kind, Id);
    }

    #[test]
    fn two_char_operators_take_precedence_over_one_char() {
        assert_eq!(kinds("&&"), vec![AndAnd]);
        assert_eq!(kinds("=="), vec![EqEq]);
        assert_eq!(kinds("?."), vec![QuestionDot]);
        assert_eq!(kinds("?:"), vec![QuestionColon]);
    }

    #[test]
    fn line_index_maps_offsets_across_lines() {
        let src = "abc\ndef\nghi";
        let idx = LineIndex::new(src);
        assert_eq!(idx.position(0), scaf_core::Position::new(1, 1, 0));
        assert_eq!(idx.position(4), scaf_core::Position::new(2, 1, 4));
        assert_eq!(idx.position(8), scaf_core::Position::new(3, 1, 8));
    }

    #[test]
    fn token_text_slices_source() {
        let toks = lex("fn");
        assert_eq!(token_text("fn", &toks[0]), "fn");
    }
}
