//! Syntax kinds for the scaf DSL.
//!
//! `SyntaxKind` serves dual roles: token kinds (from the lexer) and node
//! kinds (from the parser). Logos derives token recognition; node kinds lack
//! token/regex attributes. `ScafLang` implements Rowan's `Language` trait for
//! tree construction.

#![allow(dead_code)]

use logos::Logos;
use rowan::Language;

/// All token and node kinds. Tokens first, then nodes, then `__LAST` sentinel.
/// `#[repr(u16)]` enables safe transmute in `kind_from_raw`.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum SyntaxKind {
    #[token("(")]
    ParenOpen = 0,
    #[token(")")]
    ParenClose,
    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,
    #[token("{")]
    BraceOpen,
    #[token("}")]
    BraceClose,

    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token("::")]
    DoubleColon,
    #[token(".")]
    Dot,
    #[token("..")]
    DotDot,

    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("!~")]
    NotMatch,
    #[token("?.")]
    QuestionDot,
    #[token("?:")]
    QuestionColon,
    #[token("##")]
    HashHash,

    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("=")]
    Eq,
    #[token("!")]
    Bang,
    #[token("?")]
    Question,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("~")]
    Tilde,
    #[token("$")]
    Dollar,

    #[token("fn")]
    KwFn,
    #[token("import")]
    KwImport,
    #[token("setup")]
    KwSetup,
    #[token("teardown")]
    KwTeardown,
    #[token("test")]
    KwTest,
    #[token("group")]
    KwGroup,
    #[token("assert")]
    KwAssert,
    #[token("where")]
    KwWhere,
    #[token("null")]
    KwNull,
    #[token("true")]
    KwTrue,
    #[token("false")]
    KwFalse,

    /// Identifier, optionally `$`-prefixed (legacy input per §3). Defined
    /// after keywords so they take precedence.
    #[regex(r"\$?[a-zA-Z_][a-zA-Z0-9_]*")]
    Id,

    #[regex(r"`[^`]*`")]
    RawString,

    #[regex(r#""(?:[^"\\]|\\.)*""#)]
    #[regex(r"'(?:[^'\\]|\\.)*'")]
    StringLiteral,

    #[regex(r"0[xX][0-9a-fA-F_]+|0[oO][0-7_]+|0[bB][01_]+|[0-9][0-9_]*(\.[0-9_]+)?([eE][+-]?[0-9_]+)?")]
    Number,

    #[regex(r"[ \t]+")]
    Whitespace,
    #[token("\n")]
    #[token("\r\n")]
    Newline,

    #[regex(r"//[^\n]*")]
    LineComment,
    #[regex(r"/\*(?:[^*]|\*[^/])*\*/")]
    BlockComment,

    /// Coalesced unrecognized bytes.
    Garbage,
    Error,

    // --- Node kinds (non-terminals) ---
    Suite,
    Import,
    Function,
    FnParamList,
    FnParam,
    TypeExpr,
    SetupClause,
    TeardownClause,
    FunctionScope,
    Group,
    Test,
    Statement,
    StatementValue,
    WhereClause,
    Value,
    ValueList,
    ValueMap,
    ValueMapEntry,
    Assert,
    AssertQuery,
    ParenExpr,
    CallArgs,

    // Must be last - used for bounds checking in `kind_from_raw`.
    #[doc(hidden)]
    __LAST,
}

use SyntaxKind::*;

impl SyntaxKind {
    #[inline]
    pub fn is_trivia(self) -> bool {
        matches!(self, Whitespace | Newline | LineComment | BlockComment)
    }

    #[inline]
    pub fn is_comment(self) -> bool {
        matches!(self, LineComment | BlockComment)
    }

    #[inline]
    pub fn is_error(self) -> bool {
        matches!(self, Error | Garbage)
    }

    #[inline]
    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            KwFn | KwImport
                | KwSetup
                | KwTeardown
                | KwTest
                | KwGroup
                | KwAssert
                | KwWhere
                | KwNull
                | KwTrue
                | KwFalse
        )
    }
}

impl From<SyntaxKind> for rowan::SyntaxKind {
    #[inline]
    fn from(kind: SyntaxKind) -> Self {
        Self(kind as u16)
    }
}

/// Language tag for Rowan's tree types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScafLang {}

impl Language for ScafLang {
    type Kind = SyntaxKind;

    fn kind_from_raw(raw: rowan::SyntaxKind) -> Self::Kind {
        assert!(raw.0 < __LAST as u16);
        // SAFETY: bounds-checked above; SyntaxKind is repr(u16).
        unsafe { std::mem::transmute::<u16, SyntaxKind>(raw.0) }
    }

    fn kind_to_raw(kind: Self::Kind) -> rowan::SyntaxKind {
        kind.into()
    }
}

pub type SyntaxNode = rowan::SyntaxNode<ScafLang>;
pub type SyntaxToken = rowan::SyntaxToken<ScafLang>;
pub type SyntaxElement = rowan::NodeOrToken<SyntaxNode, SyntaxToken>;

/// 64-bit bitset of `SyntaxKind`s for O(1) membership testing.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TokenSet(u64);

impl TokenSet {
    pub const EMPTY: TokenSet = TokenSet(0);

    /// Panics at compile time if any kind's discriminant >= 64.
    #[inline]
    pub const fn new(kinds: &[SyntaxKind]) -> Self {
        let mut bits = 0u64;
        let mut i = 0;
        while i < kinds.len() {
            let kind = kinds[i] as u16;
            assert!(kind < 64, "SyntaxKind value exceeds TokenSet capacity");
            bits |= 1 << kind;
            i += 1;
        }
        TokenSet(bits)
    }

    #[inline]
    pub const fn single(kind: SyntaxKind) -> Self {
        let kind = kind as u16;
        assert!(kind < 64, "SyntaxKind value exceeds TokenSet capacity");
        TokenSet(1 << kind)
    }

    #[inline]
    pub const fn contains(&self, kind: SyntaxKind) -> bool {
        let kind = kind as u16;
        if kind >= 64 {
            return false;
        }
        self.0 & (1 << kind) != 0
    }

    #[inline]
    pub const fn union(self, other: TokenSet) -> TokenSet {
        TokenSet(self.0 | other.0)
    }
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut list = f.debug_set();
        for i in 0..64u16 {
            if self.0 & (1 << i) != 0 && i < __LAST as u16 {
                let kind: SyntaxKind = unsafe { std::mem::transmute(i) };
                list.entry(&kind);
            }
        }
        list.finish()
    }
}

/// Pre-defined token sets for the parser's recovery logic (§4.3).
pub mod token_sets {
    use super::*;

    /// Synchronization points the recovering parser skips forward to.
    pub const SYNC_POINTS: TokenSet = TokenSet::new(&[
        BraceClose,
        KwTest,
        KwGroup,
        KwFn,
        KwImport,
        KwSetup,
        KwTeardown,
        KwAssert,
    ]);

    pub const VALUE_FIRST: TokenSet = TokenSet::new(&[
        KwNull,
        KwTrue,
        KwFalse,
        StringLiteral,
        Number,
        BracketOpen,
        BraceOpen,
    ]);

    pub const TRIVIA: TokenSet = TokenSet::new(&[Whitespace, Newline, LineComment, BlockComment]);

    pub const ITEM_FIRST: TokenSet = TokenSet::new(&[KwTest, KwGroup]);

    pub const DELIMITERS_OPEN: TokenSet = TokenSet::new(&[ParenOpen, BracketOpen, BraceOpen]);
    pub const DELIMITERS_CLOSE: TokenSet = TokenSet::new(&[ParenClose, BracketClose, BraceClose]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_set_membership() {
        let set = TokenSet::new(&[KwFn, KwImport]);
        assert!(set.contains(KwFn));
        assert!(set.contains(KwImport));
        assert!(!set.contains(KwTest));
    }

    #[test]
    fn token_set_union() {
        let a = TokenSet::single(KwFn);
        let b = TokenSet::single(KwTest);
        let u = a.union(b);
        assert!(u.contains(KwFn));
        assert!(u.contains(KwTest));
        assert!(!u.contains(KwGroup));
    }

    #[test]
    fn sync_points_cover_every_def_starter() {
        for k in [KwTest, KwGroup, KwFn, KwImport, KwSetup, KwTeardown, KwAssert] {
            assert!(token_sets::SYNC_POINTS.contains(k));
        }
    }
}
