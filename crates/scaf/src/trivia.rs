//! Trivia attachment: assigns each comment to the node it documents (§4.2).
//!
//! Rowan already threads trivia tokens into the tree at their lexical
//! position; this pass only *classifies* each comment as leading or trailing
//! for a particular declaration node, producing a side-table the printer and
//! the LSP hover/doc-comment lookup consult. It never mutates the tree.

use std::collections::HashMap;

use crate::ast::Suite;
use crate::cst::{SyntaxKind, SyntaxNode, SyntaxToken};
use crate::lexer::LineIndex;

/// Kinds that are meaningful attachment targets for comments. Anything finer
/// (e.g. a `Value` inside a list) is not a useful anchor for documentation.
const ATTACHMENT_KINDS: &[SyntaxKind] = &[
    SyntaxKind::Import,
    SyntaxKind::Function,
    SyntaxKind::FnParam,
    SyntaxKind::FunctionScope,
    SyntaxKind::Group,
    SyntaxKind::Test,
    SyntaxKind::Statement,
    SyntaxKind::Assert,
];

#[derive(Debug, Clone)]
pub struct Comment {
    pub text: String,
    pub span: scaf_core::Span,
    /// Whether at least one blank line separates this comment from whatever
    /// preceded it.
    pub preceded_by_blank_line: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TriviaMap {
    leading: HashMap<SyntaxNode, Vec<Comment>>,
    trailing: HashMap<SyntaxNode, Comment>,
    suite_leading: Vec<Comment>,
}

impl TriviaMap {
    pub fn leading(&self, node: &SyntaxNode) -> &[Comment] {
        self.leading.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn trailing(&self, node: &SyntaxNode) -> Option<&Comment> {
        self.trailing.get(node)
    }

    pub fn suite_leading(&self) -> &[Comment] {
        &self.suite_leading
    }
}

/// Attaches every comment in `suite` to the nearest node per the rules in
/// §4.2: trailing if same-line-after a node, else leading on the closest
/// following attachment-worthy node, else (for blank-line-separated comments
/// before the first declaration) leading on the `Suite` itself.
pub fn attach_trivia(suite: &Suite, source: &str) -> TriviaMap {
    let line_index = LineIndex::new(source);
    let root = suite.as_cst();

    let mut targets: Vec<SyntaxNode> = root
        .descendants()
        .filter(|n| ATTACHMENT_KINDS.contains(&n.kind()))
        .collect();
    targets.sort_by_key(|n| u32::from(n.text_range().start()));

    let comments: Vec<SyntaxToken> = root
        .descendants_with_tokens()
        .filter_map(|el| el.into_token())
        .filter(|t| t.kind().is_comment())
        .collect();

    let mut map = TriviaMap::default();

    for tok in comments {
        let span = line_index.span(tok.text_range());
        let preceded_by_blank_line = has_blank_line_before(&tok);
        let comment = Comment {
            text: tok.text().to_string(),
            span,
            preceded_by_blank_line,
        };

        // Trailing: a target node whose end is on the comment's start line
        // and strictly before the comment.
        if let Some(preceding) = targets
            .iter()
            .filter(|n| {
                let end = line_index.position(n.text_range().end().into());
                end.line == span.start.line && end.offset <= span.start.offset
            })
            .max_by_key(|n| u32::from(n.text_range().end()))
        {
            map.trailing.insert(preceding.clone(), comment);
            continue;
        }

        // Leading: closest following target node.
        if let Some(following) = targets
            .iter()
            .filter(|n| u32::from(n.text_range().start()) >= u32::from(tok.text_range().end()))
            .min_by_key(|n| u32::from(n.text_range().start()))
        {
            let is_before_first_decl = targets.first().is_some_and(|first| first == following);
            let separated_from_following = has_blank_line_after(&tok);
            if is_before_first_decl && separated_from_following {
                map.suite_leading.push(comment);
            } else {
                map.leading.entry(following.clone()).or_default().push(comment);
            }
            continue;
        }

        // No following node: attaches to the Suite.
        map.suite_leading.push(comment);
    }

    map
}

fn has_blank_line_before(tok: &SyntaxToken) -> bool {
    let mut newline_count = 0;
    let mut prev = tok.prev_sibling_or_token();
    while let Some(el) = prev {
        match el.as_token().map(|t| t.kind()) {
            Some(SyntaxKind::Newline) => {
                newline_count += 1;
                if newline_count >= 2 {
                    return true;
                }
            }
            Some(k) if k == SyntaxKind::Whitespace => {}
            _ => break,
        }
        prev = el.prev_sibling_or_token();
    }
    false
}

/// Whether a blank line separates `tok` from whatever node follows it - the
/// forward-looking counterpart of [`has_blank_line_before`], used to decide
/// whether a comment attaches to the node it precedes or floats free on the
/// `Suite` (a file header separated from the first declaration by a blank
/// line never attaches as that declaration's leading doc comment).
fn has_blank_line_after(tok: &SyntaxToken) -> bool {
    let mut newline_count = 0;
    let mut next = tok.next_sibling_or_token();
    while let Some(el) = next {
        match el.as_token().map(|t| t.kind()) {
            Some(SyntaxKind::Newline) => {
                newline_count += 1;
                if newline_count >= 2 {
                    return true;
                }
            }
            Some(k) if k == SyntaxKind::Whitespace => {}
            _ => break,
        }
        next = el.next_sibling_or_token();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn trailing_comment_attaches_to_same_line_import() {
        let src = "import fx \"./a\" // alias for fixtures\n";
        let result = parse(src);
        let map = attach_trivia(&result.root, src);
        let import = result.root.imports().next().unwrap();
        let trailing = map.trailing(import.as_cst()).expect("trailing comment");
        assert!(trailing.text.contains("alias for fixtures"));
    }

    #[test]
    fn leading_comment_attaches_to_next_function() {
        let src = "// creates a user\nfn Create() `CREATE (n)`\n";
        let result = parse(src);
        let func = result.root.functions().next().unwrap();
        let map = attach_trivia(&result.root, src);
        let leading = map.leading(func.as_cst());
        assert_eq!(leading.len(), 1);
        assert!(leading[0].text.contains("creates a user"));
    }

    #[test]
    fn blank_line_separated_comment_attaches_to_suite() {
        let src = "// file header\n\nfn Create() `CREATE (n)`\n";
        let result = parse(src);
        let map = attach_trivia(&result.root, src);
        assert_eq!(map.suite_leading().len(), 1);
        assert!(map.suite_leading()[0].text.contains("file header"));
    }
}
