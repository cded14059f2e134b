//! Position utilities (§4.10): answers "what's at this offset" for editor
//! integrations built on top of the CST - the token under the cursor, the
//! token before it, and which scope/test/group/setup/assert block encloses
//! it.

use rowan::{TextSize, TokenAtOffset};

use crate::cst::{SyntaxKind, SyntaxNode, SyntaxToken};

/// What encloses a given offset, from the outermost scope down.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnclosingContext {
    pub scope_name: Option<String>,
    pub group_path: Vec<String>,
    pub test_name: Option<String>,
    pub in_setup: bool,
    pub in_teardown: bool,
    pub in_assert: bool,
}

/// Returns the token whose span contains `offset`, preferring the token to
/// the left at a boundary (matches editor cursor-adjacency conventions).
pub fn token_at_offset(root: &SyntaxNode, offset: u32) -> Option<SyntaxToken> {
    match root.token_at_offset(TextSize::from(offset)) {
        TokenAtOffset::None => None,
        TokenAtOffset::Single(t) => Some(t),
        TokenAtOffset::Between(left, _right) => Some(left),
    }
}

/// The non-trivia token immediately preceding `token`, if any.
pub fn previous_token(token: &SyntaxToken) -> Option<SyntaxToken> {
    let mut current = token.prev_token();
    while let Some(t) = &current {
        if !t.kind().is_trivia() {
            return current;
        }
        current = t.prev_token();
    }
    None
}

/// Walks `token`'s ancestor nodes to describe the enclosing scope/group/test
/// and whether it sits inside a `setup`/`teardown`/`assert` block.
pub fn enclosing_context(token: &SyntaxToken) -> EnclosingContext {
    let mut ctx = EnclosingContext::default();
    let Some(parent) = token.parent() else { return ctx };
    for ancestor in parent.ancestors() {
        match ancestor.kind() {
            SyntaxKind::FunctionScope => {
                ctx.scope_name = first_id_token(&ancestor).map(|t| t.text().to_string());
            }
            SyntaxKind::Group => {
                if let Some(name) = first_string_token(&ancestor) {
                    ctx.group_path.insert(0, unquote(name.text()));
                }
            }
            SyntaxKind::Test => {
                ctx.test_name = first_string_token(&ancestor).map(|t| unquote(t.text()));
            }
            SyntaxKind::SetupClause => ctx.in_setup = true,
            SyntaxKind::TeardownClause => ctx.in_teardown = true,
            SyntaxKind::Assert => ctx.in_assert = true,
            _ => {}
        }
    }
    ctx
}

fn first_id_token(node: &SyntaxNode) -> Option<SyntaxToken> {
    node.children_with_tokens()
        .filter_map(|it| it.into_token())
        .find(|t| t.kind() == SyntaxKind::Id)
}

fn first_string_token(node: &SyntaxNode) -> Option<SyntaxToken> {
    node.children_with_tokens()
        .filter_map(|it| it.into_token())
        .find(|t| t.kind() == SyntaxKind::StringLiteral)
}

fn unquote(s: &str) -> String {
    s.trim_matches(|c| c == '"' || c == '\'').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn finds_the_enclosing_test_and_scope() {
        let src = r#"
            fn F() `RETURN 1`
            F {
                group "g" {
                    test "t" { assert (1 == 1) }
                }
            }
        "#;
        let result = parse(src);
        let offset = src.find("1 == 1").unwrap() as u32;
        let token = token_at_offset(result.root.as_cst(), offset).unwrap();
        let ctx = enclosing_context(&token);
        assert_eq!(ctx.scope_name.as_deref(), Some("F"));
        assert_eq!(ctx.group_path, vec!["g".to_string()]);
        assert_eq!(ctx.test_name.as_deref(), Some("t"));
        assert!(ctx.in_assert);
    }

    #[test]
    fn previous_token_skips_trivia() {
        let src = "fn F() `RETURN 1`";
        let result = parse(src);
        let offset = src.find('(').unwrap() as u32;
        let token = token_at_offset(result.root.as_cst(), offset).unwrap();
        let prev = previous_token(&token).unwrap();
        assert_eq!(prev.text(), "F");
    }
}
