//! Recovering parser: builds the typed AST from a token stream (§4.3).

mod core;
mod grammar;

use scaf_core::AnalysisOptions;

use crate::ast::Suite;
use crate::cst::{SyntaxKind, SyntaxNode};
use crate::diagnostics::Diagnostics;
use crate::lexer::lex;

pub use core::ParseResult;

/// Strict parse with default limits: returns the AST and diagnostics.
pub fn parse(source: &str) -> ParseResult {
    parse_with(source, &AnalysisOptions::default())
}

/// Recovering parse (§4.3): on error, skips to the next synchronization
/// token and keeps going, collecting up to `options.max_diagnostics_per_file`
/// errors. Always returns a `Suite`: a fatal fuel/recursion limit yields an
/// empty one, since `analyze` surfaces that condition separately.
pub fn parse_with(source: &str, options: &AnalysisOptions) -> ParseResult {
    let tokens = lex(source);
    let mut parser = core::Parser::new(source, tokens)
        .with_exec_fuel(Some(options.exec_fuel_limit))
        .with_recursion_fuel(Some(options.recursion_fuel_limit))
        .max_diagnostics(options.max_diagnostics_per_file);

    grammar::suite(&mut parser);

    match parser.finish() {
        Ok((green, diagnostics, recovered, exec_fuel_consumed)) => ParseResult {
            root: Suite::cast(SyntaxNode::new_root(green)).expect("parser always produces a Suite"),
            diagnostics,
            recovered,
            exec_fuel_consumed,
        },
        Err(fatal) => {
            tracing::warn!(error = %fatal, "parser hit a fatal limit");
            let mut builder = rowan::GreenNodeBuilder::new();
            builder.start_node(SyntaxKind::Suite.into());
            builder.finish_node();
            ParseResult {
                root: Suite::cast(SyntaxNode::new_root(builder.finish()))
                    .expect("empty Suite node is castable"),
                diagnostics: Diagnostics::new(),
                recovered: true,
                exec_fuel_consumed: 0,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_parses_to_empty_suite() {
        let result = parse("");
        assert!(result.diagnostics.is_empty());
        assert_eq!(result.root.functions().count(), 0);
    }

    #[test]
    fn parses_a_minimal_function_and_scope() {
        let src = r#"
            fn GetUser(id: string) `MATCH (u:User {id: $id}) RETURN u`
            GetUser { test "t" { $id: "x" } }
        "#;
        let result = parse(src);
        assert!(!result.diagnostics.has_errors(), "{:?}", result.diagnostics);
        assert_eq!(result.root.functions().count(), 1);
        assert_eq!(result.root.scopes().count(), 1);
    }

    #[test]
    fn recovers_past_a_malformed_function_and_continues() {
        let src = r#"
            fn Bad(
            fn Good() `RETURN 1`
        "#;
        let result = parse(src);
        assert!(result.recovered);
        assert!(result.root.functions().count() >= 1);
    }

    #[test]
    fn import_with_alias_and_without() {
        let src = r#"
            import fx "./fixtures"
            import "./other"
            fn F() `RETURN 1`
        "#;
        let result = parse(src);
        assert!(!result.diagnostics.has_errors(), "{:?}", result.diagnostics);
        let imports: Vec<_> = result.root.imports().collect();
        assert_eq!(imports.len(), 2);
        assert!(imports[0].alias().is_some());
        assert!(imports[1].alias().is_none());
    }

    #[test]
    fn nullable_type_annotation_round_trips() {
        let src = r#"fn F(name: string?) `RETURN $name`"#;
        let result = parse(src);
        assert!(!result.diagnostics.has_errors(), "{:?}", result.diagnostics);
        let f = result.root.functions().next().unwrap();
        let param = f.params().next().unwrap();
        let ty = param.type_expr().unwrap();
        assert!(ty.is_nullable());
    }

    #[test]
    fn exec_fuel_limit_does_not_hang_on_repetitive_input() {
        let src = "fn F() `RETURN 1`\n".repeat(10_000);
        let opts = AnalysisOptions {
            exec_fuel_limit: 10,
            ..AnalysisOptions::default()
        };
        let _ = parse_with(&src, &opts);
    }
}
