//! scaf: lexer, recovering parser, symbol table, schema-aware diagnostics,
//! and an expression validator for the scaf query/test DSL.
//!
//! [`analyze`] is the single entry point: lex, parse, attach trivia, build
//! the symbol table, resolve cross-file imports, run the diagnostic rules,
//! and validate every `assert`/`where` condition. Everything else in this
//! crate is exported for callers (an LSP, a CLI, a test runner) that need a
//! finer-grained seam than "analyze one file and hand back diagnostics".

pub mod analyzer;
pub mod ast;
pub mod cst;
pub mod diagnostics;
pub mod expr;
pub mod lexer;
pub mod parser;
pub mod position_utils;
pub mod resolver;
pub mod symbols;
pub mod trivia;

use std::path::{Path, PathBuf};

use scaf_core::{AnalysisOptions, Schema};

use ast::{Item, Suite};
use diagnostics::Diagnostics;
use parser::ParseResult;
use resolver::ImportResolver;
use symbols::SymbolTable;
use trivia::TriviaMap;

/// Everything known about one analyzed file: its tree, its trivia map, its
/// symbol table, and the diagnostics every rule and the expression validator
/// produced.
#[derive(Debug)]
pub struct AnalyzedFile {
    pub path: Option<PathBuf>,
    pub root: Suite,
    pub trivia: TriviaMap,
    pub symbols: SymbolTable,
    pub diagnostics: Diagnostics,
    /// Set when the parser had to skip tokens to recover from a syntax
    /// error, or when it hit a fatal fuel/recursion limit.
    pub recovered: bool,
    /// Other files in this file's own directory, as supplied by the caller
    /// (§3). Drives the `same-package-import` check; an empty list leaves
    /// that check silent rather than guessing from the filesystem.
    pub sibling_paths: Vec<PathBuf>,
}

impl AnalyzedFile {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

/// Analyzes one file's source text with the default options and no schema.
pub fn analyze(source: &str) -> AnalyzedFile {
    analyze_with(source, None, &AnalysisOptions::default(), &[])
}

/// Analyzes one file's source text (§2.1: the whole lex -> parse ->
/// trivia-attach -> symbols -> rules -> expression-validation pipeline).
///
/// `path` is used to resolve relative `import` paths and the schema path in
/// `options`; pass `None` when analyzing source that isn't backed by a file
/// (cross-file imports and a relative `schema_path` then won't resolve).
/// `sibling_paths` lists other files already known to live in `path`'s
/// directory (§3); pass `&[]` if the caller hasn't gathered that list, which
/// leaves `same-package-import` silent rather than guessed at.
pub fn analyze_with(
    source: &str,
    path: Option<&Path>,
    options: &AnalysisOptions,
    sibling_paths: &[PathBuf],
) -> AnalyzedFile {
    let dialect_analyzer = analyzer::lookup(&options.dialect);
    let schema = load_schema(options);

    let parse_result: ParseResult = parser::parse_with(source, options);
    let trivia = trivia::attach_trivia(&parse_result.root, source);
    let symbols = symbols::build_symbols(&parse_result.root, dialect_analyzer, schema.as_ref());

    let mut diagnostics = parse_result.diagnostics;

    let base_dir = path
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let resolver = ImportResolver::new(options, dialect_analyzer, schema.as_ref());
    let resolved = resolver.resolve_all(&base_dir, &symbols);

    diagnostics.extend(diagnostics::run_all_rules(
        &parse_result.root,
        &symbols,
        source,
        schema.as_ref(),
        &resolved,
        &base_dir,
        sibling_paths,
    ));

    validate_expressions(&parse_result.root, &symbols, schema.as_ref(), source, &mut diagnostics);

    AnalyzedFile {
        path: path.map(Path::to_path_buf),
        root: parse_result.root,
        trivia,
        symbols,
        diagnostics,
        recovered: parse_result.recovered,
        sibling_paths: sibling_paths.to_vec(),
    }
}

fn load_schema(options: &AnalysisOptions) -> Option<Schema> {
    let schema_path = options.schema_path.as_ref()?;
    let base_dir = options.schema_base_dir.clone().unwrap_or_default();
    match scaf_core::load_schema(&base_dir, schema_path) {
        Ok(schema) => Some(schema),
        Err(e) => {
            tracing::warn!(error = %e, "failed to load schema, continuing without it");
            None
        }
    }
}

/// Compiles and type-checks every `assert`/`where` condition reachable from
/// a `FunctionScope`, against that scope's matching query (§4.9).
fn validate_expressions(
    suite: &Suite,
    symbols: &SymbolTable,
    schema: Option<&Schema>,
    source: &str,
    out: &mut Diagnostics,
) {
    let line_index = lexer::LineIndex::new(source);
    for scope in suite.scopes() {
        let Some(name) = scope.name_token() else { continue };
        let Some(query) = symbols.queries.get(name.text()) else { continue };
        walk_conditions(scope.items(), query, schema, &line_index, out);
    }
}

fn walk_conditions(
    items: impl Iterator<Item = Item>,
    query: &symbols::QuerySymbol,
    schema: Option<&Schema>,
    line_index: &lexer::LineIndex,
    out: &mut Diagnostics,
) {
    for item in items {
        match item {
            Item::Test(test) => {
                for stmt in test.statements() {
                    let Some(value) = stmt.value() else { continue };
                    if let Some(where_clause) = value.where_clause() {
                        if let Some(cond) = where_clause.condition() {
                            expr::validate_condition(&cond, query, schema, line_index, out);
                        }
                    }
                }
                for assert in test.asserts() {
                    for cond in assert.conditions() {
                        expr::validate_condition(&cond, query, schema, line_index, out);
                    }
                }
            }
            Item::Group(group) => {
                walk_conditions(group.items(), query, schema, line_index, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyzes_a_well_formed_file_with_no_diagnostics() {
        let src = r#"
            fn GetUser(id: string) `MATCH (u:User {id: $id}) RETURN u`
            GetUser {
                test "found" {
                    $id: "abc"
                    assert (1 == 1)
                }
            }
        "#;
        let file = analyze(src);
        assert!(!file.has_errors(), "{:?}", file.diagnostics);
    }

    #[test]
    fn reports_undefined_query_scope() {
        let file = analyze(r#"Ghost { test "t" { assert (1 == 1) } }"#);
        assert!(file.has_errors());
    }

    #[test]
    fn reports_a_non_boolean_assert_condition() {
        let src = r#"
            fn F(id: int) `RETURN $id`
            F { test "t" { assert ($id) } }
        "#;
        let file = analyze(src);
        assert!(file.has_errors());
    }
}
