//! Symbol table construction (§4.7, first half): per-file declarations and
//! the parameter/return metadata the query analyzer contributes.

use std::cell::Cell;
use std::sync::LazyLock;

use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use rowan::TextRange;
use scaf_core::{Schema, Type};

use crate::analyzer::{ParamInfo, QueryAnalyzer, ReturnInfo};
use crate::ast::{Suite, TypeExpr};

static PARAM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([a-zA-Z_][a-zA-Z0-9_]*)").unwrap());

/// An import declaration and whether any rule has since used it.
#[derive(Debug)]
pub struct ImportSymbol {
    pub alias: String,
    pub path: String,
    pub range: TextRange,
    used: Cell<bool>,
}

impl ImportSymbol {
    pub fn mark_used(&self) {
        self.used.set(true);
    }

    pub fn is_used(&self) -> bool {
        self.used.get()
    }
}

/// A declared query function and everything known about its parameters and
/// returns, from both the regex fallback and (when available) the analyzer.
#[derive(Debug)]
pub struct QuerySymbol {
    pub name: String,
    pub body: String,
    pub body_range: TextRange,
    pub range: TextRange,
    /// `$name` occurrences found in the body by regex (always populated).
    pub body_params: IndexSet<String>,
    /// Analyzer-derived parameters, when an analyzer ran successfully.
    pub analyzer_params: Option<Vec<ParamInfo>>,
    /// Analyzer-derived returns, when an analyzer ran successfully.
    pub analyzer_returns: Option<Vec<ReturnInfo>>,
    /// Parameter names declared in the function's signature.
    pub declared_params: IndexSet<String>,
    /// Declared parameters that carry an explicit type annotation.
    pub typed_params: IndexMap<String, (Type, bool)>,
}

impl QuerySymbol {
    /// Effective parameter name set per the invariant in §3: analyzer output
    /// supersedes the regex fallback whenever both are present.
    pub fn effective_params(&self) -> IndexSet<String> {
        match &self.analyzer_params {
            Some(params) => params.iter().map(|p| p.name.clone()).collect(),
            None => self.body_params.clone(),
        }
    }
}

#[derive(Debug)]
pub struct TestSymbol {
    pub scope_path: Vec<String>,
    pub name: String,
    pub range: TextRange,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    pub imports: IndexMap<String, ImportSymbol>,
    pub queries: IndexMap<String, QuerySymbol>,
    pub tests: Vec<TestSymbol>,
}

/// Walks the AST once, collecting imports and query declarations and running
/// the query analyzer over each function body (§4.7 step 1-3).
pub fn build_symbols(
    suite: &Suite,
    analyzer: Option<&dyn QueryAnalyzer>,
    schema: Option<&Schema>,
) -> SymbolTable {
    let mut table = SymbolTable::default();

    for import in suite.imports() {
        let Some(path_tok) = import.path() else { continue };
        let path = unquote(path_tok.text());
        let alias = import
            .alias()
            .map(|t| t.text().to_string())
            .unwrap_or_else(|| default_alias(&path));
        table.imports.entry(alias.clone()).or_insert_with(|| ImportSymbol {
            alias,
            path,
            range: import.range(),
            used: Cell::new(false),
        });
    }

    for func in suite.functions() {
        let Some(name_tok) = func.name() else { continue };
        let name = name_tok.text().to_string();
        let body_tok = func.body();
        let body_range = body_tok.as_ref().map(|t| t.text_range()).unwrap_or_default();
        let body = body_tok.map(|t| unbacktick(t.text())).unwrap_or_default();

        let body_params: IndexSet<String> =
            PARAM_REGEX.captures_iter(&body).map(|c| c[1].to_string()).collect();

        let mut declared_params = IndexSet::new();
        let mut typed_params = IndexMap::new();
        for param in func.params() {
            let Some(p_name) = param.name() else { continue };
            let p_name = p_name.text().trim_start_matches('$').to_string();
            declared_params.insert(p_name.clone());
            if let Some(type_expr) = param.type_expr() {
                if let Some(ty) = resolve_type_expr(&type_expr) {
                    typed_params.insert(p_name, (ty, type_expr.is_nullable()));
                }
            }
        }

        let (analyzer_params, analyzer_returns) = match analyzer {
            Some(a) => {
                let result = match schema {
                    Some(s) => a.analyze_with_schema(&body, s),
                    None => a.analyze(&body),
                };
                match result {
                    Ok(meta) => (Some(meta.parameters), Some(meta.returns)),
                    Err(e) => {
                        tracing::warn!(query = %name, error = %e, "query analyzer failed");
                        (None, None)
                    }
                }
            }
            None => (None, None),
        };

        table.queries.entry(name.clone()).or_insert_with(|| QuerySymbol {
            name,
            body,
            body_range,
            range: func.range(),
            body_params,
            analyzer_params,
            analyzer_returns,
            declared_params,
            typed_params,
        });
    }

    for scope in suite.scopes() {
        let Some(scope_name) = scope.name_token() else { continue };
        collect_tests(&mut table, vec![scope_name.text().to_string()], scope.items());
    }

    table
}

fn collect_tests(
    table: &mut SymbolTable,
    scope_path: Vec<String>,
    items: impl Iterator<Item = crate::ast::Item>,
) {
    for item in items {
        match item {
            crate::ast::Item::Test(test) => {
                let Some(name_tok) = test.name_token() else { continue };
                table.tests.push(TestSymbol {
                    scope_path: scope_path.clone(),
                    name: unquote(name_tok.text()),
                    range: test.range(),
                });
            }
            crate::ast::Item::Group(group) => {
                let Some(name_tok) = group.name_token() else { continue };
                let mut nested = scope_path.clone();
                nested.push(unquote(name_tok.text()));
                collect_tests(table, nested, group.items());
            }
        }
    }
}

fn resolve_type_expr(expr: &TypeExpr) -> Option<Type> {
    if expr.is_map() {
        let key = expr.element().and_then(|e| resolve_type_expr(&e))?;
        let value = expr.value().and_then(|e| resolve_type_expr(&e))?;
        return Some(Type::Map(Box::new(key), Box::new(value)));
    }
    if expr.is_array() {
        let inner = expr.element().and_then(|e| resolve_type_expr(&e))?;
        return Some(Type::Slice(Box::new(inner)));
    }
    let name = expr.simple_name()?;
    scaf_core::parse_type(name.text())
}

fn unquote(s: &str) -> String {
    s.trim_matches(|c| c == '"' || c == '\'').to_string()
}

fn unbacktick(s: &str) -> String {
    s.trim_matches('`').to_string()
}

pub(crate) fn default_alias(path: &str) -> String {
    std::path::Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn regex_extracts_dollar_params_from_body() {
        let result = parse(r#"fn F(id: string) `MATCH (u {id: $id}) RETURN u.$name`"#);
        let table = build_symbols(&result.root, None, None);
        let q = table.queries.get("F").unwrap();
        assert!(q.body_params.contains("id"));
    }

    #[test]
    fn default_alias_is_basename_without_extension() {
        assert_eq!(default_alias("./fixtures/users.scaf"), "users");
    }

    #[test]
    fn tests_are_collected_with_their_scope_path() {
        let src = r#"
            fn F() `RETURN 1`
            F {
                group "g1" {
                    test "t1" { assert (1 == 1) }
                }
            }
        "#;
        let result = parse(src);
        let table = build_symbols(&result.root, None, None);
        assert_eq!(table.tests.len(), 1);
        assert_eq!(table.tests[0].scope_path, vec!["F", "g1"]);
        assert_eq!(table.tests[0].name, "t1");
    }

    #[test]
    fn typed_params_record_nullability() {
        let result = parse(r#"fn F(name: string?) `RETURN $name`"#);
        let table = build_symbols(&result.root, None, None);
        let q = table.queries.get("F").unwrap();
        let (_, nullable) = q.typed_params.get("name").unwrap();
        assert!(nullable);
    }
}
