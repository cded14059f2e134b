//! Rule implementations (§4.8): each function below owns exactly one
//! `DiagnosticKind` and is called once per file from [`run_all_rules`].
//!
//! `invalid-expression` is not reported here: it belongs to the expression
//! validator (§4.9), which compiles `ParenExpr` text and reports its own
//! failures against the same [`Diagnostics`] collection.

use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use scaf_core::{Schema, Type};

use crate::ast::{Group, Item, Statement, StatementKey, Suite, Test, ValueKind};
use crate::lexer::LineIndex;
use crate::resolver::resolve_import_path;
use crate::symbols::{QuerySymbol, SymbolTable};

use super::{DiagnosticKind, Diagnostics};

/// Query names a `setup`/`teardown` call found in an imported module,
/// keyed by the import alias. `None` for an alias means the import could
/// not be resolved (cycle, missing file, parse failure); that alias is
/// skipped by the cross-file checks rather than flagged again.
pub type ResolvedImports = IndexMap<String, Option<IndexSet<String>>>;

/// Runs every structural and semantic rule over one already-parsed file and
/// returns the diagnostics they produced. `resolved` carries the query names
/// exported by each imported module, built by the cross-file resolver (§4.7);
/// pass an empty map to check only local (same-file) references. `base_dir`
/// is the analyzed file's directory, used to resolve import paths for the
/// `same-package-import` check against `sibling_paths` (the caller-supplied
/// list of files in that same directory; an empty list silently disables
/// that check, per §9 - it can't be told apart from "not wired up").
pub fn run_all_rules(
    suite: &Suite,
    symbols: &SymbolTable,
    source: &str,
    schema: Option<&Schema>,
    resolved: &ResolvedImports,
    base_dir: &Path,
    sibling_paths: &[PathBuf],
) -> Diagnostics {
    let line_index = LineIndex::new(source);
    let mut out = Diagnostics::new();

    duplicate_queries(suite, &line_index, &mut out);
    duplicate_imports(suite, &line_index, &mut out);
    invalid_type_annotations(suite, schema, &line_index, &mut out);
    param_declarations(symbols, &line_index, &mut out);

    let mut used_query_params: IndexMap<String, IndexSet<String>> = IndexMap::new();
    for scope in suite.scopes() {
        let Some(name) = scope.name_token() else { continue };
        let scope_name = name.text().to_string();
        if !symbols.queries.contains_key(&scope_name) {
            out.report(DiagnosticKind::UndefinedQuery, line_index.span(scope.range()))
                .message(format!("scope `{scope_name}` has no matching `fn {scope_name}`"))
                .emit();
        }
        setup_teardown_references(
            scope.setup().and_then(|s| s.kind()),
            symbols,
            resolved,
            &line_index,
            &mut out,
        );
        walk_items(
            scope.items(),
            symbols,
            &scope_name,
            resolved,
            &line_index,
            &mut out,
            &mut used_query_params,
        );
    }

    unused_query_params(symbols, &used_query_params, &line_index, &mut out);
    unused_imports(symbols, &line_index, &mut out);
    unused_declared_params(symbols, &line_index, &mut out);
    same_package_imports(symbols, base_dir, sibling_paths, &line_index, &mut out);

    out
}

fn walk_items(
    items: impl Iterator<Item = Item>,
    symbols: &SymbolTable,
    query_name: &str,
    resolved: &ResolvedImports,
    line_index: &LineIndex,
    out: &mut Diagnostics,
    used_query_params: &mut IndexMap<String, IndexSet<String>>,
) {
    let mut seen_tests: IndexSet<String> = IndexSet::new();
    let mut seen_groups: IndexSet<String> = IndexSet::new();

    for item in items {
        match item {
            Item::Test(test) => {
                let Some(name_tok) = test.name_token() else { continue };
                let name = name_tok.text().to_string();
                if !seen_tests.insert(name.clone()) {
                    out.report(DiagnosticKind::DuplicateTest, line_index.span(test.range()))
                        .message(format!("duplicate test name `{name}` in this scope"))
                        .emit();
                }
                if test.is_empty() {
                    out.report(DiagnosticKind::EmptyTest, line_index.span(test.range())).emit();
                }
                setup_teardown_references(
                    test.setup().and_then(|s| s.kind()),
                    symbols,
                    resolved,
                    line_index,
                    out,
                );
                check_test_statements(
                    &test,
                    symbols,
                    query_name,
                    line_index,
                    out,
                    used_query_params,
                );
                check_test_asserts(&test, symbols, resolved, line_index, out);
            }
            Item::Group(group) => {
                let Some(name_tok) = group.name_token() else { continue };
                let name = name_tok.text().to_string();
                if !seen_groups.insert(name.clone()) {
                    out.report(DiagnosticKind::DuplicateGroup, line_index.span(group.range()))
                        .message(format!("duplicate group name `{name}` at this level"))
                        .emit();
                }
                if is_empty_group(&group) {
                    out.report(DiagnosticKind::EmptyGroup, line_index.span(group.range())).emit();
                }
                setup_teardown_references(
                    group.setup().and_then(|s| s.kind()),
                    symbols,
                    resolved,
                    line_index,
                    out,
                );
                walk_items(
                    group.items(),
                    symbols,
                    query_name,
                    resolved,
                    line_index,
                    out,
                    used_query_params,
                );
            }
        }
    }
}

fn is_empty_group(group: &Group) -> bool {
    group.items().next().is_none()
}

fn check_test_statements(
    test: &Test,
    symbols: &SymbolTable,
    query_name: &str,
    line_index: &LineIndex,
    out: &mut Diagnostics,
    used_query_params: &mut IndexMap<String, IndexSet<String>>,
) {
    let Some(query) = symbols.queries.get(query_name) else { return };
    let effective = query.effective_params();
    let mut supplied = IndexSet::new();

    for stmt in test.statements() {
        let Some(key) = stmt.key() else { continue };
        match key {
            StatementKey::Param(name) => {
                supplied.insert(name.clone());
                if !effective.contains(&name) {
                    out.report(DiagnosticKind::UnknownParameter, line_index.span(stmt.range()))
                        .message(format!(
                            "`{query_name}` does not declare a parameter named `${name}`"
                        ))
                        .emit();
                }
                check_param_type(&stmt, query, &name, line_index, out);
            }
            StatementKey::Path(path) => {
                check_return_type(&stmt, query, &path, line_index, out);
            }
        }
    }

    for required in required_params(query) {
        if !supplied.contains(&required) {
            out.report(DiagnosticKind::MissingRequiredParams, line_index.span(test.range()))
                .message(format!("test does not supply required parameter `${required}`"))
                .emit();
        }
    }

    used_query_params.entry(query_name.to_string()).or_default().extend(supplied);
}

fn required_params(query: &QuerySymbol) -> Vec<String> {
    query
        .declared_params
        .iter()
        .filter(|name| !query.typed_params.get(name.as_str()).is_some_and(|(_, nullable)| *nullable))
        .cloned()
        .collect()
}

fn check_param_type(
    stmt: &Statement,
    query: &QuerySymbol,
    name: &str,
    line_index: &LineIndex,
    out: &mut Diagnostics,
) {
    let Some((ty, _)) = query.typed_params.get(name) else { return };
    let Some(value) = stmt.value().and_then(|v| v.literal()) else { return };
    let Some(kind) = value.kind() else { return };
    if !literal_compatible(&kind, ty) {
        out.report(DiagnosticKind::ParamTypeMismatch, line_index.span(stmt.range()))
            .message(format!("`${name}` expects a value of type `{ty}`"))
            .emit();
    }
}

fn check_return_type(
    stmt: &Statement,
    query: &QuerySymbol,
    path: &str,
    line_index: &LineIndex,
    out: &mut Diagnostics,
) {
    let Some(returns) = &query.analyzer_returns else { return };
    let Some(ret) = returns.iter().find(|r| r.name == path) else { return };
    let Some(ty) = &ret.inferred_type else { return };
    let Some(value) = stmt.value().and_then(|v| v.literal()) else { return };
    let Some(kind) = value.kind() else { return };
    if !literal_compatible(&kind, ty) {
        out.report(DiagnosticKind::ReturnTypeMismatch, line_index.span(stmt.range()))
            .message(format!("expected value for `{path}` does not match its inferred type `{ty}`"))
            .emit();
    }
}

fn literal_compatible(value: &ValueKind, ty: &Type) -> bool {
    match (value, ty) {
        (ValueKind::Null, _) => true,
        (_, Type::Pointer(inner)) => literal_compatible(value, inner),
        (_, Type::Named { .. }) => true,
        (ValueKind::String(_), Type::Primitive(p)) => matches!(p, scaf_core::Primitive::String),
        (ValueKind::Number(_), Type::Primitive(p)) => p.is_numeric() || matches!(p, scaf_core::Primitive::Any),
        (ValueKind::Bool(_), Type::Primitive(p)) => matches!(p, scaf_core::Primitive::Bool | scaf_core::Primitive::Any),
        (ValueKind::List(_), Type::Slice(_)) | (ValueKind::List(_), Type::Array(..)) => true,
        (ValueKind::Map(_), Type::Map(..)) => true,
        (_, Type::Primitive(scaf_core::Primitive::Any)) => true,
        _ => false,
    }
}

fn check_test_asserts(
    test: &Test,
    symbols: &SymbolTable,
    resolved: &ResolvedImports,
    line_index: &LineIndex,
    out: &mut Diagnostics,
) {
    for assert in test.asserts() {
        let Some(query) = assert.query() else { continue };
        if query.inline_body().is_some() {
            continue;
        }
        let Some(name_tok) = query.name() else { continue };
        let name = name_tok.text();
        let resolves_locally = symbols.queries.contains_key(name);
        let resolves_via_import = name
            .split_once('.')
            .is_some_and(|(alias, q)| module_exports(resolved, alias, q));
        if !resolves_locally && !resolves_via_import {
            out.report(DiagnosticKind::UndefinedAssertQuery, line_index.span(query.range()))
                .message(format!("assert references undefined query `{name}`"))
                .emit();
        }
        if let Some((alias, _)) = name.split_once('.') {
            if let Some(import) = symbols.imports.get(alias) {
                import.mark_used();
            }
        }
    }
}

fn module_exports(resolved: &ResolvedImports, alias: &str, query: &str) -> bool {
    resolved.get(alias).is_some_and(|exports| exports.as_ref().is_some_and(|e| e.contains(query)))
}

fn setup_teardown_references(
    kind: Option<crate::ast::SetupKind>,
    symbols: &SymbolTable,
    resolved: &ResolvedImports,
    line_index: &LineIndex,
    out: &mut Diagnostics,
) {
    use crate::ast::SetupKind;
    match kind {
        Some(SetupKind::ModuleAlias(tok)) => {
            check_alias(&tok, symbols, line_index, out);
        }
        Some(SetupKind::Call { alias, name, .. }) => {
            check_alias(&alias, symbols, line_index, out);
            if let Some(import) = symbols.imports.get(alias.text()) {
                if !module_exports(resolved, &import.alias, name.text()) && resolved.contains_key(&import.alias) {
                    out.report(DiagnosticKind::UndefinedSetupQuery, line_index.span(name.text_range()))
                        .message(format!(
                            "`{}` does not export a query named `{}`",
                            import.path,
                            name.text()
                        ))
                        .emit();
                }
            }
        }
        Some(SetupKind::Block(items)) => {
            for item in items {
                setup_teardown_references(Some(item), symbols, resolved, line_index, out);
            }
        }
        Some(SetupKind::Inline(_)) | None => {}
    }
}

fn check_alias(
    tok: &crate::cst::SyntaxToken,
    symbols: &SymbolTable,
    line_index: &LineIndex,
    out: &mut Diagnostics,
) {
    match symbols.imports.get(tok.text()) {
        Some(import) => import.mark_used(),
        None => {
            out.report(DiagnosticKind::UndefinedImport, line_index.span(tok.text_range()))
                .message(format!("`{}` is not an imported module alias", tok.text()))
                .emit();
        }
    }
}

fn duplicate_queries(suite: &Suite, line_index: &LineIndex, out: &mut Diagnostics) {
    let mut seen: IndexSet<String> = IndexSet::new();
    for func in suite.functions() {
        let Some(name) = func.name() else { continue };
        if !seen.insert(name.text().to_string()) {
            out.report(DiagnosticKind::DuplicateQuery, line_index.span(func.range()))
                .message(format!("duplicate query name `{}`", name.text()))
                .emit();
        }
    }
}

fn duplicate_imports(suite: &Suite, line_index: &LineIndex, out: &mut Diagnostics) {
    let mut seen: IndexSet<String> = IndexSet::new();
    for import in suite.imports() {
        let Some(path) = import.path() else { continue };
        let alias = import
            .alias()
            .map(|t| t.text().to_string())
            .unwrap_or_else(|| crate::symbols::default_alias(path.text()));
        if !seen.insert(alias.clone()) {
            out.report(DiagnosticKind::DuplicateImport, line_index.span(import.range()))
                .message(format!("duplicate import alias `{alias}`"))
                .emit();
        }
    }
}

fn invalid_type_annotations(
    suite: &Suite,
    schema: Option<&Schema>,
    line_index: &LineIndex,
    out: &mut Diagnostics,
) {
    for func in suite.functions() {
        for param in func.params() {
            let Some(type_expr) = param.type_expr() else { continue };
            let Some(name_tok) = type_expr.simple_name() else { continue };
            let text = name_tok.text();
            if scaf_core::Primitive::from_name(text).is_some() {
                continue;
            }
            if let Some(schema) = schema {
                if schema.model(text).is_some() {
                    continue;
                }
            }
            if type_expr.is_map() || type_expr.is_array() {
                continue;
            }
            out.report(DiagnosticKind::InvalidTypeAnnotation, line_index.span(type_expr.range()))
                .message(format!("`{text}` is not a known type or schema model"))
                .emit();
        }
    }
}

fn param_declarations(symbols: &SymbolTable, line_index: &LineIndex, out: &mut Diagnostics) {
    for query in symbols.queries.values() {
        for used in &query.body_params {
            if !query.declared_params.contains(used) {
                out.report(DiagnosticKind::UndeclaredQueryParam, line_index.span(query.body_range))
                    .message(format!(
                        "`${used}` is used in the query body but not declared as a parameter"
                    ))
                    .emit();
            }
        }
    }
}

fn unused_declared_params(symbols: &SymbolTable, line_index: &LineIndex, out: &mut Diagnostics) {
    for query in symbols.queries.values() {
        let referenced = query.effective_params();
        for declared in &query.declared_params {
            if !referenced.contains(declared) {
                out.report(DiagnosticKind::UnusedDeclaredParam, line_index.span(query.range))
                    .message(format!("parameter `${declared}` is never used in the query body"))
                    .emit();
            }
        }
    }
}

fn unused_query_params(
    symbols: &SymbolTable,
    used: &IndexMap<String, IndexSet<String>>,
    line_index: &LineIndex,
    out: &mut Diagnostics,
) {
    for query in symbols.queries.values() {
        let supplied = used.get(query.name.as_str());
        for declared in &query.declared_params {
            let was_supplied = supplied.is_some_and(|s| s.contains(declared));
            if !was_supplied {
                out.report(DiagnosticKind::UnusedQueryParam, line_index.span(query.range))
                    .message(format!(
                        "`${declared}` is never supplied by any test in `{}`'s scope",
                        query.name
                    ))
                    .emit();
            }
        }
    }
}

fn unused_imports(symbols: &SymbolTable, line_index: &LineIndex, out: &mut Diagnostics) {
    for import in symbols.imports.values() {
        if !import.is_used() {
            out.report(DiagnosticKind::UnusedImport, line_index.span(import.range))
                .message(format!("import `{}` is never used", import.alias))
                .emit();
        }
    }
}

/// Flags an import whose resolved path is one of the caller-supplied
/// `sibling_paths` - files already known to sit in this file's own
/// directory. Does nothing when `sibling_paths` is empty (§9).
fn same_package_imports(
    symbols: &SymbolTable,
    base_dir: &Path,
    sibling_paths: &[PathBuf],
    line_index: &LineIndex,
    out: &mut Diagnostics,
) {
    if sibling_paths.is_empty() {
        return;
    }
    for import in symbols.imports.values() {
        let resolved = resolve_import_path(base_dir, &import.path);
        if sibling_paths.iter().any(|p| p == &resolved) {
            out.report(DiagnosticKind::SamePackageImport, line_index.span(import.range))
                .message(format!("`{}` resolves to a file in the same directory", import.path))
                .emit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::symbols::build_symbols;

    fn diagnostics_for(src: &str) -> Diagnostics {
        let result = parse(src);
        let symbols = build_symbols(&result.root, None, None);
        run_all_rules(
            &result.root,
            &symbols,
            src,
            None,
            &ResolvedImports::new(),
            Path::new("."),
            &[],
        )
    }

    #[test]
    fn undefined_query_scope_is_reported() {
        let diags = diagnostics_for(r#"NoSuchQuery { test "t" { assert (1 == 1) } }"#);
        assert!(diags.iter().any(|d| d.code == DiagnosticKind::UndefinedQuery.code()));
    }

    #[test]
    fn duplicate_test_names_are_reported() {
        let src = r#"
            fn F() `RETURN 1`
            F {
                test "dup" { assert (1 == 1) }
                test "dup" { assert (1 == 1) }
            }
        "#;
        let diags = diagnostics_for(src);
        assert!(diags.iter().any(|d| d.code == DiagnosticKind::DuplicateTest.code()));
    }

    #[test]
    fn empty_group_is_reported() {
        let src = r#"
            fn F() `RETURN 1`
            F { group "empty" {} }
        "#;
        let diags = diagnostics_for(src);
        assert!(diags.iter().any(|d| d.code == DiagnosticKind::EmptyGroup.code()));
    }

    #[test]
    fn unknown_parameter_is_reported() {
        let src = r#"
            fn F(id: string) `RETURN $id`
            F { test "t" { $nope: "x" } }
        "#;
        let diags = diagnostics_for(src);
        assert!(diags.iter().any(|d| d.code == DiagnosticKind::UnknownParameter.code()));
    }

    #[test]
    fn unused_import_is_reported() {
        let src = r#"
            import fx "./fixtures.scaf"
            fn F() `RETURN 1`
        "#;
        let diags = diagnostics_for(src);
        assert!(diags.iter().any(|d| d.code == DiagnosticKind::UnusedImport.code()));
    }

    #[test]
    fn param_type_mismatch_flags_wrong_literal_kind() {
        let src = r#"
            fn F(id: int) `RETURN $id`
            F { test "t" { $id: "not-a-number" } }
        "#;
        let diags = diagnostics_for(src);
        assert!(diags.iter().any(|d| d.code == DiagnosticKind::ParamTypeMismatch.code()));
    }

    #[test]
    fn same_package_import_is_reported_when_sibling_list_names_it() {
        let src = r#"
            import fx "./fixtures.scaf"
            fn F() `RETURN 1`
        "#;
        let result = parse(src);
        let symbols = build_symbols(&result.root, None, None);
        let base_dir = Path::new("/project");
        let siblings = vec![PathBuf::from("/project/fixtures.scaf")];
        let diags = run_all_rules(
            &result.root,
            &symbols,
            src,
            None,
            &ResolvedImports::new(),
            base_dir,
            &siblings,
        );
        assert!(diags.iter().any(|d| d.code == DiagnosticKind::SamePackageImport.code()));
    }

    #[test]
    fn same_package_import_is_silent_when_sibling_list_is_empty() {
        let src = r#"
            import fx "./fixtures.scaf"
            fn F() `RETURN 1`
        "#;
        let diags = diagnostics_for(src);
        assert!(!diags.iter().any(|d| d.code == DiagnosticKind::SamePackageImport.code()));
    }
}
