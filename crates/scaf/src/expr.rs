//! Expression validator (§4.9): compiles `assert`/`where` condition text
//! with `evalexpr` against a synthesized environment, so a typo like
//! `u.nam == "x"` is caught without ever running the query.
//!
//! `evalexpr` identifiers can't contain `.` or `$`, so scaf identifiers
//! (`$id`, `u.name`) are flattened to plain identifiers before compiling and
//! the mapping is used to translate the engine's error text back.

use std::collections::HashMap;

use evalexpr::{ContextWithMutableVariables, EvalexprError, HashMapContext, Value};
use scaf_core::{Primitive, Schema, Type};

use crate::ast::ParenExpr;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::lexer::LineIndex;
use crate::symbols::QuerySymbol;

/// Validates one parenthesized condition and reports `invalid-expression` on
/// failure: a syntax/compile error, an unresolvable identifier, or a
/// well-formed expression that doesn't evaluate to a boolean.
pub fn validate_condition(
    expr: &ParenExpr,
    query: &QuerySymbol,
    schema: Option<&Schema>,
    line_index: &LineIndex,
    out: &mut Diagnostics,
) {
    let (rewritten, reverse) = flatten(&expr.inner_text());
    let context = build_context(&reverse, query, schema);

    match evalexpr::eval_with_context(&rewritten, &context) {
        Ok(Value::Boolean(_)) => {}
        Ok(other) => {
            out.report(DiagnosticKind::InvalidExpression, line_index.span(expr.range()))
                .message(format!(
                    "condition must evaluate to a boolean, got {}",
                    type_name(&other)
                ))
                .emit();
        }
        Err(e) => {
            out.report(DiagnosticKind::InvalidExpression, line_index.span(expr.range()))
                .message(friendly_message(&e, &reverse))
                .emit();
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::String(_) => "a string",
        Value::Float(_) => "a float",
        Value::Int(_) => "an int",
        Value::Boolean(_) => "a boolean",
        Value::Tuple(_) => "a tuple",
        Value::Empty => "empty",
    }
}

/// Replaces every `$name` or dotted `a.b.c` identifier with a flattened,
/// evalexpr-safe identifier, returning the rewritten text plus a map from
/// flattened name back to the original scaf spelling.
fn flatten(text: &str) -> (String, HashMap<String, String>) {
    let mut out = String::with_capacity(text.len());
    let mut reverse = HashMap::new();
    let bytes: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c == '$' || c.is_alphabetic() || c == '_' {
            let start = i;
            if c == '$' {
                i += 1;
            }
            while i < bytes.len() && (bytes[i].is_alphanumeric() || bytes[i] == '_' || bytes[i] == '.') {
                i += 1;
            }
            let original: String = bytes[start..i].iter().collect();
            let flattened = format!("v_{}", original.replace(['$', '.'], "_"));
            reverse.insert(flattened.clone(), original);
            out.push_str(&flattened);
        } else {
            out.push(c);
            i += 1;
        }
    }
    (out, reverse)
}

fn build_context(reverse: &HashMap<String, String>, query: &QuerySymbol, schema: Option<&Schema>) -> HashMapContext {
    let mut context = HashMapContext::new();
    for (flattened, original) in reverse {
        if let Some(value) = placeholder_for(original, query, schema) {
            let _ = context.set_value(flattened.clone(), value);
        }
    }
    context
}

/// Picks a representative value for an identifier so the expression can
/// evaluate at all; the exact value never matters, only its engine type.
/// Returns `None` when the identifier can't be resolved against anything we
/// have information about, leaving it out of the context so `evalexpr`
/// reports `VariableIdentifierNotFound` instead of silently treating a typo
/// as a defined, empty-string variable.
fn placeholder_for(original: &str, query: &QuerySymbol, schema: Option<&Schema>) -> Option<Value> {
    if let Some(param_name) = original.strip_prefix('$') {
        if let Some((ty, _)) = query.typed_params.get(param_name) {
            return Some(placeholder_for_type(ty));
        }
        if query.declared_params.contains(param_name) {
            return Some(Value::String(String::new()));
        }
        return None;
    }

    if let Some(returns) = &query.analyzer_returns {
        if let Some(ret) = returns.iter().find(|r| r.name == original) {
            return Some(match &ret.inferred_type {
                Some(ty) => placeholder_for_type(ty),
                None => Value::String(String::new()),
            });
        }
    }

    if let (Some((model, field)), Some(schema)) = (original.split_once('.'), schema) {
        if let Some(ty) = schema.field_type(model, field) {
            return Some(placeholder_for_type(ty));
        }
    }

    // No analyzer and no schema means we have nothing to check a bare or
    // dotted identifier against; stay permissive rather than flag it.
    if query.analyzer_returns.is_none() && schema.is_none() {
        return Some(Value::String(String::new()));
    }

    None
}

fn placeholder_for_type(ty: &Type) -> Value {
    match ty {
        Type::Primitive(Primitive::Bool) => Value::Boolean(false),
        Type::Primitive(p) if p.is_numeric() => Value::Float(0.0),
        Type::Primitive(Primitive::String) | Type::Named { .. } => Value::String(String::new()),
        Type::Pointer(inner) => placeholder_for_type(inner),
        Type::Slice(_) | Type::Array(..) | Type::Map(..) => Value::String(String::new()),
        _ => Value::String(String::new()),
    }
}

fn friendly_message(err: &EvalexprError, reverse: &HashMap<String, String>) -> String {
    let raw = err.to_string();
    let mut rewritten = raw.clone();
    for (flattened, original) in reverse {
        rewritten = rewritten.replace(flattened, original);
    }
    if let EvalexprError::VariableIdentifierNotFound(name) = err {
        let original = reverse.get(name).map(String::as_str).unwrap_or(name.as_str());
        return format!(
            "undefined variable '{original}' - check the query's parameters and RETURN clause"
        );
    }
    rewritten
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::symbols::build_symbols;

    fn conditions_of(src: &str) -> (crate::ast::Suite, crate::symbols::SymbolTable) {
        let result = parse(src);
        let symbols = build_symbols(&result.root, None, None);
        (result.root, symbols)
    }

    #[test]
    fn well_typed_boolean_condition_is_accepted() {
        let src = r#"
            fn F(id: int) `RETURN $id`
            F { test "t" { assert ($id == 1) } }
        "#;
        let (suite, symbols) = conditions_of(src);
        let query = symbols.queries.get("F").unwrap();
        let line_index = LineIndex::new(src);
        let mut diags = Diagnostics::new();
        for scope in suite.scopes() {
            for item in scope.items() {
                if let crate::ast::Item::Test(test) = item {
                    for assert in test.asserts() {
                        for cond in assert.conditions() {
                            validate_condition(&cond, query, None, &line_index, &mut diags);
                        }
                    }
                }
            }
        }
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn non_boolean_condition_is_rejected() {
        let src = r#"
            fn F(id: int) `RETURN $id`
            F { test "t" { assert ($id) } }
        "#;
        let (suite, symbols) = conditions_of(src);
        let query = symbols.queries.get("F").unwrap();
        let line_index = LineIndex::new(src);
        let mut diags = Diagnostics::new();
        for scope in suite.scopes() {
            for item in scope.items() {
                if let crate::ast::Item::Test(test) = item {
                    for assert in test.asserts() {
                        for cond in assert.conditions() {
                            validate_condition(&cond, query, None, &line_index, &mut diags);
                        }
                    }
                }
            }
        }
        assert!(!diags.is_empty());
    }

    #[test]
    fn flatten_round_trips_dollar_and_dotted_names() {
        let (text, reverse) = flatten("$id == u.name");
        assert!(!text.contains('$'));
        assert!(!text.contains("u.name"));
        assert_eq!(reverse.len(), 2);
    }

    #[test]
    fn undeclared_dollar_param_is_reported_as_invalid_expression() {
        let src = r#"
            fn F(id: int) `RETURN $id`
            F { test "t" { assert ($typo == 1) } }
        "#;
        let (suite, symbols) = conditions_of(src);
        let query = symbols.queries.get("F").unwrap();
        let line_index = LineIndex::new(src);
        let mut diags = Diagnostics::new();
        for scope in suite.scopes() {
            for item in scope.items() {
                if let crate::ast::Item::Test(test) = item {
                    for assert in test.asserts() {
                        for cond in assert.conditions() {
                            validate_condition(&cond, query, None, &line_index, &mut diags);
                        }
                    }
                }
            }
        }
        assert!(!diags.is_empty());
        assert!(diags.iter().any(|d| d.message.contains("undefined variable '$typo'")));
    }

    #[test]
    fn undefined_return_field_is_reported_when_an_analyzer_ran() {
        use crate::analyzer::ReturnInfo;
        use indexmap::{IndexMap, IndexSet};
        use rowan::TextRange;

        let query = QuerySymbol {
            name: "F".to_string(),
            body: "MATCH (u:User) RETURN u".to_string(),
            body_range: TextRange::new(0.into(), 0.into()),
            range: TextRange::new(0.into(), 0.into()),
            body_params: IndexSet::new(),
            analyzer_params: Some(Vec::new()),
            analyzer_returns: Some(vec![ReturnInfo {
                name: "u".to_string(),
                expr_text: "u".to_string(),
                inferred_type: None,
                is_aggregate: false,
                is_wildcard: false,
            }]),
            declared_params: IndexSet::new(),
            typed_params: IndexMap::new(),
        };

        let src = r#"fn F() `RETURN u` F { test "t" { assert (u.nam == "x") } }"#;
        let result = parse(src);
        let test = result
            .root
            .scopes()
            .next()
            .unwrap()
            .items()
            .find_map(|item| match item {
                crate::ast::Item::Test(t) => Some(t),
                _ => None,
            })
            .unwrap();
        let line_index = LineIndex::new(src);
        let mut diags = Diagnostics::new();
        for assert in test.asserts() {
            for cond in assert.conditions() {
                validate_condition(&cond, &query, None, &line_index, &mut diags);
            }
        }
        assert!(!diags.is_empty());
    }
}
