//! Typed AST wrappers over CST nodes (§3, §4.2).
//!
//! Each struct wraps a `SyntaxNode` and provides typed accessors. Cast is
//! infallible for a correctly-kinded node; validation happens in the parser
//! and in the diagnostic rules, not here.

use rowan::TextRange;

use crate::cst::{SyntaxKind, SyntaxNode, SyntaxToken};

macro_rules! ast_node {
    ($name:ident, $kind:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(SyntaxNode);

        impl $name {
            pub fn cast(node: SyntaxNode) -> Option<Self> {
                (node.kind() == SyntaxKind::$kind).then(|| Self(node))
            }

            pub fn as_cst(&self) -> &SyntaxNode {
                &self.0
            }

            pub fn range(&self) -> TextRange {
                self.0.text_range()
            }
        }
    };
}

ast_node!(Suite, Suite);
ast_node!(Import, Import);
ast_node!(Function, Function);
ast_node!(FnParamList, FnParamList);
ast_node!(FnParam, FnParam);
ast_node!(TypeExpr, TypeExpr);
ast_node!(SetupClause, SetupClause);
ast_node!(TeardownClause, TeardownClause);
ast_node!(FunctionScope, FunctionScope);
ast_node!(Group, Group);
ast_node!(Test, Test);
ast_node!(Statement, Statement);
ast_node!(StatementValue, StatementValue);
ast_node!(WhereClause, WhereClause);
ast_node!(Value, Value);
ast_node!(ValueList, ValueList);
ast_node!(ValueMap, ValueMap);
ast_node!(ValueMapEntry, ValueMapEntry);
ast_node!(Assert, Assert);
ast_node!(AssertQuery, AssertQuery);
ast_node!(ParenExpr, ParenExpr);
ast_node!(CallArgs, CallArgs);

/// An item inside a `FunctionScope` or `Group`: either a nested group or a test.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Item {
    Test(Test),
    Group(Group),
}

impl Item {
    pub fn cast(node: SyntaxNode) -> Option<Self> {
        match node.kind() {
            SyntaxKind::Test => Test::cast(node).map(Item::Test),
            SyntaxKind::Group => Group::cast(node).map(Item::Group),
            _ => None,
        }
    }

    pub fn as_cst(&self) -> &SyntaxNode {
        match self {
            Item::Test(t) => t.as_cst(),
            Item::Group(g) => g.as_cst(),
        }
    }

    pub fn name(&self) -> Option<SyntaxToken> {
        match self {
            Item::Test(t) => t.name_token(),
            Item::Group(g) => g.name_token(),
        }
    }
}

fn token_of_kind(node: &SyntaxNode, kind: SyntaxKind) -> Option<SyntaxToken> {
    node.children_with_tokens()
        .filter_map(|it| it.into_token())
        .find(|t| t.kind() == kind)
}

fn string_literal_text(node: &SyntaxNode) -> Option<SyntaxToken> {
    node.children_with_tokens()
        .filter_map(|it| it.into_token())
        .find(|t| t.kind() == SyntaxKind::StringLiteral)
}

impl Suite {
    pub fn imports(&self) -> impl Iterator<Item = Import> + '_ {
        self.0.children().filter_map(Import::cast)
    }

    pub fn functions(&self) -> impl Iterator<Item = Function> + '_ {
        self.0.children().filter_map(Function::cast)
    }

    pub fn scopes(&self) -> impl Iterator<Item = FunctionScope> + '_ {
        self.0.children().filter_map(FunctionScope::cast)
    }
}

impl Import {
    /// Optional alias: `import alias "path"`. When absent, the basename of
    /// the path (sans extension) is the alias.
    pub fn alias(&self) -> Option<SyntaxToken> {
        token_of_kind(&self.0, SyntaxKind::Id)
    }

    pub fn path(&self) -> Option<SyntaxToken> {
        string_literal_text(&self.0)
    }
}

impl Function {
    pub fn name(&self) -> Option<SyntaxToken> {
        token_of_kind(&self.0, SyntaxKind::Id)
    }

    pub fn params(&self) -> impl Iterator<Item = FnParam> + '_ {
        self.0
            .children()
            .find(|c| c.kind() == SyntaxKind::FnParamList)
            .into_iter()
            .flat_map(|list| list.children().filter_map(FnParam::cast).collect::<Vec<_>>())
    }

    pub fn body(&self) -> Option<SyntaxToken> {
        self.0
            .children_with_tokens()
            .filter_map(|it| it.into_token())
            .find(|t| t.kind() == SyntaxKind::RawString)
    }
}

impl FnParam {
    pub fn name(&self) -> Option<SyntaxToken> {
        token_of_kind(&self.0, SyntaxKind::Id)
    }

    pub fn type_expr(&self) -> Option<TypeExpr> {
        self.0.children().find_map(TypeExpr::cast)
    }
}

impl TypeExpr {
    pub fn is_nullable(&self) -> bool {
        self.0
            .children_with_tokens()
            .filter_map(|it| it.into_token())
            .any(|t| t.kind() == SyntaxKind::Question)
    }

    pub fn simple_name(&self) -> Option<SyntaxToken> {
        token_of_kind(&self.0, SyntaxKind::Id)
    }

    pub fn element(&self) -> Option<TypeExpr> {
        self.0.children().find_map(TypeExpr::cast)
    }

    /// Second `TypeExpr` child, for map value types (the first is the key).
    pub fn value(&self) -> Option<TypeExpr> {
        self.0.children().filter_map(TypeExpr::cast).nth(1)
    }

    pub fn is_map(&self) -> bool {
        token_of_kind(&self.0, SyntaxKind::BraceOpen).is_some()
    }

    pub fn is_array(&self) -> bool {
        token_of_kind(&self.0, SyntaxKind::BracketOpen).is_some()
    }
}

/// One of the four setup/teardown clause shapes (§3): inline raw query, bare
/// module alias, a structured call, or a block of such items.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SetupKind {
    Inline(SyntaxToken),
    ModuleAlias(SyntaxToken),
    Call { alias: SyntaxToken, name: SyntaxToken, args: Option<CallArgs> },
    Block(Vec<SetupKind>),
}

impl SetupClause {
    pub fn kind(&self) -> Option<SetupKind> {
        classify_setup(&self.0)
    }

    pub fn has_trailing_comma(&self) -> bool {
        has_trailing_comma_before_close(&self.0, SyntaxKind::BraceClose)
    }
}

impl TeardownClause {
    pub fn kind(&self) -> Option<SetupKind> {
        classify_setup(&self.0)
    }
}

fn classify_setup(node: &SyntaxNode) -> Option<SetupKind> {
    if let Some(raw) = node
        .children_with_tokens()
        .filter_map(|it| it.into_token())
        .find(|t| t.kind() == SyntaxKind::RawString)
    {
        return Some(SetupKind::Inline(raw));
    }
    if node.children().any(|c| c.kind() == SyntaxKind::SetupClause) {
        let items = node
            .children()
            .filter(|c| c.kind() == SyntaxKind::SetupClause)
            .filter_map(|c| classify_setup(&c))
            .collect();
        return Some(SetupKind::Block(items));
    }
    let idents: Vec<SyntaxToken> = node
        .children_with_tokens()
        .filter_map(|it| it.into_token())
        .filter(|t| t.kind() == SyntaxKind::Id)
        .collect();
    match idents.len() {
        0 => None,
        1 => Some(SetupKind::ModuleAlias(idents[0].clone())),
        _ => Some(SetupKind::Call {
            alias: idents[0].clone(),
            name: idents[1].clone(),
            args: node.children().find_map(CallArgs::cast),
        }),
    }
}

fn has_trailing_comma_before_close(node: &SyntaxNode, close: SyntaxKind) -> bool {
    let children: Vec<_> = node.children_with_tokens().collect();
    let Some(close_idx) = children.iter().position(|c| c.kind() == close) else {
        return false;
    };
    children[..close_idx]
        .iter()
        .rev()
        .find_map(|c| c.as_token().cloned())
        .filter(|t| !t.kind().is_trivia())
        .is_some_and(|t| t.kind() == SyntaxKind::Comma)
}

impl FunctionScope {
    pub fn name_token(&self) -> Option<SyntaxToken> {
        token_of_kind(&self.0, SyntaxKind::Id)
    }

    pub fn setup(&self) -> Option<SetupClause> {
        self.0.children().find_map(SetupClause::cast)
    }

    pub fn teardown(&self) -> Option<TeardownClause> {
        self.0.children().find_map(TeardownClause::cast)
    }

    pub fn items(&self) -> impl Iterator<Item = Item> + '_ {
        self.0.children().filter_map(Item::cast)
    }
}

impl Group {
    pub fn name_token(&self) -> Option<SyntaxToken> {
        string_literal_text(&self.0)
    }

    pub fn setup(&self) -> Option<SetupClause> {
        self.0.children().find_map(SetupClause::cast)
    }

    pub fn teardown(&self) -> Option<TeardownClause> {
        self.0.children().find_map(TeardownClause::cast)
    }

    pub fn items(&self) -> impl Iterator<Item = Item> + '_ {
        self.0.children().filter_map(Item::cast)
    }
}

impl Test {
    pub fn name_token(&self) -> Option<SyntaxToken> {
        string_literal_text(&self.0)
    }

    pub fn setup(&self) -> Option<SetupClause> {
        self.0.children().find_map(SetupClause::cast)
    }

    pub fn statements(&self) -> impl Iterator<Item = Statement> + '_ {
        self.0.children().filter_map(Statement::cast)
    }

    pub fn asserts(&self) -> impl Iterator<Item = Assert> + '_ {
        self.0.children().filter_map(Assert::cast)
    }

    pub fn is_empty(&self) -> bool {
        self.setup().is_none() && self.statements().next().is_none() && self.asserts().next().is_none()
    }
}

/// The key half of a `Statement`: either `$param` (an input) or a dotted
/// path like `u.name` (an expected return field).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StatementKey {
    Param(String),
    Path(String),
}

impl Statement {
    pub fn key(&self) -> Option<StatementKey> {
        let tok = token_of_kind(&self.0, SyntaxKind::Id)?;
        let text = tok.text();
        if let Some(stripped) = text.strip_prefix('$') {
            Some(StatementKey::Param(stripped.to_string()))
        } else {
            Some(StatementKey::Path(text.to_string()))
        }
    }

    pub fn value(&self) -> Option<StatementValue> {
        self.0.children().find_map(StatementValue::cast)
    }
}

impl StatementValue {
    pub fn literal(&self) -> Option<Value> {
        self.0.children().find_map(Value::cast)
    }

    pub fn expr(&self) -> Option<ParenExpr> {
        self.0.children().find_map(ParenExpr::cast)
    }

    pub fn where_clause(&self) -> Option<WhereClause> {
        self.0.children().find_map(WhereClause::cast)
    }
}

impl WhereClause {
    pub fn condition(&self) -> Option<ParenExpr> {
        self.0.children().find_map(ParenExpr::cast)
    }
}

/// A literal value (§3): null, string, number, boolean, list, or map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    String(SyntaxToken),
    Number(SyntaxToken),
    Bool(bool),
    List(ValueList),
    Map(ValueMap),
}

impl Value {
    pub fn kind(&self) -> Option<ValueKind> {
        if token_of_kind(&self.0, SyntaxKind::KwNull).is_some() {
            return Some(ValueKind::Null);
        }
        if token_of_kind(&self.0, SyntaxKind::KwTrue).is_some() {
            return Some(ValueKind::Bool(true));
        }
        if token_of_kind(&self.0, SyntaxKind::KwFalse).is_some() {
            return Some(ValueKind::Bool(false));
        }
        if let Some(tok) = token_of_kind(&self.0, SyntaxKind::StringLiteral) {
            return Some(ValueKind::String(tok));
        }
        if let Some(tok) = token_of_kind(&self.0, SyntaxKind::Number) {
            return Some(ValueKind::Number(tok));
        }
        if let Some(list) = self.0.children().find_map(ValueList::cast) {
            return Some(ValueKind::List(list));
        }
        if let Some(map) = self.0.children().find_map(ValueMap::cast) {
            return Some(ValueKind::Map(map));
        }
        None
    }
}

impl ValueList {
    pub fn items(&self) -> impl Iterator<Item = Value> + '_ {
        self.0.children().filter_map(Value::cast)
    }

    pub fn has_trailing_comma(&self) -> bool {
        has_trailing_comma_before_close(&self.0, SyntaxKind::BracketClose)
    }
}

impl ValueMap {
    pub fn entries(&self) -> impl Iterator<Item = ValueMapEntry> + '_ {
        self.0.children().filter_map(ValueMapEntry::cast)
    }

    pub fn has_trailing_comma(&self) -> bool {
        has_trailing_comma_before_close(&self.0, SyntaxKind::BraceClose)
    }
}

impl ValueMapEntry {
    pub fn key(&self) -> Option<SyntaxToken> {
        string_literal_text(&self.0).or_else(|| token_of_kind(&self.0, SyntaxKind::Id))
    }

    pub fn value(&self) -> Option<Value> {
        self.0.children().find_map(Value::cast)
    }
}

/// An assert block: shorthand (a single condition) or block form with an
/// optional re-scoped query and one or more conditions.
impl Assert {
    pub fn query(&self) -> Option<AssertQuery> {
        self.0.children().find_map(AssertQuery::cast)
    }

    pub fn conditions(&self) -> impl Iterator<Item = ParenExpr> + '_ {
        self.0.children().filter_map(ParenExpr::cast)
    }

    pub fn is_shorthand(&self) -> bool {
        self.query().is_none() && self.conditions().count() == 1
    }
}

impl AssertQuery {
    pub fn inline_body(&self) -> Option<SyntaxToken> {
        self.0
            .children_with_tokens()
            .filter_map(|it| it.into_token())
            .find(|t| t.kind() == SyntaxKind::RawString)
    }

    pub fn name(&self) -> Option<SyntaxToken> {
        token_of_kind(&self.0, SyntaxKind::Id)
    }

    pub fn args(&self) -> Option<CallArgs> {
        self.0.children().find_map(CallArgs::cast)
    }

    pub fn has_trailing_comma(&self) -> bool {
        has_trailing_comma_before_close(&self.0, SyntaxKind::ParenClose)
    }
}

impl ParenExpr {
    /// Verbatim text of the balanced-delimiter token sequence, rendered back
    /// for the expression validator (§4.9).
    pub fn text(&self) -> String {
        self.0.text().to_string()
    }

    /// Text with the outer parens stripped, if present.
    pub fn inner_text(&self) -> String {
        let t = self.text();
        let t = t.trim();
        t.strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .unwrap_or(t)
            .trim()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_key_splits_param_sigil() {
        assert_eq!(
            match StatementKey::Param("id".into()) {
                StatementKey::Param(s) => s,
                _ => unreachable!(),
            },
            "id"
        );
    }
}
