//! Grammar productions (§4.3).
//!
//! Suite = `Import* Function* Setup? Teardown? FunctionScope*`.
//! Function = `'fn' Ident '(' Params? ')' RawString`.
//! FunctionScope = `Ident '{' Setup? Teardown? Item* '}'`.
//! Group = `'group' String '{' Setup? Teardown? Item* '}'`.
//! Test = `'test' String '{' Setup? Statement* Assert* '}'`.

use crate::cst::token_sets::{DELIMITERS_CLOSE, VALUE_FIRST};
use crate::cst::SyntaxKind::{self, *};
use crate::diagnostics::DiagnosticKind;

use super::core::Parser;

pub(super) fn suite(p: &mut Parser<'_>) {
    p.start_node(Suite);

    while p.peek() == KwImport && !p.should_stop() {
        import(p);
    }
    while p.peek() == KwFn && !p.should_stop() {
        function(p);
    }
    if p.peek() == KwSetup && !p.should_stop() {
        setup_clause(p, SetupClause);
    }
    if p.peek() == KwTeardown && !p.should_stop() {
        teardown_clause(p);
    }
    while !p.should_stop() {
        match p.peek() {
            Id => function_scope_or_item(p),
            Error => break,
            _ => {
                p.error(DiagnosticKind::ParseError);
                if !p.synchronize() {
                    break;
                }
            }
        }
    }

    p.finish_node();
}

fn import(p: &mut Parser<'_>) {
    p.start_node(Import);
    p.expect(KwImport, "`import`");
    if p.peek() == Id && p.peek_nth(1) == StringLiteral {
        p.bump();
    }
    p.expect(StringLiteral, "an import path string");
    p.finish_node();
}

fn function(p: &mut Parser<'_>) {
    p.start_node(Function);
    p.expect(KwFn, "`fn`");
    p.expect(Id, "a function name");
    if p.eat(ParenOpen) {
        p.push_delimiter(ParenOpen);
        fn_param_list(p);
        if !p.expect(ParenClose, "`)`") {
            p.synchronize_to(TokenSetClose::Paren);
        }
        p.pop_delimiter();
    } else {
        p.error_msg(DiagnosticKind::ParseError, "expected `(`");
    }
    p.expect(RawString, "a raw query body");
    p.finish_node();
}

fn fn_param_list(p: &mut Parser<'_>) {
    p.start_node(FnParamList);
    while p.peek() != ParenClose && !p.should_stop() {
        fn_param(p);
        if !p.eat(Comma) {
            break;
        }
    }
    p.finish_node();
}

fn fn_param(p: &mut Parser<'_>) {
    p.start_node(FnParam);
    p.expect(Id, "a parameter name");
    if p.eat(Colon) {
        type_expr(p);
    }
    p.finish_node();
}

fn type_expr(p: &mut Parser<'_>) {
    if !p.enter_recursion() {
        return;
    }
    p.start_node(TypeExpr);
    match p.peek() {
        BracketOpen => {
            p.bump();
            type_expr(p);
            p.expect(BracketClose, "`]`");
        }
        BraceOpen => {
            p.bump();
            type_expr(p);
            p.expect(Colon, "`:`");
            type_expr(p);
            p.expect(BraceClose, "`}`");
        }
        Id => {
            p.bump();
        }
        _ => {
            p.error_msg(DiagnosticKind::InvalidTypeAnnotation, "expected a type");
        }
    }
    p.eat(Question);
    p.finish_node();
    p.exit_recursion();
}

fn function_scope_or_item(p: &mut Parser<'_>) {
    // A `FunctionScope` is `Ident '{' ...`; disambiguate via one token of
    // lookahead past the identifier.
    p.start_node(FunctionScope);
    p.expect(Id, "a function name");
    scope_body(p);
    p.finish_node();
}

fn group(p: &mut Parser<'_>) {
    p.start_node(Group);
    p.expect(KwGroup, "`group`");
    p.expect(StringLiteral, "a group name string");
    scope_body(p);
    p.finish_node();
}

fn scope_body(p: &mut Parser<'_>) {
    if p.eat(BraceOpen) {
        p.push_delimiter(BraceOpen);
        if p.peek() == KwSetup {
            setup_clause(p, SetupClause);
        }
        if p.peek() == KwTeardown {
            teardown_clause(p);
        }
        while p.peek() != BraceClose && !p.should_stop() {
            match p.peek() {
                KwTest => test(p),
                KwGroup => group(p),
                _ => {
                    p.error(DiagnosticKind::ParseError);
                    if !p.synchronize() {
                        break;
                    }
                }
            }
        }
        p.expect(BraceClose, "`}`");
        p.pop_delimiter();
    } else {
        p.error_msg(DiagnosticKind::ParseError, "expected `{`");
    }
}

fn test(p: &mut Parser<'_>) {
    p.start_node(Test);
    p.expect(KwTest, "`test`");
    p.expect(StringLiteral, "a test name string");
    if p.eat(BraceOpen) {
        p.push_delimiter(BraceOpen);
        if p.peek() == KwSetup {
            setup_clause(p, SetupClause);
        }
        while !p.should_stop() {
            match p.peek() {
                KwAssert => break,
                BraceClose => break,
                Id => statement(p),
                _ => {
                    p.error(DiagnosticKind::ParseError);
                    if !p.synchronize() {
                        break;
                    }
                }
            }
        }
        while p.peek() == KwAssert && !p.should_stop() {
            assert_block(p);
        }
        p.expect(BraceClose, "`}`");
        p.pop_delimiter();
    } else {
        p.error_msg(DiagnosticKind::ParseError, "expected `{`");
    }
    p.finish_node();
}

fn statement(p: &mut Parser<'_>) {
    p.start_node(Statement);
    p.expect(Id, "a parameter or field path");
    p.expect(Colon, "`:`");
    statement_value(p);
    p.finish_node();
}

fn statement_value(p: &mut Parser<'_>) {
    p.start_node(StatementValue);
    if p.peek() == ParenOpen {
        paren_expr(p);
    } else {
        value(p);
    }
    if p.peek() == KwWhere {
        p.start_node(WhereClause);
        p.bump();
        paren_expr(p);
        p.finish_node();
    }
    p.finish_node();
}

fn value(p: &mut Parser<'_>) {
    if !p.enter_recursion() {
        return;
    }
    p.start_node(Value);
    match p.peek() {
        KwNull | KwTrue | KwFalse | StringLiteral | Number => p.bump(),
        BracketOpen => value_list(p),
        BraceOpen => value_map(p),
        _ => {
            p.error_msg(DiagnosticKind::ParseError, "expected a value");
        }
    }
    p.finish_node();
    p.exit_recursion();
}

fn value_list(p: &mut Parser<'_>) {
    p.start_node(ValueList);
    p.expect(BracketOpen, "`[`");
    p.push_delimiter(BracketOpen);
    while p.peek() != BracketClose && !p.should_stop() && VALUE_FIRST.contains(p.peek()) {
        value(p);
        if !p.eat(Comma) {
            break;
        }
    }
    p.expect(BracketClose, "`]`");
    p.pop_delimiter();
    p.finish_node();
}

fn value_map(p: &mut Parser<'_>) {
    p.start_node(ValueMap);
    p.expect(BraceOpen, "`{`");
    p.push_delimiter(BraceOpen);
    while p.peek() != BraceClose && !p.should_stop() && matches!(p.peek(), Id | StringLiteral) {
        p.start_node(ValueMapEntry);
        if !p.eat(StringLiteral) {
            p.expect(Id, "a map key");
        }
        p.expect(Colon, "`:`");
        value(p);
        p.finish_node();
        if !p.eat(Comma) {
            break;
        }
    }
    p.expect(BraceClose, "`}`");
    p.pop_delimiter();
    p.finish_node();
}

fn assert_block(p: &mut Parser<'_>) {
    p.start_node(Assert);
    p.expect(KwAssert, "`assert`");
    if p.peek() == ParenOpen {
        paren_expr(p);
    } else {
        if p.peek() == RawString || p.peek() == Id {
            p.start_node(AssertQuery);
            if p.peek() == RawString {
                p.bump();
            } else {
                p.expect(Id, "a query name");
                if p.eat(ParenOpen) {
                    p.push_delimiter(ParenOpen);
                    p.start_node(CallArgs);
                    while p.peek() != ParenClose && !p.should_stop() {
                        p.expect(Id, "a parameter binding");
                        if p.eat(Colon) {
                            value(p);
                        }
                        if !p.eat(Comma) {
                            break;
                        }
                    }
                    p.finish_node();
                    p.expect(ParenClose, "`)`");
                    p.pop_delimiter();
                }
            }
            p.finish_node();
        }
        p.expect(BraceOpen, "`{`");
        p.push_delimiter(BraceOpen);
        while p.peek() == ParenOpen && !p.should_stop() {
            paren_expr(p);
        }
        p.expect(BraceClose, "`}`");
        p.pop_delimiter();
    }
    p.finish_node();
}

/// Captures a balanced-delimiter token sequence verbatim, for the expression
/// validator to compile later (§4.9).
fn paren_expr(p: &mut Parser<'_>) {
    p.start_node(ParenExpr);
    p.expect(ParenOpen, "`(`");
    p.push_delimiter(ParenOpen);
    let mut depth = 1i32;
    while depth > 0 && !p.should_stop() {
        match p.peek() {
            ParenOpen | BracketOpen | BraceOpen => depth += 1,
            ParenClose | BracketClose | BraceClose => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            _ => {}
        }
        p.bump();
    }
    p.expect(ParenClose, "`)`");
    p.pop_delimiter();
    p.finish_node();
}

fn setup_clause(p: &mut Parser<'_>, kind: SyntaxKind) {
    p.start_node(kind);
    p.expect(KwSetup, "`setup`");
    setup_body(p);
    p.finish_node();
}

fn teardown_clause(p: &mut Parser<'_>) {
    p.start_node(TeardownClause);
    p.expect(KwTeardown, "`teardown`");
    setup_body(p);
    p.finish_node();
}

fn setup_body(p: &mut Parser<'_>) {
    match p.peek() {
        RawString => {
            p.bump();
        }
        BraceOpen => {
            p.bump();
            p.push_delimiter(BraceOpen);
            while p.peek() != BraceClose && !p.should_stop() {
                setup_clause(p, SyntaxKind::SetupClause);
                if !p.eat(Comma) {
                    break;
                }
            }
            p.expect(BraceClose, "`}`");
            p.pop_delimiter();
        }
        Id => {
            p.bump();
            if p.eat(Dot) {
                p.expect(Id, "a query name");
                if p.eat(ParenOpen) {
                    p.push_delimiter(ParenOpen);
                    p.start_node(CallArgs);
                    while p.peek() != ParenClose && !p.should_stop() {
                        p.expect(Id, "a parameter binding");
                        if p.eat(Colon) {
                            value(p);
                        }
                        if !p.eat(Comma) {
                            break;
                        }
                    }
                    p.finish_node();
                    p.expect(ParenClose, "`)`");
                    p.pop_delimiter();
                }
            }
        }
        _ => {
            p.error_msg(DiagnosticKind::ParseError, "expected a setup clause");
        }
    }
}

/// Which bracket kind a local synchronize should aim for, used only by
/// `function`'s parameter-list recovery.
enum TokenSetClose {
    Paren,
}

impl Parser<'_> {
    fn synchronize_to(&mut self, which: TokenSetClose) {
        let close = match which {
            TokenSetClose::Paren => ParenClose,
        };
        while !self.should_stop() && !DELIMITERS_CLOSE.contains(self.peek()) {
            self.bump();
        }
        self.eat(close);
    }
}
