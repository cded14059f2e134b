//! Compiler diagnostics infrastructure: collection, rendering, and the
//! stable catalog of rule codes (§4.8).

mod message;
mod printer;
pub mod rules;

use scaf_core::Span;

pub use message::{Diagnostic, Fix, RelatedInfo, Severity};
pub use printer::DiagnosticsPrinter;
pub use rules::{run_all_rules, ResolvedImports};

/// Stable catalog of every diagnostic this crate emits. The variant name,
/// lowercased and kebab-cased, equals the wire `code` (see `DiagnosticKind::code`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    ParseError,
    UndefinedQuery,
    UndefinedImport,
    DuplicateQuery,
    DuplicateImport,
    UndefinedAssertQuery,
    UndefinedSetupQuery,
    ParamTypeMismatch,
    ReturnTypeMismatch,
    UndeclaredQueryParam,
    UnknownParameter,
    DuplicateTest,
    DuplicateGroup,
    MissingRequiredParams,
    InvalidExpression,
    InvalidTypeAnnotation,
    UnusedImport,
    UnusedDeclaredParam,
    EmptyGroup,
    SamePackageImport,
    EmptyTest,
    UnusedQueryParam,
}

impl DiagnosticKind {
    pub fn code(self) -> &'static str {
        use DiagnosticKind::*;
        match self {
            ParseError => "parse-error",
            UndefinedQuery => "undefined-query",
            UndefinedImport => "undefined-import",
            DuplicateQuery => "duplicate-query",
            DuplicateImport => "duplicate-import",
            UndefinedAssertQuery => "undefined-assert-query",
            UndefinedSetupQuery => "undefined-setup-query",
            ParamTypeMismatch => "param-type-mismatch",
            ReturnTypeMismatch => "return-type-mismatch",
            UndeclaredQueryParam => "undeclared-query-param",
            UnknownParameter => "unknown-parameter",
            DuplicateTest => "duplicate-test",
            DuplicateGroup => "duplicate-group",
            MissingRequiredParams => "missing-required-params",
            InvalidExpression => "invalid-expression",
            InvalidTypeAnnotation => "invalid-type-annotation",
            UnusedImport => "unused-import",
            UnusedDeclaredParam => "unused-declared-param",
            EmptyGroup => "empty-group",
            SamePackageImport => "same-package-import",
            EmptyTest => "empty-test",
            UnusedQueryParam => "unused-query-param",
        }
    }

    pub fn default_severity(self) -> Severity {
        use DiagnosticKind::*;
        match self {
            UnusedImport | UnusedDeclaredParam | EmptyGroup | SamePackageImport => {
                Severity::Warning
            }
            EmptyTest | UnusedQueryParam => Severity::Hint,
            _ => Severity::Error,
        }
    }

    pub fn default_message(self) -> &'static str {
        use DiagnosticKind::*;
        match self {
            ParseError => "syntax error",
            UndefinedQuery => "scope names a query that is not declared in this file",
            UndefinedImport => "setup references an unknown module alias",
            DuplicateQuery => "duplicate query name",
            DuplicateImport => "duplicate import alias",
            UndefinedAssertQuery => "assert references an unknown query",
            UndefinedSetupQuery => "setup call's named query is not defined in the imported file",
            ParamTypeMismatch => "parameter value does not match its declared type",
            ReturnTypeMismatch => "expected return value does not match the inferred return type",
            UndeclaredQueryParam => "parameter used in the query body is not declared",
            UnknownParameter => "test supplies a parameter the query does not declare",
            DuplicateTest => "duplicate test name in this scope",
            DuplicateGroup => "duplicate group name at this level",
            MissingRequiredParams => "test is missing a required parameter",
            InvalidExpression => "expression failed to compile",
            InvalidTypeAnnotation => "type annotation uses an unknown type name",
            UnusedImport => "import is never used",
            UnusedDeclaredParam => "declared parameter is never used in the query body",
            EmptyGroup => "group contains no tests or nested groups",
            SamePackageImport => "import resolves to a file in the same directory",
            EmptyTest => "test has no setup, statements, or asserts",
            UnusedQueryParam => "parameter is never supplied by any test in this scope",
        }
    }
}

/// Collection of diagnostics accumulated while analyzing one file.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    messages: Vec<Diagnostic>,
    /// De-duplicates diagnostics of the same kind anchored at the same start
    /// offset, mirroring the parser's `last_diagnostic_pos` policy so
    /// cascading parse errors don't flood the output. Distinct rules firing
    /// on the same span (§4.8: "all fire") are not deduped against each other.
    last_pos: Option<(u32, DiagnosticKind)>,
    capped: bool,
}

#[must_use = "diagnostic not emitted, call .emit()"]
pub struct DiagnosticBuilder<'a> {
    diagnostics: &'a mut Diagnostics,
    message: Diagnostic,
    dedupe_key: (u32, DiagnosticKind),
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, kind: DiagnosticKind, span: Span) -> DiagnosticBuilder<'_> {
        let message = kind.default_message().to_string();
        let dedupe_key = (span.start.offset, kind);
        DiagnosticBuilder {
            diagnostics: self,
            message: Diagnostic::new(kind, span, message),
            dedupe_key,
        }
    }

    /// Caps collection at `max`; further `emit()` calls are silently dropped
    /// (logged once by the caller) so pathological input can't produce an
    /// unbounded diagnostics list (§4.8).
    pub fn set_cap(&mut self, max: usize) {
        if self.messages.len() >= max {
            self.capped = true;
        }
    }

    pub fn is_capped(&self) -> bool {
        self.capped
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.messages.iter()
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|d| d.is_error())
    }

    pub fn has_warnings(&self) -> bool {
        self.messages.iter().any(|d| d.is_warning())
    }

    pub fn error_count(&self) -> usize {
        self.messages.iter().filter(|d| d.is_error()).count()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.messages.extend(other.messages);
    }
}

impl<'a> DiagnosticBuilder<'a> {
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message.message = msg.into();
        self
    }

    pub fn related_to(mut self, msg: impl Into<String>, span: Span) -> Self {
        self.message.related.push(RelatedInfo::new(span, msg));
        self
    }

    pub fn fix(mut self, description: impl Into<String>, replacement: impl Into<String>) -> Self {
        self.message.fix = Some(Fix::new(replacement, description));
        self
    }

    pub fn emit(self) {
        if self.diagnostics.capped {
            return;
        }
        if self.diagnostics.last_pos == Some(self.dedupe_key) {
            return;
        }
        self.diagnostics.last_pos = Some(self.dedupe_key);
        self.diagnostics.messages.push(self.message);
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scaf_core::Position;

    fn span() -> Span {
        Span::new(Position::new(1, 1, 0), Position::new(1, 2, 1))
    }

    #[test]
    fn every_kind_has_a_stable_kebab_case_code() {
        let kinds = [
            DiagnosticKind::ParseError,
            DiagnosticKind::UndefinedQuery,
            DiagnosticKind::UnusedQueryParam,
        ];
        for k in kinds {
            assert!(k.code().chars().all(|c| c.is_ascii_lowercase() || c == '-'));
        }
    }

    #[test]
    fn warning_and_hint_severities_match_the_rule_table() {
        assert_eq!(DiagnosticKind::UnusedImport.default_severity(), Severity::Warning);
        assert_eq!(DiagnosticKind::EmptyTest.default_severity(), Severity::Hint);
        assert_eq!(DiagnosticKind::DuplicateTest.default_severity(), Severity::Error);
    }

    #[test]
    fn emit_dedupes_by_start_offset() {
        let mut diags = Diagnostics::new();
        diags.report(DiagnosticKind::ParseError, span()).emit();
        diags.report(DiagnosticKind::ParseError, span()).emit();
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn cap_silently_drops_further_diagnostics() {
        let mut diags = Diagnostics::new();
        for i in 0..3u32 {
            let sp = Span::new(Position::new(1, 1, i), Position::new(1, 2, i + 1));
            diags.set_cap(2);
            diags.report(DiagnosticKind::ParseError, sp).emit();
        }
        assert_eq!(diags.len(), 2);
        assert!(diags.is_capped());
    }
}
