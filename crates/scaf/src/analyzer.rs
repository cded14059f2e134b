//! Query-analyzer interface (§4.6): the contract by which a host query
//! language contributes parameter/return metadata and type inference.
//!
//! The scaf core contains no host-language parser. Dialects register an
//! implementation of [`QueryAnalyzer`] under a name; the core looks it up
//! and degrades gracefully (regex-only parameter extraction, no return
//! types) when none is registered.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use scaf_core::{Schema, Type};

/// One parameter the analyzer found referenced in a query body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamInfo {
    pub name: String,
    pub inferred_type: Option<Type>,
    pub occurrence_count: u32,
}

/// One value the query returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnInfo {
    pub name: String,
    pub expr_text: String,
    pub inferred_type: Option<Type>,
    pub is_aggregate: bool,
    pub is_wildcard: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryMetadata {
    pub parameters: Vec<ParamInfo>,
    pub returns: Vec<ReturnInfo>,
}

#[derive(Debug, thiserror::Error)]
#[error("query analysis failed: {0}")]
pub struct AnalyzeError(pub String);

/// A pluggable host-query-language analyzer (§4.6).
pub trait QueryAnalyzer: Send + Sync {
    fn dialect(&self) -> &str;

    fn analyze(&self, query: &str) -> Result<QueryMetadata, AnalyzeError>;

    /// Schema-aware variant: may use `schema` to infer property-access
    /// types. Analyzers that don't implement this degrade to [`Self::analyze`].
    fn analyze_with_schema(
        &self,
        query: &str,
        _schema: &Schema,
    ) -> Result<QueryMetadata, AnalyzeError> {
        self.analyze(query)
    }
}

/// The in-tree reference analyzer: extracts nothing, used as the degraded
/// default and as a worked example of the trait.
#[derive(Debug, Default)]
pub struct NoopAnalyzer;

impl QueryAnalyzer for NoopAnalyzer {
    fn dialect(&self) -> &str {
        "noop"
    }

    fn analyze(&self, _query: &str) -> Result<QueryMetadata, AnalyzeError> {
        Ok(QueryMetadata::default())
    }
}

type Registry = RwLock<HashMap<String, &'static (dyn QueryAnalyzer + 'static)>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Registers `analyzer` under its own `dialect()` name. A later registration
/// under the same name replaces the prior entry (§6).
pub fn register(analyzer: &'static (dyn QueryAnalyzer + 'static)) {
    let mut map = registry().write().unwrap_or_else(|e| e.into_inner());
    map.insert(analyzer.dialect().to_string(), analyzer);
}

/// Looks up a registered analyzer by dialect name. Returns `None` when no
/// analyzer is registered under that name (valid: degraded analysis).
pub fn lookup(dialect: &str) -> Option<&'static (dyn QueryAnalyzer + 'static)> {
    registry().read().unwrap_or_else(|e| e.into_inner()).get(dialect).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedAnalyzer(&'static str);

    impl QueryAnalyzer for FixedAnalyzer {
        fn dialect(&self) -> &str {
            self.0
        }

        fn analyze(&self, _query: &str) -> Result<QueryMetadata, AnalyzeError> {
            Ok(QueryMetadata::default())
        }
    }

    #[test]
    fn noop_analyzer_returns_empty_metadata() {
        let meta = NoopAnalyzer.analyze("MATCH (n) RETURN n").unwrap();
        assert!(meta.parameters.is_empty());
        assert!(meta.returns.is_empty());
    }

    #[test]
    fn unregistered_dialect_is_none() {
        assert!(lookup("definitely-not-registered-xyz").is_none());
    }

    #[test]
    fn later_registration_replaces_earlier_under_same_name() {
        static A: FixedAnalyzer = FixedAnalyzer("dup-test-dialect");
        static B: FixedAnalyzer = FixedAnalyzer("dup-test-dialect");
        register(&A);
        register(&B);
        let found = lookup("dup-test-dialect").unwrap();
        assert_eq!(found.dialect(), "dup-test-dialect");
    }
}
