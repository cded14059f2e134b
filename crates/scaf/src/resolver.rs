//! Cross-file import resolution (§4.7, second half).
//!
//! `import alias "./path"` and the `setup`/`teardown` calls that reference
//! it name another scaf file by relative path. Resolving those references
//! means loading and parsing that file too - which can in turn import a
//! third file, and nothing stops a cycle. [`ImportResolver`] memoizes every
//! file it loads and marks a file in-progress while loading it, so a cycle
//! resolves to `None` for the back edge instead of recursing forever.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use scaf_core::{AnalysisOptions, Schema};

use crate::analyzer::QueryAnalyzer;
use crate::diagnostics::ResolvedImports;
use crate::symbols::{build_symbols, SymbolTable};

#[derive(Debug, Clone)]
enum ResolveState {
    InProgress,
    Done(Option<IndexSet<String>>),
}

/// Resolves and memoizes the query names exported by every file reachable
/// through `import` declarations, starting from one root file's directory.
pub struct ImportResolver<'a> {
    options: &'a AnalysisOptions,
    analyzer: Option<&'a dyn QueryAnalyzer>,
    schema: Option<&'a Schema>,
    cache: RefCell<IndexMap<PathBuf, ResolveState>>,
}

impl<'a> ImportResolver<'a> {
    pub fn new(
        options: &'a AnalysisOptions,
        analyzer: Option<&'a dyn QueryAnalyzer>,
        schema: Option<&'a Schema>,
    ) -> Self {
        Self {
            options,
            analyzer,
            schema,
            cache: RefCell::new(IndexMap::new()),
        }
    }

    /// Resolves every import in `symbols` relative to `base_dir`, returning
    /// the alias-to-exported-query-names map the diagnostic rules need.
    pub fn resolve_all(&self, base_dir: &Path, symbols: &SymbolTable) -> ResolvedImports {
        let mut resolved = ResolvedImports::new();
        for import in symbols.imports.values() {
            let path = resolve_import_path(base_dir, &import.path);
            let exports = self.load_and_analyze(&path);
            resolved.insert(import.alias.clone(), exports);
        }
        resolved
    }

    /// Loads, parses, and indexes one file's declared query names, returning
    /// `None` if the file is missing, fails to read, or would re-enter a
    /// file already being loaded (an import cycle).
    fn load_and_analyze(&self, path: &Path) -> Option<IndexSet<String>> {
        let canonical = path.to_path_buf();
        if let Some(state) = self.cache.borrow().get(&canonical) {
            return match state {
                ResolveState::InProgress => None,
                ResolveState::Done(names) => names.clone(),
            };
        }
        self.cache.borrow_mut().insert(canonical.clone(), ResolveState::InProgress);

        let names = std::fs::read_to_string(&canonical).ok().map(|source| {
            let result = crate::parser::parse_with(&source, self.options);
            let file_symbols = build_symbols(&result.root, self.analyzer, self.schema);
            file_symbols.queries.keys().cloned().collect::<IndexSet<_>>()
        });

        self.cache.borrow_mut().insert(canonical, ResolveState::Done(names.clone()));
        names
    }
}

/// Default file extension appended to an import path that names no
/// extension of its own (§4.7).
const DEFAULT_EXTENSION: &str = "scaf";

/// Resolves an import path string against the importing file's directory.
/// Absolute paths pass through; everything else is joined and lexically
/// normalized (no `..`/`.` components survive, matching the teacher's
/// filesystem-free path handling). A path with no extension gets
/// [`DEFAULT_EXTENSION`] appended.
pub fn resolve_import_path(base_dir: &Path, import_path: &str) -> PathBuf {
    let candidate = Path::new(import_path);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base_dir.join(candidate)
    };
    let mut resolved = normalize(&joined);
    if resolved.extension().is_none() {
        resolved.set_extension(DEFAULT_EXTENSION);
    }
    resolved
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        use std::path::Component;
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_import_path_normalizes_dot_segments() {
        let base = Path::new("/project/tests");
        assert_eq!(
            resolve_import_path(base, "./../fixtures/users.scaf"),
            PathBuf::from("/project/fixtures/users.scaf")
        );
    }

    #[test]
    fn resolve_import_path_appends_the_default_extension_when_missing() {
        let base = Path::new("/project/tests");
        assert_eq!(
            resolve_import_path(base, "./a"),
            PathBuf::from("/project/tests/a.scaf")
        );
    }

    #[test]
    fn resolve_import_path_leaves_an_explicit_extension_alone() {
        let base = Path::new("/project/tests");
        assert_eq!(
            resolve_import_path(base, "./fixtures/users.scaf"),
            PathBuf::from("/project/tests/fixtures/users.scaf")
        );
    }

    #[test]
    fn resolve_import_path_passes_through_absolute_paths() {
        let base = Path::new("/project/tests");
        assert_eq!(
            resolve_import_path(base, "/abs/users.scaf"),
            PathBuf::from("/abs/users.scaf")
        );
    }

    #[test]
    fn missing_file_resolves_to_none() {
        let options = AnalysisOptions::default();
        let resolver = ImportResolver::new(&options, None, None);
        assert!(resolver.load_and_analyze(Path::new("/definitely/not/a/real/file.scaf")).is_none());
    }

    #[test]
    fn a_file_importing_itself_does_not_hang() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("self.scaf");
        std::fs::write(&path, "fn F() `RETURN 1`\n").unwrap();

        let options = AnalysisOptions::default();
        let resolver = ImportResolver::new(&options, None, None);
        let first = resolver.load_and_analyze(&path);
        assert!(first.is_some());
        assert!(first.unwrap().contains("F"));
    }
}
