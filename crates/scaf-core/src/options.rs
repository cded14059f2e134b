//! Tunable analysis limits and the active dialect/schema selection (§2.1, §3).
//!
//! Plain data: no environment variable or config-file parsing happens here.
//! That belongs to the external CLI/config layer; this struct is what it
//! hands to the analyzer.

use std::path::PathBuf;

/// Bounds and selections governing a single analysis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Upper bound on parser work units, guarding against pathological input.
    pub exec_fuel_limit: u32,
    /// Upper bound on parser recursion depth.
    pub recursion_fuel_limit: u32,
    /// Name of the registered query analyzer to use (e.g. `"cypher"`).
    pub dialect: String,
    /// Base directory schema paths are resolved against.
    pub schema_base_dir: Option<PathBuf>,
    /// Path to the schema file, relative to `schema_base_dir` unless absolute.
    pub schema_path: Option<PathBuf>,
    /// Stop appending diagnostics to a file's `Diagnostics` once this many
    /// have been collected.
    pub max_diagnostics_per_file: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            exec_fuel_limit: 1_000_000,
            recursion_fuel_limit: 256,
            dialect: "noop".to_string(),
            schema_base_dir: None,
            schema_path: None,
            max_diagnostics_per_file: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_conservative_limits() {
        let opts = AnalysisOptions::default();
        assert!(opts.exec_fuel_limit > 0);
        assert!(opts.recursion_fuel_limit > 0);
        assert_eq!(opts.max_diagnostics_per_file, 50);
    }
}
