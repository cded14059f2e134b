//! The narrow, truly-fatal error hierarchy (§7). Everything else the
//! analyzer finds is a diagnostic, never an `Err`.

use crate::schema::SchemaError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("parser exceeded its execution fuel limit")]
    ExecFuelExhausted,
    #[error("parser exceeded its recursion limit")]
    RecursionLimitExceeded,
    #[error(transparent)]
    Schema(#[from] SchemaError),
}
