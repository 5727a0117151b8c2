//! Compilation errors
//!
//! Internal compiler bugs (an unhandled AST/type shape, missing Oracle
//! information) are deliberately *not* represented here: they panic with a
//! descriptive message so they crash loudly during testing instead of being
//! silently swallowed.

use thiserror::Error;

pub type CompileResult<T> = Result<T, CompileError>;

/// How many type errors are surfaced before truncation.
pub const MAX_TYPE_ERRORS: usize = 10;

#[derive(Debug, Error)]
pub enum CompileError {
    /// Type errors surfaced verbatim from the checker, capped at
    /// [`MAX_TYPE_ERRORS`].
    #[error("{}{}", errors.join("\n"), if *truncated { "\ntoo many errors" } else { "" })]
    TypeCheck { errors: Vec<String>, truncated: bool },

    /// Use of a reserved or predeclared name, rejected before the fragment
    /// reaches the checker so incremental scope state stays intact.
    #[error("cannot redeclare reserved identifier: {name}")]
    IdentifierRestriction { name: String },

    /// Only the first failing import path is reported.
    #[error("cannot find package: {path}")]
    ImportResolution { path: String },

    #[error(transparent)]
    Archive(#[from] crate::archive::ArchiveError),
}

impl CompileError {
    /// Aggregate checker errors, truncating past the cap.
    pub fn from_type_errors(mut errors: Vec<String>) -> Self {
        let truncated = errors.len() > MAX_TYPE_ERRORS;
        errors.truncate(MAX_TYPE_ERRORS);
        CompileError::TypeCheck { errors, truncated }
    }
}
