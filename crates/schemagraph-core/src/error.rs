//! Core error types.

use crate::catalog::TableKey;
use crate::ddl::BackendError;
use crate::sort::CycleError;
use thiserror::Error;

/// Core schema errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid argument supplied while building or attaching schema items.
    #[error("argument error: {0}")]
    Argument(String),

    /// A table with the same key is already registered.
    #[error(
        "table '{0}' is already defined for this registry; \
         use a keep, extend or replace policy to redefine it"
    )]
    DuplicateTable(TableKey),

    /// Table lookup failed.
    #[error("table '{0}' is not defined")]
    NoSuchTable(String),

    /// A foreign key refers to a table that is not registered.
    #[error(
        "foreign key on column '{column}' could not find table '{table}' \
         to resolve target column '{target}'"
    )]
    NoReferencedTable {
        /// Referencing column, as `table.column`.
        column: String,
        /// Key of the missing table.
        table: String,
        /// Target column named by the spec.
        target: String,
    },

    /// A foreign key refers to a column that its target table does not have.
    #[error(
        "could not initialize target column for foreign key '{spec}' on table \
         '{parent_table}': table '{table}' has no column named '{column}'"
    )]
    NoReferencedColumn {
        /// The original column spec.
        spec: String,
        /// Table holding the foreign key.
        parent_table: String,
        /// Referenced table.
        table: String,
        /// Missing column key.
        column: String,
    },

    /// An operation was requested on an item in the wrong state.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Dependency cycle that could not be broken.
    #[error(transparent)]
    Cycle(#[from] CycleError),

    /// Existence check, compile or execution failure reported by a backend.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn argument(msg: impl Into<String>) -> Self {
        Error::Argument(msg.into())
    }

    /// Check if this is a validation error raised at the offending call.
    pub fn is_argument(&self) -> bool {
        matches!(self, Error::Argument(_) | Error::DuplicateTable(_))
    }

    /// Check if this is an unresolved-reference error.
    pub fn is_unresolved_reference(&self) -> bool {
        matches!(
            self,
            Error::NoReferencedTable { .. } | Error::NoReferencedColumn { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NoReferencedColumn {
            spec: "orders.id".into(),
            parent_table: "b".into(),
            table: "orders".into(),
            column: "id".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("orders.id"));
        assert!(msg.contains("has no column named 'id'"));
        assert!(err.is_unresolved_reference());
    }

    #[test]
    fn test_duplicate_table_is_argument() {
        let err = Error::DuplicateTable(TableKey::new(Some("s"), "users"));
        assert!(err.is_argument());
        assert!(err.to_string().contains("s.users"));
    }
}
