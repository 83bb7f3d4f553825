//! Error types for the directory metadata catalog.

use thiserror::Error;

use crate::types::DirId;

/// Result type alias for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Why a metadata read or write was refused as conflicting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConflictKind {
    /// The field is already inherited from a strict ancestor.
    Shadowing,
    /// Several directories of the ancestor chain own a value.
    Ambiguous {
        /// Directories owning a value.
        owners: Vec<DirId>,
    },
}

/// Why a metadata set could not be expanded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SetConflictKind {
    /// The same key was resolved twice.
    KeyCollision {
        /// The colliding key.
        key: String,
    },
    /// The set references itself through MetaSet-typed entries.
    Cycle {
        /// Set names along the reference chain, ending at the repeated set.
        chain: Vec<String>,
    },
    /// Expansion went deeper than the configured limit.
    DepthExceeded {
        /// The configured limit.
        limit: usize,
    },
}

/// Error variants for catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The directory path does not exist in the tree.
    #[error("{0}: directory not found")]
    DirectoryNotFound(String),

    /// The directory ID does not exist in the tree.
    #[error("directory {0} not found")]
    DirectoryIdNotFound(DirId),

    /// The metadata field is not declared.
    #[error("metadata field '{0}' not found")]
    FieldNotFound(String),

    /// A metadata set entry or creation request names an undeclared field.
    #[error("unknown metadata field '{0}'")]
    UnknownField(String),

    /// The metadata set does not exist.
    #[error("metadata set '{0}' not found")]
    SetNotFound(String),

    /// A metadata set with this name already exists.
    #[error("metadata set '{0}' already exists")]
    SetExists(String),

    /// A field was redeclared with a different type.
    #[error("attempt to add existing metadata field '{field}' with different type: {requested}/{existing}")]
    TypeConflict {
        /// Field name.
        field: String,
        /// Type already registered.
        existing: String,
        /// Type requested by the caller.
        requested: String,
    },

    /// The field name is outside the allowed identifier character set.
    #[error("invalid metadata field name '{0}'")]
    InvalidFieldName(String),

    /// The declared type string is not supported.
    #[error("unsupported metadata type '{0}'")]
    UnsupportedType(String),

    /// A value could not be stored in a field of the declared type.
    #[error("invalid value '{value}' for field '{field}': {reason}")]
    InvalidValue {
        /// Field name.
        field: String,
        /// Rendered value.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Ambiguous inheritance or attempted shadowing of an inherited field.
    #[error("metadata conflict detected for '{field}' in directory {path}: {kind:?}")]
    MetadataConflict {
        /// Directory path.
        path: String,
        /// Field name.
        field: String,
        /// Kind of conflict.
        kind: ConflictKind,
    },

    /// Metadata set expansion failed.
    #[error("metadata set conflict in '{set}': {kind:?}")]
    SetConflict {
        /// Set being expanded.
        set: String,
        /// Kind of conflict.
        kind: SetConflictKind,
    },

    /// Malformed operator or operand in a query predicate.
    #[error("invalid predicate for '{field}': {reason}")]
    InvalidPredicate {
        /// Field the predicate applies to.
        field: String,
        /// Description of the problem.
        reason: String,
    },

    /// The storage collaborator reported an error.
    #[error("storage error: {0}")]
    Storage(String),

    /// A stored row could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),
}

impl CatalogError {
    /// Returns true for any kind of not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CatalogError::DirectoryNotFound(_)
                | CatalogError::DirectoryIdNotFound(_)
                | CatalogError::FieldNotFound(_)
                | CatalogError::SetNotFound(_)
        )
    }
}

impl From<bincode::Error> for CatalogError {
    fn from(e: bincode::Error) -> Self {
        CatalogError::Codec(e.to_string())
    }
}

/// Soft outcome attached to a successful result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CatalogWarning {
    /// The key is not a declared field; it was stored as a parameter.
    NotSearchable {
        /// The parameter key.
        key: String,
    },
}
