//! Error types for Trellis.
//!
//! Every fallible control operation returns [`Result`], whose error is a
//! [`ViewModelError`]. Backend collaborators report [`BackendError`], which
//! converts into `ViewModelError::Backend` so command bodies can use `?`.

use std::fmt;

/// Result alias used by every fallible control operation.
pub type Result<T> = std::result::Result<T, ViewModelError>;

/// Result alias used by backend collaborators.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// The kind of registry member a lookup was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// A declared property.
    Property,
    /// A declared command.
    Command,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Property => write!(f, "Property"),
            Self::Command => write!(f, "Command"),
        }
    }
}

/// Errors raised by controls, bindings and the metadata registry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ViewModelError {
    /// A binding, argument or property value had the wrong shape.
    ///
    /// Always raised before the triggering call mutates any state.
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// A property or command name is not declared on the control type.
    #[error("{kind} '{name}' not found on {type_name}")]
    NotFound {
        kind: MemberKind,
        name: String,
        type_name: &'static str,
    },

    /// A backend collaborator failed. Passed through unchanged.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ViewModelError {
    /// Create an argument error.
    pub fn argument(message: impl Into<String>) -> Self {
        Self::Argument(message.into())
    }

    /// Create a not-found error for a property name.
    pub fn property_not_found(type_name: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: MemberKind::Property,
            name: name.into(),
            type_name,
        }
    }

    /// Create a not-found error for a command name.
    pub fn command_not_found(type_name: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: MemberKind::Command,
            name: name.into(),
            type_name,
        }
    }

    /// Returns `true` if this error came from the backend.
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}

/// The backend operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOperation {
    BeginTransaction,
    Update,
    Delete,
    CreateRelationship,
    Relationships,
    Query,
    Commit,
    Rollback,
}

impl fmt::Display for BackendOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BeginTransaction => "begin transaction",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::CreateRelationship => "create relationship",
            Self::Relationships => "list relationships",
            Self::Query => "query",
            Self::Commit => "commit",
            Self::Rollback => "rollback",
        };
        f.write_str(name)
    }
}

/// A failure reported by a backend collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Backend {operation} failed: {message}")]
pub struct BackendError {
    /// The operation that failed.
    pub operation: BackendOperation,
    /// Backend-supplied detail.
    pub message: String,
}

impl BackendError {
    /// Create a backend error.
    pub fn new(operation: BackendOperation, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = ViewModelError::command_not_found("RelationshipTree", "Explode");
        assert_eq!(
            err.to_string(),
            "Command 'Explode' not found on RelationshipTree"
        );
    }

    #[test]
    fn test_backend_error_converts() {
        fn fails() -> Result<()> {
            Err(BackendError::new(BackendOperation::Commit, "locked"))?;
            Ok(())
        }

        let err = fails().unwrap_err();
        assert!(err.is_backend());
        assert_eq!(err.to_string(), "Backend commit failed: locked");
    }
}
