//=============================================
// solvra_lua/error.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Unified error taxonomy for marshaling and runtime access
// Objective: Carry typed failures across the interpreter boundary and back
//=============================================

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every failure the host layer can report.
///
/// The enum is `Clone` because errors raised inside a bridged host function
/// travel through the interpreter as shared external errors and are cloned
/// back out at the serialization boundary.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("cannot assign guest {guest} to host type {target}")]
    TypeMismatch {
        guest: &'static str,
        target: &'static str,
    },
    #[error("unsupported host type {type_name}: {reason}")]
    UnsupportedType {
        type_name: &'static str,
        reason: String,
    },
    #[error("guest nil cannot be assigned to host type {target}")]
    UnsupportedNilTarget { target: &'static str },
    #[error("guest table cannot be assigned to host type {target}")]
    UnsupportedTableTarget { target: &'static str },
    #[error("array not big enough to hold values; needed {needed}, have {capacity}")]
    Capacity { needed: usize, capacity: usize },
    #[error("invalid map key type {key}: {reason}")]
    KeyType { key: &'static str, reason: String },
    #[error("bridged function expects at least {expected} argument(s), received {actual}")]
    Arity { expected: usize, actual: usize },
    #[error("guest {kind} value cannot be read back into the host")]
    Unreadable { kind: &'static str },
    #[error("cannot parse {target} from guest string: {message}")]
    InvalidText {
        target: &'static str,
        message: String,
    },
    #[error("expected {expected} return value(s), received {actual}")]
    ReturnCount { expected: usize, actual: usize },
    #[error("{0}")]
    Script(String),
    #[error("host function failed: {0}")]
    Host(String),
    #[error("host function panicked: {0}")]
    HostPanic(String),
    #[error("interpreter call exceeded its {0:?} deadline")]
    Timeout(Duration),
    #[error("interpreter instance is closed")]
    Closed,
    #[error("{0} called from a host function running on the same instance")]
    Reentrant(&'static str),
    #[error("failed to read {path}: {message}")]
    Io { path: PathBuf, message: String },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to start interpreter: {0}")]
    Startup(String),
}

impl Error {
    pub(crate) fn mismatch(guest: &'static str, target: &'static str) -> Self {
        Error::TypeMismatch { guest, target }
    }

    pub(crate) fn unsupported(type_name: &'static str, reason: impl Into<String>) -> Self {
        Error::UnsupportedType {
            type_name,
            reason: reason.into(),
        }
    }

    /// True for failures that leave the instance usable once pending work drains.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::Closed | Error::Startup(_))
    }
}

impl From<mlua::Error> for Error {
    fn from(err: mlua::Error) -> Self {
        match err {
            mlua::Error::CallbackError { cause, .. } => Error::from((*cause).clone()),
            mlua::Error::ExternalError(ref inner) => match inner.downcast_ref::<Error>() {
                Some(original) => original.clone(),
                None => Error::Script(err.to_string()),
            },
            mlua::Error::RuntimeError(message) | mlua::Error::SyntaxError { message, .. } => {
                Error::Script(message)
            }
            other => Error::Script(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn external_errors_are_recovered_through_callback_chain() {
        let inner = mlua::Error::external(Error::Arity {
            expected: 1,
            actual: 0,
        });
        let wrapped = mlua::Error::CallbackError {
            traceback: String::from("stack traceback:"),
            cause: Arc::new(inner),
        };
        match Error::from(wrapped) {
            Error::Arity { expected, actual } => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 0);
            }
            other => panic!("expected arity error, received {other:?}"),
        }
    }

    #[test]
    fn runtime_errors_keep_the_diagnostic_text() {
        let err = Error::from(mlua::Error::RuntimeError("chunk:1: boom".into()));
        match err {
            Error::Script(message) => assert_eq!(message, "chunk:1: boom"),
            other => panic!("expected script error, received {other:?}"),
        }
    }

    #[test]
    fn closed_is_not_recoverable() {
        assert!(!Error::Closed.is_recoverable());
        assert!(Error::Timeout(Duration::from_millis(5)).is_recoverable());
    }
}
