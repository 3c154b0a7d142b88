//! Error types for the authorization core.
//!
//! # Security Note
//! A plain deny is not an error: checks return `Ok(false)`. The only error a
//! check can produce is [`AuthzError::UnrecognizedTarget`], which callers must
//! treat as a hard deny and surface as a generic forbidden response. The detail
//! belongs in the logs, not in the response body.

use crate::types::{EntityKind, Target};
use thiserror::Error;

/// Errors that can occur during authorization operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// A checker was handed a target it has no case for and no narrower
    /// delegation applies.
    ///
    /// This points at a caller wired to the wrong checker, or a new entity type
    /// that was never added to the evaluator.
    #[error("No {checker} detected: {checker} check cannot evaluate {target}")]
    UnrecognizedTarget { checker: EntityKind, target: Target },

    /// A check inside a batch was denied, failing the whole batch.
    #[error("Access denied to {0}")]
    Denied(Target),
}

impl AuthzError {
    /// The target the failure refers to.
    pub fn target(&self) -> Target {
        match self {
            AuthzError::UnrecognizedTarget { target, .. } => *target,
            AuthzError::Denied(target) => *target,
        }
    }
}

/// A specialized Result type for authorization operations.
pub type Result<T> = std::result::Result<T, AuthzError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SensorId, ZoneId};

    #[test]
    fn test_error_display() {
        let err = AuthzError::UnrecognizedTarget {
            checker: EntityKind::Node,
            target: Target::Sensor(SensorId(3)),
        };
        assert_eq!(
            err.to_string(),
            "No node detected: node check cannot evaluate sensor#3"
        );

        let err = AuthzError::Denied(Target::Zone(ZoneId(8)));
        assert_eq!(err.to_string(), "Access denied to zone#8");
    }

    #[test]
    fn test_error_target() {
        let target = Target::Zone(ZoneId(1));
        assert_eq!(AuthzError::Denied(target).target(), target);
        assert_eq!(
            AuthzError::UnrecognizedTarget {
                checker: EntityKind::Sensor,
                target,
            }
            .target(),
            target
        );
    }
}
