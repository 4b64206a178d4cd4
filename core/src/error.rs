//! Error types for sqlbridge.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RewriteError {
    /// Input statement is not valid MySQL.
    #[error("parse error: {0}")]
    Parse(#[from] sqlparser::parser::ParserError),

    /// Syntactically valid, but there is no safe automatic PostgreSQL mapping.
    #[error("{construct}: {reason}")]
    Unsupported {
        construct: &'static str,
        reason: String,
    },

    /// A mapping rule exists but cannot be applied confidently to this input.
    #[error("cannot translate {what}: {detail}")]
    Translation { what: String, detail: String },
}

impl RewriteError {
    /// Create an unsupported-construct error.
    pub fn unsupported(construct: &'static str, reason: impl Into<String>) -> Self {
        Self::Unsupported {
            construct,
            reason: reason.into(),
        }
    }

    /// Create a translation error.
    pub fn translation(what: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Translation {
            what: what.into(),
            detail: detail.into(),
        }
    }

    /// Comment prefix used when the failed statement is re-emitted.
    ///
    /// Unsupported constructs are manual-review items (`-- TODO:`); parse and
    /// translation failures are plain errors (`-- ERROR:`).
    pub fn annotation_prefix(&self) -> &'static str {
        match self {
            Self::Unsupported { .. } => "-- TODO:",
            _ => "-- ERROR:",
        }
    }
}

/// Result type alias for rewrite operations.
pub type RewriteResult<T> = Result<T, RewriteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RewriteError::translation("DATE_FORMAT token", "%q is not mapped");
        assert_eq!(
            err.to_string(),
            "cannot translate DATE_FORMAT token: %q is not mapped"
        );
    }

    #[test]
    fn test_annotation_prefix() {
        let todo = RewriteError::unsupported("REPLACE INTO", "semantics differ");
        assert_eq!(todo.annotation_prefix(), "-- TODO:");

        let err = RewriteError::translation("x", "y");
        assert_eq!(err.annotation_prefix(), "-- ERROR:");
    }
}
