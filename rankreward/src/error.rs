// src/error.rs
//
// Error taxonomy for reward composition and trace folding.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type RewardResult<T> = Result<T, RewardError>;

/// Errors raised by reward construction, scaling and trace folding.
///
/// Every failing call leaves its receiver untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewardError {
    /// A construction or scaling argument is outside its valid domain
    /// (`base < 2`, `max_var == 0`, `maxlen == 0`, unknown aggregation name).
    #[error("invalid argument '{field}': {message}")]
    InvalidArgument {
        field: &'static str,
        message: String,
    },

    /// Folding a trace that holds no snapshots.
    #[error("cannot fold an empty reward trace")]
    EmptyTrace,
}

impl RewardError {
    pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        RewardError::InvalidArgument {
            field,
            message: message.into(),
        }
    }
}

/// Validate an exponent base shared by rewards, collections and traces.
pub(crate) fn check_base(base: u32) -> RewardResult<u32> {
    if base < 2 {
        return Err(RewardError::invalid(
            "base",
            format!("must be >= 2, got {base}"),
        ));
    }
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_below_two_is_rejected() {
        assert!(check_base(0).is_err());
        assert!(check_base(1).is_err());
        assert_eq!(check_base(2), Ok(2));
    }

    #[test]
    fn display_names_the_field() {
        let err = RewardError::invalid("max_var", "must be non-zero");
        assert_eq!(
            err.to_string(),
            "invalid argument 'max_var': must be non-zero"
        );
        assert_eq!(
            RewardError::EmptyTrace.to_string(),
            "cannot fold an empty reward trace"
        );
    }
}
