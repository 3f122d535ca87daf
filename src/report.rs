//! Unexpected-failure reporting.
//!
//! Single funnel for errors that indicate a bug rather than bad user
//! input. User-facing validation errors never go through here; they are
//! rendered to the user instead.

use crate::error::Error;

/// Report an unexpected error together with the operation it came from.
pub fn report_err(context: &str, err: &dyn std::fmt::Display) {
    tracing::error!(context, error = %err, "unexpected failure");
}

/// Report only when the error is not user-facing, then hand it back.
///
/// Convenience for boundaries that surface all errors but must not log
/// expected validation failures as crashes.
pub fn report_if_unexpected(context: &str, err: Error) -> Error {
    if !err.is_user_facing() {
        report_err(context, &err);
    }
    err
}
