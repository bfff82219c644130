//! Shared error plumbing.

/// Grepable error code and retryable flag, used when logging failures.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}
