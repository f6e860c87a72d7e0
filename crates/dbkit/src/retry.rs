//! Retry loop for naming collisions.
//!
//! Unlike network retries there is no backoff: a collision is resolved by
//! trying a different name, which the operation closure is responsible for
//! generating on each attempt.

use crate::error::{Error, Result};

/// Default number of attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Callback trait for retry progress notifications.
pub trait RetryCallback {
    /// Called after a retryable failure, before the next attempt.
    ///
    /// # Arguments
    /// * `attempt` - Attempt that just failed (1-indexed)
    /// * `max_attempts` - Maximum number of attempts
    /// * `error` - The error that triggered the retry
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &Error);
}

/// Callback that logs retries at debug level.
pub struct LogCallback;

impl RetryCallback for LogCallback {
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &Error) {
        log::debug!("Attempt {attempt}/{max_attempts} collided: {error}. Retrying with a new name");
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// `max_attempts` is reached.
///
/// The closure receives the 0-based attempt index. Exhaustion yields
/// [`Error::Exhausted`] wrapping the last collision.
pub fn retry_on_conflict<T, F>(
    max_attempts: u32,
    callback: Option<&dyn RetryCallback>,
    mut operation: F,
) -> Result<T>
where
    F: FnMut(u32) -> Result<T>,
{
    let mut last_error: Option<Error> = None;

    for attempt in 0..max_attempts {
        match operation(attempt) {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                if attempt + 1 < max_attempts
                    && let Some(cb) = callback
                {
                    cb.on_retry(attempt + 1, max_attempts, &e);
                }
                last_error = Some(e);
            }
        }
    }

    Err(Error::Exhausted {
        attempts: max_attempts,
        last: Box::new(last_error.unwrap_or_else(|| Error::AlreadyExists {
            name: "unknown".to_string(),
        })),
    })
}
