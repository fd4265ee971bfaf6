//! Error taxonomy for sessionkit.
//!
//! - **Error Categories**: high-level classification driving retry and logging
//! - **ApiError**: classified outcome of a gateway call
//! - **SessionError**: login/register/refresh/verify failures
//! - **ResourceError**: cache and store failures, including rejected mutations
//! - **StorageError**: durable slot failures (always handled locally)
//!
//! | Kind | Source | Retried |
//! |------|--------|---------|
//! | Network | timeout, unreachable | Yes |
//! | Auth | 401 / 403 | No, invalidates the session |
//! | Validation | other 4xx | No |
//! | Server | 5xx | Yes |
//! | Aborted | caller cancellation | No |

mod api;
mod category;
mod resource;
mod session;
mod storage;

pub use api::{status_phrase, ApiError};
pub use category::ErrorCategory;
pub use resource::ResourceError;
pub use session::{SessionError, LOGIN_FALLBACK_MESSAGE, REGISTER_FALLBACK_MESSAGE};
pub use storage::StorageError;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn test_categories_line_up_with_retry_policy() {
        let retryable: Vec<ApiError> = vec![
            ApiError::Network {
                message: "timed out".to_string(),
            },
            ApiError::from_status(502, None),
        ];
        for err in retryable {
            assert!(err.category().is_retryable(), "{:?} should retry", err);
        }

        let terminal: Vec<ApiError> = vec![
            ApiError::from_status(401, None),
            ApiError::from_status(403, None),
            ApiError::from_status(422, None),
            ApiError::Aborted,
        ];
        for err in terminal {
            assert!(!err.category().is_retryable(), "{:?} should not retry", err);
        }
    }

    #[test]
    fn test_session_error_wraps_api_error() {
        let err: SessionError = ApiError::from_status(403, None).into();
        assert_eq!(err.category(), ErrorCategory::Auth);
        assert!(err.requires_reauth());
    }
}
