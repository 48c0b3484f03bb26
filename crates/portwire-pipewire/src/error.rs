//! PipeWire error types.

use thiserror::Error;

use portwire_core::ServerError;

/// PipeWire error type.
#[derive(Debug, Error)]
pub enum PwError {
    #[error("PipeWire connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Link creation failed: {0}")]
    LinkCreationFailed(String),

    #[error("Link removal failed: {0}")]
    LinkRemovalFailed(String),

    #[error("Registry error: {0}")]
    RegistryError(String),

    #[error("MainLoop error: {0}")]
    MainLoopError(String),

    #[error("Timed out waiting for PipeWire")]
    Timeout,
}

/// Result type for PipeWire operations.
pub type PwResult<T> = Result<T, PwError>;

impl From<PwError> for ServerError {
    fn from(e: PwError) -> Self {
        match e {
            PwError::LinkCreationFailed(reason) | PwError::LinkRemovalFailed(reason) => {
                ServerError::Rejected(reason)
            }
            other => ServerError::Unavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_link_failures_are_rejections() {
        let e: ServerError = PwError::LinkCreationFailed("no such port".into()).into();
        assert_matches!(e, ServerError::Rejected(reason) if reason == "no such port");

        let e: ServerError = PwError::LinkRemovalFailed("busy".into()).into();
        assert_matches!(e, ServerError::Rejected(_));
    }

    #[test]
    fn test_other_failures_mean_unavailable() {
        let e: ServerError = PwError::Timeout.into();
        assert_matches!(e, ServerError::Unavailable(msg) if msg.contains("Timed out"));
    }
}
