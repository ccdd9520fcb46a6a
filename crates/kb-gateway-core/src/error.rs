//! Error type shared by every gateway operation.

use thiserror::Error;

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Failure of a gateway operation, carrying the HTTP status surfaced to the caller.
///
/// Upstream failures keep the status the upstream returned (500 when it could not be
/// reached). Malformed inbound requests use 422.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct GatewayError {
    pub status_code: u16,
    pub message: String,
}

impl GatewayError {
    pub const UNREACHABLE_STATUS: u16 = 500;

    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }

    /// Upstream answered with a non-2xx status.
    pub fn upstream(status_code: u16, detail: impl std::fmt::Display) -> Self {
        Self::new(status_code, format!("Error from upstream API: {}", detail))
    }

    /// The call never produced a usable response (connect, timeout, body read).
    pub fn transport(err: &reqwest::Error) -> Self {
        let status = err
            .status()
            .map(|s| s.as_u16())
            .unwrap_or(Self::UNREACHABLE_STATUS);
        Self::upstream(status, err)
    }

    /// Upstream answered 2xx with a body that is not JSON.
    pub fn invalid_response(detail: impl std::fmt::Display) -> Self {
        Self::new(502, format!("Invalid JSON from upstream API: {}", detail))
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(422, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_error_embeds_detail() {
        let err = GatewayError::upstream(404, r#"{"detail":"Not found"}"#);
        assert_eq!(err.status_code, 404);
        assert_eq!(
            err.to_string(),
            r#"Error from upstream API: {"detail":"Not found"}"#
        );
    }

    #[test]
    fn invalid_request_is_422() {
        let err = GatewayError::invalid_request("missing field `organization_id`");
        assert_eq!(err.status_code, 422);
        assert!(err.message.contains("organization_id"));
    }
}
