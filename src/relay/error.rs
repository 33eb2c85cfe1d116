//! Error responses of the relay routes.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use super::ErrorBody;
use crate::consts::SDK_TOKEN_FAILED;
use crate::error::Error;

/// Label for failures of the token exchange routes.
pub const TOKEN_FAILED: &str = "Failed to get access token";

/// A failed relay request, rendered as `{ error, message }`.
///
/// The message names the cause (missing setting, upstream status) but never
/// carries upstream bodies or secrets.
#[derive(Debug)]
pub struct RelayError {
    status: StatusCode,
    error: &'static str,
    message: String,
}

impl RelayError {
    /// `/api/sdktoken` reports every failure as a 500.
    pub fn sdk_token(err: Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: SDK_TOKEN_FAILED,
            message: describe(&err),
        }
    }

    /// Token exchange routes: our own misconfiguration is a 500, anything the
    /// identity provider got wrong is a 502.
    pub fn token(err: Error) -> Self {
        let status = match err {
            Error::ConfigMissing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_GATEWAY,
        };
        Self {
            status,
            error: TOKEN_FAILED,
            message: describe(&err),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

fn describe(err: &Error) -> String {
    match err {
        Error::ConfigMissing(name) => {
            format!("Missing required configuration ({name}). Please check your environment.")
        }
        Error::UpstreamRejected { status, .. } => {
            let reason = StatusCode::from_u16(*status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("");
            format!("upstream returned {status} {reason}")
                .trim_end()
                .to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        error!(status = self.status.as_u16(), message = %self.message, "{}", self.error);
        let body = ErrorBody {
            error: self.error.to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sdk_token_errors_are_500() {
        let err = RelayError::sdk_token(Error::UpstreamRejected {
            status: 401,
            body: "nope".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "upstream returned 401 Unauthorized");
    }

    #[test]
    fn missing_config_names_the_setting() {
        let err = RelayError::sdk_token(Error::ConfigMissing("DAVINCI_API_KEY"));
        assert!(err.message().contains("DAVINCI_API_KEY"));
    }

    #[test]
    fn token_route_upstream_rejection_is_502() {
        let err = RelayError::token(Error::UpstreamRejected {
            status: 400,
            body: "{\"error\":\"invalid_grant\"}".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(!err.message().contains("invalid_grant"));
    }

    #[test]
    fn token_route_missing_config_is_500() {
        let err = RelayError::token(Error::ConfigMissing("OAUTH_CLIENT_SECRET"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn unknown_status_has_no_reason() {
        let err = RelayError::sdk_token(Error::UpstreamRejected {
            status: 599,
            body: String::new(),
        });
        assert_eq!(err.message(), "upstream returned 599");
    }
}
