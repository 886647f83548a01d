//! Shared-secret bearer check applied to every pipeline and listing route.

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::app_state::AppState;

#[derive(Debug, Clone, Default)]
pub struct AuthSettings {
    pub enabled: bool,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    /// Auth is switched on but no token was configured.
    Misconfigured,
    MissingToken,
    InvalidToken,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::Misconfigured => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_MISCONFIGURED",
                "API authentication is enabled but no token is configured",
            ),
            Self::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Missing bearer token",
            ),
            Self::InvalidToken => (StatusCode::FORBIDDEN, "FORBIDDEN", "Invalid bearer token"),
        };
        (status, Json(json!({ "error": message, "code": code }))).into_response()
    }
}

/// Decide whether an `Authorization` header value grants access.
pub fn check_bearer(settings: &AuthSettings, header: Option<&str>) -> Result<(), AuthRejection> {
    if !settings.enabled {
        return Ok(());
    }

    let expected = settings
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or(AuthRejection::Misconfigured)?;

    let presented = header
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthRejection::MissingToken)?;

    if constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        Err(AuthRejection::InvalidToken)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthRejection> {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if let Err(rejection) = check_bearer(&state.auth, header) {
        tracing::warn!(path = %request.uri().path(), ?rejection, "Request rejected by auth");
        return Err(rejection);
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled(token: Option<&str>) -> AuthSettings {
        AuthSettings {
            enabled: true,
            token: token.map(str::to_string),
        }
    }

    #[test]
    fn test_disabled_auth_allows_everything() {
        assert_eq!(check_bearer(&AuthSettings::default(), None), Ok(()));
        assert_eq!(check_bearer(&AuthSettings::default(), Some("Bearer nope")), Ok(()));
    }

    #[test]
    fn test_enabled_without_token_is_a_server_error() {
        let rejection = check_bearer(&enabled(None), Some("Bearer x")).unwrap_err();
        assert_eq!(rejection, AuthRejection::Misconfigured);
        assert_eq!(
            rejection.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            check_bearer(&enabled(Some("")), Some("Bearer x")),
            Err(AuthRejection::Misconfigured)
        );
    }

    #[test]
    fn test_missing_or_malformed_header_is_unauthorized() {
        let settings = enabled(Some("s3cret"));
        for header in [None, Some("s3cret"), Some("Basic s3cret"), Some("Bearer ")] {
            let rejection = check_bearer(&settings, header).unwrap_err();
            assert_eq!(rejection, AuthRejection::MissingToken);
            assert_eq!(rejection.into_response().status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn test_wrong_token_is_forbidden() {
        let rejection = check_bearer(&enabled(Some("s3cret")), Some("Bearer s3cre7")).unwrap_err();
        assert_eq!(rejection, AuthRejection::InvalidToken);
        assert_eq!(rejection.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_matching_token_is_allowed() {
        assert_eq!(
            check_bearer(&enabled(Some("s3cret")), Some("Bearer s3cret")),
            Ok(())
        );
    }
}
