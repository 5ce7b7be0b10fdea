use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use tenantguard_auth::AuthError;

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn status_for(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidCredentials
        | AuthError::InactiveAccount
        | AuthError::InvalidCode
        | AuthError::InvalidToken
        | AuthError::InvalidRefreshToken => StatusCode::UNAUTHORIZED,
        AuthError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
        AuthError::MissingTenant
        | AuthError::InvalidTenant
        | AuthError::WeakPassword(_)
        | AuthError::TwoFactorAlreadyEnabled
        | AuthError::TwoFactorNotEnrolled
        | AuthError::Domain(_) => StatusCode::BAD_REQUEST,
        AuthError::Forbidden => StatusCode::FORBIDDEN,
        AuthError::IdentityExists => StatusCode::CONFLICT,
        AuthError::IdentityNotFound => StatusCode::NOT_FOUND,
        AuthError::Config(_) | AuthError::Crypto(_) | AuthError::Repository(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Map an auth failure to a JSON rejection without leaking internals.
pub fn auth_error_to_response(err: AuthError) -> Response {
    let err = err.public();
    let status = status_for(&err);

    match &err {
        AuthError::MissingTenant => tracing::warn!("request rejected: tenant id missing"),
        AuthError::Forbidden => tracing::debug!("request rejected: forbidden"),
        _ if status.is_server_error() => tracing::error!(error = %err, "internal auth failure"),
        _ => {}
    }

    let message = if status.is_server_error() {
        "internal error".to_string()
    } else {
        err.to_string()
    };
    let mut response = json_error(status, err.code(), message);
    if status == StatusCode::UNAUTHORIZED {
        response.headers_mut().insert(
            axum::http::header::WWW_AUTHENTICATE,
            axum::http::HeaderValue::from_static("Bearer"),
        );
    }
    response
}

/// `AuthError` as an axum response, for handlers returning `Result<_, ApiError>`.
#[derive(Debug)]
pub struct ApiError(pub AuthError);

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        auth_error_to_response(self.0)
    }
}

#[cfg(test)]
mod tests {
    use tenantguard_auth::RepositoryError;

    use super::*;

    #[test]
    fn inactive_account_looks_like_bad_credentials() {
        let a = auth_error_to_response(AuthError::InactiveAccount);
        let b = auth_error_to_response(AuthError::InvalidCredentials);
        assert_eq!(a.status(), b.status());
        assert_eq!(a.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn statuses() {
        assert_eq!(status_for(&AuthError::MissingTenant), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&AuthError::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(status_for(&AuthError::TooManyAttempts), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            status_for(&AuthError::Repository(RepositoryError::Unavailable("x".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unauthorized_carries_challenge_header() {
        let response = auth_error_to_response(AuthError::InvalidToken);
        assert_eq!(
            response.headers().get(axum::http::header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }
}
