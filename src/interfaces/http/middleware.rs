//! Authentication middleware for Axum

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::application::{AuthenticatedUser, IdentityService};
use crate::domain::DomainError;

#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    MalformedHeader,
    Rejected(String),
    Unavailable,
}

#[derive(Clone)]
pub struct AuthState {
    pub identity: Arc<IdentityService>,
}

fn extract_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Bearer-token authentication. On success the resolved
/// [`AuthenticatedUser`] is placed in the request extensions.
pub async fn auth_middleware(
    State(auth_state): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(auth_header) = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(String::from)
    else {
        return auth_error_response(AuthError::MissingToken);
    };

    let Some(token) = extract_token(&auth_header) else {
        return auth_error_response(AuthError::MalformedHeader);
    };

    match auth_state.identity.authenticate(token).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(DomainError::Unavailable(_)) => auth_error_response(AuthError::Unavailable),
        Err(e) => {
            tracing::debug!(error = %e, "Rejected bearer token");
            auth_error_response(AuthError::Rejected(match e {
                DomainError::Unauthorized(m) => m,
                _ => "Invalid authentication token".to_string(),
            }))
        }
    }
}

/// Admin-only routes are layered with this after [`auth_middleware`].
pub async fn require_admin(request: Request<Body>, next: Next) -> Response {
    match request.extensions().get::<AuthenticatedUser>() {
        Some(user) if user.is_admin() => next.run(request).await,
        Some(_) => forbidden_response("Administrator role required"),
        None => auth_error_response(AuthError::MissingToken),
    }
}

fn forbidden_response(message: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "success": false, "error": message })),
    )
        .into_response()
}

fn auth_error_response(error: AuthError) -> Response {
    let (status, message) = match error {
        AuthError::MissingToken => (
            StatusCode::UNAUTHORIZED,
            "Missing authentication token".to_string(),
        ),
        AuthError::MalformedHeader => (
            StatusCode::UNAUTHORIZED,
            "Authorization header must use the Bearer scheme".to_string(),
        ),
        AuthError::Rejected(message) => (StatusCode::UNAUTHORIZED, message),
        AuthError::Unavailable => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Service temporarily unavailable".to_string(),
        ),
    };

    (status, Json(json!({ "success": false, "error": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_prefix_is_required() {
        assert_eq!(extract_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_token("Bearer   "), None);
        assert_eq!(extract_token("Basic Zm9vOmJhcg=="), None);
        assert_eq!(extract_token("abc.def"), None);
    }
}
