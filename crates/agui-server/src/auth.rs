//! Pluggable request authentication.

use crate::service::ApiError;
use agui_runtime::{AuthToken, Principal};
use axum::http::{header, HeaderMap, StatusCode};
use std::collections::HashMap;

/// Resolves the caller of a request and authorizes it per path.
pub trait AuthBackend: Send + Sync {
    /// `None` means anonymous.
    fn authenticate(&self, headers: &HeaderMap) -> Option<Principal>;

    /// Whether `principal`, authenticated from `headers`, may call `path`.
    fn check_permission(&self, _principal: &Principal, _headers: &HeaderMap, _path: &str) -> bool {
        true
    }
}

struct TokenGrant {
    principal: Principal,
    allowed_paths: Vec<String>,
}

/// Static `Authorization: Bearer <token>` backend.
pub struct BearerTokenAuth {
    grants: HashMap<String, TokenGrant>,
}

impl BearerTokenAuth {
    pub fn new(tokens: &[AuthToken]) -> Self {
        let grants = tokens
            .iter()
            .map(|token| {
                (
                    token.token.clone(),
                    TokenGrant {
                        principal: Principal::new(&token.principal),
                        allowed_paths: token.allowed_paths.clone(),
                    },
                )
            })
            .collect();
        Self { grants }
    }

    /// Grant of the bearer token presented in `headers`.
    fn presented_grant(&self, headers: &HeaderMap) -> Option<&TokenGrant> {
        let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        let (scheme, token) = value.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        self.grants.get(token.trim())
    }
}

impl AuthBackend for BearerTokenAuth {
    fn authenticate(&self, headers: &HeaderMap) -> Option<Principal> {
        self.presented_grant(headers)
            .map(|grant| grant.principal.clone())
    }

    /// Permissions follow the presented token, so two tokens of one
    /// principal keep their own path grants.
    fn check_permission(&self, principal: &Principal, headers: &HeaderMap, path: &str) -> bool {
        let Some(grant) = self.presented_grant(headers) else {
            return false;
        };
        grant.principal == *principal
            && (grant.allowed_paths.is_empty()
                || grant
                    .allowed_paths
                    .iter()
                    .any(|prefix| path.starts_with(prefix.as_str())))
    }
}

/// Authenticate and authorize one request.
///
/// Without a backend, requests pass anonymously unless authentication is
/// required, which is a server misconfiguration.
pub fn authenticate_request(
    backend: Option<&dyn AuthBackend>,
    auth_required: bool,
    headers: &HeaderMap,
    path: &str,
) -> Result<Option<Principal>, ApiError> {
    let Some(backend) = backend else {
        if auth_required {
            return Err(ApiError::request(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication backend is not configured",
            ));
        }
        return Ok(None);
    };

    let principal = backend.authenticate(headers);
    match &principal {
        None if auth_required => Err(ApiError::request(
            StatusCode::UNAUTHORIZED,
            "Authentication required",
        )),
        Some(user) if !backend.check_permission(user, headers, path) => {
            tracing::debug!(principal = %user.id, path, "permission denied");
            Err(ApiError::request(StatusCode::FORBIDDEN, "Permission denied"))
        }
        _ => Ok(principal),
    }
}
