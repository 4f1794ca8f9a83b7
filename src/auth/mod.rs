//! Bearer-token authentication for the admin API.
//!
//! Staff tokens are HS256 JWTs carrying a permission list. Every admin route is
//! wrapped with [`AuthRouterExt::with_permission`]: a missing or invalid token is
//! rejected with 401, a valid token without the route's permission with 403.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::ServiceError;

pub mod permissions;

pub use permissions::consts;

/// JWT claims issued to back-office staff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// Authenticated staff member, placed in request extensions by [`auth_middleware`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUser {
    pub user_id: String,
    pub name: Option<String>,
    pub permissions: Vec<String>,
}

impl AdminUser {
    /// `*` grants everything, `area:*` grants every action in one area.
    pub fn has_permission(&self, required: &str) -> bool {
        let area = required.split(':').next().unwrap_or(required);
        self.permissions.iter().any(|p| {
            p == "*" || p == required || p.strip_suffix(":*").map_or(false, |a| a == area)
        })
    }
}

#[derive(Clone)]
pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl AuthService {
    pub fn new(secret: &str, issuer: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
        }
    }

    /// Issues a token for a staff member; used by tooling and tests.
    pub fn issue_token(
        &self,
        user_id: &str,
        permissions: &[&str],
        ttl: chrono::Duration,
    ) -> Result<String, ServiceError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            name: None,
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            iss: self.issuer.clone(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::InternalError(format!("token encoding failed: {}", e)))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, ServiceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("token rejected: {}", e);
                ServiceError::Unauthorized("invalid or expired token".to_string())
            })
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Validates the bearer token and stores the [`AdminUser`] in request extensions
pub async fn auth_middleware(
    State(auth): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match bearer_token(request.headers()) {
        Some(token) => token.to_string(),
        None => {
            return ServiceError::Unauthorized("missing bearer token".to_string()).into_response()
        }
    };

    match auth.validate_token(&token) {
        Ok(claims) => {
            request.extensions_mut().insert(AdminUser {
                user_id: claims.sub,
                name: claims.name,
                permissions: claims.permissions,
            });
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Rejects requests whose user lacks the required permission
pub async fn permission_middleware(
    State(required_permission): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let user = request
        .extensions()
        .get::<AdminUser>()
        .cloned()
        .ok_or_else(|| ServiceError::Unauthorized("missing bearer token".to_string()))?;

    if !user.has_permission(&required_permission) {
        warn!(
            user = %user.user_id,
            permission = %required_permission,
            "permission denied"
        );
        return Err(ServiceError::Forbidden("no access".to_string()));
    }

    Ok(next.run(request).await)
}

/// Extension trait to guard a router with authentication and a permission
pub trait AuthRouterExt {
    fn with_permission(self, auth: Arc<AuthService>, permission: &str) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_permission(self, auth: Arc<AuthService>, permission: &str) -> Self {
        // Layers run outermost-last: authentication wraps the permission check.
        self.layer(axum::middleware::from_fn_with_state(
            permission.to_string(),
            permission_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(auth, auth_middleware))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService::new("0123456789abcdef0123456789abcdef", "storefront-admin")
    }

    #[test]
    fn issued_token_validates() {
        let auth = service();
        let token = auth
            .issue_token("staff-1", &[consts::ORDERS_MANAGE], chrono::Duration::minutes(5))
            .unwrap();
        let claims = auth.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "staff-1");
        assert_eq!(claims.permissions, vec!["orders:manage".to_string()]);
    }

    #[test]
    fn token_from_other_issuer_is_rejected() {
        let other = AuthService::new("0123456789abcdef0123456789abcdef", "someone-else");
        let token = other
            .issue_token("x", &[], chrono::Duration::minutes(5))
            .unwrap();
        assert!(matches!(
            service().validate_token(&token),
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[test]
    fn wildcard_permissions() {
        let user = AdminUser {
            user_id: "u".into(),
            name: None,
            permissions: vec!["catalog:*".into()],
        };
        assert!(user.has_permission("catalog:manage"));
        assert!(!user.has_permission("orders:manage"));

        let root = AdminUser {
            permissions: vec!["*".into()],
            ..user
        };
        assert!(root.has_permission("reports:read"));
    }
}
