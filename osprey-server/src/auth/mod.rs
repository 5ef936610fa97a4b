//! Caller authentication
//!
//! Tokens are issued by the external identity provider; this module only
//! verifies them and exposes the caller's identity to handlers.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use shared::error::AppError;
use shared::models::UserRole;

use crate::state::AppState;

/// JWT claims issued by the identity provider
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Role: customer | merchant | driver | admin
    pub role: String,
    /// Expiration (Unix timestamp seconds)
    pub exp: usize,
    /// Issued at (Unix timestamp seconds)
    pub iat: usize,
}

/// Authenticated caller identity extracted from JWT
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Admin-only gate
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::admin_required())
        }
    }
}

/// Decode and validate a bearer token into an [`AuthUser`]
pub fn decode_token(token: &str, secret: &str) -> Result<AuthUser, AppError> {
    let validation = Validation::default();
    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!("JWT validation failed: {e}");
        AppError::invalid_token("Invalid or expired token")
    })?;

    let role = UserRole::from_db(&token_data.claims.role)
        .ok_or_else(|| AppError::invalid_token("Unknown role claim"))?;

    Ok(AuthUser {
        user_id: token_data.claims.sub,
        role,
    })
}

/// Middleware that extracts and verifies the caller JWT from the
/// Authorization header, inserting [`AuthUser`] as a request extension
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::not_authenticated().into_response())?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::invalid_token("Invalid Authorization format").into_response())?;

    let user = decode_token(token, &state.jwt_secret).map_err(|e| e.into_response())?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header};
    use shared::error::ErrorCode;

    fn make_token(sub: &str, role: &str, secret: &str, exp_offset_secs: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: sub.to_string(),
            role: role.to_string(),
            exp: (now + exp_offset_secs) as usize,
            iat: now as usize,
        };
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_decode_valid_token() {
        let token = make_token("user_1", "driver", "secret", 3600);
        let user = decode_token(&token, "secret").unwrap();
        assert_eq!(user.user_id, "user_1");
        assert_eq!(user.role, UserRole::Driver);
        assert!(!user.is_admin());
    }

    #[test]
    fn test_decode_wrong_secret() {
        let token = make_token("user_1", "admin", "secret", 3600);
        let err = decode_token(&token, "other-secret").unwrap_err();
        assert_eq!(err.code, ErrorCode::TokenInvalid);
    }

    #[test]
    fn test_decode_expired_token() {
        let token = make_token("user_1", "admin", "secret", -3600);
        assert!(decode_token(&token, "secret").is_err());
    }

    #[test]
    fn test_decode_unknown_role() {
        let token = make_token("user_1", "superuser", "secret", 3600);
        let err = decode_token(&token, "secret").unwrap_err();
        assert_eq!(err.code, ErrorCode::TokenInvalid);
    }

    #[test]
    fn test_require_admin() {
        let admin = AuthUser {
            user_id: "a".into(),
            role: UserRole::Admin,
        };
        assert!(admin.require_admin().is_ok());

        let customer = AuthUser {
            user_id: "c".into(),
            role: UserRole::Customer,
        };
        let err = customer.require_admin().unwrap_err();
        assert_eq!(err.code, ErrorCode::AdminRequired);
    }
}
