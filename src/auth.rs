//! JWT verification and request authentication.
//!
//! Token issuance lives in an external auth service; this module only
//! verifies externally issued tokens and exposes the claims to handlers.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role names used by RBAC checks
pub mod roles {
    pub const ADMIN: &str = "admin";
    pub const MANAGER: &str = "manager";
    pub const STAFF: &str = "staff";
}

/// Claim structure for externally issued JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Organization the token is scoped to
    pub org: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// Authenticated user data extracted from the JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub roles: Vec<String>,
}

impl AuthUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(roles::ADMIN)
    }

    /// Managers and admins may approve bookings and change settings.
    pub fn can_manage(&self) -> bool {
        self.is_admin() || self.has_role(roles::MANAGER)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Token expired")]
    Expired,
    #[error("Insufficient permissions")]
    InsufficientPermissions,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AuthError::MissingAuth => (StatusCode::UNAUTHORIZED, "AUTH_MISSING"),
            AuthError::InvalidToken(_) => (StatusCode::UNAUTHORIZED, "AUTH_INVALID_TOKEN"),
            AuthError::Expired => (StatusCode::UNAUTHORIZED, "AUTH_TOKEN_EXPIRED"),
            AuthError::InsufficientPermissions => (StatusCode::FORBIDDEN, "AUTH_FORBIDDEN"),
        };

        let body = Json(serde_json::json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Verifies externally issued JWTs against the configured secret/issuer/audience.
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str, issuer: &str, audience: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken(e.to_string()),
            }
        })?;

        let claims = data.claims;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AuthError::InvalidToken("subject is not a UUID".to_string()))?;
        let organization_id = Uuid::parse_str(&claims.org)
            .map_err(|_| AuthError::InvalidToken("org claim is not a UUID".to_string()))?;

        Ok(AuthUser {
            user_id,
            organization_id,
            name: claims.name,
            email: claims.email,
            roles: claims.roles,
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let verifier = parts
            .extensions
            .get::<TokenVerifier>()
            .cloned()
            .ok_or(AuthError::MissingAuth)?;

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::MissingAuth)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .ok_or(AuthError::MissingAuth)?;

        verifier.verify(token)
    }
}

/// Issue a token for tests and local tooling.
pub fn issue_token_for_tests(
    secret: &str,
    issuer: &str,
    audience: &str,
    user_id: Uuid,
    organization_id: Uuid,
    roles: Vec<String>,
) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        org: organization_id.to_string(),
        name: None,
        email: None,
        roles,
        iat: now,
        exp: now + 3600,
        iss: issuer.to_string(),
        aud: audience.to_string(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("test token encoding")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret-key-0123456789-0123456789";
    const ISS: &str = "crewdeck-auth";
    const AUD: &str = "crewdeck-api";

    #[test]
    fn verifies_a_valid_token() {
        let user_id = Uuid::new_v4();
        let org_id = Uuid::new_v4();
        let token = issue_token_for_tests(
            SECRET,
            ISS,
            AUD,
            user_id,
            org_id,
            vec![roles::MANAGER.to_string()],
        );

        let verifier = TokenVerifier::new(SECRET, ISS, AUD);
        let user = verifier.verify(&token).expect("token should verify");
        assert_eq!(user.user_id, user_id);
        assert_eq!(user.organization_id, org_id);
        assert!(user.can_manage());
        assert!(!user.is_admin());
    }

    #[test]
    fn rejects_wrong_audience() {
        let token = issue_token_for_tests(
            SECRET,
            ISS,
            "other-audience",
            Uuid::new_v4(),
            Uuid::new_v4(),
            vec![],
        );
        let verifier = TokenVerifier::new(SECRET, ISS, AUD);
        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn rejects_tampered_token() {
        let token = issue_token_for_tests(
            SECRET,
            ISS,
            AUD,
            Uuid::new_v4(),
            Uuid::new_v4(),
            vec![],
        );
        let verifier = TokenVerifier::new("another-secret-key-entirely-for-this", ISS, AUD);
        assert!(verifier.verify(&token).is_err());
    }
}
