use axum::http::{HeaderMap, header};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use courier_types::api::{Claims, Role, TokenPair};

use crate::error::AuthError;

/// Selects the expiry offset embedded at issue time. The payload shape is
/// identical for both purposes; only `exp` differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    Access,
    Refresh,
}

impl TokenPurpose {
    pub fn ttl(self) -> Duration {
        match self {
            TokenPurpose::Access => Duration::minutes(30),
            TokenPurpose::Refresh => Duration::minutes(180),
        }
    }
}

/// Claims decoded from a verified token. Owned by the requesting call for
/// its duration only, never cached server-side.
#[derive(Debug, Clone)]
pub struct Credential {
    claims: Claims,
}

impl Credential {
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// The role claim, if the token carries one. Membership checks treat
    /// an absent role as "member of nothing".
    pub fn role_claim(&self) -> Option<Role> {
        self.claims.role
    }

    pub fn user_id(&self) -> Result<i64, AuthError> {
        self.claims
            .id
            .as_deref()
            .filter(|id| !id.is_empty())
            .and_then(|id| id.parse().ok())
            .ok_or(AuthError::MissingClaim("id"))
    }

    pub fn role(&self) -> Result<Role, AuthError> {
        self.claims.role.ok_or(AuthError::MissingClaim("role"))
    }

    pub fn email(&self) -> Result<&str, AuthError> {
        self.claims
            .email
            .as_deref()
            .filter(|email| !email.is_empty())
            .ok_or(AuthError::MissingClaim("email"))
    }

    pub fn is_superuser(&self) -> bool {
        self.claims.is_superuser.unwrap_or(false)
    }

    pub fn expires_at(&self) -> i64 {
        self.claims.exp
    }
}

/// Signs and verifies the compact self-contained credentials used for both
/// the REST surface and the WebSocket handshake. Stateless: every decode is
/// independently verifiable against the process-wide secret, so no
/// server-side session store exists.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &str, algorithm: Algorithm) -> Self {
        let mut validation = Validation::new(algorithm);
        // Expired means expired; no grace window.
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            algorithm,
            validation,
        }
    }

    /// Issue a token expiring at `now + ttl`. Callers normally pass
    /// `TokenPurpose::{Access,Refresh}.ttl()`; with no explicit ttl the
    /// token lives 15 minutes.
    pub fn issue(
        &self,
        subject_id: &str,
        role: Role,
        is_superuser: bool,
        email: Option<&str>,
        ttl: Option<Duration>,
    ) -> Result<String, AuthError> {
        let expire = Utc::now() + ttl.unwrap_or_else(|| Duration::minutes(15));
        let claims = Claims {
            exp: expire.timestamp(),
            id: Some(subject_id.to_string()),
            role: Some(role),
            is_superuser: Some(is_superuser),
            email: email.map(str::to_string),
        };
        encode(&Header::new(self.algorithm), &claims, &self.encoding).map_err(|e| {
            tracing::error!("token signing failed: {}", e);
            AuthError::Signing
        })
    }

    /// A fresh access + refresh pair for the same subject.
    pub fn issue_pair(
        &self,
        subject_id: &str,
        role: Role,
        is_superuser: bool,
        email: Option<&str>,
    ) -> Result<TokenPair, AuthError> {
        let access = self.issue(
            subject_id,
            role,
            is_superuser,
            email,
            Some(TokenPurpose::Access.ttl()),
        )?;
        let refresh = self.issue(
            subject_id,
            role,
            is_superuser,
            email,
            Some(TokenPurpose::Refresh.ttl()),
        )?;
        Ok(TokenPair { access, refresh })
    }

    /// Verify signature and expiry. Any structural, signature, or expiry
    /// failure collapses to `InvalidToken`; callers only learn that the
    /// credential is unusable.
    pub fn decode(&self, token: &str) -> Result<Credential, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|_| AuthError::InvalidToken)?;
        Ok(Credential { claims: data.claims })
    }

    /// Refresh protocol: decode the submitted refresh token, require the
    /// claims needed to mint a new pair, and reissue. A token that decodes
    /// but lacks `id`, `role`, or `is_superuser` is rejected without
    /// issuing anything.
    pub fn refresh(&self, token: &str) -> Result<TokenPair, AuthError> {
        let credential = self.decode(token)?;
        let claims = credential.claims();
        match (claims.id.as_deref(), claims.role, claims.is_superuser) {
            (Some(id), Some(role), Some(is_superuser)) if !id.is_empty() => {
                self.issue_pair(id, role, is_superuser, None)
            }
            _ => Err(AuthError::IncompleteRefreshClaims),
        }
    }
}

/// Pull the bearer token out of an `Authorization` header. The header must
/// be present, the scheme must be `Bearer`, and the value must split into
/// exactly two parts.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingAuthorization)?;
    let parts: Vec<&str> = value.split(' ').collect();
    if parts[0] != "Bearer" {
        return Err(AuthError::NotBearer);
    }
    match parts.as_slice() {
        ["Bearer", token] => Ok(token),
        _ => Err(AuthError::MalformedHeader),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde::Serialize;

    const SECRET: &str = "unit-test-secret";

    fn codec() -> TokenCodec {
        TokenCodec::new(SECRET, Algorithm::HS256)
    }

    /// Sign an arbitrary payload with the codec's secret, bypassing
    /// `issue` so individual claims can be omitted.
    fn raw_token<T: Serialize>(payload: &T) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            payload,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn roundtrip_preserves_claims() {
        let codec = codec();
        let token = codec
            .issue("1", Role::User, false, Some("a@b.cc"), Some(Duration::minutes(30)))
            .unwrap();
        let credential = codec.decode(&token).unwrap();

        assert_eq!(credential.user_id().unwrap(), 1);
        assert_eq!(credential.role().unwrap(), Role::User);
        assert_eq!(credential.email().unwrap(), "a@b.cc");
        assert!(!credential.is_superuser());
    }

    #[test]
    fn expired_token_is_invalid() {
        let codec = codec();
        let token = codec
            .issue("1", Role::User, false, None, Some(Duration::minutes(-5)))
            .unwrap();
        assert!(matches!(codec.decode(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let codec = codec();
        let other = TokenCodec::new("different-secret", Algorithm::HS256);
        let token = codec.issue("1", Role::User, false, None, None).unwrap();
        assert!(matches!(other.decode(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn missing_id_claim_is_a_field_error() {
        #[derive(Serialize)]
        struct NoId {
            exp: i64,
            role: Role,
        }
        let token = raw_token(&NoId {
            exp: (Utc::now() + Duration::minutes(5)).timestamp(),
            role: Role::User,
        });
        let credential = codec().decode(&token).unwrap();
        assert_eq!(credential.user_id(), Err(AuthError::MissingClaim("id")));
        assert_eq!(credential.role().unwrap(), Role::User);
    }

    #[test]
    fn refresh_reissues_a_pair() {
        let codec = codec();
        let refresh = codec
            .issue("42", Role::Administrator, true, None, Some(TokenPurpose::Refresh.ttl()))
            .unwrap();
        let pair = codec.refresh(&refresh).unwrap();

        let access = codec.decode(&pair.access).unwrap();
        assert_eq!(access.user_id().unwrap(), 42);
        assert_eq!(access.role().unwrap(), Role::Administrator);
        assert!(access.is_superuser());
        assert!(codec.decode(&pair.refresh).is_ok());
    }

    #[test]
    fn refresh_without_role_is_rejected() {
        #[derive(Serialize)]
        struct NoRole {
            exp: i64,
            id: String,
            is_superuser: bool,
        }
        let token = raw_token(&NoRole {
            exp: (Utc::now() + Duration::minutes(5)).timestamp(),
            id: "1".into(),
            is_superuser: false,
        });
        assert_eq!(
            codec().refresh(&token),
            Err(AuthError::IncompleteRefreshClaims)
        );
    }

    #[test]
    fn bearer_header_edge_cases() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), Err(AuthError::MissingAuthorization));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Token abc"));
        assert_eq!(bearer_token(&headers), Err(AuthError::NotBearer));

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer a b"),
        );
        assert_eq!(bearer_token(&headers), Err(AuthError::MalformedHeader));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Ok("abc"));
    }
}
