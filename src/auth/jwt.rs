//! JWT token codec
//!
//! The only component that holds the signing secret. Tokens are HS256-signed;
//! the accepted algorithm is pinned in [`Validation`] before any key is consulted.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crate::auth::types::{AuthConfig, JwtClaims, TokenKind, TokenPair};
use crate::auth::utils::AuthUtils;
use crate::error::{AuthError, Result, TokenError};

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl JwtManager {
    /// Create new JWT manager
    pub fn new(config: &AuthConfig) -> Result<Self> {
        if config.jwt_secret.is_empty() {
            return Err(AuthError::config("JWT secret must not be empty"));
        }

        let encoding_key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_audience(&[config.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.leeway = config.leeway;

        Ok(Self {
            encoding_key,
            decoding_key,
            validation,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            access_ttl: Duration::seconds(config.access_token_ttl),
            refresh_ttl: Duration::seconds(config.refresh_token_ttl),
        })
    }

    /// Sign a token carrying the given subject, session and token id.
    pub fn issue(
        &self,
        subject_id: i32,
        session_id: &str,
        token_id: &str,
        kind: TokenKind,
        expires_at: DateTime<Utc>,
    ) -> std::result::Result<String, TokenError> {
        let claims = JwtClaims {
            sub: subject_id.to_string(),
            sid: session_id.to_string(),
            jti: token_id.to_string(),
            typ: kind,
            iat: Utc::now().timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Signing)
    }

    /// Decode and validate a token.
    ///
    /// Signature, algorithm, issuer and audience mismatches all surface as
    /// [`TokenError::InvalidSignature`].
    pub fn verify(&self, token: &str) -> std::result::Result<JwtClaims, TokenError> {
        if token.is_empty() {
            return Err(TokenError::Malformed("empty token".to_string()));
        }

        let data = decode::<JwtClaims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }

    /// Issue an access/refresh pair bound to one session.
    ///
    /// The access token gets a fresh id; the refresh token carries `refresh_jti`,
    /// which the caller persists as the session's current refresh identifier.
    pub fn generate_token_pair(
        &self,
        subject_id: i32,
        session_id: &str,
        refresh_jti: &str,
    ) -> std::result::Result<TokenPair, TokenError> {
        let now = Utc::now();
        let access_expires_at = now + self.access_ttl;

        let access_token = self.issue(
            subject_id,
            session_id,
            &AuthUtils::generate_token_id(),
            TokenKind::Access,
            access_expires_at,
        )?;
        let refresh_token = self.issue(
            subject_id,
            session_id,
            refresh_jti,
            TokenKind::Refresh,
            now + self.refresh_ttl,
        )?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at,
        })
    }

    /// Access token lifetime in seconds
    #[must_use]
    pub const fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl.num_seconds()
    }
}
