//! JWT bearer tokens
//!
//! Tokens are signed with HS256 and carry the caller's permission level.
//! Outside dev mode `JWT_SECRET` must be a strong random value.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::PermissionLevel;
use crate::types::TaxonomyError;

/// Minimum accepted secret length
pub const MIN_SECRET_LEN: usize = 32;

/// Payload stored in JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User identifier
    pub sub: String,
    /// Permission level granted
    pub permission_level: PermissionLevel,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Result of token validation
#[derive(Debug)]
pub struct TokenValidationResult {
    pub valid: bool,
    pub claims: Option<Claims>,
    pub error: Option<String>,
}

impl TokenValidationResult {
    pub fn valid(claims: Claims) -> Self {
        Self {
            valid: true,
            claims: Some(claims),
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            claims: None,
            error: Some(error.into()),
        }
    }
}

/// JWT validator and generator
#[derive(Clone)]
pub struct JwtValidator {
    secret: String,
    expiry_seconds: u64,
}

impl JwtValidator {
    /// Returns an error if the secret is empty or too short
    pub fn new(secret: String, expiry_seconds: u64) -> Result<Self, TaxonomyError> {
        if secret.is_empty() {
            return Err(TaxonomyError::Config(
                "JWT_SECRET is required in production mode".into(),
            ));
        }

        if secret.len() < MIN_SECRET_LEN {
            return Err(TaxonomyError::Config(format!(
                "JWT_SECRET must be at least {} characters",
                MIN_SECRET_LEN
            )));
        }

        Ok(Self {
            secret,
            expiry_seconds,
        })
    }

    /// Validator for dev mode (fixed secret)
    pub fn new_dev() -> Self {
        Self {
            secret: "dev-mode-secret-not-for-production-use-123456".into(),
            expiry_seconds: 3600,
        }
    }

    /// Issue a token for `subject`
    pub fn generate_token(
        &self,
        subject: &str,
        permission_level: PermissionLevel,
    ) -> Result<String, TaxonomyError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| TaxonomyError::Auth(format!("System time error: {}", e)))?
            .as_secs();

        let claims = Claims {
            sub: subject.to_string(),
            permission_level,
            iat: now,
            exp: now + self.expiry_seconds,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| TaxonomyError::Auth(format!("Failed to generate token: {}", e)))
    }

    /// Verify and decode a JWT token
    pub fn verify_token(&self, token: &str) -> TokenValidationResult {
        let validation = Validation::default();

        match decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        ) {
            Ok(token_data) => TokenValidationResult::valid(token_data.claims),
            Err(err) => {
                use jsonwebtoken::errors::ErrorKind;
                let error_msg = match err.kind() {
                    ErrorKind::ExpiredSignature => "Token expired",
                    ErrorKind::InvalidToken => "Invalid token",
                    ErrorKind::InvalidSignature => "Invalid signature",
                    _ => "Token validation failed",
                };
                TokenValidationResult::invalid(error_msg)
            }
        }
    }
}

/// Extract token from Authorization header ("Bearer <token>")
pub fn extract_token_from_header(auth_header: Option<&str>) -> Option<&str> {
    let token = auth_header?.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
