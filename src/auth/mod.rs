//! Authentication and authorization
//!
//! Provides:
//! - JWT bearer token validation
//! - API key authentication for automation
//! - Permission levels gating write operations

pub mod api_key;
pub mod jwt;
pub mod permissions;

pub use api_key::{ApiKeyValidator, API_KEY_HEADER};
pub use jwt::{extract_token_from_header, Claims, JwtValidator, TokenValidationResult};
pub use permissions::{is_operation_allowed, Operation, PermissionLevel};

use crate::types::TaxonomyError;

/// Credentials and dev-mode switch used to resolve a caller's permission
#[derive(Clone)]
pub struct Authenticator {
    jwt: JwtValidator,
    api_keys: ApiKeyValidator,
    dev_mode: bool,
}

impl Authenticator {
    pub fn new(jwt: JwtValidator, api_keys: ApiKeyValidator, dev_mode: bool) -> Self {
        Self {
            jwt,
            api_keys,
            dev_mode,
        }
    }

    /// Resolve the caller's permission from the Authorization and X-API-Key
    /// headers. Invalid credentials are an error, missing ones are anonymous.
    pub fn permission(
        &self,
        authorization: Option<&str>,
        api_key: Option<&str>,
    ) -> Result<PermissionLevel, TaxonomyError> {
        if self.dev_mode {
            return Ok(PermissionLevel::ModelManager);
        }

        if let Some(token) = extract_token_from_header(authorization) {
            let result = self.jwt.verify_token(token);
            return match result.claims {
                Some(claims) if result.valid => Ok(claims.permission_level),
                _ => Err(TaxonomyError::Unauthorized(
                    result.error.unwrap_or_else(|| "Invalid token".into()),
                )),
            };
        }

        self.api_keys
            .validate(api_key)
            .ok_or_else(|| TaxonomyError::Unauthorized("Invalid API key".into()))
    }

    /// Fail unless `level` may perform `operation`
    pub fn authorize(
        &self,
        operation: Operation,
        level: PermissionLevel,
    ) -> Result<(), TaxonomyError> {
        if is_operation_allowed(operation, level) {
            return Ok(());
        }
        if level == PermissionLevel::Anonymous {
            Err(TaxonomyError::Unauthorized(format!(
                "{} requires authentication",
                operation.description()
            )))
        } else {
            Err(TaxonomyError::Forbidden(format!(
                "{} requires {} permission",
                operation.description(),
                operation.required_permission()
            )))
        }
    }
}
