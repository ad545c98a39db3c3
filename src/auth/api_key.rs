//! API key authentication
//!
//! Keys are passed via the X-API-Key header. A configured model-manager key
//! grants write access for automation that cannot obtain a JWT.

use crate::auth::PermissionLevel;

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone)]
pub struct ApiKeyValidator {
    model_manager_key: Option<String>,
}

impl ApiKeyValidator {
    pub fn new(model_manager_key: Option<String>) -> Self {
        Self {
            model_manager_key: model_manager_key.filter(|k| !k.is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.model_manager_key.is_some()
    }

    /// Permission granted by `api_key`.
    ///
    /// No key means anonymous access; an unknown key is rejected with `None`.
    pub fn validate(&self, api_key: Option<&str>) -> Option<PermissionLevel> {
        match api_key.filter(|k| !k.is_empty()) {
            Some(key) => match self.model_manager_key {
                Some(ref expected) if constant_time_compare(key, expected) => {
                    Some(PermissionLevel::ModelManager)
                }
                _ => None,
            },
            None => Some(PermissionLevel::Anonymous),
        }
    }
}

/// Constant-time string comparison
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_key_configured() {
        let validator = ApiKeyValidator::new(None);
        assert!(!validator.is_configured());
        assert_eq!(validator.validate(None), Some(PermissionLevel::Anonymous));
        assert_eq!(validator.validate(Some("any-key")), None);
    }

    #[test]
    fn test_model_manager_key() {
        let validator = ApiKeyValidator::new(Some("manager-secret".into()));
        assert!(validator.is_configured());
        assert_eq!(
            validator.validate(Some("manager-secret")),
            Some(PermissionLevel::ModelManager)
        );
        assert_eq!(validator.validate(Some("wrong-key")), None);
        assert_eq!(validator.validate(Some("")), Some(PermissionLevel::Anonymous));
    }

    #[test]
    fn test_empty_key_treated_as_none() {
        assert!(!ApiKeyValidator::new(Some("".into())).is_configured());
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "hell"));
    }
}
