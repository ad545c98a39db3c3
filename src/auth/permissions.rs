//! Permission levels and the operations they unlock

use serde::{Deserialize, Serialize};
use std::fmt;

/// Roles recognised by the API, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum PermissionLevel {
    /// No credentials - read operations
    #[default]
    Anonymous = 0,
    /// Signed-in user - read operations
    RegisteredUser = 1,
    /// May create models, nodes and hierarchy edges
    ModelManager = 2,
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionLevel::Anonymous => write!(f, "ANONYMOUS"),
            PermissionLevel::RegisteredUser => write!(f, "REGISTERED_USER"),
            PermissionLevel::ModelManager => write!(f, "MODEL_MANAGER"),
        }
    }
}

/// Operations exposed over HTTP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListModels,
    CreateModel,
    ListNodes,
    GetNode,
    CreateNode,
    CreateHierarchy,
}

impl Operation {
    pub fn required_permission(&self) -> PermissionLevel {
        match self {
            Self::ListModels | Self::ListNodes | Self::GetNode => PermissionLevel::Anonymous,
            Self::CreateModel | Self::CreateNode | Self::CreateHierarchy => {
                PermissionLevel::ModelManager
            }
        }
    }

    /// Human-readable description for logging
    pub fn description(&self) -> &'static str {
        match self {
            Self::ListModels => "List models",
            Self::CreateModel => "Create model",
            Self::ListNodes => "List taxonomy nodes",
            Self::GetNode => "Get taxonomy node",
            Self::CreateNode => "Create taxonomy node",
            Self::CreateHierarchy => "Create hierarchy edges",
        }
    }
}

/// Check if an operation is allowed for the given permission level
pub fn is_operation_allowed(operation: Operation, level: PermissionLevel) -> bool {
    level >= operation.required_permission()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_are_public() {
        for op in [Operation::ListModels, Operation::ListNodes, Operation::GetNode] {
            assert!(is_operation_allowed(op, PermissionLevel::Anonymous));
        }
    }

    #[test]
    fn test_writes_need_model_manager() {
        for op in [
            Operation::CreateModel,
            Operation::CreateNode,
            Operation::CreateHierarchy,
        ] {
            assert!(!is_operation_allowed(op, PermissionLevel::Anonymous));
            assert!(!is_operation_allowed(op, PermissionLevel::RegisteredUser));
            assert!(is_operation_allowed(op, PermissionLevel::ModelManager));
        }
    }

    #[test]
    fn test_permission_ordering() {
        assert!(PermissionLevel::ModelManager > PermissionLevel::RegisteredUser);
        assert!(PermissionLevel::RegisteredUser > PermissionLevel::Anonymous);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&PermissionLevel::ModelManager).unwrap(),
            "\"MODEL_MANAGER\""
        );
        let level: PermissionLevel = serde_json::from_str("\"REGISTERED_USER\"").unwrap();
        assert_eq!(level, PermissionLevel::RegisteredUser);
    }
}
