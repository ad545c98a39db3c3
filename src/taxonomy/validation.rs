//! Field constraints for taxonomy nodes
//!
//! Validation collects every violation of an item rather than stopping at the
//! first, so a rejected batch entry can be reported in full.

use bson::oid::ObjectId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::taxonomy::ObjectType;

pub const PREFERRED_LABEL_MAX: usize = 256;
pub const ALT_LABEL_MAX: usize = 256;
pub const DESCRIPTION_MAX: usize = 4000;
pub const CODE_MAX: usize = 64;

static OCCUPATION_GROUP_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,4}$").expect("valid regex"));

static OCCUPATION_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}(?:\.\d+)+$").expect("valid regex"));

static SKILL_GROUP_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z](?:\d+(?:\.\d+)*)?$").expect("valid regex"));

/// Body of a node create request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNodeSpec {
    /// Server-assigned; present only so that supplying it can be refused
    #[serde(rename = "UUID", default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    #[serde(rename = "UUIDHistory", default)]
    pub uuid_history: Vec<String>,

    #[serde(default)]
    pub code: String,

    #[serde(default)]
    pub preferred_label: String,

    #[serde(default)]
    pub alt_labels: Vec<String>,

    #[serde(default)]
    pub description: String,

    /// Filled from the request path when absent
    #[serde(default)]
    pub model_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_id: Option<String>,
}

/// One failed constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// All violations found on one item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors(pub Vec<FieldViolation>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn violations(&self) -> &[FieldViolation] {
        &self.0
    }

    fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldViolation::new(field, message));
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|v| format!("{}: {}", v.field, v.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

/// Check a code against the format of its variant
pub fn code_matches(object_type: ObjectType, code: &str) -> bool {
    match object_type {
        ObjectType::OccupationGroup => OCCUPATION_GROUP_CODE.is_match(code),
        ObjectType::Occupation => OCCUPATION_CODE.is_match(code),
        ObjectType::SkillGroup => SKILL_GROUP_CODE.is_match(code),
        ObjectType::Skill => {
            !code.is_empty()
                && code.chars().count() <= CODE_MAX
                && !code.chars().any(char::is_whitespace)
        }
    }
}

fn code_format(object_type: ObjectType) -> &'static str {
    match object_type {
        ObjectType::OccupationGroup => "1 to 4 digits",
        ObjectType::Occupation => "a 4 digit group code followed by .N segments",
        ObjectType::SkillGroup => "an uppercase letter optionally followed by N(.N)* segments",
        ObjectType::Skill => "a non-empty token without whitespace",
    }
}

pub fn is_uuid(value: &str) -> bool {
    uuid::Uuid::parse_str(value).is_ok()
}

/// Validate a create request for `object_type`, returning the parsed model id
pub fn validate_node_spec(
    object_type: ObjectType,
    spec: &NewNodeSpec,
) -> Result<ObjectId, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    if !code_matches(object_type, &spec.code) {
        errors.push(
            "code",
            format!(
                "'{}' is not a valid {} code, expected {}",
                spec.code,
                object_type,
                code_format(object_type)
            ),
        );
    }

    let label_len = spec.preferred_label.chars().count();
    if label_len == 0 {
        errors.push("preferredLabel", "is required");
    } else if label_len > PREFERRED_LABEL_MAX {
        errors.push(
            "preferredLabel",
            format!("must be <= {} characters", PREFERRED_LABEL_MAX),
        );
    }

    for (i, label) in spec.alt_labels.iter().enumerate() {
        if label.chars().count() > ALT_LABEL_MAX {
            errors.push(
                format!("altLabels[{}]", i),
                format!("must be <= {} characters", ALT_LABEL_MAX),
            );
        }
    }

    if spec.description.chars().count() > DESCRIPTION_MAX {
        errors.push(
            "description",
            format!("must be <= {} characters", DESCRIPTION_MAX),
        );
    }

    for (i, entry) in spec.uuid_history.iter().enumerate() {
        if !is_uuid(entry) {
            errors.push(
                format!("UUIDHistory[{}]", i),
                format!("'{}' is not a valid UUID", entry),
            );
        }
    }

    let model_id = match ObjectId::parse_str(&spec.model_id) {
        Ok(id) => Some(id),
        Err(_) => {
            errors.push(
                "modelId",
                format!("'{}' is not a valid ObjectId", spec.model_id),
            );
            None
        }
    };

    match model_id {
        Some(id) if errors.is_empty() => Ok(id),
        _ => Err(errors),
    }
}
