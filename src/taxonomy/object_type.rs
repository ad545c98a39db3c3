//! Taxonomy variants and the relation families that connect them
//!
//! Every variant lives in its own collection, so an `_id` only identifies a
//! node together with the collection it was read from.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminator stored on every node as `objectType`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectType {
    OccupationGroup,
    Occupation,
    SkillGroup,
    Skill,
}

impl ObjectType {
    pub const ALL: [ObjectType; 4] = [
        ObjectType::OccupationGroup,
        ObjectType::Occupation,
        ObjectType::SkillGroup,
        ObjectType::Skill,
    ];

    /// MongoDB collection holding this variant
    pub fn collection_name(&self) -> &'static str {
        match self {
            Self::OccupationGroup => "occupationgroups",
            Self::Occupation => "occupations",
            Self::SkillGroup => "skillgroups",
            Self::Skill => "skills",
        }
    }

    /// Reverse of [`collection_name`](Self::collection_name)
    pub fn from_collection_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.collection_name() == name)
    }

    /// Path segment used by the HTTP API
    pub fn route_segment(&self) -> &'static str {
        match self {
            Self::OccupationGroup => "occupationGroups",
            Self::Occupation => "occupations",
            Self::SkillGroup => "skillGroups",
            Self::Skill => "skills",
        }
    }

    pub fn from_route_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.route_segment() == segment)
    }

    /// Name prefix for the repository serving this variant
    pub fn repository_name(&self) -> &'static str {
        match self {
            Self::OccupationGroup => "OccupationGroupRepository",
            Self::Occupation => "OccupationRepository",
            Self::SkillGroup => "SkillGroupRepository",
            Self::Skill => "SkillRepository",
        }
    }

    pub fn family(&self) -> RelationFamily {
        match self {
            Self::OccupationGroup | Self::Occupation => RelationFamily::Occupations,
            Self::SkillGroup | Self::Skill => RelationFamily::Skills,
        }
    }

    fn article(&self) -> &'static str {
        match self {
            Self::OccupationGroup | Self::Occupation => "an",
            Self::SkillGroup | Self::Skill => "a",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OccupationGroup => "OccupationGroup",
            Self::Occupation => "Occupation",
            Self::SkillGroup => "SkillGroup",
            Self::Skill => "Skill",
        };
        f.write_str(name)
    }
}

/// Which end of a hierarchy edge a document sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Position {
    Parent,
    Child,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parent => f.write_str("Parent"),
            Self::Child => f.write_str("Child"),
        }
    }
}

/// How many containing nodes a family exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentCardinality {
    /// `parent: Reference | null`
    Single,
    /// `parents: Reference[]`
    Many,
}

/// A group variant plus the leaf variant it classifies, sharing one edge
/// collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationFamily {
    Occupations,
    Skills,
}

impl RelationFamily {
    pub const ALL: [RelationFamily; 2] = [RelationFamily::Occupations, RelationFamily::Skills];

    pub fn group_type(&self) -> ObjectType {
        match self {
            Self::Occupations => ObjectType::OccupationGroup,
            Self::Skills => ObjectType::SkillGroup,
        }
    }

    pub fn leaf_type(&self) -> ObjectType {
        match self {
            Self::Occupations => ObjectType::Occupation,
            Self::Skills => ObjectType::Skill,
        }
    }

    /// Collection holding this family's hierarchy edges
    pub fn edge_collection_name(&self) -> &'static str {
        match self {
            Self::Occupations => "occupationhierarchies",
            Self::Skills => "skillhierarchies",
        }
    }

    pub fn route_segment(&self) -> &'static str {
        match self {
            Self::Occupations => "occupations",
            Self::Skills => "skills",
        }
    }

    pub fn from_route_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.route_segment() == segment)
    }

    pub fn parent_cardinality(&self) -> ParentCardinality {
        match self {
            Self::Occupations => ParentCardinality::Single,
            Self::Skills => ParentCardinality::Many,
        }
    }

    /// Variants allowed at an edge position. Parents are always groups;
    /// children may be groups or leaves.
    pub fn permitted(&self, position: Position) -> Vec<ObjectType> {
        match position {
            Position::Parent => vec![self.group_type()],
            Position::Child => vec![self.group_type(), self.leaf_type()],
        }
    }

    pub fn permits(&self, position: Position, object_type: ObjectType) -> bool {
        self.permitted(position).contains(&object_type)
    }

    /// "an OccupationGroup" / "an OccupationGroup or Occupation"
    pub fn describe_permitted(&self, position: Position) -> String {
        let permitted = self.permitted(position);
        let names: Vec<String> = permitted.iter().map(|t| t.to_string()).collect();
        format!("{} {}", permitted[0].article(), names.join(" or "))
    }
}

impl fmt::Display for RelationFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Occupations => f.write_str("OccupationHierarchy"),
            Self::Skills => f.write_str("SkillHierarchy"),
        }
    }
}
