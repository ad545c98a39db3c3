//! Taxonomy domain: variants, hierarchy population, pagination and the
//! repositories serving them

pub mod diagnostic;
pub mod guard;
pub mod hierarchy_repository;
pub mod model_repository;
pub mod object_type;
pub mod pagination;
pub mod reference;
pub mod registry;
pub mod repository;
pub mod validation;
pub mod view;

pub use diagnostic::{DiagnosticKind, HierarchyDiagnostic};
pub use hierarchy_repository::{HierarchyRepository, NewEdgeSpec};
pub use model_repository::{ModelRepository, NewModelSpec};
pub use object_type::{ObjectType, ParentCardinality, Position, RelationFamily};
pub use pagination::{Cursor, Page};
pub use reference::ReferenceView;
pub use registry::{Repositories, RepositoryRegistry};
pub use repository::{NodeRepository, UUID_PROVIDED};
pub use validation::{NewNodeSpec, ValidationErrors};
pub use view::{EdgeView, ModelView, NodeDocument, NodeView, ParentLink};
