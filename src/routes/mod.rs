//! HTTP routes for the taxonomy API

pub mod api;
pub mod health;
pub mod hierarchies;
pub mod models;
pub mod nodes;

pub use api::{error_response, json_response, ApiRoute};
pub use health::health_check;
pub use hierarchies::handle_create_hierarchy;
pub use models::{handle_create_model, handle_list_models};
pub use nodes::{handle_create_node, handle_get_node, handle_list_nodes};
