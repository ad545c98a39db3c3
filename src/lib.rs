//! Taxonomy API - occupation and skill taxonomies over MongoDB
//!
//! Serves ESCO-style models: occupation groups, occupations, skill groups and
//! skills, each linked into a hierarchy by typed parent/child edges.
//!
//! ## Layers
//!
//! - **db**: MongoDB collections and an in-memory store behind one trait
//! - **taxonomy**: validation, hierarchy population, pagination, repositories
//! - **routes** / **server**: the HTTP surface
//! - **auth**: JWT and API-key permission levels

pub mod auth;
pub mod config;
pub mod db;
pub mod routes;
pub mod server;
pub mod taxonomy;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{Result, TaxonomyError};
