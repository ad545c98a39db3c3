//! Shared types

pub mod error;

pub use error::{redact_credentials, ModelCheckError, Result, TaxonomyError};
