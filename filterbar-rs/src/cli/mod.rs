//! CLI command implementations.

pub mod args;
pub mod check;
pub mod convert;
pub mod output;
pub mod replay;

use crate::config::Config;
use crate::error::{FilterError, Result};
use crate::schema::FilterSchema;
use std::path::Path;

/// Resolve and load the schema for a command: the explicit argument wins,
/// then the configured default.
pub(crate) fn load_schema(config: &Config, explicit: Option<&Path>) -> Result<FilterSchema> {
    let path = config.resolve_schema_path(explicit).ok_or_else(|| {
        FilterError::ConfigError(
            "No schema file given and no default_schema configured".to_string(),
        )
    })?;
    FilterSchema::load(&path)
}
