//! Filterbar - a headless filter-expression builder core.
//!
//! # Overview
//!
//! Filterbar provides the interaction logic behind a token-based filter
//! input, with no rendering of its own:
//! - Schema model: fields, per-field operators, value constraints
//! - Suggestion engine: static, enum, numeric, date, async, combined and
//!   cached autocompleters
//! - Validation engine: per-expression, list-level and schema checks
//! - Build state machine: field → operator → value → connector entry with
//!   commit/cancel semantics, freeform fields and multi-value operators
//! - Token-selection layer: arrow traversal, in-place edits, deletion
//! - Serialization adapters: wire format, query strings, display strings
//!
//! The host owns the expression list (controlled-component idiom): the
//! builder is handed the current list with every event and returns the new
//! list only when a committed mutation occurred.
//!
//! # Example
//!
//! ```
//! use filterbar::{
//!     FieldConfig, FieldType, FilterBuilder, FilterSchema, InputEvent, OperatorConfig,
//! };
//! use std::time::Instant;
//!
//! let schema = FilterSchema::new(vec![FieldConfig::new(
//!     "name",
//!     "Name",
//!     FieldType::String,
//!     vec![OperatorConfig::new("contains", "contains")],
//! )]);
//!
//! let mut builder = FilterBuilder::new(schema);
//! let mut expressions = Vec::new();
//! let now = Instant::now();
//!
//! for event in [
//!     InputEvent::Focus,
//!     InputEvent::Enter, // choose "Name"
//!     InputEvent::Enter, // choose "contains"
//!     InputEvent::SetInput("test".to_string()),
//!     InputEvent::Enter, // commit
//! ] {
//!     let outcome = builder.handle_event(event, &expressions, now);
//!     if let Some(new_list) = outcome.expressions {
//!         expressions = new_list;
//!     }
//! }
//!
//! assert_eq!(expressions.len(), 1);
//! assert_eq!(expressions[0].condition.value.display, "test");
//! ```

pub mod builder;
pub mod cli;
pub mod config;
pub mod error;
pub mod expression;
pub mod schema;
pub mod serialize;
pub mod suggest;
pub mod validate;

// Re-export main types at crate root
pub use builder::{BuildStep, Effect, EventOutcome, FilterBuilder, InputEvent, TokenCursor, TokenKind};
pub use config::Config;
pub use error::{FilterError, Result};
pub use expression::{Condition, ConditionValue, Connector, FieldValue, FilterExpression, OperatorValue};
pub use schema::{
    ConnectorLabels, CustomInput, FieldConfig, FieldNameCheck, FieldType, FilterSchema,
    FreeformFields, MultiValue, OperatorConfig,
};
pub use suggest::{Autocompleter, AutocompleteItem, FetchRequest, SuggestionContext};
pub use validate::{
    validate_expression, validate_expressions, validate_schema, ValidationError,
    ValidationErrorKind, ValidationReport,
};
