//! Suggestion engine: the autocompleter capability interface and its
//! concrete implementations.
//!
//! An autocompleter produces ranked, filterable candidate items for the
//! value-entry step. Variants:
//! - [`StaticAutocompleter`]: fixed list with prefix/substring/fuzzy match
//! - [`EnumAutocompleter`]: static list decorated with descriptions
//! - [`NumericAutocompleter`]: step-wise candidates with unit formatting
//! - [`DateAutocompleter`]: relative-date presets plus ISO literals
//! - [`AsyncAutocompleter`]: debounced host-driven source
//! - [`CombinedAutocompleter`]: merges several sources
//! - [`CachedAutocompleter`]: time-bounded memoization decorator

mod cache;
mod combine;
mod date;
mod enums;
mod list;
mod numeric;
mod remote;

pub use cache::{with_cache, CachedAutocompleter};
pub use combine::{combine_autocompleters, CombinedAutocompleter};
pub use date::{DateAutocompleter, DatePreset};
pub use enums::{EnumAutocompleter, EnumItem};
pub use list::{MatchMode, StaticAutocompleter};
pub use numeric::NumericAutocompleter;
pub use remote::AsyncAutocompleter;

use crate::expression::{ConditionValue, FieldValue, FilterExpression};
use crate::schema::{FilterSchema, OperatorConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use unicode_normalization::UnicodeNormalization;

/// One candidate item offered to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutocompleteItem {
    /// Stable identifier; doubles as the raw value for plain items.
    pub key: String,
    /// Text shown in the suggestion list.
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Section heading for grouped display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Typed value carried by value suggestions; `key` as a string when
    /// absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl AutocompleteItem {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            description: None,
            group: None,
            value: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// The raw value this item stands for.
    pub fn raw(&self) -> Value {
        self.value
            .clone()
            .unwrap_or_else(|| Value::String(self.key.clone()))
    }
}

/// Everything an autocompleter may consult when producing suggestions.
pub struct SuggestionContext<'a> {
    /// Partial input typed so far.
    pub input: &'a str,
    /// Field currently in scope, when past the field-selection step.
    pub field: Option<&'a FieldValue>,
    /// Operator currently in scope, when past the operator-selection step.
    pub operator: Option<&'a OperatorConfig>,
    /// The committed expression list (for uniqueness-aware sources).
    pub expressions: &'a [FilterExpression],
    pub schema: &'a FilterSchema,
}

/// A fetch the host must perform for an async source. Results are handed
/// back through `resolve_fetch` with the same sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub seq: u64,
    pub query: String,
}

/// The suggestion-generation capability object bound to a field's
/// value-entry step.
///
/// Only `suggestions` is mandatory. The remaining methods have no-op
/// defaults: the validate/format/parse trio for value handling, and the
/// fetch-driving surface used by async sources (and forwarded by
/// decorators).
pub trait Autocompleter {
    /// Produce candidate items for the current context.
    fn suggestions(&mut self, ctx: &SuggestionContext<'_>, now: Instant) -> Vec<AutocompleteItem>;

    /// Called whenever the partial input changes; async sources schedule
    /// their debounced fetch here.
    fn on_query_change(&mut self, _query: &str, _now: Instant) {}

    /// Next scheduled fetch whose debounce deadline has passed.
    fn take_due_fetch(&mut self, _now: Instant) -> Option<FetchRequest> {
        None
    }

    /// Deliver the result of an earlier fetch. Results whose sequence
    /// number is not the latest issued one are discarded; failures degrade
    /// to an empty list.
    fn resolve_fetch(
        &mut self,
        _seq: u64,
        _result: std::result::Result<Vec<AutocompleteItem>, String>,
    ) {
    }

    /// Cancel pending debounce deadlines and invalidate in-flight fetches.
    /// Called on blur and on field/operator changes.
    fn cancel_pending(&mut self) {}

    /// Check a committed value; `Some(reason)` rejects it.
    fn validate(&self, _value: &ConditionValue) -> Option<String> {
        None
    }

    /// Format a raw value for display.
    fn format(&self, _raw: &Value) -> Option<String> {
        None
    }

    /// Parse a display string back into a raw value.
    fn parse(&self, _display: &str) -> Option<Value> {
        None
    }
}

/// Canonical form used for matching and cache keys: NFC-normalized,
/// trimmed, lowercased.
pub fn normalize_query(query: &str) -> String {
    query.nfc().collect::<String>().trim().to_lowercase()
}
