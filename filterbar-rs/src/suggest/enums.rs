//! Enum autocompleter: a closed value set with descriptions.

use super::{Autocompleter, AutocompleteItem, StaticAutocompleter, SuggestionContext};
use crate::expression::ConditionValue;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

/// One member of an enum value set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumItem {
    pub key: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl EnumItem {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            description: None,
            group: None,
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
}

/// Suggests members of a closed set and rejects values outside it.
pub struct EnumAutocompleter {
    keys: Vec<String>,
    inner: StaticAutocompleter,
}

impl EnumAutocompleter {
    pub fn new(items: Vec<EnumItem>) -> Self {
        let keys = items.iter().map(|i| i.key.clone()).collect();
        let list = items
            .into_iter()
            .map(|i| {
                let mut item = AutocompleteItem::new(i.key, i.label);
                item.description = i.description;
                item.group = i.group;
                item
            })
            .collect();
        Self {
            keys,
            inner: StaticAutocompleter::new(list),
        }
    }
}

impl Autocompleter for EnumAutocompleter {
    fn suggestions(&mut self, ctx: &SuggestionContext<'_>, now: Instant) -> Vec<AutocompleteItem> {
        self.inner.suggestions(ctx, now)
    }

    fn validate(&self, value: &ConditionValue) -> Option<String> {
        let member = |raw: &Value| match raw {
            Value::String(s) => self.keys.iter().any(|k| k == s),
            _ => false,
        };
        let ok = match &value.raw {
            Value::Array(items) => !items.is_empty() && items.iter().all(member),
            other => member(other),
        };
        if ok {
            None
        } else {
            Some(format!("'{}' is not one of the allowed values", value.display))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FilterSchema;
    use serde_json::json;

    fn ac() -> EnumAutocompleter {
        EnumAutocompleter::new(vec![
            EnumItem::new("active", "Active").with_description("Currently in use"),
            EnumItem::new("archived", "Archived").with_group("Closed"),
        ])
    }

    #[test]
    fn test_items_carry_descriptions_and_groups() {
        let schema = FilterSchema::default();
        let ctx = SuggestionContext {
            input: "",
            field: None,
            operator: None,
            expressions: &[],
            schema: &schema,
        };
        let items = ac().suggestions(&ctx, Instant::now());
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].description.as_deref(), Some("Currently in use"));
        assert_eq!(items[1].group.as_deref(), Some("Closed"));
    }

    #[test]
    fn test_validate_membership() {
        let ac = ac();
        assert!(ac.validate(&ConditionValue::from_text("active")).is_none());
        assert!(ac.validate(&ConditionValue::from_text("bogus")).is_some());

        let multi = ConditionValue {
            raw: json!(["active", "archived"]),
            display: "active, archived".to_string(),
            serialized: "active, archived".to_string(),
        };
        assert!(ac.validate(&multi).is_none());
    }
}
