//! Expression types: conditions, values and connectors.
//!
//! A [`FilterExpression`] list is the canonical state the host application
//! owns. The builder never keeps its own copy across interactions: it is
//! handed the current list with every event and produces a new list only on
//! committed mutations.

use crate::schema::FieldType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Logical join recorded on an expression, describing its relation to the
/// *next* expression in the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Connector {
    And,
    Or,
}

impl Connector {
    /// Canonical wire spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
        }
    }
}

impl fmt::Display for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Connector {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(Connector::And),
            "OR" => Ok(Connector::Or),
            other => Err(format!("Invalid connector: {}", other)),
        }
    }
}

/// Three views of one condition value.
///
/// `raw` is the typed/native value (the only view consulted by custom
/// validators), `display` is the human string presented to the user, and
/// `serialized` is the canonical wire string. All three agree on logical
/// content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionValue {
    pub raw: Value,
    pub display: String,
    pub serialized: String,
}

impl ConditionValue {
    /// Build a value where all three views are the same plain text.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            raw: Value::String(text.clone()),
            display: text.clone(),
            serialized: text,
        }
    }

    /// The empty value used by operators that require no value.
    pub fn empty() -> Self {
        Self {
            raw: Value::Null,
            display: String::new(),
            serialized: String::new(),
        }
    }

    /// Whether the value counts as missing for validation purposes.
    pub fn is_empty(&self) -> bool {
        match &self.raw {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            Value::Array(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Number of sub-values carried by a multi-value raw; 1 otherwise.
    pub fn arity(&self) -> usize {
        match &self.raw {
            Value::Array(items) => items.len(),
            Value::Null => 0,
            _ => 1,
        }
    }
}

/// Snapshot of the display-relevant subset of a field config, copied from
/// the schema at selection time. The schema may change afterwards without
/// corrupting committed expressions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

/// Snapshot of the display-relevant subset of an operator config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorValue {
    pub key: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

impl OperatorValue {
    /// Preferred short display form: the symbol when present, else the label.
    pub fn display(&self) -> &str {
        self.symbol.as_deref().unwrap_or(&self.label)
    }
}

/// One complete filter condition: field, operator and value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: FieldValue,
    pub operator: OperatorValue,
    pub value: ConditionValue,
}

/// A committed condition plus the connector joining it to the next one.
///
/// The connector on expression *i* joins *i* and *i+1*; the last
/// expression's connector is `None` and is ignored if set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterExpression {
    pub condition: Condition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connector: Option<Connector>,
}

impl FilterExpression {
    pub fn new(condition: Condition) -> Self {
        Self {
            condition,
            connector: None,
        }
    }

    pub fn with_connector(mut self, connector: Connector) -> Self {
        self.connector = Some(connector);
        self
    }
}

/// Clears the trailing expression's connector, which never has a neighbor
/// to join to.
pub fn clear_trailing_connector(expressions: &mut [FilterExpression]) {
    if let Some(last) = expressions.last_mut() {
        last.connector = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_round_trip() {
        assert_eq!("AND".parse::<Connector>().unwrap(), Connector::And);
        assert_eq!("or".parse::<Connector>().unwrap(), Connector::Or);
        assert!("XOR".parse::<Connector>().is_err());
        assert_eq!(Connector::And.to_string(), "AND");
    }

    #[test]
    fn test_condition_value_emptiness() {
        assert!(ConditionValue::empty().is_empty());
        assert!(ConditionValue::from_text("   ").is_empty());
        assert!(!ConditionValue::from_text("x").is_empty());

        let multi = ConditionValue {
            raw: Value::Array(vec![]),
            display: String::new(),
            serialized: String::new(),
        };
        assert!(multi.is_empty());
        assert_eq!(multi.arity(), 0);
    }

    #[test]
    fn test_clear_trailing_connector() {
        let cond = Condition {
            field: FieldValue {
                key: "name".to_string(),
                label: "Name".to_string(),
                field_type: FieldType::String,
            },
            operator: OperatorValue {
                key: "eq".to_string(),
                label: "equals".to_string(),
                symbol: None,
            },
            value: ConditionValue::from_text("a"),
        };
        let mut list = vec![
            FilterExpression::new(cond.clone()).with_connector(Connector::And),
            FilterExpression::new(cond).with_connector(Connector::Or),
        ];
        clear_trailing_connector(&mut list);
        assert_eq!(list[0].connector, Some(Connector::And));
        assert_eq!(list[1].connector, None);
    }
}
