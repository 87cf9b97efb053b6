//! Serialization and display adapters for expression lists.
//!
//! Three exchange formats:
//! - the wire format ([`SerializedExpression`]), which round-trips through
//!   [`deserialize`] for schemas without custom serializers;
//! - URL query strings, a documented *lossy* pairing: operator choice and
//!   connector fidelity are dropped, repeated field keys collapse
//!   (last writer wins), and round-tripping is not guaranteed;
//! - human-readable display strings with pluggable per-part formatters.

use crate::error::{FilterError, Result};
use crate::expression::{
    clear_trailing_connector, Condition, ConditionValue, Connector, FieldValue, FilterExpression,
    OperatorValue,
};
use crate::schema::{FieldType, FilterSchema, MultiValue, OperatorConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::rc::Rc;

/// One expression in the compact wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedExpression {
    pub field: String,
    pub operator: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector: Option<Connector>,
}

// ============================================================================
// Wire format
// ============================================================================

/// Serialize an expression list. The value is the stored `serialized` form
/// unless a field-level or schema-level serializer overrides it.
pub fn serialize(
    expressions: &[FilterExpression],
    schema: Option<&FilterSchema>,
) -> Vec<SerializedExpression> {
    let last = expressions.len().saturating_sub(1);
    expressions
        .iter()
        .enumerate()
        .map(|(i, expr)| SerializedExpression {
            field: expr.condition.field.key.clone(),
            operator: expr.condition.operator.key.clone(),
            value: serialized_value(expr, schema),
            connector: if i == last { None } else { expr.connector },
        })
        .collect()
}

fn serialized_value(expr: &FilterExpression, schema: Option<&FilterSchema>) -> String {
    if let Some(schema) = schema {
        if let Some(config) = schema.field(&expr.condition.field.key) {
            if let Some(serialize) = config.serialize.as_deref() {
                return serialize(&expr.condition.value.raw);
            }
        }
        if let Some(hook) = schema.serialize_value.as_deref() {
            if let Some(serialized) = hook(&expr.condition) {
                return serialized;
            }
        }
    }
    expr.condition.value.serialized.clone()
}

/// Rebuild an expression list from the wire format.
///
/// Unknown field keys and unknown operator keys are contract errors and
/// fail the whole call; nothing is skipped. Schemas with freeform fields
/// accept unknown field keys as user-created fields.
pub fn deserialize(
    serialized: &[SerializedExpression],
    schema: &FilterSchema,
) -> Result<Vec<FilterExpression>> {
    let mut expressions = Vec::with_capacity(serialized.len());
    for item in serialized {
        let (field_value, operators) = match schema.field(&item.field) {
            Some(config) => (config.to_value(), config.operators.clone()),
            None => match &schema.freeform {
                Some(freeform) => (
                    FieldValue {
                        key: item.field.clone(),
                        label: item.field.clone(),
                        field_type: freeform.effective_type(),
                    },
                    freeform.effective_operators(),
                ),
                None => return Err(FilterError::UnknownField(item.field.clone())),
            },
        };
        let operator = operators
            .iter()
            .find(|op| op.key == item.operator)
            .ok_or_else(|| FilterError::UnknownOperator {
                field: item.field.clone(),
                operator: item.operator.clone(),
            })?;

        let value = deserialize_value(schema, &item.field, &field_value, operator, &item.value);
        expressions.push(FilterExpression {
            condition: Condition {
                field: field_value,
                operator: operator.to_value(),
                value,
            },
            connector: item.connector,
        });
    }
    clear_trailing_connector(&mut expressions);
    Ok(expressions)
}

fn deserialize_value(
    schema: &FilterSchema,
    field_key: &str,
    field_value: &FieldValue,
    operator: &OperatorConfig,
    serialized: &str,
) -> ConditionValue {
    if let Some(config) = schema.field(field_key) {
        if let Some(hook) = config.deserialize.as_deref() {
            return hook(serialized);
        }
        if let Some(hook) = schema.deserialize_value.as_deref() {
            if let Some(value) = hook(config, serialized) {
                return value;
            }
        }
    }
    default_parse(field_value.field_type, operator.multi_value.as_ref(), serialized)
}

fn default_parse(
    field_type: FieldType,
    multi_value: Option<&MultiValue>,
    serialized: &str,
) -> ConditionValue {
    if let Some(mv) = multi_value {
        let sep = mv.separator.trim();
        let parts: Vec<&str> = if sep.is_empty() {
            serialized.split_whitespace().collect()
        } else {
            serialized
                .split(sep)
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .collect()
        };
        let raws: Vec<Value> = parts.iter().map(|p| coerce(field_type, p)).collect();
        let display = parts.join(&mv.separator);
        return ConditionValue {
            raw: Value::Array(raws),
            display,
            serialized: serialized.to_string(),
        };
    }
    ConditionValue {
        raw: coerce(field_type, serialized),
        display: serialized.to_string(),
        serialized: serialized.to_string(),
    }
}

fn coerce(field_type: FieldType, text: &str) -> Value {
    match field_type {
        FieldType::Number => text
            .parse::<f64>()
            .map(|n| serde_json::json!(n))
            .unwrap_or_else(|_| Value::String(text.to_string())),
        FieldType::Boolean => match text.to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(text.to_string()),
        },
        _ => Value::String(text.to_string()),
    }
}

/// Load a wire-format expression list from a JSON or YAML file.
pub fn load_serialized(path: &Path) -> Result<Vec<SerializedExpression>> {
    let content = std::fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(serde_json::from_str(&content)?),
        Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&content)?),
        other => Err(FilterError::UnsupportedFormat(
            other.unwrap_or("<none>").to_string(),
        )),
    }
}

// ============================================================================
// Query strings
// ============================================================================

/// Render the list as a percent-encoded query string, one value per field
/// key. When the same field key appears twice the later value wins; order
/// follows first occurrence. Lossy: operators and connectors are dropped.
pub fn to_query_string(expressions: &[FilterExpression]) -> String {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for expr in expressions {
        let key = expr.condition.field.key.clone();
        let value = expr.condition.value.serialized.clone();
        match pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(pair) => pair.1 = value,
            None => pairs.push((key, value)),
        }
    }
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Parse a query string back into expressions. Unknown field keys are
/// silently skipped; every parsed expression uses the field's *first*
/// declared operator and an `AND` connector. Not guaranteed to round-trip
/// against [`serialize`]'s output.
pub fn from_query_string(query: &str, schema: &FilterSchema) -> Vec<FilterExpression> {
    let query = query.trim_start_matches('?');
    let mut expressions = Vec::new();
    for pair in query.split('&') {
        let Some((raw_key, raw_value)) = pair.split_once('=') else {
            continue;
        };
        let Ok(key) = urlencoding::decode(raw_key) else {
            continue;
        };
        let Ok(value) = urlencoding::decode(raw_value) else {
            continue;
        };
        let Some(config) = schema.field(&key) else {
            continue;
        };
        let Some(operator) = config.operators.first() else {
            continue;
        };
        let condition_value = default_parse(
            config.field_type,
            operator.multi_value.as_ref(),
            value.as_ref(),
        );
        expressions.push(FilterExpression {
            condition: Condition {
                field: config.to_value(),
                operator: operator.to_value(),
                value: condition_value,
            },
            connector: Some(Connector::And),
        });
    }
    clear_trailing_connector(&mut expressions);
    expressions
}

// ============================================================================
// Display strings
// ============================================================================

/// Pluggable per-part formatters for [`to_display_string`]. Any unset hook
/// falls back to the default rendering.
#[derive(Clone, Default)]
pub struct DisplayFormatters {
    pub field: Option<Rc<dyn Fn(&FieldValue) -> String>>,
    pub operator: Option<Rc<dyn Fn(&OperatorValue) -> String>>,
    pub value: Option<Rc<dyn Fn(&ConditionValue) -> String>>,
    pub connector: Option<Rc<dyn Fn(Connector) -> String>>,
    /// Formats a whole expression, overriding the three part formatters.
    pub expression: Option<Rc<dyn Fn(&FilterExpression) -> String>>,
}

/// Human-readable join of the expression list.
pub fn to_display_string(
    expressions: &[FilterExpression],
    formatters: Option<&DisplayFormatters>,
) -> String {
    let default_formatters = DisplayFormatters::default();
    let fmt = formatters.unwrap_or(&default_formatters);
    let mut out = String::new();
    let last = expressions.len().saturating_sub(1);
    for (i, expr) in expressions.iter().enumerate() {
        let part = match fmt.expression.as_deref() {
            Some(hook) => hook(expr),
            None => {
                let field = match fmt.field.as_deref() {
                    Some(hook) => hook(&expr.condition.field),
                    None => expr.condition.field.label.clone(),
                };
                let operator = match fmt.operator.as_deref() {
                    Some(hook) => hook(&expr.condition.operator),
                    None => expr.condition.operator.display().to_string(),
                };
                let value = match fmt.value.as_deref() {
                    Some(hook) => hook(&expr.condition.value),
                    None => expr.condition.value.display.clone(),
                };
                if value.is_empty() {
                    format!("{} {}", field, operator)
                } else {
                    format!("{} {} {}", field, operator, value)
                }
            }
        };
        out.push_str(&part);
        if i < last {
            let connector = expr.connector.unwrap_or(Connector::And);
            let join = match fmt.connector.as_deref() {
                Some(hook) => hook(connector),
                None => connector.as_str().to_string(),
            };
            out.push(' ');
            out.push_str(&join);
            out.push(' ');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldConfig, OperatorConfig};

    fn schema() -> FilterSchema {
        FilterSchema::new(vec![
            FieldConfig::new(
                "name",
                "Name",
                FieldType::String,
                vec![
                    OperatorConfig::new("contains", "contains"),
                    OperatorConfig::new("eq", "equals").with_symbol("="),
                ],
            ),
            FieldConfig::new(
                "age",
                "Age",
                FieldType::Number,
                vec![
                    OperatorConfig::new("gt", "greater than").with_symbol(">"),
                    OperatorConfig::new("between", "between")
                        .with_multi_value(MultiValue::exactly(2)),
                ],
            ),
        ])
    }

    fn expr(field: &str, operator: &str, value: &str, connector: Option<Connector>) -> FilterExpression {
        let s = schema();
        let config = s.field(field).unwrap();
        let op = config.operator(operator).unwrap();
        FilterExpression {
            condition: Condition {
                field: config.to_value(),
                operator: op.to_value(),
                value: default_parse(config.field_type, op.multi_value.as_ref(), value),
            },
            connector,
        }
    }

    #[test]
    fn test_wire_round_trip() {
        let list = vec![
            expr("name", "contains", "test", Some(Connector::And)),
            expr("age", "gt", "21", Some(Connector::Or)),
            expr("age", "between", "1, 5", None),
        ];
        let s = schema();
        let wire = serialize(&list, Some(&s));
        let back = deserialize(&wire, &s).unwrap();

        assert_eq!(back.len(), 3);
        for (orig, round) in list.iter().zip(&back) {
            assert_eq!(orig.condition.field.key, round.condition.field.key);
            assert_eq!(orig.condition.operator.key, round.condition.operator.key);
            assert_eq!(orig.condition.value.raw, round.condition.value.raw);
            assert_eq!(orig.connector, round.connector);
        }
    }

    #[test]
    fn test_serialize_number_and_multi_values() {
        let list = vec![
            expr("age", "gt", "21", None),
        ];
        let wire = serialize(&list, Some(&schema()));
        assert_eq!(wire[0].value, "21");

        let multi = vec![expr("age", "between", "1, 5", None)];
        let wire = serialize(&multi, Some(&schema()));
        assert_eq!(wire[0].value, "1, 5");
    }

    #[test]
    fn test_deserialize_unknown_field_fails() {
        let wire = vec![SerializedExpression {
            field: "ghost".to_string(),
            operator: "eq".to_string(),
            value: "x".to_string(),
            connector: None,
        }];
        let err = deserialize(&wire, &schema()).unwrap_err();
        assert!(matches!(err, FilterError::UnknownField(_)));
    }

    #[test]
    fn test_deserialize_unknown_operator_fails() {
        let wire = vec![SerializedExpression {
            field: "name".to_string(),
            operator: "gt".to_string(),
            value: "x".to_string(),
            connector: None,
        }];
        let err = deserialize(&wire, &schema()).unwrap_err();
        assert!(matches!(err, FilterError::UnknownOperator { .. }));
    }

    #[test]
    fn test_deserialize_trailing_connector_cleared() {
        let wire = vec![SerializedExpression {
            field: "name".to_string(),
            operator: "eq".to_string(),
            value: "x".to_string(),
            connector: Some(Connector::And),
        }];
        let back = deserialize(&wire, &schema()).unwrap();
        assert_eq!(back[0].connector, None);
    }

    #[test]
    fn test_field_serializer_override() {
        let mut s = schema();
        s.fields[0] = s.fields[0]
            .clone()
            .with_serializer(Rc::new(|raw| format!("<{}>", raw.as_str().unwrap_or(""))));
        let list = vec![expr("name", "eq", "x", None)];
        let wire = serialize(&list, Some(&s));
        assert_eq!(wire[0].value, "<x>");
    }

    #[test]
    fn test_query_string_percent_encoding() {
        let list = vec![expr("name", "contains", "a b&c", None)];
        let qs = to_query_string(&list);
        assert_eq!(qs, "name=a%20b%26c");
    }

    #[test]
    fn test_query_string_last_writer_wins() {
        let list = vec![
            expr("name", "contains", "first", Some(Connector::And)),
            expr("age", "gt", "3", Some(Connector::And)),
            expr("name", "eq", "second", None),
        ];
        let qs = to_query_string(&list);
        assert_eq!(qs, "name=second&age=3");
    }

    #[test]
    fn test_from_query_string_skips_unknown_and_uses_first_operator() {
        let s = schema();
        let list = from_query_string("name=test&ghost=1&age=21", &s);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].condition.field.key, "name");
        // First declared operator, not anything recorded in the string.
        assert_eq!(list[0].condition.operator.key, "contains");
        assert_eq!(list[0].connector, Some(Connector::And));
        assert_eq!(list[1].condition.field.key, "age");
        assert_eq!(list[1].condition.value.raw, serde_json::json!(21.0));
        assert_eq!(list[1].connector, None);
    }

    #[test]
    fn test_from_query_string_decodes_and_tolerates_junk() {
        let s = schema();
        let list = from_query_string("?name=a%20b&noequals&=orphan", &s);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].condition.value.display, "a b");
    }

    #[test]
    fn test_display_string_defaults() {
        let list = vec![
            expr("name", "contains", "test", Some(Connector::And)),
            expr("age", "gt", "21", None),
        ];
        assert_eq!(
            to_display_string(&list, None),
            "Name contains test AND Age > 21"
        );
    }

    #[test]
    fn test_display_string_custom_formatters() {
        let list = vec![
            expr("name", "eq", "x", Some(Connector::Or)),
            expr("age", "gt", "1", None),
        ];
        let formatters = DisplayFormatters {
            field: Some(Rc::new(|f| f.key.to_uppercase())),
            connector: Some(Rc::new(|c| format!("|{}|", c.as_str().to_lowercase()))),
            ..Default::default()
        };
        assert_eq!(
            to_display_string(&list, Some(&formatters)),
            "NAME = x |or| AGE > 1"
        );
    }

    #[test]
    fn test_display_string_whole_expression_hook() {
        let list = vec![expr("name", "eq", "x", None)];
        let formatters = DisplayFormatters {
            expression: Some(Rc::new(|e| format!("[{}]", e.condition.field.key))),
            ..Default::default()
        };
        assert_eq!(to_display_string(&list, Some(&formatters)), "[name]");
    }
}
