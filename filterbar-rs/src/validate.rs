//! Validation engine for expressions, expression lists and schemas.
//!
//! Validation never throws: every check appends to an error list and the
//! caller inspects the resulting [`ValidationReport`]. Running validation
//! twice on an unchanged list yields the same errors.

use crate::expression::FilterExpression;
use crate::schema::{FilterSchema, OperatorConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Which part of the model a validation error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationErrorKind {
    /// Unknown or invalid field reference.
    Field,
    /// Operator not valid for the field.
    Operator,
    /// Missing, malformed or wrong-arity value.
    Value,
    /// Cross-field schema-level rule violation.
    Expression,
    /// The schema itself is malformed, or the list exceeds its caps.
    Schema,
}

/// One validation failure. Multiple errors may be reported for a single
/// expression; errors accumulate and are never thrown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    #[serde(rename = "type")]
    pub kind: ValidationErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression_index: Option<usize>,
}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field: None,
            expression_index: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.expression_index = Some(index);
        self
    }

    fn at(mut self, index: Option<usize>) -> Self {
        self.expression_index = index;
        self
    }
}

/// Outcome of a validation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }
}

// ============================================================================
// Expression validation
// ============================================================================

/// Validate a single expression against the schema.
pub fn validate_expression(expr: &FilterExpression, schema: &FilterSchema) -> ValidationReport {
    ValidationReport::from_errors(expression_errors(expr, None, schema))
}

fn expression_errors(
    expr: &FilterExpression,
    index: Option<usize>,
    schema: &FilterSchema,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let condition = &expr.condition;
    let field_key = &condition.field.key;

    // Field existence is fatal for this expression: without a field config
    // the remaining checks have nothing to check against. Freeform schemas
    // accept unknown keys (they are user-created fields).
    let field = schema.field(field_key);
    if field.is_none() && !schema.allows_freeform() {
        errors.push(
            ValidationError::new(
                ValidationErrorKind::Field,
                format!("Unknown field: {}", field_key),
            )
            .with_field(field_key.clone())
            .at(index),
        );
        return errors;
    }

    let operators: Vec<OperatorConfig> = match field {
        Some(f) => f.operators.clone(),
        None => schema
            .freeform
            .as_ref()
            .map(|ff| ff.effective_operators())
            .unwrap_or_default(),
    };

    let operator = operators.iter().find(|op| op.key == condition.operator.key);
    if operator.is_none() {
        errors.push(
            ValidationError::new(
                ValidationErrorKind::Operator,
                format!(
                    "Operator '{}' is not valid for field '{}'",
                    condition.operator.key, field_key
                ),
            )
            .with_field(field_key.clone())
            .at(index),
        );
    }

    if let Some(op) = operator {
        if let Some(mv) = &op.multi_value {
            errors.extend(multi_value_errors(expr, mv.count, field_key, index));
        } else {
            let required = match field {
                Some(f) => f.requires_value(op),
                None => op.value_required.unwrap_or(true),
            };
            if required && condition.value.is_empty() {
                errors.push(
                    ValidationError::new(
                        ValidationErrorKind::Value,
                        format!("Field '{}' requires a value", field_key),
                    )
                    .with_field(field_key.clone())
                    .at(index),
                );
            }
        }
    }

    if let Some(f) = field {
        if let Some(validate) = f.validate.as_deref() {
            errors.extend(validate(condition).into_iter().map(|e| e.at(index)));
        }
    }

    errors
}

fn multi_value_errors(
    expr: &FilterExpression,
    count: i32,
    field_key: &str,
    index: Option<usize>,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    match &expr.condition.value.raw {
        Value::Array(items) => {
            if count < 0 {
                if items.is_empty() {
                    errors.push(
                        ValidationError::new(
                            ValidationErrorKind::Value,
                            format!("Field '{}' requires at least one value", field_key),
                        )
                        .with_field(field_key.to_string())
                        .at(index),
                    );
                }
            } else if items.len() != count as usize {
                errors.push(
                    ValidationError::new(
                        ValidationErrorKind::Value,
                        format!(
                            "Field '{}' requires exactly {} values, got {}",
                            field_key,
                            count,
                            items.len()
                        ),
                    )
                    .with_field(field_key.to_string())
                    .at(index),
                );
            }
        }
        _ => {
            errors.push(
                ValidationError::new(
                    ValidationErrorKind::Value,
                    format!("Field '{}' requires a list of values", field_key),
                )
                .with_field(field_key.to_string())
                .at(index),
            );
        }
    }
    errors
}

// ============================================================================
// List validation
// ============================================================================

/// Validate a full expression list: per-expression checks, the
/// `max_expressions` cap, single-use field uniqueness, then the schema-level
/// hook. Errors accumulate; validation never short-circuits across
/// expressions.
pub fn validate_expressions(
    expressions: &[FilterExpression],
    schema: &FilterSchema,
) -> ValidationReport {
    let mut errors = Vec::new();

    for (i, expr) in expressions.iter().enumerate() {
        errors.extend(expression_errors(expr, Some(i), schema));
    }

    if let Some(max) = schema.max_expressions {
        if expressions.len() > max {
            errors.push(ValidationError::new(
                ValidationErrorKind::Schema,
                format!(
                    "Too many expressions: {} exceeds the maximum of {}",
                    expressions.len(),
                    max
                ),
            ));
        }
    }

    // Single-use fields: the error is attached to the second (and every
    // subsequent) occurrence, not the first.
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for (i, expr) in expressions.iter().enumerate() {
        let key = expr.condition.field.key.as_str();
        let Some(field) = schema.field(key) else {
            continue;
        };
        let occurrences = seen.entry(key).or_insert(0);
        *occurrences += 1;
        if !field.allow_multiple && *occurrences > 1 {
            errors.push(
                ValidationError::new(
                    ValidationErrorKind::Field,
                    format!("Field '{}' may only be used once", key),
                )
                .with_field(key.to_string())
                .with_index(i),
            );
        }
    }

    if let Some(validate) = schema.validate.as_deref() {
        errors.extend(validate(expressions));
    }

    ValidationReport::from_errors(errors)
}

// ============================================================================
// Schema validation
// ============================================================================

/// Catch schema misconfiguration before runtime use. Not run during live
/// editing.
pub fn validate_schema(schema: &FilterSchema) -> ValidationReport {
    let mut errors = Vec::new();

    if schema.fields.is_empty() {
        errors.push(ValidationError::new(
            ValidationErrorKind::Schema,
            "Schema has no fields",
        ));
    }

    let mut keys: HashSet<&str> = HashSet::new();
    for field in &schema.fields {
        if !keys.insert(field.key.as_str()) {
            errors.push(
                ValidationError::new(
                    ValidationErrorKind::Schema,
                    format!("Duplicate field key: {}", field.key),
                )
                .with_field(field.key.clone()),
            );
        }
        if field.operators.is_empty() {
            errors.push(
                ValidationError::new(
                    ValidationErrorKind::Schema,
                    format!("Field '{}' has no operators", field.key),
                )
                .with_field(field.key.clone()),
            );
        }
    }

    if schema.max_expressions == Some(0) {
        errors.push(ValidationError::new(
            ValidationErrorKind::Schema,
            "max_expressions must be at least 1",
        ));
    }

    ValidationReport::from_errors(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{Condition, ConditionValue, FieldValue, FilterExpression, OperatorValue};
    use crate::schema::{FieldConfig, FieldType, FreeformFields, MultiValue, OperatorConfig};
    use serde_json::json;

    fn schema() -> FilterSchema {
        FilterSchema::new(vec![
            FieldConfig::new(
                "name",
                "Name",
                FieldType::String,
                vec![
                    OperatorConfig::new("contains", "contains"),
                    OperatorConfig::new("empty", "is empty").without_value(),
                ],
            ),
            FieldConfig::new(
                "id",
                "ID",
                FieldType::Id,
                vec![OperatorConfig::new("eq", "equals")],
            )
            .single_use(),
            FieldConfig::new(
                "age",
                "Age",
                FieldType::Number,
                vec![
                    OperatorConfig::new("between", "between")
                        .with_multi_value(MultiValue::exactly(2)),
                    OperatorConfig::new("in", "one of")
                        .with_multi_value(MultiValue::unbounded()),
                ],
            ),
        ])
    }

    fn expr(field: &str, operator: &str, value: ConditionValue) -> FilterExpression {
        FilterExpression::new(Condition {
            field: FieldValue {
                key: field.to_string(),
                label: field.to_string(),
                field_type: FieldType::String,
            },
            operator: OperatorValue {
                key: operator.to_string(),
                label: operator.to_string(),
                symbol: None,
            },
            value,
        })
    }

    fn multi(values: &[&str]) -> ConditionValue {
        ConditionValue {
            raw: json!(values),
            display: values.join(", "),
            serialized: values.join(", "),
        }
    }

    #[test]
    fn test_valid_expression() {
        let report = validate_expression(
            &expr("name", "contains", ConditionValue::from_text("test")),
            &schema(),
        );
        assert!(report.valid);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_unknown_field_is_fatal() {
        let report = validate_expression(
            &expr("ghost", "contains", ConditionValue::from_text("x")),
            &schema(),
        );
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind, ValidationErrorKind::Field);
        assert_eq!(report.errors[0].field.as_deref(), Some("ghost"));
    }

    #[test]
    fn test_unknown_field_passes_with_freeform() {
        let schema = schema().with_freeform(
            FreeformFields::default()
                .with_operators(vec![OperatorConfig::new("contains", "contains")]),
        );
        let report = validate_expression(
            &expr("ghost", "contains", ConditionValue::from_text("x")),
            &schema,
        );
        assert!(report.valid);
    }

    #[test]
    fn test_operator_not_in_field() {
        let report = validate_expression(
            &expr("name", "gt", ConditionValue::from_text("x")),
            &schema(),
        );
        assert!(!report.valid);
        assert_eq!(report.errors[0].kind, ValidationErrorKind::Operator);
    }

    #[test]
    fn test_missing_value() {
        let report = validate_expression(&expr("name", "contains", ConditionValue::empty()), &schema());
        assert!(!report.valid);
        assert_eq!(report.errors[0].kind, ValidationErrorKind::Value);
    }

    #[test]
    fn test_value_not_required() {
        let report = validate_expression(&expr("name", "empty", ConditionValue::empty()), &schema());
        assert!(report.valid);
    }

    #[test]
    fn test_multi_value_exact_arity() {
        let ok = validate_expression(&expr("age", "between", multi(&["1", "5"])), &schema());
        assert!(ok.valid);

        let short = validate_expression(&expr("age", "between", multi(&["1"])), &schema());
        assert!(!short.valid);
        assert_eq!(short.errors[0].kind, ValidationErrorKind::Value);

        let not_array =
            validate_expression(&expr("age", "between", ConditionValue::from_text("1")), &schema());
        assert!(!not_array.valid);
    }

    #[test]
    fn test_multi_value_unbounded() {
        let ok = validate_expression(&expr("age", "in", multi(&["1", "2", "3"])), &schema());
        assert!(ok.valid);

        let empty = validate_expression(&expr("age", "in", multi(&[])), &schema());
        assert!(!empty.valid);
    }

    #[test]
    fn test_custom_field_validator_runs() {
        let mut schema = schema();
        schema.fields[0] = schema.fields[0].clone().with_validator(std::rc::Rc::new(|cond| {
            if cond.value.raw == json!("forbidden") {
                vec![ValidationError::new(
                    ValidationErrorKind::Value,
                    "Forbidden value",
                )
                .with_field(cond.field.key.clone())]
            } else {
                Vec::new()
            }
        }));

        let report = validate_expression(
            &expr("name", "contains", ConditionValue::from_text("forbidden")),
            &schema,
        );
        assert!(!report.valid);
        assert_eq!(report.errors[0].message, "Forbidden value");
    }

    #[test]
    fn test_uniqueness_error_on_second_occurrence() {
        let list = vec![
            expr("id", "eq", ConditionValue::from_text("1")),
            expr("id", "eq", ConditionValue::from_text("2")),
        ];
        let report = validate_expressions(&list, &schema());
        assert!(!report.valid);
        let dup: Vec<_> = report
            .errors
            .iter()
            .filter(|e| e.kind == ValidationErrorKind::Field)
            .collect();
        assert_eq!(dup.len(), 1);
        assert_eq!(dup[0].expression_index, Some(1));
    }

    #[test]
    fn test_max_expressions_boundary() {
        let schema = schema().with_max_expressions(2);
        let two = vec![
            expr("name", "contains", ConditionValue::from_text("a")),
            expr("name", "contains", ConditionValue::from_text("b")),
        ];
        assert!(validate_expressions(&two, &schema).valid);

        let mut three = two.clone();
        three.push(expr("name", "contains", ConditionValue::from_text("c")));
        let report = validate_expressions(&three, &schema);
        assert!(!report.valid);
        assert!(report
            .errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::Schema));
    }

    #[test]
    fn test_errors_accumulate_across_expressions() {
        let list = vec![
            expr("ghost", "contains", ConditionValue::from_text("a")),
            expr("name", "gt", ConditionValue::from_text("b")),
        ];
        let report = validate_expressions(&list, &schema());
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].expression_index, Some(0));
        assert_eq!(report.errors[1].expression_index, Some(1));
    }

    #[test]
    fn test_schema_level_hook_appends() {
        let schema = schema().with_validator(std::rc::Rc::new(|list| {
            if list.len() > 1 {
                vec![ValidationError::new(
                    ValidationErrorKind::Expression,
                    "Only one condition supported",
                )]
            } else {
                Vec::new()
            }
        }));
        let list = vec![
            expr("name", "contains", ConditionValue::from_text("a")),
            expr("age", "in", multi(&["1"])),
        ];
        let report = validate_expressions(&list, &schema);
        assert!(report
            .errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::Expression));
    }

    #[test]
    fn test_validation_is_idempotent() {
        let list = vec![
            expr("id", "eq", ConditionValue::from_text("1")),
            expr("id", "eq", ConditionValue::from_text("2")),
            expr("ghost", "x", ConditionValue::empty()),
        ];
        let s = schema();
        let first = validate_expressions(&list, &s);
        let second = validate_expressions(&list, &s);
        assert_eq!(first, second);
    }

    #[test]
    fn test_validate_schema() {
        assert!(validate_schema(&schema()).valid);

        let empty = FilterSchema::new(vec![]);
        assert!(!validate_schema(&empty).valid);

        let dup = FilterSchema::new(vec![
            FieldConfig::new("a", "A", FieldType::String, vec![OperatorConfig::new("eq", "eq")]),
            FieldConfig::new("a", "A2", FieldType::String, vec![OperatorConfig::new("eq", "eq")]),
        ]);
        let report = validate_schema(&dup);
        assert!(report.errors.iter().any(|e| e.message.contains("Duplicate")));

        let no_ops = FilterSchema::new(vec![FieldConfig::new(
            "a",
            "A",
            FieldType::String,
            vec![],
        )]);
        assert!(!validate_schema(&no_ops).valid);

        let zero_max = schema().with_max_expressions(0);
        assert!(!validate_schema(&zero_max).valid);
    }
}
