//! Schema model: fields, operators and value constraints.
//!
//! A [`FilterSchema`] is pure data plus optional hook slots. The data side
//! (keys, labels, operator tables, freeform configuration) round-trips
//! through serde, so schemas can be loaded from JSON or YAML files; the hook
//! side (custom validators, serializers, value autocompleters) is attached
//! in code and skipped during (de)serialization.

use crate::error::{FilterError, Result};
use crate::expression::{Condition, ConditionValue, FieldValue, FilterExpression, OperatorValue};
use crate::suggest::Autocompleter;
use crate::validate::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

// ============================================================================
// Hook types
// ============================================================================

/// Per-field custom validation rule. Consulted with the full condition;
/// custom rules inspect `condition.value.raw` only.
pub type FieldValidator = Rc<dyn Fn(&Condition) -> Vec<ValidationError>>;

/// Produces the canonical serialized string for a raw value.
pub type ValueSerializer = Rc<dyn Fn(&Value) -> String>;

/// Rebuilds a [`ConditionValue`] from its serialized string.
pub type ValueDeserializer = Rc<dyn Fn(&str) -> ConditionValue>;

/// Schema-level validation hook, run after per-expression checks.
pub type ListValidator = Rc<dyn Fn(&[FilterExpression]) -> Vec<ValidationError>>;

/// Schema-level serializer override; returning `None` falls through to the
/// field-level hook or the default.
pub type SchemaValueSerializer = Rc<dyn Fn(&Condition) -> Option<String>>;

/// Schema-level deserializer override; returning `None` falls through.
pub type SchemaValueDeserializer = Rc<dyn Fn(&FieldConfig, &str) -> Option<ConditionValue>>;

/// Freeform field-name check result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldNameCheck {
    Valid,
    Invalid(String),
}

/// Freeform field-name validation hook.
pub type FieldNameValidator = Rc<dyn Fn(&str) -> FieldNameCheck>;

/// Shared handle to a value autocompleter. Single-threaded interior
/// mutability: autocompleters carry debounce/cache state of their own.
pub type AutocompleterHandle = Rc<RefCell<dyn Autocompleter>>;

// ============================================================================
// Field and operator configuration
// ============================================================================

/// Value type of a filterable attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Number,
    Date,
    DateTime,
    Boolean,
    Enum,
    Id,
    Custom,
}

/// Multi-value arity for operators like `between` or `in`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiValue {
    /// Required number of sub-values; `-1` means one or more, unbounded.
    pub count: i32,
    /// Separator used to join sub-value displays and serialized forms.
    #[serde(default = "default_separator")]
    pub separator: String,
    /// Optional per-slot labels (e.g. `["min", "max"]`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

fn default_separator() -> String {
    ", ".to_string()
}

impl MultiValue {
    pub fn exactly(count: u32) -> Self {
        Self {
            count: count as i32,
            separator: default_separator(),
            labels: Vec::new(),
        }
    }

    pub fn unbounded() -> Self {
        Self {
            count: -1,
            separator: default_separator(),
            labels: Vec::new(),
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn is_unbounded(&self) -> bool {
        self.count < 0
    }
}

/// Descriptor for a host-rendered custom value input widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomInput {
    /// Host-side widget identifier.
    pub widget: String,
    /// Opaque parameters handed to the widget.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

/// One comparison/test available for a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorConfig {
    pub key: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_value: Option<MultiValue>,
    /// Overrides the field-level `value_required` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_input: Option<CustomInput>,
}

impl OperatorConfig {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            symbol: None,
            multi_value: None,
            value_required: None,
            custom_input: None,
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn with_multi_value(mut self, multi_value: MultiValue) -> Self {
        self.multi_value = Some(multi_value);
        self
    }

    pub fn without_value(mut self) -> Self {
        self.value_required = Some(false);
        self
    }

    pub fn with_custom_input(mut self, custom_input: CustomInput) -> Self {
        self.custom_input = Some(custom_input);
        self
    }

    /// Snapshot for storage on a committed condition.
    pub fn to_value(&self) -> OperatorValue {
        OperatorValue {
            key: self.key.clone(),
            label: self.label.clone(),
            symbol: self.symbol.clone(),
        }
    }
}

/// One filterable attribute.
#[derive(Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    pub key: String,
    pub label: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Suggestion grouping for sectioned display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Non-empty ordered list of operators.
    pub operators: Vec<OperatorConfig>,
    /// Whether the field may appear in more than one expression.
    #[serde(default = "default_true")]
    pub allow_multiple: bool,
    /// Whether expressions on this field require a value.
    #[serde(default = "default_true")]
    pub value_required: bool,
    #[serde(skip)]
    pub value_autocompleter: Option<AutocompleterHandle>,
    #[serde(skip)]
    pub validate: Option<FieldValidator>,
    #[serde(skip)]
    pub serialize: Option<ValueSerializer>,
    #[serde(skip)]
    pub deserialize: Option<ValueDeserializer>,
}

fn default_true() -> bool {
    true
}

impl FieldConfig {
    pub fn new(
        key: impl Into<String>,
        label: impl Into<String>,
        field_type: FieldType,
        operators: Vec<OperatorConfig>,
    ) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            field_type,
            description: None,
            group: None,
            operators,
            allow_multiple: true,
            value_required: true,
            value_autocompleter: None,
            validate: None,
            serialize: None,
            deserialize: None,
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

    pub fn single_use(mut self) -> Self {
        self.allow_multiple = false;
        self
    }

    pub fn optional_value(mut self) -> Self {
        self.value_required = false;
        self
    }

    pub fn with_autocompleter(mut self, autocompleter: AutocompleterHandle) -> Self {
        self.value_autocompleter = Some(autocompleter);
        self
    }

    pub fn with_validator(mut self, validate: FieldValidator) -> Self {
        self.validate = Some(validate);
        self
    }

    pub fn with_serializer(mut self, serialize: ValueSerializer) -> Self {
        self.serialize = Some(serialize);
        self
    }

    pub fn with_deserializer(mut self, deserialize: ValueDeserializer) -> Self {
        self.deserialize = Some(deserialize);
        self
    }

    /// Look up an operator by key.
    pub fn operator(&self, key: &str) -> Option<&OperatorConfig> {
        self.operators.iter().find(|op| op.key == key)
    }

    /// Whether a value is required for the given operator, resolving the
    /// operator-level override against the field-level default.
    pub fn requires_value(&self, operator: &OperatorConfig) -> bool {
        operator.value_required.unwrap_or(self.value_required)
    }

    /// Snapshot for storage on a committed condition.
    pub fn to_value(&self) -> FieldValue {
        FieldValue {
            key: self.key.clone(),
            label: self.label.clone(),
            field_type: self.field_type,
        }
    }
}

impl fmt::Debug for FieldConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldConfig")
            .field("key", &self.key)
            .field("label", &self.label)
            .field("type", &self.field_type)
            .field("operators", &self.operators)
            .field("allow_multiple", &self.allow_multiple)
            .field("value_required", &self.value_required)
            .field("has_autocompleter", &self.value_autocompleter.is_some())
            .finish()
    }
}

// ============================================================================
// Freeform fields
// ============================================================================

/// Configuration for fields created ad hoc from user-typed text.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct FreeformFields {
    /// Input placeholder shown by the host while typing a new field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Label template for the synthetic suggestion; `{}` is replaced with
    /// the typed name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_label: Option<String>,
    /// Operators granted to created fields. Empty falls back to a single
    /// `eq`/`equals` operator.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operators: Vec<OperatorConfig>,
    /// Value type assigned to created fields; `string` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_type: Option<FieldType>,
    /// Regex a typed field name must match, consulted when no
    /// `validate_field_name` hook is attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name_pattern: Option<String>,
    #[serde(skip)]
    pub validate_field_name: Option<FieldNameValidator>,
}

impl FreeformFields {
    pub fn with_operators(mut self, operators: Vec<OperatorConfig>) -> Self {
        self.operators = operators;
        self
    }

    pub fn with_default_type(mut self, field_type: FieldType) -> Self {
        self.default_type = Some(field_type);
        self
    }

    pub fn with_create_label(mut self, template: impl Into<String>) -> Self {
        self.create_label = Some(template.into());
        self
    }

    pub fn with_field_name_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.field_name_pattern = Some(pattern.into());
        self
    }

    pub fn with_field_name_validator(mut self, validate: FieldNameValidator) -> Self {
        self.validate_field_name = Some(validate);
        self
    }

    /// Operators granted to freeform fields.
    pub fn effective_operators(&self) -> Vec<OperatorConfig> {
        if self.operators.is_empty() {
            vec![OperatorConfig::new("eq", "equals")]
        } else {
            self.operators.clone()
        }
    }

    /// Value type assigned to freeform fields.
    pub fn effective_type(&self) -> FieldType {
        self.default_type.unwrap_or(FieldType::String)
    }

    /// Display label for the synthetic "create field" suggestion.
    pub fn create_label_for(&self, name: &str) -> String {
        match &self.create_label {
            Some(template) if template.contains("{}") => template.replace("{}", name),
            Some(template) => format!("{} {}", template, name),
            None => format!("Create field \"{}\"", name),
        }
    }

    /// Check a typed field name: the hook wins, then the pattern, then
    /// anything non-empty is valid.
    pub fn check_field_name(&self, name: &str) -> FieldNameCheck {
        if let Some(hook) = self.validate_field_name.as_deref() {
            return hook(name);
        }
        if let Some(pattern) = &self.field_name_pattern {
            match regex::Regex::new(pattern) {
                Ok(re) if re.is_match(name) => FieldNameCheck::Valid,
                Ok(_) => FieldNameCheck::Invalid(format!(
                    "Field name '{}' does not match '{}'",
                    name, pattern
                )),
                Err(_) => FieldNameCheck::Invalid(format!("Invalid field name pattern: {}", pattern)),
            }
        } else {
            FieldNameCheck::Valid
        }
    }
}

impl fmt::Debug for FreeformFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FreeformFields")
            .field("create_label", &self.create_label)
            .field("operators", &self.operators)
            .field("default_type", &self.default_type)
            .field("field_name_pattern", &self.field_name_pattern)
            .field("has_validator", &self.validate_field_name.is_some())
            .finish()
    }
}

// ============================================================================
// Schema
// ============================================================================

/// Custom display labels for the AND/OR connectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorLabels {
    pub and: String,
    pub or: String,
}

impl Default for ConnectorLabels {
    fn default() -> Self {
        Self {
            and: "AND".to_string(),
            or: "OR".to_string(),
        }
    }
}

/// Static description of everything a filter input can build: fields,
/// per-field operators, value constraints, connector labels and the
/// freeform-field policy.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct FilterSchema {
    pub fields: Vec<FieldConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connectors: Option<ConnectorLabels>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_expressions: Option<usize>,
    /// `Some` enables ad-hoc fields created from typed text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freeform: Option<FreeformFields>,
    #[serde(skip)]
    pub validate: Option<ListValidator>,
    #[serde(skip)]
    pub serialize_value: Option<SchemaValueSerializer>,
    #[serde(skip)]
    pub deserialize_value: Option<SchemaValueDeserializer>,
}

impl FilterSchema {
    pub fn new(fields: Vec<FieldConfig>) -> Self {
        Self {
            fields,
            ..Default::default()
        }
    }

    pub fn with_connectors(mut self, labels: ConnectorLabels) -> Self {
        self.connectors = Some(labels);
        self
    }

    pub fn with_max_expressions(mut self, max: usize) -> Self {
        self.max_expressions = Some(max);
        self
    }

    pub fn with_freeform(mut self, freeform: FreeformFields) -> Self {
        self.freeform = Some(freeform);
        self
    }

    pub fn with_validator(mut self, validate: ListValidator) -> Self {
        self.validate = Some(validate);
        self
    }

    /// Look up a field by key.
    pub fn field(&self, key: &str) -> Option<&FieldConfig> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Look up a field by key or label, case-insensitively.
    pub fn field_matching(&self, text: &str) -> Option<&FieldConfig> {
        self.fields
            .iter()
            .find(|f| f.key.eq_ignore_ascii_case(text) || f.label.eq_ignore_ascii_case(text))
    }

    /// Whether freeform field creation is enabled.
    pub fn allows_freeform(&self) -> bool {
        self.freeform.is_some()
    }

    /// Operator table for a field key: the schema field's operators, or the
    /// freeform defaults for user-created fields.
    pub fn operators_for(&self, field_key: &str) -> Option<Vec<OperatorConfig>> {
        if let Some(field) = self.field(field_key) {
            return Some(field.operators.clone());
        }
        self.freeform.as_ref().map(|ff| ff.effective_operators())
    }

    /// Connector display labels (custom or defaults).
    pub fn connector_labels(&self) -> ConnectorLabels {
        self.connectors.clone().unwrap_or_default()
    }

    /// Whether another expression may be appended to a list of `len` items.
    pub fn can_add(&self, len: usize) -> bool {
        match self.max_expressions {
            Some(max) => len < max,
            None => true,
        }
    }

    // ------------------------------------------------------------------
    // File loading
    // ------------------------------------------------------------------

    /// Load a schema from a JSON or YAML file, chosen by extension.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&content)?),
            other => Err(FilterError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}

impl fmt::Debug for FilterSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterSchema")
            .field("fields", &self.fields)
            .field("connectors", &self.connectors)
            .field("max_expressions", &self.max_expressions)
            .field("freeform", &self.freeform)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
                    OperatorConfig::new("between", "between")
                        .with_multi_value(MultiValue::exactly(2)),
                ],
            )
            .single_use(),
        ])
    }

    #[test]
    fn test_field_lookup() {
        let s = schema();
        assert!(s.field("name").is_some());
        assert!(s.field("missing").is_none());
        assert_eq!(s.field_matching("NAME").unwrap().key, "name");
        assert_eq!(s.field_matching("Age").unwrap().key, "age");
    }

    #[test]
    fn test_operator_lookup_and_value_required() {
        let s = schema();
        let name = s.field("name").unwrap();
        let eq = name.operator("eq").unwrap();
        assert!(name.requires_value(eq));

        let optional = OperatorConfig::new("empty", "is empty").without_value();
        assert!(!name.requires_value(&optional));
    }

    #[test]
    fn test_operators_for_freeform() {
        let mut s = schema();
        assert!(s.operators_for("custom").is_none());

        s = s.with_freeform(
            FreeformFields::default()
                .with_operators(vec![OperatorConfig::new("contains", "contains")]),
        );
        let ops = s.operators_for("custom").unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].key, "contains");
    }

    #[test]
    fn test_freeform_defaults() {
        let ff = FreeformFields::default();
        assert_eq!(ff.effective_type(), FieldType::String);
        let ops = ff.effective_operators();
        assert_eq!(ops[0].key, "eq");
        assert_eq!(ff.create_label_for("myVar"), "Create field \"myVar\"");

        let ff = ff.with_create_label("New: {}");
        assert_eq!(ff.create_label_for("x"), "New: x");
    }

    #[test]
    fn test_field_name_pattern() {
        let ff = FreeformFields::default().with_field_name_pattern("^[a-zA-Z_][a-zA-Z0-9_]*$");
        assert_eq!(ff.check_field_name("myVar"), FieldNameCheck::Valid);
        assert!(matches!(
            ff.check_field_name("1bad"),
            FieldNameCheck::Invalid(_)
        ));
    }

    #[test]
    fn test_can_add_respects_max() {
        let s = schema().with_max_expressions(2);
        assert!(s.can_add(0));
        assert!(s.can_add(1));
        assert!(!s.can_add(2));
    }

    #[test]
    fn test_schema_serde_round_trip() {
        let s = schema();
        let json = serde_json::to_string(&s).unwrap();
        let back: FilterSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(back.fields.len(), 2);
        assert_eq!(back.field("age").unwrap().allow_multiple, false);
        assert_eq!(
            back.field("age").unwrap().operator("between").unwrap()
                .multi_value
                .as_ref()
                .unwrap()
                .count,
            2
        );
    }
}
