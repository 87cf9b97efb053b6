//! Build-state and token-cursor types.
//!
//! Two independent state values overlay each other: the build step (which
//! stage of field → operator → value → connector entry is active) and the
//! selected-token cursor over committed expressions. At most one of
//! {actively-building draft, token-selected, token-editing} holds at a
//! time; typing in the main input always clears token selection.

use crate::expression::FieldValue;
use crate::schema::OperatorConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stage of step-by-step expression construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildStep {
    #[default]
    Idle,
    SelectingField,
    SelectingOperator,
    EnteringValue,
    SelectingConnector,
}

/// One visually/logically atomic rendered unit of a committed expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Field,
    Operator,
    Value,
    Connector,
}

impl TokenKind {
    /// Field tokens are never directly editable.
    pub fn is_editable(self) -> bool {
        !matches!(self, TokenKind::Field)
    }
}

impl std::str::FromStr for TokenKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "field" => Ok(TokenKind::Field),
            "operator" => Ok(TokenKind::Operator),
            "value" => Ok(TokenKind::Value),
            "connector" => Ok(TokenKind::Connector),
            other => Err(format!("Invalid token kind: {}", other)),
        }
    }
}

/// The selected-token cursor: expression index plus token kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCursor {
    pub index: usize,
    pub kind: TokenKind,
}

impl TokenCursor {
    pub fn new(index: usize, kind: TokenKind) -> Self {
        Self { index, kind }
    }
}

/// Which part of a committed expression an edit session targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditTarget {
    Operator,
    Value,
    Connector,
}

impl EditTarget {
    pub fn from_kind(kind: TokenKind) -> Option<EditTarget> {
        match kind {
            TokenKind::Operator => Some(EditTarget::Operator),
            TokenKind::Value => Some(EditTarget::Value),
            TokenKind::Connector => Some(EditTarget::Connector),
            TokenKind::Field => None,
        }
    }

    pub fn kind(self) -> TokenKind {
        match self {
            EditTarget::Operator => TokenKind::Operator,
            EditTarget::Value => TokenKind::Value,
            EditTarget::Connector => TokenKind::Connector,
        }
    }
}

/// An in-place edit of one token of a committed expression. Purely local
/// until confirmed; Escape discards it without touching the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    pub index: usize,
    pub target: EditTarget,
    /// Inline control contents (pre-populated with the current display for
    /// value edits).
    pub input: String,
    /// Field key of the expression under edit.
    pub field_key: String,
}

/// Field snapshot captured when the user picks (or creates) a field,
/// together with what the later steps need from its config.
#[derive(Debug, Clone)]
pub struct DraftField {
    pub value: FieldValue,
    pub operators: Vec<OperatorConfig>,
    pub value_required: bool,
    pub freeform: bool,
}

/// One entered sub-value of a multi-value operator.
#[derive(Debug, Clone)]
pub struct ValueSlot {
    pub raw: Value,
    pub display: String,
}

/// The partial expression under construction. Discardable at any point
/// without affecting the committed list; commit is the single atomic
/// transition.
#[derive(Debug, Clone, Default)]
pub struct Draft {
    pub field: Option<DraftField>,
    pub operator: Option<OperatorConfig>,
    pub slots: Vec<ValueSlot>,
    /// Value entry is handed to a host-rendered custom widget.
    pub custom_pending: bool,
}

impl Draft {
    pub fn clear(&mut self) {
        *self = Draft::default();
    }

    pub fn is_empty(&self) -> bool {
        self.field.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_tokens_not_editable() {
        assert!(!TokenKind::Field.is_editable());
        assert!(TokenKind::Operator.is_editable());
        assert!(TokenKind::Value.is_editable());
        assert!(TokenKind::Connector.is_editable());
        assert_eq!(EditTarget::from_kind(TokenKind::Field), None);
    }

    #[test]
    fn test_token_kind_parse() {
        assert_eq!("value".parse::<TokenKind>().unwrap(), TokenKind::Value);
        assert_eq!(" Connector ".parse::<TokenKind>().unwrap(), TokenKind::Connector);
        assert!("blob".parse::<TokenKind>().is_err());
    }
}
