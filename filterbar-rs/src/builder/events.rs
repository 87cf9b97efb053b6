//! Input events consumed by the builder and effects it emits.

use super::state::TokenCursor;
use crate::expression::FilterExpression;
use crate::schema::CustomInput;
use crate::suggest::FetchRequest;
use crate::validate::ValidationError;
use serde_json::Value;

/// One user interaction handed to [`FilterBuilder`](super::FilterBuilder).
///
/// Text editing is modeled as [`InputEvent::SetInput`] carrying the full
/// new input contents; the host's text control owns caret handling.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Focus,
    Blur,
    /// The main input (or the active inline edit control) now contains this
    /// text.
    SetInput(String),
    Enter,
    Escape,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Delete,
    Backspace,
    /// Ctrl+A equivalent: select every token for review.
    SelectAll,
    /// Click on the suggestion at this index.
    ClickSuggestion(usize),
    /// Click on a committed token: selects it without entering edit mode.
    ClickToken(TokenCursor),
    /// Double-click on a committed token: selects it and starts editing
    /// when the token kind is editable.
    DoubleClickToken(TokenCursor),
    /// A custom input widget confirmed a value.
    CustomInputConfirm { raw: Value, display: String },
    /// A custom input widget was dismissed.
    CustomInputCancel,
}

/// Something the host must render or perform in response to an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// The current list fails schema validation; the host decides display.
    Errors(Vec<ValidationError>),
    /// Text for the screen-reader live region.
    Announce(String),
    /// Run the async suggestion source and call `resolve_fetch` with the
    /// result and this request's sequence number.
    Fetch(FetchRequest),
    /// Hand value entry to the described host widget; answer with
    /// `CustomInputConfirm` or `CustomInputCancel`.
    OpenCustomInput(CustomInput),
}

/// Result of handling one event: the new expression list when a committed
/// mutation occurred (`None` for purely local build-state changes), plus
/// any emitted effects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventOutcome {
    pub expressions: Option<Vec<FilterExpression>>,
    pub effects: Vec<Effect>,
}

impl EventOutcome {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn changed(expressions: Vec<FilterExpression>) -> Self {
        Self {
            expressions: Some(expressions),
            effects: Vec::new(),
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}
