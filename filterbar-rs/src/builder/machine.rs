//! The expression build state machine.
//!
//! [`FilterBuilder`] turns a stream of input events into committed filter
//! expressions. It owns only ephemeral build state (the current step, the
//! typed input, the suggestion list, the partial draft, the token cursor);
//! the host owns the committed expression list and passes it in with every
//! event. Everything before a commit is local and discardable: Escape or
//! blur at any point leaves the host's list untouched.

use super::events::{Effect, EventOutcome, InputEvent};
use super::state::{
    BuildStep, Draft, DraftField, EditSession, EditTarget, TokenCursor, ValueSlot,
};
use super::tokens;
use crate::expression::{Condition, ConditionValue, Connector, FieldValue, FilterExpression};
use crate::schema::{
    AutocompleterHandle, FieldNameCheck, FieldType, FilterSchema, MultiValue, OperatorConfig,
};
use crate::suggest::{normalize_query, AutocompleteItem, SuggestionContext};
use crate::validate::validate_expressions;
use serde_json::Value;
use std::time::Instant;

/// The interaction controller behind a filter input.
pub struct FilterBuilder {
    schema: FilterSchema,
    step: BuildStep,
    input: String,
    input_error: Option<String>,
    items: Vec<AutocompleteItem>,
    highlighted: usize,
    /// The last suggestion item is the synthetic "create field" entry.
    freeform_offer: bool,
    selection: Option<TokenCursor>,
    select_all: bool,
    edit: Option<EditSession>,
    draft: Draft,
}

impl FilterBuilder {
    pub fn new(schema: FilterSchema) -> Self {
        Self {
            schema,
            step: BuildStep::Idle,
            input: String::new(),
            input_error: None,
            items: Vec::new(),
            highlighted: 0,
            freeform_offer: false,
            selection: None,
            select_all: false,
            edit: None,
            draft: Draft::default(),
        }
    }

    // ------------------------------------------------------------------
    // Introspection for the host's render pass
    // ------------------------------------------------------------------

    pub fn schema(&self) -> &FilterSchema {
        &self.schema
    }

    pub fn step(&self) -> BuildStep {
        self.step
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Current suggestion list, already filtered by the typed input.
    pub fn suggestions(&self) -> &[AutocompleteItem] {
        &self.items
    }

    /// Index of the highlighted suggestion. Resets to 0 whenever the
    /// filtered list changes; Arrow Up/Down clamp at the ends.
    pub fn highlighted(&self) -> usize {
        self.highlighted
    }

    pub fn selection(&self) -> Option<TokenCursor> {
        self.selection
    }

    pub fn select_all_active(&self) -> bool {
        self.select_all
    }

    pub fn editing(&self) -> Option<&EditSession> {
        self.edit.as_ref()
    }

    /// Rejection reason for the last attempted value commit, if any.
    pub fn input_error(&self) -> Option<&str> {
        self.input_error.as_deref()
    }

    /// Label for the multi-value slot currently being entered.
    pub fn value_slot_label(&self) -> Option<&str> {
        let mv = self.draft.operator.as_ref()?.multi_value.as_ref()?;
        mv.labels.get(self.draft.slots.len()).map(|s| s.as_str())
    }

    // ------------------------------------------------------------------
    // Event handling
    // ------------------------------------------------------------------

    /// Handle one input event against the host-owned expression list.
    pub fn handle_event(
        &mut self,
        event: InputEvent,
        expressions: &[FilterExpression],
        now: Instant,
    ) -> EventOutcome {
        match event {
            InputEvent::Focus => self.on_focus(expressions, now),
            InputEvent::Blur => self.on_blur(),
            InputEvent::SetInput(text) => self.on_set_input(text, expressions, now),
            InputEvent::Enter => self.on_enter(expressions, now),
            InputEvent::Escape => self.on_escape(),
            InputEvent::ArrowUp => {
                self.highlighted = self.highlighted.saturating_sub(1);
                EventOutcome::none()
            }
            InputEvent::ArrowDown => {
                if self.highlighted + 1 < self.items.len() {
                    self.highlighted += 1;
                }
                EventOutcome::none()
            }
            InputEvent::ArrowLeft => self.on_arrow_left(expressions),
            InputEvent::ArrowRight => self.on_arrow_right(expressions, now),
            InputEvent::Delete => self.on_delete(expressions, now),
            InputEvent::Backspace => self.on_backspace(expressions, now),
            InputEvent::SelectAll => {
                if !expressions.is_empty() {
                    self.select_all = true;
                    self.selection = None;
                }
                EventOutcome::none()
            }
            InputEvent::ClickSuggestion(index) => self.on_click_suggestion(index, expressions, now),
            InputEvent::ClickToken(cursor) => self.on_click_token(cursor, false, expressions, now),
            InputEvent::DoubleClickToken(cursor) => {
                self.on_click_token(cursor, true, expressions, now)
            }
            InputEvent::CustomInputConfirm { raw, display } => {
                self.on_custom_confirm(raw, display, expressions, now)
            }
            InputEvent::CustomInputCancel => self.on_custom_cancel(),
        }
    }

    /// Collect due fetch requests from the active async suggestion source.
    /// Call from the host's timer/idle loop while a value entry is active.
    pub fn tick(&mut self, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.step == BuildStep::EnteringValue && !self.draft.custom_pending {
            if let Some(ac) = self.active_autocompleter() {
                let mut ac = ac.borrow_mut();
                while let Some(request) = ac.take_due_fetch(now) {
                    effects.push(Effect::Fetch(request));
                }
            }
        }
        effects
    }

    /// Deliver the result of an earlier [`Effect::Fetch`]. Stale sequence
    /// numbers are discarded by the source.
    pub fn resolve_fetch(
        &mut self,
        seq: u64,
        result: std::result::Result<Vec<AutocompleteItem>, String>,
        expressions: &[FilterExpression],
        now: Instant,
    ) {
        let Some(ac) = self.active_autocompleter() else {
            return;
        };
        ac.borrow_mut().resolve_fetch(seq, result);
        if self.step == BuildStep::EnteringValue {
            self.refresh_suggestions(expressions, now);
        }
    }

    // ------------------------------------------------------------------
    // Focus / blur / typing
    // ------------------------------------------------------------------

    fn on_focus(&mut self, expressions: &[FilterExpression], now: Instant) -> EventOutcome {
        self.cancel_active_fetch();
        self.selection = None;
        self.select_all = false;
        self.edit = None;
        self.draft.clear();
        self.input.clear();
        self.input_error = None;
        self.step = self.resume_step(expressions);
        self.refresh_suggestions(expressions, now);
        EventOutcome::none()
    }

    fn on_blur(&mut self) -> EventOutcome {
        self.cancel_active_fetch();
        self.draft.clear();
        self.edit = None;
        self.selection = None;
        self.select_all = false;
        self.input.clear();
        self.input_error = None;
        self.step = BuildStep::Idle;
        self.clear_items();
        EventOutcome::none()
    }

    fn on_set_input(
        &mut self,
        text: String,
        expressions: &[FilterExpression],
        now: Instant,
    ) -> EventOutcome {
        // Typing always clears token selection.
        self.selection = None;
        self.select_all = false;
        self.input_error = None;

        if let Some(edit) = &mut self.edit {
            edit.input = text;
            self.refresh_suggestions(expressions, now);
            return EventOutcome::none();
        }

        if self.step == BuildStep::Idle {
            self.step = self.resume_step(expressions);
        }
        self.input = text;
        if self.step == BuildStep::EnteringValue && !self.draft.custom_pending {
            if let Some(ac) = self.active_autocompleter() {
                ac.borrow_mut().on_query_change(&self.input, now);
            }
        }
        self.refresh_suggestions(expressions, now);
        EventOutcome::none()
    }

    // ------------------------------------------------------------------
    // Enter / Escape
    // ------------------------------------------------------------------

    fn on_enter(&mut self, expressions: &[FilterExpression], now: Instant) -> EventOutcome {
        if self.edit.is_some() {
            return self.confirm_edit(expressions, now);
        }
        if self.select_all {
            return EventOutcome::none();
        }
        if let Some(cursor) = self.selection {
            return self.begin_edit(cursor, expressions, now);
        }
        match self.step {
            BuildStep::Idle => EventOutcome::none(),
            BuildStep::SelectingField => self.choose_field(self.highlighted, expressions, now),
            BuildStep::SelectingOperator => {
                self.choose_operator(self.highlighted, expressions, now)
            }
            BuildStep::EnteringValue => self.enter_value(expressions, now),
            BuildStep::SelectingConnector => {
                self.choose_connector(self.highlighted, expressions, now)
            }
        }
    }

    fn on_escape(&mut self) -> EventOutcome {
        if let Some(edit) = self.edit.take() {
            // The edit is discarded; the token stays selected.
            self.selection = Some(TokenCursor::new(edit.index, edit.target.kind()));
            self.clear_items();
            return EventOutcome::none();
        }
        if self.select_all {
            self.select_all = false;
            return EventOutcome::none();
        }
        if self.selection.is_some() {
            self.selection = None;
            return EventOutcome::none();
        }
        if self.step != BuildStep::Idle {
            self.cancel_active_fetch();
            self.draft.clear();
            self.input.clear();
            self.input_error = None;
            self.step = BuildStep::Idle;
            self.clear_items();
        }
        EventOutcome::none()
    }

    // ------------------------------------------------------------------
    // Token navigation and deletion
    // ------------------------------------------------------------------

    fn on_arrow_left(&mut self, expressions: &[FilterExpression]) -> EventOutcome {
        if self.edit.is_some() || !self.input.is_empty() {
            return EventOutcome::none();
        }
        self.select_all = false;
        let target = match self.selection {
            None => tokens::last_cursor(expressions),
            Some(cursor) => Some(tokens::prev_cursor(expressions, cursor)),
        };
        if let Some(cursor) = target {
            self.abandon_draft();
            self.selection = Some(cursor);
        }
        EventOutcome::none()
    }

    fn on_arrow_right(
        &mut self,
        expressions: &[FilterExpression],
        now: Instant,
    ) -> EventOutcome {
        if self.edit.is_some() || !self.input.is_empty() {
            return EventOutcome::none();
        }
        if self.select_all {
            self.select_all = false;
            return EventOutcome::none();
        }
        let Some(cursor) = self.selection else {
            return EventOutcome::none();
        };
        self.selection = tokens::next_cursor(expressions, cursor);
        if self.selection.is_none() {
            // Walked past the last token: focus returns to the text input.
            self.step = self.resume_step(expressions);
            self.refresh_suggestions(expressions, now);
        }
        EventOutcome::none()
    }

    fn on_delete(&mut self, expressions: &[FilterExpression], now: Instant) -> EventOutcome {
        if self.select_all {
            self.select_all = false;
            self.selection = None;
            self.input.clear();
            let list: Vec<FilterExpression> = Vec::new();
            self.step = self.resume_step(&list);
            self.refresh_suggestions(&list, now);
            return EventOutcome::changed(list)
                .with_effect(Effect::Announce("Cleared all filters".to_string()));
        }
        if self.edit.is_some() {
            return EventOutcome::none();
        }
        let Some(cursor) = self.selection else {
            return EventOutcome::none();
        };
        let Some(removed) = expressions.get(cursor.index) else {
            self.selection = None;
            return EventOutcome::none();
        };
        let announce = format!("Removed filter: {}", removed.condition.field.label);
        let list = tokens::remove_expression(expressions, cursor.index);
        self.selection = None;
        self.step = self.resume_step(&list);
        self.refresh_suggestions(&list, now);

        let mut outcome = EventOutcome::changed(list.clone());
        let report = validate_expressions(&list, &self.schema);
        if !report.valid {
            outcome.effects.push(Effect::Errors(report.errors));
        }
        outcome.effects.push(Effect::Announce(announce));
        outcome
    }

    fn on_backspace(&mut self, expressions: &[FilterExpression], now: Instant) -> EventOutcome {
        if self.select_all || self.selection.is_some() {
            return self.on_delete(expressions, now);
        }
        if self.edit.is_none() && self.input.is_empty() && self.draft.is_empty() {
            if let Some(cursor) = tokens::last_cursor(expressions) {
                self.abandon_draft();
                self.selection = Some(cursor);
            }
        }
        EventOutcome::none()
    }

    fn on_click_token(
        &mut self,
        cursor: TokenCursor,
        double: bool,
        expressions: &[FilterExpression],
        now: Instant,
    ) -> EventOutcome {
        if !tokens::cursor_exists(expressions, cursor) {
            return EventOutcome::none();
        }
        // Selecting a token discards any in-progress partial expression.
        self.abandon_draft();
        self.edit = None;
        self.select_all = false;
        self.selection = Some(cursor);
        if double && cursor.kind.is_editable() {
            return self.begin_edit(cursor, expressions, now);
        }
        EventOutcome::none()
    }

    // ------------------------------------------------------------------
    // Step transitions
    // ------------------------------------------------------------------

    fn on_click_suggestion(
        &mut self,
        index: usize,
        expressions: &[FilterExpression],
        now: Instant,
    ) -> EventOutcome {
        if index >= self.items.len() {
            return EventOutcome::none();
        }
        self.highlighted = index;
        if self.edit.is_some() {
            return self.confirm_edit(expressions, now);
        }
        match self.step {
            BuildStep::Idle => EventOutcome::none(),
            BuildStep::SelectingField => self.choose_field(index, expressions, now),
            BuildStep::SelectingOperator => self.choose_operator(index, expressions, now),
            BuildStep::EnteringValue => self.enter_value(expressions, now),
            BuildStep::SelectingConnector => self.choose_connector(index, expressions, now),
        }
    }

    fn choose_field(
        &mut self,
        index: usize,
        expressions: &[FilterExpression],
        now: Instant,
    ) -> EventOutcome {
        if index >= self.items.len() {
            return EventOutcome::none();
        }
        let draft_field = if self.freeform_offer && index == self.items.len() - 1 {
            let name = self.input.trim().to_string();
            let Some(freeform) = self.schema.freeform.as_ref() else {
                return EventOutcome::none();
            };
            DraftField {
                value: FieldValue {
                    key: name.clone(),
                    label: name,
                    field_type: freeform.effective_type(),
                },
                operators: freeform.effective_operators(),
                value_required: true,
                freeform: true,
            }
        } else {
            let key = self.items[index].key.clone();
            let Some(config) = self.schema.field(&key) else {
                return EventOutcome::none();
            };
            DraftField {
                value: config.to_value(),
                operators: config.operators.clone(),
                value_required: config.value_required,
                freeform: false,
            }
        };
        self.draft.clear();
        self.draft.field = Some(draft_field);
        self.input.clear();
        self.step = BuildStep::SelectingOperator;
        self.refresh_suggestions(expressions, now);
        EventOutcome::none()
    }

    fn choose_operator(
        &mut self,
        index: usize,
        expressions: &[FilterExpression],
        now: Instant,
    ) -> EventOutcome {
        let Some(item) = self.items.get(index) else {
            return EventOutcome::none();
        };
        let Some(field) = &self.draft.field else {
            return EventOutcome::none();
        };
        let Some(operator) = field.operators.iter().find(|op| op.key == item.key).cloned() else {
            return EventOutcome::none();
        };
        self.draft.operator = Some(operator.clone());
        self.draft.slots.clear();
        self.input.clear();
        self.step = BuildStep::EnteringValue;

        let mut outcome = EventOutcome::none();
        if let Some(custom) = &operator.custom_input {
            self.draft.custom_pending = true;
            outcome.effects.push(Effect::OpenCustomInput(custom.clone()));
        } else if let Some(ac) = self.active_autocompleter() {
            ac.borrow_mut().on_query_change("", now);
        }
        self.refresh_suggestions(expressions, now);
        outcome
    }

    fn choose_connector(
        &mut self,
        index: usize,
        expressions: &[FilterExpression],
        now: Instant,
    ) -> EventOutcome {
        let Some(item) = self.items.get(index) else {
            return EventOutcome::none();
        };
        let connector = match item.key.as_str() {
            "and" => Connector::And,
            "or" => Connector::Or,
            _ => return EventOutcome::none(),
        };
        let mut list = expressions.to_vec();
        let Some(last) = list.last_mut() else {
            return EventOutcome::none();
        };
        last.connector = Some(connector);
        self.input.clear();
        self.step = BuildStep::SelectingField;
        self.refresh_suggestions(&list, now);
        EventOutcome::changed(list)
    }

    // ------------------------------------------------------------------
    // Value entry and commit
    // ------------------------------------------------------------------

    fn enter_value(&mut self, expressions: &[FilterExpression], now: Instant) -> EventOutcome {
        if self.draft.custom_pending {
            return EventOutcome::none();
        }
        let Some(operator) = self.draft.operator.clone() else {
            return EventOutcome::none();
        };
        if let Some(mv) = operator.multi_value.clone() {
            return self.enter_multi_value(&mv, expressions, now);
        }

        let text = self.input.trim().to_string();
        if text.is_empty() && self.items.is_empty() {
            if !self.effective_value_required(&operator) {
                let value = self.build_value(Value::Null, String::new(), None);
                return self.commit(value, expressions, now);
            }
            return EventOutcome::none();
        }
        let Some((raw, display)) = self.current_entry() else {
            return EventOutcome::none();
        };
        let value = self.build_value(raw, display, None);
        if let Some(reason) = self.validate_value(&value) {
            self.input_error = Some(reason.clone());
            return EventOutcome::none().with_effect(Effect::Announce(reason));
        }
        self.commit(value, expressions, now)
    }

    fn enter_multi_value(
        &mut self,
        mv: &MultiValue,
        expressions: &[FilterExpression],
        now: Instant,
    ) -> EventOutcome {
        let text_empty = self.input.trim().is_empty();
        if mv.is_unbounded() && text_empty && !self.draft.slots.is_empty() {
            return self.commit_multi(mv, expressions, now);
        }
        let Some((raw, display)) = self.current_entry() else {
            return EventOutcome::none();
        };
        let slot_value = ConditionValue {
            raw: raw.clone(),
            display: display.clone(),
            serialized: display.clone(),
        };
        if let Some(reason) = self.validate_value(&slot_value) {
            self.input_error = Some(reason.clone());
            return EventOutcome::none().with_effect(Effect::Announce(reason));
        }
        self.draft.slots.push(ValueSlot { raw, display });
        self.input.clear();

        if !mv.is_unbounded() && self.draft.slots.len() >= mv.count.max(0) as usize {
            return self.commit_multi(mv, expressions, now);
        }
        if let Some(ac) = self.active_autocompleter() {
            ac.borrow_mut().on_query_change("", now);
        }
        self.refresh_suggestions(expressions, now);
        EventOutcome::none()
    }

    fn commit_multi(
        &mut self,
        mv: &MultiValue,
        expressions: &[FilterExpression],
        now: Instant,
    ) -> EventOutcome {
        let raws: Vec<Value> = self.draft.slots.iter().map(|s| s.raw.clone()).collect();
        let display = self
            .draft
            .slots
            .iter()
            .map(|s| s.display.as_str())
            .collect::<Vec<_>>()
            .join(&mv.separator);
        let value = self.build_value(Value::Array(raws), display, Some(&mv.separator));
        self.commit(value, expressions, now)
    }

    fn commit(
        &mut self,
        value: ConditionValue,
        expressions: &[FilterExpression],
        now: Instant,
    ) -> EventOutcome {
        let Some(field) = self.draft.field.clone() else {
            return EventOutcome::none();
        };
        let Some(operator) = self.draft.operator.clone() else {
            return EventOutcome::none();
        };
        self.cancel_active_fetch();

        let mut condition = Condition {
            field: field.value.clone(),
            operator: operator.to_value(),
            value,
        };
        // A field-level serializer already ran; otherwise the schema-level
        // hook may override the default.
        let field_hook = self
            .schema
            .field(&field.value.key)
            .is_some_and(|c| c.serialize.is_some());
        if !field_hook {
            if let Some(hook) = self.schema.serialize_value.as_deref() {
                if let Some(serialized) = hook(&condition) {
                    condition.value.serialized = serialized;
                }
            }
        }

        let announce = format!(
            "Added filter: {} {} {}",
            condition.field.label,
            condition.operator.display(),
            condition.value.display
        );
        let mut list = expressions.to_vec();
        list.push(FilterExpression::new(condition));

        self.draft.clear();
        self.input.clear();
        self.input_error = None;
        self.step = if self.schema.can_add(list.len()) {
            BuildStep::SelectingConnector
        } else {
            BuildStep::Idle
        };
        self.refresh_suggestions(&list, now);

        let mut outcome = EventOutcome::changed(list.clone());
        let report = validate_expressions(&list, &self.schema);
        if !report.valid {
            outcome.effects.push(Effect::Errors(report.errors));
        }
        outcome.effects.push(Effect::Announce(announce));
        outcome
    }

    fn on_custom_confirm(
        &mut self,
        raw: Value,
        display: String,
        expressions: &[FilterExpression],
        now: Instant,
    ) -> EventOutcome {
        if !self.draft.custom_pending {
            return EventOutcome::none();
        }
        self.draft.custom_pending = false;
        let value = self.build_value(raw, display, None);
        self.commit(value, expressions, now)
    }

    fn on_custom_cancel(&mut self) -> EventOutcome {
        if !self.draft.custom_pending {
            return EventOutcome::none();
        }
        // Dismissing the widget abandons the whole partial expression.
        self.abandon_draft();
        EventOutcome::none()
    }

    // ------------------------------------------------------------------
    // In-place token editing
    // ------------------------------------------------------------------

    fn begin_edit(
        &mut self,
        cursor: TokenCursor,
        expressions: &[FilterExpression],
        now: Instant,
    ) -> EventOutcome {
        let Some(target) = EditTarget::from_kind(cursor.kind) else {
            return EventOutcome::none();
        };
        let Some(expr) = expressions.get(cursor.index) else {
            return EventOutcome::none();
        };
        if target == EditTarget::Connector && expr.connector.is_none() {
            return EventOutcome::none();
        }
        let input = match target {
            EditTarget::Value => expr.condition.value.display.clone(),
            _ => String::new(),
        };
        self.selection = None;
        self.edit = Some(EditSession {
            index: cursor.index,
            target,
            input,
            field_key: expr.condition.field.key.clone(),
        });
        self.refresh_suggestions(expressions, now);

        // Pre-highlight the current choice in the inline list.
        let current_key = match target {
            EditTarget::Operator => Some(expr.condition.operator.key.clone()),
            EditTarget::Connector => expr.connector.map(|c| match c {
                Connector::And => "and".to_string(),
                Connector::Or => "or".to_string(),
            }),
            EditTarget::Value => None,
        };
        if let Some(key) = current_key {
            if let Some(pos) = self.items.iter().position(|item| item.key == key) {
                self.highlighted = pos;
            }
        }
        EventOutcome::none()
    }

    fn confirm_edit(&mut self, expressions: &[FilterExpression], now: Instant) -> EventOutcome {
        let Some(edit) = self.edit.clone() else {
            return EventOutcome::none();
        };
        let mut list = expressions.to_vec();
        let Some(expr) = list.get_mut(edit.index) else {
            self.edit = None;
            return EventOutcome::none();
        };

        match edit.target {
            EditTarget::Operator => {
                let Some(item) = self.items.get(self.highlighted) else {
                    return EventOutcome::none();
                };
                let operators = self.schema.operators_for(&edit.field_key).unwrap_or_default();
                let Some(operator) = operators.iter().find(|op| op.key == item.key) else {
                    return EventOutcome::none();
                };
                expr.condition.operator = operator.to_value();
            }
            EditTarget::Connector => {
                let Some(item) = self.items.get(self.highlighted) else {
                    return EventOutcome::none();
                };
                let connector = match item.key.as_str() {
                    "and" => Connector::And,
                    "or" => Connector::Or,
                    _ => return EventOutcome::none(),
                };
                expr.connector = Some(connector);
            }
            EditTarget::Value => {
                let operators = self.schema.operators_for(&edit.field_key).unwrap_or_default();
                let operator = operators
                    .iter()
                    .find(|op| op.key == expr.condition.operator.key);
                expr.condition.value =
                    self.rebuild_value(&edit.field_key, operator, edit.input.trim());
            }
        }

        self.edit = None;
        self.selection = None;
        self.step = self.resume_step(&list);
        self.refresh_suggestions(&list, now);

        let mut outcome = EventOutcome::changed(list.clone());
        let report = validate_expressions(&list, &self.schema);
        if !report.valid {
            outcome.effects.push(Effect::Errors(report.errors));
        }
        outcome
            .effects
            .push(Effect::Announce("Filter updated".to_string()));
        outcome
    }

    // ------------------------------------------------------------------
    // Value assembly
    // ------------------------------------------------------------------

    /// Highlighted suggestion when the filtered list is non-empty, else the
    /// typed text parsed into a raw value.
    fn current_entry(&self) -> Option<(Value, String)> {
        if !self.items.is_empty() {
            let item = self.items.get(self.highlighted)?;
            return Some((item.raw(), item.label.clone()));
        }
        let text = self.input.trim();
        if text.is_empty() {
            return None;
        }
        let field_key = self.draft.field.as_ref().map(|f| f.value.key.clone());
        let raw = self.parse_raw(field_key.as_deref(), text);
        let display = self.display_for(&raw, text);
        Some((raw, display))
    }

    fn parse_raw(&self, field_key: Option<&str>, text: &str) -> Value {
        if let Some(ac) = self.autocompleter_for(field_key) {
            if let Some(raw) = ac.borrow().parse(text) {
                return raw;
            }
        }
        let field_type = field_key
            .and_then(|key| self.schema.field(key).map(|f| f.field_type))
            .or_else(|| self.draft.field.as_ref().map(|f| f.value.field_type))
            .unwrap_or(FieldType::String);
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

    fn display_for(&self, raw: &Value, typed: &str) -> String {
        let field_key = self.draft.field.as_ref().map(|f| f.value.key.clone());
        if let Some(ac) = self.autocompleter_for(field_key.as_deref()) {
            if let Some(display) = ac.borrow().format(raw) {
                return display;
            }
        }
        typed.to_string()
    }

    fn build_value(&self, raw: Value, display: String, separator: Option<&str>) -> ConditionValue {
        let serialized = self.serialized_for(&raw, separator);
        ConditionValue {
            raw,
            display,
            serialized,
        }
    }

    fn serialized_for(&self, raw: &Value, separator: Option<&str>) -> String {
        if let Some(field) = self.draft.field.as_ref() {
            if let Some(config) = self.schema.field(&field.value.key) {
                if let Some(serialize) = config.serialize.as_deref() {
                    return serialize(raw);
                }
            }
        }
        default_serialize(raw, separator)
    }

    /// Rebuild a condition value from edited display text.
    fn rebuild_value(
        &self,
        field_key: &str,
        operator: Option<&OperatorConfig>,
        text: &str,
    ) -> ConditionValue {
        if let Some(mv) = operator.and_then(|op| op.multi_value.as_ref()) {
            let sep = mv.separator.trim();
            let parts: Vec<String> = if sep.is_empty() {
                text.split_whitespace().map(str::to_string).collect()
            } else {
                text.split(sep)
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect()
            };
            let raws: Vec<Value> = parts
                .iter()
                .map(|p| self.parse_raw(Some(field_key), p))
                .collect();
            let display = parts.join(&mv.separator);
            let raw = Value::Array(raws);
            let serialized = match self.schema.field(field_key).and_then(|c| c.serialize.as_deref()) {
                Some(serialize) => serialize(&raw),
                None => default_serialize(&raw, Some(&mv.separator)),
            };
            return ConditionValue {
                raw,
                display,
                serialized,
            };
        }

        let raw = self.parse_raw(Some(field_key), text);
        let display = match self.autocompleter_for(Some(field_key)) {
            Some(ac) => ac.borrow().format(&raw).unwrap_or_else(|| text.to_string()),
            None => text.to_string(),
        };
        let serialized = match self.schema.field(field_key).and_then(|c| c.serialize.as_deref()) {
            Some(serialize) => serialize(&raw),
            None => default_serialize(&raw, None),
        };
        ConditionValue {
            raw,
            display,
            serialized,
        }
    }

    fn validate_value(&self, value: &ConditionValue) -> Option<String> {
        let field_key = self.draft.field.as_ref().map(|f| f.value.key.clone());
        let ac = self.autocompleter_for(field_key.as_deref())?;
        let verdict = ac.borrow().validate(value);
        verdict
    }

    // ------------------------------------------------------------------
    // Suggestion list maintenance
    // ------------------------------------------------------------------

    fn refresh_suggestions(&mut self, expressions: &[FilterExpression], now: Instant) {
        let (items, offer) = if self.edit.is_some() {
            (self.edit_items(), false)
        } else {
            match self.step {
                BuildStep::Idle => (Vec::new(), false),
                BuildStep::SelectingField => self.field_items(expressions),
                BuildStep::SelectingOperator => (self.operator_items(), false),
                BuildStep::EnteringValue => (self.value_items(expressions, now), false),
                BuildStep::SelectingConnector => (self.connector_items(&self.input), false),
            }
        };
        self.freeform_offer = offer;
        self.set_items(items);
    }

    fn field_items(
        &self,
        expressions: &[FilterExpression],
    ) -> (Vec<AutocompleteItem>, bool) {
        let query = normalize_query(&self.input);
        let mut items = Vec::new();
        for config in &self.schema.fields {
            if !config.allow_multiple
                && expressions
                    .iter()
                    .any(|e| e.condition.field.key == config.key)
            {
                continue;
            }
            let matched = query.is_empty()
                || normalize_query(&config.key).starts_with(&query)
                || normalize_query(&config.label).starts_with(&query);
            if !matched {
                continue;
            }
            let mut item = AutocompleteItem::new(&config.key, &config.label);
            item.description = config.description.clone();
            item.group = config.group.clone();
            items.push(item);
        }

        let trimmed = self.input.trim();
        let mut offer = false;
        if let Some(freeform) = &self.schema.freeform {
            if !trimmed.is_empty()
                && self.schema.field_matching(trimmed).is_none()
                && matches!(freeform.check_field_name(trimmed), FieldNameCheck::Valid)
            {
                items.push(AutocompleteItem::new(
                    trimmed,
                    freeform.create_label_for(trimmed),
                ));
                offer = true;
            }
        }
        (items, offer)
    }

    fn operator_items(&self) -> Vec<AutocompleteItem> {
        let Some(field) = &self.draft.field else {
            return Vec::new();
        };
        let query = normalize_query(&self.input);
        field
            .operators
            .iter()
            .filter(|op| {
                query.is_empty()
                    || normalize_query(&op.key).contains(&query)
                    || normalize_query(&op.label).contains(&query)
                    || op
                        .symbol
                        .as_deref()
                        .is_some_and(|s| normalize_query(s).contains(&query))
            })
            .map(|op| {
                let mut item = AutocompleteItem::new(&op.key, &op.label);
                item.description = op.symbol.clone();
                item
            })
            .collect()
    }

    fn value_items(&self, expressions: &[FilterExpression], now: Instant) -> Vec<AutocompleteItem> {
        if self.draft.custom_pending {
            return Vec::new();
        }
        let Some(ac) = self.active_autocompleter() else {
            return Vec::new();
        };
        let field = self.draft.field.as_ref().map(|f| &f.value);
        let ctx = SuggestionContext {
            input: &self.input,
            field,
            operator: self.draft.operator.as_ref(),
            expressions,
            schema: &self.schema,
        };
        ac.borrow_mut().suggestions(&ctx, now)
    }

    fn connector_items(&self, filter: &str) -> Vec<AutocompleteItem> {
        let labels = self.schema.connector_labels();
        let query = normalize_query(filter);
        [("and", labels.and), ("or", labels.or)]
            .into_iter()
            .filter(|(key, label)| {
                query.is_empty()
                    || normalize_query(label).starts_with(&query)
                    || key.starts_with(query.as_str())
            })
            .map(|(key, label)| AutocompleteItem::new(key, label))
            .collect()
    }

    fn edit_items(&self) -> Vec<AutocompleteItem> {
        let Some(edit) = &self.edit else {
            return Vec::new();
        };
        match edit.target {
            EditTarget::Value => Vec::new(),
            EditTarget::Connector => self.connector_items(&edit.input),
            EditTarget::Operator => {
                let query = normalize_query(&edit.input);
                self.schema
                    .operators_for(&edit.field_key)
                    .unwrap_or_default()
                    .iter()
                    .filter(|op| {
                        query.is_empty()
                            || normalize_query(&op.key).contains(&query)
                            || normalize_query(&op.label).contains(&query)
                    })
                    .map(|op| AutocompleteItem::new(&op.key, &op.label))
                    .collect()
            }
        }
    }

    /// Install a freshly filtered suggestion list. The highlighted index
    /// resets to 0 whenever the list changes, and clamps otherwise.
    fn set_items(&mut self, items: Vec<AutocompleteItem>) {
        let changed = items.len() != self.items.len()
            || items
                .iter()
                .zip(&self.items)
                .any(|(a, b)| a.key != b.key || a.label != b.label);
        self.items = items;
        if changed {
            self.highlighted = 0;
        } else if self.highlighted >= self.items.len() {
            self.highlighted = self.items.len().saturating_sub(1);
        }
    }

    fn clear_items(&mut self) {
        self.items.clear();
        self.highlighted = 0;
        self.freeform_offer = false;
    }

    // ------------------------------------------------------------------
    // Shared helpers
    // ------------------------------------------------------------------

    fn resume_step(&self, expressions: &[FilterExpression]) -> BuildStep {
        if expressions.is_empty() {
            return BuildStep::SelectingField;
        }
        if !self.schema.can_add(expressions.len()) {
            return BuildStep::Idle;
        }
        match expressions.last().and_then(|e| e.connector) {
            None => BuildStep::SelectingConnector,
            Some(_) => BuildStep::SelectingField,
        }
    }

    /// Discard the partial expression without touching the committed list.
    fn abandon_draft(&mut self) {
        self.cancel_active_fetch();
        self.draft.clear();
        self.input.clear();
        self.input_error = None;
        self.step = BuildStep::Idle;
        self.clear_items();
    }

    fn effective_value_required(&self, operator: &OperatorConfig) -> bool {
        operator.value_required.unwrap_or(
            self.draft
                .field
                .as_ref()
                .map(|f| f.value_required)
                .unwrap_or(true),
        )
    }

    fn active_autocompleter(&self) -> Option<AutocompleterHandle> {
        let field = self.draft.field.as_ref()?;
        self.autocompleter_for(Some(&field.value.key))
    }

    fn autocompleter_for(&self, field_key: Option<&str>) -> Option<AutocompleterHandle> {
        self.schema
            .field(field_key?)
            .and_then(|config| config.value_autocompleter.clone())
    }

    fn cancel_active_fetch(&self) {
        if let Some(ac) = self.active_autocompleter() {
            ac.borrow_mut().cancel_pending();
        }
    }
}

fn default_serialize(raw: &Value, separator: Option<&str>) -> String {
    match raw {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        // Integral floats print without the trailing ".0" so typed and
        // parsed numbers serialize identically.
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .map(|v| default_serialize(v, None))
            .collect::<Vec<_>>()
            .join(separator.unwrap_or(", ")),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldConfig, FreeformFields, OperatorConfig};

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
                "status",
                "Status",
                FieldType::String,
                vec![OperatorConfig::new("eq", "equals")],
            )
            .single_use(),
        ])
    }

    fn focused(schema: FilterSchema) -> (FilterBuilder, Instant) {
        let mut builder = FilterBuilder::new(schema);
        let now = Instant::now();
        builder.handle_event(InputEvent::Focus, &[], now);
        (builder, now)
    }

    #[test]
    fn test_focus_enters_field_selection_with_all_fields() {
        let (builder, _) = focused(schema());
        assert_eq!(builder.step(), BuildStep::SelectingField);
        let keys: Vec<_> = builder.suggestions().iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["name", "status"]);
    }

    #[test]
    fn test_prefix_filter_and_highlight_reset() {
        let (mut builder, now) = focused(schema());
        builder.handle_event(InputEvent::ArrowDown, &[], now);
        assert_eq!(builder.highlighted(), 1);

        builder.handle_event(InputEvent::SetInput("st".to_string()), &[], now);
        let keys: Vec<_> = builder.suggestions().iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["status"]);
        assert_eq!(builder.highlighted(), 0);
    }

    #[test]
    fn test_exact_match_requires_explicit_confirmation() {
        let (mut builder, now) = focused(schema());
        let outcome = builder.handle_event(InputEvent::SetInput("name".to_string()), &[], now);
        // No auto-select: still choosing a field until Enter or click.
        assert!(outcome.expressions.is_none());
        assert_eq!(builder.step(), BuildStep::SelectingField);
    }

    #[test]
    fn test_arrow_clamps_at_bounds() {
        let (mut builder, now) = focused(schema());
        builder.handle_event(InputEvent::ArrowUp, &[], now);
        assert_eq!(builder.highlighted(), 0);
        builder.handle_event(InputEvent::ArrowDown, &[], now);
        builder.handle_event(InputEvent::ArrowDown, &[], now);
        builder.handle_event(InputEvent::ArrowDown, &[], now);
        assert_eq!(builder.highlighted(), 1);
    }

    #[test]
    fn test_field_then_operator_transitions() {
        let (mut builder, now) = focused(schema());
        builder.handle_event(InputEvent::Enter, &[], now);
        assert_eq!(builder.step(), BuildStep::SelectingOperator);
        let keys: Vec<_> = builder.suggestions().iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["contains", "eq"]);

        builder.handle_event(InputEvent::Enter, &[], now);
        assert_eq!(builder.step(), BuildStep::EnteringValue);
    }

    #[test]
    fn test_single_use_field_excluded_once_used() {
        let (mut builder, now) = focused(schema());
        // Build status = x.
        builder.handle_event(InputEvent::SetInput("status".to_string()), &[], now);
        builder.handle_event(InputEvent::Enter, &[], now);
        builder.handle_event(InputEvent::Enter, &[], now);
        builder.handle_event(InputEvent::SetInput("x".to_string()), &[], now);
        let outcome = builder.handle_event(InputEvent::Enter, &[], now);
        let list = outcome.expressions.unwrap();

        // Next cycle: connector then field; status is exhausted.
        builder.handle_event(InputEvent::Enter, &list, now);
        assert_eq!(builder.step(), BuildStep::SelectingField);
        let keys: Vec<_> = builder.suggestions().iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["name"]);
    }

    #[test]
    fn test_escape_resets_without_commit() {
        let (mut builder, now) = focused(schema());
        builder.handle_event(InputEvent::Enter, &[], now);
        builder.handle_event(InputEvent::Enter, &[], now);
        builder.handle_event(InputEvent::SetInput("half-typed".to_string()), &[], now);
        let outcome = builder.handle_event(InputEvent::Escape, &[], now);
        assert!(outcome.expressions.is_none());
        assert!(outcome.effects.is_empty());
        assert_eq!(builder.step(), BuildStep::Idle);
        assert!(builder.suggestions().is_empty());
    }

    #[test]
    fn test_whitespace_input_never_offers_create_field() {
        let schema = schema().with_freeform(FreeformFields::default());
        let (mut builder, now) = focused(schema);
        builder.handle_event(InputEvent::SetInput("   ".to_string()), &[], now);
        let labels: Vec<_> = builder
            .suggestions()
            .iter()
            .map(|i| i.label.as_str())
            .collect();
        assert!(!labels.iter().any(|l| l.starts_with("Create field")));
    }

    #[test]
    fn test_freeform_offer_appended_for_unknown_name() {
        let schema = schema().with_freeform(FreeformFields::default());
        let (mut builder, now) = focused(schema);
        builder.handle_event(InputEvent::SetInput("myVar".to_string()), &[], now);
        let last = builder.suggestions().last().unwrap();
        assert_eq!(last.key, "myVar");
        assert_eq!(last.label, "Create field \"myVar\"");
    }

    #[test]
    fn test_known_name_not_offered_as_freeform() {
        let schema = schema().with_freeform(FreeformFields::default());
        let (mut builder, now) = focused(schema);
        builder.handle_event(InputEvent::SetInput("Name".to_string()), &[], now);
        let labels: Vec<_> = builder
            .suggestions()
            .iter()
            .map(|i| i.label.as_str())
            .collect();
        assert_eq!(labels, vec!["Name"]);
    }

    #[test]
    fn test_default_serialize_shapes() {
        assert_eq!(default_serialize(&Value::Null, None), "");
        assert_eq!(default_serialize(&serde_json::json!("x"), None), "x");
        assert_eq!(default_serialize(&serde_json::json!(3.5), None), "3.5");
        assert_eq!(default_serialize(&serde_json::json!(true), None), "true");
        assert_eq!(
            default_serialize(&serde_json::json!(["a", 2]), Some("|")),
            "a|2"
        );
    }

    #[test]
    fn test_select_all_requires_expressions() {
        let (mut builder, now) = focused(schema());
        builder.handle_event(InputEvent::SelectAll, &[], now);
        assert!(!builder.select_all_active());
    }
}
