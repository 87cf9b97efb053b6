//! Combined autocompleter: merges results from multiple sources.

use super::{Autocompleter, AutocompleteItem, FetchRequest, SuggestionContext};
use crate::expression::ConditionValue;
use serde_json::Value;
use std::time::Instant;

/// Merges the results of several sub-autocompleters in order, preserving
/// each source's `group` on its items.
pub struct CombinedAutocompleter {
    sources: Vec<Box<dyn Autocompleter>>,
}

impl CombinedAutocompleter {
    pub fn new(sources: Vec<Box<dyn Autocompleter>>) -> Self {
        Self { sources }
    }
}

/// Merge several autocompleters into one.
pub fn combine_autocompleters(sources: Vec<Box<dyn Autocompleter>>) -> CombinedAutocompleter {
    CombinedAutocompleter::new(sources)
}

impl Autocompleter for CombinedAutocompleter {
    fn suggestions(&mut self, ctx: &SuggestionContext<'_>, now: Instant) -> Vec<AutocompleteItem> {
        self.sources
            .iter_mut()
            .flat_map(|source| source.suggestions(ctx, now))
            .collect()
    }

    fn on_query_change(&mut self, query: &str, now: Instant) {
        for source in &mut self.sources {
            source.on_query_change(query, now);
        }
    }

    fn take_due_fetch(&mut self, now: Instant) -> Option<FetchRequest> {
        // One request per call; callers drain by calling until `None`.
        self.sources
            .iter_mut()
            .find_map(|source| source.take_due_fetch(now))
    }

    fn resolve_fetch(
        &mut self,
        seq: u64,
        result: std::result::Result<Vec<AutocompleteItem>, String>,
    ) {
        // Sequence spaces are per source; each source discards numbers it
        // did not issue for its current pending query.
        for source in &mut self.sources {
            source.resolve_fetch(seq, result.clone());
        }
    }

    fn cancel_pending(&mut self) {
        for source in &mut self.sources {
            source.cancel_pending();
        }
    }

    fn validate(&self, value: &ConditionValue) -> Option<String> {
        // Valid if any source accepts the value; the first rejection is
        // reported only when every source rejects.
        let mut first_reason = None;
        for source in &self.sources {
            match source.validate(value) {
                None => return None,
                Some(reason) if first_reason.is_none() => first_reason = Some(reason),
                Some(_) => {}
            }
        }
        first_reason
    }

    fn format(&self, raw: &Value) -> Option<String> {
        self.sources.iter().find_map(|source| source.format(raw))
    }

    fn parse(&self, display: &str) -> Option<Value> {
        self.sources.iter().find_map(|source| source.parse(display))
    }
}
