//! Cached autocompleter: time-bounded memoization decorator.

use super::{normalize_query, Autocompleter, AutocompleteItem, FetchRequest, SuggestionContext};
use crate::expression::ConditionValue;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct Entry {
    items: Vec<AutocompleteItem>,
    expires_at: Instant,
}

/// Wraps any autocompleter with a TTL-bounded memo keyed by the normalized
/// query. Identical queries within the TTL window skip the underlying call;
/// expiry is checked lazily on lookup, there is no background eviction.
pub struct CachedAutocompleter {
    inner: Box<dyn Autocompleter>,
    ttl: Duration,
    entries: HashMap<String, Entry>,
}

impl CachedAutocompleter {
    pub fn new(inner: Box<dyn Autocompleter>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Drop all memoized entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Decorate an autocompleter with a TTL cache.
pub fn with_cache(inner: Box<dyn Autocompleter>, ttl: Duration) -> CachedAutocompleter {
    CachedAutocompleter::new(inner, ttl)
}

impl Autocompleter for CachedAutocompleter {
    fn suggestions(&mut self, ctx: &SuggestionContext<'_>, now: Instant) -> Vec<AutocompleteItem> {
        let key = normalize_query(ctx.input);

        if let Some(entry) = self.entries.get(&key) {
            if now < entry.expires_at {
                return entry.items.clone();
            }
            self.entries.remove(&key);
        }

        let items = self.inner.suggestions(ctx, now);
        // Empty result sets are not memoized: an async inner may simply not
        // have resolved yet.
        if !items.is_empty() {
            self.entries.insert(
                key,
                Entry {
                    items: items.clone(),
                    expires_at: now + self.ttl,
                },
            );
        }
        items
    }

    fn on_query_change(&mut self, query: &str, now: Instant) {
        self.inner.on_query_change(query, now);
    }

    fn take_due_fetch(&mut self, now: Instant) -> Option<FetchRequest> {
        self.inner.take_due_fetch(now)
    }

    fn resolve_fetch(
        &mut self,
        seq: u64,
        result: std::result::Result<Vec<AutocompleteItem>, String>,
    ) {
        self.inner.resolve_fetch(seq, result);
    }

    fn cancel_pending(&mut self) {
        self.inner.cancel_pending();
    }

    fn validate(&self, value: &ConditionValue) -> Option<String> {
        self.inner.validate(value)
    }

    fn format(&self, raw: &Value) -> Option<String> {
        self.inner.format(raw)
    }

    fn parse(&self, display: &str) -> Option<Value> {
        self.inner.parse(display)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FilterSchema;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Counts how often the underlying source is actually consulted.
    struct CountingSource {
        calls: Rc<Cell<usize>>,
        items: Vec<AutocompleteItem>,
    }

    impl Autocompleter for CountingSource {
        fn suggestions(
            &mut self,
            _ctx: &SuggestionContext<'_>,
            _now: Instant,
        ) -> Vec<AutocompleteItem> {
            self.calls.set(self.calls.get() + 1);
            self.items.clone()
        }
    }

    fn counting(keys: &[&str]) -> (Rc<Cell<usize>>, CachedAutocompleter) {
        let calls = Rc::new(Cell::new(0));
        let source = CountingSource {
            calls: calls.clone(),
            items: keys.iter().map(|k| AutocompleteItem::new(*k, *k)).collect(),
        };
        (
            calls,
            with_cache(Box::new(source), Duration::from_secs(60)),
        )
    }

    fn ask(ac: &mut CachedAutocompleter, input: &str, now: Instant) -> Vec<String> {
        let schema = FilterSchema::default();
        let ctx = SuggestionContext {
            input,
            field: None,
            operator: None,
            expressions: &[],
            schema: &schema,
        };
        ac.suggestions(&ctx, now).into_iter().map(|i| i.key).collect()
    }

    #[test]
    fn test_identical_queries_hit_cache() {
        let (calls, mut ac) = counting(&["a"]);
        let t0 = Instant::now();

        assert_eq!(ask(&mut ac, "query", t0), vec!["a"]);
        assert_eq!(ask(&mut ac, "query", t0 + Duration::from_secs(1)), vec!["a"]);
        // Normalization folds case and surrounding whitespace.
        assert_eq!(ask(&mut ac, " QUERY ", t0 + Duration::from_secs(2)), vec!["a"]);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_expired_entries_refetch() {
        let (calls, mut ac) = counting(&["a"]);
        let t0 = Instant::now();

        ask(&mut ac, "q", t0);
        ask(&mut ac, "q", t0 + Duration::from_secs(61));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_distinct_queries_miss() {
        let (calls, mut ac) = counting(&["a"]);
        let t0 = Instant::now();

        ask(&mut ac, "one", t0);
        ask(&mut ac, "two", t0);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_empty_results_are_not_memoized() {
        let (calls, mut ac) = counting(&[]);
        let t0 = Instant::now();

        ask(&mut ac, "q", t0);
        ask(&mut ac, "q", t0);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_clear_drops_entries() {
        let (calls, mut ac) = counting(&["a"]);
        let t0 = Instant::now();

        ask(&mut ac, "q", t0);
        ac.clear();
        ask(&mut ac, "q", t0);
        assert_eq!(calls.get(), 2);
    }
}
