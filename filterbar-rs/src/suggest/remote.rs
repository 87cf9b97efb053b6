//! Async autocompleter: a debounced, host-driven suggestion source.
//!
//! The crate never performs I/O itself. When the typed query settles past
//! the debounce window, `take_due_fetch` yields a [`FetchRequest`] carrying
//! a sequence number; the host runs its transport and hands the result back
//! through `resolve_fetch`. A result is applied only when its sequence
//! number equals the latest issued one, so an older in-flight fetch that
//! arrives late is discarded regardless of arrival order. Cancellation
//! bumps the sequence, turning any still-pending deadline or in-flight
//! result into a no-op.

use super::{normalize_query, Autocompleter, AutocompleteItem, FetchRequest, SuggestionContext};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Pending {
    seq: u64,
    query: String,
    due: Instant,
    fired: bool,
}

#[derive(Debug, Clone)]
struct Resolved {
    query: String,
    items: Vec<AutocompleteItem>,
}

/// Wraps a host-side `(query) -> future<items>` source with debouncing, a
/// minimum-characters gate and last-writer-wins result application.
pub struct AsyncAutocompleter {
    debounce: Duration,
    min_chars: usize,
    latest_seq: u64,
    pending: Option<Pending>,
    resolved: Option<Resolved>,
}

impl AsyncAutocompleter {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            min_chars: 0,
            latest_seq: 0,
            pending: None,
            resolved: None,
        }
    }

    /// Suppress fetch scheduling until the query reaches `min_chars`
    /// characters (after trimming).
    pub fn with_min_chars(mut self, min_chars: usize) -> Self {
        self.min_chars = min_chars;
        self
    }

    /// Whether a fetch is scheduled or in flight.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Latest issued sequence number.
    pub fn latest_seq(&self) -> u64 {
        self.latest_seq
    }
}

impl Autocompleter for AsyncAutocompleter {
    fn suggestions(&mut self, ctx: &SuggestionContext<'_>, _now: Instant) -> Vec<AutocompleteItem> {
        let query = normalize_query(ctx.input);
        match &self.resolved {
            Some(resolved) if resolved.query == query => resolved.items.clone(),
            _ => Vec::new(),
        }
    }

    fn on_query_change(&mut self, query: &str, now: Instant) {
        let normalized = normalize_query(query);
        if normalized.chars().count() < self.min_chars {
            self.cancel_pending();
            return;
        }
        if let Some(pending) = &self.pending {
            if pending.query == normalized && !pending.fired {
                return;
            }
        }
        self.latest_seq += 1;
        self.pending = Some(Pending {
            seq: self.latest_seq,
            query: normalized,
            due: now + self.debounce,
            fired: false,
        });
    }

    fn take_due_fetch(&mut self, now: Instant) -> Option<FetchRequest> {
        let pending = self.pending.as_mut()?;
        if pending.fired || now < pending.due {
            return None;
        }
        pending.fired = true;
        Some(FetchRequest {
            seq: pending.seq,
            query: pending.query.clone(),
        })
    }

    fn resolve_fetch(
        &mut self,
        seq: u64,
        result: std::result::Result<Vec<AutocompleteItem>, String>,
    ) {
        if seq != self.latest_seq {
            return;
        }
        let query = match self.pending.take() {
            Some(pending) if pending.seq == seq => pending.query,
            other => {
                self.pending = other;
                return;
            }
        };
        // A rejected source degrades to an empty list; the failure is never
        // surfaced to the caller.
        let items = result.unwrap_or_default();
        self.resolved = Some(Resolved { query, items });
    }

    fn cancel_pending(&mut self) {
        if self.pending.take().is_some() {
            self.latest_seq += 1;
        }
    }
}
