//! Static list autocompleter with pluggable match modes.

use super::{normalize_query, Autocompleter, AutocompleteItem, SuggestionContext};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// How typed input is matched against item labels and keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Case-insensitive starts-with.
    Prefix,
    /// Case-insensitive contains.
    #[default]
    Substring,
    /// Subsequence match with gap tolerance; results are ranked.
    Fuzzy,
}

/// Filters a fixed item list by the typed input.
pub struct StaticAutocompleter {
    items: Vec<AutocompleteItem>,
    mode: MatchMode,
    max_results: Option<usize>,
}

impl StaticAutocompleter {
    pub fn new(items: Vec<AutocompleteItem>) -> Self {
        Self {
            items,
            mode: MatchMode::default(),
            max_results: None,
        }
    }

    pub fn with_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    fn matches(&self, query: &str, item: &AutocompleteItem) -> Option<f64> {
        if query.is_empty() {
            return Some(1.0);
        }
        let label = normalize_query(&item.label);
        let key = normalize_query(&item.key);
        match self.mode {
            MatchMode::Prefix => {
                (label.starts_with(query) || key.starts_with(query)).then_some(1.0)
            }
            MatchMode::Substring => (label.contains(query) || key.contains(query)).then_some(1.0),
            MatchMode::Fuzzy => {
                let score = subsequence_score(query, &label).max(subsequence_score(query, &key));
                (score > 0.0).then_some(score)
            }
        }
    }
}

impl Autocompleter for StaticAutocompleter {
    fn suggestions(&mut self, ctx: &SuggestionContext<'_>, _now: Instant) -> Vec<AutocompleteItem> {
        let query = normalize_query(ctx.input);
        let mut scored: Vec<(f64, &AutocompleteItem)> = self
            .items
            .iter()
            .filter_map(|item| self.matches(&query, item).map(|score| (score, item)))
            .collect();
        if self.mode == MatchMode::Fuzzy {
            scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        }
        let mut results: Vec<AutocompleteItem> =
            scored.into_iter().map(|(_, item)| item.clone()).collect();
        if let Some(max) = self.max_results {
            results.truncate(max);
        }
        results
    }
}

/// Subsequence match score between 0.0 and 1.0. All query characters must
/// appear in order; consecutive runs and a match at the start rank higher,
/// longer haystacks rank lower.
fn subsequence_score(query: &str, text: &str) -> f64 {
    let query_chars: Vec<char> = query.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();

    if query_chars.is_empty() {
        return 1.0;
    }
    if text_chars.is_empty() {
        return 0.0;
    }

    let mut query_idx = 0;
    let mut match_positions: Vec<usize> = Vec::new();
    for (text_idx, ch) in text_chars.iter().enumerate() {
        if query_idx < query_chars.len() && *ch == query_chars[query_idx] {
            match_positions.push(text_idx);
            query_idx += 1;
        }
    }
    if query_idx < query_chars.len() {
        return 0.0;
    }

    let mut score = 1.0;

    let mut consecutive_bonus: f64 = 0.0;
    for i in 1..match_positions.len() {
        if match_positions[i] == match_positions[i - 1] + 1 {
            consecutive_bonus += 0.1;
        }
    }
    score += consecutive_bonus.min(0.5);

    if match_positions.first() == Some(&0) {
        score += 0.2;
    }

    let length_ratio = query_chars.len() as f64 / text_chars.len() as f64;
    score *= length_ratio.sqrt();

    score.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FilterSchema;

    fn ctx_input(input: &str) -> (FilterSchema, String) {
        (FilterSchema::default(), input.to_string())
    }

    fn suggestions(ac: &mut StaticAutocompleter, input: &str) -> Vec<String> {
        let (schema, input) = ctx_input(input);
        let ctx = SuggestionContext {
            input: &input,
            field: None,
            operator: None,
            expressions: &[],
            schema: &schema,
        };
        ac.suggestions(&ctx, Instant::now())
            .into_iter()
            .map(|i| i.key)
            .collect()
    }

    fn items(keys: &[&str]) -> Vec<AutocompleteItem> {
        keys.iter().map(|k| AutocompleteItem::new(*k, *k)).collect()
    }

    #[test]
    fn test_prefix_mode() {
        let mut ac =
            StaticAutocompleter::new(items(&["active", "archived", "draft"])).with_mode(MatchMode::Prefix);
        assert_eq!(suggestions(&mut ac, "ar"), vec!["archived"]);
        assert_eq!(suggestions(&mut ac, "A"), vec!["active", "archived"]);
        assert!(suggestions(&mut ac, "x").is_empty());
    }

    #[test]
    fn test_substring_mode() {
        let mut ac = StaticAutocompleter::new(items(&["active", "archived", "draft"]));
        assert_eq!(suggestions(&mut ac, "chi"), vec!["archived"]);
        assert_eq!(suggestions(&mut ac, "a"), vec!["active", "archived", "draft"]);
    }

    #[test]
    fn test_fuzzy_mode_ranks_and_tolerates_gaps() {
        let mut ac = StaticAutocompleter::new(items(&["validate", "vault", "vlt-archive"]))
            .with_mode(MatchMode::Fuzzy);
        let got = suggestions(&mut ac, "vlt");
        assert_eq!(got.len(), 3);
        // The short text with a consecutive run ranks first.
        assert_eq!(got[0], "vault");
    }

    #[test]
    fn test_empty_input_returns_all() {
        let mut ac = StaticAutocompleter::new(items(&["a", "b"]));
        assert_eq!(suggestions(&mut ac, ""), vec!["a", "b"]);
    }

    #[test]
    fn test_max_results_truncates() {
        let mut ac = StaticAutocompleter::new(items(&["a1", "a2", "a3"])).with_max_results(2);
        assert_eq!(suggestions(&mut ac, "a").len(), 2);
    }

    #[test]
    fn test_subsequence_score_bounds() {
        assert_eq!(subsequence_score("xyz", "test"), 0.0);
        assert!(subsequence_score("test", "test") > 0.9);
        assert!(subsequence_score("tst", "test") > 0.0);
    }
}
