//! Date autocompleter: relative-date presets plus literal ISO dates.

use super::{normalize_query, Autocompleter, AutocompleteItem, SuggestionContext};
use crate::expression::ConditionValue;
use chrono::{Datelike, Duration, Local, NaiveDate, Weekday};
use serde_json::Value;
use std::time::Instant;

/// A relative-date preset offered as a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePreset {
    Today,
    Yesterday,
    ThisWeek,
    ThisMonth,
    Last7Days,
    Last30Days,
}

impl DatePreset {
    pub fn all() -> [DatePreset; 6] {
        [
            DatePreset::Today,
            DatePreset::Yesterday,
            DatePreset::ThisWeek,
            DatePreset::ThisMonth,
            DatePreset::Last7Days,
            DatePreset::Last30Days,
        ]
    }

    /// Stable key used as the serialized form.
    pub fn key(self) -> &'static str {
        match self {
            DatePreset::Today => "today",
            DatePreset::Yesterday => "yesterday",
            DatePreset::ThisWeek => "this-week",
            DatePreset::ThisMonth => "this-month",
            DatePreset::Last7Days => "last-7-days",
            DatePreset::Last30Days => "last-30-days",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DatePreset::Today => "Today",
            DatePreset::Yesterday => "Yesterday",
            DatePreset::ThisWeek => "This week",
            DatePreset::ThisMonth => "This month",
            DatePreset::Last7Days => "Last 7 days",
            DatePreset::Last30Days => "Last 30 days",
        }
    }

    pub fn from_key(key: &str) -> Option<DatePreset> {
        DatePreset::all().into_iter().find(|p| p.key() == key)
    }

    /// Inclusive date range the preset stands for, relative to `today`.
    /// Weeks start on Monday.
    pub fn range(self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            DatePreset::Today => (today, today),
            DatePreset::Yesterday => {
                let d = today - Duration::days(1);
                (d, d)
            }
            DatePreset::ThisWeek => (today.week(Weekday::Mon).first_day(), today),
            DatePreset::ThisMonth => {
                let first = today.with_day(1).unwrap_or(today);
                (first, today)
            }
            DatePreset::Last7Days => (today - Duration::days(6), today),
            DatePreset::Last30Days => (today - Duration::days(29), today),
        }
    }
}

/// Suggests relative-date presets and accepts literal `YYYY-MM-DD` input.
pub struct DateAutocompleter {
    today: NaiveDate,
}

impl DateAutocompleter {
    pub fn new() -> Self {
        Self {
            today: Local::now().date_naive(),
        }
    }

    /// Pin "today" for deterministic suggestion resolution.
    pub fn with_today(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Resolve a serialized value (preset key or ISO date) to an inclusive
    /// date range.
    pub fn resolve(&self, serialized: &str) -> Option<(NaiveDate, NaiveDate)> {
        if let Some(preset) = DatePreset::from_key(serialized) {
            return Some(preset.range(self.today));
        }
        parse_iso(serialized).map(|d| (d, d))
    }
}

impl Default for DateAutocompleter {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_iso(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok()
}

impl Autocompleter for DateAutocompleter {
    fn suggestions(&mut self, ctx: &SuggestionContext<'_>, _now: Instant) -> Vec<AutocompleteItem> {
        let query = normalize_query(ctx.input);
        let mut items = Vec::new();

        // A parseable literal date is offered first, as itself.
        if let Some(date) = parse_iso(ctx.input) {
            let iso = date.format("%Y-%m-%d").to_string();
            items.push(AutocompleteItem::new(iso.clone(), iso).with_group("Date"));
        }

        for preset in DatePreset::all() {
            let label = preset.label();
            if query.is_empty() || normalize_query(label).contains(&query) {
                items.push(
                    AutocompleteItem::new(preset.key(), label).with_group("Relative"),
                );
            }
        }

        items
    }

    fn validate(&self, value: &ConditionValue) -> Option<String> {
        let ok = match &value.raw {
            Value::String(s) => DatePreset::from_key(s).is_some() || parse_iso(s).is_some(),
            _ => false,
        };
        if ok {
            None
        } else {
            Some(format!(
                "'{}' is not a date (YYYY-MM-DD) or a known preset",
                value.display
            ))
        }
    }

    fn parse(&self, display: &str) -> Option<Value> {
        if let Some(preset) = DatePreset::all()
            .into_iter()
            .find(|p| p.label().eq_ignore_ascii_case(display.trim()))
        {
            return Some(Value::String(preset.key().to_string()));
        }
        parse_iso(display).map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
    }

    fn format(&self, raw: &Value) -> Option<String> {
        let s = raw.as_str()?;
        DatePreset::from_key(s).map(|p| p.label().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FilterSchema;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn suggestions(ac: &mut DateAutocompleter, input: &str) -> Vec<String> {
        let schema = FilterSchema::default();
        let ctx = SuggestionContext {
            input,
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

    #[test]
    fn test_preset_ranges() {
        // 2026-08-06 is a Thursday.
        let today = day(2026, 8, 6);
        assert_eq!(DatePreset::Today.range(today), (today, today));
        assert_eq!(
            DatePreset::Yesterday.range(today),
            (day(2026, 8, 5), day(2026, 8, 5))
        );
        assert_eq!(
            DatePreset::ThisWeek.range(today),
            (day(2026, 8, 3), today)
        );
        assert_eq!(
            DatePreset::ThisMonth.range(today),
            (day(2026, 8, 1), today)
        );
        assert_eq!(
            DatePreset::Last7Days.range(today),
            (day(2026, 7, 31), today)
        );
    }

    #[test]
    fn test_all_presets_offered_for_empty_input() {
        let mut ac = DateAutocompleter::with_today(day(2026, 8, 6));
        assert_eq!(suggestions(&mut ac, "").len(), 6);
    }

    #[test]
    fn test_label_filter() {
        let mut ac = DateAutocompleter::with_today(day(2026, 8, 6));
        let got = suggestions(&mut ac, "week");
        assert_eq!(got, vec!["this-week"]);
    }

    #[test]
    fn test_literal_iso_offered_first() {
        let mut ac = DateAutocompleter::with_today(day(2026, 8, 6));
        let got = suggestions(&mut ac, "2026-01-15");
        assert_eq!(got[0], "2026-01-15");
    }

    #[test]
    fn test_validate_and_parse() {
        let ac = DateAutocompleter::with_today(day(2026, 8, 6));
        assert!(ac.validate(&ConditionValue::from_text("today")).is_none());
        assert!(ac.validate(&ConditionValue::from_text("2026-02-01")).is_none());
        assert!(ac.validate(&ConditionValue::from_text("not-a-date")).is_some());

        assert_eq!(
            ac.parse("This week"),
            Some(Value::String("this-week".to_string()))
        );
        assert_eq!(ac.format(&Value::String("today".to_string())), Some("Today".to_string()));
    }

    #[test]
    fn test_resolve_serialized() {
        let ac = DateAutocompleter::with_today(day(2026, 8, 6));
        assert_eq!(
            ac.resolve("last-7-days"),
            Some((day(2026, 7, 31), day(2026, 8, 6)))
        );
        assert_eq!(
            ac.resolve("2026-03-01"),
            Some((day(2026, 3, 1), day(2026, 3, 1)))
        );
        assert_eq!(ac.resolve("bogus"), None);
    }
}
