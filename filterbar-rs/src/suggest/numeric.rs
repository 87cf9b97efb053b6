//! Numeric autocompleter: step-wise candidates with unit formatting.

use super::{normalize_query, Autocompleter, AutocompleteItem, SuggestionContext};
use crate::expression::ConditionValue;
use serde_json::{json, Value};
use std::rc::Rc;
use std::time::Instant;

/// Formats a numeric candidate for display (currency, stars, percent, ...).
pub type NumberFormatter = Rc<dyn Fn(f64) -> String>;

/// Parses a display string back into a number.
pub type NumberParser = Rc<dyn Fn(&str) -> Option<f64>>;

// Candidate generation is bounded so a huge min..max range cannot produce
// an unbounded suggestion list.
const MAX_CANDIDATES: usize = 100;

/// Generates step-wise candidate values between `min` and `max`.
pub struct NumericAutocompleter {
    min: f64,
    max: f64,
    step: f64,
    format: Option<NumberFormatter>,
    parse: Option<NumberParser>,
}

impl NumericAutocompleter {
    pub fn new(min: f64, max: f64, step: f64) -> Self {
        Self {
            min,
            max,
            step: if step > 0.0 { step } else { 1.0 },
            format: None,
            parse: None,
        }
    }

    pub fn with_format(mut self, format: NumberFormatter) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_parse(mut self, parse: NumberParser) -> Self {
        self.parse = Some(parse);
        self
    }

    fn display(&self, n: f64) -> String {
        match self.format.as_deref() {
            Some(format) => format(n),
            None => {
                if n.fract() == 0.0 {
                    format!("{}", n as i64)
                } else {
                    format!("{}", n)
                }
            }
        }
    }

    fn candidates(&self) -> Vec<f64> {
        let mut out = Vec::new();
        let mut n = self.min;
        while n <= self.max + f64::EPSILON && out.len() < MAX_CANDIDATES {
            out.push(n);
            n += self.step;
        }
        out
    }

    fn parse_number(&self, text: &str) -> Option<f64> {
        if let Some(parse) = self.parse.as_deref() {
            if let Some(n) = parse(text) {
                return Some(n);
            }
        }
        text.trim().parse::<f64>().ok()
    }
}

impl Autocompleter for NumericAutocompleter {
    fn suggestions(&mut self, ctx: &SuggestionContext<'_>, _now: Instant) -> Vec<AutocompleteItem> {
        let query = normalize_query(ctx.input);
        self.candidates()
            .into_iter()
            .filter_map(|n| {
                let display = self.display(n);
                let plain = if n.fract() == 0.0 {
                    format!("{}", n as i64)
                } else {
                    format!("{}", n)
                };
                let matched = query.is_empty()
                    || normalize_query(&display).starts_with(&query)
                    || plain.starts_with(&query);
                matched.then(|| {
                    AutocompleteItem::new(plain, display).with_value(json!(n))
                })
            })
            .collect()
    }

    fn validate(&self, value: &ConditionValue) -> Option<String> {
        let in_range = |raw: &Value| {
            raw.as_f64()
                .is_some_and(|n| n >= self.min && n <= self.max)
        };
        let ok = match &value.raw {
            Value::Array(items) => !items.is_empty() && items.iter().all(in_range),
            other => in_range(other),
        };
        if ok {
            None
        } else {
            Some(format!(
                "'{}' is not a number between {} and {}",
                value.display, self.min, self.max
            ))
        }
    }

    fn format(&self, raw: &Value) -> Option<String> {
        raw.as_f64().map(|n| self.display(n))
    }

    fn parse(&self, display: &str) -> Option<Value> {
        self.parse_number(display).map(|n| json!(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FilterSchema;

    fn suggestions(ac: &mut NumericAutocompleter, input: &str) -> Vec<String> {
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
            .map(|i| i.label)
            .collect()
    }

    #[test]
    fn test_stepwise_candidates() {
        let mut ac = NumericAutocompleter::new(1.0, 5.0, 1.0);
        assert_eq!(suggestions(&mut ac, ""), vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn test_prefix_filter() {
        let mut ac = NumericAutocompleter::new(1.0, 12.0, 1.0);
        assert_eq!(suggestions(&mut ac, "1"), vec!["1", "10", "11", "12"]);
    }

    #[test]
    fn test_custom_format_and_parse() {
        let mut ac = NumericAutocompleter::new(1.0, 3.0, 1.0)
            .with_format(Rc::new(|n| format!("${}", n as i64)))
            .with_parse(Rc::new(|s| s.trim_start_matches('$').parse().ok()));
        assert_eq!(suggestions(&mut ac, "$2"), vec!["$2"]);
        assert_eq!(ac.parse("$3"), Some(json!(3.0)));
        assert_eq!(ac.format(&json!(2.0)), Some("$2".to_string()));
    }

    #[test]
    fn test_validate_range() {
        let ac = NumericAutocompleter::new(1.0, 5.0, 1.0);
        let ok = ConditionValue {
            raw: json!(3),
            display: "3".to_string(),
            serialized: "3".to_string(),
        };
        assert!(ac.validate(&ok).is_none());

        let out_of_range = ConditionValue {
            raw: json!(9),
            display: "9".to_string(),
            serialized: "9".to_string(),
        };
        assert!(ac.validate(&out_of_range).is_some());

        assert!(ac.validate(&ConditionValue::from_text("abc")).is_some());
    }

    #[test]
    fn test_candidate_cap() {
        let mut ac = NumericAutocompleter::new(0.0, 1_000_000.0, 1.0);
        assert_eq!(suggestions(&mut ac, "").len(), MAX_CANDIDATES);
    }
}
