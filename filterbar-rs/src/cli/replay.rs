//! Replay command: drive the build state machine from an event script.
//!
//! Scripts are line based, one event per line; blank lines and `#` comments
//! are skipped. Committed lists are printed as they change, followed by a
//! final validation report. Replays are deterministic.
//!
//! ```text
//! focus
//! input na
//! enter          # choose the highlighted field
//! enter          # choose the highlighted operator
//! input test
//! enter          # commit the value
//! ```

use crate::builder::{FilterBuilder, InputEvent, TokenCursor, TokenKind};
use crate::cli::args::ReplayArgs;
use crate::cli::load_schema;
use crate::cli::output::Output;
use crate::config::Config;
use crate::error::{ExitCode, FilterError, Result};
use crate::expression::FilterExpression;
use crate::serialize::serialize;
use crate::validate::validate_expressions;
use serde_json::Value;
use std::time::Instant;

fn parse_event(line: &str, line_no: usize) -> Result<InputEvent> {
    let mut parts = line.splitn(2, ' ');
    let command = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or("").trim();

    let script_error = |message: String| FilterError::InvalidScript {
        line: line_no,
        message,
    };

    let event = match command {
        "focus" => InputEvent::Focus,
        "blur" => InputEvent::Blur,
        "enter" => InputEvent::Enter,
        "escape" => InputEvent::Escape,
        "up" => InputEvent::ArrowUp,
        "down" => InputEvent::ArrowDown,
        "left" => InputEvent::ArrowLeft,
        "right" => InputEvent::ArrowRight,
        "delete" => InputEvent::Delete,
        "backspace" => InputEvent::Backspace,
        "select-all" => InputEvent::SelectAll,
        "input" => InputEvent::SetInput(rest.to_string()),
        "click" => {
            let index = rest
                .parse::<usize>()
                .map_err(|_| script_error(format!("Expected suggestion index, got '{}'", rest)))?;
            InputEvent::ClickSuggestion(index)
        }
        "click-token" | "double-click-token" => {
            let mut args = rest.split_whitespace();
            let index = args
                .next()
                .and_then(|s| s.parse::<usize>().ok())
                .ok_or_else(|| script_error("Expected expression index".to_string()))?;
            let kind = args
                .next()
                .and_then(|s| s.parse::<TokenKind>().ok())
                .ok_or_else(|| {
                    script_error("Expected token kind (field|operator|value|connector)".to_string())
                })?;
            let cursor = TokenCursor::new(index, kind);
            if command == "click-token" {
                InputEvent::ClickToken(cursor)
            } else {
                InputEvent::DoubleClickToken(cursor)
            }
        }
        "custom-confirm" => InputEvent::CustomInputConfirm {
            raw: Value::String(rest.to_string()),
            display: rest.to_string(),
        },
        "custom-cancel" => InputEvent::CustomInputCancel,
        other => {
            return Err(script_error(format!("Unknown event: {}", other)));
        }
    };
    Ok(event)
}

/// `filterbar replay <script>`
pub fn replay(config: &Config, args: &ReplayArgs, output: &Output) -> Result<ExitCode> {
    let schema = load_schema(config, args.schema.as_deref())?;
    let script = std::fs::read_to_string(&args.script)?;

    let mut builder = FilterBuilder::new(schema.clone());
    let mut expressions: Vec<FilterExpression> = Vec::new();
    let now = Instant::now();

    for (i, raw_line) in script.lines().enumerate() {
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let event = parse_event(line, i + 1)?;
        let outcome = builder.handle_event(event, &expressions, now);
        if let Some(new_list) = outcome.expressions {
            expressions = new_list;
            output.info(&format!("line {}: {} expression(s)", i + 1, expressions.len()));
            output.print(&serialize(&expressions, Some(&schema)))?;
        }
    }

    let report = validate_expressions(&expressions, &schema);
    if report.valid {
        output.info("Final expressions are valid");
        Ok(ExitCode::Success)
    } else {
        output.print(&report)?;
        Ok(ExitCode::ExpressionsInvalid)
    }
}
