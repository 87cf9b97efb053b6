//! Token flattening and cursor traversal over committed expressions.
//!
//! Each committed expression renders as three or four tokens: field,
//! operator, value, and the connector when one is recorded. The cursor
//! walks this flattened sequence left to right.

use super::state::{TokenCursor, TokenKind};
use crate::expression::{clear_trailing_connector, FilterExpression};

/// Token kinds rendered for one expression, in display order.
pub fn expression_tokens(expr: &FilterExpression) -> Vec<TokenKind> {
    let mut kinds = vec![TokenKind::Field, TokenKind::Operator, TokenKind::Value];
    if expr.connector.is_some() {
        kinds.push(TokenKind::Connector);
    }
    kinds
}

/// Whether the cursor points at a token that currently exists.
pub fn cursor_exists(expressions: &[FilterExpression], cursor: TokenCursor) -> bool {
    match expressions.get(cursor.index) {
        Some(expr) => expression_tokens(expr).contains(&cursor.kind),
        None => false,
    }
}

/// Cursor on the first token, when any expression exists.
pub fn first_cursor(expressions: &[FilterExpression]) -> Option<TokenCursor> {
    (!expressions.is_empty()).then(|| TokenCursor::new(0, TokenKind::Field))
}

/// Cursor on the last token, when any expression exists.
pub fn last_cursor(expressions: &[FilterExpression]) -> Option<TokenCursor> {
    let index = expressions.len().checked_sub(1)?;
    let kinds = expression_tokens(&expressions[index]);
    Some(TokenCursor::new(index, *kinds.last().expect("non-empty token list")))
}

/// Next token to the right; `None` when walking past the end (back to the
/// text input).
pub fn next_cursor(expressions: &[FilterExpression], cursor: TokenCursor) -> Option<TokenCursor> {
    let expr = expressions.get(cursor.index)?;
    let kinds = expression_tokens(expr);
    let pos = kinds.iter().position(|k| *k == cursor.kind)?;
    if pos + 1 < kinds.len() {
        return Some(TokenCursor::new(cursor.index, kinds[pos + 1]));
    }
    if cursor.index + 1 < expressions.len() {
        return Some(TokenCursor::new(cursor.index + 1, TokenKind::Field));
    }
    None
}

/// Previous token to the left; clamps at the first token.
pub fn prev_cursor(expressions: &[FilterExpression], cursor: TokenCursor) -> TokenCursor {
    let Some(expr) = expressions.get(cursor.index) else {
        return cursor;
    };
    let kinds = expression_tokens(expr);
    let Some(pos) = kinds.iter().position(|k| *k == cursor.kind) else {
        return cursor;
    };
    if pos > 0 {
        return TokenCursor::new(cursor.index, kinds[pos - 1]);
    }
    if cursor.index > 0 {
        let prev_kinds = expression_tokens(&expressions[cursor.index - 1]);
        return TokenCursor::new(
            cursor.index - 1,
            *prev_kinds.last().expect("non-empty token list"),
        );
    }
    cursor
}

/// Remove the expression at `index` and renormalize connectors: the removed
/// expression's own connector disappears with it, the expression before it
/// keeps its connector (now pointing at the new neighbor), and the new last
/// expression never keeps a dangling connector.
pub fn remove_expression(
    expressions: &[FilterExpression],
    index: usize,
) -> Vec<FilterExpression> {
    let mut list = expressions.to_vec();
    if index < list.len() {
        list.remove(index);
        clear_trailing_connector(&mut list);
    }
    list
}
