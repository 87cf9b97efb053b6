//! Expression build state machine and token-selection layer.
//!
//! The host feeds [`InputEvent`]s to a [`FilterBuilder`] together with the
//! current expression list; the builder answers with an [`EventOutcome`]
//! carrying the new list (only when a committed mutation occurred) plus any
//! [`Effect`]s to render or perform.

mod events;
mod machine;
mod state;
pub mod tokens;

pub use events::{Effect, EventOutcome, InputEvent};
pub use machine::FilterBuilder;
pub use state::{BuildStep, EditSession, EditTarget, TokenCursor, TokenKind};
