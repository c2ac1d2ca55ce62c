//! Chat session and transcript management.
//!
//! This module owns the conversation state of a single chat window: the
//! ordered transcript of turns, the session identifier, and the rules for
//! moving from "user asked" to "assistant answered". Sessions live in memory
//! only and are dropped when they end.
//!
//! # Architecture
//!
//! - [`Turn`]: One immutable entry in a transcript
//! - [`ChatSession`]: Transcript plus identifier, driven by `begin_turn`/`complete_turn`
//! - [`SessionStore`]: Thread-safe store of all live sessions
//! - [`TranscriptView`]: Lazy, restartable render view over a transcript
//!
//! # Example
//!
//! ```rust
//! use insights_chat::session::{ChatSession, Role};
//!
//! let session = ChatSession::start("Hello!");
//! let turns: Vec<_> = session.render_transcript().iter().collect();
//! assert_eq!(turns.len(), 1);
//! assert_eq!(turns[0].role, Role::Assistant);
//! ```

mod thread;
mod turn;
mod view;

pub use thread::{
    ChatSession, DEFAULT_SESSION_TIMEOUT, PendingQuestion, SessionError, SessionHandle,
    SessionStore,
};
pub use turn::{Role, SessionId, Turn};
pub use view::{RenderedTurn, TranscriptView};
