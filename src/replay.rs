//! Simulated streaming of a finished answer.
//!
//! The answer is already complete when replay starts; this module only paces
//! its display. A replay shows a typing indicator, then progressively longer
//! word prefixes, and finishes with the full text exactly as stored.
//!
//! # Frames
//!
//! - [`ReplayFrame::Typing`]: shown for the initial pause
//! - [`ReplayFrame::Partial`]: text up to the end of a word
//! - [`ReplayFrame::Complete`]: the whole answer, always last
//!
//! # Example
//!
//! ```rust
//! use insights_chat::replay::word_prefixes;
//!
//! let prefixes: Vec<_> = word_prefixes("Sales up  5%").collect();
//! assert_eq!(prefixes, ["Sales", "Sales up", "Sales up  5%"]);
//! ```

use std::time::Duration;

use futures::Stream;
use serde::{Deserialize, Serialize};

/// Delays used while replaying an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayPacing {
    /// Pause while the typing indicator is shown.
    pub typing_delay: Duration,
    /// Pause after each revealed word.
    pub word_delay: Duration,
}

impl Default for ReplayPacing {
    fn default() -> Self {
        Self {
            typing_delay: Duration::from_millis(500),
            word_delay: Duration::from_millis(50),
        }
    }
}

/// One display state of a replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ReplayFrame {
    /// Typing indicator, before any text is shown.
    #[serde(rename = "typing")]
    Typing,
    /// Text revealed so far.
    #[serde(rename = "reveal.delta")]
    Partial {
        /// Prefix ending at a word boundary.
        text: String,
    },
    /// Final state, equal to the stored answer.
    #[serde(rename = "done")]
    Complete {
        /// The full answer text.
        text: String,
    },
}

impl ReplayFrame {
    /// Apply `f` to the frame's text, if any.
    #[must_use]
    pub fn map_text(self, f: impl FnOnce(&str) -> String) -> Self {
        match self {
            Self::Typing => Self::Typing,
            Self::Partial { text } => Self::Partial { text: f(&text) },
            Self::Complete { text } => Self::Complete { text: f(&text) },
        }
    }
}

/// Iterator over prefixes of a string that end at each word's last character.
#[derive(Debug, Clone)]
pub struct WordPrefixes<'a> {
    text: &'a str,
    pos: usize,
}

/// Prefixes of `text` ending after each whitespace-separated word.
///
/// Whitespace inside a prefix is kept exactly as in `text`.
#[must_use]
pub fn word_prefixes(text: &str) -> WordPrefixes<'_> {
    WordPrefixes { text, pos: 0 }
}

impl<'a> Iterator for WordPrefixes<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.text[self.pos..];
        let start = self.pos + rest.find(|c: char| !c.is_whitespace())?;
        let word = &self.text[start..];
        let len = word.find(char::is_whitespace).unwrap_or(word.len());
        self.pos = start + len;
        Some(&self.text[..self.pos])
    }
}

/// Paced replay of `text`.
///
/// Yields `Typing`, waits `typing_delay`, then yields a `Partial` for every
/// word but the last with `word_delay` after each, and ends with `Complete`.
/// The final word is not paced: `Complete` follows the last `Partial`'s
/// delay directly, with no pause after it.
pub fn replay(text: String, pacing: ReplayPacing) -> impl Stream<Item = ReplayFrame> + Send {
    async_stream::stream! {
        yield ReplayFrame::Typing;
        tokio::time::sleep(pacing.typing_delay).await;

        let prefixes: Vec<String> = word_prefixes(&text).map(str::to_owned).collect();
        let shown = prefixes.len().saturating_sub(1);
        for prefix in prefixes.into_iter().take(shown) {
            yield ReplayFrame::Partial { text: prefix };
            tokio::time::sleep(pacing.word_delay).await;
        }

        yield ReplayFrame::Complete { text };
    }
}

/// Convert a [`ReplayFrame`] to an SSE-formatted string.
///
/// The output carries an `event:` line named after the frame and a `data:`
/// line with the JSON payload.
pub fn sse_event(frame: &ReplayFrame) -> String {
    let json = serde_json::to_string(frame).unwrap_or_else(|e| {
        serde_json::json!({ "type": "error", "data": { "message": e.to_string() } }).to_string()
    });

    format!("event: {}\ndata: {json}\n\n", event_name(frame))
}

/// Get the SSE event name for a [`ReplayFrame`].
pub fn event_name(frame: &ReplayFrame) -> &'static str {
    match frame {
        ReplayFrame::Typing => "typing",
        ReplayFrame::Partial { .. } => "reveal.delta",
        ReplayFrame::Complete { .. } => "done",
    }
}
