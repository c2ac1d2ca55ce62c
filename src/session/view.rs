//! Render view over a transcript.

use serde::Serialize;

use crate::format::format_message;

use super::turn::{Role, Turn};

/// A transcript turn prepared for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedTurn<'a> {
    /// Position of the turn in the transcript.
    pub index: usize,
    /// Author of the turn.
    pub role: Role,
    /// Raw turn text.
    pub text: &'a str,
    /// Text converted to inline display markup.
    pub html: String,
    /// Whether this is the newest assistant turn, the only one that may be
    /// revealed incrementally.
    pub latest_assistant: bool,
}

/// Lazy view over a transcript.
///
/// Nothing is formatted until the view is iterated, and [`TranscriptView::iter`]
/// can be called any number of times; every call starts again from the first
/// turn and yields the same items for the same state.
#[derive(Debug, Clone, Copy)]
pub struct TranscriptView<'a> {
    turns: &'a [Turn],
    latest_assistant: Option<usize>,
}

impl<'a> TranscriptView<'a> {
    pub(crate) fn new(turns: &'a [Turn]) -> Self {
        let latest_assistant = turns.iter().rposition(|t| t.role() == Role::Assistant);
        Self {
            turns,
            latest_assistant,
        }
    }

    /// Iterate over render-ready turns from the start of the transcript.
    pub fn iter(self) -> impl Iterator<Item = RenderedTurn<'a>> + 'a {
        let latest = self.latest_assistant;
        self.turns
            .iter()
            .enumerate()
            .map(move |(index, turn)| RenderedTurn {
                index,
                role: turn.role(),
                text: turn.text(),
                html: format_message(turn.text()),
                latest_assistant: latest == Some(index),
            })
    }

    #[must_use]
    pub fn len(self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.turns.is_empty()
    }

    /// Raw text of the newest assistant turn.
    #[must_use]
    pub fn latest_assistant_text(self) -> Option<&'a str> {
        self.latest_assistant.map(|i| self.turns[i].text())
    }
}

impl<'a> IntoIterator for TranscriptView<'a> {
    type Item = RenderedTurn<'a>;
    type IntoIter = Box<dyn Iterator<Item = RenderedTurn<'a>> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}
