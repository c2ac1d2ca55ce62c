//! Message bubbles.

use crate::session::{RenderedTurn, Role, TranscriptView};

/// DOM id of the bubble that the replay script animates.
pub const REVEAL_TARGET_ID: &str = "reveal-target";

/// Assistant avatar glyph.
pub const ASSISTANT_AVATAR: &str = "🤖";

/// Render every turn of `view` as a chat bubble.
///
/// When `reveal` is set, the newest assistant bubble is tagged so the page
/// script can replay it. Its full formatted text is still rendered, so the
/// page reads correctly without scripting.
#[must_use]
pub fn render_transcript(view: TranscriptView<'_>, reveal: bool) -> String {
    let mut out = String::new();
    for turn in view {
        out.push_str(&bubble(&turn, reveal && turn.latest_assistant));
    }
    out
}

fn bubble(turn: &RenderedTurn<'_>, reveal: bool) -> String {
    let html = &turn.html;
    match turn.role {
        Role::User => format!(
            r#"<div class="user-container"><div class="user-message"><p class="message-text">{html}</p></div></div>"#
        ),
        Role::Assistant => {
            let target = if reveal {
                format!(r#" id="{REVEAL_TARGET_ID}""#)
            } else {
                String::new()
            };
            format!(
                r#"<div class="assistant-container"><div class="assistant-avatar">{ASSISTANT_AVATAR}</div><div class="assistant-message"><p class="message-text"{target}>{html}</p></div></div>"#
            )
        }
    }
}
