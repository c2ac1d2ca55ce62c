//! Document shell for the chat page.

use crate::format::escape_text;
use crate::session::{SessionId, TranscriptView};

use super::transcript::{ASSISTANT_AVATAR, REVEAL_TARGET_ID, render_transcript};

/// Everything needed to render one chat page.
#[derive(Debug, Clone, Copy)]
pub struct ChatPage<'a> {
    /// Heading and document title.
    pub title: &'a str,
    /// Session the page belongs to.
    pub session_id: SessionId,
    /// Transcript to display.
    pub transcript: TranscriptView<'a>,
    /// Replay the newest answer when the page loads.
    pub reveal: bool,
}

/// Render the full chat page.
#[must_use]
pub fn render_chat_page(page: &ChatPage<'_>) -> String {
    let title = escape_text(page.title);
    let session_id = page.session_id;
    let bubbles = render_transcript(page.transcript, page.reveal);

    let content = format!(
        r#"
    <div class="chat-title">{ASSISTANT_AVATAR} {title}</div>
    <div id="transcript" class="transcript">
        {bubbles}
    </div>
    <form class="chat-input" method="post" action="/sessions/{session_id}/messages">
        <input type="text" name="text" placeholder="Type your response..." autocomplete="off" autofocus>
        <button type="submit">Send</button>
    </form>
    <form class="chat-actions" method="post" action="/sessions/{session_id}/clear">
        <button type="submit">Clear Chat</button>
    </form>
    "#
    );

    html_shell(&title, session_id, &content)
}

fn html_shell(title: &str, session_id: SessionId, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <style>{STYLE}</style>
</head>
<body>
    <main id="app" data-session-id="{session_id}" data-reveal-target="{REVEAL_TARGET_ID}">
        {content}
    </main>
    <script>{REPLAY_SCRIPT}</script>
</body>
</html>"#
    )
}

const STYLE: &str = r"
body { margin: 0; font-family: sans-serif; background: #0e1117; color: #fafafa; }
main { max-width: 46rem; margin: 0 auto; padding: 0 1rem 2rem; }
.chat-title { padding: 20px 0; text-align: center; margin-bottom: 20px; font-size: 24px; font-weight: bold; }
.assistant-container { display: flex; margin-bottom: 10px; }
.user-container { display: flex; justify-content: flex-end; margin-bottom: 10px; }
.assistant-avatar { width: 40px; height: 40px; border-radius: 50%; background-color: #2E7D32; color: white; display: flex; align-items: center; justify-content: center; margin-right: 8px; flex-shrink: 0; }
.assistant-message { background-color: #333333; padding: 10px 15px; border-radius: 15px 15px 15px 0; max-width: 70%; color: white; }
.user-message { background-color: #1976D2; padding: 10px 15px; border-radius: 15px 15px 0 15px; max-width: 70%; color: white; }
.message-text { margin: 0; }
.message-text h3 { margin: 0.25em 0; }
.chat-input { display: flex; gap: 8px; margin-top: 16px; }
.chat-input input { flex: 1; padding: 10px; border-radius: 8px; border: 1px solid #444; background: #262730; color: inherit; }
.chat-input button, .chat-actions button { padding: 10px 16px; border-radius: 8px; border: 0; background: #2E7D32; color: white; cursor: pointer; }
.chat-actions { margin-top: 8px; }
.typing-indicator { display: inline-block; margin-left: 5px; }
.typing-indicator span { display: inline-block; width: 8px; height: 8px; background-color: #fff; border-radius: 50%; margin-right: 3px; animation: typing 1s infinite; }
.typing-indicator span:nth-child(2) { animation-delay: 0.2s; }
.typing-indicator span:nth-child(3) { animation-delay: 0.4s; }
@keyframes typing { 0%, 100% { transform: translateY(0); } 50% { transform: translateY(-5px); } }
";

// Replays the newest answer over SSE, then drops `?reveal=1` so a reload
// shows the finished page.
const REPLAY_SCRIPT: &str = r#"
(function () {
    var app = document.getElementById("app");
    var target = document.getElementById(app.dataset.revealTarget);
    if (!target || !window.EventSource) return;
    history.replaceState(null, "", location.pathname);

    var typing = 'Typing<span class="typing-indicator"><span></span><span></span><span></span></span>';
    var source = new EventSource("/api/sessions/" + app.dataset.sessionId + "/reveal");
    var show = function (e) { target.innerHTML = JSON.parse(e.data).data.text; };

    source.addEventListener("typing", function () { target.innerHTML = typing; });
    source.addEventListener("reveal.delta", show);
    source.addEventListener("done", function (e) { show(e); source.close(); });
    source.onerror = function () { source.close(); };
})();
"#;
