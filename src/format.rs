//! Markdown-subset to inline markup conversion.
//!
//! Assistant answers use a small slice of Markdown: `**bold**` and `## `
//! headers. [`format_message`] turns those into `<strong>` and `<h3>`,
//! converts line breaks to `<br>`, and escapes everything else.
//!
//! The conversion is idempotent. Its own tags, when opened and closed on the
//! same line, and existing character entities pass through untouched, so
//! formatting already-formatted text is a no-op:
//!
//! ```rust
//! use insights_chat::format::format_message;
//!
//! let once = format_message("## Summary\n**Revenue** is up & rising");
//! assert_eq!(once, "<h3>Summary</h3><br><strong>Revenue</strong> is up &amp; rising");
//! assert_eq!(format_message(&once), once);
//! ```

use std::sync::LazyLock;

use regex::Regex;

/// Line-break markup used by the display.
pub const LINE_BREAK: &str = "<br>";

/// Tags produced by this module as (open, close) pairs. Paired occurrences
/// pass through the escaper verbatim.
const OWN_TAGS: [(&str, &str); 2] = [("<strong>", "</strong>"), ("<h3>", "</h3>")];

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("bold pattern is valid"));

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^&(?:#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z][A-Za-z0-9]*);")
        .expect("entity pattern is valid")
});

/// Convert answer text to inline display markup.
#[must_use]
pub fn format_message(text: &str) -> String {
    text.split('\n')
        .flat_map(|line| line.trim_end_matches('\r').split(LINE_BREAK))
        .map(format_line)
        .collect::<Vec<_>>()
        .join(LINE_BREAK)
}

/// Escape text for use in markup or attribute values, with no exceptions.
#[must_use]
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn format_line(line: &str) -> String {
    let escaped = escape_markup(line);
    let bolded = BOLD.replace_all(&escaped, "<strong>$1</strong>");
    match bolded.strip_prefix("## ") {
        Some(header) => format!("<h3>{header}</h3>"),
        None => bolded.into_owned(),
    }
}

/// Escape `<`, `>` and bare `&`, keeping entities and paired [`OWN_TAGS`]
/// intact. An own tag without its partner on the same line is escaped.
fn escape_markup(line: &str) -> String {
    let paired = paired_tags(line);
    let mut out = String::with_capacity(line.len());
    let mut rest = line;

    while let Some(ch) = rest.chars().next() {
        match ch {
            '<' => {
                let pos = line.len() - rest.len();
                let tag = paired
                    .binary_search(&pos)
                    .ok()
                    .and_then(|_| own_tag_at(rest));
                if let Some(tag) = tag {
                    out.push_str(tag);
                    rest = &rest[tag.len()..];
                    continue;
                }
                out.push_str("&lt;");
            }
            '>' => out.push_str("&gt;"),
            '&' if !ENTITY.is_match(rest) => out.push_str("&amp;"),
            c => out.push(c),
        }
        rest = &rest[ch.len_utf8()..];
    }

    out
}

fn own_tag_at(rest: &str) -> Option<&'static str> {
    OWN_TAGS
        .iter()
        .flat_map(|(open, close)| [*open, *close])
        .find(|tag| rest.starts_with(*tag))
}

/// Sorted byte offsets of own tags that close an earlier open tag of the
/// same kind, together with the tags they close.
fn paired_tags(line: &str) -> Vec<usize> {
    let mut open: [Vec<usize>; OWN_TAGS.len()] = Default::default();
    let mut paired = Vec::new();

    for (pos, _) in line.match_indices('<') {
        let rest = &line[pos..];
        for (kind, (start, end)) in OWN_TAGS.iter().enumerate() {
            if rest.starts_with(*start) {
                open[kind].push(pos);
            } else if rest.starts_with(*end) {
                if let Some(opened) = open[kind].pop() {
                    paired.push(opened);
                    paired.push(pos);
                }
            }
        }
    }

    paired.sort_unstable();
    paired
}
