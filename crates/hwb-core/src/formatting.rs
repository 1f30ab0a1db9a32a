//! Telegram HTML rendering for controller replies.

use crate::conversation::Reply;

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const PRE_OPEN: &str = "<pre>";
const PRE_CLOSE: &str = "</pre>";

/// Render a reply as one or more Telegram HTML messages, each at most `limit`
/// bytes. Command output goes into `<pre>` blocks, split on line boundaries.
pub fn render_reply(reply: &Reply, limit: usize) -> Vec<String> {
    let limit = limit.max(64);
    let header = escape_html(&reply.text);

    let Some(output) = &reply.output else {
        return split_text_chunks(&header, limit);
    };

    let escaped = escape_html(output);
    let body_limit = limit - PRE_OPEN.len() - PRE_CLOSE.len();
    let mut out = Vec::new();

    // The first block shares a message with the header when there is room.
    let mut rest = escaped.as_str();
    let first_budget = body_limit.saturating_sub(header.len() + 1);
    if first_budget >= MIN_SHARED_BLOCK {
        let first = split_text_chunks(rest, first_budget)
            .into_iter()
            .next()
            .unwrap_or_default();
        rest = &rest[first.len()..];
        out.push(format!("{header}\n{PRE_OPEN}{first}{PRE_CLOSE}"));
    } else {
        out.extend(split_text_chunks(&header, limit));
    }

    if !rest.trim().is_empty() {
        out.extend(
            split_text_chunks(rest, body_limit)
                .into_iter()
                .map(|p| format!("{PRE_OPEN}{p}{PRE_CLOSE}")),
        );
    }
    out
}

const MIN_SHARED_BLOCK: usize = 64;

/// Split already-escaped text into chunks of at most `limit` bytes.
///
/// Prefers line boundaries; overlong lines are cut on a char boundary that does
/// not fall inside an HTML entity.
pub fn split_text_chunks(text: &str, limit: usize) -> Vec<String> {
    if text.len() <= limit {
        return vec![text.to_string()];
    }

    let mut out = Vec::new();
    let mut chunk = String::new();

    for line in text.split_inclusive('\n') {
        if chunk.len() + line.len() <= limit {
            chunk.push_str(line);
            continue;
        }
        if !chunk.is_empty() {
            out.push(std::mem::take(&mut chunk));
        }

        let mut rest = line;
        while rest.len() > limit {
            let (head, tail) = split_escaped_prefix(rest, limit);
            out.push(head.to_string());
            rest = tail;
        }
        chunk.push_str(rest);
    }

    if !chunk.trim().is_empty() {
        out.push(chunk);
    }
    out
}

fn split_escaped_prefix(s: &str, max_bytes: usize) -> (&str, &str) {
    let mut idx = floor_char_boundary(s, max_bytes);

    // Do not cut `&amp;` and friends in half.
    if let Some(amp) = s[..idx].rfind('&') {
        if !s[amp..idx].contains(';') && amp > 0 {
            idx = amp;
        }
    }

    if idx == 0 {
        // Shouldn't happen for valid input, but always make progress.
        let next = s.char_indices().nth(1).map(|(i, _)| i).unwrap_or(s.len());
        return (&s[..next], &s[next..]);
    }
    (&s[..idx], &s[idx..])
}

fn floor_char_boundary(s: &str, max_bytes: usize) -> usize {
    if max_bytes >= s.len() {
        return s.len();
    }
    let mut idx = max_bytes;
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
