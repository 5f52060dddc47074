//! Reasoning-region segmentation of model output.
//!
//! Reasoning models wrap their chain of thought in `<think>…</think>`.
//! Depending on the transport the tags may arrive raw, HTML-entity
//! escaped, as JSON unicode escapes, or percent-encoded.
//! [`detect_encoding`] finds out which, [`decode`] rewrites only those
//! delimiters into raw markup, and [`segment`] splits the raw form into
//! plain and reasoning [`Segment`]s.
//!
//! Segmentation is total: an unterminated `<think>` is left as plain text,
//! so malformed output is never dropped.

use crate::models::Segment;

pub const OPEN_TAG: &str = "<think>";
pub const CLOSE_TAG: &str = "</think>";

/// How the reasoning delimiters are written in a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagEncoding {
    /// `<think>`
    Raw,
    /// `&lt;think&gt;`
    HtmlEntity,
    /// `\u003cthink\u003e`
    Backslash,
    /// `%3Cthink%3E`
    Percent,
}

impl TagEncoding {
    /// Detection order. Raw first so already-decoded text is left alone.
    const ALL: [TagEncoding; 4] = [
        TagEncoding::Raw,
        TagEncoding::HtmlEntity,
        TagEncoding::Backslash,
        TagEncoding::Percent,
    ];

    fn open(self) -> &'static str {
        match self {
            TagEncoding::Raw => OPEN_TAG,
            TagEncoding::HtmlEntity => "&lt;think&gt;",
            TagEncoding::Backslash => "\\u003cthink\\u003e",
            TagEncoding::Percent => "%3Cthink%3E",
        }
    }

    /// Accepted closing forms. Encoders differ on whether `/` is escaped.
    fn closes(self) -> &'static [&'static str] {
        match self {
            TagEncoding::Raw => &[CLOSE_TAG],
            TagEncoding::HtmlEntity => &["&lt;/think&gt;"],
            TagEncoding::Backslash => &["\\u003c/think\\u003e", "\\u003c\\/think\\u003e"],
            TagEncoding::Percent => &["%3C%2Fthink%3E", "%3C/think%3E"],
        }
    }

    /// Escapes and percent-encoding use case-insensitive hex digits.
    fn case_insensitive(self) -> bool {
        matches!(self, TagEncoding::Backslash | TagEncoding::Percent)
    }
}

/// Result of [`detect_encoding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub present: bool,
    pub kind: Option<TagEncoding>,
}

/// Identify which delimiter encoding, if any, `text` uses.
pub fn detect_encoding(text: &str) -> Detection {
    for kind in TagEncoding::ALL {
        if find_tag(text, kind.open(), kind.case_insensitive()).is_some() {
            return Detection {
                present: true,
                kind: Some(kind),
            };
        }
    }
    Detection {
        present: false,
        kind: None,
    }
}

/// Rewrite `kind`-encoded delimiters into raw `<think>` markup. All other
/// characters are left untouched.
pub fn decode(text: &str, kind: TagEncoding) -> String {
    if kind == TagEncoding::Raw {
        return text.to_string();
    }
    let mut decoded = replace_tag(text, kind.open(), OPEN_TAG, kind.case_insensitive());
    for close in kind.closes() {
        decoded = replace_tag(&decoded, close, CLOSE_TAG, kind.case_insensitive());
    }
    decoded
}

/// Split raw-markup text into plain and reasoning segments.
pub fn segment(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    // start of the text not yet emitted
    let mut cursor = 0;

    loop {
        // SCANNING_PLAIN
        let Some(open_rel) = text[cursor..].find(OPEN_TAG) else {
            break;
        };
        let open = cursor + open_rel;
        let body_start = open + OPEN_TAG.len();

        // IN_REASONING
        let Some(close_rel) = text[body_start..].find(CLOSE_TAG) else {
            break;
        };
        let close = body_start + close_rel;

        if open > cursor {
            segments.push(Segment::plain(&text[cursor..open]));
        }
        segments.push(Segment::reasoning(&text[body_start..close]));
        cursor = close + CLOSE_TAG.len();
    }

    if cursor < text.len() {
        segments.push(Segment::plain(&text[cursor..]));
    }

    segments
}

/// Detect, decode, and segment a model reply in one step.
pub fn parse_reply(text: &str) -> Vec<Segment> {
    match detect_encoding(text).kind {
        Some(kind) if kind != TagEncoding::Raw => segment(&decode(text, kind)),
        _ => segment(text),
    }
}

/// Byte offset of the first occurrence of `tag`. Tags are ASCII, so
/// ASCII case folding keeps byte offsets aligned with `haystack`.
fn find_tag(haystack: &str, tag: &str, case_insensitive: bool) -> Option<usize> {
    if case_insensitive {
        haystack
            .to_ascii_lowercase()
            .find(&tag.to_ascii_lowercase())
    } else {
        haystack.find(tag)
    }
}

fn replace_tag(text: &str, tag: &str, replacement: &str, case_insensitive: bool) -> String {
    if !case_insensitive {
        return text.replace(tag, replacement);
    }
    let folded = text.to_ascii_lowercase();
    let needle = tag.to_ascii_lowercase();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (pos, _) in folded.match_indices(&needle) {
        out.push_str(&text[last..pos]);
        out.push_str(replacement);
        last = pos + needle.len();
    }
    out.push_str(&text[last..]);
    out
}
