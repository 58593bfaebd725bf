//! Tag scanner: finds complete `<kind>…</kind>` regions in a growing buffer.
//!
//! Model output is ordinary prose with lightweight tags embedded in it:
//!
//! ```text
//! <thinking>Check the deadlines first.</thinking>
//! <tool><name>deadlines</name><parameters>{"school":"UCSD"}</parameters></tool>
//! <answer>The UCSD deadline is November 30.</answer>
//! <title>UCSD deadline</title>
//! ```
//!
//! A region is reported only once both its opening and closing markers are
//! in the buffer, so the scanner is safe to call after every streamed chunk.
//! The first opening tag pairs with the first closing tag that follows it.
//! Regions whose trimmed content is empty are never reported.

use std::ops::Range;

/// The tag names the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Thinking,
    Answer,
    Title,
    Tool,
    /// `<name>` inside a tool region
    Name,
    /// `<parameters>` inside a tool region
    Parameters,
}

impl TagKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thinking => "thinking",
            Self::Answer => "answer",
            Self::Title => "title",
            Self::Tool => "tool",
            Self::Name => "name",
            Self::Parameters => "parameters",
        }
    }

    pub fn open_tag(&self) -> &'static str {
        match self {
            Self::Thinking => "<thinking>",
            Self::Answer => "<answer>",
            Self::Title => "<title>",
            Self::Tool => "<tool>",
            Self::Name => "<name>",
            Self::Parameters => "<parameters>",
        }
    }

    pub fn close_tag(&self) -> &'static str {
        match self {
            Self::Thinking => "</thinking>",
            Self::Answer => "</answer>",
            Self::Title => "</title>",
            Self::Tool => "</tool>",
            Self::Name => "</name>",
            Self::Parameters => "</parameters>",
        }
    }
}

impl std::fmt::Display for TagKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete tagged region found in a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRegion {
    pub kind: TagKind,
    /// Trimmed inner text; never empty.
    pub content: String,
    /// Byte range of the whole region, tags included.
    pub span: Range<usize>,
    /// The exact matched text, tags included.
    pub matched: String,
}

struct RawPair {
    span: Range<usize>,
    content: Range<usize>,
}

fn next_pair(buffer: &str, kind: TagKind, from: usize) -> Option<RawPair> {
    let open = kind.open_tag();
    let close = kind.close_tag();

    let start = from + buffer.get(from..)?.find(open)?;
    let content_start = start + open.len();
    let content_end = content_start + buffer[content_start..].find(close)?;

    Some(RawPair {
        span: start..content_end + close.len(),
        content: content_start..content_end,
    })
}

/// Find the first complete, non-empty region of `kind` without modifying
/// the buffer.
pub fn find(buffer: &str, kind: TagKind) -> Option<TagRegion> {
    let mut from = 0;
    while let Some(pair) = next_pair(buffer, kind, from) {
        let content = buffer[pair.content.clone()].trim();
        if !content.is_empty() {
            return Some(TagRegion {
                kind,
                content: content.to_string(),
                matched: buffer[pair.span.clone()].to_string(),
                span: pair.span,
            });
        }
        from = pair.span.end;
    }
    None
}

/// The earliest opening tag of any of `kinds`, complete region or not.
pub fn first_opening(buffer: &str, kinds: &[TagKind]) -> Option<(TagKind, usize)> {
    kinds
        .iter()
        .filter_map(|kind| buffer.find(kind.open_tag()).map(|pos| (*kind, pos)))
        .min_by_key(|(_, pos)| *pos)
}

/// Remove and return the first complete, non-empty region of `kind`.
///
/// Empty regions in front of it are removed too, so they can neither block
/// later regions nor linger as stray text. The returned span is relative to
/// the buffer as it was just before the region itself was cut out.
pub fn take(buffer: &mut String, kind: TagKind) -> Option<TagRegion> {
    loop {
        let pair = next_pair(buffer, kind, 0)?;
        match cut(buffer, kind, pair) {
            Some(region) => return Some(region),
            None => continue,
        }
    }
}

/// The complete, non-empty region opened by the earliest tag of any of
/// `kinds`, without modifying the buffer. `None` if that region is still
/// open or empty.
pub fn peek_front(buffer: &str, kinds: &[TagKind]) -> Option<TagRegion> {
    let (kind, pos) = first_opening(buffer, kinds)?;
    let pair = next_pair(buffer, kind, pos)?;
    let content = buffer[pair.content.clone()].trim();
    if content.is_empty() {
        return None;
    }
    Some(TagRegion {
        kind,
        content: content.to_string(),
        matched: buffer[pair.span.clone()].to_string(),
        span: pair.span,
    })
}

/// Remove and return the region opened by the earliest tag of any of
/// `kinds`, once it is complete.
///
/// Nothing behind an unclosed opening tag is ever taken, so whatever is
/// nested inside an unfinished region stays put until that region closes.
/// Returns `None` if the front region is still open or is of a `halt`
/// kind. Empty regions at the front are dropped silently, halting or not.
pub fn take_front(buffer: &mut String, kinds: &[TagKind], halt: &[TagKind]) -> Option<TagRegion> {
    loop {
        let (kind, pos) = first_opening(buffer, kinds)?;
        let pair = next_pair(buffer, kind, pos)?;

        if halt.contains(&kind) && !buffer[pair.content.clone()].trim().is_empty() {
            return None;
        }
        if let Some(region) = cut(buffer, kind, pair) {
            return Some(region);
        }
    }
}

/// Cut `pair` out of the buffer. `None` if it was empty.
fn cut(buffer: &mut String, kind: TagKind, pair: RawPair) -> Option<TagRegion> {
    let content = buffer[pair.content.clone()].trim().to_string();
    let matched = buffer[pair.span.clone()].to_string();
    buffer.replace_range(pair.span.clone(), "");

    if content.is_empty() {
        return None;
    }
    Some(TagRegion {
        kind,
        content,
        span: pair.span,
        matched,
    })
}
