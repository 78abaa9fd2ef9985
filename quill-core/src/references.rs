//! Symbolic asset references inside a post body.
//!
//! Recognised forms:
//!
//! ```text
//! ![alt](cover.png)            ![alt](./cover.png "title")
//! <img src="diagram.webp">     <img alt="x" src='./diagram.webp' />
//! ```
//!
//! Only local targets are references. Absolute URLs, protocol-relative URLs,
//! `data:` URIs, anchors and absolute paths are left alone, as is anything
//! inside a fenced code block. Every occurrence carries the byte span of its
//! target so callers replace exactly that span.

use std::ops::Range;

/// One occurrence of a local asset reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Normalised symbolic reference (leading `./` removed).
    pub reference: String,
    /// Byte span of the raw target text in the body.
    pub span: Range<usize>,
}

/// Placeholder substituted for every reference by [`mask`].
pub const MASK: &str = "{asset}";

/// Scan `body` for local asset references, in order of appearance.
pub fn scan(body: &str) -> Vec<Reference> {
    let fenced = fenced_ranges(body);
    let in_fence = |pos: usize| fenced.iter().any(|r| r.contains(&pos));

    let mut found: Vec<Reference> = scan_markdown(body)
        .into_iter()
        .chain(scan_html(body))
        .filter(|span| !in_fence(span.start))
        .filter_map(|span| {
            let raw = &body[span.clone()];
            if !is_local(raw) {
                return None;
            }
            Some(Reference {
                reference: normalize(raw).to_owned(),
                span,
            })
        })
        .collect();
    found.sort_by_key(|r| r.span.start);
    // A tag nested inside a markdown target yields two spans; keep the outer.
    let mut end = 0;
    found.retain(|r| {
        let keep = r.span.start >= end;
        if keep {
            end = r.span.end;
        }
        keep
    });
    found
}

/// Distinct references in order of first appearance.
pub fn distinct(body: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for r in scan(body) {
        if !seen.contains(&r.reference) {
            seen.push(r.reference);
        }
    }
    seen
}

/// Replace every reference for which `resolve` returns a value.
///
/// Occurrences with no resolution are copied through untouched.
pub fn replace<'a, F>(body: &str, resolve: F) -> String
where
    F: Fn(&str) -> Option<&'a str>,
{
    let mut out = String::with_capacity(body.len());
    let mut cursor = 0;
    for r in scan(body) {
        if let Some(url) = resolve(&r.reference) {
            out.push_str(&body[cursor..r.span.start]);
            out.push_str(url);
            cursor = r.span.end;
        }
    }
    out.push_str(&body[cursor..]);
    out
}

/// The body with every reference target replaced by [`MASK`].
///
/// Used for the body fingerprint, so that rewriting references to URLs or
/// renaming an image file does not count as a prose change.
pub fn mask(body: &str) -> String {
    replace(body, |_| Some(MASK))
}

/// Whether a raw link target points at a file next to the post.
pub fn is_local(target: &str) -> bool {
    let t = target.trim();
    !(t.is_empty()
        || t.contains("://")
        || t.starts_with("//")
        || t.starts_with('/')
        || t.starts_with('#')
        || t.starts_with("data:")
        || t.starts_with("mailto:"))
}

/// Strip a leading `./` from a target.
pub fn normalize(target: &str) -> &str {
    target.strip_prefix("./").unwrap_or(target)
}

// ---------------------------------------------------------------------------
// Scanners
// ---------------------------------------------------------------------------

fn scan_markdown(body: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut from = 0;
    while let Some(rel) = body[from..].find("![") {
        let alt_start = from + rel + 2;
        from = alt_start;
        let Some(close_rel) = body[alt_start..].find("](") else {
            break;
        };
        let alt = &body[alt_start..alt_start + close_rel];
        if alt.contains("\n\n") {
            continue;
        }
        let mut start = alt_start + close_rel + 2;
        let bytes = body.as_bytes();
        while start < bytes.len() && (bytes[start] == b' ' || bytes[start] == b'\t') {
            start += 1;
        }
        let (start, end) = if bytes.get(start) == Some(&b'<') {
            match body[start + 1..].find('>') {
                Some(gt) => (start + 1, start + 1 + gt),
                None => continue,
            }
        } else {
            let len = body[start..]
                .find(|c: char| c.is_whitespace() || c == ')')
                .unwrap_or(body.len() - start);
            (start, start + len)
        };
        if end > start && body[end..].contains(')') {
            spans.push(start..end);
            from = end;
        }
    }
    spans
}

fn scan_html(body: &str) -> Vec<Range<usize>> {
    // ASCII lowercasing keeps byte offsets identical.
    let lower = body.to_ascii_lowercase();
    let mut spans = Vec::new();
    let mut from = 0;
    while let Some(rel) = lower[from..].find("<img") {
        let tag_start = from + rel;
        let tag_end = lower[tag_start..]
            .find('>')
            .map(|i| tag_start + i)
            .unwrap_or(lower.len());
        from = tag_end.max(tag_start + 4);

        let tag = &lower[tag_start..tag_end];
        let mut search = 0;
        while let Some(pos) = tag[search..].find("src=") {
            let attr = search + pos;
            search = attr + 4;
            let preceded_by_space = attr > 0
                && tag.as_bytes()[attr - 1].is_ascii_whitespace();
            if !preceded_by_space {
                continue;
            }
            let Some(&quote) = tag.as_bytes().get(attr + 4) else {
                break;
            };
            if quote != b'"' && quote != b'\'' {
                continue;
            }
            let value_start = attr + 5;
            if let Some(len) = tag[value_start..].find(quote as char) {
                spans.push(tag_start + value_start..tag_start + value_start + len);
            }
            break;
        }
    }
    spans
}

fn fenced_ranges(body: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut open: Option<usize> = None;
    let mut offset = 0;
    for line in body.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            match open.take() {
                Some(start) => ranges.push(start..offset + line.len()),
                None => open = Some(offset),
            }
        }
        offset += line.len();
    }
    if let Some(start) = open {
        ranges.push(start..body.len());
    }
    ranges
}
