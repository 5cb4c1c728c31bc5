//! Tag location in semi-structured source text.
//!
//! No HTML parser is involved: opening tags are found with a pattern and
//! matched to their closing tag with a depth counter, which keeps template
//! expressions and MDX components that would upset a real parser intact.

use crate::{PatchError, PatchResult};
use regex::Regex;
use tracing::debug;

/// Elements that never have a closing tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Check if a tag is an HTML void element.
pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(tag))
}

/// Check if `name` is a plain element name (`div`, `h2`, `my-widget`).
pub fn is_valid_tag_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Byte range of a whole element, opening tag through closing tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRange {
    /// Lowercased tag name.
    pub tag_name: String,
    pub outer_start: usize,
    pub outer_end: usize,
    pub self_closing: bool,
}

impl TagRange {
    /// The element's source text.
    pub fn outer<'a>(&self, source: &'a str) -> &'a str {
        &source[self.outer_start..self.outer_end]
    }
}

/// Convert a 1-indexed `(line, column)` to a byte offset.
///
/// Columns count characters. A column past the end of its line keeps
/// counting one byte per missing character. Returns `None` for line 0 and
/// lines past the end of the text.
pub fn position_offset(source: &str, line: usize, column: usize) -> Option<usize> {
    let line_index = line.checked_sub(1)?;
    let mut offset = 0;

    for (idx, text) in source.split('\n').enumerate() {
        if idx < line_index {
            offset += text.len() + 1;
            continue;
        }

        let chars = column.saturating_sub(1);
        let within = text
            .char_indices()
            .nth(chars)
            .map(|(byte, _)| byte)
            .unwrap_or_else(|| text.len() + chars.saturating_sub(text.chars().count()));
        return Some(offset + within);
    }

    None
}

/// Find the element named `tag` enclosing `(line, column)`.
///
/// A position matches an element when it lies inside the opening tag or
/// between the end of the opening tag and the start of the closing tag.
/// Self-closing and void elements match anywhere within their tag,
/// including the position right after it. Same-name candidates that match
/// are always nested, so the innermost one is returned.
pub fn find_tag_at_position(
    source: &str,
    line: usize,
    column: usize,
    tag: &str,
) -> PatchResult<Option<TagRange>> {
    if !is_valid_tag_name(tag) {
        return Err(PatchError::invalid_tag(tag));
    }

    let Some(offset) = position_offset(source, line, column) else {
        debug!(line, "Line outside of document");
        return Ok(None);
    };

    let tag_name = tag.to_ascii_lowercase();
    let escaped = regex::escape(&tag_name);
    let open_re = Regex::new(&format!(r"(?i)<{}\b[^>]*?>", escaped))?;
    let nest_re = Regex::new(&format!(r"(?i)<{0}\b[^>]*>|</{0}>", escaped))?;
    let void = is_void_element(&tag_name);

    let mut found = None;
    let mut candidates = 0;

    for open in open_re.find_iter(source) {
        candidates += 1;
        let (open_start, open_end) = (open.start(), open.end());

        if void || open.as_str().ends_with("/>") {
            if open_start <= offset && offset <= open_end {
                found = Some(TagRange {
                    tag_name: tag_name.clone(),
                    outer_start: open_start,
                    outer_end: open_end,
                    self_closing: true,
                });
            }
            continue;
        }

        let Some((close_start, close_end)) = find_matching_close(source, open_end, &nest_re)
        else {
            debug!(open_start, "No matching close tag for <{}>", tag_name);
            continue;
        };

        let in_content = open_end <= offset && offset < close_start;
        let in_open_tag = open_start <= offset && offset < open_end;
        if in_content || in_open_tag {
            found = Some(TagRange {
                tag_name: tag_name.clone(),
                outer_start: open_start,
                outer_end: close_end,
                self_closing: false,
            });
        }
    }

    if found.is_none() {
        debug!(
            line,
            column, candidates, "No <{}> encloses the position", tag_name
        );
    }
    Ok(found)
}

/// Find the closing tag balancing an opening tag that ends at `from`.
fn find_matching_close(source: &str, from: usize, nest_re: &Regex) -> Option<(usize, usize)> {
    let mut depth = 1usize;

    for m in nest_re.find_iter(&source[from..]) {
        if m.as_str().starts_with("</") {
            depth -= 1;
            if depth == 0 {
                return Some((from + m.start(), from + m.end()));
            }
        } else {
            depth += 1;
        }
    }

    None
}

/// Replace `source[start..end]` with `replacement`.
pub fn replace_outer_content(source: &str, start: usize, end: usize, replacement: &str) -> String {
    let mut result = String::with_capacity(source.len() - (end - start) + replacement.len());
    result.push_str(&source[..start]);
    result.push_str(replacement);
    result.push_str(&source[end..]);
    result
}
