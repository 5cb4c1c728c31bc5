//! Applying edits to source documents.
//!
//! Template documents (`.astro`, `.html`) get the edited element's HTML
//! spliced in verbatim. Markdown documents (`.md`, `.mdx`) get the edit
//! converted back to Markdown, unless the element carries attributes, in
//! which case its HTML is kept on a single line so MDX still parses it.

use crate::block::{find_markdown_block, frontmatter_len};
use crate::locator::{find_tag_at_position, is_valid_tag_name, replace_outer_content};
use crate::markdown::html_to_markdown;
use crate::{PatchError, PatchResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

static OPEN_TAG: OnceLock<Regex> = OnceLock::new();
static CLOSE_TAG: OnceLock<Regex> = OnceLock::new();
static TEMPLATE_EXPRESSION: OnceLock<Regex> = OnceLock::new();
static LINE_BREAK: OnceLock<Regex> = OnceLock::new();

fn static_regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| {
        Regex::new(pattern).expect("Invalid regex pattern - this is a compile-time constant")
    })
}

/// How a document is patched, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// `.md` and `.mdx`
    Markdown,
    /// `.astro`, `.html` and `.htm`
    Template,
    /// Anything else; left untouched.
    Unsupported,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("md" | "mdx") => Self::Markdown,
            Some("astro" | "html" | "htm") => Self::Template,
            _ => Self::Unsupported,
        }
    }
}

/// One edit against a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchEdit {
    /// 1-indexed line of the element in the source file.
    pub line: usize,
    /// 1-indexed column of the element in the source file.
    pub column: usize,
    pub tag_name: String,
    /// New outer HTML of the element.
    pub content: String,
}

/// Result of patching one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchOutcome {
    pub text: String,
    pub applied: usize,
    pub skipped: usize,
}

/// Apply `edits` to `source` according to its document kind.
///
/// Returns `Ok(None)` for unsupported documents.
pub fn patch_document(
    kind: DocumentKind,
    source: &str,
    edits: &[PatchEdit],
) -> PatchResult<Option<PatchOutcome>> {
    match kind {
        DocumentKind::Markdown => patch_markdown(source, edits).map(Some),
        DocumentKind::Template => patch_template(source, edits).map(Some),
        DocumentKind::Unsupported => Ok(None),
    }
}

/// Validate tag names and order edits bottom-up, so that applying one never
/// shifts the line of another.
fn bottom_up(edits: &[PatchEdit]) -> PatchResult<Vec<&PatchEdit>> {
    if let Some(invalid) = edits.iter().find(|e| !is_valid_tag_name(&e.tag_name)) {
        return Err(PatchError::invalid_tag(&invalid.tag_name));
    }
    let mut ordered: Vec<&PatchEdit> = edits.iter().collect();
    ordered.sort_by(|a, b| b.line.cmp(&a.line));
    Ok(ordered)
}

/// Replace each edited element's outer HTML in a template document.
///
/// Elements whose current content holds a `{...}` expression are skipped:
/// the page shows the expression's value, and writing that value back
/// would replace the expression with a constant.
pub fn patch_template(source: &str, edits: &[PatchEdit]) -> PatchResult<PatchOutcome> {
    let mut outcome = PatchOutcome {
        text: source.to_string(),
        ..Default::default()
    };

    for edit in bottom_up(edits)? {
        let Some(range) =
            find_tag_at_position(&outcome.text, edit.line, edit.column, &edit.tag_name)?
        else {
            warn!(
                "Could not find <{}> at {}:{}",
                edit.tag_name, edit.line, edit.column
            );
            outcome.skipped += 1;
            continue;
        };

        let inner = inner_content(range.outer(&outcome.text));
        if static_regex(&TEMPLATE_EXPRESSION, r"\{[^}]+\}").is_match(&inner) {
            warn!(
                "Skipping <{}> at {}:{}: content contains a template expression",
                edit.tag_name, edit.line, edit.column
            );
            outcome.skipped += 1;
            continue;
        }

        debug!(
            start = range.outer_start,
            end = range.outer_end,
            "Replacing <{}>",
            edit.tag_name
        );
        outcome.text = replace_outer_content(
            &outcome.text,
            range.outer_start,
            range.outer_end,
            &edit.content,
        );
        outcome.applied += 1;
    }

    Ok(outcome)
}

/// Body of a Markdown document after the frontmatter.
///
/// Line edits work on `lines`, HTML passthrough edits on the joined text;
/// the body converts between the two only when the mode changes.
struct Body {
    lines: Vec<String>,
    joined: Option<String>,
}

impl Body {
    fn new(lines: Vec<String>) -> Self {
        Self {
            lines,
            joined: None,
        }
    }

    fn line_count(&self) -> usize {
        match &self.joined {
            Some(text) => text.split('\n').count(),
            None => self.lines.len(),
        }
    }

    fn lines_mut(&mut self) -> &mut Vec<String> {
        if let Some(text) = self.joined.take() {
            self.lines = split_lines(&text);
        }
        &mut self.lines
    }

    fn joined_mut(&mut self) -> &mut String {
        self.joined.get_or_insert_with(|| self.lines.join("\n"))
    }

    fn into_lines(self) -> Vec<String> {
        match self.joined {
            Some(text) => split_lines(&text),
            None => self.lines,
        }
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.split('\n').map(str::to_string).collect()
}

/// Apply edits to a Markdown or MDX document.
///
/// Edit lines are file lines; they are shifted past the frontmatter before
/// use, and edits landing outside the body are skipped.
pub fn patch_markdown(source: &str, edits: &[PatchEdit]) -> PatchResult<PatchOutcome> {
    let ordered = bottom_up(edits)?;

    let mut frontmatter = split_lines(source);
    let offset = frontmatter_len(frontmatter.as_slice());
    let mut body = Body::new(frontmatter.split_off(offset));
    let mut outcome = PatchOutcome::default();

    for edit in ordered {
        let index = edit
            .line
            .checked_sub(1 + offset)
            .filter(|&idx| idx < body.line_count());
        let Some(index) = index else {
            warn!(
                "Line {} is outside the document body ({} frontmatter lines), skipping <{}>",
                edit.line, offset, edit.tag_name
            );
            outcome.skipped += 1;
            continue;
        };

        let heading = is_heading(&edit.tag_name);
        let applied = if !heading && has_attributes(&edit.content, &edit.tag_name)? {
            apply_html(&mut body, index, edit)?
        } else {
            apply_markdown(&mut body, index, edit, heading)?;
            true
        };

        if applied {
            outcome.applied += 1;
        } else {
            outcome.skipped += 1;
        }
    }

    frontmatter.extend(body.into_lines());
    outcome.text = frontmatter.join("\n");
    Ok(outcome)
}

/// Splice an element's HTML into the body, collapsed onto one line.
fn apply_html(body: &mut Body, index: usize, edit: &PatchEdit) -> PatchResult<bool> {
    let text = body.joined_mut();
    let Some(range) = find_tag_at_position(text, index + 1, edit.column, &edit.tag_name)? else {
        warn!(
            "Could not find <{}> at body line {}:{}",
            edit.tag_name,
            index + 1,
            edit.column
        );
        return Ok(false);
    };

    let single_line = static_regex(&LINE_BREAK, r"\n\s*")
        .replace_all(&edit.content, " ")
        .trim()
        .to_string();
    debug!(
        start = range.outer_start,
        end = range.outer_end,
        "Keeping <{}> as HTML",
        edit.tag_name
    );
    *text = replace_outer_content(text, range.outer_start, range.outer_end, &single_line);
    Ok(true)
}

/// Convert an edit to Markdown and replace the heading line or the block
/// containing the target line.
fn apply_markdown(
    body: &mut Body,
    index: usize,
    edit: &PatchEdit,
    heading: bool,
) -> PatchResult<()> {
    let inner = strip_outer_tag(&edit.content, &edit.tag_name)?;
    let markdown = html_to_markdown(&format!("<{0}>{1}</{0}>", edit.tag_name, inner));
    let replacement = split_lines(&markdown);

    let lines = body.lines_mut();
    let (start, end) = if heading {
        (index, index)
    } else {
        let block = find_markdown_block(lines.as_slice(), index);
        debug!(kind = ?block.kind, "Replacing block {}..={}", block.start, block.end);
        (block.start, block.end)
    };
    lines.splice(start..=end, replacement);
    Ok(())
}

fn is_heading(tag: &str) -> bool {
    let bytes = tag.as_bytes();
    bytes.len() == 2 && bytes[0].eq_ignore_ascii_case(&b'h') && (b'1'..=b'6').contains(&bytes[1])
}

/// Whether the element's opening tag carries any attributes.
fn has_attributes(content: &str, tag: &str) -> PatchResult<bool> {
    let open = Regex::new(&format!(r"(?i)^<{}\b([^>]*?)(/?)>", regex::escape(tag)))?;
    Ok(open
        .captures(content.trim())
        .and_then(|caps| caps.get(1))
        .is_some_and(|attrs| !attrs.as_str().trim().is_empty()))
}

/// Inner HTML of an element given its outer HTML.
fn strip_outer_tag(content: &str, tag: &str) -> PatchResult<String> {
    let escaped = regex::escape(tag);
    let open = Regex::new(&format!(r"(?i)^<{}\b[^>]*>", escaped))?;
    let close = Regex::new(&format!(r"(?i)</{}>$", escaped))?;

    let without_open = open.replace(content.trim(), "");
    Ok(close.replace(&without_open, "").into_owned())
}

/// Content between the first opening and the last closing tag.
fn inner_content(outer: &str) -> String {
    let without_open = static_regex(&OPEN_TAG, r"^<[^>]+>").replace(outer, "");
    static_regex(&CLOSE_TAG, r"</[^>]+>$")
        .replace(&without_open, "")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit(line: usize, column: usize, tag: &str, content: &str) -> PatchEdit {
        PatchEdit {
            line,
            column,
            tag_name: tag.to_string(),
            content: content.to_string(),
        }
    }

    const POST: &str = "---\ntitle: Post\n---\n# Title\n\npara line one\npara line two\n\n- item1\n- item2";

    #[test]
    fn test_document_kind_from_path() {
        assert_eq!(
            DocumentKind::from_path(Path::new("docs/a.md")),
            DocumentKind::Markdown
        );
        assert_eq!(
            DocumentKind::from_path(Path::new("blog/post.MDX")),
            DocumentKind::Markdown
        );
        assert_eq!(
            DocumentKind::from_path(Path::new("src/pages/index.astro")),
            DocumentKind::Template
        );
        assert_eq!(
            DocumentKind::from_path(Path::new("public/about.html")),
            DocumentKind::Template
        );
        assert_eq!(
            DocumentKind::from_path(Path::new("src/app.tsx")),
            DocumentKind::Unsupported
        );
        assert_eq!(
            DocumentKind::from_path(Path::new("README")),
            DocumentKind::Unsupported
        );
    }

    #[test]
    fn test_unsupported_document_is_untouched() {
        let result = patch_document(
            DocumentKind::Unsupported,
            "x",
            &[edit(1, 1, "p", "<p>y</p>")],
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_template_replaces_outer_html() {
        let source = "---\nconst title = 'x';\n---\n<main>\n  <h1>Old title</h1>\n  <p>Body</p>\n</main>\n";
        let outcome = patch_template(source, &[edit(5, 3, "h1", "<h1>New title</h1>")]).unwrap();

        assert_eq!(outcome.applied, 1);
        assert_eq!(
            outcome.text,
            "---\nconst title = 'x';\n---\n<main>\n  <h1>New title</h1>\n  <p>Body</p>\n</main>\n"
        );
    }

    #[test]
    fn test_template_skips_dynamic_content() {
        let source = "<h1>{title}</h1>\n<p>Static</p>";
        let outcome = patch_template(
            source,
            &[
                edit(1, 1, "h1", "<h1>Rendered title</h1>"),
                edit(2, 1, "p", "<p>Changed</p>"),
            ],
        )
        .unwrap();

        assert_eq!(outcome.text, "<h1>{title}</h1>\n<p>Changed</p>");
        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.skipped, 1);
    }

    #[test]
    fn test_template_applies_bottom_up() {
        let source = "<h1>A</h1>\n<p>x</p>\n<p>y</p>";
        let outcome = patch_template(
            source,
            &[
                edit(1, 1, "h1", "<h1>A\nwith more</h1>"),
                edit(3, 1, "p", "<p>z</p>"),
            ],
        )
        .unwrap();

        assert_eq!(outcome.text, "<h1>A\nwith more</h1>\n<p>x</p>\n<p>z</p>");
        assert_eq!(outcome.applied, 2);
    }

    #[test]
    fn test_template_missing_tag_is_skipped() {
        let source = "<p>only</p>";
        let outcome = patch_template(source, &[edit(1, 1, "h2", "<h2>x</h2>")]).unwrap();
        assert_eq!(outcome.text, source);
        assert_eq!(outcome.skipped, 1);
    }

    #[test]
    fn test_markdown_paragraph_replaces_block() {
        let outcome =
            patch_markdown(POST, &[edit(6, 1, "p", "<p>New <strong>para</strong></p>")]).unwrap();
        assert_eq!(
            outcome.text,
            "---\ntitle: Post\n---\n# Title\n\nNew **para**\n\n- item1\n- item2"
        );
    }

    #[test]
    fn test_markdown_heading_replaces_single_line() {
        let outcome = patch_markdown(POST, &[edit(4, 1, "h1", "<h1>New Title</h1>")]).unwrap();
        assert!(outcome.text.contains("\n# New Title\n\npara line one\n"));
    }

    #[test]
    fn test_markdown_heading_with_attributes_still_converts() {
        let source = "## Old\n\ntext";
        let outcome =
            patch_markdown(source, &[edit(1, 1, "h2", "<h2 id=\"old\">Fresh</h2>")]).unwrap();
        assert_eq!(outcome.text, "## Fresh\n\ntext");
    }

    #[test]
    fn test_markdown_list_replaces_list_block() {
        let outcome = patch_markdown(
            POST,
            &[edit(
                9,
                1,
                "ul",
                "<ul><li>one</li><li>two</li><li>three</li></ul>",
            )],
        )
        .unwrap();
        assert!(outcome.text.ends_with("\n\n- one\n- two\n- three"));
    }

    #[test]
    fn test_markdown_html_passthrough_is_single_line() {
        let source = "# Doc\n\n<div class=\"note\">\n  Old text\n</div>\n\nafter";
        let outcome = patch_markdown(
            source,
            &[edit(
                3,
                1,
                "div",
                "<div class=\"note\">\n  New text\n</div>",
            )],
        )
        .unwrap();
        assert_eq!(
            outcome.text,
            "# Doc\n\n<div class=\"note\"> New text </div>\n\nafter"
        );
    }

    #[test]
    fn test_markdown_mixed_modes_keep_both_edits() {
        let source = "---\na: 1\n---\n# Old\n\n<div class=\"note\">\n  text\n</div>";
        let outcome = patch_markdown(
            source,
            &[
                edit(4, 1, "h1", "<h1>New</h1>"),
                edit(6, 1, "div", "<div class=\"note\">fresh</div>"),
            ],
        )
        .unwrap();
        assert_eq!(
            outcome.text,
            "---\na: 1\n---\n# New\n\n<div class=\"note\">fresh</div>"
        );
        assert_eq!(outcome.applied, 2);
    }

    #[test]
    fn test_markdown_lines_outside_body_are_skipped() {
        let outcome = patch_markdown(
            POST,
            &[
                edit(2, 1, "p", "<p>in frontmatter</p>"),
                edit(99, 1, "p", "<p>past the end</p>"),
            ],
        )
        .unwrap();
        assert_eq!(outcome.text, POST);
        assert_eq!(outcome.skipped, 2);
    }

    #[test]
    fn test_markdown_without_frontmatter() {
        let source = "first\nparagraph\n\nsecond";
        let outcome = patch_markdown(source, &[edit(4, 1, "p", "<p>2nd</p>")]).unwrap();
        assert_eq!(outcome.text, "first\nparagraph\n\n2nd");
    }

    #[test]
    fn test_invalid_tag_rejected() {
        let err = patch_markdown(POST, &[edit(4, 1, "h1 onclick", "<h1>x</h1>")]).unwrap_err();
        assert!(matches!(err, PatchError::InvalidTagName(_)));
    }

    #[test]
    fn test_attribute_detection() {
        assert!(has_attributes("<div class=\"a\">x</div>", "div").unwrap());
        assert!(has_attributes("  <IMG src=\"a.png\"/>", "img").unwrap());
        assert!(!has_attributes("<p>x</p>", "p").unwrap());
        assert!(!has_attributes("<br/>", "br").unwrap());
        assert!(!has_attributes("text", "p").unwrap());
    }

    #[test]
    fn test_strip_outer_tag() {
        assert_eq!(
            strip_outer_tag(" <p class=\"x\">a <b>b</b></p>\n", "p").unwrap(),
            "a <b>b</b>"
        );
        assert_eq!(inner_content("<h1 id=\"t\">Hi</h1>"), "Hi");
    }

    #[test]
    fn test_patch_edit_wire_format() {
        let edit: PatchEdit = serde_json::from_str(
            r#"{"line": 3, "column": 5, "tagName": "p", "content": "<p>x</p>"}"#,
        )
        .unwrap();
        assert_eq!(edit.tag_name, "p");
        assert_eq!(edit.column, 5);
    }
}
