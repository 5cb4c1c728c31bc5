//! Frontmatter and Markdown block detection.

use regex::Regex;
use std::sync::OnceLock;

struct LinePatterns {
    list_item: Regex,
    heading: Regex,
    code_fence: Regex,
    indented_code: Regex,
    blockquote: Regex,
    component: Regex,
    html_tag: Regex,
}

static PATTERNS: OnceLock<LinePatterns> = OnceLock::new();

/// Get the line classification patterns, compiling them once on first use.
fn patterns() -> &'static LinePatterns {
    PATTERNS.get_or_init(|| {
        let compile = |pattern: &str| {
            Regex::new(pattern).expect("Invalid regex pattern - this is a compile-time constant")
        };
        LinePatterns {
            list_item: compile(r"^(\s*)([-+*]|\d+\.)\s+"),
            heading: compile(r"^#{1,6}\s+"),
            code_fence: compile(r"^```"),
            indented_code: compile(r"^ {4,}\S"),
            blockquote: compile(r"^\s*>"),
            component: compile(r"^\s*<[A-Z][A-Za-z0-9]*\b"),
            html_tag: compile(r"^\s*<[^ >]+.*?>"),
        }
    })
}

/// Number of leading lines taken by a `---` delimited frontmatter block.
///
/// Returns 0 when the first line is not a delimiter or the block is never
/// closed.
pub fn frontmatter_len<S: AsRef<str>>(lines: &[S]) -> usize {
    let is_delimiter = |line: &S| line.as_ref().trim() == "---";

    match lines.first() {
        Some(first) if is_delimiter(first) => lines[1..]
            .iter()
            .position(is_delimiter)
            .map_or(0, |end| end + 2),
        _ => 0,
    }
}

/// What kind of Markdown block a line opens or continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    List,
    Heading,
    CodeFence,
    CodeIndent,
    Blockquote,
    /// MDX component such as `<Callout>`.
    Component,
    Html,
    Paragraph,
}

impl BlockKind {
    /// Classify a single line.
    pub fn of(line: &str) -> Self {
        let p = patterns();
        if p.list_item.is_match(line) {
            Self::List
        } else if p.heading.is_match(line) {
            Self::Heading
        } else if p.code_fence.is_match(line) {
            Self::CodeFence
        } else if p.indented_code.is_match(line) {
            Self::CodeIndent
        } else if p.blockquote.is_match(line) {
            Self::Blockquote
        } else if p.component.is_match(line) {
            Self::Component
        } else if p.html_tag.is_match(line) {
            Self::Html
        } else {
            Self::Paragraph
        }
    }

    /// Whether `line` continues a block of this kind.
    fn continues(self, line: &str) -> bool {
        if line.trim().is_empty() {
            return false;
        }
        let p = patterns();
        match self {
            Self::List => p.list_item.is_match(line),
            Self::Heading => false,
            Self::CodeFence => !p.code_fence.is_match(line),
            Self::CodeIndent => p.indented_code.is_match(line),
            Self::Blockquote => p.blockquote.is_match(line),
            Self::Component | Self::Html => true,
            Self::Paragraph => Self::of(line) == Self::Paragraph,
        }
    }
}

/// Inclusive line range of a Markdown block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkdownBlock {
    pub start: usize,
    pub end: usize,
    pub kind: BlockKind,
}

/// Find the block containing `lines[index]`.
///
/// The block's kind comes from the target line; the range grows in both
/// directions while neighbouring lines continue it. Blank lines always end a
/// block.
///
/// # Panics
///
/// Panics if `index` is out of bounds.
pub fn find_markdown_block<S: AsRef<str>>(lines: &[S], index: usize) -> MarkdownBlock {
    let kind = BlockKind::of(lines[index].as_ref());

    let start = (0..index)
        .rev()
        .take_while(|&i| kind.continues(lines[i].as_ref()))
        .last()
        .unwrap_or(index);
    let end = (index + 1..lines.len())
        .take_while(|&i| kind.continues(lines[i].as_ref()))
        .last()
        .unwrap_or(index);

    MarkdownBlock { start, end, kind }
}
