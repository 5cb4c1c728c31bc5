//! HTML to Markdown conversion for edited fragments.
//!
//! Fragments are parsed with `scraper` (html5ever), so entities, implied end
//! tags and void elements follow the HTML parsing rules.
//!
//! Output style: ATX headings, `-` bullets, fenced code blocks, `*` for
//! emphasis, `**` for strong and `---` for rules. Lists are rendered
//! recursively with four spaces per nesting level and empty items dropped.
//! A `<br>` next to visible text stays inline as `<br/>`; any other `<br>`
//! becomes a paragraph break.

use scraper::{ElementRef, Html, Node};

type NodeRef<'a> = ego_tree::NodeRef<'a, Node>;

const LIST_INDENT: &str = "    ";

/// Convert an HTML fragment to Markdown.
pub fn html_to_markdown(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let nodes: Vec<NodeRef> = fragment.root_element().children().collect();
    tidy(&render_nodes(&nodes, true))
}

/// Trim trailing whitespace per line, collapse blank runs, trim the ends.
fn tidy(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    for line in text.split('\n') {
        let line = line.trim_end();
        if line.is_empty() && lines.last().map_or(true, |last| last.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    while lines.last() == Some(&"") {
        lines.pop();
    }
    lines.join("\n")
}

/// Render sibling nodes. `line_start` says whether the first text would
/// begin a Markdown line, which decides leading-whitespace and escaping.
fn render_nodes(nodes: &[NodeRef], line_start: bool) -> String {
    let mut out = String::new();

    for (idx, node) in nodes.iter().enumerate() {
        let at_line_start = if out.is_empty() {
            line_start
        } else {
            out.ends_with('\n')
        };

        if let Node::Text(text) = node.value() {
            let mut text = collapse_whitespace(text);
            if at_line_start || out.ends_with(' ') {
                text = text.trim_start().to_string();
            }
            out.push_str(&escape_markdown(&text, at_line_start));
            continue;
        }

        // comments, doctypes and processing instructions carry no content
        let Some(el) = ElementRef::wrap(*node) else {
            continue;
        };
        if tag(el) == "br" {
            out.push_str(render_br(nodes, idx));
            continue;
        }

        let rendered = render_element(el);
        if (at_line_start || out.ends_with(' ')) && rendered.starts_with(' ') {
            out.push_str(rendered.trim_start_matches(' '));
        } else {
            out.push_str(&rendered);
        }
    }

    out
}

fn tag<'a>(el: ElementRef<'a>) -> &'a str {
    el.value().name()
}

fn children<'a>(el: ElementRef<'a>) -> Vec<NodeRef<'a>> {
    el.children().collect()
}

fn text_content(el: ElementRef) -> String {
    el.text().collect()
}

fn is_visible_text(node: &NodeRef) -> bool {
    node.value()
        .as_text()
        .is_some_and(|text| !text.trim().is_empty())
}

fn render_element(el: ElementRef) -> String {
    match tag(el) {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = tag(el)[1..].parse::<usize>().unwrap_or(1);
            let text = render_nodes(&children(el), true).replace('\n', " ");
            let text = text.trim();
            if text.is_empty() {
                String::new()
            } else {
                format!("\n\n{} {}\n\n", "#".repeat(level), text)
            }
        }
        "ul" | "ol" => format!("\n\n{}\n\n", render_list(el, 0)),
        "li" => render_list_item(el, "- ", 0)
            .map(|item| format!("\n\n{}\n\n", item))
            .unwrap_or_default(),
        "blockquote" => {
            let inner = tidy(&render_nodes(&children(el), true));
            let quoted: Vec<String> = inner
                .split('\n')
                .map(|line| {
                    if line.is_empty() {
                        ">".to_string()
                    } else {
                        format!("> {}", line)
                    }
                })
                .collect();
            format!("\n\n{}\n\n", quoted.join("\n"))
        }
        "pre" => render_code_block(el),
        "hr" => "\n\n---\n\n".to_string(),
        "code" | "kbd" | "samp" => render_inline_code(&text_content(el)),
        "strong" | "b" => wrap_inline(&render_nodes(&children(el), false), "**"),
        "em" | "i" => wrap_inline(&render_nodes(&children(el), false), "*"),
        "a" => render_link(el),
        "img" => render_image(el),
        "p" | "div" | "section" | "article" | "header" | "footer" | "main" | "aside" | "nav"
        | "figure" | "figcaption" | "table" | "tr" | "dl" | "dt" | "dd" | "address" => {
            let inner = render_nodes(&children(el), true);
            let inner = inner.trim();
            if inner.is_empty() {
                "\n\n".to_string()
            } else {
                format!("\n\n{}\n\n", inner)
            }
        }
        "script" | "style" | "template" | "noscript" => String::new(),
        _ => render_nodes(&children(el), false),
    }
}

/// A `<br>` between visible text is a line break inside the paragraph;
/// anywhere else it separates blocks.
fn render_br(siblings: &[NodeRef], idx: usize) -> &'static str {
    let prev_is_text = idx
        .checked_sub(1)
        .and_then(|prev| siblings.get(prev))
        .is_some_and(is_visible_text);
    let next_is_text = siblings.get(idx + 1).is_some_and(is_visible_text);

    if prev_is_text || next_is_text {
        "<br/>"
    } else {
        "\n\n"
    }
}

fn render_list(list: ElementRef, depth: usize) -> String {
    let ordered = tag(list) == "ol";
    let start = list
        .attr("start")
        .and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(1);

    let mut number = start;
    let mut items = Vec::new();
    for li in list.child_elements().filter(|el| tag(*el) == "li") {
        let bullet = if ordered {
            format!("{}. ", number)
        } else {
            "- ".to_string()
        };
        if let Some(item) = render_list_item(li, &bullet, depth) {
            items.push(item);
            number += 1;
        }
    }

    items.join("\n")
}

/// Render one `<li>`; `None` when it has neither text nor a nested list.
fn render_list_item(li: ElementRef, bullet: &str, depth: usize) -> Option<String> {
    let indent = LIST_INDENT.repeat(depth);
    let continuation = format!("\n{}{}", indent, LIST_INDENT);
    let mut chunks: Vec<String> = Vec::new();

    let flush = |group: &[NodeRef], chunks: &mut Vec<String>| {
        let text = tidy(&render_nodes(group, true));
        if !text.is_empty() {
            let lines: Vec<&str> = text.split('\n').collect();
            let mut chunk = lines[0].to_string();
            for line in &lines[1..] {
                if line.is_empty() {
                    chunk.push('\n');
                } else {
                    chunk.push_str(&continuation);
                    chunk.push_str(line);
                }
            }
            chunks.push(chunk);
        }
    };

    let nodes = children(li);
    let mut group_start = 0;
    for (idx, child) in nodes.iter().enumerate() {
        let Some(nested) = ElementRef::wrap(*child) else {
            continue;
        };
        if matches!(tag(nested), "ul" | "ol") {
            flush(&nodes[group_start..idx], &mut chunks);
            let rendered = render_list(nested, depth + 1);
            if !rendered.trim().is_empty() {
                chunks.push(format!("\n{}", rendered));
            }
            group_start = idx + 1;
        }
    }
    flush(&nodes[group_start..], &mut chunks);

    if chunks.is_empty() {
        return None;
    }

    let body = chunks.concat();
    let body = body.trim_end();
    if body.starts_with('\n') {
        Some(format!("{}{}{}", indent, bullet.trim_end(), body))
    } else {
        Some(format!("{}{}{}", indent, bullet, body))
    }
}

fn render_code_block(pre: ElementRef) -> String {
    let language = pre
        .child_elements()
        .find(|el| tag(*el) == "code")
        .and_then(|code| code.attr("class"))
        .and_then(|class| {
            class.split_whitespace().find_map(|name| {
                name.strip_prefix("language-")
                    .or_else(|| name.strip_prefix("lang-"))
            })
        })
        .unwrap_or("");

    let code = text_content(pre);
    let code = code.strip_suffix('\n').unwrap_or(&code);
    let fence = if code.contains("```") { "````" } else { "```" };

    format!("\n\n{}{}\n{}\n{}\n\n", fence, language, code, fence)
}

fn render_inline_code(code: &str) -> String {
    if code.is_empty() {
        String::new()
    } else if code.contains('`') {
        format!("`` {} ``", code)
    } else {
        format!("`{}`", code)
    }
}

fn render_link(a: ElementRef) -> String {
    let text = render_nodes(&children(a), false);
    let text = text.trim();
    match a.attr("href").filter(|href| !href.is_empty()) {
        Some(href) => format!("[{}]({}{})", text, href, title_suffix(a)),
        None => text.to_string(),
    }
}

fn render_image(img: ElementRef) -> String {
    match img.attr("src").filter(|src| !src.is_empty()) {
        Some(src) => format!(
            "![{}]({}{})",
            img.attr("alt").unwrap_or(""),
            src,
            title_suffix(img)
        ),
        None => String::new(),
    }
}

fn title_suffix(el: ElementRef) -> String {
    el.attr("title")
        .filter(|title| !title.is_empty())
        .map(|title| format!(" \"{}\"", title.replace('"', "\\\"")))
        .unwrap_or_default()
}

/// Wrap inline content in a delimiter, keeping surrounding spaces outside.
fn wrap_inline(content: &str, delimiter: &str) -> String {
    let core = content.trim();
    if core.is_empty() {
        return if content.is_empty() {
            String::new()
        } else {
            " ".to_string()
        };
    }

    let lead = if content.starts_with(char::is_whitespace) {
        " "
    } else {
        ""
    };
    let trail = if content.ends_with(char::is_whitespace) {
        " "
    } else {
        ""
    };
    format!("{}{}{}{}{}", lead, delimiter, core, delimiter, trail)
}

fn collapse_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut last_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !last_space {
                result.push(' ');
            }
            last_space = true;
        } else {
            result.push(c);
            last_space = false;
        }
    }
    result
}

/// Escape characters that would turn plain text into Markdown syntax.
fn escape_markdown(text: &str, line_start: bool) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '*' | '_' | '`' | '[' | ']') {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    if !line_start {
        return escaped;
    }

    if escaped.starts_with('#')
        || escaped.starts_with('>')
        || escaped.starts_with("- ")
        || escaped.starts_with("+ ")
    {
        return format!("\\{}", escaped);
    }

    // "1. text" would start an ordered list
    let digits = escaped.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 && escaped[digits..].starts_with(". ") {
        escaped.insert(digits, '\\');
    }
    escaped
}
