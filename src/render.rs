//! Rule-based HTML to Markdown rendering.
//!
//! Rendering is a pure function of the subtree and a [`RenderOptions`] value.
//! Text is never escaped: Markdown metacharacters in the page pass through
//! untouched.

use crate::parsers::html::{HtmlElement, HtmlNode};
use crate::parsers::markdown::destination;
use crate::utils::strip_escapes;
use regex::Regex;
use std::sync::LazyLock;

static CODE_LANGUAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:highlight-source-|language-)([A-Za-z0-9_+#-]+)")
        .expect("static regex is valid")
});

const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "br", "cite", "code", "data", "del", "dfn", "em", "font", "i",
    "img", "input", "ins", "kbd", "label", "mark", "q", "s", "samp", "small", "span", "strike",
    "strong", "sub", "sup", "time", "tt", "u", "var", "wbr",
];

const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "head", "title"];

/// Markers used by the renderer. Built once and passed by reference to every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub bullet_marker: char,
    pub thematic_break: String,
    pub code_fence: String,
    pub emphasis_delimiter: String,
    pub strong_delimiter: String,
    pub strikethrough_delimiter: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            bullet_marker: '-',
            thematic_break: "---".to_string(),
            code_fence: "```".to_string(),
            emphasis_delimiter: "*".to_string(),
            strong_delimiter: "**".to_string(),
            strikethrough_delimiter: "~".to_string(),
        }
    }
}

/// Render an element's children as Markdown blocks.
pub fn render(content: &HtmlElement, options: &RenderOptions) -> String {
    Renderer { options }.blocks(&content.children, content)
}

/// Render loose nodes, e.g. the output of [`crate::parsers::html::parse_fragment`].
pub fn render_nodes(nodes: &[HtmlNode], options: &RenderOptions) -> String {
    render(&HtmlElement::new("div", Vec::new(), nodes.to_vec()), options)
}

struct Renderer<'a> {
    options: &'a RenderOptions,
}

impl Renderer<'_> {
    fn blocks(&self, nodes: &[HtmlNode], parent: &HtmlElement) -> String {
        self.blocks_joined(nodes, parent, "\n\n")
    }

    fn blocks_joined(&self, nodes: &[HtmlNode], parent: &HtmlElement, separator: &str) -> String {
        let mut blocks: Vec<String> = Vec::new();
        let mut run: Vec<HtmlNode> = Vec::new();

        for node in nodes {
            match node {
                HtmlNode::Element(el) if !is_inline(el) => {
                    self.flush_run(&mut run, &mut blocks);
                    let block = self.block(el, parent);
                    if !block.trim().is_empty() {
                        blocks.push(block);
                    }
                }
                HtmlNode::Comment(_) => {}
                other => run.push(other.clone()),
            }
        }
        self.flush_run(&mut run, &mut blocks);

        blocks.join(separator)
    }

    fn flush_run(&self, run: &mut Vec<HtmlNode>, blocks: &mut Vec<String>) {
        if run.is_empty() {
            return;
        }
        let text = self.inline(run);
        let text = text.trim();
        if !text.is_empty() {
            blocks.push(text.to_string());
        }
        run.clear();
    }

    fn block(&self, el: &HtmlElement, parent: &HtmlElement) -> String {
        match el.tag_name.as_str() {
            tag if SKIPPED_TAGS.contains(&tag) => String::new(),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = el.tag_name[1..].parse::<usize>().unwrap_or(1);
                let text = self.inline(&el.children);
                let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
                if text.is_empty() {
                    String::new()
                } else {
                    format!("{} {}", "#".repeat(level), text)
                }
            }
            "p" => self.inline(&el.children).trim().to_string(),
            "hr" => self.options.thematic_break.clone(),
            "pre" => self.code_block(el, parent),
            "ul" | "ol" => self.list(el),
            "blockquote" => {
                let inner = self.blocks(&el.children, el);
                inner
                    .split('\n')
                    .map(|line| {
                        if line.is_empty() {
                            ">".to_string()
                        } else {
                            format!("> {}", line)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            "table" => self.table(el),
            _ => self.blocks(&el.children, el),
        }
    }

    fn code_block(&self, pre: &HtmlElement, parent: &HtmlElement) -> String {
        let language = code_language(pre, parent).unwrap_or_default();

        let mut code = String::new();
        collect_code_text(&pre.children, &mut code);
        let code = code.strip_prefix('\n').unwrap_or(&code);
        let code = code.trim_end_matches('\n');

        let mut fence = self.options.code_fence.clone();
        while code.contains(fence.as_str()) {
            fence.push('`');
        }
        format!("{fence}{language}\n{code}\n{fence}")
    }

    fn list(&self, list: &HtmlElement) -> String {
        let ordered = list.tag_name == "ol";
        let mut number = list
            .attr("start")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(1);

        let mut items = Vec::new();
        for item in list.element_children() {
            let marker = if ordered {
                let marker = format!("{}. ", number);
                number += 1;
                marker
            } else {
                format!("{} ", self.options.bullet_marker)
            };
            let indent = " ".repeat(marker.len());

            let content = if item.tag_name == "li" {
                // Items holding paragraphs are loose; anything else stays tight.
                let loose = item.element_children().any(|c| c.tag_name == "p");
                let separator = if loose { "\n\n" } else { "\n" };
                self.blocks_joined(&item.children, item, separator)
            } else {
                self.block(item, list)
            };

            let lines: Vec<String> = content
                .split('\n')
                .enumerate()
                .map(|(idx, line)| match idx {
                    0 => format!("{}{}", marker, line),
                    _ if line.is_empty() => String::new(),
                    _ => format!("{}{}", indent, line),
                })
                .collect();
            items.push(lines.join("\n").trim_end().to_string());
        }
        items.join("\n")
    }

    fn table(&self, table: &HtmlElement) -> String {
        let mut rows: Vec<(Vec<String>, Vec<&str>)> = Vec::new();
        for row in table_rows(table) {
            let mut cells = Vec::new();
            let mut aligns = Vec::new();
            for cell in row.element_children() {
                if cell.tag_name != "td" && cell.tag_name != "th" {
                    continue;
                }
                let text = self.inline(&cell.children);
                let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
                cells.push(text.replace('|', "\\|"));
                aligns.push(cell_alignment(cell));
            }
            if !cells.is_empty() {
                rows.push((cells, aligns));
            }
        }

        let Some((header, aligns)) = rows.first() else {
            return String::new();
        };
        let columns = rows.iter().map(|(cells, _)| cells.len()).max().unwrap_or(0);

        let row_line = |cells: &[String]| {
            let mut line = String::from("|");
            for idx in 0..columns {
                line.push(' ');
                line.push_str(cells.get(idx).map(String::as_str).unwrap_or(""));
                line.push_str(" |");
            }
            line
        };

        let separators: Vec<String> = (0..columns)
            .map(|idx| aligns.get(idx).copied().unwrap_or("---").to_string())
            .collect();

        let mut lines = vec![row_line(header), row_line(&separators)];
        lines.extend(rows.iter().skip(1).map(|(cells, _)| row_line(cells)));
        lines.join("\n")
    }

    fn inline(&self, nodes: &[HtmlNode]) -> String {
        let mut out = String::new();
        for node in nodes {
            match node {
                HtmlNode::Text(text) => push_text(&mut out, text),
                HtmlNode::Element(el) => {
                    let rendered = self.inline_element(el);
                    push_text_raw(&mut out, &rendered);
                }
                HtmlNode::Comment(_) => {}
            }
        }
        out
    }

    fn inline_element(&self, el: &HtmlElement) -> String {
        match el.tag_name.as_str() {
            tag if SKIPPED_TAGS.contains(&tag) => String::new(),
            "br" => "\n".to_string(),
            "strong" | "b" => self.wrap(el, &self.options.strong_delimiter),
            "em" | "i" => self.wrap(el, &self.options.emphasis_delimiter),
            "del" | "s" | "strike" => self.wrap(el, &self.options.strikethrough_delimiter),
            "code" | "kbd" | "samp" | "tt" => {
                let code = el.text().replace('\n', " ");
                if code.is_empty() {
                    String::new()
                } else if code.contains('`') {
                    format!("`` {} ``", code)
                } else {
                    format!("`{}`", code)
                }
            }
            "a" => self.link(el),
            "img" => image(el),
            "input" => checkbox(el),
            _ => self.inline(&el.children),
        }
    }

    fn wrap(&self, el: &HtmlElement, delimiter: &str) -> String {
        let inner = self.inline(&el.children);
        let trimmed = inner.trim();
        if trimmed.is_empty() {
            return inner;
        }
        let lead = if inner.starts_with(' ') { " " } else { "" };
        let trail = if inner.ends_with(' ') { " " } else { "" };
        format!("{lead}{delimiter}{trimmed}{delimiter}{trail}")
    }

    fn link(&self, el: &HtmlElement) -> String {
        let text = strip_escapes(&self.inline(&el.children));
        let href = el.attr("href").map(strip_escapes).unwrap_or_default();
        if href.trim().is_empty() {
            return text;
        }
        let title = el
            .attr("title")
            .filter(|t| !t.is_empty())
            .map(|t| format!(" \"{}\"", t.replace('"', "\\\"")))
            .unwrap_or_default();
        format!("[{}]({}{})", text.trim(), destination(href.trim()), title)
    }
}

fn is_inline(el: &HtmlElement) -> bool {
    INLINE_TAGS.contains(&el.tag_name.as_str())
}

/// Language of a code block from `language-*` or `highlight-source-*` class
/// tokens. Searches the whole `pre` markup, then the parent's opening tag,
/// then the opening tag of the first child.
fn code_language(pre: &HtmlElement, parent: &HtmlElement) -> Option<String> {
    let candidates = [
        Some(pre.outer_html()),
        Some(parent.opening_tag()),
        pre.first_descendant().map(HtmlElement::opening_tag),
    ];
    candidates.into_iter().flatten().find_map(|markup| {
        CODE_LANGUAGE
            .captures(&markup)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    })
}

fn collect_code_text(nodes: &[HtmlNode], out: &mut String) {
    for node in nodes {
        match node {
            HtmlNode::Text(text) => out.push_str(text),
            HtmlNode::Element(el) if el.tag_name == "br" => out.push('\n'),
            HtmlNode::Element(el) => collect_code_text(&el.children, out),
            HtmlNode::Comment(_) => {}
        }
    }
}

fn image(el: &HtmlElement) -> String {
    let src = el.attr("src").unwrap_or_default().trim();
    if src.is_empty() {
        return String::new();
    }
    let alt = el.attr("alt").unwrap_or_default();
    let title = el
        .attr("title")
        .filter(|t| !t.is_empty())
        .map(|t| format!(" \"{}\"", t.replace('"', "\\\"")))
        .unwrap_or_default();
    format!("![{}]({}{})", alt, destination(src), title)
}

fn checkbox(el: &HtmlElement) -> String {
    let is_checkbox = el
        .attr("type")
        .is_some_and(|t| t.eq_ignore_ascii_case("checkbox"));
    match (is_checkbox, el.has_attr("checked")) {
        (false, _) => String::new(),
        (true, true) => "[x] ".to_string(),
        (true, false) => "[ ] ".to_string(),
    }
}

fn table_rows(table: &HtmlElement) -> Vec<&HtmlElement> {
    let mut rows = Vec::new();
    for child in table.element_children() {
        match child.tag_name.as_str() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => {
                rows.extend(child.element_children().filter(|r| r.tag_name == "tr"))
            }
            _ => {}
        }
    }
    rows
}

fn cell_alignment(cell: &HtmlElement) -> &'static str {
    let style_align = cell.attr("style").and_then(|style| {
        style.split(';').find_map(|decl| {
            let (key, value) = decl.split_once(':')?;
            (key.trim() == "text-align").then(|| value.trim().to_lowercase())
        })
    });
    let align = style_align.or_else(|| cell.attr("align").map(str::to_lowercase));
    match align.as_deref() {
        Some("left") => ":---",
        Some("center") => ":---:",
        Some("right") => "---:",
        _ => "---",
    }
}

/// Append HTML text with whitespace runs collapsed, never doubling a space.
fn push_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !(out.is_empty() || out.ends_with(' ') || out.ends_with('\n')) {
                out.push(' ');
            }
        } else {
            out.push(ch);
        }
    }
}

/// Append already rendered Markdown, dropping a leading space after whitespace.
fn push_text_raw(out: &mut String, rendered: &str) {
    let at_boundary = out.is_empty() || out.ends_with(' ') || out.ends_with('\n');
    if at_boundary {
        out.push_str(rendered.trim_start_matches(' '));
    } else {
        out.push_str(rendered);
    }
}
