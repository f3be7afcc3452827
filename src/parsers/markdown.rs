//! Markdown tree round-trip for the cleanup passes.
//!
//! Parsing is delegated to the `markdown` crate (GFM enabled). Serialization
//! uses one fixed style: `-` bullets, one space after list markers, fenced
//! code, ATX headings, `*` emphasis, `~` strikethrough and no escaping of
//! text.

use crate::error::MarkdownError;
use ::markdown::mdast::{AlignKind, Link, List, ListItem, Node, ReferenceKind, Table};
use ::markdown::{ParseOptions, to_mdast};

/// Parse Markdown text into an mdast tree rooted at `Node::Root`.
pub fn parse(text: &str) -> Result<Node, MarkdownError> {
    to_mdast(text, &ParseOptions::gfm()).map_err(|message| MarkdownError(message.reason))
}

/// Serialize a tree back to Markdown text, ending with one newline.
pub fn serialize(node: &Node) -> String {
    let out = match node {
        Node::Root(root) => blocks(&root.children, "\n\n"),
        other => block(other),
    };
    let trimmed = out.trim_end_matches('\n');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}\n", trimmed)
    }
}

/// A link or image destination, wrapped in `<...>` when the bare form would
/// not parse (whitespace, `<`, or unbalanced parentheses).
pub fn destination(url: &str) -> String {
    if is_bare_destination(url) {
        url.to_string()
    } else {
        let inner = url
            .replace('<', "%3C")
            .replace('>', "%3E")
            .replace('\n', "%0A")
            .replace('\r', "%0D");
        format!("<{}>", inner)
    }
}

fn is_bare_destination(url: &str) -> bool {
    let mut depth = 0usize;
    for ch in url.chars() {
        match ch {
            '<' => return false,
            c if c.is_whitespace() || c.is_control() => return false,
            '(' => depth += 1,
            ')' => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            _ => {}
        }
    }
    depth == 0
}

fn blocks(children: &[Node], separator: &str) -> String {
    children
        .iter()
        .map(block)
        .filter(|b| !b.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

fn block(node: &Node) -> String {
    match node {
        Node::Root(root) => blocks(&root.children, "\n\n"),
        Node::Paragraph(p) => inline(&p.children),
        Node::Heading(h) => {
            let text = inline(&h.children);
            let hashes = "#".repeat(h.depth.clamp(1, 6) as usize);
            if text.is_empty() {
                hashes
            } else {
                format!("{} {}", hashes, text)
            }
        }
        Node::ThematicBreak(_) => "---".to_string(),
        Node::Blockquote(quote) => prefix_lines(&blocks(&quote.children, "\n\n"), "> ", ">"),
        Node::List(list) => list_block(list),
        Node::ListItem(item) => list_item(item, "-", item.spread),
        Node::Code(code) => {
            let fence = fence_for(&code.value);
            let mut info = code.lang.clone().unwrap_or_default();
            if let Some(meta) = &code.meta {
                info.push(' ');
                info.push_str(meta);
            }
            format!("{fence}{info}\n{}\n{fence}", code.value)
        }
        Node::Math(math) => format!("$$\n{}\n$$", math.value),
        Node::Html(html) => html.value.clone(),
        Node::Definition(def) => {
            let label = def.label.clone().unwrap_or_else(|| def.identifier.clone());
            format!(
                "[{}]: {}{}",
                label,
                destination(&def.url),
                title_suffix(&def.title)
            )
        }
        Node::FootnoteDefinition(def) => {
            let label = def.label.clone().unwrap_or_else(|| def.identifier.clone());
            let content = blocks(&def.children, "\n\n");
            let marker = format!("[^{}]: ", label);
            hang(&content, &marker, "    ")
        }
        Node::Table(table) => table_block(table),
        Node::Yaml(yaml) => format!("---\n{}\n---", yaml.value),
        Node::Toml(toml) => format!("+++\n{}\n+++", toml.value),
        phrasing => phrase(phrasing),
    }
}

fn list_block(list: &List) -> String {
    let spread = list.spread
        || list
            .children
            .iter()
            .any(|c| matches!(c, Node::ListItem(item) if item.spread));
    let start = list.start.unwrap_or(1);

    let items: Vec<String> = list
        .children
        .iter()
        .enumerate()
        .map(|(idx, child)| {
            let marker = if list.ordered {
                format!("{}.", start as usize + idx)
            } else {
                "-".to_string()
            };
            match child {
                Node::ListItem(item) => list_item(item, &marker, spread),
                other => hang(&block(other), &format!("{} ", marker), ""),
            }
        })
        .collect();

    items.join(if spread { "\n\n" } else { "\n" })
}

fn list_item(item: &ListItem, marker: &str, spread: bool) -> String {
    let mut content = blocks(&item.children, if spread { "\n\n" } else { "\n" });
    match item.checked {
        Some(true) => content.insert_str(0, "[x] "),
        Some(false) => content.insert_str(0, "[ ] "),
        None => {}
    }
    let first = format!("{} ", marker);
    let rest = " ".repeat(first.len());
    hang(&content, &first, &rest)
}

/// Put `first` before the first line and `rest` before every later non-empty line.
fn hang(content: &str, first: &str, rest: &str) -> String {
    if content.is_empty() {
        return first.trim_end().to_string();
    }
    content
        .split('\n')
        .enumerate()
        .map(|(idx, line)| {
            if idx == 0 {
                format!("{}{}", first, line)
            } else if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", rest, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn prefix_lines(content: &str, prefix: &str, empty_prefix: &str) -> String {
    content
        .split('\n')
        .map(|line| {
            if line.is_empty() {
                empty_prefix.to_string()
            } else {
                format!("{}{}", prefix, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// A backtick fence longer than any backtick run inside the code.
fn fence_for(code: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for ch in code.chars() {
        if ch == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat((longest + 1).max(3))
}

fn table_block(table: &Table) -> String {
    let rows: Vec<Vec<String>> = table
        .children
        .iter()
        .filter_map(|row| match row {
            Node::TableRow(row) => Some(
                row.children
                    .iter()
                    .map(|cell| match cell {
                        Node::TableCell(cell) => inline(&cell.children).replace('|', "\\|"),
                        other => phrase(other),
                    })
                    .collect(),
            ),
            _ => None,
        })
        .collect();

    let Some(header) = rows.first() else {
        return String::new();
    };
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);

    let mut lines = vec![table_row(header, columns)];
    let separators: Vec<String> = (0..columns)
        .map(|idx| {
            match table.align.get(idx).copied().unwrap_or(AlignKind::None) {
                AlignKind::Left => ":---",
                AlignKind::Right => "---:",
                AlignKind::Center => ":---:",
                AlignKind::None => "---",
            }
            .to_string()
        })
        .collect();
    lines.push(table_row(&separators, columns));
    for row in rows.iter().skip(1) {
        lines.push(table_row(row, columns));
    }
    lines.join("\n")
}

fn table_row(cells: &[String], columns: usize) -> String {
    let mut out = String::from("|");
    for idx in 0..columns {
        let cell = cells.get(idx).map(String::as_str).unwrap_or("");
        out.push(' ');
        out.push_str(cell);
        out.push_str(" |");
    }
    out
}

fn inline(children: &[Node]) -> String {
    children.iter().map(phrase).collect()
}

fn phrase(node: &Node) -> String {
    match node {
        Node::Text(text) => text.value.clone(),
        Node::Emphasis(em) => format!("*{}*", inline(&em.children)),
        Node::Strong(strong) => format!("**{}**", inline(&strong.children)),
        Node::Delete(del) => format!("~{}~", inline(&del.children)),
        Node::InlineCode(code) => {
            if code.value.contains('`') {
                format!("`` {} ``", code.value)
            } else {
                format!("`{}`", code.value)
            }
        }
        Node::InlineMath(math) => format!("${}$", math.value),
        Node::Break(_) => "\n".to_string(),
        Node::Html(html) => html.value.clone(),
        Node::Link(link) => link_syntax(link),
        Node::Image(image) => format!(
            "![{}]({}{})",
            image.alt,
            destination(&image.url),
            title_suffix(&image.title)
        ),
        Node::LinkReference(reference) => {
            let text = inline(&reference.children);
            let label = reference
                .label
                .clone()
                .unwrap_or_else(|| reference.identifier.clone());
            reference_syntax(&text, &label, &reference.reference_kind)
        }
        Node::ImageReference(reference) => {
            let label = reference
                .label
                .clone()
                .unwrap_or_else(|| reference.identifier.clone());
            format!(
                "!{}",
                reference_syntax(&reference.alt, &label, &reference.reference_kind)
            )
        }
        Node::FootnoteReference(reference) => {
            let label = reference
                .label
                .clone()
                .unwrap_or_else(|| reference.identifier.clone());
            format!("[^{}]", label)
        }
        Node::Paragraph(_)
        | Node::Heading(_)
        | Node::List(_)
        | Node::ListItem(_)
        | Node::Blockquote(_)
        | Node::Code(_)
        | Node::Table(_)
        | Node::Root(_) => block(node),
        other => other.to_string(),
    }
}

/// Autolinks keep the form they were written in: a bare URL in prose stays
/// bare and `<url>` stays bracketed. The source span tells them apart.
fn link_syntax(link: &Link) -> String {
    let text = inline(&link.children);
    let span = link
        .position
        .as_ref()
        .map(|p| p.end.offset.saturating_sub(p.start.offset));
    if link.title.is_none() && !text.is_empty() && link.url.ends_with(&text) {
        if span == Some(text.len()) {
            return text;
        }
        if span == Some(text.len() + 2) {
            return format!("<{}>", text);
        }
    }
    format!(
        "[{}]({}{})",
        text,
        destination(&link.url),
        title_suffix(&link.title)
    )
}

fn reference_syntax(text: &str, label: &str, kind: &ReferenceKind) -> String {
    match kind {
        ReferenceKind::Full => format!("[{}][{}]", text, label),
        ReferenceKind::Collapsed => format!("[{}][]", text),
        ReferenceKind::Shortcut => format!("[{}]", text),
    }
}

fn title_suffix(title: &Option<String>) -> String {
    match title {
        Some(title) => format!(" \"{}\"", title.replace('"', "\\\"")),
        None => String::new(),
    }
}
