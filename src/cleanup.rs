//! Post-processing of rendered Markdown.
//!
//! [`clean`] always runs the passes in the same order: structural (on the
//! Markdown tree), then textual, then link absolutization. Textual rules and
//! absolutization never touch bytes inside fenced code blocks.

use crate::parsers::markdown;
use ::markdown::mdast::{Node, Text};
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static SPURIOUS_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\([&\[\]()_])").expect("static regex is valid"));

static TRAILING_BACKSLASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)([^\\])\\[ \t]*$").expect("static regex is valid"));

static EMPTY_ANCHOR_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\]\(#[^)]*\)").expect("static regex is valid"));

static MARKDOWN_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(!?\[[^\]]*\])\((<[^>\n]*>|[^)\s]+)((?:\s+"[^"]*")?)\)"#)
        .expect("static regex is valid")
});

static HAS_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*:").expect("static regex is valid"));

static DATA_IMAGE_SYNTAX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[([^\]]*)\]\(\s*<?(?i:data:image)[^)]*\)").expect("static regex is valid")
});

static DATA_IMAGE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\]]*)\]\(\s*<?(?i:data:image)[^)]*\)").expect("static regex is valid")
});

static DATA_IMAGE_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)data:image[^"'\s)>]*"#).expect("static regex is valid")
});

/// Run every pass in order: structural, textual, absolutization.
pub fn clean(markdown: &str, page_url: &Url) -> String {
    let structural = structural_cleanup(markdown);
    let textual = textual_cleanup(&structural);
    absolutize_links(&textual, page_url)
}

/// Parse, strip embedded images, and reserialize with the fixed style.
/// Image syntax the tree did not see is swept from prose afterwards.
pub fn structural_cleanup(text: &str) -> String {
    let serialized = match markdown::parse(text) {
        Ok(tree) => markdown::serialize(&strip_embedded_images(&tree)),
        Err(e) => {
            ::log::warn!("{}; stripping embedded images textually", e);
            text.to_string()
        }
    };
    sweep_data_images(&serialized)
}

/// Replace every data-URI image with the text `[<alt> (base64 image removed)]`
/// and unwrap links pointing at one. Returns a new tree; the input is left as it was.
pub fn strip_embedded_images(tree: &Node) -> Node {
    let mut tree = tree.clone();
    if let Some(children) = tree.children_mut() {
        replace_data_images(children);
    }
    tree
}

fn replace_data_images(children: &mut Vec<Node>) {
    for mut child in std::mem::take(children) {
        match &mut child {
            Node::Image(image) if is_data_image(&image.url) => {
                children.push(Node::Text(Text {
                    value: removed_image(&image.alt),
                    position: None,
                }));
                continue;
            }
            Node::Link(link) if is_data_image(&link.url) => {
                let mut text = std::mem::take(&mut link.children);
                replace_data_images(&mut text);
                children.extend(text);
                continue;
            }
            Node::Definition(def) if is_data_image(&def.url) => def.url = String::new(),
            Node::Html(html) if html.value.to_ascii_lowercase().contains("data:image") => {
                html.value = DATA_IMAGE_URI.replace_all(&html.value, "").into_owned();
            }
            _ => {}
        }
        if let Some(grandchildren) = child.children_mut() {
            replace_data_images(grandchildren);
        }
        children.push(child);
    }
}

fn removed_image(alt: &str) -> String {
    format!("[{} (base64 image removed)]", alt)
}

/// Textual removal of data-URI image and link syntax outside fenced code.
fn sweep_data_images(markdown: &str) -> String {
    split_fenced(markdown)
        .into_iter()
        .map(|segment| match segment {
            Segment::Fenced(block) => block,
            Segment::Prose(prose) => {
                let prose = DATA_IMAGE_SYNTAX.replace_all(&prose, "[$1 (base64 image removed)]");
                DATA_IMAGE_LINK.replace_all(&prose, "$1").into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_data_image(url: &str) -> bool {
    url.trim_start()
        .get(..10)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("data:image"))
}

/// String-level repairs outside fenced code.
///
/// Drops escape backslashes before `& [ ] ( ) _`, trailing backslash line
/// continuations and empty `[](#anchor)` links, and collapses runs of blank
/// lines to a single blank line.
pub fn textual_cleanup(markdown: &str) -> String {
    let mut lines: Vec<String> = Vec::new();

    for segment in split_fenced(markdown) {
        match segment {
            Segment::Fenced(block) => lines.extend(block.split('\n').map(str::to_string)),
            Segment::Prose(prose) => {
                let repaired = SPURIOUS_ESCAPE.replace_all(&prose, "$1");
                let repaired = TRAILING_BACKSLASH.replace_all(&repaired, "$1");
                let repaired = EMPTY_ANCHOR_LINK.replace_all(&repaired, "");
                for line in repaired.split('\n') {
                    let blank = line.trim().is_empty();
                    let after_blank = lines.last().is_none_or(|l| l.is_empty());
                    if blank && after_blank {
                        continue;
                    }
                    lines.push(if blank { String::new() } else { line.to_string() });
                }
            }
        }
    }

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    if lines.is_empty() {
        return String::new();
    }
    format!("{}\n", lines.join("\n"))
}

/// Resolve relative link and image targets against the page URL.
///
/// Targets with a scheme or a `//` prefix are left alone. A target that
/// cannot be resolved is kept as written and logged.
pub fn absolutize_links(markdown: &str, page_url: &Url) -> String {
    let mut out: Vec<String> = Vec::new();
    for segment in split_fenced(markdown) {
        match segment {
            Segment::Fenced(block) => out.push(block),
            Segment::Prose(prose) => out.push(
                MARKDOWN_LINK
                    .replace_all(&prose, |caps: &regex::Captures| {
                        let target = &caps[2];
                        let resolved = resolve_target(target, page_url);
                        format!("{}({}{})", &caps[1], resolved, &caps[3])
                    })
                    .into_owned(),
            ),
        }
    }
    out.join("\n")
}

fn resolve_target(target: &str, page_url: &Url) -> String {
    if let Some(inner) = target.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
        return markdown::destination(&resolve_target(inner, page_url));
    }
    if HAS_SCHEME.is_match(target) || target.starts_with("//") {
        return target.to_string();
    }
    match page_url.join(target) {
        Ok(resolved) => resolved.to_string(),
        Err(e) => {
            ::log::warn!(
                "Leaving link '{}' relative, cannot resolve against {}: {}",
                target,
                page_url,
                e
            );
            target.to_string()
        }
    }
}

enum Segment {
    Prose(String),
    Fenced(String),
}

/// Split Markdown into prose and fenced-code segments. Joining the segments
/// with `\n` gives back the input.
fn split_fenced(markdown: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut prose: Vec<&str> = Vec::new();
    let mut fenced: Vec<&str> = Vec::new();
    let mut open: Option<(char, usize)> = None;

    for line in markdown.split('\n') {
        match open {
            Some(fence) => {
                fenced.push(line);
                if closes_fence(line, fence) {
                    segments.push(Segment::Fenced(fenced.join("\n")));
                    fenced.clear();
                    open = None;
                }
            }
            None => match opening_fence(line) {
                Some(fence) => {
                    if !prose.is_empty() {
                        segments.push(Segment::Prose(prose.join("\n")));
                        prose.clear();
                    }
                    fenced.push(line);
                    open = Some(fence);
                }
                None => prose.push(line),
            },
        }
    }

    if !fenced.is_empty() {
        segments.push(Segment::Fenced(fenced.join("\n")));
    }
    if !prose.is_empty() {
        segments.push(Segment::Prose(prose.join("\n")));
    }
    segments
}

fn opening_fence(line: &str) -> Option<(char, usize)> {
    let trimmed = line.trim_start();
    let marker = trimmed.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = trimmed.chars().take_while(|c| *c == marker).count();
    (len >= 3).then_some((marker, len))
}

fn closes_fence(line: &str, (marker, len): (char, usize)) -> bool {
    let trimmed = line.trim();
    let run = trimmed.chars().take_while(|c| *c == marker).count();
    run >= len && run == trimmed.chars().count()
}
