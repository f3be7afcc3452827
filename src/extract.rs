//! Reader-mode extraction: isolate the article body of a page from its chrome.
//!
//! Candidates are scored the way Readability does it. Paragraph-like
//! elements with enough text award points to their parent and (halved)
//! grandparent, each candidate starts from a weight derived from its tag and
//! class/id hints, and the final score is scaled down by link density.

use crate::error::ExtractionError;
use crate::parsers::html::{self, HtmlElement, HtmlNode};
use crate::utils::{collapse_whitespace, strip_escapes};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Elements that never carry readable content.
const STRIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "link", "meta", "iframe", "object", "embed",
    "canvas",
];

const PARAGRAPH_TAGS: &[&str] = &["p", "pre", "td", "blockquote", "li"];

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dl", "div", "fieldset", "figure", "footer",
    "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "main", "nav", "ol", "p", "pre",
    "section", "table", "ul",
];

/// Paragraphs shorter than this are ignored when scoring.
const MIN_PARAGRAPH_CHARS: usize = 25;

static POSITIVE_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)article|body|content|entry|main|post|text|blog|story")
        .expect("static regex is valid")
});

static NEGATIVE_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)nav|menu|sidebar|footer|comment|share|social|related|banner|breadcrumb|widget|promo|sponsor|-ad-",
    )
    .expect("static regex is valid")
});

#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    /// Minimum number of characters the chosen content must contain.
    pub char_threshold: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            char_threshold: 100,
        }
    }
}

/// The page title plus the isolated content subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedContent {
    pub title: String,
    pub content: HtmlElement,
}

pub fn extract(raw: &str) -> Result<ExtractedContent, ExtractionError> {
    extract_with_options(raw, &ExtractOptions::default())
}

pub fn extract_with_options(
    raw: &str,
    options: &ExtractOptions,
) -> Result<ExtractedContent, ExtractionError> {
    let document = normalize_anchors(&html::parse_document(raw));
    let title = find_title(&document);

    let body = document.find_first("body").ok_or(ExtractionError::Empty)?;
    let body = strip_non_content(body);
    if body.text().trim().is_empty() {
        return Err(ExtractionError::Empty);
    }

    let content = select_content_root(&body);
    let found = collapse_whitespace(&content.text()).chars().count();
    if found < options.char_threshold {
        return Err(ExtractionError::NotSignificant {
            found,
            threshold: options.char_threshold,
        });
    }

    let content = clean_hrefs(&content);
    let content = reconcile_title(&content, &title);
    ::log::debug!(
        "Extracted <{}> with {} characters, title '{}'",
        content.tag_name,
        found,
        title
    );

    Ok(ExtractedContent { title, content })
}

/// `<title>` text with whitespace collapsed, falling back to the first `<h1>`.
fn find_title(document: &HtmlElement) -> String {
    let from_head = document
        .find_first("head")
        .and_then(|head| head.find_first("title"))
        .map(|t| collapse_whitespace(&t.text()))
        .filter(|t| !t.is_empty());

    from_head
        .or_else(|| {
            document
                .find_first("h1")
                .map(|h| collapse_whitespace(&h.text()))
        })
        .unwrap_or_default()
}

/// Anchor pre-pass over the whole document.
///
/// Empty anchors with an href get the href as their text, hrefs lose escape
/// backslashes, and anchor text has whitespace collapsed and trimmed.
pub fn normalize_anchors(el: &HtmlElement) -> HtmlElement {
    let children: Vec<HtmlNode> = el
        .children
        .iter()
        .map(|child| match child {
            HtmlNode::Element(child) => HtmlNode::Element(normalize_anchors(child)),
            other => other.clone(),
        })
        .collect();

    if el.tag_name != "a" {
        return el.with_children(children);
    }

    let href = el.attr("href").filter(|h| !h.is_empty()).map(strip_escapes);
    let mut anchor = el.with_children(collapse_text_nodes(&children));
    if let Some(href) = href {
        let has_image = anchor.find_first("img").is_some();
        if anchor.text().trim().is_empty() && !has_image {
            anchor = anchor.with_children(vec![HtmlNode::Text(href.clone())]);
        }
        anchor = anchor.with_attr("href", &href);
    }
    anchor
}

/// Collapse whitespace inside every text descendant and trim both ends of the run.
fn collapse_text_nodes(children: &[HtmlNode]) -> Vec<HtmlNode> {
    let mut collapsed: Vec<HtmlNode> = children.iter().map(collapse_node).collect();

    if let Some(HtmlNode::Text(first)) = collapsed.first_mut() {
        *first = first.trim_start().to_string();
    }
    if let Some(HtmlNode::Text(last)) = collapsed.last_mut() {
        *last = last.trim_end().to_string();
    }
    collapsed
}

fn collapse_node(node: &HtmlNode) -> HtmlNode {
    match node {
        HtmlNode::Text(text) => {
            let mut out = String::with_capacity(text.len());
            let mut in_space = false;
            for ch in text.chars() {
                if ch.is_whitespace() {
                    if !in_space {
                        out.push(' ');
                    }
                    in_space = true;
                } else {
                    out.push(ch);
                    in_space = false;
                }
            }
            HtmlNode::Text(out)
        }
        HtmlNode::Element(el) => {
            HtmlNode::Element(el.with_children(el.children.iter().map(collapse_node).collect()))
        }
        other => other.clone(),
    }
}

/// Drop comments and elements that never hold readable content.
fn strip_non_content(el: &HtmlElement) -> HtmlElement {
    let children = el
        .children
        .iter()
        .filter_map(|child| match child {
            HtmlNode::Comment(_) => None,
            HtmlNode::Element(child) if STRIPPED_TAGS.contains(&child.tag_name.as_str()) => None,
            HtmlNode::Element(child) => Some(HtmlNode::Element(strip_non_content(child))),
            HtmlNode::Text(text) => Some(HtmlNode::Text(text.clone())),
        })
        .collect();
    el.with_children(children)
}

fn select_content_root(body: &HtmlElement) -> HtmlElement {
    let mut scores: HashMap<Vec<usize>, f64> = HashMap::new();
    let mut path = Vec::new();
    score_paragraphs(body, body, &mut path, &mut scores);

    let best = scores
        .iter()
        .filter_map(|(path, score)| {
            element_at(body, path).map(|el| (path, score * (1.0 - link_density(el))))
        })
        .max_by(|a, b| {
            a.1.total_cmp(&b.1)
                // Prefer the shallower path on ties so results are deterministic.
                .then_with(|| b.0.len().cmp(&a.0.len()))
                .then_with(|| b.0.cmp(a.0))
        });

    match best.and_then(|(path, score)| {
        ::log::trace!("Best candidate at {:?} scored {:.2}", path, score);
        element_at(body, path)
    }) {
        Some(el) => el.clone(),
        None => body.clone(),
    }
}

fn score_paragraphs(
    body: &HtmlElement,
    el: &HtmlElement,
    path: &mut Vec<usize>,
    scores: &mut HashMap<Vec<usize>, f64>,
) {
    for (idx, child) in el.children.iter().enumerate() {
        let HtmlNode::Element(child) = child else {
            continue;
        };
        path.push(idx);

        if is_paragraph(child) {
            let text = collapse_whitespace(&child.text());
            let len = text.chars().count();
            if len >= MIN_PARAGRAPH_CHARS {
                let commas = text.matches(',').count() as f64;
                let points = 1.0 + commas + (len as f64 / 100.0).min(3.0);
                if !path.is_empty() {
                    award(body, &path[..path.len() - 1], points, scores);
                }
                if path.len() >= 2 {
                    award(body, &path[..path.len() - 2], points / 2.0, scores);
                }
            }
        }

        if child.tag_name != "pre" {
            score_paragraphs(body, child, path, scores);
        }
        path.pop();
    }
}

fn award(body: &HtmlElement, path: &[usize], points: f64, scores: &mut HashMap<Vec<usize>, f64>) {
    let Some(el) = element_at(body, path) else {
        return;
    };
    *scores
        .entry(path.to_vec())
        .or_insert_with(|| initial_score(el)) += points;
}

fn is_paragraph(el: &HtmlElement) -> bool {
    if PARAGRAPH_TAGS.contains(&el.tag_name.as_str()) {
        return true;
    }
    el.tag_name == "div"
        && !el
            .element_children()
            .any(|c| BLOCK_TAGS.contains(&c.tag_name.as_str()))
}

fn element_at<'a>(root: &'a HtmlElement, path: &[usize]) -> Option<&'a HtmlElement> {
    let mut current = root;
    for idx in path {
        current = current.children.get(*idx)?.as_element()?;
    }
    Some(current)
}

fn initial_score(el: &HtmlElement) -> f64 {
    tag_weight(&el.tag_name) + class_weight(el)
}

fn tag_weight(tag: &str) -> f64 {
    match tag {
        "article" | "main" => 25.0,
        "div" | "section" => 5.0,
        "pre" | "td" | "blockquote" => 3.0,
        "address" | "ol" | "ul" | "dl" | "dd" | "dt" | "li" | "form" => -3.0,
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "th" => -5.0,
        "nav" | "aside" | "footer" | "header" => -25.0,
        _ => 0.0,
    }
}

fn class_weight(el: &HtmlElement) -> f64 {
    let mut weight = 0.0;
    for hint in [el.attr("class"), el.attr("id")].into_iter().flatten() {
        if NEGATIVE_HINT.is_match(hint) {
            weight -= 25.0;
        }
        if POSITIVE_HINT.is_match(hint) {
            weight += 25.0;
        }
    }
    weight
}

/// Share of the element's text that sits inside links.
fn link_density(el: &HtmlElement) -> f64 {
    let total = collapse_whitespace(&el.text()).chars().count();
    if total == 0 {
        return 0.0;
    }
    let linked: usize = anchors(el)
        .iter()
        .map(|a| collapse_whitespace(&a.text()).chars().count())
        .sum();
    (linked as f64 / total as f64).min(1.0)
}

fn anchors(el: &HtmlElement) -> Vec<&HtmlElement> {
    let mut found = Vec::new();
    for child in el.element_children() {
        if child.tag_name == "a" {
            found.push(child);
        } else {
            found.extend(anchors(child));
        }
    }
    found
}

/// Second href-cleaning pass over the isolated content.
fn clean_hrefs(el: &HtmlElement) -> HtmlElement {
    let children = el
        .children
        .iter()
        .map(|child| match child {
            HtmlNode::Element(child) => HtmlNode::Element(clean_hrefs(child)),
            other => other.clone(),
        })
        .collect();
    let el = el.with_children(children);
    match (el.tag_name.as_str(), el.attr("href")) {
        ("a", Some(href)) => {
            let cleaned = strip_escapes(href);
            el.with_attr("href", &cleaned)
        }
        _ => el,
    }
}

/// Guarantee one canonical `h1` title at the top of the content.
///
/// When the first heading already contains the title it is promoted to `h1`;
/// otherwise a new `h1` with the title is prepended.
fn reconcile_title(content: &HtmlElement, title: &str) -> HtmlElement {
    if title.is_empty() {
        return content.clone();
    }

    let (promoted, done) = promote_first_heading(content, title);
    if done {
        return promoted;
    }

    let heading = HtmlElement::new("h1", Vec::new(), vec![HtmlNode::Text(title.to_string())]);
    let mut children = Vec::with_capacity(content.children.len() + 1);
    children.push(HtmlNode::Element(heading));
    children.extend(content.children.iter().cloned());
    content.with_children(children)
}

/// Returns the rewritten tree and whether the first heading matched.
/// The search stops at the first heading either way.
fn promote_first_heading(el: &HtmlElement, title: &str) -> (HtmlElement, bool) {
    let mut children = Vec::with_capacity(el.children.len());
    let mut iter = el.children.iter();
    let mut outcome = None;

    for child in iter.by_ref() {
        match child {
            HtmlNode::Element(child) if child.is_heading() => {
                let matched = collapse_whitespace(&child.text()).contains(title);
                if matched {
                    let mut promoted = child.clone();
                    promoted.tag_name = "h1".to_string();
                    children.push(HtmlNode::Element(promoted));
                } else {
                    children.push(HtmlNode::Element(child.clone()));
                }
                outcome = Some(matched);
                break;
            }
            HtmlNode::Element(child) if child.find_first_heading().is_some() => {
                let (rewritten, matched) = promote_first_heading(child, title);
                children.push(HtmlNode::Element(rewritten));
                outcome = Some(matched);
                break;
            }
            other => children.push(other.clone()),
        }
    }
    children.extend(iter.cloned());

    (el.with_children(children), outcome.unwrap_or(false))
}

impl HtmlElement {
    fn find_first_heading(&self) -> Option<&HtmlElement> {
        for child in self.element_children() {
            if child.is_heading() {
                return Some(child);
            }
            if let Some(found) = child.find_first_heading() {
                return Some(found);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAGRAPH: &str = "Rust gives you control over memory, without a garbage collector, \
        and the borrow checker keeps references valid for as long as they are used.";

    fn page(title: &str, body: &str) -> String {
        format!(
            "<html><head><title>{}</title></head><body>{}</body></html>",
            title, body
        )
    }

    #[test]
    fn test_picks_article_over_navigation() {
        let raw = page(
            "Guide",
            &format!(
                "<nav class=\"menu\"><ul><li><a href=\"/a\">Home page of the whole site here</a></li>\
                 <li><a href=\"/b\">Another very long navigation link text</a></li></ul></nav>\
                 <article><h2>Guide</h2><p>{p}</p><p>{p}</p></article>\
                 <footer><p>Copyright notice for the website, all rights reserved.</p></footer>",
                p = PARAGRAPH
            ),
        );
        let extracted = extract(&raw).unwrap();
        assert_eq!(extracted.title, "Guide");
        assert_eq!(extracted.content.tag_name, "article");
        assert!(!extracted.content.text().contains("Copyright"));
        assert!(!extracted.content.text().contains("navigation"));
    }

    #[test]
    fn test_sparse_page_is_not_significant() {
        let raw = page("Tiny", "<p>Too short.</p>");
        let err = extract(&raw).unwrap_err();
        assert!(matches!(err, ExtractionError::NotSignificant { .. }));
    }

    #[test]
    fn test_empty_body() {
        let raw = page("Nothing", "   ");
        assert_eq!(extract(&raw).unwrap_err(), ExtractionError::Empty);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let raw = page("Tiny", "<div><p>Short but fine for a low threshold.</p></div>");
        let options = ExtractOptions { char_threshold: 10 };
        assert!(extract_with_options(&raw, &options).is_ok());
    }

    #[test]
    fn test_matching_subheading_is_promoted() {
        let raw = page(
            "Install",
            &format!("<article><h2>Install guide</h2><p>{}</p></article>", PARAGRAPH),
        );
        let content = extract(&raw).unwrap().content;
        let first = content.element_children().next().unwrap();
        assert_eq!(first.tag_name, "h1");
        assert_eq!(first.text(), "Install guide");
        assert!(content.find_first("h2").is_none());
    }

    #[test]
    fn test_title_heading_is_prepended_when_missing() {
        let raw = page(
            "My Title",
            &format!("<article><h2>Other</h2><p>{}</p></article>", PARAGRAPH),
        );
        let content = extract(&raw).unwrap().content;
        let headings: Vec<(String, String)> = content
            .element_children()
            .filter(|e| e.is_heading())
            .map(|e| (e.tag_name.clone(), e.text()))
            .collect();
        assert_eq!(
            headings,
            vec![
                ("h1".to_string(), "My Title".to_string()),
                ("h2".to_string(), "Other".to_string())
            ]
        );
    }

    #[test]
    fn test_comments_and_scripts_removed() {
        let raw = page(
            "T",
            &format!(
                "<article><!-- hidden --><script>var x = 1;</script><p>{}</p></article>",
                PARAGRAPH
            ),
        );
        let content = extract(&raw).unwrap().content;
        let html = content.outer_html();
        assert!(!html.contains("<!--"));
        assert!(!html.contains("var x"));
    }

    #[test]
    fn test_anchor_prepass() {
        let root = html::parse_document(
            "<html><body><a href=\"https://site.com/x\"></a>\
             <a href=\"/a\\_b\">  spread\n   over\n lines </a></body></html>",
        );
        let root = normalize_anchors(&root);
        let anchors: Vec<&HtmlElement> = anchors(root.find_first("body").unwrap());
        assert_eq!(anchors[0].text(), "https://site.com/x");
        assert_eq!(anchors[1].text(), "spread over lines");
        assert_eq!(anchors[1].attr("href"), Some("/a_b"));
    }

    #[test]
    fn test_title_falls_back_to_h1() {
        let raw = format!(
            "<html><body><article><h1>Heading Title</h1><p>{}</p></article></body></html>",
            PARAGRAPH
        );
        let extracted = extract(&raw).unwrap();
        assert_eq!(extracted.title, "Heading Title");
        let h1s = extracted
            .content
            .element_children()
            .filter(|e| e.tag_name == "h1")
            .count();
        assert_eq!(h1s, 1);
    }
}
