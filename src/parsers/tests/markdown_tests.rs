use crate::parsers::markdown::{destination, parse, serialize};
use ::markdown::mdast::Node;
use rstest::rstest;

fn round_trip(input: &str) -> String {
    serialize(&parse(input).unwrap())
}

#[rstest]
#[case("# Title\n\nSome text.", "# Title\n\nSome text.\n")]
#[case("* a\n* b", "- a\n- b\n")]
#[case("- a\n  - b", "- a\n  - b\n")]
#[case("3. x\n4. y", "3. x\n4. y\n")]
#[case("- [x] done\n- [ ] todo", "- [x] done\n- [ ] todo\n")]
#[case("> quote\n> more", "> quote\n> more\n")]
#[case("***", "---\n")]
#[case("_em_ and __strong__", "*em* and **strong**\n")]
#[case("~~gone~~", "~gone~\n")]
#[case("line one\\\nline two", "line one\nline two\n")]
fn test_fixed_style(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(round_trip(input), expected);
}

#[test]
fn test_fenced_code_keeps_language_and_body() {
    let input = "```rust\nfn main() {\n    println!(\"hi\");\n}\n```";
    assert_eq!(round_trip(input), format!("{}\n", input));
}

#[test]
fn test_indented_code_becomes_fenced() {
    assert_eq!(round_trip("    let x = 1;"), "```\nlet x = 1;\n```\n");
}

#[test]
fn test_fence_grows_past_inner_backticks() {
    let input = "````\n```\ninner\n```\n````";
    assert_eq!(round_trip(input), format!("{}\n", input));
}

#[test]
fn test_table() {
    let input = "| a | b |\n| - | :-: |\n| 1 | 2 |";
    assert_eq!(round_trip(input), "| a | b |\n| --- | :---: |\n| 1 | 2 |\n");
}

#[test]
fn test_links_and_images() {
    assert_eq!(
        round_trip("[text](/path \"T\") ![alt](img.png)"),
        "[text](/path \"T\") ![alt](img.png)\n"
    );
    assert_eq!(round_trip("<https://site.com>"), "<https://site.com>\n");
}

#[rstest]
#[case("Visit https://site.com/x today.", "Visit https://site.com/x today.\n")]
#[case("See www.site.com for more", "See www.site.com for more\n")]
#[case("Mail <me@site.com> now", "Mail <me@site.com> now\n")]
#[case("[https://a.com](https://a.com)", "[https://a.com](https://a.com)\n")]
fn test_autolinks_keep_their_form(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(round_trip(input), expected);
}

#[test]
fn test_destinations_that_need_brackets_survive() {
    let input = "[the page](<my page.html>) ![i](<a (b.png>)";
    assert_eq!(round_trip(input), format!("{}\n", input));
}

#[rstest]
#[case("/plain/path.html", "/plain/path.html")]
#[case("/wiki/A_(b)", "/wiki/A_(b)")]
#[case("my page.html", "<my page.html>")]
#[case("/wiki/A_(b", "</wiki/A_(b>")]
#[case("a)b", "<a)b>")]
#[case("x<y>", "<x%3Cy%3E>")]
fn test_destination(#[case] url: &str, #[case] expected: &str) {
    assert_eq!(destination(url), expected);
}

#[test]
fn test_text_is_not_escaped() {
    assert_eq!(round_trip("a_b_c 1 < 2"), "a_b_c 1 < 2\n");
}

#[test]
fn test_parse_produces_root() {
    assert!(matches!(parse("hello").unwrap(), Node::Root(_)));
    assert_eq!(round_trip(""), "");
}
