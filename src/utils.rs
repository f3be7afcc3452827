use regex::Regex;
use std::sync::LazyLock;

static ESCAPED_CHAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\(.)").expect("static regex is valid"));

/// Collapse every whitespace run (newlines included) into one space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop the backslash from every `\x` escape pair, keeping `x`.
pub fn strip_escapes(text: &str) -> String {
    ESCAPED_CHAR.replace_all(text, "$1").into_owned()
}

/// Default scope for a seed URL: everything below the seed's directory.
///
/// `https://site.com/docs/` becomes `https://site.com/docs/**/*` and
/// `https://site.com/docs/page` becomes `https://site.com/docs/**/*`.
pub fn default_scope_pattern(seed: &str) -> String {
    if seed.ends_with('/') {
        format!("{}**/*", seed)
    } else {
        let dir = seed.rfind('/').map(|idx| &seed[..idx]).unwrap_or(seed);
        format!("{}/**/*", dir)
    }
}

/// Append `.yaml` unless the path already ends with it.
pub fn yaml_output_path(output: &str) -> String {
    if output.ends_with(".yaml") {
        output.to_string()
    } else {
        format!("{}.yaml", output)
    }
}
