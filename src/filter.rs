use crate::error::{CrawlError, LinkResolutionError};
use crate::utils::strip_escapes;
use regex::Regex;
use url::Url;

/// A glob-style scope pattern compiled to a case-insensitive regex.
///
/// * `*` matches any run of characters except `/`
/// * `**` matches anything, `/` included
/// * a trailing `/**/*` matches one or more path segments below the prefix
/// * a trailing `/*` matches exactly one direct child segment
///
/// Everything else is literal.
#[derive(Debug, Clone)]
pub struct ScopePattern {
    glob: String,
    regex: Regex,
}

impl ScopePattern {
    pub fn new(glob: &str) -> Result<Self, CrawlError> {
        let regex = Regex::new(&glob_to_regex(glob)).map_err(|source| {
            CrawlError::InvalidPattern {
                pattern: glob.to_string(),
                source,
            }
        })?;
        Ok(Self {
            glob: glob.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.glob
    }

    pub fn matches(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }

    /// Whether the pattern's literal text names the origin of `url`, which is
    /// how a caller opts in to crawling another site.
    pub fn names_origin(&self, url: &Url) -> bool {
        let origin = url.origin().ascii_serialization().to_lowercase();
        let glob = self.glob.to_lowercase();
        match glob.strip_prefix(&origin) {
            Some(rest) => rest.is_empty() || rest.starts_with('/') || rest.starts_with('*'),
            None => false,
        }
    }
}

/// Translate a scope glob into an anchored, case-insensitive regex.
pub fn glob_to_regex(glob: &str) -> String {
    let (body, tail) = if let Some(prefix) = glob.strip_suffix("/**/*") {
        (prefix, "/.+")
    } else if let Some(prefix) = glob.strip_suffix("/*") {
        (prefix, "/[^/]+")
    } else {
        (glob, "")
    };

    let mut out = String::from("(?i)^");
    let mut chars = body.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '*' {
            if chars.peek() == Some(&'*') {
                chars.next();
                out.push_str(".*");
            } else {
                out.push_str("[^/]*");
            }
        } else {
            out.push_str(&regex::escape(&ch.to_string()));
        }
    }
    out.push_str(tail);
    out.push('$');
    out
}

/// True when any pattern matches `url`. The result does not depend on pattern order.
pub fn matches_any(url: &str, patterns: &[ScopePattern]) -> bool {
    patterns.iter().any(|pattern| pattern.matches(url))
}

/// Clean an href and resolve it against `base`, dropping any fragment.
pub fn resolve_href(base: &Url, href: &str) -> Result<Url, LinkResolutionError> {
    let cleaned = strip_escapes(href.trim());
    let mut resolved = base.join(&cleaned).map_err(|e| LinkResolutionError {
        href: href.to_string(),
        base: base.to_string(),
        reason: e.to_string(),
    })?;
    resolved.set_fragment(None);
    Ok(resolved)
}

/// Decides which discovered links may enter the frontier.
#[derive(Debug, Clone)]
pub struct UrlFilter {
    seed_origin: url::Origin,
    patterns: Vec<ScopePattern>,
}

impl UrlFilter {
    pub fn new(seed: &Url, patterns: &[String]) -> Result<Self, CrawlError> {
        let patterns = patterns
            .iter()
            .map(|p| ScopePattern::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            seed_origin: seed.origin(),
            patterns,
        })
    }

    pub fn patterns(&self) -> &[ScopePattern] {
        &self.patterns
    }

    /// Scheme, origin and scope checks for an already resolved URL.
    /// Dedup against the frontier is the caller's job.
    pub fn should_crawl(&self, url: &Url) -> bool {
        if !matches!(url.scheme(), "http" | "https") {
            ::log::trace!("Rejecting non-http(s) link: {}", url);
            return false;
        }

        if url.origin() != self.seed_origin && !self.is_origin_opted_in(url) {
            ::log::debug!("Rejecting cross-origin link: {}", url);
            return false;
        }

        matches_any(url.as_str(), &self.patterns)
    }

    fn is_origin_opted_in(&self, url: &Url) -> bool {
        self.patterns.iter().any(|p| p.names_origin(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn filter(seed: &str, patterns: &[&str]) -> UrlFilter {
        let patterns: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
        UrlFilter::new(&Url::parse(seed).unwrap(), &patterns).unwrap()
    }

    #[rstest]
    #[case("https://site.com/docs/**/*", "https://site.com/docs/a/b/c", true)]
    #[case("https://site.com/docs/**/*", "https://site.com/docs/a", true)]
    #[case("https://site.com/docs/**/*", "https://site.com/other/x", false)]
    #[case("https://site.com/docs/**/*", "https://site.com/docs/", false)]
    #[case("https://site.com/docs/*", "https://site.com/docs/a", true)]
    #[case("https://site.com/docs/*", "https://site.com/docs/a/b", false)]
    #[case("https://site.com/**", "https://site.com/x/y.html", true)]
    #[case("https://site.com/*.html", "https://site.com/page.html", true)]
    #[case("https://site.com/*.html", "https://site.com/pagexhtml", false)]
    #[case("https://SITE.com/Docs/*", "https://site.com/docs/a", true)]
    fn test_scope_pattern_matches(#[case] glob: &str, #[case] url: &str, #[case] expected: bool) {
        let pattern = ScopePattern::new(glob).unwrap();
        assert_eq!(pattern.matches(url), expected, "{} vs {}", glob, url);
    }

    #[test]
    fn test_matches_any_is_order_independent() {
        let a = ScopePattern::new("https://site.com/docs/*").unwrap();
        let b = ScopePattern::new("https://site.com/blog/**/*").unwrap();
        let url = "https://site.com/blog/2024/post";
        assert!(matches_any(url, &[a.clone(), b.clone()]));
        assert!(matches_any(url, &[b, a]));
        assert!(!matches_any(url, &[]));
    }

    #[rstest]
    #[case("https://site.com/docs/page", "../img.png", "https://site.com/img.png")]
    #[case("https://site.com/docs/page", "other#frag", "https://site.com/docs/other")]
    #[case("https://site.com/docs/", r"a\_b", "https://site.com/docs/a_b")]
    #[case("https://site.com/docs/", "//cdn.site.com/x", "https://cdn.site.com/x")]
    fn test_resolve_href(#[case] base: &str, #[case] href: &str, #[case] expected: &str) {
        let base = Url::parse(base).unwrap();
        assert_eq!(resolve_href(&base, href).unwrap().as_str(), expected);
    }

    #[test]
    fn test_resolve_href_malformed() {
        let base = Url::parse("https://site.com/").unwrap();
        let err = resolve_href(&base, "http://[::1]:namedport").unwrap_err();
        assert_eq!(err.href, "http://[::1]:namedport");
    }

    #[rstest]
    #[case("mailto:me@site.com")]
    #[case("tel:+123")]
    #[case("javascript:void(0)")]
    #[case("ftp://site.com/docs/file")]
    fn test_rejects_non_http_schemes(#[case] link: &str) {
        let f = filter("https://site.com/docs/", &["**"]);
        assert!(!f.should_crawl(&Url::parse(link).unwrap()));
    }

    #[test]
    fn test_cross_origin_requires_opt_in() {
        let f = filter("https://site.com/docs/", &["https://site.com/**", "**/*"]);
        assert!(!f.should_crawl(&Url::parse("https://other.com/docs/a").unwrap()));
        assert!(f.should_crawl(&Url::parse("https://site.com/docs/a").unwrap()));

        let f = filter(
            "https://site.com/docs/",
            &["https://site.com/**", "https://other.com/**"],
        );
        assert!(f.should_crawl(&Url::parse("https://other.com/docs/a").unwrap()));
        assert!(!f.should_crawl(&Url::parse("https://other.com.evil/a").unwrap()));
    }

    #[test]
    fn test_names_origin_requires_boundary() {
        let p = ScopePattern::new("https://other.com.evil/**").unwrap();
        assert!(!p.names_origin(&Url::parse("https://other.com/").unwrap()));
        let p = ScopePattern::new("https://other.com/**").unwrap();
        assert!(p.names_origin(&Url::parse("https://other.com/x").unwrap()));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let p = ScopePattern::new("https://site.com/a+(b)/*").unwrap();
        assert!(p.matches("https://site.com/a+(b)/c"));
        assert!(!p.matches("https://site.com/aa(b)/c"));
    }
}
