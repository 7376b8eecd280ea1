use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;
use url::Url;

const URL_PATTERN: &str = r#"(?i)\bhttps?://[^\s<>"'\[\]]+"#;

fn url_regex() -> &'static Regex {
    static URL_REGEX: OnceLock<Regex> = OnceLock::new();
    URL_REGEX.get_or_init(|| Regex::new(URL_PATTERN).expect("url pattern must compile"))
}

/// Whether `candidate` is an absolute http(s) URL with a host.
pub fn is_valid_url(candidate: &str) -> bool {
    match Url::parse(candidate) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

/// Byte ranges of every valid URL in `text`, in order. Trailing sentence
/// punctuation is left outside the match.
pub fn find_urls(text: &str) -> Vec<Range<usize>> {
    url_regex()
        .find_iter(text)
        .filter_map(|m| {
            let trimmed = trim_trailing_punctuation(m.as_str());
            let range = m.start()..m.start() + trimmed.len();
            is_valid_url(&text[range.clone()]).then_some(range)
        })
        .collect()
}

fn trim_trailing_punctuation(candidate: &str) -> &str {
    let mut out = candidate;
    loop {
        let Some(last) = out.chars().next_back() else {
            return out;
        };
        let unbalanced_paren = last == ')' && out.matches('(').count() < out.matches(')').count();
        if matches!(last, '.' | ',' | ';' | ':' | '!' | '?') || unbalanced_paren {
            out = &out[..out.len() - last.len_utf8()];
        } else {
            return out;
        }
    }
}

/// Image URLs a paste can turn straight into an image block.
pub fn is_image_url(candidate: &str) -> bool {
    let Ok(url) = Url::parse(candidate.trim()) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    let path = url.path().to_ascii_lowercase();
    [".png", ".jpg", ".jpeg", ".gif", ".webp"]
        .iter()
        .any(|ext| path.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_urls_inside_prose() {
        let text = "see http://example.com for info, or https://a.io/x?y=1.";
        let found: Vec<_> = find_urls(text).into_iter().map(|r| &text[r]).collect();
        assert_eq!(found, vec!["http://example.com", "https://a.io/x?y=1"]);
    }

    #[test]
    fn keeps_balanced_parentheses() {
        let text = "(https://en.wikipedia.org/wiki/Rust_(language))";
        let found: Vec<_> = find_urls(text).into_iter().map(|r| &text[r]).collect();
        assert_eq!(found, vec!["https://en.wikipedia.org/wiki/Rust_(language)"]);
    }

    #[test]
    fn rejects_hostless_and_foreign_schemes() {
        assert!(!is_valid_url("http://"));
        assert!(!is_valid_url("ftp://example.com"));
        assert!(!is_valid_url("new label"));
        assert!(is_valid_url("https://example.com/a"));
    }

    #[test]
    fn recognizes_image_urls() {
        assert!(is_image_url("https://cdn.example.com/cat.PNG"));
        assert!(!is_image_url("https://example.com/page"));
    }
}
