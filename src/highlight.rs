use regex::{Regex, RegexBuilder};
use tracing::warn;

/// Wrap every case-insensitive occurrence of each keyword in a highlight
/// span and mark the content as an excerpt with a trailing `...`.
///
/// Keywords are matched literally. Content without keywords is returned
/// untouched.
pub fn highlight_keywords(content: &str, keywords: &[String]) -> String {
    if content.is_empty() || keywords.is_empty() {
        return content.to_string();
    }

    let mut highlighted = match keyword_pattern(keywords) {
        Some(regex) => regex
            .replace_all(content, "<span class=\"highlight-keyword\">$0</span>")
            .into_owned(),
        None => content.to_string(),
    };

    highlighted.push_str("...");
    highlighted
}

/// One case-insensitive alternation over all keywords, longest first, so
/// every match is made against the original content only
fn keyword_pattern(keywords: &[String]) -> Option<Regex> {
    let mut words: Vec<&str> = keywords
        .iter()
        .map(String::as_str)
        .filter(|k| !k.is_empty())
        .collect();
    if words.is_empty() {
        return None;
    }
    words.sort_by(|a, b| b.len().cmp(&a.len()));
    words.dedup();

    let alternation = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");

    match RegexBuilder::new(&alternation).case_insensitive(true).build() {
        Ok(regex) => Some(regex),
        Err(e) => {
            warn!(target: "highlight", "skipping keyword highlight: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kw(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_highlights_case_insensitively() {
        let out = highlight_keywords("Rust and rust", &kw(&["RUST"]));
        assert_eq!(
            out,
            "<span class=\"highlight-keyword\">Rust</span> and <span class=\"highlight-keyword\">rust</span>..."
        );
    }

    #[test]
    fn test_keywords_are_literal() {
        let out = highlight_keywords("c++ vs c", &kw(&["c++"]));
        assert_eq!(out, "<span class=\"highlight-keyword\">c++</span> vs c...");
    }

    #[test]
    fn test_later_keywords_do_not_match_inserted_markup() {
        let out = highlight_keywords("rust span", &kw(&["rust", "span"]));
        assert_eq!(
            out,
            "<span class=\"highlight-keyword\">rust</span> <span class=\"highlight-keyword\">span</span>..."
        );

        let out = highlight_keywords("highlight class", &kw(&["class", "highlight"]));
        assert_eq!(out.matches("<span").count(), 2);
        assert_eq!(out.matches("</span>").count(), 2);
    }

    #[test]
    fn test_longest_keyword_wins() {
        let out = highlight_keywords("tokio runtime", &kw(&["tok", "tokio"]));
        assert_eq!(
            out,
            "<span class=\"highlight-keyword\">tokio</span> runtime..."
        );
    }

    #[test]
    fn test_no_keywords_untouched() {
        assert_eq!(highlight_keywords("plain", &[]), "plain");
        assert_eq!(highlight_keywords("", &kw(&["x"])), "");
        assert_eq!(highlight_keywords("plain", &kw(&[""])), "plain...");
    }
}
