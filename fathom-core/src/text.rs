//! Small text helpers shared by extraction, crawling and scoring

/// Lowercased, whitespace-separated query terms (empty terms dropped)
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .collect()
}

/// Collapse runs of whitespace into single spaces
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text window of `window` bytes either side of `index`, snapped to char boundaries
pub fn context_window(content: &str, index: usize, window: usize) -> String {
    let index = index.min(content.len());

    let mut start = index.saturating_sub(window);
    while !content.is_char_boundary(start) {
        start -= 1;
    }

    let mut end = index.saturating_add(window).min(content.len());
    while !content.is_char_boundary(end) {
        end += 1;
    }

    content[start..end].trim().to_string()
}

/// First `max_chars` characters of `text`
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Hostname of a URL with a leading `www.` removed
pub fn host_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_terms() {
        assert_eq!(query_terms("  US   GDP 2024 "), vec!["us", "gdp", "2024"]);
        assert!(query_terms("   ").is_empty());
    }

    #[test]
    fn test_context_window_respects_char_boundaries() {
        let text = "ééééé revenue €4.2 billion ééééé";
        let idx = text.find("€").unwrap();
        let ctx = context_window(text, idx, 3);
        assert!(!ctx.is_empty());

        let whole = context_window("short", 2, 100);
        assert_eq!(whole, "short");
    }

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("https://www.census.gov/data"), Some("census.gov".to_string()));
        assert_eq!(host_of("https://bls.gov"), Some("bls.gov".to_string()));
        assert_eq!(host_of("not a url"), None);
    }
}
