//! Link and text extraction from fetched HTML

use scraper::node::Node;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

use fathom_core::{host_of, normalize_whitespace};

static LINK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static TITLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static BODY_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());
static TABLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static VISUAL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("chart, graph, visualization").unwrap());

/// Extensions treated as downloadable data files
pub const FILE_EXTENSIONS: &[&str] = &[".pdf", ".xlsx", ".xls", ".csv", ".docx"];

/// In-domain links found on a page, split into pages and data files
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLinks {
    pub pages: Vec<String>,
    pub files: Vec<String>,
}

impl PageLinks {
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty() && self.files.is_empty()
    }
}

/// Extract absolute http(s) links that stay on `domain` (or a subdomain of it).
///
/// Relative hrefs resolve against `base_url`. Fragments are dropped and
/// duplicates removed, keeping first-seen order.
pub fn extract_links(html: &str, base_url: &str, domain: &str) -> PageLinks {
    let Ok(base) = Url::parse(base_url) else {
        return PageLinks::default();
    };
    let domain = domain.trim_start_matches("www.").to_lowercase();

    let document = Html::parse_document(html);
    let mut seen: HashSet<String> = HashSet::new();
    let mut links = PageLinks::default();

    for element in document.select(&LINK_SELECTOR) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let Ok(mut url) = base.join(href.trim()) else {
            continue;
        };
        if !matches!(url.scheme(), "http" | "https") {
            continue;
        }
        url.set_fragment(None);

        let url = url.to_string();
        let in_domain = host_of(&url)
            .is_some_and(|host| host == domain || host.ends_with(&format!(".{}", domain)));
        if !in_domain || !seen.insert(url.clone()) {
            continue;
        }

        if is_file_url(&url) {
            links.files.push(url);
        } else {
            links.pages.push(url);
        }
    }

    links
}

/// Lowercased file extension of a URL path (e.g. ".pdf")
pub fn file_extension(url: &str) -> Option<String> {
    let path = Url::parse(url).ok()?.path().to_lowercase();
    FILE_EXTENSIONS
        .iter()
        .find(|ext| path.ends_with(*ext))
        .map(|ext| ext.to_string())
}

pub fn is_file_url(url: &str) -> bool {
    file_extension(url).is_some()
}

pub fn is_pdf_url(url: &str) -> bool {
    file_extension(url).as_deref() == Some(".pdf")
}

/// Last non-empty path segment, used as a file title
pub fn file_name(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(str::to_string)
}

/// Coarse page kind: "pdf-viewer", "data-table", "visualization" or "article"
pub fn detect_source_type(html: &str) -> &'static str {
    if html.contains("application/pdf") {
        return "pdf-viewer";
    }

    let document = Html::parse_document(html);
    if document.select(&TABLE_SELECTOR).next().is_some() {
        "data-table"
    } else if document.select(&VISUAL_SELECTOR).next().is_some() {
        "visualization"
    } else {
        "article"
    }
}

/// Title and visible body text, skipping script/style/noscript subtrees
pub fn extract_text(html: &str) -> (Option<String>, String) {
    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let Some(body) = document.select(&BODY_SELECTOR).next() else {
        return (title, String::new());
    };

    let mut parts = Vec::new();
    for node_ref in body.descendants() {
        if let Node::Text(text_node) = node_ref.value() {
            let in_excluded = node_ref.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|el| matches!(el.name(), "script" | "style" | "noscript"))
            });

            let trimmed = text_node.trim();
            if !in_excluded && !trimmed.is_empty() {
                parts.push(trimmed);
            }
        }
    }

    (title, normalize_whitespace(&parts.join(" ")))
}
