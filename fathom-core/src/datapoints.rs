//! Typed data points extracted from fetched pages
//!
//! Extraction runs four best-effort passes, in priority order:
//! - Caller-supplied patterns
//! - Label/value pairs from HTML tables
//! - JSON-LD structured data
//! - Numbers whose surrounding text mentions a query term
//!
//! Passes may report the same value twice; deduplication happens downstream.
//! Malformed markup or JSON never fails extraction, it just yields nothing.

use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use crate::text::{context_window, normalize_whitespace, query_terms};

/// Lexical category of an extracted value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataPointType {
    Statistic,
    Date,
    Currency,
    Percentage,
    Quote,
    Reference,
}

impl DataPointType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataPointType::Statistic => "statistic",
            DataPointType::Date => "date",
            DataPointType::Currency => "currency",
            DataPointType::Percentage => "percentage",
            DataPointType::Quote => "quote",
            DataPointType::Reference => "reference",
        }
    }
}

impl fmt::Display for DataPointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where in a page a data point was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataSource {
    /// Caller-supplied regular expression
    PatternMatch,
    /// HTML table cell following a label cell
    Table,
    /// JSON-LD block
    StructuredData,
    /// Free-text number near a query term
    Content,
    /// Structured statistics API page
    Api,
}

impl DataSource {
    /// Confidence assigned to values found by this pass
    pub fn default_confidence(&self) -> f64 {
        match self {
            DataSource::PatternMatch => 0.8,
            DataSource::Table => 0.9,
            DataSource::StructuredData => 0.95,
            DataSource::Content => 0.7,
            DataSource::Api => 0.9,
        }
    }
}

/// An atomic extracted fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Literal value as found in the source
    pub value: String,
    /// Category inferred from the value's shape
    #[serde(rename = "type")]
    pub data_type: DataPointType,
    /// Surrounding text for human verification
    pub context: String,
    /// Extraction pass that produced it
    pub source: DataSource,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f64,
}

impl DataPoint {
    /// Create a data point, classifying its type and using the source's default confidence
    pub fn new(value: &str, source: DataSource) -> Self {
        Self {
            value: value.to_string(),
            data_type: classify_data_type(value),
            context: String::new(),
            source,
            confidence: source.default_confidence(),
        }
    }

    pub fn with_context(mut self, context: &str) -> Self {
        self.context = context.to_string();
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_type(mut self, data_type: DataPointType) -> Self {
        self.data_type = data_type;
        self
    }

    /// Digits and dots of the value, e.g. "$27.36 trillion" -> "27.36"
    pub fn numeric_digits(&self) -> String {
        numeric_digits(&self.value)
    }

    /// Leading float of the value's digits, if any
    pub fn numeric_value(&self) -> Option<f64> {
        parse_leading_float(&self.numeric_digits())
    }

    /// Display form used by result consumers
    pub fn display(&self) -> String {
        self.value.clone()
    }
}

/// Keep only ASCII digits and dots
pub fn numeric_digits(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect()
}

/// Parse the longest valid float prefix ("27.36.1" -> 27.36)
pub fn parse_leading_float(digits: &str) -> Option<f64> {
    let mut end = 0;
    let mut seen_dot = false;
    for (i, c) in digits.char_indices() {
        match c {
            '0'..='9' => end = i + 1,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
    }
    digits[..end].parse().ok()
}

static MAGNITUDE_WORD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\d+\.?\d*\s*(?:billion|million|trillion)").unwrap()
});

static YEAR_TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{4})\b").unwrap());

static PURE_NUMBER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.?\d*$").unwrap());

/// Infer a data point type from the lexical shape of a value
pub fn classify_data_type(value: &str) -> DataPointType {
    if value.contains('%') {
        return DataPointType::Percentage;
    }
    if value.contains('$') || MAGNITUDE_WORD_REGEX.is_match(value) {
        return DataPointType::Currency;
    }
    let has_year = YEAR_TOKEN_REGEX
        .captures_iter(value)
        .any(|cap| cap[1].parse::<u32>().is_ok_and(|year| year > 1900));
    if has_year {
        return DataPointType::Date;
    }
    let compact: String = value
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if PURE_NUMBER_REGEX.is_match(&compact) {
        return DataPointType::Statistic;
    }
    DataPointType::Reference
}

/// Whether a string carries data worth keeping (a digit, `$` or `%`, under 100 chars)
pub fn looks_like_data(value: &str) -> bool {
    let len = value.chars().count();
    len > 0 && len < 100 && value.chars().any(|c| c.is_ascii_digit() || c == '$' || c == '%')
}

/// Context window for pattern matches
const PATTERN_CONTEXT: usize = 50;

/// Context window for free-text numbers
const NUMBER_CONTEXT: usize = 100;

static TABLE_ROW_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table tr").unwrap());

static TABLE_CELL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td, th").unwrap());

static JSON_LD_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());

static NUMBER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Magnitudes: "$4.2 billion", "27.36 trillion"
        r"(?i)\$?\d[\d,]*(?:\.\d+)?\s*(?:billion|million|trillion|thousand)\b",
        // Percentages
        r"\d+(?:\.\d+)?\s*%",
        // Dollar amounts
        r"\$\s*\d[\d,]*(?:\.\d+)?",
        // Years
        r"\b(?:19|20)\d{2}\b",
        // Large numbers with thousands separators
        r"\b\d{1,3}(?:,\d{3})+(?:\.\d+)?\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Ungrouped runs such as "1880000"; only kept where no pattern above matched
static PLAIN_NUMBER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4,}(?:\.\d+)?\b").unwrap());

/// Run every extraction pass over a page
pub fn extract_data_points(
    content: &str,
    html: &str,
    query: &str,
    patterns: &[Regex],
) -> Vec<DataPoint> {
    let mut data_points = extract_pattern_matches(content, patterns);
    data_points.extend(extract_table_data(html));
    data_points.extend(extract_structured_data(html));

    for point in extract_numbers_with_context(content, query) {
        if !data_points.iter().any(|dp| dp.value == point.value) {
            data_points.push(point);
        }
    }

    data_points
}

/// Pass 1: caller-supplied patterns
pub fn extract_pattern_matches(content: &str, patterns: &[Regex]) -> Vec<DataPoint> {
    let mut data_points = Vec::new();
    for pattern in patterns {
        for m in pattern.find_iter(content) {
            data_points.push(
                DataPoint::new(m.as_str(), DataSource::PatternMatch)
                    .with_context(&context_window(content, m.start(), PATTERN_CONTEXT)),
            );
        }
    }
    data_points
}

/// Pass 2: the cell right after a label cell, when it looks like data
pub fn extract_table_data(html: &str) -> Vec<DataPoint> {
    if html.is_empty() {
        return Vec::new();
    }

    let document = Html::parse_document(html);
    let mut data_points = Vec::new();

    for row in document.select(&TABLE_ROW_SELECTOR) {
        let cells: Vec<String> = row
            .select(&TABLE_CELL_SELECTOR)
            .map(|cell| normalize_whitespace(&cell.text().collect::<String>()))
            .collect();

        for pair in cells.windows(2) {
            let (label, value) = (&pair[0], &pair[1]);
            if looks_like_data(value) {
                data_points.push(
                    DataPoint::new(value, DataSource::Table)
                        .with_context(&format!("{}: {}", label, value)),
                );
            }
        }
    }

    data_points
}

/// Pass 3: scalar values inside JSON-LD blocks
pub fn extract_structured_data(html: &str) -> Vec<DataPoint> {
    if html.is_empty() {
        return Vec::new();
    }

    let document = Html::parse_document(html);
    let mut data_points = Vec::new();

    for script in document.select(&JSON_LD_SELECTOR) {
        let raw: String = script.text().collect();
        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value) => walk_json(&value, "", &mut data_points),
            Err(_) => continue,
        }
    }

    data_points
}

fn walk_json(value: &serde_json::Value, path: &str, out: &mut Vec<DataPoint>) {
    let children: Vec<(String, &serde_json::Value)> = match value {
        serde_json::Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        serde_json::Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => return,
    };

    for (key, child) in children {
        let child_path = if path.is_empty() {
            key
        } else {
            format!("{}.{}", path, key)
        };

        let scalar = match child {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        };

        match scalar {
            Some(text) if looks_like_data(&text) => out.push(
                DataPoint::new(&text, DataSource::StructuredData)
                    .with_context(&format!("{}: {}", child_path, text)),
            ),
            Some(_) => {}
            None => walk_json(child, &child_path, out),
        }
    }
}

/// Pass 4: currency/percentage/year/large-number matches near a query term
pub fn extract_numbers_with_context(content: &str, query: &str) -> Vec<DataPoint> {
    let terms = query_terms(query);
    if terms.is_empty() {
        return Vec::new();
    }

    let mut data_points: Vec<DataPoint> = Vec::new();
    let mut covered: Vec<(usize, usize)> = Vec::new();

    let keep = |value: &str, start: usize, data_points: &mut Vec<DataPoint>| {
        let context = context_window(content, start, NUMBER_CONTEXT);
        let context_lower = context.to_lowercase();

        if !terms.iter().any(|t| context_lower.contains(t.as_str())) {
            return;
        }
        if data_points.iter().any(|dp| dp.value == value) {
            return;
        }
        data_points.push(DataPoint::new(value, DataSource::Content).with_context(&context));
    };

    for pattern in NUMBER_PATTERNS.iter() {
        for m in pattern.find_iter(content) {
            covered.push((m.start(), m.end()));
            keep(m.as_str().trim(), m.start(), &mut data_points);
        }
    }

    // Years and separated numbers are already covered above
    for m in PLAIN_NUMBER_REGEX.find_iter(content) {
        if covered.iter().any(|&(start, end)| m.start() < end && start < m.end()) {
            continue;
        }
        keep(m.as_str(), m.start(), &mut data_points);
    }

    data_points
}
