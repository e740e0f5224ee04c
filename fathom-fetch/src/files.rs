//! Document downloads

use reqwest::Client;
use tracing::{debug, warn};

use crate::FetchError;

/// Largest document accepted for text extraction
pub const MAX_DOCUMENT_BYTES: usize = 25 * 1024 * 1024;

fn too_large(url: &str, bytes: u64) -> FetchError {
    FetchError::Pdf(format!(
        "{} is at least {} bytes, over the {} byte limit",
        url, bytes, MAX_DOCUMENT_BYTES
    ))
}

/// Download a PDF and extract its text.
///
/// Document hosts are third parties, so a failed download is always a plain
/// [`FetchError::Status`] and never a collaborator failure.
pub async fn download_pdf_text(client: &Client, url: &str) -> Result<String, FetchError> {
    debug!("Downloading document: {}", url);

    let mut response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        warn!("Download of {} returned status: {}", url, status);
        return Err(FetchError::Status {
            status: status.as_u16(),
            message: format!("document download from {} failed", url),
        });
    }

    if let Some(length) = response.content_length() {
        if length > MAX_DOCUMENT_BYTES as u64 {
            return Err(too_large(url, length));
        }
    }

    let mut bytes: Vec<u8> = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if bytes.len() + chunk.len() > MAX_DOCUMENT_BYTES {
            return Err(too_large(url, (bytes.len() + chunk.len()) as u64));
        }
        bytes.extend_from_slice(&chunk);
    }

    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| FetchError::Pdf(e.to_string()))?
        .map_err(|e| FetchError::Pdf(e.to_string()))?;

    Ok(normalize_pdf_text(&text))
}

/// Collapse runs of spaces within lines and drop blank lines
pub fn normalize_pdf_text(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
