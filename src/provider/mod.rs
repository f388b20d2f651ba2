//! OCR provider adapters.
//!
//! Each provider is a thin client over an external OCR engine (cloud
//! API or local executable) that normalizes the engine's wire format
//! into [`OcrPageResult`]s. The adapters own request chunking, retry,
//! and page renumbering; inference itself happens elsewhere.

pub mod azure;
pub mod google;
pub mod tesseract;

pub use azure::AzureDocumentIntelligenceProvider;
pub use google::GoogleDocumentAiProvider;
pub use tesseract::TesseractProvider;

use crate::error::{Error, Result};
use crate::model::{Document, DocumentNode, OcrPageResult, ProviderResult};
use crate::select::PageSelection;
use std::collections::BTreeMap;
use std::time::Duration;

/// What a provider can do with a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Page text with geometry
    TextExtraction,
    /// Layout structure (lines, blocks)
    LayoutAnalysis,
    /// Returns page rasters alongside text
    Rasterization,
}

/// An OCR provider: dispatches document pages to an external engine and
/// returns normalized per-page results.
#[allow(async_fn_in_trait)]
pub trait OcrProvider {
    /// Stable name used as the cache key on page nodes.
    fn name(&self) -> &str;

    /// Operations this provider supports.
    fn capabilities(&self) -> &[Capability];

    /// Run OCR over the selected pages of a document.
    ///
    /// The returned result is keyed by absolute 1-indexed page numbers
    /// of the input document, regardless of how the provider chunked or
    /// sub-split the upload.
    async fn process_document(
        &self,
        document: &Document,
        selection: &PageSelection,
    ) -> Result<ProviderResult>;
}

/// Run a provider over a document node and cache the per-page results
/// on the node, keyed by the provider's name.
///
/// Returns the same results for immediate use. A second run with the
/// same provider replaces its cached entries; other providers' entries
/// are left alone.
pub async fn process_document_node<P: OcrProvider>(
    provider: &P,
    node: &mut DocumentNode,
    selection: &PageSelection,
) -> Result<BTreeMap<u32, OcrPageResult>> {
    let result = provider.process_document(node.document(), selection).await?;
    node.store_ocr_results(result.pages.values().cloned());
    Ok(result.pages)
}

pub(crate) const DEFAULT_MAX_RETRIES: u32 = 3;
pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Reduce a document to the selected pages.
///
/// Returns the (possibly sub-split) document to upload plus the
/// absolute page numbers its pages correspond to: page `i` (1-indexed)
/// of the returned document is absolute page `mapping[i - 1]`.
pub(crate) fn subset_for_selection(
    document: &Document,
    selection: &PageSelection,
) -> Result<(Document, Vec<u32>)> {
    let resolved = selection.resolve(document.page_count())?;
    if resolved.len() == document.page_count() as usize {
        Ok((document.clone(), resolved))
    } else {
        Ok((document.split(selection)?, resolved))
    }
}

pub(crate) fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

/// Send a request with exponential backoff on retryable failures.
///
/// Retries on 408/429/5xx and transport timeouts; other error statuses
/// surface immediately with the response body as detail.
pub(crate) async fn send_with_retry<F>(
    build_request: F,
    provider: &str,
    max_retries: u32,
) -> Result<reqwest::Response>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_error: Option<Error> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay_ms = 500 * 2u64.pow(attempt - 1);
            log::debug!("{provider}: retry attempt {attempt} after {delay_ms}ms");
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        match build_request().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }

                let body = response.text().await.unwrap_or_default();
                let error = Error::Provider {
                    provider: provider.to_string(),
                    message: format!("HTTP {status}: {body}"),
                };

                if !is_retryable_status(status) {
                    return Err(error);
                }

                log::warn!("{provider}: retryable failure (HTTP {status})");
                last_error = Some(error);
            }
            Err(e) if e.is_timeout() || e.is_connect() => {
                log::warn!("{provider}: transport failure: {e}");
                last_error = Some(e.into());
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(last_error.unwrap_or_else(|| Error::Provider {
        provider: provider.to_string(),
        message: "request failed after retries".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    /// Serve one canned HTTP status line per expected request, then
    /// stop listening. Returns the base URL and a handle yielding the
    /// number of requests actually served.
    fn serve_statuses(
        statuses: &'static [&'static str],
    ) -> (String, std::thread::JoinHandle<usize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = std::thread::spawn(move || {
            let mut served = 0;
            for status in statuses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{{}}"
                );
                stream.write_all(response.as_bytes()).unwrap();
                served += 1;
            }
            served
        });

        (format!("http://{addr}/"), handle)
    }

    #[tokio::test]
    async fn test_non_retryable_status_surfaces_immediately() {
        let (url, server) = serve_statuses(&["401 Unauthorized"]);
        let client = reqwest::Client::new();

        let err = send_with_retry(|| client.get(&url), "stub", 3)
            .await
            .unwrap_err();
        match err {
            Error::Provider { message, .. } => assert!(message.contains("401")),
            other => panic!("unexpected error: {other}"),
        }

        // A single request: no retry after an auth failure.
        assert_eq!(server.join().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_retryable_status_retries_until_exhausted() {
        let (url, server) = serve_statuses(&[
            "503 Service Unavailable",
            "503 Service Unavailable",
            "503 Service Unavailable",
        ]);
        let client = reqwest::Client::new();

        let err = send_with_retry(|| client.get(&url), "stub", 2)
            .await
            .unwrap_err();
        match err {
            Error::Provider { message, .. } => assert!(message.contains("503")),
            other => panic!("unexpected error: {other}"),
        }

        // Initial attempt plus both retries.
        assert_eq!(server.join().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_retryable_status_then_success() {
        let (url, server) = serve_statuses(&["429 Too Many Requests", "200 OK"]);
        let client = reqwest::Client::new();

        let response = send_with_retry(|| client.get(&url), "stub", 3).await.unwrap();
        assert!(response.status().is_success());
        assert_eq!(server.join().unwrap(), 2);
    }

    #[test]
    fn test_retryable_statuses() {
        use reqwest::StatusCode;
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::REQUEST_TIMEOUT));
        assert!(is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable_status(StatusCode::FORBIDDEN));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_subset_for_selection_full_document() {
        let doc = crate::pdf::tests::sample_document(3);
        let (subset, mapping) = subset_for_selection(&doc, &PageSelection::All).unwrap();
        assert_eq!(subset.page_count(), 3);
        assert_eq!(mapping, vec![1, 2, 3]);
    }

    #[test]
    fn test_subset_for_selection_partial() {
        let doc = crate::pdf::tests::sample_document(5);
        let selection = PageSelection::Pages(vec![2, 4]);
        let (subset, mapping) = subset_for_selection(&doc, &selection).unwrap();
        assert_eq!(subset.page_count(), 2);
        assert_eq!(mapping, vec![2, 4]);
    }
}
