//! External source collaborators: PDF text extraction and web crawling
//!
//! Both are consumed by the coordinator through narrow contracts. PDF byte
//! handling ships with a pdf-extract backend; crawling is deployment-provided
//! and defaults to a disabled implementation.

use crate::error::{CopilotError, Result};
use async_trait::async_trait;

/// Extract plain text from PDF bytes
pub trait PdfTextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<String>;
}

/// pdf-extract backed implementation
#[derive(Default)]
pub struct PdfExtractBackend;

impl PdfTextExtractor for PdfExtractBackend {
    fn extract(&self, bytes: &[u8]) -> Result<String> {
        pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| CopilotError::BadInput(format!("unreadable PDF: {e}")))
    }
}

/// Crawl pages reachable from a root URL
///
/// Implementations own robots compliance and deduplication; the coordinator
/// only consumes the `(url, text)` pairs.
#[async_trait]
pub trait PageCrawler: Send + Sync {
    async fn crawl(
        &self,
        url: &str,
        max_depth: usize,
        max_pages: usize,
    ) -> Result<Vec<(String, String)>>;
}

/// Placeholder crawler for deployments without one configured
#[derive(Default)]
pub struct DisabledCrawler;

#[async_trait]
impl PageCrawler for DisabledCrawler {
    async fn crawl(&self, url: &str, _: usize, _: usize) -> Result<Vec<(String, String)>> {
        Err(CopilotError::BadInput(format!(
            "no crawler configured; cannot ingest {url}"
        )))
    }
}

/// Fixed-page crawler for tests
pub struct StaticCrawler {
    pub pages: Vec<(String, String)>,
}

#[async_trait]
impl PageCrawler for StaticCrawler {
    async fn crawl(
        &self,
        _url: &str,
        _max_depth: usize,
        max_pages: usize,
    ) -> Result<Vec<(String, String)>> {
        Ok(self.pages.iter().take(max_pages).cloned().collect())
    }
}

/// Page count of extracted PDF text, inferred from form-feed separators
pub fn form_feed_pages(text: &str) -> usize {
    if text.trim().is_empty() {
        return 0;
    }
    text.matches('\u{c}').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_feed_pages() {
        assert_eq!(form_feed_pages(""), 0);
        assert_eq!(form_feed_pages("   "), 0);
        assert_eq!(form_feed_pages("one page"), 1);
        assert_eq!(form_feed_pages("page one\u{c}page two\u{c}page three"), 3);
    }

    #[test]
    fn test_pdf_backend_rejects_garbage() {
        let backend = PdfExtractBackend;
        let result = backend.extract(b"not a pdf at all");
        assert!(matches!(result, Err(CopilotError::BadInput(_))));
    }

    #[tokio::test]
    async fn test_disabled_crawler() {
        let crawler = DisabledCrawler;
        assert!(crawler.crawl("https://example.com", 1, 10).await.is_err());
    }

    #[tokio::test]
    async fn test_static_crawler_caps_pages() {
        let crawler = StaticCrawler {
            pages: vec![
                ("https://a".to_string(), "alpha".to_string()),
                ("https://b".to_string(), "beta".to_string()),
            ],
        };
        let pages = crawler.crawl("https://a", 1, 1).await.unwrap();
        assert_eq!(pages.len(), 1);
    }
}
