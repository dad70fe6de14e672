use crate::error::{ErrorKind, Result};
use crate::{InvalidationSet, PurgeReport, Purger};
use async_trait::async_trait;
use exn::ResultExt;
use reqwest::{Client, Method};
use std::time::Duration;
use tracing::instrument;

const PURGE_TYPE: &str = "X-Purge-Type";
const BOOK_ID: &str = "X-Book-Id";
const BOOK_NAME: &str = "X-Book-Name";
const BOOK_NAME_NODATE: &str = "X-Book-Name-Nodate";
const TIMEOUT: Duration = Duration::from_secs(30);

/// Sends `PURGE` requests to an HTTP cache.
#[derive(Debug, Clone)]
pub struct HttpPurger {
    client: Client,
    method: Method,
    url: String,
}
impl HttpPurger {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(TIMEOUT).build().or_raise(|| ErrorKind::Client)?;
        let method = Method::from_bytes(b"PURGE").or_raise(|| ErrorKind::Client)?;
        Ok(Self { client, method, url: url.into() })
    }

    /// `Ok(true)` on a 2xx response; rejections are logged.
    async fn send(&self, headers: &[(&str, &str)]) -> reqwest::Result<bool> {
        let mut request = self.client.request(self.method.clone(), &self.url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::error!(status = %status, headers = ?headers, "Purge request rejected");
        }
        Ok(status.is_success())
    }
}

#[async_trait]
impl Purger for HttpPurger {
    #[instrument(skip_all, fields(url = %self.url, books = set.len()))]
    async fn purge(&self, set: &InvalidationSet) -> Result<PurgeReport> {
        let mut report = PurgeReport::default();
        if set.is_empty() {
            tracing::info!("No changed books; not purging");
            return Ok(report);
        }

        tracing::info!("Purging catalog");
        let accepted = self.send(&[(PURGE_TYPE, "library")]).await.or_raise(|| ErrorKind::Unreachable(self.url.clone()))?;
        report.sent += 1;
        report.failed += usize::from(!accepted);

        for book in set.iter() {
            tracing::debug!(alias = book.alias, core = book.core, id = book.id, "Purging book");
            let headers = [(PURGE_TYPE, "book"), (BOOK_ID, book.id), (BOOK_NAME, book.core), (BOOK_NAME_NODATE, book.alias)];
            report.sent += 1;
            match self.send(&headers).await {
                Ok(true) => {},
                Ok(false) => report.failed += 1,
                Err(e) => {
                    tracing::error!(alias = book.alias, error = %e, "Purge request failed");
                    report.failed += 1;
                },
            }
        }
        tracing::info!(sent = report.sent, failed = report.failed, "Purge complete");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::Deref;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn changed() -> InvalidationSet {
        let mut set = InvalidationSet::default();
        set.insert("wikipedia_en_all", "0e3f2a", "wikipedia_en_all_2024-02");
        set.insert("ted_en", "9b1c44", "ted_en_2024-01");
        set
    }

    #[tokio::test]
    async fn test_purges_library_then_books() {
        let server = MockServer::start().await;
        Mock::given(method("PURGE"))
            .and(path("/"))
            .and(header(PURGE_TYPE, "library"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PURGE"))
            .and(header(PURGE_TYPE, "book"))
            .and(header(BOOK_ID, "0e3f2a"))
            .and(header(BOOK_NAME, "wikipedia_en_all_2024-02"))
            .and(header(BOOK_NAME_NODATE, "wikipedia_en_all"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PURGE"))
            .and(header(PURGE_TYPE, "book"))
            .and(header(BOOK_NAME_NODATE, "ted_en"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let purger = HttpPurger::new(format!("{}/", server.uri())).unwrap();
        let report = purger.purge(&changed()).await.unwrap();
        assert_eq!(report, PurgeReport { sent: 3, failed: 0 });

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests[0].headers.get(PURGE_TYPE).and_then(|v| v.to_str().ok()), Some("library"));
    }

    #[tokio::test]
    async fn test_rejections_are_counted_not_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("PURGE"))
            .and(header(PURGE_TYPE, "library"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&server)
            .await;
        Mock::given(method("PURGE"))
            .and(header(PURGE_TYPE, "book"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let purger = HttpPurger::new(server.uri()).unwrap();
        let report = purger.purge(&changed()).await.unwrap();
        assert_eq!(report, PurgeReport { sent: 3, failed: 3 });
    }

    #[tokio::test]
    async fn test_empty_set_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("PURGE")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;
        let purger = HttpPurger::new(server.uri()).unwrap();
        let report = purger.purge(&InvalidationSet::default()).await.unwrap();
        assert_eq!(report, PurgeReport::default());
    }

    #[tokio::test]
    async fn test_unreachable_cache() {
        // Nothing listens on the discard port.
        let purger = HttpPurger::new("http://127.0.0.1:9/").unwrap();
        let err = purger.purge(&changed()).await.unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::Unreachable(_)));
    }
}
