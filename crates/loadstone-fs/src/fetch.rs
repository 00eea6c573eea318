//! HTTP fetcher for URL-typed modules.

use futures::future::LocalBoxFuture;
use tracing::debug;

use loadstone_core::error::Error;
use loadstone_core::UrlFetcher;

/// Fetcher backed by a shared [`reqwest::Client`].
///
/// Non-success statuses are reported as errors rather than passing an error
/// page to the module evaluator. Responses are never retried here; callers
/// decide whether a failed fetch is fatal.
#[derive(Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl UrlFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> LocalBoxFuture<'_, Result<String, Error>> {
        let client = self.client.clone();
        let url = url.to_string();
        Box::pin(async move {
            debug!(%url, "fetching module");
            let response = client.get(&url).send().await.map_err(|e| Error::Fetch {
                url: url.clone(),
                source: Box::new(e),
            })?;

            let status = response.status();
            if !status.is_success() {
                return Err(Error::FetchStatus {
                    url,
                    status: status.as_u16(),
                });
            }

            response.text().await.map_err(|e| Error::Fetch {
                url,
                source: Box::new(e),
            })
        })
    }
}
