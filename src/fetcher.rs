use log::debug;
use reqwest::Response;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use scraper::Html;
use url::Url;

use crate::configuration::Settings;
use crate::error::{DocumentError, FetchError, ParseError};

/// Shared HTTP access for index pages, chapter pages and images.
///
/// Cloning is cheap; the underlying connection pool is shared.
#[derive(Clone)]
pub struct Fetcher {
    client: ClientWithMiddleware,
}

impl Fetcher {
    pub fn new(settings: &Settings) -> reqwest::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()?;

        // Transient failures (connect errors, 5xx, 429) back off exponentially
        let retry_policy =
            ExponentialBackoff::builder().build_with_max_retries(settings.max_retries);
        let client = ClientBuilder::new(http_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Fetcher { client })
    }

    /// GETs `url` and parses the body as HTML.
    ///
    /// The body is decoded with the charset from `Content-Type`, UTF-8 when
    /// none is given. Undecodable bytes become U+FFFD rather than failing the
    /// page. Only a blank body is rejected as unparseable.
    pub async fn fetch_document(&self, url: &Url) -> Result<Html, DocumentError> {
        let text = self
            .get(url)
            .await?
            .text()
            .await
            .map_err(|source| FetchError::Body {
                url: url.to_string(),
                source,
            })?;
        if text.trim().is_empty() {
            return Err(ParseError {
                url: url.to_string(),
                reason: "empty body".into(),
            }
            .into());
        }

        Ok(Html::parse_document(&text))
    }

    /// GETs `url` and returns the raw body.
    pub async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        // Reading to the end releases the connection back to the pool
        let bytes = self
            .get(url)
            .await?
            .bytes()
            .await
            .map_err(|source| FetchError::Body {
                url: url.to_string(),
                source,
            })?;
        debug!("{} bytes from {}", bytes.len(), url);

        Ok(bytes.to_vec())
    }

    /// Sends the request and checks for a success status.
    async fn get(&self, url: &Url) -> Result<Response, FetchError> {
        debug!("GET {}", url);
        let res = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }
        Ok(res)
    }
}
