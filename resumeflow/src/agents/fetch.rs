//! Job posting retrieval.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ProviderError;

/// A fetched web page reduced to readable text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Page title, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Visible text content.
    pub text: String,
}

/// Retrieves job postings by URL.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches `url` and returns its readable text.
    async fn fetch_text(&self, url: &str) -> Result<FetchedPage, ProviderError>;
}

#[cfg(feature = "fetch")]
pub use http::{html_to_text, HttpPageFetcher};

#[cfg(feature = "fetch")]
mod http {
    use async_trait::async_trait;
    use scraper::{ElementRef, Html, Selector};
    use std::time::Instant;

    use super::{FetchedPage, PageFetcher};
    use crate::agents::ProviderError;
    use crate::config::FetchConfig;

    const SKIPPED_ELEMENTS: [&str; 7] = [
        "script", "style", "nav", "footer", "noscript", "svg", "head",
    ];

    /// Extracts the title and visible text of an HTML document.
    ///
    /// Scripts, styles, navigation and footers are dropped, whitespace is
    /// collapsed and the text is cut at `max_chars` characters.
    #[must_use]
    pub fn html_to_text(html: &str, max_chars: usize) -> (Option<String>, String) {
        let document = Html::parse_document(html);

        let title = Selector::parse("title").ok().and_then(|selector| {
            document
                .select(&selector)
                .next()
                .map(|t| collapse_whitespace(&t.text().collect::<String>()))
                .filter(|t| !t.is_empty())
        });

        let mut raw = String::new();
        collect_text(document.root_element(), &mut raw);
        let text: String = collapse_whitespace(&raw).chars().take(max_chars).collect();
        (title, text)
    }

    fn collect_text(element: ElementRef<'_>, out: &mut String) {
        for child in element.children() {
            if let Some(text) = child.value().as_text() {
                out.push_str(text);
                out.push(' ');
            } else if let Some(child_element) = ElementRef::wrap(child) {
                if !SKIPPED_ELEMENTS.contains(&child_element.value().name()) {
                    collect_text(child_element, out);
                }
            }
        }
    }

    fn collapse_whitespace(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Fetches pages over HTTP with `reqwest`.
    #[derive(Debug, Clone)]
    pub struct HttpPageFetcher {
        client: reqwest::Client,
        config: FetchConfig,
    }

    impl HttpPageFetcher {
        /// Builds a fetcher from configuration.
        pub fn new(config: FetchConfig) -> Result<Self, ProviderError> {
            let client = reqwest::Client::builder()
                .timeout(config.timeout())
                .user_agent(config.user_agent.clone())
                .build()
                .map_err(|e| ProviderError::permanent(format!("failed to build HTTP client: {e}")))?;
            Ok(Self { client, config })
        }
    }

    fn classify(err: &reqwest::Error) -> ProviderError {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            ProviderError::transient(err.to_string())
        } else {
            ProviderError::permanent(err.to_string())
        }
    }

    #[async_trait]
    impl PageFetcher for HttpPageFetcher {
        async fn fetch_text(&self, url: &str) -> Result<FetchedPage, ProviderError> {
            let started = Instant::now();
            let mut response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| classify(&e))?;

            let status = response.status();
            let final_url = response.url().to_string();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ProviderError::from_status(
                    status.as_u16(),
                    body.chars().take(200).collect::<String>(),
                ));
            }

            let limit = self.config.max_response_bytes;
            let too_large =
                || ProviderError::permanent(format!("response from {final_url} exceeds {limit} bytes"));
            if response
                .content_length()
                .is_some_and(|len| len > u64::try_from(limit).unwrap_or(u64::MAX))
            {
                return Err(too_large());
            }

            // Content-Length is optional; chunked bodies are capped while reading.
            let mut bytes = Vec::new();
            while let Some(chunk) = response.chunk().await.map_err(|e| classify(&e))? {
                if bytes.len() + chunk.len() > limit {
                    return Err(too_large());
                }
                bytes.extend_from_slice(&chunk);
            }

            let html = String::from_utf8_lossy(&bytes);
            let (title, text) = html_to_text(&html, self.config.max_chars);
            tracing::debug!(
                url = %final_url,
                status = status.as_u16(),
                chars = text.len(),
                duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                "Fetched job posting"
            );

            Ok(FetchedPage {
                url: final_url,
                status: status.as_u16(),
                title,
                text,
            })
        }
    }

}
