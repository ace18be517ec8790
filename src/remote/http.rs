use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::{QuoteError, Result};
use crate::quotes::Quote;
use crate::remote::{RemoteItem, RemoteSource};

#[derive(Serialize)]
struct PublishRequest<'a> {
    title: &'a str,
    body: &'a str,
    #[serde(rename = "userId")]
    user_id: u32,
}

/// JSON-over-HTTP remote source (JSONPlaceholder-style `/posts` collection).
#[derive(Clone)]
pub struct HttpRemoteSource {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpRemoteSource {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        crate::ensure_tls_provider();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl RemoteSource for HttpRemoteSource {
    async fn fetch(&self, limit: usize) -> Result<Vec<RemoteItem>> {
        let response = self
            .client
            .get(format!("{}?_limit={}", self.base_url, limit))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| QuoteError::Remote(format!("Server unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(QuoteError::Remote(format!(
                "Server returned {}: {}",
                status, body
            )));
        }

        let mut items: Vec<RemoteItem> = response
            .json()
            .await
            .map_err(|e| QuoteError::Remote(format!("Failed to parse server response: {}", e)))?;

        // The source may ignore the limit parameter.
        items.truncate(limit);
        Ok(items)
    }

    async fn publish(&self, quote: &Quote) -> Result<()> {
        let request = PublishRequest {
            title: &quote.text,
            body: &quote.category,
            user_id: 1,
        };

        let response = self
            .client
            .post(&self.base_url)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(QuoteError::Remote(format!("Server returned {}", status)));
        }

        let echo: serde_json::Value = response.json().await.unwrap_or_default();
        tracing::debug!("Server acknowledged quote: {}", echo);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let source = HttpRemoteSource::new("https://example.com/posts/", Duration::from_secs(1));
        assert_eq!(source.base_url(), "https://example.com/posts");
    }

    #[test]
    fn test_publish_request_shape() {
        let request = PublishRequest {
            title: "A",
            body: "X",
            user_id: 1,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"title":"A","body":"X","userId":1}"#);
    }

    #[test]
    fn test_remote_item_ignores_extra_fields() {
        let payload = r#"[{"userId":1,"id":7,"title":"qui est esse","body":"..."}]"#;
        let items: Vec<RemoteItem> = serde_json::from_str(payload).unwrap();
        assert_eq!(
            items,
            vec![RemoteItem {
                id: 7,
                title: "qui est esse".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_fetch_unreachable_server_is_remote_error() {
        let source = HttpRemoteSource::new("http://127.0.0.1:9/posts", Duration::from_millis(500));
        let err = source.fetch(5).await.unwrap_err();
        assert!(matches!(err, QuoteError::Remote(_)));
    }
}
