use std::time::Duration;

use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;
use reqwest::Client;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Error)]
pub enum StylesheetError {
    #[error("failed to fetch stylesheet {url}: {reason}")]
    Fetch { url: Url, reason: String },
    #[error("stylesheet {url} did not load within {after:?}")]
    Timeout { url: Url, after: Duration },
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Completes once the stylesheet at `url` has loaded.
pub trait StylesheetLoader {
    fn load(&self, url: Url) -> LocalBoxFuture<'static, Result<(), StylesheetError>>;
}

/// Treats a successful HTTP fetch of the stylesheet as its load event.
#[derive(Clone)]
pub struct HttpStylesheetLoader {
    client: Client,
}

impl HttpStylesheetLoader {
    pub fn new() -> Result<Self, StylesheetError> {
        let client = Client::builder()
            .build()
            .map_err(|err| StylesheetError::Client(err.to_string()))?;
        Ok(Self { client })
    }
}

impl StylesheetLoader for HttpStylesheetLoader {
    fn load(&self, url: Url) -> LocalBoxFuture<'static, Result<(), StylesheetError>> {
        let client = self.client.clone();
        async move {
            tracing::debug!(target: "loader", url = %url, "fetching stylesheet");
            let fetch_error = |err: reqwest::Error| StylesheetError::Fetch {
                url: url.clone(),
                reason: err.to_string(),
            };
            let bytes = client
                .get(url.clone())
                .send()
                .await
                .and_then(|response| response.error_for_status())
                .map_err(fetch_error)?
                .bytes()
                .await
                .map_err(fetch_error)?;
            tracing::debug!(target: "loader", url = %url, bytes = bytes.len(), "stylesheet loaded");
            Ok(())
        }
        .boxed_local()
    }
}
