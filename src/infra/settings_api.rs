//! HTTP client for the external page-settings API.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use url::Url;

use crate::application::page_settings::SettingsFetcher;
use crate::cache::FetchError;

/// Fetches per-page settings from the configured settings endpoint.
pub struct HttpSettingsFetcher {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpSettingsFetcher {
    pub fn new(endpoint: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl SettingsFetcher for HttpSettingsFetcher {
    async fn fetch(&self, page: &str, language: &str) -> Result<Value, FetchError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("page", page)
            .append_pair("lang", language);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| FetchError::Upstream(err.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Value::Null);
        }

        response
            .error_for_status()
            .map_err(|err| FetchError::Upstream(err.to_string()))?
            .json::<Value>()
            .await
            .map_err(|err| FetchError::Upstream(err.to_string()))
    }
}

/// Stand-in fetcher used when no settings endpoint is configured; every page
/// resolves to "no content".
pub struct UnconfiguredSettingsFetcher;

#[async_trait]
impl SettingsFetcher for UnconfiguredSettingsFetcher {
    async fn fetch(&self, _page: &str, _language: &str) -> Result<Value, FetchError> {
        Ok(Value::Null)
    }
}
