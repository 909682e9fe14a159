//! Page settings lookup backed by the language-aware request cache.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::application::language::LanguageProvider;
use crate::cache::{CacheClient, DEFAULT_LANGUAGE, FetchError, KeySegment, language_aware_key};

const SOURCE: &str = "application::page_settings";

/// The external page-settings API, narrowed to what this service needs.
#[async_trait]
pub trait SettingsFetcher: Send + Sync {
    async fn fetch(&self, page: &str, language: &str) -> Result<Value, FetchError>;
}

/// Per-page settings resolved through the shared cache client, keyed by page
/// and active language.
#[derive(Clone)]
pub struct PageSettingsService {
    fetcher: Arc<dyn SettingsFetcher>,
    cache: Arc<CacheClient>,
    language: Arc<dyn LanguageProvider>,
}

impl PageSettingsService {
    pub fn new(
        fetcher: Arc<dyn SettingsFetcher>,
        cache: Arc<CacheClient>,
        language: Arc<dyn LanguageProvider>,
    ) -> Self {
        Self {
            fetcher,
            cache,
            language,
        }
    }

    /// Load settings for a page.
    ///
    /// Returns `None` both when the page has no settings and when the fetch
    /// fails; failures are logged, never surfaced to the page consumer.
    pub async fn load(&self, page: &str) -> Option<Value> {
        let base = [KeySegment::from("page_settings"), KeySegment::from(page)];
        let key = language_aware_key(&base, self.language.as_ref());
        let language = key.language().unwrap_or(DEFAULT_LANGUAGE).to_string();

        let fetch = || self.fetcher.fetch(page, &language);
        match self.cache.get_or_fetch(key, fetch).await {
            Ok(Value::Null) => None,
            Ok(value) => Some(value),
            Err(err) => {
                warn!(
                    target_module = SOURCE,
                    page,
                    language = %language,
                    error = %err,
                    "page settings fetch failed, serving no content"
                );
                None
            }
        }
    }
}
