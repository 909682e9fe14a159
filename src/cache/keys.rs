//! Language-aware cache key derivation.
//!
//! Every cached page-settings entry is keyed by its logical resource plus the
//! active language, so switching languages can never serve a stale translation
//! and two requests differing only in code case collide to the same entry.

use tracing::warn;

use crate::application::language::LanguageProvider;

/// Language code used whenever the active language cannot be resolved.
pub const DEFAULT_LANGUAGE: &str = "en";

const SOURCE: &str = "cache::keys";

/// One segment of a composite cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeySegment {
    Text(String),
    Number(i64),
    /// Trailing descriptor carrying the normalized (lower-case) language code.
    Lang(String),
}

impl From<&str> for KeySegment {
    fn from(value: &str) -> Self {
        KeySegment::Text(value.to_string())
    }
}

impl From<String> for KeySegment {
    fn from(value: String) -> Self {
        KeySegment::Text(value)
    }
}

impl From<i64> for KeySegment {
    fn from(value: i64) -> Self {
        KeySegment::Number(value)
    }
}

/// Composite cache key: base segments plus one trailing language descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(Vec<KeySegment>);

impl CacheKey {
    pub fn segments(&self) -> &[KeySegment] {
        &self.0
    }

    /// The normalized language code carried by the trailing descriptor.
    pub fn language(&self) -> Option<&str> {
        match self.0.last() {
            Some(KeySegment::Lang(code)) => Some(code),
            _ => None,
        }
    }
}

/// Total derivation over an already-resolved language code.
///
/// Appends exactly one `Lang` descriptor; the code is lower-cased so that
/// `"EN"` and `"en"` produce identical keys.
pub fn compose_key(base: &[KeySegment], language: &str) -> CacheKey {
    let mut segments = Vec::with_capacity(base.len() + 1);
    segments.extend_from_slice(base);
    segments.push(KeySegment::Lang(language.to_ascii_lowercase()));
    CacheKey(segments)
}

/// Derive a language-aware key from the current shared state.
///
/// Resolution failures of any kind degrade to [`DEFAULT_LANGUAGE`] with a
/// warning; this function never fails.
pub fn language_aware_key(base: &[KeySegment], provider: &dyn LanguageProvider) -> CacheKey {
    let language = match provider.current() {
        Ok(code) => code,
        Err(err) => {
            warn!(
                target_module = SOURCE,
                error = %err,
                fallback = DEFAULT_LANGUAGE,
                "language unavailable for cache key, using default"
            );
            DEFAULT_LANGUAGE.to_string()
        }
    };
    compose_key(base, &language)
}
