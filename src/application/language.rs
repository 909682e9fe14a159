//! Language resolution from shared translation state.
//!
//! The translation store mirrors client-side application state: it may not be
//! initialized when a read happens, and readers must never fail because of it.
//! `StoreLanguageProvider` is the defensive adapter that turns every flavor of
//! unavailability into an explicit `LanguageError`, so key derivation itself
//! stays total.

use std::sync::{Arc, RwLock};

use thiserror::Error;

/// Currently selected language inside the translation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentLanguage {
    pub lang_code: String,
}

/// Snapshot of the shared translation state.
#[derive(Debug, Clone, Default)]
pub struct TranslationState {
    pub current_language: Option<CurrentLanguage>,
}

/// Process-wide mutable store for translation state.
///
/// `None` means the store exists but has not been initialized yet.
#[derive(Debug, Default)]
pub struct LanguageStore {
    state: RwLock<Option<TranslationState>>,
}

impl LanguageStore {
    pub fn set_language(&self, code: impl Into<String>) {
        let mut guard = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(TranslationState {
            current_language: Some(CurrentLanguage {
                lang_code: code.into(),
            }),
        });
    }

    /// Snapshot read. A poisoned lock is reported as a failed read rather
    /// than recovered, so callers can decide how to degrade.
    pub fn get_state(&self) -> Result<Option<TranslationState>, LanguageError> {
        self.state
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| LanguageError::ReadFailed)
    }

    #[cfg(test)]
    pub(crate) fn poison(&self) {
        let state = &self.state;
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = state.write().expect("fresh lock");
            panic!("poison for test");
        }));
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LanguageError {
    #[error("language store is not available")]
    StoreMissing,
    #[error("language store is not initialized")]
    Uninitialized,
    #[error("no language is currently selected")]
    NoSelection,
    #[error("language store read failed")]
    ReadFailed,
}

/// Narrow read-only capability for resolving the active language code.
pub trait LanguageProvider: Send + Sync {
    fn current(&self) -> Result<String, LanguageError>;
}

/// Defensive adapter over the shared [`LanguageStore`].
///
/// Holds an optional store handle so "no store wired at all" is expressible,
/// which matters for detached evaluation contexts.
#[derive(Clone, Default)]
pub struct StoreLanguageProvider {
    store: Option<Arc<LanguageStore>>,
}

impl StoreLanguageProvider {
    pub fn new(store: Arc<LanguageStore>) -> Self {
        Self { store: Some(store) }
    }

    /// A provider with no backing store; every read fails with `StoreMissing`.
    pub fn detached() -> Self {
        Self { store: None }
    }
}

impl LanguageProvider for StoreLanguageProvider {
    fn current(&self) -> Result<String, LanguageError> {
        let store = self.store.as_ref().ok_or(LanguageError::StoreMissing)?;
        let state = store.get_state()?.ok_or(LanguageError::Uninitialized)?;
        state
            .current_language
            .map(|language| language.lang_code)
            .ok_or(LanguageError::NoSelection)
    }
}
