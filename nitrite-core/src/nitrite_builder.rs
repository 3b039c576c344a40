use crate::errors::{NitriteError, NitriteResult};
use crate::index::text::Tokenizer;
use crate::nitrite::Nitrite;
use crate::nitrite_config::NitriteConfig;
use crate::store::NitriteStore;

/// Builder for creating and configuring a Nitrite database instance.
///
/// Configuration errors are captured as they happen and returned from
/// [open_or_create](NitriteBuilder::open_or_create), so the chain never has
/// to be broken up to check each step.
///
/// # Examples
///
/// ```rust,ignore
/// let db = Nitrite::builder()
///     .field_separator(":")
///     .event_workers(2)
///     .backfill_batch_size(256)
///     .open_or_create()?;
/// ```
#[derive(Default)]
pub struct NitriteBuilder {
    error: Option<NitriteError>,
    nitrite_config: NitriteConfig,
}

impl NitriteBuilder {
    /// A builder with the in-memory store, `"."` as separator and one event
    /// worker per CPU.
    pub fn new() -> Self {
        NitriteBuilder {
            error: None,
            nitrite_config: NitriteConfig::new(),
        }
    }

    /// Sets the separator used in nested field paths. Must not be empty.
    pub fn field_separator(self, field_separator: &str) -> Self {
        self.configure(|config| config.set_field_separator(field_separator))
    }

    /// Number of threads delivering change events. Must be at least 1.
    pub fn event_workers(self, workers: usize) -> Self {
        self.configure(|config| config.set_event_workers(workers))
    }

    /// Documents read per batch while an index is backfilled.
    pub fn backfill_batch_size(self, batch_size: usize) -> Self {
        self.configure(|config| config.set_backfill_batch_size(batch_size))
    }

    pub fn store(self, store: NitriteStore) -> Self {
        self.configure(|config| config.set_store(store))
    }

    /// Tokenizer for full-text indexes.
    pub fn tokenizer(self, tokenizer: Tokenizer) -> Self {
        self.configure(|config| config.set_tokenizer(tokenizer))
    }

    /// Opens the store and returns the database handle.
    ///
    /// # Errors
    ///
    /// The first configuration error, if any, or the failure to open the store.
    pub fn open_or_create(self) -> NitriteResult<Nitrite> {
        if let Some(error) = self.error {
            return Err(error);
        }
        Nitrite::open(self.nitrite_config)
    }

    fn configure(mut self, step: impl FnOnce(&NitriteConfig) -> NitriteResult<()>) -> Self {
        if self.error.is_none() {
            if let Err(e) = step(&self.nitrite_config) {
                self.error = Some(e);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::store::memory::InMemoryStore;

    #[test]
    fn test_open_with_defaults() {
        let db = NitriteBuilder::new().event_workers(1).open_or_create().unwrap();
        assert!(!db.is_closed().unwrap());
        assert_eq!(db.config().event_workers(), 1);
        db.close().unwrap();
    }

    #[test]
    fn test_first_error_is_returned() {
        let result = NitriteBuilder::new()
            .event_workers(0)
            .backfill_batch_size(0)
            .open_or_create();
        let err = result.err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
        assert!(err.message().contains("Event worker"));
    }

    #[test]
    fn test_custom_store_and_batch_size() {
        let store = NitriteStore::new(InMemoryStore::new());
        let db = NitriteBuilder::new()
            .event_workers(1)
            .backfill_batch_size(8)
            .store(store.clone())
            .open_or_create()
            .unwrap();
        assert_eq!(db.config().backfill_batch_size(), 8);
        assert!(!store.is_closed().unwrap());
        db.close().unwrap();
        assert!(store.is_closed().unwrap());
    }
}
