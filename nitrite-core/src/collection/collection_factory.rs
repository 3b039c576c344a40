use super::NitriteCollection;
use crate::errors::NitriteResult;
use crate::nitrite_config::NitriteConfig;
use dashmap::DashMap;
use std::sync::Arc;

/// Opens collections on demand and hands out one shared handle per name.
#[derive(Clone)]
pub(crate) struct CollectionFactory {
    inner: Arc<CollectionFactoryInner>,
}

struct CollectionFactoryInner {
    nitrite_config: NitriteConfig,
    collections: DashMap<String, NitriteCollection>,
}

impl CollectionFactory {
    pub fn new(nitrite_config: NitriteConfig) -> Self {
        CollectionFactory {
            inner: Arc::new(CollectionFactoryInner {
                nitrite_config,
                collections: DashMap::new(),
            }),
        }
    }

    /// The open handle for `name`, opening the collection when there is none
    /// or when the cached one was closed or dropped.
    pub fn get_collection(&self, name: &str) -> NitriteResult<NitriteCollection> {
        let lock = self.inner.nitrite_config.lock_service().get_lock(name);
        let _guard = lock.write();

        if let Some(collection) = self.inner.collections.get(name) {
            if collection.is_open() {
                return Ok(collection.clone());
            }
        }

        let collection = NitriteCollection::open(name, &self.inner.nitrite_config)?;
        self.inner
            .collections
            .insert(name.to_string(), collection.clone());
        Ok(collection)
    }

    /// Drops the collection and its indexes, opening it first if needed.
    /// A collection that does not exist is left alone.
    pub fn destroy_collection(&self, name: &str) -> NitriteResult<()> {
        let lock = self.inner.nitrite_config.lock_service().get_lock(name);
        let _guard = lock.write();

        let cached = self
            .inner
            .collections
            .remove(name)
            .map(|(_, collection)| collection)
            .filter(|collection| collection.is_open());

        let collection = match cached {
            Some(collection) => collection,
            None => {
                let store = self.inner.nitrite_config.nitrite_store()?;
                if !store.has_map(name)? {
                    log::debug!("Collection {} does not exist, nothing to destroy", name);
                    return Ok(());
                }
                NitriteCollection::open(name, &self.inner.nitrite_config)?
            }
        };
        collection.dispose()
    }

    /// Closes every cached collection. Failures are logged and skipped.
    pub fn close_all(&self) {
        for entry in self.inner.collections.iter() {
            if let Err(e) = entry.value().close() {
                log::error!("Failed to close collection {}: {}", entry.key(), e);
            }
        }
        self.inner.collections.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    fn factory() -> (CollectionFactory, NitriteConfig) {
        let config = NitriteConfig::new();
        config.set_event_workers(1).unwrap();
        config.initialize().unwrap();
        (CollectionFactory::new(config.clone()), config)
    }

    #[test]
    fn test_same_handle_until_closed() {
        let (factory, config) = factory();
        let first = factory.get_collection("users").unwrap();
        first.insert(doc! { name: "a" }).unwrap();
        let second = factory.get_collection("users").unwrap();
        assert_eq!(second.size().unwrap(), 1);

        first.close().unwrap();
        assert!(!second.is_open());
        let reopened = factory.get_collection("users").unwrap();
        assert!(reopened.is_open());
        assert_eq!(reopened.size().unwrap(), 1);
        config.shutdown();
    }

    #[test]
    fn test_destroy_collection() {
        let (factory, config) = factory();
        let users = factory.get_collection("users").unwrap();
        users.insert(doc! { name: "a" }).unwrap();

        factory.destroy_collection("users").unwrap();
        assert!(users.is_dropped());
        assert!(!config.nitrite_store().unwrap().has_map("users").unwrap());

        // destroying something that never existed is a no-op
        factory.destroy_collection("ghost").unwrap();
        config.shutdown();
    }

    #[test]
    fn test_close_all() {
        let (factory, config) = factory();
        let users = factory.get_collection("users").unwrap();
        let orders = factory.get_collection("orders").unwrap();
        factory.close_all();
        assert!(!users.is_open());
        assert!(!orders.is_open());
        config.shutdown();
    }
}
