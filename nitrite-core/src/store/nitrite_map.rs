use crate::common::{AttributeAware, Key, Value};
use crate::errors::NitriteResult;
use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use std::sync::Arc;

const ITERATOR_BATCH_SIZE: usize = 256;

/// Contract of an ordered key-value map supplied by a store backend.
///
/// Keys are ordered by [Value]'s total order. The only range primitive a
/// backend has to provide is [entries_after](NitriteMapProvider::entries_after);
/// iteration is built on top of it.
pub trait NitriteMapProvider: AttributeAware + Send + Sync {
    fn name(&self) -> String;

    fn contains_key(&self, key: &Key) -> NitriteResult<bool>;

    fn get(&self, key: &Key) -> NitriteResult<Option<Value>>;

    fn put(&self, key: Key, value: Value) -> NitriteResult<()>;

    /// Removes the key, returning the previous value if there was one.
    fn remove(&self, key: &Key) -> NitriteResult<Option<Value>>;

    /// Stores the value only if the key is absent; returns the existing value otherwise.
    fn put_if_absent(&self, key: Key, value: Value) -> NitriteResult<Option<Value>>;

    fn size(&self) -> NitriteResult<u64>;

    fn clear(&self) -> NitriteResult<()>;

    /// Up to `limit` entries in key order, strictly after `key` (from the
    /// start when `key` is `None`).
    fn entries_after(&self, key: Option<&Key>, limit: usize) -> NitriteResult<Vec<(Key, Value)>>;

    /// Releases this handle. Persisted content stays.
    fn close(&self) -> NitriteResult<()>;

    fn is_closed(&self) -> NitriteResult<bool>;

    /// Deletes the map and its content from the store.
    fn dispose(&self) -> NitriteResult<()>;

    fn is_dropped(&self) -> NitriteResult<bool>;

    fn is_empty(&self) -> NitriteResult<bool> {
        Ok(self.size()? == 0)
    }

    fn first_key(&self) -> NitriteResult<Option<Key>> {
        Ok(self.entries_after(None, 1)?.into_iter().next().map(|(k, _)| k))
    }
}

/// Shared handle to a backend map.
#[derive(Clone)]
pub struct NitriteMap {
    inner: Arc<dyn NitriteMapProvider>,
}

impl NitriteMap {
    pub fn new<T: NitriteMapProvider + 'static>(inner: T) -> Self {
        NitriteMap {
            inner: Arc::new(inner),
        }
    }

    /// Lazily walks all entries in key order, fetching them in batches.
    pub fn entries(&self) -> EntryIterator {
        EntryIterator::new(self.clone())
    }
}

impl Debug for NitriteMap {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NitriteMap").field("name", &self.inner.name()).finish()
    }
}

impl Deref for NitriteMap {
    type Target = Arc<dyn NitriteMapProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Batched cursor over a [NitriteMap].
///
/// Entries written behind the cursor are not seen; entries written ahead of
/// it are.
pub struct EntryIterator {
    map: NitriteMap,
    buffer: std::vec::IntoIter<(Key, Value)>,
    last_key: Option<Key>,
    exhausted: bool,
}

impl EntryIterator {
    fn new(map: NitriteMap) -> Self {
        EntryIterator {
            map,
            buffer: Vec::new().into_iter(),
            last_key: None,
            exhausted: false,
        }
    }
}

impl Iterator for EntryIterator {
    type Item = NitriteResult<(Key, Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(entry) = self.buffer.next() {
            self.last_key = Some(entry.0.clone());
            return Some(Ok(entry));
        }

        if self.exhausted {
            return None;
        }

        match self
            .map
            .entries_after(self.last_key.as_ref(), ITERATOR_BATCH_SIZE)
        {
            Ok(batch) => {
                if batch.len() < ITERATOR_BATCH_SIZE {
                    self.exhausted = true;
                }
                self.buffer = batch.into_iter();
                let entry = self.buffer.next()?;
                self.last_key = Some(entry.0.clone());
                Some(Ok(entry))
            }
            Err(e) => {
                self.exhausted = true;
                Some(Err(e))
            }
        }
    }
}
