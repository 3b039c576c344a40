use crate::collection::Document;
use crate::errors::NitriteResult;
use parking_lot::RwLock;
use std::sync::Arc;

/// A hook that transforms documents on their way into and out of the store.
pub trait ProcessorProvider: Send + Sync {
    fn name(&self) -> String;

    fn process_before_write(&self, doc: Document) -> NitriteResult<Document>;

    fn process_after_read(&self, doc: Document) -> NitriteResult<Document>;
}

#[derive(Clone)]
pub struct Processor {
    inner: Arc<dyn ProcessorProvider>,
}

impl Processor {
    pub fn new<T: ProcessorProvider + 'static>(inner: T) -> Self {
        Processor {
            inner: Arc::new(inner),
        }
    }

    pub fn name(&self) -> String {
        self.inner.name()
    }

    pub fn process_before_write(&self, doc: Document) -> NitriteResult<Document> {
        self.inner.process_before_write(doc)
    }

    pub fn process_after_read(&self, doc: Document) -> NitriteResult<Document> {
        self.inner.process_after_read(doc)
    }
}

/// Ordered list of processors.
///
/// Writes run processors in registration order; reads run them in reverse so
/// that the last transformation applied is the first one undone.
#[derive(Clone, Default)]
pub struct ProcessorChain {
    processors: Arc<RwLock<Vec<Processor>>>,
}

impl ProcessorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a processor; one with the same name is replaced in place.
    pub fn add_processor(&self, processor: Processor) {
        let mut processors = self.processors.write();
        let name = processor.name();
        match processors.iter().position(|p| p.name() == name) {
            Some(index) => processors[index] = processor,
            None => processors.push(processor),
        }
    }

    pub fn remove_processor(&self, name: &str) {
        self.processors.write().retain(|p| p.name() != name);
    }

    pub fn is_empty(&self) -> bool {
        self.processors.read().is_empty()
    }

    pub fn process_before_write(&self, doc: Document) -> NitriteResult<Document> {
        let processors = self.processors.read();
        let mut doc = doc;
        for processor in processors.iter() {
            doc = processor.process_before_write(doc)?;
        }
        Ok(doc)
    }

    pub fn process_after_read(&self, doc: Document) -> NitriteResult<Document> {
        let processors = self.processors.read();
        let mut doc = doc;
        for processor in processors.iter().rev() {
            doc = processor.process_after_read(doc)?;
        }
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    struct Suffix(&'static str);

    impl ProcessorProvider for Suffix {
        fn name(&self) -> String {
            self.0.to_string()
        }

        fn process_before_write(&self, mut doc: Document) -> NitriteResult<Document> {
            let value = doc.get("name")?;
            let current = value.as_string().cloned().unwrap_or_default();
            doc.put("name", format!("{}{}", current, self.0))?;
            Ok(doc)
        }

        fn process_after_read(&self, mut doc: Document) -> NitriteResult<Document> {
            let value = doc.get("name")?;
            let current = value.as_string().cloned().unwrap_or_default();
            let restored = current.strip_suffix(self.0).unwrap_or(&current).to_string();
            doc.put("name", restored)?;
            Ok(doc)
        }
    }

    #[test]
    fn test_chain_order() {
        let chain = ProcessorChain::new();
        chain.add_processor(Processor::new(Suffix("-a")));
        chain.add_processor(Processor::new(Suffix("-b")));

        let written = chain.process_before_write(doc! {"name": "x"}).unwrap();
        assert_eq!(written.get("name").unwrap(), "x-a-b".into());

        let read = chain.process_after_read(written).unwrap();
        assert_eq!(read.get("name").unwrap(), "x".into());
    }

    #[test]
    fn test_replace_and_remove() {
        let chain = ProcessorChain::new();
        chain.add_processor(Processor::new(Suffix("-a")));
        chain.add_processor(Processor::new(Suffix("-a")));
        let written = chain.process_before_write(doc! {"name": "x"}).unwrap();
        assert_eq!(written.get("name").unwrap(), "x-a".into());

        chain.remove_processor("-a");
        assert!(chain.is_empty());
    }
}
