use crate::common::{
    get_current_time_or_zero, to_basu_error, NitriteEventBus, Value,
};
use crate::errors::NitriteResult;
use basu::error::BasuError;
use basu::event::Event;
use basu::Handle;
use std::fmt::Debug;
use std::sync::Arc;

/// Kinds of change a collection reports to its listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionEvents {
    Insert,
    Update,
    Remove,
    IndexStart,
    IndexEnd,
}

/// One change notification.
///
/// `item` is the affected document for write events and the indexed field
/// list for index events. The timestamp is taken when the event is created,
/// which is after the write it describes has been applied.
#[derive(Clone)]
pub struct CollectionEventInfo {
    inner: Arc<CollectionEventInner>,
}

struct CollectionEventInner {
    item: Option<Value>,
    event_type: CollectionEvents,
    timestamp: u128,
    originator: String,
}

impl CollectionEventInfo {
    pub fn new(item: Option<Value>, event_type: CollectionEvents, originator: &str) -> Self {
        CollectionEventInfo {
            inner: Arc::new(CollectionEventInner {
                item,
                event_type,
                timestamp: get_current_time_or_zero(),
                originator: originator.to_string(),
            }),
        }
    }

    pub fn event_type(&self) -> CollectionEvents {
        self.inner.event_type
    }

    pub fn item(&self) -> Option<Value> {
        self.inner.item.clone()
    }

    pub fn originator(&self) -> &str {
        &self.inner.originator
    }

    pub fn timestamp(&self) -> u128 {
        self.inner.timestamp
    }
}

impl Debug for CollectionEventInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionEventInfo")
            .field("event_type", &self.inner.event_type)
            .field("item", &self.inner.item)
            .field("originator", &self.inner.originator)
            .field("timestamp", &self.inner.timestamp)
            .finish()
    }
}

/// Closure signature accepted by [CollectionEventListener].
pub trait CollectionEventCallback:
    Send + Sync + Fn(CollectionEventInfo) -> NitriteResult<()>
{
}

impl<F> CollectionEventCallback for F where
    F: Send + Sync + Fn(CollectionEventInfo) -> NitriteResult<()>
{
}

/// Listener registered on a collection with `subscribe`.
///
/// ```
/// use nitrite_core::collection::{CollectionEventListener, CollectionEvents};
///
/// let listener = CollectionEventListener::new(|event| {
///     if event.event_type() == CollectionEvents::Insert {
///         println!("inserted {:?}", event.item());
///     }
///     Ok(())
/// });
/// # let _ = listener;
/// ```
#[derive(Clone)]
pub struct CollectionEventListener {
    on_event: Arc<dyn CollectionEventCallback>,
}

impl CollectionEventListener {
    pub fn new(on_event: impl CollectionEventCallback + 'static) -> Self {
        CollectionEventListener {
            on_event: Arc::new(on_event),
        }
    }
}

impl Handle<CollectionEventInfo> for CollectionEventListener {
    fn handle(&self, event: &Event<CollectionEventInfo>) -> Result<(), BasuError> {
        (self.on_event)(event.data.clone()).map_err(to_basu_error)
    }
}

impl Debug for CollectionEventListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionEventListener").finish()
    }
}

pub type CollectionEventBus = NitriteEventBus<CollectionEventInfo, CollectionEventListener>;
