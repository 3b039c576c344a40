use crate::common::{get_current_time_or_zero, to_basu_error, NitriteEventBus};
use crate::errors::NitriteResult;
use basu::error::BasuError;
use basu::event::Event;
use basu::Handle;
use std::fmt::Debug;
use std::sync::Arc;

/// Lifecycle transitions reported by a store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvents {
    Opened,
    Commit,
    Closing,
    Closed,
}

#[derive(Clone)]
pub struct StoreEventInfo {
    event: StoreEvents,
    store_version: String,
    timestamp: u128,
}

impl StoreEventInfo {
    pub fn new(event: StoreEvents, store_version: &str) -> Self {
        StoreEventInfo {
            event,
            store_version: store_version.to_string(),
            timestamp: get_current_time_or_zero(),
        }
    }

    pub fn event(&self) -> StoreEvents {
        self.event
    }

    pub fn store_version(&self) -> &str {
        &self.store_version
    }

    pub fn timestamp(&self) -> u128 {
        self.timestamp
    }
}

impl Debug for StoreEventInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreEventInfo")
            .field("event", &self.event)
            .field("store_version", &self.store_version)
            .finish()
    }
}

pub trait StoreEventCallback: Send + Sync + Fn(StoreEventInfo) -> NitriteResult<()> {}

impl<F> StoreEventCallback for F where F: Send + Sync + Fn(StoreEventInfo) -> NitriteResult<()> {}

#[derive(Clone)]
pub struct StoreEventListener {
    on_event: Arc<dyn StoreEventCallback>,
}

impl StoreEventListener {
    pub fn new(on_event: impl StoreEventCallback + 'static) -> Self {
        StoreEventListener {
            on_event: Arc::new(on_event),
        }
    }
}

impl Handle<StoreEventInfo> for StoreEventListener {
    fn handle(&self, event: &Event<StoreEventInfo>) -> Result<(), BasuError> {
        (self.on_event)(event.data.clone()).map_err(to_basu_error)
    }
}

pub type StoreEventBus = NitriteEventBus<StoreEventInfo, StoreEventListener>;
