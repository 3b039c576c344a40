use crate::common::TaskExecutor;
use crate::errors::{ErrorKind, NitriteError, NitriteResult};
use basu::error::BasuError;
use basu::event::Event;
use basu::Handle;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Identifies one registration on an event bus. Pass it back to `deregister`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberRef {
    id: u64,
}

impl SubscriberRef {
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Asynchronous publish/subscribe channel.
///
/// `publish` only enqueues: every listener has its own mailbox and at most one
/// executor task drains it at a time, so a single listener sees events in
/// publish order while different listeners run independently. A listener
/// that returns an error or panics is logged and skipped; the publisher and
/// the other listeners are unaffected.
///
/// After `close` every subscription is gone and `publish` is a no-op.
pub struct NitriteEventBus<E, L> {
    inner: Arc<EventBusInner<E, L>>,
}

impl<E, L> Clone for NitriteEventBus<E, L> {
    fn clone(&self) -> Self {
        NitriteEventBus {
            inner: self.inner.clone(),
        }
    }
}

struct EventBusInner<E, L> {
    executor: TaskExecutor,
    owns_executor: bool,
    mailboxes: DashMap<u64, Arc<Mailbox<E, L>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

struct Mailbox<E, L> {
    listener: L,
    state: Mutex<MailboxState<E>>,
    active: AtomicBool,
}

struct MailboxState<E> {
    pending: VecDeque<Arc<Event<E>>>,
    scheduled: bool,
}

impl<E, L> Mailbox<E, L>
where
    E: Send + Sync + 'static,
    L: Handle<E> + Send + Sync + 'static,
{
    fn new(listener: L) -> Self {
        Mailbox {
            listener,
            state: Mutex::new(MailboxState {
                pending: VecDeque::new(),
                scheduled: false,
            }),
            active: AtomicBool::new(true),
        }
    }

    /// Queues the event; returns `true` when the caller must schedule a drain.
    fn enqueue(&self, event: Arc<Event<E>>) -> bool {
        let mut state = self.state.lock();
        state.pending.push_back(event);
        if state.scheduled {
            false
        } else {
            state.scheduled = true;
            true
        }
    }

    fn drain(&self) {
        loop {
            let next = {
                let mut state = self.state.lock();
                match state.pending.pop_front() {
                    Some(event) => event,
                    None => {
                        state.scheduled = false;
                        return;
                    }
                }
            };

            if !self.active.load(Ordering::SeqCst) {
                continue;
            }
            self.deliver(&next);
        }
    }

    fn deliver(&self, event: &Event<E>) {
        match catch_unwind(AssertUnwindSafe(|| self.listener.handle(event))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("Event listener failed: {}", to_nitrite_error(e)),
            Err(_) => log::warn!("Event listener panicked"),
        }
    }

    fn unschedule(&self) {
        self.state.lock().scheduled = false;
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.state.lock().pending.clear();
    }
}

impl<E, L> NitriteEventBus<E, L>
where
    E: Send + Sync + 'static,
    L: Handle<E> + Send + Sync + 'static,
{
    /// Creates a bus that dispatches on a shared, externally owned executor.
    /// Closing the bus leaves the executor running.
    pub fn with_executor(executor: TaskExecutor) -> Self {
        Self::build(executor, false)
    }

    /// Creates a bus with its own single-worker executor, shut down on `close`.
    pub fn new() -> NitriteResult<Self> {
        let executor = TaskExecutor::new("event-bus", 1)?;
        Ok(Self::build(executor, true))
    }

    fn build(executor: TaskExecutor, owns_executor: bool) -> Self {
        NitriteEventBus {
            inner: Arc::new(EventBusInner {
                executor,
                owns_executor,
                mailboxes: DashMap::new(),
                next_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn register(&self, listener: L) -> NitriteResult<SubscriberRef> {
        if self.is_closed() {
            log::error!("Cannot register a listener on a closed event bus");
            return Err(NitriteError::new(
                "Event bus is closed",
                ErrorKind::EventError,
            ));
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner.mailboxes.insert(id, Arc::new(Mailbox::new(listener)));
        Ok(SubscriberRef { id })
    }

    pub fn deregister(&self, subscriber: SubscriberRef) -> NitriteResult<()> {
        match self.inner.mailboxes.remove(&subscriber.id) {
            Some((_, mailbox)) => {
                mailbox.deactivate();
                Ok(())
            }
            None => {
                log::error!("No listener registered with id {}", subscriber.id);
                Err(NitriteError::new(
                    &format!("No listener registered with id {}", subscriber.id),
                    ErrorKind::EventError,
                ))
            }
        }
    }

    /// Registers a listener that is deregistered when the returned guard drops.
    pub fn register_scoped(&self, listener: L) -> NitriteResult<EventSubscription<E, L>> {
        let subscriber = self.register(listener)?;
        Ok(EventSubscription {
            bus: Arc::downgrade(&self.inner),
            subscriber,
        })
    }

    pub fn publish(&self, event: E) -> NitriteResult<()> {
        if self.is_closed() || self.inner.mailboxes.is_empty() {
            return Ok(());
        }

        let event = Arc::new(Event::new(event));
        let mailboxes: Vec<Arc<Mailbox<E, L>>> = self
            .inner
            .mailboxes
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        for mailbox in mailboxes {
            if mailbox.enqueue(event.clone()) {
                let worker = mailbox.clone();
                if let Err(e) = self.inner.executor.submit(Box::new(move || worker.drain())) {
                    log::warn!("Dropping event, dispatch failed: {}", e);
                    mailbox.unschedule();
                }
            }
        }
        Ok(())
    }

    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        for entry in self.inner.mailboxes.iter() {
            entry.value().deactivate();
        }
        self.inner.mailboxes.clear();
        if self.inner.owns_executor {
            self.inner.executor.shutdown();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn has_listeners(&self) -> bool {
        !self.inner.mailboxes.is_empty()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.mailboxes.len()
    }
}

/// Scope-bound registration; deregisters its listener on drop.
pub struct EventSubscription<E, L> {
    bus: Weak<EventBusInner<E, L>>,
    subscriber: SubscriberRef,
}

impl<E, L> EventSubscription<E, L> {
    pub fn subscriber(&self) -> SubscriberRef {
        self.subscriber
    }
}

impl<E, L> Drop for EventSubscription<E, L> {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            if let Some((_, mailbox)) = bus.mailboxes.remove(&self.subscriber.id) {
                mailbox.active.store(false, Ordering::SeqCst);
                mailbox.state.lock().pending.clear();
            }
        }
    }
}

/// Maps a listener-side failure into the crate error.
pub(crate) fn to_nitrite_error(e: BasuError) -> NitriteError {
    match e {
        BasuError::HandlerError(e) => NitriteError::new(
            &format!("Event handler error: {}", e),
            ErrorKind::EventError,
        ),
        other => NitriteError::new(&format!("Event bus error: {}", other), ErrorKind::EventError),
    }
}

/// Wraps a crate error so it can cross the listener boundary.
pub(crate) fn to_basu_error(e: NitriteError) -> BasuError {
    BasuError::HandlerError(anyhow::Error::from(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use awaitility::at_most;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;
    use test_retry::retry;

    #[derive(Clone, Copy)]
    enum Mode {
        Record,
        Fail,
        Panic,
    }

    #[derive(Clone)]
    struct TestListener {
        seen: Arc<Mutex<Vec<u32>>>,
        calls: Arc<AtomicUsize>,
        delay: Duration,
        mode: Mode,
    }

    impl TestListener {
        fn new(mode: Mode, delay_ms: u64) -> Self {
            TestListener {
                seen: Arc::new(Mutex::new(Vec::new())),
                calls: Arc::new(AtomicUsize::new(0)),
                delay: Duration::from_millis(delay_ms),
                mode,
            }
        }
    }

    impl Handle<u32> for TestListener {
        fn handle(&self, event: &Event<u32>) -> Result<(), BasuError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            match self.mode {
                Mode::Record => {
                    self.seen.lock().push(event.data);
                    Ok(())
                }
                Mode::Fail => Err(to_basu_error(NitriteError::new(
                    "listener failed",
                    ErrorKind::EventError,
                ))),
                Mode::Panic => panic!("listener panic"),
            }
        }
    }

    #[test]
    #[retry]
    fn test_publish_does_not_block() {
        let executor = TaskExecutor::new("bus-test", 2).unwrap();
        let bus = NitriteEventBus::with_executor(executor.clone());
        let listener = TestListener::new(Mode::Record, 50);
        let seen = listener.seen.clone();
        bus.register(listener).unwrap();

        let start = std::time::Instant::now();
        for i in 0..5 {
            bus.publish(i).unwrap();
        }
        assert!(start.elapsed() < Duration::from_millis(200));

        at_most(Duration::from_secs(5)).until(|| seen.lock().len() == 5);
        executor.shutdown();
    }

    #[test]
    fn test_per_listener_order() {
        let executor = TaskExecutor::new("bus-test", 4).unwrap();
        let bus = NitriteEventBus::with_executor(executor.clone());
        let listener = TestListener::new(Mode::Record, 0);
        let seen = listener.seen.clone();
        bus.register(listener).unwrap();

        for i in 0..200 {
            bus.publish(i).unwrap();
        }
        at_most(Duration::from_secs(5)).until(|| seen.lock().len() == 200);
        assert_eq!(*seen.lock(), (0..200).collect::<Vec<u32>>());
        executor.shutdown();
    }

    #[test]
    fn test_listener_failures_are_isolated() {
        let executor = TaskExecutor::new("bus-test", 2).unwrap();
        let bus = NitriteEventBus::with_executor(executor.clone());
        let failing = TestListener::new(Mode::Fail, 0);
        let panicking = TestListener::new(Mode::Panic, 0);
        let healthy = TestListener::new(Mode::Record, 0);
        let (fail_calls, panic_calls, seen) = (
            failing.calls.clone(),
            panicking.calls.clone(),
            healthy.seen.clone(),
        );
        bus.register(failing).unwrap();
        bus.register(panicking).unwrap();
        bus.register(healthy).unwrap();

        for i in 0..3 {
            assert!(bus.publish(i).is_ok());
        }
        at_most(Duration::from_secs(5)).until(|| {
            fail_calls.load(Ordering::SeqCst) == 3
                && panic_calls.load(Ordering::SeqCst) == 3
                && seen.lock().len() == 3
        });
        assert_eq!(*seen.lock(), vec![0, 1, 2]);
        executor.shutdown();
    }

    #[test]
    fn test_deregister_stops_delivery() {
        let executor = TaskExecutor::new("bus-test", 1).unwrap();
        let bus = NitriteEventBus::with_executor(executor.clone());
        let listener = TestListener::new(Mode::Record, 0);
        let seen = listener.seen.clone();
        let subscriber = bus.register(listener).unwrap();
        bus.publish(1).unwrap();
        at_most(Duration::from_secs(5)).until(|| seen.lock().len() == 1);

        bus.deregister(subscriber).unwrap();
        assert!(!bus.has_listeners());
        bus.publish(2).unwrap();
        executor.shutdown();
        assert_eq!(*seen.lock(), vec![1]);

        assert!(bus.deregister(subscriber).is_err());
    }

    #[test]
    fn test_scoped_subscription() {
        let executor = TaskExecutor::new("bus-test", 1).unwrap();
        let bus = NitriteEventBus::with_executor(executor.clone());
        {
            let _subscription = bus
                .register_scoped(TestListener::new(Mode::Record, 0))
                .unwrap();
            assert_eq!(bus.listener_count(), 1);
        }
        assert_eq!(bus.listener_count(), 0);
        executor.shutdown();
    }

    #[test]
    fn test_publish_after_close_is_noop() {
        let bus: NitriteEventBus<u32, TestListener> = NitriteEventBus::new().unwrap();
        let listener = TestListener::new(Mode::Record, 0);
        let calls = listener.calls.clone();
        bus.register(listener.clone()).unwrap();
        bus.close();
        assert!(bus.is_closed());
        assert!(bus.publish(1).is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(bus.register(listener).is_err());
    }
}
