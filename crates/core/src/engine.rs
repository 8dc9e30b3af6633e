//! Discrete-event engine: logical clock plus ordered event queue

use std::collections::BTreeMap;
use std::time::Duration;

use log::trace;

/// Total order for queued events: timestamp first, insertion sequence second.
///
/// The sequence number makes ties FIFO and the order total, so two runs that
/// schedule the same events in the same order dispatch them identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventKey {
    time: Duration,
    seq: u64,
}

/// Handle to a scheduled event, usable to cancel it before dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHandle(EventKey);

impl EventHandle {
    /// Timestamp the event was scheduled for.
    pub fn time(&self) -> Duration {
        self.0.time
    }
}

/// Receives events as the queue dispatches them.
///
/// Handlers schedule follow-up events through the queue reference they are
/// handed; they must not call back into [`EventQueue::run_until`].
pub trait EventHandler<E> {
    fn handle(&mut self, event: E, queue: &mut EventQueue<E>);
}

/// Event queue with a logical clock.
///
/// The clock only advances when an event is dispatched (or when a run
/// exhausts its horizon). Events are owned by the queue until dispatch and
/// moved into the handler afterwards.
#[derive(Debug)]
pub struct EventQueue<E> {
    events: BTreeMap<EventKey, E>,
    now: Duration,
    next_seq: u64,
}

impl<E> EventQueue<E> {
    pub fn new() -> Self {
        Self {
            events: BTreeMap::new(),
            now: Duration::ZERO,
            next_seq: 0,
        }
    }

    /// Current simulated time.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Schedule `event` after `delay`. A zero delay dispatches at the current
    /// timestamp, after everything already queued for it.
    pub fn schedule(&mut self, delay: Duration, event: E) -> EventHandle {
        let time = self.now + delay;
        self.insert(time, event)
    }

    /// Schedule `event` at an absolute timestamp.
    ///
    /// # Panics
    ///
    /// Panics if `time` is earlier than the current clock. Scheduling into
    /// the past is a causality violation and always a programming error.
    pub fn schedule_at(&mut self, time: Duration, event: E) -> EventHandle {
        if time < self.now {
            panic!(
                "causality violation: scheduling at {:?} with clock at {:?}",
                time, self.now
            );
        }
        self.insert(time, event)
    }

    fn insert(&mut self, time: Duration, event: E) -> EventHandle {
        let key = EventKey {
            time,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.events.insert(key, event);
        EventHandle(key)
    }

    /// Remove a pending event. Returns `false` if it was already dispatched
    /// or cancelled; cancelling twice is a no-op.
    pub fn cancel(&mut self, handle: &EventHandle) -> bool {
        self.events.remove(&handle.0).is_some()
    }

    /// Dispatch events in order until the queue is empty or the next event
    /// lies beyond `end`. Events past the horizon are discarded and the
    /// clock lands exactly on `end`. Returns the number of events dispatched.
    pub fn run_until<H: EventHandler<E>>(&mut self, end: Duration, handler: &mut H) -> u64 {
        let dispatched = self.dispatch_through(end, handler);
        self.events.clear();
        self.now = end;
        dispatched
    }

    /// Like [`EventQueue::run_until`], but events scheduled past `end` stay
    /// queued, so a later call can continue the same run from where this one
    /// stopped. The clock still lands exactly on `end`.
    pub fn advance_to<H: EventHandler<E>>(&mut self, end: Duration, handler: &mut H) -> u64 {
        let dispatched = self.dispatch_through(end, handler);
        self.now = end;
        dispatched
    }

    fn dispatch_through<H: EventHandler<E>>(&mut self, end: Duration, handler: &mut H) -> u64 {
        let mut dispatched = 0;
        while let Some(key) = self.events.keys().next().copied() {
            if key.time > end {
                break;
            }
            // Pop before dispatch so the handler can schedule and cancel
            // freely through the queue it is handed.
            let event = match self.events.remove(&key) {
                Some(event) => event,
                None => break,
            };
            self.now = key.time;
            trace!("dispatching event at {:?}", key.time);
            handler.handle(event, self);
            dispatched += 1;
        }
        dispatched
    }
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Collector {
        seen: Vec<(Duration, u32)>,
    }

    impl EventHandler<u32> for Collector {
        fn handle(&mut self, event: u32, queue: &mut EventQueue<u32>) {
            self.seen.push((queue.now(), event));
        }
    }

    #[test]
    fn test_dispatch_order_is_time_sorted() {
        let mut queue = EventQueue::new();
        queue.schedule(Duration::from_millis(30), 3);
        queue.schedule(Duration::from_millis(10), 1);
        queue.schedule(Duration::from_millis(20), 2);

        let mut collector = Collector { seen: Vec::new() };
        let dispatched = queue.run_until(Duration::from_secs(1), &mut collector);

        assert_eq!(dispatched, 3);
        assert_eq!(
            collector.seen,
            vec![
                (Duration::from_millis(10), 1),
                (Duration::from_millis(20), 2),
                (Duration::from_millis(30), 3),
            ]
        );
    }

    #[test]
    fn test_equal_timestamps_are_fifo() {
        let mut queue = EventQueue::new();
        for i in 0..5 {
            queue.schedule(Duration::from_millis(10), i);
        }

        let mut collector = Collector { seen: Vec::new() };
        queue.run_until(Duration::from_secs(1), &mut collector);

        let order: Vec<u32> = collector.seen.iter().map(|(_, e)| *e).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_cancel_pending_event() {
        let mut queue = EventQueue::new();
        let keep = queue.schedule(Duration::from_millis(10), 1);
        let drop = queue.schedule(Duration::from_millis(20), 2);

        assert!(queue.cancel(&drop));
        assert!(!queue.cancel(&drop));

        let mut collector = Collector { seen: Vec::new() };
        queue.run_until(Duration::from_secs(1), &mut collector);

        assert_eq!(collector.seen, vec![(Duration::from_millis(10), 1)]);
        assert!(!queue.cancel(&keep));
    }

    #[test]
    fn test_horizon_discards_and_advances_clock() {
        let mut queue = EventQueue::new();
        queue.schedule(Duration::from_millis(10), 1);
        queue.schedule(Duration::from_secs(10), 2);

        let mut collector = Collector { seen: Vec::new() };
        let dispatched = queue.run_until(Duration::from_secs(1), &mut collector);

        assert_eq!(dispatched, 1);
        assert!(queue.is_empty());
        assert_eq!(queue.now(), Duration::from_secs(1));
    }

    #[test]
    fn test_handler_can_reschedule() {
        struct Chain {
            fired: u32,
        }

        impl EventHandler<u32> for Chain {
            fn handle(&mut self, event: u32, queue: &mut EventQueue<u32>) {
                self.fired += 1;
                if event < 3 {
                    queue.schedule(Duration::from_millis(100), event + 1);
                }
            }
        }

        let mut queue = EventQueue::new();
        queue.schedule(Duration::from_millis(100), 0);

        let mut chain = Chain { fired: 0 };
        queue.run_until(Duration::from_secs(1), &mut chain);

        assert_eq!(chain.fired, 4);
        assert_eq!(queue.now(), Duration::from_secs(1));
    }

    #[test]
    fn test_advance_keeps_future_events() {
        let mut queue = EventQueue::new();
        queue.schedule(Duration::from_millis(10), 1);
        queue.schedule(Duration::from_secs(10), 2);

        let mut collector = Collector { seen: Vec::new() };
        let dispatched = queue.advance_to(Duration::from_secs(1), &mut collector);

        assert_eq!(dispatched, 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.now(), Duration::from_secs(1));

        let dispatched = queue.run_until(Duration::from_secs(20), &mut collector);
        assert_eq!(dispatched, 1);
        assert_eq!(
            collector.seen,
            vec![
                (Duration::from_millis(10), 1),
                (Duration::from_secs(10), 2),
            ]
        );
    }

    #[test]
    #[should_panic(expected = "causality violation")]
    fn test_past_schedule_panics() {
        struct BadHandler;

        impl EventHandler<u32> for BadHandler {
            fn handle(&mut self, _event: u32, queue: &mut EventQueue<u32>) {
                queue.schedule_at(Duration::ZERO, 99);
            }
        }

        let mut queue = EventQueue::new();
        queue.schedule(Duration::from_millis(10), 1);
        queue.run_until(Duration::from_secs(1), &mut BadHandler);
    }
}
