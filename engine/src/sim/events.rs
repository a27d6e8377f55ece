//! Push channel for engine events.

use crate::types::Event;
use futures::channel::mpsc;

/// Fan-out of [`Event`]s to any number of subscribers.
///
/// Senders are unbounded: emitting never blocks the engine. A subscriber that
/// drops its receiver is pruned on the next emit.
pub(crate) struct EventBus {
    subscribers: Vec<mpsc::UnboundedSender<Event>>,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    pub(crate) fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Event> {
        let (sender, receiver) = mpsc::unbounded();
        self.subscribers.push(sender);
        receiver
    }

    pub(crate) fn emit(&mut self, event: Event) {
        self.subscribers
            .retain(|subscriber| subscriber.unbounded_send(event.clone()).is_ok());
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_to_all_subscribers_in_order() {
        let mut bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.emit(Event::Reset);
        bus.emit(Event::DeviceFailed("a".into()));

        for receiver in [&mut first, &mut second] {
            assert!(matches!(receiver.try_next(), Ok(Some(Event::Reset))));
            assert!(matches!(
                receiver.try_next(),
                Ok(Some(Event::DeviceFailed(id))) if id.as_str() == "a"
            ));
        }
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let mut bus = EventBus::new();
        let receiver = bus.subscribe();
        let _keep = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(receiver);
        bus.emit(Event::Reset);
        assert_eq!(bus.subscriber_count(), 1);
    }
}
