// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

/// A typed, thread-safe event channel backed by an unbounded `flume` channel.
///
/// The owner of the bus drains it with [`EventBus::drain`]; any number of
/// producers, possibly on other threads, publish through cloned senders.
#[derive(Debug)]
pub struct EventBus<T: Send + 'static> {
    sender: flume::Sender<T>,
    receiver: flume::Receiver<T>,
}

impl<T: Send + 'static> EventBus<T> {
    /// Creates a new bus with an unbounded channel.
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        Self { sender, receiver }
    }

    /// Publishes an event, logging an error if the receiver is gone.
    pub fn publish(&self, event: T) {
        if let Err(e) = self.sender.send(event) {
            log::error!("Failed to publish event: {e}. Receiver likely disconnected.");
        }
    }

    /// Returns a clone of the sending end of the channel.
    pub fn sender(&self) -> flume::Sender<T> {
        self.sender.clone()
    }

    /// Returns the receiving end of the channel.
    pub fn receiver(&self) -> &flume::Receiver<T> {
        &self.receiver
    }

    /// Takes every pending event in publication order.
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }

    /// Number of events waiting to be drained.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl<T: Send + 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[derive(Debug, Clone, PartialEq)]
    enum Change {
        Set(u32),
        Removed(u32),
    }

    #[test]
    fn drain_preserves_publication_order() {
        let bus = EventBus::new();
        bus.publish(Change::Set(1));
        bus.publish(Change::Removed(1));
        bus.publish(Change::Set(2));

        assert_eq!(bus.pending(), 3);
        assert_eq!(
            bus.drain(),
            vec![Change::Set(1), Change::Removed(1), Change::Set(2)]
        );
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn publish_from_another_thread() {
        let bus = EventBus::new();
        let sender = bus.sender();
        thread::spawn(move || sender.send(Change::Set(7)).unwrap())
            .join()
            .unwrap();
        assert_eq!(bus.drain(), vec![Change::Set(7)]);
    }

    #[test]
    fn sender_fails_after_bus_dropped() {
        let bus = EventBus::<Change>::new();
        let sender = bus.sender();
        drop(bus);
        assert!(sender.send(Change::Set(0)).is_err());
    }
}
