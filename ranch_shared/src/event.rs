//! Event queues.
//!
//! A small typed event bus. Room events, scene requests and input edges are
//! pushed by whoever observes them and drained once per frame by the owner.
//! Events of one type keep their push order.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
};

/// Typed event bus.
#[derive(Default)]
pub struct EventBus {
    queues: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<E: 'static + Send + Sync>(&mut self, e: E) {
        self.queue_mut::<E>().push(e);
    }

    pub fn extend<E: 'static + Send + Sync>(&mut self, events: impl IntoIterator<Item = E>) {
        self.queue_mut::<E>().extend(events);
    }

    /// Drains all queued events of a type, oldest first.
    pub fn drain<E: 'static + Send + Sync>(&mut self) -> Vec<E> {
        self.queues
            .remove(&TypeId::of::<E>())
            .and_then(|boxed| boxed.downcast::<Vec<E>>().ok())
            .map(|boxed| *boxed)
            .unwrap_or_default()
    }

    /// Number of queued events of a type.
    pub fn pending<E: 'static + Send + Sync>(&self) -> usize {
        self.queues
            .get(&TypeId::of::<E>())
            .and_then(|boxed| boxed.downcast_ref::<Vec<E>>())
            .map_or(0, Vec::len)
    }

    fn queue_mut<E: 'static + Send + Sync>(&mut self) -> &mut Vec<E> {
        let q = self
            .queues
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(Vec::<E>::new()));
        match q.downcast_mut::<Vec<E>>() {
            Some(q) => q,
            // Entries are keyed by their own TypeId.
            None => unreachable!("queue type mismatch"),
        }
    }
}
