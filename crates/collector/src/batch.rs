//! Event batches and the per-worker batch accumulator.

use pulse_core::{Category, IngestEvent};
use std::time::Duration;
use tokio::time::Instant;

/// A batch of same-category events, in arrival order.
///
/// Owned by the worker that fills it, then moved into the sink.
#[derive(Debug)]
pub struct EventBatch {
    category: Category,
    events: Vec<IngestEvent>,
}

impl EventBatch {
    pub fn new(category: Category) -> Self {
        Self::with_capacity(category, 0)
    }

    pub fn with_capacity(category: Category, capacity: usize) -> Self {
        Self {
            category,
            events: Vec::with_capacity(capacity),
        }
    }

    /// Builds a batch from events that all share `category`. Events of any
    /// other category are left out.
    pub fn from_events(category: Category, events: impl IntoIterator<Item = IngestEvent>) -> Self {
        let mut batch = Self::new(category);
        for event in events {
            batch.push(event);
        }
        batch
    }

    /// Appends an event. Returns false, leaving the batch untouched, if the
    /// event belongs to a different category.
    pub fn push(&mut self, event: IngestEvent) -> bool {
        if event.category() != self.category {
            return false;
        }
        self.events.push(event);
        true
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[IngestEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<IngestEvent> {
        self.events
    }
}

/// One in-progress batch per category, plus its flush deadline.
#[derive(Debug)]
pub(crate) struct BatchAccumulator {
    max_size: usize,
    max_age: Duration,
    slots: [Option<(EventBatch, Instant)>; Category::COUNT],
}

impl BatchAccumulator {
    pub(crate) fn new(max_size: usize, max_age: Duration) -> Self {
        Self {
            max_size,
            max_age,
            slots: std::array::from_fn(|_| None),
        }
    }

    /// Adds an event to its category's batch. The first event of a batch sets
    /// its deadline to `enqueued_at + max_age`. Returns the batch once it is
    /// full.
    pub(crate) fn add(&mut self, event: IngestEvent, enqueued_at: Instant) -> Option<EventBatch> {
        let (max_size, max_age) = (self.max_size, self.max_age);
        let category = event.category();
        let slot = &mut self.slots[category.index()];

        let (batch, _) = slot.get_or_insert_with(|| {
            let batch = EventBatch::with_capacity(category, max_size.min(1024));
            (batch, enqueued_at + max_age)
        });
        batch.push(event);

        if batch.len() >= max_size {
            slot.take().map(|(batch, _)| batch)
        } else {
            None
        }
    }

    /// Earliest flush deadline across all open batches.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.slots
            .iter()
            .filter_map(|slot| slot.as_ref().map(|(_, deadline)| *deadline))
            .min()
    }

    /// Removes every batch whose deadline is at or before `now`.
    pub(crate) fn take_expired(&mut self, now: Instant) -> Vec<EventBatch> {
        let mut expired = Vec::new();
        for slot in self.slots.iter_mut() {
            if slot.as_ref().is_some_and(|(_, deadline)| *deadline <= now) {
                if let Some((batch, _)) = slot.take() {
                    expired.push(batch);
                }
            }
        }
        expired
    }

    /// Removes every non-empty batch regardless of age.
    pub(crate) fn take_all(&mut self) -> Vec<EventBatch> {
        self.slots
            .iter_mut()
            .filter_map(|slot| slot.take().map(|(batch, _)| batch))
            .filter(|batch| !batch.is_empty())
            .collect()
    }
}
