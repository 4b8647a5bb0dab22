//! Change events and per-object listener registries.
//!
//! Environment, population and agent each own a [`ListenerSet`]; every
//! mutation that changes membership, species, time or liveness enqueues
//! exactly one notification per matching listener on the environment's
//! event queue.

use faunarium_data::{AgentId, PopulationId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A change notification. Events carry ids, never live handles, so a
/// callback cannot accidentally re-enter the simulation lock through
/// them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimEvent {
    /// The master clock advanced to `step`.
    TimeChanged { step: u64 },
    /// A population was attached to the environment.
    PopulationAdded { population: PopulationId },
    /// A population was detached from the environment.
    PopulationRemoved { population: PopulationId },
    /// A population was killed; terminal.
    PopulationKilled { population: PopulationId },
    /// An agent joined a population.
    AgentAdded {
        population: PopulationId,
        agent: AgentId,
    },
    /// An agent left a population.
    AgentRemoved {
        population: PopulationId,
        agent: AgentId,
    },
    /// An agent changed owning population.
    PopulationChanged {
        agent: AgentId,
        from: PopulationId,
        to: PopulationId,
    },
    /// An agent metamorphosed into a layout-compatible species.
    SpeciesChanged { agent: AgentId },
    /// An agent was killed; terminal.
    AgentKilled { agent: AgentId },
}

/// The kind tag listeners subscribe by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    TimeChanged,
    PopulationAdded,
    PopulationRemoved,
    PopulationKilled,
    AgentAdded,
    AgentRemoved,
    PopulationChanged,
    SpeciesChanged,
    AgentKilled,
}

impl SimEvent {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            SimEvent::TimeChanged { .. } => EventKind::TimeChanged,
            SimEvent::PopulationAdded { .. } => EventKind::PopulationAdded,
            SimEvent::PopulationRemoved { .. } => EventKind::PopulationRemoved,
            SimEvent::PopulationKilled { .. } => EventKind::PopulationKilled,
            SimEvent::AgentAdded { .. } => EventKind::AgentAdded,
            SimEvent::AgentRemoved { .. } => EventKind::AgentRemoved,
            SimEvent::PopulationChanged { .. } => EventKind::PopulationChanged,
            SimEvent::SpeciesChanged { .. } => EventKind::SpeciesChanged,
            SimEvent::AgentKilled { .. } => EventKind::AgentKilled,
        }
    }
}

/// Callback handle stored in a listener set.
pub type ListenerFn = Arc<dyn Fn(&SimEvent) + Send + Sync>;

/// Token returned by registration, used for deregistration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct ListenerEntry {
    id: ListenerId,
    /// Empty = every kind.
    kinds: Vec<EventKind>,
    callback: ListenerFn,
}

/// Ordered set of listeners keyed by event kind. Registration order is
/// notification order.
#[derive(Default)]
pub struct ListenerSet {
    next_id: u64,
    entries: Vec<ListenerEntry>,
}

impl ListenerSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for `kinds`; an empty slice subscribes to
    /// every kind.
    pub fn add(
        &mut self,
        kinds: &[EventKind],
        callback: impl Fn(&SimEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push(ListenerEntry {
            id,
            kinds: kinds.to_vec(),
            callback: Arc::new(callback),
        });
        id
    }

    /// Removes a previously registered listener; returns whether it was
    /// still present.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Callbacks subscribed to `event`, in registration order, as owned
    /// handles safe to run after the mutation completes.
    #[must_use]
    pub fn matching(&self, event: &SimEvent) -> Vec<ListenerFn> {
        let kind = event.kind();
        self.entries
            .iter()
            .filter(|entry| entry.kinds.is_empty() || entry.kinds.contains(&kind))
            .map(|entry| Arc::clone(&entry.callback))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn filters_by_kind() {
        let mut set = ListenerSet::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let hits_clone = Arc::clone(&hits);
        set.add(&[EventKind::TimeChanged], move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });
        let all_hits = Arc::new(AtomicUsize::new(0));
        let all_clone = Arc::clone(&all_hits);
        set.add(&[], move |_| {
            all_clone.fetch_add(1, Ordering::SeqCst);
        });

        let time = SimEvent::TimeChanged { step: 1 };
        let killed = SimEvent::AgentKilled {
            agent: AgentId::new(),
        };
        for callback in set.matching(&time) {
            callback(&time);
        }
        for callback in set.matching(&killed) {
            callback(&killed);
        }

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(all_hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn remove_is_exact_and_reported() {
        let mut set = ListenerSet::new();
        let id = set.add(&[], |_| {});
        let other = set.add(&[], |_| {});
        assert_eq!(set.len(), 2);
        assert!(set.remove(id));
        assert!(!set.remove(id));
        assert_eq!(set.len(), 1);
        assert!(set.remove(other));
        assert!(set.is_empty());
    }
}
