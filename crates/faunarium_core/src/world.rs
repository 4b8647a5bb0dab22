//! Internal ownership graph behind the public handles.
//!
//! One [`WorldCore`] per environment lives inside the environment's
//! [`SharedState`]: the lock that guards it is the same lock the event
//! queue drains under, which is what makes every listener callback see a
//! state consistent with the mutation that triggered it.
//!
//! Handles (`Environment`, `Population`, `Agent`) never own core state;
//! they resolve through [`MemberCell`]s holding a weak back-reference to
//! the owning environment. A cleared cell is the terminal dead state.
//!
//! Lock order: member cells are leaf locks; they are read (and the
//! environment `Arc` copied out) before the environment lock is taken,
//! and written only while the involved environment locks are already
//! held. Cross-environment moves take both environment locks in
//! creation-serial order.

use crate::clock::{MasterClock, SimClock};
use crate::dispatch::{EventQueue, Guarded, SharedState};
use crate::events::{ListenerFn, ListenerSet, SimEvent};
use crate::observations::ObservationBuffer;
use crate::species::Species;
use crate::track::Track;
use faunarium_data::{AgentId, BoundingBox, PopulationId};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::error::{Result, SimError};

static ENV_SERIAL: AtomicU64 = AtomicU64::new(0);

/// Everything one environment shares between its handles and its
/// dispatch worker.
pub(crate) struct EnvShared {
    /// Creation serial; the cross-environment lock order.
    pub(crate) serial: u64,
    pub(crate) state: Arc<SharedState<WorldCore>>,
    pub(crate) queue: EventQueue<WorldCore>,
}

impl EnvShared {
    pub(crate) fn new(core: WorldCore) -> Arc<Self> {
        let state = SharedState::new(core);
        Arc::new(Self {
            serial: ENV_SERIAL.fetch_add(1, Ordering::SeqCst),
            state: Arc::clone(&state),
            queue: EventQueue::new(state),
        })
    }

    /// Runs a mutation under the environment lock, then wakes the
    /// dispatch worker if the mutation deferred notifications.
    pub(crate) fn mutate<R>(
        &self,
        f: impl FnOnce(&mut Guarded<WorldCore>) -> Result<R>,
    ) -> Result<R> {
        let (result, pending) = {
            let mut guard = self.state.lock();
            let result = f(&mut guard);
            (result, guard.pending_tasks() > 0)
        };
        if pending {
            self.queue.kick();
        }
        result
    }
}

/// Weak back-reference from a population or agent to its environment.
/// `None` (or a dead upgrade) means the member is dead.
pub(crate) struct MemberCell {
    env: Mutex<Option<Weak<EnvShared>>>,
}

impl MemberCell {
    pub(crate) fn new(env: &Arc<EnvShared>) -> Arc<Self> {
        Arc::new(Self {
            env: Mutex::new(Some(Arc::downgrade(env))),
        })
    }

    pub(crate) fn get(&self) -> Option<Arc<EnvShared>> {
        self.env
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()?
            .upgrade()
    }

    /// Repoints the cell at another environment. Only called with the
    /// involved environment locks held.
    pub(crate) fn rebind(&self, env: &Arc<EnvShared>) {
        *self.env.lock().unwrap_or_else(|e| e.into_inner()) = Some(Arc::downgrade(env));
    }

    /// Terminal: marks the member dead.
    pub(crate) fn clear(&self) {
        *self.env.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

/// The state of one environment: master clock, populations, agents and
/// the environment-level listeners.
pub(crate) struct WorldCore {
    pub(crate) clock: MasterClock,
    pub(crate) populations: HashMap<PopulationId, PopulationCore>,
    pub(crate) agents: HashMap<AgentId, AgentCore>,
    pub(crate) listeners: ListenerSet,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) disposed: bool,
}

pub(crate) struct PopulationCore {
    pub(crate) cell: Arc<MemberCell>,
    /// Membership in join order; mutated only by spawn/migrate/kill.
    pub(crate) members: Vec<AgentId>,
    pub(crate) listeners: ListenerSet,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) heading_jitter: f64,
    /// `None` = dirty; recomputed on demand, never served stale.
    pub(crate) bounds_cache: Option<Option<BoundingBox>>,
}

pub(crate) struct AgentCore {
    pub(crate) cell: Arc<MemberCell>,
    pub(crate) population: PopulationId,
    pub(crate) species: Arc<Species>,
    pub(crate) clock: crate::clock::RelativeClock,
    pub(crate) track: Box<dyn Track>,
    pub(crate) buffer: ObservationBuffer,
    pub(crate) listeners: ListenerSet,
}

/// Defers one notification task per callback, in order.
pub(crate) fn defer_notifications(
    guard: &mut Guarded<WorldCore>,
    listeners: Vec<ListenerFn>,
    event: &SimEvent,
) {
    for listener in listeners {
        let event = event.clone();
        guard.defer(Box::new(move || listener(&event)));
    }
}

pub(crate) fn emit_env(guard: &mut Guarded<WorldCore>, event: SimEvent) {
    let listeners = guard.state.listeners.matching(&event);
    defer_notifications(guard, listeners, &event);
}

pub(crate) fn emit_population(
    guard: &mut Guarded<WorldCore>,
    population: PopulationId,
    event: SimEvent,
) {
    let listeners = guard
        .state
        .populations
        .get(&population)
        .map(|core| core.listeners.matching(&event))
        .unwrap_or_default();
    defer_notifications(guard, listeners, &event);
}

pub(crate) fn emit_agent(guard: &mut Guarded<WorldCore>, agent: AgentId, event: SimEvent) {
    let listeners = guard
        .state
        .agents
        .get(&agent)
        .map(|core| core.listeners.matching(&event))
        .unwrap_or_default();
    defer_notifications(guard, listeners, &event);
}

/// Kills a population in place: every agent dies, then the population
/// detaches. Shared by `Population::kill` and `Environment::dispose`.
pub(crate) fn kill_population_locked(guard: &mut Guarded<WorldCore>, id: PopulationId) {
    let Some(population) = guard.state.populations.remove(&id) else {
        return;
    };
    for agent_id in &population.members {
        if let Some(agent) = guard.state.agents.remove(agent_id) {
            agent.cell.clear();
            let killed = SimEvent::AgentKilled { agent: *agent_id };
            let listeners = agent.listeners.matching(&killed);
            defer_notifications(guard, listeners, &killed);
            let removed = SimEvent::AgentRemoved {
                population: id,
                agent: *agent_id,
            };
            let listeners = population.listeners.matching(&removed);
            defer_notifications(guard, listeners, &removed);
        }
    }
    population.cell.clear();
    let killed = SimEvent::PopulationKilled { population: id };
    let listeners = population.listeners.matching(&killed);
    defer_notifications(guard, listeners, &killed);
    emit_env(guard, SimEvent::PopulationRemoved { population: id });
}

/// Resolves a member's environment, verifies membership under the lock
/// and runs `f`; retries when the member moved environments between
/// resolution and locking. The dispatch worker is woken afterwards if
/// `f` deferred notifications.
pub(crate) fn with_member<R>(
    cell: &MemberCell,
    member: impl Fn(&WorldCore) -> bool,
    dead: fn() -> SimError,
    f: impl FnOnce(&mut Guarded<WorldCore>) -> Result<R>,
) -> Result<R> {
    let mut f = Some(f);
    loop {
        let Some(env) = cell.get() else {
            return Err(dead());
        };
        {
            let mut guard = env.state.lock();
            if member(&guard.state) {
                let Some(callback) = f.take() else {
                    return Err(dead());
                };
                let result = callback(&mut guard);
                let pending = guard.pending_tasks() > 0;
                drop(guard);
                if pending {
                    env.queue.kick();
                }
                return result;
            }
        }
        // Not in the environment the cell pointed at: either moved
        // concurrently or dead.
        match cell.get() {
            Some(next) if !Arc::ptr_eq(&next, &env) => continue,
            _ => return Err(dead()),
        }
    }
}
