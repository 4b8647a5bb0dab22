//! The environment: owner of the master clock, the populations and the
//! shared lock everything under it synchronizes on.

use crate::clock::{MasterClock, SimClock};
use crate::error::{Result, SimError};
use crate::events::{EventKind, ListenerId, SimEvent};
use crate::population::Population;
use crate::world::{emit_env, kill_population_locked, EnvShared, MemberCell, PopulationCore, WorldCore};
use chrono::{DateTime, Utc};
use faunarium_data::PopulationId;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::Arc;

/// Default randomized heading perturbation per movement step, radians.
pub const DEFAULT_HEADING_JITTER: f64 = 0.4;

/// Handle to one environment. Clones share the environment; dropping
/// the last clone releases it, at which point surviving population and
/// agent handles read as dead.
#[derive(Clone)]
pub struct Environment {
    pub(crate) shared: Arc<EnvShared>,
}

impl Environment {
    /// Creates an environment around `clock` with an entropy-seeded
    /// behavior RNG.
    #[must_use]
    pub fn new(clock: MasterClock) -> Self {
        Self::build(clock, ChaCha8Rng::from_entropy())
    }

    /// Deterministic variant: movement and spawn randomness derive from
    /// `seed`.
    #[must_use]
    pub fn with_seed(clock: MasterClock, seed: u64) -> Self {
        Self::build(clock, ChaCha8Rng::seed_from_u64(seed))
    }

    fn build(clock: MasterClock, rng: ChaCha8Rng) -> Self {
        let core = WorldCore {
            clock,
            populations: HashMap::new(),
            agents: HashMap::new(),
            listeners: crate::events::ListenerSet::new(),
            rng,
            disposed: false,
        };
        Self {
            shared: EnvShared::new(core),
        }
    }

    /// Creates a population attached to this environment, firing
    /// `PopulationAdded`.
    pub fn create_population(&self) -> Result<Population> {
        self.shared.mutate(|guard| {
            if guard.state.disposed {
                return Err(SimError::Disposed);
            }
            let id = PopulationId::new();
            let seed = guard.state.rng.gen::<u64>();
            let cell = MemberCell::new(&self.shared);
            guard.state.populations.insert(
                id,
                PopulationCore {
                    cell: Arc::clone(&cell),
                    members: Vec::new(),
                    listeners: crate::events::ListenerSet::new(),
                    rng: ChaCha8Rng::seed_from_u64(seed),
                    heading_jitter: DEFAULT_HEADING_JITTER,
                    bounds_cache: Some(None),
                },
            );
            emit_env(guard, SimEvent::PopulationAdded { population: id });
            Ok(Population::from_parts(id, cell))
        })
    }

    /// Moves `population` (and every agent in it) from its current
    /// environment into this one, firing `PopulationRemoved` on the
    /// source and `PopulationAdded` here. Agents keep their age: their
    /// relative clocks are rebased into this environment's time domain.
    /// A no-op when the population is already here.
    pub fn add_population(&self, population: &Population) -> Result<()> {
        loop {
            let Some(source) = population.cell().get() else {
                return Err(SimError::DeadPopulation);
            };
            if Arc::ptr_eq(&source, &self.shared) {
                return Ok(());
            }

            // Both environment locks, in creation-serial order.
            let (mut src_guard, mut dst_guard) = if source.serial < self.shared.serial {
                let src = source.state.lock();
                let dst = self.shared.state.lock();
                (src, dst)
            } else {
                let dst = self.shared.state.lock();
                let src = source.state.lock();
                (src, dst)
            };

            if dst_guard.state.disposed {
                return Err(SimError::Disposed);
            }
            let id = population.id();
            let Some(mut pop_core) = src_guard.state.populations.remove(&id) else {
                drop(src_guard);
                drop(dst_guard);
                match population.cell().get() {
                    Some(next) if !Arc::ptr_eq(&next, &source) => continue,
                    _ => return Err(SimError::DeadPopulation),
                }
            };

            let mut moved = Vec::with_capacity(pop_core.members.len());
            for agent_id in &pop_core.members {
                if let Some(mut agent) = src_guard.state.agents.remove(agent_id) {
                    let age = agent.clock.current_step();
                    agent.clock = dst_guard.state.clock.rebased_relative(age);
                    agent.cell.rebind(&self.shared);
                    moved.push((*agent_id, agent));
                }
            }
            pop_core.cell.rebind(&self.shared);
            pop_core.bounds_cache = None;

            emit_env(&mut src_guard, SimEvent::PopulationRemoved { population: id });
            for (agent_id, agent) in moved {
                dst_guard.state.agents.insert(agent_id, agent);
            }
            dst_guard.state.populations.insert(id, pop_core);
            emit_env(&mut dst_guard, SimEvent::PopulationAdded { population: id });

            let src_pending = src_guard.pending_tasks() > 0;
            let dst_pending = dst_guard.pending_tasks() > 0;
            drop(src_guard);
            drop(dst_guard);
            if src_pending {
                source.queue.kick();
            }
            if dst_pending {
                self.shared.queue.kick();
            }
            return Ok(());
        }
    }

    /// Advances the master clock one step and enqueues `TimeChanged`.
    /// Moving agents is the caller's job, done beforehand through
    /// [`Population::evoluate`]. Returns the new current step.
    pub fn advance_step(&self) -> Result<u64> {
        self.shared.mutate(|guard| {
            if guard.state.disposed {
                return Err(SimError::Disposed);
            }
            guard.state.clock.advance();
            let step = guard.state.clock.current_step();
            emit_env(guard, SimEvent::TimeChanged { step });
            Ok(step)
        })
    }

    /// Kills every population, drops all listeners and stops the event
    /// queue after it drained what the teardown enqueued. Terminal and
    /// idempotent.
    pub fn dispose(&self) {
        let pending = {
            let mut guard = self.shared.state.lock();
            if !guard.state.disposed {
                guard.state.disposed = true;
                let ids: Vec<PopulationId> = guard.state.populations.keys().copied().collect();
                for id in ids {
                    kill_population_locked(&mut guard, id);
                }
                guard.state.listeners.clear();
            }
            guard.pending_tasks() > 0
        };
        if pending {
            self.shared.queue.kick();
        }
        self.shared.queue.dispose();
        tracing::debug!("environment disposed");
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.shared.state.lock().state.disposed
    }

    /// Shared handle to the master clock.
    #[must_use]
    pub fn clock(&self) -> MasterClock {
        self.shared.state.lock().state.clock.clone()
    }

    #[must_use]
    pub fn current_step(&self) -> u64 {
        self.shared.state.lock().state.clock.current_step()
    }

    #[must_use]
    pub fn current_date(&self) -> DateTime<Utc> {
        self.shared.state.lock().state.clock.current_date()
    }

    /// Handles to every population currently attached.
    #[must_use]
    pub fn populations(&self) -> Vec<Population> {
        let guard = self.shared.state.lock();
        guard
            .state
            .populations
            .iter()
            .map(|(id, core)| Population::from_parts(*id, Arc::clone(&core.cell)))
            .collect()
    }

    /// Registers an environment-level listener; an empty `kinds` slice
    /// subscribes to every kind.
    pub fn add_listener(
        &self,
        kinds: &[EventKind],
        callback: impl Fn(&SimEvent) + Send + Sync + 'static,
    ) -> Result<ListenerId> {
        self.shared.mutate(|guard| {
            if guard.state.disposed {
                return Err(SimError::Disposed);
            }
            Ok(guard.state.listeners.add(kinds, callback))
        })
    }

    pub fn remove_listener(&self, id: ListenerId) -> Result<bool> {
        self.shared
            .mutate(|guard| Ok(guard.state.listeners.remove(id)))
    }
}
