//! Populations: ordered sets of agents sharing movement behavior and
//! listener scope.

use crate::agent::Agent;
use crate::clock::SimClock;
use crate::environment::Environment;
use crate::error::{Result, SimError};
use crate::events::{EventKind, ListenerId, SimEvent};
use crate::observations::ObservationBuffer;
use crate::species::Species;
use crate::track::PolyTrack;
use crate::dispatch::Guarded;
use crate::world::{kill_population_locked, with_member, AgentCore, MemberCell, WorldCore};
use chrono::Duration;
use faunarium_data::{AgentId, BoundingBox, PopulationId, Position};
use rand::Rng;
use std::sync::Arc;

/// Handle to one population. Clones share identity; a population is
/// alive while it belongs to an environment, dead forever after
/// `kill()`.
#[derive(Clone)]
pub struct Population {
    id: PopulationId,
    cell: Arc<MemberCell>,
}

impl Population {
    pub(crate) fn from_parts(id: PopulationId, cell: Arc<MemberCell>) -> Self {
        Self { id, cell }
    }

    pub(crate) fn cell(&self) -> &Arc<MemberCell> {
        &self.cell
    }

    #[must_use]
    pub fn id(&self) -> PopulationId {
        self.id
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        let id = self.id;
        with_member(
            &self.cell,
            move |core: &WorldCore| core.populations.contains_key(&id),
            || SimError::DeadPopulation,
            |_| Ok(()),
        )
        .is_ok()
    }

    /// The owning environment, while alive.
    #[must_use]
    pub fn environment(&self) -> Option<Environment> {
        self.cell.get().map(|shared| Environment { shared })
    }

    fn run<R>(&self, f: impl FnOnce(&mut Guarded<WorldCore>) -> Result<R>) -> Result<R> {
        let id = self.id;
        with_member(
            &self.cell,
            move |core: &WorldCore| core.populations.contains_key(&id),
            || SimError::DeadPopulation,
            f,
        )
    }

    /// Creates an agent attached to this population, firing
    /// `AgentAdded`. The agent's relative clock starts at the
    /// population's current step; its initial heading is random.
    pub fn spawn(&self, species: Arc<Species>, position: Position) -> Result<Agent> {
        let pop_id = self.id;
        self.run(move |guard| {
            let clock = guard.state.clock.spawn_relative();
            let Some(env) = self.cell.get() else {
                return Err(SimError::DeadPopulation);
            };
            let population = guard
                .state
                .populations
                .get_mut(&pop_id)
                .ok_or(SimError::DeadPopulation)?;
            let heading = population.rng.gen_range(0.0..std::f64::consts::TAU);
            population.bounds_cache = None;

            let agent_id = AgentId::new();
            population.members.push(agent_id);
            let cell = MemberCell::new(&env);
            let buffer = ObservationBuffer::new(species.reduced_record_width());
            guard.state.agents.insert(
                agent_id,
                AgentCore {
                    cell: Arc::clone(&cell),
                    population: pop_id,
                    species,
                    clock,
                    track: Box::new(PolyTrack::new(position, heading)),
                    buffer,
                    listeners: crate::events::ListenerSet::new(),
                },
            );
            crate::world::emit_population(
                guard,
                pop_id,
                SimEvent::AgentAdded {
                    population: pop_id,
                    agent: agent_id,
                },
            );
            Ok(Agent::from_parts(agent_id, cell))
        })
    }

    /// One movement step of `duration` for every live agent: a seeded
    /// random heading perturbation followed by forward motion bounded
    /// by the species' top speed, then the track records the step.
    pub fn evoluate(&self, duration: Duration) -> Result<()> {
        if duration < Duration::zero() {
            return Err(SimError::invalid_range(
                "evoluate duration must not be negative".to_string(),
            ));
        }
        let seconds = duration.num_milliseconds() as f64 / 1000.0;
        let pop_id = self.id;
        self.run(move |guard| {
            let WorldCore {
                populations,
                agents,
                ..
            } = &mut guard.state;
            let population = populations
                .get_mut(&pop_id)
                .ok_or(SimError::DeadPopulation)?;
            let members = population.members.clone();
            let jitter = population.heading_jitter;
            for agent_id in &members {
                let Some(agent) = agents.get_mut(agent_id) else {
                    continue;
                };
                let angle = if jitter > 0.0 {
                    population.rng.gen_range(-jitter..=jitter)
                } else {
                    0.0
                };
                agent.track.rotate(angle);
                agent.track.move_forward(agent.species.max_speed() * seconds);
                agent.track.append_step();
            }
            population.bounds_cache = None;
            Ok(())
        })
    }

    /// Union of every agent's track bounding box, lazily cached. Any
    /// movement or membership change invalidates the cache, so a stale
    /// value is never returned. `None` for an empty population.
    pub fn spatial_bounds(&self) -> Result<Option<BoundingBox>> {
        let pop_id = self.id;
        self.run(move |guard| {
            let WorldCore {
                populations,
                agents,
                ..
            } = &mut guard.state;
            let population = populations
                .get_mut(&pop_id)
                .ok_or(SimError::DeadPopulation)?;
            if let Some(cached) = population.bounds_cache {
                return Ok(cached);
            }
            let mut bounds: Option<BoundingBox> = None;
            for agent_id in &population.members {
                if let Some(agent) = agents.get(agent_id) {
                    let agent_bounds = agent.track.bounding_box();
                    bounds = Some(match bounds {
                        Some(current) => current.union(&agent_bounds),
                        None => agent_bounds,
                    });
                }
            }
            population.bounds_cache = Some(bounds);
            Ok(bounds)
        })
    }

    /// Kills every agent and detaches from the environment. Terminal
    /// and idempotent.
    pub fn kill(&self) -> Result<()> {
        let pop_id = self.id;
        let result = self.run(move |guard| {
            kill_population_locked(guard, pop_id);
            Ok(())
        });
        match result {
            Err(SimError::DeadPopulation) => Ok(()),
            other => other,
        }
    }

    /// Handles to the current members, in join order.
    pub fn agents(&self) -> Result<Vec<Agent>> {
        let pop_id = self.id;
        self.run(move |guard| {
            let population = guard
                .state
                .populations
                .get(&pop_id)
                .ok_or(SimError::DeadPopulation)?;
            Ok(population
                .members
                .iter()
                .filter_map(|agent_id| {
                    guard
                        .state
                        .agents
                        .get(agent_id)
                        .map(|core| Agent::from_parts(*agent_id, Arc::clone(&core.cell)))
                })
                .collect())
        })
    }

    pub fn agent_count(&self) -> Result<usize> {
        let pop_id = self.id;
        self.run(move |guard| {
            Ok(guard
                .state
                .populations
                .get(&pop_id)
                .map_or(0, |population| population.members.len()))
        })
    }

    /// Overrides the default heading perturbation bound, radians.
    pub fn set_heading_jitter(&self, jitter: f64) -> Result<()> {
        let pop_id = self.id;
        self.run(move |guard| {
            let population = guard
                .state
                .populations
                .get_mut(&pop_id)
                .ok_or(SimError::DeadPopulation)?;
            population.heading_jitter = jitter.abs();
            Ok(())
        })
    }

    /// Registers a population-level listener; an empty `kinds` slice
    /// subscribes to every kind.
    pub fn add_listener(
        &self,
        kinds: &[EventKind],
        callback: impl Fn(&SimEvent) + Send + Sync + 'static,
    ) -> Result<ListenerId> {
        let pop_id = self.id;
        self.run(move |guard| {
            let population = guard
                .state
                .populations
                .get_mut(&pop_id)
                .ok_or(SimError::DeadPopulation)?;
            Ok(population.listeners.add(kinds, callback))
        })
    }

    pub fn remove_listener(&self, id: ListenerId) -> Result<bool> {
        let pop_id = self.id;
        self.run(move |guard| {
            let population = guard
                .state
                .populations
                .get_mut(&pop_id)
                .ok_or(SimError::DeadPopulation)?;
            Ok(population.listeners.remove(id))
        })
    }
}
