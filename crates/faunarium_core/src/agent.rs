//! Agents: mobile entities owning a relative clock, a track and an
//! observation buffer.

use crate::clock::{RelativeClock, SimClock};
use crate::dispatch::Guarded;
use crate::error::{Result, SimError};
use crate::events::{EventKind, ListenerId, SimEvent};
use crate::observations::StepObservations;
use crate::population::Population;
use crate::species::Species;
use crate::world::{emit_agent, emit_population, with_member, MemberCell, WorldCore};
use chrono::{DateTime, Duration, Utc};
use faunarium_data::{AgentId, Position};
use std::sync::Arc;

/// Handle to one agent. Clones share identity; the agent is alive while
/// it belongs to a population, dead forever after `kill()`.
#[derive(Clone)]
pub struct Agent {
    id: AgentId,
    cell: Arc<MemberCell>,
}

impl Agent {
    pub(crate) fn from_parts(id: AgentId, cell: Arc<MemberCell>) -> Self {
        Self { id, cell }
    }

    #[must_use]
    pub fn id(&self) -> AgentId {
        self.id
    }

    fn run<R>(&self, f: impl FnOnce(&mut Guarded<WorldCore>) -> Result<R>) -> Result<R> {
        let id = self.id;
        with_member(
            &self.cell,
            move |core: &WorldCore| core.agents.contains_key(&id),
            || SimError::DeadAgent,
            f,
        )
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.run(|_| Ok(())).is_ok()
    }

    /// The owning population, while alive.
    pub fn population(&self) -> Result<Population> {
        let id = self.id;
        self.run(move |guard| {
            let agent = guard.state.agents.get(&id).ok_or(SimError::DeadAgent)?;
            let population = guard
                .state
                .populations
                .get(&agent.population)
                .ok_or(SimError::DeadAgent)?;
            Ok(Population::from_parts(
                agent.population,
                Arc::clone(&population.cell),
            ))
        })
    }

    pub fn species(&self) -> Result<Arc<Species>> {
        let id = self.id;
        self.run(move |guard| {
            let agent = guard.state.agents.get(&id).ok_or(SimError::DeadAgent)?;
            Ok(Arc::clone(&agent.species))
        })
    }

    /// The agent's relative clock: step 0 is the step it was spawned
    /// on.
    pub fn clock(&self) -> Result<RelativeClock> {
        let id = self.id;
        self.run(move |guard| {
            let agent = guard.state.agents.get(&id).ok_or(SimError::DeadAgent)?;
            Ok(agent.clock.clone())
        })
    }

    /// Elapsed simulated lifetime.
    pub fn age(&self) -> Result<Duration> {
        Ok(self.clock()?.age())
    }

    /// Completed steps on this agent's own timeline.
    pub fn current_step(&self) -> Result<u64> {
        Ok(self.clock()?.current_step())
    }

    pub fn current_location(&self) -> Result<Position> {
        let id = self.id;
        self.run(move |guard| {
            let agent = guard.state.agents.get(&id).ok_or(SimError::DeadAgent)?;
            Ok(agent.track.current_location())
        })
    }

    pub fn current_heading(&self) -> Result<f64> {
        let id = self.id;
        self.run(move |guard| {
            let agent = guard.state.agents.get(&id).ok_or(SimError::DeadAgent)?;
            Ok(agent.track.current_heading())
        })
    }

    /// Moves this agent into `target`, which must belong to the same
    /// environment. A no-op with zero notifications when the agent is
    /// already a member; otherwise fires `PopulationChanged`, then
    /// `AgentRemoved` on the old population, then `AgentAdded` on the
    /// new one.
    pub fn migrate(&self, target: &Population) -> Result<()> {
        let id = self.id;
        let target_id = target.id();
        let target_cell = Arc::clone(target.cell());
        self.run(move |guard| {
            let agent = guard.state.agents.get_mut(&id).ok_or(SimError::DeadAgent)?;
            let from = agent.population;
            if from == target_id {
                return Ok(());
            }
            if !guard.state.populations.contains_key(&target_id) {
                // Not in this environment: dead, or owned by another.
                return if target_cell.get().is_none() {
                    Err(SimError::DeadPopulation)
                } else {
                    Err(SimError::CrossEnvironment)
                };
            }

            if let Some(old) = guard.state.populations.get_mut(&from) {
                old.members.retain(|member| *member != id);
                old.bounds_cache = None;
            }
            let new = guard
                .state
                .populations
                .get_mut(&target_id)
                .ok_or(SimError::DeadPopulation)?;
            new.members.push(id);
            new.bounds_cache = None;
            if let Some(agent) = guard.state.agents.get_mut(&id) {
                agent.population = target_id;
            }

            emit_agent(
                guard,
                id,
                SimEvent::PopulationChanged {
                    agent: id,
                    from,
                    to: target_id,
                },
            );
            emit_population(
                guard,
                from,
                SimEvent::AgentRemoved {
                    population: from,
                    agent: id,
                },
            );
            emit_population(
                guard,
                target_id,
                SimEvent::AgentAdded {
                    population: target_id,
                    agent: id,
                },
            );
            Ok(())
        })
    }

    /// Swaps the species. Allowed if and only if the new species'
    /// ordered parameter list equals the current one by value, so the
    /// stored record layout keeps its meaning. Fires `SpeciesChanged`.
    pub fn metamorphose(&self, new_species: Arc<Species>) -> Result<()> {
        let id = self.id;
        self.run(move |guard| {
            let agent = guard.state.agents.get_mut(&id).ok_or(SimError::DeadAgent)?;
            if !agent.species.layout_compatible(&new_species) {
                return Err(SimError::incompatible_species(format!(
                    "parameter layout of {:?} does not match {:?}",
                    new_species.name("en"),
                    agent.species.name("en"),
                )));
            }
            agent.species = new_species;
            emit_agent(guard, id, SimEvent::SpeciesChanged { agent: id });
            Ok(())
        })
    }

    /// Samples every observed parameter at the current position and
    /// perception area and stores the step's reduced record. The
    /// heading parameter is skipped: its data lives in the track.
    pub fn observe(&self) -> Result<()> {
        let id = self.id;
        self.run(move |guard| {
            let agent = guard.state.agents.get_mut(&id).ok_or(SimError::DeadAgent)?;
            let species = Arc::clone(&agent.species);
            let step = agent.clock.current_step();
            let position = agent.track.current_location();
            let heading = agent.track.current_heading();
            let area = species.perception_at(position, heading);

            let mut record = vec![0.0f32; species.reduced_record_width()];
            for (index, parameter) in species.parameters().iter().enumerate() {
                let Some(offset) = species.stored_offset(index) else {
                    continue;
                };
                let Some(sampler) = parameter.sampler() else {
                    continue;
                };
                let mut sample = sampler.sample(id, position, &area);
                if sample.len() != parameter.sample_width() {
                    tracing::warn!(
                        parameter = parameter.name(),
                        got = sample.len(),
                        expected = parameter.sample_width(),
                        "coverage sample width mismatch"
                    );
                    sample.resize(parameter.sample_width(), 0.0);
                }
                record[offset..offset + sample.len()].copy_from_slice(&sample);
            }
            agent.buffer.write_record(step, &record);
            Ok(())
        })
    }

    /// Reconstructs the observations for the step containing `date` on
    /// this agent's timeline. `Ok(None)` when the date is out of the
    /// clock's window or the step was never observed. The heading
    /// parameter's cells (heading and ground speed) and the location
    /// are read from the track, never from the stored buffer. The whole
    /// read runs under the environment lock, so a record being written
    /// for the in-progress step is never observed half-done.
    pub fn observations_at(&self, date: DateTime<Utc>) -> Result<Option<StepObservations>> {
        let id = self.id;
        self.run(move |guard| {
            let agent = guard.state.agents.get(&id).ok_or(SimError::DeadAgent)?;
            let Some(step) = agent.clock.step_for_date(date) else {
                return Ok(None);
            };
            if step >= agent.buffer.record_count() {
                return Ok(None);
            }
            let species = Arc::clone(&agent.species);

            let mut values = vec![0.0f32; species.record_width()];
            if species.reduced_record_width() > 0 {
                let Some(stored) = agent.buffer.record(step) else {
                    return Ok(None);
                };
                for (index, parameter) in species.parameters().iter().enumerate() {
                    if let Some(offset) = species.stored_offset(index) {
                        let width = parameter.sample_width();
                        let start = species.offsets()[index];
                        values[start..start + width]
                            .copy_from_slice(&stored[offset..offset + width]);
                    }
                }
            }

            let heading = agent
                .track
                .heading_at(step)
                .unwrap_or_else(|| agent.track.current_heading());
            let location = agent
                .track
                .location_at(step)
                .unwrap_or_else(|| agent.track.current_location());
            if let Some(heading_index) = species.heading_index() {
                let start = species.offsets()[heading_index];
                values[start] = heading as f32;
                let step_seconds =
                    agent.clock.step_duration().num_milliseconds() as f64 / 1000.0;
                let speed = if step == 0 || step_seconds <= 0.0 {
                    0.0
                } else {
                    match (
                        agent.track.location_at(step - 1),
                        agent.track.location_at(step),
                    ) {
                        (Some(previous), Some(current)) => {
                            previous.distance_to(current) / step_seconds
                        }
                        _ => 0.0,
                    }
                };
                values[start + 1] = speed as f32;
            }

            Ok(Some(StepObservations::new(
                step,
                agent.clock.date_at(step),
                location,
                heading,
                values,
                species,
            )))
        })
    }

    /// Kills the agent: removed from its population, cell cleared,
    /// `AgentKilled` then `AgentRemoved` fired. Terminal and
    /// idempotent.
    pub fn kill(&self) -> Result<()> {
        let id = self.id;
        let result = self.run(move |guard| {
            let Some(agent) = guard.state.agents.remove(&id) else {
                return Err(SimError::DeadAgent);
            };
            agent.cell.clear();
            let from = agent.population;
            if let Some(population) = guard.state.populations.get_mut(&from) {
                population.members.retain(|member| *member != id);
                population.bounds_cache = None;
            }
            let killed = SimEvent::AgentKilled { agent: id };
            let listeners = agent.listeners.matching(&killed);
            crate::world::defer_notifications(guard, listeners, &killed);
            emit_population(
                guard,
                from,
                SimEvent::AgentRemoved {
                    population: from,
                    agent: id,
                },
            );
            Ok(())
        });
        match result {
            Err(SimError::DeadAgent) => Ok(()),
            other => other,
        }
    }

    /// Registers an agent-level listener; an empty `kinds` slice
    /// subscribes to every kind.
    pub fn add_listener(
        &self,
        kinds: &[EventKind],
        callback: impl Fn(&SimEvent) + Send + Sync + 'static,
    ) -> Result<ListenerId> {
        let id = self.id;
        self.run(move |guard| {
            let agent = guard.state.agents.get_mut(&id).ok_or(SimError::DeadAgent)?;
            Ok(agent.listeners.add(kinds, callback))
        })
    }

    pub fn remove_listener(&self, id: ListenerId) -> Result<bool> {
        let agent_id = self.id;
        self.run(move |guard| {
            let agent = guard
                .state
                .agents
                .get_mut(&agent_id)
                .ok_or(SimError::DeadAgent)?;
            Ok(agent.listeners.remove(id))
        })
    }
}
