//! Assembles a simulation from configuration and runs it.

use crate::config::AppConfig;
use chrono::{Duration, Utc};
use faunarium_core::{
    Agent, Environment, MasterClock, Parameter, Population, Species, UniformSampler,
};
use faunarium_data::{Color, Ellipse, Position};
use faunarium_io::{retire_handle, HandleId, HandleRegistry, TeardownOutcome};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Spacing of initial population centers, meters.
const POPULATION_SPACING: f64 = 500.0;
/// Radius agents start within around their population center.
const SPAWN_RADIUS: f64 = 50.0;

/// Built-in species for the driver: two observed parameters plus the
/// heading.
fn default_species() -> anyhow::Result<Arc<Species>> {
    Ok(Arc::new(Species::new(
        BTreeMap::from([
            ("en".to_string(), "grey drifter".to_string()),
            ("de".to_string(), "grauer treiber".to_string()),
        ]),
        Color::new(110, 110, 140),
        vec![
            Parameter::observed("depth", 3, Arc::new(UniformSampler::new(35.0, 3)))?,
            Parameter::heading("heading"),
            Parameter::observed("temperature", 1, Arc::new(UniformSampler::new(11.5, 1)))?,
        ],
        Ellipse::new(120.0, 45.0),
        2.5,
    )?))
}

/// One configured run: the environment, its populations and agents, and
/// the registry handle of every agent.
pub struct Simulation {
    environment: Environment,
    populations: Vec<Population>,
    agents: Vec<Agent>,
    handles: HashMap<HandleId, Agent>,
    step_duration: Duration,
}

impl Simulation {
    /// Builds clock, environment, populations and agents from `config`.
    pub fn build(config: &AppConfig) -> anyhow::Result<Self> {
        let step_duration = Duration::seconds(config.run.step_seconds);
        let start = Utc::now();
        let end = start
            + Duration::seconds(config.run.step_seconds * config.run.steps as i64);
        let clock = MasterClock::new(start, end, step_duration)?;

        let seed = config.run.seed.unwrap_or_else(rand::random);
        tracing::info!(seed, steps = config.run.steps, "building simulation");
        let environment = Environment::with_seed(clock, seed);
        let mut placement = ChaCha8Rng::seed_from_u64(seed ^ 0x9e37_79b9);

        let species = default_species()?;
        let mut populations = Vec::with_capacity(config.population.count);
        let mut agents = Vec::new();
        for p in 0..config.population.count {
            let population = environment.create_population()?;
            population.set_heading_jitter(config.population.heading_jitter)?;
            let center = Position::new(p as f64 * POPULATION_SPACING, 0.0);
            for _ in 0..config.population.agents {
                let offset = Position::new(
                    placement.gen_range(-SPAWN_RADIUS..=SPAWN_RADIUS),
                    placement.gen_range(-SPAWN_RADIUS..=SPAWN_RADIUS),
                );
                let agent = population.spawn(
                    Arc::clone(&species),
                    Position::new(center.x + offset.x, center.y + offset.y),
                )?;
                agents.push(agent);
            }
            populations.push(population);
        }

        Ok(Self {
            environment,
            populations,
            agents,
            handles: HashMap::new(),
            step_duration,
        })
    }

    #[must_use]
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    #[must_use]
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Registers one network handle per agent.
    pub async fn register_handles(
        &mut self,
        registry: &dyn HandleRegistry,
    ) -> anyhow::Result<()> {
        for agent in &self.agents {
            let handle = HandleId::new();
            registry.register(handle).await?;
            self.handles.insert(handle, agent.clone());
        }
        tracing::info!(count = self.handles.len(), "registered agent handles");
        Ok(())
    }

    /// Runs `steps` simulation steps: move every population, record
    /// every agent's observations, advance the clock.
    pub fn run(&self, steps: u64) -> anyhow::Result<()> {
        for _ in 0..steps {
            for population in &self.populations {
                population.evoluate(self.step_duration)?;
            }
            for agent in &self.agents {
                agent.observe()?;
            }
            let step = self.environment.advance_step()?;
            tracing::debug!(step, "step complete");
        }
        tracing::info!(
            steps,
            date = %self.environment.current_date(),
            "run complete"
        );
        Ok(())
    }

    /// Retires every registered handle, then disposes the environment.
    /// Abandoned handles are counted, not fatal.
    pub async fn shutdown(&mut self, registry: &dyn HandleRegistry) {
        let mut abandoned = 0usize;
        for (handle, _) in self.handles.drain() {
            if retire_handle(registry, handle).await == TeardownOutcome::Abandoned {
                abandoned += 1;
            }
        }
        if abandoned > 0 {
            tracing::warn!(abandoned, "some handles could not be deregistered");
        }
        self.environment.dispose();
    }
}
