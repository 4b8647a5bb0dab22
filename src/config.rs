//! Driver configuration.
//!
//! Strongly-typed structures mapping to `faunarium.toml`. Defaults are
//! hardcoded in the `Default` impls; a config file overrides them and
//! CLI flags override the file.
//!
//! ## Example `faunarium.toml`
//!
//! ```toml
//! [run]
//! steps = 48
//! step_seconds = 1800
//! seed = 42
//!
//! [population]
//! count = 2
//! agents = 5
//! heading_jitter = 0.4
//!
//! [registry]
//! teardown = true
//! ```

use serde::{Deserialize, Serialize};

/// Clock and run-length parameters.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct RunConfig {
    /// Steps to simulate.
    pub steps: u64,
    /// Duration of one step, seconds.
    pub step_seconds: i64,
    /// RNG seed; omit for entropy seeding.
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            steps: 48,
            step_seconds: 1800,
            seed: None,
        }
    }
}

/// Population layout parameters.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PopulationConfig {
    /// Populations to create.
    pub count: usize,
    /// Agents spawned per population.
    pub agents: usize,
    /// Random heading perturbation per movement step, radians.
    pub heading_jitter: f64,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            count: 2,
            agents: 5,
            heading_jitter: 0.4,
        }
    }
}

/// Handle-registry parameters.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct RegistryConfig {
    /// Whether agent handles are registered and retired on shutdown.
    pub teardown: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { teardown: true }
    }
}

/// Top-level driver configuration.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub run: RunConfig,
    pub population: PopulationConfig,
    pub registry: RegistryConfig,
}

impl AppConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.run.steps > 0, "Run length must be positive");
        anyhow::ensure!(
            self.run.step_seconds > 0,
            "Step duration must be positive"
        );
        anyhow::ensure!(
            self.population.count > 0,
            "Population count must be positive"
        );
        anyhow::ensure!(
            self.population.heading_jitter >= 0.0,
            "Heading jitter must be non-negative"
        );
        Ok(())
    }

    /// Loads and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config = toml::from_str::<Self>(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads from `path`, falling back to defaults when the file does
    /// not exist. A file that exists but fails to parse or validate is
    /// an error.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path, "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}
