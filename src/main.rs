use anyhow::Result;
use clap::Parser;
use faunarium_lib::config::AppConfig;
use faunarium_lib::driver::Simulation;
use faunarium_io::InMemoryRegistry;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom config file path
    #[arg(short, long, default_value = "faunarium.toml")]
    config: String,

    /// Override the configured number of steps
    #[arg(long)]
    steps: Option<u64>,

    /// Override the configured RNG seed
    #[arg(long)]
    seed: Option<u64>,

    /// Log filter directive (e.g. "debug"); overrides RUST_LOG
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    match &args.log_level {
        Some(directive) => faunarium_core::init_logging_with(directive),
        None => faunarium_core::init_logging(),
    }

    let mut config = AppConfig::load(&args.config)?;
    if let Some(steps) = args.steps {
        config.run.steps = steps;
    }
    if let Some(seed) = args.seed {
        config.run.seed = Some(seed);
    }
    config.validate()?;

    let registry = InMemoryRegistry::new();
    let mut simulation = Simulation::build(&config)?;
    if config.registry.teardown {
        simulation.register_handles(&registry).await?;
    }

    simulation.run(config.run.steps)?;
    simulation.shutdown(&registry).await;
    Ok(())
}
