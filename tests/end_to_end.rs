//! Full driver run: build from config, simulate, tear down.

use faunarium_io::InMemoryRegistry;
use faunarium_lib::config::AppConfig;
use faunarium_lib::driver::Simulation;
use faunarium_lib::SimClock;

fn small_config(seed: u64) -> AppConfig {
    let mut config = AppConfig::default();
    config.run.steps = 6;
    config.run.step_seconds = 600;
    config.run.seed = Some(seed);
    config.population.count = 2;
    config.population.agents = 3;
    config
}

#[tokio::test]
async fn configured_run_simulates_and_tears_down() {
    let config = small_config(11);
    let registry = InMemoryRegistry::new();

    let mut simulation = Simulation::build(&config).unwrap();
    simulation.register_handles(&registry).await.unwrap();
    assert_eq!(registry.len(), 6);
    assert_eq!(simulation.agents().len(), 6);

    simulation.run(config.run.steps).unwrap();
    assert_eq!(simulation.environment().current_step(), 6);

    // Every step got observed for every agent.
    let env_clock = simulation.environment().clock();
    for agent in simulation.agents() {
        let observed = agent
            .observations_at(env_clock.date_at(5))
            .unwrap()
            .expect("step 5 observed");
        assert_eq!(observed.step(), 5);
        assert_eq!(
            observed.values().len(),
            agent.species().unwrap().record_width()
        );
    }

    let agent = simulation.agents()[0].clone();
    simulation.shutdown(&registry).await;
    assert!(registry.is_empty());
    assert!(simulation.environment().is_disposed());
    assert!(!agent.is_alive());
}

#[test]
fn identical_seeds_reproduce_trajectories() {
    let config = small_config(99);

    let trajectory = |config: &AppConfig| {
        let simulation = Simulation::build(config).unwrap();
        simulation.run(config.run.steps).unwrap();
        let positions: Vec<_> = simulation
            .agents()
            .iter()
            .map(|agent| agent.current_location().unwrap())
            .collect();
        simulation.environment().dispose();
        positions
    };

    let first = trajectory(&config);
    let second = trajectory(&config);
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert!((a.x - b.x).abs() < 1e-9);
        assert!((a.y - b.y).abs() < 1e-9);
    }
}
