use lifesim_core::LifeConfig;
use lifesim_evolve::{Evolution, EvolutionConfig, SplitPolicy};

fn seeded_configs() -> (LifeConfig, EvolutionConfig) {
    let life = LifeConfig {
        rng_seed: Some(0xD1CE),
        ..LifeConfig::default()
    };
    let evo = EvolutionConfig {
        population_size: 12,
        generations: 20,
        mutation_rate: 0.15,
        split_policy: SplitPolicy::Midpoint,
        rng_seed: Some(0xCAFE),
    };
    (life, evo)
}

#[test]
fn search_improves_over_the_root_generation() {
    let (life, evo) = seeded_configs();
    let mut driver = Evolution::new(life, evo).expect("driver");
    let root_best = driver.best().fitness();

    let history = driver.run().expect("run").to_vec();
    assert_eq!(history.len(), 20);

    for window in history.windows(2) {
        assert!(
            window[1].best_fitness >= window[0].best_fitness,
            "best fitness regressed between generations {} and {}",
            window[0].generation,
            window[1].generation,
        );
    }

    let final_best = driver.best().fitness();
    assert!(final_best >= root_best);
    assert!(final_best.is_finite());

    // The winning genome must replay to the full horizon.
    assert_eq!(
        driver.best().genome.len(),
        driver.best().report.periods as usize
    );
}

#[test]
fn ranked_population_is_full_and_ordered_at_termination() {
    let (life, evo) = seeded_configs();
    let mut driver = Evolution::new(life, evo).expect("driver");
    driver.run().expect("run");

    let population = driver.population();
    assert_eq!(population.len(), 12);
    for window in population.windows(2) {
        assert!(window[0].fitness() >= window[1].fitness());
    }
    for individual in population {
        assert!(individual.report.health >= 0.0);
        assert!(individual.report.money >= 0.0);
        assert!(individual.fitness() >= 0.0);
    }
}

#[test]
fn fixed_split_policy_runs_to_completion() {
    let (life, mut evo) = seeded_configs();
    evo.split_policy = SplitPolicy::Fixed(3);
    evo.generations = 5;
    let mut driver = Evolution::new(life, evo).expect("driver");
    let history = driver.run().expect("run");
    assert_eq!(history.len(), 5);
}
