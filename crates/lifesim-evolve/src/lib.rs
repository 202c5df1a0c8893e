//! Evolutionary search over life-allocation strategies.
//!
//! A [`Evolution`] driver owns a ranked population of simulated agents, each
//! carrying a full-horizon [`Genome`]. Every generation it pairs ranked
//! neighbors, splices their genomes, perturbs the occasional gene, re-runs
//! the children through fresh simulations, and keeps the fittest
//! `population_size` individuals from the merged pool (elitist truncation).

use lifesim_core::{ConfigError, Genome, LifeConfig, RunReport, Simulation};
use rand::{Rng, RngCore, SeedableRng, rngs::SmallRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised when configuring or seeding the driver.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvolutionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid driver configuration: {0}")]
    InvalidDriver(&'static str),
}

/// Where to cut parent genomes during crossover.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SplitPolicy {
    /// Cut at `periods / 2`, scaling with the horizon.
    #[default]
    Midpoint,
    /// Cut at a caller-chosen index, validated to lie inside the horizon.
    Fixed(usize),
}

impl SplitPolicy {
    /// Resolve the split index for a given horizon length.
    #[must_use]
    pub fn split_index(&self, periods: u32) -> usize {
        match *self {
            Self::Midpoint => (periods / 2).max(1) as usize,
            Self::Fixed(index) => index,
        }
    }
}

/// Driver parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvolutionConfig {
    /// Number of individuals retained after each generation.
    pub population_size: usize,
    /// Number of generations to run.
    pub generations: u32,
    /// Probability that a bred child receives a single-gene perturbation.
    pub mutation_rate: f64,
    /// Crossover split policy.
    pub split_policy: SplitPolicy,
    /// Seed for the driver's master RNG; `None` draws one from entropy.
    pub rng_seed: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            generations: 50,
            mutation_rate: 0.1,
            split_policy: SplitPolicy::Midpoint,
            rng_seed: None,
        }
    }
}

impl EvolutionConfig {
    /// Validates driver parameters against the simulation horizon.
    pub fn validate(&self, periods: u32) -> Result<(), EvolutionError> {
        if self.population_size < 2 {
            return Err(EvolutionError::InvalidDriver(
                "population_size must be at least 2",
            ));
        }
        if self.generations == 0 {
            return Err(EvolutionError::InvalidDriver(
                "generations must be non-zero",
            ));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(EvolutionError::InvalidDriver(
                "mutation_rate must be in [0, 1]",
            ));
        }
        if let SplitPolicy::Fixed(index) = self.split_policy {
            if index == 0 || index >= periods as usize {
                return Err(EvolutionError::InvalidDriver(
                    "fixed split index must lie inside the horizon",
                ));
            }
        }
        Ok(())
    }

    fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}

/// One evaluated member of the population: a genome plus the final state of
/// the run that scored it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Individual {
    pub genome: Genome,
    pub report: RunReport,
}

impl Individual {
    /// Cumulative life enjoyment; the optimization target.
    #[must_use]
    pub fn fitness(&self) -> f64 {
        self.report.life_enjoyment
    }
}

/// Observable per-generation output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GenerationSummary {
    pub generation: u32,
    pub best_fitness: f64,
    pub mean_fitness: f64,
    pub population: usize,
}

/// Splice two parent genomes at `split`, producing the two mirror children.
#[must_use]
pub fn crossover(a: &Genome, b: &Genome, split: usize) -> (Genome, Genome) {
    debug_assert_eq!(a.len(), b.len());
    let cut = split.min(a.len());
    let first = a.choices()[..cut]
        .iter()
        .chain(&b.choices()[cut..])
        .copied()
        .collect();
    let second = b.choices()[..cut]
        .iter()
        .chain(&a.choices()[cut..])
        .copied()
        .collect();
    (Genome::new(first), Genome::new(second))
}

/// Perturb one uniformly chosen gene in place.
///
/// Each of the three ratio fields independently moves by
/// `value * magnitude` with the sign drawn uniformly from {-1, 0, +1}.
/// This can push ratios outside `[0, 1]`; the simulation tolerates the
/// drift by design, so no clamping happens here.
pub fn mutate_gene(genome: &mut Genome, rng: &mut dyn RngCore) {
    if genome.is_empty() {
        return;
    }
    let index = rng.random_range(0..genome.len());
    let choice = &mut genome.choices_mut()[index];
    for field in [
        &mut choice.money_spent_ratio,
        &mut choice.health_investment_ratio,
        &mut choice.life_investment_ratio,
    ] {
        let sign = f64::from(rng.random_range(-1..=1));
        let magnitude: f64 = rng.random_range(0.0..1.0);
        *field += sign * *field * magnitude;
    }
}

/// Population-based search driver.
#[derive(Debug)]
pub struct Evolution {
    life: LifeConfig,
    config: EvolutionConfig,
    rng: SmallRng,
    population: Vec<Individual>,
    history: Vec<GenerationSummary>,
    generation: u32,
}

impl Evolution {
    /// Build and evaluate the root generation.
    pub fn new(life: LifeConfig, config: EvolutionConfig) -> Result<Self, EvolutionError> {
        life.validate()?;
        config.validate(life.periods)?;

        let mut rng = config.seeded_rng();
        let seeds: Vec<u64> = (0..config.population_size)
            .map(|_| rng.random())
            .collect();
        let population = seeds
            .into_par_iter()
            .map(|seed| {
                let run_config = LifeConfig {
                    rng_seed: Some(seed),
                    ..life.clone()
                };
                let mut simulation = Simulation::new(run_config)?;
                let report = simulation.run();
                Ok(Individual {
                    genome: simulation.into_genome(),
                    report,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let mut driver = Self {
            life,
            config,
            rng,
            population,
            history: Vec::new(),
            generation: 0,
        };
        driver.rank();
        debug!(
            population = driver.population.len(),
            best = driver.best().fitness(),
            "Seeded root generation"
        );
        Ok(driver)
    }

    /// Stable descending sort by fitness; equal scores keep their prior
    /// relative order, so incumbents win ties against newcomers.
    fn rank(&mut self) {
        self.population
            .sort_by(|a, b| b.fitness().total_cmp(&a.fitness()));
    }

    /// Breed, mutate, re-evaluate, and truncate one generation.
    pub fn step_generation(&mut self) -> Result<GenerationSummary, EvolutionError> {
        let split = self.config.split_policy.split_index(self.life.periods);

        // Consecutive ranked pairs (0,1), (2,3), ...; an odd trailing
        // individual sits this round out.
        let mut child_genomes = Vec::with_capacity(self.population.len());
        for pair in self.population.chunks_exact(2) {
            let (first, second) = crossover(&pair[0].genome, &pair[1].genome, split);
            child_genomes.push(first);
            child_genomes.push(second);
        }

        // All randomness is drawn sequentially from the master stream before
        // the parallel evaluation, keeping runs reproducible under rayon.
        let mut jobs = Vec::with_capacity(child_genomes.len());
        for mut genome in child_genomes {
            if self.rng.random_range(0.0..1.0) < self.config.mutation_rate {
                mutate_gene(&mut genome, &mut self.rng);
            }
            let seed: u64 = self.rng.random();
            jobs.push((genome, seed));
        }

        let children = jobs
            .into_par_iter()
            .map(|(genome, seed)| {
                let run_config = LifeConfig {
                    rng_seed: Some(seed),
                    ..self.life.clone()
                };
                let mut simulation = Simulation::with_genome(run_config, genome)?;
                let report = simulation.run();
                Ok(Individual {
                    genome: simulation.into_genome(),
                    report,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        // Elitist truncation over the merged pool; parents come first so the
        // stable sort favors them on exact ties.
        self.population.extend(children);
        self.rank();
        self.population.truncate(self.config.population_size);

        self.generation += 1;
        let summary = self.summarize();
        info!(
            generation = summary.generation,
            best = summary.best_fitness,
            mean = summary.mean_fitness,
            "Generation complete"
        );
        self.history.push(summary);
        Ok(summary)
    }

    /// Run the configured number of generations, returning the history.
    pub fn run(&mut self) -> Result<&[GenerationSummary], EvolutionError> {
        for _ in 0..self.config.generations {
            self.step_generation()?;
        }
        Ok(&self.history)
    }

    fn summarize(&self) -> GenerationSummary {
        let population = self.population.len();
        let total: f64 = self.population.iter().map(Individual::fitness).sum();
        GenerationSummary {
            generation: self.generation,
            best_fitness: self.best().fitness(),
            mean_fitness: if population > 0 {
                total / population as f64
            } else {
                0.0
            },
            population,
        }
    }

    /// The fittest individual currently in the population.
    #[must_use]
    pub fn best(&self) -> &Individual {
        &self.population[0]
    }

    /// The full population, ranked by fitness descending.
    #[must_use]
    pub fn population(&self) -> &[Individual] {
        &self.population
    }

    /// Per-generation summaries recorded so far.
    #[must_use]
    pub fn history(&self) -> &[GenerationSummary] {
        &self.history
    }

    /// Completed generation count.
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}
