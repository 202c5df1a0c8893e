//! Core simulation model for the life-allocation game.
//!
//! One [`Simulation`] plays a single agent through a fixed number of periods.
//! Each period the agent harvests a stochastic field, then splits a chosen
//! fraction of its money between health investment and life-enjoyment
//! investment. The cumulative life enjoyment at the end of the horizon is the
//! fitness signal consumed by the evolutionary driver.

use rand::{Rng, RngCore, SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when validating configuration before a run starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("choice count {actual} does not match period count {expected}")]
    GenomeLengthMismatch { expected: usize, actual: usize },
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// One gene: the allocation decision for a single period.
///
/// Ratios are conceptually in `[0, 1]` but are never hard-clamped; mutation in
/// the evolutionary driver may push them out of range and the simulation
/// tolerates that, clamping only health and money.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Choice {
    /// Fraction of current money allocated to spending this period.
    pub money_spent_ratio: f64,
    /// Fraction of the spent money allocated to health investment.
    pub health_investment_ratio: f64,
    /// Fraction of the spent money allocated to life-enjoyment investment.
    /// Carried for symmetry; the simulation always derives the life
    /// investment as `spending - health_investment`.
    pub life_investment_ratio: f64,
}

impl Choice {
    /// Draw a fresh in-range allocation decision.
    #[must_use]
    pub fn random(rng: &mut dyn RngCore) -> Self {
        let money_spent_ratio = rng.random_range(0.0..1.0);
        let health_investment_ratio = rng.random_range(0.0..1.0);
        Self {
            money_spent_ratio,
            health_investment_ratio,
            life_investment_ratio: 1.0 - health_investment_ratio,
        }
    }
}

/// Ordered sequence of per-period allocation decisions for one agent.
///
/// Invariant: the length must equal the horizon of any simulation that
/// consumes it; a mismatch is a fatal [`ConfigError::GenomeLengthMismatch`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Genome {
    choices: Vec<Choice>,
}

impl Genome {
    /// Wrap an existing choice sequence.
    #[must_use]
    pub fn new(choices: Vec<Choice>) -> Self {
        Self { choices }
    }

    /// Draw a full-horizon genome of random choices.
    #[must_use]
    pub fn random(periods: u32, rng: &mut dyn RngCore) -> Self {
        let choices = (0..periods).map(|_| Choice::random(rng)).collect();
        Self { choices }
    }

    /// Number of genes (periods covered).
    #[must_use]
    pub fn len(&self) -> usize {
        self.choices.len()
    }

    /// Returns true when no genes are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    /// Immutable access to the gene sequence.
    #[must_use]
    pub fn choices(&self) -> &[Choice] {
        &self.choices
    }

    /// Mutable access to the gene sequence (used by genetic operators).
    #[must_use]
    pub fn choices_mut(&mut self) -> &mut [Choice] {
        &mut self.choices
    }

    fn push(&mut self, choice: Choice) {
        self.choices.push(choice);
    }
}

/// Construction parameters for a single simulation run.
///
/// Defaults mirror the reference scenario: a ten-period horizon starting at
/// health 70 over a 10x10 field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LifeConfig {
    /// Horizon length in periods.
    pub periods: u32,
    /// Starting health, in `(0, 100]`.
    pub initial_health: f64,
    /// Starting money.
    pub initial_money: f64,
    /// Field rows (`m`).
    pub field_rows: u32,
    /// Field columns (`n`).
    pub field_cols: u32,
    /// Nominal number of harvest points scattered across the field (`t`).
    pub harvest_points: u32,
    /// Money value of one successful harvest cell (`v`).
    pub harvest_unit_value: f64,
    /// Harvest-capacity sensitivity to health deficit (`gamma`).
    pub gamma: f64,
    /// Health-regeneration sensitivity to investment (`k`).
    pub health_regen_k: f64,
    /// Life-enjoyment utility scale (`c`).
    pub enjoyment_c: f64,
    /// Life-enjoyment utility half-saturation point (`alpha`).
    pub enjoyment_alpha: f64,
    /// Flat health toll paid per harvest.
    pub harvest_base_toll: f64,
    /// Additional health toll per harvest, scaled by the period index.
    pub harvest_period_toll: f64,
    /// Seed applied to the run's private RNG; `None` draws one from entropy.
    pub rng_seed: Option<u64>,
}

impl Default for LifeConfig {
    fn default() -> Self {
        Self {
            periods: 10,
            initial_health: 70.0,
            initial_money: 0.0,
            field_rows: 10,
            field_cols: 10,
            harvest_points: 100,
            harvest_unit_value: 1.0,
            gamma: 1.0,
            health_regen_k: 0.01021,
            enjoyment_c: 464.53,
            enjoyment_alpha: 32.0,
            harvest_base_toll: 1.0,
            harvest_period_toll: 0.5,
            rng_seed: None,
        }
    }
}

impl LifeConfig {
    /// Validates the configuration before any simulation runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.periods == 0 {
            return Err(ConfigError::InvalidConfig("periods must be non-zero"));
        }
        if self.field_rows == 0 || self.field_cols == 0 {
            return Err(ConfigError::InvalidConfig(
                "field dimensions must be non-zero",
            ));
        }
        if !(self.initial_health > 0.0 && self.initial_health <= 100.0) {
            return Err(ConfigError::InvalidConfig(
                "initial_health must be in (0, 100]",
            ));
        }
        if self.initial_money < 0.0 {
            return Err(ConfigError::InvalidConfig(
                "initial_money must be non-negative",
            ));
        }
        if self.harvest_unit_value < 0.0 {
            return Err(ConfigError::InvalidConfig(
                "harvest_unit_value must be non-negative",
            ));
        }
        if self.harvest_base_toll < 0.0 || self.harvest_period_toll < 0.0 {
            return Err(ConfigError::InvalidConfig(
                "harvest tolls must be non-negative",
            ));
        }
        if self.enjoyment_alpha <= 0.0 {
            return Err(ConfigError::InvalidConfig(
                "enjoyment_alpha must be positive",
            ));
        }
        Ok(())
    }

    /// Returns the configured RNG seed, generating one from entropy if absent.
    #[must_use]
    pub fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}

/// Stochastic boolean harvest field, row-major.
///
/// Each cell is an independent Bernoulli draw at `p = t / (m * n)`. This
/// approximates scattering exactly `t` points without replacement; the
/// realized count routinely deviates from `t` and that is never an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestField {
    rows: u32,
    cols: u32,
    cells: Vec<bool>,
}

impl HarvestField {
    /// Sample a fresh field from the configured dimensions and point count.
    #[must_use]
    pub fn sample(config: &LifeConfig, rng: &mut dyn RngCore) -> Self {
        let rows = config.field_rows;
        let cols = config.field_cols;
        let total = (rows as usize) * (cols as usize);
        let p = (f64::from(config.harvest_points) / total as f64).clamp(0.0, 1.0);
        let cells = (0..total).map(|_| rng.random_range(0.0..1.0) < p).collect();
        Self { rows, cols, cells }
    }

    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    #[must_use]
    pub const fn cols(&self) -> u32 {
        self.cols
    }

    /// Count the harvestable cells within the first `limit` rows.
    #[must_use]
    pub fn hits_in_rows(&self, limit: u32) -> u32 {
        let limit = limit.min(self.rows) as usize;
        let span = limit * self.cols as usize;
        self.cells[..span].iter().filter(|&&cell| cell).count() as u32
    }
}

/// Health increment produced by investing `investment` at health `health`.
///
/// The formula has a fixed point at health 100: plugging `health == 100`
/// yields an increment of exactly 0 for any investment. When `e^(k*I)`
/// overflows, the logistic ratio saturates at 1 and health moves to 100.
#[must_use]
pub fn regen_increment(k: f64, health: f64, investment: f64) -> f64 {
    if health <= 0.0 {
        return 0.0;
    }
    let e_ki = (k * investment).exp();
    let ratio = if e_ki.is_finite() {
        e_ki / (e_ki + (100.0 - health) / health)
    } else {
        1.0
    };
    100.0 * ratio - health
}

/// Enjoyment gained by investing `investment` at health `health`.
///
/// Concave in the investment (diminishing returns), scaled linearly by the
/// health fraction; zero health yields zero enjoyment regardless of spend.
#[must_use]
pub fn enjoyment_gain(c: f64, alpha: f64, health: f64, investment: f64) -> f64 {
    if health <= 0.0 {
        return 0.0;
    }
    c * (health / 100.0) * (investment / (investment + alpha))
}

/// Lifecycle of one simulation run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    NotStarted,
    Running,
    Done,
}

/// Final observable state of a completed run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub periods: u32,
    pub health: f64,
    pub money: f64,
    pub life_enjoyment: f64,
}

/// One agent's run through the fixed horizon.
///
/// Deterministic given a fixed genome and RNG seed. In self-directed mode
/// (no genome supplied) the realized random ratios are recorded back into
/// the genome so the run is replayable.
#[derive(Debug, Clone)]
pub struct Simulation {
    config: LifeConfig,
    genome: Genome,
    self_directed: bool,
    field_rng: SmallRng,
    choice_rng: SmallRng,
    period: u32,
    health: f64,
    money: f64,
    life_enjoyment: f64,
    phase: RunPhase,
}

impl Simulation {
    /// Construct a self-directed simulation that draws its own choices.
    pub fn new(config: LifeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_parts(config, Genome::default(), true))
    }

    /// Construct a simulation replaying the supplied genome.
    pub fn with_genome(config: LifeConfig, genome: Genome) -> Result<Self, ConfigError> {
        config.validate()?;
        if genome.len() != config.periods as usize {
            return Err(ConfigError::GenomeLengthMismatch {
                expected: config.periods as usize,
                actual: genome.len(),
            });
        }
        Ok(Self::from_parts(config, genome, false))
    }

    fn from_parts(config: LifeConfig, genome: Genome, self_directed: bool) -> Self {
        // Field and choice draws come from independent streams so that a
        // self-directed run replayed through its recorded genome sees the
        // exact same sequence of fields.
        let mut seeder = config.seeded_rng();
        let field_rng = SmallRng::seed_from_u64(seeder.next_u64());
        let choice_rng = SmallRng::seed_from_u64(seeder.next_u64());
        Self {
            health: config.initial_health,
            money: config.initial_money,
            life_enjoyment: 0.0,
            period: 0,
            phase: RunPhase::NotStarted,
            field_rng,
            choice_rng,
            genome,
            self_directed,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &LifeConfig {
        &self.config
    }

    #[must_use]
    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    /// Consume the simulation, yielding its genome.
    #[must_use]
    pub fn into_genome(self) -> Genome {
        self.genome
    }

    #[must_use]
    pub const fn period(&self) -> u32 {
        self.period
    }

    #[must_use]
    pub const fn health(&self) -> f64 {
        self.health
    }

    #[must_use]
    pub const fn money(&self) -> f64 {
        self.money
    }

    /// Cumulative life enjoyment; the fitness signal.
    #[must_use]
    pub const fn life_enjoyment(&self) -> f64 {
        self.life_enjoyment
    }

    #[must_use]
    pub const fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Play a single period, returning the phase after the transition.
    ///
    /// Calling this once the run reached [`RunPhase::Done`] applies no
    /// further effects.
    pub fn step(&mut self) -> RunPhase {
        if self.phase == RunPhase::Done {
            return self.phase;
        }
        self.phase = RunPhase::Running;
        self.step_period();
        if self.period >= self.config.periods {
            self.phase = RunPhase::Done;
        }
        self.phase
    }

    /// Play every remaining period and return the final report.
    ///
    /// Re-invoking after the run reached [`RunPhase::Done`] is a no-op that
    /// returns the existing result unchanged.
    pub fn run(&mut self) -> RunReport {
        while self.step() != RunPhase::Done {}
        self.report()
    }

    /// Snapshot of the current observable state.
    #[must_use]
    pub fn report(&self) -> RunReport {
        RunReport {
            periods: self.period,
            health: self.health,
            money: self.money,
            life_enjoyment: self.life_enjoyment,
        }
    }

    fn step_period(&mut self) {
        self.harvest();

        let choice = if self.self_directed {
            let drawn = Choice::random(&mut self.choice_rng);
            self.genome.push(drawn);
            drawn
        } else {
            self.genome.choices()[self.period as usize]
        };

        let spending = self.money * choice.money_spent_ratio;
        let health_investment = spending * choice.health_investment_ratio;
        let life_investment = spending - health_investment;

        self.regen_health(health_investment);
        self.generate_life_enjoyment(life_investment);

        self.period += 1;
    }

    /// Number of field rows reachable at the current health.
    fn harvest_rows(&self) -> u32 {
        let capacity = 1.0 - self.config.gamma * (100.0 - self.health) / 100.0;
        let rows = (f64::from(self.config.field_cols) * capacity).floor();
        rows.clamp(0.0, f64::from(self.config.field_rows)) as u32
    }

    /// Harvest a fresh field: yield is added to money, and the labor toll is
    /// taken out of health.
    fn harvest(&mut self) -> f64 {
        let field = HarvestField::sample(&self.config, &mut self.field_rng);
        let hits = field.hits_in_rows(self.harvest_rows());
        let harvested = f64::from(hits) * self.config.harvest_unit_value;
        self.set_money(self.money + harvested);

        let toll =
            self.config.harvest_base_toll + self.config.harvest_period_toll * f64::from(self.period);
        self.set_health(self.health - toll);
        harvested
    }

    /// Invest in health: logistic regeneration toward 100.
    ///
    /// At health 0 the formula is undefined (division by health), so health
    /// stays frozen at 0 no matter the investment. The money is still spent.
    fn regen_health(&mut self, investment: f64) {
        self.set_money(self.money - investment);
        let increment = regen_increment(self.config.health_regen_k, self.health, investment);
        if increment.is_finite() {
            self.set_health(self.health + increment);
        }
    }

    /// Invest in life enjoyment: concave utility scaled by health.
    fn generate_life_enjoyment(&mut self, investment: f64) {
        self.set_money(self.money - investment);
        let gain = enjoyment_gain(
            self.config.enjoyment_c,
            self.config.enjoyment_alpha,
            self.health,
            investment,
        );
        if gain.is_finite() {
            self.life_enjoyment += gain;
        }
    }

    /// Assign health, flooring at zero. Returns the clamped value.
    fn set_health(&mut self, value: f64) -> f64 {
        self.health = value.max(0.0);
        self.health
    }

    /// Assign money, flooring at zero. Returns the clamped value.
    fn set_money(&mut self, value: f64) -> f64 {
        self.money = value.max(0.0);
        self.money
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_config(seed: u64) -> LifeConfig {
        LifeConfig {
            rng_seed: Some(seed),
            ..LifeConfig::default()
        }
    }

    #[test]
    fn default_config_validates() {
        assert_eq!(LifeConfig::default().validate(), Ok(()));
    }

    #[test]
    fn zero_periods_rejected() {
        let config = LifeConfig {
            periods: 0,
            ..LifeConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn genome_length_mismatch_is_fatal() {
        let config = seeded_config(1);
        let mut rng = SmallRng::seed_from_u64(7);
        let genome = Genome::random(3, &mut rng);
        let err = Simulation::with_genome(config, genome).unwrap_err();
        assert_eq!(
            err,
            ConfigError::GenomeLengthMismatch {
                expected: 10,
                actual: 3,
            }
        );
    }

    #[test]
    fn field_saturates_when_points_cover_every_cell() {
        let config = seeded_config(2);
        let mut rng = config.seeded_rng();
        let field = HarvestField::sample(&config, &mut rng);
        assert_eq!(field.hits_in_rows(field.rows()), 100);
    }

    #[test]
    fn empty_field_when_no_points() {
        let config = LifeConfig {
            harvest_points: 0,
            ..seeded_config(3)
        };
        let mut rng = config.seeded_rng();
        let field = HarvestField::sample(&config, &mut rng);
        assert_eq!(field.hits_in_rows(field.rows()), 0);
    }

    #[test]
    fn regen_fixed_point_at_full_health() {
        for investment in [0.0, 1.0, 50.0, 1_000.0] {
            let increment = regen_increment(0.01021, 100.0, investment);
            assert!(
                increment.abs() < 1e-9,
                "increment {increment} at investment {investment}"
            );
        }
    }

    #[test]
    fn regen_survives_overflowing_investment() {
        let increment = regen_increment(0.01021, 50.0, f64::MAX / 2.0);
        assert!(increment.is_finite());
        assert!((increment - 50.0).abs() < 1e-9);
    }

    #[test]
    fn enjoyment_is_monotone_in_investment() {
        let mut previous = -1.0;
        for step in 0..200 {
            let investment = f64::from(step) * 2.5;
            let gain = enjoyment_gain(464.53, 32.0, 70.0, investment);
            assert!(gain >= previous, "gain dipped at investment {investment}");
            previous = gain;
        }
    }

    #[test]
    fn enjoyment_zero_at_zero_health() {
        assert_eq!(enjoyment_gain(464.53, 32.0, 0.0, 1_000.0), 0.0);
    }

    #[test]
    fn run_is_deterministic_for_fixed_seed_and_genome() {
        let mut rng = SmallRng::seed_from_u64(11);
        let genome = Genome::random(10, &mut rng);

        let config = seeded_config(42);
        let mut first = Simulation::with_genome(config.clone(), genome.clone()).unwrap();
        let mut second = Simulation::with_genome(config, genome).unwrap();
        let a = first.run();
        let b = second.run();
        assert_eq!(a.life_enjoyment.to_bits(), b.life_enjoyment.to_bits());
        assert_eq!(a, b);
    }

    #[test]
    fn rerunning_after_done_changes_nothing() {
        let mut simulation = Simulation::new(seeded_config(5)).unwrap();
        let first = simulation.run();
        assert_eq!(simulation.phase(), RunPhase::Done);
        let second = simulation.run();
        assert_eq!(first, second);
        assert_eq!(simulation.genome().len(), 10);
    }

    #[test]
    fn self_directed_run_is_replayable_through_recorded_genome() {
        let mut original = Simulation::new(seeded_config(17)).unwrap();
        let report = original.run();

        let replay_config = seeded_config(17);
        let mut replay =
            Simulation::with_genome(replay_config, original.genome().clone()).unwrap();
        let replayed = replay.run();
        assert_eq!(report.life_enjoyment.to_bits(), replayed.life_enjoyment.to_bits());
    }

    #[test]
    fn health_and_money_never_negative() {
        // Out-of-range ratios after mutation must be tolerated, with clamps
        // applied to money and health only.
        let hostile = Genome::new(vec![
            Choice {
                money_spent_ratio: 3.5,
                health_investment_ratio: -1.2,
                life_investment_ratio: 2.2,
            };
            10
        ]);
        let mut simulation = Simulation::with_genome(seeded_config(23), hostile).unwrap();
        while simulation.phase() != RunPhase::Done {
            simulation.step();
            assert!(simulation.health() >= 0.0);
            assert!(simulation.money() >= 0.0);
            assert!(simulation.life_enjoyment().is_finite());
        }
    }

    #[test]
    fn zero_health_freezes_regen_and_enjoyment() {
        // A crushing first-period toll drives health straight to the floor.
        let config = LifeConfig {
            harvest_base_toll: 500.0,
            ..seeded_config(31)
        };
        let genome = Genome::new(vec![
            Choice {
                money_spent_ratio: 1.0,
                health_investment_ratio: 0.5,
                life_investment_ratio: 0.5,
            };
            10
        ]);
        let mut simulation = Simulation::with_genome(config, genome).unwrap();
        let report = simulation.run();
        assert_eq!(report.health, 0.0);
        assert_eq!(report.life_enjoyment, 0.0);
    }

    #[test]
    fn single_period_reference_scenario() {
        let config = LifeConfig {
            periods: 1,
            ..seeded_config(47)
        };
        let genome = Genome::new(vec![Choice {
            money_spent_ratio: 1.0,
            health_investment_ratio: 0.5,
            life_investment_ratio: 0.5,
        }]);
        let mut simulation = Simulation::with_genome(config, genome).unwrap();
        let report = simulation.run();
        assert!(report.life_enjoyment >= 0.0);
        assert!((0.0..=100.0).contains(&report.health));
    }

    #[test]
    fn harvest_rows_shrink_with_health_deficit() {
        let mut healthy = Simulation::new(seeded_config(1)).unwrap();
        healthy.health = 100.0;
        assert_eq!(healthy.harvest_rows(), 10);
        healthy.health = 50.0;
        assert_eq!(healthy.harvest_rows(), 5);
        healthy.health = 0.0;
        assert_eq!(healthy.harvest_rows(), 0);
    }

    #[test]
    fn harvest_rows_clamped_under_aggressive_gamma() {
        let config = LifeConfig {
            gamma: 5.0,
            ..seeded_config(1)
        };
        let mut simulation = Simulation::new(config).unwrap();
        simulation.health = 10.0;
        assert_eq!(simulation.harvest_rows(), 0);
    }
}
