use anyhow::Result;
use clap::Parser;
use lifesim_core::LifeConfig;
use lifesim_evolve::{Evolution, EvolutionConfig, SplitPolicy};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "lifesim",
    version,
    about = "Evolve allocation strategies for the life-enjoyment game"
)]
struct Cli {
    /// Individuals retained after each generation.
    #[arg(long, default_value_t = 100)]
    population_size: usize,

    /// Number of generations to run.
    #[arg(long, default_value_t = 50)]
    generations: u32,

    /// Probability that a bred child receives a single-gene perturbation.
    #[arg(long, default_value_t = 0.1)]
    mutation_rate: f64,

    /// Fixed crossover split index; omitted means the horizon midpoint.
    #[arg(long)]
    split: Option<usize>,

    /// Seed for the driver's master RNG stream; every per-individual
    /// simulation seed is derived from it.
    #[arg(long)]
    seed: Option<u64>,

    /// Horizon length in periods.
    #[arg(long, default_value_t = 10)]
    periods: u32,

    /// Starting health, in (0, 100].
    #[arg(long, default_value_t = 70.0)]
    initial_health: f64,

    /// Harvest field rows (m).
    #[arg(long, default_value_t = 10)]
    field_rows: u32,

    /// Harvest field columns (n).
    #[arg(long, default_value_t = 10)]
    field_cols: u32,

    /// Nominal harvest points scattered across the field (t).
    #[arg(long, default_value_t = 100)]
    harvest_points: u32,

    /// Money value of one harvested cell (v).
    #[arg(long, default_value_t = 1.0)]
    harvest_value: f64,

    /// Harvest-capacity sensitivity to health deficit (gamma).
    #[arg(long, default_value_t = 1.0)]
    gamma: f64,

    /// Health-regeneration sensitivity to investment (k).
    #[arg(long, default_value_t = 0.01021)]
    regen_k: f64,

    /// Life-enjoyment utility scale (c).
    #[arg(long, default_value_t = 464.53)]
    enjoyment_c: f64,

    /// Life-enjoyment utility half-saturation point (alpha).
    #[arg(long, default_value_t = 32.0)]
    enjoyment_alpha: f64,

    /// Emit the final ranked population as JSON on stdout.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let life = LifeConfig {
        periods: cli.periods,
        initial_health: cli.initial_health,
        field_rows: cli.field_rows,
        field_cols: cli.field_cols,
        harvest_points: cli.harvest_points,
        harvest_unit_value: cli.harvest_value,
        gamma: cli.gamma,
        health_regen_k: cli.regen_k,
        enjoyment_c: cli.enjoyment_c,
        enjoyment_alpha: cli.enjoyment_alpha,
        ..LifeConfig::default()
    };
    let evo = EvolutionConfig {
        population_size: cli.population_size,
        generations: cli.generations,
        mutation_rate: cli.mutation_rate,
        split_policy: cli.split.map_or(SplitPolicy::Midpoint, SplitPolicy::Fixed),
        rng_seed: cli.seed,
    };

    let mut driver = Evolution::new(life, evo)?;
    info!(
        population = cli.population_size,
        generations = cli.generations,
        root_best = driver.best().fitness(),
        "Starting evolutionary search"
    );
    driver.run()?;

    let best = driver.best();
    info!(
        best_fitness = best.fitness(),
        final_health = best.report.health,
        final_money = best.report.money,
        "Search complete"
    );

    if cli.json {
        println!("{}", serde_json::to_string_pretty(driver.population())?);
    } else {
        println!("best life enjoyment: {:.3}", best.fitness());
        println!(
            "final health: {:.2}, final money: {:.2}",
            best.report.health, best.report.money
        );
        println!("winning allocation per period (spend, to-health):");
        for (period, choice) in best.genome.choices().iter().enumerate() {
            println!(
                "  {period:>3}: spend {:+.3}  health {:+.3}",
                choice.money_spent_ratio, choice.health_investment_ratio
            );
        }
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
