use clap::{Parser, Subcommand};
use kaamconnect_matcher::store::Fixture;
use kaamconnect_matcher::{Coordinates, DistanceUnit, JobId, MatcherConfig, MatchingEngine, SqliteStore, WorkerId};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "matcher-cli")]
#[command(about = "KaamConnect Matcher CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database path (overrides config and DB_PATH)
    #[arg(short, long)]
    db: Option<String>,

    /// YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Recommend open jobs for a worker
    Recommend {
        worker_id: i64,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Find jobs similar to a job
    Similar {
        job_id: i64,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Open jobs near a point
    Nearby {
        #[arg(allow_hyphen_values = true)]
        latitude: f64,

        #[arg(allow_hyphen_values = true)]
        longitude: f64,

        /// Radius in km (or miles with --miles)
        #[arg(short, long)]
        radius: Option<f64>,

        #[arg(short, long)]
        limit: Option<usize>,

        /// Radius and distances in miles
        #[arg(long)]
        miles: bool,
    },

    /// Suggest skills for a worker from a partial name
    SuggestSkills { worker_id: i64, query: String },

    /// Most used job tags
    TopSkills {
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Load jobs, skills and applications from a JSON file
    Import { file: PathBuf },

    /// Database statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => MatcherConfig::load(path)?,
        None => MatcherConfig::from_env()?,
    };
    if let Some(db) = cli.db {
        config.database_path = db;
    }

    let store = Arc::new(SqliteStore::new(&config.database_path).await?);
    let engine = MatchingEngine::with_sqlite(store.clone(), config.clone());

    match cli.command {
        Commands::Recommend { worker_id, limit } => {
            let limit = limit.unwrap_or(config.ranking.default_top_n);
            println!("🔍 Recommendations for worker {}", worker_id);

            let outcome = engine.get_job_recommendations(WorkerId(worker_id), limit).await?;
            if let Some(reason) = outcome.reason() {
                println!("⚠️  Ranking degraded: {}", reason);
            }
            if outcome.is_empty() {
                println!("   (no open jobs)");
            }
            for (i, rec) in outcome.as_slice().iter().enumerate() {
                println!("   {}. [{}] {} - {:.3}", i + 1, rec.job.id, rec.job.title, rec.score);
                if !rec.matching_skills.is_empty() {
                    println!("      skills: {}", rec.matching_skills.join(", "));
                }
            }
        }

        Commands::Similar { job_id, limit } => {
            let limit = limit.unwrap_or(config.ranking.similar_limit);
            println!("🔗 Jobs similar to {}", job_id);

            let outcome = engine.get_similar_jobs(JobId(job_id), limit).await?;
            if let Some(reason) = outcome.reason() {
                println!("⚠️  Ranking degraded: {}", reason);
            }
            for (i, similar) in outcome.as_slice().iter().enumerate() {
                println!("   {}. [{}] {} - {:.3}", i + 1, similar.job.id, similar.job.title, similar.score);
            }
        }

        Commands::Nearby { latitude, longitude, radius, limit, miles } => {
            let unit = if miles { DistanceUnit::Miles } else { DistanceUnit::Kilometers };
            let radius_km = radius
                .map(|r| unit.to_km(r))
                .unwrap_or(config.location.default_radius_km);
            let limit = limit.unwrap_or(config.location.default_limit);
            let center = Coordinates::new(latitude, longitude)?;
            println!(
                "📍 Jobs within {:.1} {} of ({}, {})",
                unit.from_km(radius_km),
                unit.abbreviation(),
                latitude,
                longitude
            );

            let nearby = engine.nearby_jobs(center, radius_km, limit).await?;
            for (i, n) in nearby.iter().enumerate() {
                println!(
                    "   {}. [{}] {} - {:.2} {}",
                    i + 1,
                    n.job.id,
                    n.job.title,
                    n.distance_in(unit),
                    unit.abbreviation()
                );
            }
        }


        Commands::SuggestSkills { worker_id, query } => {
            let suggestions = engine.suggest_skills(WorkerId(worker_id), &query).await?;
            println!("💡 Suggestions for '{}':", query);
            for s in suggestions {
                println!("   {} ({} jobs)", s.skill, s.popularity);
            }
        }

        Commands::TopSkills { limit } => {
            let limit = limit.unwrap_or(config.skills.top_limit);
            println!("🏆 Top skills:");
            for (i, tag) in engine.top_skills(limit).await?.iter().enumerate() {
                println!("   {}. {} ({})", i + 1, tag.tag, tag.count);
            }
        }

        Commands::Import { file } => {
            println!("📥 Importing {}", file.display());

            let json = std::fs::read_to_string(&file)?;
            let summary = store.import(&Fixture::from_json(&json)?).await?;

            println!("✅ Jobs: {}", summary.jobs);
            println!("   Skills: {} ({} already present)", summary.skills, summary.skipped_skills);
            println!("   Applications: {}", summary.applications);
        }

        Commands::Stats => {
            let stats = store.stats().await?;

            println!("📊 Database Statistics:");
            println!("   Total jobs: {}", stats.total_jobs);
            println!("   Open jobs: {}", stats.open_jobs);
            println!("   Workers with skills: {}", stats.workers_with_skills);
            println!("   Applications: {}", stats.applications);
        }
    }

    Ok(())
}
