use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

use lifegrid::config::Config;
use lifegrid::db::Store;
use lifegrid::grid::{format_percentage, Grid};
use lifegrid::{html, server, Error, Mood, Settings, WeekEdit};

#[derive(Parser, Debug)]
#[command(name = "lifegrid")]
#[command(about = "Map a lifetime as a grid of weeks and keep notes on each one")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// SQLite database file (default: $LIFEGRID_DB or lifegrid.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the web server (default)
    Serve {
        /// Port to listen on (default: $LIFEGRID_PORT or 8080)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Save birth date and life expectancy, replacing any previous settings
    Init {
        /// Date of birth (YYYY-MM-DD)
        #[arg(long)]
        dob: NaiveDate,

        /// Life expectancy in years (50-120)
        #[arg(long, default_value_t = lifegrid::types::DEFAULT_LIFE_EXPECTANCY)]
        life_expectancy: u32,

        /// Display name
        #[arg(long)]
        name: Option<String>,
    },

    /// Print the saved settings as JSON
    Settings,

    /// Print life progress and mood counts
    Stats,

    /// Print one week of the grid as JSON
    Cell {
        /// Week index, starting at 0 for the week of birth
        index: u32,
    },

    /// Edit a week; only the given fields change
    Edit {
        /// Week index, starting at 0 for the week of birth
        index: u32,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        #[arg(long, value_enum)]
        mood: Option<Mood>,

        /// Hex color, e.g. #ff8800
        #[arg(long)]
        color: Option<String>,
    },

    /// Print all saved weeks as JSON
    Weeks,

    /// Generate a static HTML page of the grid (no server)
    Build {
        /// Output file
        #[arg(short, long, default_value = "index.html")]
        output: PathBuf,
    },
}

fn init_tracing(log_level: &str) {
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    for directive in ["hyper=warn", "tower_http=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_max_level(Level::TRACE)
        .init();
}

fn require_settings(store: &Store) -> Result<Settings> {
    store
        .get_settings()?
        .ok_or(Error::MissingSettings)
        .context("Run `lifegrid init --dob YYYY-MM-DD` first")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(&args.log_level);

    let mut config = Config::from_env()?;
    if let Some(db) = args.db {
        config.db_path = db;
    }

    let store = Store::open(&config.db_path)
        .with_context(|| format!("Failed to open {}", config.db_path.display()))?;
    let now = Local::now().naive_local();

    match args.command {
        // Default to serve if no command specified
        None => {
            server::serve(config.port, store).await?;
        }
        Some(Commands::Serve { port }) => {
            server::serve(port.unwrap_or(config.port), store).await?;
        }
        Some(Commands::Init {
            dob,
            life_expectancy,
            name,
        }) => {
            let settings = store.put_settings(Settings::new(dob, life_expectancy, name))?;
            info!(
                dob = %settings.dob,
                years = settings.life_expectancy_years,
                weeks = lifegrid::grid::total_weeks(&settings),
                "Settings saved"
            );
        }
        Some(Commands::Settings) => {
            let settings = store.get_settings()?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        Some(Commands::Stats) => {
            let settings = require_settings(&store)?;
            let records = store.list_week_records()?;
            let grid = Grid::new(&settings, &records, now);
            let stats = grid.progress();

            println!(
                "{} lived ({} / {} weeks, {} left)",
                format_percentage(stats.percent_lived),
                stats.weeks_lived,
                stats.total_weeks,
                stats.weeks_remaining
            );
            println!("{} weeks recorded", store.count_week_records()?);
            for (mood, count) in stats.moods.non_empty() {
                println!("  {:<9} {}", mood.label(), count);
            }
        }
        Some(Commands::Cell { index }) => {
            let settings = require_settings(&store)?;
            let records = store.list_week_records()?;
            let grid = Grid::new(&settings, &records, now);
            let cell = grid.cell_at(index)?;
            println!("{}", serde_json::to_string_pretty(&cell)?);
        }
        Some(Commands::Edit {
            index,
            title,
            notes,
            mood,
            color,
        }) => {
            let settings = require_settings(&store)?;
            let records = store.list_week_records()?;
            let grid = Grid::new(&settings, &records, now);

            let envelope = grid.envelope(index)?;
            let mut record = store
                .get_week_record(&envelope.id)?
                .unwrap_or(envelope);
            record.week_index = index;
            record.apply_patch(WeekEdit {
                title,
                notes,
                mood,
                color,
            });

            let saved = store.put_week_record(record)?;
            info!(
                id = %saved.id,
                week_index = saved.week_index,
                has_data = saved.has_data(),
                "Week saved"
            );
        }
        Some(Commands::Weeks) => {
            let mut records = store.list_week_records()?;
            records.sort_by_key(|r| r.week_index);
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Some(Commands::Build { output }) => {
            let settings = require_settings(&store)?;
            let records = store.list_week_records()?;
            html::generate_html(&settings, &records, now, &output)?;
            info!(path = %output.display(), "HTML saved");
        }
    }

    Ok(())
}
