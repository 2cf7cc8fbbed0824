use chrono::{Days, Local};
use clap::Subcommand;
use focusplay_core::Database;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's stats
    Today {
        #[arg(long)]
        project: Option<String>,
    },
    /// All-time stats
    All {
        #[arg(long)]
        project: Option<String>,
    },
    /// Per-day breakdown for the last N days
    Daily {
        #[arg(long)]
        project: Option<String>,
        /// Number of days including today
        #[arg(long, default_value = "7")]
        days: u64,
    },
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        StatsAction::Today { project } => {
            let stats = db.stats_today(project.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        StatsAction::All { project } => {
            let stats = db.stats_all(project.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        StatsAction::Daily { project, days } => {
            let today = Local::now().date_naive();
            let from = today
                .checked_sub_days(Days::new(days.saturating_sub(1)))
                .ok_or("day range out of bounds")?;
            let rows = db.daily_stats(project.as_deref(), from, today)?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }
    Ok(())
}
