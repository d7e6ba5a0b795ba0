//! # Seed Data Generator
//!
//! Populates the database with teams and members for development, then
//! exercises paging, slicing and the bulk age update against them.
//!
//! ## Usage
//! ```bash
//! # 2 teams, 100 members (default)
//! cargo run -p roster-db --bin seed
//!
//! # Custom member count
//! cargo run -p roster-db --bin seed -- --count 500
//!
//! # Database path (overrides the config file)
//! cargo run -p roster-db --bin seed -- --db ./data/roster.db
//!
//! # Explicit config file
//! cargo run -p roster-db --bin seed -- --config ./roster.toml
//! ```
//!
//! ## Generated Data
//! - Teams `teamA` and `teamB`
//! - Members `member{N}`, alternating teams, ages cycling 10..=40

use std::env;
use std::path::PathBuf;

use roster_core::{Direction, Member, PageRequest, Sort, Team};
use roster_db::migrations::migration_status;
use roster_db::{Database, RosterConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const TEAM_NAMES: &[&str] = &["teamA", "teamB"];

/// Ages assigned round-robin
const AGES: &[u32] = &[10, 20, 30, 40];

/// Parsed command line.
#[derive(Debug, Default, PartialEq)]
struct SeedArgs {
    count: usize,
    db_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
    help: bool,
    /// Reported once logging is up
    unknown: Vec<String>,
}

fn parse_args(args: &[String]) -> SeedArgs {
    let mut parsed = SeedArgs {
        count: 100,
        ..SeedArgs::default()
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    parsed.count = args[i + 1].parse().unwrap_or(100);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    parsed.db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" => {
                if i + 1 < args.len() {
                    parsed.config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => parsed.help = true,
            other => parsed.unknown.push(other.to_string()),
        }
        i += 1;
    }
    parsed
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let SeedArgs {
        count,
        db_path,
        config_path,
        help,
        unknown,
    } = parse_args(&args);

    if help {
        println!("Roster Seed Data Generator");
        println!();
        println!("Usage: seed [OPTIONS]");
        println!();
        println!("Options:");
        println!("  -c, --count <N>      Number of members to generate (default: 100)");
        println!("  -d, --db <PATH>      Database file path (default: from config)");
        println!("      --config <PATH>  Config file (default: platform config dir)");
        println!("  -h, --help           Show this help message");
        return Ok(());
    }

    let mut config = RosterConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.filter))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    for argument in &unknown {
        warn!(argument = %argument, "Ignoring unknown argument");
    }

    println!("Roster Seed Data Generator");
    println!("==========================");
    println!("Database: {}", config.database.path.display());
    println!("Members:  {}", count);
    println!("Flush:    {}", config.database.flush_mode);
    println!();

    let db = Database::new(config.db_config()).await?;
    println!("✓ Connected to database");

    let (total, applied) = migration_status(db.pool()).await?;
    println!("✓ Migrations applied: {}/{}", applied, total);

    let mut uow = db.begin().await?;

    let existing = db.members().count(&mut uow).await?;
    if existing > 0 {
        println!("⚠ Database already has {} members", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        uow.rollback().await?;
        return Ok(());
    }

    let start = std::time::Instant::now();

    let mut teams = Vec::with_capacity(TEAM_NAMES.len());
    for name in TEAM_NAMES {
        teams.push(db.teams().save(&mut uow, Team::new(*name)?).await?);
    }

    for index in 0..count {
        let team = &mut teams[index % TEAM_NAMES.len()];
        let age = AGES[index % AGES.len()];
        let member = Member::with_team(format!("member{}", index + 1), age, team)?;
        db.members().save(&mut uow, member).await?;

        if (index + 1) % 50 == 0 {
            info!(generated = index + 1, "Seeding members");
        }
    }

    let stats = uow.stats();
    uow.commit().await?;

    let elapsed = start.elapsed();
    println!();
    println!(
        "✓ Generated {} teams and {} members in {:?} ({} statements)",
        teams.len(),
        count,
        elapsed,
        stats.total()
    );

    // Read side
    let mut uow = db.begin().await?;
    let request = PageRequest::of_sorted(0, 3, Sort::by(Direction::Desc, &["username"]))?;

    let page = db.members().find_by_age(&mut uow, AGES[0], &request).await?;
    println!();
    println!(
        "Page of age {}: {} of {} members, {} pages",
        AGES[0],
        page.number_of_elements(),
        page.total_elements(),
        page.total_pages()
    );
    for member in page.content() {
        println!("  {} ({})", member.username(), member.age());
    }

    let slice = db
        .members()
        .find_member_slice_by_age(&mut uow, AGES[0], &request)
        .await?;
    println!(
        "Slice of age {}: {} members, has next: {}",
        AGES[0],
        slice.number_of_elements(),
        slice.has_next()
    );

    let threshold = AGES[AGES.len() - 1];
    let updated = db.members().bulk_age_plus(&mut uow, threshold).await?;
    println!("Bulk age +1 for age >= {}: {} rows", threshold, updated);

    // Demo only; leave the seeded ages untouched
    uow.rollback().await?;

    db.close().await;
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        std::iter::once("seed")
            .chain(values.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_defaults() {
        let parsed = parse_args(&args(&[]));
        assert_eq!(parsed.count, 100);
        assert!(parsed.db_path.is_none());
        assert!(!parsed.help);
    }

    #[test]
    fn test_parse_options() {
        let parsed = parse_args(&args(&["-c", "25", "--db", "./x.db", "--config", "./roster.toml"]));
        assert_eq!(parsed.count, 25);
        assert_eq!(parsed.db_path, Some(PathBuf::from("./x.db")));
        assert_eq!(parsed.config_path, Some(PathBuf::from("./roster.toml")));
    }

    #[test]
    fn test_unknown_arguments_are_kept_for_logging() {
        let parsed = parse_args(&args(&["--verbose", "-c", "5", "extra"]));
        assert_eq!(parsed.count, 5);
        assert_eq!(parsed.unknown, vec!["--verbose".to_string(), "extra".to_string()]);
    }
}
