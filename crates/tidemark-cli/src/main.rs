mod connect;
mod logging;
mod report;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tidemark_config::{AppConfig, ConfigLoader};
use tidemark_db::{Dialect, MigrationSet, Migrator, collect};
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "tidemark",
    version,
    about = "Apply, roll back and inspect versioned SQL migrations"
)]
struct Cli {
    /// Config file (YAML or TOML). Defaults to ./tidemark.{yml,yaml,toml}.
    #[arg(long, global = true, env = "TIDEMARK_CONFIG")]
    config: Option<PathBuf>,

    /// SQL dialect: postgres, mysql, sqlite3, redshift, tidb, clickhouse.
    #[arg(long, global = true)]
    dialect: Option<String>,

    /// Connection string; a file path for sqlite3.
    #[arg(long, global = true)]
    database: Option<String>,

    /// Directory holding `<version>_<name>.sql` migrations.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Ledger table name.
    #[arg(long, global = true)]
    table: Option<String>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Apply all pending migrations
    Up,
    /// Apply the next pending migration
    UpByOne,
    /// Apply migrations up to and including VERSION
    UpTo { version: i64 },
    /// Roll back the current migration
    Down,
    /// Roll back migrations until the current version is at most VERSION
    DownTo { version: i64 },
    /// Roll back the current migration and apply it again
    Redo,
    /// Roll back every applied migration
    Reset,
    /// Show applied/pending state of every migration
    Status,
    /// Print the current database version
    Version,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    logging::init(&config.log);

    run(&cli, &config)
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_path(path);
    }
    let mut config = loader.load().context("failed to load config")?;

    if let Some(dialect) = &cli.dialect {
        config.database.dialect = dialect.clone();
    }
    if let Some(database) = &cli.database {
        config.database.dsn = database.clone();
    }
    if let Some(dir) = &cli.dir {
        config.migrations.dir = dir.clone();
    }
    if let Some(table) = &cli.table {
        config.migrations.table = table.clone();
    }
    Ok(config)
}

fn run(cli: &Cli, config: &AppConfig) -> Result<()> {
    let dialect: Dialect = config.database.dialect.parse()?;

    // `version` only reads the ledger and works without a migrations dir.
    let migrations = if cli.command == Command::Version {
        MigrationSet::default()
    } else {
        let m = &config.migrations;
        collect(&m.dir, m.min_version, m.max_version)?
    };
    debug!(
        "{} migrations, dialect {dialect}, ledger {}",
        migrations.len(),
        config.migrations.table
    );

    let conn = connect::open(dialect, &config.database.dsn)?;
    let migrator = Migrator::new(dialect, &config.migrations.table, migrations)?;

    match cli.command {
        Command::Up => report::versions("applied", &migrator.up(&conn)?, cli.json)?,
        Command::UpByOne => {
            let applied: Vec<i64> = migrator.up_by_one(&conn)?.into_iter().collect();
            report::versions("applied", &applied, cli.json)?
        }
        Command::UpTo { version } => {
            report::versions("applied", &migrator.up_to(&conn, version)?, cli.json)?
        }
        Command::Down => report::versions("rolled back", &[migrator.down(&conn)?], cli.json)?,
        Command::DownTo { version } => report::versions(
            "rolled back",
            &migrator.down_to(&conn, version)?,
            cli.json,
        )?,
        Command::Redo => report::versions("redone", &[migrator.redo(&conn)?], cli.json)?,
        Command::Reset => {
            report::versions("rolled back", &migrator.reset(&conn)?, cli.json)?
        }
        Command::Status => report::status(&migrator.status(&conn)?, cli.json)?,
        Command::Version => report::version(migrator.version(&conn)?, cli.json)?,
    }

    Ok(())
}
