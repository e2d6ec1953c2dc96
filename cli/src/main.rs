use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use dynatable_schema::{SchemaStore, default_header};
use dynatable_server::{ServerConfig, init_logging};
use dynatable_sqlite::{Migration, RecordQuery};

const PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_CONFIG_PATH: &str = "dynatable.yml";

#[derive(Debug, Parser)]
#[command(name = "dynatable")]
#[command(about = "Schema-driven SQLite tables behind a REST API")]
#[command(version = PACKAGE_VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server.
    Serve(ServeArgs),
    /// Reconcile the database with the schema file.
    Migrate(MigrateArgs),
    /// List live tables and their columns.
    Tables(TablesArgs),
    /// Write a configuration file with default values.
    InitConfig(InitConfigArgs),
}

/// Options shared by every command that touches the database.
#[derive(Debug, Args)]
struct ConfigArgs {
    /// Configuration file; defaults apply when it does not exist.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Database file path (overrides the configuration).
    #[arg(long)]
    database: Option<PathBuf>,
    /// Schema file path (overrides the configuration).
    #[arg(long)]
    schema: Option<PathBuf>,
}

impl ConfigArgs {
    fn load(&self) -> Result<ServerConfig, String> {
        let mut config = ServerConfig::load_or_default(&self.config)
            .map_err(|e| format!("Failed to load config '{}': {e}", self.config.display()))?;
        if let Some(database) = &self.database {
            config.database = database.clone();
        }
        if let Some(schema) = &self.schema {
            config.schema = schema.clone();
        }
        Ok(config)
    }
}

#[derive(Debug, Args)]
struct ServeArgs {
    #[command(flatten)]
    config: ConfigArgs,
    /// Socket address to listen on (overrides the configuration).
    #[arg(long)]
    listen: Option<String>,
}

#[derive(Debug, Args)]
struct MigrateArgs {
    #[command(subcommand)]
    operation: MigrateOperation,
}

#[derive(Debug, Subcommand)]
enum MigrateOperation {
    /// Create declared tables that are missing from the database.
    Up(MigrateUpArgs),
    /// Show drift between the schema file and the database.
    Status(MigrateStatusArgs),
}

#[derive(Debug, Args)]
struct MigrateUpArgs {
    #[command(flatten)]
    config: ConfigArgs,
    /// Also drop live tables the schema does not declare.
    #[arg(long)]
    prune: bool,
}

#[derive(Debug, Args)]
struct MigrateStatusArgs {
    #[command(flatten)]
    config: ConfigArgs,
    /// Print the status as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct TablesArgs {
    #[command(flatten)]
    config: ConfigArgs,
    /// Print the tables as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct InitConfigArgs {
    /// Output path.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    output: PathBuf,
    /// Overwrite an existing file.
    #[arg(long)]
    force: bool,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Serve(args) => run_serve(args),
        Command::Migrate(args) => run_migrate(args),
        Command::Tables(args) => run_tables(args),
        Command::InitConfig(args) => run_init_config(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run_serve(args: ServeArgs) -> Result<(), String> {
    let mut config = args.config.load()?;
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    init_logging(&config.log_level);

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to start async runtime: {e}"))?;
    runtime
        .block_on(dynatable_server::serve(config))
        .map_err(|e| format!("Server failed: {e}"))
}

fn run_migrate(args: MigrateArgs) -> Result<(), String> {
    match args.operation {
        MigrateOperation::Up(a) => run_migrate_up(a),
        MigrateOperation::Status(a) => run_migrate_status(a),
    }
}

fn open_database(path: &Path) -> Result<rusqlite::Connection, String> {
    rusqlite::Connection::open(path)
        .map_err(|e| format!("Failed to open database '{}': {e}", path.display()))
}

fn open_schema(config: &ServerConfig) -> Result<(SchemaStore, String), String> {
    let store = SchemaStore::new(&config.schema);
    store
        .init(&default_header(&config.database_url()))
        .map_err(|e| format!("Failed to create schema '{}': {e}", config.schema.display()))?;
    let text = store
        .read_text()
        .map_err(|e| format!("Failed to read schema '{}': {e}", config.schema.display()))?;
    Ok((store, text))
}

fn run_migrate_up(args: MigrateUpArgs) -> Result<(), String> {
    let config = args.config.load()?;
    init_logging(&config.log_level);
    let (store, text) = open_schema(&config)?;
    let doc = store
        .load()
        .map_err(|e| format!("Failed to parse schema '{}': {e}", config.schema.display()))?;

    let conn = open_database(&config.database)?;
    let mut migration = Migration::new(&conn)
        .map_err(|e| format!("Failed to initialize migration: {e}"))?
        .with_system_tables(config.system_tables.iter().cloned());
    migration
        .up()
        .map_err(|e| format!("Migration up failed: {e}"))?;
    let report = migration
        .sync(&doc, &text, args.prune)
        .map_err(|e| format!("Migration up failed: {e}"))?;

    println!("Migration up complete for '{}':", config.database.display());
    println!("  Tables created: {}", report.created.len());
    for name in &report.created {
        println!("    + {name}");
    }
    if args.prune {
        println!("  Tables dropped: {}", report.dropped.len());
        for name in &report.dropped {
            println!("    - {name}");
        }
    }
    Ok(())
}

fn run_migrate_status(args: MigrateStatusArgs) -> Result<(), String> {
    let config = args.config.load()?;
    let (store, _) = open_schema(&config)?;
    let doc = store
        .load()
        .map_err(|e| format!("Failed to parse schema '{}': {e}", config.schema.display()))?;

    let conn = open_database(&config.database)?;
    let migration = Migration::new(&conn)
        .map_err(|e| format!("Failed to initialize migration: {e}"))?
        .with_system_tables(config.system_tables.iter().cloned());
    let status = migration
        .status(&doc)
        .map_err(|e| format!("Failed to get migration status: {e}"))?;

    if args.json {
        let json = serde_json::to_string_pretty(&status)
            .map_err(|e| format!("Failed to serialize status: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    println!("Migration Status:");
    println!("  History table exists: {}", status.history_exists);
    println!("  Applied migrations: {}", status.applied_count);
    println!("  Pending tables: {}", format_names(&status.pending));
    println!("  Orphaned tables: {}", format_names(&status.orphaned));
    println!(
        "  In sync: {}",
        if status.is_in_sync() { "yes" } else { "no" }
    );
    Ok(())
}

fn run_tables(args: TablesArgs) -> Result<(), String> {
    let config = args.config.load()?;
    let conn = open_database(&config.database)?;
    let tables = RecordQuery::new(&conn)
        .with_system_tables(config.system_tables.iter().cloned())
        .list_tables()
        .map_err(|e| format!("Failed to list tables: {e}"))?;

    if args.json {
        let json = serde_json::to_string_pretty(&tables)
            .map_err(|e| format!("Failed to serialize tables: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    if tables.is_empty() {
        println!("No tables.");
        return Ok(());
    }
    for table in &tables {
        println!("{}", table.name);
        for column in &table.columns {
            let mut flags = Vec::new();
            if column.pk {
                flags.push("primary key");
            }
            if column.notnull {
                flags.push("not null");
            }
            if flags.is_empty() {
                println!("  {} {}", column.name, column.column_type);
            } else {
                println!("  {} {} ({})", column.name, column.column_type, flags.join(", "));
            }
        }
    }
    Ok(())
}

fn run_init_config(args: InitConfigArgs) -> Result<(), String> {
    if args.output.exists() && !args.force {
        return Err(format!(
            "'{}' already exists (use --force to overwrite)",
            args.output.display()
        ));
    }
    ServerConfig::default()
        .save(&args.output)
        .map_err(|e| format!("Failed to write config '{}': {e}", args.output.display()))?;
    println!("Wrote default configuration to '{}'.", args.output.display());
    Ok(())
}

fn format_names(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}
