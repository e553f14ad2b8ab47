use anyhow::{anyhow, Context, Result};
use match_schema::{
    cli::{Cli, Commands},
    config::resolve_database_path,
    schema::Schema,
    store::{generate_schema, schema_gen::generate_statements, Store},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8) -> Result<()> {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // Logs go to stderr so DDL and JSON on stdout stay pipeable
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|e| anyhow!("unable to init tracing_subscriber: {e}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose)?;

    // An inconsistent schema is a programming error: refuse to start
    let schema = Arc::new(Schema::standard().context("Invalid schema definition")?);

    match cli.command {
        Commands::Init { db, force } => {
            let start = Instant::now();
            let db_path = resolve_database_path(db)?;

            Store::create(&db_path, Arc::clone(&schema), force)
                .with_context(|| format!("Failed to create database {:?}", db_path))?;

            info!(elapsed_ms = start.elapsed().as_millis() as u64, "database ready");
            println!(
                "Created {:?} with {} tables",
                db_path,
                schema.tables().len()
            );
        }

        Commands::Ddl { include } => match include {
            Some(include_list) => {
                let refs: Vec<&str> = include_list.iter().map(|s| s.as_str()).collect();
                let tables = schema.with_dependencies(&refs)?;
                for stmt in generate_statements(&tables) {
                    println!("{};\n", stmt);
                }
            }
            None => print!("{}", generate_schema(&schema)),
        },

        Commands::Graph => {
            let json = serde_json::to_string_pretty(schema.as_ref())
                .context("Failed to serialize schema graph")?;
            println!("{}", json);
        }

        Commands::ListTables => {
            println!("Tables (dependency order):\n");
            for name in schema.table_names() {
                println!("  {}", name);
            }
        }
    }

    Ok(())
}
