use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "match-schema")]
#[command(version, about = "Schema and integrity rules for the match tracker database")]
pub struct Cli {
    /// Log more (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a SQLite database with every table
    Init {
        /// Database path (default: the user data directory)
        #[arg(long, env = "MATCH_SCHEMA_DB")]
        db: Option<PathBuf>,

        /// Replace an existing database
        #[arg(short, long)]
        force: bool,
    },

    /// Print the CREATE TABLE statements
    Ddl {
        /// Only these tables and the tables they reference (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        include: Option<Vec<String>>,
    },

    /// Print the schema graph as JSON
    Graph,

    /// List all table names in dependency order
    ListTables,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
