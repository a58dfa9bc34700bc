//! refledger - repository and ref ledger store
//!
//! This is the main entry point for the refledger command-line interface.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use refledger::catalog::{Hash, Repository, RepositoryStatus};
use refledger::db::{Database, DatabaseConfig, DatabaseResult};

#[derive(Debug, Parser)]
#[command(name = "refledger", version, about = "Git-backed store for repository records and refs")]
struct Cli {
    /// Path to the database directory.
    #[arg(
        short,
        long,
        env = "REFLEDGER_DATABASE",
        default_value = ".refledger",
        global = true
    )]
    database: PathBuf,

    #[command(flatten)]
    log: LogArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct LogArgs {
    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbose mode (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbosity: u8,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Repository records.
    #[command(subcommand)]
    Repo(RepoCommand),

    /// Refs of a repository.
    #[command(subcommand)]
    Ref(RefCommand),

    /// Show committed transactions, newest first.
    Log {
        /// Maximum number of commits to show.
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Show database statistics.
    Stats,
}

#[derive(Debug, Subcommand)]
enum RepoCommand {
    /// Create or overwrite a repository record.
    Put {
        name: String,
        /// pending, active or a numeric status code
        #[arg(long, default_value = "pending")]
        status: RepositoryStatus,
        /// Hex hash of the transaction that allocated the name.
        #[arg(long = "tx", default_value_t = Hash::EMPTY)]
        name_allocation_tx: Hash,
    },
    /// Show a repository record.
    Get { name: String },
    /// List repository names.
    List {
        /// Only repositories in the pending state.
        #[arg(long)]
        pending: bool,
    },
}

#[derive(Debug, Subcommand)]
enum RefCommand {
    /// Create or overwrite a ref.
    Put {
        repository: String,
        name: String,
        hash: Hash,
    },
    /// Show a ref (all zeros when unset).
    Get { repository: String, name: String },
    /// List the refs of a repository.
    List { repository: String },
}

fn init_logging(args: &LogArgs) {
    let filter = if args.quiet {
        EnvFilter::new("error")
    } else {
        let level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log);

    let config = DatabaseConfig::new(&cli.database).create_if_missing(true);

    let db = match Database::open_with_config(config) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Error opening database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&db, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(db: &Database, command: Command) -> DatabaseResult<()> {
    match command {
        Command::Repo(RepoCommand::Put {
            name,
            status,
            name_allocation_tx,
        }) => {
            let repository = Repository::new(name, status, name_allocation_tx);
            db.repositories().put_repository(&repository)?;
            println!("{}", repository);
        }
        Command::Repo(RepoCommand::Get { name }) => match db.repositories().get_repository(&name)? {
            Some(repository) => println!("{}", repository),
            None => println!("(not found)"),
        },
        Command::Repo(RepoCommand::List { pending }) => {
            let names = if pending {
                db.repositories().list_pending_repositories()?
            } else {
                db.repositories().list_repositories()?
            };
            print_names(&names);
        }
        Command::Ref(RefCommand::Put {
            repository,
            name,
            hash,
        }) => {
            db.refs().put_ref(&repository, &name, hash)?;
            println!("{}/{} -> {}", repository, name, hash);
        }
        Command::Ref(RefCommand::Get { repository, name }) => {
            println!("{}", db.refs().get_ref(&repository, &name)?);
        }
        Command::Ref(RefCommand::List { repository }) => {
            print_names(&db.refs().list_refs(&repository)?);
        }
        Command::Log { limit } => {
            for commit in db.history(limit)? {
                println!(
                    "{} {} {}",
                    commit.id.short(),
                    commit.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    commit.summary()
                );
            }
        }
        Command::Stats => {
            println!("{}", db.stats()?);
        }
    }
    Ok(())
}

fn print_names(names: &[String]) {
    for name in names {
        println!("{}", name);
    }
    println!("({} total)", names.len());
}
