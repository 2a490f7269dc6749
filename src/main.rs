use clap::{Parser, Subcommand};
use sealbox::cli::{
    get_entry, list_entries, put_entry, remove_entry, show_info, show_key, sync_entry,
    SyncOptions,
};
use sealbox::{SealboxError, Store, StoreOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Version info from build.rs
const VERSION: &str = env!("SEALBOX_VERSION");
const PROFILE: &str = env!("SEALBOX_PROFILE");
const GIT_HASH: &str = env!("SEALBOX_GIT_HASH");

fn get_version() -> &'static str {
    use std::sync::OnceLock;
    static VERSION_STRING: OnceLock<String> = OnceLock::new();
    VERSION_STRING.get_or_init(|| format!("{} {} ({})", PROFILE, VERSION, GIT_HASH))
}

#[derive(Parser)]
#[command(name = "sealbox")]
#[command(author, about = "Encrypted single-file blob store", long_about = None)]
struct Cli {
    /// Print version
    #[arg(short = 'V', long)]
    version: bool,

    /// Store file
    #[arg(long, global = true, env = "SEALBOX_STORE", default_value = "store.sbx")]
    store: PathBuf,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a file (or stdin with `-`) under a name
    #[command(alias = "p")]
    Put {
        name: String,
        input: PathBuf,
    },

    /// Write an entry to a file (or stdout with `-`)
    #[command(alias = "g")]
    Get {
        name: String,
        output: PathBuf,
    },

    /// List entries
    #[command(alias = "l")]
    Ls {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Delete an entry
    Rm {
        name: String,
    },

    /// Fetch a URL into an entry unless the stored copy is current
    Sync {
        name: String,
        url: String,

        /// Request timeout in seconds
        #[arg(long, default_value = "30")]
        timeout: u64,
    },

    /// Show information about the store file
    #[command(alias = "i")]
    Info,

    /// Print the derived store key in hex
    Key,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "sealbox=debug" } else { "sealbox=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.version {
        println!("sealbox {}", get_version());
        return ExitCode::SUCCESS;
    }

    let command = match cli.command {
        Some(cmd) => cmd,
        None => {
            use clap::CommandFactory;
            let _ = Cli::command().print_help();
            println!();
            return ExitCode::SUCCESS;
        }
    };

    init_logging(cli.verbose);

    let result = Store::open(&cli.store, StoreOptions::default()).and_then(|store| match command {
        Commands::Put { name, input } => put_entry(&store, &name, &input).map(|entry| {
            println!("Stored {} bytes as {}", entry.length, entry.name);
        }),

        Commands::Get { name, output } => match get_entry(&store, &name, &output)? {
            Some(bytes) => {
                if output.as_os_str() != "-" {
                    println!("Extracted {} bytes to {}", bytes, output.display());
                }
                Ok(())
            }
            None => Err(SealboxError::NotFound(name)),
        },

        Commands::Ls { json } => list_entries(&store, json).map(|listing| print!("{}", listing)),

        Commands::Rm { name } => match remove_entry(&store, &name)? {
            Some(reclaimed) => {
                println!("Removed {} ({} bytes reclaimed)", name, reclaimed);
                Ok(())
            }
            None => Err(SealboxError::NotFound(name)),
        },

        Commands::Sync { name, url, timeout } => {
            let options = SyncOptions {
                timeout: Duration::from_secs(timeout),
            };
            sync_entry(&store, &name, &url, &options).map(|message| print!("{}", message))
        }

        Commands::Info => show_info(&store).map(|info| print!("{}", info)),

        Commands::Key => {
            print!("{}", show_key(&store));
            Ok(())
        }
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
