//! Command-line front end: load a project directory into an in-memory store
//! and bundle-and-run an entry module, or dump its dependency graph.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tinypack::{
    canonicalize, compile_module, run, Interpreter, MemoryFileStore, ModuleCache,
};

#[derive(Parser)]
#[command(name = "tinypack", version, about = "Bundle and execute ES modules from memory")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log compiler activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Compile the entry module and execute the dependency graph
    Run {
        /// Entry path relative to the root, e.g. ./main.js
        entry: String,

        /// Directory whose .js/.mjs files form the module store
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Compile only, printing the entry's dependency graph as JSON
    Graph {
        /// Entry path relative to the root, e.g. ./main.js
        entry: String,

        /// Directory whose .js/.mjs files form the module store
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "tinypack=debug"
    } else {
        "tinypack=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match execute(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

async fn execute(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Run { entry, root } => {
            let store = MemoryFileStore::from_dir(&root)?;
            let mut cache = ModuleCache::new();
            let interp = Interpreter::with_stdout();
            run(&store, &entry, &mut cache, &interp).await?;
        }
        Command::Graph { entry, root } => {
            let store = MemoryFileStore::from_dir(&root)?;
            let mut cache = ModuleCache::new();
            let mut meta = canonicalize(&entry);
            compile_module(&mut meta, &store, &mut cache).await?;
            println!("{}", serde_json::to_string_pretty(&meta)?);
        }
    }
    Ok(())
}
