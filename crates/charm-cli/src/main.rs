mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_CHARM_ERROR, EXIT_FAILURE, EXIT_RESOLUTION_ERROR};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "charm",
    version,
    about = "Read, pack and resolve service charms"
)]
struct Cli {
    /// Root of the local charm repository [default: $CHARM_REPO].
    #[arg(long, global = true)]
    repo: Option<String>,

    /// Catalog endpoint (overrides the config file and $CHARM_CATALOG_URL).
    #[arg(long, global = true)]
    catalog: Option<String>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Read a charm directory or bundle and show its metadata.
    Inspect {
        /// Path to a charm directory or `.charm` bundle.
        path: PathBuf,
    },
    /// Resolve a charm URL and read the charm it names.
    Get {
        /// Charm URL or shorthand (e.g. `cs:precise/mysql-3`, `local:mysql`, `mysql`).
        url: String,
        /// Series used when the URL does not name one.
        #[arg(long)]
        series: Option<String>,
    },
    /// Show the newest revision available for a charm URL.
    Latest {
        /// Charm URL or shorthand.
        url: String,
        /// Series used when the URL does not name one.
        #[arg(long)]
        series: Option<String>,
    },
    /// Pack a charm directory into a bundle.
    Pack {
        /// Charm directory.
        dir: PathBuf,
        /// Bundle file to write.
        out: PathBuf,
    },
    /// Unpack a bundle into a directory.
    Expand {
        /// Bundle file.
        bundle: PathBuf,
        /// Target directory (created if missing).
        dir: PathBuf,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("CHARM_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let json_output = cli.json;
    let repo_root = commands::local_root(cli.repo.as_deref());

    let result = match cli.command {
        Commands::Inspect { path } => commands::inspect::run(&path, json_output),
        Commands::Get { url, series } => commands::get::run(
            &url,
            series.as_deref(),
            &repo_root,
            cli.catalog.as_deref(),
            json_output,
        ),
        Commands::Latest { url, series } => commands::latest::run(
            &url,
            series.as_deref(),
            &repo_root,
            cli.catalog.as_deref(),
            json_output,
        ),
        Commands::Pack { dir, out } => commands::pack::run(&dir, &out, json_output),
        Commands::Expand { bundle, dir } => commands::expand::run(&bundle, &dir, json_output),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("charm error:") {
                EXIT_CHARM_ERROR
            } else if msg.starts_with("resolution error:") {
                EXIT_RESOLUTION_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
