//! CLI entry point.
//!
//! Wiring happens in `bootstrap`; this file only sets up logging, parses the
//! command line and maps failures to exit codes.

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use storedev_cli::presentation::render_error_block;
use storedev_cli::{Cli, CliConfig, CliError, Commands, bootstrap, handlers};

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        // No command provided - show help
        Cli::command().print_help()?;
        return Ok(());
    };

    let ctx = bootstrap(&CliConfig::with_defaults())?;

    match command {
        Commands::Dev(args) => handlers::dev::execute(&ctx, args.into_options()).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        let error = CliError::from(e);
        eprintln!("{}", render_error_block(&error));
        std::process::exit(error.exit_code());
    }
}
