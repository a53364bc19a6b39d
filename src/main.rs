//! vault-tenants - Multi-tenant Vault configuration generator
//!
//! Command-line entry point. Logs go to stderr, program documents to stdout.

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vault_tenants::cli::Cli;
use vault_tenants::config::load_config;
use vault_tenants::Result;

fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.debug, cli.log_json);

    // Execute the command
    if let Err(e) = run(cli) {
        error!("Error: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    info!("Starting vault-tenants");

    let config = load_config(cli.settings.as_deref())?;
    cli.execute(config)
}

fn init_logging(debug: bool, json: bool) {
    let default_filter = if debug {
        "vault_tenants=debug"
    } else {
        "vault_tenants=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
