use std::panic;

use clap::Parser;
use tracing::error;

use ticket_desk::{
    cli::{self, RootCommand},
    logging::{init_logging, print_log_location},
    settings::Settings,
};

#[derive(Parser, Debug)]
#[command(
    name = "ticket-desk",
    about = "Command-line client for a ticket tracking service",
    long_about = "Loads tickets and users from a ticket tracking HTTP API and runs one \
                  query or mutation against them.",
    version = env!("TICKET_DESK_BUILD_VERSION"),
    author
)]
struct Cli {
    /// Base URL of the ticket API. Overrides the settings file and TICKET_DESK_API_URL.
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,

    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<RootCommand>,
}

#[tokio::main]
async fn main() {
    let log_path = match init_logging() {
        Ok(path) => Some(path),
        Err(err) => {
            eprintln!("warning: failed to initialize logging: {err:#}");
            None
        }
    };
    install_panic_hook();

    let cli = Cli::parse();

    let mut settings = Settings::load();
    if let Some(url) = cli.api_url.as_deref() {
        settings.apply_api_url_override(url);
    }

    let command = cli.command.unwrap_or_default();
    let code = cli::run(&settings, command, cli.json, cli.quiet).await;

    if code != 0
        && !cli.json
        && !cli.quiet
        && let Some(path) = log_path.as_ref()
    {
        print_log_location(path);
    }
    std::process::exit(code);
}

fn install_panic_hook() {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        error!("panic: {panic_info}");
        default_hook(panic_info);
    }));
}
