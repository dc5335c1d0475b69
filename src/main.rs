mod categorizer;
mod cli;
mod client;
mod config;
mod error;
mod fmt;
mod installments;
mod matcher;
mod models;
mod runlog;
mod settings;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use cli::{CardsCommands, CategoriesCommands, Cli, Commands, Context, RulesCommands};

fn init_tracing(verbose: bool) {
    let default = if verbose { "tidyspend=debug" } else { "tidyspend=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let ctx = Context::from_cli(&cli);

    let result = match cli.command {
        Some(Commands::Init { data_dir }) => cli::init::run(data_dir, &ctx.rules_path),
        Some(Commands::Categorize(args)) => cli::categorize::run(&ctx, &args),
        Some(Commands::Rules { command }) => match command {
            RulesCommands::List => cli::rules::list(&ctx),
            RulesCommands::Test { description } => cli::rules::test(&ctx, &description),
        },
        Some(Commands::Categories { command }) => match command {
            CategoriesCommands::List { remote } => cli::categories::list(&ctx, remote),
        },
        Some(Commands::Cards { command }) => match command {
            CardsCommands::List => cli::cards::list(&ctx),
        },
        Some(Commands::Invoices { card }) => cli::cards::invoices(&ctx, card),
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "tidyspend", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Status) | None => cli::status::run(&ctx),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
