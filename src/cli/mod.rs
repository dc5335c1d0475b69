pub mod cards;
pub mod categories;
pub mod categorize;
pub mod export;
pub mod init;
pub mod rules;
pub mod status;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::client::Client;
use crate::config::{load_config, Config};
use crate::error::Result;
use crate::settings::{load_settings, Settings};

#[derive(Parser)]
#[command(
    name = "tidyspend",
    version,
    about = "Categorize, rename and tag budgeting API transactions with rules."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log debug output to stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Rules file (default: ~/.config/tidyspend/rules.toml)
    #[arg(long, global = true)]
    pub rules: Option<PathBuf>,

    /// Account email used to authenticate with the API
    #[arg(long, global = true, env = "TIDYSPEND_EMAIL")]
    pub email: Option<String>,

    /// API token
    #[arg(long, global = true, env = "TIDYSPEND_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write default settings and a sample rules file.
    Init {
        /// Path for run logs and exports (default: ~/Documents/tidyspend)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Run the rules over transactions and report (or apply) the changes.
    Categorize(CategorizeArgs),
    /// Inspect categorization and rename rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// Show configured categories and their tags.
    Categories {
        #[command(subcommand)]
        command: CategoriesCommands,
    },
    /// Manage credit cards.
    Cards {
        #[command(subcommand)]
        command: CardsCommands,
    },
    /// List a credit card's invoices.
    Invoices {
        /// Credit card ID (shown in `tidyspend cards list`)
        #[arg(long)]
        card: i64,
    },
    /// Show settings and rule counts.
    Status,
    /// Print shell completions.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(Args, Debug, Default)]
pub struct CategorizeArgs {
    /// Start date: YYYY-MM-DD (default: first day of this month)
    #[arg(long = "from")]
    pub from_date: Option<NaiveDate>,
    /// End date: YYYY-MM-DD (default: last day of this month)
    #[arg(long = "to")]
    pub to_date: Option<NaiveDate>,
    /// Process a credit card invoice instead of account transactions
    #[arg(long, conflicts_with_all = ["from_date", "to_date"])]
    pub card: Option<i64>,
    /// Invoice ID (default: the invoice covering today)
    #[arg(long, requires = "card")]
    pub invoice: Option<i64>,
    /// Only look for earlier installments inside the fetched batch
    #[arg(long = "same-batch")]
    pub same_batch: bool,
    /// Only apply renames
    #[arg(long = "rename-only", conflicts_with = "tags_only")]
    pub rename_only: bool,
    /// Only apply tags derived from the current category
    #[arg(long = "tags-only")]
    pub tags_only: bool,
    /// Also change transactions that were edited by hand
    #[arg(long)]
    pub force: bool,
    /// Keep the original description in the notes when renaming
    #[arg(long = "keep-original")]
    pub keep_original: bool,
    /// Write the changes back (default is a dry run)
    #[arg(long)]
    pub apply: bool,
    /// Also write the results to CSV (default: a timestamped file in the exports dir)
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    pub csv: Option<Option<PathBuf>>,
    /// Show skipped transactions too
    #[arg(long)]
    pub all: bool,
    /// Don't write a JSON run log
    #[arg(long = "no-log")]
    pub no_log: bool,
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// List categorization rules and renames.
    List,
    /// Show what the rules would do with a description.
    Test {
        /// Transaction description, e.g. 'UBER *TRIP 2/3'
        description: String,
    },
}

#[derive(Subcommand)]
pub enum CategoriesCommands {
    /// List categories from the rules file.
    List {
        /// List the API's categories instead
        #[arg(long)]
        remote: bool,
    },
}

#[derive(Subcommand)]
pub enum CardsCommands {
    /// List credit cards.
    List,
}

/// What every command needs: settings plus the command-line overrides.
pub struct Context {
    pub settings: Settings,
    pub rules_path: PathBuf,
    pub email: Option<String>,
    pub token: Option<String>,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> Self {
        let settings = load_settings();
        let rules_path = cli.rules.clone().unwrap_or_else(|| settings.rules_path());
        Self {
            settings,
            rules_path,
            email: cli.email.clone(),
            token: cli.token.clone(),
        }
    }

    pub fn config(&self) -> Result<Config> {
        load_config(&self.rules_path)
    }

    pub fn client(&self) -> Result<Client> {
        Client::from_settings(&self.settings, self.email.as_deref(), self.token.as_deref())
    }
}
