use colored::Colorize;

use crate::categorizer::Categorizer;
use crate::cli::Context;
use crate::error::Result;
use crate::matcher::{PatternMatcher, RenameMatcher};
use crate::settings::settings_file_exists;

pub fn run(ctx: &Context) -> Result<()> {
    let settings = &ctx.settings;
    let email = ctx.email.as_deref().unwrap_or(&settings.email);
    let has_token = ctx
        .token
        .as_deref()
        .or(settings.api_token.as_deref())
        .is_some_and(|t| !t.is_empty());

    println!("Email:      {}", if email.is_empty() { "(not set)" } else { email });
    println!("API token:  {}", if has_token { "set" } else { "(not set)" });
    println!("API:        {}", settings.base_url);
    println!("Data dir:   {}", settings.data_dir().display());
    println!("Rules:      {}", ctx.rules_path.display());

    if !settings_file_exists() {
        println!();
        println!("No settings file yet. Run `tidyspend init` to set up.");
    }

    if !ctx.rules_path.exists() {
        println!();
        println!("Rules file not found. Run `tidyspend init` to create one.");
        return Ok(());
    }

    let config = ctx.config()?;
    let categorizer = Categorizer::new(&config);
    println!();
    let (patterns, _) = PatternMatcher::new(&config.rules);
    let (renames, _) = RenameMatcher::new(&config.renames);
    println!("Rules:         {} ({} usable)", config.rules.len(), patterns.len());
    println!("Renames:       {} ({} usable)", config.renames.len(), renames.len());
    println!("Categories:    {}", config.categories.len());
    println!("Tag mappings:  {}", config.tags.len());
    for w in categorizer.warnings() {
        println!("{} {w}", "warning:".yellow());
    }
    Ok(())
}
