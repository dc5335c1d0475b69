use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::Context;
use crate::config::Config;
use crate::error::Result;
use crate::models::ApiCategory;

pub fn list(ctx: &Context, remote: bool) -> Result<()> {
    let config = ctx.config()?;
    if remote {
        let client = ctx.client()?;
        let categories = client.list_categories()?;
        print_remote(&categories, &config);
    } else {
        print_local(&config);
    }
    Ok(())
}

fn print_local(config: &Config) {
    if config.categories.is_empty() {
        println!("No categories configured.");
        return;
    }
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Group", "Tags"]);
    for entry in config.categories.entries() {
        table.add_row(vec![
            Cell::new(entry.id),
            Cell::new(&entry.name),
            Cell::new(entry.group.label()),
            Cell::new(config.tags.tags_for(&entry.name).join(", ")),
        ]);
    }
    println!("Categories\n{table}");
}

fn print_remote(categories: &[ApiCategory], config: &Config) {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Parent", "Mapped as"]);
    for cat in categories.iter().filter(|c| !c.archived) {
        table.add_row(vec![
            Cell::new(cat.id),
            Cell::new(&cat.name),
            Cell::new(cat.parent_id.map(|p| p.to_string()).unwrap_or_default()),
            Cell::new(mapped_name(config, cat.id).unwrap_or("")),
        ]);
    }
    println!("Remote categories\n{table}");

    for (name, id) in unmapped_ids(config, categories) {
        println!(
            "{} '{name}' uses id {id}, which the API does not know",
            "warning:".yellow()
        );
    }
}

fn mapped_name(config: &Config, id: i64) -> Option<&str> {
    config.categories.name_for(id)
}

/// Configured categories whose id is missing from the API's list.
pub fn unmapped_ids<'a>(config: &'a Config, remote: &[ApiCategory]) -> Vec<(&'a str, i64)> {
    config
        .categories
        .entries()
        .iter()
        .filter(|e| !remote.iter().any(|c| c.id == e.id))
        .map(|e| (e.name.as_str(), e.id))
        .collect()
}
