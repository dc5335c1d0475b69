use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::categorizer::tags_for_category;
use crate::cli::Context;
use crate::config::Config;
use crate::error::Result;
use crate::installments::base_description;
use crate::matcher::{match_rename, PatternMatcher, RenameMatcher};

pub fn list(ctx: &Context) -> Result<()> {
    let config = ctx.config()?;

    if config.rules.is_empty() {
        println!("No categorization rules in {}.", ctx.rules_path.display());
    } else {
        let mut table = Table::new();
        table.set_header(vec!["#", "Pattern", "Category", "ID", "Note"]);
        for (i, rule) in config.rules.iter().enumerate() {
            let id = config
                .categories
                .id_for(&rule.category)
                .map(|id| id.to_string())
                .unwrap_or_else(|| "?".to_string());
            table.add_row(vec![
                Cell::new(i + 1),
                Cell::new(&rule.pattern),
                Cell::new(&rule.category),
                Cell::new(id),
                Cell::new(rule.note.as_deref().unwrap_or("")),
            ]);
        }
        println!("Rules\n{table}");
    }

    if !config.renames.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["#", "Pattern", "Rename to"]);
        for (i, rename) in config.renames.iter().enumerate() {
            table.add_row(vec![
                Cell::new(i + 1),
                Cell::new(&rename.pattern),
                Cell::new(&rename.name),
            ]);
        }
        println!("Renames\n{table}");
    }

    let (_, mut warnings) = PatternMatcher::new(&config.rules);
    warnings.extend(RenameMatcher::new(&config.renames).1);
    warnings.extend(config.validate());
    for w in warnings {
        println!("{} {w}", "warning:".yellow());
    }
    Ok(())
}

/// What the rules make of a single description.
#[derive(Debug, PartialEq)]
pub struct Explanation {
    /// 1-based position of the first matching rule.
    pub rule_number: Option<usize>,
    pub pattern: Option<String>,
    pub category: Option<String>,
    pub category_id: Option<i64>,
    pub rename: Option<String>,
    pub base: String,
    pub tags: Vec<String>,
}

pub fn explain(config: &Config, description: &str) -> Explanation {
    let (patterns, _) = PatternMatcher::new(&config.rules);

    let rule = patterns.matching_rule(description);
    let category_id = rule.and_then(|r| config.categories.id_for(&r.category));
    Explanation {
        rule_number: rule.and_then(|r| config.rules.iter().position(|x| x == r).map(|i| i + 1)),
        pattern: rule.map(|r| r.pattern.clone()),
        category: rule.map(|r| r.category.clone()),
        category_id,
        rename: match_rename(description, &config.renames).map(str::to_string),
        base: base_description(description).to_string(),
        tags: tags_for_category(category_id, &config.categories, &config.tags),
    }
}

pub fn test(ctx: &Context, description: &str) -> Result<()> {
    let config = ctx.config()?;
    let e = explain(&config, description);

    println!("Description:  {description}");
    if e.base != description.trim() {
        println!("Installment:  base '{}'", e.base);
    }
    match (&e.category, e.rule_number) {
        (Some(category), Some(n)) => {
            let id = match e.category_id {
                Some(id) => id.to_string(),
                None => "unknown category".red().to_string(),
            };
            println!(
                "Category:     {} ({id}) via rule #{n} '{}'",
                category.green(),
                e.pattern.as_deref().unwrap_or("")
            );
        }
        _ => println!("Category:     {}", "no rule matches".dimmed()),
    }
    match &e.rename {
        Some(name) => println!("Rename:       {}", name.cyan()),
        None => println!("Rename:       {}", "-".dimmed()),
    }
    if !e.tags.is_empty() {
        println!("Tags:         {}", e.tags.join(", "));
    }
    Ok(())
}
