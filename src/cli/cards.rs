use chrono::Local;
use comfy_table::{Cell, Table};

use crate::cli::categorize::{pick_current_invoice, unknown_card};
use crate::cli::Context;
use crate::error::Result;
use crate::fmt::money;

pub fn list(ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    let cards = client.list_credit_cards()?;
    if cards.is_empty() {
        println!("No credit cards.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Closing day", "Due day", "Limit", "Archived"]);
    for card in cards {
        table.add_row(vec![
            Cell::new(card.id),
            Cell::new(card.name),
            Cell::new(card.closing_day.map(|d| d.to_string()).unwrap_or_default()),
            Cell::new(card.due_day.map(|d| d.to_string()).unwrap_or_default()),
            Cell::new(card.limit_cents.map(money).unwrap_or_default()),
            Cell::new(if card.archived { "yes" } else { "" }),
        ]);
    }
    println!("Credit cards\n{table}");
    Ok(())
}

pub fn invoices(ctx: &Context, card_id: i64) -> Result<()> {
    let client = ctx.client()?;
    let mut invoices = client
        .recent_invoices(card_id)
        .map_err(|e| unknown_card(e, card_id))?;
    if invoices.is_empty() {
        println!("No invoices for card {card_id}.");
        return Ok(());
    }
    invoices.sort_by_key(|inv| std::cmp::Reverse(inv.date));
    let current = pick_current_invoice(&invoices, Local::now().date_naive());

    let mut table = Table::new();
    table.set_header(vec!["ID", "Due", "Period", "Amount", "Balance", ""]);
    for inv in &invoices {
        let period = match (inv.starting_date, inv.closing_date) {
            (Some(start), Some(end)) => format!("{start} \u{2192} {end}"),
            _ => String::new(),
        };
        table.add_row(vec![
            Cell::new(inv.id),
            Cell::new(inv.date),
            Cell::new(period),
            Cell::new(money(inv.amount_cents)),
            Cell::new(money(inv.balance_cents)),
            Cell::new(if current == Some(inv.id) { "current" } else { "" }),
        ]);
    }
    println!("Invoices for card {card_id}\n{table}");
    Ok(())
}
