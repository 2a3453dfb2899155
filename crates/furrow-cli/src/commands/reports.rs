//! Report commands.

use super::App;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use furrow_reports::{
    format_currency, format_date, generate_unique_id, label_total, parse_date, CreateReportInput,
    Expense, Label, Report, UpdateReportInput,
};
use tracing::info;

/// Arguments for `reports create`.
#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Report date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_report_date)]
    pub date: NaiveDate,

    /// Expense as description:amount[:category]; repeatable
    #[arg(long = "expense", value_parser = parse_expense)]
    pub expenses: Vec<Expense>,

    /// Label as name:count; repeatable
    #[arg(long = "label", value_parser = parse_label)]
    pub labels: Vec<Label>,
}

/// Arguments for `reports update`.
#[derive(Debug, Args)]
pub struct UpdateArgs {
    /// Report ID
    pub id: String,

    /// New report date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_report_date)]
    pub date: Option<NaiveDate>,

    /// New total
    #[arg(long)]
    pub total: Option<f64>,
}

pub fn parse_report_date(value: &str) -> Result<NaiveDate, String> {
    parse_date(value).ok_or_else(|| format!("invalid date '{}', expected YYYY-MM-DD", value))
}

pub fn parse_expense(value: &str) -> Result<Expense, String> {
    let mut parts = value.splitn(3, ':');
    let description = parts.next().unwrap_or_default().trim();
    let amount = parts
        .next()
        .ok_or_else(|| format!("expected description:amount[:category], got '{}'", value))?;
    let category = parts
        .next()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);

    if description.is_empty() {
        return Err("expense description must not be empty".to_string());
    }
    let amount: f64 = amount
        .trim()
        .parse()
        .map_err(|_| format!("invalid amount '{}'", amount))?;

    Ok(Expense {
        id: generate_unique_id(),
        description: description.to_string(),
        amount,
        category,
    })
}

pub fn parse_label(value: &str) -> Result<Label, String> {
    let (name, count) = value
        .rsplit_once(':')
        .ok_or_else(|| format!("expected name:count, got '{}'", value))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("label name must not be empty".to_string());
    }
    let count: u32 = count
        .trim()
        .parse()
        .map_err(|_| format!("invalid count '{}'", count))?;

    Ok(Label {
        id: generate_unique_id(),
        name: name.to_string(),
        count,
    })
}

fn print_report_table(reports: &[Report]) {
    if reports.is_empty() {
        println!("No reports found");
        return;
    }
    println!(
        "{:<36} {:<20} {:>12} {:>9} {:>7}",
        "ID", "Date", "Total", "Expenses", "Head"
    );
    println!("{}", "-".repeat(88));
    for report in reports {
        println!(
            "{:<36} {:<20} {:>12} {:>9} {:>7}",
            report.id,
            format_date(report.date),
            format_currency(report.total),
            report.expenses.len(),
            label_total(&report.labels)
        );
    }
}

fn print_report(report: &Report) {
    output::print_heading(&format!("Report {}", report.id));
    output::print_row("Date", &format_date(report.date));
    output::print_row("Total", &format_currency(report.total));
    output::print_row("Created", &report.created_at.to_rfc3339());
    output::print_row("Updated", &report.updated_at.to_rfc3339());

    if !report.expenses.is_empty() {
        output::print_heading("Expenses");
        for expense in &report.expenses {
            let category = expense
                .category
                .as_deref()
                .map(|c| format!(" [{}]", c))
                .unwrap_or_default();
            println!(
                "  {:<30} {:>12}{}",
                expense.description,
                format_currency(expense.amount),
                category
            );
        }
    }

    if !report.labels.is_empty() {
        output::print_heading("Labels");
        for label in &report.labels {
            println!("  {:<30} {:>6}", label.name, label.count);
        }
        println!("  {:<30} {:>6}", "Total", label_total(&report.labels));
    }
}

/// List the signed-in user's reports.
pub async fn reports_list(app: &App, format: &OutputFormat) -> Result<()> {
    let user = app.require_user()?;
    let reports = app.reports.list_reports(&user.user_id).await?;

    match format {
        OutputFormat::Text => print_report_table(&reports),
        OutputFormat::Json => output::print_json(&reports)?,
    }
    Ok(())
}

/// Show one report.
pub async fn reports_show(app: &App, id: &str, format: &OutputFormat) -> Result<()> {
    app.require_user()?;

    match app.reports.get_report(id).await? {
        Some(report) => match format {
            OutputFormat::Text => print_report(&report),
            OutputFormat::Json => output::print_json(&report)?,
        },
        None => output::print_error(&format!("Report {} not found", id), format),
    }
    Ok(())
}

/// Create a report from command-line items.
pub async fn reports_create(app: &App, args: CreateArgs, format: &OutputFormat) -> Result<()> {
    app.require_user()?;

    let input = CreateReportInput::new(args.date, args.expenses, args.labels);
    let total = input.total;
    let id = app.reports.create_report(input).await?;
    info!(report_id = %id, "Created report from CLI");

    match format {
        OutputFormat::Text => println!(
            "Created report {} ({})",
            id,
            format_currency(total)
        ),
        OutputFormat::Json => output::print_json(&serde_json::json!({ "id": id }))?,
    }
    Ok(())
}

/// Patch a report's date or total.
pub async fn reports_update(app: &App, args: UpdateArgs, format: &OutputFormat) -> Result<()> {
    app.require_user()?;

    let patch = UpdateReportInput {
        date: args.date,
        total: args.total,
        ..Default::default()
    };
    if patch.is_empty() {
        output::print_error("Nothing to update (use --date or --total)", format);
        return Ok(());
    }

    let report = app.reports.update_report(&args.id, patch).await?;
    match format {
        OutputFormat::Text => print_report(&report),
        OutputFormat::Json => output::print_json(&report)?,
    }
    Ok(())
}

/// Delete a report.
pub async fn reports_delete(app: &App, id: &str, format: &OutputFormat) -> Result<()> {
    app.require_user()?;
    app.reports.delete_report(id).await?;
    output::print_success(&format!("Deleted report {}", id), format);
    Ok(())
}

/// Print the report list every time it changes, until Ctrl-C.
pub async fn reports_watch(app: &App, format: &OutputFormat) -> Result<()> {
    let user = app.require_user()?;
    let format = *format;

    let subscription = app
        .reports
        .subscribe_to_reports(&user.user_id, move |reports| match format {
            OutputFormat::Text => {
                output::print_heading(&format!("{} report(s)", reports.len()));
                print_report_table(&reports);
            }
            OutputFormat::Json => {
                if let Ok(json) = serde_json::to_string(&reports) {
                    println!("{}", json);
                }
            }
        })
        .await?;

    if let OutputFormat::Text = format {
        eprintln!("Watching reports. Press Ctrl-C to stop.");
    }
    tokio::signal::ctrl_c().await?;
    subscription.unsubscribe();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_expense() {
        let expense = parse_expense("Hay bales:120.5:feed").unwrap();
        assert_eq!(expense.description, "Hay bales");
        assert_eq!(expense.amount, 120.5);
        assert_eq!(expense.category.as_deref(), Some("feed"));
        assert!(!expense.id.is_empty());

        let expense = parse_expense("Diesel: 40").unwrap();
        assert_eq!(expense.amount, 40.0);
        assert_eq!(expense.category, None);
    }

    #[test]
    fn test_parse_expense_rejects_bad_input() {
        assert!(parse_expense("Diesel").is_err());
        assert!(parse_expense(":40").is_err());
        assert!(parse_expense("Diesel:forty").is_err());
    }

    #[test]
    fn test_parse_label() {
        let label = parse_label("Cows:12").unwrap();
        assert_eq!(label.name, "Cows");
        assert_eq!(label.count, 12);

        assert!(parse_label("Cows").is_err());
        assert!(parse_label("Cows:-1").is_err());
        assert!(parse_label(":3").is_err());
    }

    #[test]
    fn test_parse_report_date() {
        assert_eq!(
            parse_report_date("2024-01-05").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
        );
        assert!(parse_report_date("05/01/2024").is_err());
    }
}
