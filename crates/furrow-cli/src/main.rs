//! Furrow CLI - sign in and manage farm expense reports.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use commands::{App, CreateArgs, UpdateArgs};
use std::path::PathBuf;

/// Furrow CLI - Track farm expense reports.
#[derive(Parser)]
#[command(name = "furrow")]
#[command(about = "Furrow CLI for authentication and expense reports")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error); defaults to the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Directory for config, session and logs (default ~/.furrow)
    #[arg(long, global = true, env = "FURROW_HOME")]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Login with email and password
    Login,

    /// Create an account with email and password
    Signup,

    /// Login with Google in the browser
    LoginGoogle,

    /// Logout and clear session
    Logout,

    /// Check authentication status
    Status,

    /// Manage expense reports
    Reports {
        #[command(subcommand)]
        command: ReportCommands,
    },
}

#[derive(Subcommand)]
enum ReportCommands {
    /// List your reports, newest first
    List,
    /// Show report details
    Show {
        /// Report ID
        id: String,
    },
    /// Create a report
    Create(CreateArgs),
    /// Update a report's date or total
    Update(UpdateArgs),
    /// Delete a report
    Delete {
        /// Report ID
        id: String,
    },
    /// Print the report list whenever it changes
    Watch,
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let app = App::start(cli.base_dir, cli.log_level.as_deref()).await?;
    let format = &cli.format;

    match cli.command {
        Commands::Login => commands::login(&app, format).await,
        Commands::Signup => commands::signup(&app, format).await,
        Commands::LoginGoogle => commands::login_google(&app, format).await,
        Commands::Logout => commands::logout(&app, format).await,
        Commands::Status => commands::status(&app, format).await,
        Commands::Reports { command } => match command {
            ReportCommands::List => commands::reports_list(&app, format).await,
            ReportCommands::Show { id } => commands::reports_show(&app, &id, format).await,
            ReportCommands::Create(args) => commands::reports_create(&app, args, format).await,
            ReportCommands::Update(args) => commands::reports_update(&app, args, format).await,
            ReportCommands::Delete { id } => commands::reports_delete(&app, &id, format).await,
            ReportCommands::Watch => commands::reports_watch(&app, format).await,
        },
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let format = cli.format;

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e), &format);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_create_command() {
        let cli = Cli::try_parse_from([
            "furrow",
            "--format",
            "json",
            "reports",
            "create",
            "--date",
            "2024-01-01",
            "--expense",
            "Feed:10.5:feed",
            "--expense",
            "Diesel:4",
            "--label",
            "Cows:3",
        ])
        .unwrap();

        assert!(matches!(cli.format, output::OutputFormat::Json));
        match cli.command {
            Commands::Reports {
                command: ReportCommands::Create(args),
            } => {
                assert_eq!(args.expenses.len(), 2);
                assert_eq!(args.labels[0].count, 3);
                assert_eq!(args.date.to_string(), "2024-01-01");
            }
            _ => panic!("expected reports create"),
        }
    }

    #[test]
    fn test_parse_rejects_bad_expense() {
        let result = Cli::try_parse_from([
            "furrow", "reports", "create", "--date", "2024-01-01", "--expense", "Feed",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_login_google_subcommand_name() {
        let cli = Cli::try_parse_from(["furrow", "login-google"]).unwrap();
        assert!(matches!(cli.command, Commands::LoginGoogle));
    }
}
