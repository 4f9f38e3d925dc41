//! Scratch card CLI - Database migrations and admin management.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! scratchcard-cli migrate
//!
//! # Create an admin (password read from ADMIN_PASSWORD)
//! ADMIN_PASSWORD=... scratchcard-cli admin create -u shopadmin -e owner@example.com
//!
//! # List admins
//! scratchcard-cli admin list
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "scratchcard-cli")]
#[command(author, version, about = "Scratch card service CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage admin users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new admin user (password from `ADMIN_PASSWORD`)
    Create {
        /// Login name (3-30 characters)
        #[arg(short, long)]
        username: String,

        /// Contact email address
        #[arg(short, long)]
        email: Option<String>,
    },
    /// List admin users
    List,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Create { username, email } => {
                commands::admin::create_user(&username, email.as_deref()).await?;
            }
            AdminAction::List => commands::admin::list_users().await?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_admin_create() {
        let cli = Cli::try_parse_from([
            "scratchcard-cli",
            "admin",
            "create",
            "-u",
            "shopadmin",
            "-e",
            "owner@example.com",
        ])
        .unwrap_or_else(|e| panic!("{e}"));

        match cli.command {
            Commands::Admin {
                action: AdminAction::Create { username, email },
            } => {
                assert_eq!(username, "shopadmin");
                assert_eq!(email.as_deref(), Some("owner@example.com"));
            }
            _ => panic!("expected admin create"),
        }
    }
}
