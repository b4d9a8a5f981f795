//! Bazaar CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! bazaar-cli migrate
//!
//! # Ensure the bootstrap admin account exists
//! bazaar-cli admin bootstrap
//!
//! # Create a user
//! bazaar-cli user create -u alice -p secret123 --admin
//!
//! # Load products from YAML, replacing the catalog
//! bazaar-cli seed products products.yaml --clear
//! ```
//!
//! All commands read `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`) from the
//! environment or a `.env` file.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "bazaar-cli")]
#[command(author, version, about = "Bazaar CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage the bootstrap admin account
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Ensure an `admin` account with the admin flag exists
    Bootstrap,
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new user
    Create {
        /// Login name
        #[arg(short, long)]
        username: String,

        /// Password (at least 6 characters)
        #[arg(short, long)]
        password: String,

        /// Grant back-office access
        #[arg(long)]
        admin: bool,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Load products from a YAML file
    Products {
        /// Path to the YAML file
        file: String,

        /// Delete every existing product first
        #[arg(long)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Bootstrap => commands::admin::bootstrap().await?,
        },
        Commands::User { action } => match action {
            UserAction::Create {
                username,
                password,
                admin,
            } => {
                commands::admin::create_user(&username, &password, admin).await?;
            }
        },
        Commands::Seed { target } => match target {
            SeedTarget::Products { file, clear } => {
                commands::seed::products(&file, clear).await?;
            }
        },
    }
    Ok(())
}
