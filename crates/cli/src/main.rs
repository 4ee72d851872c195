//! AquaCycle CLI - Database migrations and account management.
//!
//! # Usage
//!
//! ```bash
//! # Apply pending migrations
//! aqua-cli migrate
//!
//! # Create the first administrator (password read from AQUA_NEW_USER_PASSWORD)
//! aqua-cli user create -e admin@aquacycle.lk -n "Head Office" -r Admin
//!
//! # Create a branch manager
//! aqua-cli user create -e kandy@aquacycle.lk -n "Kandy" -r "Branch Manager" -b 2
//!
//! # Load the default factory catalog
//! aqua-cli seed catalog
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `user create` - Create an account
//! - `seed catalog` - Insert the standard filter catalog into the factory ledger

#![cfg_attr(not(test), forbid(unsafe_code))]

use aquacycle_core::{BranchId, Role};
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "aqua-cli")]
#[command(author, version, about = "AquaCycle CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Load reference data
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new account
    Create {
        /// Login email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Role (`Admin`, `Factory Manager`, `Branch Manager`, `Driver`,
        /// `Customer`, `Fire Brigade`)
        #[arg(short, long, default_value = "Admin")]
        role: Role,

        /// Home branch, required for branch managers
        #[arg(short, long)]
        branch_id: Option<BranchId>,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Insert the standard factory catalog, skipping existing items
    Catalog,
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
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                name,
                role,
                branch_id,
            } => {
                commands::users::create_user(&email, &name, role, branch_id).await?;
            }
        },
        Commands::Seed { target } => match target {
            SeedTarget::Catalog => commands::seed::catalog().await?,
        },
    }
    Ok(())
}
