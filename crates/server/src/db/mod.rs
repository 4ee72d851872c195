//! Database operations for the operations `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `branches`, `users`, `employees` - Organisation and accounts
//! - `inventory_items` - Factory ledger
//! - `branch_inventory_items` - Per-branch ledgers, unique on `(branch_id, name)`
//! - `orders`, `branch_orders` - Paired factory/branch orders
//! - `drivers` - Delivery drivers and their current assignments
//! - `factory_requests` - Direct branch stock requests
//! - `recycling_bins`, `recycling_requests`, `collection_requests`
//! - `emergency_requests`, `driver_bonuses`
//! - `side_effects` - At-most-once effect claims
//!
//! # Conventions
//!
//! Every status change is a compare-and-swap (`WHERE status = ANY($n)`); a
//! repository returns `Ok(None)` when no row matched so the service can re-read
//! and report the current status. Functions that take `&mut PgConnection` are
//! meant to run inside a caller-owned transaction.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p aquacycle-cli -- migrate
//! ```

/// SQL fragment deriving a stock status from a quantity expression and a
/// minimum level expression.
macro_rules! stock_status_sql {
    ($qty:literal, $min:literal) => {
        concat!(
            "CASE WHEN ", $qty, " <= 0 THEN 'Out of Stock' ",
            "WHEN ", $qty, " <= ", $min, " THEN 'Low Stock' ",
            "ELSE 'In Stock' END"
        )
    };
}

pub(crate) use stock_status_sql;

pub mod bonuses;
pub mod branch_inventory;
pub mod branch_orders;
pub mod branches;
pub mod drivers;
pub mod emergency;
pub mod employees;
pub mod factory_requests;
pub mod inventory;
pub mod numbering;
pub mod orders;
pub mod recycling;
pub mod side_effects;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use bonuses::BonusRepository;
pub use branch_inventory::BranchInventoryRepository;
pub use branch_orders::BranchOrderRepository;
pub use branches::BranchRepository;
pub use drivers::DriverRepository;
pub use emergency::EmergencyRepository;
pub use employees::EmployeeRepository;
pub use factory_requests::FactoryRequestRepository;
pub use inventory::InventoryRepository;
pub use orders::OrderRepository;
pub use recycling::{BinRepository, CollectionRepository, RecyclingRepository};
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique name).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique violation to `Conflict`, anything else to `Database`.
    pub(crate) fn on_unique(e: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(e)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    pool_options().connect(database_url.expose_secret()).await
}

/// Create a pool that connects on first use.
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL cannot be parsed.
pub fn create_lazy_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    pool_options().connect_lazy(database_url.expose_secret())
}

fn pool_options() -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
}
