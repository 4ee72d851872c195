//! CLI subcommands.

pub mod migrate;
pub mod seed;
pub mod users;

use secrecy::SecretString;

/// Connection string for the operations database.
///
/// `AQUA_DATABASE_URL` wins over the generic `DATABASE_URL`.
pub fn database_url() -> Option<SecretString> {
    dotenvy::dotenv().ok();

    std::env::var("AQUA_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .filter(|url| !url.trim().is_empty())
        .map(SecretString::from)
}
