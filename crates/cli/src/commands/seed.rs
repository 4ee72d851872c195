//! Seed the factory ledger with the standard filter catalog.
//!
//! Items that already exist (matched by name) are left untouched, so the
//! command can be re-run after the catalog grows.

use tracing::{info, warn};

use aquacycle_server::db::inventory::NewInventoryItem;
use aquacycle_server::db::{self, InventoryRepository, RepositoryError};

/// `(name, unit, min_stock_level, max_stock_level)`
const CATALOG: &[(&str, &str, i32, i32)] = &[
    ("Ceramic Candle Filter", "units", 20, 200),
    ("Gravity Water Filter 20L", "units", 10, 100),
    ("Clay Pot Filter", "units", 10, 80),
    ("Activated Carbon Cartridge", "units", 50, 500),
    ("Sediment Pre-Filter", "units", 50, 500),
    ("RO Membrane", "units", 15, 120),
    ("UV Lamp Module", "units", 10, 60),
    ("Replacement Tap Assembly", "units", 25, 250),
];

/// Insert every catalog item that is not in the factory ledger yet.
///
/// New items start with zero stock.
///
/// # Errors
///
/// Returns an error if the database is unreachable or an insert fails for a
/// reason other than the item already existing.
pub async fn catalog() -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url().ok_or("AQUA_DATABASE_URL not set")?;

    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let repo = InventoryRepository::new(&pool);
    let mut inserted = 0_usize;
    let mut skipped = 0_usize;

    for &(name, unit, min_stock_level, max_stock_level) in CATALOG {
        let item = NewInventoryItem {
            name: name.to_owned(),
            quantity: 0,
            unit: unit.to_owned(),
            min_stock_level,
            max_stock_level,
        };
        match repo.create(&item).await {
            Ok(created) => {
                info!(item_id = %created.id, name, "catalog item added");
                inserted += 1;
            }
            Err(RepositoryError::Conflict(_)) => {
                warn!(name, "catalog item already exists, skipping");
                skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!("Seeding complete!");
    info!("  Items inserted: {inserted}");
    info!("  Items skipped (already exist): {skipped}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use aquacycle_core::stock::validate_levels;

    #[test]
    fn test_catalog_levels_are_valid() {
        for &(name, _, min, max) in CATALOG {
            assert!(validate_levels(0, min, max).is_ok(), "{name} has invalid levels");
        }
    }

    #[test]
    fn test_catalog_names_are_unique() {
        let mut names: Vec<_> = CATALOG.iter().map(|(name, ..)| *name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), CATALOG.len());
    }
}
