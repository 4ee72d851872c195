//! Domain models served by the API.
//!
//! These are the validated shapes handlers return. Database row types live
//! next to their repositories in [`crate::db`] and convert into these.

pub mod delivery;
pub mod emergency;
pub mod inventory;
pub mod order;
pub mod organization;
pub mod recycling;

pub use delivery::{DeliveryReport, DeliveryType, LineOutcome, Outcome, StockMove};
pub use emergency::{BonusOutcome, DriverBonus, EmergencyRequest};
pub use inventory::{BranchInventoryItem, FactoryRequest, InventoryItem};
pub use order::{BranchOrder, Driver, Order};
pub use organization::{Branch, Employee, User};
pub use recycling::{BinAdjustment, CollectionRequest, RecyclingBin, RecyclingRequest};
