//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Password login, registration and access tokens
//! - `orders` - Factory/branch order lifecycle and driver assignment
//! - `delivery` - Factory shipment and branch receipt
//! - `inventory` - Factory and branch ledgers, factory stock requests
//! - `recycling` - Bins, drop-off requests and collections
//! - `emergency` - Fire brigade dispatch and driver bonuses
//! - `drivers` - Driver records and payroll

pub mod auth;
pub mod delivery;
pub mod drivers;
pub mod emergency;
pub mod inventory;
pub mod orders;
pub mod recycling;

pub use auth::{AuthError, AuthService};
pub use delivery::{DeliveryService, PendingDeliveries};
pub use drivers::DriverService;
pub use emergency::{EmergencyInput, EmergencyService, EmergencyUpdate};
pub use inventory::InventoryService;
pub use orders::{OrderService, StatusUpdate};
pub use recycling::RecyclingService;
