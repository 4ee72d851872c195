//! Keys for at-most-once side effects.
//!
//! A side effect (e.g. paying a bonus for an emergency request) is claimed by
//! inserting its key into the `side_effects` table in the same transaction as
//! the effect itself. A second claim conflicts on the unique key and the
//! effect is skipped.

use core::fmt;

use crate::types::EmergencyRequestId;

/// Identity of one side effect on one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SideEffectKey {
    /// Entity table, e.g. `emergency_request`.
    pub entity_type: &'static str,
    /// Row id of the entity.
    pub entity_id: i32,
    /// Effect name, e.g. `driver_bonus`.
    pub effect: &'static str,
}

impl SideEffectKey {
    /// The bonus paid when an emergency request completes.
    #[must_use]
    pub const fn driver_bonus(request: EmergencyRequestId) -> Self {
        Self {
            entity_type: "emergency_request",
            entity_id: request.as_i32(),
            effect: "driver_bonus",
        }
    }
}

impl fmt::Display for SideEffectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.entity_type, self.entity_id, self.effect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_bonus_key() {
        let key = SideEffectKey::driver_bonus(EmergencyRequestId::new(17));
        assert_eq!(key.to_string(), "emergency_request:17:driver_bonus");
        assert_eq!(key, SideEffectKey::driver_bonus(EmergencyRequestId::new(17)));
        assert_ne!(key, SideEffectKey::driver_bonus(EmergencyRequestId::new(18)));
    }
}
