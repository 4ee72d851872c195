//! Status vocabularies and roles.
//!
//! Every enum here is stored as `TEXT` and serialized with the exact labels
//! the dashboard displays ("In Stock", "On Delivery", ...). The `text_enum!`
//! macro keeps the label table in one place for serde, `Display`, `FromStr`
//! and the `sqlx` impls.

use thiserror::Error;

/// Error returned when a label does not belong to a status vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {value}")]
pub struct ParseStatusError {
    /// Vocabulary name (e.g. `order status`).
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($kind:literal) {
            $( $(#[$vmeta:meta])* $variant:ident => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The stored/serialized label.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ParseStatusError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok(Self::$variant),)+
                    _ => Err(ParseStatusError {
                        kind: $kind,
                        value: s.to_owned(),
                    }),
                }
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <&str as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <&str as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                let label = <&str as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                Ok(label.parse::<Self>()?)
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::core::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <&str as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
            }
        }
    };
}

text_enum! {
    /// Account role. Every route carries an allow-list of these.
    Role("role") {
        Admin => "Admin",
        FactoryManager => "Factory Manager",
        BranchManager => "Branch Manager",
        Driver => "Driver",
        Customer => "Customer",
        FireBrigade => "Fire Brigade",
    }
}

text_enum! {
    /// Derived stock status of a factory or branch inventory row.
    StockStatus("stock status") {
        InStock => "In Stock",
        LowStock => "Low Stock",
        OutOfStock => "Out of Stock",
    }
}

text_enum! {
    /// Status shared by factory orders and branch orders.
    OrderStatus("order status") {
        Pending => "Pending",
        Accepted => "Accepted",
        Processing => "Processing",
        Shipped => "Shipped",
        Delivered => "Delivered",
        Cancelled => "Cancelled",
    }
}

text_enum! {
    /// Where a factory order came from.
    OrderSource("order source") {
        Direct => "Direct",
        BranchRequest => "Branch Request",
    }
}

text_enum! {
    /// Driver availability.
    DriverStatus("driver status") {
        Available => "Available",
        OnDelivery => "On Delivery",
        OffDuty => "Off Duty",
    }
}

text_enum! {
    /// Banded recycling bin status derived from the fill percentage.
    BinStatus("bin status") {
        Empty => "Empty",
        Low => "Low",
        Medium => "Medium",
        High => "High",
        Critical => "Critical",
    }
}

text_enum! {
    /// Status of recycling and collection requests.
    RequestStatus("request status") {
        Pending => "Pending",
        Approved => "Approved",
        Rejected => "Rejected",
        Completed => "Completed",
    }
}

text_enum! {
    /// Status of a branch's direct stock request to the factory.
    FactoryRequestStatus("factory request status") {
        Pending => "Pending",
        Approved => "Approved",
        Rejected => "Rejected",
    }
}

text_enum! {
    /// Emergency request dispatch status.
    EmergencyStatus("emergency status") {
        Pending => "Pending",
        Approved => "Approved",
        /// Approved by the factory and forwarded to the nearest branch manager.
        SentToBranchManager => "Approved-Sent-to-BranchManager",
        Rejected => "Rejected",
        InProgress => "In Progress",
        Completed => "Completed",
    }
}

text_enum! {
    /// Bonus bookkeeping on an emergency request.
    BonusState("bonus status") {
        NotApplicable => "Not Applicable",
        Pending => "Pending",
        Created => "Bonus Created",
        Failed => "Failed",
    }
}

text_enum! {
    /// Payment state of a driver bonus.
    BonusPaymentStatus("bonus payment status") {
        Pending => "Pending",
        Paid => "Paid",
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl Default for DriverStatus {
    fn default() -> Self {
        Self::Available
    }
}

impl RequestStatus {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Completed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_round_trip_through_from_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), *role);
        }
        for status in EmergencyStatus::ALL {
            assert_eq!(status.to_string().parse::<EmergencyStatus>().unwrap(), *status);
        }
    }

    #[test]
    fn test_serde_uses_display_labels() {
        let json = serde_json::to_string(&StockStatus::OutOfStock).unwrap();
        assert_eq!(json, "\"Out of Stock\"");

        let status: EmergencyStatus =
            serde_json::from_str("\"Approved-Sent-to-BranchManager\"").unwrap();
        assert_eq!(status, EmergencyStatus::SentToBranchManager);

        let role: Role = serde_json::from_str("\"Fire Brigade\"").unwrap();
        assert_eq!(role, Role::FireBrigade);
    }

    #[test]
    fn test_unknown_label_is_rejected() {
        let err = "Lost".parse::<OrderStatus>().unwrap_err();
        assert_eq!(err.kind, "order status");
        assert_eq!(err.value, "Lost");
        assert!(serde_json::from_str::<OrderStatus>("\"lost\"").is_err());
    }

    #[test]
    fn test_labels_are_case_sensitive() {
        assert!("pending".parse::<OrderStatus>().is_err());
        assert_eq!("Pending".parse::<OrderStatus>().unwrap(), OrderStatus::Pending);
    }

    #[test]
    fn test_terminal_request_states() {
        assert!(RequestStatus::Rejected.is_terminal());
        assert!(RequestStatus::Completed.is_terminal());
        assert!(!RequestStatus::Pending.is_terminal());
        assert!(!RequestStatus::Approved.is_terminal());
    }
}
