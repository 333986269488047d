// ── Inventory row identifiers ──
//
// Numeric surrogate keys assigned by the Inventory Store. Each entity
// gets its own newtype so an ONU row id can never be passed where an
// OLT id is expected.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                Self(v)
            }
        }
    };
}

row_id!(
    /// Inventory id of an OLT.
    OltId
);
row_id!(
    /// Inventory id of an ONU row. Not the device-side ONU index.
    UnitId
);
row_id!(AlarmId);
row_id!(PppoeAccountId);
