// Object identifiers and the vendor OID table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// A numeric SNMP object identifier (`1.3.6.1.2.1.1.5.0`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Oid(Vec<u32>);

impl Oid {
    pub fn new(arcs: Vec<u32>) -> Self {
        Self(arcs)
    }

    pub fn arcs(&self) -> &[u32] {
        &self.0
    }

    /// This OID extended with `arcs`.
    pub fn child(&self, arcs: &[u32]) -> Self {
        let mut out = self.0.clone();
        out.extend_from_slice(arcs);
        Self(out)
    }

    pub fn starts_with(&self, prefix: &Oid) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// The arcs following `prefix`, if this OID is inside that subtree.
    pub fn suffix(&self, prefix: &Oid) -> Option<&[u32]> {
        self.0.strip_prefix(prefix.0.as_slice())
    }
}

impl FromStr for Oid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('.');
        if trimmed.is_empty() {
            return Err(Error::protocol("empty OID"));
        }
        let arcs = trimmed
            .split('.')
            .map(|arc| {
                arc.parse::<u32>()
                    .map_err(|_| Error::protocol(format!("invalid OID arc '{arc}' in '{s}'")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if arcs.len() < 2 {
            return Err(Error::protocol(format!("OID '{s}' needs at least two arcs")));
        }
        Ok(Self(arcs))
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arc in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{arc}")?;
            first = false;
        }
        Ok(())
    }
}

impl Serialize for Oid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Oid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ── Vendor OID table ────────────────────────────────────────────────

/// OIDs used by the SNMP adapter.
///
/// Vendor MIBs move between firmware releases, so every entry can be
/// overridden from configuration. Defaults follow the ZTE C3xx layout
/// under enterprise `1.3.6.1.4.1.3902`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OidTable {
    pub sys_descr: Oid,
    pub sys_uptime: Oid,
    pub sys_name: Oid,
    pub sys_location: Oid,
    /// Column whose values enumerate PON port indexes.
    pub pon_ports: Oid,
    /// Per-port column (`.{port}`) whose values are ONU indexes.
    pub onu_list: Oid,
    /// Per-ONU columns, indexed `.{port}.{onu}`.
    pub onu_serial: Oid,
    pub onu_status: Oid,
    pub onu_rx_power: Oid,
    pub onu_tx_power: Oid,
    pub onu_provision: Oid,
    pub onu_delete: Oid,
    pub onu_reboot: Oid,
    pub onu_reset: Oid,
    pub pppoe_username: Oid,
    pub pppoe_password: Oid,
    pub pppoe_vlan: Oid,
    pub cpu_usage: Oid,
    pub memory_usage: Oid,
    pub temperature: Oid,
}

fn zte(arcs: &[u32]) -> Oid {
    Oid::new([1, 3, 6, 1, 4, 1, 3902].iter().chain(arcs).copied().collect())
}

fn onu_column(column: u32) -> Oid {
    zte(&[1015, 1, 1, 1, 1, column])
}

impl Default for OidTable {
    fn default() -> Self {
        Self {
            sys_descr: Oid::new(vec![1, 3, 6, 1, 2, 1, 1, 1, 0]),
            sys_uptime: Oid::new(vec![1, 3, 6, 1, 2, 1, 1, 3, 0]),
            sys_name: Oid::new(vec![1, 3, 6, 1, 2, 1, 1, 5, 0]),
            sys_location: Oid::new(vec![1, 3, 6, 1, 2, 1, 1, 6, 0]),
            pon_ports: onu_column(1),
            onu_list: onu_column(2),
            onu_serial: onu_column(3),
            onu_status: onu_column(4),
            onu_rx_power: onu_column(5),
            onu_tx_power: onu_column(6),
            onu_provision: onu_column(7),
            onu_delete: onu_column(8),
            onu_reboot: onu_column(9),
            onu_reset: onu_column(10),
            pppoe_username: onu_column(11),
            pppoe_password: onu_column(12),
            pppoe_vlan: onu_column(13),
            cpu_usage: zte(&[1010, 1, 1, 1, 1, 1]),
            memory_usage: zte(&[1010, 1, 1, 1, 1, 2]),
            temperature: zte(&[1010, 1, 1, 1, 1, 3]),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let oid: Oid = ".1.3.6.1.2.1.1.5.0".parse().unwrap();
        assert_eq!(oid.arcs(), &[1, 3, 6, 1, 2, 1, 1, 5, 0]);
        assert_eq!(oid.to_string(), "1.3.6.1.2.1.1.5.0");
    }

    #[test]
    fn rejects_garbage() {
        assert!("1.3.x".parse::<Oid>().is_err());
        assert!("".parse::<Oid>().is_err());
        assert!("1".parse::<Oid>().is_err());
    }

    #[test]
    fn suffix_inside_subtree() {
        let root: Oid = "1.3.6.1.4.1.3902.1015.1.1.1.1.2".parse().unwrap();
        let row = root.child(&[4, 12]);
        assert!(row.starts_with(&root));
        assert_eq!(row.suffix(&root), Some(&[4, 12][..]));
        let other: Oid = "1.3.6.1.4.1.3902.1015.1.1.1.1.3.4".parse().unwrap();
        assert_eq!(other.suffix(&root), None);
    }

    #[test]
    fn default_table_matches_vendor_layout() {
        let table = OidTable::default();
        assert_eq!(table.onu_serial.to_string(), "1.3.6.1.4.1.3902.1015.1.1.1.1.3");
        assert_eq!(table.temperature.to_string(), "1.3.6.1.4.1.3902.1010.1.1.1.1.3");
    }

    #[test]
    fn table_overrides_from_json() {
        let table: OidTable =
            serde_json::from_value(serde_json::json!({ "cpu_usage": "1.3.6.1.4.1.9.9.109.1.1.1.1.5" }))
                .unwrap();
        assert_eq!(table.cpu_usage.to_string(), "1.3.6.1.4.1.9.9.109.1.1.1.1.5");
        assert_eq!(table.sys_name, OidTable::default().sys_name);
    }
}
