// ── Wire-to-domain conversion ──
//
// Raw adapter replies become canonical records here. Status words and
// power encodings differ per transport and vendor; nothing downstream of
// this module sees them.

use std::collections::{HashMap, HashSet};

use gponctl_api::{
    DeviceTarget, Performance, RawUnit, SnmpVersion, SystemInfo, UnitListing,
};
use tracing::warn;

use crate::crypto::SecretCipher;
use crate::error::CoreError;
use crate::model::{Olt, OltPerformance, OnuStatus, PollSnapshot, SystemSummary, UnitSnapshot};

// ── Status words ─────────────────────────────────────────────────────

/// Map device status text to [`OnuStatus`]. Case-insensitive.
pub fn normalize_status(raw: &str) -> OnuStatus {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "online" | "up" | "working" => OnuStatus::Online,
        "0" | "2" | "offline" | "down" | "los" | "dyinggasp" => OnuStatus::Offline,
        _ => OnuStatus::Unknown,
    }
}

// ── Units ────────────────────────────────────────────────────────────

pub fn unit_snapshot(raw: RawUnit) -> UnitSnapshot {
    UnitSnapshot {
        pon_port: raw.pon_port,
        onu_id: raw.onu_id,
        serial_number: raw.serial_number.trim().to_owned(),
        status: normalize_status(&raw.status),
        rx_power_dbm: raw.rx_power.map(gponctl_api::OpticalPower::dbm),
        tx_power_dbm: raw.tx_power.map(gponctl_api::OpticalPower::dbm),
        rx_bytes: raw.rx_bytes,
        tx_bytes: raw.tx_bytes,
    }
}

/// Normalize a listing, dropping blank serials and rejecting duplicates.
///
/// A `(pon_port, onu_id)` or serial seen twice in one listing is a
/// protocol error: the device contradicted itself and reconciling either
/// copy would be a guess.
pub fn normalize_listing(listing: UnitListing) -> Result<PollSnapshot, CoreError> {
    let mut positions = HashMap::with_capacity(listing.units.len());
    let mut serials = HashSet::with_capacity(listing.units.len());
    let mut units = Vec::with_capacity(listing.units.len());

    for raw in listing.units {
        let unit = unit_snapshot(raw);
        if unit.serial_number.is_empty() {
            warn!(
                pon_port = unit.pon_port,
                onu_id = unit.onu_id,
                "dropping unit without serial number"
            );
            continue;
        }
        if let Some(previous) = positions.insert((unit.pon_port, unit.onu_id), unit.serial_number.clone()) {
            return Err(CoreError::protocol(format!(
                "duplicate unit at port {} onu {} ({previous} and {})",
                unit.pon_port, unit.onu_id, unit.serial_number
            )));
        }
        if !serials.insert(unit.serial_number.clone()) {
            return Err(CoreError::protocol(format!(
                "serial {} reported at more than one position",
                unit.serial_number
            )));
        }
        units.push(unit);
    }

    Ok(PollSnapshot {
        units,
        truncated: listing.truncated,
    })
}

// ── OLT-level readings ───────────────────────────────────────────────

pub fn performance(raw: Performance) -> OltPerformance {
    OltPerformance {
        cpu_usage: raw.cpu_usage,
        memory_usage: raw.memory_usage,
        temperature: raw.temperature,
        uptime_secs: raw.uptime_secs,
    }
}

pub fn system_summary(raw: SystemInfo) -> SystemSummary {
    SystemSummary {
        system_name: raw.name,
        description: raw.description,
        uptime_secs: raw.uptime_secs,
        location: raw.location,
    }
}

/// Firmware string worth backfilling: a description that names a version.
pub fn firmware_from_description(description: &str) -> Option<String> {
    description
        .to_ascii_lowercase()
        .contains("version")
        .then(|| description.trim().to_owned())
}

// ── Device addressing ────────────────────────────────────────────────

/// Build the per-call adapter target, decrypting stored credentials.
pub fn device_target(olt: &Olt, cipher: &SecretCipher) -> DeviceTarget {
    let mut target = DeviceTarget::new(olt.ip_address.clone());

    target.snmp.version = if olt.snmp.version >= 3 {
        SnmpVersion::V3
    } else {
        SnmpVersion::V2c
    };
    target.snmp.port = olt.snmp.port;
    target.snmp.community = cipher.reveal(&olt.snmp.community);
    target.snmp.username.clone_from(&olt.snmp.username);
    target.snmp.password = olt.snmp.password.as_ref().map(|p| cipher.reveal(p));

    target.ssh.port = olt.ssh.port;
    if let Some(user) = olt.ssh.username.as_deref().filter(|u| !u.is_empty()) {
        user.clone_into(&mut target.ssh.username);
    }
    target.ssh.password = olt.ssh.password.as_ref().map(|p| cipher.reveal(p));

    target.rest.endpoint.clone_from(&olt.api.endpoint);
    target.rest.username.clone_from(&olt.api.username);
    target.rest.password = olt.api.password.as_ref().map(|p| cipher.reveal(p));

    target
}
