// SNMP implementation of the device capability set.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tracing::{debug, warn};

use crate::adapter::{
    DeviceAdapter, OpticalPower, Performance, PppoeRequest, RawUnit, SystemInfo, UnitAddress,
    UnitListing,
};
use crate::error::Error;
use crate::target::DeviceTarget;
use crate::transport::TransportConfig;

use super::oid::{Oid, OidTable};
use super::pdu::{Value, VarBind};
use super::session::Session;

/// Stateless SNMP adapter. Opens a fresh session per call.
#[derive(Debug, Clone)]
pub struct SnmpAdapter {
    oids: Arc<OidTable>,
    transport: TransportConfig,
}

impl SnmpAdapter {
    pub fn new(oids: OidTable, transport: TransportConfig) -> Self {
        Self {
            oids: Arc::new(oids),
            transport,
        }
    }

    pub fn oids(&self) -> &OidTable {
        &self.oids
    }

    async fn session(&self, target: &DeviceTarget) -> Result<Session, Error> {
        Session::open(&target.address, &target.snmp, &self.transport).await
    }

    async fn set_flag(&self, target: &DeviceTarget, column: &Oid, unit: UnitAddress) -> Result<(), Error> {
        let mut session = self.session(target).await?;
        session
            .set(&indexed(column, unit), Value::Integer(1))
            .await
    }

    /// Walk ports, then ONUs per port, then fetch each ONU's row.
    async fn collect_units(
        &self,
        session: &mut Session,
        units: &mut Vec<RawUnit>,
    ) -> Result<bool, Error> {
        let max_rows = session.max_rows();
        let (port_rows, _) = session.walk(&self.oids.pon_ports, max_rows).await?;

        for port_row in port_rows {
            let pon_port = index_value(&port_row, "PON port")?;
            let list_root = self.oids.onu_list.child(&[pon_port]);
            let (onu_rows, _) = session.walk(&list_root, max_rows).await?;

            for onu_row in onu_rows {
                if units.len() >= max_rows {
                    return Ok(true);
                }
                let onu_id = index_value(&onu_row, "ONU")?;
                let unit = UnitAddress::new(pon_port, onu_id);
                let row = session
                    .get(&[
                        indexed(&self.oids.onu_serial, unit),
                        indexed(&self.oids.onu_status, unit),
                        indexed(&self.oids.onu_rx_power, unit),
                        indexed(&self.oids.onu_tx_power, unit),
                    ])
                    .await?;
                let [serial, status, rx, tx] = row.as_slice() else {
                    return Err(Error::protocol(format!(
                        "expected 4 bindings for ONU {unit}, got {}",
                        row.len()
                    )));
                };

                let serial_number = serial.value.as_text().unwrap_or_default();
                if serial_number.is_empty() {
                    debug!(%unit, "skipping ONU row without serial");
                    continue;
                }
                units.push(RawUnit {
                    pon_port,
                    onu_id,
                    serial_number,
                    status: status.value.as_text().unwrap_or_default(),
                    rx_power: power(&rx.value),
                    tx_power: power(&tx.value),
                    rx_bytes: None,
                    tx_bytes: None,
                });
            }
        }
        Ok(false)
    }
}

fn indexed(column: &Oid, unit: UnitAddress) -> Oid {
    column.child(&[unit.pon_port, unit.onu_id])
}

fn index_value(row: &VarBind, what: &str) -> Result<u32, Error> {
    row.value
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| Error::protocol(format!("{what} index at {} is not numeric", row.oid)))
}

#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn power(value: &Value) -> Option<OpticalPower> {
    if value.is_absent() {
        return None;
    }
    value
        .as_i64()
        .map(OpticalPower::CentiDbm)
        .or_else(|| value.as_f64().map(|v| OpticalPower::Dbm(v / 100.0)))
}

fn text(value: &Value) -> Option<String> {
    value.as_text().filter(|s| !s.is_empty())
}

#[async_trait]
impl DeviceAdapter for SnmpAdapter {
    fn name(&self) -> &'static str {
        "snmp"
    }

    async fn read_system_info(&self, target: &DeviceTarget) -> Result<SystemInfo, Error> {
        let mut session = self.session(target).await?;
        let row = session
            .get(&[
                self.oids.sys_descr.clone(),
                self.oids.sys_uptime.clone(),
                self.oids.sys_name.clone(),
                self.oids.sys_location.clone(),
            ])
            .await?;
        let [descr, uptime, name, location] = row.as_slice() else {
            return Err(Error::protocol("system group reply has wrong arity"));
        };
        Ok(SystemInfo {
            name: text(&name.value),
            description: text(&descr.value),
            uptime_secs: uptime.value.as_u64().map(|ticks| ticks / 100),
            location: text(&location.value),
        })
    }

    async fn read_status(&self, target: &DeviceTarget) -> Result<bool, Error> {
        let info = self.read_system_info(target).await?;
        Ok(info.name.is_some())
    }

    async fn read_performance(&self, target: &DeviceTarget) -> Result<Performance, Error> {
        let mut session = self.session(target).await?;
        let row = session
            .get(&[
                self.oids.sys_uptime.clone(),
                self.oids.cpu_usage.clone(),
                self.oids.memory_usage.clone(),
                self.oids.temperature.clone(),
            ])
            .await?;
        let [uptime, cpu, memory, temperature] = row.as_slice() else {
            return Err(Error::protocol("performance reply has wrong arity"));
        };
        Ok(Performance {
            cpu_usage: cpu.value.as_f64(),
            memory_usage: memory.value.as_f64(),
            temperature: temperature.value.as_f64(),
            uptime_secs: uptime.value.as_u64().map(|ticks| ticks / 100),
        })
    }

    async fn list_units(&self, target: &DeviceTarget) -> Result<UnitListing, Error> {
        let mut session = self.session(target).await?;
        let mut units = Vec::new();
        match self.collect_units(&mut session, &mut units).await {
            Ok(truncated) => {
                if truncated {
                    warn!(address = %target.address, cap = units.len(), "ONU enumeration hit row cap");
                }
                Ok(UnitListing { units, truncated })
            }
            Err(Error::PartialList { fetched, reason }) => Err(Error::PartialList {
                fetched: fetched.max(units.len()),
                reason,
            }),
            Err(e) if units.is_empty() => Err(e),
            Err(e) => Err(Error::PartialList {
                fetched: units.len(),
                reason: e.to_string(),
            }),
        }
    }

    async fn read_unit_status(&self, target: &DeviceTarget, unit: UnitAddress) -> Result<String, Error> {
        let mut session = self.session(target).await?;
        let value = session.get_one(&indexed(&self.oids.onu_status, unit)).await?;
        value
            .and_then(|v| v.as_text())
            .ok_or_else(|| Error::protocol(format!("no status for ONU {unit}")))
    }

    async fn provision_unit(&self, target: &DeviceTarget, unit: UnitAddress, serial: &str) -> Result<(), Error> {
        let mut session = self.session(target).await?;
        session
            .set(
                &indexed(&self.oids.onu_provision, unit),
                Value::OctetString(serial.as_bytes().to_vec()),
            )
            .await
    }

    async fn delete_unit(&self, target: &DeviceTarget, unit: UnitAddress) -> Result<(), Error> {
        self.set_flag(target, &self.oids.onu_delete, unit).await
    }

    async fn reboot_unit(&self, target: &DeviceTarget, unit: UnitAddress) -> Result<(), Error> {
        self.set_flag(target, &self.oids.onu_reboot, unit).await
    }

    async fn reset_unit(&self, target: &DeviceTarget, unit: UnitAddress) -> Result<(), Error> {
        self.set_flag(target, &self.oids.onu_reset, unit).await
    }

    async fn create_pppoe_account(
        &self,
        target: &DeviceTarget,
        unit: UnitAddress,
        request: &PppoeRequest,
    ) -> Result<(), Error> {
        let mut varbinds = vec![
            VarBind::new(
                indexed(&self.oids.pppoe_username, unit),
                Value::OctetString(request.username.as_bytes().to_vec()),
            ),
            VarBind::new(
                indexed(&self.oids.pppoe_password, unit),
                Value::OctetString(request.password.expose_secret().as_bytes().to_vec()),
            ),
        ];
        if let Some(vlan) = request.vlan_id {
            varbinds.push(VarBind::new(
                indexed(&self.oids.pppoe_vlan, unit),
                Value::Integer(i64::from(vlan)),
            ));
        }
        let mut session = self.session(target).await?;
        session.set_many(varbinds).await
    }
}
