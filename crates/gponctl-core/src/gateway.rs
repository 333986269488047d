// ── Device Gateway ──
//
// Single dispatch point between the engine and the transport adapters.
// The operator picks the method; the gateway never retries an operation
// over a different transport.

use std::sync::Arc;

use gponctl_api::{
    DeviceAdapter, DeviceTarget, OidTable, PppoeRequest, RestAdapter, SnmpAdapter, SshAdapter,
    TransportConfig, UnitAddress,
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use tracing::debug;

use crate::convert;
use crate::error::CoreError;
use crate::model::{OltPerformance, OltStatus, OnuStatus, PollSnapshot, PppoeCredentials, SystemSummary};

// ── Method / Operation ───────────────────────────────────────────────

/// Transport chosen for an operation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum Method {
    #[default]
    #[strum(to_string = "snmp")]
    Snmp,
    #[strum(to_string = "ssh")]
    Ssh,
    #[serde(alias = "rest_api")]
    #[strum(to_string = "rest", serialize = "rest_api")]
    Rest,
}

/// A device-side ONU operation.
#[derive(Debug, Clone)]
pub enum Operation {
    Provision { serial: String },
    Delete,
    UpdateSerial { serial: String },
    Reboot,
    Reset,
    CreatePppoe { credentials: PppoeCredentials },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Provision { .. } => "provision",
            Self::Delete => "delete",
            Self::UpdateSerial { .. } => "update_serial",
            Self::Reboot => "reboot",
            Self::Reset => "reset",
            Self::CreatePppoe { .. } => "create_pppoe",
        }
    }
}

/// Liveness verdict plus whatever system info the SNMP probe returned.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusProbe {
    pub status: OltStatus,
    pub system: Option<SystemSummary>,
}

// ── DeviceGateway ────────────────────────────────────────────────────

/// Holds one adapter per [`Method`]; adapters are injected at construction.
#[derive(Clone)]
pub struct DeviceGateway {
    snmp: Arc<dyn DeviceAdapter>,
    ssh: Arc<dyn DeviceAdapter>,
    rest: Arc<dyn DeviceAdapter>,
}

impl std::fmt::Debug for DeviceGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceGateway")
            .field("snmp", &self.snmp.name())
            .field("ssh", &self.ssh.name())
            .field("rest", &self.rest.name())
            .finish()
    }
}

impl DeviceGateway {
    pub fn new(
        snmp: Arc<dyn DeviceAdapter>,
        ssh: Arc<dyn DeviceAdapter>,
        rest: Arc<dyn DeviceAdapter>,
    ) -> Self {
        Self { snmp, ssh, rest }
    }

    /// Gateway over the real SNMP, SSH and REST adapters.
    pub fn from_transport(transport: &TransportConfig, oids: OidTable) -> Result<Self, CoreError> {
        Ok(Self::new(
            Arc::new(SnmpAdapter::new(oids, transport.clone())),
            Arc::new(SshAdapter::new(transport.clone())),
            Arc::new(RestAdapter::new(transport)?),
        ))
    }

    pub fn adapter(&self, method: Method) -> &Arc<dyn DeviceAdapter> {
        match method {
            Method::Snmp => &self.snmp,
            Method::Ssh => &self.ssh,
            Method::Rest => &self.rest,
        }
    }

    // ── Polling ──────────────────────────────────────────────────────

    /// Online if SNMP returns a non-empty sysName or the REST status call
    /// succeeds. Errors count as "no".
    pub async fn probe(&self, target: &DeviceTarget) -> StatusProbe {
        let system = match self.snmp.read_system_info(target).await {
            Ok(info) => Some(convert::system_summary(info)),
            Err(e) => {
                debug!(address = %target.address, error = %e, "SNMP status probe failed");
                None
            }
        };
        let named = system
            .as_ref()
            .and_then(|s| s.system_name.as_deref())
            .is_some_and(|name| !name.trim().is_empty());
        if named {
            return StatusProbe {
                status: OltStatus::Online,
                system,
            };
        }

        let status = match self.rest.read_status(target).await {
            Ok(true) => OltStatus::Online,
            Ok(false) => OltStatus::Offline,
            Err(e) => {
                debug!(address = %target.address, error = %e, "REST status probe failed");
                OltStatus::Offline
            }
        };
        StatusProbe { status, system }
    }

    pub async fn poll_status(&self, target: &DeviceTarget) -> OltStatus {
        self.probe(target).await.status
    }

    pub async fn poll_performance(&self, target: &DeviceTarget) -> Result<OltPerformance, CoreError> {
        let raw = self.snmp.read_performance(target).await?;
        Ok(convert::performance(raw))
    }

    pub async fn system_info(&self, target: &DeviceTarget) -> Result<SystemSummary, CoreError> {
        let raw = self.snmp.read_system_info(target).await?;
        Ok(convert::system_summary(raw))
    }

    /// Enumerate and normalize units. All-or-nothing.
    pub async fn list_units(&self, target: &DeviceTarget, method: Method) -> Result<PollSnapshot, CoreError> {
        let listing = self
            .adapter(method)
            .list_units(target)
            .await
            .map_err(|e| with_method(e.into(), method))?;
        convert::normalize_listing(listing)
    }

    pub async fn unit_status(
        &self,
        target: &DeviceTarget,
        unit: UnitAddress,
        method: Method,
    ) -> Result<OnuStatus, CoreError> {
        let raw = self
            .adapter(method)
            .read_unit_status(target, unit)
            .await
            .map_err(|e| with_method(e.into(), method))?;
        Ok(convert::normalize_status(&raw))
    }

    // ── Operations ───────────────────────────────────────────────────

    /// Run `operation` against one ONU over `method` only.
    pub async fn execute(
        &self,
        target: &DeviceTarget,
        unit: UnitAddress,
        operation: &Operation,
        method: Method,
    ) -> Result<(), CoreError> {
        let adapter = self.adapter(method);
        debug!(address = %target.address, %unit, %method, op = operation.name(), "executing");
        let result = match operation {
            Operation::Provision { serial } => adapter.provision_unit(target, unit, serial).await,
            Operation::Delete => adapter.delete_unit(target, unit).await,
            Operation::UpdateSerial { serial } => adapter.update_unit_serial(target, unit, serial).await,
            Operation::Reboot => adapter.reboot_unit(target, unit).await,
            Operation::Reset => adapter.reset_unit(target, unit).await,
            Operation::CreatePppoe { credentials } => {
                let request = PppoeRequest {
                    username: credentials.username.clone(),
                    password: credentials.password.clone(),
                    vlan_id: credentials.vlan_id,
                    service_name: credentials.service_name.clone(),
                };
                adapter.create_pppoe_account(target, unit, &request).await
            }
        };
        result.map_err(|e| with_method(e.into(), method))
    }
}

fn with_method(err: CoreError, method: Method) -> CoreError {
    match err {
        CoreError::Unsupported { operation, .. } => CoreError::Unsupported {
            operation,
            method: method.to_string(),
        },
        other => other,
    }
}
