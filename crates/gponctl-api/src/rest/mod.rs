// Vendor REST transport.
//
// Base URL: `http://{address}:1661` unless the target names its own endpoint.
// Auth: HTTP Basic when the target carries REST credentials.
// Every mutating endpoint answers `{ "success": bool, "message"?: string }`.

use async_trait::async_trait;
use reqwest::Method;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::adapter::{DeviceAdapter, OpticalPower, PppoeRequest, RawUnit, UnitAddress, UnitListing};
use crate::error::Error;
use crate::target::DeviceTarget;
use crate::transport::TransportConfig;

// ── Wire shapes ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Serialize)]
struct UnitBody<'a> {
    pon_port: u32,
    onu_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    serial_number: Option<&'a str>,
}

impl<'a> UnitBody<'a> {
    fn new(unit: UnitAddress) -> Self {
        Self {
            pon_port: unit.pon_port,
            onu_id: unit.onu_id,
            serial_number: None,
        }
    }

    fn with_serial(unit: UnitAddress, serial: &'a str) -> Self {
        Self {
            serial_number: Some(serial),
            ..Self::new(unit)
        }
    }
}

#[derive(Serialize)]
struct PppoeBody<'a> {
    pon_port: u32,
    onu_id: u32,
    username: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    vlan_id: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    service_name: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct UnitList {
    #[serde(default)]
    onus: Vec<WireUnit>,
}

/// One `/api/onu/list` entry. Power is already in dBm.
#[derive(Debug, Deserialize)]
struct WireUnit {
    pon_port: u32,
    onu_id: u32,
    #[serde(default)]
    serial_number: Option<String>,
    #[serde(default)]
    status: Option<serde_json::Value>,
    #[serde(default)]
    rx_power: Option<f64>,
    #[serde(default)]
    tx_power: Option<f64>,
    #[serde(default)]
    rx_bytes: Option<u64>,
    #[serde(default)]
    tx_bytes: Option<u64>,
}

impl From<WireUnit> for RawUnit {
    fn from(w: WireUnit) -> Self {
        let status = match w.status {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        Self {
            pon_port: w.pon_port,
            onu_id: w.onu_id,
            serial_number: w.serial_number.unwrap_or_default(),
            status,
            rx_power: w.rx_power.map(OpticalPower::Dbm),
            tx_power: w.tx_power.map(OpticalPower::Dbm),
            rx_bytes: w.rx_bytes,
            tx_bytes: w.tx_bytes,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UnitStatus {
    #[serde(default)]
    status: Option<serde_json::Value>,
}

// ── Adapter ─────────────────────────────────────────────────────────

/// Client for the OLT's vendor REST API.
#[derive(Debug, Clone)]
pub struct RestAdapter {
    http: reqwest::Client,
    max_rows: usize,
}

impl RestAdapter {
    pub fn new(transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            max_rows: transport.max_rows,
        })
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn from_reqwest(http: reqwest::Client, max_rows: usize) -> Self {
        Self { http, max_rows }
    }

    /// Append `path` to the base URL, keeping any path prefix the endpoint has.
    fn url(target: &DeviceTarget, path: &str) -> Result<Url, Error> {
        let base = target.rest.base_url(&target.address)?;
        Ok(Url::parse(&format!("{}/{path}", base.as_str().trim_end_matches('/')))?)
    }

    async fn send<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        target: &DeviceTarget,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<T, Error> {
        let url = Self::url(target, path)?;
        debug!("{method} {url}");

        let mut request = self.http.request(method, url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let (Some(user), Some(password)) = (&target.rest.username, &target.rest.password) {
            request = request.basic_auth(user, Some(password.expose_secret()));
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let resp = request.send().await?;
        Self::handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();
        let body = resp.text().await?;
        // Only 200 and 201 count; other 2xx codes are not part of the API.
        if status != reqwest::StatusCode::OK && status != reqwest::StatusCode::CREATED {
            if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
                return Err(Error::Authentication {
                    message: format!("REST API answered HTTP {}", status.as_u16()),
                });
            }
            return Err(Error::Http {
                status: status.as_u16(),
                message: if body.is_empty() {
                    status.to_string()
                } else {
                    body
                },
            });
        }
        serde_json::from_str(&body).map_err(|e| {
            let preview = body
                .char_indices()
                .nth(200)
                .map_or(body.as_str(), |(end, _)| &body[..end]);
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body,
            }
        })
    }

    /// Send a command and require `success: true`.
    async fn command<B: Serialize + Sync>(
        &self,
        target: &DeviceTarget,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<(), Error> {
        let envelope: Envelope = self.send(target, method, path, &[], Some(body)).await?;
        if envelope.success {
            Ok(())
        } else {
            Err(Error::Rejected {
                message: envelope
                    .message
                    .unwrap_or_else(|| format!("{path} reported success=false")),
            })
        }
    }
}

#[async_trait]
impl DeviceAdapter for RestAdapter {
    fn name(&self) -> &'static str {
        "rest"
    }

    /// Any JSON document from `/api/olt/status` means the OLT is up.
    async fn read_status(&self, target: &DeviceTarget) -> Result<bool, Error> {
        let _: serde_json::Value = self
            .send(target, Method::GET, "api/olt/status", &[], None::<&()>)
            .await?;
        Ok(true)
    }

    async fn list_units(&self, target: &DeviceTarget) -> Result<UnitListing, Error> {
        let list: UnitList = self
            .send(target, Method::GET, "api/onu/list", &[], None::<&()>)
            .await?;
        let truncated = list.onus.len() > self.max_rows;
        let units = list
            .onus
            .into_iter()
            .take(self.max_rows)
            .map(RawUnit::from)
            .collect();
        Ok(UnitListing { units, truncated })
    }

    async fn read_unit_status(&self, target: &DeviceTarget, unit: UnitAddress) -> Result<String, Error> {
        let query = [
            ("pon_port", unit.pon_port.to_string()),
            ("onu_id", unit.onu_id.to_string()),
        ];
        let reply: UnitStatus = self
            .send(target, Method::GET, "api/onu/status", &query, None::<&()>)
            .await?;
        match reply.status {
            Some(serde_json::Value::String(s)) => Ok(s),
            Some(serde_json::Value::Null) | None => {
                Err(Error::protocol(format!("no status for ONU {unit}")))
            }
            Some(other) => Ok(other.to_string()),
        }
    }

    async fn provision_unit(&self, target: &DeviceTarget, unit: UnitAddress, serial: &str) -> Result<(), Error> {
        self.command(target, Method::POST, "api/onu/provision", &UnitBody::with_serial(unit, serial))
            .await
    }

    async fn delete_unit(&self, target: &DeviceTarget, unit: UnitAddress) -> Result<(), Error> {
        self.command(target, Method::DELETE, "api/onu/delete", &UnitBody::new(unit))
            .await
    }

    async fn update_unit_serial(&self, target: &DeviceTarget, unit: UnitAddress, serial: &str) -> Result<(), Error> {
        self.command(target, Method::PUT, "api/onu/update-serial", &UnitBody::with_serial(unit, serial))
            .await
    }

    async fn reboot_unit(&self, target: &DeviceTarget, unit: UnitAddress) -> Result<(), Error> {
        self.command(target, Method::POST, "api/onu/reboot", &UnitBody::new(unit))
            .await
    }

    async fn reset_unit(&self, target: &DeviceTarget, unit: UnitAddress) -> Result<(), Error> {
        self.command(target, Method::POST, "api/onu/reset", &UnitBody::new(unit))
            .await
    }

    async fn create_pppoe_account(
        &self,
        target: &DeviceTarget,
        unit: UnitAddress,
        request: &PppoeRequest,
    ) -> Result<(), Error> {
        let body = PppoeBody {
            pon_port: unit.pon_port,
            onu_id: unit.onu_id,
            username: &request.username,
            password: request.password.expose_secret(),
            vlan_id: request.vlan_id,
            service_name: request.service_name.as_deref(),
        };
        self.command(target, Method::POST, "api/onu/pppoe/create", &body)
            .await
    }
}
