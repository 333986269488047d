//! OLT command handlers.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;
use tabled::Tabled;

use gponctl_core::{Controller, Olt, OltId, OltPerformance, OltStatus, StoredSecret};

use crate::cli::{GlobalOpts, OltAddArgs, OltsArgs, OltsCommand};
use crate::error::CliError;
use crate::output::{self, or_dash};

// ── Views ───────────────────────────────────────────────────────────

/// An OLT as shown to the operator. Credentials never leave the inventory.
#[derive(Serialize)]
struct OltView {
    id: OltId,
    name: String,
    hostname: Option<String>,
    ip_address: String,
    vendor: String,
    model: Option<String>,
    firmware_version: Option<String>,
    location: Option<String>,
    status: OltStatus,
    performance: OltPerformance,
    last_polled_at: Option<DateTime<Utc>>,
    snmp_version: u8,
    ssh_user: Option<String>,
    api_endpoint: Option<String>,
}

impl From<&Olt> for OltView {
    fn from(o: &Olt) -> Self {
        Self {
            id: o.id,
            name: o.name.clone(),
            hostname: o.hostname.clone(),
            ip_address: o.ip_address.clone(),
            vendor: o.vendor.clone(),
            model: o.model.clone(),
            firmware_version: o.firmware_version.clone(),
            location: o.location.clone(),
            status: o.status,
            performance: o.performance.clone(),
            last_polled_at: o.last_polled_at,
            snmp_version: o.snmp.version,
            ssh_user: o.ssh.username.clone(),
            api_endpoint: o.api.endpoint.clone(),
        }
    }
}

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct OltRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "Vendor")]
    vendor: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory")]
    memory: String,
    #[tabled(rename = "Temp")]
    temperature: String,
    #[tabled(rename = "Last Poll")]
    last_polled: String,
}

fn row(v: &OltView, color: bool) -> OltRow {
    OltRow {
        id: v.id.to_string(),
        name: v.name.clone(),
        ip: v.ip_address.clone(),
        vendor: v.vendor.clone(),
        status: output::paint_status(&v.status.to_string(), color),
        cpu: v
            .performance
            .cpu_usage
            .map_or_else(|| "-".into(), |c| format!("{c:.1}%")),
        memory: v
            .performance
            .memory_usage
            .map_or_else(|| "-".into(), |m| format!("{m:.1}%")),
        temperature: v
            .performance
            .temperature
            .map_or_else(|| "-".into(), |t| format!("{t:.1}°C")),
        last_polled: or_dash(v.last_polled_at.map(|t| t.format("%Y-%m-%d %H:%M:%S"))),
    }
}

fn detail(v: &OltView) -> String {
    let mut lines = vec![
        format!("ID:        {}", v.id),
        format!("Name:      {}", v.name),
        format!("Hostname:  {}", or_dash(v.hostname.as_deref())),
        format!("IP:        {}", v.ip_address),
        format!("Vendor:    {}", v.vendor),
        format!("Model:     {}", or_dash(v.model.as_deref())),
        format!("Firmware:  {}", or_dash(v.firmware_version.as_deref())),
        format!("Location:  {}", or_dash(v.location.as_deref())),
        format!("Status:    {}", v.status),
        format!("SNMP:      v{}", v.snmp_version),
    ];
    if let Some(user) = &v.ssh_user {
        lines.push(format!("SSH user:  {user}"));
    }
    if let Some(endpoint) = &v.api_endpoint {
        lines.push(format!("REST:      {endpoint}"));
    }
    if let Some(up) = v.performance.uptime_secs {
        lines.push(format!("Uptime:    {up}s"));
    }
    if let Some(cpu) = v.performance.cpu_usage {
        lines.push(format!("CPU:       {cpu:.1}%"));
    }
    if let Some(mem) = v.performance.memory_usage {
        lines.push(format!("Memory:    {mem:.1}%"));
    }
    if let Some(temp) = v.performance.temperature {
        lines.push(format!("Temp:      {temp:.1}°C"));
    }
    if let Some(at) = v.last_polled_at {
        lines.push(format!("Polled:    {}", at.format("%Y-%m-%d %H:%M:%S")));
    }
    lines.join("\n")
}

// ── Registration ────────────────────────────────────────────────────

fn seal(controller: &Controller, value: Option<String>) -> Result<Option<StoredSecret>, CliError> {
    value
        .filter(|v| !v.is_empty())
        .map(|v| controller.seal(&SecretString::from(v)))
        .transpose()
        .map_err(CliError::from)
}

fn build_olt(controller: &Controller, args: OltAddArgs) -> Result<Olt, CliError> {
    let mut olt = Olt::new(OltId(0), args.name, args.ip);
    olt.hostname = args.hostname;
    olt.vendor = args.vendor;
    olt.model = args.model;
    olt.location = args.location;
    olt.description = args.description;

    olt.snmp.version = args.snmp_version;
    olt.snmp.port = args.snmp_port;
    if let Some(community) = seal(controller, args.snmp_community)? {
        olt.snmp.community = community;
    }
    olt.snmp.username = args.snmp_user;
    olt.snmp.password = seal(controller, args.snmp_password)?;
    if olt.snmp.version == 3 && olt.snmp.username.is_none() {
        return Err(CliError::Validation {
            field: "snmp-user".into(),
            reason: "SNMP v3 needs a user".into(),
        });
    }

    olt.ssh.port = args.ssh_port;
    olt.ssh.username = args.ssh_user;
    olt.ssh.password = seal(controller, args.ssh_password)?;

    olt.api.endpoint = args.api_endpoint;
    olt.api.username = args.api_user;
    olt.api.password = seal(controller, args.api_password)?;
    Ok(olt)
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    controller: &Controller,
    args: OltsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    match args.command {
        OltsCommand::List => {
            let views: Vec<OltView> = controller
                .list_devices()
                .await?
                .iter()
                .map(OltView::from)
                .collect();
            let out = output::render_list(
                &global.output,
                &views,
                |v| row(v, color),
                |v| v.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        OltsCommand::Show { olt } => {
            let device = controller
                .list_devices()
                .await?
                .into_iter()
                .find(|o| o.id == olt)
                .ok_or_else(|| CliError::NotFound {
                    resource_type: "OLT".into(),
                    identifier: olt.to_string(),
                    list_command: "olts list".into(),
                })?;
            let view = OltView::from(&device);
            let out = output::render_single(&global.output, &view, detail, |v| v.id.to_string())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        OltsCommand::Add(add) => {
            let olt = build_olt(controller, add)?;
            let name = olt.name.clone();
            let id = controller.register_device(olt).await?;
            if !global.quiet {
                eprintln!("OLT '{name}' registered with id {id}");
            }
            output::print_output(&id.to_string(), global.quiet);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_omits_credentials() {
        let mut olt = Olt::new(OltId(1), "east", "10.0.0.1");
        olt.snmp.community = StoredSecret::new("private-community");
        olt.ssh.username = Some("admin".into());
        olt.ssh.password = Some(StoredSecret::new("hunter2"));
        olt.api.password = Some(StoredSecret::new("rest-pw"));

        let json = serde_json::to_string(&OltView::from(&olt)).unwrap_or_default();
        assert!(json.contains("admin"));
        assert!(!json.contains("private-community"));
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("rest-pw"));
    }
}
