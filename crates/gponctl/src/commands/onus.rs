//! ONU command handlers.

use serde::Serialize;
use tabled::Tabled;

use gponctl_core::{Controller, Onu, PppoeAccount, PppoeCredentials, UnitId};

use crate::cli::{GlobalOpts, OnusArgs, OnusCommand, UnitArgs};
use crate::error::CliError;
use crate::output::{self, or_dash};

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct OnuRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "OLT")]
    olt: String,
    #[tabled(rename = "Port")]
    port: u32,
    #[tabled(rename = "ONU")]
    onu: u32,
    #[tabled(rename = "Serial")]
    serial: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Rx dBm")]
    rx: String,
    #[tabled(rename = "Tx dBm")]
    tx: String,
    #[tabled(rename = "Last Seen")]
    last_seen: String,
}

fn row(o: &Onu, color: bool) -> OnuRow {
    OnuRow {
        id: o.id.to_string(),
        olt: o.olt_id.to_string(),
        port: o.pon_port,
        onu: o.onu_id,
        serial: o.serial_number.clone(),
        status: output::paint_status(&o.status.to_string(), color),
        rx: o.rx_power.map_or_else(|| "-".into(), |p| format!("{p:.2}")),
        tx: o.tx_power.map_or_else(|| "-".into(), |p| format!("{p:.2}")),
        last_seen: or_dash(o.last_seen_at.map(|t| t.format("%Y-%m-%d %H:%M:%S"))),
    }
}

fn detail(o: &Onu) -> String {
    let mut lines = vec![
        format!("ID:        {}", o.id),
        format!("OLT:       {}", o.olt_id),
        format!("Position:  {}/{}", o.pon_port, o.onu_id),
        format!("Serial:    {}", o.serial_number),
        format!("Status:    {}", o.status),
        format!("Admin:     {}", o.admin_status),
    ];
    if let Some(name) = &o.name {
        lines.push(format!("Name:      {name}"));
    }
    if let Some(rx) = o.rx_power {
        lines.push(format!("Rx power:  {rx:.2} dBm"));
    }
    if let Some(tx) = o.tx_power {
        lines.push(format!("Tx power:  {tx:.2} dBm"));
    }
    if let Some(at) = o.provisioned_at {
        lines.push(format!("Provisioned: {}", at.format("%Y-%m-%d %H:%M:%S")));
    }
    lines.join("\n")
}

/// A PPPoE account without its password hash.
#[derive(Serialize)]
struct PppoeView<'a> {
    id: String,
    unit_id: UnitId,
    username: &'a str,
    service_name: Option<&'a str>,
    vlan_id: Option<u16>,
    status: String,
}

impl<'a> From<&'a PppoeAccount> for PppoeView<'a> {
    fn from(a: &'a PppoeAccount) -> Self {
        Self {
            id: a.id.to_string(),
            unit_id: a.unit_id,
            username: &a.username,
            service_name: a.service_name.as_deref(),
            vlan_id: a.vlan_id,
            status: a.status.to_string(),
        }
    }
}

fn pppoe_detail(v: &PppoeView<'_>) -> String {
    [
        format!("Account:  {}", v.id),
        format!("Unit:     {}", v.unit_id),
        format!("Username: {}", v.username),
        format!("Service:  {}", or_dash(v.service_name)),
        format!("VLAN:     {}", or_dash(v.vlan_id)),
        format!("Status:   {}", v.status),
    ]
    .join("\n")
}

// ── Helpers ─────────────────────────────────────────────────────────

async fn resolve_unit(controller: &Controller, unit: &UnitArgs) -> Result<UnitId, CliError> {
    controller
        .list_units(Some(unit.olt))
        .await?
        .into_iter()
        .find(|o| o.pon_port == unit.port && o.onu_id == unit.onu)
        .map(|o| o.id)
        .ok_or_else(|| CliError::NotFound {
            resource_type: "ONU".into(),
            identifier: position(unit),
            list_command: format!("onus list --olt {}", unit.olt),
        })
}

fn position(unit: &UnitArgs) -> String {
    format!("{}:{}/{}", unit.olt, unit.port, unit.onu)
}

fn done(global: &GlobalOpts, message: &str) {
    if !global.quiet {
        eprintln!("{message}");
    }
}

// ── Handler ─────────────────────────────────────────────────────────

#[allow(clippy::too_many_lines)]
pub async fn handle(
    controller: &Controller,
    args: OnusArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    match args.command {
        OnusCommand::List { olt } => {
            let units = controller.list_units(olt).await?;
            let out = output::render_list(
                &global.output,
                &units,
                |o| row(o, color),
                |o| o.serial_number.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        OnusCommand::Provision { unit, serial } => {
            let onu = controller
                .provision(unit.olt, unit.port, unit.onu, &serial, unit.method)
                .await?;
            done(global, &format!("ONU {} provisioned at {}", onu.serial_number, position(&unit)));
            let out = output::render_single(&global.output, &onu, detail, |o| o.id.to_string())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        OnusCommand::Delete { unit } => {
            if !util::confirm(&format!("Delete ONU {}?", position(&unit)), global.yes)? {
                return Ok(());
            }
            controller
                .deprovision(unit.olt, unit.port, unit.onu, unit.method)
                .await?;
            done(global, &format!("ONU {} deleted", position(&unit)));
            Ok(())
        }

        OnusCommand::Reboot { unit } => {
            controller
                .reboot(unit.olt, unit.port, unit.onu, unit.method)
                .await?;
            done(global, &format!("Reboot sent to ONU {}", position(&unit)));
            Ok(())
        }

        OnusCommand::Reset { unit } => {
            if !util::confirm(
                &format!("Factory-reset ONU {}? Its configuration is lost.", position(&unit)),
                global.yes,
            )? {
                return Ok(());
            }
            controller
                .reset(unit.olt, unit.port, unit.onu, unit.method)
                .await?;
            done(global, &format!("Reset sent to ONU {}", position(&unit)));
            Ok(())
        }

        OnusCommand::UpdateSerial { unit, serial } => {
            let onu = controller
                .update_serial(unit.olt, unit.port, unit.onu, &serial, unit.method)
                .await?;
            done(global, &format!("ONU {} now has serial {}", position(&unit), onu.serial_number));
            let out = output::render_single(&global.output, &onu, detail, |o| o.id.to_string())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        OnusCommand::Pppoe {
            unit,
            username,
            password,
            service_name,
            vlan,
        } => {
            let unit_id = resolve_unit(controller, &unit).await?;
            let credentials = PppoeCredentials {
                username,
                password: util::secret_or_prompt(password, "PPPoE password")?,
                service_name,
                vlan_id: vlan,
            };
            let account = controller
                .create_pppoe_account(unit_id, credentials, unit.method)
                .await?;
            done(global, &format!("PPPoE account '{}' set on ONU {}", account.username, position(&unit)));
            let view = PppoeView::from(&account);
            let out = output::render_single(&global.output, &view, pppoe_detail, |v| v.id.clone())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
