//! Alarm command handlers.

use tabled::Tabled;

use chrono::Utc;

use gponctl_core::{Alarm, Controller, NewAlarm};

use crate::cli::{AlarmsArgs, AlarmsCommand, GlobalOpts};
use crate::error::CliError;
use crate::output::{self, or_dash};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct AlarmRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Type")]
    alarm_type: String,
    #[tabled(rename = "OLT")]
    olt: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
}

fn row(a: &Alarm, color: bool) -> AlarmRow {
    AlarmRow {
        id: a.id.to_string(),
        time: a.occurred_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        severity: output::paint_status(&a.severity.to_string(), color),
        alarm_type: a.alarm_type.clone(),
        olt: or_dash(a.olt_id),
        status: output::paint_status(&a.status.to_string(), color),
        message: a.message.clone(),
    }
}

fn detail(a: &Alarm) -> String {
    let mut lines = vec![
        format!("ID:       {}", a.id),
        format!("Type:     {}", a.alarm_type),
        format!("Severity: {}", a.severity),
        format!("Status:   {}", a.status),
        format!("OLT:      {}", or_dash(a.olt_id)),
        format!("Unit:     {}", or_dash(a.unit_id)),
        format!("Message:  {}", a.message),
        format!("Occurred: {}", a.occurred_at.format("%Y-%m-%d %H:%M:%S")),
    ];
    if let Some(at) = a.acknowledged_at {
        lines.push(format!("Acked:    {}", at.format("%Y-%m-%d %H:%M:%S")));
    }
    if let Some(at) = a.cleared_at {
        lines.push(format!("Cleared:  {}", at.format("%Y-%m-%d %H:%M:%S")));
    }
    lines.join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    controller: &Controller,
    args: AlarmsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    match args.command {
        AlarmsCommand::List { active } => {
            let mut alarms = controller.list_alarms().await?;
            if active {
                alarms.retain(Alarm::is_active);
            }
            alarms.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at).then(b.id.cmp(&a.id)));
            let out = output::render_list(
                &global.output,
                &alarms,
                |a| row(a, color),
                |a| a.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        AlarmsCommand::Raise {
            severity,
            alarm_type,
            message,
            details,
            olt,
        } => {
            let alarm = controller
                .raise_alarm(NewAlarm {
                    olt_id: olt,
                    unit_id: None,
                    severity,
                    alarm_type,
                    message,
                    details,
                    occurred_at: Utc::now(),
                })
                .await?;
            let out = output::render_single(&global.output, &alarm, detail, |a| a.id.to_string())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        AlarmsCommand::Ack { id } => {
            let alarm = controller.acknowledge_alarm(id).await?;
            if !global.quiet {
                eprintln!("Alarm {id} acknowledged");
            }
            let out = output::render_single(&global.output, &alarm, detail, |a| a.id.to_string())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        AlarmsCommand::Clear { id } => {
            let alarm = controller.clear_alarm(id).await?;
            if !global.quiet {
                eprintln!("Alarm {id} cleared");
            }
            let out = output::render_single(&global.output, &alarm, detail, |a| a.id.to_string())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
