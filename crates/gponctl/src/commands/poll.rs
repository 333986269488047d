//! On-demand poll and sync for one OLT.

use gponctl_core::{Controller, PollResult, SyncResult};

use crate::cli::{GlobalOpts, PollArgs, SyncArgs};
use crate::error::CliError;
use crate::output::{self, or_dash};

fn poll_detail(r: &PollResult, color: bool) -> String {
    let mut lines = vec![
        format!("OLT:         {}", r.olt_id),
        format!(
            "Status:      {}",
            output::paint_status(&r.status.to_string(), color)
        ),
    ];
    if let Some(system) = &r.system {
        lines.push(format!("Name:        {}", or_dash(system.system_name.as_deref())));
        lines.push(format!("Description: {}", or_dash(system.description.as_deref())));
        if let Some(location) = &system.location {
            lines.push(format!("Location:    {location}"));
        }
    }
    if let Some(perf) = &r.performance {
        lines.push(format!(
            "CPU:         {}",
            perf.cpu_usage.map_or_else(|| "-".into(), |v| format!("{v:.1}%"))
        ));
        lines.push(format!(
            "Memory:      {}",
            perf.memory_usage.map_or_else(|| "-".into(), |v| format!("{v:.1}%"))
        ));
        lines.push(format!(
            "Temperature: {}",
            perf.temperature.map_or_else(|| "-".into(), |v| format!("{v:.1}°C"))
        ));
        lines.push(format!(
            "Uptime:      {}",
            perf.uptime_secs.map_or_else(|| "-".into(), |v| format!("{v}s"))
        ));
    }
    lines.join("\n")
}

fn sync_detail(r: &SyncResult) -> String {
    let mut lines = vec![
        format!("OLT:            {}", r.olt_id),
        format!("Created:        {}", r.created),
        format!("Updated:        {}", r.updated),
        format!("Status changes: {}", r.status_changes),
        format!("Alarms raised:  {}", r.alarms_raised),
    ];
    if r.truncated {
        lines.push("Listing hit the unit cap; later units were not seen".into());
    }
    lines.join("\n")
}

pub async fn handle_poll(
    controller: &Controller,
    args: &PollArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let result = controller.trigger_poll(args.olt).await?;
    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &result,
        |r| poll_detail(r, color),
        |r| r.status.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn handle_sync(
    controller: &Controller,
    args: &SyncArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let result = controller.trigger_sync(args.olt, args.method).await?;
    let out = output::render_single(&global.output, &result, sync_detail, |r| {
        format!("{} {}", r.created, r.updated)
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
