//! Periodic poller in the foreground.

use owo_colors::OwoColorize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use gponctl_core::{Alarm, Controller};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

/// Start the poller, echo raised alarms to stderr, stop on Ctrl-C.
pub async fn handle(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    let mut alarms = controller.alarms();
    let color = output::should_color(&global.color);
    let interval = controller.config().engine.poll_interval;

    controller.start().await;
    if !global.quiet {
        eprintln!(
            "Polling every {}s, press Ctrl-C to stop",
            interval.as_secs()
        );
    }

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "cannot listen for Ctrl-C");
                }
                break;
            }
            received = alarms.recv() => match received {
                Ok(alarm) => {
                    if !global.quiet {
                        eprintln!("{}", alarm_line(&alarm, color));
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "alarm feed lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    info!("shutting down");
    controller.shutdown().await;
    Ok(())
}

fn alarm_line(alarm: &Alarm, color: bool) -> String {
    let tag = format!("[{}]", alarm.severity);
    let tag = if color { tag.red().to_string() } else { tag };
    format!(
        "{} {tag} #{} {}",
        alarm.occurred_at.format("%Y-%m-%d %H:%M:%S"),
        alarm.id,
        alarm.message
    )
}
