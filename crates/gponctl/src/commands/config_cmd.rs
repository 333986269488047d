//! Config subcommand handlers.

use std::fmt::Write;

use gponctl_config::{Config, config_path, save_config, store_keyring_key};
use secrecy::ExposeSecret;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

/// Format config for display, masking sensitive fields.
fn format_config_redacted(cfg: &Config, inventory: &std::path::Path) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "inventory = \"{}\"", inventory.display());
    if cfg.encryption_key.is_some() {
        let _ = writeln!(out, "encryption_key = \"****\"");
    }
    if let Some(env) = &cfg.encryption_key_env {
        let _ = writeln!(out, "encryption_key_env = \"{env}\"");
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);

    let e = &cfg.engine;
    let _ = writeln!(out);
    let _ = writeln!(out, "[engine]");
    let _ = writeln!(out, "poll_interval_secs = {}", e.poll_interval_secs);
    let _ = writeln!(out, "task_timeout_secs = {}", e.task_timeout_secs);
    let _ = writeln!(out, "default_method = \"{}\"", e.default_method);
    let _ = writeln!(out, "max_units = {}", e.max_units);

    let t = &cfg.timeouts;
    let _ = writeln!(out);
    let _ = writeln!(out, "[timeouts]");
    let _ = writeln!(out, "snmp_get_secs = {}", t.snmp_get_secs);
    let _ = writeln!(out, "snmp_walk_secs = {}", t.snmp_walk_secs);
    let _ = writeln!(out, "snmp_retries = {}", t.snmp_retries);
    let _ = writeln!(out, "ssh_connect_secs = {}", t.ssh_connect_secs);
    let _ = writeln!(out, "ssh_command_secs = {}", t.ssh_command_secs);
    let _ = writeln!(out, "rest_secs = {}", t.rest_secs);

    out
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = global.config.clone().unwrap_or_else(config_path);
    match args.command {
        ConfigCommand::Init => {
            if path.exists()
                && !util::confirm(&format!("Overwrite {}?", path.display()), global.yes)?
            {
                return Ok(());
            }
            save_config(&Config::default(), &path)?;
            if !global.quiet {
                eprintln!("Config written to {}", path.display());
            }
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = crate::load_config(global)?;
            let inventory = global
                .inventory
                .clone()
                .unwrap_or_else(|| cfg.inventory_path());
            output::print_output(&format_config_redacted(&cfg, &inventory), global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::SetKey => {
            let key = util::secret_or_prompt(None, "Encryption key")?;
            store_keyring_key(key.expose_secret())?;
            if !global.quiet {
                eprintln!("Encryption key stored in the system keyring");
            }
            Ok(())
        }
    }
}
