//! Shared helpers for command handlers.

use secrecy::SecretString;

use crate::error::CliError;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(CliError::prompt)
}

/// Use `given`, or prompt for a hidden value when it is absent.
pub fn secret_or_prompt(given: Option<String>, prompt: &str) -> Result<SecretString, CliError> {
    let value = match given {
        Some(v) => v,
        None => dialoguer::Password::new()
            .with_prompt(prompt)
            .interact()
            .map_err(CliError::prompt)?,
    };
    if value.is_empty() {
        return Err(CliError::Validation {
            field: prompt.to_lowercase(),
            reason: "must not be empty".into(),
        });
    }
    Ok(SecretString::from(value))
}
