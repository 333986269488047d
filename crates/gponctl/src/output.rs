//! Output formatting: table, JSON, YAML, plain.
//!
//! Everything a command prints goes through here so `--output` applies
//! uniformly.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Colorize a status word: green when up, red when down, yellow otherwise.
pub fn paint_status(status: &str, color: bool) -> String {
    if !color {
        return status.to_owned();
    }
    match status {
        "online" | "active" => status.green().to_string(),
        "offline" | "critical" | "major" => status.red().to_string(),
        _ => status.yellow().to_string(),
    }
}

// ── Rendering ────────────────────────────────────────────────────────

/// Render a collection. Tables go through `to_row`, `plain` prints one
/// `id_fn` value per line, everything else serializes `data` as is.
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Ok(Table::new(rows).with(Style::rounded()).to_string())
        }
        OutputFormat::Plain => Ok(data.iter().map(id_fn).collect::<Vec<_>>().join("\n")),
        structured => serialize(structured, data),
    }
}

/// Render one record. The table form is a hand-laid detail view.
pub fn render_single<T: Serialize>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => Ok(detail_fn(data)),
        OutputFormat::Plain => Ok(id_fn(data)),
        structured => serialize(structured, data),
    }
}

/// Write to stdout unless `--quiet` is set or there is nothing to say.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

/// `-` for missing values in table cells.
pub fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".into(), |v| v.to_string())
}

fn serialize<T: Serialize + ?Sized>(format: &OutputFormat, data: &T) -> Result<String, CliError> {
    let rendered = match format {
        OutputFormat::JsonCompact => serde_json::to_string(data).map_err(|e| e.to_string()),
        OutputFormat::Yaml => serde_yaml::to_string(data).map_err(|e| e.to_string()),
        _ => serde_json::to_string_pretty(data).map_err(|e| e.to_string()),
    };
    rendered.map_err(|reason| CliError::Internal(format!("cannot render output: {reason}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[derive(Serialize)]
    struct Item {
        id: u64,
        name: &'static str,
    }

    #[derive(Tabled)]
    struct ItemRow {
        #[tabled(rename = "ID")]
        id: u64,
        #[tabled(rename = "Name")]
        name: &'static str,
    }

    fn items() -> Vec<Item> {
        vec![Item { id: 1, name: "east" }, Item { id: 2, name: "west" }]
    }

    fn row(i: &Item) -> ItemRow {
        ItemRow {
            id: i.id,
            name: i.name,
        }
    }

    #[test]
    fn plain_emits_one_id_per_line() {
        let out = render_list(&OutputFormat::Plain, &items(), row, |i| i.id.to_string()).unwrap();
        assert_eq!(out, "1\n2");
    }

    #[test]
    fn table_has_headers() {
        let out = render_list(&OutputFormat::Table, &items(), row, |i| i.id.to_string()).unwrap();
        assert!(out.contains("ID"));
        assert!(out.contains("west"));
    }

    #[test]
    fn compact_json_is_one_line() {
        let out = render_list(&OutputFormat::JsonCompact, &items(), row, |i| i.id.to_string()).unwrap();
        assert_eq!(out, r#"[{"id":1,"name":"east"},{"id":2,"name":"west"}]"#);
    }

    #[test]
    fn unserializable_data_is_an_error() {
        let mut bad = HashMap::new();
        bad.insert((1, 2), "east");
        let err = render_single(&OutputFormat::Json, &bad, |_| String::new(), |_| String::new())
            .unwrap_err();
        assert!(matches!(err, CliError::Internal(_)), "got {err:?}");
        assert!(render_single(&OutputFormat::Plain, &bad, |_| String::new(), |_| "ok".into()).is_ok());
    }

    #[test]
    fn uncolored_status_is_unchanged() {
        assert_eq!(paint_status("offline", false), "offline");
        assert!(paint_status("offline", true).contains("offline"));
    }
}
