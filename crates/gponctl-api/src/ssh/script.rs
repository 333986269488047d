// CLI scripts for ZTE-style OLTs and classification of their output.

use std::fmt::Write as _;

use secrecy::ExposeSecret;

use crate::adapter::{PppoeRequest, UnitAddress};

/// Markers the CLI prints when a command was refused.
const FAILURE_MARKERS: &[&str] = &["%error", "invalid input", "failed", "error:"];

/// ONU type sent with every provisioning command.
pub const DEFAULT_ONU_TYPE: &str = "ZTE-F601";

/// A sequence of CLI lines run in one interactive session.
#[derive(Clone, PartialEq, Eq)]
pub struct Script {
    lines: Vec<String>,
    /// Index of the line holding a secret, masked in `Debug`.
    secret_line: Option<usize>,
}

impl Script {
    /// `configure terminal` → `interface gpon-olt_{port}` → `body` → `end`.
    fn in_interface(pon_port: u32, body: impl IntoIterator<Item = String>) -> Self {
        let mut lines = vec![
            "configure terminal".to_owned(),
            format!("interface gpon-olt_{pon_port}"),
        ];
        lines.extend(body);
        lines.push("end".to_owned());
        Self {
            lines,
            secret_line: None,
        }
    }

    pub fn provision(unit: UnitAddress, serial: &str) -> Self {
        Self::in_interface(
            unit.pon_port,
            [format!("onu {} type {DEFAULT_ONU_TYPE} sn {serial}", unit.onu_id)],
        )
    }

    pub fn delete(unit: UnitAddress) -> Self {
        Self::in_interface(unit.pon_port, [format!("no onu {}", unit.onu_id)])
    }

    pub fn reboot(unit: UnitAddress) -> Self {
        Self::in_interface(
            unit.pon_port,
            [format!("onu {}", unit.onu_id), "reboot".to_owned()],
        )
    }

    pub fn reset(unit: UnitAddress) -> Self {
        Self::in_interface(
            unit.pon_port,
            [
                format!("onu {}", unit.onu_id),
                "reset factory-default".to_owned(),
            ],
        )
    }

    pub fn pppoe(unit: UnitAddress, request: &PppoeRequest) -> Self {
        let vlan = request.vlan_id.map(|v| v.to_string()).unwrap_or_default();
        let mut script = Self::in_interface(
            unit.pon_port,
            [
                format!("onu {}", unit.onu_id),
                "interface eth_1/1".to_owned(),
                format!(
                    "service-port vlan {vlan} pppoe user {} password {}",
                    request.username,
                    request.password.expose_secret()
                ),
            ],
        );
        // configure, interface, onu, eth → service-port is the fifth line.
        script.secret_line = Some(4);
        script
    }

    pub fn unit_status(unit: UnitAddress) -> Self {
        Self {
            lines: vec![format!(
                "show onu status gpon-olt_{} {}",
                unit.pon_port, unit.onu_id
            )],
            secret_line: None,
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Text written to the shell channel, newline-terminated.
    pub(crate) fn render(&self) -> String {
        self.lines.iter().fold(String::new(), |mut out, line| {
            let _ = writeln!(out, "{line}");
            out
        })
    }
}

impl std::fmt::Debug for Script {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lines: Vec<&str> = self
            .lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                if Some(i) == self.secret_line {
                    "[REDACTED]"
                } else {
                    line.as_str()
                }
            })
            .collect();
        f.debug_struct("Script").field("lines", &lines).finish()
    }
}

/// Outcome of a CLI exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Accepted,
    /// The line of output that carried a failure marker.
    Rejected(String),
}

/// Anything without an explicit failure marker counts as success.
pub fn classify(output: &str) -> Outcome {
    output
        .lines()
        .find(|line| {
            let lower = line.to_ascii_lowercase();
            FAILURE_MARKERS.iter().any(|marker| lower.contains(marker))
        })
        .map_or(Outcome::Accepted, |line| Outcome::Rejected(line.trim().to_owned()))
}

/// Map `show onu status` output to status text the gateway understands.
pub fn unit_status(output: &str) -> &'static str {
    let up = output
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|word| word.eq_ignore_ascii_case("up") || word.eq_ignore_ascii_case("working"));
    if up { "online" } else { "offline" }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    #[test]
    fn provision_script_enters_interface_and_exits() {
        let script = Script::provision(UnitAddress::new(3, 12), "ZTEG1234ABCD");
        assert_eq!(
            script.render(),
            "configure terminal\ninterface gpon-olt_3\nonu 12 type ZTE-F601 sn ZTEG1234ABCD\nend\n"
        );
    }

    #[test]
    fn reset_script() {
        let script = Script::reset(UnitAddress::new(1, 4));
        assert_eq!(
            script.lines(),
            [
                "configure terminal",
                "interface gpon-olt_1",
                "onu 4",
                "reset factory-default",
                "end"
            ]
        );
    }

    #[test]
    fn pppoe_password_is_hidden_from_debug() {
        let request = PppoeRequest {
            username: "cust-001".into(),
            password: SecretString::from("hunter2"),
            vlan_id: Some(100),
            service_name: None,
        };
        let script = Script::pppoe(UnitAddress::new(2, 7), &request);
        assert!(script.render().contains("service-port vlan 100 pppoe user cust-001 password hunter2"));
        let debug = format!("{script:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn failure_markers_reject() {
        assert_eq!(
            classify("OLT(config)# onu 99 type X sn Y\n%Error 20210: Invalid ONU type\n"),
            Outcome::Rejected("%Error 20210: Invalid ONU type".into())
        );
        assert!(matches!(classify("Operation FAILED"), Outcome::Rejected(_)));
        assert!(matches!(classify("error: no such interface"), Outcome::Rejected(_)));
    }

    #[test]
    fn silent_or_plain_output_is_accepted() {
        assert_eq!(classify(""), Outcome::Accepted);
        assert_eq!(classify("OLT(config-if)#\nOLT#"), Outcome::Accepted);
    }

    #[test]
    fn status_words() {
        assert_eq!(unit_status("Admin state: enable\nPhase state: working"), "online");
        assert_eq!(unit_status("gpon-onu_1/1/1:3  UP"), "online");
        assert_eq!(unit_status("Phase state: LOS"), "offline");
        assert_eq!(unit_status("supply voltage ok"), "offline");
    }
}
