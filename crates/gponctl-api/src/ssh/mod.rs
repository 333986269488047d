//! SSH-CLI transport.
//!
//! One libssh2 session per operation, driven on a blocking worker. The
//! script is written to an interactive shell channel and the combined
//! output is scanned for failure markers.

mod script;

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use crate::adapter::{DeviceAdapter, PppoeRequest, UnitAddress};
use crate::error::Error;
use crate::target::DeviceTarget;
use crate::transport::TransportConfig;

pub use script::{DEFAULT_ONU_TYPE, Outcome, Script, classify};

/// Stateless SSH-CLI adapter.
#[derive(Debug, Clone)]
pub struct SshAdapter {
    transport: TransportConfig,
}

impl SshAdapter {
    pub fn new(transport: TransportConfig) -> Self {
        Self { transport }
    }

    /// Run `script` and return the raw output.
    pub async fn run(&self, target: &DeviceTarget, script: Script) -> Result<String, Error> {
        let job = Job {
            address: target.address.clone(),
            port: target.ssh.port,
            username: target.ssh.username.clone(),
            password: target.ssh.password.clone(),
            connect_timeout: self.transport.ssh_connect_timeout,
            command_timeout: self.transport.ssh_command_timeout,
        };
        debug!(address = %job.address, ?script, "running CLI script");
        tokio::task::spawn_blocking(move || job.execute(&script))
            .await
            .map_err(|e| Error::protocol(format!("SSH worker aborted: {e}")))?
    }

    /// Run `script` and fail on any failure marker in the output.
    async fn apply(&self, target: &DeviceTarget, script: Script) -> Result<(), Error> {
        let output = self.run(target, script).await?;
        match classify(&output) {
            Outcome::Accepted => Ok(()),
            Outcome::Rejected(line) => {
                warn!(address = %target.address, %line, "CLI rejected command");
                Err(Error::Rejected { message: line })
            }
        }
    }
}

// ── Blocking session ────────────────────────────────────────────────

struct Job {
    address: String,
    port: u16,
    username: String,
    password: Option<SecretString>,
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl Job {
    fn unreachable(&self, reason: impl ToString) -> Error {
        Error::Unreachable {
            address: self.address.clone(),
            reason: reason.to_string(),
        }
    }

    fn execute(&self, script: &Script) -> Result<String, Error> {
        let addr = (self.address.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| self.unreachable(e))?
            .next()
            .ok_or_else(|| self.unreachable("address did not resolve"))?;
        let tcp = TcpStream::connect_timeout(&addr, self.connect_timeout)
            .map_err(|e| self.unreachable(e))?;
        tcp.set_read_timeout(Some(self.command_timeout))?;
        tcp.set_write_timeout(Some(self.command_timeout))?;

        let mut session = ssh2::Session::new()?;
        session.set_timeout(u32::try_from(self.command_timeout.as_millis()).unwrap_or(u32::MAX));
        session.set_tcp_stream(tcp);
        session.handshake()?;

        let password = self
            .password
            .as_ref()
            .map(|p| p.expose_secret().to_owned())
            .unwrap_or_default();
        session
            .userauth_password(&self.username, &password)
            .map_err(|e| Error::Authentication {
                message: e.message().to_owned(),
            })?;
        if !session.authenticated() {
            return Err(Error::Authentication {
                message: format!("SSH login as {} refused", self.username),
            });
        }

        let mut channel = session.channel_session()?;
        channel.request_pty("vt100", None, None)?;
        channel.shell()?;
        channel.write_all(script.render().as_bytes())?;
        channel.write_all(b"exit\n")?;
        channel.flush()?;
        channel.send_eof()?;

        let mut stdout = Vec::new();
        channel.read_to_end(&mut stdout).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                Error::Timeout {
                    timeout_secs: self.command_timeout.as_secs(),
                }
            } else {
                Error::Io(e)
            }
        })?;
        let mut stderr = Vec::new();
        let _ = channel.stderr().read_to_end(&mut stderr);
        let _ = channel.wait_close();

        Ok(decode_output(&stdout, &stderr))
    }
}

/// Join both streams. Device banners and prompts are not always UTF-8.
fn decode_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut output = String::from_utf8_lossy(stdout).into_owned();
    output.push_str(&String::from_utf8_lossy(stderr));
    output
}

// ── DeviceAdapter ───────────────────────────────────────────────────

#[async_trait]
impl DeviceAdapter for SshAdapter {
    fn name(&self) -> &'static str {
        "ssh"
    }

    async fn read_unit_status(&self, target: &DeviceTarget, unit: UnitAddress) -> Result<String, Error> {
        let output = self.run(target, Script::unit_status(unit)).await?;
        if let Outcome::Rejected(line) = classify(&output) {
            return Err(Error::Rejected { message: line });
        }
        Ok(script::unit_status(&output).to_owned())
    }

    async fn provision_unit(&self, target: &DeviceTarget, unit: UnitAddress, serial: &str) -> Result<(), Error> {
        self.apply(target, Script::provision(unit, serial)).await
    }

    async fn delete_unit(&self, target: &DeviceTarget, unit: UnitAddress) -> Result<(), Error> {
        self.apply(target, Script::delete(unit)).await
    }

    async fn reboot_unit(&self, target: &DeviceTarget, unit: UnitAddress) -> Result<(), Error> {
        self.apply(target, Script::reboot(unit)).await
    }

    async fn reset_unit(&self, target: &DeviceTarget, unit: UnitAddress) -> Result<(), Error> {
        self.apply(target, Script::reset(unit)).await
    }

    async fn create_pppoe_account(
        &self,
        target: &DeviceTarget,
        unit: UnitAddress,
        request: &PppoeRequest,
    ) -> Result<(), Error> {
        self.apply(target, Script::pppoe(unit, request)).await
    }

    fn reprovision_delay(&self) -> Duration {
        Duration::from_secs(2)
    }
}
