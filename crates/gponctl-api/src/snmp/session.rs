// ── SNMP session ──
//
// One UDP socket bound per session, connected to the agent. Requests
// are retried on timeout and matched to responses by request id; stale
// datagrams from earlier attempts are discarded. v3 sessions discover
// the authoritative engine lazily before the first real request.

use std::net::SocketAddr;
use std::time::Duration;

use async_stream::try_stream;
use futures_util::{Stream, StreamExt, pin_mut};
use secrecy::{ExposeSecret, SecretString};
use tokio::net::UdpSocket;
use tracing::{debug, trace};

use crate::error::Error;
use crate::target::{SnmpCredentials, SnmpVersion};
use crate::transport::TransportConfig;

use super::oid::Oid;
use super::pdu::{self, Pdu, PduType, Value, VarBind};
use super::usm::{
    self, FLAG_AUTH, FLAG_PRIV, FLAG_REPORTABLE, LocalizedKeys, ScopedBody, SecurityParams,
    V3Message,
};

const RECV_BUFFER: usize = 65_535;

enum Security {
    Community(SecretString),
    Usm(UsmState),
}

struct UsmState {
    user_name: String,
    password: SecretString,
    protocol: usm::AuthProtocol,
    engine: Option<Engine>,
    salt: u64,
}

struct Engine {
    id: Vec<u8>,
    boots: u32,
    time: u32,
    keys: LocalizedKeys,
}

/// A connected SNMP session against one agent.
pub struct Session {
    socket: UdpSocket,
    peer: SocketAddr,
    security: Security,
    get_timeout: Duration,
    walk_timeout: Duration,
    retries: u32,
    max_rows: usize,
    next_id: i32,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Resolve `address` and open a session with the given credentials.
    pub async fn open(
        address: &str,
        credentials: &SnmpCredentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let peer = tokio::net::lookup_host((address, credentials.port))
            .await
            .map_err(|e| Error::Unreachable {
                address: address.to_owned(),
                reason: e.to_string(),
            })?
            .next()
            .ok_or_else(|| Error::Unreachable {
                address: address.to_owned(),
                reason: "address did not resolve".into(),
            })?;

        let bind: SocketAddr = if peer.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind).await?;
        socket.connect(peer).await?;

        let security = match credentials.version {
            SnmpVersion::V2c => Security::Community(credentials.community.clone()),
            SnmpVersion::V3 => {
                let user_name = credentials.username.clone().ok_or_else(|| {
                    Error::Authentication {
                        message: "SNMPv3 requires a user name".into(),
                    }
                })?;
                let password = credentials.password.clone().ok_or_else(|| {
                    Error::Authentication {
                        message: "SNMPv3 requires a passphrase".into(),
                    }
                })?;
                Security::Usm(UsmState {
                    user_name,
                    password,
                    protocol: credentials.auth_protocol,
                    engine: None,
                    salt: rand::random(),
                })
            }
        };

        Ok(Self {
            socket,
            peer,
            security,
            get_timeout: transport.snmp_get_timeout,
            walk_timeout: transport.snmp_walk_timeout,
            retries: transport.snmp_retries,
            max_rows: transport.max_rows,
            next_id: rand::random::<i32>().rem_euclid(1 << 24) + 1,
        })
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    // ── Public operations ────────────────────────────────────────────

    /// GET a batch of OIDs in one PDU. Values are returned in request order.
    pub async fn get(&mut self, oids: &[Oid]) -> Result<Vec<VarBind>, Error> {
        let varbinds = oids.iter().cloned().map(VarBind::null).collect();
        let response = self.request(PduType::Get, varbinds).await?;
        Ok(response.varbinds)
    }

    /// GET a single OID, mapping NULL / noSuch* to `None`.
    pub async fn get_one(&mut self, oid: &Oid) -> Result<Option<Value>, Error> {
        let mut varbinds = self.get(std::slice::from_ref(oid)).await?;
        Ok(varbinds
            .pop()
            .map(|vb| vb.value)
            .filter(|value| !value.is_absent()))
    }

    pub async fn get_next(&mut self, oid: &Oid) -> Result<VarBind, Error> {
        let mut response = self
            .request(PduType::GetNext, vec![VarBind::null(oid.clone())])
            .await?;
        response
            .varbinds
            .pop()
            .ok_or_else(|| Error::protocol("empty GETNEXT response"))
    }

    pub async fn set(&mut self, oid: &Oid, value: Value) -> Result<(), Error> {
        self.set_many(vec![VarBind::new(oid.clone(), value)]).await
    }

    /// SET several bindings atomically (one PDU).
    pub async fn set_many(&mut self, varbinds: Vec<VarBind>) -> Result<(), Error> {
        self.request(PduType::Set, varbinds).await.map(|_| ())
    }

    /// Lazily walk the subtree under `root` with GETNEXT.
    ///
    /// Ends at the first OID outside the subtree or at endOfMibView.
    pub fn walk_stream<'a>(
        &'a mut self,
        root: &'a Oid,
    ) -> impl Stream<Item = Result<VarBind, Error>> + 'a {
        try_stream! {
            let mut cursor = root.clone();
            loop {
                let vb = self.get_next(&cursor).await?;
                if vb.value == Value::EndOfMibView || !vb.oid.starts_with(root) {
                    break;
                }
                if vb.oid <= cursor {
                    Err::<(), _>(Error::protocol(format!(
                        "agent returned non-increasing OID {} after {cursor}",
                        vb.oid
                    )))?;
                }
                cursor = vb.oid.clone();
                yield vb;
            }
        }
    }

    /// Walk `root` to completion, bounded by the walk deadline and row cap.
    ///
    /// Returns the rows plus a flag telling whether the cap cut the walk
    /// short. A failure after the first row is a [`Error::PartialList`].
    pub async fn walk(&mut self, root: &Oid, limit: usize) -> Result<(Vec<VarBind>, bool), Error> {
        let walk_timeout = self.walk_timeout;
        let mut rows = Vec::new();
        let mut truncated = false;
        let outcome = tokio::time::timeout(walk_timeout, async {
            let stream = self.walk_stream(root);
            pin_mut!(stream);
            while let Some(row) = stream.next().await {
                if rows.len() >= limit {
                    truncated = true;
                    break;
                }
                rows.push(row?);
            }
            Ok::<(), Error>(())
        })
        .await;

        let failure = match outcome {
            Ok(Ok(())) => return Ok((rows, truncated)),
            Ok(Err(e)) => e,
            Err(_) => Error::Timeout {
                timeout_secs: walk_timeout.as_secs(),
            },
        };
        if rows.is_empty() {
            Err(failure)
        } else {
            Err(Error::PartialList {
                fetched: rows.len(),
                reason: failure.to_string(),
            })
        }
    }

    // ── Request engine ───────────────────────────────────────────────

    fn allocate_id(&mut self) -> i32 {
        self.next_id = if self.next_id >= i32::MAX - 1 {
            1
        } else {
            self.next_id + 1
        };
        self.next_id
    }

    async fn request(&mut self, pdu_type: PduType, varbinds: Vec<VarBind>) -> Result<Pdu, Error> {
        if matches!(self.security, Security::Usm(ref s) if s.engine.is_none()) {
            self.discover_engine().await?;
        }

        let mut resynced = false;
        loop {
            let request_id = self.allocate_id();
            let pdu = Pdu::request(pdu_type, request_id, varbinds.clone());
            let response = self.exchange(&pdu).await?;

            if response.pdu_type == PduType::Report {
                // Engine clock drifted: the report carries fresh boots/time.
                if !resynced && is_time_window_report(&response) {
                    debug!(peer = %self.peer, "USM time window resync");
                    resynced = true;
                    continue;
                }
                return Err(report_error(&response));
            }

            if response.error_status != 0 {
                return Err(Error::SnmpStatus {
                    status: response.error_status,
                    index: response.error_index,
                });
            }
            return Ok(response);
        }
    }

    /// Send `pdu` and wait for the matching reply, retrying on timeout.
    async fn exchange(&mut self, pdu: &Pdu) -> Result<Pdu, Error> {
        let datagram = self.encode(pdu)?;
        let mut buf = vec![0u8; RECV_BUFFER];

        for attempt in 0..=self.retries {
            trace!(peer = %self.peer, request_id = pdu.request_id, attempt, "snmp send");
            self.socket.send(&datagram).await?;

            let deadline = tokio::time::Instant::now() + self.get_timeout;
            loop {
                let received =
                    tokio::time::timeout_at(deadline, self.socket.recv(&mut buf)).await;
                let len = match received {
                    Err(_) => break,
                    Ok(Err(e)) => {
                        return Err(Error::Unreachable {
                            address: self.peer.to_string(),
                            reason: e.to_string(),
                        });
                    }
                    Ok(Ok(len)) => len,
                };
                match self.decode(&buf[..len]) {
                    Ok(response) if response.request_id == pdu.request_id => return Ok(response),
                    Ok(response) => {
                        trace!(
                            expected = pdu.request_id,
                            got = response.request_id,
                            "discarding stale snmp response"
                        );
                    }
                    Err(e) if matches!(e, Error::Authentication { .. }) => return Err(e),
                    Err(e) => debug!(error = %e, "discarding malformed snmp datagram"),
                }
            }
        }

        Err(Error::Timeout {
            timeout_secs: self.get_timeout.as_secs(),
        })
    }

    fn encode(&mut self, pdu: &Pdu) -> Result<Vec<u8>, Error> {
        match &mut self.security {
            Security::Community(community) => Ok(pdu::encode_community(
                community.expose_secret().as_bytes(),
                pdu,
            )),
            Security::Usm(state) => {
                let engine = state
                    .engine
                    .as_ref()
                    .ok_or_else(|| Error::protocol("USM engine not discovered"))?;
                state.salt = state.salt.wrapping_add(1);
                let salt = state.salt.to_be_bytes();
                let scoped = usm::encode_scoped_pdu(&engine.id, pdu);
                let encrypted = usm::encrypt(
                    &engine.keys.privacy,
                    engine.boots,
                    engine.time,
                    &salt,
                    &scoped,
                )?;
                let message = V3Message {
                    msg_id: pdu.request_id,
                    flags: FLAG_AUTH | FLAG_PRIV | FLAG_REPORTABLE,
                    security: SecurityParams {
                        engine_id: engine.id.clone(),
                        boots: engine.boots,
                        time: engine.time,
                        user_name: state.user_name.as_bytes().to_vec(),
                        auth_params: vec![0; engine.keys.protocol.mac_len()],
                        priv_params: salt.to_vec(),
                    },
                    context_engine_id: engine.id.clone(),
                    body: ScopedBody::Encrypted(encrypted),
                };
                let mut bytes = message.encode();
                usm::sign_in_place(&engine.keys, &mut bytes)?;
                Ok(bytes)
            }
        }
    }

    fn decode(&mut self, datagram: &[u8]) -> Result<Pdu, Error> {
        match &mut self.security {
            Security::Community(_) => pdu::decode_community(datagram),
            Security::Usm(state) => {
                let (message, auth_range) = V3Message::decode(datagram)?;
                let pdu = match (message.body, state.engine.as_mut()) {
                    (ScopedBody::Plain(pdu), _) => pdu,
                    (ScopedBody::Encrypted(cipher), Some(engine)) => {
                        if message.flags & FLAG_AUTH != 0 {
                            usm::verify(&engine.keys, datagram, auth_range)?;
                        }
                        let plain = usm::decrypt(
                            &engine.keys.privacy,
                            message.security.boots,
                            message.security.time,
                            &message.security.priv_params,
                            &cipher,
                        )?;
                        usm::decode_scoped_pdu(&plain)?.1
                    }
                    (ScopedBody::Encrypted(_), None) => {
                        return Err(Error::protocol("encrypted reply before engine discovery"));
                    }
                };
                if let Some(engine) = state.engine.as_mut() {
                    if message.security.engine_id == engine.id {
                        engine.boots = message.security.boots;
                        engine.time = message.security.time;
                    }
                }
                Ok(pdu)
            }
        }
    }

    /// RFC 3414 §4: an empty, unauthenticated request elicits a report
    /// carrying the agent's engine id, boots, and time.
    async fn discover_engine(&mut self) -> Result<(), Error> {
        let request_id = self.allocate_id();
        let probe = V3Message {
            msg_id: request_id,
            flags: FLAG_REPORTABLE,
            security: SecurityParams::default(),
            context_engine_id: Vec::new(),
            body: ScopedBody::Plain(Pdu::request(PduType::Get, request_id, Vec::new())),
        };
        let datagram = probe.encode();
        let mut buf = vec![0u8; RECV_BUFFER];

        for _ in 0..=self.retries {
            self.socket.send(&datagram).await?;
            let Ok(received) = tokio::time::timeout(self.get_timeout, self.socket.recv(&mut buf)).await
            else {
                continue;
            };
            let len = received.map_err(|e| Error::Unreachable {
                address: self.peer.to_string(),
                reason: e.to_string(),
            })?;
            let (reply, _) = V3Message::decode(&buf[..len])?;
            if reply.security.engine_id.is_empty() {
                return Err(Error::protocol("agent reported an empty engine id"));
            }
            let Security::Usm(state) = &mut self.security else {
                return Ok(());
            };
            let keys = LocalizedKeys::derive(
                state.protocol,
                state.password.expose_secret().as_bytes(),
                &reply.security.engine_id,
            )?;
            debug!(peer = %self.peer, boots = reply.security.boots, "discovered snmp engine");
            state.engine = Some(Engine {
                id: reply.security.engine_id,
                boots: reply.security.boots,
                time: reply.security.time,
                keys,
            });
            return Ok(());
        }

        Err(Error::Timeout {
            timeout_secs: self.get_timeout.as_secs(),
        })
    }
}

fn is_time_window_report(report: &Pdu) -> bool {
    report
        .varbinds
        .iter()
        .any(|vb| vb.oid.to_string() == usm::NOT_IN_TIME_WINDOW)
}

fn report_error(report: &Pdu) -> Error {
    let counter = report
        .varbinds
        .first()
        .map_or_else(|| "unknown".to_owned(), |vb| vb.oid.to_string());
    Error::Authentication {
        message: format!("SNMPv3 agent sent report {counter}"),
    }
}
