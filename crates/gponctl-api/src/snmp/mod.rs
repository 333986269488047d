//! SNMP v2c / v3 transport.
//!
//! A small async SNMP stack over `tokio::net::UdpSocket`: BER codec,
//! community and USM message framing, a retrying request engine with
//! GET / GETNEXT / SET and a bounded lazy walk, and the
//! [`SnmpAdapter`] that maps vendor OID tables onto the device
//! capability set.

mod adapter;
pub(crate) mod ber;
mod oid;
pub mod pdu;
mod session;
mod usm;

pub use adapter::SnmpAdapter;
pub use oid::{Oid, OidTable};
pub use pdu::{Pdu, PduType, Value, VarBind};
pub use session::Session;
pub use usm::AuthProtocol;
