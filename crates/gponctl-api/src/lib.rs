// gponctl-api: Async device transports (SNMP, SSH-CLI, vendor REST) for GPON OLTs

pub mod adapter;
pub mod error;
pub mod rest;
pub mod snmp;
pub mod ssh;
pub mod target;
pub mod transport;

pub use adapter::{
    DeviceAdapter, OpticalPower, Performance, PppoeRequest, RawUnit, SystemInfo, UnitAddress,
    UnitListing,
};
pub use error::Error;
pub use rest::RestAdapter;
pub use snmp::{AuthProtocol, Oid, OidTable, SnmpAdapter};
pub use ssh::SshAdapter;
pub use target::{DeviceTarget, RestCredentials, SnmpCredentials, SnmpVersion, SshCredentials};
pub use transport::TransportConfig;
