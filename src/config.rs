//! Runtime configuration for the bridge daemons.
//!
//! There is no configuration file and no persisted state: every run is
//! configured purely from its command-line arguments, matching the
//! stated non-goal of "no persistent state across restarts". Each binary
//! builds a typed `Config` once at startup and passes it to its engine.

use std::net::IpAddr;

use anyhow::{bail, Result};

/// A host, named either by hostname or IPv4 address.
#[derive(Debug, Clone)]
pub enum Endpoint {
    /// Resolved by DNS at connect time.
    Hostname(String),
    /// A literal IP address.
    Addr(IpAddr),
}

impl Endpoint {
    /// Returns the string form suitable for `tokio::net::lookup_host` / `TcpStream::connect`.
    pub fn host_str(&self) -> String {
        match self {
            Self::Hostname(h) => h.clone(),
            Self::Addr(a) => a.to_string(),
        }
    }
}

/// Configuration for the `dlsw` binary: bridges one 3705 SDLC line to a
/// remote DLSw peer.
#[derive(Debug, Clone)]
pub struct DlswConfig {
    /// Address of the remote DLSw peer.
    pub peer: Endpoint,
    /// Address of the host running the emulated 3705 (the LIB listener).
    pub controller: Endpoint,
    /// SDLC line number on the 3705 to bridge.
    pub line: u16,
    /// Enable `trace_DLSw.log` protocol tracing.
    pub debug: bool,
}

/// Configuration for the `nmodem` binary: bridges two 3705 SDLC lines
/// directly to each other.
#[derive(Debug, Clone)]
pub struct NullModemConfig {
    /// Address of the host running the first 3705.
    pub controller1: Endpoint,
    /// Address of the host running the second 3705.
    pub controller2: Endpoint,
    /// Line number on the first 3705.
    pub line1: u16,
    /// Line number on the second 3705.
    pub line2: u16,
    /// Enable `trace_NModem.log` protocol tracing.
    pub debug: bool,
}

/// Resolve a mutually-exclusive (hostname, ip) argument pair into a single `Endpoint`.
///
/// Mirrors the CLI contract: exactly one of `-*hn` / `-*ip` must be given.
pub fn resolve_endpoint(hostname: Option<String>, ip: Option<IpAddr>) -> Result<Endpoint> {
    match (hostname, ip) {
        (Some(_), Some(_)) => bail!("hostname and ip address flags are mutually exclusive"),
        (None, None) => bail!("one of the hostname or ip address flags is required"),
        (Some(h), None) => Ok(Endpoint::Hostname(h)),
        (None, Some(a)) => Ok(Endpoint::Addr(a)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_endpoint_rejects_both() {
        let result = resolve_endpoint(Some("host".into()), Some("127.0.0.1".parse().unwrap()));
        assert!(result.is_err());
    }

    #[test]
    fn resolve_endpoint_rejects_neither() {
        let result = resolve_endpoint(None, None);
        assert!(result.is_err());
    }

    #[test]
    fn resolve_endpoint_accepts_hostname() {
        let endpoint = resolve_endpoint(Some("host1".into()), None).unwrap();
        assert_eq!(endpoint.host_str(), "host1");
    }

    #[test]
    fn resolve_endpoint_accepts_ip() {
        let endpoint = resolve_endpoint(None, Some("10.0.0.5".parse().unwrap())).unwrap();
        assert_eq!(endpoint.host_str(), "10.0.0.5");
    }
}
