//! Parsing of `host[:port]` authorities as they appear in `Host`, `Forwarded`
//! and the `X-Forwarded-*` family of headers.

use std::fmt::{Display, Formatter};
use std::net::Ipv6Addr;
use std::str::FromStr;

use crate::ensure;
use crate::protocol::ParseError;

/// A host with an optional port.
///
/// IPv6 literals are always kept in their bracketed form (`[::1]`), whether the
/// input was bracketed or a bare address such as `::1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostPort {
    host: String,
    port: Option<u16>,
}

impl HostPort {
    pub fn new<S: Into<String>>(host: S, port: Option<u16>) -> Self {
        Self { host: host.into(), port }
    }

    /// Parses an authority.
    ///
    /// Accepted forms are `host`, `host:port`, `[v6]`, `[v6]:port` and a bare
    /// IPv6 address (more than one colon, never carrying a port).
    pub fn parse(authority: &str) -> Result<Self, ParseError> {
        ensure!(!authority.trim().is_empty(), ParseError::invalid_host_port(authority, "empty authority"));

        if authority.starts_with('[') {
            let close = authority.rfind(']').ok_or_else(|| ParseError::invalid_host_port(authority, "bad ipv6 host"))?;
            let host = &authority[..=close];
            ensure!(Ipv6Addr::from_str(&host[1..close]).is_ok(), ParseError::invalid_host_port(authority, "bad ipv6 host"));

            let rest = &authority[close + 1..];
            let port = if rest.is_empty() {
                None
            } else {
                let port = rest.strip_prefix(':').ok_or_else(|| ParseError::invalid_host_port(authority, "bad ipv6 port"))?;
                Some(parse_port(port)?)
            };
            return Ok(Self::new(host, port));
        }

        match (authority.find(':'), authority.rfind(':')) {
            (Some(first), Some(last)) if first != last => {
                ensure!(Ipv6Addr::from_str(authority).is_ok(), ParseError::invalid_host_port(authority, "bad ipv6 host"));
                Ok(Self::new(format!("[{authority}]"), None))
            }
            (Some(colon), _) => {
                let host = &authority[..colon];
                ensure!(is_valid_host_name(host), ParseError::invalid_host_port(authority, "bad authority"));
                let port = parse_port(&authority[colon + 1..])?;
                Ok(Self::new(host, Some(port)))
            }
            _ => {
                ensure!(is_valid_host_name(authority), ParseError::invalid_host_port(authority, "bad authority"));
                Ok(Self::new(authority, None))
            }
        }
    }

    #[inline]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[inline]
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Returns the port, or `default` when none was given.
    #[inline]
    pub fn port_or(&self, default: u16) -> u16 {
        self.port.unwrap_or(default)
    }

    pub fn is_ipv6(&self) -> bool {
        self.host.starts_with('[')
    }
}

/// Parses a port in the range `1..=65535`.
pub fn parse_port(value: &str) -> Result<u16, ParseError> {
    let trimmed = value.trim();
    ensure!(!trimmed.is_empty(), ParseError::invalid_host_port(value, "missing port"));

    match trimmed.parse::<u16>() {
        Ok(0) | Err(_) => Err(ParseError::invalid_host_port(value, "bad port")),
        Ok(port) => Ok(port),
    }
}

fn is_valid_host_name(host: &str) -> bool {
    !host.trim().is_empty()
        && host.bytes().all(|b| b.is_ascii_graphic() && !matches!(b, b'/' | b'?' | b'#' | b'@' | b'[' | b']' | b'\\' | b'"'))
}

impl FromStr for HostPort {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for HostPort {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.host, port),
            None => f.write_str(&self.host),
        }
    }
}
