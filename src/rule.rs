use std::fmt;
use std::str::FromStr;

use crate::error::ForwardError;

/// One forwarding rule: a local TCP port relayed to a remote host and port.
///
/// The remote host may be an IP address or a DNS name; names are resolved
/// when a client connects, not when the rule is created, so DNS changes
/// take effect on new connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardRule {
    /// Local port to listen on.
    pub local_port: u16,
    /// Remote IP address or DNS name.
    pub remote_host: String,
    /// Remote port to connect to.
    pub remote_port: u16,
}

impl ForwardRule {
    /// Builds a rule, rejecting zero ports and empty hosts.
    pub fn new(
        local_port: u16,
        remote_host: &str,
        remote_port: u16,
    ) -> Result<Self, ForwardError> {
        if local_port == 0 || remote_port == 0 {
            return Err(ForwardError::InvalidPort);
        }
        if remote_host.is_empty() {
            return Err(ForwardError::EmptyRemoteHost);
        }
        Ok(Self {
            local_port,
            remote_host: remote_host.to_owned(),
            remote_port,
        })
    }

    /// The remote endpoint as a `(host, port)` pair for connecting.
    pub(crate) fn remote(&self) -> (&str, u16) {
        (self.remote_host.as_str(), self.remote_port)
    }
}

impl fmt::Display for ForwardRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}:{}",
            self.local_port, self.remote_host, self.remote_port
        )
    }
}

/// Parses the CLI form `LOCAL_PORT:REMOTE_HOST:REMOTE_PORT`.
///
/// The host is taken as everything between the first and the last colon, so
/// bracketed IPv6 literals like `8080:[fe80::2]:80` parse as expected.
impl FromStr for ForwardRule {
    type Err = ForwardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ForwardError::InvalidRule(s.to_owned());
        let (local, rest) = s.split_once(':').ok_or_else(invalid)?;
        let (host, remote) = rest.rsplit_once(':').ok_or_else(invalid)?;
        let local_port = local.parse().map_err(|_| invalid())?;
        let remote_port = remote.parse().map_err(|_| invalid())?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        Self::new(local_port, host, remote_port)
    }
}
