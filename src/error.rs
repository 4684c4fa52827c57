use std::io;

use thiserror::Error;

/// Errors reported by the forwarding registry.
///
/// Only rule-establishment failures surface here. Per-connection problems
/// (an unreachable remote, a reset mid-relay) are contained inside the
/// worker for that rule: the affected connection is closed and the listener
/// keeps accepting.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The local port could not be bound or listened on: already in use,
    /// denied by the OS, or otherwise unusable. The rule was not installed
    /// and any rule previously on the port is left as it was.
    #[error("could not bind local port {port}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    /// A `LOCAL:HOST:REMOTE` forwarding spec could not be parsed.
    #[error("invalid forwarding spec `{0}`, expected LOCAL_PORT:REMOTE_HOST:REMOTE_PORT")]
    InvalidRule(String),

    /// A port number was zero.
    #[error("port number must be between 1 and 65535")]
    InvalidPort,

    /// The remote host was empty.
    #[error("remote host must not be empty")]
    EmptyRemoteHost,
}
