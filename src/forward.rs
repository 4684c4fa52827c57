//! The listener worker owning one forwarded port.

use std::collections::HashMap;
use std::io;
use std::net::{Shutdown, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smol::net::{TcpListener, TcpStream};
use smol::Task;
use socket2::{Domain, Socket, Type};

use crate::error::ForwardError;
use crate::relay::{relay, RelayPair};
use crate::rule::ForwardRule;
use crate::runtime;

/// Active relayed connections of one rule, keyed by an id private to the
/// rule. The accept loop inserts, each relay task removes itself when it
/// ends, and teardown drains whatever is left.
pub(crate) type ConnTable = Arc<Mutex<HashMap<u64, RelayPair>>>;

/// A running forward: the accept-loop task for one bound local port plus the
/// table of connections it has spawned.
///
/// Dropping the accept task closes the listening socket; the connections
/// live on until [`Forward::stop`] shuts them down or they end on their own.
pub(crate) struct Forward {
    rule: ForwardRule,
    accept_task: Task<()>,
    conns: ConnTable,
    next_id: Arc<AtomicU64>,
}

impl Forward {
    /// Binds the rule's local port and starts accepting. Bind and listen
    /// happen synchronously, so a port conflict surfaces here and not in
    /// the background.
    pub fn start(rule: ForwardRule) -> Result<Self, ForwardError> {
        Self::resume(rule, ConnTable::default(), Arc::default())
    }

    /// Like [`Forward::start`], but adopting an existing connection table.
    /// Used to rebind a paused rule when a replacement failed to bind.
    pub fn resume(
        rule: ForwardRule,
        conns: ConnTable,
        next_id: Arc<AtomicU64>,
    ) -> Result<Self, ForwardError> {
        let listener = bind(rule.local_port).map_err(|source| ForwardError::Bind {
            port: rule.local_port,
            source,
        })?;
        tracing::info!(%rule, "listening");
        let accept_task = runtime::spawn(accept_loop(
            listener,
            rule.clone(),
            conns.clone(),
            next_id.clone(),
        ));
        Ok(Self {
            rule,
            accept_task,
            conns,
            next_id,
        })
    }

    pub fn rule(&self) -> &ForwardRule {
        &self.rule
    }

    /// Stops accepting and closes the listening socket, keeping the active
    /// connections untouched. Returns what is needed to resume or finish
    /// tearing down. The port is free to rebind once this returns.
    pub async fn pause(self) -> (ForwardRule, ConnTable, Arc<AtomicU64>) {
        self.accept_task.cancel().await;
        (self.rule, self.conns, self.next_id)
    }

    /// Full teardown: close the listener, then shut down both ends of every
    /// active connection. Relay tasks notice the shutdown and exit on their
    /// own; nothing further is required of the caller.
    pub async fn stop(self) {
        let rule = self.rule.clone();
        let (_, conns, _) = self.pause().await;
        let closed = shutdown_all(&conns);
        tracing::info!(%rule, closed, "stopped forwarding");
    }
}

/// Shuts down every connection in the table, emptying it. Returns how many
/// pairs were still live.
pub(crate) fn shutdown_all(conns: &ConnTable) -> usize {
    let mut table = conns.lock();
    let closed = table.len();
    for (_, pair) in table.drain() {
        pair.shutdown();
    }
    closed
}

/// Binds and listens on `port` on all interfaces, with `SO_REUSEADDR` so a
/// just-removed rule's port can be taken over immediately even with
/// connections lingering in TIME_WAIT.
fn bind(port: u16) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::IPV4, Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    socket.bind(&addr.into())?;
    socket.listen(128)?;
    let listener: std::net::TcpListener = socket.into();
    TcpListener::try_from(listener)
}

/// Accepts clients for one rule until the task is cancelled or the listening
/// socket dies. Each accepted client gets its own outbound connection and a
/// detached relay task; a client whose remote connect fails is closed and
/// forgotten without disturbing the loop.
#[tracing::instrument(skip_all, fields(rule = %rule))]
async fn accept_loop(
    listener: TcpListener,
    rule: ForwardRule,
    conns: ConnTable,
    next_id: Arc<AtomicU64>,
) {
    loop {
        let (client, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) if is_transient(&err) => {
                tracing::warn!(%err, "transient accept error");
                continue;
            }
            Err(err) => {
                tracing::error!(%err, "listening socket failed, no longer accepting");
                break;
            }
        };
        tracing::info!(%peer, "accepted client");

        // The remote host is resolved here, per connection, so a DNS change
        // applies to every new connection.
        let remote = match TcpStream::connect(rule.remote()).await {
            Ok(remote) => remote,
            Err(err) => {
                tracing::warn!(%err, %peer, "could not reach remote, dropping client");
                let _ = client.shutdown(Shutdown::Both);
                continue;
            }
        };

        let id = next_id.fetch_add(1, Ordering::Relaxed);
        let pair = RelayPair { client, remote };
        conns.lock().insert(id, pair.clone());

        let conns = conns.clone();
        runtime::spawn(async move {
            match relay(&pair).await {
                Ok(bytes) => tracing::debug!(%peer, bytes, "connection closed"),
                Err(err) => tracing::debug!(%peer, %err, "connection ended with error"),
            }
            conns.lock().remove(&id);
        })
        .detach();
    }
}

/// Accept errors that a single misbehaving client or momentary resource
/// pressure can cause; anything else means the listening socket itself is
/// gone.
fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::TimedOut
            | io::ErrorKind::WouldBlock
    )
}
