//! The process-wide forwarding-rule registry.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use smol::future;

use crate::error::ForwardError;
use crate::forward::{shutdown_all, Forward};
use crate::rule::ForwardRule;

static INSTANCE: Lazy<PortForwarder> = Lazy::new(PortForwarder::default);

/// Forwards local TCP ports to another host.
///
/// There is one forwarder per process, obtained with
/// [`PortForwarder::instance`]; it owns every rule and serializes changes to
/// them. A rule is keyed by its local port: adding a port that already has a
/// rule replaces the old rule, tearing down its listener and connections.
#[derive(Default)]
pub struct PortForwarder {
    table: Mutex<HashMap<u16, Forward>>,
}

impl PortForwarder {
    /// The process-wide forwarder, created on first use.
    pub fn instance() -> &'static PortForwarder {
        &INSTANCE
    }

    /// Forwards local TCP port `local_port` to `remote_host:remote_port`.
    ///
    /// The local port is bound and listening when this returns; accepting
    /// runs in the background. Local ports below 1024 won't bind as a
    /// normal user on most systems and fail with [`ForwardError::Bind`].
    ///
    /// If the port already has a rule, the old rule is replaced: its
    /// listener and every connection it spawned are closed once the new
    /// listener is up. The replacement is all-or-nothing — when the new
    /// bind fails, the old rule is restored with its connections intact.
    pub fn add(
        &self,
        local_port: u16,
        remote_host: &str,
        remote_port: u16,
    ) -> Result<(), ForwardError> {
        let rule = ForwardRule::new(local_port, remote_host, remote_port)?;
        let mut table = self.table.lock();

        // Free the port before rebinding, but keep the old rule's pieces so
        // a failed bind can put it back.
        let prior = table
            .remove(&local_port)
            .map(|fwd| future::block_on(fwd.pause()));

        match Forward::start(rule) {
            Ok(forward) => {
                if let Some((old_rule, conns, _)) = prior {
                    let closed = shutdown_all(&conns);
                    tracing::info!(%old_rule, new_rule = %forward.rule(), closed, "replaced rule");
                }
                table.insert(local_port, forward);
                Ok(())
            }
            Err(err) => {
                if let Some((old_rule, conns, next_id)) = prior {
                    match Forward::resume(old_rule.clone(), conns.clone(), next_id) {
                        Ok(forward) => {
                            table.insert(local_port, forward);
                        }
                        Err(restore_err) => {
                            // The port vanished between our own unbind and
                            // rebind; the old rule cannot be kept either.
                            shutdown_all(&conns);
                            tracing::error!(%old_rule, %restore_err, "could not restore rule");
                        }
                    }
                }
                Err(err)
            }
        }
    }

    /// Stops forwarding `local_port`.
    ///
    /// The listening socket is closed and both ends of every connection the
    /// rule spawned are shut down before this returns; the relay tasks then
    /// finish on their own. Removing a port with no rule is a no-op.
    pub fn remove(&self, local_port: u16) {
        let mut table = self.table.lock();
        match table.remove(&local_port) {
            Some(forward) => future::block_on(forward.stop()),
            None => tracing::debug!(local_port, "remove of unknown port ignored"),
        }
    }

    /// Stops every rule, for orderly shutdown.
    pub fn stop_all(&self) {
        let mut table = self.table.lock();
        for (_, forward) in table.drain() {
            future::block_on(forward.stop());
        }
    }

    /// A snapshot of the current rules, in no particular order.
    pub fn forwards(&self) -> Vec<ForwardRule> {
        self.table
            .lock()
            .values()
            .map(|fwd| fwd.rule().clone())
            .collect()
    }
}
