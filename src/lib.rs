//! Forward local TCP ports to another host.
//!
//! This is primarily useful for reaching services on a device that is only
//! connected over a single tethered link: one machine forwards local ports to
//! the device, and everything else talks to the forwarding machine as if the
//! services were local.
//!
//! The whole surface is the process-wide [`PortForwarder`] registry:
//!
//! ```no_run
//! use tetherfwd::PortForwarder;
//!
//! let fwd = PortForwarder::instance();
//! // Expose the device's web dashboard on local port 8080.
//! fwd.add(8080, "10.21.76.2", 80)?;
//! // Later, stop forwarding that port. Removing an unknown port is a no-op.
//! fwd.remove(8080);
//! # Ok::<(), tetherfwd::ForwardError>(())
//! ```
//!
//! Each rule owns a listening socket and an accept loop running on a shared
//! background executor. Every accepted client gets its own outbound
//! connection to the remote host (the host name is re-resolved per
//! connection) and a bidirectional byte relay. A failed outbound connection
//! closes that one client and nothing else; only a failure to bind the local
//! port is reported to the caller.

mod error;
mod forward;
mod registry;
mod relay;
mod rule;
mod runtime;

pub use error::ForwardError;
pub use registry::PortForwarder;
pub use rule::ForwardRule;
pub use runtime::set_worker_threads;
