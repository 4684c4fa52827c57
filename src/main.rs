//! A TCP port forwarder for tethered devices. Each rule relays a local port
//! to a host and port on the far side of the link.
//!
//! ## Usage
//!
//! ```text
//! Usage: tetherfwd [OPTIONS] --forward <FORWARD>
//!
//! Options:
//!   -f, --forward <FORWARD>  A forwarding rule, as LOCAL_PORT:REMOTE_HOST:REMOTE_PORT
//!   -T, --threads <THREADS>  Number of relay threads, defaults to the number of logical CPUs
//!   -v...                    Verbose output (-v, -vv, etc.)
//!   -h, --help               Print help
//!   -V, --version            Print version
//! ```
//!
//! ## Examples
//!
//! Expose the camera stream and web dashboard of a device tethered at
//! 172.22.11.2:
//!
//! ```sh
//! tetherfwd -f 1181:172.22.11.2:1181 -f 8080:172.22.11.2:80
//! ```
//!
//! Forward port 2222 to the SSH port of a device found by DNS name:
//!
//! ```sh
//! tetherfwd -f 2222:roborio-2176-frc.local:22
//! ```

use clap::Parser;
use smol::future;
use tetherfwd::{ForwardError, PortForwarder};

mod cli;

fn main() -> Result<(), ForwardError> {
    // Parse command line arguments.
    let cli = cli::Cli::parse();

    // Initialize tracing.
    let verbose = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(verbose).init();

    // Number of relay threads, defaults to the number of logical CPUs. Must
    // be configured before the first rule spins up the executor.
    if let Some(threads) = cli.threads {
        tetherfwd::set_worker_threads(threads);
    }

    // Install every rule; a port that cannot be bound aborts startup.
    let forwarder = PortForwarder::instance();
    for rule in &cli.forward {
        forwarder.add(rule.local_port, &rule.remote_host, rule.remote_port)?;
    }
    tracing::info!("forwarding {} port(s)", forwarder.forwards().len());

    // The workers run on background threads; park here forever.
    future::block_on(future::pending())
}
