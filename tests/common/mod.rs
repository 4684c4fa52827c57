//! Plain-std test fixtures: throwaway servers and clients that talk to the
//! forwarder over real loopback sockets.

#![allow(dead_code)]

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Picks a currently free TCP port by binding an ephemeral one and letting
/// it go again.
pub fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Serves echo on the given listener from background threads, one per
/// client, until the process exits.
pub fn spawn_echo(listener: TcpListener) {
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            thread::spawn(move || {
                let mut buf = [0u8; 1024];
                loop {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if stream.write_all(&buf[..n]).is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }
    });
}

/// Starts an echo server on an ephemeral port and returns the port.
pub fn spawn_echo_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    spawn_echo(listener);
    port
}

/// Starts a server that greets every client with `banner`, then holds the
/// connection open until the client closes it. Returns the port.
pub fn spawn_banner_server(banner: &'static [u8]) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            thread::spawn(move || {
                if stream.write_all(banner).is_err() {
                    return;
                }
                let mut buf = [0u8; 64];
                while matches!(stream.read(&mut buf), Ok(n) if n > 0) {}
            });
        }
    });
    port
}

/// Connects to a forwarded local port, with timeouts so a broken relay
/// fails the test instead of hanging it.
pub fn connect(port: u16) -> TcpStream {
    let stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stream.set_read_timeout(Some(TIMEOUT)).unwrap();
    stream.set_write_timeout(Some(TIMEOUT)).unwrap();
    stream
}

/// Sends PING through the forwarded port and expects it echoed back intact.
pub fn roundtrip(port: u16) {
    let mut client = connect(port);
    client.write_all(b"PING").unwrap();
    let mut buf = [0u8; 4];
    client.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"PING");
}

/// Asserts the peer has closed: the next read must yield end-of-stream (or
/// a reset), never data and never a timeout.
pub fn assert_closed(stream: &mut TcpStream) {
    let mut buf = [0u8; 1];
    match stream.read(&mut buf) {
        Ok(0) => {}
        Ok(n) => panic!("expected closed connection, read {} byte(s)", n),
        Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
            panic!("connection still open after timeout")
        }
        Err(_) => {}
    }
}
