//! Bidirectional byte relay between a client and a remote connection.

use std::net::Shutdown;

use smol::net::TcpStream;
use smol::{future, io};

/// The two live sockets of one forwarded connection.
///
/// Streams are handles to shared sockets, so the pair can sit in a rule's
/// active-connection table while the relay task runs with its own clones;
/// shutting the pair down from either place unblocks the other.
#[derive(Clone)]
pub(crate) struct RelayPair {
    pub client: TcpStream,
    pub remote: TcpStream,
}

impl RelayPair {
    /// Shuts down both ends of both connections. Any relay direction still
    /// blocked in a read or write wakes up with end-of-stream or an error.
    pub fn shutdown(&self) {
        let _ = self.client.shutdown(Shutdown::Both);
        let _ = self.remote.shutdown(Shutdown::Both);
    }
}

/// Copies bytes in both directions until either side closes or fails, then
/// shuts both sockets down. Returns the byte count of whichever direction
/// finished first.
///
/// The two directions race: the first to hit end-of-stream or an error wins,
/// and the shutdown of both sockets unblocks the other direction so its task
/// ends too. Every exit path closes both connections.
pub(crate) async fn relay(pair: &RelayPair) -> io::Result<u64> {
    let upload = io::copy(pair.client.clone(), pair.remote.clone());
    let download = io::copy(pair.remote.clone(), pair.client.clone());
    let result = future::race(upload, download).await;
    pair.shutdown();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    use smol::io::{AsyncReadExt, AsyncWriteExt};
    use smol::net::TcpListener;

    /// A connected (client end, server end) socket pair over loopback.
    async fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connect = TcpStream::connect(addr);
        let accept = async { listener.accept().await.unwrap().0 };
        let (client, server) = future::zip(connect, accept).await;
        (client.unwrap(), server)
    }

    #[test]
    fn relays_bytes_both_ways() {
        smol::block_on(async {
            let (mut client, client_side) = socket_pair().await;
            let (mut remote, remote_side) = socket_pair().await;
            let pair = RelayPair {
                client: client_side,
                remote: remote_side,
            };
            let task = smol::spawn(async move { relay(&pair).await });

            client.write_all(b"PING").await.unwrap();
            let mut buf = [0u8; 4];
            remote.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"PING");

            remote.write_all(b"PONG").await.unwrap();
            client.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"PONG");

            // Closing one side terminates the pair and the other side
            // observes end-of-stream.
            drop(remote);
            task.await.unwrap();
            assert_eq!(client.read(&mut buf).await.unwrap(), 0);
        });
    }

    #[test]
    fn shutdown_unblocks_pending_reads() {
        smol::block_on(async {
            let (mut client, client_side) = socket_pair().await;
            let (mut remote, remote_side) = socket_pair().await;
            let pair = RelayPair {
                client: client_side,
                remote: remote_side,
            };
            let relay_pair = pair.clone();
            let task = smol::spawn(async move { relay(&relay_pair).await });

            // Both directions are idle; an external shutdown must end them.
            pair.shutdown();
            let _ = task.await;

            let mut buf = [0u8; 1];
            assert_eq!(client.read(&mut buf).await.unwrap(), 0);
            assert_eq!(remote.read(&mut buf).await.unwrap(), 0);
        });
    }
}
