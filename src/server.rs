//! The authoritative server: accepts TCP connections, assigns client ids,
//! owns the connection table, and broadcasts document snapshots to every
//! live connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};

use crate::error::Result;
use crate::handler::DocumentHandler;

/// The server-side record of one live connection: an outbound channel the
/// broadcast sweep writes through, and a shared flag the connection's own
/// read loop sets on a transport error.
struct ConnectionHandle {
    outbox: mpsc::UnboundedSender<Vec<u8>>,
    expired: Arc<AtomicBool>,
}

pub struct Server {
    listener: TcpListener,
    handler: Arc<Mutex<DocumentHandler>>,
    connections: Arc<Mutex<HashMap<usize, ConnectionHandle>>>,
    next_id: Arc<AtomicUsize>,
}

impl Server {
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr, "server listening");
        Ok(Self {
            listener,
            handler: Arc::new(Mutex::new(DocumentHandler::new())),
            connections: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop forever, spawning one task per connection.
    pub async fn serve(self) -> Result<()> {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            tracing::info!(id, %peer, "accepted connection");

            let handler = Arc::clone(&self.handler);
            let connections = Arc::clone(&self.connections);
            tokio::spawn(async move {
                handle_connection(stream, id, handler, connections).await;
            });
        }
    }
}

pub async fn run(addr: &str) -> Result<()> {
    Server::bind(addr).await?.serve().await
}

async fn handle_connection(
    stream: TcpStream,
    id: usize,
    handler: Arc<Mutex<DocumentHandler>>,
    connections: Arc<Mutex<HashMap<usize, ConnectionHandle>>>,
) {
    let (mut reader, mut writer) = stream.into_split();
    let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let expired = Arc::new(AtomicBool::new(false));

    connections.lock().await.insert(
        id,
        ConnectionHandle {
            outbox: outbox_tx.clone(),
            expired: Arc::clone(&expired),
        },
    );

    let writer_task = tokio::spawn(async move {
        while let Some(bytes) = outbox_rx.recv().await {
            if let Err(err) = writer.write_all(&bytes).await {
                tracing::warn!(id, %err, "write error");
            }
        }
    });

    handler.lock().await.add_cursor(id);
    let _ = outbox_tx.send(id.to_string().into_bytes());

    let mut frame = [0u8; 2];
    loop {
        match reader.read_exact(&mut frame).await {
            Err(err) => {
                tracing::info!(id, %err, "read error, marking connection expired");
                expired.store(true, Ordering::SeqCst);
                break;
            }
            Ok(_) if &frame == b"DD" => {
                let snapshot = handler.lock().await.serialize();
                broadcast(&connections, snapshot).await;
            }
            Ok(_) => {
                let ok = handler.lock().await.process_message(id, frame);
                if ok {
                    let snapshot = handler.lock().await.serialize();
                    broadcast(&connections, snapshot).await;
                }
            }
        }
    }

    handler.lock().await.remove_cursor(id);
    writer_task.abort();
}

/// Removes every expired connection from the table, then enqueues `bytes`
/// on every connection that survives the sweep.
async fn broadcast(connections: &Mutex<HashMap<usize, ConnectionHandle>>, bytes: Vec<u8>) {
    let mut table = connections.lock().await;
    table.retain(|_, handle| !handle.expired.load(Ordering::SeqCst));
    for handle in table.values() {
        let _ = handle.outbox.send(bytes.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
    use tokio::net::TcpStream;

    async fn spawn_test_server() -> std::net::SocketAddr {
        let server = Server::bind("127.0.0.1:0").await.expect("bind");
        let addr = server.local_addr().expect("local_addr");
        tokio::spawn(async move {
            let _ = server.serve().await;
        });
        addr
    }

    async fn read_handshake(stream: &mut TcpStream) -> usize {
        let mut buf = [0u8; 16];
        let n = stream.read(&mut buf).await.expect("read handshake");
        std::str::from_utf8(&buf[..n])
            .unwrap()
            .trim()
            .parse()
            .expect("decimal id")
    }

    async fn read_snapshot(stream: &mut TcpStream) -> Vec<u8> {
        let mut buf = vec![0u8; 10_000];
        let n = stream.read(&mut buf).await.expect("read snapshot");
        buf.truncate(n);
        buf
    }

    #[tokio::test]
    async fn single_client_hello_matches_scenario_s1() {
        let addr = spawn_test_server().await;
        let mut stream = TcpStream::connect(addr).await.expect("connect");

        let id = read_handshake(&mut stream).await;
        assert_eq!(id, 0);

        stream.write_all(b"DD").await.expect("send DD");
        let snapshot = read_snapshot(&mut stream).await;
        assert_eq!(snapshot, b"1\n0 0 0\n1\n\n");
    }

    #[tokio::test]
    async fn second_client_gets_a_larger_id() {
        let addr = spawn_test_server().await;
        let mut a = TcpStream::connect(addr).await.expect("connect a");
        let id_a = read_handshake(&mut a).await;
        let mut b = TcpStream::connect(addr).await.expect("connect b");
        let id_b = read_handshake(&mut b).await;
        assert!(id_b > id_a);
    }

    #[tokio::test]
    async fn unknown_opcode_triggers_no_broadcast() {
        let addr = spawn_test_server().await;
        let mut stream = TcpStream::connect(addr).await.expect("connect");
        let _ = read_handshake(&mut stream).await;
        stream.write_all(b"DD").await.expect("send DD");
        let _ = read_snapshot(&mut stream).await;

        stream.write_all(b"ZZ").await.expect("send ZZ");
        stream.write_all(b"Wa").await.expect("send Wa");
        let snapshot = read_snapshot(&mut stream).await;
        assert_eq!(snapshot, b"1\n0 1 0\n1\na\n");
    }

    #[tokio::test]
    async fn broadcast_sweep_reaps_expired_connections_and_keeps_others() {
        let server = Server::bind("127.0.0.1:0").await.expect("bind");
        let addr = server.local_addr().expect("local_addr");
        let connections = Arc::clone(&server.connections);
        tokio::spawn(async move {
            let _ = server.serve().await;
        });

        let mut a = TcpStream::connect(addr).await.expect("connect a");
        let id_a = read_handshake(&mut a).await;
        let mut b = TcpStream::connect(addr).await.expect("connect b");
        let id_b = read_handshake(&mut b).await;

        drop(a);
        // give a's read loop a moment to observe the close and mark itself expired
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        // any message from the survivor triggers a broadcast, which sweeps the table
        b.write_all(b"Wa").await.expect("send Wa from survivor");
        let snapshot = read_snapshot(&mut b).await;
        assert_eq!(snapshot, b"1\n0 1 0\n1\na\n");

        let table = connections.lock().await;
        assert!(!table.contains_key(&id_a));
        assert!(table.contains_key(&id_b));
        assert_eq!(table.len(), 1);
    }
}
