//! End-to-end coverage of the controller façade against a scripted TCP
//! stand-in for a Tor control port: connect, authenticate, issue commands,
//! and receive asynchronous events, all over the real wire codec.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use torctl::Controller;

/// A scripted stand-in for a Tor control port. Binds to a random port,
/// accepts exactly one connection, and answers commands with canned
/// replies; tests can also push unsolicited event lines mid-connection.
struct MockTorServer {
    addr: SocketAddr,
    outbound: Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>,
    _task: JoinHandle<()>,
}

impl MockTorServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let outbound = Arc::new(Mutex::new(None));
        let outbound_for_task = outbound.clone();

        let task = tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                let (tx, rx) = mpsc::unbounded_channel();
                *outbound_for_task.lock().unwrap() = Some(tx);
                handle_connection(stream, rx).await;
            }
        });

        MockTorServer { addr, outbound, _task: task }
    }

    fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Queues a raw line (or block of CRLF-joined lines) to be written to
    /// the client as soon as the connection is idle, simulating an
    /// asynchronous event.
    fn push(&self, raw: &str) {
        if let Some(tx) = self.outbound.lock().unwrap().as_ref() {
            let _ = tx.send(raw.to_owned());
        }
    }

    /// Closes the server's side of the connection, as if Tor had exited.
    fn disconnect(&self) {
        if let Some(tx) = self.outbound.lock().unwrap().as_ref() {
            let _ = tx.send("__CLOSE__".to_owned());
        }
    }
}

async fn handle_connection(stream: tokio::net::TcpStream, mut rx: mpsc::UnboundedReceiver<String>) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    loop {
        line.clear();
        tokio::select! {
            result = reader.read_line(&mut line) => {
                match result {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        let command = line.trim_end_matches(['\r', '\n']).to_owned();
                        let reply = scripted_reply(&command);
                        if write_half.write_all(reply.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                }
            }
            Some(pushed) = rx.recv() => {
                if pushed == "__CLOSE__" {
                    break;
                }
                if write_half.write_all(pushed.as_bytes()).await.is_err() {
                    break;
                }
            }
        }
    }
}

fn scripted_reply(command: &str) -> String {
    if command.starts_with("PROTOCOLINFO") {
        "250-PROTOCOLINFO 1\r\n250-AUTH METHODS=NULL\r\n250-VERSION Tor=\"0.4.7.13\"\r\n250 OK\r\n".to_owned()
    } else if command.starts_with("AUTHENTICATE") {
        "250 OK\r\n".to_owned()
    } else if command.starts_with("GETINFO version") {
        "250-version=0.4.7.13\r\n250 OK\r\n".to_owned()
    } else {
        "250 OK\r\n".to_owned()
    }
}

#[tokio::test]
async fn connects_authenticates_and_queries_info() {
    let server = MockTorServer::start().await;
    let controller = Controller::from_port("127.0.0.1", server.local_addr().port());

    controller.connect().await.expect("connect");
    controller.authenticate(None).await.expect("authenticate");

    let info = controller.get_info(&["version".to_owned()]).await.expect("getinfo");
    assert_eq!(info.get("version").map(String::as_str), Some("0.4.7.13"));

    assert!(controller.is_alive().await);
    controller.close().await;
}

#[tokio::test]
async fn dispatches_events_to_registered_listeners() {
    let server = MockTorServer::start().await;
    let controller = Controller::from_port("127.0.0.1", server.local_addr().port());
    controller.connect().await.expect("connect");
    controller.authenticate(None).await.expect("authenticate");

    let (tx, mut rx) = mpsc::unbounded_channel();
    controller
        .add_event_listener(&["BW".to_owned()], Arc::new(move |event| {
            let _ = tx.send(event);
        }))
        .await
        .expect("subscribe");

    server.push("650 BW 15 25\r\n");

    let event = tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
        .await
        .expect("event arrived in time")
        .expect("channel open");

    match event {
        torctl::proto::Event::Bandwidth(bw) => {
            assert_eq!(bw.read, 15);
            assert_eq!(bw.written, 25);
        }
        other => panic!("expected a Bandwidth event, got {other:?}"),
    }

    controller.close().await;
}

#[tokio::test]
async fn socket_closure_fails_in_flight_requests_and_marks_controller_dead() {
    let server = MockTorServer::start().await;
    let controller = Controller::from_port("127.0.0.1", server.local_addr().port());
    controller.connect().await.expect("connect");
    controller.authenticate(None).await.expect("authenticate");

    server.disconnect();

    // Give the pump a moment to observe EOF and fail any pending requests.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let result = controller.get_info(&["version".to_owned()]).await;
    assert!(result.is_err(), "expected request against a closed socket to fail");
    assert!(!controller.is_alive().await);
}
