//! The message pump (spec.md §4.7): one reader task per connection that
//! demultiplexes assembled replies into synchronous command responses
//! (FIFO-ordered) versus asynchronous events (handed to the dispatch
//! queue).

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use torctl_wire::{Assembler, ReplyMessage};

use crate::error::{ControllerError, SocketError};
use crate::listener::DispatchQueue;
use crate::socket::{Socket, SocketReader};

pub type ReplySender = oneshot::Sender<Result<ReplyMessage, ControllerError>>;

/// FIFO queue of completion handles for in-flight `msg` calls. Shared
/// between the controller (pushes on send) and the pump (pops on reply).
/// A plain (non-async) mutex: every critical section here is a single
/// push/pop, never held across an `.await`.
#[derive(Clone)]
pub struct PendingRequests {
    queue: Arc<Mutex<VecDeque<ReplySender>>>,
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingRequests {
    pub fn new() -> Self {
        PendingRequests {
            queue: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Registers a completion handle for the next reply on the wire. Must
    /// be called (via [`Socket::write_line`]'s `before_write` hook) while
    /// still holding the write lock the command was sent under, so the
    /// queue order matches the wire's send order.
    pub fn push(&self, tx: ReplySender) {
        self.queue.lock().unwrap().push_back(tx);
    }

    fn pop(&self) -> Option<ReplySender> {
        self.queue.lock().unwrap().pop_front()
    }

    /// Fails every outstanding request, used when the socket dies.
    fn fail_all(&self, error_factory: impl Fn() -> ControllerError) {
        let mut queue = self.queue.lock().unwrap();
        while let Some(tx) = queue.pop_front() {
            let _ = tx.send(Err(error_factory()));
        }
    }
}

/// Runs until the socket closes. Hands data-carrying 6xx replies to
/// `events`, everything else to the oldest waiting request in `requests`.
/// On exit, fails every still-pending request with `SocketClosed` and
/// invokes `on_disconnect`.
pub async fn run(
    mut reader: SocketReader,
    socket: Arc<Socket>,
    requests: PendingRequests,
    events: DispatchQueue,
    on_disconnect: impl FnOnce() + Send + 'static,
) {
    let mut assembler = Assembler::new();

    loop {
        let line = match reader.read_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(%err, "control socket read failed");
                break;
            }
        };

        match assembler.feed(&line) {
            Ok(Some(msg)) => handle_message(msg, &requests, &events).await,
            Ok(None) => {}
            Err(err) => {
                // Parser-level errors abort only the reply in flight; the
                // connection stays up (spec.md §7).
                tracing::warn!(%err, "malformed reply, resuming on a fresh assembler");
                assembler = Assembler::new();
                if let Some(tx) = requests.pop() {
                    let _ = tx.send(Err(ControllerError::Protocol(err.into())));
                }
            }
        }
    }

    socket.alive_flag().store(false, Ordering::SeqCst);
    requests.fail_all(|| ControllerError::Socket(SocketError::SocketClosed));
    on_disconnect();
}

async fn handle_message(msg: ReplyMessage, requests: &PendingRequests, events: &DispatchQueue) {
    if msg.is_event() {
        match torctl_proto::event::parse(&msg) {
            Ok(event) => events.push(event).await,
            Err(err) => tracing::warn!(%err, "dropping unparseable event"),
        }
        return;
    }

    match requests.pop() {
        Some(tx) => {
            if tx.send(Ok(msg)).is_err() {
                tracing::warn!("reply arrived after its request timed out; discarding");
            }
        }
        None => tracing::warn!(code = msg.code(), "unsolicited reply with no pending request"),
    }
}
