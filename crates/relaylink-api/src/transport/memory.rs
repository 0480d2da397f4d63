// In-process loopback transport with a scripted remote side.
//
// `MemoryTransport` is what a session talks to; `MemoryPeer` plays the
// radio module: it sees every command line written and answers with
// canned response lines.

use std::collections::{HashMap, VecDeque};
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::{Connector, Transport};
use crate::error::TransportError;

#[derive(Default)]
struct State {
    inbound: VecDeque<u8>,
    pending_write: Vec<u8>,
    written: Vec<String>,
    once: HashMap<String, VecDeque<Vec<String>>>,
    always: HashMap<String, Vec<String>>,
    connected: bool,
    attached: bool,
    connects: usize,
}

impl State {
    fn reply_for(&mut self, line: &str) -> Option<Vec<String>> {
        let verb = line.split_whitespace().next().unwrap_or_default();
        for key in [line, verb] {
            if let Some(queue) = self.once.get_mut(key) {
                if let Some(reply) = queue.pop_front() {
                    return Some(reply);
                }
            }
            if let Some(reply) = self.always.get(key) {
                return Some(reply.clone());
            }
        }
        None
    }

    fn push_lines<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.inbound.extend(line.as_ref().as_bytes());
            self.inbound.extend(b"\r\n");
        }
    }
}

struct Shared {
    state: Mutex<State>,
    notify: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock only happens inside a failing test.
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Loopback [`Transport`] whose remote end is a [`MemoryPeer`].
///
/// Cloning yields another handle to the same link. It also acts as its
/// own [`Connector`], so a session can be pointed at it directly.
#[derive(Clone)]
pub struct MemoryTransport {
    shared: Arc<Shared>,
}

impl MemoryTransport {
    /// Create a connected transport and the peer that scripts it.
    pub fn pair() -> (Self, MemoryPeer) {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                connected: true,
                attached: true,
                ..State::default()
            }),
            notify: Notify::new(),
        });
        (
            Self {
                shared: Arc::clone(&shared),
            },
            MemoryPeer { shared },
        )
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        let mut state = self.shared.lock();
        if !state.connected {
            return Err(TransportError::Disconnected);
        }
        state.pending_write.extend_from_slice(bytes);

        let mut replied = false;
        while let Some(pos) = state.pending_write.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = state.pending_write.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw).trim_end_matches(['\r', '\n']).to_owned();
            if let Some(reply) = state.reply_for(&line) {
                state.push_lines(reply);
                replied = true;
            }
            state.written.push(line);
        }
        drop(state);

        if replied {
            self.shared.notify.notify_waiters();
        }
        Ok(bytes.len())
    }

    async fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        let deadline = Instant::now() + timeout;
        loop {
            let mut notified = pin!(self.shared.notify.notified());
            notified.as_mut().enable();
            {
                let mut state = self.shared.lock();
                if !state.connected {
                    return Err(TransportError::Disconnected);
                }
                if !state.inbound.is_empty() {
                    let n = buf.len().min(state.inbound.len());
                    for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
                        *slot = byte;
                    }
                    return Ok(n);
                }
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(0);
            }
        }
    }

    async fn flush_input(&mut self) -> Result<(), TransportError> {
        let mut state = self.shared.lock();
        if !state.connected {
            return Err(TransportError::Disconnected);
        }
        state.inbound.clear();
        Ok(())
    }
}

#[async_trait]
impl Connector for MemoryTransport {
    async fn connect(&self) -> Result<Box<dyn Transport>, TransportError> {
        let mut state = self.shared.lock();
        if !state.attached {
            return Err(TransportError::busy("memory device detached"));
        }
        state.connected = true;
        state.connects += 1;
        drop(state);
        Ok(Box::new(self.clone()))
    }

    fn describe(&self) -> String {
        "memory".into()
    }
}

/// Scripted remote side of a [`MemoryTransport`].
///
/// Replies are keyed by the full command line first, then by its first
/// word, so `respond_to("select_networks", ..)` answers any selection.
#[derive(Clone)]
pub struct MemoryPeer {
    shared: Arc<Shared>,
}

impl MemoryPeer {
    /// Answer the next matching command with `lines` (once).
    pub fn respond_to<I, S>(&self, command: &str, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let reply = lines.into_iter().map(Into::into).collect();
        self.shared
            .lock()
            .once
            .entry(command.to_owned())
            .or_default()
            .push_back(reply);
    }

    /// Answer every matching command with `lines`. One-shot replies
    /// queued with [`respond_to`](Self::respond_to) take precedence.
    pub fn respond_always<I, S>(&self, command: &str, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let reply = lines.into_iter().map(Into::into).collect();
        self.shared.lock().always.insert(command.to_owned(), reply);
    }

    /// Emit unsolicited lines right now.
    pub fn push_lines<I, S>(&self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.shared.lock().push_lines(lines);
        self.shared.notify.notify_waiters();
    }

    /// Emit raw bytes with no framing added.
    pub fn push_bytes(&self, bytes: &[u8]) {
        self.shared.lock().inbound.extend(bytes);
        self.shared.notify.notify_waiters();
    }

    /// Drop the link. The device stays attached, so a reconnect works.
    pub fn disconnect(&self) {
        {
            let mut state = self.shared.lock();
            state.connected = false;
            state.inbound.clear();
            state.pending_write.clear();
        }
        self.shared.notify.notify_waiters();
    }

    /// Mark the device as present or absent for future connects.
    pub fn set_attached(&self, attached: bool) {
        self.shared.lock().attached = attached;
    }

    /// Every command line received so far, without CRLF.
    pub fn written(&self) -> Vec<String> {
        self.shared.lock().written.clone()
    }

    /// How many received commands start with `verb`.
    pub fn count(&self, verb: &str) -> usize {
        self.shared
            .lock()
            .written
            .iter()
            .filter(|line| line.split_whitespace().next() == Some(verb))
            .count()
    }

    /// Number of successful [`Connector::connect`] calls.
    pub fn connects(&self) -> usize {
        self.shared.lock().connects
    }
}
