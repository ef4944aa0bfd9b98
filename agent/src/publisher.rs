//! Publisher embedded in the traced process
//!
//! Stamps each notification on the caller's thread, encodes it and hands the
//! frame to a [`FrameQueue`]; a writer thread moves it to the publish endpoint.
//! Sends are fire-and-forget: a failure after the rendezvous is logged once,
//! remembered, and reported by [`Publisher::end_trace`] or
//! [`Publisher::shutdown`] instead of interrupting the traced program.

use crate::clock::Stamper;
use crate::config::Config;
use crate::endpoint::{frame_codec, FrameQueue, ObserverIdentity};
use crate::error::{Result, Side, TraceError};
use crate::handshake::{Handshake, RendezvousPort, Signal};
use bytes::{Bytes, BytesMut};
use calltap_shared::{Call, Message, Return};
use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::codec::{Encoder, LengthDelimitedCodec};
use tracing::{debug, error, info, warn};

/// Counters reported when the publisher shuts down
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherStats {
    /// Trace events queued for the observer after the rendezvous
    pub events_sent: u64,
    /// Messages discarded because no subscriber was connected yet
    pub dropped_before_connect: u64,
    /// Notifications discarded because no trace window was open
    pub dropped_outside_window: u64,
    /// Returns discarded because no call of the window was open
    pub unmatched_returns: u64,
    /// Returns synthesized by `end_trace` for calls still open at that point
    pub closed_at_stop: u64,
    /// Calls discarded, with their returns, because the frame exceeded
    /// `max_frame_bytes`
    pub oversized_calls: u64,
    /// Sync probes published during the rendezvous
    pub sync_probes: u64,
}

/// What happened to one message handed to the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Queued,
    TooLarge,
    Dropped,
}

pub struct Publisher {
    identity: ObserverIdentity,
    endpoint: PathBuf,
    listener: UnixListener,
    queue: Option<FrameQueue>,
    codec: LengthDelimitedCodec,
    max_frame_bytes: usize,
    drain_timeout: Duration,
    frame: BytesMut,
    stamper: Stamper,
    handshake: Handshake,
    sync_interval: Duration,
    send_buffer_bytes: usize,
    send_error: Option<io::Error>,
    closed: bool,
    window: Option<u64>,
    windows_opened: u64,
    /// One entry per open call, innermost last; `false` if it was never sent
    open_calls: Vec<bool>,
    stats: PublisherStats,
}

impl Publisher {
    /// Bind the publish endpoint for `identity`.
    pub fn init(identity: ObserverIdentity, config: &Config) -> Result<Self> {
        let endpoint = identity.endpoint();
        let connection_error = |source: io::Error| TraceError::Connection {
            endpoint: endpoint.display().to_string(),
            source,
        };

        match std::fs::remove_file(&endpoint) {
            Ok(()) => debug!("Removed stale endpoint {}", endpoint.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(connection_error(e)),
        }

        let listener = UnixListener::bind(&endpoint).map_err(connection_error)?;
        listener.set_nonblocking(true).map_err(connection_error)?;

        let mut handshake = Handshake::new(Side::Publisher, config.startup_timeout);
        handshake.mark_ready()?;

        info!(
            "Publisher bound to {} for observer {}",
            endpoint.display(),
            identity.pid
        );

        Ok(Self {
            identity,
            endpoint,
            listener,
            queue: None,
            codec: frame_codec(config.max_frame_bytes),
            max_frame_bytes: config.max_frame_bytes,
            drain_timeout: config.join_timeout,
            frame: BytesMut::with_capacity(256),
            stamper: Stamper::new(),
            handshake,
            sync_interval: config.sync_interval,
            send_buffer_bytes: config.send_buffer_bytes,
            send_error: None,
            closed: false,
            window: None,
            windows_opened: 0,
            open_calls: Vec::new(),
            stats: PublisherStats::default(),
        })
    }

    pub fn identity(&self) -> ObserverIdentity {
        self.identity
    }

    pub fn is_connected(&self) -> bool {
        self.handshake.is_connected()
    }

    pub fn stats(&self) -> PublisherStats {
        self.stats
    }

    /// Id of the open trace window, if any
    pub fn window(&self) -> Option<u64> {
        self.window
    }

    /// Block until the observer confirms it is receiving.
    ///
    /// Sync probes are published every `sync_interval`; the observer answers the
    /// first one it sees with `Ready` on the rendezvous channel and we confirm
    /// with `Ack`. Returns `StartupTimeout` if that does not happen in time, and
    /// `PeerGone` as soon as the observer closes its end of the rendezvous.
    pub fn wait_for_subscriber(&mut self, rendezvous: &mut RendezvousPort) -> Result<()> {
        loop {
            self.handshake.check_deadline()?;

            if self.queue.is_none() {
                self.try_accept()?;
            }

            if self.queue.is_some() {
                self.send_sync()?;
            }

            match rendezvous.poll_signal()? {
                Some(Signal::Ready) => {
                    rendezvous.send(Signal::Ack)?;
                    self.handshake.mark_connected()?;
                    info!(
                        "Observer {} connected after {} sync probe(s)",
                        self.identity.pid, self.stats.sync_probes
                    );
                    return Ok(());
                }
                Some(other) => {
                    return Err(TraceError::Handshake(format!(
                        "publisher received unexpected {:?} signal",
                        other
                    )))
                }
                None => std::thread::sleep(self.sync_interval),
            }
        }
    }

    fn try_accept(&mut self) -> Result<()> {
        match self.listener.accept() {
            Ok((stream, _)) => {
                debug!("Subscriber connected to {}", self.endpoint.display());
                self.attach(stream)?;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(()),
            Err(source) => Err(TraceError::Connection {
                endpoint: self.endpoint.display().to_string(),
                source,
            }),
        }
    }

    fn attach(&mut self, stream: UnixStream) -> io::Result<()> {
        self.queue = Some(FrameQueue::spawn(stream, self.send_buffer_bytes)?);
        Ok(())
    }

    fn send_sync(&mut self) -> Result<()> {
        let frame = self
            .encode(&Message::sync())
            .and_then(|frame| frame.ok_or_else(|| io::Error::from(io::ErrorKind::InvalidInput)))
            .map_err(TraceError::Publish)?;
        self.push(frame).map_err(TraceError::Publish)?;
        self.stats.sync_probes += 1;
        Ok(())
    }

    /// Publish a call. Fire-and-forget.
    pub fn on_call(
        &mut self,
        class_name: &str,
        method_name: &str,
        source_file: Option<&str>,
        source_line: Option<u32>,
    ) {
        if self.is_connected() && self.window.is_none() {
            self.stats.dropped_outside_window += 1;
            return;
        }
        let stamp = self.stamper.stamp();
        let call = Call::new(
            class_name,
            method_name,
            source_file.map(str::to_owned),
            source_line,
            stamp,
        );
        match self.publish_event(&Message::Call(call)) {
            Delivery::Queued => self.open_calls.push(true),
            Delivery::TooLarge => {
                warn!(
                    "Dropping call {}#{}: frame exceeds {} bytes",
                    class_name, method_name, self.max_frame_bytes
                );
                self.stats.oversized_calls += 1;
                self.open_calls.push(false);
            }
            Delivery::Dropped => {}
        }
    }

    /// Publish a return for the most recent unmatched call. Fire-and-forget.
    pub fn on_return(&mut self) {
        if self.is_connected() {
            if self.window.is_none() {
                self.stats.dropped_outside_window += 1;
                return;
            }
            match self.open_calls.last() {
                None => {
                    debug!("Discarding return without an open call");
                    self.stats.unmatched_returns += 1;
                    return;
                }
                Some(false) => {
                    // Its call never went out.
                    self.open_calls.pop();
                    return;
                }
                Some(true) => {}
            }
        }
        let stamp = self.stamper.stamp();
        if self.publish_event(&Message::Return(Return::new(stamp))) == Delivery::Queued {
            self.open_calls.pop();
        }
    }

    /// Publish a return only if `window` is still the open trace window.
    pub fn on_return_in(&mut self, window: Option<u64>) {
        if self.window == window {
            self.on_return();
        } else {
            self.stats.dropped_outside_window += 1;
        }
    }

    /// Open a trace window; the observer's sink starts writing to `output_target`.
    pub fn begin_trace(&mut self, output_target: &str) -> Result<()> {
        self.require_connected("begin a trace")?;
        if self.window.is_some() {
            return Err(TraceError::Session(
                "a trace window is already open".to_string(),
            ));
        }
        let start = Message::Start {
            output_target: output_target.to_string(),
        };
        if self.publish_event(&start) == Delivery::TooLarge {
            return Err(TraceError::Config(format!(
                "output target {:?} does not fit in a {} byte frame",
                output_target, self.max_frame_bytes
            )));
        }
        self.window = Some(self.windows_opened);
        self.windows_opened += 1;
        self.open_calls.clear();
        self.check_send_error()
    }

    /// Close the current trace window.
    ///
    /// Calls still open are closed with a return stamped now, so every window
    /// is well nested. Does not wait for the observer to catch up.
    pub fn end_trace(&mut self) -> Result<()> {
        self.require_connected("end a trace")?;
        if self.window.is_none() {
            return Err(TraceError::Session("no trace window is open".to_string()));
        }
        if !self.open_calls.is_empty() {
            let dangling = self.open_calls.iter().filter(|sent| **sent).count() as u64;
            debug!("Closing {} call(s) still open at stop", dangling);
            self.stats.closed_at_stop += dangling;
            while !self.open_calls.is_empty() && self.send_error.is_none() {
                self.on_return();
            }
        }
        self.window = None;
        self.open_calls.clear();
        self.publish_event(&Message::Stop);
        self.check_send_error()
    }

    /// Emit the end-of-session signal and release the channel.
    ///
    /// Later notifications are ignored. Returns the first send failure, if any
    /// occurred during the session.
    pub fn shutdown(&mut self) -> Result<PublisherStats> {
        if self.closed {
            return Ok(self.stats);
        }
        if self.is_connected() {
            self.publish_event(&Message::Shutdown);
        }
        if let Some(queue) = self.queue.take() {
            if let Err(e) = queue.close(self.drain_timeout) {
                if self.send_error.is_none() {
                    self.record_failure(e);
                }
            }
        }
        self.closed = true;
        self.remove_endpoint();

        info!(
            "Publisher shut down: {} events sent, {} dropped before connect",
            self.stats.events_sent, self.stats.dropped_before_connect
        );

        match self.send_error.take() {
            Some(e) => Err(TraceError::Publish(e)),
            None => Ok(self.stats),
        }
    }

    fn require_connected(&self, action: &str) -> Result<()> {
        if self.closed {
            return Err(TraceError::Session(format!(
                "cannot {} after the publisher shut down",
                action
            )));
        }
        if !self.is_connected() {
            return Err(TraceError::Session(format!(
                "cannot {} before the observer connected",
                action
            )));
        }
        Ok(())
    }

    fn publish_event(&mut self, message: &Message) -> Delivery {
        if self.closed || self.send_error.is_some() {
            return Delivery::Dropped;
        }
        if !self.is_connected() || self.queue.is_none() {
            // Pub semantics: nothing is delivered without a connected subscriber.
            self.stats.dropped_before_connect += 1;
            return Delivery::Dropped;
        }
        let frame = match self.encode(message) {
            Ok(Some(frame)) => frame,
            Ok(None) => return Delivery::TooLarge,
            Err(e) => {
                self.record_failure(e);
                return Delivery::Dropped;
            }
        };
        match self.push(frame) {
            Ok(()) => {
                if matches!(message, Message::Call(_) | Message::Return(_)) {
                    self.stats.events_sent += 1;
                }
                Delivery::Queued
            }
            Err(e) => {
                self.record_failure(e);
                Delivery::Dropped
            }
        }
    }

    /// Frame `message`, or `None` if it exceeds the frame limit.
    fn encode(&mut self, message: &Message) -> io::Result<Option<Bytes>> {
        let payload = message
            .to_bytes()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if payload.len() > self.max_frame_bytes {
            return Ok(None);
        }
        self.codec.encode(Bytes::from(payload), &mut self.frame)?;
        Ok(Some(self.frame.split().freeze()))
    }

    fn push(&self, frame: Bytes) -> io::Result<()> {
        self.queue
            .as_ref()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?
            .push(frame)
    }

    fn record_failure(&mut self, e: io::Error) {
        error!(
            "Publishing to observer {} failed, tracing disabled for this session: {}",
            self.identity.pid, e
        );
        self.send_error = Some(e);
    }

    fn check_send_error(&mut self) -> Result<()> {
        if self.send_error.is_none() {
            if let Some(e) = self.queue.as_ref().and_then(FrameQueue::failure) {
                self.record_failure(e);
            }
        }
        match &self.send_error {
            Some(e) => Err(TraceError::Publish(io::Error::new(e.kind(), e.to_string()))),
            None => Ok(()),
        }
    }

    fn remove_endpoint(&self) {
        if let Err(e) = std::fs::remove_file(&self.endpoint) {
            if e.kind() != io::ErrorKind::NotFound {
                debug!("Failed to remove endpoint {}: {}", self.endpoint.display(), e);
            }
        }
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        if !self.closed {
            self.remove_endpoint();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calltap_shared::MessageKind;
    use nix::unistd::Pid;
    use std::io::Read;
    use std::sync::mpsc;

    fn test_config() -> Config {
        Config {
            startup_timeout: Duration::from_millis(300),
            join_timeout: Duration::from_secs(1),
            sync_interval: Duration::from_millis(2),
            max_frame_bytes: 4096,
            send_buffer_bytes: 0,
        }
    }

    // Fake PIDs above the kernel's pid_max keep endpoints from colliding with
    // real observers.
    fn fake_identity(n: i32) -> ObserverIdentity {
        ObserverIdentity::new(Pid::from_raw(0x4000_0000 + n))
    }

    fn read_frame(stream: &mut UnixStream) -> Option<Message> {
        let mut len = [0u8; 4];
        stream.read_exact(&mut len).ok()?;
        let mut body = vec![0u8; u32::from_be_bytes(len) as usize];
        stream.read_exact(&mut body).unwrap();
        Some(Message::from_bytes(&body).unwrap())
    }

    #[test]
    fn test_init_binds_and_shutdown_removes_endpoint() {
        let identity = fake_identity(1);
        let mut publisher = Publisher::init(identity, &test_config()).unwrap();
        assert!(identity.endpoint().exists());
        assert!(!publisher.is_connected());

        publisher.shutdown().unwrap();
        assert!(!identity.endpoint().exists());
    }

    #[test]
    fn test_events_before_connect_are_dropped() {
        let mut publisher = Publisher::init(fake_identity(2), &test_config()).unwrap();
        publisher.on_call("String", "strip", None, None);
        publisher.on_return();

        let stats = publisher.stats();
        assert_eq!(stats.dropped_before_connect, 2);
        assert_eq!(stats.events_sent, 0);
        assert!(matches!(
            publisher.begin_trace("out.txt"),
            Err(TraceError::Session(_))
        ));
    }

    #[test]
    fn test_wait_times_out_without_observer() {
        let mut publisher = Publisher::init(fake_identity(3), &test_config()).unwrap();
        let (ours, _theirs) = UnixStream::pair().unwrap();
        let mut port = RendezvousPort::new(ours).unwrap();

        match publisher.wait_for_subscriber(&mut port) {
            Err(TraceError::StartupTimeout { side, .. }) => assert_eq!(side, Side::Publisher),
            other => panic!("expected StartupTimeout, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_wait_fails_fast_when_observer_gone() {
        let mut publisher = Publisher::init(fake_identity(4), &test_config()).unwrap();
        let (ours, theirs) = UnixStream::pair().unwrap();
        drop(theirs);
        let mut port = RendezvousPort::new(ours).unwrap();

        assert!(matches!(
            publisher.wait_for_subscriber(&mut port),
            Err(TraceError::PeerGone(Side::Publisher))
        ));
    }

    /// Completes the observer half of the rendezvous and returns the data
    /// stream positioned after the first sync probe.
    fn accept_rendezvous(identity: ObserverIdentity, mut rendezvous: UnixStream) -> UnixStream {
        let mut data = UnixStream::connect(identity.endpoint()).unwrap();
        assert_eq!(read_frame(&mut data), Some(Message::sync()));
        std::io::Write::write_all(&mut rendezvous, &[Signal::Ready as u8]).unwrap();
        let mut ack = [0u8; 1];
        rendezvous.read_exact(&mut ack).unwrap();
        assert_eq!(ack[0], Signal::Ack as u8);
        data
    }

    /// Plays the observer side in a thread, forwarding everything after the
    /// rendezvous as it arrives, up to `Shutdown` or EOF.
    fn live_observer(identity: ObserverIdentity, rendezvous: UnixStream) -> mpsc::Receiver<Message> {
        let (feed, seen) = mpsc::channel();
        std::thread::spawn(move || {
            let mut data = accept_rendezvous(identity, rendezvous);
            loop {
                match read_frame(&mut data) {
                    Some(Message::Sync { .. }) => continue,
                    Some(Message::Shutdown) | None => break,
                    Some(other) => {
                        if feed.send(other).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        seen
    }

    /// Like [`live_observer`], collecting everything once the stream ends.
    fn fake_observer(
        identity: ObserverIdentity,
        rendezvous: UnixStream,
    ) -> std::thread::JoinHandle<Vec<Message>> {
        let seen = live_observer(identity, rendezvous);
        std::thread::spawn(move || seen.iter().collect())
    }

    fn connected_publisher(n: i32) -> (Publisher, std::thread::JoinHandle<Vec<Message>>) {
        connected_publisher_with(n, test_config())
    }

    fn connected_publisher_with(
        n: i32,
        config: Config,
    ) -> (Publisher, std::thread::JoinHandle<Vec<Message>>) {
        let identity = fake_identity(n);
        let mut publisher = Publisher::init(identity, &config).unwrap();
        let (ours, theirs) = UnixStream::pair().unwrap();
        let mut port = RendezvousPort::new(ours).unwrap();
        let observer = fake_observer(identity, theirs);

        publisher.wait_for_subscriber(&mut port).unwrap();
        assert!(publisher.is_connected());
        (publisher, observer)
    }

    #[test]
    fn test_rendezvous_then_events_in_order() {
        let (mut publisher, observer) = connected_publisher(5);

        publisher.begin_trace("trace.txt").unwrap();
        publisher.on_call("String", "strip", Some("demo.rs"), Some(10));
        publisher.on_return();
        publisher.end_trace().unwrap();
        let stats = publisher.shutdown().unwrap();
        assert_eq!(stats.events_sent, 2);
        assert!(stats.sync_probes >= 1);

        let seen = observer.join().unwrap();
        assert_eq!(seen.len(), 4);
        assert_eq!(
            seen[0],
            Message::Start {
                output_target: "trace.txt".to_string()
            }
        );
        match (&seen[1], &seen[2]) {
            (Message::Call(c), Message::Return(r)) => {
                assert_eq!(c.class_name, "String");
                assert_eq!(c.method_name, "strip");
                assert_eq!(c.source_file.as_deref(), Some("demo.rs"));
                assert_eq!(c.source_line, Some(10));
                assert!(r.timestamps().not_before(&c.timestamps()));
            }
            other => panic!("expected call then return, got {:?}", other),
        }
        assert_eq!(seen[3], Message::Stop);
    }

    #[test]
    fn test_window_boundaries_keep_nesting_balanced() {
        let (mut publisher, observer) = connected_publisher(6);

        publisher.on_call("String", "early", None, None);
        publisher.begin_trace("a.txt").unwrap();
        let first = publisher.window();
        publisher.on_return();
        publisher.on_call("String", "strip", None, None);
        publisher.on_call("String", "chars", None, None);
        publisher.end_trace().unwrap();

        publisher.begin_trace("b.txt").unwrap();
        assert_ne!(publisher.window(), first);
        publisher.on_return_in(first);
        publisher.end_trace().unwrap();

        let stats = publisher.shutdown().unwrap();
        assert_eq!(stats.dropped_outside_window, 2);
        assert_eq!(stats.unmatched_returns, 1);
        assert_eq!(stats.closed_at_stop, 2);
        assert_eq!(stats.events_sent, 4);

        let kinds: Vec<MessageKind> = observer.join().unwrap().iter().map(Message::kind).collect();
        assert_eq!(
            kinds,
            vec![
                MessageKind::Start,
                MessageKind::Call,
                MessageKind::Call,
                MessageKind::Return,
                MessageKind::Return,
                MessageKind::Stop,
                MessageKind::Start,
                MessageKind::Stop,
            ]
        );
    }

    #[test]
    fn test_send_failure_reported_before_shutdown() {
        let (mut publisher, observer) = connected_publisher(7);
        publisher.begin_trace("d.txt").unwrap();

        // Swap in a channel whose reader is already gone.
        let (a, b) = UnixStream::pair().unwrap();
        drop(b);
        publisher.attach(a).unwrap();
        publisher.on_call("String", "strip", None, None);

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while publisher.check_send_error().is_ok() {
            assert!(std::time::Instant::now() < deadline, "send failure never surfaced");
            std::thread::sleep(Duration::from_millis(1));
        }
        let sent = publisher.stats().events_sent;
        publisher.on_call("String", "never", None, None);
        assert_eq!(publisher.stats().events_sent, sent);
        assert!(matches!(publisher.end_trace(), Err(TraceError::Publish(_))));
        assert!(matches!(publisher.shutdown(), Err(TraceError::Publish(_))));

        let seen = observer.join().unwrap();
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn test_events_reach_observer_before_stop() {
        let identity = fake_identity(8);
        let config = Config {
            send_buffer_bytes: 64 * 1024,
            ..test_config()
        };
        let mut publisher = Publisher::init(identity, &config).unwrap();
        let (ours, theirs) = UnixStream::pair().unwrap();
        let mut port = RendezvousPort::new(ours).unwrap();
        let feed = live_observer(identity, theirs);
        publisher.wait_for_subscriber(&mut port).unwrap();

        publisher.begin_trace("live.txt").unwrap();
        publisher.on_call("String", "strip", None, None);

        let timeout = Duration::from_secs(5);
        assert!(matches!(feed.recv_timeout(timeout), Ok(Message::Start { .. })));
        match feed.recv_timeout(timeout) {
            Ok(Message::Call(call)) => assert_eq!(call.method_name, "strip"),
            other => panic!("expected the call while the window is open, got {:?}", other),
        }

        publisher.on_return();
        publisher.end_trace().unwrap();
        publisher.shutdown().unwrap();
        assert!(matches!(feed.recv_timeout(timeout), Ok(Message::Return(_))));
        assert_eq!(feed.recv_timeout(timeout), Ok(Message::Stop));
    }

    #[test]
    fn test_oversized_messages_dropped_individually() {
        let config = Config {
            max_frame_bytes: 256,
            ..test_config()
        };
        let (mut publisher, observer) = connected_publisher_with(9, config);
        let huge = "x".repeat(1000);

        assert!(matches!(
            publisher.begin_trace(&huge),
            Err(TraceError::Config(_))
        ));
        assert_eq!(publisher.window(), None);

        publisher.begin_trace("ok.txt").unwrap();
        publisher.on_call("Outer", "run", Some("src/outer.rs"), Some(3));
        publisher.on_call("Huge", &huge, None, None);
        publisher.on_return();
        publisher.on_return();
        publisher.on_call("Huge", &huge, None, None);
        publisher.end_trace().unwrap();

        let stats = publisher.shutdown().unwrap();
        assert_eq!(stats.oversized_calls, 2);
        assert_eq!(stats.events_sent, 2);
        assert_eq!(stats.closed_at_stop, 0);
        assert_eq!(stats.unmatched_returns, 0);

        let kinds: Vec<MessageKind> = observer.join().unwrap().iter().map(Message::kind).collect();
        assert_eq!(
            kinds,
            vec![
                MessageKind::Start,
                MessageKind::Call,
                MessageKind::Return,
                MessageKind::Stop,
            ]
        );
    }
}
