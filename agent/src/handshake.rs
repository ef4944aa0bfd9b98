//! Two-phase startup rendezvous between publisher and observer.
//!
//! Each side runs its own state machine:
//!
//! ```text
//! NotReady --[local init ok]--> Ready --[peer readiness observed]--> Connected
//! ```
//!
//! The publisher keeps publishing sync probes on the data channel. The observer
//! answers the first probe it receives with a `Ready` signal on the rendezvous
//! channel (a socketpair created before the fork); the publisher confirms with
//! `Ack`. Once the probe has arrived, the data channel is known to deliver,
//! so nothing published after `Ack` can be lost to a slow join.

use crate::endpoint::send_nosignal;
use crate::error::{Result, Side, TraceError};
use std::io::{self, Read};
use std::os::unix::net::UnixStream;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    NotReady,
    Ready,
    Connected,
}

/// Single-byte signals carried by the rendezvous channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Observer has received a sync probe and is receiving
    Ready = 0x01,
    /// Publisher saw `Ready`; events may flow
    Ack = 0x02,
}

impl Signal {
    fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x01 => Ok(Signal::Ready),
            0x02 => Ok(Signal::Ack),
            other => Err(TraceError::Handshake(format!(
                "unknown rendezvous signal {:#04x}",
                other
            ))),
        }
    }
}

/// Per-side handshake state with its deadline
#[derive(Debug)]
pub struct Handshake {
    side: Side,
    state: HandshakeState,
    started: Instant,
    timeout: Duration,
}

impl Handshake {
    pub fn new(side: Side, timeout: Duration) -> Self {
        Self {
            side,
            state: HandshakeState::NotReady,
            started: Instant::now(),
            timeout,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == HandshakeState::Connected
    }

    /// Local init complete
    pub fn mark_ready(&mut self) -> Result<()> {
        self.transition(HandshakeState::NotReady, HandshakeState::Ready)
    }

    /// Peer readiness observed
    pub fn mark_connected(&mut self) -> Result<()> {
        self.transition(HandshakeState::Ready, HandshakeState::Connected)?;
        debug!(
            side = %self.side,
            elapsed_us = self.started.elapsed().as_micros() as u64,
            "rendezvous complete"
        );
        Ok(())
    }

    fn transition(&mut self, from: HandshakeState, to: HandshakeState) -> Result<()> {
        if self.state != from {
            return Err(TraceError::Handshake(format!(
                "{} cannot move from {:?} to {:?}",
                self.side, self.state, to
            )));
        }
        debug!(side = %self.side, "handshake {:?} -> {:?}", from, to);
        self.state = to;
        Ok(())
    }

    /// Time left before the deadline, or `StartupTimeout` once it has passed
    pub fn check_deadline(&self) -> Result<Duration> {
        self.timeout
            .checked_sub(self.started.elapsed())
            .filter(|left| !left.is_zero())
            .ok_or_else(|| self.timeout_error())
    }

    pub fn timeout_error(&self) -> TraceError {
        TraceError::StartupTimeout {
            side: self.side,
            waited: self.timeout,
        }
    }
}

/// Publisher end of the rendezvous channel (blocking socket, polled)
#[derive(Debug)]
pub struct RendezvousPort {
    stream: UnixStream,
}

impl RendezvousPort {
    pub fn new(stream: UnixStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        Ok(Self { stream })
    }

    /// Non-blocking check for a signal from the observer
    pub fn poll_signal(&mut self) -> Result<Option<Signal>> {
        let mut byte = [0u8; 1];
        match self.stream.read(&mut byte) {
            Ok(0) => Err(TraceError::PeerGone(Side::Publisher)),
            Ok(_) => Signal::from_byte(byte[0]).map(Some),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn send(&mut self, signal: Signal) -> Result<()> {
        loop {
            match send_nosignal(&self.stream, &[signal as u8]) {
                Ok(1) => return Ok(()),
                Ok(_) => return Err(TraceError::PeerGone(Side::Publisher)),
                // A one-byte write on an idle socketpair only blocks if the
                // buffer is full, which a well-behaved observer never causes.
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::Interrupted =>
                {
                    std::thread::yield_now()
                }
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    return Err(TraceError::PeerGone(Side::Publisher))
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Observer end of the rendezvous channel
#[derive(Debug)]
pub struct AsyncRendezvousPort {
    stream: tokio::net::UnixStream,
}

impl AsyncRendezvousPort {
    /// Must be called from within a tokio runtime
    pub fn new(stream: UnixStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        Ok(Self {
            stream: tokio::net::UnixStream::from_std(stream)?,
        })
    }

    pub async fn send(&mut self, signal: Signal) -> Result<()> {
        match self.stream.write_all(&[signal as u8]).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                Err(TraceError::PeerGone(Side::Subscriber))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn recv(&mut self) -> Result<Signal> {
        let mut byte = [0u8; 1];
        match self.stream.read(&mut byte).await? {
            0 => Err(TraceError::PeerGone(Side::Subscriber)),
            _ => Signal::from_byte(byte[0]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_state_machine_order() {
        let mut hs = Handshake::new(Side::Publisher, Duration::from_secs(1));
        assert_eq!(hs.state(), HandshakeState::NotReady);
        assert!(matches!(
            hs.mark_connected(),
            Err(TraceError::Handshake(_))
        ));

        hs.mark_ready().unwrap();
        assert_eq!(hs.state(), HandshakeState::Ready);
        assert!(hs.mark_ready().is_err());

        hs.mark_connected().unwrap();
        assert!(hs.is_connected());
    }

    #[test]
    fn test_deadline_expires() {
        let hs = Handshake::new(Side::Subscriber, Duration::from_millis(10));
        assert!(hs.check_deadline().is_ok());
        std::thread::sleep(Duration::from_millis(20));
        match hs.check_deadline() {
            Err(TraceError::StartupTimeout { side, waited }) => {
                assert_eq!(side, Side::Subscriber);
                assert_eq!(waited, Duration::from_millis(10));
            }
            other => panic!("expected StartupTimeout, got {:?}", other),
        }
    }

    #[test]
    fn test_port_signals_and_peer_gone() {
        let (a, mut b) = UnixStream::pair().unwrap();
        let mut port = RendezvousPort::new(a).unwrap();
        assert!(port.poll_signal().unwrap().is_none());

        b.write_all(&[0x01]).unwrap();
        assert_eq!(port.poll_signal().unwrap(), Some(Signal::Ready));

        port.send(Signal::Ack).unwrap();
        let mut byte = [0u8; 1];
        b.read_exact(&mut byte).unwrap();
        assert_eq!(byte[0], Signal::Ack as u8);

        drop(b);
        assert!(matches!(
            port.poll_signal(),
            Err(TraceError::PeerGone(Side::Publisher))
        ));
    }

    #[test]
    fn test_unknown_signal_byte_rejected() {
        let (a, mut b) = UnixStream::pair().unwrap();
        let mut port = RendezvousPort::new(a).unwrap();
        b.write_all(&[0x7f]).unwrap();
        assert!(matches!(port.poll_signal(), Err(TraceError::Handshake(_))));
    }

    #[tokio::test]
    async fn test_async_port_exchange() {
        let (a, b) = UnixStream::pair().unwrap();
        let mut publisher_end = RendezvousPort::new(a).unwrap();
        let mut observer_end = AsyncRendezvousPort::new(b).unwrap();

        observer_end.send(Signal::Ready).await.unwrap();
        let mut seen = None;
        for _ in 0..100 {
            seen = publisher_end.poll_signal().unwrap();
            if seen.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(seen, Some(Signal::Ready));

        publisher_end.send(Signal::Ack).unwrap();
        assert_eq!(observer_end.recv().await.unwrap(), Signal::Ack);

        drop(publisher_end);
        assert!(matches!(
            observer_end.recv().await,
            Err(TraceError::PeerGone(Side::Subscriber))
        ));
    }
}
