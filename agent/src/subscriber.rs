//! Observer-side receive loop
//!
//! Connects to the publisher's endpoint, completes the startup rendezvous and
//! dispatches every message to a [`Sink`] in delivery order.

use crate::config::Config;
use crate::endpoint::{frame_codec, ObserverIdentity};
use crate::error::{Result, Side, TraceError};
use crate::handshake::{AsyncRendezvousPort, Handshake, Signal};
use crate::retry::retry_with_backoff;
use crate::sink::Sink;
use bytes::BytesMut;
use calltap_shared::protocol::wire::PROTOCOL_VERSION;
use calltap_shared::{DecodeError, Message};
use futures_util::StreamExt;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::net::UnixStream;
use tokio_util::codec::{FramedRead, LengthDelimitedCodec};
use tracing::{debug, info};

const CONNECT_INITIAL_DELAY: Duration = Duration::from_millis(1);
const CONNECT_MAX_DELAY: Duration = Duration::from_millis(50);

/// Why the receive loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Publisher sent the end-of-session message
    Shutdown,
    /// Channel closed without one (publisher exited or died)
    Teardown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub calls: u64,
    pub returns: u64,
    pub windows: u64,
    pub termination: Termination,
}

pub struct Subscriber {
    frames: FramedRead<UnixStream, LengthDelimitedCodec>,
    handshake: Handshake,
    endpoint: PathBuf,
}

impl Subscriber {
    /// Connect to the publish endpoint of `identity`, retrying until
    /// `startup_timeout` while the publisher has not bound it yet.
    pub async fn init(identity: ObserverIdentity, config: &Config) -> Result<Self> {
        let endpoint = identity.endpoint();
        let handshake = Handshake::new(Side::Subscriber, config.startup_timeout);
        let deadline = Instant::now() + config.startup_timeout;
        let path = &endpoint;

        let connected = retry_with_backoff(
            "connect to publisher",
            deadline,
            CONNECT_INITIAL_DELAY,
            CONNECT_MAX_DELAY,
            move || UnixStream::connect(path),
        )
        .await;

        let stream = match connected {
            Ok(stream) => stream,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused
                ) =>
            {
                return Err(handshake.timeout_error())
            }
            Err(source) => {
                return Err(TraceError::Connection {
                    endpoint: endpoint.display().to_string(),
                    source,
                })
            }
        };

        debug!("Subscriber connected to {}", endpoint.display());
        Self::with_handshake(stream, handshake, endpoint, config)
    }

    /// Wrap an already connected stream
    pub fn from_stream(stream: UnixStream, config: &Config) -> Result<Self> {
        let handshake = Handshake::new(Side::Subscriber, config.startup_timeout);
        Self::with_handshake(stream, handshake, PathBuf::new(), config)
    }

    fn with_handshake(
        stream: UnixStream,
        mut handshake: Handshake,
        endpoint: PathBuf,
        config: &Config,
    ) -> Result<Self> {
        handshake.mark_ready()?;
        Ok(Self {
            frames: FramedRead::new(stream, frame_codec(config.max_frame_bytes)),
            handshake,
            endpoint,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.handshake.is_connected()
    }

    /// Wait for the first sync probe, then signal `Ready` and wait for `Ack`.
    pub async fn wait_for_publisher(&mut self, rendezvous: &mut AsyncRendezvousPort) -> Result<()> {
        let remaining = self.handshake.check_deadline()?;
        let first = match tokio::time::timeout(remaining, self.frames.next()).await {
            Err(_) => return Err(self.handshake.timeout_error()),
            Ok(None) => return Err(TraceError::PeerGone(Side::Subscriber)),
            Ok(Some(frame)) => frame?,
        };

        match Message::from_bytes(&first)? {
            Message::Sync { version } if version == PROTOCOL_VERSION => {
                debug!("Received sync probe (protocol v{})", version);
            }
            Message::Sync { version } => {
                return Err(TraceError::Connection {
                    endpoint: self.endpoint.display().to_string(),
                    source: io::Error::new(
                        io::ErrorKind::Unsupported,
                        format!(
                            "publisher speaks protocol v{}, expected v{}",
                            version, PROTOCOL_VERSION
                        ),
                    ),
                })
            }
            other => return Err(DecodeError::UnexpectedDuringSync(other.kind()).into()),
        }

        rendezvous.send(Signal::Ready).await?;

        let remaining = self.handshake.check_deadline()?;
        match tokio::time::timeout(remaining, rendezvous.recv()).await {
            Err(_) => return Err(self.handshake.timeout_error()),
            Ok(Ok(Signal::Ack)) => {}
            Ok(Ok(other)) => {
                return Err(TraceError::Handshake(format!(
                    "subscriber received unexpected {:?} signal",
                    other
                )))
            }
            Ok(Err(e)) => return Err(e),
        }

        self.handshake.mark_connected()
    }

    /// Receive loop: dispatch every message to `sink` until `Shutdown` or
    /// channel teardown. Any decode or sink failure ends the loop.
    pub async fn handle_events<S: Sink + ?Sized>(&mut self, sink: &mut S) -> Result<SessionStats> {
        if !self.is_connected() {
            return Err(TraceError::Session(
                "receive loop started before the rendezvous completed".to_string(),
            ));
        }

        let mut calls = 0u64;
        let mut returns = 0u64;
        let mut windows = 0u64;
        let mut window_open = false;

        let termination = loop {
            let frame: BytesMut = match self.frames.next().await {
                Some(frame) => frame?,
                None => {
                    if window_open {
                        debug!("Channel closed inside a trace window, stopping sink");
                        sink.stop()?;
                    }
                    break Termination::Teardown;
                }
            };

            match Message::from_bytes(&frame)? {
                Message::Sync { .. } => continue,
                Message::Start { output_target } => {
                    debug!("Trace window opened: {}", output_target);
                    sink.start(&output_target)?;
                    window_open = true;
                    windows += 1;
                }
                Message::Call(call) => {
                    sink.call(&call)?;
                    calls += 1;
                }
                Message::Return(ret) => {
                    sink.ret(&ret)?;
                    returns += 1;
                }
                Message::Stop => {
                    sink.stop()?;
                    window_open = false;
                    debug!("Trace window closed");
                }
                Message::Shutdown => {
                    if window_open {
                        sink.stop()?;
                    }
                    break Termination::Shutdown;
                }
            }
        };

        info!(
            "Observer received {} calls and {} returns over {} window(s), ended by {:?}",
            calls, returns, windows, termination
        );

        Ok(SessionStats {
            calls,
            returns,
            windows,
            termination,
        })
    }
}

/// Full observer-side session: connect, rendezvous, receive.
pub async fn run<S: Sink + ?Sized>(
    identity: ObserverIdentity,
    config: &Config,
    sink: &mut S,
    rendezvous: &mut AsyncRendezvousPort,
) -> Result<SessionStats> {
    let mut subscriber = Subscriber::init(identity, config).await?;
    subscriber.wait_for_publisher(rendezvous).await?;
    subscriber.handle_events(sink).await
}
