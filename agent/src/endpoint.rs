//! Channel endpoint addressing and framing
//!
//! The publish endpoint is a Unix stream socket whose path is derived from the
//! observer's PID, so a session needs no user-facing address configuration.
//! Every message travels as one length-delimited frame.

use bytes::Bytes;
use nix::sys::socket::{send, MsgFlags};
use nix::unistd::Pid;
use std::io::{self, BufWriter, Write};
use std::net::Shutdown;
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::codec::LengthDelimitedCodec;
use tracing::{debug, warn};

/// Identity of the observer process a session is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverIdentity {
    pub pid: Pid,
}

impl ObserverIdentity {
    pub fn new(pid: Pid) -> Self {
        Self { pid }
    }

    /// Publish endpoint for this observer
    pub fn endpoint(&self) -> PathBuf {
        std::env::temp_dir().join(format!("calltap-{}.sock", self.pid))
    }
}

/// Frame codec shared by publisher and subscriber
pub fn frame_codec(max_frame_bytes: usize) -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .max_frame_length(max_frame_bytes)
        .new_codec()
}

/// Write to a socket without raising SIGPIPE if the peer has gone away;
/// the failure comes back as `BrokenPipe` instead.
pub fn send_nosignal(stream: &UnixStream, buf: &[u8]) -> io::Result<usize> {
    send(stream.as_raw_fd(), buf, MsgFlags::MSG_NOSIGNAL).map_err(io::Error::from)
}

/// Blocking writer over the publish socket, driven by [`FrameQueue`]
#[derive(Debug)]
pub struct ChannelWriter {
    stream: UnixStream,
}

impl ChannelWriter {
    pub fn new(stream: UnixStream) -> io::Result<Self> {
        stream.set_nonblocking(false)?;
        Ok(Self { stream })
    }
}

impl io::Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        loop {
            match send_nosignal(&self.stream, buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Frames queued by the traced thread and written out by a dedicated writer
/// thread.
///
/// `push` never touches the socket, so a reader that falls behind delays the
/// writer thread only. The writer flushes after every batch it drains, which
/// keeps at most one batch buffered in this process.
pub struct FrameQueue {
    sender: Option<UnboundedSender<Bytes>>,
    writer: Option<JoinHandle<()>>,
    control: UnixStream,
    failure: Arc<Mutex<Option<io::Error>>>,
}

impl FrameQueue {
    pub fn spawn(stream: UnixStream, buffer_bytes: usize) -> io::Result<Self> {
        let control = stream.try_clone()?;
        let channel = ChannelWriter::new(stream)?;
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let failure = Arc::new(Mutex::new(None));

        let slot = Arc::clone(&failure);
        let writer = std::thread::Builder::new()
            .name("calltap-publish".to_string())
            .spawn(move || {
                let out = BufWriter::with_capacity(buffer_bytes, channel);
                if let Err(e) = drain(&mut receiver, out) {
                    debug!("Publish writer stopped: {}", e);
                    *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(e);
                }
            })?;

        Ok(Self {
            sender: Some(sender),
            writer: Some(writer),
            control,
            failure,
        })
    }

    /// Queue one encoded frame. Fails only after the writer thread stopped.
    pub fn push(&self, frame: Bytes) -> io::Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;
        sender.send(frame).map_err(|_| {
            self.failure()
                .unwrap_or_else(|| io::Error::from(io::ErrorKind::BrokenPipe))
        })
    }

    /// First write error hit by the writer thread
    pub fn failure(&self) -> Option<io::Error> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|e| io::Error::new(e.kind(), e.to_string()))
    }

    /// Stop accepting frames and wait up to `timeout` for the queue to drain.
    ///
    /// On timeout the socket is shut down so the writer thread exits.
    pub fn close(mut self, timeout: Duration) -> io::Result<()> {
        self.sender = None;
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };

        let deadline = Instant::now() + timeout;
        while !writer.is_finished() {
            if Instant::now() >= deadline {
                warn!("Publish queue did not drain within {:?}, dropping the rest", timeout);
                let _ = self.control.shutdown(Shutdown::Both);
                let _ = writer.join();
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("publish queue did not drain within {:?}", timeout),
                ));
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        if writer.join().is_err() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "publish writer thread panicked",
            ));
        }
        match self.failure.lock().unwrap_or_else(PoisonError::into_inner).take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn drain(
    receiver: &mut UnboundedReceiver<Bytes>,
    mut out: BufWriter<ChannelWriter>,
) -> io::Result<()> {
    while let Some(frame) = receiver.blocking_recv() {
        out.write_all(&frame)?;
        while let Ok(frame) = receiver.try_recv() {
            out.write_all(&frame)?;
        }
        out.flush()?;
    }
    out.flush()
}
