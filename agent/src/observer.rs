//! Observer process management
//!
//! The observer runs in a child process forked before any instrumentation is
//! installed. Parent and child share nothing except the publish socket and a
//! rendezvous socketpair created just before the fork.

use crate::config::Config;
use crate::endpoint::ObserverIdentity;
use crate::error::{ObserverExit, Result, TraceError};
use crate::handshake::{AsyncRendezvousPort, RendezvousPort};
use crate::sink::Sink;
use crate::subscriber::{self, SessionStats};
use nix::sys::signal::{kill, Signal as OsSignal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, getpid, ForkResult, Pid};
use std::os::unix::net::UnixStream;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};

const REAP_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Held from socketpair creation until the parent has closed the child's end,
/// so a concurrent spawn on another thread cannot fork a copy of that end into
/// its own observer and mask EOF on the rendezvous channel.
static SPAWN_LOCK: Mutex<()> = Mutex::new(());

/// Fork a child that runs `body` with its end of a fresh rendezvous channel.
///
/// The child never returns into the caller: it exits with the code `body`
/// returns, or with the generic failure code if `body` panics.
pub fn spawn_observer<F>(body: F) -> Result<ObserverHandle>
where
    F: FnOnce(UnixStream) -> i32,
{
    let guard = SPAWN_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    let (parent_end, child_end) = UnixStream::pair()?;

    // SAFETY: the child only runs `body` and then `_exit`s, so it never
    // returns into code that assumes the parent's other threads exist.
    match unsafe { fork() }? {
        ForkResult::Child => {
            drop(parent_end);
            let code = catch_unwind(AssertUnwindSafe(|| body(child_end)))
                .unwrap_or(ObserverExit::OTHER);
            // SAFETY: `_exit` skips atexit handlers and destructors that
            // belong to the parent's state.
            unsafe { libc::_exit(code) }
        }
        ForkResult::Parent { child } => {
            drop(child_end);
            drop(guard);
            debug!("Spawned observer process {}", child);
            Ok(ObserverHandle {
                pid: child,
                port: RendezvousPort::new(parent_end)?,
                reaped: false,
            })
        }
    }
}

/// Child-side entry point: run the subscriber session and map the outcome to
/// an exit code.
pub fn run_observer<S: Sink + ?Sized>(config: &Config, sink: &mut S, rendezvous: UnixStream) -> i32 {
    let identity = ObserverIdentity::new(getpid());
    let span = info_span!("observer", pid = %identity.pid);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            span.in_scope(|| error!("Failed to build observer runtime: {}", e));
            return ObserverExit::OTHER;
        }
    };

    let session = observe(identity, config, sink, rendezvous);
    match runtime.block_on(session.instrument(span.clone())) {
        Ok(stats) => {
            span.in_scope(|| {
                debug!(
                    "Observer finished: {} calls, {} returns",
                    stats.calls, stats.returns
                )
            });
            ObserverExit::CLEAN
        }
        Err(e) => {
            span.in_scope(|| error!("Observer aborted: {}", e));
            ObserverExit::code_for(&e)
        }
    }
}

async fn observe<S: Sink + ?Sized>(
    identity: ObserverIdentity,
    config: &Config,
    sink: &mut S,
    rendezvous: UnixStream,
) -> Result<SessionStats> {
    let mut port = AsyncRendezvousPort::new(rendezvous)?;
    subscriber::run(identity, config, sink, &mut port).await
}

/// Parent's handle on a forked observer
#[derive(Debug)]
pub struct ObserverHandle {
    pid: Pid,
    port: RendezvousPort,
    reaped: bool,
}

impl ObserverHandle {
    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn identity(&self) -> ObserverIdentity {
        ObserverIdentity::new(self.pid)
    }

    /// Producer end of the rendezvous channel
    pub fn port_mut(&mut self) -> &mut RendezvousPort {
        &mut self.port
    }

    /// Non-blocking check whether the observer has exited
    pub fn try_wait(&mut self) -> Result<Option<ObserverExit>> {
        if self.reaped {
            return Err(TraceError::Session(format!(
                "observer {} was already reaped",
                self.pid
            )));
        }
        let status = waitpid(self.pid, Some(WaitPidFlag::WNOHANG))?;
        let exit = match status {
            WaitStatus::Exited(_, code) => Some(ObserverExit::from_code(code)),
            WaitStatus::Signaled(_, signal, _) => Some(ObserverExit::Signaled(signal as i32)),
            _ => None,
        };
        if exit.is_some() {
            self.reaped = true;
        }
        Ok(exit)
    }

    /// Wait up to `timeout` for the observer to exit. An observer that is
    /// still running afterwards is killed and `JoinTimeout` is returned.
    pub fn join(&mut self, timeout: Duration) -> Result<ObserverExit> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(exit) = self.try_wait()? {
                info!("Observer {} {}", self.pid, exit);
                return Ok(exit);
            }
            if Instant::now() >= deadline {
                warn!(
                    "Observer {} did not exit within {:?}, killing it",
                    self.pid, timeout
                );
                self.kill_and_reap();
                return Err(TraceError::JoinTimeout(timeout));
            }
            std::thread::sleep(REAP_POLL_INTERVAL);
        }
    }

    fn kill_and_reap(&mut self) {
        if self.reaped {
            return;
        }
        if let Err(e) = kill(self.pid, OsSignal::SIGKILL) {
            debug!("Failed to signal observer {}: {}", self.pid, e);
        }
        if let Err(e) = waitpid(self.pid, None) {
            debug!("Failed to reap observer {}: {}", self.pid, e);
        }
        self.reaped = true;
    }
}

impl Drop for ObserverHandle {
    fn drop(&mut self) {
        self.kill_and_reap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_exit_code_reaches_parent() {
        let mut handle = spawn_observer(|_| ObserverExit::DECODE).unwrap();
        assert_eq!(
            handle.join(Duration::from_secs(5)).unwrap(),
            ObserverExit::DecodeFailed
        );
    }

    #[test]
    fn test_child_panic_maps_to_failure() {
        let mut handle = spawn_observer(|_| panic!("boom")).unwrap();
        assert_eq!(
            handle.join(Duration::from_secs(5)).unwrap(),
            ObserverExit::Failed(ObserverExit::OTHER)
        );
    }

    #[test]
    fn test_rendezvous_channel_connects_parent_and_child() {
        let mut handle = spawn_observer(|mut stream| {
            stream.set_nonblocking(false).ok();
            let mut byte = [0u8; 1];
            match stream.read_exact(&mut byte) {
                Ok(()) if byte[0] == 0x02 => ObserverExit::CLEAN,
                _ => ObserverExit::OTHER,
            }
        })
        .unwrap();
        handle.port.send(crate::handshake::Signal::Ack).unwrap();
        assert_eq!(
            handle.join(Duration::from_secs(5)).unwrap(),
            ObserverExit::Clean
        );
    }

    #[test]
    fn test_join_timeout_kills_observer() {
        let mut handle = spawn_observer(|_| {
            std::thread::sleep(Duration::from_secs(30));
            ObserverExit::CLEAN
        })
        .unwrap();
        let started = Instant::now();
        assert!(matches!(
            handle.join(Duration::from_millis(50)),
            Err(TraceError::JoinTimeout(_))
        ));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(handle.reaped);
    }

    #[test]
    fn test_peer_gone_when_child_exits_early() {
        let mut handle = spawn_observer(|_| ObserverExit::STARTUP).unwrap();
        let exit = handle.join(Duration::from_secs(5)).unwrap();
        assert_eq!(exit, ObserverExit::StartupFailed);
        assert!(matches!(
            handle.port_mut().poll_signal(),
            Err(TraceError::PeerGone(_))
        ));
    }
}
